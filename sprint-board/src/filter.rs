//! Filter/sort projection over a task snapshot.
//!
//! Turns the raw task set and the UI's filter criteria into the ordered list
//! every column is grouped from. Pure: no side effects, no state.

use crate::error::{BoardError, Result};
use crate::types::{Priority, Size, Task};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const ALL: &str = "all";

/// Filter criteria as the UI hands them over: plain strings, `"all"` for no filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterInput {
    pub owner: String,
    pub priority: String,
    pub size: String,
}

impl Default for FilterInput {
    fn default() -> Self {
        Self {
            owner: ALL.into(),
            priority: ALL.into(),
            size: ALL.into(),
        }
    }
}

/// Validated filter criteria. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub owner: Option<String>,
    pub priority: Option<Priority>,
    pub size: Option<Size>,
}

impl FilterCriteria {
    /// Criteria that match every task
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    /// Parse raw criteria, failing on the first value outside its enum
    pub fn parse(input: &FilterInput) -> Result<Self> {
        Ok(Self {
            owner: parse_owner(&input.owner),
            priority: parse_field("priority", &input.priority)?,
            size: parse_field("size", &input.size)?,
        })
    }

    /// Parse raw criteria, falling back to "all" for any invalid field
    pub fn parse_lenient(input: &FilterInput) -> Self {
        let priority = parse_field("priority", &input.priority).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring priority filter");
            None
        });
        let size = parse_field("size", &input.size).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring size filter");
            None
        });
        Self {
            owner: parse_owner(&input.owner),
            priority,
            size,
        }
    }

    /// Check a single task against the criteria
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(ref owner) = self.owner {
            if task.owner.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(size) = self.size {
            if task.size != Some(size) {
                return false;
            }
        }
        true
    }
}

impl TryFrom<FilterInput> for FilterCriteria {
    type Error = BoardError;

    fn try_from(input: FilterInput) -> Result<Self> {
        Self::parse(&input)
    }
}

fn parse_owner(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(ALL) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, raw: &str) -> Result<Option<T>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(ALL) {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| BoardError::invalid_filter(field, raw))
}

/// Display order between two tasks.
///
/// Tasks with a manual `sort_order` come first, ordered by it. After that, due
/// date ascending with undated tasks last, then priority rank, then id so the
/// result never depends on snapshot order.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    let manual = match (a.sort_order, b.sort_order) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };

    manual
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Filter the task set and order the survivors for display
pub fn project<'a, I>(tasks: I, criteria: &FilterCriteria) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut projected: Vec<&Task> = tasks.into_iter().filter(|t| criteria.matches(t)).collect();
    projected.sort_by(|a, b| compare_tasks(a, b));
    projected
}
