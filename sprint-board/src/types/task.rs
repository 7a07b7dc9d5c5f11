//! Task types: Task, Priority, Size

use super::ids::TaskId;
use super::sprint::ColumnId;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A work item as reported by the store.
///
/// The engine never creates, deletes or persists tasks. It reads them from
/// snapshots and proposes column/order changes through the store adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    #[serde(default)]
    pub title: String,

    /// Backlog or a concrete sprint
    #[serde(default)]
    pub column_assignment: ColumnId,

    /// Manual order key, author-assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Missing, null or unrecognized on the wire means `Unknown`
    #[serde(default = "Priority::unknown")]
    pub priority: Priority,

    /// Unrecognized sizes decode as `None`
    #[serde(
        default,
        deserialize_with = "lenient_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<Size>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Logical write version, bumped by the store on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl Task {
    /// Create a backlog task with default attributes
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_assignment: ColumnId::Backlog,
            sort_order: None,
            due_date: None,
            priority: Priority::default(),
            size: None,
            owner: None,
            version: None,
        }
    }

    pub fn in_column(mut self, column: ColumnId) -> Self {
        self.column_assignment = column;
        self
    }

    pub fn with_sort_order(mut self, order: f64) -> Self {
        self.sort_order = Some(order);
        self
    }

    pub fn with_due_date(mut self, due: NaiveDate) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Task priority. Values the store sends that we do not recognize rank as low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
    Unknown,
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.and_then(|r| r.parse().ok()).unwrap_or(Self::Unknown))
    }
}

impl Priority {
    fn unknown() -> Self {
        Self::Unknown
    }

    /// Sort rank: high=0, medium=1, low (and unknown)=2
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low | Self::Unknown => 2,
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

fn lenient_size<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Size>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw.parse() {
        Ok(size) => Ok(Some(size)),
        Err(_) => {
            tracing::warn!(size = %raw, "ignoring unrecognized task size");
            Ok(None)
        }
    }
}

/// T-shirt size estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(Self::Small),
            "medium" | "m" => Ok(Self::Medium),
            "large" | "l" => Ok(Self::Large),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        };
        f.write_str(s)
    }
}
