//! Sprint and column identity types

use super::ids::SprintId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A time-boxed sprint, supplied by the surrounding UI (one per active sprint)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: SprintId,
    pub sequence_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl Sprint {
    /// Create a sprint with no dates
    pub fn new(id: impl Into<SprintId>, sequence_number: u32) -> Self {
        Self {
            id: id.into(),
            sequence_number,
            start_date: None,
            end_date: None,
        }
    }

    /// Set the sprint's date range
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// The column this sprint materializes into
    pub fn column(&self) -> ColumnId {
        ColumnId::Sprint(self.id.clone())
    }
}

/// A drop container: the backlog or a sprint column.
///
/// On the wire this is the task's sprint reference: `null` for the backlog,
/// the sprint id otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "Option<SprintId>", into = "Option<SprintId>")]
pub enum ColumnId {
    #[default]
    Backlog,
    Sprint(SprintId),
}

impl ColumnId {
    /// Shorthand for a sprint column
    pub fn sprint(id: impl Into<SprintId>) -> Self {
        Self::Sprint(id.into())
    }

    pub fn is_backlog(&self) -> bool {
        matches!(self, Self::Backlog)
    }
}

impl From<Option<SprintId>> for ColumnId {
    fn from(sprint: Option<SprintId>) -> Self {
        match sprint {
            Some(id) => Self::Sprint(id),
            None => Self::Backlog,
        }
    }
}

impl From<ColumnId> for Option<SprintId> {
    fn from(column: ColumnId) -> Self {
        match column {
            ColumnId::Backlog => None,
            ColumnId::Sprint(id) => Some(id),
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backlog => f.write_str("backlog"),
            Self::Sprint(id) => write!(f, "sprint:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_wire_format() {
        assert_eq!(serde_json::to_string(&ColumnId::Backlog).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&ColumnId::sprint("s1")).unwrap(),
            "\"s1\""
        );
        let col: ColumnId = serde_json::from_str("\"s2\"").unwrap();
        assert_eq!(col, ColumnId::sprint("s2"));
    }

    #[test]
    fn test_sprint_deserialize() {
        let sprint: Sprint = serde_json::from_str(
            r#"{"id":"s1","sequenceNumber":3,"startDate":"2026-01-05","endDate":"2026-01-19"}"#,
        )
        .unwrap();
        assert_eq!(sprint.sequence_number, 3);
        assert_eq!(sprint.column(), ColumnId::sprint("s1"));
        assert!(sprint.start_date.is_some());
    }
}
