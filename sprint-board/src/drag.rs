//! Drag session controller.
//!
//! A [`DragSession`] is the whole state of one gesture. It is created from the
//! currently displayed columns on drag start, owns its working copy of them
//! exclusively while the pointer moves, and is consumed on drop to produce a
//! [`DragOutcome`]. Nothing outside the session sees the working copy until
//! the gesture commits.

use crate::error::{BoardError, Result};
use crate::materialize::Columns;
use crate::store::MoveIntent;
use crate::types::{ColumnId, TaskId};
use serde::{Deserialize, Serialize};

/// What the pointer is over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DropTarget {
    /// Another task card; the dragged task takes its slot
    Task { id: TaskId },
    /// Empty space inside a container; the dragged task goes last
    Container { column: ColumnId },
    /// An explicit slot in a container, clamped to its length
    Position { column: ColumnId, index: usize },
}

impl DropTarget {
    pub fn task(id: impl Into<TaskId>) -> Self {
        Self::Task { id: id.into() }
    }

    pub fn container(column: ColumnId) -> Self {
        Self::Container { column }
    }

    pub fn position(column: ColumnId, index: usize) -> Self {
        Self::Position { column, index }
    }
}

/// How a gesture ended
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    Committed(Commit),
    Cancelled(CancelReason),
}

impl DragOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    pub fn intent(&self) -> Option<&MoveIntent> {
        match self {
            Self::Committed(commit) => Some(&commit.intent),
            Self::Cancelled(_) => None,
        }
    }
}

/// A committed gesture
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub intent: MoveIntent,
    /// Container before the drag
    pub from: ColumnId,
    /// Layout the user sees at drop time
    pub layout: Columns,
}

impl Commit {
    /// True when the task changed container, which is what needs a lock
    pub fn column_changed(&self) -> bool {
        self.from != self.intent.column
    }
}

/// Why a gesture produced no intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Released outside any container
    NoDropTarget,
    /// Dropped where it started
    Unchanged,
    /// The target (or the dragged task) is gone from the board
    ContainerNotFound(String),
    /// Aborted by the UI
    Aborted,
}

/// Resolved insertion point
struct Slot {
    column: ColumnId,
    index: Option<usize>,
}

/// Working state of one drag gesture
#[derive(Debug, Clone)]
pub struct DragSession {
    task_id: TaskId,
    origin: ColumnId,
    origin_order: Vec<TaskId>,
    working: Columns,
    /// Last target an Over moved the task into another container for
    last_crossing: Option<DropTarget>,
}

impl DragSession {
    /// Begin dragging `task_id` from the given layout
    pub fn start(task_id: TaskId, layout: &Columns) -> Result<Self> {
        let origin = layout
            .locate(&task_id)
            .map(|(column, _)| column.clone())
            .ok_or_else(|| BoardError::container_not_found(&task_id))?;
        let origin_order = layout.get(&origin).unwrap_or(&[]).to_vec();

        tracing::debug!(task = %task_id, from = %origin, "drag started");
        Ok(Self {
            task_id,
            origin,
            origin_order,
            working: layout.clone(),
            last_crossing: None,
        })
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn origin(&self) -> &ColumnId {
        &self.origin
    }

    /// The in-progress layout the UI renders during the drag
    pub fn working(&self) -> &Columns {
        &self.working
    }

    /// Container the task currently sits in within the working copy
    pub fn current_column(&self) -> &ColumnId {
        self.working
            .locate(&self.task_id)
            .map(|(column, _)| column)
            .unwrap_or(&self.origin)
    }

    /// Pointer moved over `target`.
    ///
    /// Moves the task into the hovered container when it differs from the
    /// one it is in now. Returns whether the working copy changed.
    pub fn over(&mut self, target: &DropTarget) -> Result<bool> {
        let slot = match self.resolve(target)? {
            Some(slot) => slot,
            None => return Ok(false),
        };
        if &slot.column == self.current_column() {
            return Ok(false);
        }

        self.transfer(&slot);
        self.last_crossing = Some(target.clone());
        tracing::debug!(task = %self.task_id, to = %slot.column, "drag crossed containers");
        Ok(true)
    }

    /// Pointer released over `target` (`None`: outside every container)
    pub fn end(mut self, target: Option<&DropTarget>) -> DragOutcome {
        let Some(target) = target else {
            tracing::debug!(task = %self.task_id, "dropped outside any container");
            return DragOutcome::Cancelled(CancelReason::NoDropTarget);
        };

        let slot = match self.resolve(target) {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!(task = %self.task_id, error = %e, "drop target vanished, cancelling");
                return DragOutcome::Cancelled(CancelReason::ContainerNotFound(e.to_string()));
            }
        };

        if let Some(slot) = slot {
            if &slot.column != self.current_column() {
                self.transfer(&slot);
            } else if self.last_crossing.as_ref() != Some(target) {
                self.reorder(&slot);
            }
        }

        let column = self.current_column().clone();
        let siblings = self.working.get(&column).unwrap_or(&[]).to_vec();

        if column == self.origin && siblings == self.origin_order {
            tracing::debug!(task = %self.task_id, "drop left the board unchanged");
            return DragOutcome::Cancelled(CancelReason::Unchanged);
        }

        let intent = MoveIntent {
            task_id: self.task_id,
            column,
            sibling_order: siblings,
        };
        tracing::info!(task = %intent.task_id, from = %self.origin, to = %intent.column, "drag committed");
        DragOutcome::Committed(Commit {
            intent,
            from: self.origin,
            layout: self.working,
        })
    }

    /// Abandon the gesture; the working copy is dropped with the session
    pub fn cancel(self) -> DragOutcome {
        tracing::debug!(task = %self.task_id, "drag aborted");
        DragOutcome::Cancelled(CancelReason::Aborted)
    }

    /// `Ok(None)` when hovering the dragged task itself
    fn resolve(&self, target: &DropTarget) -> Result<Option<Slot>> {
        match target {
            DropTarget::Task { id } if id == &self.task_id => Ok(None),
            DropTarget::Task { id } => {
                let (column, index) = self
                    .working
                    .locate(id)
                    .ok_or_else(|| BoardError::container_not_found(id))?;
                Ok(Some(Slot {
                    column: column.clone(),
                    index: Some(index),
                }))
            }
            DropTarget::Container { column } => {
                self.require_column(column)?;
                Ok(Some(Slot {
                    column: column.clone(),
                    index: None,
                }))
            }
            DropTarget::Position { column, index } => {
                self.require_column(column)?;
                Ok(Some(Slot {
                    column: column.clone(),
                    index: Some(*index),
                }))
            }
        }
    }

    fn require_column(&self, column: &ColumnId) -> Result<()> {
        if self.working.contains_column(column) {
            Ok(())
        } else {
            Err(BoardError::container_not_found(column))
        }
    }

    fn remove_active(&mut self) {
        let current = self.current_column().clone();
        if let Some(list) = self.working.column_mut(&current) {
            list.retain(|t| t != &self.task_id);
        }
    }

    /// Move the task into another container at the slot (or last)
    fn transfer(&mut self, slot: &Slot) {
        self.remove_active();
        let task_id = self.task_id.clone();
        if let Some(list) = self.working.column_mut(&slot.column) {
            let index = slot.index.map_or(list.len(), |i| i.min(list.len()));
            list.insert(index, task_id);
        }
    }

    /// Reposition the task within its current container
    fn reorder(&mut self, slot: &Slot) {
        let column = slot.column.clone();
        let task_id = self.task_id.clone();
        let Some(list) = self.working.column_mut(&column) else {
            return;
        };
        let Some(from) = list.iter().position(|t| t == &task_id) else {
            return;
        };
        let moved = list.remove(from);

        // a task target takes the hovered task's slot: before it moving up, after it moving down
        let to = slot.index.unwrap_or(list.len()).min(list.len());
        list.insert(to, moved);
    }
}
