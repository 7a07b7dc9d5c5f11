//! SprintBoard - the engine tying projection, materialization, the pending
//! move guard and drag sessions together.
//!
//! Every entry point is a discrete event handler that runs to completion:
//! snapshot arrival, drag start/over/end, mutation results and deadline
//! ticks. The board owns no I/O; handlers that need the store to act return
//! the [`MoveIntent`]s to send.

use crate::drag::{CancelReason, DragOutcome, DragSession, DropTarget};
use crate::error::{BoardError, Result};
use crate::filter::{project, FilterCriteria, FilterInput};
use crate::guard::{Expired, LockPolicy, PendingMoveGuard, Reconciled};
use crate::materialize::{materialize, Columns};
use crate::store::MoveIntent;
use crate::types::{ColumnId, Sprint, Task, TaskId};
use indexmap::IndexMap;
use std::time::Instant;

/// Something the UI should tell the user about
#[derive(Debug, Clone, PartialEq)]
pub enum BoardNotice {
    /// A move could not be persisted; the optimistic placement was rolled back
    SyncFailed { intent: MoveIntent, message: String },
    /// Another writer moved the task after us; their placement stands
    Superseded { task_id: TaskId, column: ColumnId },
}

impl BoardNotice {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Self::SyncFailed { intent, .. } => &intent.task_id,
            Self::Superseded { task_id, .. } => task_id,
        }
    }
}

/// The sprint planning board
#[derive(Debug)]
pub struct SprintBoard {
    /// Latest snapshot, keyed by id
    tasks: IndexMap<TaskId, Task>,
    sprints: Vec<Sprint>,
    filter: FilterCriteria,
    guard: PendingMoveGuard,
    /// What the UI shows while no gesture is active
    layout: Columns,
    drag: Option<DragSession>,
    /// Inputs changed during a drag; re-materialize when it ends
    stale: bool,
    notices: Vec<BoardNotice>,
}

impl SprintBoard {
    pub fn new(sprints: Vec<Sprint>, filter: FilterCriteria, policy: LockPolicy) -> Self {
        let layout = Columns::empty(&sprints);
        Self {
            tasks: IndexMap::new(),
            sprints,
            filter,
            guard: PendingMoveGuard::new(policy),
            layout,
            drag: None,
            stale: false,
            notices: Vec::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Columns to render: the drag's working copy mid-gesture, the
    /// materialized layout otherwise
    pub fn columns(&self) -> &Columns {
        match self.drag {
            Some(ref session) => session.working(),
            None => &self.layout,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn dragging(&self) -> Option<&TaskId> {
        self.drag.as_ref().map(DragSession::task_id)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn sprints(&self) -> &[Sprint] {
        &self.sprints
    }

    pub fn filter(&self) -> &FilterCriteria {
        &self.filter
    }

    pub fn pending(&self) -> &PendingMoveGuard {
        &self.guard
    }

    pub fn notices(&self) -> &[BoardNotice] {
        &self.notices
    }

    // =========================================================================
    // Inputs from the store and the surrounding UI
    // =========================================================================

    /// A full snapshot arrived from the store
    pub fn on_snapshot(&mut self, snapshot: &[Task]) -> Vec<Reconciled> {
        self.tasks = snapshot.iter().map(|t| (t.id.clone(), t.clone())).collect();
        let settled = self.guard.reconcile(self.tasks.values());

        for outcome in &settled {
            if let Reconciled::Superseded { task_id, column } = outcome {
                self.notices.push(BoardNotice::Superseded {
                    task_id: task_id.clone(),
                    column: column.clone(),
                });
            }
        }

        tracing::debug!(tasks = self.tasks.len(), settled = settled.len(), "snapshot received");
        self.rematerialize();
        settled
    }

    pub fn set_filter(&mut self, filter: FilterCriteria) {
        if self.filter != filter {
            self.filter = filter;
            self.rematerialize();
        }
    }

    /// Apply raw filter criteria; invalid fields fall back to "all"
    pub fn set_filter_input(&mut self, input: &FilterInput) {
        self.set_filter(FilterCriteria::parse_lenient(input));
    }

    pub fn set_sprints(&mut self, sprints: Vec<Sprint>) {
        self.sprints = sprints;
        self.rematerialize();
    }

    // =========================================================================
    // Gesture handlers
    // =========================================================================

    pub fn on_drag_start(&mut self, task_id: TaskId) -> Result<()> {
        if let Some(ref session) = self.drag {
            return Err(BoardError::DragInProgress {
                id: session.task_id().to_string(),
            });
        }
        self.drag = Some(DragSession::start(task_id, &self.layout)?);
        Ok(())
    }

    /// Pointer moved over a target. Unknown targets are ignored.
    pub fn on_drag_over(&mut self, target: &DropTarget) -> Result<()> {
        let session = self.drag.as_mut().ok_or(BoardError::NoActiveDrag)?;
        if let Err(e) = session.over(target) {
            tracing::warn!(error = %e, "ignoring drag over unknown target");
        }
        Ok(())
    }

    /// Pointer released. On commit the returned outcome carries the intent to
    /// send; a column change has already been locked.
    pub fn on_drag_end(&mut self, target: Option<&DropTarget>, now: Instant) -> Result<DragOutcome> {
        let session = self.drag.take().ok_or(BoardError::NoActiveDrag)?;

        let missing = self
            .vanished(session.task_id(), target)
            .map(TaskId::to_string);
        let outcome = match missing {
            Some(id) => {
                let e = BoardError::container_not_found(id);
                tracing::warn!(error = %e, "drop references a deleted task, cancelling");
                DragOutcome::Cancelled(CancelReason::ContainerNotFound(e.to_string()))
            }
            None => session.end(target),
        };

        if let DragOutcome::Committed(ref commit) = outcome {
            if commit.column_changed() {
                let base_version = self.tasks.get(&commit.intent.task_id).and_then(|t| t.version);
                self.guard.lock_intent(&commit.intent, base_version, now);
            } else {
                // reorder inside a column the task is still locked into
                self.guard.update_intent(&commit.intent);
            }
            self.layout = commit.layout.clone();
        }

        if std::mem::take(&mut self.stale) {
            self.rematerialize();
        }
        Ok(outcome)
    }

    /// Abort the gesture in progress, if any
    pub fn on_drag_cancel(&mut self) {
        if let Some(session) = self.drag.take() {
            let _ = session.cancel();
            if std::mem::take(&mut self.stale) {
                self.rematerialize();
            }
        }
    }

    // =========================================================================
    // Write-path feedback
    // =========================================================================

    /// The store answered a move
    pub fn on_mutation_result(&mut self, intent: &MoveIntent, result: Result<()>) {
        let Err(e) = result else {
            tracing::debug!(task = %intent.task_id, "move accepted by store");
            return;
        };

        if let Some(pending) = self.guard.get(&intent.task_id) {
            if pending.intent.as_ref() != Some(intent) {
                tracing::debug!(task = %intent.task_id, "failure of a superseded move ignored");
                return;
            }
        }

        tracing::warn!(task = %intent.task_id, error = %e, "move rejected, rolling back");
        self.guard.clear(&intent.task_id);
        self.push_failure(intent.clone(), e.to_string());
        self.rematerialize();
    }

    /// Check lock deadlines. Returns intents to re-send.
    pub fn on_tick(&mut self, now: Instant) -> Vec<MoveIntent> {
        let mut retries = Vec::new();
        let mut rolled_back = false;

        for expired in self.guard.expire(now) {
            match expired {
                Expired::Retry(intent) => retries.push(intent),
                Expired::Failed(pending) => {
                    rolled_back = true;
                    let intent = pending.intent.unwrap_or_else(|| MoveIntent {
                        task_id: pending.task_id.clone(),
                        column: pending.target.clone(),
                        sibling_order: Vec::new(),
                    });
                    let e = BoardError::mutation_failed(
                        &pending.task_id,
                        format!("not confirmed after {} attempts", pending.attempts),
                    );
                    self.push_failure(intent, e.to_string());
                }
            }
        }

        if rolled_back {
            self.rematerialize();
        }
        retries
    }

    /// The user asked to retry a failed sync. Returns the intent to send.
    pub fn retry_failed(&mut self, task_id: &TaskId, now: Instant) -> Option<MoveIntent> {
        let index = self.notices.iter().position(
            |n| matches!(n, BoardNotice::SyncFailed { intent, .. } if &intent.task_id == task_id),
        )?;
        let BoardNotice::SyncFailed { intent, .. } = self.notices.remove(index) else {
            return None;
        };

        let current = self.tasks.get(task_id)?;
        if current.column_assignment != intent.column {
            self.guard.lock_intent(&intent, current.version, now);
            self.rematerialize();
        }
        tracing::info!(task = %task_id, "retrying failed move");
        Some(intent)
    }

    /// Drop every notice about `task_id`
    pub fn dismiss(&mut self, task_id: &TaskId) {
        self.notices.retain(|n| n.task_id() != task_id);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn push_failure(&mut self, intent: MoveIntent, message: String) {
        self.notices
            .retain(|n| !matches!(n, BoardNotice::SyncFailed { intent: i, .. } if i.task_id == intent.task_id));
        self.notices.push(BoardNotice::SyncFailed { intent, message });
    }

    /// First id the drop needs that the latest snapshot no longer has
    fn vanished<'a>(&self, dragged: &'a TaskId, target: Option<&'a DropTarget>) -> Option<&'a TaskId> {
        if !self.tasks.contains_key(dragged) {
            return Some(dragged);
        }
        match target {
            Some(DropTarget::Task { id }) if !self.tasks.contains_key(id) => Some(id),
            _ => None,
        }
    }

    fn rematerialize(&mut self) {
        if self.drag.is_some() {
            self.stale = true;
            return;
        }
        let projected = project(self.tasks.values(), &self.filter);
        self.layout = materialize(&projected, &self.guard, &self.sprints);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn s1() -> ColumnId {
        ColumnId::sprint("s1")
    }

    fn ids(list: &[&str]) -> Vec<TaskId> {
        list.iter().map(|s| TaskId::from(*s)).collect()
    }

    fn board() -> SprintBoard {
        let mut board = SprintBoard::new(
            vec![Sprint::new("s1", 1)],
            FilterCriteria::all(),
            LockPolicy {
                ttl: Duration::from_secs(5),
                max_retries: 0,
            },
        );
        board.on_snapshot(&[
            Task::new("a", "A").with_sort_order(0.0),
            Task::new("b", "B").with_sort_order(1.0),
            Task::new("c", "C").with_sort_order(2.0),
        ]);
        board
    }

    #[test]
    fn test_drag_state_machine_misuse() {
        let mut board = board();
        assert!(matches!(
            board.on_drag_over(&DropTarget::container(s1())),
            Err(BoardError::NoActiveDrag)
        ));
        board.on_drag_start("a".into()).unwrap();
        assert!(matches!(
            board.on_drag_start("b".into()),
            Err(BoardError::DragInProgress { .. })
        ));
    }

    #[test]
    fn test_columns_show_working_copy_mid_drag() {
        let mut board = board();
        board.on_drag_start("b".into()).unwrap();
        board.on_drag_over(&DropTarget::container(s1())).unwrap();
        assert_eq!(board.columns().get(&s1()).unwrap(), ids(&["b"]).as_slice());
        board.on_drag_cancel();
        assert_eq!(board.columns().backlog(), ids(&["a", "b", "c"]).as_slice());
    }

    #[test]
    fn test_snapshot_mid_drag_is_deferred() {
        let mut board = board();
        board.on_drag_start("b".into()).unwrap();
        board.on_drag_over(&DropTarget::container(s1())).unwrap();

        board.on_snapshot(&[
            Task::new("a", "A").with_sort_order(0.0),
            Task::new("b", "B").with_sort_order(1.0),
            Task::new("c", "C").with_sort_order(2.0),
            Task::new("d", "D").with_sort_order(3.0),
        ]);
        // working copy untouched
        assert_eq!(board.columns().backlog(), ids(&["a", "c"]).as_slice());

        let outcome = board
            .on_drag_end(Some(&DropTarget::container(s1())), Instant::now())
            .unwrap();
        assert!(outcome.is_committed());
        // re-materialized with the new task and the fresh lock
        assert_eq!(board.columns().backlog(), ids(&["a", "c", "d"]).as_slice());
        assert_eq!(board.columns().get(&s1()).unwrap(), ids(&["b"]).as_slice());
    }

    #[test]
    fn test_drop_onto_deleted_task_cancels() {
        let mut board = board();
        board.on_drag_start("a".into()).unwrap();
        board.on_snapshot(&[
            Task::new("a", "A").with_sort_order(0.0),
            Task::new("b", "B").with_sort_order(1.0),
        ]);
        let outcome = board
            .on_drag_end(Some(&DropTarget::task("c")), Instant::now())
            .unwrap();
        assert!(matches!(
            outcome,
            DragOutcome::Cancelled(CancelReason::ContainerNotFound(_))
        ));
        assert!(board.pending().is_empty());
        assert_eq!(board.columns().backlog(), ids(&["a", "b"]).as_slice());
    }

    #[test]
    fn test_rejected_move_rolls_back_and_surfaces() {
        let mut board = board();
        let now = Instant::now();
        board.on_drag_start("b".into()).unwrap();
        let outcome = board
            .on_drag_end(Some(&DropTarget::container(s1())), now)
            .unwrap();
        let intent = outcome.intent().unwrap().clone();
        assert!(board.pending().contains(&"b".into()));

        board.on_mutation_result(&intent, Err(BoardError::mutation_failed("b", "boom")));

        assert!(board.pending().is_empty());
        assert_eq!(board.columns().backlog(), ids(&["a", "b", "c"]).as_slice());
        assert!(matches!(
            board.notices(),
            [BoardNotice::SyncFailed { message, .. }] if message.contains("boom")
        ));
    }

    #[test]
    fn test_expired_lock_rolls_back() {
        let mut board = board();
        let now = Instant::now();
        board.on_drag_start("b".into()).unwrap();
        board
            .on_drag_end(Some(&DropTarget::container(s1())), now)
            .unwrap();

        assert!(board.on_tick(now + Duration::from_secs(1)).is_empty());
        assert_eq!(board.columns().get(&s1()).unwrap(), ids(&["b"]).as_slice());

        let retries = board.on_tick(now + Duration::from_secs(6));
        assert!(retries.is_empty());
        assert!(board.columns().get(&s1()).unwrap().is_empty());
        assert_eq!(board.notices().len(), 1);
    }

    #[test]
    fn test_retry_failed_relocks() {
        let mut board = board();
        let now = Instant::now();
        board.on_drag_start("b".into()).unwrap();
        let intent = board
            .on_drag_end(Some(&DropTarget::container(s1())), now)
            .unwrap()
            .intent()
            .cloned()
            .unwrap();
        board.on_mutation_result(&intent, Err(BoardError::mutation_failed("b", "offline")));

        let resent = board.retry_failed(&"b".into(), now).unwrap();
        assert_eq!(resent, intent);
        assert!(board.notices().is_empty());
        assert_eq!(board.columns().get(&s1()).unwrap(), ids(&["b"]).as_slice());
    }

    #[test]
    fn test_stale_failure_ignored_after_newer_move() {
        let mut board = board();
        let now = Instant::now();
        board.on_drag_start("b".into()).unwrap();
        let first = board
            .on_drag_end(Some(&DropTarget::container(s1())), now)
            .unwrap()
            .intent()
            .cloned()
            .unwrap();

        board.on_drag_start("b".into()).unwrap();
        board
            .on_drag_end(Some(&DropTarget::container(ColumnId::Backlog)), now)
            .unwrap();

        board.on_mutation_result(&first, Err(BoardError::mutation_failed("b", "late")));
        assert!(board.notices().is_empty());
        assert_eq!(board.pending().target(&"b".into()), Some(&ColumnId::Backlog));
    }

    fn board_with_sprint_task(max_retries: u32) -> SprintBoard {
        let mut board = SprintBoard::new(
            vec![Sprint::new("s1", 1)],
            FilterCriteria::all(),
            LockPolicy {
                ttl: Duration::from_secs(5),
                max_retries,
            },
        );
        board.on_snapshot(&[
            Task::new("a", "A").with_sort_order(0.0),
            Task::new("x", "X").in_column(s1()).with_sort_order(0.0),
        ]);
        board
    }

    /// Move a into s1 ahead of x, then reorder it behind x before the store echoes
    fn move_then_reorder(board: &mut SprintBoard, now: Instant) -> (MoveIntent, MoveIntent) {
        board.on_drag_start("a".into()).unwrap();
        let moved = board
            .on_drag_end(Some(&DropTarget::position(s1(), 0)), now)
            .unwrap()
            .intent()
            .cloned()
            .unwrap();
        assert_eq!(moved.sibling_order, ids(&["a", "x"]));

        board.on_drag_start("a".into()).unwrap();
        let reordered = board
            .on_drag_end(Some(&DropTarget::container(s1())), now)
            .unwrap()
            .intent()
            .cloned()
            .unwrap();
        assert_eq!(reordered.sibling_order, ids(&["x", "a"]));
        (moved, reordered)
    }

    #[test]
    fn test_reorder_while_locked_retries_latest_order() {
        let mut board = board_with_sprint_task(1);
        let now = Instant::now();
        let (_, reordered) = move_then_reorder(&mut board, now);

        let retries = board.on_tick(now + Duration::from_secs(6));
        assert_eq!(retries, vec![reordered]);
        assert_eq!(board.columns().get(&s1()).unwrap(), ids(&["x", "a"]).as_slice());
    }

    #[test]
    fn test_rejected_reorder_while_locked_rolls_back() {
        let mut board = board_with_sprint_task(1);
        let now = Instant::now();
        let (_, reordered) = move_then_reorder(&mut board, now);

        board.on_mutation_result(&reordered, Err(BoardError::mutation_failed("a", "conflict")));

        assert!(board.pending().is_empty());
        assert_eq!(board.columns().backlog(), ids(&["a"]).as_slice());
        assert!(matches!(
            board.notices(),
            [BoardNotice::SyncFailed { intent, .. }] if intent == &reordered
        ));
    }

    #[test]
    fn test_set_filter_input_lenient() {
        let mut board = board();
        board.set_filter_input(&FilterInput {
            priority: "bogus".into(),
            ..Default::default()
        });
        assert_eq!(board.filter(), &FilterCriteria::all());
        assert_eq!(board.columns().task_count(), 3);
    }
}
