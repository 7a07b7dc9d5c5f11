//! Column materialization: projected tasks + pending moves -> per-column id lists.
//!
//! Columns are never stored. They are a view derived from the task snapshot,
//! recomputed whenever a snapshot, the filter or the sprint list changes.

use crate::guard::PendingMoveGuard;
use crate::types::{ColumnId, Sprint, Task, TaskId};
use indexmap::IndexMap;

/// Ordered task ids per column.
///
/// Iteration order is the display order: backlog, then sprints by sequence
/// number, then any column a task references that is not an active sprint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    columns: IndexMap<ColumnId, Vec<TaskId>>,
}

impl Columns {
    /// Backlog plus one empty column per sprint
    pub fn empty(sprints: &[Sprint]) -> Self {
        let mut ordered: Vec<&Sprint> = sprints.iter().collect();
        ordered.sort_by(|a, b| {
            a.sequence_number
                .cmp(&b.sequence_number)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut columns = IndexMap::with_capacity(ordered.len() + 1);
        columns.insert(ColumnId::Backlog, Vec::new());
        for sprint in ordered {
            columns.entry(sprint.column()).or_insert_with(Vec::new);
        }
        Self { columns }
    }

    pub fn get(&self, column: &ColumnId) -> Option<&[TaskId]> {
        self.columns.get(column).map(Vec::as_slice)
    }

    pub fn backlog(&self) -> &[TaskId] {
        self.get(&ColumnId::Backlog).unwrap_or(&[])
    }

    pub fn contains_column(&self, column: &ColumnId) -> bool {
        self.columns.contains_key(column)
    }

    /// Column ids in display order
    pub fn column_ids(&self) -> impl Iterator<Item = &ColumnId> {
        self.columns.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnId, &[TaskId])> {
        self.columns.iter().map(|(id, tasks)| (id, tasks.as_slice()))
    }

    /// Container holding `task_id` and its index there
    pub fn locate(&self, task_id: &TaskId) -> Option<(&ColumnId, usize)> {
        self.columns.iter().find_map(|(column, tasks)| {
            tasks
                .iter()
                .position(|t| t == task_id)
                .map(|index| (column, index))
        })
    }

    /// Total number of task ids across all columns
    pub fn task_count(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub(crate) fn column_mut(&mut self, column: &ColumnId) -> Option<&mut Vec<TaskId>> {
        self.columns.get_mut(column)
    }

    fn push(&mut self, column: ColumnId, task_id: TaskId) {
        self.columns.entry(column).or_default().push(task_id);
    }
}

/// Group projected tasks by effective column, preserving projector order.
///
/// A task's effective column is its pending move's target when locked, its
/// own assignment otherwise. Same inputs always give the same output.
pub fn materialize(projected: &[&Task], pending: &PendingMoveGuard, sprints: &[Sprint]) -> Columns {
    let mut columns = Columns::empty(sprints);

    for task in projected {
        let effective = pending
            .target(&task.id)
            .unwrap_or(&task.column_assignment)
            .clone();
        if !columns.contains_column(&effective) {
            tracing::debug!(task = %task.id, column = %effective, "task references an inactive sprint");
        }
        columns.push(effective, task.id.clone());
    }

    tracing::trace!(
        tasks = projected.len(),
        locks = pending.len(),
        "columns materialized"
    );
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{project, FilterCriteria};
    use std::time::Instant;

    fn ids(list: &[&str]) -> Vec<TaskId> {
        list.iter().map(|s| TaskId::from(*s)).collect()
    }

    fn sprints() -> Vec<Sprint> {
        vec![Sprint::new("s2", 2), Sprint::new("s1", 1)]
    }

    #[test]
    fn test_backlog_and_sprints_always_present() {
        let columns = materialize(&[], &PendingMoveGuard::default(), &sprints());
        let order: Vec<String> = columns.column_ids().map(|c| c.to_string()).collect();
        assert_eq!(order, ["backlog", "sprint:s1", "sprint:s2"]);
        assert_eq!(columns.task_count(), 0);
    }

    #[test]
    fn test_groups_by_assignment_in_projector_order() {
        let tasks = vec![
            Task::new("c", "C").with_sort_order(3.0),
            Task::new("a", "A").with_sort_order(1.0),
            Task::new("x", "X").in_column(ColumnId::sprint("s1")),
            Task::new("b", "B").with_sort_order(2.0),
        ];
        let projected = project(&tasks, &FilterCriteria::all());
        let columns = materialize(&projected, &PendingMoveGuard::default(), &sprints());

        assert_eq!(columns.backlog(), ids(&["a", "b", "c"]).as_slice());
        assert_eq!(
            columns.get(&ColumnId::sprint("s1")).unwrap(),
            ids(&["x"]).as_slice()
        );
        assert!(columns.get(&ColumnId::sprint("s2")).unwrap().is_empty());
    }

    #[test]
    fn test_lock_overrides_assignment() {
        let tasks = vec![Task::new("a", "A"), Task::new("b", "B")];
        let projected = project(&tasks, &FilterCriteria::all());
        let mut guard = PendingMoveGuard::default();
        guard.lock("b".into(), ColumnId::sprint("s2"), Instant::now());

        let columns = materialize(&projected, &guard, &sprints());
        assert_eq!(columns.backlog(), ids(&["a"]).as_slice());
        assert_eq!(
            columns.get(&ColumnId::sprint("s2")).unwrap(),
            ids(&["b"]).as_slice()
        );
    }

    #[test]
    fn test_inactive_sprint_still_materialized() {
        let tasks = vec![Task::new("old", "Old").in_column(ColumnId::sprint("s0"))];
        let projected = project(&tasks, &FilterCriteria::all());
        let columns = materialize(&projected, &PendingMoveGuard::default(), &sprints());

        assert_eq!(columns.task_count(), 1);
        assert_eq!(columns.column_ids().last(), Some(&ColumnId::sprint("s0")));
    }

    #[test]
    fn test_idempotent() {
        let tasks = vec![
            Task::new("a", "A").in_column(ColumnId::sprint("s1")),
            Task::new("b", "B"),
        ];
        let projected = project(&tasks, &FilterCriteria::all());
        let guard = PendingMoveGuard::default();
        assert_eq!(
            materialize(&projected, &guard, &sprints()),
            materialize(&projected, &guard, &sprints())
        );
    }

    #[test]
    fn test_locate() {
        let tasks = vec![Task::new("a", "A"), Task::new("b", "B")];
        let projected = project(&tasks, &FilterCriteria::all());
        let columns = materialize(&projected, &PendingMoveGuard::default(), &sprints());
        assert_eq!(columns.locate(&"b".into()), Some((&ColumnId::Backlog, 1)));
        assert_eq!(columns.locate(&"zz".into()), None);
    }
}
