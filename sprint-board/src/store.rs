//! Store adapter: the engine's only view of the remote task store.
//!
//! The store pushes a complete task list on every change and accepts
//! fire-and-forget move requests. How a move is persisted (write then
//! reindex, batching, retries on its side) is the store's business.

use crate::error::{BoardError, Result};
use crate::types::{ColumnId, Task, TaskId};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// A full task snapshot as pushed by the store
pub type Snapshot = Arc<Vec<Task>>;

/// Decode a snapshot delivered as a JSON array of tasks
pub fn decode_snapshot(payload: &str) -> Result<Snapshot> {
    let tasks: Vec<Task> = serde_json::from_str(payload)?;
    Ok(Arc::new(tasks))
}

/// Proposed new column and sibling order for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveIntent {
    pub task_id: TaskId,
    pub column: ColumnId,
    /// Every task id in `column`, in the order the user left them
    pub sibling_order: Vec<TaskId>,
}

/// Live feed of snapshots. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Snapshot>,
}

impl Subscription {
    pub fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self { rx }
    }

    /// Most recent snapshot, without waiting
    pub fn current(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot
    pub async fn next(&mut self) -> Result<Snapshot> {
        self.rx.changed().await.map_err(|_| BoardError::StoreClosed)?;
        Ok(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}
}

/// Interface to the remote document store
#[async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    /// Subscribe to full snapshots of the workspace's tasks
    fn subscribe(&self) -> Subscription;

    /// Persist a task's new column and its siblings' order
    async fn move_task(&self, intent: MoveIntent) -> Result<()>;
}

/// Failure injection for [`MemoryStore`]
#[derive(Debug, Default)]
struct Faults {
    /// Reject this many upcoming moves with an error
    reject: u32,
    /// Accept this many upcoming moves without applying them
    drop: u32,
}

/// In-process store keeping tasks in memory and publishing every write.
///
/// Moves are applied as write-then-reindex: the task's column is updated, then
/// each sibling already in that column gets `sort_order` equal to its index.
/// Every write bumps the touched task's `version`.
#[derive(Debug)]
pub struct MemoryStore {
    tasks: Mutex<IndexMap<TaskId, Task>>,
    faults: Mutex<Faults>,
    received: Mutex<Vec<MoveIntent>>,
    tx: watch::Sender<Snapshot>,
}

impl MemoryStore {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks: IndexMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        let (tx, _) = watch::channel(Arc::new(tasks.values().cloned().collect()));
        Self {
            tasks: Mutex::new(tasks),
            faults: Mutex::new(Faults::default()),
            received: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Build a store seeded from a JSON snapshot
    pub fn from_json(payload: &str) -> Result<Self> {
        let snapshot = decode_snapshot(payload)?;
        Ok(Self::new(snapshot.iter().cloned()))
    }

    /// Insert or replace a task, as another client would
    pub async fn put_task(&self, mut task: Task) {
        let mut tasks = self.tasks.lock().await;
        let previous = tasks.get(&task.id).and_then(|t| t.version);
        task.version = Some(previous.unwrap_or(0).max(task.version.unwrap_or(0)) + 1);
        tasks.insert(task.id.clone(), task);
        self.publish(&tasks);
    }

    pub async fn remove_task(&self, id: &TaskId) -> Option<Task> {
        let mut tasks = self.tasks.lock().await;
        let removed = tasks.shift_remove(id);
        self.publish(&tasks);
        removed
    }

    pub async fn task(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().await.get(id).cloned()
    }

    pub async fn snapshot(&self) -> Snapshot {
        Arc::new(self.tasks.lock().await.values().cloned().collect())
    }

    /// Re-send the current state, e.g. to simulate a redundant push
    pub async fn republish(&self) {
        let tasks = self.tasks.lock().await;
        self.publish(&tasks);
    }

    /// Push an arbitrary snapshot without touching stored state
    pub fn push_snapshot(&self, snapshot: Vec<Task>) {
        self.tx.send_replace(Arc::new(snapshot));
    }

    /// Make the next `count` moves fail
    pub async fn reject_next(&self, count: u32) {
        self.faults.lock().await.reject = count;
    }

    /// Make the next `count` moves succeed without being applied
    pub async fn drop_next(&self, count: u32) {
        self.faults.lock().await.drop = count;
    }

    /// Every intent this store has been asked to apply, in arrival order
    pub async fn received(&self) -> Vec<MoveIntent> {
        self.received.lock().await.clone()
    }

    fn publish(&self, tasks: &IndexMap<TaskId, Task>) {
        self.tx
            .send_replace(Arc::new(tasks.values().cloned().collect()));
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe())
    }

    async fn move_task(&self, intent: MoveIntent) -> Result<()> {
        self.received.lock().await.push(intent.clone());

        {
            let mut faults = self.faults.lock().await;
            if faults.reject > 0 {
                faults.reject -= 1;
                return Err(BoardError::mutation_failed(&intent.task_id, "rejected by store"));
            }
            if faults.drop > 0 {
                faults.drop -= 1;
                tracing::debug!(task = %intent.task_id, "move dropped by store");
                return Ok(());
            }
        }

        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(&intent.task_id)
            .ok_or_else(|| BoardError::TaskNotFound {
                id: intent.task_id.to_string(),
            })?;
        task.column_assignment = intent.column.clone();
        task.version = Some(task.version.unwrap_or(0) + 1);

        for (index, sibling) in intent.sibling_order.iter().enumerate() {
            if let Some(t) = tasks.get_mut(sibling) {
                if t.column_assignment == intent.column {
                    t.sort_order = Some(index as f64);
                    if sibling != &intent.task_id {
                        t.version = Some(t.version.unwrap_or(0) + 1);
                    }
                }
            }
        }

        self.publish(&tasks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s1() -> ColumnId {
        ColumnId::sprint("s1")
    }

    #[tokio::test]
    async fn test_move_applies_and_reindexes() {
        let store = MemoryStore::new(vec![
            Task::new("a", "A").in_column(s1()),
            Task::new("b", "B"),
        ]);
        let mut sub = store.subscribe();

        store
            .move_task(MoveIntent {
                task_id: "b".into(),
                column: s1(),
                sibling_order: vec!["b".into(), "a".into()],
            })
            .await
            .unwrap();

        let snapshot = sub.next().await.unwrap();
        let b = snapshot.iter().find(|t| t.id.as_str() == "b").unwrap();
        let a = snapshot.iter().find(|t| t.id.as_str() == "a").unwrap();
        assert_eq!(b.column_assignment, s1());
        assert_eq!(b.sort_order, Some(0.0));
        assert_eq!(b.version, Some(1));
        assert_eq!(a.sort_order, Some(1.0));
    }

    #[tokio::test]
    async fn test_reject_next() {
        let store = MemoryStore::new(vec![Task::new("a", "A")]);
        store.reject_next(1).await;

        let intent = MoveIntent {
            task_id: "a".into(),
            column: s1(),
            sibling_order: vec!["a".into()],
        };
        let err = store.move_task(intent.clone()).await.unwrap_err();
        assert!(matches!(err, BoardError::MutationFailed { .. }));
        assert!(store.move_task(intent).await.is_ok());
        assert_eq!(store.received().await.len(), 2);
    }

    #[tokio::test]
    async fn test_drop_next_leaves_state() {
        let store = MemoryStore::new(vec![Task::new("a", "A")]);
        store.drop_next(1).await;
        store
            .move_task(MoveIntent {
                task_id: "a".into(),
                column: s1(),
                sibling_order: vec!["a".into()],
            })
            .await
            .unwrap();
        assert_eq!(
            store.task(&"a".into()).await.unwrap().column_assignment,
            ColumnId::Backlog
        );
    }

    #[tokio::test]
    async fn test_move_unknown_task() {
        let store = MemoryStore::new(Vec::new());
        let err = store
            .move_task(MoveIntent {
                task_id: "ghost".into(),
                column: s1(),
                sibling_order: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::TaskNotFound { .. }));
    }

    #[test]
    fn test_decode_snapshot() {
        let snapshot = decode_snapshot(
            r#"[{"id":"a","title":"A","columnAssignment":"s1","sortOrder":0},{"id":"b"}]"#,
        )
        .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].column_assignment, s1());
        assert_eq!(snapshot[1].column_assignment, ColumnId::Backlog);

        assert!(matches!(
            decode_snapshot("{not json"),
            Err(BoardError::Json(_))
        ));
    }

    #[test]
    fn test_decode_snapshot_tolerates_bad_attributes() {
        let snapshot = decode_snapshot(
            r#"[{"id":"a","priority":null},{"id":"b","size":"xl"},{"id":"c","size":"small"}]"#,
        )
        .unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].priority, crate::types::Priority::Unknown);
        assert_eq!(snapshot[1].size, None);
        assert_eq!(snapshot[2].size, Some(crate::types::Size::Small));
    }

    #[tokio::test]
    async fn test_from_json_seeds_store() {
        let store = MemoryStore::from_json(r#"[{"id":"a","title":"A"}]"#).unwrap();
        assert_eq!(store.subscribe().current().len(), 1);
        assert!(store.task(&"a".into()).await.is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe_on_drop() {
        let store = MemoryStore::new(Vec::new());
        let sub = store.subscribe();
        assert_eq!(store.tx.receiver_count(), 1);
        sub.unsubscribe();
        assert_eq!(store.tx.receiver_count(), 0);
    }
}
