//! Pending move guard.
//!
//! After a drag moves a task to another column, the store's snapshots keep
//! reporting the old column until the write echoes back. The guard holds a
//! lock per such task so materialization places it in the target column
//! regardless of what stale snapshots say, and releases the lock once a
//! snapshot confirms the move.
//!
//! Every lock carries a deadline. A lock that outlives it is either retried
//! (the intent is handed back for re-sending) or released with a failure, so
//! a lost write cannot mask remote truth forever.

use crate::store::MoveIntent;
use crate::types::{ColumnId, Task, TaskId};
use indexmap::IndexMap;
use std::time::{Duration, Instant};

/// A local column change the store has not confirmed yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub task_id: TaskId,
    pub target: ColumnId,
    /// Task version seen when the lock was taken
    pub base_version: Option<u64>,
    /// Intent to re-send if the lock expires
    pub intent: Option<MoveIntent>,
    pub deadline: Instant,
    /// Sends so far, including the first
    pub attempts: u32,
}

/// How long a lock lives and how often it may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub ttl: Duration,
    pub max_retries: u32,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

/// What a snapshot did to a lock
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// Snapshot shows the task in the lock's target column
    Confirmed(TaskId),
    /// A newer version places the task elsewhere: another writer won
    Superseded { task_id: TaskId, column: ColumnId },
    /// Task no longer exists in the store
    Vanished(TaskId),
}

/// What the deadline check did to a lock
#[derive(Debug, Clone, PartialEq)]
pub enum Expired {
    /// Re-send this intent; the lock stays with a fresh deadline
    Retry(MoveIntent),
    /// Lock released with no retries left
    Failed(PendingMove),
}

/// The set of pending moves, at most one per task
#[derive(Debug, Default)]
pub struct PendingMoveGuard {
    locks: IndexMap<TaskId, PendingMove>,
    policy: LockPolicy,
}

impl PendingMoveGuard {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            locks: IndexMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    /// Insert or overwrite the lock for `task_id`
    pub fn lock(&mut self, task_id: TaskId, target: ColumnId, now: Instant) {
        self.insert(PendingMove {
            task_id,
            target,
            base_version: None,
            intent: None,
            deadline: now + self.policy.ttl,
            attempts: 1,
        });
    }

    /// Lock the task an intent moves, remembering the intent for retries
    pub fn lock_intent(&mut self, intent: &MoveIntent, base_version: Option<u64>, now: Instant) {
        self.insert(PendingMove {
            task_id: intent.task_id.clone(),
            target: intent.column.clone(),
            base_version,
            intent: Some(intent.clone()),
            deadline: now + self.policy.ttl,
            attempts: 1,
        });
    }

    fn insert(&mut self, pending: PendingMove) {
        tracing::debug!(task = %pending.task_id, target = %pending.target, "locking pending move");
        // shift_remove keeps iteration in lock order when a task is re-locked
        self.locks.shift_remove(&pending.task_id);
        self.locks.insert(pending.task_id.clone(), pending);
    }

    /// Replace the intent a held lock re-sends, e.g. after a reorder inside
    /// its target column. Returns false when `intent` does not match a lock.
    pub fn update_intent(&mut self, intent: &MoveIntent) -> bool {
        match self.locks.get_mut(&intent.task_id) {
            Some(pending) if pending.target == intent.column => {
                tracing::debug!(task = %intent.task_id, "pending move intent refreshed");
                pending.intent = Some(intent.clone());
                true
            }
            _ => false,
        }
    }

    /// Release a lock explicitly
    pub fn clear(&mut self, task_id: &TaskId) -> Option<PendingMove> {
        let removed = self.locks.shift_remove(task_id);
        if removed.is_some() {
            tracing::debug!(task = %task_id, "pending move cleared");
        }
        removed
    }

    /// Compare every lock against a full snapshot and release the ones it settles
    pub fn reconcile<'a, I>(&mut self, snapshot: I) -> Vec<Reconciled>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        if self.locks.is_empty() {
            return Vec::new();
        }

        let by_id: IndexMap<&TaskId, &Task> = snapshot.into_iter().map(|t| (&t.id, t)).collect();
        let mut settled = Vec::new();

        self.locks.retain(|task_id, pending| match by_id.get(task_id) {
            None => {
                settled.push(Reconciled::Vanished(task_id.clone()));
                false
            }
            Some(task) if task.column_assignment == pending.target => {
                settled.push(Reconciled::Confirmed(task_id.clone()));
                false
            }
            Some(task) => match (pending.base_version, task.version) {
                (Some(base), Some(seen)) if seen > base => {
                    settled.push(Reconciled::Superseded {
                        task_id: task_id.clone(),
                        column: task.column_assignment.clone(),
                    });
                    false
                }
                _ => true,
            },
        });

        for outcome in &settled {
            tracing::info!(?outcome, "pending move reconciled");
        }
        settled
    }

    /// Handle locks whose deadline has passed
    pub fn expire(&mut self, now: Instant) -> Vec<Expired> {
        let mut outcomes = Vec::new();
        let policy = self.policy;

        self.locks.retain(|task_id, pending| {
            if pending.deadline > now {
                return true;
            }
            match pending.intent.clone() {
                Some(intent) if pending.attempts <= policy.max_retries => {
                    pending.attempts += 1;
                    pending.deadline = now + policy.ttl;
                    tracing::warn!(task = %task_id, attempt = pending.attempts, "pending move expired, retrying");
                    outcomes.push(Expired::Retry(intent));
                    true
                }
                _ => {
                    tracing::warn!(task = %task_id, attempts = pending.attempts, "pending move expired, giving up");
                    outcomes.push(Expired::Failed(pending.clone()));
                    false
                }
            }
        });

        outcomes
    }

    /// Target column of the task's lock, if any
    pub fn target(&self, task_id: &TaskId) -> Option<&ColumnId> {
        self.locks.get(task_id).map(|p| &p.target)
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&PendingMove> {
        self.locks.get(task_id)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.locks.contains_key(task_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingMove> {
        self.locks.values()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
