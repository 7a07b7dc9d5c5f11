//! Sprint planning board engine
//!
//! This crate holds the drag-and-drop reconciliation engine behind a sprint
//! planning board: an unordered backlog plus one ordered column per sprint,
//! derived from a task store that pushes full snapshots and confirms writes
//! asynchronously.
//!
//! ## Overview
//!
//! - **Columns are derived** - tasks live in a flat map keyed by id; columns are
//!   id lists materialized from the snapshot, never stored
//! - **Optimistic drags** - a drop shows its result immediately and sends a
//!   fire-and-forget move to the store
//! - **No snap-back** - a task moved to another column is locked there until a
//!   snapshot confirms the move, so stale snapshots cannot undo it
//! - **Bounded locks** - locks expire; expired moves are retried, then rolled
//!   back and reported to the UI
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sprint_board::{BoardConfig, BoardRuntime, ColumnId, DropTarget, MemoryStore, Sprint, Task};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new(vec![Task::new("t1", "Write docs")]));
//! let config = BoardConfig::from_env()?;
//!
//! let (runtime, handle) = BoardRuntime::new(store, &config, vec![Sprint::new("s1", 1)]);
//! tokio::spawn(runtime.run());
//!
//! handle.on_drag_start("t1")?;
//! handle.on_drag_over(DropTarget::container(ColumnId::sprint("s1")))?;
//! handle.on_drag_end(Some(DropTarget::container(ColumnId::sprint("s1"))))?;
//!
//! println!("{:?}", handle.view().columns);
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! ```text
//! StoreAdapter ──snapshot──▶ filter::project ──▶ materialize ──▶ Columns ──▶ UI
//!      ▲                                            ▲
//!      │ move_task                                  │ locks
//!      │                                            │
//! DragSession ───────commit───────────────▶ PendingMoveGuard
//! ```

pub mod board;
pub mod config;
pub mod drag;
mod error;
pub mod filter;
pub mod guard;
pub mod materialize;
pub mod runtime;
pub mod store;
pub mod types;

pub use board::{BoardNotice, SprintBoard};
pub use config::BoardConfig;
pub use drag::{CancelReason, Commit, DragOutcome, DragSession, DropTarget};
pub use error::{BoardError, Result};
pub use filter::{FilterCriteria, FilterInput};
pub use guard::{LockPolicy, PendingMove, PendingMoveGuard, Reconciled};
pub use materialize::{materialize, Columns};
pub use runtime::{BoardEvent, BoardHandle, BoardRuntime, BoardView};
pub use store::{
    decode_snapshot, MemoryStore, MoveIntent, Snapshot, StoreAdapter, Subscription,
};

// Re-export commonly used types
pub use types::{ColumnId, Priority, Size, Sprint, SprintId, Task, TaskId};
