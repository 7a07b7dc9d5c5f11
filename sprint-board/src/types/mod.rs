//! Core types for the sprint board engine

mod ids;
mod sprint;
mod task;

// Re-export all types
pub use ids::{SprintId, TaskId};
pub use sprint::{ColumnId, Sprint};
pub use task::{Priority, Size, Task};
