//! Error types for the sprint board engine

use thiserror::Error;

/// Result type for sprint board operations
pub type Result<T> = std::result::Result<T, BoardError>;

/// Errors that can occur while projecting, materializing or dragging
#[derive(Debug, Error)]
pub enum BoardError {
    /// Filter criteria carried a value outside its enum
    #[error("invalid filter value for {field}: {value}")]
    InvalidFilter { field: String, value: String },

    /// A gesture referenced a container (or a task standing in for one) that is
    /// not part of the current materialization
    #[error("container not found: {id}")]
    ContainerNotFound { id: String },

    /// Task not present in the latest snapshot
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// A drag gesture is already in progress
    #[error("drag already in progress for task {id}")]
    DragInProgress { id: String },

    /// Drag handler called with no gesture in progress
    #[error("no drag in progress")]
    NoActiveDrag,

    /// The store rejected a move, or its lock expired with no retries left
    #[error("mutation failed for task {task_id}: {message}")]
    MutationFailed { task_id: String, message: String },

    /// The store's snapshot channel was closed
    #[error("store subscription closed")]
    StoreClosed,

    /// The board runtime's event loop has exited
    #[error("board runtime stopped")]
    RuntimeStopped,

    /// Configuration loaded but a value is out of range
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    /// Configuration could not be extracted
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for BoardError {
    fn from(error: figment::Error) -> Self {
        Self::Config(Box::new(error))
    }
}

impl BoardError {
    /// Create an invalid filter error
    pub fn invalid_filter(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a container-not-found error
    pub fn container_not_found(id: impl ToString) -> Self {
        Self::ContainerNotFound { id: id.to_string() }
    }

    /// Create a mutation failure
    pub fn mutation_failed(task_id: impl ToString, message: impl Into<String>) -> Self {
        Self::MutationFailed {
            task_id: task_id.to_string(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Errors the engine absorbs on its own: the gesture is cancelled or the
    /// filter falls back to "all", and nothing reaches the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilter { .. } | Self::ContainerNotFound { .. } | Self::TaskNotFound { .. }
        )
    }
}
