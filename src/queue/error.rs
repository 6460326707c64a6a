//! Error types for the task core.

use thiserror::Error;

use super::TaskStatus;

/// Errors returned by the [`TaskService`](super::TaskService) entry points.
///
/// Each variant is a distinct failure kind so that outer layers can map
/// them to their own status codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("{0}")]
    Validation(String),

    #[error("task ID already exists: {0}")]
    DuplicateId(String),

    #[error("task not found: {0}")]
    NotFound(String),

    #[error("only failed tasks can be retried (task {id} is {status})")]
    InvalidState { id: String, status: TaskStatus },

    #[error("queue is full, try again later")]
    QueueFull,
}

/// An expected failure reported by a [`TaskProcessor`](super::TaskProcessor).
///
/// A processor returning this resolves the task to `failed`. Panics are
/// handled separately by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task processing failed: {0}")]
pub struct ProcessError(pub String);

impl ProcessError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors reported while stopping the worker.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("worker did not stop within {0:?}")]
    GracePeriodElapsed(std::time::Duration),

    #[error("worker task terminated abnormally: {0}")]
    Join(#[from] tokio::task::JoinError),
}
