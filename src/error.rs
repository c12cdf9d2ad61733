//! Error types for taskq.
//!
//! [`Error`] covers queue construction and configuration. [`TaskError`]
//! is what a caller sees when awaiting a [`crate::engine::TaskHandle`].

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid capacity {0}: a queue must admit at least one task")]
    InvalidCapacity(usize),

    #[error("no tokio runtime available; construct the queue inside a runtime")]
    NoRuntime,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a submitted task did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The queue stopped waiting. The action itself may still be running.
    #[error("Task timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// The action's own error, passed through untouched.
    #[error("{0}")]
    Failed(E),

    #[error("task panicked: {0}")]
    Panicked(String),

    /// Removed from the backlog by `clear()` before it ever ran.
    #[error("task was cleared from the queue before it started")]
    Cancelled,
}

impl<E> TaskError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// The action's own error, if that is what this is.
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(err) => Some(err),
            _ => None,
        }
    }
}
