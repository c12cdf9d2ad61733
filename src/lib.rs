//! # taskq
//!
//! Bounded-concurrency runner for async tasks.
//!
//! Callers submit futures to a [`BoundedTaskQueue`]; at most `capacity`
//! execute at once and the rest wait in FIFO order. A per-task timeout
//! bounds how long the caller waits without cancelling the work itself.
//! Lifecycle events, tracing spans and OpenTelemetry metrics are emitted
//! along the way.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod telemetry;

pub use engine::{BoundedTaskQueue, TaskHandle};
pub use error::{Error, Result, TaskError};
pub use model::{QueueStatus, TaskId, TaskOutcome};
