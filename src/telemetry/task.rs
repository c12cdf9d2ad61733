//! Task execution span helpers.

use std::time::Duration;

use tracing::Span;

use crate::model::{TaskId, TaskOutcome, duration_ms};

/// Start a span covering one task from admission to settlement.
///
/// The `task.outcome` field is declared empty and filled in by
/// [`record_outcome`].
pub fn start_task_span(id: &TaskId, timeout: Option<Duration>) -> Span {
    tracing::info_span!(
        "task.execute",
        "task.id" = %id.0,
        "task.timeout_ms" = timeout.map(duration_ms),
        "task.outcome" = tracing::field::Empty,
    )
}

/// Record how the task settled on its span.
pub fn record_outcome(span: &Span, outcome: TaskOutcome) {
    span.record("task.outcome", outcome.as_str());
}
