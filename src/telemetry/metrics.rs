//! Metric instrument factories for taskq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider the instruments are no-ops.

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

use crate::model::TaskOutcome;

/// Returns the shared meter for taskq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("taskq")
}

/// Counter: tasks accepted by `submit`.
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("taskq.tasks.submitted")
        .with_description("Number of tasks submitted")
        .build()
}

/// Counter: tasks that finished executing.
/// Labels: `outcome` ("completed" | "failed" | "timed_out" | "panicked").
pub fn tasks_settled() -> Counter<u64> {
    meter()
        .u64_counter("taskq.tasks.settled")
        .with_description("Number of executed tasks by outcome")
        .build()
}

/// Counter: backlog entries discarded by `clear`.
pub fn tasks_cleared() -> Counter<u64> {
    meter()
        .u64_counter("taskq.tasks.cleared")
        .with_description("Number of pending tasks discarded by clear")
        .build()
}

/// Histogram: time from admission to settlement.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskq.task.duration_ms")
        .with_description("Task execution time in milliseconds")
        .with_unit("ms")
        .build()
}

/// Histogram: time spent in the backlog before admission.
pub fn task_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("taskq.task.wait_ms")
        .with_description("Task backlog wait time in milliseconds")
        .with_unit("ms")
        .build()
}

/// Instruments held by one queue instance.
pub(crate) struct QueueMetrics {
    submitted: Counter<u64>,
    settled: Counter<u64>,
    cleared: Counter<u64>,
    duration_ms: Histogram<f64>,
    wait_ms: Histogram<f64>,
}

impl QueueMetrics {
    pub(crate) fn new() -> Self {
        Self {
            submitted: tasks_submitted(),
            settled: tasks_settled(),
            cleared: tasks_cleared(),
            duration_ms: task_duration_ms(),
            wait_ms: task_wait_ms(),
        }
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.add(1, &[]);
    }

    pub(crate) fn record_started(&self, waited_ms: u64) {
        self.wait_ms.record(waited_ms as f64, &[]);
    }

    pub(crate) fn record_settled(&self, outcome: TaskOutcome, duration_ms: u64) {
        let labels = [KeyValue::new("outcome", outcome.as_str())];
        self.settled.add(1, &labels);
        self.duration_ms.record(duration_ms as f64, &labels);
    }

    pub(crate) fn record_cleared(&self, count: usize) {
        self.cleared.add(count as u64, &[]);
    }
}
