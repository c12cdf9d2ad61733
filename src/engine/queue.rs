//! Bounded task queue: FIFO backlog, in-flight accounting, admission.
//!
//! All bookkeeping (the in-flight counter and the backlog) lives behind
//! one mutex owned by the queue instance. Task bodies never run while
//! the lock is held; admission only pops a request, bumps the counter
//! and spawns the execution wrapper.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{Notify, broadcast};
use tracing::{Instrument, Span, debug, info, warn};

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind, QueueEvent};
use crate::model::{QueueStatus, TaskId, TaskOutcome, duration_ms};
use crate::telemetry::metrics::QueueMetrics;
use crate::telemetry::task::{record_outcome, start_task_span};

use super::handle::TaskHandle;
use super::task::TaskRequest;

/// Runs submitted async tasks with at most `capacity` executing at once.
///
/// Cloning is cheap; all clones share the same backlog and counters.
#[derive(Clone)]
pub struct BoundedTaskQueue {
    inner: Arc<Inner>,
}

struct Inner {
    capacity: usize,
    default_timeout: Option<Duration>,
    state: Mutex<QueueState>,
    runtime: Handle,
    events: EventBus,
    metrics: QueueMetrics,
    idle: Notify,
}

/// Invariant: `in_flight <= capacity`.
#[derive(Default)]
struct QueueState {
    in_flight: usize,
    backlog: VecDeque<TaskRequest>,
}

impl BoundedTaskQueue {
    /// Create a queue admitting up to `capacity` concurrent tasks.
    ///
    /// Must be called from within a tokio runtime; tasks are spawned onto it.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_config(&QueueConfig::with_max_concurrent(capacity))
    }

    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        debug!(
            capacity = config.max_concurrent,
            default_timeout_ms = config.default_timeout_ms,
            "task queue created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                capacity: config.max_concurrent,
                default_timeout: config.default_timeout(),
                state: Mutex::new(QueueState::default()),
                runtime,
                events: EventBus::new(config.event_buffer),
                metrics: QueueMetrics::new(),
                idle: Notify::new(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Submit a task using the queue's default timeout, if any.
    pub fn submit<F, Fut, T, E>(&self, action: F) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.enqueue(action, self.inner.default_timeout)
    }

    /// Submit a task whose result is awaited for at most `timeout`.
    ///
    /// On timeout the handle fails with [`crate::error::TaskError::Timeout`],
    /// but the action keeps running in the background. A zero timeout
    /// means no timeout.
    pub fn submit_with_timeout<F, Fut, T, E>(&self, action: F, timeout: Duration) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.enqueue(action, Some(timeout))
    }

    fn enqueue<F, Fut, T, E>(&self, action: F, timeout: Option<Duration>) -> TaskHandle<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let timeout = timeout.filter(|t| !t.is_zero());
        let timeout_ms = timeout.map(duration_ms);
        let id = TaskId::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let queued = {
            let mut state = self.inner.lock_state();
            state
                .backlog
                .push_back(TaskRequest::new(id, action, timeout, tx));
            self.inner
                .events
                .emit(EventKind::TaskSubmitted { id, timeout_ms });
            state.backlog.len()
        };

        debug!(task_id = %id, timeout_ms, queued, "task submitted");
        self.inner.metrics.record_submitted();

        self.inner.admit();
        TaskHandle::new(id, rx)
    }

    /// Point-in-time occupancy snapshot.
    pub fn status(&self) -> QueueStatus {
        self.inner.lock_state().status()
    }

    /// Drop every request still waiting in the backlog and return how many.
    ///
    /// Executing tasks are unaffected. Handles of cleared requests resolve
    /// with [`crate::error::TaskError::Cancelled`].
    pub fn clear(&self) -> usize {
        let (cleared, idle) = {
            let mut state = self.inner.lock_state();
            let cleared = std::mem::take(&mut state.backlog);
            self.inner.events.emit(EventKind::BacklogCleared {
                count: cleared.len(),
            });
            (cleared, state.status().is_idle())
        };
        let count = cleared.len();
        // Dropping the requests outside the lock wakes their handles.
        drop(cleared);

        if count > 0 {
            info!(count, "backlog cleared");
            self.inner.metrics.record_cleared(count);
        }
        if idle {
            self.inner.idle.notify_waiters();
        }
        count
    }

    /// Wait until nothing is running or queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.status().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Subscribe to lifecycle events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for BoundedTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("BoundedTaskQueue")
            .field("capacity", &self.inner.capacity)
            .field("running", &status.running)
            .field("queued", &status.queued)
            .finish()
    }
}

impl QueueState {
    fn status(&self) -> QueueStatus {
        QueueStatus {
            running: self.in_flight,
            queued: self.backlog.len(),
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // Bookkeeping never panics mid-update, so a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admission step: start backlog entries while capacity allows.
    ///
    /// A no-op when the queue is full or the backlog is empty.
    fn admit(self: &Arc<Self>) {
        loop {
            let request = {
                let mut state = self.lock_state();
                if state.in_flight >= self.capacity {
                    return;
                }
                let Some(request) = state.backlog.pop_front() else {
                    return;
                };
                state.in_flight += 1;

                let waited_ms = duration_ms(request.submitted_at.elapsed());
                self.events.emit(EventKind::TaskStarted {
                    id: request.id,
                    waited_ms,
                });
                self.metrics.record_started(waited_ms);
                request
            };
            self.execute(request);
        }
    }

    fn execute(self: &Arc<Self>, request: TaskRequest) {
        let inner = Arc::clone(self);
        let id = request.id;
        let span = start_task_span(&id, request.timeout);
        debug!(parent: &span, task_id = %id, "task started");

        self.runtime.spawn(
            async move {
                let started = Instant::now();
                let outcome = request.run().await;
                let elapsed_ms = duration_ms(started.elapsed());
                record_outcome(&Span::current(), outcome);
                inner.finish(id, outcome, elapsed_ms);
            }
            .instrument(span),
        );
    }

    /// Release the slot held by a settled task and admit the next one.
    fn finish(self: &Arc<Self>, id: TaskId, outcome: TaskOutcome, duration_ms: u64) {
        let idle = {
            let mut state = self.lock_state();
            state.in_flight = state.in_flight.saturating_sub(1);
            self.events.emit(EventKind::TaskSettled {
                id,
                outcome,
                duration_ms,
            });
            state.status().is_idle()
        };

        match outcome {
            TaskOutcome::Completed => info!(task_id = %id, duration_ms, "task completed"),
            TaskOutcome::Failed => info!(task_id = %id, duration_ms, "task failed"),
            TaskOutcome::TimedOut => {
                warn!(task_id = %id, duration_ms, "task timed out, action left running")
            }
            TaskOutcome::Panicked => warn!(task_id = %id, duration_ms, "task panicked"),
        }
        self.metrics.record_settled(outcome, duration_ms);

        self.admit();
        if idle {
            self.idle.notify_waiters();
        }
    }
}
