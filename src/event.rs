//! Structured events emitted by the queue on every lifecycle step.
//!
//! Consumers subscribe to the event stream to build dashboards or audit
//! logs. Nobody listening is fine; a lagging subscriber only loses its
//! own events.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{TaskId, TaskOutcome};

/// A structured event emitted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    TaskSubmitted {
        id: TaskId,
        timeout_ms: Option<u64>,
    },
    TaskStarted {
        id: TaskId,
        waited_ms: u64,
    },
    TaskSettled {
        id: TaskId,
        outcome: TaskOutcome,
        duration_ms: u64,
    },
    BacklogCleared {
        count: usize,
    },
}

impl EventKind {
    /// The task this event concerns, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            EventKind::TaskSubmitted { id, .. }
            | EventKind::TaskStarted { id, .. }
            | EventKind::TaskSettled { id, .. } => Some(*id),
            EventKind::BacklogCleared { .. } => None,
        }
    }
}

/// Sequenced fan-out of queue events.
pub(crate) struct EventBus {
    sender: broadcast::Sender<QueueEvent>,
    seq: AtomicU64,
}

impl EventBus {
    pub(crate) fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        Self {
            sender,
            seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        // No receivers is not an error.
        let _ = self.sender.send(QueueEvent {
            seq,
            timestamp: Utc::now(),
            kind,
        });
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }
}
