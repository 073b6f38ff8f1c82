//! Engine notifications.
//!
//! Progress updates and caught errors are published on a broadcast channel.
//! Publishing never blocks: with no subscribers events are dropped, and a
//! subscriber that falls behind skips the oldest events
//! (`RecvError::Lagged`).

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Subscribers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Human-readable progress (dispatch, retries, rebalancing).
    Update { message: String },
    /// An error caught in any engine task.
    Error { message: String },
}

impl Event {
    pub fn message(&self) -> &str {
        match &self.kind {
            EventKind::Update { message } | EventKind::Error { message } => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, EventKind::Error { .. })
    }
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
    seq: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn update(&self, message: impl Into<String>) {
        self.publish(EventKind::Update {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(EventKind::Error {
            message: message.into(),
        });
    }

    fn publish(&self, kind: EventKind) {
        let event = Event {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            kind,
        };
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}
