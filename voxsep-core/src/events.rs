//! Event types for the separation pipeline
//!
//! Workers report lifecycle events through the bus; renderers (terminal,
//! GUI) subscribe and never share mutable state with the workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Terminal status of one batch entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Failed,
    Cancelled,
}

/// Separation lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeparatorEvent {
    /// Batch accepted N entries
    BatchStarted {
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// A worker picked up one entry
    FileStarted {
        index: usize,
        total: usize,
        file: String,
        timestamp: DateTime<Utc>,
    },

    /// One entry reached a terminal state
    FileFinished {
        index: usize,
        total: usize,
        file: String,
        status: FileStatus,
        /// Failure reason, present when `status` is `failed`
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Cancellation observed; remaining entries settle as cancelled
    BatchCancelled {
        timestamp: DateTime<Utc>,
    },

    /// All entries settled
    BatchFinished {
        succeeded: usize,
        failed: usize,
        cancelled: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus carrying `SeparatorEvent`s from workers to consumers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SeparatorEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SeparatorEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers. Events sent while nobody listens
    /// are dropped; progress reporting is best-effort by design of the
    /// broadcast channel, so senders ignore the error.
    pub fn emit(
        &self,
        event: SeparatorEvent,
    ) -> Result<usize, broadcast::error::SendError<SeparatorEvent>> {
        self.tx.send(event)
    }
}
