//! Event types and in-process event bus
//!
//! Events are broadcast to any number of subscribers (the SSE endpoint is the
//! main one). Emission never blocks the pipeline: slow subscribers lag and
//! lose old events instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// WordNab event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WordnabEvent {
    /// A batch of tracks was accepted for processing
    BatchStarted {
        run_id: Uuid,
        batch_id: Uuid,
        /// Track records supplied, before collapsing repeated plays
        track_count: usize,
        /// Distinct track identities in the batch
        distinct_tracks: usize,
        timestamp: DateTime<Utc>,
    },

    /// Vocabulary was extracted for a track
    TrackProcessed {
        batch_id: Uuid,
        identity: String,
        language: String,
        confidence: f64,
        word_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Track already had vocabulary captured earlier in the run
    TrackReused {
        batch_id: Uuid,
        identity: String,
        timestamp: DateTime<Utc>,
    },

    /// No lyrics were found; the track contributes no words
    TrackSkipped {
        batch_id: Uuid,
        identity: String,
        timestamp: DateTime<Utc>,
    },

    /// A collaborator call failed for this track
    TrackFailed {
        batch_id: Uuid,
        identity: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Batch finished and the word table was rebuilt
    BatchCompleted {
        batch_id: Uuid,
        processed: usize,
        reused: usize,
        skipped: usize,
        failed: usize,
        table_size: usize,
        timestamp: DateTime<Utc>,
    },

    /// A context job was submitted to the backend
    ContextJobSubmitted {
        task_id: String,
        identity: String,
        word: String,
        timestamp: DateTime<Utc>,
    },

    /// A context job reached a terminal state
    ContextJobFinished {
        task_id: String,
        /// "completed", "failed" or "timeout"
        outcome: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
}

impl WordnabEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            WordnabEvent::BatchStarted { .. } => "BatchStarted",
            WordnabEvent::TrackProcessed { .. } => "TrackProcessed",
            WordnabEvent::TrackReused { .. } => "TrackReused",
            WordnabEvent::TrackSkipped { .. } => "TrackSkipped",
            WordnabEvent::TrackFailed { .. } => "TrackFailed",
            WordnabEvent::BatchCompleted { .. } => "BatchCompleted",
            WordnabEvent::ContextJobSubmitted { .. } => "ContextJobSubmitted",
            WordnabEvent::ContextJobFinished { .. } => "ContextJobFinished",
        }
    }
}

/// Broadcast bus for [`WordnabEvent`]
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WordnabEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<WordnabEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: WordnabEvent,
    ) -> Result<usize, broadcast::error::SendError<WordnabEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: WordnabEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
