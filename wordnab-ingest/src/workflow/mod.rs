//! Batch workflow
//!
//! [`Pipeline`] composes the track processor, deduplicator and aggregator
//! over ordered batches. [`BatchReport`] is what one batch produced.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineConfig};

use crate::types::{AggregatedWord, TrackIdentity, VocabError};
use serde::Serialize;
use uuid::Uuid;

/// Typed failure of one track within a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFailure {
    pub identity: TrackIdentity,
    /// Error kind ("transport", "invalid_input", ...)
    pub kind: String,
    pub message: String,
}

impl TrackFailure {
    pub fn new(identity: TrackIdentity, error: &VocabError) -> Self {
        Self {
            identity,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result of processing one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub batch_id: Uuid,
    /// Track records supplied, including repeated plays
    pub track_count: usize,
    /// Newly extracted, in batch order
    pub processed: Vec<TrackIdentity>,
    /// Already captured earlier in the run
    pub reused: Vec<TrackIdentity>,
    /// No lyrics available
    pub skipped: Vec<TrackIdentity>,
    /// New tracks that ended the batch with no vocabulary
    pub addition_requests: Vec<TrackIdentity>,
    pub failures: Vec<TrackFailure>,
    /// Tracks contributing at least one word to `words`
    pub contributing: Vec<TrackIdentity>,
    /// Word table after this batch
    pub words: Vec<AggregatedWord>,
}

impl BatchReport {
    pub fn new(run_id: Uuid, batch_id: Uuid, track_count: usize) -> Self {
        Self {
            run_id,
            batch_id,
            track_count,
            processed: Vec::new(),
            reused: Vec::new(),
            skipped: Vec::new(),
            addition_requests: Vec::new(),
            failures: Vec::new(),
            contributing: Vec::new(),
            words: Vec::new(),
        }
    }
}
