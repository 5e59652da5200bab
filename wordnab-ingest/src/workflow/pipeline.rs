//! Pipeline Orchestrator
//!
//! Runs ordered track batches through the vocabulary pipeline and owns every
//! record and the word table for the lifetime of the run.
//!
//! # Batch phases
//! - **Collapse**: repeated plays of one identity are processed once; plays are counted
//! - **Classify**: identities already captured this run are reused, the rest are new
//! - **Extract**: new tracks go through [`TrackProcessor`] with bounded concurrency,
//!   results consumed in batch order
//! - **Commit**: records appended and identities marked known (single writer)
//! - **Aggregate**: word table rebuilt from every record of the run
//!
//! # Error Handling
//! - Per-track isolation: a failing track is reported, the others continue
//! - Missing lyrics are not failures; the track is skipped and flagged for addition
//! - Batches are serialized; a second batch waits for the first to commit

use super::{BatchReport, TrackFailure};
use crate::services::aggregator::merge_weighted;
use crate::services::deduplicator::filter_new;
use crate::services::known_tracks::KnownTrackStore;
use crate::services::track_processor::{ContextLookup, TrackProcessor};
use crate::types::{
    AggregatedWord, HistoryProvider, ProcessedTrackRecord, Track, TrackIdentity, VocabError,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;
use wordnab_common::config::TomlConfig;
use wordnab_common::events::{EventBus, WordnabEvent};

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Words kept in the aggregated table
    pub cap: usize,
    /// Words with a smaller total are dropped from the table
    pub min_total_count: u64,
    /// Multiply each track's word counts by its play count in the run
    pub weight_by_plays: bool,
    /// Tracks extracted concurrently within one batch
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cap: 30,
            min_total_count: 1,
            weight_by_plays: false,
            concurrency: 4,
        }
    }
}

impl From<&TomlConfig> for PipelineConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            cap: config.aggregation.cap,
            min_total_count: u64::from(config.aggregation.min_total_count),
            weight_by_plays: config.aggregation.weight_by_plays,
            concurrency: config.pipeline.concurrency,
        }
    }
}

/// Everything captured so far in this run
#[derive(Debug, Default)]
struct RunState {
    /// Records in first-seen order
    records: Vec<ProcessedTrackRecord>,
    index: HashMap<TrackIdentity, usize>,
    /// Plays per identity across all batches
    plays: HashMap<TrackIdentity, u64>,
}

/// Pipeline orchestrator
pub struct Pipeline {
    run_id: Uuid,
    config: PipelineConfig,
    processor: Arc<TrackProcessor>,
    known: KnownTrackStore,
    state: RwLock<RunState>,
    batch_lock: Mutex<()>,
    event_bus: Option<EventBus>,
}

impl Pipeline {
    /// Create new pipeline with configuration
    pub fn new(config: PipelineConfig, processor: Arc<TrackProcessor>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            processor,
            known: KnownTrackStore::new(),
            state: RwLock::new(RunState::default()),
            batch_lock: Mutex::new(()),
            event_bus: None,
        }
    }

    /// Create pipeline with event bus for progress reporting
    pub fn with_events(
        config: PipelineConfig,
        processor: Arc<TrackProcessor>,
        event_bus: EventBus,
    ) -> Self {
        let mut pipeline = Self::new(config, processor);
        pipeline.event_bus = Some(event_bus);
        pipeline
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one ordered batch of tracks
    ///
    /// # Returns
    /// * Batch report including the rebuilt word table. Per-track failures are
    ///   part of the report, never an `Err`.
    pub async fn process_batch(&self, tracks: Vec<Track>) -> Result<BatchReport, VocabError> {
        let _batch_guard = self.batch_lock.lock().await;
        let batch_id = Uuid::new_v4();
        let start_time = Instant::now();
        let track_count = tracks.len();

        // Collapse repeated plays, keeping first-seen order
        let mut distinct: Vec<Track> = Vec::new();
        let mut batch_plays: HashMap<TrackIdentity, u64> = HashMap::new();
        for track in tracks {
            let plays = batch_plays.entry(track.identity.clone()).or_insert(0);
            if *plays == 0 {
                distinct.push(track);
            }
            *plays += 1;
        }

        info!(
            %batch_id,
            track_count,
            distinct_tracks = distinct.len(),
            "Batch started"
        );
        self.emit(WordnabEvent::BatchStarted {
            run_id: self.run_id,
            batch_id,
            track_count,
            distinct_tracks: distinct.len(),
            timestamp: Utc::now(),
        });

        let identities: HashSet<TrackIdentity> =
            distinct.iter().map(|t| t.identity.clone()).collect();
        let known = self.known.snapshot().await;
        let partition = filter_new(&identities, &known);

        let mut report = BatchReport::new(self.run_id, batch_id, track_count);
        let mut to_process = Vec::new();
        for track in distinct {
            if partition.already_known.contains(&track.identity) {
                debug!(track = %track.identity, "Vocabulary already captured, reusing");
                self.emit(WordnabEvent::TrackReused {
                    batch_id,
                    identity: track.identity.to_string(),
                    timestamp: Utc::now(),
                });
                report.reused.push(track.identity);
            } else {
                to_process.push(track);
            }
        }

        let processor = &self.processor;
        let results: Vec<(Track, Result<Option<ProcessedTrackRecord>, VocabError>)> =
            stream::iter(to_process)
                .map(|track| async move {
                    let result = processor.process(&track).await;
                    (track, result)
                })
                .buffered(self.config.concurrency.max(1))
                .collect()
                .await;

        let mut new_records = Vec::new();
        for (track, result) in results {
            let identity = track.identity;
            match result {
                Ok(Some(record)) => {
                    if record.words.is_empty() {
                        report.addition_requests.push(identity.clone());
                    }
                    self.emit(WordnabEvent::TrackProcessed {
                        batch_id,
                        identity: identity.to_string(),
                        language: record.language.clone(),
                        confidence: record.confidence,
                        word_count: record.words.len(),
                        timestamp: Utc::now(),
                    });
                    report.processed.push(identity);
                    new_records.push(record);
                }
                Ok(None) => {
                    self.emit(WordnabEvent::TrackSkipped {
                        batch_id,
                        identity: identity.to_string(),
                        timestamp: Utc::now(),
                    });
                    report.addition_requests.push(identity.clone());
                    report.skipped.push(identity);
                }
                Err(err) => {
                    warn!(track = %identity, error = %err, "Track processing failed");
                    self.emit(WordnabEvent::TrackFailed {
                        batch_id,
                        identity: identity.to_string(),
                        message: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    report.failures.push(TrackFailure::new(identity, &err));
                }
            }
        }

        // Single writer: records and known identities change only here
        {
            let mut state = self.state.write().await;
            for (identity, plays) in batch_plays {
                *state.plays.entry(identity).or_insert(0) += plays;
            }
            for record in &new_records {
                let position = state.records.len();
                state.index.insert(record.identity().clone(), position);
                state.records.push(record.clone());
            }
        }
        self.known
            .commit(new_records.into_iter().map(|r| r.track.identity))
            .await;

        let (words, contributing) = self.table_with_contributors(self.config.cap).await?;
        report.words = words;
        report.contributing = contributing;

        info!(
            %batch_id,
            processed = report.processed.len(),
            reused = report.reused.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            table_size = report.words.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Batch complete"
        );
        self.emit(WordnabEvent::BatchCompleted {
            batch_id,
            processed: report.processed.len(),
            reused: report.reused.len(),
            skipped: report.skipped.len(),
            failed: report.failures.len(),
            table_size: report.words.len(),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    /// Fetch recently played tracks and process them as one batch
    pub async fn ingest_recent(
        &self,
        history: &dyn HistoryProvider,
        limit: usize,
    ) -> Result<BatchReport, VocabError> {
        if limit == 0 {
            return Err(VocabError::InvalidInput("limit must be at least 1".to_string()));
        }
        let tracks = history.recently_played(limit).await?;
        info!(limit, fetched = tracks.len(), "Fetched listening history");
        self.process_batch(tracks).await
    }

    /// Current word table, capped at `cap`
    pub async fn table(&self, cap: usize) -> Result<Vec<AggregatedWord>, VocabError> {
        Ok(self.table_with_contributors(cap).await?.0)
    }

    /// All records of the run in first-seen order
    pub async fn records(&self) -> Vec<ProcessedTrackRecord> {
        self.state.read().await.records.clone()
    }

    pub async fn record(&self, identity: &TrackIdentity) -> Option<ProcessedTrackRecord> {
        let state = self.state.read().await;
        state
            .index
            .get(identity)
            .and_then(|&pos| state.records.get(pos))
            .cloned()
    }

    /// Plays of `identity` seen across all batches of the run
    pub async fn play_count(&self, identity: &TrackIdentity) -> u64 {
        self.state.read().await.plays.get(identity).copied().unwrap_or(0)
    }

    /// Generate context for `word` within a processed track's lyrics
    ///
    /// # Errors
    /// `NotFound` when the track has no record in this run
    pub async fn request_context(
        &self,
        identity: &TrackIdentity,
        word: &str,
    ) -> Result<ContextLookup, VocabError> {
        let record = self.record(identity).await.ok_or_else(|| {
            VocabError::NotFound(format!("no processed record for track {}", identity))
        })?;
        self.processor.request_context(&record, word).await
    }

    /// Word table capped at `cap`, plus the identities contributing to it
    pub async fn table_with_contributors(
        &self,
        cap: usize,
    ) -> Result<(Vec<AggregatedWord>, Vec<TrackIdentity>), VocabError> {
        let state = self.state.read().await;
        let weight_by_plays = self.config.weight_by_plays;

        let entries = state.records.iter().flat_map(|record| {
            let weight = if weight_by_plays {
                state.plays.get(record.identity()).copied().unwrap_or(1).max(1)
            } else {
                1
            };
            record.words.iter().map(move |entry| (entry, weight))
        });
        let words = merge_weighted(entries, cap, self.config.min_total_count)?;

        let in_table: HashSet<&str> = words.iter().map(|w| w.word.as_str()).collect();
        let contributing = state
            .records
            .iter()
            .filter(|r| r.words.iter().any(|e| in_table.contains(e.word.as_str())))
            .map(|r| r.identity().clone())
            .collect();

        Ok((words, contributing))
    }

    fn emit(&self, event: WordnabEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }
}
