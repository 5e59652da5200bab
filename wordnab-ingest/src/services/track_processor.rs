//! Per-track vocabulary extraction
//!
//! **Algorithm:**
//! 1. Fetch lyrics (primary artist, title); not found or blank means skip
//! 2. Detect language of the lyrics
//! 3. Extract vocabulary words
//!
//! Steps run strictly in order. Context generation for a single word is a
//! separate, on-demand operation backed by [`JobPoller`].

use crate::services::job_poller::JobPoller;
use crate::types::{
    ContextJobBackend, ContextPayload, JobHandle, LanguageDetector, LyricsSource,
    ProcessedTrackRecord, Track, VocabError, WordEntry, WordMatcher,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use wordnab_common::events::{EventBus, WordnabEvent};

/// Outcome of an on-demand context request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ContextLookup {
    /// A lyric line contained the word and its context was generated
    Resolved {
        line: String,
        context: ContextPayload,
    },
    /// No lyric line contains the word; nothing was submitted
    LineNotFound,
}

/// Orchestrates the collaborators for one track at a time
pub struct TrackProcessor {
    lyrics: Arc<dyn LyricsSource>,
    detector: Arc<dyn LanguageDetector>,
    matcher: Arc<dyn WordMatcher>,
    context_backend: Arc<dyn ContextJobBackend>,
    poller: JobPoller,
    event_bus: Option<EventBus>,
}

impl TrackProcessor {
    pub fn new(
        lyrics: Arc<dyn LyricsSource>,
        detector: Arc<dyn LanguageDetector>,
        matcher: Arc<dyn WordMatcher>,
        context_backend: Arc<dyn ContextJobBackend>,
        poller: JobPoller,
    ) -> Self {
        Self {
            lyrics,
            detector,
            matcher,
            context_backend,
            poller,
            event_bus: None,
        }
    }

    /// Emit context job events on `event_bus`
    pub fn with_events(mut self, event_bus: EventBus) -> Self {
        self.poller = self.poller.with_events(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    /// Extract vocabulary for one track
    ///
    /// Returns `Ok(None)` when the lyrics source has nothing for the track.
    ///
    /// # Errors
    /// `Transport` (or any other collaborator error except `NotFound` from the
    /// lyrics source) is propagated unchanged.
    pub async fn process(&self, track: &Track) -> Result<Option<ProcessedTrackRecord>, VocabError> {
        let start_time = Instant::now();
        let identity = &track.identity;

        let lyrics = match self
            .lyrics
            .fetch_lyrics(track.primary_artist(), &track.title)
            .await
        {
            Ok(lyrics) if lyrics.is_blank() => {
                debug!(track = %identity, "Lyrics blank, skipping track");
                return Ok(None);
            }
            Ok(lyrics) => lyrics,
            Err(VocabError::NotFound(_)) => {
                debug!(track = %identity, "Lyrics not found, skipping track");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let detection = self.detector.detect_language(lyrics.as_str()).await?;
        let extracted = self.matcher.extract_words(lyrics.as_str()).await?;

        let words: Vec<WordEntry> = extracted
            .into_iter()
            .filter(|w| !w.word.trim().is_empty())
            .map(|w| WordEntry {
                word: w.word,
                translation: w.translation,
                source: identity.clone(),
                count: w.count,
            })
            .collect();

        info!(
            track = %identity,
            language = %detection.language,
            confidence = detection.confidence,
            words = words.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Extracted vocabulary"
        );

        Ok(Some(ProcessedTrackRecord {
            track: track.clone(),
            lyrics,
            words,
            language: detection.language,
            confidence: detection.confidence,
            processed_at: Utc::now(),
        }))
    }

    /// Generate context for `word` from the first lyric line containing it
    ///
    /// The line lookup is case-insensitive. When no line matches, no job is
    /// submitted.
    ///
    /// # Errors
    /// `InvalidInput` for a blank word; `JobFailed`, `JobTimeout` or
    /// `Transport` from the context job.
    pub async fn request_context(
        &self,
        record: &ProcessedTrackRecord,
        word: &str,
    ) -> Result<ContextLookup, VocabError> {
        if word.trim().is_empty() {
            return Err(VocabError::InvalidInput("word must not be blank".to_string()));
        }

        let Some(line) = record.lyrics.first_line_containing(word) else {
            debug!(track = %record.identity(), word, "No lyric line contains word");
            return Ok(ContextLookup::LineNotFound);
        };
        let line = line.to_string();

        let backend = self.context_backend.as_ref();
        let submit = || async {
            let handle = backend.submit_context_job(&line).await?;
            self.emit_submitted(&handle, record, word);
            Ok::<_, VocabError>(handle)
        };
        let context = self
            .poller
            .await_result(submit, |handle| async move {
                backend.job_status(&handle).await
            })
            .await?;

        Ok(ContextLookup::Resolved { line, context })
    }

    fn emit_submitted(&self, handle: &JobHandle, record: &ProcessedTrackRecord, word: &str) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(WordnabEvent::ContextJobSubmitted {
                task_id: handle.0.clone(),
                identity: record.identity().to_string(),
                word: word.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}
