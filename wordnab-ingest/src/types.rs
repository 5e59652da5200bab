//! Core Types and Collaborator Traits for wordnab-ingest
//!
//! Defines the data model shared by every stage of the vocabulary pipeline
//! and the async traits through which external services are consumed:
//! - **LyricsSource**: `(artist, title) -> lyrics | not found`
//! - **LanguageDetector**: `(text) -> (language, confidence)`
//! - **WordMatcher**: `(text) -> ordered {word, translation?, count}`
//! - **ContextJobBackend**: job submission and job status
//! - **HistoryProvider**: recently played tracks
//!
//! Implementations live in [`crate::clients`]; tests substitute in-memory fakes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Error taxonomy of the vocabulary pipeline
///
/// `NotFound` is absorbed by the track processor (the track is skipped).
/// `JobFailed` and `JobTimeout` are kept apart so callers can offer
/// "try again" for a timeout but not for a backend failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VocabError {
    /// Lyrics (or another looked-up resource) do not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or protocol failure talking to a collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    /// Backend reported the context job as failed
    #[error("Context job {task_id} failed: {reason}")]
    JobFailed { task_id: String, reason: String },

    /// Status checks exhausted before the job reached a terminal state
    #[error("Context job {task_id} timed out after {attempts} status checks")]
    JobTimeout { task_id: String, attempts: u32 },

    /// Caller supplied a parameter outside its valid range
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VocabError {
    /// Short machine-readable kind, used in reports and events
    pub fn kind(&self) -> &'static str {
        match self {
            VocabError::NotFound(_) => "not_found",
            VocabError::Transport(_) => "transport",
            VocabError::JobFailed { .. } => "job_failed",
            VocabError::JobTimeout { .. } => "job_timeout",
            VocabError::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<reqwest::Error> for VocabError {
    fn from(err: reqwest::Error) -> Self {
        VocabError::Transport(err.to_string())
    }
}

// ============================================================================
// Track identity
// ============================================================================

/// Stable identity of a logical track
///
/// ISRC when the provider supplies one, otherwise a normalized
/// title + primary artist composite. Serialized as its display string
/// (`isrc:FRZ031900012`, `track:la vie en rose|edith piaf`). Inside a
/// composite, `%` and `|` are written as `%25` and `%7C` so the single raw
/// `|` always separates title from artist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TrackIdentity {
    /// International Standard Recording Code (upper-case, no hyphens)
    Isrc(String),
    /// Lower-cased, trimmed title and primary artist
    Composite { title: String, artist: String },
}

impl TrackIdentity {
    /// Derive identity deterministically from provider data
    pub fn derive(isrc: Option<&str>, title: &str, primary_artist: &str) -> Self {
        if let Some(code) = isrc.map(normalize_isrc).filter(|c| !c.is_empty()) {
            return TrackIdentity::Isrc(code);
        }
        TrackIdentity::Composite {
            title: title.trim().to_lowercase(),
            artist: primary_artist.trim().to_lowercase(),
        }
    }

    pub fn is_isrc(&self) -> bool {
        matches!(self, TrackIdentity::Isrc(_))
    }
}

fn normalize_isrc(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

impl fmt::Display for TrackIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackIdentity::Isrc(code) => write!(f, "isrc:{}", code),
            TrackIdentity::Composite { title, artist } => {
                write!(f, "track:{}|{}", escape_field(title), escape_field(artist))
            }
        }
    }
}

impl FromStr for TrackIdentity {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(code) = s.strip_prefix("isrc:") {
            let code = normalize_isrc(code);
            if code.is_empty() {
                return Err(VocabError::InvalidInput("empty ISRC identity".to_string()));
            }
            return Ok(TrackIdentity::Isrc(code));
        }
        if let Some(rest) = s.strip_prefix("track:") {
            if let Some((title, artist)) = rest.split_once('|') {
                if !artist.contains('|') {
                    return Ok(TrackIdentity::derive(
                        None,
                        &unescape_field(title),
                        &unescape_field(artist),
                    ));
                }
            }
        }
        Err(VocabError::InvalidInput(format!(
            "track identity must look like 'isrc:<code>' or 'track:<title>|<artist>', got '{}'",
            s
        )))
    }
}

fn escape_field(field: &str) -> String {
    field.replace('%', "%25").replace('|', "%7C")
}

/// Decode `%25` and `%7C` (either case); any other `%` is kept as written
fn unescape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.get(1..3) {
            Some("25") => {
                out.push('%');
                rest = &tail[3..];
            }
            Some(code) if code.eq_ignore_ascii_case("7c") => {
                out.push('|');
                rest = &tail[3..];
            }
            _ => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

impl From<TrackIdentity> for String {
    fn from(identity: TrackIdentity) -> Self {
        identity.to_string()
    }
}

impl TryFrom<String> for TrackIdentity {
    type Error = VocabError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Data model
// ============================================================================

/// One played track as reported by the history provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub identity: TrackIdentity,
    pub title: String,
    /// Credited artists, primary artist first
    pub artists: Vec<String>,
    pub played_at: Option<DateTime<Utc>>,
}

impl Track {
    /// Build a track, deriving its identity from the ISRC or title + primary artist
    pub fn new(
        isrc: Option<&str>,
        title: impl Into<String>,
        artists: Vec<String>,
        played_at: Option<DateTime<Utc>>,
    ) -> Self {
        let title = title.into();
        let primary = artists.first().map(String::as_str).unwrap_or("");
        let identity = TrackIdentity::derive(isrc, &title, primary);
        Self {
            identity,
            title,
            artists,
            played_at,
        }
    }

    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }

    /// All artists joined for display ("A, B")
    pub fn artist_credit(&self) -> String {
        self.artists.join(", ")
    }
}

/// Raw lyric body of one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LyricText(String);

impl LyricText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// First line containing `word`, compared case-insensitively
    ///
    /// Returns the trimmed line. Blank lines never match.
    pub fn first_line_containing(&self, word: &str) -> Option<&str> {
        let needle = word.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.0
            .split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .find(|line| line.to_lowercase().contains(&needle))
    }
}

/// Word reported by the word matcher for one lyric text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedWord {
    pub word: String,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// Vocabulary word found in one track's lyrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub translation: Option<String>,
    pub source: TrackIdentity,
    /// Occurrences within the source track's lyrics
    pub count: u32,
}

/// One row of the cross-track frequency table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedWord {
    pub word: String,
    pub translation: Option<String>,
    pub total_count: u64,
}

/// Result of language detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    /// ISO 639-1 code, e.g. "fr"
    pub language: String,
    /// 0.0-1.0
    pub confidence: f64,
}

impl LanguageDetection {
    /// Create detection result with clamped confidence (0.0-1.0)
    pub fn new(language: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            language: language.into(),
            confidence,
        }
    }
}

/// Everything captured for one track in a run
///
/// Created once per track per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTrackRecord {
    pub track: Track,
    pub lyrics: LyricText,
    /// Words in the order the matcher reported them
    pub words: Vec<WordEntry>,
    pub language: String,
    pub confidence: f64,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedTrackRecord {
    pub fn identity(&self) -> &TrackIdentity {
        &self.track.identity
    }
}

// ============================================================================
// Context jobs
// ============================================================================

/// Opaque task id returned by the context backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated context for one lyric line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPayload {
    pub context: String,
}

/// Status reported by the context backend for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or running
    Pending,
    Completed(ContextPayload),
    Failed { reason: String },
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Lyrics lookup
#[async_trait::async_trait]
pub trait LyricsSource: Send + Sync {
    /// Fetch lyrics for a track
    ///
    /// # Errors
    /// `VocabError::NotFound` when the source has no lyrics for the track,
    /// `VocabError::Transport` when the lookup itself failed.
    async fn fetch_lyrics(&self, artist: &str, title: &str) -> Result<LyricText, VocabError>;
}

/// Language detection
#[async_trait::async_trait]
pub trait LanguageDetector: Send + Sync {
    async fn detect_language(&self, text: &str) -> Result<LanguageDetection, VocabError>;
}

/// Vocabulary word extraction / matching
#[async_trait::async_trait]
pub trait WordMatcher: Send + Sync {
    /// Words of interest in `text`, in the order the matcher reports them
    async fn extract_words(&self, text: &str) -> Result<Vec<ExtractedWord>, VocabError>;
}

/// Context generation job service (pull-based status only)
#[async_trait::async_trait]
pub trait ContextJobBackend: Send + Sync {
    /// Submit a lyric line for context generation
    async fn submit_context_job(&self, source_line: &str) -> Result<JobHandle, VocabError>;

    /// Check status of a submitted job
    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, VocabError>;
}

/// Listening history provider
#[async_trait::async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Recently played tracks, most recent first
    async fn recently_played(&self, limit: usize) -> Result<Vec<Track>, VocabError>;
}

// ============================================================================
// Tests
// ============================================================================
