//! Shared test fixtures: in-memory collaborators and a fake HTTP backend

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wordnab_common::events::EventBus;
use wordnab_ingest::services::job_poller::{JobPoller, PollPolicy};
use wordnab_ingest::services::track_processor::TrackProcessor;
use wordnab_ingest::types::{
    ContextJobBackend, ContextPayload, ExtractedWord, JobHandle, JobStatus, LanguageDetection,
    LanguageDetector, LyricText, LyricsSource, Track, VocabError, WordMatcher,
};
use wordnab_ingest::workflow::{Pipeline, PipelineConfig};

// ============================================================================
// In-memory collaborators
// ============================================================================

/// Lyrics keyed by (artist, title); unknown tracks are NotFound
#[derive(Default)]
pub struct FakeLyrics {
    lyrics: HashMap<(String, String), String>,
    failing_titles: HashSet<String>,
    delays: HashMap<String, Duration>,
    pub calls: AtomicUsize,
}

impl FakeLyrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, artist: &str, title: &str, text: &str) -> Self {
        self.lyrics
            .insert((artist.to_string(), title.to_string()), text.to_string());
        self
    }

    /// Lookups for `title` fail with a transport error
    pub fn failing(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    /// Lookups for `title` take `delay` before answering
    pub fn delayed(mut self, title: &str, delay: Duration) -> Self {
        self.delays.insert(title.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LyricsSource for FakeLyrics {
    async fn fetch_lyrics(&self, artist: &str, title: &str) -> Result<LyricText, VocabError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(title) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_titles.contains(title) {
            return Err(VocabError::Transport(format!("lyrics lookup for {} failed", title)));
        }
        self.lyrics
            .get(&(artist.to_string(), title.to_string()))
            .map(|text| LyricText::new(text.clone()))
            .ok_or_else(|| VocabError::NotFound(format!("{} by {}", title, artist)))
    }
}

/// Always answers French with fixed confidence
pub struct FakeDetector;

#[async_trait]
impl LanguageDetector for FakeDetector {
    async fn detect_language(&self, _text: &str) -> Result<LanguageDetection, VocabError> {
        Ok(LanguageDetection::new("fr", 0.93))
    }
}

/// Counts dictionary words in the text, in first-occurrence order
pub struct DictionaryMatcher {
    dictionary: HashMap<String, Option<String>>,
}

impl DictionaryMatcher {
    pub fn new(entries: &[(&str, Option<&str>)]) -> Self {
        Self {
            dictionary: entries
                .iter()
                .map(|(w, t)| (w.to_string(), t.map(str::to_string)))
                .collect(),
        }
    }

    pub fn french() -> Self {
        Self::new(&[
            ("le", Some("the")),
            ("et", Some("and")),
            ("si", Some("if")),
            ("vie", Some("life")),
            ("rose", Some("pink")),
            ("amour", Some("love")),
            ("danse", Some("dance")),
        ])
    }
}

#[async_trait]
impl WordMatcher for DictionaryMatcher {
    async fn extract_words(&self, text: &str) -> Result<Vec<ExtractedWord>, VocabError> {
        let mut words: Vec<ExtractedWord> = Vec::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let Some(translation) = self.dictionary.get(&token) else {
                continue;
            };
            match words.iter_mut().find(|w| w.word == token) {
                Some(existing) => existing.count += 1,
                None => words.push(ExtractedWord {
                    word: token,
                    translation: translation.clone(),
                    count: 1,
                }),
            }
        }
        Ok(words)
    }
}

/// Context backend replaying scripted statuses
#[derive(Default)]
pub struct ScriptedBackend {
    statuses: Mutex<VecDeque<JobStatus>>,
    pub submitted: Mutex<Vec<String>>,
    pub polls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(statuses: Vec<JobStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Default::default()
        }
    }

    pub fn completing_with(context: &str) -> Self {
        Self::new(vec![
            JobStatus::Pending,
            JobStatus::Completed(ContextPayload {
                context: context.to_string(),
            }),
        ])
    }

    pub fn submitted_lines(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextJobBackend for ScriptedBackend {
    async fn submit_context_job(&self, source_line: &str) -> Result<JobHandle, VocabError> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(source_line.to_string());
        Ok(JobHandle(format!("task-{}", submitted.len())))
    }

    async fn job_status(&self, _handle: &JobHandle) -> Result<JobStatus, VocabError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(JobStatus::Pending))
    }
}

// ============================================================================
// Pipeline assembly
// ============================================================================

pub fn track(isrc: Option<&str>, title: &str, artist: &str) -> Track {
    Track::new(isrc, title, vec![artist.to_string()], None)
}

pub fn fast_poller(max_attempts: u32) -> JobPoller {
    JobPoller::new(PollPolicy::new(max_attempts, Duration::from_millis(10)).unwrap())
}

pub fn processor(lyrics: Arc<FakeLyrics>, backend: Arc<ScriptedBackend>) -> TrackProcessor {
    TrackProcessor::new(
        lyrics,
        Arc::new(FakeDetector),
        Arc::new(DictionaryMatcher::french()),
        backend,
        fast_poller(3),
    )
}

pub fn pipeline(
    config: PipelineConfig,
    lyrics: Arc<FakeLyrics>,
    backend: Arc<ScriptedBackend>,
) -> Pipeline {
    Pipeline::new(config, Arc::new(processor(lyrics, backend)))
}

pub fn pipeline_with_events(
    config: PipelineConfig,
    lyrics: Arc<FakeLyrics>,
    backend: Arc<ScriptedBackend>,
    event_bus: EventBus,
) -> Pipeline {
    let processor = processor(lyrics, backend).with_events(event_bus.clone());
    Pipeline::with_events(config, Arc::new(processor), event_bus)
}

/// Two tracks whose lyrics give A {le:3, et:1} and B {le:2, si:1}
pub fn two_track_lyrics() -> FakeLyrics {
    FakeLyrics::new()
        .with("Artist A", "Song A", "Le chat et le chien\nle soir tombe")
        .with("Artist B", "Song B", "Le vent, le froid\nsi tu veux")
}

// ============================================================================
// Fake HTTP backend
// ============================================================================

/// Counters and fixtures behind the fake HTTP backend
#[derive(Default)]
pub struct FakeServerState {
    /// Status checks answered per task id
    pub status_checks: Mutex<HashMap<String, usize>>,
    pub submitted_lyrics: Mutex<Vec<String>>,
    pub last_bearer: Mutex<Option<String>>,
}

#[derive(Deserialize)]
struct LyricsBody {
    lyrics: String,
}

#[derive(Deserialize)]
struct TextBody {
    text: String,
}

#[derive(Deserialize)]
struct LyricBody {
    lyric: String,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn fake_lyrics(Path((artist, title)): Path<(String, String)>) -> impl IntoResponse {
    match (artist.as_str(), title.as_str()) {
        ("Édith Piaf", "La Vie en rose") => (
            StatusCode::OK,
            Json(json!({ "lyrics": "Quand il me prend dans ses bras\nJe vois la vie en rose" })),
        ),
        ("Silent", "Blank") => (StatusCode::OK, Json(json!({ "lyrics": "   " }))),
        ("Broken", "Server") => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "maintenance" })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No lyrics found" })),
        ),
    }
}

async fn fake_match_words(Json(body): Json<LyricsBody>) -> impl IntoResponse {
    if body.lyrics.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Lyrics are required" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!([
            "vie",
            { "word": "rose", "translation": "pink", "count": 2 }
        ])),
    )
}

async fn fake_detect(Json(body): Json<TextBody>) -> Json<Value> {
    let language = if body.text.contains("vie") { "fr" } else { "en" };
    Json(json!({ "language": language, "confidence": 0.87 }))
}

async fn fake_generate(
    State(state): State<Arc<FakeServerState>>,
    Json(body): Json<LyricBody>,
) -> impl IntoResponse {
    let mut submitted = state.submitted_lyrics.lock().unwrap();
    submitted.push(body.lyric.clone());
    // Lines mentioning "fail" get a task that fails; others complete on the 2nd check
    let task_id = if body.lyric.contains("fail") {
        "task-fail".to_string()
    } else {
        format!("task-{}", submitted.len())
    };
    (StatusCode::ACCEPTED, Json(json!({ "task_id": task_id })))
}

async fn fake_result(
    State(state): State<Arc<FakeServerState>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    let checks = {
        let mut counts = state.status_checks.lock().unwrap();
        let count = counts.entry(task_id.clone()).or_insert(0);
        *count += 1;
        *count
    };

    if task_id == "task-fail" {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "failed", "error": "model unavailable" })),
        );
    }
    if task_id == "task-weird" {
        return (StatusCode::OK, Json(json!({ "status": "exploded" })));
    }
    if checks < 2 {
        (StatusCode::ACCEPTED, Json(json!({ "status": "pending" })))
    } else {
        (
            StatusCode::OK,
            Json(json!({ "status": "completed", "context": format!("context for {}", task_id) })),
        )
    }
}

async fn fake_recently_played(
    State(state): State<Arc<FakeServerState>>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> impl IntoResponse {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    *state.last_bearer.lock().unwrap() = bearer.clone();

    if bearer.as_deref() != Some("good-token") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "status": 401, "message": "Invalid access token" } })),
        );
    }

    let items = json!([
        {
            "track": {
                "name": "La Vie en rose",
                "artists": [{ "name": "Édith Piaf" }],
                "external_ids": { "isrc": "FR-Z03-19-00012" }
            },
            "played_at": "2026-10-01T20:15:00.000Z"
        },
        {
            "track": {
                "name": "La Vie en rose",
                "artists": [{ "name": "Édith Piaf" }],
                "external_ids": { "isrc": "FRZ031900012" }
            },
            "played_at": "2026-10-01T20:11:00.000Z"
        },
        {
            "track": {
                "name": "Unknown Song",
                "artists": [{ "name": "Nobody" }]
            },
            "played_at": "2026-10-01T20:05:00.000Z"
        }
    ]);
    let limit = query.limit.unwrap_or(50);
    let items: Vec<Value> = items
        .as_array()
        .map(|a| a.iter().take(limit).cloned().collect())
        .unwrap_or_default();
    (StatusCode::OK, Json(json!({ "items": items })))
}

/// Start the fake backend on an ephemeral port, returning its base URL
///
/// The history provider lives under `{base}/spotify`.
pub async fn spawn_fake_backend() -> (String, Arc<FakeServerState>) {
    let state = Arc::new(FakeServerState::default());
    let app = Router::new()
        .route("/v1/:artist/:title", get(fake_lyrics))
        .route("/spotify/v1/me/player/recently-played", get(fake_recently_played))
        .route("/api/match-words", post(fake_match_words))
        .route("/api/detect-language", post(fake_detect))
        .route("/api/generate-context", post(fake_generate))
        .route("/api/get-context-result/:task_id", get(fake_result))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}
