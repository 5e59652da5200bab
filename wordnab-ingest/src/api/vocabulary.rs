//! Vocabulary pipeline endpoints
//!
//! - `POST /api/batches` - run an ordered batch of tracks
//! - `POST /api/history/recent` - fetch recently played tracks and run them
//! - `GET /api/words?cap=N` - aggregated word table
//! - `GET /api/tracks` - processed track records, first-seen order
//! - `POST /api/context` - on-demand context for one word of one track

use crate::clients::spotify_history::{SpotifyHistoryClient, MAX_LIMIT};
use crate::error::{ApiError, ApiResult};
use crate::services::track_processor::ContextLookup;
use crate::types::{AggregatedWord, ProcessedTrackRecord, Track, TrackIdentity};
use crate::workflow::BatchReport;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// One track as supplied by a client
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInput {
    #[serde(default)]
    pub isrc: Option<String>,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub played_at: Option<DateTime<Utc>>,
}

/// POST /api/batches request
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub tracks: Vec<TrackInput>,
}

/// POST /api/history/recent request
#[derive(Debug, Deserialize)]
pub struct RecentHistoryRequest {
    pub access_token: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/words query
#[derive(Debug, Deserialize)]
pub struct WordsQuery {
    pub cap: Option<usize>,
}

/// GET /api/words response
#[derive(Debug, Serialize)]
pub struct WordsResponse {
    pub run_id: Uuid,
    pub words: Vec<AggregatedWord>,
    /// Tracks contributing at least one word to `words`
    pub contributing: Vec<TrackIdentity>,
}

/// POST /api/context request
#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    /// Track identity string (`isrc:...` or `track:title|artist`)
    pub identity: String,
    pub word: String,
}

/// POST /api/context response
#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub identity: TrackIdentity,
    pub word: String,
    #[serde(flatten)]
    pub lookup: ContextLookup,
}

fn to_tracks(inputs: Vec<TrackInput>) -> ApiResult<Vec<Track>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            if input.title.trim().is_empty() {
                return Err(ApiError::BadRequest(format!("track {} has a blank title", i)));
            }
            Ok(Track::new(
                input.isrc.as_deref(),
                input.title,
                input.artists,
                input.played_at,
            ))
        })
        .collect()
}

/// POST /api/batches
pub async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchReport>> {
    let tracks = to_tracks(request.tracks)?;
    info!("Batch submitted with {} tracks", tracks.len());

    let report = state.pipeline.process_batch(tracks).await?;
    Ok(Json(report))
}

/// POST /api/history/recent
pub async fn ingest_recent(
    State(state): State<AppState>,
    Json(request): Json<RecentHistoryRequest>,
) -> ApiResult<Json<BatchReport>> {
    let limit = request.limit.unwrap_or(MAX_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let history = SpotifyHistoryClient::new(&state.history_base_url, request.access_token)?;
    let report = state.pipeline.ingest_recent(&history, limit).await?;
    Ok(Json(report))
}

/// GET /api/words
pub async fn get_words(
    State(state): State<AppState>,
    Query(query): Query<WordsQuery>,
) -> ApiResult<Json<WordsResponse>> {
    let cap = query.cap.unwrap_or(state.pipeline.config().cap);
    let (words, contributing) = state.pipeline.table_with_contributors(cap).await?;

    Ok(Json(WordsResponse {
        run_id: state.pipeline.run_id(),
        words,
        contributing,
    }))
}

/// GET /api/tracks
pub async fn get_tracks(State(state): State<AppState>) -> Json<Vec<ProcessedTrackRecord>> {
    Json(state.pipeline.records().await)
}

/// POST /api/context
pub async fn request_context(
    State(state): State<AppState>,
    Json(request): Json<ContextRequest>,
) -> ApiResult<Json<ContextResponse>> {
    let identity: TrackIdentity = request.identity.parse()?;
    let lookup = state
        .pipeline
        .request_context(&identity, &request.word)
        .await?;

    Ok(Json(ContextResponse {
        identity,
        word: request.word,
        lookup,
    }))
}

/// Build vocabulary routes
pub fn vocabulary_routes() -> Router<AppState> {
    Router::new()
        .route("/api/batches", post(run_batch))
        .route("/api/history/recent", post(ingest_recent))
        .route("/api/words", get(get_words))
        .route("/api/tracks", get(get_tracks))
        .route("/api/context", post(request_context))
}
