//! wordnab-ingest library interface
//!
//! Vocabulary ingest: recently played tracks in, lyrics looked up,
//! vocabulary extracted and aggregated into a word-frequency table, with
//! on-demand context generation through a polled job backend.

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use crate::clients::{LyricsOvhClient, VocabBackendClient};
use crate::services::job_poller::{JobPoller, PollPolicy};
use crate::services::track_processor::TrackProcessor;
use crate::types::VocabError;
use crate::workflow::{Pipeline, PipelineConfig};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use wordnab_common::config::TomlConfig;
use wordnab_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline owning every record and the word table of this run
    pub pipeline: Arc<Pipeline>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Listening history provider root, used per request with the caller's token
    pub history_base_url: String,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, event_bus: EventBus, history_base_url: String) -> Self {
        Self {
            pipeline,
            event_bus,
            startup_time: Utc::now(),
            history_base_url,
        }
    }
}

/// Wire the HTTP collaborators from configuration into a pipeline
pub fn build_pipeline(config: &TomlConfig, event_bus: &EventBus) -> Result<Pipeline, VocabError> {
    let lyrics = Arc::new(LyricsOvhClient::new(
        &config.endpoints.lyrics_base_url,
        config.lyrics.requests_per_second,
    )?);
    let backend = Arc::new(VocabBackendClient::new(&config.endpoints.backend_base_url)?);
    let poller = JobPoller::new(PollPolicy::try_from(&config.poller)?);

    let processor = TrackProcessor::new(
        lyrics,
        backend.clone(),
        backend.clone(),
        backend,
        poller,
    )
    .with_events(event_bus.clone());

    Ok(Pipeline::with_events(
        PipelineConfig::from(config),
        Arc::new(processor),
        event_bus.clone(),
    ))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::vocabulary_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
