//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok")
    pub status: String,
    /// Module name ("wordnab-ingest")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Short commit hash the binary was built from
    pub git_hash: String,
    /// Build time (UTC)
    pub built_at: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Current processing run
    pub run_id: Uuid,
    /// Tracks with captured vocabulary in this run
    pub tracks_processed: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "wordnab-ingest".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        built_at: env!("BUILD_TIMESTAMP").to_string(),
        uptime_seconds,
        run_id: state.pipeline.run_id(),
        tracks_processed: state.pipeline.records().await.len(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
