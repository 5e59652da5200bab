//! Error types for wordnab-ingest HTTP layer

use crate::types::VocabError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Context job failed on the backend (422)
    #[error("Context job failed: {0}")]
    JobFailed(String),

    /// Context job did not finish in time (504)
    #[error("Context job timed out: {0}")]
    JobTimeout(String),

    /// A collaborator could not be reached or answered garbage (502)
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<VocabError> for ApiError {
    fn from(err: VocabError) -> Self {
        let message = err.to_string();
        match err {
            VocabError::NotFound(_) => ApiError::NotFound(message),
            VocabError::InvalidInput(_) => ApiError::BadRequest(message),
            VocabError::JobFailed { .. } => ApiError::JobFailed(message),
            VocabError::JobTimeout { .. } => ApiError::JobTimeout(message),
            VocabError::Transport(_) => ApiError::Upstream(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::JobFailed(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "JOB_FAILED", msg),
            ApiError::JobTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "JOB_TIMEOUT", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
