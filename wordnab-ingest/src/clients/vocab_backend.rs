//! WordNab backend client
//!
//! One HTTP service provides word matching, language detection and the
//! context job queue:
//! - `POST /api/match-words` `{"lyrics"}` -> `[{word, translation?, count?} | "word"]`
//! - `POST /api/detect-language` `{"text"}` -> `{language, confidence}`
//! - `POST /api/generate-context` `{"lyric"}` -> 202 `{task_id}`
//! - `GET /api/get-context-result/{task_id}` -> `{status, context?, error?}`
//!
//! The job status endpoint answers `failed` with HTTP 500, so its body is
//! parsed regardless of the status code.

use crate::services::job_poller::parse_status;
use crate::types::{
    ContextJobBackend, ExtractedWord, JobHandle, JobStatus, LanguageDetection, LanguageDetector,
    VocabError, WordMatcher,
};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Item of the match-words response
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordItem {
    Bare(String),
    Full(ExtractedWord),
}

impl From<WordItem> for ExtractedWord {
    fn from(item: WordItem) -> Self {
        match item {
            WordItem::Bare(word) => ExtractedWord {
                word,
                translation: None,
                count: 1,
            },
            WordItem::Full(word) => word,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    language: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the WordNab backend service
pub struct VocabBackendClient {
    client: Client,
    base_url: String,
}

impl VocabBackendClient {
    pub fn new(base_url: &str) -> Result<Self, VocabError> {
        let client = Client::builder()
            .user_agent(super::USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into `Transport`, keeping the backend's message
    async fn check(response: Response, endpoint: &str) -> Result<Response, VocabError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| "no error message".to_string());
        Err(VocabError::Transport(format!(
            "{} returned HTTP {}: {}",
            endpoint, status, message
        )))
    }
}

#[async_trait::async_trait]
impl WordMatcher for VocabBackendClient {
    async fn extract_words(&self, text: &str) -> Result<Vec<ExtractedWord>, VocabError> {
        let response = self
            .client
            .post(self.url("/api/match-words"))
            .json(&json!({ "lyrics": text }))
            .send()
            .await?;
        let response = Self::check(response, "match-words").await?;

        let items: Vec<WordItem> = response
            .json()
            .await
            .map_err(|e| VocabError::Transport(format!("malformed match-words response: {}", e)))?;

        tracing::debug!(words = items.len(), "Matched vocabulary words");
        Ok(items.into_iter().map(ExtractedWord::from).collect())
    }
}

#[async_trait::async_trait]
impl LanguageDetector for VocabBackendClient {
    async fn detect_language(&self, text: &str) -> Result<LanguageDetection, VocabError> {
        let response = self
            .client
            .post(self.url("/api/detect-language"))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let response = Self::check(response, "detect-language").await?;

        let body: DetectResponse = response.json().await.map_err(|e| {
            VocabError::Transport(format!("malformed detect-language response: {}", e))
        })?;
        Ok(LanguageDetection::new(body.language, body.confidence))
    }
}

#[async_trait::async_trait]
impl ContextJobBackend for VocabBackendClient {
    async fn submit_context_job(&self, source_line: &str) -> Result<JobHandle, VocabError> {
        let response = self
            .client
            .post(self.url("/api/generate-context"))
            .json(&json!({ "lyric": source_line }))
            .send()
            .await?;
        let response = Self::check(response, "generate-context").await?;

        let body: SubmitResponse = response.json().await.map_err(|e| {
            VocabError::Transport(format!("malformed generate-context response: {}", e))
        })?;
        if body.task_id.trim().is_empty() {
            return Err(VocabError::Transport(
                "generate-context returned an empty task id".to_string(),
            ));
        }
        Ok(JobHandle(body.task_id))
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, VocabError> {
        let response = self
            .client
            .get(self.url(&format!("/api/get-context-result/{}", handle)))
            .send()
            .await?;
        let http_status = response.status();

        let body: StatusResponse = response.json().await.map_err(|e| {
            VocabError::Transport(format!(
                "get-context-result returned HTTP {} without a status body: {}",
                http_status, e
            ))
        })?;
        parse_status(&body.status, body.context, body.error)
    }
}
