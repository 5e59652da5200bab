//! lyrics.ovh client
//!
//! `GET {base}/v1/{artist}/{title}` returning `{"lyrics": "..."}`.
//! A 404, a missing field or blank lyrics all mean "not found".

use crate::types::{LyricText, LyricsSource, VocabError};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 15;
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    #[serde(default)]
    lyrics: Option<String>,
}

/// Lyrics lookup against lyrics.ovh
pub struct LyricsOvhClient {
    client: Client,
    base_url: Url,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl LyricsOvhClient {
    /// # Arguments
    /// * `base_url` - Service root, e.g. `https://api.lyrics.ovh`
    /// * `requests_per_second` - Lookup budget (values below 1 are raised to 1)
    pub fn new(base_url: &str, requests_per_second: u32) -> Result<Self, VocabError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            VocabError::InvalidInput(format!("invalid lyrics base URL '{}': {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(VocabError::InvalidInput(format!(
                "lyrics base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .user_agent(super::USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            base_url,
            rate_limiter,
        })
    }

    fn lyrics_url(&self, artist: &str, title: &str) -> Result<Url, VocabError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| VocabError::InvalidInput("lyrics base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("v1")
            .push(artist)
            .push(title);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl LyricsSource for LyricsOvhClient {
    async fn fetch_lyrics(&self, artist: &str, title: &str) -> Result<LyricText, VocabError> {
        if artist.trim().is_empty() || title.trim().is_empty() {
            return Err(VocabError::NotFound(format!(
                "lyrics lookup needs artist and title (artist='{}', title='{}')",
                artist, title
            )));
        }

        self.rate_limiter.until_ready().await;

        let url = self.lyrics_url(artist, title)?;
        tracing::debug!(artist, title, "Querying lyrics.ovh");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(VocabError::NotFound(format!("no lyrics for '{}' by {}", title, artist)));
        }
        if !status.is_success() {
            return Err(VocabError::Transport(format!(
                "lyrics.ovh returned HTTP {} for '{}' by {}",
                status, title, artist
            )));
        }

        let body: LyricsResponse = response
            .json()
            .await
            .map_err(|e| VocabError::Transport(format!("malformed lyrics response: {}", e)))?;

        match body.lyrics {
            Some(text) if !text.trim().is_empty() => Ok(LyricText::new(text)),
            _ => Err(VocabError::NotFound(format!("no lyrics for '{}' by {}", title, artist))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_segments_are_escaped() {
        let client = LyricsOvhClient::new("https://api.lyrics.ovh/", 5).unwrap();

        let url = client.lyrics_url("AC/DC", "Highway to Hell").unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.lyrics.ovh/v1/AC%2FDC/Highway%20to%20Hell"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            LyricsOvhClient::new("not a url", 5),
            Err(VocabError::InvalidInput(_))
        ));
        assert!(matches!(
            LyricsOvhClient::new("mailto:lyrics@example.com", 5),
            Err(VocabError::InvalidInput(_))
        ));
    }
}
