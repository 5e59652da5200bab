//! Spotify recently-played client
//!
//! `GET {base}/v1/me/player/recently-played?limit=N` with a bearer token.
//! Each item carries the track (name, artists, `external_ids.isrc`) and its
//! `played_at` timestamp.

use crate::types::{HistoryProvider, Track, VocabError};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Spotify caps `limit` at 50
pub const MAX_LIMIT: usize = 50;

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct RecentlyPlayed {
    #[serde(default)]
    items: Vec<PlayHistoryItem>,
}

#[derive(Debug, Deserialize)]
struct PlayHistoryItem {
    track: SpotifyTrack,
    #[serde(default)]
    played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    external_ids: ExternalIds,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIds {
    #[serde(default)]
    isrc: Option<String>,
}

impl From<PlayHistoryItem> for Track {
    fn from(item: PlayHistoryItem) -> Self {
        let artists = item.track.artists.into_iter().map(|a| a.name).collect();
        Track::new(
            item.track.external_ids.isrc.as_deref(),
            item.track.name,
            artists,
            item.played_at,
        )
    }
}

/// Listening history for one access token
pub struct SpotifyHistoryClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl SpotifyHistoryClient {
    pub fn new(base_url: &str, access_token: impl Into<String>) -> Result<Self, VocabError> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(VocabError::InvalidInput("access token must not be blank".to_string()));
        }

        let client = Client::builder()
            .user_agent(super::USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }
}

#[async_trait::async_trait]
impl HistoryProvider for SpotifyHistoryClient {
    async fn recently_played(&self, limit: usize) -> Result<Vec<Track>, VocabError> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let url = format!("{}/v1/me/player/recently-played", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(VocabError::InvalidInput(
                    "history provider rejected the access token".to_string(),
                ));
            }
            status => {
                return Err(VocabError::Transport(format!(
                    "recently-played returned HTTP {}",
                    status
                )));
            }
        }

        let body: RecentlyPlayed = response.json().await.map_err(|e| {
            VocabError::Transport(format!("malformed recently-played response: {}", e))
        })?;

        tracing::debug!(tracks = body.items.len(), "Fetched recently played tracks");
        Ok(body.items.into_iter().map(Track::from).collect())
    }
}
