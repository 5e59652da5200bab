//! HTTP adapters for the external collaborators

pub mod lyrics_ovh;
pub mod spotify_history;
pub mod vocab_backend;

pub use lyrics_ovh::LyricsOvhClient;
pub use spotify_history::SpotifyHistoryClient;
pub use vocab_backend::VocabBackendClient;

/// User-Agent sent on every outbound request
pub const USER_AGENT: &str = concat!("WordNab/", env!("CARGO_PKG_VERSION"));
