//! HTTP API handlers for wordnab-ingest

pub mod health;
pub mod sse;
pub mod vocabulary;

pub use health::health_routes;
pub use sse::event_stream;
pub use vocabulary::vocabulary_routes;
