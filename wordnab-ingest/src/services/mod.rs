//! Core services of the vocabulary pipeline

pub mod aggregator;
pub mod deduplicator;
pub mod job_poller;
pub mod known_tracks;
pub mod track_processor;

pub use aggregator::{merge, merge_weighted};
pub use deduplicator::{classify, filter_new, DedupResult, Partition};
pub use job_poller::{parse_status, JobPoller, PollPolicy, IN_PROGRESS_STATUSES};
pub use known_tracks::KnownTrackStore;
pub use track_processor::{ContextLookup, TrackProcessor};
