//! Known-track store
//!
//! Identities whose vocabulary has been captured during this run. Read by
//! the deduplicator for classification; written only by the pipeline after a
//! whole batch completes.

use crate::types::TrackIdentity;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct KnownTrackStore {
    inner: Arc<RwLock<HashSet<TrackIdentity>>>,
}

impl KnownTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current set, for classifying one batch
    pub async fn snapshot(&self) -> HashSet<TrackIdentity> {
        self.inner.read().await.clone()
    }

    pub async fn contains(&self, identity: &TrackIdentity) -> bool {
        self.inner.read().await.contains(identity)
    }

    /// Record identities captured by a finished batch
    ///
    /// Returns the number of identities that were not yet known.
    pub async fn commit<I>(&self, identities: I) -> usize
    where
        I: IntoIterator<Item = TrackIdentity>,
    {
        let mut known = self.inner.write().await;
        identities
            .into_iter()
            .filter(|id| known.insert(id.clone()))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
