//! Track Deduplication
//!
//! Classifies track identities against the set already captured in this run.
//! Known tracks are not re-extracted; their existing records are reused.

use crate::types::TrackIdentity;
use std::collections::HashSet;

/// Classification of one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupResult {
    /// Not captured yet - process
    New(TrackIdentity),
    /// Vocabulary already captured - reuse existing record
    AlreadyKnown(TrackIdentity),
}

/// Disjoint, exhaustive split of a set of identities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub new: HashSet<TrackIdentity>,
    pub already_known: HashSet<TrackIdentity>,
}

/// Classify a single identity
pub fn classify(identity: &TrackIdentity, known: &HashSet<TrackIdentity>) -> DedupResult {
    if known.contains(identity) {
        DedupResult::AlreadyKnown(identity.clone())
    } else {
        DedupResult::New(identity.clone())
    }
}

/// Split `identities` into new and already-known by set membership
pub fn filter_new(
    identities: &HashSet<TrackIdentity>,
    known: &HashSet<TrackIdentity>,
) -> Partition {
    let mut partition = Partition::default();
    for identity in identities {
        match classify(identity, known) {
            DedupResult::New(id) => {
                partition.new.insert(id);
            }
            DedupResult::AlreadyKnown(id) => {
                partition.already_known.insert(id);
            }
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn isrc(code: &str) -> TrackIdentity {
        TrackIdentity::Isrc(code.to_string())
    }

    #[test]
    fn test_classify() {
        let known: HashSet<_> = [isrc("A")].into_iter().collect();

        assert_eq!(classify(&isrc("A"), &known), DedupResult::AlreadyKnown(isrc("A")));
        assert_eq!(classify(&isrc("B"), &known), DedupResult::New(isrc("B")));
    }

    #[test]
    fn test_empty_known_set_makes_everything_new() {
        let ids: HashSet<_> = [isrc("A"), isrc("B")].into_iter().collect();

        let partition = filter_new(&ids, &HashSet::new());

        assert_eq!(partition.new, ids);
        assert!(partition.already_known.is_empty());
    }

    #[test]
    fn test_random_partitions_are_disjoint_and_exhaustive() {
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let ids: HashSet<TrackIdentity> = (0..rng.gen_range(0..40))
                .map(|_| isrc(&format!("ID{}", rng.gen_range(0..60))))
                .collect();
            let known: HashSet<TrackIdentity> = (0..rng.gen_range(0..40))
                .map(|_| isrc(&format!("ID{}", rng.gen_range(0..60))))
                .collect();

            let partition = filter_new(&ids, &known);

            assert!(partition.new.is_disjoint(&partition.already_known));
            let union: HashSet<_> = partition
                .new
                .union(&partition.already_known)
                .cloned()
                .collect();
            assert_eq!(union, ids);
            assert!(partition.already_known.is_subset(&known));
            assert!(partition.new.is_disjoint(&known));
        }
    }
}
