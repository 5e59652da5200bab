//! Word Frequency Aggregator
//!
//! Merges per-track word entries into one canonical frequency table.
//!
//! **Algorithm:**
//! 1. Group entries by exact (case-sensitive) word string
//! 2. Sum counts; keep the translation of the first entry seen for the word
//! 3. Sort by total count descending, ties broken by first-seen order
//! 4. Truncate to `cap`
//!
//! Pure and deterministic: the same input sequence always yields the same table.

use crate::types::{AggregatedWord, VocabError, WordEntry};
use std::collections::HashMap;

/// Merge word entries into a table of at most `cap` words
///
/// # Errors
/// `InvalidInput` when `cap` is zero
pub fn merge<'a, I>(entries: I, cap: usize) -> Result<Vec<AggregatedWord>, VocabError>
where
    I: IntoIterator<Item = &'a WordEntry>,
{
    merge_weighted(entries.into_iter().map(|e| (e, 1)), cap, 1)
}

/// Merge with a per-entry multiplier and a minimum total
///
/// Each entry's count is multiplied by its weight (play count of the source
/// track when play weighting is on). Words whose total is below
/// `min_total_count` are dropped before truncation.
pub fn merge_weighted<'a, I>(
    entries: I,
    cap: usize,
    min_total_count: u64,
) -> Result<Vec<AggregatedWord>, VocabError>
where
    I: IntoIterator<Item = (&'a WordEntry, u64)>,
{
    if cap == 0 {
        return Err(VocabError::InvalidInput("cap must be at least 1".to_string()));
    }

    // Position in `table` doubles as first-seen order
    let mut table: Vec<AggregatedWord> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for (entry, weight) in entries {
        let amount = u64::from(entry.count).saturating_mul(weight);
        match index.get(entry.word.as_str()) {
            Some(&pos) => {
                table[pos].total_count = table[pos].total_count.saturating_add(amount);
            }
            None => {
                index.insert(entry.word.as_str(), table.len());
                table.push(AggregatedWord {
                    word: entry.word.clone(),
                    translation: entry.translation.clone(),
                    total_count: amount,
                });
            }
        }
    }

    table.retain(|w| w.total_count >= min_total_count);
    // sort_by is stable, so equal totals keep first-seen order
    table.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    table.truncate(cap);

    tracing::debug!(words = table.len(), cap, "Aggregated word table");
    Ok(table)
}
