//! Exact deduplication on a business key
//!
//! A record's key is the tuple of its key-column values. Null and blank
//! components compare equal to each other. The first record with a given key
//! wins and input order is preserved.
//!
//! Lookups go through a bloom filter over the 64-bit key hash first; only
//! bloom positives are confirmed against the exact key set, so hash
//! collisions never cause a false duplicate.

use crate::hash::hash_key;
use ahash::AHashSet;
use bloomfilter::Bloom;
use reviewclean_formats::record::{
    is_null_value, value_to_text, PRODUCT_ID, REVIEW_CONTENT_CLEAN, USER_ID,
};
use reviewclean_formats::{Dataset, Record};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Composite key. `None` marks a null component.
pub type BusinessKey = Vec<Option<String>>;

/// Statistics for deduplication operations
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupStats {
    /// Total number of records seen
    pub total_seen: usize,
    /// Number of duplicates found
    pub duplicates_found: usize,
    /// Number of unique records
    pub unique_count: usize,
    /// Number of bloom filter hits (potential duplicates)
    pub bloom_hits: usize,
    /// Number of bloom filter misses (definitely unique)
    pub bloom_misses: usize,
}

impl DedupStats {
    /// Get the deduplication rate as a percentage
    pub fn dedup_rate(&self) -> f64 {
        if self.total_seen == 0 {
            0.0
        } else {
            (self.duplicates_found as f64 / self.total_seen as f64) * 100.0
        }
    }

    /// Get the bloom filter effectiveness (true negatives)
    pub fn bloom_effectiveness(&self) -> f64 {
        let total_checks = self.bloom_hits + self.bloom_misses;
        if total_checks == 0 {
            0.0
        } else {
            (self.bloom_misses as f64 / total_checks as f64) * 100.0
        }
    }
}

/// Deduplication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Columns forming the business key, in order
    pub key_columns: Vec<String>,
    /// Expected number of distinct keys, used to size the bloom filter
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            key_columns: vec![
                PRODUCT_ID.to_string(),
                USER_ID.to_string(),
                REVIEW_CONTENT_CLEAN.to_string(),
            ],
            capacity: 100_000,
        }
    }
}

/// Extract the business key of `record` over `columns`
pub fn business_key(record: &Record, columns: &[String]) -> BusinessKey {
    columns
        .iter()
        .map(|column| {
            let value = record.get(column);
            if is_null_value(value) {
                None
            } else {
                value.and_then(value_to_text)
            }
        })
        .collect()
}

/// Exact deduplicator with bloom filter optimization
pub struct ExactDeduplicator {
    /// Keys seen so far
    seen_keys: AHashSet<BusinessKey>,
    /// Bloom filter for quick negative lookups
    bloom: Bloom<u64>,
    key_columns: Vec<String>,
    stats: DedupStats,
}

impl ExactDeduplicator {
    /// Create a deduplicator over the configured key columns
    pub fn new(config: &DedupConfig) -> Self {
        Self::with_capacity(config.key_columns.clone(), config.capacity)
    }

    /// Create a deduplicator with the given key and expected key count.
    /// The bloom filter is configured for ~1% false positive rate.
    pub fn with_capacity(key_columns: Vec<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        info!(
            "Creating ExactDeduplicator with capacity {} over key {:?}",
            capacity, key_columns
        );

        Self {
            seen_keys: AHashSet::with_capacity(capacity),
            bloom: Bloom::new_for_fp_rate(capacity, 0.01),
            key_columns,
            stats: DedupStats::default(),
        }
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Check if a record repeats an earlier key. Returns `true` for a duplicate;
    /// a new key is remembered.
    pub fn is_duplicate(&mut self, record: &Record) -> bool {
        let key = business_key(record, &self.key_columns);
        self.is_duplicate_key(key)
    }

    /// Same as [`is_duplicate`](Self::is_duplicate) for a pre-extracted key
    pub fn is_duplicate_key(&mut self, key: BusinessKey) -> bool {
        self.stats.total_seen += 1;
        let hash = hash_key(&key);

        if !self.bloom.check(&hash) {
            // Definitely not seen before
            self.bloom.set(&hash);
            self.seen_keys.insert(key);
            self.stats.bloom_misses += 1;
            self.stats.unique_count += 1;
            return false;
        }

        self.stats.bloom_hits += 1;

        if self.seen_keys.contains(&key) {
            self.stats.duplicates_found += 1;
            true
        } else {
            // False positive from bloom filter
            debug!("Bloom false positive for key hash {:016x}", hash);
            self.seen_keys.insert(key);
            self.stats.unique_count += 1;
            false
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> &DedupStats {
        &self.stats
    }

    /// Get the number of unique keys stored
    pub fn unique_count(&self) -> usize {
        self.seen_keys.len()
    }

    /// Clear all seen keys and reset statistics
    pub fn clear(&mut self) {
        self.seen_keys.clear();
        self.bloom.clear();
        self.stats = DedupStats::default();
    }
}

/// Remove later records whose business key repeats an earlier one.
///
/// Returns a new dataset (input untouched) and the run statistics;
/// `input.len() - output.len() == stats.duplicates_found`.
pub fn deduplicate(dataset: &Dataset, config: &DedupConfig) -> (Dataset, DedupStats) {
    let capacity = config.capacity.max(dataset.len());
    let mut dedup = ExactDeduplicator::with_capacity(config.key_columns.clone(), capacity);

    let kept: Vec<Record> = dataset
        .records()
        .iter()
        .filter(|record| !dedup.is_duplicate(record))
        .cloned()
        .collect();

    let stats = dedup.stats().clone();
    info!(
        "Deduplication: {} in, {} out, {} duplicates removed ({:.2}%)",
        stats.total_seen,
        stats.unique_count,
        stats.duplicates_found,
        stats.dedup_rate()
    );

    (dataset.with_records(kept), stats)
}
