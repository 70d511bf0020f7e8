//! Oracle response cache
//!
//! Scoring the same record twice must not pay for two oracle round-trips.
//! Responses are cached under a fingerprint of the record's identity and
//! triage-relevant fields; a hit returns a value behaviorally
//! indistinguishable from a fresh call and never crosses fingerprints.
//!
//! Bounded at a fixed capacity with insertion-order (FIFO) eviction — no
//! recency tracking, no consistency guarantee needed beyond the fingerprint
//! match.

use crate::types::{OracleAssessment, Record};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Cached entry: the assessment plus whether a live oracle produced it
#[derive(Debug, Clone)]
pub struct CachedAssessment {
    pub assessment: OracleAssessment,
    pub oracle_available: bool,
}

/// Fingerprint input fields, serialized in stable order
#[derive(Serialize)]
struct FingerprintKey<'a> {
    source_event_id: &'a str,
    description_prefix: &'a str,
    severity: &'a str,
    error_code: &'a str,
    joint: String,
}

/// Compute the cache fingerprint for a record.
///
/// Keyed by source event id, the first 100 chars of the description,
/// severity, error code, and joint — the fields that shape the oracle's
/// triage answer.
pub fn fingerprint(record: &Record) -> String {
    let description = &record.description;
    let prefix_len = description
        .char_indices()
        .nth(100)
        .map_or(description.len(), |(i, _)| i);
    let key = FingerprintKey {
        source_event_id: record.source_event_id.as_deref().unwrap_or_default(),
        description_prefix: &description[..prefix_len],
        severity: record.severity.short_code(),
        error_code: record.error_code.as_deref().unwrap_or_default(),
        joint: record.joint.to_string(),
    };
    let serialized = serde_json::to_string(&key).unwrap_or_default();
    format!("{:x}", md5::compute(serialized.as_bytes()))
}

/// Bounded FIFO cache of oracle assessments
#[derive(Debug)]
pub struct OracleCache {
    capacity: usize,
    entries: HashMap<String, CachedAssessment>,
    insertion_order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl OracleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a fingerprint, updating hit/miss counters
    pub fn get(&mut self, key: &str) -> Option<CachedAssessment> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(entry.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert an entry, evicting the oldest when at capacity
    pub fn insert(&mut self, key: String, entry: CachedAssessment) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, entry);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss counters and occupancy
    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: if total > 0 {
                (self.hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
            size: self.entries.len(),
        }
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::types::RawObservation;

    fn record(event_id: &str, description: &str) -> Record {
        let raw = RawObservation {
            source_event_id: Some(event_id.to_string()),
            timestamp_raw: Some("2025-11-17 10:00:00".to_string()),
            description: Some(description.to_string()),
            raw_payload: description.to_string(),
            ..Default::default()
        };
        Normalizer::default().normalize(&raw)
    }

    fn entry() -> CachedAssessment {
        CachedAssessment {
            assessment: OracleAssessment {
                risk_score: Some(55.0),
                ..Default::default()
            },
            oracle_available: true,
        }
    }

    #[test]
    fn test_fingerprint_stable_and_field_sensitive() {
        let a = record("evt-1", "collision on J3");
        let b = record("evt-1", "collision on J3");
        let c = record("evt-2", "collision on J3");
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let mut cache = OracleCache::new(10);
        let rec = record("evt-1", "collision on J3");
        let key = fingerprint(&rec);

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), entry());
        assert!(cache.get(&key).is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let mut cache = OracleCache::new(2);
        cache.insert("a".to_string(), entry());
        cache.insert("b".to_string(), entry());
        cache.insert("c".to_string(), entry());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none(), "oldest entry should be evicted");
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_never_serves_wrong_fingerprint() {
        let mut cache = OracleCache::new(10);
        let a = record("evt-1", "collision on J3");
        let b = record("evt-2", "temperature drift on J5");
        cache.insert(fingerprint(&a), entry());
        assert!(cache.get(&fingerprint(&b)).is_none());
    }

    #[test]
    fn test_description_prefix_bounds_fingerprint() {
        // Differences past the first 100 chars do not change the key
        let long_a = format!("{}{}", "x".repeat(100), "tail-one");
        let long_b = format!("{}{}", "x".repeat(100), "tail-two");
        let a = record("evt-1", &long_a);
        let b = record("evt-1", &long_b);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }
}
