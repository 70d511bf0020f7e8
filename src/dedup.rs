//! Deduplicator - recurrence annotation over the record pool
//!
//! Groups records by composite key `(joint, calendar-date)` and stamps every
//! member of a group with the group's cardinality as `recurrence_count`.
//! This is *not* true deduplication — no records are dropped. Downstream
//! scoring must see all occurrences to reward chronic recurrence, while the
//! count exposes the clustering signal.
//!
//! Records whose timestamp was inferred from nothing fall into an explicit
//! per-joint `Unknown` date bucket, itself a valid group. That bucket can
//! merge unrelated unparseable-timestamp records of the same joint into one
//! inflated count — preserved behavior, see DESIGN.md.

use crate::types::{Joint, Record};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Date component of the dedup key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateBucket {
    /// Calendar day of a resolvable timestamp
    Day(NaiveDate),
    /// Timestamp could not be parsed; all such records of a joint share
    /// this bucket
    Unknown,
}

impl DateBucket {
    fn for_record(record: &Record) -> Self {
        if record.timestamp_inferred {
            DateBucket::Unknown
        } else {
            DateBucket::Day(record.date())
        }
    }
}

/// Composite recurrence-grouping key
pub type DedupKey = (Joint, DateBucket);

/// Grouping key for one record
pub fn dedup_key(record: &Record) -> DedupKey {
    (record.joint, DateBucket::for_record(record))
}

/// Annotate every record with its (joint, date) group cardinality.
///
/// Members keep insertion order; single-member groups get
/// `recurrence_count = 1`. Group visit order follows first appearance in
/// the input — stability across differently-ordered inputs is not promised.
pub fn annotate_recurrence(records: &mut [Record]) {
    let mut group_sizes: HashMap<DedupKey, u32> = HashMap::new();
    for record in records.iter() {
        *group_sizes.entry(dedup_key(record)).or_insert(0) += 1;
    }

    for record in records.iter_mut() {
        record.recurrence_count = group_sizes
            .get(&dedup_key(record))
            .copied()
            .unwrap_or(1);
    }

    let recurring = group_sizes.values().filter(|size| **size > 1).count();
    debug!(
        records = records.len(),
        groups = group_sizes.len(),
        recurring_groups = recurring,
        "Recurrence annotation complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::types::RawObservation;
    use chrono::NaiveDateTime;

    fn fixed_now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 11, 20)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid datetime")
    }

    fn record_for(description: &str, timestamp: Option<&str>) -> Record {
        let raw = RawObservation {
            timestamp_raw: timestamp.map(str::to_string),
            description: Some(description.to_string()),
            raw_payload: description.to_string(),
            ..Default::default()
        };
        Normalizer::default().normalize_at(&raw, fixed_now())
    }

    #[test]
    fn test_three_records_same_joint_same_day() {
        let mut records = vec![
            record_for("torque spike on J3", Some("2025-11-17 08:00:00")),
            record_for("J3 binding", Some("2025-11-17 12:30:00")),
            record_for("collision warning J3", Some("2025-11-17 23:59:59")),
        ];
        annotate_recurrence(&mut records);
        for record in &records {
            assert_eq!(record.recurrence_count, 3);
        }
    }

    #[test]
    fn test_singletons_get_one() {
        let mut records = vec![
            record_for("J1 fault", Some("2025-11-17 08:00:00")),
            record_for("J2 fault", Some("2025-11-17 08:00:00")),
            record_for("J1 fault", Some("2025-11-18 08:00:00")),
        ];
        annotate_recurrence(&mut records);
        assert!(records.iter().all(|r| r.recurrence_count == 1));
    }

    #[test]
    fn test_group_sizes_sum_to_pool_size() {
        let mut records = vec![
            record_for("J4 overload", Some("2025-11-17 01:00:00")),
            record_for("J4 overload again", Some("2025-11-17 02:00:00")),
            record_for("J5 drift", Some("2025-11-17 03:00:00")),
        ];
        annotate_recurrence(&mut records);

        let mut groups: HashMap<DedupKey, Vec<u32>> = HashMap::new();
        for record in &records {
            groups
                .entry(dedup_key(record))
                .or_default()
                .push(record.recurrence_count);
        }
        for counts in groups.values() {
            // Identical within a group, and equal to the group size
            assert!(counts.iter().all(|c| *c as usize == counts.len()));
        }
    }

    #[test]
    fn test_unknown_bucket_groups_unparseable_timestamps() {
        let mut records = vec![
            record_for("J6 noise", Some("not a timestamp")),
            record_for("J6 hum", Some("also not a timestamp")),
            record_for("J6 rattle", Some("2025-11-17 04:00:00")),
        ];
        annotate_recurrence(&mut records);
        assert_eq!(records[0].recurrence_count, 2);
        assert_eq!(records[1].recurrence_count, 2);
        assert_eq!(records[2].recurrence_count, 1);
    }

    #[test]
    fn test_no_records_dropped_and_order_preserved() {
        let mut records = vec![
            record_for("J2 alpha", Some("2025-11-17 01:00:00")),
            record_for("J3 beta", Some("2025-11-17 01:00:00")),
            record_for("J2 gamma", Some("2025-11-17 02:00:00")),
        ];
        let ids: Vec<String> = records.iter().map(|r| r.record_id.clone()).collect();
        annotate_recurrence(&mut records);
        let after: Vec<String> = records.iter().map(|r| r.record_id.clone()).collect();
        assert_eq!(ids, after);
    }
}
