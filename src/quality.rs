//! Extraction-quality and deduplication metrics
//!
//! Read-only reports over an already-built record pool. The quality score
//! is a weighted field-completion average across five fields; the dedup
//! report summarizes (joint, date) group structure. Neither mutates
//! anything.

use crate::config::QualityConfig;
use crate::dedup::{dedup_key, DateBucket};
use crate::types::Record;
use serde::Serialize;
use std::collections::HashMap;

/// Per-field completion rates (percent of records where the field was
/// genuinely observed rather than defaulted or inferred)
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldCompletion {
    pub timestamp: f64,
    pub joint: f64,
    pub severity: f64,
    pub force_value: f64,
    pub collision_type: f64,
}

/// Extraction-quality report
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub total_records: usize,
    /// Records with all of timestamp, joint, and severity observed
    pub valid_records: usize,
    /// Percent of records counted valid
    pub accuracy: f64,
    pub field_completion: FieldCompletion,
    /// Weighted completion score (timestamp 25%, joint 25%, severity 20%,
    /// force 15%, collision type 15%)
    pub overall_score: f64,
    /// True when the weighted score reaches the extraction target
    pub meets_target: bool,
}

/// Assess extraction quality over a record pool.
///
/// A field counts as complete when it was observed, not inferred:
/// timestamp not inferred-from-nothing, joint known, force present,
/// collision category detected. Severity is total by construction and
/// counts for every record.
pub fn assess_quality(records: &[Record], config: &QualityConfig) -> QualityReport {
    let total = records.len();
    if total == 0 {
        return QualityReport::default();
    }

    let mut timestamp_count = 0usize;
    let mut joint_count = 0usize;
    let mut force_count = 0usize;
    let mut collision_count = 0usize;
    let mut valid_count = 0usize;

    for record in records {
        let has_timestamp = !record.timestamp_inferred;
        let has_joint = record.joint.is_known();
        if has_timestamp {
            timestamp_count += 1;
        }
        if has_joint {
            joint_count += 1;
        }
        if record.force_value.is_some() {
            force_count += 1;
        }
        if record.collision_type.is_detected() {
            collision_count += 1;
        }
        // Severity is always present; validity needs all three key fields
        if has_timestamp && has_joint {
            valid_count += 1;
        }
    }

    let rate = |count: usize| (count as f64 / total as f64) * 100.0;
    let field_completion = FieldCompletion {
        timestamp: round2(rate(timestamp_count)),
        joint: round2(rate(joint_count)),
        severity: 100.0,
        force_value: round2(rate(force_count)),
        collision_type: round2(rate(collision_count)),
    };

    let overall_score = field_completion.timestamp * config.timestamp_weight
        + field_completion.joint * config.joint_weight
        + field_completion.severity * config.severity_weight
        + field_completion.force_value * config.force_weight
        + field_completion.collision_type * config.collision_weight;
    let overall_score = round2(overall_score);

    QualityReport {
        total_records: total,
        valid_records: valid_count,
        accuracy: round2(rate(valid_count)),
        field_completion,
        overall_score,
        meets_target: overall_score >= config.target_score,
    }
}

/// Deduplication statistics over a record pool
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    pub total_records: usize,
    /// Number of distinct (joint, date) groups
    pub unique_groups: usize,
    /// Records beyond the first in their group
    pub duplicates: usize,
    /// Percent of records that are duplicates
    pub duplication_rate: f64,
    /// Group label -> size, for groups with more than one member
    pub recurrence: HashMap<String, usize>,
}

/// Summarize (joint, date) group structure
pub fn dedup_stats(records: &[Record]) -> DedupStats {
    if records.is_empty() {
        return DedupStats::default();
    }

    let mut groups: HashMap<String, usize> = HashMap::new();
    for record in records {
        let (joint, bucket) = dedup_key(record);
        let label = match bucket {
            DateBucket::Day(date) => format!("{joint}_{date}"),
            DateBucket::Unknown => format!("{joint}_unknown"),
        };
        *groups.entry(label).or_insert(0) += 1;
    }

    let total = records.len();
    let unique = groups.len();
    let duplicates = total - unique;
    let recurrence: HashMap<String, usize> = groups
        .into_iter()
        .filter(|(_, size)| *size > 1)
        .collect();

    DedupStats {
        total_records: total,
        unique_groups: unique,
        duplicates,
        duplication_rate: round2((duplicates as f64 / total as f64) * 100.0),
        recurrence,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;
    use crate::normalize::Normalizer;
    use crate::types::RawObservation;
    use chrono::NaiveDateTime;

    fn fixed_now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 11, 20)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid datetime")
    }

    fn record(timestamp: Option<&str>, description: &str) -> Record {
        let raw = RawObservation {
            timestamp_raw: timestamp.map(str::to_string),
            description: Some(description.to_string()),
            raw_payload: description.to_string(),
            ..Default::default()
        };
        Normalizer::default().normalize_at(&raw, fixed_now())
    }

    #[test]
    fn test_empty_pool_report() {
        let report = assess_quality(&[], &QualityConfig::default());
        assert_eq!(report.total_records, 0);
        assert!(!report.meets_target);
        let stats = dedup_stats(&[]);
        assert_eq!(stats.total_records, 0);
    }

    #[test]
    fn test_fully_observed_pool_meets_target() {
        let records = vec![
            record(Some("2025-11-17 10:00:00"), "collision on J3, 645N"),
            record(Some("2025-11-17 11:00:00"), "impact on J2, 400N"),
        ];
        let report = assess_quality(&records, &QualityConfig::default());
        assert_eq!(report.field_completion.timestamp, 100.0);
        assert_eq!(report.field_completion.joint, 100.0);
        assert_eq!(report.field_completion.force_value, 100.0);
        assert_eq!(report.field_completion.collision_type, 100.0);
        assert_eq!(report.overall_score, 100.0);
        assert!(report.meets_target);
        assert_eq!(report.valid_records, 2);
    }

    #[test]
    fn test_sparse_pool_misses_target() {
        let records = vec![
            record(None, "something vague"),
            record(None, "something else"),
        ];
        let report = assess_quality(&records, &QualityConfig::default());
        assert_eq!(report.field_completion.timestamp, 0.0);
        assert_eq!(report.field_completion.joint, 0.0);
        // Only severity (always 100) contributes: 100 * 0.20
        assert_eq!(report.overall_score, 20.0);
        assert!(!report.meets_target);
        assert_eq!(report.valid_records, 0);
    }

    #[test]
    fn test_weighted_score_formula() {
        // One of two records has joint + force + collision; both have
        // timestamps
        let records = vec![
            record(Some("2025-11-17 10:00:00"), "collision on J3, 645N"),
            record(Some("2025-11-17 11:00:00"), "unremarkable note"),
        ];
        let report = assess_quality(&records, &QualityConfig::default());
        // 100*0.25 + 50*0.25 + 100*0.20 + 50*0.15 + 50*0.15 = 72.5
        assert_eq!(report.overall_score, 72.5);
        assert!(!report.meets_target);
    }

    #[test]
    fn test_dedup_stats_counts_groups() {
        let mut records = vec![
            record(Some("2025-11-17 10:00:00"), "fault on J3"),
            record(Some("2025-11-17 12:00:00"), "fault on J3 again"),
            record(Some("2025-11-18 10:00:00"), "fault on J3"),
            record(Some("2025-11-17 10:00:00"), "fault on J5"),
        ];
        crate::dedup::annotate_recurrence(&mut records);
        let stats = dedup_stats(&records);

        assert_eq!(stats.total_records, 4);
        assert_eq!(stats.unique_groups, 3);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.duplication_rate, 25.0);
        assert_eq!(stats.recurrence.len(), 1);
        assert_eq!(stats.recurrence.get("J3_2025-11-17"), Some(&2));
    }
}
