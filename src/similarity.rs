//! Similarity Engine - precedent lookup over the record pool
//!
//! Given a target record and a candidate pool, returns a ranked list of
//! structurally/textually similar records with a score and the reasons that
//! contributed, for explainability. Weighted scoring:
//!
//! - same source kind: +0.4
//! - description similarity ratio (normalized, symmetric, 0-1): x0.3
//! - same error code: +0.2
//! - same severity tier: +0.1
//! - shared domain keyword bonus: +0.05 each, capped at +0.2
//!
//! A match qualifies at a total score >= 0.3. Read-only; the target itself
//! is excluded by identity (record/source id), not value equality — two
//! textually identical but distinct records are not "the same record".
//!
//! Linear scan, O(pool x description length) per call — fine for pools of a
//! few thousand. Past ~10^4 records this needs an index (e.g. an inverted
//! keyword index or ANN over description embeddings); not solved here.

use crate::config::SimilarityConfig;
use crate::types::Record;
use serde::Serialize;

/// Domain keyword vocabulary for the shared-keyword bonus
const DOMAIN_KEYWORDS: &[&str] = &[
    "collision",
    "torque",
    "vibration",
    "temperature",
    "servo",
    "battery",
    "fence",
    "overtravel",
    "singularity",
    "joint",
    "motor",
    "axis",
    "sensor",
    "network",
    "calibrate",
    "belt",
    "wiring",
    "lubricate",
    "replace",
    "check",
    "inspect",
];

/// Why a candidate matched, for explainability
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchReason {
    SameKind,
    SimilarDescription(f64),
    SameErrorCode,
    SameSeverity,
    SharedKeywords(Vec<String>),
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchReason::SameKind => write!(f, "same_type"),
            MatchReason::SimilarDescription(ratio) => {
                write!(f, "similar_description({ratio:.2})")
            }
            MatchReason::SameErrorCode => write!(f, "same_error_code"),
            MatchReason::SameSeverity => write!(f, "same_severity"),
            MatchReason::SharedKeywords(keywords) => {
                write!(f, "common_keywords: {}", keywords.join(", "))
            }
        }
    }
}

/// One ranked similarity match
#[derive(Debug, Clone)]
pub struct SimilarMatch<'a> {
    pub record: &'a Record,
    /// Total weighted score (can slightly exceed 1.0 with the keyword bonus)
    pub score: f64,
    pub reasons: Vec<MatchReason>,
}

/// Precedent search over a record pool
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    /// Find records similar to `target` within `pool`, ranked by descending
    /// score (stable — ties keep pool order), truncated to `limit` (the
    /// configured default when `None`). An empty result is a valid outcome,
    /// not an error.
    pub fn find_similar<'a>(
        &self,
        target: &Record,
        pool: &'a [Record],
        limit: Option<usize>,
    ) -> Vec<SimilarMatch<'a>> {
        let limit = limit.unwrap_or(self.config.default_limit);
        let target_desc = target.description.to_lowercase();
        let target_keywords = extract_keywords(&target_desc);

        let mut matches: Vec<SimilarMatch<'a>> = pool
            .iter()
            .filter(|candidate| !candidate.same_identity(target))
            .filter_map(|candidate| {
                let (score, reasons) = self.score_pair(target, &target_desc, &target_keywords, candidate);
                (score >= self.config.threshold).then_some(SimilarMatch {
                    record: candidate,
                    score: round3(score),
                    reasons,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        matches
    }

    fn score_pair(
        &self,
        target: &Record,
        target_desc: &str,
        target_keywords: &[&'static str],
        candidate: &Record,
    ) -> (f64, Vec<MatchReason>) {
        let cfg = &self.config;
        let mut score = 0.0;
        let mut reasons = Vec::new();

        if candidate.source_kind == target.source_kind {
            score += cfg.kind_weight;
            reasons.push(MatchReason::SameKind);
        }

        let candidate_desc = candidate.description.to_lowercase();
        if !target_desc.is_empty() && !candidate_desc.is_empty() {
            let ratio = strsim::normalized_levenshtein(target_desc, &candidate_desc);
            score += ratio * cfg.description_weight;
            if ratio > 0.3 {
                reasons.push(MatchReason::SimilarDescription(ratio));
            }
        }

        if let (Some(a), Some(b)) = (target.error_code.as_deref(), candidate.error_code.as_deref())
        {
            if !a.is_empty() && a == b {
                score += cfg.error_code_weight;
                reasons.push(MatchReason::SameErrorCode);
            }
        }

        if candidate.severity == target.severity {
            score += cfg.severity_weight;
            reasons.push(MatchReason::SameSeverity);
        }

        let candidate_keywords = extract_keywords(&candidate_desc);
        let shared: Vec<String> = target_keywords
            .iter()
            .filter(|k| candidate_keywords.contains(k))
            .map(|k| (*k).to_string())
            .collect();
        if !shared.is_empty() {
            score += (shared.len() as f64 * cfg.keyword_bonus).min(cfg.keyword_bonus_cap);
            reasons.push(MatchReason::SharedKeywords(shared));
        }

        (score, reasons)
    }
}

/// Domain keywords present in a lower-cased description, in vocabulary order
fn extract_keywords(text_lower: &str) -> Vec<&'static str> {
    DOMAIN_KEYWORDS
        .iter()
        .filter(|term| text_lower.contains(**term))
        .copied()
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::types::{RawObservation, SourceKind};
    use chrono::NaiveDateTime;

    fn fixed_now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 11, 20)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("valid datetime")
    }

    fn record(kind: SourceKind, description: &str, error_code: Option<&str>) -> Record {
        let raw = RawObservation {
            kind,
            timestamp_raw: Some("2025-11-17 10:00:00".to_string()),
            error_code: error_code.map(str::to_string),
            description: Some(description.to_string()),
            raw_payload: description.to_string(),
            ..Default::default()
        };
        Normalizer::default().normalize_at(&raw, fixed_now())
    }

    #[test]
    fn test_self_exclusion_by_identity() {
        let target = record(SourceKind::ErrorLog, "collision on J3", Some("SRVO-324"));
        let pool = vec![target.clone()];
        let engine = SimilarityEngine::default();
        assert!(engine.find_similar(&target, &pool, None).is_empty());
    }

    #[test]
    fn test_identical_text_distinct_records_are_mutual_top_matches() {
        let a = record(SourceKind::ErrorLog, "collision on J3, 645N", Some("SRVO-324"));
        let b = record(SourceKind::ErrorLog, "collision on J3, 645N", Some("SRVO-324"));
        let pool = vec![a.clone(), b.clone()];
        let engine = SimilarityEngine::default();

        let from_a = engine.find_similar(&a, &pool, None);
        let from_b = engine.find_similar(&b, &pool, None);
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_a[0].record.record_id, b.record_id);
        assert_eq!(from_b[0].record.record_id, a.record_id);
        // Same kind (0.4) + full text ratio (0.3) at minimum
        assert!(from_a[0].score >= 0.7, "score: {}", from_a[0].score);
        assert!(from_b[0].score >= 0.7);
    }

    #[test]
    fn test_below_threshold_is_dropped() {
        let target = record(SourceKind::ErrorLog, "collision on J3", Some("SRVO-324"));
        let unrelated = record(SourceKind::SensorReading, "zzz qqq www", None);
        let pool = vec![unrelated];
        let engine = SimilarityEngine::default();
        assert!(engine.find_similar(&target, &pool, None).is_empty());
    }

    #[test]
    fn test_reasons_are_reported() {
        let target = record(SourceKind::ErrorLog, "torque limit on J2", Some("SRVO-160"));
        let similar = record(SourceKind::ErrorLog, "torque limit on J4", Some("SRVO-160"));
        let pool = vec![similar];
        let engine = SimilarityEngine::default();

        let matches = engine.find_similar(&target, &pool, None);
        assert_eq!(matches.len(), 1);
        let reasons = &matches[0].reasons;
        assert!(reasons.contains(&MatchReason::SameKind));
        assert!(reasons.contains(&MatchReason::SameErrorCode));
        assert!(reasons
            .iter()
            .any(|r| matches!(r, MatchReason::SharedKeywords(k) if k.contains(&"torque".to_string()))));
    }

    #[test]
    fn test_keyword_bonus_capped() {
        // Six shared vocabulary terms would be +0.30 uncapped; cap is +0.20
        let text = "collision torque vibration servo motor sensor";
        let target = record(SourceKind::ErrorLog, text, None);
        let candidate = record(SourceKind::SensorReading, text, None);
        let pool = vec![candidate];
        let engine = SimilarityEngine::default();

        let matches = engine.find_similar(&target, &pool, None);
        assert_eq!(matches.len(), 1);
        // No kind match (0.0) + text ratio 1.0 x 0.3 + severity differs or
        // matches; keyword bonus capped at 0.2. Bound the total accordingly.
        assert!(matches[0].score <= 0.3 + 0.1 + 0.2 + 1e-9);
    }

    #[test]
    fn test_limit_truncation_and_ranking() {
        let target = record(SourceKind::ErrorLog, "collision on J3", Some("SRVO-324"));
        let close = record(SourceKind::ErrorLog, "collision on J3", Some("SRVO-324"));
        let mid = record(SourceKind::ErrorLog, "collision near J1 cell", None);
        let far = record(SourceKind::ErrorLog, "scheduled check", None);
        let pool = vec![far, mid, close.clone()];
        let engine = SimilarityEngine::default();

        let matches = engine.find_similar(&target, &pool, Some(2));
        assert!(matches.len() <= 2);
        assert_eq!(matches[0].record.record_id, close.record_id);
        // Descending scores
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_empty_pool_is_valid() {
        let target = record(SourceKind::ErrorLog, "collision on J3", None);
        let engine = SimilarityEngine::default();
        assert!(engine.find_similar(&target, &[], None).is_empty());
    }
}
