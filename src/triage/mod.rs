//! Triage Scorer - oracle-advised, deterministically-bounded urgency scoring
//!
//! Combines the Recommendation Oracle's output with fixed override rules to
//! produce a final score, priority tier, and justification. The oracle is
//! advisory, never authoritative: a known-critical physical event is never
//! under-reported regardless of oracle output.
//!
//! Override order (fixed):
//! 1. Oracle call (unavailable / failed -> local heuristic substitution)
//! 2. Severity floors: critical -> score >= 80 and priority CRITICAL;
//!    high -> score >= 60 and priority >= HIGH
//! 3. Recurrence boost, tiered by count and severity
//! 4. Similarity boost when the top-5 matches average > 0.8
//! 5. Clamp to [0, 100], round to 2 decimals
//! 6. Priority re-derivation under the same override order

mod cache;
mod http;
mod oracle;

pub use cache::{fingerprint, CacheStats, CachedAssessment, OracleCache};
pub use http::{build_triage_prompt, parse_oracle_response, parse_sections, parse_sentinels, HttpOracle};
pub use oracle::{
    canned_recommendation, default_report, heuristic_assessment, HeuristicOracle,
    RecommendationOracle, SimilarContext, TimeoutOracle,
};

use crate::config::OracleConfig;
use crate::similarity::SimilarMatch;
use crate::types::{OracleAssessment, Priority, PromptKind, Record, Severity, TriageResult};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Scores records for maintenance urgency
pub struct TriageScorer {
    cache: Mutex<OracleCache>,
}

impl TriageScorer {
    pub fn new(config: &OracleConfig) -> Self {
        Self {
            cache: Mutex::new(OracleCache::new(config.cache_capacity)),
        }
    }

    /// Score one record. Pure given its inputs — the oracle call is the
    /// only point of external failure, and every failure path degrades to
    /// the deterministic heuristic.
    pub async fn score(
        &self,
        record: &Record,
        similar: &[SimilarMatch<'_>],
        oracle: &dyn RecommendationOracle,
    ) -> TriageResult {
        let (assessment, oracle_available) = self.assess(record, similar, oracle).await;

        let ai_score = assessment.risk_score.unwrap_or(50.0);
        let recurrence = record.recurrence_count;

        // Severity floors + per-severity recurrence boost table
        let base_score = match record.severity {
            Severity::Critical => {
                let floored = ai_score.max(80.0);
                if recurrence > 100 {
                    // Chronic critical pins near-maximum
                    95.0
                } else if recurrence > 50 {
                    (floored + 10.0).min(100.0)
                } else if recurrence > 10 {
                    (floored + 5.0).min(100.0)
                } else if recurrence > 1 {
                    (floored + 5.0).min(100.0)
                } else {
                    floored
                }
            }
            Severity::High => {
                let floored = ai_score.max(60.0);
                if recurrence > 100 {
                    (floored + 15.0).min(100.0)
                } else if recurrence > 50 {
                    (floored + 10.0).min(100.0)
                } else if recurrence > 10 {
                    (floored + 5.0).min(100.0)
                } else if recurrence > 1 {
                    (floored + 5.0).min(100.0)
                } else {
                    floored
                }
            }
            Severity::Med | Severity::Low => {
                if recurrence > 100 {
                    (ai_score + 20.0).min(100.0)
                } else if recurrence > 50 {
                    (ai_score + 15.0).min(100.0)
                } else if recurrence > 10 {
                    (ai_score + 10.0).min(100.0)
                } else if recurrence > 1 {
                    (ai_score + 5.0).min(100.0)
                } else {
                    ai_score
                }
            }
        };

        // Very similar history reinforces urgency
        let similarity_boost = if similar.is_empty() {
            0.0
        } else {
            let top = &similar[..similar.len().min(5)];
            let avg = top.iter().map(|m| m.score).sum::<f64>() / top.len() as f64;
            if avg > 0.8 {
                10.0
            } else {
                0.0
            }
        };

        let final_score = round2((base_score + similarity_boost).clamp(0.0, 100.0));

        // Priority re-derivation: severity overrides first, oracle next,
        // score-threshold mapping only as the last resort
        let priority = match record.severity {
            Severity::Critical => Priority::Critical,
            Severity::High => {
                if assessment.priority == Some(Priority::Critical) {
                    Priority::Critical
                } else {
                    Priority::High
                }
            }
            Severity::Med | Severity::Low => assessment
                .priority
                .unwrap_or_else(|| Priority::from_score(final_score)),
        };

        debug!(
            record_id = %record.record_id,
            severity = %record.severity,
            recurrence = recurrence,
            ai_score = ai_score,
            final_score = final_score,
            priority = %priority,
            "Scored record"
        );

        let recommendation = if assessment.recommendation.is_empty() {
            "Monitor the situation".to_string()
        } else {
            assessment.recommendation
        };
        let narrative = if assessment.narrative.is_empty() {
            "Event analyzed".to_string()
        } else {
            assessment.narrative
        };

        TriageResult {
            record_id: record.record_id.clone(),
            score: final_score,
            priority,
            recommendation,
            narrative,
            report: assessment.report,
            oracle_available,
        }
    }

    /// Obtain the oracle assessment, consulting the response cache first.
    /// Oracle errors degrade to the heuristic — logged, never fatal.
    async fn assess(
        &self,
        record: &Record,
        similar: &[SimilarMatch<'_>],
        oracle: &dyn RecommendationOracle,
    ) -> (OracleAssessment, bool) {
        let key = fingerprint(record);
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                debug!(record_id = %record.record_id, "Oracle cache hit");
                return (hit.assessment, hit.oracle_available);
            }
        }

        let context: Vec<SimilarContext> = similar
            .iter()
            .map(|m| SimilarContext {
                description: m.record.description.clone(),
                similarity: m.score,
            })
            .collect();

        let (assessment, oracle_available) =
            match oracle.analyze(record, &context, PromptKind::Triage).await {
                Ok(assessment) => (assessment, oracle.is_available()),
                Err(e) => {
                    warn!(
                        record_id = %record.record_id,
                        oracle = oracle.name(),
                        error = %e,
                        "Oracle failed, substituting heuristic"
                    );
                    (heuristic_assessment(record), false)
                }
            };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(
                key,
                CachedAssessment {
                    assessment: assessment.clone(),
                    oracle_available,
                },
            );
        }

        (assessment, oracle_available)
    }

    /// Response-cache statistics
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.lock().ok().map(|cache| cache.stats())
    }
}

/// Score every record in a pool concurrently.
///
/// Each invocation touches only its own record, so concurrent scoring of
/// distinct records is safe; the shared response cache is the only
/// synchronized state. Results come back in pool order.
pub async fn score_batch(
    pool: &[Record],
    engine: &crate::similarity::SimilarityEngine,
    scorer: &TriageScorer,
    oracle: &dyn RecommendationOracle,
) -> Vec<TriageResult> {
    let futures = pool.iter().map(|record| async move {
        let similar = engine.find_similar(record, pool, None);
        scorer.score(record, &similar, oracle).await
    });
    futures::future::join_all(futures).await
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OracleConfig, SimilarityConfig};
    use crate::normalize::Normalizer;
    use crate::similarity::SimilarityEngine;
    use crate::types::RawObservation;
    use anyhow::Result;
    use async_trait::async_trait;

    /// Oracle stub returning a fixed assessment
    struct StubOracle {
        assessment: OracleAssessment,
        available: bool,
    }

    #[async_trait]
    impl RecommendationOracle for StubOracle {
        async fn analyze(
            &self,
            _record: &Record,
            _similar: &[SimilarContext],
            _kind: PromptKind,
        ) -> Result<OracleAssessment> {
            Ok(self.assessment.clone())
        }
        fn is_available(&self) -> bool {
            self.available
        }
        fn name(&self) -> &'static str {
            "StubOracle"
        }
    }

    /// Oracle stub that always fails
    struct DownOracle;

    #[async_trait]
    impl RecommendationOracle for DownOracle {
        async fn analyze(
            &self,
            _record: &Record,
            _similar: &[SimilarContext],
            _kind: PromptKind,
        ) -> Result<OracleAssessment> {
            Err(anyhow::anyhow!("connection refused"))
        }
        fn is_available(&self) -> bool {
            false
        }
        fn name(&self) -> &'static str {
            "DownOracle"
        }
    }

    fn record(description: &str, severity: Severity, recurrence: u32) -> Record {
        let raw = RawObservation {
            source_event_id: Some(format!("evt-{description}")),
            timestamp_raw: Some("2025-11-17 10:00:00".to_string()),
            description: Some(description.to_string()),
            raw_payload: description.to_string(),
            ..Default::default()
        };
        let mut rec = Normalizer::default().normalize(&raw);
        rec.severity = severity;
        rec.recurrence_count = recurrence;
        rec
    }

    fn stub(risk_score: f64, priority: Option<Priority>) -> StubOracle {
        StubOracle {
            assessment: OracleAssessment {
                priority,
                risk_score: Some(risk_score),
                recommendation: "stub recommendation".to_string(),
                narrative: "stub narrative".to_string(),
                report: default_report(),
            },
            available: true,
        }
    }

    fn scorer() -> TriageScorer {
        TriageScorer::new(&OracleConfig::default())
    }

    #[tokio::test]
    async fn test_critical_floor_overrides_low_oracle_score() {
        let rec = record("frame crack", Severity::Critical, 1);
        let result = scorer()
            .score(&rec, &[], &stub(0.0, Some(Priority::Low)))
            .await;
        assert!(result.score >= 80.0);
        assert_eq!(result.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_chronic_critical_pins_95() {
        // severity critical, recurrence 150, oracle says 10 -> exactly 95
        let rec = record("chronic overload", Severity::Critical, 150);
        let result = scorer().score(&rec, &[], &stub(10.0, None)).await;
        assert_eq!(result.score, 95.0);
        assert_eq!(result.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_high_floor_and_oracle_critical_escalation() {
        let rec = record("hot gearbox", Severity::High, 1);
        let floored = scorer().score(&rec, &[], &stub(20.0, Some(Priority::Low))).await;
        assert!(floored.score >= 60.0);
        assert_eq!(floored.priority, Priority::High);

        let escalated = scorer()
            .score(&rec, &[], &stub(90.0, Some(Priority::Critical)))
            .await;
        assert_eq!(escalated.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_low_severity_uses_oracle_score_with_recurrence_boost() {
        let rec = record("minor drift", Severity::Low, 60);
        let result = scorer().score(&rec, &[], &stub(30.0, None)).await;
        // 30 + 15 (recurrence > 50 tier)
        assert_eq!(result.score, 45.0);
        assert_eq!(result.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn test_score_threshold_mapping_when_nothing_decided() {
        let rec = record("minor drift", Severity::Low, 1);
        let result = scorer().score(&rec, &[], &stub(85.0, None)).await;
        assert_eq!(result.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_similarity_boost_applies_over_point_eight() {
        let rec = record("collision on J3, 645N", Severity::Low, 1);
        let pool: Vec<Record> = (0..5)
            .map(|i| record(&format!("collision on J3, 645N #{i}"), Severity::Low, 1))
            .collect();
        let engine = SimilarityEngine::new(SimilarityConfig::default());
        let similar = engine.find_similar(&rec, &pool, None);
        assert!(!similar.is_empty());

        let with_history = scorer().score(&rec, &similar, &stub(30.0, None)).await;
        let without_history = scorer().score(&rec, &[], &stub(30.0, None)).await;
        // Near-identical descriptions push the top-5 average over 0.8
        assert_eq!(with_history.score, without_history.score + 10.0);
    }

    #[tokio::test]
    async fn test_score_clamped_and_rounded() {
        let rec = record("runaway", Severity::Critical, 60);
        let result = scorer().score(&rec, &[], &stub(97.0, None)).await;
        assert!(result.score <= 100.0);

        let rec = record("fractional", Severity::Low, 1);
        let result = scorer()
            .score(&rec, &[], &stub(33.333, None))
            .await;
        assert_eq!(result.score, 33.33);
    }

    #[tokio::test]
    async fn test_oracle_unavailable_equivalence() {
        // Scoring with the oracle down vs. a stub returning the exact
        // heuristic values yields the same final TriageResult.
        let rec = record("torque fault on J4", Severity::Med, 12);
        let heuristic = heuristic_assessment(&rec);

        let via_down = scorer().score(&rec, &[], &DownOracle).await;
        let echo = StubOracle {
            assessment: heuristic,
            available: false,
        };
        let via_echo = scorer().score(&rec, &[], &echo).await;

        assert_eq!(via_down, via_echo);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_recovered_not_fatal() {
        let rec = record("sensor glitch", Severity::Low, 1);
        let result = scorer().score(&rec, &[], &DownOracle).await;
        assert!(!result.oracle_available);
        assert!(!result.recommendation.is_empty());
        assert!(result.score >= 0.0 && result.score <= 100.0);
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_scores() {
        let triage = scorer();
        let rec = record("repeat offender", Severity::Med, 1);
        let oracle = stub(42.0, Some(Priority::Medium));

        let first = triage.score(&rec, &[], &oracle).await;
        let second = triage.score(&rec, &[], &oracle).await;
        assert_eq!(first, second);

        let stats = triage.cache_stats().expect("cache lock");
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_score_batch_returns_pool_order() {
        let pool = vec![
            record("alpha fault", Severity::Low, 1),
            record("beta fault", Severity::Critical, 1),
            record("gamma fault", Severity::Med, 1),
        ];
        let engine = SimilarityEngine::default();
        let triage = scorer();
        let results = score_batch(&pool, &engine, &triage, &HeuristicOracle).await;

        assert_eq!(results.len(), 3);
        for (record, result) in pool.iter().zip(&results) {
            assert_eq!(record.record_id, result.record_id);
        }
        assert!(results[1].score >= 80.0);
    }
}
