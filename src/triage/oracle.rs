//! Recommendation Oracle seam
//!
//! The oracle is an external advisory text-generation system: it may be
//! unavailable, slow, or wrong. This module defines the trait boundary, the
//! deterministic local heuristic that substitutes for it, and a timeout
//! wrapper for call-site deadline enforcement. The Triage Scorer treats
//! every oracle as advisory — its output is a starting point for the
//! deterministic override rules, never the final word.

use crate::types::{
    CollisionType, MaintenanceReport, OracleAssessment, Priority, PromptKind, Record, Severity,
};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Similar-record context handed to the oracle for prompt grounding
#[derive(Debug, Clone)]
pub struct SimilarContext {
    pub description: String,
    pub similarity: f64,
}

/// Advisory analysis backend
#[async_trait]
pub trait RecommendationOracle: Send + Sync {
    /// Analyze one record with similar-history context. Implementations
    /// must return a fully-shaped assessment or an error — the caller
    /// substitutes the local heuristic on failure, so downstream logic
    /// never special-cases an absent oracle.
    async fn analyze(
        &self,
        record: &Record,
        similar: &[SimilarContext],
        kind: PromptKind,
    ) -> Result<OracleAssessment>;

    /// Whether a live external oracle backs this implementation
    fn is_available(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

// ============================================================================
// Local heuristic substitute
// ============================================================================

/// Deterministic heuristic assessment derived from severity, force,
/// recurrence, error-code and collision-type rules.
///
/// This is the documented substitute used whenever the oracle is
/// unavailable, times out, or returns garbage. It produces the same output
/// shape as a live oracle so downstream logic is oblivious to the swap.
pub fn heuristic_assessment(record: &Record) -> OracleAssessment {
    let force = record.force_value.unwrap_or(0.0);

    // Base tier from severity and force
    let (base_priority, mut score): (Priority, f64) = if record.severity == Severity::Critical || force > 800.0 {
        (Priority::Critical, 90.0)
    } else if record.severity == Severity::High || force > 600.0 {
        (Priority::High, 75.0)
    } else if record.severity == Severity::Med || force > 300.0 {
        (Priority::Medium, 50.0)
    } else {
        (Priority::Low, 30.0)
    };

    // Chronic recurrence is more urgent
    let recurrence = record.recurrence_count;
    score += if recurrence > 100 {
        25.0
    } else if recurrence > 50 {
        20.0
    } else if recurrence > 10 {
        15.0
    } else if recurrence > 5 {
        10.0
    } else if recurrence > 1 {
        5.0
    } else {
        0.0
    };

    // Error-code keyword rules
    let error_code = record
        .error_code
        .as_deref()
        .unwrap_or_default()
        .to_uppercase();
    if error_code.contains("SRVO-324") {
        score += 20.0;
    } else if error_code.contains("SRVO") {
        score += 15.0;
    } else if error_code.contains("TEMP") {
        score += 10.0;
    }

    // Collision-type rules
    match record.collision_type {
        CollisionType::HardImpact => score += 25.0,
        CollisionType::EmergencyStop => score += 20.0,
        CollisionType::SoftCollision | CollisionType::None => {}
    }

    let score = score.clamp(0.0, 100.0);

    let mut narrative = format!("Event type: {}. ", record.source_kind);
    narrative.push_str(&format!("Severity: {}. ", record.severity));
    if let Some(code) = record.error_code.as_deref() {
        narrative.push_str(&format!("Error code: {code}. "));
    }
    narrative.push_str(&format!(
        "Based on analysis, this event has {base_priority} priority with a risk score of {score}."
    ));

    OracleAssessment {
        priority: Some(base_priority),
        risk_score: Some(score),
        recommendation: canned_recommendation(base_priority).to_string(),
        narrative,
        report: default_report(),
    }
}

/// Recommendation text per priority tier
pub fn canned_recommendation(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "Immediate action required. Stop operations and investigate root cause.",
        Priority::High => "Schedule maintenance soon. Monitor closely for escalation.",
        Priority::Medium => "Review during next maintenance window. Continue monitoring.",
        Priority::Low => "Log for tracking. No immediate action needed.",
    }
}

/// Section placeholders used when no oracle text filled a section
pub fn default_report() -> MaintenanceReport {
    MaintenanceReport {
        diagnose_cause: "Analysis pending".to_string(),
        inspection_procedure: "Standard inspection required".to_string(),
        maintenance_actions: "Review event details".to_string(),
        safety_clearance: "Verify all safety checks".to_string(),
        return_to_service: "Meet all return-to-service criteria".to_string(),
    }
}

/// Oracle implementation backed entirely by the local heuristic.
///
/// Used in fast mode (`--skip-oracle`) and whenever no live oracle is
/// configured. Reports itself as unavailable: the assessment shape is
/// identical, but the flag lets results record that no external system was
/// consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicOracle;

#[async_trait]
impl RecommendationOracle for HeuristicOracle {
    async fn analyze(
        &self,
        record: &Record,
        _similar: &[SimilarContext],
        _kind: PromptKind,
    ) -> Result<OracleAssessment> {
        Ok(heuristic_assessment(record))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "HeuristicOracle"
    }
}

// ============================================================================
// Call-site timeout enforcement
// ============================================================================

/// Wraps an oracle with a per-call deadline. Deadline enforcement is the
/// caller's concern, not the scorer's: a timed-out call surfaces as an
/// error, which the scorer treats exactly like an unavailable oracle.
pub struct TimeoutOracle<O> {
    inner: O,
    timeout: Duration,
}

impl<O> TimeoutOracle<O> {
    pub fn new(inner: O, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<O: RecommendationOracle> RecommendationOracle for TimeoutOracle<O> {
    async fn analyze(
        &self,
        record: &Record,
        similar: &[SimilarContext],
        kind: PromptKind,
    ) -> Result<OracleAssessment> {
        match tokio::time::timeout(self.timeout, self.inner.analyze(record, similar, kind)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    oracle = self.inner.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Oracle call timed out"
                );
                Err(anyhow::anyhow!(
                    "oracle call timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }

    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
