//! Shared data structures for the robot maintenance triage pipeline
//!
//! This module defines the core types flowing through the pipeline:
//! - Ingestion: RawObservation (per-source adapter output)
//! - Normalization: Record (canonical event schema)
//! - Triage: OracleAssessment, MaintenanceReport, TriageResult
//!
//! A `Record` is created once by the Normalizer from one raw observation.
//! It is never deleted; the Deduplicator sets `recurrence_count` and the
//! Triage Scorer attaches a `TriageResult`. The record pool is append-only
//! within a processing run.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Severity (four ordered tiers)
// ============================================================================

/// Event severity tier. Ordering matters: `Low < Med < High < Critical`,
/// and severity derived from force is monotonic in the force value.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Low,
    Med,
    High,
    Critical,
}

impl Severity {
    /// Get short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Med => "med",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_code())
    }
}

// ============================================================================
// Maintenance Status
// ============================================================================

/// Maintenance workflow status of a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    #[default]
    PendingInspection,
    UnderRepair,
    Resolved,
}

impl MaintenanceStatus {
    /// Parse a raw status string. Lower-cases and maps spaces to
    /// underscores; anything outside the enum defaults to
    /// `PendingInspection`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace(' ', "_").as_str() {
            "pending_inspection" => MaintenanceStatus::PendingInspection,
            "under_repair" => MaintenanceStatus::UnderRepair,
            "resolved" => MaintenanceStatus::Resolved,
            _ => MaintenanceStatus::PendingInspection,
        }
    }
}

impl std::fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MaintenanceStatus::PendingInspection => "pending_inspection",
            MaintenanceStatus::UnderRepair => "under_repair",
            MaintenanceStatus::Resolved => "resolved",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Collision Type
// ============================================================================

/// Collision category detected from description / error code keywords
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CollisionType {
    HardImpact,
    SoftCollision,
    EmergencyStop,
    #[default]
    None,
}

impl CollisionType {
    /// True when a collision category was detected
    pub fn is_detected(&self) -> bool {
        !matches!(self, CollisionType::None)
    }
}

impl std::fmt::Display for CollisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CollisionType::HardImpact => "hard_impact",
            CollisionType::SoftCollision => "soft_collision",
            CollisionType::EmergencyStop => "emergency_stop",
            CollisionType::None => "none",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Confidence Flag
// ============================================================================

/// How much of a record was observed vs. inferred.
///
/// Derived from the count of {timestamp present, joint known, force present,
/// error code present}: >=3 high, >=2 medium, else inferred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceFlag {
    High,
    Medium,
    Inferred,
}

impl std::fmt::Display for ConfidenceFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceFlag::High => "high",
            ConfidenceFlag::Medium => "medium",
            ConfidenceFlag::Inferred => "inferred",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Joint (physical robot subsystem)
// ============================================================================

/// Robot joint identifier (J1=Base, J2=Shoulder, J3=Elbow, J4=Wrist Roll,
/// J5=Wrist Pitch, J6=Wrist Yaw). `Unknown` is a valid, explicit value —
/// never a null.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
pub enum Joint {
    J1,
    J2,
    J3,
    J4,
    J5,
    J6,
    #[default]
    Unknown,
}

impl Joint {
    /// Build from a 1-6 axis number; anything else is `Unknown`
    pub fn from_axis(axis: i64) -> Self {
        match axis {
            1 => Joint::J1,
            2 => Joint::J2,
            3 => Joint::J3,
            4 => Joint::J4,
            5 => Joint::J5,
            6 => Joint::J6,
            _ => Joint::Unknown,
        }
    }

    /// True when the joint was identified
    pub fn is_known(&self) -> bool {
        !matches!(self, Joint::Unknown)
    }

    /// Anatomical label used in oracle prompts
    pub fn anatomy(&self) -> &'static str {
        match self {
            Joint::J1 => "Base",
            Joint::J2 => "Shoulder",
            Joint::J3 => "Elbow",
            Joint::J4 => "Wrist Roll",
            Joint::J5 => "Wrist Pitch",
            Joint::J6 => "Wrist Yaw",
            Joint::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Joint::J1 => "J1",
            Joint::J2 => "J2",
            Joint::J3 => "J3",
            Joint::J4 => "J4",
            Joint::J5 => "J5",
            Joint::J6 => "J6",
            Joint::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Source Kind (ingestion adapter classification)
// ============================================================================

/// Classification of the raw observation's source format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SensorReading,
    PerformanceMetric,
    SystemAlert,
    ErrorLog,
    MaintenanceNote,
    #[default]
    Generic,
}

impl SourceKind {
    /// Get short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            SourceKind::SensorReading => "sensor",
            SourceKind::PerformanceMetric => "perf",
            SourceKind::SystemAlert => "alert",
            SourceKind::ErrorLog => "error",
            SourceKind::MaintenanceNote => "maint",
            SourceKind::Generic => "generic",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceKind::SensorReading => "sensor_reading",
            SourceKind::PerformanceMetric => "performance_metric",
            SourceKind::SystemAlert => "system_alert",
            SourceKind::ErrorLog => "error_log",
            SourceKind::MaintenanceNote => "maintenance",
            SourceKind::Generic => "generic",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Raw Observation (adapter output, Normalizer input)
// ============================================================================

/// Structured per-axis / per-channel numeric data extracted by an adapter.
///
/// The Normalizer only ever reads these typed fields — source-format column
/// name quirks are resolved entirely inside the ingestion adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SensorChannels {
    /// Temperature reading (°C)
    pub temperature: Option<f64>,
    /// Vibration reading (g)
    pub vibration: Option<f64>,
    /// Direct force reading (N)
    pub force: Option<f64>,
    /// Torque reading, treated as a force-equivalent (N)
    pub torque: Option<f64>,
    /// Per-axis joint angles (deg), index 0 = J1
    pub axis_angles: [Option<f64>; 6],
    /// Generic axis column (1-6) when the source names a joint numerically
    pub axis: Option<i64>,
    /// Unstructured numeric metrics (performance CSVs)
    pub metrics: Vec<(String, f64)>,
}

impl SensorChannels {
    /// True when no channel carries data
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.vibration.is_none()
            && self.force.is_none()
            && self.torque.is_none()
            && self.axis.is_none()
            && self.axis_angles.iter().all(Option::is_none)
            && self.metrics.is_empty()
    }
}

/// One raw observation, as produced by an ingestion adapter.
///
/// Every field except `kind` and `raw_payload` is optional — the Normalizer
/// guarantees a best-effort `Record` from any combination of present fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawObservation {
    /// Source-assigned event identifier (for traceability, not identity)
    pub source_event_id: Option<String>,
    /// Which adapter produced this observation
    pub kind: SourceKind,
    /// Timestamp exactly as it appeared in the source
    pub timestamp_raw: Option<String>,
    /// Severity string exactly as it appeared in the source
    pub severity_raw: Option<String>,
    /// Maintenance status string, if the source carries one
    pub status_raw: Option<String>,
    /// Error code (e.g. SRVO-324), if present
    pub error_code: Option<String>,
    /// Free-text description
    pub description: Option<String>,
    /// Typed numeric channels
    pub channels: SensorChannels,
    /// Verbatim source line / row for audit and oracle context
    pub raw_payload: String,
}

// ============================================================================
// Record (canonical normalized event)
// ============================================================================

/// Canonical normalized maintenance record.
///
/// Invariants after normalization + validation:
/// - `record_id` globally unique, immutable
/// - `force_value` absent or within [0, 10000] N
/// - `recurrence_count >= 1` once the Deduplicator has run
/// - severity derived from `force_value` is monotonic in force
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier assigned at normalization time, never reused
    pub record_id: String,
    /// Source event id carried from the raw observation
    pub source_event_id: Option<String>,
    /// Source format classification
    pub source_kind: SourceKind,
    /// Normalized timestamp (local naive, always resolvable to date + time)
    pub timestamp: NaiveDateTime,
    /// True when the timestamp could not be parsed and fell back to "now"
    pub timestamp_inferred: bool,
    /// Physical subsystem involved (`Unknown` is explicit, never null)
    pub joint: Joint,
    /// Detected collision category
    pub collision_type: CollisionType,
    /// Force magnitude (N), absent when not observed or out of range
    pub force_value: Option<f64>,
    /// Severity tier, always present after normalization
    pub severity: Severity,
    /// Maintenance workflow status
    pub status: MaintenanceStatus,
    /// Observed-vs-inferred confidence
    pub confidence: ConfidenceFlag,
    /// Number of records sharing this record's (joint, date) bucket;
    /// 1 means "only occurrence observed"
    pub recurrence_count: u32,
    /// Error code preserved verbatim
    pub error_code: Option<String>,
    /// Description preserved verbatim
    pub description: String,
    /// Raw source payload preserved verbatim for audit
    pub raw_payload: String,
    /// Data-quality caveats generated during normalization
    pub notes: Vec<String>,
}

impl Record {
    /// Calendar date of the normalized timestamp
    pub fn date(&self) -> chrono::NaiveDate {
        self.timestamp.date()
    }

    /// True when two records are the same record by identity (record id or
    /// source event id), not by value equality.
    pub fn same_identity(&self, other: &Record) -> bool {
        if self.record_id == other.record_id {
            return true;
        }
        match (&self.source_event_id, &other.source_event_id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

// ============================================================================
// Priority (triage output tier)
// ============================================================================

/// Final triage priority tier
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Map a 0-100 score to a priority tier. Used only when neither
    /// severity overrides nor the oracle determined a priority.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Priority::Critical
        } else if score >= 60.0 {
            Priority::High
        } else if score >= 40.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    /// Parse from an oracle response token (case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "CRITICAL" => Some(Priority::Critical),
            "HIGH" => Some(Priority::High),
            "MEDIUM" => Some(Priority::Medium),
            "LOW" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Oracle output shape
// ============================================================================

/// Five-section maintenance report produced by the Recommendation Oracle
/// (or its heuristic substitute).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceReport {
    pub diagnose_cause: String,
    pub inspection_procedure: String,
    pub maintenance_actions: String,
    pub safety_clearance: String,
    pub return_to_service: String,
}

impl MaintenanceReport {
    /// True when no section carries content
    pub fn is_empty(&self) -> bool {
        self.diagnose_cause.is_empty()
            && self.inspection_procedure.is_empty()
            && self.maintenance_actions.is_empty()
            && self.safety_clearance.is_empty()
            && self.return_to_service.is_empty()
    }
}

/// Raw oracle assessment. Advisory only — the Triage Scorer applies
/// deterministic floors and boosts on top; oracle values are a starting
/// point, never final.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OracleAssessment {
    /// Priority suggested by the oracle, when it produced one
    pub priority: Option<Priority>,
    /// Risk score 0-100 suggested by the oracle, when it produced one
    pub risk_score: Option<f64>,
    /// Short actionable recommendation
    pub recommendation: String,
    /// Full narrative text of the oracle response
    pub narrative: String,
    /// Structured five-section report
    pub report: MaintenanceReport,
}

/// Prompt template kind passed to the oracle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Full five-section triage report with sentinel score lines
    #[default]
    Triage,
    /// Short JSON-shaped analysis
    Default,
}

// ============================================================================
// Triage result (attached to, not replacing, a Record)
// ============================================================================

/// Final triage verdict for one record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageResult {
    /// Record this result belongs to
    pub record_id: String,
    /// Final score in [0, 100], rounded to 2 decimals
    pub score: f64,
    /// Final priority tier
    pub priority: Priority,
    /// Actionable recommendation
    pub recommendation: String,
    /// Narrative justification (oracle text or heuristic summary)
    pub narrative: String,
    /// Five-section maintenance report
    pub report: MaintenanceReport,
    /// Whether a live oracle (vs. the local heuristic) produced the
    /// underlying assessment
    pub oracle_available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Med);
        assert!(Severity::Med < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_status_parse_normalizes_spaces_and_case() {
        assert_eq!(
            MaintenanceStatus::parse("Under Repair"),
            MaintenanceStatus::UnderRepair
        );
        assert_eq!(
            MaintenanceStatus::parse("RESOLVED"),
            MaintenanceStatus::Resolved
        );
        assert_eq!(
            MaintenanceStatus::parse("decommissioned"),
            MaintenanceStatus::PendingInspection
        );
    }

    #[test]
    fn test_joint_from_axis_bounds() {
        assert_eq!(Joint::from_axis(3), Joint::J3);
        assert_eq!(Joint::from_axis(0), Joint::Unknown);
        assert_eq!(Joint::from_axis(7), Joint::Unknown);
    }

    #[test]
    fn test_priority_from_score_thresholds() {
        assert_eq!(Priority::from_score(80.0), Priority::Critical);
        assert_eq!(Priority::from_score(79.99), Priority::High);
        assert_eq!(Priority::from_score(60.0), Priority::High);
        assert_eq!(Priority::from_score(40.0), Priority::Medium);
        assert_eq!(Priority::from_score(39.9), Priority::Low);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("critical"), Some(Priority::Critical));
        assert_eq!(Priority::parse(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse("urgent"), None);
    }
}
