//! Normalizer - raw observations into canonical records
//!
//! Converts one `RawObservation` into the canonical `Record` shape via
//! deterministic rules. The contract is best-effort and total: normalization
//! never fails — irrecoverable fields become `Unknown`/absent and a
//! data-quality note is attached instead.
//!
//! Rule order is fixed and data-driven (format tables, keyword tables,
//! regex rule lists). First match wins everywhere; the same input resolves
//! the same way every run.

mod timestamp;

pub use timestamp::{normalize_timestamp, ParsedTimestamp};

use crate::config::NormalizeConfig;
use crate::types::{
    CollisionType, ConfidenceFlag, Joint, MaintenanceStatus, RawObservation, Record, Severity,
};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Rule tables
// ============================================================================

/// Error code to standardized name mapping (controller fault catalogue).
/// Used for oracle prompt context, not for identity.
const ERROR_CODE_MAP: &[(&str, &str)] = &[
    ("SRVO-160", "Torque limit reached"),
    ("SRVO-161", "Torque limit reached"),
    ("SRVO-005", "Torque limit reached"),
    ("SRVO-050", "Torque limit reached"),
    ("SRVO-062", "Torque limit reached"),
    ("SRVO-324", "Collision detected"),
    ("TEMP-100", "Temperature anomaly"),
    ("MOTN-019", "Motion error"),
    ("INTP-105", "Interpreter error"),
    ("PROG-048", "Program error"),
];

/// Collision keyword table, scanned in order; first keyword hit wins
const COLLISION_KEYWORDS: &[(CollisionType, &[&str])] = &[
    (
        CollisionType::HardImpact,
        &["collision", "crash", "impact", "strike"],
    ),
    (CollisionType::SoftCollision, &["contact", "touch", "brush"]),
    (
        CollisionType::EmergencyStop,
        &["e-stop", "emergency", "estop", "emergency stop"],
    ),
];

/// Joint extraction patterns over the upper-cased description, tried in order
fn joint_rules() -> &'static [Regex] {
    static RULES: OnceLock<Vec<Regex>> = OnceLock::new();
    RULES.get_or_init(|| {
        [r"J([1-6])", r"AXIS\s*([1-6])", r"JOINT\s*([1-6])"]
            .iter()
            .map(|p| Regex::new(p).expect("valid regex"))
            .collect()
    })
}

/// Force magnitude embedded in description text, e.g. "645N" / "12.5 N"
fn force_in_description_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*[Nn]").expect("valid regex"))
}

/// Standardize an error code to its canonical fault name; unknown codes pass
/// through unchanged.
pub fn standardize_error_code(error_code: &str) -> &str {
    ERROR_CODE_MAP
        .iter()
        .find(|(code, _)| *code == error_code)
        .map_or(error_code, |(_, name)| *name)
}

// ============================================================================
// Normalizer
// ============================================================================

/// Converts raw observations into canonical records
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    /// Normalize one raw observation into a `Record`. Never fails.
    pub fn normalize(&self, raw: &RawObservation) -> Record {
        self.normalize_at(raw, chrono::Local::now().naive_local())
    }

    /// Normalize with an explicit processing timestamp. The `now` parameter
    /// feeds the time-only and fallback timestamp paths, keeping them
    /// deterministic under test.
    pub fn normalize_at(&self, raw: &RawObservation, now: NaiveDateTime) -> Record {
        let ts = normalize_timestamp(raw.timestamp_raw.as_deref(), now);
        let joint = extract_joint(raw);
        let collision_type = detect_collision_type(raw);
        let force_value = self.extract_force_value(raw);
        let severity = self.calculate_severity(raw, force_value);
        let status = raw
            .status_raw
            .as_deref()
            .map(MaintenanceStatus::parse)
            .unwrap_or_default();
        let confidence = determine_confidence(raw, joint, force_value);
        let notes = generate_notes(raw, &ts, joint, force_value);

        let record = Record {
            record_id: uuid::Uuid::new_v4().to_string(),
            source_event_id: raw.source_event_id.clone(),
            source_kind: raw.kind,
            timestamp: ts.datetime,
            timestamp_inferred: ts.inferred,
            joint,
            collision_type,
            force_value,
            severity,
            status,
            confidence,
            recurrence_count: 1,
            error_code: raw.error_code.clone(),
            description: raw
                .description
                .clone()
                .unwrap_or_else(|| "No description".to_string()),
            raw_payload: raw.raw_payload.clone(),
            notes,
        };

        debug!(
            record_id = %record.record_id,
            joint = %record.joint,
            severity = %record.severity,
            confidence = %record.confidence,
            "Normalized observation"
        );

        record
    }

    /// Extract a force value (N) from typed channels, falling back to the
    /// description text. Candidates are tried in order; the first value
    /// inside the acceptable range wins. Out-of-range values are discarded,
    /// never clamped.
    fn extract_force_value(&self, raw: &RawObservation) -> Option<f64> {
        let ch = &raw.channels;
        // Vibration (g) is heuristically scaled to a force-equivalent.
        // The factor is a tunable approximation, not a physical conversion.
        let vibration_equiv = ch
            .vibration
            .filter(|v| *v > 0.0)
            .map(|v| v * self.config.vibration_force_factor);

        for candidate in [ch.force, ch.torque, vibration_equiv].into_iter().flatten() {
            if self.in_force_range(candidate) {
                return Some(round2(candidate));
            }
        }

        if let Some(description) = raw.description.as_deref() {
            if let Some(captures) = force_in_description_re().captures(description) {
                if let Ok(force) = captures[1].parse::<f64>() {
                    if self.in_force_range(force) {
                        return Some(round2(force));
                    }
                }
            }
        }

        None
    }

    fn in_force_range(&self, force: f64) -> bool {
        force >= self.config.force_min && force <= self.config.force_max
    }

    /// Severity from force when present (step function, monotonic in force),
    /// otherwise from the raw severity string, otherwise from error-type
    /// indicators, defaulting to `Low`.
    fn calculate_severity(&self, raw: &RawObservation, force_value: Option<f64>) -> Severity {
        if let Some(force) = force_value {
            return if force < self.config.severity_low_below {
                Severity::Low
            } else if force < self.config.severity_med_below {
                Severity::Med
            } else if force < self.config.severity_high_below {
                Severity::High
            } else {
                Severity::Critical
            };
        }

        let severity_raw = raw
            .severity_raw
            .as_deref()
            .unwrap_or_default()
            .to_uppercase();
        if severity_raw.contains("CRITICAL") {
            return Severity::Critical;
        }
        if severity_raw.contains("HIGH") || severity_raw.contains("ALERT") {
            return Severity::High;
        }
        if severity_raw.contains("MEDIUM")
            || severity_raw.contains("MED")
            || severity_raw.contains("WARN")
        {
            return Severity::Med;
        }
        if severity_raw.contains("LOW")
            || severity_raw.contains("NOTICE")
            || severity_raw.contains("INFO")
        {
            return Severity::Low;
        }

        // No force, no recognizable severity string: servo faults and
        // collision wording still warrant more than the floor tier.
        let error_code = raw.error_code.as_deref().unwrap_or_default();
        let description = raw.description.as_deref().unwrap_or_default().to_uppercase();
        if error_code.contains("SRVO") || description.contains("COLLISION") {
            return Severity::Med;
        }

        Severity::Low
    }
}

/// Extract the joint identifier: explicit description patterns first, then
/// per-axis channel data, then the generic axis column. First rule wins;
/// otherwise `Unknown`.
fn extract_joint(raw: &RawObservation) -> Joint {
    let description = raw.description.as_deref().unwrap_or_default().to_uppercase();

    for rule in joint_rules() {
        if let Some(captures) = rule.captures(&description) {
            if let Ok(axis) = captures[1].parse::<i64>() {
                return Joint::from_axis(axis);
            }
        }
    }

    for (index, angle) in raw.channels.axis_angles.iter().enumerate() {
        if angle.is_some() {
            return Joint::from_axis(index as i64 + 1);
        }
    }

    if let Some(axis) = raw.channels.axis {
        if (1..=6).contains(&axis) {
            return Joint::from_axis(axis);
        }
    }

    Joint::Unknown
}

/// Detect the collision category from description / error-code keywords.
/// Specific error-code literals override keyword inference.
fn detect_collision_type(raw: &RawObservation) -> CollisionType {
    let description = raw.description.as_deref().unwrap_or_default().to_lowercase();
    let error_code_lower = raw.error_code.as_deref().unwrap_or_default().to_lowercase();
    let error_code_upper = raw.error_code.as_deref().unwrap_or_default().to_uppercase();
    let description_upper = description.to_uppercase();

    for (collision_type, keywords) in COLLISION_KEYWORDS {
        for keyword in *keywords {
            if description.contains(keyword) || error_code_lower.contains(keyword) {
                return *collision_type;
            }
        }
    }

    // Known collision fault code forces hard impact
    if error_code_upper.contains("SRVO-324") {
        return CollisionType::HardImpact;
    }
    if error_code_upper.contains("SRVO") && description_upper.contains("COLLISION") {
        return CollisionType::HardImpact;
    }
    if description_upper.contains("E-STOP") || description_upper.contains("EMERGENCY") {
        return CollisionType::EmergencyStop;
    }

    CollisionType::None
}

/// Confidence from the count of observed key fields:
/// {timestamp, joint, force, error code}; >=3 high, >=2 medium, else inferred.
fn determine_confidence(raw: &RawObservation, joint: Joint, force_value: Option<f64>) -> ConfidenceFlag {
    let observed = [
        raw.timestamp_raw.is_some(),
        joint.is_known(),
        force_value.is_some(),
        raw.error_code.as_deref().is_some_and(|c| !c.is_empty()),
    ]
    .iter()
    .filter(|present| **present)
    .count();

    if observed >= 3 {
        ConfidenceFlag::High
    } else if observed >= 2 {
        ConfidenceFlag::Medium
    } else {
        ConfidenceFlag::Inferred
    }
}

/// Data-quality notes describing what was inferred rather than observed
fn generate_notes(
    raw: &RawObservation,
    ts: &ParsedTimestamp,
    joint: Joint,
    force_value: Option<f64>,
) -> Vec<String> {
    let mut notes = Vec::new();

    if raw.timestamp_raw.is_none() {
        notes.push("Timestamp inferred from sequence".to_string());
    } else if ts.inferred {
        notes.push("Timestamp unparseable, inferred as processing time".to_string());
    }

    if !joint.is_known() {
        notes.push("Joint identifier not found, may need manual review".to_string());
    }

    if force_value.is_none() {
        notes.push("Force value not available, severity calculated from other indicators".to_string());
    }

    notes
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Schema validation
// ============================================================================

/// One schema violation found by `validate`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("Missing required field: record_id")]
    MissingRecordId,
    #[error("Missing required field: raw_payload")]
    MissingRawPayload,
    #[error("Force value out of range: {0}N (must be {1}-{2}N)")]
    ForceOutOfRange(f64, f64, f64),
    #[error("Recurrence count must be >= 1, got {0}")]
    InvalidRecurrence(u32),
}

/// Validate a normalized record against the schema invariants the type
/// system cannot carry. Returns every violation found; an empty list means
/// the record is pool-eligible. Invalid records are excluded from the pool
/// at the batch level — one bad record never aborts a batch.
pub fn validate(record: &Record, config: &NormalizeConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if record.record_id.trim().is_empty() {
        issues.push(ValidationIssue::MissingRecordId);
    }
    if record.raw_payload.trim().is_empty() && record.description.trim().is_empty() {
        issues.push(ValidationIssue::MissingRawPayload);
    }
    if let Some(force) = record.force_value {
        if force < config.force_min || force > config.force_max {
            issues.push(ValidationIssue::ForceOutOfRange(
                force,
                config.force_min,
                config.force_max,
            ));
        }
    }
    if record.recurrence_count == 0 {
        issues.push(ValidationIssue::InvalidRecurrence(record.recurrence_count));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 20)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .expect("valid datetime")
    }

    fn observation(description: &str) -> RawObservation {
        RawObservation {
            source_event_id: Some("evt-1".to_string()),
            description: Some(description.to_string()),
            raw_payload: description.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_alert_line_scenario() {
        // "10:03:00 NOTICE: Vibration spike" — severity low, joint unknown,
        // no collision, inferred-entity note present
        let raw = RawObservation {
            source_event_id: Some("alert-0".to_string()),
            kind: crate::types::SourceKind::SystemAlert,
            timestamp_raw: Some("10:03:00".to_string()),
            severity_raw: Some("NOTICE".to_string()),
            description: Some("Vibration spike".to_string()),
            raw_payload: "10:03:00 NOTICE: Vibration spike".to_string(),
            ..Default::default()
        };
        let record = Normalizer::default().normalize_at(&raw, fixed_now());

        assert_eq!(record.severity, Severity::Low);
        assert_eq!(record.joint, Joint::Unknown);
        assert_eq!(record.collision_type, CollisionType::None);
        assert!(!record.timestamp_inferred);
        assert_eq!(record.timestamp.time().to_string(), "10:03:00");
        assert!(record.notes.iter().any(|n| n.contains("Joint identifier")));
    }

    #[test]
    fn test_collision_error_scenario() {
        // SRVO-324 + "collision detected on J3, 645N" — J3, hard impact,
        // force 645, severity high (600 <= 645 < 800)
        let raw = RawObservation {
            source_event_id: Some("err-7".to_string()),
            kind: crate::types::SourceKind::ErrorLog,
            timestamp_raw: Some("2025-11-17 09:59:45".to_string()),
            error_code: Some("SRVO-324".to_string()),
            description: Some("collision detected on J3, 645N".to_string()),
            raw_payload: "2025-11-17 09:59:45 SRVO-324 collision detected on J3, 645N".to_string(),
            ..Default::default()
        };
        let record = Normalizer::default().normalize_at(&raw, fixed_now());

        assert_eq!(record.joint, Joint::J3);
        assert_eq!(record.collision_type, CollisionType::HardImpact);
        assert_eq!(record.force_value, Some(645.0));
        assert_eq!(record.severity, Severity::High);
        assert_eq!(record.confidence, ConfidenceFlag::High);
    }

    #[test]
    fn test_severity_step_function_monotonic() {
        let normalizer = Normalizer::default();
        let forces = [0.0, 150.0, 299.9, 300.0, 599.9, 600.0, 799.9, 800.0, 9999.0];
        let mut last = Severity::Low;
        for force in forces {
            let mut raw = observation("torque event");
            raw.channels.force = Some(force);
            let severity = normalizer.normalize_at(&raw, fixed_now()).severity;
            assert!(severity >= last, "severity not monotonic at {force}N");
            last = severity;
        }
        assert_eq!(last, Severity::Critical);
    }

    #[test]
    fn test_force_out_of_range_discarded_not_clamped() {
        let normalizer = Normalizer::default();
        let mut raw = observation("overload event");
        raw.channels.force = Some(25_000.0);
        let record = normalizer.normalize_at(&raw, fixed_now());
        assert_eq!(record.force_value, None);
        assert!(record
            .notes
            .iter()
            .any(|n| n.contains("Force value not available")));
    }

    #[test]
    fn test_out_of_range_force_falls_through_to_torque() {
        let normalizer = Normalizer::default();
        let mut raw = observation("bound event");
        raw.channels.force = Some(-5.0);
        raw.channels.torque = Some(420.0);
        let record = normalizer.normalize_at(&raw, fixed_now());
        assert_eq!(record.force_value, Some(420.0));
        assert_eq!(record.severity, Severity::Med);
    }

    #[test]
    fn test_vibration_scaled_to_force_equivalent() {
        let normalizer = Normalizer::default();
        let mut raw = observation("vibration sample");
        raw.channels.vibration = Some(3.5);
        let record = normalizer.normalize_at(&raw, fixed_now());
        assert_eq!(record.force_value, Some(350.0));
    }

    #[test]
    fn test_joint_from_axis_patterns() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer
                .normalize_at(&observation("binding on AXIS 5"), fixed_now())
                .joint,
            Joint::J5
        );
        assert_eq!(
            normalizer
                .normalize_at(&observation("JOINT 2 backlash"), fixed_now())
                .joint,
            Joint::J2
        );
    }

    #[test]
    fn test_joint_from_axis_angle_channels() {
        let normalizer = Normalizer::default();
        let mut raw = observation("sensor sweep");
        raw.channels.axis_angles[3] = Some(42.0);
        assert_eq!(normalizer.normalize_at(&raw, fixed_now()).joint, Joint::J4);
    }

    #[test]
    fn test_joint_from_generic_axis_column() {
        let normalizer = Normalizer::default();
        let mut raw = observation("generic row");
        raw.channels.axis = Some(6);
        assert_eq!(normalizer.normalize_at(&raw, fixed_now()).joint, Joint::J6);

        let mut raw = observation("generic row");
        raw.channels.axis = Some(9);
        assert_eq!(
            normalizer.normalize_at(&raw, fixed_now()).joint,
            Joint::Unknown
        );
    }

    #[test]
    fn test_emergency_stop_detection() {
        let normalizer = Normalizer::default();
        let record = normalizer.normalize_at(
            &observation("Operator pressed E-stop during cycle"),
            fixed_now(),
        );
        assert_eq!(record.collision_type, CollisionType::EmergencyStop);
    }

    #[test]
    fn test_soft_collision_keyword() {
        let normalizer = Normalizer::default();
        let record =
            normalizer.normalize_at(&observation("light contact with fixture"), fixed_now());
        assert_eq!(record.collision_type, CollisionType::SoftCollision);
    }

    #[test]
    fn test_srvo_defaults_to_med_severity() {
        let normalizer = Normalizer::default();
        let mut raw = observation("servo fault on startup");
        raw.error_code = Some("SRVO-050".to_string());
        let record = normalizer.normalize_at(&raw, fixed_now());
        assert_eq!(record.severity, Severity::Med);
    }

    #[test]
    fn test_normalization_is_deterministic_except_record_id() {
        let normalizer = Normalizer::default();
        let raw = observation("collision detected on J3, 645N");
        let a = normalizer.normalize_at(&raw, fixed_now());
        let b = normalizer.normalize_at(&raw, fixed_now());
        assert_ne!(a.record_id, b.record_id);
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(a.joint, b.joint);
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.force_value, b.force_value);
        assert_eq!(a.notes, b.notes);
    }

    #[test]
    fn test_standardize_error_code() {
        assert_eq!(standardize_error_code("SRVO-324"), "Collision detected");
        assert_eq!(standardize_error_code("SRVO-161"), "Torque limit reached");
        assert_eq!(standardize_error_code("XYZ-999"), "XYZ-999");
    }

    #[test]
    fn test_validate_accepts_normalized_record() {
        let normalizer = Normalizer::default();
        let record = normalizer.normalize_at(&observation("ok event"), fixed_now());
        assert!(validate(&record, &NormalizeConfig::default()).is_empty());
    }

    #[test]
    fn test_validate_flags_out_of_range_force() {
        let normalizer = Normalizer::default();
        let mut record = normalizer.normalize_at(&observation("bad event"), fixed_now());
        record.force_value = Some(20_000.0);
        let issues = validate(&record, &NormalizeConfig::default());
        assert!(matches!(
            issues.as_slice(),
            [ValidationIssue::ForceOutOfRange(..)]
        ));
    }

    #[test]
    fn test_missing_channels_yield_inferred_confidence() {
        let normalizer = Normalizer::default();
        let raw = RawObservation {
            description: Some("something happened".to_string()),
            raw_payload: "something happened".to_string(),
            ..Default::default()
        };
        let record = normalizer.normalize_at(&raw, fixed_now());
        assert_eq!(record.confidence, ConfidenceFlag::Inferred);
        assert!(record.timestamp_inferred);
        assert_eq!(record.status, MaintenanceStatus::PendingInspection);
    }
}
