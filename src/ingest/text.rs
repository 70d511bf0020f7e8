//! Free-text log ingestion adapters
//!
//! Parses robot log files into `RawObservation`s. Four line grammars are
//! recognized; the file kind is sniffed from the first ten lines by keyword
//! (simple pattern matching, intentionally shallow):
//!
//! - **System alerts**: `10:03:00 NOTICE: Vibration spike`
//! - **Error logs**: lines carrying controller fault codes (`SRVO-324 ...`)
//! - **Maintenance notes**: `2025-11-17 - Checked belts on axis 6.`
//! - **Generic**: anything else, one observation per non-empty line

use crate::types::{RawObservation, SourceKind};
use regex::Regex;
use std::io::BufRead;
use std::sync::OnceLock;
use tracing::debug;

fn alert_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2}:\d{2}:\d{2})\s+(\w+):\s+(.+)$").expect("valid regex"))
}

fn error_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z]+-\d+)").expect("valid regex"))
}

fn log_timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4}[-/]\d{2}[-/]\d{2}|\d{2}:\d{2}:\d{2}|\[\d{2}:\d{2}:\d{2}\])")
            .expect("valid regex")
    })
}

fn maintenance_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})\s+-\s+(.+)$").expect("valid regex"))
}

/// Detected text-file kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextLayout {
    Alerts,
    ErrorLog,
    Maintenance,
    Generic,
}

/// Sniff the file kind from its first lines
fn detect_layout(lines: &[String]) -> TextLayout {
    let preview: String = lines.iter().take(10).cloned().collect::<Vec<_>>().join("");
    if preview.contains("ALERT") || preview.contains("WARN") || preview.contains("CRITICAL") {
        TextLayout::Alerts
    } else if preview.contains("SRVO") || preview.contains("TEMP") || preview.contains("MOTN") {
        TextLayout::ErrorLog
    } else if preview.contains("Checked")
        || preview.contains("Replaced")
        || preview.contains("Calibrated")
        || preview.contains("Lubricated")
        || preview.contains("Inspected")
    {
        TextLayout::Maintenance
    } else {
        TextLayout::Generic
    }
}

/// Parse one text log stream into raw observations. `source_tag` (typically
/// the file stem) namespaces the generated event ids.
pub fn parse_text<R: BufRead>(reader: R, source_tag: &str) -> std::io::Result<Vec<RawObservation>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let layout = detect_layout(&lines);
    debug!(source = source_tag, ?layout, lines = lines.len(), "Detected text layout");

    let observations = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| match layout {
            TextLayout::Alerts => alert_observation(line, source_tag, index),
            TextLayout::ErrorLog => Some(error_observation(line, source_tag, index)),
            TextLayout::Maintenance => maintenance_observation(line, source_tag, index),
            TextLayout::Generic => Some(generic_observation(line, source_tag, index)),
        })
        .collect();

    Ok(observations)
}

/// `10:03:00 NOTICE: Vibration spike` — lines that don't fit are skipped
fn alert_observation(line: &str, source_tag: &str, index: usize) -> Option<RawObservation> {
    let captures = alert_re().captures(line)?;
    Some(RawObservation {
        source_event_id: Some(format!("alert_{source_tag}_{index}")),
        kind: SourceKind::SystemAlert,
        timestamp_raw: Some(captures[1].to_string()),
        severity_raw: Some(captures[2].to_string()),
        description: Some(captures[3].to_string()),
        raw_payload: line.to_string(),
        ..Default::default()
    })
}

/// Error-log line: fault code and timestamp pulled from anywhere in the
/// line, the whole line kept as the description
fn error_observation(line: &str, source_tag: &str, index: usize) -> RawObservation {
    let error_code = error_code_re()
        .captures(line)
        .map(|captures| captures[1].to_string());
    let timestamp_raw = log_timestamp_re()
        .captures(line)
        .map(|captures| captures[1].to_string());

    RawObservation {
        source_event_id: Some(format!("error_{source_tag}_{index}")),
        kind: SourceKind::ErrorLog,
        timestamp_raw,
        error_code,
        description: Some(line.to_string()),
        raw_payload: line.to_string(),
        ..Default::default()
    }
}

/// `2025-11-17 - Checked belts on axis 6.` — lines that don't fit are skipped
fn maintenance_observation(line: &str, source_tag: &str, index: usize) -> Option<RawObservation> {
    let captures = maintenance_re().captures(line)?;
    Some(RawObservation {
        source_event_id: Some(format!("maint_{source_tag}_{index}")),
        kind: SourceKind::MaintenanceNote,
        timestamp_raw: Some(captures[1].to_string()),
        status_raw: Some("resolved".to_string()),
        description: Some(captures[2].to_string()),
        raw_payload: line.to_string(),
        ..Default::default()
    })
}

fn generic_observation(line: &str, source_tag: &str, index: usize) -> RawObservation {
    RawObservation {
        source_event_id: Some(format!("txt_{source_tag}_{index}")),
        kind: SourceKind::Generic,
        description: Some(line.to_string()),
        raw_payload: line.to_string(),
        ..Default::default()
    }
}
