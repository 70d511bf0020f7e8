//! Timestamp normalization
//!
//! Raw observations carry timestamps in whatever shape the source emitted:
//! full datetimes with or without fractional seconds, slash- or
//! dash-delimited dates, bare dates, bare times, bracketed times. The
//! parser tries a fixed ordered list of known formats; the first match
//! wins. Ordered-first-match trades precision for determinism — an
//! ambiguous string resolves the same way every run.
//!
//! Fallback ladder:
//! - date-only match: time defaults to midnight
//! - time-only match: date defaults to the current processing date
//! - mixed/mangled strings: regex salvage of separate date / time fragments
//! - nothing matches: current timestamp, flagged as inferred

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

/// One entry in the ordered format table. Data, not control flow — tests can
/// enumerate exactly which format a given string resolves under.
#[derive(Debug, Clone, Copy)]
enum FormatRule {
    /// Full date + time format
    DateTime(&'static str),
    /// Date-only format; time-of-day defaults to midnight
    DateOnly(&'static str),
    /// Time-only format; date defaults to the processing date
    TimeOnly(&'static str),
}

/// Known timestamp formats, tried in order. First match wins.
const TIMESTAMP_FORMATS: &[FormatRule] = &[
    FormatRule::DateTime("%Y-%m-%d %H:%M:%S"),
    FormatRule::DateTime("%Y-%m-%dT%H:%M:%S"),
    FormatRule::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    FormatRule::DateTime("%Y/%m/%d %H:%M:%S"),
    FormatRule::DateTime("%Y/%m/%d %H:%M"),
    FormatRule::DateOnly("%Y-%m-%d"),
    FormatRule::DateOnly("%Y/%m/%d"),
    FormatRule::TimeOnly("%H:%M:%S"),
    FormatRule::TimeOnly("%H:%M"),
];

fn date_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}[-/]\d{2}[-/]\d{2})").expect("valid regex"))
}

fn time_fragment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{2}:\d{2}:\d{2}|\d{2}:\d{2})").expect("valid regex"))
}

/// Result of timestamp normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimestamp {
    /// Normalized timestamp, always resolvable to a date and time-of-day
    pub datetime: NaiveDateTime,
    /// True when nothing matched and the timestamp fell back to `now`
    pub inferred: bool,
}

/// Normalize a raw timestamp string against the ordered format table.
///
/// `now` is the processing timestamp, supplied by the caller so the
/// time-only and total-fallback paths stay testable.
pub fn normalize_timestamp(raw: Option<&str>, now: NaiveDateTime) -> ParsedTimestamp {
    let Some(raw) = raw else {
        return ParsedTimestamp {
            datetime: now,
            inferred: true,
        };
    };

    let mut candidate = raw.trim();
    // Strip surrounding brackets: [09:18:37]
    if candidate.starts_with('[') && candidate.ends_with(']') {
        candidate = &candidate[1..candidate.len() - 1];
    }
    if candidate.is_empty() {
        return ParsedTimestamp {
            datetime: now,
            inferred: true,
        };
    }

    for rule in TIMESTAMP_FORMATS {
        match rule {
            FormatRule::DateTime(fmt) => {
                if let Ok(dt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                    return ParsedTimestamp {
                        datetime: dt,
                        inferred: false,
                    };
                }
            }
            FormatRule::DateOnly(fmt) => {
                if let Ok(date) = NaiveDate::parse_from_str(candidate, fmt) {
                    return ParsedTimestamp {
                        datetime: date.and_hms_opt(0, 0, 0).unwrap_or(now),
                        inferred: false,
                    };
                }
            }
            FormatRule::TimeOnly(fmt) => {
                if let Ok(time) = NaiveTime::parse_from_str(candidate, fmt) {
                    return ParsedTimestamp {
                        datetime: now.date().and_time(time),
                        inferred: false,
                    };
                }
            }
        }
    }

    // Salvage pass: the string may embed recognizable date / time fragments
    // surrounded by noise (e.g. "ERROR 2025-11-17 09:59:45 SRVO-050").
    let date_frag = date_fragment_re()
        .captures(candidate)
        .and_then(|c| c.get(1))
        .and_then(|m| NaiveDate::parse_from_str(&m.as_str().replace('/', "-"), "%Y-%m-%d").ok());
    let time_frag = time_fragment_re()
        .captures(candidate)
        .and_then(|c| c.get(1))
        .and_then(|m| {
            let s = m.as_str();
            if s.len() == 8 {
                NaiveTime::parse_from_str(s, "%H:%M:%S").ok()
            } else {
                NaiveTime::parse_from_str(s, "%H:%M").ok()
            }
        });

    match (date_frag, time_frag) {
        (Some(date), Some(time)) => ParsedTimestamp {
            datetime: date.and_time(time),
            inferred: false,
        },
        (Some(date), None) => ParsedTimestamp {
            datetime: date.and_hms_opt(0, 0, 0).unwrap_or(now),
            inferred: false,
        },
        (None, Some(time)) => ParsedTimestamp {
            datetime: now.date().and_time(time),
            inferred: false,
        },
        (None, None) => ParsedTimestamp {
            datetime: now,
            inferred: true,
        },
    }
}
