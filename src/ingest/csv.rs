//! CSV ingestion adapters
//!
//! Parses robot telemetry CSVs into `RawObservation`s. Three layouts are
//! recognized, auto-detected from the header row:
//!
//! - **Sensor readings**: `Timestamp, Temperature_C, Vibration_g,
//!   Axis1_deg..Axis6_deg` (plus optional `Force_N` / `Torque_Nm` / `Axis`)
//! - **Performance metrics**: `Timestamp, Metric1..Metric4`
//! - **Generic**: anything else — best-effort description and timestamp
//!   from commonly-named columns
//!
//! Parsing is header-indexed and tolerant: missing cells become absent
//! fields, malformed numbers are skipped, and one bad row never fails the
//! file.

use crate::types::{RawObservation, SensorChannels, SourceKind};
use std::io::BufRead;
use tracing::debug;

/// Split a CSV line, honoring double-quoted fields with `""` escapes
pub(crate) fn csv_split(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                fields.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Detected CSV layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvLayout {
    Sensor,
    Performance,
    Generic,
}

/// Maps CSV column names to indices for the detected layout
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    timestamp: Option<usize>,
    temperature: Option<usize>,
    vibration: Option<usize>,
    force: Option<usize>,
    torque: Option<usize>,
    axis_angles: [Option<usize>; 6],
    axis: Option<usize>,
    description: Option<usize>,
    severity: Option<usize>,
    status: Option<usize>,
    error_code: Option<usize>,
    /// Named numeric metric columns (performance layout)
    metrics: Vec<(String, usize)>,
    /// All column names, for generic description synthesis
    columns: Vec<String>,
}

impl ColumnMap {
    fn from_header(header: &str) -> (CsvLayout, Self) {
        let columns = csv_split(header);
        let mut map = Self {
            columns: columns.iter().map(|c| c.trim().to_string()).collect(),
            ..Self::default()
        };

        for (index, raw_name) in columns.iter().enumerate() {
            let name = raw_name.trim();
            let lower = name.to_lowercase();
            let slot = match lower.as_str() {
                "timestamp" | "time" | "date" => &mut map.timestamp,
                "temperature_c" | "temperature" => &mut map.temperature,
                "vibration_g" | "vibration" => &mut map.vibration,
                "force_n" | "force" | "force_value" => &mut map.force,
                "torque_nm" | "torque" => &mut map.torque,
                "axis" => &mut map.axis,
                "description" | "message" | "error" => &mut map.description,
                "severity" | "level" => &mut map.severity,
                "status" => &mut map.status,
                "error_code" => &mut map.error_code,
                _ => {
                    if let Some(axis_number) = lower
                        .strip_prefix("axis")
                        .and_then(|rest| rest.strip_suffix("_deg"))
                        .and_then(|n| n.parse::<usize>().ok())
                    {
                        if (1..=6).contains(&axis_number) {
                            map.axis_angles[axis_number - 1] = Some(index);
                        }
                    } else if lower.starts_with("metric") {
                        map.metrics.push((name.to_string(), index));
                    }
                    continue;
                }
            };
            slot.get_or_insert(index);
        }

        let layout = if map.temperature.is_some() || map.vibration.is_some() {
            CsvLayout::Sensor
        } else if !map.metrics.is_empty() {
            CsvLayout::Performance
        } else {
            CsvLayout::Generic
        };

        (layout, map)
    }

    fn cell<'a>(&self, row: &'a [String], index: Option<usize>) -> Option<&'a str> {
        index
            .and_then(|i| row.get(i))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
    }

    fn numeric_cell(&self, row: &[String], index: Option<usize>) -> Option<f64> {
        self.cell(row, index).and_then(|cell| cell.parse().ok())
    }
}

/// Parse one CSV stream into raw observations. `source_tag` (typically the
/// file stem) namespaces the generated event ids.
pub fn parse_csv<R: BufRead>(reader: R, source_tag: &str) -> std::io::Result<Vec<RawObservation>> {
    let mut lines = reader.lines();
    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if !line.trim().is_empty() {
                    break line;
                }
            }
            None => return Ok(Vec::new()),
        }
    };

    let (layout, map) = ColumnMap::from_header(&header);
    debug!(source = source_tag, ?layout, "Detected CSV layout");

    let mut observations = Vec::new();
    for (row_index, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = csv_split(&line);
        let observation = match layout {
            CsvLayout::Sensor => sensor_observation(&map, &row, &line, source_tag, row_index),
            CsvLayout::Performance => {
                performance_observation(&map, &row, &line, source_tag, row_index)
            }
            CsvLayout::Generic => generic_observation(&map, &row, &line, source_tag, row_index),
        };
        observations.push(observation);
    }

    Ok(observations)
}

fn sensor_observation(
    map: &ColumnMap,
    row: &[String],
    line: &str,
    source_tag: &str,
    row_index: usize,
) -> RawObservation {
    let mut channels = SensorChannels {
        temperature: map.numeric_cell(row, map.temperature),
        vibration: map.numeric_cell(row, map.vibration),
        force: map.numeric_cell(row, map.force),
        torque: map.numeric_cell(row, map.torque),
        axis: map
            .cell(row, map.axis)
            .and_then(|cell| cell.parse::<i64>().ok()),
        ..Default::default()
    };
    for (slot, index) in channels
        .axis_angles
        .iter_mut()
        .zip(map.axis_angles.iter().copied())
    {
        *slot = map.numeric_cell(row, index);
    }

    RawObservation {
        source_event_id: Some(format!("sensor_{source_tag}_{row_index}")),
        kind: SourceKind::SensorReading,
        timestamp_raw: map.cell(row, map.timestamp).map(str::to_string),
        severity_raw: map.cell(row, map.severity).map(str::to_string),
        status_raw: map.cell(row, map.status).map(str::to_string),
        error_code: map.cell(row, map.error_code).map(str::to_string),
        description: Some(sensor_description(&channels)),
        channels,
        raw_payload: line.to_string(),
    }
}

/// Human-readable description synthesized from the sensor channels
fn sensor_description(channels: &SensorChannels) -> String {
    let mut parts = Vec::new();
    if let Some(temperature) = channels.temperature {
        if temperature > 40.0 {
            parts.push(format!("High temperature: {temperature}°C"));
        } else if temperature < 20.0 {
            parts.push(format!("Low temperature: {temperature}°C"));
        }
    }
    if let Some(vibration) = channels.vibration {
        if vibration > 0.2 {
            parts.push(format!("High vibration: {vibration}g"));
        }
    }
    if parts.is_empty() {
        "Sensor reading recorded".to_string()
    } else {
        parts.join("; ")
    }
}

fn performance_observation(
    map: &ColumnMap,
    row: &[String],
    line: &str,
    source_tag: &str,
    row_index: usize,
) -> RawObservation {
    let metrics: Vec<(String, f64)> = map
        .metrics
        .iter()
        .filter_map(|(name, index)| {
            map.numeric_cell(row, Some(*index))
                .map(|value| (name.clone(), value))
        })
        .collect();

    let timestamp = map.cell(row, map.timestamp).map(str::to_string);
    let description = format!(
        "Performance metrics recorded at {}",
        timestamp.as_deref().unwrap_or("unknown time")
    );

    RawObservation {
        source_event_id: Some(format!("perf_{source_tag}_{row_index}")),
        kind: SourceKind::PerformanceMetric,
        timestamp_raw: timestamp,
        description: Some(description),
        channels: SensorChannels {
            metrics,
            ..Default::default()
        },
        raw_payload: line.to_string(),
        ..Default::default()
    }
}

fn generic_observation(
    map: &ColumnMap,
    row: &[String],
    line: &str,
    source_tag: &str,
    row_index: usize,
) -> RawObservation {
    // Description from a named column, else up to three "name: value" pairs
    let description = map
        .cell(row, map.description)
        .map(str::to_string)
        .or_else(|| {
            let pairs: Vec<String> = map
                .columns
                .iter()
                .enumerate()
                .filter(|(_, name)| {
                    let lower = name.to_lowercase();
                    !matches!(lower.as_str(), "timestamp" | "time" | "date" | "id" | "index")
                })
                .filter_map(|(index, name)| {
                    map.cell(row, Some(index))
                        .map(|value| format!("{name}: {value}"))
                })
                .take(3)
                .collect();
            (!pairs.is_empty()).then(|| pairs.join(" | "))
        })
        .unwrap_or_else(|| format!("Data event from row {row_index}"));

    RawObservation {
        source_event_id: Some(format!("generic_{source_tag}_{row_index}")),
        kind: SourceKind::Generic,
        timestamp_raw: map.cell(row, map.timestamp).map(str::to_string),
        severity_raw: map.cell(row, map.severity).map(str::to_string),
        status_raw: map.cell(row, map.status).map(str::to_string),
        error_code: map.cell(row, map.error_code).map(str::to_string),
        description: Some(description),
        raw_payload: line.to_string(),
        ..Default::default()
    }
}
