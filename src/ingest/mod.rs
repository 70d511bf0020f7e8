//! Ingestion - per-source adapters and the batch driver
//!
//! Every source format gets its own adapter that maps raw fields into the
//! normalized `RawObservation` intermediate before the Normalizer runs; the
//! Normalizer's rules never probe source-format column names.
//!
//! Batch semantics are partial-failure: one unreadable file or malformed
//! line never aborts the batch. Per-file success/failure lands in a
//! `FileReport` for the caller to surface.

mod csv;
mod text;

pub use csv::parse_csv;
pub use text::parse_text;

use crate::types::RawObservation;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Ingestion failure for one file
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),
    #[error("Data directory not found: {0}")]
    DataDirNotFound(PathBuf),
}

/// Per-file outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub filename: String,
    pub events_count: usize,
    pub status: FileStatus,
}

/// Success or failure marker for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Success,
    Error(String),
}

/// File formats the adapters understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Text,
}

/// Detect file format from the extension. Unknown extensions are treated
/// as text — free-form logs show up with all sorts of suffixes.
fn detect_format(path: &Path) -> FileFormat {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("csv") => FileFormat::Csv,
        _ => FileFormat::Text,
    }
}

/// Parse one file into raw observations
pub fn process_file(path: &Path) -> Result<Vec<RawObservation>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);
    let source_tag = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("file")
        .to_string();

    let observations = match detect_format(path) {
        FileFormat::Csv => parse_csv(reader, &source_tag),
        FileFormat::Text => parse_text(reader, &source_tag),
    }
    .map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        file = %path.display(),
        events = observations.len(),
        "Processed file"
    );
    Ok(observations)
}

/// Process every `.csv` and `.txt` file in a directory, in filename order.
///
/// Individual file failures are recorded and skipped; only a missing or
/// unreadable directory is an error.
pub fn process_dir(dir: &Path) -> Result<(Vec<RawObservation>, Vec<FileReport>), IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::DataDirNotFound(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|source| IngestError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase).as_deref(),
                Some("csv") | Some("txt")
            )
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        warn!(dir = %dir.display(), "No CSV or TXT files found");
    }

    let mut observations = Vec::new();
    let mut reports = Vec::new();
    for path in paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown")
            .to_string();
        match process_file(&path) {
            Ok(batch) => {
                reports.push(FileReport {
                    filename,
                    events_count: batch.len(),
                    status: FileStatus::Success,
                });
                observations.extend(batch);
            }
            Err(e) => {
                error!(file = %filename, error = %e, "File failed, continuing batch");
                reports.push(FileReport {
                    filename,
                    events_count: 0,
                    status: FileStatus::Error(e.to_string()),
                });
            }
        }
    }

    Ok((observations, reports))
}
