//! Batch pipeline composition
//!
//! Wires the stages together for one processing run:
//!
//! ```text
//! ingest (per-file adapters) -> normalize -> validate -> dedup -> store
//! ```
//!
//! Scoring runs on demand afterwards (see `triage::score_batch`) and the
//! quality reports read the stored pool at any time. A full run replaces
//! the pool wholesale; invalid records are logged and excluded without
//! aborting the batch.

use crate::config::PipelineConfig;
use crate::dedup::annotate_recurrence;
use crate::ingest::{self, FileReport, IngestError};
use crate::normalize::{validate, Normalizer};
use crate::store::RecordStore;
use std::path::Path;
use tracing::{info, warn};

/// Outcome summary of one batch processing run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub file_reports: Vec<FileReport>,
    /// Raw observations extracted across all files
    pub raw_count: usize,
    /// Records that passed validation and entered the pool
    pub stored_count: usize,
    /// Records excluded by validation
    pub invalid_count: usize,
}

/// Run the full ingest -> normalize -> validate -> dedup chain over a data
/// directory and rebuild the store with the result.
pub fn process_batch(
    data_dir: &Path,
    config: &PipelineConfig,
    store: &dyn RecordStore,
) -> Result<BatchOutcome, IngestError> {
    let (observations, file_reports) = ingest::process_dir(data_dir)?;
    let raw_count = observations.len();

    let normalizer = Normalizer::new(config.normalize.clone());
    let mut records = Vec::with_capacity(raw_count);
    let mut invalid_count = 0usize;
    for observation in &observations {
        let record = normalizer.normalize(observation);
        let issues = validate(&record, &config.normalize);
        if issues.is_empty() {
            records.push(record);
        } else {
            invalid_count += 1;
            warn!(
                source_event_id = ?record.source_event_id,
                issues = ?issues.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Record failed validation, excluded from pool"
            );
        }
    }

    annotate_recurrence(&mut records);
    let stored_count = records.len();
    store.replace_all(records);

    info!(
        files = file_reports.len(),
        raw = raw_count,
        stored = stored_count,
        invalid = invalid_count,
        "Batch processing complete"
    );

    Ok(BatchOutcome {
        file_reports,
        raw_count,
        stored_count,
        invalid_count,
    })
}
