//! Record store - repository seam over the in-memory record pool
//!
//! The pool is an append-only ordered sequence of records for the lifetime
//! of a processing run; a full reprocessing run replaces it wholesale. The
//! trait keeps pipeline components off any ambient global state and leaves
//! a swap-in point for a persistent backing without touching pipeline
//! logic.

use crate::types::{Joint, Record, Severity, SourceKind};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::debug;

/// Filter for pool queries. All criteria are conjunctive; `None` matches
/// everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    pub severity: Option<Severity>,
    pub joint: Option<Joint>,
    pub kind: Option<SourceKind>,
    /// Minimum recurrence count (chronic-issue queries)
    pub min_recurrence: Option<u32>,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        self.severity.is_none_or(|s| record.severity == s)
            && self.joint.is_none_or(|j| record.joint == j)
            && self.kind.is_none_or(|k| record.source_kind == k)
            && self
                .min_recurrence
                .is_none_or(|min| record.recurrence_count >= min)
    }
}

/// Repository seam for the record pool
pub trait RecordStore: Send + Sync {
    /// Append one record
    fn append(&self, record: Record);

    /// Append many records, preserving order
    fn extend(&self, records: Vec<Record>);

    /// Find by record id or source event id
    fn find_by_id(&self, id: &str) -> Option<Record>;

    /// All records matching a filter, in insertion order
    fn query(&self, filter: &RecordFilter) -> Vec<Record>;

    /// Snapshot of the full pool, in insertion order
    fn all(&self) -> Vec<Record>;

    /// Replace the entire pool (full reprocessing run)
    fn replace_all(&self, records: Vec<Record>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory record pool
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<Record>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn append(&self, record: Record) {
        if let Ok(mut records) = self.records.write() {
            records.push(record);
        }
    }

    fn extend(&self, batch: Vec<Record>) {
        if let Ok(mut records) = self.records.write() {
            records.extend(batch);
        }
    }

    fn find_by_id(&self, id: &str) -> Option<Record> {
        self.records.read().ok().and_then(|records| {
            records
                .iter()
                .find(|r| {
                    r.record_id == id || r.source_event_id.as_deref() == Some(id)
                })
                .cloned()
        })
    }

    fn query(&self, filter: &RecordFilter) -> Vec<Record> {
        self.records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<Record> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    fn replace_all(&self, batch: Vec<Record>) {
        if let Ok(mut records) = self.records.write() {
            debug!(
                old = records.len(),
                new = batch.len(),
                "Replacing record pool"
            );
            *records = batch;
        }
    }

    fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }
}
