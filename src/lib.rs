//! ARMWATCH: Industrial Robot Maintenance Operational Intelligence
//!
//! Normalization + deduplication + similarity + triage-scoring pipeline for
//! heterogeneous robot telemetry.
//!
//! ## Architecture
//!
//! - **Ingestion Adapters**: per-source-format parsing into a normalized
//!   intermediate observation
//! - **Normalizer**: deterministic rules producing the canonical record
//!   schema (timestamps, joints, collision types, force, severity)
//! - **Deduplicator**: (joint, date) recurrence annotation
//! - **Similarity Engine**: explainable weighted precedent lookup
//! - **Triage Scorer**: oracle-advised scoring bounded by deterministic
//!   severity floors — the oracle is advisory, never authoritative
//! - **Quality Metrics**: extraction-quality and deduplication reports

pub mod config;
pub mod types;
pub mod ingest;
pub mod normalize;
pub mod dedup;
pub mod similarity;
pub mod triage;
pub mod store;
pub mod quality;
pub mod pipeline;

// Re-export configuration
pub use config::PipelineConfig;

// Re-export commonly used types
pub use types::{
    CollisionType, ConfidenceFlag, Joint, MaintenanceReport, MaintenanceStatus, OracleAssessment,
    Priority, PromptKind, RawObservation, Record, SensorChannels, Severity, SourceKind,
    TriageResult,
};

// Re-export pipeline components
pub use dedup::annotate_recurrence;
pub use normalize::{validate, Normalizer};
pub use similarity::{MatchReason, SimilarMatch, SimilarityEngine};
pub use store::{InMemoryStore, RecordFilter, RecordStore};
pub use triage::{
    score_batch, HeuristicOracle, HttpOracle, RecommendationOracle, TimeoutOracle, TriageScorer,
};

// Re-export reports
pub use quality::{assess_quality, dedup_stats, DedupStats, QualityReport};
