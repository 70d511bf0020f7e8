//! ARMWATCH - Industrial Robot Maintenance Operational Intelligence
//!
//! Batch triage runner: ingests a directory of robot telemetry files,
//! normalizes and deduplicates the observations, scores every record for
//! maintenance urgency, and prints a ranked priority queue plus an
//! extraction-quality report.
//!
//! # Usage
//!
//! ```bash
//! # Score everything in ./data with the local heuristic
//! armwatch --data-dir ./data --skip-oracle
//!
//! # Score with a live oracle deployment
//! ARMWATCH_ORACLE_ENDPOINT=https://... ARMWATCH_ORACLE_API_KEY=... \
//!     armwatch --data-dir ./data
//! ```
//!
//! # Environment Variables
//!
//! - `ARMWATCH_CONFIG`: Path to a pipeline config TOML
//! - `ARMWATCH_ORACLE_ENDPOINT` / `ARMWATCH_ORACLE_API_KEY` /
//!   `ARMWATCH_ORACLE_DEPLOYMENT` / `ARMWATCH_ORACLE_API_VERSION`:
//!   Recommendation Oracle deployment
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::Result;
use armwatch::config::PipelineConfig;
use armwatch::ingest::FileStatus;
use armwatch::pipeline::process_batch;
use armwatch::quality::{assess_quality, dedup_stats};
use armwatch::similarity::SimilarityEngine;
use armwatch::store::{InMemoryStore, RecordStore};
use armwatch::triage::{
    score_batch, HeuristicOracle, HttpOracle, RecommendationOracle, TimeoutOracle, TriageScorer,
};
use armwatch::types::TriageResult;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "armwatch")]
#[command(about = "ARMWATCH Robot Maintenance Triage")]
#[command(version)]
struct CliArgs {
    /// Directory of telemetry files (*.csv, *.txt) to process
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Skip the Recommendation Oracle and score with the local heuristic
    /// only (fast mode)
    #[arg(long)]
    skip_oracle: bool,

    /// Maximum records shown in the priority queue
    #[arg(long, default_value = "20")]
    limit: usize,

    /// Path to a pipeline config TOML (overrides ARMWATCH_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-call oracle timeout in seconds (overrides config)
    #[arg(long)]
    oracle_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load_from(path),
        None => PipelineConfig::load(),
    };
    let timeout_secs = args
        .oracle_timeout_secs
        .unwrap_or(config.oracle.timeout_secs);

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  ARMWATCH - Robot Maintenance Triage");
    info!("  Data: {}", args.data_dir.display());
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // Ingest -> normalize -> validate -> dedup -> store
    let store = InMemoryStore::new();
    let outcome = process_batch(&args.data_dir, &config, &store)?;

    for report in &outcome.file_reports {
        match &report.status {
            FileStatus::Success => {
                info!("  {} -> {} events", report.filename, report.events_count);
            }
            FileStatus::Error(message) => {
                warn!("  {} -> FAILED: {}", report.filename, message);
            }
        }
    }
    info!(
        "Files: {} | Raw events: {} | Stored: {} | Invalid: {}",
        outcome.file_reports.len(),
        outcome.raw_count,
        outcome.stored_count,
        outcome.invalid_count
    );

    if store.is_empty() {
        warn!("No records to score");
        return Ok(());
    }

    // Score the pool
    let pool = store.all();
    let engine = SimilarityEngine::new(config.similarity.clone());
    let scorer = TriageScorer::new(&config.oracle);

    let results = if args.skip_oracle {
        info!("Fast mode: heuristic scoring only");
        score_batch(&pool, &engine, &scorer, &HeuristicOracle).await
    } else {
        match HttpOracle::from_env() {
            Some(oracle) => {
                let oracle = TimeoutOracle::new(oracle, Duration::from_secs(timeout_secs));
                score_batch(&pool, &engine, &scorer, &oracle).await
            }
            None => {
                warn!("Oracle not configured, falling back to heuristic scoring");
                score_batch(&pool, &engine, &scorer, &HeuristicOracle).await
            }
        }
    };

    print_priority_queue(&store, &results, args.limit);

    // Extraction-quality and dedup reports
    let quality = assess_quality(&pool, &config.quality);
    let stats = dedup_stats(&pool);
    info!(
        "Extraction quality: {:.1} (target {:.0}, {}) | valid {}/{}",
        quality.overall_score,
        config.quality.target_score,
        if quality.meets_target { "met" } else { "NOT met" },
        quality.valid_records,
        quality.total_records
    );
    info!(
        "Dedup: {} records in {} groups, {:.1}% duplication",
        stats.total_records, stats.unique_groups, stats.duplication_rate
    );
    if let Some(cache) = scorer.cache_stats() {
        info!(
            "Oracle cache: {} hits / {} misses ({:.1}% hit rate)",
            cache.hits, cache.misses, cache.hit_rate
        );
    }

    Ok(())
}

/// Print the ranked priority queue, highest score first
fn print_priority_queue(store: &dyn RecordStore, results: &[TriageResult], limit: usize) {
    let mut ranked: Vec<&TriageResult> = results.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!();
    println!("  PRIORITY QUEUE (top {limit})");
    println!("  {:-<78}", "");
    println!(
        "  {:<6} {:>6}  {:<8} {:<9} {:>5}  {}",
        "PRIO", "SCORE", "JOINT", "SEVERITY", "RECUR", "DESCRIPTION"
    );
    for result in ranked.iter().take(limit) {
        let Some(record) = store.find_by_id(&result.record_id) else {
            continue;
        };
        let mut description = record.description.clone();
        if description.chars().count() > 40 {
            description = format!("{}...", description.chars().take(37).collect::<String>());
        }
        println!(
            "  {:<6} {:>6.1}  {:<8} {:<9} {:>5}  {}",
            result.priority.to_string(),
            result.score,
            record.joint.to_string(),
            record.severity.to_string(),
            record.recurrence_count,
            description
        );
    }
    println!();
}
