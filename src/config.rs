//! Pipeline Configuration - All triage thresholds as operator-tunable TOML values
//!
//! Every threshold that would otherwise be hardcoded is a field in this
//! module. Each struct implements `Default` with values matching the
//! reference constants, ensuring zero-change behavior when no config file is
//! present.
//!
//! ## Loading Order
//!
//! 1. `ARMWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `armwatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded config is passed explicitly into each pipeline component —
//! there is no ambient global.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Root configuration for the triage pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Normalization thresholds (force range, severity steps)
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Similarity engine weights and limits
    #[serde(default)]
    pub similarity: SimilarityConfig,

    /// Extraction-quality report weights
    #[serde(default)]
    pub quality: QualityConfig,

    /// Recommendation Oracle plumbing
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$ARMWATCH_CONFIG` environment variable
    /// 2. `./armwatch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ARMWATCH_CONFIG") {
            return Self::load_from(Path::new(&path));
        }
        let local = Path::new("armwatch.toml");
        if local.exists() {
            return Self::load_from(local);
        }
        Self::default()
    }

    /// Load from an explicit path, falling back to defaults on any error
    /// (a malformed config file must not abort batch processing).
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<PipelineConfig>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded pipeline config");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read config file, using defaults");
                Self::default()
            }
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Thresholds used by the Normalizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Minimum acceptable force value (N)
    pub force_min: f64,
    /// Maximum acceptable force value (N); out-of-range values are
    /// discarded, never clamped
    pub force_max: f64,
    /// Vibration (g) to force-equivalent (N) conversion factor.
    /// An approximation carried over from the field calibration sheet,
    /// not a physical law — tunable.
    pub vibration_force_factor: f64,
    /// Force below this is `low` severity (N)
    pub severity_low_below: f64,
    /// Force below this is `med` severity (N)
    pub severity_med_below: f64,
    /// Force below this is `high` severity (N); at or above is `critical`
    pub severity_high_below: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            force_min: 0.0,
            force_max: 10_000.0,
            vibration_force_factor: 100.0,
            severity_low_below: 300.0,
            severity_med_below: 600.0,
            severity_high_below: 800.0,
        }
    }
}

// ============================================================================
// Similarity
// ============================================================================

/// Weights and limits for the similarity engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Weight for a same-source-kind match
    pub kind_weight: f64,
    /// Weight applied to the description similarity ratio
    pub description_weight: f64,
    /// Weight for an exact error-code match
    pub error_code_weight: f64,
    /// Weight for a same-severity match
    pub severity_weight: f64,
    /// Bonus per shared domain keyword
    pub keyword_bonus: f64,
    /// Cap on the total keyword bonus
    pub keyword_bonus_cap: f64,
    /// Minimum total score for a match to qualify
    pub threshold: f64,
    /// Default maximum number of matches returned
    pub default_limit: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            kind_weight: 0.4,
            description_weight: 0.3,
            error_code_weight: 0.2,
            severity_weight: 0.1,
            keyword_bonus: 0.05,
            keyword_bonus_cap: 0.2,
            threshold: 0.3,
            default_limit: 10,
        }
    }
}

// ============================================================================
// Quality report
// ============================================================================

/// Field weights for the extraction-quality score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    pub timestamp_weight: f64,
    pub joint_weight: f64,
    pub severity_weight: f64,
    pub force_weight: f64,
    pub collision_weight: f64,
    /// Weighted score at or above this meets the extraction target
    pub target_score: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            timestamp_weight: 0.25,
            joint_weight: 0.25,
            severity_weight: 0.20,
            force_weight: 0.15,
            collision_weight: 0.15,
            target_score: 75.0,
        }
    }
}

// ============================================================================
// Oracle
// ============================================================================

/// Recommendation Oracle plumbing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Maximum cached oracle responses (insertion-order eviction)
    pub cache_capacity: usize,
    /// Caller-side timeout for one oracle call (seconds); a timed-out call
    /// is treated as oracle-unavailable and falls back to the heuristic
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            timeout_secs: 60,
        }
    }
}
