//! Chunking options.
//!
//! [`ChunkingOptions`] holds every knob the pipeline reads.
//! [`ChunkingOptionsPatch`] is the partial form used by
//! `Splitter::set_options`, per-call overrides and the CLI `--config` file.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default maximum chunk size in bytes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2000;

/// Default maximum lines per chunk.
pub const DEFAULT_MAX_LINES_PER_CHUNK: usize = 100;

/// Default overlap in bytes.
pub const DEFAULT_OVERLAP_SIZE: usize = 200;

/// Default minimum chunk size used by the filter and rebalancer.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 100;

/// Options controlling segmentation and post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingOptions {
    /// Maximum chunk size in bytes.
    pub max_chunk_size: usize,
    /// Maximum lines per chunk.
    pub max_lines_per_chunk: usize,
    /// Requested overlap in bytes.
    pub overlap_size: usize,
    /// Overlap may not exceed this share of `max_chunk_size`.
    pub max_overlap_ratio: f64,
    /// Enables the bracket-balance strategy.
    pub enable_bracket_balance: bool,
    /// Enables complexity-driven selection of the standardization strategy.
    pub enable_semantic_detection: bool,
    /// Enables overlap for code files.
    pub enable_code_overlap: bool,
    /// Enables the standardization strategy.
    pub enable_standardization: bool,
    /// Turns parser/normalizer failures into "try the next strategy".
    pub standardization_fallback: bool,
    /// Errors tolerated before forcing the line-only path.
    pub error_threshold: usize,
    /// Process memory limit in megabytes.
    pub memory_limit_mb: u64,
    /// Priority overrides keyed by strategy name.
    pub strategy_priorities: BTreeMap<String, u32>,
    /// Strategy to prefer when it can handle the input.
    pub preferred_strategy: Option<String>,
    /// Filter and rebalance settings.
    pub filter: FilterConfig,
    /// Resource protection settings.
    pub protection: ProtectionConfig,
    /// How long the error-threshold fallback stays active.
    pub error_reset_interval_ms: u64,
    /// Memory sampling period.
    pub memory_check_interval_ms: u64,
    /// Memory samples kept for trend analysis.
    pub memory_history_size: usize,
}

/// Small-chunk filter and rebalance settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Chunks below this size are candidates for merging.
    pub min_chunk_size: usize,
    /// Chunks above this size are split by the rebalancer.
    pub max_chunk_size: usize,
    /// Enables the small-chunk filter.
    pub enable_small_chunk_filter: bool,
    /// Enables the rebalancer.
    pub enable_chunk_rebalancing: bool,
    /// Enables quality scoring for code chunks.
    pub enable_quality_filter: bool,
    /// Quality floor in `[0, 1]`.
    pub min_quality: f64,
}

/// How aggressively the guards intervene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionLevel {
    /// Error threshold only.
    Low,
    /// Error threshold plus a memory check per request.
    #[default]
    Medium,
    /// Medium plus background memory monitoring.
    High,
}

/// Resource protection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Master switch for both guards.
    pub enable_protection: bool,
    /// Protection level.
    pub protection_level: ProtectionLevel,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            max_lines_per_chunk: DEFAULT_MAX_LINES_PER_CHUNK,
            overlap_size: DEFAULT_OVERLAP_SIZE,
            max_overlap_ratio: 0.3,
            enable_bracket_balance: true,
            enable_semantic_detection: true,
            enable_code_overlap: true,
            enable_standardization: true,
            standardization_fallback: true,
            error_threshold: 5,
            memory_limit_mb: 2048,
            strategy_priorities: default_priorities(),
            preferred_strategy: None,
            filter: FilterConfig::default(),
            protection: ProtectionConfig::default(),
            error_reset_interval_ms: 60_000,
            memory_check_interval_ms: 5_000,
            memory_history_size: 100,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            enable_small_chunk_filter: true,
            enable_chunk_rebalancing: true,
            enable_quality_filter: false,
            min_quality: 0.1,
        }
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            enable_protection: true,
            protection_level: ProtectionLevel::Medium,
        }
    }
}

fn default_priorities() -> BTreeMap<String, u32> {
    [("markdown", 1), ("standardization", 2), ("bracket", 4), ("line", 5)]
        .into_iter()
        .map(|(name, priority)| (name.to_string(), priority))
        .collect()
}

impl ChunkingOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for non-positive caps, an overlap not below
    /// the chunk size, ratios outside `[0, 1]`, or an inverted filter range.
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_chunk_size",
            }
            .into());
        }
        if self.max_lines_per_chunk == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_lines_per_chunk",
            }
            .into());
        }
        if self.overlap_size >= self.max_chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: self.overlap_size,
                size: self.max_chunk_size,
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.max_overlap_ratio) {
            return Err(ConfigError::InvalidRatio {
                field: "max_overlap_ratio",
                value: self.max_overlap_ratio,
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.filter.min_quality) {
            return Err(ConfigError::InvalidRatio {
                field: "filter.min_quality",
                value: self.filter.min_quality,
            }
            .into());
        }
        if self.filter.max_chunk_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "filter.max_chunk_size",
            }
            .into());
        }
        if self.filter.min_chunk_size > self.filter.max_chunk_size {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "filter.min_chunk_size {} exceeds filter.max_chunk_size {}",
                    self.filter.min_chunk_size, self.filter.max_chunk_size
                ),
            }
            .into());
        }
        if self.error_threshold == 0 {
            return Err(ConfigError::NonPositive {
                field: "error_threshold",
            }
            .into());
        }
        if self.memory_limit_mb == 0 {
            return Err(ConfigError::NonPositive {
                field: "memory_limit_mb",
            }
            .into());
        }
        if self.memory_history_size == 0 {
            return Err(ConfigError::NonPositive {
                field: "memory_history_size",
            }
            .into());
        }
        Ok(())
    }

    /// Overlap actually applied: `min(overlap_size, max_chunk_size * max_overlap_ratio)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use codesplit::core::ChunkingOptions;
    ///
    /// let options = ChunkingOptions {
    ///     max_chunk_size: 1000,
    ///     overlap_size: 500,
    ///     max_overlap_ratio: 0.2,
    ///     ..ChunkingOptions::default()
    /// };
    /// assert_eq!(options.effective_overlap(), 200);
    /// ```
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn effective_overlap(&self) -> usize {
        let ratio_cap = (self.max_chunk_size as f64 * self.max_overlap_ratio).floor() as usize;
        self.overlap_size.min(ratio_cap)
    }

    /// Upper bound used by the rebalancer: the tighter of both max sizes.
    #[must_use]
    pub fn rebalance_max(&self) -> usize {
        self.max_chunk_size.min(self.filter.max_chunk_size)
    }

    /// Memory limit in bytes.
    #[must_use]
    pub const fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }

    /// Returns the priority for a strategy, falling back to `default`.
    #[must_use]
    pub fn priority_for(&self, name: &str, default: u32) -> u32 {
        self.strategy_priorities.get(name).copied().unwrap_or(default)
    }

    /// Returns a copy with the patch applied.
    #[must_use]
    pub fn merged(&self, patch: &ChunkingOptionsPatch) -> Self {
        let mut options = self.clone();
        patch.apply_to(&mut options);
        options
    }
}

/// Partial options. Absent fields leave the target unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingOptionsPatch {
    /// See [`ChunkingOptions::max_chunk_size`].
    pub max_chunk_size: Option<usize>,
    /// See [`ChunkingOptions::max_lines_per_chunk`].
    pub max_lines_per_chunk: Option<usize>,
    /// See [`ChunkingOptions::overlap_size`].
    pub overlap_size: Option<usize>,
    /// See [`ChunkingOptions::max_overlap_ratio`].
    pub max_overlap_ratio: Option<f64>,
    /// See [`ChunkingOptions::enable_bracket_balance`].
    pub enable_bracket_balance: Option<bool>,
    /// See [`ChunkingOptions::enable_semantic_detection`].
    pub enable_semantic_detection: Option<bool>,
    /// See [`ChunkingOptions::enable_code_overlap`].
    pub enable_code_overlap: Option<bool>,
    /// See [`ChunkingOptions::enable_standardization`].
    pub enable_standardization: Option<bool>,
    /// See [`ChunkingOptions::standardization_fallback`].
    pub standardization_fallback: Option<bool>,
    /// See [`ChunkingOptions::error_threshold`].
    pub error_threshold: Option<usize>,
    /// See [`ChunkingOptions::memory_limit_mb`].
    pub memory_limit_mb: Option<u64>,
    /// Entries merged into [`ChunkingOptions::strategy_priorities`].
    pub strategy_priorities: Option<BTreeMap<String, u32>>,
    /// See [`ChunkingOptions::preferred_strategy`].
    pub preferred_strategy: Option<String>,
    /// See [`FilterConfig::min_chunk_size`].
    pub min_chunk_size: Option<usize>,
    /// See [`FilterConfig::max_chunk_size`].
    pub filter_max_chunk_size: Option<usize>,
    /// See [`FilterConfig::enable_small_chunk_filter`].
    pub enable_small_chunk_filter: Option<bool>,
    /// See [`FilterConfig::enable_chunk_rebalancing`].
    pub enable_chunk_rebalancing: Option<bool>,
    /// See [`FilterConfig::enable_quality_filter`].
    pub enable_quality_filter: Option<bool>,
    /// See [`FilterConfig::min_quality`].
    pub min_quality: Option<f64>,
    /// See [`ProtectionConfig::enable_protection`].
    pub enable_protection: Option<bool>,
    /// See [`ProtectionConfig::protection_level`].
    pub protection_level: Option<ProtectionLevel>,
    /// See [`ChunkingOptions::error_reset_interval_ms`].
    pub error_reset_interval_ms: Option<u64>,
    /// See [`ChunkingOptions::memory_check_interval_ms`].
    pub memory_check_interval_ms: Option<u64>,
    /// See [`ChunkingOptions::memory_history_size`].
    pub memory_history_size: Option<usize>,
}

macro_rules! apply_fields {
    ($patch:expr, $target:expr, { $($field:ident => $($path:ident).+),* $(,)? }) => {
        $(
            if let Some(value) = $patch.$field.clone() {
                $target.$($path).+ = value;
            }
        )*
    };
}

impl ChunkingOptionsPatch {
    /// Applies the patch in place.
    pub fn apply_to(&self, options: &mut ChunkingOptions) {
        apply_fields!(self, options, {
            max_chunk_size => max_chunk_size,
            max_lines_per_chunk => max_lines_per_chunk,
            overlap_size => overlap_size,
            max_overlap_ratio => max_overlap_ratio,
            enable_bracket_balance => enable_bracket_balance,
            enable_semantic_detection => enable_semantic_detection,
            enable_code_overlap => enable_code_overlap,
            enable_standardization => enable_standardization,
            standardization_fallback => standardization_fallback,
            error_threshold => error_threshold,
            memory_limit_mb => memory_limit_mb,
            min_chunk_size => filter.min_chunk_size,
            filter_max_chunk_size => filter.max_chunk_size,
            enable_small_chunk_filter => filter.enable_small_chunk_filter,
            enable_chunk_rebalancing => filter.enable_chunk_rebalancing,
            enable_quality_filter => filter.enable_quality_filter,
            min_quality => filter.min_quality,
            enable_protection => protection.enable_protection,
            protection_level => protection.protection_level,
            error_reset_interval_ms => error_reset_interval_ms,
            memory_check_interval_ms => memory_check_interval_ms,
            memory_history_size => memory_history_size,
        });

        if let Some(priorities) = &self.strategy_priorities {
            options
                .strategy_priorities
                .extend(priorities.iter().map(|(k, v)| (k.clone(), *v)));
        }
        if let Some(preferred) = &self.preferred_strategy {
            options.preferred_strategy = if preferred.is_empty() || preferred == "auto" {
                None
            } else {
                Some(preferred.clone())
            };
        }
    }

    /// Parses a patch from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed JSON or unknown keys.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ConfigError::Invalid {
                reason: format!("invalid options JSON: {e}"),
            }
            .into()
        })
    }

    /// Returns true when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
