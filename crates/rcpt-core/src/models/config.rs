//! Configuration structures for the extraction pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::text::Locale;

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// Pipeline-level extraction configuration.
    pub extraction: ExtractionConfig,

    /// Stage thresholds and heuristic weights.
    pub stages: StageConfig,

    /// Result validation configuration.
    pub validation: ValidationConfig,

    /// Text normalization configuration.
    pub normalizer: NormalizerConfig,
}

/// Pipeline-level extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Vendor hint used when a request carries none.
    pub default_vendor: Option<String>,

    /// JSON file with additional pattern definitions.
    pub pattern_file: Option<PathBuf>,

    /// Locale hint for the normalizer.
    pub locale: Locale,

    /// Resolve item lines on the rayon thread pool.
    pub parallel: bool,

    /// Minimum number of item lines before parallel resolution kicks in.
    pub parallel_min_lines: usize,

    /// Maximum accepted size of the raw text in bytes; unlimited when unset.
    pub max_input_bytes: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_vendor: None,
            pattern_file: None,
            locale: Locale::Auto,
            parallel: true,
            parallel_min_lines: 32,
            max_input_bytes: None,
        }
    }
}

/// Stage thresholds and heuristic weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Minimum confidence for a strict candidate to be accepted.
    pub strict_threshold: f32,

    /// Minimum confidence for a flexible candidate to be accepted.
    pub flexible_threshold: f32,

    /// Scoring weights of the heuristic fallback.
    pub heuristic: HeuristicWeights,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            strict_threshold: 0.8,
            flexible_threshold: 0.5,
            heuristic: HeuristicWeights::default(),
        }
    }
}

/// Tunable scoring parameters of the heuristic stage.
///
/// The defaults keep heuristic confidence within roughly 0.3..0.6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    /// Score every heuristic candidate starts from.
    pub base: f32,
    /// Bonus when a trailing price token was found.
    pub price_found: f32,
    /// Bonus when the price carried a currency marker.
    pub currency_marker: f32,
    /// Bonus when a quantity token was found.
    pub quantity_found: f32,
    /// Bonus when the remaining name is clean text.
    pub clean_name: f32,
    /// Penalty when the line is dominated by symbols.
    pub noisy_line_penalty: f32,
    /// Multiplier applied when no price could be found.
    pub no_price_factor: f32,
    /// Upper bound of heuristic confidence.
    pub ceiling: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            base: 0.30,
            price_found: 0.15,
            currency_marker: 0.05,
            quantity_found: 0.05,
            clean_name: 0.05,
            noisy_line_penalty: 0.10,
            no_price_factor: 0.5,
            ceiling: 0.60,
        }
    }
}

/// Result validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Document confidence below which `low-quality-extraction` is raised.
    pub confidence_floor: f32,

    /// Absolute tolerance for the subtotal check.
    pub arithmetic_tolerance: Decimal,

    /// Relative tolerance for the subtotal check (fraction of the expected value).
    pub relative_tolerance: Decimal,

    /// Maximum share of non-alphanumeric characters in an item name.
    pub noisy_name_ratio: f32,

    /// Derive a single missing numeric field from the other two.
    pub auto_correct: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.5,
            arithmetic_tolerance: Decimal::new(1, 2),
            relative_tolerance: Decimal::new(1, 2),
            noisy_name_ratio: 0.4,
            auto_correct: true,
        }
    }
}

/// Text normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Share of symbol characters above which a line is noise.
    pub noise_symbol_ratio: f32,

    /// Minimum number of non-whitespace characters of an item line.
    pub min_item_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            noise_symbol_ratio: 0.5,
            min_item_chars: 3,
        }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
