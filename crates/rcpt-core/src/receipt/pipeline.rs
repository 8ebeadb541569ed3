//! End-to-end extraction pipeline.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::coordinator::StageCoordinator;
use super::diagnostics::DebugReporter;
use super::library::PatternLibrary;
use super::stages::StageMatcher;
use super::validator::ResultValidator;
use crate::error::{InputError, RcptError, Result};
use crate::models::config::RcptConfig;
use crate::models::receipt::{ExtractionResult, ReceiptItem};
use crate::text::{Locale, Normalizer, RawDocument};

/// Per-request extraction options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Vendor identifier narrowing which patterns are tried first.
    pub vendor_hint: Option<String>,

    /// Attach a diagnostic report to the result.
    pub debug_mode: bool,

    /// Override of the configured document confidence floor.
    pub confidence_floor: Option<f32>,

    /// Override of the configured locale.
    pub locale: Option<Locale>,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor_hint = Some(vendor.into());
        self
    }

    pub fn with_debug(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_confidence_floor(mut self, floor: f32) -> Self {
        self.confidence_floor = Some(floor);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }
}

/// Receipt extraction pipeline: normalizer, stage cascade, validator.
///
/// A pipeline is immutable once built and can be shared across threads.
pub struct ReceiptPipeline {
    config: RcptConfig,
    library: Arc<PatternLibrary>,
    coordinator: StageCoordinator,
}

impl ReceiptPipeline {
    /// Pipeline with default configuration and the built-in patterns.
    pub fn new() -> Self {
        Self::with_library(RcptConfig::default(), PatternLibrary::builtin())
    }

    /// Pipeline from configuration, loading `extraction.pattern_file` when set.
    pub fn from_config(config: &RcptConfig) -> Result<Self> {
        check_config(config)?;
        let library = match &config.extraction.pattern_file {
            Some(path) => Arc::new(PatternLibrary::from_file(path)?.with_builtin_fallback()?),
            None => PatternLibrary::builtin(),
        };
        Ok(Self::with_library(config.clone(), library))
    }

    /// Pipeline with an explicit pattern library.
    pub fn with_library(config: RcptConfig, library: Arc<PatternLibrary>) -> Self {
        let coordinator = StageCoordinator::new(&config.stages)
            .with_parallelism(config.extraction.parallel, config.extraction.parallel_min_lines);
        Self {
            config,
            library,
            coordinator,
        }
    }

    /// Insert an additional stage ahead of the heuristic fallback.
    pub fn with_stage(mut self, stage: Box<dyn StageMatcher>) -> Self {
        self.coordinator = self.coordinator.with_stage_before_terminal(stage);
        self
    }

    pub fn config(&self) -> &RcptConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<PatternLibrary> {
        &self.library
    }

    /// Extract items from OCR text.
    ///
    /// Fails only on malformed input; low confidence and data problems are
    /// reported as anomalies on the result.
    pub fn extract(&self, raw_text: &str, options: &ExtractOptions) -> Result<ExtractionResult> {
        let vendor = options
            .vendor_hint
            .clone()
            .or_else(|| self.config.extraction.default_vendor.clone());
        self.extract_document(&RawDocument::new(raw_text, vendor), options)
    }

    /// Extract items from raw bytes, which must be UTF-8.
    pub fn extract_bytes(
        &self,
        bytes: &[u8],
        options: &ExtractOptions,
    ) -> Result<ExtractionResult> {
        self.check_size(bytes.len())?;
        let vendor = options
            .vendor_hint
            .clone()
            .or_else(|| self.config.extraction.default_vendor.clone());
        let doc = RawDocument::from_bytes(bytes, vendor)?;
        self.extract_document(&doc, options)
    }

    /// Extract items from a document; the document's vendor hint wins over
    /// the one in `options`.
    pub fn extract_document(
        &self,
        doc: &RawDocument,
        options: &ExtractOptions,
    ) -> Result<ExtractionResult> {
        let start = Instant::now();

        let floor = match options.confidence_floor {
            Some(floor) if !(0.0..=1.0).contains(&floor) => {
                return Err(InputError::InvalidConfidenceFloor(floor).into());
            }
            Some(floor) => floor,
            None => self.config.validation.confidence_floor,
        };
        self.check_size(doc.content().len())?;

        let locale = options.locale.unwrap_or(self.config.extraction.locale);
        let lines = Normalizer::from_config(&self.config.normalizer)
            .with_locale(locale)
            .normalize(doc.content());

        let patterns = self.library.lookup(doc.vendor_hint());
        debug!(
            "Trying {} patterns for vendor {:?}",
            patterns.len(),
            doc.vendor_hint()
        );

        let coordination = self.coordinator.coordinate(&lines, &patterns, options.debug_mode);
        let items: Vec<ReceiptItem> = coordination
            .accepted()
            .cloned()
            .map(ReceiptItem::from)
            .collect();

        let validator =
            ResultValidator::new(self.config.validation.clone()).with_confidence_floor(floor);
        let mut result = validator.validate(items, &lines, coordination.confidence);

        if options.debug_mode {
            let report =
                DebugReporter::new(&self.library).report(doc, &lines, &coordination, &result);
            result.debug = Some(report);
        }

        info!(
            "Extracted {} items from {} lines (confidence {:.2}, quality {:.2}) in {:?}",
            result.items.len(),
            lines.len(),
            result.confidence,
            result.quality_score,
            start.elapsed()
        );

        Ok(result)
    }

    fn check_size(&self, size: usize) -> std::result::Result<(), InputError> {
        let Some(limit) = self.config.extraction.max_input_bytes else {
            return Ok(());
        };
        if size > limit {
            return Err(InputError::TooLarge { size, limit });
        }
        Ok(())
    }
}

fn check_config(config: &RcptConfig) -> Result<()> {
    let unit = 0.0..=1.0;
    let bounded = [
        ("stages.strict_threshold", config.stages.strict_threshold),
        ("stages.flexible_threshold", config.stages.flexible_threshold),
        ("stages.heuristic.ceiling", config.stages.heuristic.ceiling),
        ("validation.confidence_floor", config.validation.confidence_floor),
        ("validation.noisy_name_ratio", config.validation.noisy_name_ratio),
        ("normalizer.noise_symbol_ratio", config.normalizer.noise_symbol_ratio),
    ];
    for (key, value) in bounded {
        if !unit.contains(&value) {
            return Err(RcptError::Config(format!(
                "{} must be within 0.0..=1.0, got {}",
                key, value
            )));
        }
    }
    if config.extraction.max_input_bytes == Some(0) {
        return Err(RcptError::Config("extraction.max_input_bytes must be positive".to_string()));
    }
    Ok(())
}

impl Default for ReceiptPipeline {
    fn default() -> Self {
        Self::new()
    }
}
