//! Core library for grocery receipt line-item extraction.
//!
//! This crate provides:
//! - OCR text normalization and line classification
//! - A versioned library of vendor-specific and generic line patterns
//! - A strict / flexible / heuristic matching cascade
//! - Result validation with anomalies, auto-correction and quality scoring
//! - Optional diagnostic reports

pub mod error;
pub mod models;
pub mod receipt;
pub mod text;

use lazy_static::lazy_static;

pub use error::{InputError, PatternError, RcptError, Result};
pub use models::config::RcptConfig;
pub use models::receipt::{
    Anomaly, AnomalyKind, ExpiryHint, ExtractionResult, ItemField, MatchCandidate, ReceiptItem,
    Severity, StageKind,
};
pub use receipt::{
    DiagnosticReport, ExtractOptions, PatternLibrary, ReceiptPipeline, StageMatcher,
};
pub use text::{Locale, NormalizedLine, RawDocument};

lazy_static! {
    static ref DEFAULT_PIPELINE: ReceiptPipeline = ReceiptPipeline::new();
}

/// Extract receipt items with the default pipeline.
///
/// ```
/// use rcpt_core::{extract, ExtractOptions};
///
/// let result = extract("キャベツ 1個 ¥198", &ExtractOptions::default()).unwrap();
/// assert_eq!(result.items[0].name.as_deref(), Some("キャベツ"));
/// ```
pub fn extract(raw_text: &str, options: &ExtractOptions) -> Result<ExtractionResult> {
    DEFAULT_PIPELINE.extract(raw_text, options)
}
