//! Receipt extraction data models.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::receipt::diagnostics::DiagnosticReport;

/// Matching stage of the extraction cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Well-formed vendor or generic pattern, whole line.
    Strict,
    /// Relaxed pattern matching, partial lines allowed.
    Flexible,
    /// Rule-free fallback.
    Heuristic,
    /// Externally supplied stage inserted into the chain.
    Custom,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Strict => "strict",
            StageKind::Flexible => "flexible",
            StageKind::Heuristic => "heuristic",
            StageKind::Custom => "custom",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric item field, used to mark computed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemField {
    UnitPrice,
    Quantity,
    Subtotal,
}

impl ItemField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemField::UnitPrice => "unit_price",
            ItemField::Quantity => "quantity",
            ItemField::Subtotal => "subtotal",
        }
    }
}

/// Best-before / use-by hint printed next to an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryHint {
    /// Text as printed, e.g. `10/21` or `2024.10.21`.
    pub raw: String,

    /// Parsed date when the hint carries a year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// Field values extracted from one line, each optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_hint: Option<ExpiryHint>,
}

impl CandidateFields {
    /// Number of filled core fields (name, unit price, quantity, subtotal).
    pub fn filled_core(&self) -> usize {
        [
            self.name.is_some(),
            self.unit_price.is_some(),
            self.quantity.is_some(),
            self.subtotal.is_some(),
        ]
        .iter()
        .filter(|f| **f)
        .count()
    }
}

/// Output of one stage attempt on one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Original line index.
    pub line_index: usize,
    /// Stage that produced the candidate.
    pub stage: StageKind,
    /// Pattern identifier, or `heuristic` when rule-free.
    pub pattern_id: String,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Extracted field values.
    pub fields: CandidateFields,
}

impl MatchCandidate {
    /// Create a candidate; the confidence is clamped into [0.0, 1.0].
    pub fn new(
        line_index: usize,
        stage: StageKind,
        pattern_id: impl Into<String>,
        confidence: f32,
        fields: CandidateFields,
    ) -> Self {
        Self {
            line_index,
            stage,
            pattern_id: pattern_id.into(),
            confidence: clamp_confidence(confidence),
            fields,
        }
    }
}

/// Clamp a score into [0.0, 1.0]; NaN becomes 0.0.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// A single extracted receipt line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Original line index on the receipt.
    pub line_index: usize,

    /// Product name as printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Price of one unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,

    /// Quantity (count or weight).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,

    /// Line total.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,

    /// Category hint (department code or keyword category).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<String>,

    /// Expiry hint printed on the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_hint: Option<ExpiryHint>,

    /// Confidence of the stage that produced the item.
    pub confidence: f32,

    /// Stage that produced the item.
    pub stage: StageKind,

    /// Pattern that produced the item.
    pub pattern_id: String,

    /// Fields computed by auto-correction rather than read from the receipt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrected_fields: Vec<ItemField>,
}

impl ReceiptItem {
    /// Whether any field was derived by auto-correction.
    pub fn is_auto_corrected(&self) -> bool {
        !self.corrected_fields.is_empty()
    }
}

impl From<MatchCandidate> for ReceiptItem {
    fn from(candidate: MatchCandidate) -> Self {
        let fields = candidate.fields;
        Self {
            line_index: candidate.line_index,
            name: fields.name,
            unit_price: fields.unit_price,
            quantity: fields.quantity,
            subtotal: fields.subtotal,
            category_hint: fields.category_hint,
            expiry_hint: fields.expiry_hint,
            confidence: candidate.confidence,
            stage: candidate.stage,
            pattern_id: candidate.pattern_id,
            corrected_fields: Vec::new(),
        }
    }
}

/// Kind of data-quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyKind {
    InvalidPrice,
    MissingPrice,
    MissingName,
    InvalidQuantity,
    NegativeSubtotal,
    ArithmeticMismatch,
    NoisyName,
    LowQualityExtraction,
    EmptyExtraction,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::InvalidPrice => "invalid-price",
            AnomalyKind::MissingPrice => "missing-price",
            AnomalyKind::MissingName => "missing-name",
            AnomalyKind::InvalidQuantity => "invalid-quantity",
            AnomalyKind::NegativeSubtotal => "negative-subtotal",
            AnomalyKind::ArithmeticMismatch => "arithmetic-mismatch",
            AnomalyKind::NoisyName => "noisy-name",
            AnomalyKind::LowQualityExtraction => "low-quality-extraction",
            AnomalyKind::EmptyExtraction => "empty-extraction",
        }
    }

    /// Default severity of this kind.
    pub fn severity(&self) -> Severity {
        match self {
            AnomalyKind::InvalidPrice
            | AnomalyKind::MissingPrice
            | AnomalyKind::InvalidQuantity
            | AnomalyKind::NegativeSubtotal
            | AnomalyKind::EmptyExtraction => Severity::Error,
            AnomalyKind::MissingName
            | AnomalyKind::ArithmeticMismatch
            | AnomalyKind::LowQualityExtraction => Severity::Warning,
            AnomalyKind::NoisyName => Severity::Info,
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anomaly severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A data-quality issue attached to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// Line of the affected item; `None` for document-level anomalies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_index: Option<usize>,
    pub message: String,
}

impl Anomaly {
    /// Item-level anomaly.
    pub fn item(kind: AnomalyKind, line_index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            line_index: Some(line_index),
            message: message.into(),
        }
    }

    /// Document-level anomaly.
    pub fn document(kind: AnomalyKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            line_index: None,
            message: message.into(),
        }
    }
}

/// Result of extracting one receipt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Extracted items in receipt order.
    pub items: Vec<ReceiptItem>,

    /// Mean of item confidences, 0.0 without items.
    pub confidence: f32,

    /// Quality score computed by the validator (0.0 - 1.0).
    pub quality_score: f32,

    /// Detected anomalies.
    #[serde(default)]
    pub anomalies: Vec<Anomaly>,

    /// Diagnostic report, present in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DiagnosticReport>,
}

impl ExtractionResult {
    /// Kinds of all anomalies, in report order.
    pub fn anomaly_kinds(&self) -> Vec<AnomalyKind> {
        self.anomalies.iter().map(|a| a.kind).collect()
    }

    /// Anomalies attached to the item on `line_index`.
    pub fn anomalies_for_line(&self, line_index: usize) -> impl Iterator<Item = &Anomaly> {
        self.anomalies
            .iter()
            .filter(move |a| a.line_index == Some(line_index))
    }

    /// Whether any anomaly of the given kind was raised.
    pub fn has_anomaly(&self, kind: AnomalyKind) -> bool {
        self.anomalies.iter().any(|a| a.kind == kind)
    }
}
