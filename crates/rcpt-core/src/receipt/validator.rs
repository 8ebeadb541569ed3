//! Result validation: anomaly detection, auto-correction and quality scoring.

use rust_decimal::Decimal;
use tracing::warn;

use super::fields::name_noise_ratio;
use crate::models::config::ValidationConfig;
use crate::models::receipt::{
    Anomaly, AnomalyKind, ExtractionResult, ItemField, ReceiptItem, Severity, clamp_confidence,
};
use crate::text::NormalizedLine;

/// Validates extracted items and scores the result.
#[derive(Debug, Clone, Default)]
pub struct ResultValidator {
    config: ValidationConfig,
}

impl ResultValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Override the document confidence floor.
    pub fn with_confidence_floor(mut self, floor: f32) -> Self {
        self.config.confidence_floor = floor;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Annotate items and build the final result.
    ///
    /// `lines` are the normalized lines the items were read from; they are
    /// consulted for replacement characters.
    pub fn validate(
        &self,
        mut items: Vec<ReceiptItem>,
        lines: &[NormalizedLine],
        confidence: f32,
    ) -> ExtractionResult {
        if items.is_empty() {
            return ExtractionResult {
                items,
                confidence: 0.0,
                quality_score: 0.0,
                anomalies: vec![Anomaly::document(
                    AnomalyKind::EmptyExtraction,
                    "no items could be extracted",
                )],
                debug: None,
            };
        }

        let mut anomalies = Vec::new();
        for item in &mut items {
            if self.config.auto_correct {
                self.auto_correct(item);
            }
            let source = lines
                .iter()
                .find(|l| l.index == item.line_index)
                .map(|l| l.content.as_str());
            anomalies.extend(self.check_item(item, source));
        }

        if confidence < self.config.confidence_floor {
            anomalies.push(Anomaly::document(
                AnomalyKind::LowQualityExtraction,
                format!(
                    "document confidence {:.2} is below the floor {:.2}",
                    confidence, self.config.confidence_floor
                ),
            ));
        }

        for anomaly in anomalies.iter().filter(|a| a.severity == Severity::Error) {
            warn!("{}: {}", anomaly.kind, anomaly.message);
        }

        let quality_score = quality_score(confidence, items.len(), &anomalies);
        ExtractionResult {
            items,
            confidence: clamp_confidence(confidence),
            quality_score,
            anomalies,
            debug: None,
        }
    }

    /// Derive a single missing numeric field from the other two.
    ///
    /// Applies only when the present prices are non-negative and a present
    /// quantity is positive; such values are reported, never repaired.
    pub fn auto_correct(&self, item: &mut ReceiptItem) {
        let non_negative = |v: Option<Decimal>| v.is_none_or(|v| !v.is_sign_negative());
        let positive_qty = item.quantity.is_none_or(|q| q > Decimal::ZERO);
        if !(non_negative(item.unit_price) && positive_qty && non_negative(item.subtotal)) {
            return;
        }

        match (item.unit_price, item.quantity, item.subtotal) {
            (Some(price), Some(qty), None) => {
                if let Some(subtotal) = price.checked_mul(qty) {
                    item.subtotal = Some(subtotal);
                    item.corrected_fields.push(ItemField::Subtotal);
                }
            }
            (None, Some(qty), Some(subtotal)) if !qty.is_zero() => {
                if let Some(price) = subtotal.checked_div(qty) {
                    item.unit_price = Some(price.round_dp(2));
                    item.corrected_fields.push(ItemField::UnitPrice);
                }
            }
            (Some(price), None, Some(subtotal)) if !price.is_zero() => {
                if let Some(qty) = subtotal.checked_div(price) {
                    let qty = qty.round_dp(3);
                    if !qty.is_zero() {
                        item.quantity = Some(qty);
                        item.corrected_fields.push(ItemField::Quantity);
                    }
                }
            }
            _ => {}
        }
    }

    fn check_item(&self, item: &ReceiptItem, source: Option<&str>) -> Vec<Anomaly> {
        let line = item.line_index;
        let mut anomalies = Vec::new();

        match item.unit_price {
            Some(price) if price <= Decimal::ZERO => anomalies.push(Anomaly::item(
                AnomalyKind::InvalidPrice,
                line,
                format!("unit price {} is not positive", price),
            )),
            Some(_) => {}
            None => anomalies.push(Anomaly::item(
                AnomalyKind::MissingPrice,
                line,
                "no unit price found",
            )),
        }

        match item.name.as_deref() {
            None => anomalies.push(Anomaly::item(
                AnomalyKind::MissingName,
                line,
                "no item name found",
            )),
            Some(name) => {
                let ratio = name_noise_ratio(name);
                let replaced =
                    source.is_some_and(|s| s.contains('\u{FFFD}')) || name.contains('\u{FFFD}');
                if ratio > self.config.noisy_name_ratio || replaced {
                    anomalies.push(Anomaly::item(
                        AnomalyKind::NoisyName,
                        line,
                        format!("name '{}' looks garbled", name),
                    ));
                }
            }
        }

        if let Some(qty) = item.quantity {
            if qty <= Decimal::ZERO {
                anomalies.push(Anomaly::item(
                    AnomalyKind::InvalidQuantity,
                    line,
                    format!("quantity {} is not positive", qty),
                ));
            }
        }

        if let Some(subtotal) = item.subtotal {
            if subtotal.is_sign_negative() && !subtotal.is_zero() {
                anomalies.push(Anomaly::item(
                    AnomalyKind::NegativeSubtotal,
                    line,
                    format!("subtotal {} is negative", subtotal),
                ));
            }
        }

        if !item.is_auto_corrected() {
            if let Some(anomaly) = self.check_arithmetic(item) {
                anomalies.push(anomaly);
            }
        }

        anomalies
    }

    fn check_arithmetic(&self, item: &ReceiptItem) -> Option<Anomaly> {
        let (price, qty, subtotal) = (item.unit_price?, item.quantity?, item.subtotal?);
        let expected = price.checked_mul(qty)?;
        let relative = self.config.relative_tolerance.checked_mul(expected.abs())?;
        let tolerance = self.config.arithmetic_tolerance.max(relative);

        ((subtotal - expected).abs() > tolerance).then(|| {
            Anomaly::item(
                AnomalyKind::ArithmeticMismatch,
                item.line_index,
                format!("subtotal {} differs from {} x {} = {}", subtotal, price, qty, expected),
            )
        })
    }
}

fn severity_weight(severity: Severity) -> f32 {
    match severity {
        Severity::Info => 0.02,
        Severity::Warning => 0.05,
        Severity::Error => 0.15,
    }
}

/// Quality score: confidence reduced by item anomalies (averaged over items)
/// and by document anomalies.
pub fn quality_score(confidence: f32, item_count: usize, anomalies: &[Anomaly]) -> f32 {
    if item_count == 0 {
        return 0.0;
    }

    let (item_penalty, document_penalty) =
        anomalies
            .iter()
            .fold((0.0f32, 0.0f32), |(item, document), anomaly| {
                let weight = severity_weight(anomaly.severity);
                match anomaly.line_index {
                    Some(_) => (item + weight, document),
                    None => (item, document + weight),
                }
            });

    clamp_confidence(confidence * (1.0 - item_penalty / item_count as f32) - document_penalty)
}
