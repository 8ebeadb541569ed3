//! Heuristic stage: rule-free fallback for lines no pattern explains.

use std::ops::Range;

use rust_decimal::Decimal;
use tracing::trace;

use super::{StageMatcher, enrich, split_expiry};
use crate::models::config::HeuristicWeights;
use crate::models::receipt::{CandidateFields, MatchCandidate, StageKind};
use crate::receipt::fields::{
    clean_name, has_letter, name_noise_ratio, parse_amount, parse_quantity, repair_ocr_digits,
};
use crate::receipt::library::Pattern;
use crate::receipt::patterns::{
    AMOUNT_TOKEN, AT_PRICE_TOKEN, BARCODE_TOKEN, MULTIPLIER_TOKEN, QTY_AT_PRICE_TOKEN,
    QTY_PREFIX_TOKEN, QTY_SUFFIX_TOKEN, TAX_MARK_TOKEN,
};
use crate::text::{CharClassCounts, NormalizedLine};

/// Pattern id reported on heuristic candidates.
pub const HEURISTIC_PATTERN_ID: &str = "heuristic";

/// Name noise ratio up to which a name counts as clean.
const CLEAN_NAME_RATIO: f32 = 0.2;

/// Line symbol ratio above which the noisy-line penalty applies.
const NOISY_LINE_RATIO: f32 = 0.2;

/// Terminal fallback stage.
///
/// Reads the trailing amount as the price, multiplication tokens as the
/// quantity, and whatever is left (minus barcodes) as the name. Always
/// produces a candidate.
#[derive(Debug, Clone, Default)]
pub struct HeuristicStage {
    weights: HeuristicWeights,
}

/// Quantity found on a line, with an explicit unit price when printed (`2 @ 1.50`).
struct QuantityToken {
    quantity: Decimal,
    unit_price: Option<Decimal>,
    span: Range<usize>,
}

impl HeuristicStage {
    pub fn new(weights: HeuristicWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &HeuristicWeights {
        &self.weights
    }

    /// Extract fields; returns them with whether the price carried a currency.
    fn extract(&self, text: &str) -> (CandidateFields, bool) {
        let mut tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let mut fields = CandidateFields::default();
        let mut has_currency = false;

        if let Some(pos) = tokens.iter().rposition(|t| !TAX_MARK_TOKEN.is_match(t)) {
            if let Some((amount, currency)) = read_amount(&tokens[pos]) {
                fields.unit_price = Some(amount);
                has_currency = currency;
                tokens.truncate(pos);
            }
        }

        if let Some(qty) = find_quantity(&tokens) {
            fields.quantity = Some(qty.quantity);
            if let Some(unit_price) = qty.unit_price {
                fields.subtotal = fields.unit_price.take();
                fields.unit_price = Some(unit_price);
            }
            tokens.drain(qty.span);
        }

        tokens.retain(|t| !BARCODE_TOKEN.is_match(t));
        fields.name = clean_name(&tokens.join(" "));

        (fields, has_currency)
    }

    fn score(&self, line: &str, fields: &CandidateFields, has_currency: bool) -> f32 {
        let w = &self.weights;
        let has_price = fields.unit_price.is_some() || fields.subtotal.is_some();

        let mut score = w.base;
        if has_price {
            score += w.price_found;
            if has_currency {
                score += w.currency_marker;
            }
        }
        if fields.quantity.is_some() {
            score += w.quantity_found;
        }
        if fields
            .name
            .as_deref()
            .is_some_and(|n| has_letter(n) && name_noise_ratio(n) <= CLEAN_NAME_RATIO)
        {
            score += w.clean_name;
        }
        let noisy = CharClassCounts::of(line).symbol_ratio() > NOISY_LINE_RATIO;
        if line.contains('\u{FFFD}') || noisy {
            score -= w.noisy_line_penalty;
        }
        if !has_price {
            score *= w.no_price_factor;
        }

        score.min(w.ceiling)
    }
}

impl StageMatcher for HeuristicStage {
    fn stage(&self) -> StageKind {
        StageKind::Heuristic
    }

    fn threshold(&self) -> f32 {
        0.0
    }

    fn attempt(&self, line: &NormalizedLine, _patterns: &[&Pattern]) -> Option<MatchCandidate> {
        let (text, expiry) = split_expiry(&line.content);
        let (fields, has_currency) = self.extract(&text);
        let confidence = self.score(&line.content, &fields, has_currency);

        trace!("Line {}: heuristic fields {:?}", line.index, fields);

        Some(MatchCandidate::new(
            line.index,
            StageKind::Heuristic,
            HEURISTIC_PATTERN_ID,
            confidence,
            enrich(fields, expiry),
        ))
    }
}

/// Read an amount token, repairing OCR digit confusions.
fn read_amount(token: &str) -> Option<(Decimal, bool)> {
    // `-¥50` after discount marker substitution
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) if rest.starts_with(['¥', '$', '€', '£']) => (true, rest),
        _ => (false, token),
    };

    let repaired;
    let token = if AMOUNT_TOKEN.is_match(token) {
        token
    } else if looks_numeric(token) {
        repaired = repair_ocr_digits(token)?;
        repaired.as_str()
    } else {
        return None;
    };

    let caps = AMOUNT_TOKEN.captures(token)?;
    let amount = parse_amount(&caps[2])?;
    let amount = if negative { -amount } else { amount };
    Some((amount, caps.get(1).is_some()))
}

/// Candidates for OCR repair start like a number or carry a decimal point.
fn looks_numeric(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '¥' | '$' | '€' | '£' | '-'))
        || token.contains('.')
}

fn find_quantity(tokens: &[String]) -> Option<QuantityToken> {
    for (i, token) in tokens.iter().enumerate() {
        // 2x1.50, 3@0.99
        if let Some(caps) = QTY_AT_PRICE_TOKEN.captures(token) {
            if let Some(quantity) = parse_quantity(&caps[1]) {
                return Some(QuantityToken {
                    quantity,
                    unit_price: parse_amount(&caps[2]),
                    span: i..i + 1,
                });
            }
        }

        // 2 @ 1.50, 2 x 1.50
        if MULTIPLIER_TOKEN.is_match(token) && i > 0 && i + 1 < tokens.len() {
            if let (Some(quantity), Some(unit_price)) =
                (parse_quantity(&tokens[i - 1]), parse_amount(&tokens[i + 1]))
            {
                return Some(QuantityToken {
                    quantity,
                    unit_price: Some(unit_price),
                    span: i - 1..i + 2,
                });
            }
        }

        // 2 @1.50
        if let Some(caps) = AT_PRICE_TOKEN.captures(token) {
            let previous = i.checked_sub(1).and_then(|prev| parse_quantity(&tokens[prev]));
            if let Some(quantity) = previous {
                return Some(QuantityToken {
                    quantity,
                    unit_price: parse_amount(&caps[1]),
                    span: i - 1..i + 1,
                });
            }
        }

        // 2個, 3x, optionally followed by @1.50
        if let Some(caps) = QTY_SUFFIX_TOKEN.captures(token) {
            if let Some(quantity) = parse_quantity(&caps[1]) {
                let at_price = tokens
                    .get(i + 1)
                    .and_then(|next| AT_PRICE_TOKEN.captures(next))
                    .and_then(|c| parse_amount(&c[1]));
                let end = if at_price.is_some() { i + 2 } else { i + 1 };
                return Some(QuantityToken {
                    quantity,
                    unit_price: at_price,
                    span: i..end,
                });
            }
        }

        // x2, ×3
        if let Some(caps) = QTY_PREFIX_TOKEN.captures(token) {
            if let Some(quantity) = parse_quantity(&caps[1]) {
                return Some(QuantityToken {
                    quantity,
                    unit_price: None,
                    span: i..i + 1,
                });
            }
        }
    }

    None
}
