//! Flexible stage: any pattern, partial lines allowed.

use tracing::trace;

use super::{StageMatcher, enrich, split_expiry, usable_name};
use crate::models::receipt::{CandidateFields, MatchCandidate, StageKind};
use crate::receipt::library::{ConfidenceClass, Pattern};
use crate::text::NormalizedLine;

/// Default acceptance threshold.
pub const FLEXIBLE_THRESHOLD: f32 = 0.5;

/// Matcher for lines whose layout only loosely follows a known pattern.
///
/// Every pattern is tried, whole line first and then anywhere in the line.
/// The score rewards filled fields and the share of the line the match
/// covers; the best candidate wins.
#[derive(Debug, Clone)]
pub struct FlexibleStage {
    threshold: f32,
}

impl FlexibleStage {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    fn score(class: ConfidenceClass, fields: &CandidateFields, coverage: f32) -> f32 {
        let ceiling = class.ceiling().min(ConfidenceClass::Flexible.ceiling());
        let filled = fields.filled_core() as f32 / 4.0;
        ceiling * (0.4 * filled + 0.6 * coverage.clamp(0.0, 1.0))
    }
}

impl Default for FlexibleStage {
    fn default() -> Self {
        Self::new(FLEXIBLE_THRESHOLD)
    }
}

impl StageMatcher for FlexibleStage {
    fn stage(&self) -> StageKind {
        StageKind::Flexible
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }

    fn attempt(&self, line: &NormalizedLine, patterns: &[&Pattern]) -> Option<MatchCandidate> {
        let (text, expiry) = split_expiry(&line.content);
        let mut best: Option<(f32, &Pattern, CandidateFields)> = None;

        for pattern in patterns {
            let (fields, coverage) = match pattern.match_line(&text) {
                Some(fields) => (fields, 1.0),
                None => match pattern.match_partial(&text) {
                    Some(partial) => partial,
                    None => continue,
                },
            };

            let has_name = usable_name(fields.name.as_deref());
            let has_amount = fields.unit_price.is_some() || fields.subtotal.is_some();
            if !has_name || !has_amount {
                continue;
            }

            let score = Self::score(pattern.class(), &fields, coverage);
            trace!("Line {}: {} scored {:.3}", line.index, pattern.id(), score);

            if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
                best = Some((score, pattern, fields));
            }
        }

        best.map(|(score, pattern, fields)| {
            MatchCandidate::new(
                line.index,
                StageKind::Flexible,
                pattern.id(),
                score,
                enrich(fields, expiry),
            )
        })
    }
}
