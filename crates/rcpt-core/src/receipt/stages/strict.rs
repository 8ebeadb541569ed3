//! Strict stage: whole-line matches of strict-class patterns.

use tracing::trace;

use super::{StageMatcher, declared_core, enrich, split_expiry, usable_name};
use crate::models::receipt::{MatchCandidate, StageKind};
use crate::receipt::library::{ConfidenceClass, Pattern};
use crate::text::NormalizedLine;

/// Default acceptance threshold.
pub const STRICT_THRESHOLD: f32 = 0.8;

/// Whole-line matcher for well-formed vendor and generic layouts.
#[derive(Debug, Clone)]
pub struct StrictStage {
    threshold: f32,
}

impl StrictStage {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for StrictStage {
    fn default() -> Self {
        Self::new(STRICT_THRESHOLD)
    }
}

impl StageMatcher for StrictStage {
    fn stage(&self) -> StageKind {
        StageKind::Strict
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }

    fn attempt(&self, line: &NormalizedLine, patterns: &[&Pattern]) -> Option<MatchCandidate> {
        let (text, expiry) = split_expiry(&line.content);

        for pattern in patterns.iter().filter(|p| p.class() == ConfidenceClass::Strict) {
            let Some(fields) = pattern.match_line(&text) else {
                continue;
            };

            // Strict matches need a readable name and a unit price
            if !usable_name(fields.name.as_deref()) || fields.unit_price.is_none() {
                trace!("Line {}: {} matched without name or price", line.index, pattern.id());
                continue;
            }

            let declared = declared_core(pattern).max(1) as f32;
            let filled = fields.filled_core() as f32;
            let completeness = (filled / declared).min(1.0);
            let confidence = pattern.class().ceiling() * (0.85 + 0.15 * completeness);

            return Some(MatchCandidate::new(
                line.index,
                StageKind::Strict,
                pattern.id(),
                confidence,
                enrich(fields, expiry),
            ));
        }

        None
    }
}
