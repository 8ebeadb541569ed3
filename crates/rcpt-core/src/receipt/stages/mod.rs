//! Matching stages of the extraction cascade.

pub mod flexible;
pub mod heuristic;
pub mod strict;

pub use flexible::FlexibleStage;
pub use heuristic::HeuristicStage;
pub use strict::StrictStage;

use super::fields::{find_expiry_hint, has_letter};
use super::library::{Pattern, PatternField, category_for};
use super::patterns::{QTY_PREFIX_TOKEN, QTY_SUFFIX_TOKEN};
use crate::models::receipt::{CandidateFields, ExpiryHint, MatchCandidate, StageKind};
use crate::text::NormalizedLine;

/// Trait for matching stages.
pub trait StageMatcher: Send + Sync {
    /// Stage kind reported on candidates.
    fn stage(&self) -> StageKind;

    /// Minimum confidence for a candidate of this stage to be accepted.
    fn threshold(&self) -> f32;

    /// Attempt one line; `None` when the stage does not apply.
    ///
    /// Returned candidates may be below the threshold; acceptance is decided
    /// by the coordinator.
    fn attempt(&self, line: &NormalizedLine, patterns: &[&Pattern]) -> Option<MatchCandidate>;

    /// Attempt every line independently.
    fn run(&self, lines: &[NormalizedLine], patterns: &[&Pattern]) -> Vec<Option<MatchCandidate>> {
        lines.iter().map(|line| self.attempt(line, patterns)).collect()
    }
}

/// Remove an expiry hint from a line; patterns match the remaining text.
pub(crate) fn split_expiry(content: &str) -> (String, Option<ExpiryHint>) {
    match find_expiry_hint(content) {
        Some((hint, range)) => {
            let rest = format!("{} {}", &content[..range.start], &content[range.end..]);
            (rest.split_whitespace().collect::<Vec<_>>().join(" "), Some(hint))
        }
        None => (content.to_string(), None),
    }
}

/// Attach the expiry hint and fall back to a keyword category.
pub(crate) fn enrich(mut fields: CandidateFields, expiry: Option<ExpiryHint>) -> CandidateFields {
    if fields.category_hint.is_none() {
        fields.category_hint = fields
            .name
            .as_deref()
            .and_then(category_for)
            .map(str::to_string);
    }
    fields.expiry_hint = expiry;
    fields
}

/// Whether a captured name can stand as an item name.
///
/// The name needs a letter and must not end in a quantity token such as
/// `×2` or `3個`; such a capture swallowed a quantity the pattern did not
/// declare.
pub(crate) fn usable_name(name: Option<&str>) -> bool {
    let Some(name) = name else {
        return false;
    };
    let ends_with_quantity = name
        .split_whitespace()
        .last()
        .is_some_and(|t| QTY_PREFIX_TOKEN.is_match(t) || QTY_SUFFIX_TOKEN.is_match(t));
    has_letter(name) && !ends_with_quantity
}

/// Number of core fields (name, unit price, quantity, subtotal) a pattern declares.
pub(crate) fn declared_core(pattern: &Pattern) -> usize {
    pattern
        .fields()
        .iter()
        .filter(|f| !matches!(f, PatternField::CategoryHint))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::library::PatternLibrary;
    use crate::text::LineKind;
    use pretty_assertions::assert_eq;

    pub(crate) fn item_line(index: usize, content: &str) -> NormalizedLine {
        NormalizedLine {
            index,
            content: content.to_string(),
            kind: LineKind::Item,
        }
    }

    #[test]
    fn test_split_expiry() {
        let (text, hint) = split_expiry("牛乳 ¥238 賞味期限10/21");
        assert_eq!(text, "牛乳 ¥238");
        assert_eq!(hint.unwrap().raw, "10/21");

        let (text, hint) = split_expiry("BANANAS 1.29 F");
        assert_eq!(text, "BANANAS 1.29 F");
        assert!(hint.is_none());
    }

    #[test]
    fn test_usable_name() {
        assert!(usable_name(Some("キャベツ")));
        assert!(usable_name(Some("Eggs 12ct")));
        assert!(!usable_name(Some("キャベツ ×2")));
        assert!(!usable_name(Some("Apples 2x")));
        assert!(!usable_name(Some("豆腐 3個")));
        assert!(!usable_name(Some("123")));
        assert!(!usable_name(None));
    }

    #[test]
    fn test_enrich_keeps_captured_category() {
        let fields = CandidateFields {
            name: Some("牛乳".to_string()),
            category_hint: Some("12".to_string()),
            ..Default::default()
        };
        assert_eq!(enrich(fields, None).category_hint.as_deref(), Some("12"));

        let fields = CandidateFields {
            name: Some("牛乳".to_string()),
            ..Default::default()
        };
        assert_eq!(enrich(fields, None).category_hint.as_deref(), Some("dairy"));
    }

    #[test]
    fn test_run_attempts_every_line() {
        let library = PatternLibrary::builtin();
        let patterns = library.lookup(None);
        let lines = vec![item_line(0, "Milk $1.99"), item_line(1, "???")];

        let results = FlexibleStage::default().run(&lines, &patterns);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }
}
