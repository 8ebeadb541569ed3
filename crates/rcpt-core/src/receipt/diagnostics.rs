//! Diagnostic reports for debug-mode extractions.
//!
//! Reports are built after the fact from the normalized lines, the cascade
//! outcome and the validated result; building one never changes the result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::coordinator::{AttemptOutcome, Coordination};
use super::library::PatternLibrary;
use crate::models::receipt::{AnomalyKind, ExtractionResult, StageKind};
use crate::text::{CharClassCounts, LineKind, NormalizedLine, RawDocument};

/// Symbol ratio above which a line is reported as suspicious.
const SUSPICIOUS_SYMBOL_RATIO: f32 = 0.3;

/// Share of heuristic items above which a pattern suggestion is made.
const HEURISTIC_SHARE_WARNING: f32 = 0.5;

/// Structured diagnostics of one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub text: TextStats,
    pub patterns: PatternStats,
    pub result: ResultStats,
    /// Human-readable improvement suggestions.
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    pub raw_bytes: usize,
    pub total_lines: usize,
    pub item_lines: usize,
    pub header_lines: usize,
    pub noise_lines: usize,
    /// Character-class histogram over all cleaned lines.
    pub characters: CharClassCounts,
    /// Lines carrying replacement characters or dominated by symbols.
    pub suspicious_lines: Vec<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    pub attempted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub abstained: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub library_version: String,
    pub vendor_hint: Option<String>,
    /// Whether the vendor hint selected vendor-specific patterns.
    pub vendor_matched: bool,
    pub patterns_considered: usize,
    /// Candidates produced per pattern id, accepted or rejected.
    pub hits: BTreeMap<String, usize>,
    /// Attempt counts per stage name.
    pub stages: BTreeMap<String, StageStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStats {
    pub item_count: usize,
    pub confidence: f32,
    pub quality_score: f32,
    pub anomaly_count: usize,
    pub anomalies_by_kind: BTreeMap<String, usize>,
    pub auto_corrected_items: usize,
    pub items_by_stage: BTreeMap<String, usize>,
    /// Item lines no stage resolved.
    pub unresolved_item_lines: usize,
}

/// Builds diagnostic reports.
#[derive(Debug, Clone)]
pub struct DebugReporter {
    library_version: String,
}

impl DebugReporter {
    pub fn new(library: &PatternLibrary) -> Self {
        Self {
            library_version: library.version().to_string(),
        }
    }

    /// Build the report for one extraction.
    pub fn report(
        &self,
        doc: &RawDocument,
        lines: &[NormalizedLine],
        coordination: &Coordination,
        result: &ExtractionResult,
    ) -> DiagnosticReport {
        let text = text_stats(doc, lines);
        let patterns = self.pattern_stats(doc, coordination);
        let result_stats = result_stats(lines, coordination, result);
        let suggestions = suggestions(&text, &patterns, &result_stats);

        DiagnosticReport {
            text,
            patterns,
            result: result_stats,
            suggestions,
        }
    }

    fn pattern_stats(&self, doc: &RawDocument, coordination: &Coordination) -> PatternStats {
        let mut hits: BTreeMap<String, usize> = BTreeMap::new();
        let mut stages: BTreeMap<String, StageStats> = BTreeMap::new();

        for attempt in coordination.lines.iter().flat_map(|l| &l.attempts) {
            let stats = stages.entry(attempt.stage.as_str().to_string()).or_default();
            stats.attempted += 1;
            match attempt.outcome {
                AttemptOutcome::Accepted => stats.accepted += 1,
                AttemptOutcome::Rejected => stats.rejected += 1,
                AttemptOutcome::Abstained => stats.abstained += 1,
            }

            if let Some(id) = &attempt.pattern_id {
                *hits.entry(id.clone()).or_default() += 1;
            }
        }

        PatternStats {
            library_version: self.library_version.clone(),
            vendor_hint: doc.vendor_hint().map(str::to_string),
            vendor_matched: coordination.vendor_patterns > 0,
            patterns_considered: coordination.patterns_considered,
            hits,
            stages,
        }
    }
}

fn text_stats(doc: &RawDocument, lines: &[NormalizedLine]) -> TextStats {
    let mut stats = TextStats {
        raw_bytes: doc.content().len(),
        total_lines: lines.len(),
        ..Default::default()
    };

    for line in lines {
        match line.kind {
            LineKind::Item => stats.item_lines += 1,
            LineKind::Header => stats.header_lines += 1,
            LineKind::Noise => stats.noise_lines += 1,
        }

        let counts = CharClassCounts::of(&line.content);
        stats.characters.merge(&counts);

        if line.content.contains('\u{FFFD}') || counts.symbol_ratio() > SUSPICIOUS_SYMBOL_RATIO {
            stats.suspicious_lines.push(line.index);
        }
    }

    stats
}

fn result_stats(
    lines: &[NormalizedLine],
    coordination: &Coordination,
    result: &ExtractionResult,
) -> ResultStats {
    let mut anomalies_by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for anomaly in &result.anomalies {
        *anomalies_by_kind.entry(anomaly.kind.as_str().to_string()).or_default() += 1;
    }

    let mut items_by_stage: BTreeMap<String, usize> = BTreeMap::new();
    for item in &result.items {
        *items_by_stage.entry(item.stage.as_str().to_string()).or_default() += 1;
    }

    let item_lines = lines.iter().filter(|l| l.is_item()).count();

    ResultStats {
        item_count: result.items.len(),
        confidence: result.confidence,
        quality_score: result.quality_score,
        anomaly_count: result.anomalies.len(),
        anomalies_by_kind,
        auto_corrected_items: result.items.iter().filter(|i| i.is_auto_corrected()).count(),
        items_by_stage,
        unresolved_item_lines: item_lines.saturating_sub(coordination.resolved_count()),
    }
}

fn suggestions(text: &TextStats, patterns: &PatternStats, result: &ResultStats) -> Vec<String> {
    let mut suggestions = Vec::new();

    if text.total_lines == 0 {
        suggestions.push("Input is empty; check that OCR produced any text.".to_string());
        return suggestions;
    }

    if text.item_lines == 0 {
        suggestions.push(
            "No candidate item lines were found; check the OCR output or the noise ratio.".to_string(),
        );
    }

    match &patterns.vendor_hint {
        Some(hint) if !patterns.vendor_matched => suggestions.push(format!(
            "Vendor hint '{}' has no dedicated patterns; add vendor patterns to raise confidence.",
            hint
        )),
        None if result.item_count > 0 => {
            let heuristic = result
                .items_by_stage
                .get(StageKind::Heuristic.as_str())
                .copied()
                .unwrap_or(0);
            if heuristic as f32 / result.item_count as f32 > HEURISTIC_SHARE_WARNING {
                suggestions.push(
                    "Most items were resolved heuristically; supply a vendor hint or add patterns."
                        .to_string(),
                );
            }
        }
        _ => {}
    }

    if !text.suspicious_lines.is_empty() {
        suggestions.push(format!(
            "{} line(s) look corrupted ({:?}); consider rescanning the receipt.",
            text.suspicious_lines.len(),
            text.suspicious_lines
        ));
    }

    if result.anomalies_by_kind.contains_key(AnomalyKind::ArithmeticMismatch.as_str()) {
        suggestions.push(
            "Some subtotals disagree with price x quantity; check for misread digits or discounts."
                .to_string(),
        );
    }

    if result.unresolved_item_lines > 0 {
        suggestions.push(format!(
            "{} item line(s) could not be resolved by any stage.",
            result.unresolved_item_lines
        ));
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::ReceiptItem;
    use crate::receipt::coordinator::StageCoordinator;
    use crate::receipt::validator::ResultValidator;
    use crate::text::normalize;
    use pretty_assertions::assert_eq;

    fn run(text: &str, vendor: Option<&str>) -> DiagnosticReport {
        let library = PatternLibrary::builtin();
        let doc = RawDocument::new(text, vendor.map(str::to_string));
        let lines = normalize(doc.content());
        let coordination =
            StageCoordinator::default().coordinate(&lines, &library.lookup(vendor), true);
        let items: Vec<ReceiptItem> = coordination
            .accepted()
            .cloned()
            .map(ReceiptItem::from)
            .collect();
        let result = ResultValidator::default().validate(items, &lines, coordination.confidence);

        DebugReporter::new(&library).report(&doc, &lines, &coordination, &result)
    }

    #[test]
    fn test_text_stats() {
        let report = run("A-MART\nキャベツ 1個 ¥198\n▒▒▒▒ 12\n合計 ¥198", Some("A-Mart"));

        assert_eq!(report.text.total_lines, 4);
        assert_eq!(report.text.item_lines, 1);
        assert_eq!(report.text.header_lines, 2);
        assert_eq!(report.text.noise_lines, 1);
        assert_eq!(report.text.suspicious_lines, vec![2]);
        assert!(report.text.characters.symbols >= 4);
    }

    #[test]
    fn test_pattern_stats() {
        let report = run("キャベツ 1個 ¥198\nBread loaf 2", Some("A-Mart"));

        assert_eq!(report.patterns.library_version, crate::receipt::library::BUILTIN_VERSION);
        assert!(report.patterns.vendor_matched);
        assert_eq!(report.patterns.hits.get("a-mart.qty-yen"), Some(&1));
        assert_eq!(report.patterns.hits.get("heuristic"), Some(&1));

        let strict = report.patterns.stages["strict"];
        assert_eq!(strict, StageStats { attempted: 2, accepted: 1, rejected: 0, abstained: 1 });
        assert_eq!(report.result.items_by_stage.get("heuristic"), Some(&1));
    }

    #[test]
    fn test_suggestions() {
        let report = run("Mystery Item 7\nOther Thing 3", Some("Corner Shop"));
        assert!(!report.patterns.vendor_matched);
        assert!(report.suggestions.iter().any(|s| s.contains("Corner Shop")));

        let report = run("Mystery Item 7\nOther Thing 3", None);
        assert!(report.suggestions.iter().any(|s| s.contains("heuristically")));

        let report = run("", None);
        assert_eq!(report.suggestions.len(), 1);
    }

    #[test]
    fn test_report_is_deterministic() {
        let text = "キャベツ 1個 ¥198\nMilk $1.99\nLIMES 3 @ 0.50 1.50";
        assert_eq!(run(text, None), run(text, None));
    }
}
