//! End-to-end extraction tests and properties.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rcpt_core::receipt::library::PatternLibrary;
use rcpt_core::receipt::stages::{StageMatcher, StrictStage};
use rcpt_core::text::normalize;
use rcpt_core::{AnomalyKind, ExtractOptions, ItemField, StageKind, extract};
use rust_decimal::Decimal;

const A_MART_RECEIPT: &str = "\
A-MART 駅前店
2024/10/19 12:31 レジ02
------------------------
キャベツ 1個 ¥198
牛乳 ¥238 ※ 賞味期限10/21
12 豚こま切れ ¥498
値引 ▲50
------------------------
小計 ¥884
合計 ¥884
お預り ¥1,000
お釣 ¥116
";

const GREENLEAF_RECEIPT: &str = "\
GREENLEAF MARKET
(555) 010-2299
BANANAS 1.29 F
LIMES 3 @ 0.50 1.50 F
ORGANIC MILK 4.79 F
SUBTOTAL 7.58
TAX 0.00
TOTAL 7.58
VISA 7.58
";

#[test]
fn test_scenario_plain_line_without_hint() {
    let result = extract("キャベツ 1個 ¥198", &ExtractOptions::default()).unwrap();

    assert_eq!(result.items.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.name.as_deref(), Some("キャベツ"));
    assert_eq!(item.quantity, Some(Decimal::ONE));
    assert_eq!(item.unit_price, Some(Decimal::from(198)));
    assert!(item.confidence >= 0.3);
    assert!(matches!(item.stage, StageKind::Flexible | StageKind::Heuristic));
}

#[test]
fn test_scenario_empty_input() {
    let result = extract("", &ExtractOptions::default()).unwrap();

    assert!(result.items.is_empty());
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.anomaly_kinds(), vec![AnomalyKind::EmptyExtraction]);
}

#[test]
fn test_scenario_negative_price_flagged() {
    let result = extract("値引 -50", &ExtractOptions::default()).unwrap();

    let item = &result.items[0];
    assert_eq!(item.unit_price, Some(Decimal::from(-50)));
    assert!(result.anomalies_for_line(0).any(|a| a.kind == AnomalyKind::InvalidPrice));
    assert!(!item.is_auto_corrected());
}

#[test]
fn test_scenario_vendor_hint_reaches_strict() {
    let hinted = extract("キャベツ 1個 ¥198", &ExtractOptions::new().with_vendor("A-Mart")).unwrap();
    assert_eq!(hinted.items[0].stage, StageKind::Strict);
    assert!(hinted.items[0].confidence >= 0.8);

    let plain = extract("キャベツ 1個 ¥198", &ExtractOptions::default()).unwrap();
    assert!(plain.items[0].confidence < 0.8);
}

#[test]
fn test_multiplier_quantity_reaches_heuristic() {
    for options in [ExtractOptions::new().with_vendor("A-Mart"), ExtractOptions::default()] {
        let result = extract("キャベツ ×2 ¥396", &options).unwrap();
        let item = &result.items[0];

        assert_eq!(item.stage, StageKind::Heuristic);
        assert_eq!(item.name.as_deref(), Some("キャベツ"));
        assert_eq!(item.quantity, Some(Decimal::from(2)));
        assert!(item.confidence < 0.8);
    }
}

#[test]
fn test_price_with_all_digits_misread() {
    let result = extract("Milk $I.OO", &ExtractOptions::default()).unwrap();

    assert_eq!(result.items.len(), 1);
    let item = &result.items[0];
    assert_eq!(item.stage, StageKind::Heuristic);
    assert_eq!(item.name.as_deref(), Some("Milk"));
    assert_eq!(item.unit_price, Some(Decimal::new(100, 2)));
    assert!(!result.has_anomaly(AnomalyKind::EmptyExtraction));
}

#[test]
fn test_a_mart_receipt() {
    let result = extract(A_MART_RECEIPT, &ExtractOptions::new().with_vendor("a-mart")).unwrap();

    let names: Vec<&str> = result.items.iter().filter_map(|i| i.name.as_deref()).collect();
    assert_eq!(names, vec!["キャベツ", "牛乳", "豚こま切れ", "値引"]);

    let milk = &result.items[1];
    assert_eq!(milk.stage, StageKind::Strict);
    assert_eq!(milk.expiry_hint.as_ref().map(|h| h.raw.as_str()), Some("10/21"));
    assert_eq!(milk.category_hint.as_deref(), Some("dairy"));

    let pork = &result.items[2];
    assert_eq!(pork.category_hint.as_deref(), Some("12"));
    assert_eq!(pork.unit_price, Some(Decimal::from(498)));

    let discount = &result.items[3];
    assert_eq!(discount.unit_price, Some(Decimal::from(-50)));
    assert!(
        result
            .anomalies_for_line(discount.line_index)
            .any(|a| a.kind == AnomalyKind::InvalidPrice)
    );

    assert!(result.items.windows(2).all(|w| w[0].line_index < w[1].line_index));
}

#[test]
fn test_greenleaf_receipt() {
    let options = ExtractOptions::new().with_vendor("Greenleaf");
    let result = extract(GREENLEAF_RECEIPT, &options).unwrap();

    assert_eq!(result.items.len(), 3);
    assert!(result.items.iter().all(|i| i.stage == StageKind::Strict));

    let limes = &result.items[1];
    assert_eq!(limes.name.as_deref(), Some("LIMES"));
    assert_eq!(limes.quantity, Some(Decimal::from(3)));
    assert_eq!(limes.unit_price, Some(Decimal::new(50, 2)));
    assert_eq!(limes.subtotal, Some(Decimal::new(150, 2)));
    assert!(!result.has_anomaly(AnomalyKind::ArithmeticMismatch));
}

#[test]
fn test_cascade_keeps_strict_candidate() {
    let library = PatternLibrary::builtin();
    let patterns = library.lookup(Some("A-Mart"));
    let lines = normalize("キャベツ 1個 ¥198");

    let strict = StrictStage::default().attempt(&lines[0], &patterns).unwrap();
    let result = extract("キャベツ 1個 ¥198", &ExtractOptions::new().with_vendor("A-Mart")).unwrap();
    let item = &result.items[0];

    assert_eq!(item.pattern_id, strict.pattern_id);
    assert_eq!(item.confidence, strict.confidence);
    assert_eq!(item.name, strict.fields.name);
    assert_eq!(item.unit_price, strict.fields.unit_price);
    assert_eq!(item.quantity, strict.fields.quantity);
}

#[test]
fn test_auto_correction_law() {
    let result = extract("Orange Juice 2x 3.49", &ExtractOptions::default()).unwrap();
    let item = &result.items[0];

    assert_eq!(item.unit_price, Some(Decimal::new(349, 2)));
    assert_eq!(item.quantity, Some(Decimal::from(2)));
    assert_eq!(item.subtotal, Some(Decimal::new(698, 2)));
    assert_eq!(item.corrected_fields, vec![ItemField::Subtotal]);
}

#[test]
fn test_debug_report_attached() {
    let result = extract(GREENLEAF_RECEIPT, &ExtractOptions::new().with_debug(true)).unwrap();
    let report = result.debug.as_ref().unwrap();

    assert_eq!(report.text.total_lines, 9);
    assert_eq!(report.result.item_count, result.items.len());
    assert!(!report.patterns.vendor_matched);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("debug").is_some());
    let plain = extract(GREENLEAF_RECEIPT, &ExtractOptions::default()).unwrap();
    let plain = serde_json::to_value(plain).unwrap();
    assert!(plain.get("debug").is_none());
}

fn receipt_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z]{3,12} [0-9]{1,3}\\.[0-9]{2}",
        "[ぁ-ん]{2,6} [0-9]{1,2}個 ¥[0-9]{2,4}",
        "[A-Z]{3,10} [0-9] @ [0-9]\\.[0-9]{2} [0-9]{1,2}\\.[0-9]{2} F",
        "\\PC{0,40}",
    ]
}

proptest! {
    #[test]
    fn prop_extract_never_fails(text in "\\PC{0,400}") {
        let result = extract(&text, &ExtractOptions::default());
        prop_assert!(result.is_ok());
    }

    #[test]
    fn prop_confidences_bounded_and_ordered(lines in prop::collection::vec(receipt_line(), 0..20)) {
        let text = lines.join("\n");
        let result = extract(&text, &ExtractOptions::default()).unwrap();

        prop_assert!((0.0..=1.0).contains(&result.confidence));
        prop_assert!((0.0..=1.0).contains(&result.quality_score));
        for item in &result.items {
            prop_assert!((0.0..=1.0).contains(&item.confidence));
        }
        prop_assert!(result.items.windows(2).all(|w| w[0].line_index < w[1].line_index));
    }

    #[test]
    fn prop_extract_is_idempotent(
        lines in prop::collection::vec(receipt_line(), 0..12),
        debug in any::<bool>(),
    ) {
        let text = lines.join("\n");
        let options = ExtractOptions::new().with_debug(debug);
        prop_assert_eq!(extract(&text, &options).unwrap(), extract(&text, &options).unwrap());
    }
}
