//! Cleanup and classification of raw OCR lines.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::stats::CharClassCounts;
use super::{LineKind, Locale, NormalizedLine};
use crate::models::config::NormalizerConfig;
use crate::receipt::patterns::{EXPIRY_HINT, OCR_CURRENCY_AMOUNT_TOKEN};

/// Fixed OCR artifact substitutions, applied in order.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("￥", "¥"),
    ("▲", "-"),
    ("△", "-"),
    ("−", "-"),
    ("–", "-"),
    ("—", "-"),
    ("，", ","),
    ("．", "."),
];

lazy_static! {
    // Runs of leader dots, rules and similar separators
    static ref ARTIFACT_RUN: Regex = Regex::new(r"[.\-_=~・·*#]{3,}").unwrap();

    static ref YEN_SUFFIX: Regex = Regex::new(r"(-?\d[\d,]*(?:\.\d+)?)\s*円").unwrap();

    static ref CURRENCY_SPACE: Regex = Regex::new(r"([¥$€£])\s+(-?\d)").unwrap();

    static ref EURO_THOUSANDS: Regex = Regex::new(r"(\d)\.(\d{3})\b").unwrap();

    static ref EURO_DECIMAL: Regex = Regex::new(r"(\d),(\d{2})\b").unwrap();

    static ref HEADER_KEYWORDS: Regex = Regex::new(
        r"(?i)\b(?:total|sub-?total|tax|vat|change|cash|credit|debit|visa|mastercard|balance|tel|phone|receipt|thank|cashier|invoice|card|points?|tender|amount\s+due|items?\s+sold)\b|合計|小計|消費税|税額|税率|対象|お釣|おつり|釣銭|現金|領収|電話|預り|預かり|点数|レシート|登録番号|担当|クレジット|ポイント|毎度|ありがとう"
    ).unwrap();

    static ref DATE_TIME: Regex = Regex::new(
        r"\d{2,4}[/.\-年]\d{1,2}[/.\-月]\d{1,2}|\d{1,2}:\d{2}"
    ).unwrap();

    static ref PHONE: Regex = Regex::new(r"\d{2,4}-\d{2,4}-\d{3,4}").unwrap();
}

/// Text normalizer for raw OCR output.
#[derive(Debug, Clone)]
pub struct Normalizer {
    locale: Locale,
    noise_symbol_ratio: f32,
    min_item_chars: usize,
}

impl Normalizer {
    /// Create a normalizer with default settings.
    pub fn new() -> Self {
        Self::from_config(&NormalizerConfig::default())
    }

    /// Create a normalizer from configuration.
    pub fn from_config(config: &NormalizerConfig) -> Self {
        Self {
            locale: Locale::Auto,
            noise_symbol_ratio: config.noise_symbol_ratio,
            min_item_chars: config.min_item_chars,
        }
    }

    /// Set the locale hint.
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Split, clean and classify raw OCR text.
    ///
    /// Every physical line yields one [`NormalizedLine`]; nothing is dropped.
    /// Empty input yields an empty sequence.
    pub fn normalize(&self, text: &str) -> Vec<NormalizedLine> {
        if text.is_empty() {
            return Vec::new();
        }

        let unified = text.replace("\r\n", "\n").replace('\r', "\n");
        let lines: Vec<NormalizedLine> = unified
            .lines()
            .enumerate()
            .map(|(index, raw)| {
                let content = self.clean_line(raw);
                let kind = self.classify(&content);
                NormalizedLine { index, content, kind }
            })
            .collect();

        debug!(
            "Normalized {} lines ({} item candidates)",
            lines.len(),
            lines.iter().filter(|l| l.is_item()).count()
        );

        lines
    }

    /// Clean a single physical line.
    pub fn clean_line(&self, raw: &str) -> String {
        let mut line: String = raw.chars().filter_map(fold_char).collect();

        if matches!(self.locale, Locale::Auto | Locale::Japanese) {
            line = line.replace('\\', "¥");
        }
        for &(from, to) in SUBSTITUTIONS {
            if line.contains(from) {
                line = line.replace(from, to);
            }
        }

        let line = ARTIFACT_RUN.replace_all(&line, " ");
        let line = YEN_SUFFIX.replace_all(&line, "¥$1");
        let line = CURRENCY_SPACE.replace_all(&line, "$1$2");
        let line = if self.locale == Locale::European {
            let line = EURO_THOUSANDS.replace_all(&line, "$1$2");
            EURO_DECIMAL.replace_all(&line, "$1.$2").into_owned()
        } else {
            line.into_owned()
        };

        line.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Classify a cleaned line.
    pub fn classify(&self, content: &str) -> LineKind {
        if content.is_empty() {
            return LineKind::Noise;
        }

        let counts = CharClassCounts::of(content);
        if counts.alphanumeric() == 0 || counts.symbol_ratio() > self.noise_symbol_ratio {
            return LineKind::Noise;
        }

        if HEADER_KEYWORDS.is_match(content) {
            return LineKind::Header;
        }

        // Timestamps and register lines; dates on item lines are expiry hints
        if DATE_TIME.is_match(content) && !EXPIRY_HINT.is_match(content) {
            return LineKind::Header;
        }

        if counts.letters == 0 {
            return if PHONE.is_match(content) {
                LineKind::Header
            } else {
                LineKind::Noise
            };
        }

        // Store names, addresses and greetings carry no amounts
        let misread_amount = content
            .split_whitespace()
            .last()
            .is_some_and(|t| OCR_CURRENCY_AMOUNT_TOKEN.is_match(t));
        if counts.digits == 0 && !misread_amount {
            return LineKind::Header;
        }

        if counts.non_whitespace() < self.min_item_chars {
            return LineKind::Noise;
        }

        LineKind::Item
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize text with the default normalizer.
pub fn normalize(text: &str) -> Vec<NormalizedLine> {
    Normalizer::new().normalize(text)
}

/// Fold full-width ASCII and drop control characters.
fn fold_char(c: char) -> Option<char> {
    match c {
        '\t' | '\u{3000}' => Some(' '),
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0),
        c if c.is_control() => None,
        c => Some(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input() {
        assert!(normalize("").is_empty());
    }

    #[test]
    fn test_keeps_every_line_in_order() {
        let text = "A-MART\n\nキャベツ 1個 ¥198\n----------\n合計 ¥198";
        let lines = normalize(text);

        let kinds: Vec<LineKind> = lines.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Header,
                LineKind::Noise,
                LineKind::Item,
                LineKind::Noise,
                LineKind::Header,
            ]
        );
        assert_eq!(lines.iter().map(|l| l.index).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clean_line_substitutions() {
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.clean_line("ｷｬﾍﾞﾂ　１個　￥１９８"), "ｷｬﾍﾞﾂ 1個 ¥198");
        assert_eq!(normalizer.clean_line("牛乳  238円"), "牛乳 ¥238");
        assert_eq!(normalizer.clean_line("値引 ▲50"), "値引 -50");
        assert_eq!(normalizer.clean_line("Milk ........ $ 2.99"), "Milk $2.99");
        assert_eq!(normalizer.clean_line("豆腐\t\\98"), "豆腐 ¥98");
        assert_eq!(normalizer.clean_line("Bread\u{0007} 1.99"), "Bread 1.99");
    }

    #[test]
    fn test_european_decimal_comma() {
        let normalizer = Normalizer::new().with_locale(Locale::European);
        assert_eq!(normalizer.clean_line("Käse 1.234,56 €"), "Käse 1234.56 €");
        assert_eq!(normalizer.clean_line("Brot 1,99"), "Brot 1.99");

        // Backslash is only a yen sign on Japanese receipts
        assert_eq!(normalizer.clean_line("A\\B 1,99"), "A\\B 1.99");
    }

    #[test]
    fn test_classify() {
        let normalizer = Normalizer::new();
        assert_eq!(normalizer.classify("BANANAS 1.29 F"), LineKind::Item);
        assert_eq!(normalizer.classify("SUBTOTAL 12.40"), LineKind::Header);
        assert_eq!(normalizer.classify("2024/10/19 12:31"), LineKind::Header);
        assert_eq!(normalizer.classify("2024/10/19 12:31 レジ02"), LineKind::Header);
        assert_eq!(normalizer.classify("牛乳 ¥238 賞味期限2024/10/21"), LineKind::Item);
        assert_eq!(normalizer.classify("03-1234-5678"), LineKind::Header);
        assert_eq!(normalizer.classify("GREENLEAF MARKET"), LineKind::Header);
        assert_eq!(normalizer.classify("4901234567890"), LineKind::Noise);
        assert_eq!(normalizer.classify("▒▒▒ ▒1"), LineKind::Noise);
        assert_eq!(normalizer.classify("A1"), LineKind::Noise);
        assert_eq!(normalizer.classify("Milk $I.OO"), LineKind::Item);
        assert_eq!(normalizer.classify("Fresh Market $"), LineKind::Header);
    }
}
