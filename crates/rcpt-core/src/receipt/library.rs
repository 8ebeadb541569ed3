//! Versioned registry of vendor-specific and generic line patterns.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fields::{clean_name, parse_amount, parse_quantity};
use super::patterns::expand;
use crate::error::PatternError;
use crate::models::receipt::CandidateFields;

/// Version of the built-in definition set.
pub const BUILTIN_VERSION: &str = "2024.10";

lazy_static! {
    static ref BUILTIN: Arc<PatternLibrary> = Arc::new(
        PatternLibrary::from_definitions(BUILTIN_VERSION, builtin_definitions())
            .expect("built-in pattern definitions compile")
    );
}

/// Confidence class of a pattern, fixed at authoring time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceClass {
    Strict,
    Flexible,
    Heuristic,
}

impl ConfidenceClass {
    /// Highest confidence a match of this class can score.
    pub fn ceiling(&self) -> f32 {
        match self {
            ConfidenceClass::Strict => 0.95,
            ConfidenceClass::Flexible => 0.75,
            ConfidenceClass::Heuristic => 0.55,
        }
    }
}

/// Field a pattern can populate, keyed by capture group name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternField {
    Name,
    UnitPrice,
    Quantity,
    Subtotal,
    CategoryHint,
}

impl PatternField {
    pub fn capture_name(&self) -> &'static str {
        match self {
            PatternField::Name => "name",
            PatternField::UnitPrice => "price",
            PatternField::Quantity => "qty",
            PatternField::Subtotal => "subtotal",
            PatternField::CategoryHint => "category",
        }
    }

    fn from_capture_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(PatternField::Name),
            "price" => Some(PatternField::UnitPrice),
            "qty" => Some(PatternField::Quantity),
            "subtotal" => Some(PatternField::Subtotal),
            "category" => Some(PatternField::CategoryHint),
            _ => None,
        }
    }
}

/// Serializable pattern definition.
///
/// `regex` may use the `{CUR}`, `{AMT}`, `{QTY}`, `{UNIT}` and `{TAX}`
/// placeholders; named groups `name`, `price`, `qty`, `subtotal` and
/// `category` select the extracted fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub id: String,
    /// Vendor the pattern belongs to; absent for generic patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    pub class: ConfidenceClass,
    pub regex: String,
}

impl PatternDefinition {
    pub fn new(id: &str, vendor: Option<&str>, class: ConfidenceClass, regex: &str) -> Self {
        Self {
            id: id.to_string(),
            vendor: vendor.map(str::to_string),
            class,
            regex: regex.to_string(),
        }
    }
}

/// Pattern definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternFile {
    pub version: String,
    pub patterns: Vec<PatternDefinition>,
}

/// A compiled, immutable extraction pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    id: String,
    vendor: Option<String>,
    class: ConfidenceClass,
    fields: Vec<PatternField>,
    source: String,
    anchored: Regex,
    relaxed: Regex,
}

impl Pattern {
    /// Compile a definition.
    pub fn compile(definition: &PatternDefinition) -> Result<Self, PatternError> {
        let expression = expand(&definition.regex);
        let invalid = |source| PatternError::InvalidRegex {
            id: definition.id.clone(),
            source,
        };

        let relaxed = Regex::new(&expression).map_err(invalid)?;
        let anchored = Regex::new(&format!("^(?:{})$", expression)).map_err(invalid)?;

        let fields: Vec<PatternField> = relaxed
            .capture_names()
            .flatten()
            .filter_map(PatternField::from_capture_name)
            .collect();

        if !fields.contains(&PatternField::UnitPrice) && !fields.contains(&PatternField::Subtotal) {
            return Err(PatternError::MissingPriceCapture(definition.id.clone()));
        }

        Ok(Self {
            id: definition.id.clone(),
            vendor: definition.vendor.as_deref().map(vendor_key),
            class: definition.class,
            fields,
            source: definition.regex.clone(),
            anchored,
            relaxed,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized vendor key, `None` for generic patterns.
    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn is_generic(&self) -> bool {
        self.vendor.is_none()
    }

    pub fn class(&self) -> ConfidenceClass {
        self.class
    }

    /// Fields this pattern can populate.
    pub fn fields(&self) -> &[PatternField] {
        &self.fields
    }

    pub fn extracts(&self, field: PatternField) -> bool {
        self.fields.contains(&field)
    }

    /// Expression as authored, before placeholder expansion.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match the whole line.
    pub fn match_line(&self, text: &str) -> Option<CandidateFields> {
        self.anchored.captures(text).map(|caps| fields_from(&caps))
    }

    /// Match anywhere in the line; returns the fields and the share of the
    /// line's characters covered by the match.
    pub fn match_partial(&self, text: &str) -> Option<(CandidateFields, f32)> {
        let caps = self.relaxed.captures(text)?;
        let matched = caps.get(0)?.as_str().chars().count();
        let total = text.chars().count().max(1);
        Some((fields_from(&caps), matched as f32 / total as f32))
    }
}

fn fields_from(caps: &Captures<'_>) -> CandidateFields {
    CandidateFields {
        name: caps.name("name").and_then(|m| clean_name(m.as_str())),
        unit_price: caps.name("price").and_then(|m| parse_amount(m.as_str())),
        quantity: caps.name("qty").and_then(|m| parse_quantity(m.as_str())),
        subtotal: caps.name("subtotal").and_then(|m| parse_amount(m.as_str())),
        category_hint: caps
            .name("category")
            .map(|m| m.as_str().trim().to_string())
            .filter(|c| !c.is_empty()),
        expiry_hint: None,
    }
}

/// Normalize a vendor name or hint into a lookup key (`A-Mart` -> `amart`).
pub fn vendor_key(vendor: &str) -> String {
    vendor
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Immutable pattern registry: an arena of patterns indexed by vendor.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    version: String,
    patterns: Vec<Pattern>,
    by_vendor: HashMap<String, Vec<usize>>,
    generic: Vec<usize>,
}

impl PatternLibrary {
    /// The built-in library, compiled once per process.
    pub fn builtin() -> Arc<PatternLibrary> {
        Arc::clone(&BUILTIN)
    }

    /// Compile a library from definitions, keeping their order.
    pub fn from_definitions(
        version: impl Into<String>,
        definitions: Vec<PatternDefinition>,
    ) -> Result<Self, PatternError> {
        let mut patterns: Vec<Pattern> = Vec::with_capacity(definitions.len());
        let mut by_vendor: HashMap<String, Vec<usize>> = HashMap::new();
        let mut generic = Vec::new();

        for definition in &definitions {
            if patterns.iter().any(|p| p.id == definition.id) {
                return Err(PatternError::DuplicateId(definition.id.clone()));
            }

            let pattern = Pattern::compile(definition)?;
            let slot = patterns.len();
            match pattern.vendor() {
                Some(vendor) => by_vendor.entry(vendor.to_string()).or_default().push(slot),
                None => generic.push(slot),
            }
            patterns.push(pattern);
        }

        let library = Self {
            version: version.into(),
            patterns,
            by_vendor,
            generic,
        };
        debug!(
            "Compiled pattern library {} ({} patterns, {} vendors)",
            library.version,
            library.len(),
            library.by_vendor.len()
        );
        Ok(library)
    }

    /// Parse a JSON pattern file.
    pub fn from_json(json: &str) -> Result<Self, PatternError> {
        let file: PatternFile = serde_json::from_str(json)?;
        Self::from_definitions(file.version, file.patterns)
    }

    /// Load a JSON pattern file from disk.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let library = Self::from_json(&content)?;
        info!(
            "Loaded {} patterns (version {}) from {}",
            library.len(),
            library.version,
            path.display()
        );
        Ok(library)
    }

    /// Append the built-in definitions whose ids are not already present.
    pub fn with_builtin_fallback(self) -> Result<Self, PatternError> {
        let mut definitions: Vec<PatternDefinition> =
            self.patterns.iter().map(Pattern::definition).collect();
        definitions.extend(
            builtin_definitions()
                .into_iter()
                .filter(|d| self.get(&d.id).is_none()),
        );
        Self::from_definitions(format!("{}+builtin-{}", self.version, BUILTIN_VERSION), definitions)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// All patterns in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Known vendor keys, sorted.
    pub fn vendors(&self) -> Vec<&str> {
        let mut vendors: Vec<&str> = self.by_vendor.keys().map(String::as_str).collect();
        vendors.sort_unstable();
        vendors
    }

    pub fn has_vendor(&self, vendor_hint: &str) -> bool {
        self.by_vendor.contains_key(&vendor_key(vendor_hint))
    }

    /// Patterns for a vendor hint: vendor-specific first, then all generic
    /// patterns. Without a hint, or for an unknown vendor, generic only.
    pub fn lookup(&self, vendor_hint: Option<&str>) -> Vec<&Pattern> {
        let vendor_slots = vendor_hint
            .map(vendor_key)
            .and_then(|key| self.by_vendor.get(&key))
            .map(Vec::as_slice)
            .unwrap_or_default();

        vendor_slots
            .iter()
            .chain(self.generic.iter())
            .map(|&slot| &self.patterns[slot])
            .collect()
    }
}

impl Pattern {
    fn definition(&self) -> PatternDefinition {
        PatternDefinition {
            id: self.id.clone(),
            vendor: self.vendor.clone(),
            class: self.class,
            regex: self.source.clone(),
        }
    }
}

/// Built-in vendor and generic definitions.
pub fn builtin_definitions() -> Vec<PatternDefinition> {
    use ConfidenceClass::*;

    vec![
        // A-Mart: Japanese supermarket layout
        PatternDefinition::new(
            "a-mart.qty-yen",
            Some("A-Mart"),
            Strict,
            r"(?P<name>\D.*?)\s+(?P<qty>{QTY})(?:個|点)\s+¥(?P<price>{AMT})(?:\s*{TAX})?",
        ),
        PatternDefinition::new(
            "a-mart.dept-name-yen",
            Some("A-Mart"),
            Strict,
            r"(?P<category>\d{2,3})\s+(?P<name>\D.*?)\s+¥(?P<price>{AMT})(?:\s*{TAX})?",
        ),
        PatternDefinition::new(
            "a-mart.name-yen",
            Some("A-Mart"),
            Strict,
            r"(?:※\s*)?(?P<name>\D.*?)\s+¥(?P<price>{AMT})(?:\s*{TAX})?",
        ),
        // Greenleaf Market: US layout with trailing tax codes
        PatternDefinition::new(
            "greenleaf.qty-at-price",
            Some("Greenleaf"),
            Strict,
            r"(?P<name>[A-Z][A-Z0-9 &'./-]*?)\s+(?P<qty>\d+)\s*@\s*\$?(?P<price>{AMT})\s+\$?(?P<subtotal>{AMT})\s+[FNT]",
        ),
        PatternDefinition::new(
            "greenleaf.name-price-taxcode",
            Some("Greenleaf"),
            Strict,
            r"(?P<name>[A-Z][A-Z0-9 &'./-]*?)\s+\$?(?P<price>{AMT})\s+[FNT]",
        ),
        // Generic
        PatternDefinition::new(
            "generic.qty-times-price-subtotal",
            None,
            Strict,
            r"(?P<name>\D.*?)\s+(?P<qty>{QTY})\s*[x×X@]\s*{CUR}?(?P<price>{AMT})\s+{CUR}?(?P<subtotal>{AMT})(?:\s*{TAX})?",
        ),
        PatternDefinition::new(
            "generic.name-qty-times-price",
            None,
            Flexible,
            r"(?P<name>\D.*?)\s+(?P<qty>{QTY})\s*[x×X@]\s*{CUR}?(?P<price>{AMT})(?:\s*{TAX})?",
        ),
        PatternDefinition::new(
            "generic.name-qty-unit-price",
            None,
            Flexible,
            r"(?P<name>\D.*?)\s+(?P<qty>{QTY})\s*{UNIT}\s+{CUR}?(?P<price>{AMT})(?:\s*{TAX})?",
        ),
        PatternDefinition::new(
            "generic.name-currency-price",
            None,
            Flexible,
            r"(?P<name>\D.*?)\s*{CUR}(?P<price>{AMT})(?:\s*{TAX})?",
        ),
        PatternDefinition::new(
            "generic.currency-price-name",
            None,
            Flexible,
            r"{CUR}(?P<price>{AMT})\s+(?P<name>\D.*)",
        ),
        PatternDefinition::new(
            "generic.qty-times-name-subtotal",
            None,
            Flexible,
            r"(?P<qty>\d+)\s*[x×X]\s+(?P<name>\D.*?)\s+{CUR}?(?P<subtotal>{AMT})",
        ),
        PatternDefinition::new(
            "generic.name-price-taxmark",
            None,
            Flexible,
            r"(?P<name>\D.*?)\s+(?P<price>\d+\.\d{2})(?:\s*{TAX})?",
        ),
    ]
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "produce",
        &[
            "キャベツ", "レタス", "トマト", "玉ねぎ", "たまねぎ", "にんじん", "じゃがいも", "りんご",
            "バナナ", "みかん", "cabbage", "lettuce", "tomato", "onion", "carrot", "potato",
            "apple", "banana", "orange",
        ],
    ),
    (
        "dairy",
        &[
            "牛乳", "ヨーグルト", "チーズ", "バター", "卵", "たまご", "milk", "yogurt", "cheese",
            "butter", "cream", "egg",
        ],
    ),
    (
        "meat",
        &[
            "豚", "牛肉", "鶏", "ひき肉", "ハム", "ベーコン", "pork", "beef", "chicken", "ham",
            "bacon", "sausage",
        ],
    ),
    ("seafood", &["鮭", "まぐろ", "えび", "さば", "salmon", "tuna", "shrimp", "fish"]),
    ("bakery", &["パン", "bread", "bagel", "croissant", "muffin"]),
    (
        "beverages",
        &["お茶", "コーヒー", "ジュース", "coffee", "tea", "juice", "water", "soda", "cola"],
    ),
    ("household", &["洗剤", "ティッシュ", "detergent", "tissue", "soap"]),
];

/// Keyword category of an item name.
///
/// ASCII keywords match whole words (with plural `s`/`es`); others match as
/// substrings.
pub fn category_for(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                if kw.is_ascii() {
                    words.iter().any(|w| {
                        *w == *kw
                            || w.strip_suffix('s') == Some(kw)
                            || w.strip_suffix("es") == Some(kw)
                    })
                } else {
                    lower.contains(kw)
                }
            })
        })
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn ids(patterns: &[&Pattern]) -> Vec<String> {
        patterns.iter().map(|p| p.id().to_string()).collect()
    }

    #[test]
    fn test_builtin_compiles() {
        let library = PatternLibrary::builtin();
        assert_eq!(library.version(), BUILTIN_VERSION);
        assert_eq!(library.vendors(), vec!["amart", "greenleaf"]);
    }

    #[test]
    fn test_lookup_orders_vendor_first() {
        let library = PatternLibrary::builtin();

        let hinted = library.lookup(Some("A-Mart"));
        assert_eq!(hinted[0].id(), "a-mart.qty-yen");
        assert!(hinted[..3].iter().all(|p| p.vendor() == Some("amart")));
        assert!(hinted[3..].iter().all(|p| p.is_generic()));

        let generic = library.lookup(None);
        assert!(generic.iter().all(|p| p.is_generic()));
        assert_eq!(ids(&library.lookup(Some("Unknown Store"))), ids(&generic));
        assert_eq!(hinted.len(), generic.len() + 3);
    }

    #[test]
    fn test_fields_derived_from_captures() {
        let library = PatternLibrary::builtin();
        let pattern = library.get("greenleaf.qty-at-price").unwrap();
        assert!(pattern.extracts(PatternField::Quantity));
        assert!(pattern.extracts(PatternField::Subtotal));
        assert!(!pattern.extracts(PatternField::CategoryHint));
        assert_eq!(pattern.fields().len(), 4);

        let dept = library.get("a-mart.dept-name-yen").unwrap();
        assert!(dept.extracts(PatternField::CategoryHint));
    }

    #[test]
    fn test_match_line_and_partial() {
        let library = PatternLibrary::builtin();
        let pattern = library.get("a-mart.qty-yen").unwrap();

        let fields = pattern.match_line("キャベツ 1個 ¥198").unwrap();
        assert_eq!(fields.name.as_deref(), Some("キャベツ"));
        assert_eq!(fields.quantity, Some(Decimal::ONE));
        assert_eq!(fields.unit_price, Some(Decimal::from(198)));

        assert!(pattern.match_line("キャベツ 1個 ¥198 extra").is_none());
        let (_, coverage) = pattern.match_partial("キャベツ 1個 ¥198 extra").unwrap();
        assert!(coverage > 0.5 && coverage < 1.0);
    }

    #[test]
    fn test_definition_errors() {
        let bad_regex = vec![PatternDefinition::new(
            "bad",
            None,
            ConfidenceClass::Flexible,
            r"(?P<price>\d+",
        )];
        assert!(matches!(
            PatternLibrary::from_definitions("t", bad_regex),
            Err(PatternError::InvalidRegex { .. })
        ));

        let no_price = vec![PatternDefinition::new(
            "np",
            None,
            ConfidenceClass::Flexible,
            r"(?P<name>\w+)",
        )];
        assert!(matches!(
            PatternLibrary::from_definitions("t", no_price),
            Err(PatternError::MissingPriceCapture(_))
        ));

        let dup = vec![
            PatternDefinition::new("d", None, ConfidenceClass::Flexible, r"(?P<price>\d+)"),
            PatternDefinition::new("d", None, ConfidenceClass::Flexible, r"(?P<price>\d+)"),
        ];
        assert!(matches!(
            PatternLibrary::from_definitions("t", dup),
            Err(PatternError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_from_json_with_fallback() {
        let json = r#"{
            "version": "custom-1",
            "patterns": [
                {"id": "b-mart.code-name-price", "vendor": "B-Mart", "class": "strict",
                 "regex": "\\d{4}\\s+(?P<name>\\D.*?)\\s+¥(?P<price>{AMT})"}
            ]
        }"#;

        let library = PatternLibrary::from_json(json).unwrap().with_builtin_fallback().unwrap();
        assert!(library.has_vendor("b mart"));
        assert!(library.has_vendor("A-Mart"));
        assert_eq!(library.lookup(Some("B-Mart"))[0].id(), "b-mart.code-name-price");
        assert!(library.version().starts_with("custom-1+builtin-"));
    }

    #[test]
    fn test_category_for() {
        assert_eq!(category_for("キャベツ"), Some("produce"));
        assert_eq!(category_for("Whole Milk"), Some("dairy"));
        assert_eq!(category_for("EGGS LARGE"), Some("dairy"));
        assert_eq!(category_for("RIBEYE STEAK"), None);
        assert_eq!(category_for("Green Tea"), Some("beverages"));
    }
}
