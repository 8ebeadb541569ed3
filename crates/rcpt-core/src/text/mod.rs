//! Raw OCR text handling: documents, normalized lines and character statistics.

mod normalizer;
mod stats;

pub use normalizer::{Normalizer, normalize};
pub use stats::CharClassCounts;

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Locale hint for normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    /// Japanese conventions, plus decimal dots.
    #[default]
    Auto,
    /// Japanese receipts (yen, full-width text, backslash rendered for yen).
    Japanese,
    /// Decimal dot, no yen substitutions.
    English,
    /// Decimal comma (`1,99`) and dot thousands separators (`1.234,56`).
    European,
}

impl Locale {
    /// Parse a locale hint such as `ja`, `en-US` or `de`.
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.trim().to_lowercase();
        let language = hint.split(['-', '_']).next().unwrap_or("");
        match language {
            "ja" | "jp" | "japanese" => Locale::Japanese,
            "en" | "english" => Locale::English,
            "de" | "fr" | "es" | "it" | "nl" | "pl" | "pt" | "european" => Locale::European,
            _ => Locale::Auto,
        }
    }
}

/// Unprocessed OCR text of one receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    content: String,
    vendor_hint: Option<String>,
}

impl RawDocument {
    /// Create a document from text.
    pub fn new(content: impl Into<String>, vendor_hint: Option<String>) -> Self {
        Self {
            content: content.into(),
            vendor_hint,
        }
    }

    /// Create a document from raw bytes, which must be UTF-8.
    pub fn from_bytes(bytes: &[u8], vendor_hint: Option<String>) -> Result<Self, InputError> {
        let content = std::str::from_utf8(bytes).map_err(|e| InputError::InvalidEncoding {
            valid_up_to: e.valid_up_to(),
        })?;
        Ok(Self::new(content, vendor_hint))
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn vendor_hint(&self) -> Option<&str> {
        self.vendor_hint.as_deref()
    }
}

/// Classification of a normalized line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Likely holds one purchasable item.
    Item,
    /// Store name, totals, payment, dates and similar.
    Header,
    /// Separators, garbage and fragments.
    Noise,
}

/// One logical line of a receipt after cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedLine {
    /// Index of the physical line in the raw text.
    pub index: usize,
    /// Cleaned content.
    pub content: String,
    /// Classification.
    pub kind: LineKind,
}

impl NormalizedLine {
    pub fn is_item(&self) -> bool {
        self.kind == LineKind::Item
    }
}
