//! Common regex fragments and patterns for receipt line extraction.

use lazy_static::lazy_static;
use regex::Regex;

/// Currency symbol (after normalization `円` has become a `¥` prefix).
pub const CURRENCY: &str = r"[¥$€£]";

/// Amount with optional thousands separators, decimals and sign.
pub const AMOUNT: &str = r"(?:-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?-?)";

/// Count units printed after a quantity.
pub const QTY_UNIT: &str = r"(?:個|点|本|袋|パック|コ|枚|pcs|pc|ea)";

/// Quantity value.
pub const QTY: &str = r"(?:\d+(?:\.\d+)?)";

/// Tax / reduced-rate marks printed after a price.
pub const TAX_MARK: &str = r"(?:※|\*|軽|外|内|[TFN])";

lazy_static! {
    // Single price token, optionally with currency prefix
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"^([¥$€£])?(-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?-?)$"
    ).unwrap();

    // Quantity with trailing unit or multiplier: 2個, 3x, 2pcs
    pub static ref QTY_SUFFIX_TOKEN: Regex = Regex::new(
        r"^(\d+(?:\.\d+)?)(?:個|点|本|袋|パック|コ|枚|pcs|pc|ea|x|X|×)$"
    ).unwrap();

    // Quantity with leading multiplier: x2, ×3
    pub static ref QTY_PREFIX_TOKEN: Regex = Regex::new(
        r"^[x×X*](\d+(?:\.\d+)?)$"
    ).unwrap();

    // Quantity fused with a unit price: 2x1.50, 3@0.99
    pub static ref QTY_AT_PRICE_TOKEN: Regex = Regex::new(
        r"^(\d+(?:\.\d+)?)[x×X@]([¥$€£]?\d+(?:\.\d{1,2})?)$"
    ).unwrap();

    // Unit price introduced by @: @1.50
    pub static ref AT_PRICE_TOKEN: Regex = Regex::new(
        r"^@([¥$€£]?\d+(?:\.\d{1,2})?)$"
    ).unwrap();

    pub static ref MULTIPLIER_TOKEN: Regex = Regex::new(r"^[x×X@]$").unwrap();

    pub static ref TAX_MARK_TOKEN: Regex = Regex::new(r"^(?:※|\*|軽|外|内|[TFN])$").unwrap();

    pub static ref BARCODE_TOKEN: Regex = Regex::new(r"^\d{8,}$").unwrap();

    // Token that looks numeric but carries OCR letter confusions: 1O8, l98, 2.S0
    pub static ref OCR_NUMERIC_TOKEN: Regex = Regex::new(
        r"^[¥$€£]?-?[0-9OoIlSB]*[0-9][0-9OoIlSB]*(?:[.,][0-9OoIlSB]{1,2})?$"
    ).unwrap();

    // Currency amount whose digits were all misread as letters: $I.OO, ¥lOB
    pub static ref OCR_CURRENCY_AMOUNT_TOKEN: Regex = Regex::new(
        r"^[¥$€£]-?[0-9OoIlSB]+(?:[.,][0-9OoIlSB]{1,2})?$"
    ).unwrap();

    // Expiry hints: 賞味期限10/21, BB 2024-10-21, EXP:21.10.2024
    pub static ref EXPIRY_HINT: Regex = Regex::new(
        r"(?i)(?:賞味期限|消費期限|期限|賞味|消費|best\s*before|\bbb\b|\bexp(?:iry)?\b|use\s*by)[\s:.]*(\d{1,4}[/.\-]\d{1,2}(?:[/.\-]\d{1,4})?)"
    ).unwrap();
}

/// Build an expression from fragments, replacing `{CUR}`, `{AMT}`, `{QTY}`,
/// `{UNIT}` and `{TAX}` placeholders.
pub fn expand(template: &str) -> String {
    template
        .replace("{CUR}", CURRENCY)
        .replace("{AMT}", AMOUNT)
        .replace("{QTY}", QTY)
        .replace("{UNIT}", QTY_UNIT)
        .replace("{TAX}", TAX_MARK)
}
