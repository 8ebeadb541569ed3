//! Field value parsing for receipt lines.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{EXPIRY_HINT, OCR_CURRENCY_AMOUNT_TOKEN, OCR_NUMERIC_TOKEN};
use crate::models::receipt::ExpiryHint;
use crate::text::CharClassCounts;

/// Longest digit run accepted for an amount; keeps arithmetic far from overflow.
const MAX_AMOUNT_DIGITS: usize = 12;

/// Parse a receipt amount such as `¥1,980`, `2.99`, `-50` or `50-`.
///
/// A trailing minus (common on Japanese discount lines) is treated as a sign.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();
    let s = s.trim_start_matches(['¥', '$', '€', '£']);
    let (negative, s) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_suffix('-') {
        (true, rest)
    } else {
        (false, s)
    };
    let s = s.trim_start_matches(['¥', '$', '€', '£']);

    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if cleaned.chars().filter(|c| c.is_ascii_digit()).count() > MAX_AMOUNT_DIGITS {
        return None;
    }

    let value = Decimal::from_str(&cleaned).ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a quantity such as `2`, `0.35` or `-1`.
pub fn parse_quantity(s: &str) -> Option<Decimal> {
    let s = s.trim();
    if s.is_empty() || s.len() > MAX_AMOUNT_DIGITS {
        return None;
    }
    Decimal::from_str(s).ok()
}

/// Repair common OCR letter-for-digit confusions inside a numeric token.
///
/// Returns `None` when the token does not look numeric at all.
pub fn repair_ocr_digits(token: &str) -> Option<String> {
    if !OCR_NUMERIC_TOKEN.is_match(token) && !OCR_CURRENCY_AMOUNT_TOKEN.is_match(token) {
        return None;
    }
    Some(
        token
            .chars()
            .map(|c| match c {
                'O' | 'o' => '0',
                'I' | 'l' => '1',
                'S' => '5',
                'B' => '8',
                c => c,
            })
            .collect(),
    )
}

/// Find an expiry hint on a line; returns the hint and the byte range it spans.
pub fn find_expiry_hint(line: &str) -> Option<(ExpiryHint, std::ops::Range<usize>)> {
    let caps = EXPIRY_HINT.captures(line)?;
    let whole = caps.get(0)?;
    let raw = caps.get(1)?.as_str().to_string();
    let date = parse_hint_date(&raw);
    Some((ExpiryHint { raw, date }, whole.range()))
}

/// Parse `yyyy/mm/dd`, `yy/mm/dd` or `dd.mm.yyyy`; month/day only stays unparsed.
fn parse_hint_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.split(['/', '.', '-']).collect();
    if parts.len() != 3 {
        return None;
    }

    let nums: Vec<u32> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    if nums.len() != 3 {
        return None;
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (nums[0] as i32, nums[1], nums[2])
    } else if parts[2].len() == 4 {
        (nums[2] as i32, nums[1], nums[0])
    } else if parts[0].len() == 2 {
        (2000 + nums[0] as i32, nums[1], nums[2])
    } else {
        return None;
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Trim marks and separators around an item name; `None` if nothing is left.
pub fn clean_name(raw: &str) -> Option<String> {
    let name = raw
        .trim()
        .trim_start_matches(['※', '*', '#'])
        .trim_end_matches([':', '-', '*', '※'])
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Whether a name carries at least one letter.
pub fn has_letter(name: &str) -> bool {
    name.chars().any(char::is_alphabetic)
}

/// Share of non-alphanumeric characters in a name.
pub fn name_noise_ratio(name: &str) -> f32 {
    CharClassCounts::of(name).non_alphanumeric_ratio()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("¥1,980"), Some(dec("1980")));
        assert_eq!(parse_amount("2.99"), Some(dec("2.99")));
        assert_eq!(parse_amount("-50"), Some(dec("-50")));
        assert_eq!(parse_amount("50-"), Some(dec("-50")));
        assert_eq!(parse_amount("-¥50"), Some(dec("-50")));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("1234567890123"), None);
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("2"), Some(Decimal::from(2)));
        assert_eq!(parse_quantity("0.35"), Some(dec("0.35")));
        assert_eq!(parse_quantity("x"), None);
    }

    #[test]
    fn test_repair_ocr_digits() {
        assert_eq!(repair_ocr_digits("1O8").as_deref(), Some("108"));
        assert_eq!(repair_ocr_digits("¥l98").as_deref(), Some("¥198"));
        assert_eq!(repair_ocr_digits("2.S0").as_deref(), Some("2.50"));
        assert_eq!(repair_ocr_digits("BOOK"), None);
        assert_eq!(repair_ocr_digits("$I.OO").as_deref(), Some("$1.00"));
        assert_eq!(repair_ocr_digits("IO"), None);
    }

    #[test]
    fn test_find_expiry_hint() {
        let (hint, range) = find_expiry_hint("牛乳 ¥238 期限2024/10/21").unwrap();
        assert_eq!(hint.raw, "2024/10/21");
        assert_eq!(hint.date, NaiveDate::from_ymd_opt(2024, 10, 21));
        assert_eq!(&"牛乳 ¥238 期限2024/10/21"[range], "期限2024/10/21");

        let (hint, _) = find_expiry_hint("YOGURT 1.29 EXP 21.10.2024").unwrap();
        assert_eq!(hint.date, NaiveDate::from_ymd_opt(2024, 10, 21));

        let (hint, _) = find_expiry_hint("豆腐 ¥98 賞味10/21").unwrap();
        assert_eq!(hint.raw, "10/21");
        assert_eq!(hint.date, None);

        assert!(find_expiry_hint("BANANAS 1.29 F").is_none());
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name(" ※牛乳 ").as_deref(), Some("牛乳"));
        assert_eq!(clean_name("Whole  Milk:").as_deref(), Some("Whole Milk"));
        assert_eq!(clean_name("※"), None);
    }
}
