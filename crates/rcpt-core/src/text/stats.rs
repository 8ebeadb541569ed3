//! Character-class statistics.

use serde::{Deserialize, Serialize};

/// Character-class histogram of a piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharClassCounts {
    pub letters: usize,
    pub digits: usize,
    pub whitespace: usize,
    pub currency: usize,
    pub punctuation: usize,
    /// Anything else: box drawing, replacement characters, stray symbols.
    pub symbols: usize,
}

impl CharClassCounts {
    /// Count the characters of `text`.
    pub fn of(text: &str) -> Self {
        let mut counts = Self::default();
        for c in text.chars() {
            counts.add(c);
        }
        counts
    }

    fn add(&mut self, c: char) {
        if c.is_whitespace() {
            self.whitespace += 1;
        } else if c.is_numeric() {
            self.digits += 1;
        } else if c.is_alphabetic() {
            self.letters += 1;
        } else if is_currency(c) {
            self.currency += 1;
        } else if is_punctuation(c) {
            self.punctuation += 1;
        } else {
            self.symbols += 1;
        }
    }

    /// Merge another histogram into this one.
    pub fn merge(&mut self, other: &CharClassCounts) {
        self.letters += other.letters;
        self.digits += other.digits;
        self.whitespace += other.whitespace;
        self.currency += other.currency;
        self.punctuation += other.punctuation;
        self.symbols += other.symbols;
    }

    pub fn non_whitespace(&self) -> usize {
        self.letters + self.digits + self.currency + self.punctuation + self.symbols
    }

    pub fn alphanumeric(&self) -> usize {
        self.letters + self.digits
    }

    /// Share of unexpected symbols among non-whitespace characters.
    pub fn symbol_ratio(&self) -> f32 {
        ratio(self.symbols, self.non_whitespace())
    }

    /// Share of non-alphanumeric characters among non-whitespace characters.
    pub fn non_alphanumeric_ratio(&self) -> f32 {
        let total = self.non_whitespace();
        ratio(total - self.alphanumeric(), total)
    }
}

fn ratio(part: usize, total: usize) -> f32 {
    if total == 0 { 0.0 } else { part as f32 / total as f32 }
}

pub(crate) fn is_currency(c: char) -> bool {
    matches!(c, '¥' | '$' | '€' | '£' | '円')
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c, '、' | '。' | '・' | '「' | '」' | '（' | '）' | '※' | '×' | '@')
}
