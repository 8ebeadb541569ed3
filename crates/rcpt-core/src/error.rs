//! Error types for the rcpt-core library.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// Malformed extraction input.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Pattern definition error.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that reject an extraction request outright.
///
/// These are the only fatal outcomes of an extraction; everything else is
/// reported as an anomaly on the result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    /// The raw text is not valid UTF-8.
    #[error("input is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidEncoding { valid_up_to: usize },

    /// The raw text exceeds the configured size limit.
    #[error("input is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    /// The confidence floor override is outside [0.0, 1.0].
    #[error("confidence floor must be within [0.0, 1.0], got {0}")]
    InvalidConfidenceFloor(f32),
}

/// Errors related to pattern definitions.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The pattern expression failed to compile.
    #[error("invalid regex in pattern {id}: {source}")]
    InvalidRegex {
        id: String,
        #[source]
        source: regex::Error,
    },

    /// Two definitions share the same identifier.
    #[error("duplicate pattern id: {0}")]
    DuplicateId(String),

    /// The pattern captures neither `price` nor `subtotal`.
    #[error("pattern {0} must capture `price` or `subtotal`")]
    MissingPriceCapture(String),

    /// The definition file could not be parsed.
    #[error("failed to parse pattern definitions: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;
