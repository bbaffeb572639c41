//! Error types for parsing, conversion and fetching.

use cnbfx_common::Currency;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while turning feed text into a rate sheet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than two non-blank lines.
    #[error("Invalid response format: insufficient lines")]
    InsufficientLines,

    /// Header line does not carry a recognisable `D MMM YYYY` date.
    #[error("Invalid date in header: {0}")]
    InvalidDate(String),

    /// Data row does not have exactly five pipe-delimited fields.
    #[error("Invalid rate format on line {line}: {content}")]
    InvalidRowShape { line: usize, content: String },

    /// Quote unit or rate is not a number.
    #[error("Invalid numeric values on line {line}: {content}")]
    InvalidNumeric { line: usize, content: String },

    /// Rate is zero or negative.
    #[error("Invalid exchange rate (must be positive) on line {line}: {content}")]
    InvalidRate { line: usize, content: String },

    /// The same currency code appears twice.
    #[error("Duplicate currency code {code} on line {line}")]
    DuplicateCode { line: usize, code: String },

    /// Header parsed but no data rows followed.
    #[error("No valid exchange rates found in response")]
    EmptyRateSet,
}

impl ParseError {
    /// Discriminant of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::InsufficientLines => "insufficient_lines",
            ParseError::InvalidDate(_) => "invalid_date",
            ParseError::InvalidRowShape { .. } => "invalid_row_shape",
            ParseError::InvalidNumeric { .. } => "invalid_numeric",
            ParseError::InvalidRate { .. } => "invalid_rate",
            ParseError::DuplicateCode { .. } => "duplicate_code",
            ParseError::EmptyRateSet => "empty_rate_set",
        }
    }

    /// 1-based input line the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::InvalidRowShape { line, .. }
            | ParseError::InvalidNumeric { line, .. }
            | ParseError::InvalidRate { line, .. }
            | ParseError::DuplicateCode { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Errors raised by the conversion engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Amount must be positive")]
    AmountNotPositive,

    #[error("Currency code '{0}' not found")]
    CurrencyNotFound(Currency),

    #[error("Invalid exchange rate for {code}: {rate}")]
    InvalidRate { code: Currency, rate: Decimal },

    /// Neither side, or both sides, are the home currency.
    #[error("Only conversions to/from the home currency are supported ({from} -> {to})")]
    UnsupportedPair { from: Currency, to: Currency },

    /// Intermediate result does not fit a decimal.
    #[error("Conversion result is out of range")]
    CalculationOverflow,
}

impl ConversionError {
    /// Discriminant of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ConversionError::AmountNotPositive => "amount_not_positive",
            ConversionError::CurrencyNotFound(_) => "currency_not_found",
            ConversionError::InvalidRate { .. } => "invalid_rate",
            ConversionError::UnsupportedPair { .. } => "unsupported_pair",
            ConversionError::CalculationOverflow => "calculation_error",
        }
    }
}

/// Errors raised at the fetch boundary, classified so callers can pick a
/// retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failure before a response arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    /// Body arrived but is empty or not a usable rate sheet.
    #[error("Failed to parse CNB response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Discriminant of the failure.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::Http { .. } => "http",
            FetchError::Parse(_) => "parse",
        }
    }

    /// Whether trying again could succeed. A format change upstream, a
    /// missing endpoint or a refusal will not fix itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Http { status } => !matches!(status, 403 | 404),
            FetchError::Parse(_) => false,
        }
    }

    /// One actionable sentence for the end user.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Network(_) => {
                "Failed to connect to CNB API. Please check your internet connection.".to_string()
            }
            FetchError::Http { status: 404 } => {
                "CNB API endpoint not found. Please try again later.".to_string()
            }
            FetchError::Http { status: 403 } => {
                "Access to CNB API forbidden. Please try again later.".to_string()
            }
            FetchError::Http { status: 429 } => {
                "Too many requests to CNB API. Please wait before trying again.".to_string()
            }
            FetchError::Http { status } => {
                format!("CNB API request failed (HTTP {status}). Please try again later.")
            }
            FetchError::Parse(_) => {
                "Failed to parse exchange rates data. The API response format may have changed."
                    .to_string()
            }
        }
    }
}

impl From<ParseError> for FetchError {
    fn from(err: ParseError) -> Self {
        FetchError::Parse(err.to_string())
    }
}

/// Any failure surfaced by the engine facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FxError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
