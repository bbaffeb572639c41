//! cnbfx FX Engine
//!
//! Reads the Czech National Bank daily exchange-rate fixing and converts
//! amounts between CZK and the currencies it lists.
//!
//! # Features
//!
//! - Parser for the pipe-delimited text feed (English and Czech headers)
//! - Validation of rate sheets and of raw user input
//! - Conversion that honours rates quoted per 100 or 1000 units
//! - HTTP feed with retry classification and a TTL sheet cache
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use cnbfx_fx::{FxEngine, FxEngineConfig, HttpRateFeed, HttpFeedConfig};
//!
//! let feed = Arc::new(HttpRateFeed::new(HttpFeedConfig::default())?);
//! let engine = FxEngine::new(feed, FxEngineConfig::default());
//!
//! let sheet = engine.rate_sheet().await?;
//! let result = engine.calculate("1000", "JPY", &sheet)?;
//! ```

pub mod cache;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod parser;
pub mod provider;
pub mod validation;

pub use cache::{SheetCache, SheetCacheConfig};
pub use conversion::{convert, format_amount, format_exchange_rate, ConversionInput, ConversionResult, Converter, Direction};
pub use engine::{FxEngine, FxEngineConfig};
pub use error::{ConversionError, FetchError, FxError, FxResult, ParseError};
pub use parser::{parse_feed, parse_feed_with_clock};
pub use provider::{fetch_with_retry, HttpFeedConfig, HttpRateFeed, RateFeed, RetryPolicy, StaticRateFeed};
pub use validation::{
    validate_conversion_input, validate_rate_sheet, ConversionErrors, ConversionValidation, SheetValidation,
};
