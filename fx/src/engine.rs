//! Main FX engine: fetch, parse, validate, cache and convert.

use std::sync::Arc;

use cnbfx_common::{Clock, Currency, RateSheet, SystemClock};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheStats, SheetCache, SheetCacheConfig};
use crate::conversion::{ConversionInput, ConversionResult, Converter, Direction};
use crate::error::{ConversionError, FetchError, FxResult};
use crate::parser::parse_feed_with_clock;
use crate::provider::{fetch_with_retry, RateFeed, RetryPolicy};
use crate::validation::{validate_amount, validate_conversion_input, validate_rate_sheet_at, ConversionErrors};

/// Configuration for the FX engine.
#[derive(Debug, Clone)]
pub struct FxEngineConfig {
    /// Currency every conversion pivots through.
    pub home_currency: Currency,
    /// Cache configuration.
    pub cache: SheetCacheConfig,
    /// Retry policy for feed fetches.
    pub retry: RetryPolicy,
    /// Whether to serve cached sheets.
    pub use_cache: bool,
}

impl Default for FxEngineConfig {
    fn default() -> Self {
        Self {
            home_currency: Currency::czk(),
            cache: SheetCacheConfig::default(),
            retry: RetryPolicy::default(),
            use_cache: true,
        }
    }
}

/// The main FX engine.
pub struct FxEngine {
    feed: Arc<dyn RateFeed>,
    cache: SheetCache,
    /// Last sheet that passed validation. Outlives cache expiry and
    /// invalidation so a failed refresh can fall back to it.
    last_good: RwLock<Option<Arc<RateSheet>>>,
    converter: Converter,
    clock: Arc<dyn Clock>,
    config: FxEngineConfig,
}

impl FxEngine {
    /// Create a new FX engine reading from the given feed.
    pub fn new(feed: Arc<dyn RateFeed>, config: FxEngineConfig) -> Self {
        Self::with_clock(feed, config, Arc::new(SystemClock))
    }

    pub fn with_clock(feed: Arc<dyn RateFeed>, config: FxEngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            feed,
            cache: SheetCache::with_clock(config.cache.clone(), clock.clone()),
            last_good: RwLock::new(None),
            converter: Converter::with_clock(config.home_currency.clone(), clock.clone()),
            clock,
            config,
        }
    }

    pub fn home_currency(&self) -> &Currency {
        &self.config.home_currency
    }

    /// Get the current rate sheet, from cache when fresh.
    #[instrument(skip(self), fields(feed = self.feed.name()))]
    pub async fn rate_sheet(&self) -> FxResult<Arc<RateSheet>> {
        if self.config.use_cache {
            if let Some(cached) = self.cache.get() {
                debug!("Using cached rate sheet");
                return Ok(cached);
            }
        }

        self.refresh().await
    }

    /// Fetch, parse and validate a new sheet regardless of the cache.
    ///
    /// Parse and validation failures surface as [`FetchError::Parse`] so
    /// callers can tell a changed upstream format from a transient outage.
    #[instrument(skip(self), fields(feed = self.feed.name()))]
    pub async fn refresh(&self) -> FxResult<Arc<RateSheet>> {
        let text = fetch_with_retry(self.feed.as_ref(), &self.config.retry).await?;

        let sheet = parse_feed_with_clock(&text, self.clock.as_ref()).map_err(FetchError::from)?;

        let validation = validate_rate_sheet_at(&sheet, self.clock.as_ref());
        for warning in &validation.warnings {
            warn!(warning = %warning, "Rate sheet warning");
        }
        if !validation.is_valid() {
            return Err(FetchError::Parse(validation.errors.join("; ")).into());
        }

        let sheet = Arc::new(sheet);
        if self.config.use_cache {
            self.cache.insert(sheet.clone());
        }
        *self.last_good.write() = Some(sheet.clone());

        info!(
            as_of_date = %sheet.as_of_date(),
            rates = sheet.len(),
            "Rate sheet refreshed"
        );

        Ok(sheet)
    }

    /// The most recent sheet that refreshed successfully, however old.
    pub fn last_good_sheet(&self) -> Option<Arc<RateSheet>> {
        self.last_good.read().clone()
    }

    /// Convert a validated amount against `input.sheet`.
    pub fn convert(&self, input: &ConversionInput<'_>) -> Result<ConversionResult, ConversionError> {
        self.converter.convert(input)
    }

    /// Validate raw user input and convert home currency into `currency_code`.
    ///
    /// Input problems land in the `amount`/`currency` fields, engine
    /// failures in `conversion`. Scheduling repeated calls (e.g. debouncing
    /// keystrokes) is left to the caller.
    pub fn calculate(
        &self,
        amount: &str,
        currency_code: &str,
        sheet: &RateSheet,
    ) -> Result<ConversionResult, ConversionErrors> {
        self.calculate_in(Direction::HomeToForeign, amount, currency_code, sheet)
    }

    /// Validate raw user input and convert `currency_code` into home currency.
    pub fn calculate_to_home(
        &self,
        amount: &str,
        currency_code: &str,
        sheet: &RateSheet,
    ) -> Result<ConversionResult, ConversionErrors> {
        self.calculate_in(Direction::ForeignToHome, amount, currency_code, sheet)
    }

    fn calculate_in(
        &self,
        direction: Direction,
        amount: &str,
        currency_code: &str,
        sheet: &RateSheet,
    ) -> Result<ConversionResult, ConversionErrors> {
        let validation = validate_conversion_input(amount, currency_code, Some(sheet));
        if !validation.is_valid() {
            debug!(errors = ?validation.errors, "Conversion input rejected");
            return Err(validation.errors);
        }

        let amount: Decimal = validate_amount(amount).map_err(|message| ConversionErrors {
            amount: Some(message.to_string()),
            ..ConversionErrors::default()
        })?;

        let home = self.config.home_currency.clone();
        let foreign = Currency::new(currency_code);
        let (from, to) = match direction {
            Direction::HomeToForeign => (home, foreign),
            Direction::ForeignToHome => (foreign, home),
        };

        let result = self
            .converter
            .convert(&ConversionInput::new(amount, from, to, sheet))
            .map_err(|e| ConversionErrors::conversion(e.to_string()))?;

        info!(
            conversion_id = %result.id,
            original = %result.original,
            target = %result.target,
            "Conversion completed"
        );

        Ok(result)
    }

    /// Get engine statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop the cached sheet so the next call refetches.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}
