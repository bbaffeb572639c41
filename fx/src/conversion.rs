//! Currency conversion between the home currency and a listed currency.

use std::sync::Arc;

use chrono::NaiveDate;
use cnbfx_common::{round_amount, Clock, Currency, CurrencyRate, Money, RateSheet, SystemClock, Timestamp};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::ConversionError;

/// Which way an amount crosses the home currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HomeToForeign,
    ForeignToHome,
}

/// Request to perform a conversion.
#[derive(Debug, Clone)]
pub struct ConversionInput<'a> {
    pub amount: Decimal,
    pub from: Currency,
    pub to: Currency,
    pub sheet: &'a RateSheet,
}

impl<'a> ConversionInput<'a> {
    pub fn new(amount: Decimal, from: Currency, to: Currency, sheet: &'a RateSheet) -> Self {
        Self {
            amount,
            from,
            to,
            sheet,
        }
    }
}

/// A completed conversion.
///
/// Serializes flat, as `originalAmount`/`originalCurrency` and
/// `targetAmount`/`targetCurrency` next to the rate fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub id: Uuid,
    pub original: Money,
    pub target: Money,
    /// Home-currency price of `quote_unit` foreign units, as published.
    pub exchange_rate: Decimal,
    pub quote_unit: Decimal,
    pub direction: Direction,
    /// Quote date of the sheet the rate came from.
    pub as_of_date: NaiveDate,
    pub computed_at: Timestamp,
}

impl ConversionResult {
    /// Target units obtained per original unit.
    pub fn effective_rate(&self) -> Decimal {
        if self.original.value.is_zero() {
            return Decimal::ZERO;
        }
        self.target.value / self.original.value
    }

    /// The foreign side of the conversion.
    pub fn foreign_currency(&self) -> &Currency {
        match self.direction {
            Direction::HomeToForeign => &self.target.currency,
            Direction::ForeignToHome => &self.original.currency,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversionRecord<'a> {
    id: &'a Uuid,
    original_amount: &'a Decimal,
    original_currency: &'a Currency,
    target_amount: &'a Decimal,
    target_currency: &'a Currency,
    exchange_rate: &'a Decimal,
    quote_unit: &'a Decimal,
    direction: Direction,
    as_of_date: &'a NaiveDate,
    computed_at: &'a Timestamp,
}

impl Serialize for ConversionResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ConversionRecord {
            id: &self.id,
            original_amount: &self.original.value,
            original_currency: &self.original.currency,
            target_amount: &self.target.value,
            target_currency: &self.target.currency,
            exchange_rate: &self.exchange_rate,
            quote_unit: &self.quote_unit,
            direction: self.direction,
            as_of_date: &self.as_of_date,
            computed_at: &self.computed_at,
        }
        .serialize(serializer)
    }
}

/// Converts amounts against a rate sheet, pivoting through one home currency.
#[derive(Clone)]
pub struct Converter {
    home: Currency,
    clock: Arc<dyn Clock>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Currency::czk())
    }
}

impl Converter {
    pub fn new(home: Currency) -> Self {
        Self::with_clock(home, Arc::new(SystemClock))
    }

    pub fn with_clock(home: Currency, clock: Arc<dyn Clock>) -> Self {
        Self { home, clock }
    }

    pub fn home(&self) -> &Currency {
        &self.home
    }

    /// Convert between the home currency and a currency listed in the sheet.
    ///
    /// Results are rounded to two decimal places; amounts below one minor
    /// unit are accepted.
    pub fn convert(&self, input: &ConversionInput<'_>) -> Result<ConversionResult, ConversionError> {
        if input.amount <= Decimal::ZERO {
            return Err(ConversionError::AmountNotPositive);
        }

        let (direction, foreign) = match (input.from == self.home, input.to == self.home) {
            (true, false) => (Direction::HomeToForeign, &input.to),
            (false, true) => (Direction::ForeignToHome, &input.from),
            _ => {
                return Err(ConversionError::UnsupportedPair {
                    from: input.from.clone(),
                    to: input.to.clone(),
                })
            }
        };

        let rate = input
            .sheet
            .find(foreign.code())
            .ok_or_else(|| ConversionError::CurrencyNotFound(foreign.clone()))?;

        if rate.rate_to_home <= Decimal::ZERO || rate.quote_unit <= Decimal::ZERO {
            return Err(ConversionError::InvalidRate {
                code: rate.code.clone(),
                rate: rate.rate_to_home,
            });
        }

        let raw = apply_rate(input.amount, rate, direction)
            .ok_or(ConversionError::CalculationOverflow)?;

        let result = ConversionResult {
            id: Uuid::now_v7(),
            original: Money::new(input.amount, input.from.clone()),
            target: Money::new(round_amount(raw), input.to.clone()),
            exchange_rate: rate.rate_to_home,
            quote_unit: rate.quote_unit,
            direction,
            as_of_date: input.sheet.as_of_date(),
            computed_at: self.clock.now(),
        };

        debug!(
            conversion_id = %result.id,
            original = %result.original,
            target = %result.target,
            rate = %result.exchange_rate,
            quote_unit = %result.quote_unit,
            "Conversion computed"
        );

        Ok(result)
    }
}

/// Unrounded target amount; `None` on decimal overflow.
fn apply_rate(amount: Decimal, rate: &CurrencyRate, direction: Direction) -> Option<Decimal> {
    match direction {
        Direction::HomeToForeign => amount
            .checked_div(rate.rate_to_home)?
            .checked_mul(rate.quote_unit),
        Direction::ForeignToHome => amount
            .checked_mul(rate.rate_to_home)?
            .checked_div(rate.quote_unit),
    }
}

/// Convert with the home currency and the system clock.
pub fn convert(input: &ConversionInput<'_>) -> Result<ConversionResult, ConversionError> {
    Converter::default().convert(input)
}

/// Render a rate the way it is quoted, e.g. `100 JPY = 13.919 CZK`.
pub fn format_exchange_rate(rate: &CurrencyRate, home: &Currency) -> String {
    format!(
        "{} {} = {} {}",
        rate.quote_unit.normalize(),
        rate.code,
        rate.rate_to_home,
        home
    )
}

/// Render an amount with thousands separators and two decimals.
pub fn format_amount(money: &Money) -> String {
    let value = round_amount(money.value).to_f64().unwrap_or_default();
    format!("{} {}", format_num::format_num!(",.2", value), money.currency)
}
