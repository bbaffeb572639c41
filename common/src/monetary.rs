//! Monetary types.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Code of the home currency every conversion pivots through.
pub const HOME_CURRENCY: &str = "CZK";

/// Decimal places conversion results are rounded to.
pub const RESULT_DECIMAL_PLACES: u32 = 2;

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value.
    pub value: Decimal,
    /// Currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create from a string value.
    pub fn from_str(value: &str, currency: Currency) -> Result<Self, rust_decimal::Error> {
        Ok(Self {
            value: value.parse()?,
            currency,
        })
    }

    /// Check if the amount is strictly positive.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Round to two decimal places, midpoints away from zero.
    pub fn round(&self) -> Self {
        Self {
            value: round_amount(self.value),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Round a computed amount the way conversion results are presented.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(RESULT_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Three-letter currency code, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Whether this is the home currency.
    pub fn is_home(&self) -> bool {
        self.0 == HOME_CURRENCY
    }

    /// The home currency (Czech koruna).
    pub fn czk() -> Self {
        Self::new(HOME_CURRENCY)
    }

    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn jpy() -> Self {
        Self::new("JPY")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_normalizes_code() {
        assert_eq!(Currency::new(" usd "), Currency::usd());
        assert_eq!(Currency::from("czk").code(), "CZK");
        assert!(Currency::from("czk").is_home());
        assert!(!Currency::eur().is_home());
    }

    #[test]
    fn test_round_amount_midpoint_away_from_zero() {
        assert_eq!(round_amount(dec!(1.005)), dec!(1.01));
        assert_eq!(round_amount(dec!(2.345)), dec!(2.35));
        assert_eq!(round_amount(dec!(7184.4243)), dec!(7184.42));
    }

    #[test]
    fn test_money_round_and_display() {
        let m = Money::from_str("12.3456", Currency::usd()).unwrap();
        assert!(m.is_positive());
        assert_eq!(m.round().value, dec!(12.35));
        assert_eq!(m.to_string(), "12.3456 USD");
    }
}
