//! Rate records published in the daily fixing.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::monetary::Currency;
use crate::time::{utc_midnight, Timestamp};

/// Rates above this many home-currency units are treated as suspicious.
pub const SUSPICIOUS_RATE_CEILING: Decimal = Decimal::ONE_THOUSAND;

/// One quoted line of the fixing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyRate {
    /// Mirrors `code`.
    pub id: String,
    pub code: Currency,
    pub country: String,
    pub currency_name: String,
    /// Number of foreign units `rate_to_home` is quoted for (usually 1, sometimes 100).
    pub quote_unit: Decimal,
    /// Price in home currency of `quote_unit` foreign units.
    pub rate_to_home: Decimal,
    pub last_updated: Timestamp,
}

impl CurrencyRate {
    /// Home-currency price of a single foreign unit.
    pub fn per_unit(&self) -> Decimal {
        if self.quote_unit.is_zero() {
            return Decimal::ZERO;
        }
        self.rate_to_home / self.quote_unit
    }

    /// Whether the quoted rate exceeds the sanity ceiling.
    pub fn is_suspicious(&self) -> bool {
        self.rate_to_home > SUSPICIOUS_RATE_CEILING
    }
}

/// One parsed snapshot of the fixing.
///
/// Built once per successful fetch and never mutated; the next fetch
/// produces a new sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSheet {
    as_of_date: NaiveDate,
    rates: Vec<CurrencyRate>,
    fetched_at: Timestamp,
}

impl RateSheet {
    pub fn new(as_of_date: NaiveDate, rates: Vec<CurrencyRate>, fetched_at: Timestamp) -> Self {
        Self {
            as_of_date,
            rates,
            fetched_at,
        }
    }

    /// Calendar date the rates are quoted for.
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of_date
    }

    /// The quote date as UTC midnight.
    pub fn as_of_midnight_utc(&self) -> Timestamp {
        utc_midnight(self.as_of_date)
    }

    /// Wall-clock time the sheet was retrieved.
    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    /// Rates in feed order.
    pub fn rates(&self) -> &[CurrencyRate] {
        &self.rates
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Look up a rate by currency code (case-insensitive).
    pub fn find(&self, code: &str) -> Option<&CurrencyRate> {
        let wanted = Currency::new(code);
        self.rates.iter().find(|rate| rate.code == wanted)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.find(code).is_some()
    }

    /// Codes in feed order.
    pub fn codes(&self) -> impl Iterator<Item = &Currency> {
        self.rates.iter().map(|rate| &rate.code)
    }

    /// USD when listed, otherwise the first rate in the sheet.
    pub fn default_currency(&self) -> Option<&Currency> {
        self.find("USD")
            .or_else(|| self.rates.first())
            .map(|rate| &rate.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn rate(code: &str, quote_unit: Decimal, rate_to_home: Decimal) -> CurrencyRate {
        CurrencyRate {
            id: code.to_string(),
            code: Currency::new(code),
            country: "Somewhere".to_string(),
            currency_name: "unit".to_string(),
            quote_unit,
            rate_to_home,
            last_updated: Utc.with_ymd_and_hms(2024, 9, 27, 12, 0, 0).unwrap(),
        }
    }

    fn sheet(rates: Vec<CurrencyRate>) -> RateSheet {
        RateSheet::new(
            NaiveDate::from_ymd_opt(2024, 9, 27).unwrap(),
            rates,
            Utc.with_ymd_and_hms(2024, 9, 27, 14, 35, 0).unwrap(),
        )
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let sheet = sheet(vec![rate("EUR", dec!(1), dec!(25.2)), rate("USD", dec!(1), dec!(23.285))]);

        assert_eq!(sheet.find("usd").unwrap().rate_to_home, dec!(23.285));
        assert!(sheet.contains("EUR"));
        assert!(!sheet.contains("GBP"));
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn test_default_currency_prefers_usd() {
        let with_usd = sheet(vec![rate("EUR", dec!(1), dec!(25.2)), rate("USD", dec!(1), dec!(23.285))]);
        assert_eq!(with_usd.default_currency(), Some(&Currency::usd()));

        let without_usd = sheet(vec![rate("JPY", dec!(100), dec!(13.919))]);
        assert_eq!(without_usd.default_currency(), Some(&Currency::jpy()));

        assert_eq!(sheet(vec![]).default_currency(), None);
    }

    #[test]
    fn test_per_unit_and_suspicious() {
        let jpy = rate("JPY", dec!(100), dec!(13.919));
        assert_eq!(jpy.per_unit(), dec!(0.13919));
        assert!(!jpy.is_suspicious());
        assert!(rate("XXX", dec!(1), dec!(1000.01)).is_suspicious());
    }

    #[test]
    fn test_as_of_midnight_and_json_shape() {
        let sheet = sheet(vec![rate("USD", dec!(1), dec!(23.285))]);
        assert_eq!(
            sheet.as_of_midnight_utc(),
            Utc.with_ymd_and_hms(2024, 9, 27, 0, 0, 0).unwrap()
        );

        let json = serde_json::to_value(&sheet).unwrap();
        assert_eq!(json["asOfDate"], "2024-09-27");
        assert_eq!(json["rates"][0]["currencyName"], "unit");
    }
}
