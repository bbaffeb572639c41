//! Validation of rate sheets and of user conversion input.
//!
//! Nothing here fails: every check reports its findings as data so a caller
//! can show field-level feedback.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use cnbfx_common::{Clock, CurrencyRate, RateSheet, SystemClock};
use rust_decimal::Decimal;
use serde::Serialize;

/// Largest amount accepted from user input.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Maximum decimal places accepted in user input.
pub const MAX_AMOUNT_DECIMALS: usize = 2;

/// Outcome of checking a whole rate sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetValidation {
    /// One message per failing sheet-level check or failing rate.
    pub errors: Vec<String>,
    /// Advisory findings that do not invalidate the sheet.
    pub warnings: Vec<String>,
}

impl SheetValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Field-keyed messages for a conversion request; all empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<String>,
}

impl ConversionErrors {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.currency.is_none() && self.conversion.is_none()
    }

    /// Errors carrying only an engine failure.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self {
            conversion: Some(message.into()),
            ..Self::default()
        }
    }

    /// Present messages in field order.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        [&self.amount, &self.currency, &self.conversion]
            .into_iter()
            .filter_map(|m| m.as_deref())
    }
}

/// Outcome of checking user conversion input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionValidation {
    pub errors: ConversionErrors,
}

impl ConversionValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a sheet against the system clock.
pub fn validate_rate_sheet(sheet: &RateSheet) -> SheetValidation {
    validate_rate_sheet_at(sheet, &SystemClock)
}

/// Check a sheet that may not have been loaded yet.
pub fn validate_optional_rate_sheet(sheet: Option<&RateSheet>) -> SheetValidation {
    match sheet {
        Some(sheet) => validate_rate_sheet(sheet),
        None => SheetValidation {
            errors: vec!["No exchange rates data available".to_string()],
            warnings: Vec::new(),
        },
    }
}

/// Check a sheet, judging "future" and "plausible" against `clock`.
pub fn validate_rate_sheet_at(sheet: &RateSheet, clock: &dyn Clock) -> SheetValidation {
    let mut result = SheetValidation::default();

    if !is_plausible_date(sheet.as_of_date(), clock) {
        result.errors.push("Invalid exchange rates date".to_string());
    }

    if clock.is_future(sheet.fetched_at()) {
        result.errors.push("Invalid fetch timestamp".to_string());
    }

    if sheet.is_empty() {
        result.errors.push("No currency rates available".to_string());
    }

    for (idx, rate) in sheet.rates().iter().enumerate() {
        let label = rate_label(idx, rate);

        let rate_errors = validate_currency_rate(rate, clock);
        if !rate_errors.is_empty() {
            result
                .errors
                .push(format!("{label}: {}", rate_errors.join(", ")));
        }

        if rate.is_suspicious() {
            result
                .warnings
                .push(format!("{label}: Exchange rate seems unusually high"));
        }
    }

    result
}

fn rate_label(idx: usize, rate: &CurrencyRate) -> String {
    let code = match rate.code.code() {
        "" => "unknown",
        code => code,
    };
    format!("Rate {} ({})", idx + 1, code)
}

/// Per-field checks on one rate. Returns every failing check.
pub fn validate_currency_rate(rate: &CurrencyRate, clock: &dyn Clock) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if rate.id.trim().is_empty() {
        errors.push("Currency ID is required");
    }
    if rate.country.trim().is_empty() {
        errors.push("Country is required");
    }
    if rate.currency_name.trim().is_empty() {
        errors.push("Currency name is required");
    }
    if rate.quote_unit <= Decimal::ZERO {
        errors.push("Quote unit must be a positive number");
    }
    if rate.code.code().is_empty() {
        errors.push("Currency code is required");
    }
    if rate.rate_to_home <= Decimal::ZERO {
        errors.push("Exchange rate must be a positive number");
    }
    if clock.is_future(rate.last_updated) {
        errors.push("Invalid last updated timestamp");
    }

    errors
}

/// Whether a quote date is within the range the feed can plausibly carry.
pub fn is_plausible_date(date: NaiveDate, clock: &dyn Clock) -> bool {
    (2000..=clock.now().year() + 1).contains(&date.year())
}

/// Check user conversion input. Fields are independent; within a field the
/// first failing rule wins.
pub fn validate_conversion_input(
    amount: &str,
    currency_code: &str,
    sheet: Option<&RateSheet>,
) -> ConversionValidation {
    let mut errors = ConversionErrors::default();

    if let Err(message) = validate_amount(amount) {
        errors.amount = Some(message.to_string());
    }

    let code = sanitize_currency_code(currency_code);
    if code.is_empty() {
        errors.currency = Some("Currency is required".to_string());
    } else if !validate_currency_code(&code) {
        errors.currency = Some("Invalid currency code format (must be 3 letters)".to_string());
    } else if let Some(sheet) = sheet {
        if !sheet.contains(&code) {
            errors.currency = Some("Currency not found in exchange rates".to_string());
        }
    }

    ConversionValidation { errors }
}

/// Parse a user-entered amount, or give the first rule it breaks.
pub fn validate_amount(amount: &str) -> Result<Decimal, &'static str> {
    let amount = sanitize_amount(amount);

    if amount.is_empty() {
        return Err("Amount is required");
    }

    if !is_plain_decimal(amount) {
        return Err("Amount must contain only numbers and at most one decimal point");
    }

    // Positivity and magnitude are decided on the digits themselves. Very
    // long inputs would otherwise overflow or round to zero in `Decimal`.
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    let has_nonzero = |s: &str| s.bytes().any(|b| matches!(b, b'1'..=b'9'));

    if !has_nonzero(amount) {
        return Err("Amount must be positive");
    }

    let whole = whole.trim_start_matches('0');
    let max_whole = MAX_AMOUNT.to_string();
    let exceeds = match whole.len().cmp(&max_whole.len()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            whole > max_whole.as_str() || (whole == max_whole && has_nonzero(fraction))
        }
    };
    if exceeds {
        return Err("Amount cannot exceed 1,000,000");
    }

    if fraction.len() > MAX_AMOUNT_DECIMALS {
        return Err("Amount cannot have more than 2 decimal places");
    }

    let padded;
    let parseable = if amount.starts_with('.') {
        padded = format!("0{amount}");
        padded.as_str()
    } else {
        amount
    };

    Decimal::from_str(parseable).map_err(|_| "Amount must be a valid number")
}

/// Digits with at most one decimal point, ending in a digit.
fn is_plain_decimal(text: &str) -> bool {
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());

    match text.split_once('.') {
        Some((int, frac)) => all_digits(int) && !frac.is_empty() && all_digits(frac),
        None => !text.is_empty() && all_digits(text),
    }
}

/// Exactly three ASCII letters, any case.
pub fn validate_currency_code(code: &str) -> bool {
    let code = code.trim();
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic())
}

pub fn sanitize_amount(amount: &str) -> &str {
    amount.trim()
}

pub fn sanitize_currency_code(code: &str) -> String {
    code.trim().to_uppercase()
}
