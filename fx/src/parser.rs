//! Parser for the CNB daily fixing text feed.
//!
//! ```text
//! 27 Sep 2024 #188
//! Country|Currency|Amount|Code|Rate
//! Australia|dollar|1|AUD|15.772
//! Japan|yen|100|JPY|15.983
//! ```

use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDate;
use cnbfx_common::{Clock, Currency, CurrencyRate, RateSheet, SystemClock};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::ParseError;

/// Column header rows the feed may carry after the date line.
const HEADER_ROWS: [&str; 2] = [
    "Country|Currency|Amount|Code|Rate",
    "země|měna|množství|kód|kurz",
];

/// Month abbreviations as published, English first, then Czech.
const MONTHS: [(&str, u32); 24] = [
    ("Jan", 1),
    ("Feb", 2),
    ("Mar", 3),
    ("Apr", 4),
    ("May", 5),
    ("Jun", 6),
    ("Jul", 7),
    ("Aug", 8),
    ("Sep", 9),
    ("Oct", 10),
    ("Nov", 11),
    ("Dec", 12),
    ("led", 1),
    ("úno", 2),
    ("bře", 3),
    ("dub", 4),
    ("kvě", 5),
    ("čvn", 6),
    ("čvc", 7),
    ("srp", 8),
    ("zář", 9),
    ("říj", 10),
    ("lis", 11),
    ("pro", 12),
];

/// Parse feed text into a rate sheet stamped with the system clock.
pub fn parse_feed(text: &str) -> Result<RateSheet, ParseError> {
    parse_feed_with_clock(text, &SystemClock)
}

/// Parse feed text into a rate sheet, taking `fetched_at` and each rate's
/// `last_updated` from `clock`.
pub fn parse_feed_with_clock(text: &str, clock: &dyn Clock) -> Result<RateSheet, ParseError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ParseError::InsufficientLines);
    }

    let (_, header) = lines[0];
    let as_of_date = parse_header_date(header)?;
    let stamped_at = clock.now();

    let mut rates = Vec::with_capacity(lines.len() - 1);
    let mut seen = HashSet::new();

    for &(line_no, line) in &lines[1..] {
        if HEADER_ROWS.contains(&line) {
            continue;
        }

        let rate = parse_row(line_no, line, stamped_at)?;

        if !seen.insert(rate.code.clone()) {
            return Err(ParseError::DuplicateCode {
                line: line_no,
                code: rate.code.to_string(),
            });
        }

        if rate.is_suspicious() {
            warn!(
                line = line_no,
                code = %rate.code,
                rate = %rate.rate_to_home,
                "Suspiciously high exchange rate"
            );
        }

        debug!(line = line_no, code = %rate.code, "Parsed rate row");
        rates.push(rate);
    }

    if rates.is_empty() {
        return Err(ParseError::EmptyRateSet);
    }

    info!(
        as_of_date = %as_of_date,
        rates = rates.len(),
        "Parsed rate sheet"
    );

    Ok(RateSheet::new(as_of_date, rates, stamped_at))
}

/// Find `D MMM YYYY` among the alphanumeric tokens of the header, so a
/// trailing `#188` or a leading byte order mark does not get in the way.
fn parse_header_date(header: &str) -> Result<NaiveDate, ParseError> {
    let header = header.trim_start_matches('\u{feff}').trim();
    let tokens: Vec<&str> = header
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    let (day, month, year) = tokens
        .windows(3)
        .find_map(|window| match window {
            [day, month, year]
                if is_digits(day, 1..=2)
                    && month.chars().count() == 3
                    && is_digits(year, 4..=4) =>
            {
                Some((*day, *month, *year))
            }
            _ => None,
        })
        .ok_or_else(|| ParseError::InvalidDate(header.to_string()))?;

    let month_num = month_number(month)
        .ok_or_else(|| ParseError::InvalidDate(format!("Invalid month format: {month}")))?;

    // Both tokens are short digit runs, so these cannot overflow.
    let day: u32 = day
        .parse()
        .map_err(|_| ParseError::InvalidDate(header.to_string()))?;
    let year: i32 = year
        .parse()
        .map_err(|_| ParseError::InvalidDate(header.to_string()))?;

    NaiveDate::from_ymd_opt(year, month_num, day)
        .ok_or_else(|| ParseError::InvalidDate(header.to_string()))
}

/// Month number for a published abbreviation. Case-sensitive.
pub fn month_number(abbreviation: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == abbreviation)
        .map(|(_, num)| *num)
}

fn is_digits(token: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&token.len()) && token.bytes().all(|b| b.is_ascii_digit())
}

fn parse_row(
    line_no: usize,
    line: &str,
    stamped_at: cnbfx_common::Timestamp,
) -> Result<CurrencyRate, ParseError> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();

    let [country, currency_name, quote_unit, code, rate] = fields.as_slice() else {
        return Err(ParseError::InvalidRowShape {
            line: line_no,
            content: line.to_string(),
        });
    };

    let numeric_error = || ParseError::InvalidNumeric {
        line: line_no,
        content: line.to_string(),
    };

    let quote_unit = parse_plain_decimal(quote_unit).ok_or_else(numeric_error)?;
    let rate_to_home = parse_rate(rate).ok_or_else(numeric_error)?;

    if quote_unit <= Decimal::ZERO {
        return Err(numeric_error());
    }

    if rate_to_home <= Decimal::ZERO {
        return Err(ParseError::InvalidRate {
            line: line_no,
            content: line.to_string(),
        });
    }

    let code = Currency::new(*code);

    Ok(CurrencyRate {
        id: code.to_string(),
        code,
        country: country.to_string(),
        currency_name: currency_name.to_string(),
        quote_unit,
        rate_to_home,
        last_updated: stamped_at,
    })
}

/// Rates may use a decimal comma and spaces as thousands separators.
fn parse_rate(raw: &str) -> Option<Decimal> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    parse_plain_decimal(&normalized)
}

/// Accepts only `[+-]digits[.digits]`. `Decimal::from_str` alone would also
/// take digit separators such as `1_0`.
fn parse_plain_decimal(raw: &str) -> Option<Decimal> {
    let unsigned = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };

    let is_digit_run = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !is_digit_run(whole) || !fraction.map_or(true, is_digit_run) {
        return None;
    }

    Decimal::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cnbfx_common::FixedClock;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = "27 Sep 2024 #188
Country|Currency|Amount|Code|Rate
Australia|dollar|1|AUD|15.772
EMU|euro|1|EUR|25.155
Hungary|forint|100|HUF|6.348
Japan|yen|100|JPY|15.983
USA|dollar|1|USD|22.559
";

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 9, 27, 14, 35, 0).unwrap())
    }

    #[test]
    fn test_parse_single_row() {
        let sheet = parse_feed_with_clock("27 Sep 2024\nUSA|dollar|1|USD|23.285", &clock()).unwrap();

        assert_eq!(sheet.len(), 1);
        let usd = &sheet.rates()[0];
        assert_eq!(usd.code, Currency::usd());
        assert_eq!(usd.id, "USD");
        assert_eq!(usd.country, "USA");
        assert_eq!(usd.currency_name, "dollar");
        assert_eq!(usd.quote_unit, dec!(1));
        assert_eq!(usd.rate_to_home, dec!(23.285));
        assert_eq!(sheet.as_of_date(), NaiveDate::from_ymd_opt(2024, 9, 27).unwrap());
        assert_eq!(
            sheet.as_of_midnight_utc(),
            Utc.with_ymd_and_hms(2024, 9, 27, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_full_sample() {
        let clock = clock();
        let sheet = parse_feed_with_clock(SAMPLE, &clock).unwrap();

        assert_eq!(sheet.len(), 5);
        let codes: Vec<&str> = sheet.codes().map(|c| c.code()).collect();
        assert_eq!(codes, ["AUD", "EUR", "HUF", "JPY", "USD"]);
        assert_eq!(sheet.find("JPY").unwrap().quote_unit, dec!(100));
        assert_eq!(sheet.fetched_at(), clock.now());
        assert!(sheet.rates().iter().all(|r| r.last_updated == clock.now()));
    }

    #[test]
    fn test_parse_czech_header_and_month() {
        let text = "27 zář 2024 #188\nzemě|měna|množství|kód|kurz\nUSA|dolar|1|USD|22,559";
        let sheet = parse_feed_with_clock(text, &clock()).unwrap();

        assert_eq!(sheet.as_of_date(), NaiveDate::from_ymd_opt(2024, 9, 27).unwrap());
        assert_eq!(sheet.find("USD").unwrap().rate_to_home, dec!(22.559));
    }

    #[test]
    fn test_every_month_abbreviation_is_known() {
        for (name, num) in MONTHS {
            let text = format!("1 {name} 2024\nUSA|dollar|1|USD|23.285");
            let sheet = parse_feed_with_clock(&text, &clock()).unwrap();
            assert_eq!(sheet.as_of_date(), NaiveDate::from_ymd_opt(2024, num, 1).unwrap());
        }
    }

    #[test]
    fn test_rate_with_thousands_separator_and_comma() {
        let text = "3 Jan 2024\nIndonesia|rupiah|1000|IDR|1 234,5";
        let sheet = parse_feed_with_clock(text, &clock()).unwrap();
        assert_eq!(sheet.find("IDR").unwrap().rate_to_home, dec!(1234.5));
    }

    #[test]
    fn test_suspicious_rate_is_kept() {
        let text = "3 Jan 2024\nSomewhere|thing|1|XAU|52 000,10";
        let sheet = parse_feed_with_clock(text, &clock()).unwrap();
        assert!(sheet.find("XAU").unwrap().is_suspicious());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_feed(""), Err(ParseError::InsufficientLines));
        assert_eq!(parse_feed("27 Sep 2024\n\n  \n"), Err(ParseError::InsufficientLines));
    }

    #[test]
    fn test_invalid_dates() {
        let bad = [
            "Sep 27 2024\nUSA|dollar|1|USD|23.285",
            "27 sep 2024\nUSA|dollar|1|USD|23.285",
            "27 Sept 2024\nUSA|dollar|1|USD|23.285",
            "31 Feb 2024\nUSA|dollar|1|USD|23.285",
            "no date here\nUSA|dollar|1|USD|23.285",
        ];
        for text in bad {
            let err = parse_feed(text).unwrap_err();
            assert_eq!(err.kind(), "invalid_date", "{text}");
        }
    }

    #[test]
    fn test_row_with_four_fields_reports_line() {
        let err = parse_feed("27 Sep 2024\nUSA|dollar|1|USD").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidRowShape {
                line: 2,
                content: "USA|dollar|1|USD".to_string()
            }
        );
    }

    #[test]
    fn test_line_numbers_count_blank_lines() {
        let text = "27 Sep 2024\n\nUSA|dollar|1|USD|23.285\n\nEMU|euro|1|EUR|25.1|x";
        let err = parse_feed(text).unwrap_err();
        assert_eq!(err.kind(), "invalid_row_shape");
        assert_eq!(err.line(), Some(5));
    }

    #[test]
    fn test_invalid_numeric() {
        let err = parse_feed("27 Sep 2024\nUSA|dollar|one|USD|23.285").unwrap_err();
        assert_eq!(err.kind(), "invalid_numeric");
        assert_eq!(err.line(), Some(2));

        let err = parse_feed("27 Sep 2024\nUSA|dollar|1|USD|n/a").unwrap_err();
        assert_eq!(err.kind(), "invalid_numeric");

        let err = parse_feed("27 Sep 2024\nUSA|dollar|0|USD|23.285").unwrap_err();
        assert_eq!(err.kind(), "invalid_numeric");
    }

    #[test]
    fn test_digit_separators_are_invalid_numeric() {
        for row in ["USA|dollar|1_0|USD|23.285", "USA|dollar|1|USD|2_3.285"] {
            let text = format!("27 Sep 2024\n{row}");
            let err = parse_feed(&text).unwrap_err();
            assert_eq!(err.kind(), "invalid_numeric", "{row}");
            assert_eq!(err.line(), Some(2));
        }
    }

    #[test]
    fn test_malformed_numbers_are_invalid_numeric() {
        for rate in ["23.", ".285", "1.2.3", "+", "23.285x", "1e3"] {
            let text = format!("27 Sep 2024\nUSA|dollar|1|USD|{rate}");
            let err = parse_feed(&text).unwrap_err();
            assert_eq!(err.kind(), "invalid_numeric", "{rate}");
        }
    }

    #[test]
    fn test_header_with_bom_and_glued_sequence_number() {
        for header in ["\u{feff}27 Sep 2024 #188", "27 Sep 2024#188"] {
            let text = format!("{header}\nUSA|dollar|1|USD|23.285");
            let sheet = parse_feed_with_clock(&text, &clock()).unwrap();
            assert_eq!(sheet.as_of_date(), NaiveDate::from_ymd_opt(2024, 9, 27).unwrap());
        }
    }

    #[test]
    fn test_non_positive_rate() {
        for rate in ["0", "-1.5"] {
            let text = format!("27 Sep 2024\nUSA|dollar|1|USD|{rate}");
            let err = parse_feed(&text).unwrap_err();
            assert_eq!(err.kind(), "invalid_rate");
            assert_eq!(err.line(), Some(2));
        }
    }

    #[test]
    fn test_header_only_is_empty_rate_set() {
        let err = parse_feed("27 Sep 2024\nCountry|Currency|Amount|Code|Rate").unwrap_err();
        assert_eq!(err, ParseError::EmptyRateSet);
    }

    #[test]
    fn test_duplicate_code() {
        let text = "27 Sep 2024\nUSA|dollar|1|USD|23.285\nUSA|dollar|1|usd|23.3";
        let err = parse_feed(text).unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateCode {
                line: 3,
                code: "USD".to_string()
            }
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = "27 Sep 2024\r\nUSA|dollar|1|USD|23.285\r\n";
        let sheet = parse_feed(text).unwrap();
        assert_eq!(sheet.len(), 1);
    }
}
