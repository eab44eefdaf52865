//! Shared value parsing for collision exports.
//!
//! Null detection, coordinate parsing, and the two year comparison modes.

use chrono::{DateTime, Datelike as _, NaiveDate, NaiveDateTime};
use collision_map_incident_models::DateMatching;

/// Cell values treated as missing, in addition to the empty string.
const NULL_SENTINELS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "null", "NULL", "None", "<NA>", "#N/A",
];

/// Date-only layouts seen in collision exports.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"];

/// Date-time layouts seen in collision exports.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Returns `true` if a trimmed cell should be treated as a null.
#[must_use]
pub fn is_missing(value: &str) -> bool {
    value.is_empty() || NULL_SENTINELS.contains(&value)
}

/// Parses a coordinate. Returns `None` unless the value is a finite number.
#[must_use]
pub fn parse_coordinate(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Returns `true` if `year` is exactly four ASCII digits.
#[must_use]
pub fn is_valid_year(year: &str) -> bool {
    year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())
}

/// The first four characters of a raw date string, if it has that many.
#[must_use]
pub fn year_token(date: &str) -> Option<&str> {
    date.char_indices().nth(4).map_or_else(
        || (date.chars().count() == 4).then_some(date),
        |(end, _)| Some(&date[..end]),
    )
}

/// Parses a date string in any known layout and returns its calendar year.
#[must_use]
pub fn parse_calendar_year(date: &str) -> Option<i32> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.year());
    }
    if let Ok(dt) = DateTime::parse_from_str(date, "%Y/%m/%d %H:%M:%S%#z") {
        return Some(dt.year());
    }
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date, format) {
            return Some(naive.year());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(naive) = NaiveDate::parse_from_str(date, format) {
            return Some(naive.year());
        }
    }
    None
}

/// Returns `true` if `date` belongs to `year` under the given matching mode.
///
/// `year` must already be validated with [`is_valid_year`].
#[must_use]
pub fn matches_year(date: &str, year: &str, mode: DateMatching) -> bool {
    match mode {
        DateMatching::Prefix => year_token(date) == Some(year),
        DateMatching::Calendar => parse_calendar_year(date)
            .is_some_and(|parsed| year.parse::<i32>().is_ok_and(|target| parsed == target)),
    }
}
