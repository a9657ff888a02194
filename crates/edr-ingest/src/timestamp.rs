//! Event timestamp derivation
//!
//! Source records carry their event time as `YYYY/MM/DD HH:MM:SS.ffffff`.
//! The index stores it twice: as an ISO-8601 string with millisecond
//! precision and as whole epoch seconds. Both index date formats
//! (`date_hour_minute_second_millis`, `epoch_second`) reject the source's
//! microsecond precision, hence the truncation and rounding below.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use thiserror::Error;

/// Date/time part of the source layout, without the fractional seconds.
pub const SOURCE_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Number of fractional-second digits the source layout requires.
pub const SOURCE_FRACTION_DIGITS: usize = 6;

/// `YYYY/MM/DD HH:MM:SS`, byte for byte; `None` marks a digit.
const SOURCE_LAYOUT: [Option<u8>; 19] = {
    const D: Option<u8> = None;
    [
        D, D, D, D, Some(b'/'), D, D, Some(b'/'), D, D, Some(b' '),
        D, D, Some(b':'), D, D, Some(b':'), D, D,
    ]
};

/// ISO-8601 with milliseconds; `%.3f` truncates, it never rounds.
pub const ISO_MILLIS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Default rendering with milliseconds.
pub const LOCAL_MILLIS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    #[error("no fractional seconds in '{0}'")]
    MissingFraction(String),

    #[error("expected {expected} fractional digits in '{value}', found '{fraction}'")]
    FractionWidth {
        value: String,
        fraction: String,
        expected: usize,
    },

    #[error("'{value}' is not a valid date/time: {reason}")]
    Invalid { value: String, reason: String },
}

/// The three renderings stored for every event timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedTimestamps {
    /// `2017-01-01T00:00:01.123`
    pub iso: String,
    /// `2017-01-01 00:00:01.123`
    pub local: String,
    /// Seconds since the Unix epoch, rounded half away from zero
    pub epoch_seconds: i64,
}

/// Parse a source timestamp, enforcing exactly six fractional digits.
pub fn parse_source_timestamp(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let (whole, fraction) = raw
        .split_once('.')
        .ok_or_else(|| TimestampError::MissingFraction(raw.to_string()))?;

    if fraction.len() != SOURCE_FRACTION_DIGITS || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimestampError::FractionWidth {
            value: raw.to_string(),
            fraction: fraction.to_string(),
            expected: SOURCE_FRACTION_DIGITS,
        });
    }

    let invalid = |reason: String| TimestampError::Invalid {
        value: raw.to_string(),
        reason,
    };

    if !matches_layout(whole) {
        return Err(invalid(format!("expected layout {}", SOURCE_TIMESTAMP_FORMAT)));
    }

    let micros: u32 = fraction.parse().map_err(|e| invalid(format!("{}", e)))?;
    let parsed = NaiveDateTime::parse_from_str(whole, SOURCE_TIMESTAMP_FORMAT)
        .map_err(|e| invalid(e.to_string()))?;

    // chrono reads second 60 as a leap second
    if parsed.second() > 59 || parsed.nanosecond() != 0 {
        return Err(invalid("seconds out of range".to_string()));
    }

    parsed
        .with_nanosecond(micros * 1_000)
        .ok_or_else(|| invalid("fractional seconds out of range".to_string()))
}

/// chrono's parser lets a format space match any run of whitespace and
/// accepts single-digit fields, so the shape is checked up front.
fn matches_layout(whole: &str) -> bool {
    whole.len() == SOURCE_LAYOUT.len()
        && whole
            .bytes()
            .zip(SOURCE_LAYOUT)
            .all(|(b, expected)| match expected {
                Some(sep) => b == sep,
                None => b.is_ascii_digit(),
            })
}

/// Derive the ISO, local and epoch renderings of a source timestamp.
pub fn derive(raw: &str) -> Result<DerivedTimestamps, TimestampError> {
    let parsed = parse_source_timestamp(raw)?;

    Ok(DerivedTimestamps {
        iso: format_iso_millis(&parsed),
        local: parsed.format(LOCAL_MILLIS_FORMAT).to_string(),
        epoch_seconds: round_epoch_seconds(&parsed),
    })
}

pub fn format_iso_millis(timestamp: &NaiveDateTime) -> String {
    timestamp.format(ISO_MILLIS_FORMAT).to_string()
}

/// Epoch seconds of a UTC wall time, rounded half away from zero.
///
/// Works on whole seconds plus microseconds so that no precision is lost
/// to floating point. `timestamp()` floors, so the sub-second part is
/// always non-negative.
pub fn round_epoch_seconds(timestamp: &NaiveDateTime) -> i64 {
    let seconds = timestamp.and_utc().timestamp();
    let micros = timestamp.nanosecond() / 1_000;

    match micros.cmp(&500_000) {
        std::cmp::Ordering::Less => seconds,
        std::cmp::Ordering::Greater => seconds + 1,
        // exactly .5: away from zero
        std::cmp::Ordering::Equal if seconds >= 0 => seconds + 1,
        std::cmp::Ordering::Equal => seconds,
    }
}

/// Render the ingestion instant stored in `ZZ_PROCESSED_DATETIME`.
pub fn processed_at(now: DateTime<Utc>) -> String {
    format_iso_millis(&now.naive_utc())
}
