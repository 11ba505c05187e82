//! Column encoding helpers.
//!
//! Timestamps are stored as RFC3339 text in UTC with millisecond precision,
//! so lexical order in SQLite equals chronological order and `expires_at`
//! comparisons can run in SQL. Dates are `YYYY-MM-DD`. Prices are REAL.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use vnmarket_core::errors::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Two REAL prices closer than this (relative) are the same value.
const PRICE_EPSILON: f64 = 1e-9;

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(raw, DATE_FORMAT)?)
}

pub fn decimal_to_real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

pub fn real_to_decimal(value: f64) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| Error::Validation(format!("Price {} is not representable", value)))
}

pub fn same_price(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= PRICE_EPSILON * a.abs().max(b.abs()).max(1.0),
        _ => false,
    }
}
