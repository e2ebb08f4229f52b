//! Shared SQL helpers
//!
//! Column encodings used by the SQLite backend: timestamps as unix
//! seconds, string lists as JSON text, booleans as integers.

use crate::Result;
use chrono::{DateTime, Utc};

/// Convert DateTime to SQLite INTEGER (unix timestamp)
#[inline]
pub fn datetime_to_unix(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Parse DateTime from SQLite INTEGER (unix timestamp)
#[inline]
pub fn datetime_from_unix(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}

/// Encode a string list as a JSON TEXT column
#[inline]
pub fn string_list_to_text(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

/// Decode a JSON TEXT column into a string list
#[inline]
pub fn string_list_from_text(text: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(text)?)
}

#[inline]
pub fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

#[inline]
pub fn bool_from_int(value: i64) -> bool {
    value != 0
}
