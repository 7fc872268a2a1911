//! Decoding of index timestamps.
//!
//! The index mixes two conventions: Unix epoch seconds, and seconds since
//! the reference epoch 2001-01-01T00:00:00Z. There is no schema metadata
//! saying which one a column uses, so the magnitude decides: anything above
//! one billion is Unix time (September 2001 onwards), anything at or below
//! is reference-epoch time. Values near the threshold can be misclassified.

use chrono::{DateTime, Utc};

/// Raw values strictly greater than this are Unix epoch seconds.
pub const UNIX_THRESHOLD: f64 = 1_000_000_000.0;

/// Unix time of 2001-01-01T00:00:00Z.
pub const REFERENCE_EPOCH_UNIX: i64 = 978_307_200;

/// Decode a raw timestamp. Non-finite or out-of-range values yield `None`.
pub fn decode_timestamp(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() {
        return None;
    }
    let unix = if raw > UNIX_THRESHOLD {
        raw
    } else {
        raw + REFERENCE_EPOCH_UNIX as f64
    };
    let secs = unix.floor();
    let nanos = ((unix - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Seconds since the Unix epoch.
pub fn to_unix_seconds(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9
}

/// Seconds since the reference epoch.
pub fn to_reference_seconds(dt: &DateTime<Utc>) -> f64 {
    to_unix_seconds(dt) - REFERENCE_EPOCH_UNIX as f64
}

/// SQL expression normalising `column` to Unix seconds with the same
/// threshold rule as [`decode_timestamp`]. Used for ordering and for date
/// filters so both agree with decoding.
pub fn unix_seconds_sql(column: &str) -> String {
    format!(
        "(CASE WHEN {column} > {threshold} THEN {column} ELSE {column} + {offset} END)",
        threshold = UNIX_THRESHOLD as i64,
        offset = REFERENCE_EPOCH_UNIX,
    )
}
