//! Date formatting and millisecond arithmetic.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Formats an instant as `dd/mm/yyyy` (UTC), the form shown on expiry
/// screens and status badges.
#[must_use]
pub fn format_date(instant: DateTime<Utc>) -> String {
    instant.format("%d/%m/%Y").to_string()
}

/// Signed milliseconds from `from` to `to` (negative when `to` is earlier).
#[must_use]
pub fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_milliseconds()
}

/// Integer division rounding towards positive infinity, for non-negative
/// numerators.
#[must_use]
pub const fn ceil_div(value: u64, divisor: u64) -> u64 {
    value.div_ceil(divisor)
}

/// Converts a std duration into a chrono duration, saturating at the
/// largest representable span.
#[must_use]
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
