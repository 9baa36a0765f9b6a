//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Accounting-month key ("YYYY-MM") for a timestamp.
///
/// The usage gate compares this against the stored `usage_month` to
/// detect a calendar-month transition.
pub fn month_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m").to_string()
}

/// Accounting-month key for the current instant
pub fn current_month_key() -> String {
    month_key(now())
}
