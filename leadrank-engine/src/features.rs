//! Lead submission parsing and feature extraction
//!
//! Tenant integrations send whatever their form builder produces, so the
//! numeric fields are accepted as loose JSON values and coerced. A
//! malformed integration must degrade the signal to its default, never
//! lose the lead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Width of the feature vector fed to the scorers.
pub const FEATURE_COUNT: usize = 3;

/// Longest identity field retained from a submission.
const MAX_IDENTITY_LEN: usize = 120;

/// Raw lead submission as received from a tenant integration.
///
/// Numeric fields are `serde_json::Value` on purpose: numbers, numeric
/// strings, booleans and nulls are all tolerated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub time_on_site: Value,
    #[serde(default)]
    pub pages_visited: Value,
    #[serde(default)]
    pub clicked_price: Value,
}

/// Behavioral signals extracted from a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadSignals {
    pub time_on_site: i64,
    pub pages_visited: i64,
    pub clicked_price: bool,
}

impl LeadSignals {
    /// Extract signals from a raw submission. Never fails: missing or
    /// invalid values coerce to 0, negatives floor at 0.
    pub fn from_submission(submission: &LeadSubmission) -> Self {
        LeadSignals {
            time_on_site: coerce_i64(&submission.time_on_site, 0).max(0),
            pages_visited: coerce_i64(&submission.pages_visited, 0).max(0),
            clicked_price: coerce_i64(&submission.clicked_price, 0) != 0,
        }
    }

    /// Fixed-width numeric vector for the classifier.
    pub fn to_features(self) -> [f64; FEATURE_COUNT] {
        feature_vector(self.time_on_site, self.pages_visited, self.clicked_price)
    }
}

/// Feature vector from stored signal columns.
pub fn feature_vector(time_on_site: i64, pages_visited: i64, clicked_price: bool) -> [f64; FEATURE_COUNT] {
    [
        time_on_site as f64,
        pages_visited as f64,
        if clicked_price { 1.0 } else { 0.0 },
    ]
}

/// Coerce a loose JSON value to an integer; anything unusable becomes the
/// default.
pub fn coerce_i64(value: &Value, default: i64) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(int) = trimmed.parse::<i64>() {
                int
            } else if let Ok(float) = trimmed.parse::<f64>() {
                float as i64
            } else {
                default
            }
        }
        Value::Bool(b) => *b as i64,
        _ => default,
    }
}

/// Trim an identity field, dropping it entirely when empty and capping its
/// length.
pub fn clean_identity(value: &Option<String>) -> Option<String> {
    let trimmed = value.as_deref()?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_IDENTITY_LEN)
        .collect();
    Some(cleaned)
}
