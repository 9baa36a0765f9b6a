//! Cold-start heuristic scorer
//!
//! Deterministic affine combination of the three behavioral signals, used
//! whenever a tenant has no trainable labeled set. Each term is capped so
//! the total stays bounded, and the result is clamped strictly inside
//! (0, 1) so downstream log-loss consumers never see 0 or 1.

use crate::features::LeadSignals;

/// Lower clamp of the heuristic output.
pub const HEURISTIC_FLOOR: f64 = 0.02;
/// Upper clamp of the heuristic output.
pub const HEURISTIC_CEIL: f64 = 0.98;

/// Baseline probability for a lead with no signals at all.
const BASE: f64 = 0.10;

/// Heuristic conversion probability.
///
/// ```text
/// p = 0.10
///   + min(time_on_site / 400, 0.25)
///   + min(pages_visited / 10, 0.25)
///   + (0.20 if clicked_price)
/// p = clamp(p, 0.02, 0.98)
/// ```
///
/// Stateless and pure: identical inputs produce bit-identical outputs, and
/// the result is monotonic non-decreasing in each signal.
pub fn heuristic_probability(signals: LeadSignals) -> f64 {
    let mut p = BASE;
    p += (signals.time_on_site as f64 / 400.0).min(0.25);
    p += (signals.pages_visited as f64 / 10.0).min(0.25);
    if signals.clicked_price {
        p += 0.20;
    }
    p.clamp(HEURISTIC_FLOOR, HEURISTIC_CEIL)
}

/// Integer 0-100 score derived from a probability.
pub fn score_from_probability(probability: f64) -> i64 {
    (probability * 100.0).round() as i64
}
