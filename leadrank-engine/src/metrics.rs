//! Classification metrics over labeled leads
//!
//! Zero-denominator cases (no predicted positives, no actual positives)
//! are defined as 0 rather than NaN so the threshold grid search stays
//! well-formed on degenerate label sets.

use leadrank_common::db::thresholds::DEFAULT_THRESHOLD;
use serde::Serialize;

/// Precision/recall/F1 at a fixed decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ThresholdMetrics {
    pub const ZERO: ThresholdMetrics = ThresholdMetrics {
        precision: 0.0,
        recall: 0.0,
        f1: 0.0,
    };
}

/// Metrics for `(probability, converted)` pairs at threshold `t`:
/// predicted positive iff `probability >= t`.
pub fn metrics_at_threshold(rows: &[(f64, bool)], threshold: f64) -> ThresholdMetrics {
    if rows.is_empty() {
        return ThresholdMetrics::ZERO;
    }

    let mut tp = 0u64;
    let mut fp = 0u64;
    let mut fn_ = 0u64;
    for &(probability, converted) in rows {
        let predicted = probability >= threshold;
        match (converted, predicted) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ThresholdMetrics { precision, recall, f1 }
}

/// Candidate thresholds for the grid search: 0.05 to 0.95 in 0.05 steps.
pub fn threshold_candidates() -> impl Iterator<Item = f64> {
    (5..=95).step_by(5).map(|i| i as f64 / 100.0)
}

/// Grid-search the threshold with the greatest F1.
///
/// Candidates are visited in ascending order and only a strictly greater
/// F1 displaces the incumbent, so ties resolve to the lowest threshold
/// deterministically.
pub fn best_threshold(rows: &[(f64, bool)]) -> (f64, ThresholdMetrics) {
    let mut best_t = DEFAULT_THRESHOLD;
    let mut best = ThresholdMetrics::ZERO;
    let mut best_f1 = -1.0;

    for t in threshold_candidates() {
        let metrics = metrics_at_threshold(rows, t);
        if metrics.f1 > best_f1 {
            best_f1 = metrics.f1;
            best_t = t;
            best = metrics;
        }
    }

    (best_t, best)
}
