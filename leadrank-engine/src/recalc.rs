//! Batch recalculation of pending leads
//!
//! Pending leads were scored at submission time, possibly by the heuristic
//! or by a classifier trained on fewer labels than exist now. This service
//! re-scores a bounded most-recent batch with a freshly trained classifier
//! and overwrites the stored probabilities. It is the only probability
//! writer besides the calibrator's backfill, and it is idempotent while
//! the labeled set stands still.

use crate::features::feature_vector;
use crate::trainer::{train, TRAIN_ROW_CAP};
use leadrank_common::db::leads;
use leadrank_common::Result;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Default batch size when the caller does not pass one.
pub const RECALC_DEFAULT_LIMIT: i64 = 500;
/// Smallest accepted batch size.
pub const RECALC_MIN_LIMIT: i64 = 10;
/// Largest accepted batch size.
pub const RECALC_MAX_LIMIT: i64 = 5000;

/// One recalculated lead, for result previews.
#[derive(Debug, Clone, Serialize)]
pub struct RecalcSample {
    pub lead_id: Uuid,
    pub probability: f64,
}

/// Result of a recalculation run.
#[derive(Debug, Clone, Serialize)]
pub struct RecalcOutcome {
    pub can_train: bool,
    pub updated: u64,
    pub labeled_count: usize,
    /// Ineligibility reason when `can_train` is false.
    pub reason: Option<String>,
    pub observed_classes: Vec<u8>,
    pub min_probability: Option<f64>,
    pub max_probability: Option<f64>,
    pub sample: Vec<RecalcSample>,
}

/// Pending-lead recalculation service
pub struct BatchRecalculator {
    db: Pool<Sqlite>,
}

impl BatchRecalculator {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Re-score the most-recent pending leads for a tenant.
    ///
    /// `limit` is clamped to `[10, 5000]`; `None` means the default batch
    /// of 500. An ineligible tenant gets zero updates plus the reason.
    pub async fn recalculate_pending(
        &self,
        tenant_id: &str,
        limit: Option<i64>,
    ) -> Result<RecalcOutcome> {
        let limit = limit
            .unwrap_or(RECALC_DEFAULT_LIMIT)
            .clamp(RECALC_MIN_LIMIT, RECALC_MAX_LIMIT);

        let labeled = leads::fetch_labeled(&self.db, tenant_id, Some(TRAIN_ROW_CAP as i64)).await?;
        let labeled_count = labeled.len();

        let classifier = match train(&labeled) {
            Ok(classifier) => classifier,
            Err(gate) => {
                tracing::info!(
                    tenant_id,
                    labeled_count,
                    reason = %gate.reason,
                    "recalculation skipped"
                );
                return Ok(RecalcOutcome {
                    can_train: false,
                    updated: 0,
                    labeled_count,
                    reason: Some(gate.reason),
                    observed_classes: gate.observed_classes,
                    min_probability: None,
                    max_probability: None,
                    sample: Vec::new(),
                });
            }
        };

        let pending = leads::fetch_pending(&self.db, tenant_id, limit).await?;
        let updates: Vec<(Uuid, f64)> = pending
            .iter()
            .map(|row| {
                let features =
                    feature_vector(row.time_on_site, row.pages_visited, row.clicked_price);
                (row.guid, classifier.predict_probability(features))
            })
            .collect();

        let updated = leads::update_probabilities(&self.db, tenant_id, &updates).await?;

        let mut min_probability: Option<f64> = None;
        let mut max_probability: Option<f64> = None;
        for &(_, p) in &updates {
            min_probability = Some(min_probability.map_or(p, |m: f64| m.min(p)));
            max_probability = Some(max_probability.map_or(p, |m: f64| m.max(p)));
        }

        let sample = updates
            .iter()
            .take(5)
            .map(|&(lead_id, probability)| RecalcSample {
                lead_id,
                probability,
            })
            .collect();

        tracing::info!(
            tenant_id,
            updated,
            labeled_count,
            batch_limit = limit,
            "recalculated pending leads"
        );

        Ok(RecalcOutcome {
            can_train: true,
            updated,
            labeled_count,
            reason: None,
            observed_classes: vec![0, 1],
            min_probability,
            max_probability,
            sample,
        })
    }
}
