//! Per-tenant decision threshold calibration
//!
//! Grid-searches the threshold that maximizes F1 over the tenant's full
//! labeled set and persists the winner. Labeled rows missing a stored
//! probability are backfilled with a freshly trained classifier before the
//! search, so calibration never runs against partially-populated
//! probabilities.

use crate::features::feature_vector;
use crate::metrics::best_threshold;
use crate::trainer::{check_trainable, train};
use leadrank_common::db::models::Outcome;
use leadrank_common::db::{leads, thresholds};
use leadrank_common::Result;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Outcome of a calibration run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Calibrated {
        threshold: f64,
        precision: f64,
        recall: f64,
        f1: f64,
        labeled_count: usize,
    },
    /// Eligibility gate failed; the previously persisted threshold (or the
    /// system default) is reported unchanged.
    CannotCalibrate {
        reason: String,
        observed_classes: Vec<u8>,
        labeled_count: usize,
        threshold: f64,
    },
}

/// Threshold calibration service
pub struct ThresholdCalibrator {
    db: Pool<Sqlite>,
}

impl ThresholdCalibrator {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Recalibrate a tenant's decision threshold from its labeled history.
    pub async fn recalibrate(&self, tenant_id: &str) -> Result<CalibrationOutcome> {
        let mut labeled = leads::fetch_labeled(&self.db, tenant_id, None).await?;

        if let Err(gate) = check_trainable(&labeled) {
            let current = thresholds::get_threshold(&self.db, tenant_id).await?;
            tracing::info!(
                tenant_id,
                labeled_count = labeled.len(),
                reason = %gate.reason,
                "calibration skipped, threshold untouched"
            );
            return Ok(CalibrationOutcome::CannotCalibrate {
                reason: gate.reason,
                observed_classes: gate.observed_classes,
                labeled_count: labeled.len(),
                threshold: current,
            });
        }

        // Backfill before searching: every labeled row must carry a
        // probability computed against ground truth.
        let missing: Vec<&leadrank_common::db::models::LabeledLead> =
            labeled.iter().filter(|r| r.probability.is_none()).collect();
        if !missing.is_empty() {
            let classifier = match train(&labeled) {
                Ok(classifier) => classifier,
                Err(gate) => {
                    let current = thresholds::get_threshold(&self.db, tenant_id).await?;
                    return Ok(CalibrationOutcome::CannotCalibrate {
                        reason: gate.reason,
                        observed_classes: gate.observed_classes,
                        labeled_count: labeled.len(),
                        threshold: current,
                    });
                }
            };

            let updates: Vec<(Uuid, f64)> = missing
                .iter()
                .map(|row| {
                    let features =
                        feature_vector(row.time_on_site, row.pages_visited, row.clicked_price);
                    (row.guid, classifier.predict_probability(features))
                })
                .collect();

            let backfilled = leads::update_probabilities(&self.db, tenant_id, &updates).await?;
            tracing::debug!(tenant_id, backfilled, "backfilled missing probabilities");

            labeled = leads::fetch_labeled(&self.db, tenant_id, None).await?;
        }

        let pairs: Vec<(f64, bool)> = labeled
            .iter()
            .filter_map(|row| {
                row.probability
                    .map(|p| (p, row.outcome == Outcome::Converted))
            })
            .collect();

        let (threshold, metrics) = best_threshold(&pairs);
        thresholds::set_threshold(&self.db, tenant_id, threshold).await?;

        tracing::info!(
            tenant_id,
            threshold,
            f1 = metrics.f1,
            precision = metrics.precision,
            recall = metrics.recall,
            labeled_count = labeled.len(),
            "threshold recalibrated"
        );

        Ok(CalibrationOutcome::Calibrated {
            threshold,
            precision: metrics.precision,
            recall: metrics.recall,
            f1: metrics.f1,
            labeled_count: labeled.len(),
        })
    }
}
