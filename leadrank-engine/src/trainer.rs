//! On-demand classifier training
//!
//! Every invocation retrains from the tenant's current labeled set; no
//! model or scaler survives a request. The fit is a standardized binomial
//! logistic regression, and a tenant that cannot train falls back to the
//! heuristic scorer through a single tagged strategy decision.

use crate::features::{feature_vector, LeadSignals, FEATURE_COUNT};
use crate::heuristic::heuristic_probability;
use leadrank_common::db::models::{LabeledLead, Outcome};
use linfa::prelude::*;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{arr2, Array1, Array2, Axis};
use serde::Serialize;

/// Minimum labeled leads before a classifier can be fit. The same floor
/// gates threshold calibration.
pub const MIN_LABELED_TO_TRAIN: usize = 4;

/// Most-recent labeled rows considered per fit, bounding retrain cost.
pub const TRAIN_ROW_CAP: usize = 2000;

/// Solver iteration bound for the logistic fit.
const MAX_TRAIN_ITERATIONS: u64 = 200;

/// Why a tenant cannot train a classifier right now.
///
/// This is a normal state, not an error: callers fall back to the
/// heuristic scorer and surface `reason` to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CannotTrain {
    pub reason: String,
    /// Distinct outcome classes observed among labeled leads (0 and/or 1).
    pub observed_classes: Vec<u8>,
}

/// Check the training eligibility gate for a labeled set.
pub fn check_trainable(rows: &[LabeledLead]) -> Result<(), CannotTrain> {
    let mut observed_classes: Vec<u8> = rows
        .iter()
        .map(|r| r.outcome.as_i64() as u8)
        .collect();
    observed_classes.sort_unstable();
    observed_classes.dedup();

    if rows.len() < MIN_LABELED_TO_TRAIN {
        return Err(CannotTrain {
            reason: format!(
                "Not enough labeled leads: have {}, need at least {} (ideally two of each outcome).",
                rows.len(),
                MIN_LABELED_TO_TRAIN
            ),
            observed_classes,
        });
    }

    if observed_classes.len() < 2 {
        return Err(CannotTrain {
            reason: "Labeled leads must include both outcomes (converted and not converted)."
                .to_string(),
            observed_classes,
        });
    }

    Ok(())
}

/// Per-fit feature standardization (zero mean, unit variance).
///
/// Statistics come from the current fit only; a zero-variance column
/// scales by 1 so constant features pass through centered.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    fn fit(x: &Array2<f64>) -> StandardScaler {
        let mut means = [0.0; FEATURE_COUNT];
        let mut stds = [1.0; FEATURE_COUNT];

        for (column, (mean_slot, std_slot)) in x
            .axis_iter(Axis(1))
            .zip(means.iter_mut().zip(stds.iter_mut()))
        {
            let mean = column.mean().unwrap_or(0.0);
            let std = column.std(0.0);
            *mean_slot = mean;
            *std_slot = if std > f64::EPSILON { std } else { 1.0 };
        }

        StandardScaler { means, stds }
    }

    fn transform_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let means = Array1::from_vec(self.means.to_vec());
        let stds = Array1::from_vec(self.stds.to_vec());
        (x - &means) / &stds
    }

    fn transform_row(&self, features: [f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut scaled = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            scaled[i] = (features[i] - self.means[i]) / self.stds[i];
        }
        scaled
    }
}

/// A classifier fit for one request: the scaler and the fitted logistic
/// model travel together and are discarded after use.
pub struct TrainedClassifier {
    scaler: StandardScaler,
    model: FittedLogisticRegression<f64, usize>,
    trained_on: usize,
}

impl TrainedClassifier {
    /// Probability of conversion for a single feature vector.
    pub fn predict_probability(&self, features: [f64; FEATURE_COUNT]) -> f64 {
        let scaled = self.scaler.transform_row(features);
        let x = arr2(&[scaled]);
        self.model.predict_probabilities(&x)[0]
    }

    /// How many labeled rows the fit consumed.
    pub fn trained_on(&self) -> usize {
        self.trained_on
    }
}

/// Train a classifier from labeled leads (most-recent-first).
///
/// The population is capped at [`TRAIN_ROW_CAP`] rows and the eligibility
/// gate is evaluated against exactly that population. Solver failure is
/// reported as `CannotTrain`, a model-quality signal rather than a fault.
pub fn train(rows: &[LabeledLead]) -> Result<TrainedClassifier, CannotTrain> {
    let capped = &rows[..rows.len().min(TRAIN_ROW_CAP)];
    check_trainable(capped)?;

    let features: Vec<[f64; FEATURE_COUNT]> = capped
        .iter()
        .map(|r| feature_vector(r.time_on_site, r.pages_visited, r.clicked_price))
        .collect();
    let x: Array2<f64> = features.into();
    let y: Array1<usize> = capped
        .iter()
        .map(|r| match r.outcome {
            Outcome::Converted => 1usize,
            Outcome::NotConverted => 0usize,
        })
        .collect();

    let scaler = StandardScaler::fit(&x);
    let x_scaled = scaler.transform_matrix(&x);

    let dataset = Dataset::new(x_scaled, y);
    let model = LogisticRegression::default()
        .max_iterations(MAX_TRAIN_ITERATIONS)
        .fit(&dataset)
        .map_err(|e| CannotTrain {
            reason: format!("Classifier fit did not converge: {e}"),
            observed_classes: vec![0, 1],
        })?;

    Ok(TrainedClassifier {
        scaler,
        model,
        trained_on: capped.len(),
    })
}

/// How a lead's probability gets computed for the current request.
///
/// Selected once per call by the eligibility check, then used uniformly;
/// no scattered fallback checks.
pub enum ScoringStrategy {
    Heuristic,
    Trained(TrainedClassifier),
}

impl ScoringStrategy {
    /// Pick the strategy for a tenant's labeled set. Returns the gate
    /// outcome alongside so callers can surface the fallback reason.
    pub fn select(labeled: &[LabeledLead]) -> (ScoringStrategy, Option<CannotTrain>) {
        match train(labeled) {
            Ok(classifier) => (ScoringStrategy::Trained(classifier), None),
            Err(gate) => (ScoringStrategy::Heuristic, Some(gate)),
        }
    }

    /// Conversion probability for one lead's signals.
    pub fn probability(&self, signals: LeadSignals) -> f64 {
        match self {
            ScoringStrategy::Heuristic => heuristic_probability(signals),
            ScoringStrategy::Trained(classifier) => {
                classifier.predict_probability(signals.to_features())
            }
        }
    }

    /// Whether a trained model (rather than the heuristic) is in use.
    pub fn used_model(&self) -> bool {
        matches!(self, ScoringStrategy::Trained(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn labeled(
        time_on_site: i64,
        pages_visited: i64,
        clicked_price: bool,
        outcome: Outcome,
    ) -> LabeledLead {
        LabeledLead {
            guid: Uuid::new_v4(),
            time_on_site,
            pages_visited,
            clicked_price,
            probability: None,
            outcome,
        }
    }

    /// A small separable set: converted leads browsed long and clicked.
    fn separable_set() -> Vec<LabeledLead> {
        vec![
            labeled(300, 9, true, Outcome::Converted),
            labeled(250, 8, true, Outcome::Converted),
            labeled(280, 7, true, Outcome::Converted),
            labeled(10, 1, false, Outcome::NotConverted),
            labeled(15, 0, false, Outcome::NotConverted),
            labeled(5, 2, false, Outcome::NotConverted),
        ]
    }

    #[test]
    fn three_rows_cannot_train() {
        let rows = vec![
            labeled(10, 1, false, Outcome::Converted),
            labeled(20, 2, false, Outcome::Converted),
            labeled(30, 3, false, Outcome::NotConverted),
        ];
        let gate = check_trainable(&rows).unwrap_err();
        assert!(gate.reason.contains("Not enough labeled leads"));
        assert_eq!(gate.observed_classes, vec![0, 1]);
    }

    #[test]
    fn four_rows_two_per_class_can_train() {
        let rows = vec![
            labeled(300, 9, true, Outcome::Converted),
            labeled(250, 8, true, Outcome::Converted),
            labeled(10, 1, false, Outcome::NotConverted),
            labeled(15, 0, false, Outcome::NotConverted),
        ];
        assert!(check_trainable(&rows).is_ok());
        assert!(train(&rows).is_ok());
    }

    #[test]
    fn single_class_cannot_train() {
        let rows = vec![
            labeled(10, 1, false, Outcome::NotConverted),
            labeled(20, 2, false, Outcome::NotConverted),
            labeled(30, 3, false, Outcome::NotConverted),
            labeled(40, 4, false, Outcome::NotConverted),
        ];
        let gate = check_trainable(&rows).unwrap_err();
        assert!(gate.reason.contains("both outcomes"));
        assert_eq!(gate.observed_classes, vec![0]);
    }

    #[test]
    fn empty_set_cannot_train() {
        let gate = check_trainable(&[]).unwrap_err();
        assert!(gate.observed_classes.is_empty());
    }

    #[test]
    fn trained_model_orders_obvious_leads() {
        let model = train(&separable_set()).unwrap();

        let engaged = model.predict_probability([290.0, 8.0, 1.0]);
        let bounced = model.predict_probability([8.0, 1.0, 0.0]);

        assert!(engaged > bounced);
        assert!(engaged > 0.5, "engaged lead scored {engaged}");
        assert!(bounced < 0.5, "bounced lead scored {bounced}");
        assert!((0.0..=1.0).contains(&engaged));
        assert!((0.0..=1.0).contains(&bounced));
    }

    #[test]
    fn training_is_deterministic() {
        let rows = separable_set();
        let first = train(&rows).unwrap();
        let second = train(&rows).unwrap();

        for features in [[290.0, 8.0, 1.0], [8.0, 1.0, 0.0], [100.0, 4.0, 0.0]] {
            assert_eq!(
                first.predict_probability(features).to_bits(),
                second.predict_probability(features).to_bits()
            );
        }
    }

    #[test]
    fn scaler_guards_zero_variance_columns() {
        // clicked_price is constant here; the fit must not divide by zero
        let rows = vec![
            labeled(300, 9, false, Outcome::Converted),
            labeled(250, 8, false, Outcome::Converted),
            labeled(10, 1, false, Outcome::NotConverted),
            labeled(15, 0, false, Outcome::NotConverted),
        ];
        let model = train(&rows).unwrap();
        let p = model.predict_probability([200.0, 7.0, 0.0]);
        assert!(p.is_finite());
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn strategy_falls_back_to_heuristic() {
        let (strategy, gate) = ScoringStrategy::select(&[]);
        assert!(!strategy.used_model());
        assert!(gate.is_some());

        let signals = crate::features::LeadSignals {
            time_on_site: 0,
            pages_visited: 0,
            clicked_price: false,
        };
        assert_eq!(strategy.probability(signals), 0.10);
    }

    #[test]
    fn strategy_uses_model_when_eligible() {
        let (strategy, gate) = ScoringStrategy::select(&separable_set());
        assert!(strategy.used_model());
        assert!(gate.is_none());
    }

    #[test]
    fn train_caps_the_population() {
        let mut rows = separable_set();
        // Pad far beyond the cap with alternating outcomes
        for i in 0..(TRAIN_ROW_CAP + 100) {
            let outcome = if i % 2 == 0 {
                Outcome::Converted
            } else {
                Outcome::NotConverted
            };
            rows.push(labeled((i % 400) as i64, (i % 10) as i64, i % 3 == 0, outcome));
        }
        let model = train(&rows).unwrap();
        assert_eq!(model.trained_on(), TRAIN_ROW_CAP);
    }
}
