//! # LeadRank Engine
//!
//! Per-tenant lead scoring and calibration:
//! - Feature extraction from loose submissions
//! - Heuristic cold-start scorer
//! - On-demand logistic-regression training (never persisted)
//! - F1-maximizing threshold calibration
//! - Batch recalculation of pending leads
//! - Atomic monthly usage gate
//! - Read-side analytics and demo seeding
//!
//! All cross-request coordination goes through the database; the engine
//! holds no shared mutable state between requests.

pub mod analytics;
pub mod calibrate;
pub mod features;
pub mod gate;
pub mod heuristic;
pub mod metrics;
pub mod recalc;
pub mod scoring;
pub mod seed;
pub mod trainer;

pub use analytics::LeadAnalytics;
pub use calibrate::{CalibrationOutcome, ThresholdCalibrator};
pub use features::{LeadSignals, LeadSubmission};
pub use recalc::{BatchRecalculator, RecalcOutcome};
pub use scoring::{LeadScorer, ScoredLead};
pub use seed::{DemoSeeder, SeedOutcome};
pub use trainer::{CannotTrain, ScoringStrategy, TrainedClassifier};
