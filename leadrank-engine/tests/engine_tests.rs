//! Integration tests for the scoring engine
//!
//! Sequential flows run against an in-memory database; the usage-gate
//! concurrency property needs genuinely parallel connections and uses an
//! on-disk database in a temp directory.

use leadrank_common::db::models::{Lead, Outcome, TenantStatus};
use leadrank_common::db::{self, leads, tenants, thresholds};
use leadrank_common::Error;
use leadrank_engine::calibrate::CalibrationOutcome;
use leadrank_engine::features::LeadSubmission;
use leadrank_engine::{
    gate, BatchRecalculator, DemoSeeder, LeadAnalytics, LeadScorer, ThresholdCalibrator,
};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Setup in-memory test database with the full schema
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    db::create_schema(&pool).await.unwrap();
    pool
}

fn submission(time_on_site: i64, pages_visited: i64, clicked_price: bool) -> LeadSubmission {
    LeadSubmission {
        name: Some("Test Lead".to_string()),
        origin: Some("landing".to_string()),
        time_on_site: json!(time_on_site),
        pages_visited: json!(pages_visited),
        clicked_price: json!(clicked_price as i64),
        ..Default::default()
    }
}

async fn insert_lead_row(
    pool: &SqlitePool,
    tenant_id: &str,
    time_on_site: i64,
    pages_visited: i64,
    clicked_price: bool,
    probability: Option<f64>,
    outcome: Option<Outcome>,
) -> Uuid {
    let lead = Lead {
        guid: Uuid::new_v4(),
        tenant_id: tenant_id.to_string(),
        name: None,
        email: None,
        phone: None,
        origin: None,
        time_on_site,
        pages_visited,
        clicked_price,
        probability,
        score: probability.map(|p| (p * 100.0).round() as i64),
        outcome,
        created_at: leadrank_common::time::now(),
    };
    let mut tx = pool.begin().await.unwrap();
    leads::insert_lead(&mut tx, &lead).await.unwrap();
    tx.commit().await.unwrap();
    lead.guid
}

/// Separable labeled history: converted leads browsed long and clicked.
async fn seed_separable_labels(pool: &SqlitePool, tenant_id: &str) {
    for (time, pages, clicked, outcome) in [
        (300, 9, true, Outcome::Converted),
        (250, 8, true, Outcome::Converted),
        (280, 7, true, Outcome::Converted),
        (10, 1, false, Outcome::NotConverted),
        (15, 0, false, Outcome::NotConverted),
        (5, 2, false, Outcome::NotConverted),
    ] {
        insert_lead_row(pool, tenant_id, time, pages, clicked, None, Some(outcome)).await;
    }
}

// =============================================================================
// score_lead
// =============================================================================

#[tokio::test]
async fn test_cold_start_uses_heuristic() {
    let pool = setup_test_db().await;
    let scorer = LeadScorer::new(pool.clone());

    let scored = scorer
        .score_lead("acme", &submission(0, 0, false))
        .await
        .unwrap();

    assert!(!scored.used_model);
    // Baseline heuristic value for an all-zero submission
    assert_eq!(scored.probability, 0.10);
    assert_eq!(scored.score, 10);

    // Lead persisted as pending, counter incremented in the same commit
    let lead = leads::get_lead(&pool, "acme", scored.lead_id)
        .await
        .unwrap()
        .expect("lead persisted");
    assert_eq!(lead.outcome, None);
    assert_eq!(lead.probability, Some(0.10));

    let tenant = tenants::get_tenant(&pool, "acme").await.unwrap().unwrap();
    assert_eq!(tenant.leads_used_month, 1);
}

#[tokio::test]
async fn test_probability_is_strictly_inside_unit_interval() {
    let pool = setup_test_db().await;
    let scorer = LeadScorer::new(pool.clone());

    for (time, pages, clicked) in [(0, 0, false), (100_000, 10_000, true), (37, 2, false)] {
        let scored = scorer
            .score_lead("acme", &submission(time, pages, clicked))
            .await
            .unwrap();
        assert!(
            scored.probability > 0.0 && scored.probability < 1.0,
            "probability {} escaped (0,1)",
            scored.probability
        );
    }
}

#[tokio::test]
async fn test_garbage_submission_still_scores() {
    let pool = setup_test_db().await;
    let scorer = LeadScorer::new(pool.clone());

    let garbage: LeadSubmission = serde_json::from_value(json!({
        "time_on_site": "four hundred",
        "pages_visited": {"count": 3},
        "clicked_price": null
    }))
    .unwrap();

    let scored = scorer.score_lead("acme", &garbage).await.unwrap();
    // All signals degraded to defaults
    assert_eq!(scored.probability, 0.10);
}

#[tokio::test]
async fn test_trained_tenant_scores_with_model() {
    let pool = setup_test_db().await;
    seed_separable_labels(&pool, "acme").await;

    let scorer = LeadScorer::new(pool.clone());
    let scored = scorer
        .score_lead("acme", &submission(290, 8, true))
        .await
        .unwrap();

    assert!(scored.used_model);
    assert!(scored.probability > 0.5);

    let bounced = scorer
        .score_lead("acme", &submission(5, 1, false))
        .await
        .unwrap();
    assert!(bounced.used_model);
    assert!(bounced.probability < scored.probability);
}

#[tokio::test]
async fn test_inactive_tenant_is_rejected() {
    let pool = setup_test_db().await;
    tenants::ensure_tenant(&pool, "acme", "trial").await.unwrap();
    tenants::update_tenant(&pool, "acme", None, Some(TenantStatus::Inactive))
        .await
        .unwrap();

    let scorer = LeadScorer::new(pool.clone());
    let result = scorer.score_lead("acme", &submission(10, 1, false)).await;
    assert!(matches!(result, Err(Error::TenantInactive(_))));
    assert_eq!(leads::count_leads(&pool, "acme").await.unwrap(), 0);
}

// =============================================================================
// Usage gate
// =============================================================================

#[tokio::test]
async fn test_quota_exceeded_rolls_back_the_lead() {
    let pool = setup_test_db().await;
    tenants::ensure_tenant(&pool, "acme", "demo").await.unwrap();
    // demo plan allows 30/month; pin the counter at the limit
    sqlx::query("UPDATE tenants SET leads_used_month = 30 WHERE tenant_id = 'acme'")
        .execute(&pool)
        .await
        .unwrap();

    let scorer = LeadScorer::new(pool.clone());
    let result = scorer.score_lead("acme", &submission(10, 1, false)).await;

    match result {
        Err(Error::QuotaExceeded { used, limit }) => {
            assert_eq!(used, 30);
            assert_eq!(limit, 30);
        }
        other => panic!("expected QuotaExceeded, got {other:?}"),
    }

    // Nothing persisted, counter untouched
    assert_eq!(leads::count_leads(&pool, "acme").await.unwrap(), 0);
    let tenant = tenants::get_tenant(&pool, "acme").await.unwrap().unwrap();
    assert_eq!(tenant.leads_used_month, 30);
}

#[tokio::test]
async fn test_month_rollover_resets_the_counter() {
    let pool = setup_test_db().await;
    tenants::ensure_tenant(&pool, "acme", "demo").await.unwrap();
    sqlx::query(
        "UPDATE tenants SET usage_month = '2023-01', leads_used_month = 30 WHERE tenant_id = 'acme'",
    )
    .execute(&pool)
    .await
    .unwrap();

    // A full counter from a prior month must not block the next lead
    let scorer = LeadScorer::new(pool.clone());
    let scored = scorer.score_lead("acme", &submission(10, 1, false)).await;
    assert!(scored.is_ok());

    let tenant = tenants::get_tenant(&pool, "acme").await.unwrap().unwrap();
    assert_eq!(tenant.usage_month, leadrank_common::time::current_month_key());
    assert_eq!(tenant.leads_used_month, 1);
}

#[tokio::test]
async fn test_unlimited_plan_never_trips_the_gate() {
    let pool = setup_test_db().await;
    tenants::ensure_tenant(&pool, "acme", "internal").await.unwrap();
    sqlx::query("UPDATE tenants SET leads_used_month = 999999 WHERE tenant_id = 'acme'")
        .execute(&pool)
        .await
        .unwrap();

    let scorer = LeadScorer::new(pool.clone());
    assert!(scorer.score_lead("acme", &submission(1, 1, false)).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_gate_admits_exactly_the_limit() {
    // Parallel writers need real connections; in-memory SQLite won't do.
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init_database(&dir.path().join("leadrank.db"))
        .await
        .unwrap();
    tenants::ensure_tenant(&pool, "acme", "trial").await.unwrap();

    const LIMIT: i64 = 5;
    const ATTEMPTS: usize = 10;

    let mut handles = Vec::new();
    for i in 0..ATTEMPTS {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let lead = Lead {
                guid: Uuid::new_v4(),
                tenant_id: "acme".to_string(),
                name: Some(format!("racer-{i}")),
                email: None,
                phone: None,
                origin: None,
                time_on_site: 10,
                pages_visited: 1,
                clicked_price: false,
                probability: Some(0.10),
                score: Some(10),
                outcome: None,
                created_at: leadrank_common::time::now(),
            };

            let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;
            match gate::check_and_increment(&mut tx, "acme", LIMIT).await {
                Ok(_) => {
                    leads::insert_lead(&mut tx, &lead).await?;
                    tx.commit().await?;
                    Ok(true)
                }
                Err(Error::QuotaExceeded { .. }) => {
                    tx.rollback().await?;
                    Ok(false)
                }
                Err(e) => Err(e),
            }
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(true) => accepted += 1,
            Ok(false) => rejected += 1,
            Err(e) => panic!("gate returned unexpected error: {e}"),
        }
    }

    assert_eq!(accepted, 5);
    assert_eq!(rejected, 5);
    assert_eq!(leads::count_leads(&pool, "acme").await.unwrap(), 5);
    let tenant = tenants::get_tenant(&pool, "acme").await.unwrap().unwrap();
    assert_eq!(tenant.leads_used_month, 5);
}

// =============================================================================
// Threshold calibration
// =============================================================================

#[tokio::test]
async fn test_recalibrate_persists_the_f1_best_threshold() {
    let pool = setup_test_db().await;

    // Perfectly separable at 0.5; the default 0.35 scores worse
    for (prob, outcome) in [
        (0.55, Outcome::Converted),
        (0.60, Outcome::Converted),
        (0.45, Outcome::NotConverted),
        (0.40, Outcome::NotConverted),
        (0.36, Outcome::NotConverted),
    ] {
        insert_lead_row(&pool, "acme", 10, 1, false, Some(prob), Some(outcome)).await;
    }

    let calibrator = ThresholdCalibrator::new(pool.clone());
    let outcome = calibrator.recalibrate("acme").await.unwrap();

    match outcome {
        CalibrationOutcome::Calibrated { threshold, f1, .. } => {
            assert!((threshold - 0.50).abs() < 1e-9);
            assert!((f1 - 1.0).abs() < 1e-9);
        }
        other => panic!("expected calibration, got {other:?}"),
    }

    let stored = thresholds::get_threshold(&pool, "acme").await.unwrap();
    assert!((stored - 0.50).abs() < 1e-9);
}

#[tokio::test]
async fn test_recalibrate_backfills_missing_probabilities_first() {
    let pool = setup_test_db().await;
    // Labeled but unscored rows (e.g. imported history)
    seed_separable_labels(&pool, "acme").await;

    let before = leads::fetch_labeled(&pool, "acme", None).await.unwrap();
    assert!(before.iter().all(|r| r.probability.is_none()));

    let calibrator = ThresholdCalibrator::new(pool.clone());
    let outcome = calibrator.recalibrate("acme").await.unwrap();
    assert!(matches!(outcome, CalibrationOutcome::Calibrated { .. }));

    let after = leads::fetch_labeled(&pool, "acme", None).await.unwrap();
    assert!(after.iter().all(|r| r.probability.is_some()));
}

#[tokio::test]
async fn test_recalibrate_ineligible_leaves_threshold_untouched() {
    let pool = setup_test_db().await;
    thresholds::set_threshold(&pool, "acme", 0.60).await.unwrap();

    // Only two labeled rows: below the eligibility floor
    insert_lead_row(&pool, "acme", 300, 9, true, Some(0.8), Some(Outcome::Converted)).await;
    insert_lead_row(&pool, "acme", 10, 1, false, Some(0.1), Some(Outcome::NotConverted)).await;

    let calibrator = ThresholdCalibrator::new(pool.clone());
    let outcome = calibrator.recalibrate("acme").await.unwrap();

    match outcome {
        CalibrationOutcome::CannotCalibrate {
            threshold,
            labeled_count,
            observed_classes,
            ..
        } => {
            assert!((threshold - 0.60).abs() < 1e-9);
            assert_eq!(labeled_count, 2);
            assert_eq!(observed_classes, vec![0, 1]);
        }
        other => panic!("expected CannotCalibrate, got {other:?}"),
    }

    assert!((thresholds::get_threshold(&pool, "acme").await.unwrap() - 0.60).abs() < 1e-9);
}

// =============================================================================
// Batch recalculation
// =============================================================================

#[tokio::test]
async fn test_recalculate_pending_is_idempotent() {
    let pool = setup_test_db().await;
    seed_separable_labels(&pool, "acme").await;

    for (time, pages, clicked) in [(200, 6, true), (30, 2, false), (90, 4, false), (400, 10, true)] {
        insert_lead_row(&pool, "acme", time, pages, clicked, Some(0.10), None).await;
    }

    let recalculator = BatchRecalculator::new(pool.clone());

    let first = recalculator.recalculate_pending("acme", None).await.unwrap();
    assert!(first.can_train);
    assert_eq!(first.updated, 4);
    let probs_after_first: Vec<Option<f64>> = pending_probabilities(&pool, "acme").await;

    let second = recalculator.recalculate_pending("acme", None).await.unwrap();
    assert_eq!(second.updated, 4);
    let probs_after_second: Vec<Option<f64>> = pending_probabilities(&pool, "acme").await;

    // Same labels, same model, bit-identical probabilities
    assert_eq!(probs_after_first, probs_after_second);

    // The engaged pending lead must now outrank the bounced one
    assert!(first.max_probability.unwrap() > first.min_probability.unwrap());
    assert!(!first.sample.is_empty());
}

#[tokio::test]
async fn test_recalculate_pending_without_labels_reports_reason() {
    let pool = setup_test_db().await;
    insert_lead_row(&pool, "acme", 100, 5, true, Some(0.4), None).await;

    let recalculator = BatchRecalculator::new(pool.clone());
    let outcome = recalculator.recalculate_pending("acme", Some(100)).await.unwrap();

    assert!(!outcome.can_train);
    assert_eq!(outcome.updated, 0);
    assert!(outcome.reason.is_some());

    // Stored probability untouched
    let probs = pending_probabilities(&pool, "acme").await;
    assert_eq!(probs, vec![Some(0.4)]);
}

#[tokio::test]
async fn test_recalculate_respects_the_batch_limit() {
    let pool = setup_test_db().await;
    seed_separable_labels(&pool, "acme").await;
    for _ in 0..15 {
        insert_lead_row(&pool, "acme", 50, 3, false, Some(0.2), None).await;
    }

    let recalculator = BatchRecalculator::new(pool.clone());
    // Requested limit below the floor clamps up to 10
    let outcome = recalculator.recalculate_pending("acme", Some(1)).await.unwrap();
    assert_eq!(outcome.updated, 10);
}

async fn pending_probabilities(pool: &SqlitePool, tenant_id: &str) -> Vec<Option<f64>> {
    sqlx::query_scalar(
        "SELECT probability FROM leads WHERE tenant_id = ? AND outcome IS NULL ORDER BY guid",
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await
    .unwrap()
}

// =============================================================================
// Labeling feeds the training set
// =============================================================================

#[tokio::test]
async fn test_labeling_flips_a_tenant_from_heuristic_to_model() {
    let pool = setup_test_db().await;
    let scorer = LeadScorer::new(pool.clone());

    // Score four leads cold
    let mut ids = Vec::new();
    for (time, pages, clicked) in [(300, 9, true), (250, 8, true), (10, 1, false), (15, 0, false)] {
        let scored = scorer
            .score_lead("acme", &submission(time, pages, clicked))
            .await
            .unwrap();
        assert!(!scored.used_model);
        ids.push(scored.lead_id);
    }

    // Operator labels them 2/2
    leads::set_outcome(&pool, "acme", ids[0], Outcome::Converted).await.unwrap();
    leads::set_outcome(&pool, "acme", ids[1], Outcome::Converted).await.unwrap();
    leads::set_outcome(&pool, "acme", ids[2], Outcome::NotConverted).await.unwrap();
    leads::set_outcome(&pool, "acme", ids[3], Outcome::NotConverted).await.unwrap();

    // The very next score call retrains from the live labeled set
    let scored = scorer
        .score_lead("acme", &submission(280, 9, true))
        .await
        .unwrap();
    assert!(scored.used_model);
}

// =============================================================================
// Analytics and seeding
// =============================================================================

#[tokio::test]
async fn test_funnel_and_status_counts() {
    let pool = setup_test_db().await;
    insert_lead_row(&pool, "acme", 1, 1, false, Some(0.80), Some(Outcome::Converted)).await;
    insert_lead_row(&pool, "acme", 1, 1, false, Some(0.50), None).await;
    insert_lead_row(&pool, "acme", 1, 1, false, Some(0.10), Some(Outcome::NotConverted)).await;

    let analytics = LeadAnalytics::new(pool.clone());

    let funnel = analytics.funnel("acme").await.unwrap();
    assert_eq!(funnel.hot, 1);
    assert_eq!(funnel.warm, 1);
    assert_eq!(funnel.cold, 1);

    let status = analytics.status_counts("acme").await.unwrap();
    assert_eq!(status.converted, 1);
    assert_eq!(status.denied, 1);
    assert_eq!(status.pending, 1);
}

#[tokio::test]
async fn test_insights_bands_and_series() {
    let pool = setup_test_db().await;
    insert_lead_row(&pool, "acme", 1, 1, false, Some(0.85), Some(Outcome::Converted)).await;
    insert_lead_row(&pool, "acme", 1, 1, false, Some(0.82), Some(Outcome::NotConverted)).await;
    insert_lead_row(&pool, "acme", 1, 1, false, Some(0.10), None).await;

    let analytics = LeadAnalytics::new(pool.clone());
    let insights = analytics.insights("acme", 14).await.unwrap();

    assert_eq!(insights.window_total, 3);
    assert_eq!(insights.labeled, 2);
    assert_eq!(insights.converted, 1);
    assert!((insights.conversion_rate - 0.5).abs() < 1e-9);

    let top_band = insights
        .bands
        .iter()
        .find(|b| b.band == "0.8-1.0")
        .expect("band exists");
    assert_eq!(top_band.labeled, 2);
    assert_eq!(top_band.converted, 1);

    // All three leads were created today
    assert_eq!(insights.series.len(), 1);
    assert_eq!(insights.series[0].total, 3);
    assert_eq!(insights.series[0].pending, 1);

    // Window clamps to the supported range
    let clamped = analytics.insights("acme", 1_000).await.unwrap();
    assert_eq!(clamped.window_days, 90);
}

#[tokio::test]
async fn test_top_origins_groups_and_defaults() {
    let pool = setup_test_db().await;
    let scorer = LeadScorer::new(pool.clone());
    for origin in ["ads", "ads", "landing"] {
        let mut sub = submission(10, 1, false);
        sub.origin = Some(origin.to_string());
        scorer.score_lead("acme", &sub).await.unwrap();
    }
    let mut sub = submission(10, 1, false);
    sub.origin = None;
    scorer.score_lead("acme", &sub).await.unwrap();

    let analytics = LeadAnalytics::new(pool.clone());
    let origins = analytics.top_origins("acme", 30, 6).await.unwrap();

    assert_eq!(origins[0].origin, "ads");
    assert_eq!(origins[0].total, 2);
    assert!(origins.iter().any(|o| o.origin == "unknown"));
}

#[tokio::test]
async fn test_seeder_respects_quota_and_counts_outcomes() {
    let pool = setup_test_db().await;
    let seeder = DemoSeeder::new(pool.clone());

    let outcome = seeder.seed_demo_leads("acme", 40).await.unwrap();
    assert_eq!(outcome.inserted, 40);
    assert_eq!(
        outcome.inserted,
        outcome.converted + outcome.denied + outcome.pending
    );
    assert!(!outcome.quota_hit);

    // A nearly-full demo tenant stops at the quota instead of overrunning
    tenants::ensure_tenant(&pool, "cramped", "trial").await.unwrap();
    tenants::update_tenant(&pool, "cramped", Some("demo"), None).await.unwrap();
    sqlx::query("UPDATE tenants SET leads_used_month = 29 WHERE tenant_id = 'cramped'")
        .execute(&pool)
        .await
        .unwrap();

    let outcome = seeder.seed_demo_leads("cramped", 10).await.unwrap();
    assert_eq!(outcome.inserted, 1);
    assert!(outcome.quota_hit);
    assert_eq!(leads::count_leads(&pool, "cramped").await.unwrap(), 1);
}
