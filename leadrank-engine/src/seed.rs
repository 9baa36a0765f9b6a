//! Demo lead seeding
//!
//! Writes randomized leads for a tenant so dashboards and the trainer have
//! something to chew on. Every insert goes through the same usage gate as
//! real submissions; hitting the quota stops the batch early rather than
//! overrunning the plan.

use crate::features::LeadSignals;
use crate::gate;
use crate::heuristic::{heuristic_probability, score_from_probability};
use leadrank_common::db::models::{Lead, Outcome};
use leadrank_common::db::{leads, tenants};
use leadrank_common::{plans, time, Error, Result};
use rand::Rng;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Largest seed batch accepted per call.
pub const SEED_MAX: usize = 200;

const DEMO_ORIGINS: &[&str] = &["landing", "instagram", "referral", "ads", "organic"];

/// Result of a seeding run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeedOutcome {
    pub inserted: usize,
    pub converted: usize,
    pub denied: usize,
    pub pending: usize,
    /// True when the tenant's quota cut the batch short.
    pub quota_hit: bool,
}

/// Demo data seeding service
pub struct DemoSeeder {
    db: Pool<Sqlite>,
}

impl DemoSeeder {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Insert up to `n` randomized leads (clamped to [1, 200]).
    ///
    /// Most high-probability leads get a converted outcome and some
    /// low-probability leads a denied one, so a seeded tenant usually
    /// clears the training eligibility gate.
    pub async fn seed_demo_leads(&self, tenant_id: &str, n: usize) -> Result<SeedOutcome> {
        let n = n.clamp(1, SEED_MAX);
        let tenant = tenants::ensure_tenant(&self.db, tenant_id, plans::DEFAULT_PLAN.name).await?;
        let plan = plans::plan_by_name(&tenant.plan);

        // Draw the whole batch before touching the database; ThreadRng is
        // not Send and must not live across an await.
        let batch = {
            let mut rng = rand::thread_rng();
            (0..n)
                .map(|_| {
                    let signals = LeadSignals {
                        time_on_site: rng.gen_range(0..=600),
                        pages_visited: rng.gen_range(0..=12),
                        clicked_price: rng.gen_bool(0.4),
                    };
                    let probability = heuristic_probability(signals);
                    let outcome = if probability >= 0.55 && rng.gen_bool(0.7) {
                        Some(Outcome::Converted)
                    } else if probability < 0.35 && rng.gen_bool(0.3) {
                        Some(Outcome::NotConverted)
                    } else {
                        None
                    };
                    let origin = DEMO_ORIGINS[rng.gen_range(0..DEMO_ORIGINS.len())];
                    (signals, probability, outcome, origin)
                })
                .collect::<Vec<_>>()
        };

        let mut converted = 0usize;
        let mut denied = 0usize;
        let mut inserted = 0usize;
        let mut quota_hit = false;

        for (signals, probability, outcome, origin) in batch {
            let lead = Lead {
                guid: Uuid::new_v4(),
                tenant_id: tenant_id.to_string(),
                name: Some("Demo Lead".to_string()),
                email: Some("demo@leadrank.local".to_string()),
                phone: None,
                origin: Some(origin.to_string()),
                time_on_site: signals.time_on_site,
                pages_visited: signals.pages_visited,
                clicked_price: signals.clicked_price,
                probability: Some(probability),
                score: Some(score_from_probability(probability)),
                outcome,
                created_at: time::now(),
            };

            let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
            match gate::check_and_increment(&mut tx, tenant_id, plan.lead_limit_month).await {
                Ok(_) => {
                    leads::insert_lead(&mut tx, &lead).await?;
                    tx.commit().await?;
                    inserted += 1;
                    match outcome {
                        Some(Outcome::Converted) => converted += 1,
                        Some(Outcome::NotConverted) => denied += 1,
                        None => {}
                    }
                }
                Err(Error::QuotaExceeded { used, limit }) => {
                    tx.rollback().await?;
                    tracing::warn!(tenant_id, used, limit, "seed batch stopped at quota");
                    quota_hit = true;
                    break;
                }
                Err(other) => return Err(other),
            }
        }

        tracing::info!(tenant_id, inserted, converted, denied, "seeded demo leads");

        Ok(SeedOutcome {
            inserted,
            converted,
            denied,
            pending: inserted - converted - denied,
            quota_hit,
        })
    }
}
