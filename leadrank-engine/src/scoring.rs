//! Lead scoring pipeline
//!
//! Extract signals, pick a scoring strategy (trained classifier when the
//! tenant is eligible, heuristic otherwise), then persist lead and usage
//! counter in one transaction. Training happens before the transaction
//! opens so the write lock is never held across the CPU-bound fit.

use crate::features::{clean_identity, LeadSignals, LeadSubmission};
use crate::gate;
use crate::heuristic::score_from_probability;
use crate::trainer::{ScoringStrategy, TRAIN_ROW_CAP};
use chrono::{DateTime, Utc};
use leadrank_common::db::models::{Lead, TenantStatus};
use leadrank_common::db::{leads, tenants};
use leadrank_common::{plans, time, Error, Result};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

/// Result of scoring one submission.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredLead {
    pub lead_id: Uuid,
    pub probability: f64,
    pub score: i64,
    /// True when a trained classifier produced the probability.
    pub used_model: bool,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

/// Lead scoring service
pub struct LeadScorer {
    db: Pool<Sqlite>,
}

impl LeadScorer {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Score a submission and persist it as a pending lead.
    ///
    /// The usage gate and the lead insert share one transaction: a lead is
    /// never persisted without being counted, and the counter is never
    /// bumped for a lead that failed to persist.
    pub async fn score_lead(
        &self,
        tenant_id: &str,
        submission: &LeadSubmission,
    ) -> Result<ScoredLead> {
        let tenant = tenants::ensure_tenant(&self.db, tenant_id, plans::DEFAULT_PLAN.name).await?;
        if tenant.status == TenantStatus::Inactive {
            return Err(Error::TenantInactive(tenant_id.to_string()));
        }
        let plan = plans::plan_by_name(&tenant.plan);

        let signals = LeadSignals::from_submission(submission);

        let labeled = leads::fetch_labeled(&self.db, tenant_id, Some(TRAIN_ROW_CAP as i64)).await?;
        let (strategy, gate_outcome) = ScoringStrategy::select(&labeled);
        if let Some(cannot_train) = &gate_outcome {
            tracing::debug!(
                tenant_id,
                reason = %cannot_train.reason,
                "using heuristic scorer"
            );
        }

        let probability = strategy.probability(signals);
        let score = score_from_probability(probability);
        let now = time::now();

        let lead = Lead {
            guid: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            name: clean_identity(&submission.name),
            email: clean_identity(&submission.email),
            phone: clean_identity(&submission.phone),
            origin: clean_identity(&submission.origin),
            time_on_site: signals.time_on_site,
            pages_visited: signals.pages_visited,
            clicked_price: signals.clicked_price,
            probability: Some(probability),
            score: Some(score),
            outcome: None,
            created_at: now,
        };

        // BEGIN IMMEDIATE takes the write lock before any read, so the
        // quota check-then-increment is serialized across requests.
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let stamp = gate::check_and_increment(&mut tx, tenant_id, plan.lead_limit_month).await?;
        leads::insert_lead(&mut tx, &lead).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id,
            lead_id = %lead.guid,
            probability,
            score,
            used_model = strategy.used_model(),
            used_this_month = stamp.used,
            "scored lead"
        );

        Ok(ScoredLead {
            lead_id: lead.guid,
            probability,
            score,
            used_model: strategy.used_model(),
            plan: plan.name.to_string(),
            created_at: now,
        })
    }
}
