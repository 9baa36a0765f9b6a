//! Read-side lead analytics
//!
//! Temperature bands, funnel counts, probability-band conversion rates and
//! daily series. Everything is scoped to one tenant and filters
//! soft-deleted rows.

use chrono::Duration;
use leadrank_common::db::thresholds;
use leadrank_common::{time, Result};
use serde::Serialize;
use sqlx::{Pool, Row, Sqlite};

/// Probability above which a lead counts as hot (score equivalent: 70).
pub const HOT_PROBABILITY: f64 = 0.70;
/// Probability above which a lead counts as warm (score equivalent: 35).
pub const WARM_PROBABILITY: f64 = 0.35;

/// Temperature band of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
    Unknown,
}

/// Classify a lead by stored probability, falling back to the integer
/// score when probability is missing.
pub fn lead_temperature(probability: Option<f64>, score: Option<i64>) -> Temperature {
    if probability.is_none() && score.is_none() {
        return Temperature::Unknown;
    }
    if probability.is_some_and(|p| p >= HOT_PROBABILITY) || score.is_some_and(|s| s >= 70) {
        return Temperature::Hot;
    }
    if probability.is_some_and(|p| p >= WARM_PROBABILITY) || score.is_some_and(|s| s >= 35) {
        return Temperature::Warm;
    }
    Temperature::Cold
}

/// Hot/warm/cold totals over a tenant's active leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FunnelCounts {
    pub hot: i64,
    pub warm: i64,
    pub cold: i64,
}

/// Converted/denied/pending totals over a tenant's active leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub converted: i64,
    pub denied: i64,
    pub pending: i64,
}

/// Lead volume per origin tag.
#[derive(Debug, Clone, Serialize)]
pub struct OriginCount {
    pub origin: String,
    pub total: i64,
}

/// Conversion rate inside one probability band.
#[derive(Debug, Clone, Serialize)]
pub struct ProbabilityBand {
    pub band: &'static str,
    pub labeled: i64,
    pub converted: i64,
    pub conversion_rate: f64,
}

/// One day of lead activity.
#[derive(Debug, Clone, Serialize)]
pub struct DailyPoint {
    pub day: String,
    pub total: i64,
    pub converted: i64,
    pub denied: i64,
    pub pending: i64,
}

/// Windowed insight report for a tenant.
#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub threshold: f64,
    pub window_days: i64,
    pub window_total: i64,
    pub labeled: i64,
    pub converted: i64,
    pub denied: i64,
    pub conversion_rate: f64,
    pub bands: Vec<ProbabilityBand>,
    pub series: Vec<DailyPoint>,
}

const BAND_DEFS: &[(&str, f64, f64)] = &[
    ("0-0.2", 0.0, 0.2),
    ("0.2-0.4", 0.2, 0.4),
    ("0.4-0.6", 0.4, 0.6),
    ("0.6-0.8", 0.6, 0.8),
    ("0.8-1.0", 0.8, 1.01),
];

/// Lead analytics service
pub struct LeadAnalytics {
    db: Pool<Sqlite>,
}

impl LeadAnalytics {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// Hot/warm/cold funnel over all active leads.
    pub async fn funnel(&self, tenant_id: &str) -> Result<FunnelCounts> {
        let row = sqlx::query(
            r#"
            SELECT
              SUM(CASE WHEN (probability IS NOT NULL AND probability >= 0.70)
                         OR (score IS NOT NULL AND score >= 70)
                  THEN 1 ELSE 0 END) AS hot,
              SUM(CASE WHEN (probability IS NOT NULL AND probability >= 0.35 AND probability < 0.70)
                         OR (score IS NOT NULL AND score >= 35 AND score < 70)
                  THEN 1 ELSE 0 END) AS warm,
              SUM(CASE WHEN (probability IS NOT NULL AND probability < 0.35)
                         OR (score IS NOT NULL AND score < 35)
                  THEN 1 ELSE 0 END) AS cold
            FROM leads
            WHERE tenant_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.db)
        .await?;

        Ok(FunnelCounts {
            hot: row.get::<Option<i64>, _>("hot").unwrap_or(0),
            warm: row.get::<Option<i64>, _>("warm").unwrap_or(0),
            cold: row.get::<Option<i64>, _>("cold").unwrap_or(0),
        })
    }

    /// Converted/denied/pending counts over all active leads.
    pub async fn status_counts(&self, tenant_id: &str) -> Result<StatusCounts> {
        let row = sqlx::query(
            r#"
            SELECT
              SUM(CASE WHEN outcome = 1 THEN 1 ELSE 0 END) AS converted,
              SUM(CASE WHEN outcome = 0 THEN 1 ELSE 0 END) AS denied,
              SUM(CASE WHEN outcome IS NULL THEN 1 ELSE 0 END) AS pending
            FROM leads
            WHERE tenant_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.db)
        .await?;

        Ok(StatusCounts {
            converted: row.get::<Option<i64>, _>("converted").unwrap_or(0),
            denied: row.get::<Option<i64>, _>("denied").unwrap_or(0),
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
        })
    }

    /// Most frequent lead origins over the trailing window.
    pub async fn top_origins(
        &self,
        tenant_id: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<OriginCount>> {
        let since = time::now() - Duration::days(days.max(1));
        let rows = sqlx::query(
            r#"
            SELECT COALESCE(NULLIF(TRIM(origin), ''), 'unknown') AS origin,
                   COUNT(*) AS total
            FROM leads
            WHERE tenant_id = ? AND deleted_at IS NULL AND created_at >= ?
            GROUP BY 1
            ORDER BY total DESC, origin ASC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| OriginCount {
                origin: row.get("origin"),
                total: row.get("total"),
            })
            .collect())
    }

    /// Probability-band conversion rates plus a per-day series over the
    /// trailing window. `window_days` is clamped to [7, 90].
    pub async fn insights(&self, tenant_id: &str, window_days: i64) -> Result<Insights> {
        let window_days = window_days.clamp(7, 90);
        let since = time::now() - Duration::days(window_days);
        let threshold = thresholds::get_threshold(&self.db, tenant_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT probability, outcome, created_at
            FROM leads
            WHERE tenant_id = ? AND deleted_at IS NULL AND created_at >= ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let window: Vec<(Option<f64>, Option<i64>, chrono::DateTime<chrono::Utc>)> = rows
            .iter()
            .map(|row| {
                (
                    row.get("probability"),
                    row.get("outcome"),
                    row.get("created_at"),
                )
            })
            .collect();

        let bands = BAND_DEFS
            .iter()
            .map(|&(band, lo, hi)| {
                let mut labeled = 0i64;
                let mut converted = 0i64;
                for (probability, outcome, _) in &window {
                    let Some(p) = probability else { continue };
                    if *p < lo || *p >= hi {
                        continue;
                    }
                    if let Some(outcome) = outcome {
                        labeled += 1;
                        if *outcome == 1 {
                            converted += 1;
                        }
                    }
                }
                let conversion_rate = if labeled > 0 {
                    converted as f64 / labeled as f64
                } else {
                    0.0
                };
                ProbabilityBand {
                    band,
                    labeled,
                    converted,
                    conversion_rate,
                }
            })
            .collect();

        // Rows arrive ordered by created_at, so days are contiguous runs.
        let mut series: Vec<DailyPoint> = Vec::new();
        for (_, outcome, created_at) in &window {
            let day = created_at.date_naive().to_string();
            match series.last_mut() {
                Some(point) if point.day == day => {
                    bump_daily_point(point, *outcome);
                }
                _ => {
                    let mut point = DailyPoint {
                        day,
                        total: 0,
                        converted: 0,
                        denied: 0,
                        pending: 0,
                    };
                    bump_daily_point(&mut point, *outcome);
                    series.push(point);
                }
            }
        }

        let labeled = window.iter().filter(|(_, o, _)| o.is_some()).count() as i64;
        let converted = window.iter().filter(|(_, o, _)| *o == Some(1)).count() as i64;
        let denied = window.iter().filter(|(_, o, _)| *o == Some(0)).count() as i64;
        let conversion_rate = if labeled > 0 {
            converted as f64 / labeled as f64
        } else {
            0.0
        };

        Ok(Insights {
            threshold,
            window_days,
            window_total: window.len() as i64,
            labeled,
            converted,
            denied,
            conversion_rate,
            bands,
            series,
        })
    }
}

fn bump_daily_point(point: &mut DailyPoint, outcome: Option<i64>) {
    point.total += 1;
    match outcome {
        None => point.pending += 1,
        Some(1) => point.converted += 1,
        Some(_) => point.denied += 1,
    }
}
