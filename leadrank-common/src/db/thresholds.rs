//! Per-tenant decision threshold storage
//!
//! One row per tenant, overwritten by the calibrator. Reads fall back to
//! the system default when no row exists.

use crate::Result;
use sqlx::{Pool, Sqlite};

/// Threshold used when a tenant has never been calibrated.
pub const DEFAULT_THRESHOLD: f64 = 0.35;

/// Get a tenant's decision threshold, defaulting when absent.
pub async fn get_threshold(db: &Pool<Sqlite>, tenant_id: &str) -> Result<f64> {
    let threshold: Option<f64> =
        sqlx::query_scalar("SELECT threshold FROM thresholds WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(db)
            .await?;

    Ok(threshold.unwrap_or(DEFAULT_THRESHOLD))
}

/// Persist a tenant's decision threshold, overwriting any prior value.
pub async fn set_threshold(db: &Pool<Sqlite>, tenant_id: &str, threshold: f64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO thresholds (tenant_id, threshold, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(tenant_id)
        DO UPDATE SET threshold = excluded.threshold, updated_at = excluded.updated_at
        "#,
    )
    .bind(tenant_id)
    .bind(threshold)
    .bind(crate::time::now())
    .execute(db)
    .await?;

    Ok(())
}
