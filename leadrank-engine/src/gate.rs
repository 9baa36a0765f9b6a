//! Atomic monthly usage gate
//!
//! Owns the `(usage_month, leads_used_month)` pair on the tenant row.
//! Runs inside the caller's write transaction so the counter increment and
//! the lead insert commit or roll back together. Callers must open that
//! transaction with `BEGIN IMMEDIATE` (`Pool::begin_with`): the write lock
//! is then taken up front, concurrent gates serialize instead of tripping
//! over snapshot upgrades, and the connection's busy timeout bounds the
//! wait and surfaces lock contention as a retryable error.

use leadrank_common::{time, Error, Result};
use sqlx::Sqlite;

/// Counter state after a successful gate pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageStamp {
    pub usage_month: String,
    pub used: i64,
}

/// Check the tenant's monthly quota and claim one lead slot.
///
/// Steps, all inside `tx`:
/// 1. Ensure the counter row exists (write-first lock acquisition).
/// 2. Lazy month rollover: a stale `usage_month` resets the count to zero.
///    There is no scheduled reset job.
/// 3. `plan_limit > 0` and `count >= plan_limit` aborts with
///    [`Error::QuotaExceeded`]; the caller must roll the transaction back.
///    A limit of 0 means unlimited.
/// 4. Increment the count. The caller commits it alongside the lead row.
pub async fn check_and_increment(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    tenant_id: &str,
    plan_limit: i64,
) -> Result<UsageStamp> {
    let now = time::now();
    let month = time::month_key(now);

    sqlx::query(
        r#"
        INSERT INTO tenants (tenant_id, usage_month, leads_used_month, created_at, updated_at)
        VALUES (?, ?, 0, ?, ?)
        ON CONFLICT(tenant_id) DO NOTHING
        "#,
    )
    .bind(tenant_id)
    .bind(&month)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let (stored_month, mut used): (String, i64) =
        sqlx::query_as("SELECT usage_month, leads_used_month FROM tenants WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&mut **tx)
            .await?;

    if stored_month != month {
        tracing::info!(
            tenant_id,
            from = %stored_month,
            to = %month,
            "monthly usage rollover"
        );
        sqlx::query(
            "UPDATE tenants SET usage_month = ?, leads_used_month = 0, updated_at = ? WHERE tenant_id = ?",
        )
        .bind(&month)
        .bind(now)
        .bind(tenant_id)
        .execute(&mut **tx)
        .await?;
        used = 0;
    }

    if plan_limit > 0 && used >= plan_limit {
        return Err(Error::QuotaExceeded {
            used,
            limit: plan_limit,
        });
    }

    sqlx::query(
        "UPDATE tenants SET leads_used_month = leads_used_month + 1, updated_at = ? WHERE tenant_id = ?",
    )
    .bind(now)
    .bind(tenant_id)
    .execute(&mut **tx)
    .await?;

    Ok(UsageStamp {
        usage_month: month,
        used: used + 1,
    })
}
