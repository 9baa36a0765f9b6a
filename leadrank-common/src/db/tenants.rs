//! Tenant table queries
//!
//! The `(usage_month, leads_used_month)` counter pair is owned by the usage
//! gate in the engine crate; nothing here mutates it beyond creating the
//! row with a zero count.

use crate::db::models::{Tenant, TenantStatus};
use crate::{Error, Result};
use sqlx::{Pool, Row, Sqlite};

/// Fetch a tenant row, creating it with the given plan if absent.
pub async fn ensure_tenant(db: &Pool<Sqlite>, tenant_id: &str, plan: &str) -> Result<Tenant> {
    if tenant_id.trim().is_empty() {
        return Err(Error::InvalidInput("tenant_id must not be empty".into()));
    }

    let plan = crate::plans::plan_by_name(plan);
    let now = crate::time::now();

    sqlx::query(
        r#"
        INSERT INTO tenants (tenant_id, plan, status, usage_month, leads_used_month, created_at, updated_at)
        VALUES (?, ?, 'active', ?, 0, ?, ?)
        ON CONFLICT(tenant_id) DO NOTHING
        "#,
    )
    .bind(tenant_id)
    .bind(plan.name)
    .bind(crate::time::month_key(now))
    .bind(now)
    .bind(now)
    .execute(db)
    .await?;

    get_tenant(db, tenant_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("tenant row vanished after insert: {tenant_id}")))
}

/// Fetch a tenant row if it exists.
pub async fn get_tenant(db: &Pool<Sqlite>, tenant_id: &str) -> Result<Option<Tenant>> {
    let row = sqlx::query(
        r#"
        SELECT tenant_id, plan, status, usage_month, leads_used_month
        FROM tenants
        WHERE tenant_id = ?
        "#,
    )
    .bind(tenant_id)
    .fetch_optional(db)
    .await?;

    row.map(|row| map_tenant(&row)).transpose()
}

/// Update a tenant's plan and/or status. Unset fields are left untouched.
pub async fn update_tenant(
    db: &Pool<Sqlite>,
    tenant_id: &str,
    plan: Option<&str>,
    status: Option<TenantStatus>,
) -> Result<Tenant> {
    if let Some(plan) = plan {
        if !crate::plans::is_known_plan(plan) {
            return Err(Error::InvalidInput(format!("unknown plan: {plan}")));
        }
        sqlx::query("UPDATE tenants SET plan = ?, updated_at = ? WHERE tenant_id = ?")
            .bind(crate::plans::plan_by_name(plan).name)
            .bind(crate::time::now())
            .bind(tenant_id)
            .execute(db)
            .await?;
    }

    if let Some(status) = status {
        sqlx::query("UPDATE tenants SET status = ?, updated_at = ? WHERE tenant_id = ?")
            .bind(status.as_str())
            .bind(crate::time::now())
            .bind(tenant_id)
            .execute(db)
            .await?;
    }

    get_tenant(db, tenant_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("tenant: {tenant_id}")))
}

fn map_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant> {
    let status: String = row.get("status");
    Ok(Tenant {
        tenant_id: row.get("tenant_id"),
        plan: row.get("plan"),
        status: status.parse()?,
        usage_month: row.get("usage_month"),
        leads_used_month: row.get("leads_used_month"),
    })
}
