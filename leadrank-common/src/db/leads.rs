//! Lead table queries
//!
//! All reads filter soft-deleted rows (`deleted_at IS NULL`). "Most recent"
//! queries order by `created_at` with the rowid as a tiebreaker so capped
//! result sets are stable across calls, which batch recalculation relies on.

use crate::db::models::{Lead, LabeledLead, Outcome, PendingLead};
use crate::{Error, Result};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// Insert a lead inside an open transaction.
///
/// Paired with the usage gate so the lead row and the usage counter commit
/// or roll back together.
pub async fn insert_lead(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    lead: &Lead,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO leads (
            guid, tenant_id, name, email, phone, origin,
            time_on_site, pages_visited, clicked_price,
            probability, score, outcome,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(lead.guid.to_string())
    .bind(&lead.tenant_id)
    .bind(lead.name.as_deref())
    .bind(lead.email.as_deref())
    .bind(lead.phone.as_deref())
    .bind(lead.origin.as_deref())
    .bind(lead.time_on_site)
    .bind(lead.pages_visited)
    .bind(lead.clicked_price as i64)
    .bind(lead.probability)
    .bind(lead.score)
    .bind(lead.outcome.map(Outcome::as_i64))
    .bind(lead.created_at)
    .bind(lead.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Most-recent labeled leads for a tenant.
///
/// `limit` of `None` fetches the full labeled set (threshold calibration
/// wants ground truth over everything).
pub async fn fetch_labeled(
    db: &Pool<Sqlite>,
    tenant_id: &str,
    limit: Option<i64>,
) -> Result<Vec<LabeledLead>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, time_on_site, pages_visited, clicked_price, probability, outcome
        FROM leads
        WHERE tenant_id = ? AND outcome IS NOT NULL AND deleted_at IS NULL
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(tenant_id)
    .bind(limit.unwrap_or(-1))
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| -> Result<LabeledLead> {
            Ok(LabeledLead {
                guid: parse_guid(row.get("guid"))?,
                time_on_site: row.get("time_on_site"),
                pages_visited: row.get("pages_visited"),
                clicked_price: row.get::<i64, _>("clicked_price") != 0,
                probability: row.get("probability"),
                outcome: Outcome::from_i64(row.get("outcome")),
            })
        })
        .collect()
}

/// Most-recent pending (unlabeled) leads for a tenant.
pub async fn fetch_pending(
    db: &Pool<Sqlite>,
    tenant_id: &str,
    limit: i64,
) -> Result<Vec<PendingLead>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, time_on_site, pages_visited, clicked_price
        FROM leads
        WHERE tenant_id = ? AND outcome IS NULL AND deleted_at IS NULL
        ORDER BY created_at DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(tenant_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| -> Result<PendingLead> {
            Ok(PendingLead {
                guid: parse_guid(row.get("guid"))?,
                time_on_site: row.get("time_on_site"),
                pages_visited: row.get("pages_visited"),
                clicked_price: row.get::<i64, _>("clicked_price") != 0,
            })
        })
        .collect()
}

/// Overwrite stored probabilities (and the derived 0-100 score) for a set
/// of leads. Runs in a single transaction; returns how many rows changed.
pub async fn update_probabilities(
    db: &Pool<Sqlite>,
    tenant_id: &str,
    updates: &[(Uuid, f64)],
) -> Result<u64> {
    if updates.is_empty() {
        return Ok(0);
    }

    let now = crate::time::now();
    let mut tx = db.begin().await?;
    let mut changed = 0u64;

    for (guid, probability) in updates {
        let score = (probability * 100.0).round() as i64;
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET probability = ?, score = ?, updated_at = ?
            WHERE tenant_id = ? AND guid = ? AND deleted_at IS NULL
            "#,
        )
        .bind(probability)
        .bind(score)
        .bind(now)
        .bind(tenant_id)
        .bind(guid.to_string())
        .execute(&mut *tx)
        .await?;

        changed += result.rows_affected();
    }

    tx.commit().await?;
    Ok(changed)
}

/// Record the operator-supplied outcome for a lead.
///
/// Idempotent: re-setting the same outcome is allowed and reports success.
/// Returns false when the lead does not exist (or is deleted).
pub async fn set_outcome(
    db: &Pool<Sqlite>,
    tenant_id: &str,
    lead_id: Uuid,
    outcome: Outcome,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET outcome = ?, updated_at = ?
        WHERE tenant_id = ? AND guid = ? AND deleted_at IS NULL
        "#,
    )
    .bind(outcome.as_i64())
    .bind(crate::time::now())
    .bind(tenant_id)
    .bind(lead_id.to_string())
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-delete a lead. Deleted leads disappear from every engine query.
pub async fn soft_delete_lead(db: &Pool<Sqlite>, tenant_id: &str, lead_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leads
        SET deleted_at = ?, updated_at = ?
        WHERE tenant_id = ? AND guid = ? AND deleted_at IS NULL
        "#,
    )
    .bind(crate::time::now())
    .bind(crate::time::now())
    .bind(tenant_id)
    .bind(lead_id.to_string())
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetch one lead by id.
pub async fn get_lead(db: &Pool<Sqlite>, tenant_id: &str, lead_id: Uuid) -> Result<Option<Lead>> {
    let row = sqlx::query(
        r#"
        SELECT guid, tenant_id, name, email, phone, origin,
               time_on_site, pages_visited, clicked_price,
               probability, score, outcome, created_at
        FROM leads
        WHERE tenant_id = ? AND guid = ? AND deleted_at IS NULL
        "#,
    )
    .bind(tenant_id)
    .bind(lead_id.to_string())
    .fetch_optional(db)
    .await?;

    row.map(|row| map_lead(&row)).transpose()
}

/// Recent leads page for a tenant, newest first.
pub async fn fetch_recent(
    db: &Pool<Sqlite>,
    tenant_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Lead>> {
    let rows = sqlx::query(
        r#"
        SELECT guid, tenant_id, name, email, phone, origin,
               time_on_site, pages_visited, clicked_price,
               probability, score, outcome, created_at
        FROM leads
        WHERE tenant_id = ? AND deleted_at IS NULL
        ORDER BY created_at DESC, rowid DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(tenant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    rows.iter().map(map_lead).collect()
}

/// Count active leads for a tenant.
pub async fn count_leads(db: &Pool<Sqlite>, tenant_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM leads WHERE tenant_id = ? AND deleted_at IS NULL",
    )
    .bind(tenant_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

fn map_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead> {
    Ok(Lead {
        guid: parse_guid(row.get("guid"))?,
        tenant_id: row.get("tenant_id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        origin: row.get("origin"),
        time_on_site: row.get("time_on_site"),
        pages_visited: row.get("pages_visited"),
        clicked_price: row.get::<i64, _>("clicked_price") != 0,
        probability: row.get("probability"),
        score: row.get("score"),
        outcome: row
            .get::<Option<i64>, _>("outcome")
            .map(Outcome::from_i64),
        created_at: row.get("created_at"),
    })
}

fn parse_guid(raw: String) -> Result<Uuid> {
    Uuid::parse_str(&raw).map_err(|e| Error::Internal(format!("Invalid lead GUID: {e}")))
}
