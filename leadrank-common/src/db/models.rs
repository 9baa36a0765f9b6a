//! Database record types
//!
//! Rows are carried as explicit typed records; anything loosely typed is
//! coerced at the submission boundary, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Operator-recorded outcome of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Converted,
    NotConverted,
}

impl Outcome {
    pub fn as_i64(self) -> i64 {
        match self {
            Outcome::Converted => 1,
            Outcome::NotConverted => 0,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value == 1 {
            Outcome::Converted
        } else {
            Outcome::NotConverted
        }
    }
}

/// A scored lead row.
///
/// `probability`/`score` are optional because externally imported rows may
/// arrive unscored; leads created through the scorer always carry both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub guid: Uuid,
    pub tenant_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub origin: Option<String>,
    pub time_on_site: i64,
    pub pages_visited: i64,
    pub clicked_price: bool,
    pub probability: Option<f64>,
    pub score: Option<i64>,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
}

/// Slim row used to build training sets (outcome known).
#[derive(Debug, Clone)]
pub struct LabeledLead {
    pub guid: Uuid,
    pub time_on_site: i64,
    pub pages_visited: i64,
    pub clicked_price: bool,
    pub probability: Option<f64>,
    pub outcome: Outcome,
}

/// Slim row for pending (unlabeled) leads awaiting recalculation.
#[derive(Debug, Clone)]
pub struct PendingLead {
    pub guid: Uuid,
    pub time_on_site: i64,
    pub pages_visited: i64,
    pub clicked_price: bool,
}

/// Tenant workspace state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: String,
    pub plan: String,
    pub status: TenantStatus,
    pub usage_month: String,
    pub leads_used_month: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(TenantStatus::Active),
            "inactive" => Ok(TenantStatus::Inactive),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown tenant status: {other}"
            ))),
        }
    }
}
