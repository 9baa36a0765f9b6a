//! Plan catalog
//!
//! Static map of plan name to monthly lead allowance. Billing prices and
//! payment-provider wiring live outside this workspace; the engine only
//! needs the quota each plan grants.

/// A subscription plan and its monthly lead allowance.
///
/// A `lead_limit_month` of 0 means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub name: &'static str,
    pub lead_limit_month: i64,
}

/// Plan used when a tenant carries an unknown or missing plan name.
pub const DEFAULT_PLAN: Plan = Plan {
    name: "trial",
    lead_limit_month: 100,
};

/// All known plans.
pub const PLAN_CATALOG: &[Plan] = &[
    Plan { name: "demo", lead_limit_month: 30 },
    DEFAULT_PLAN,
    Plan { name: "starter", lead_limit_month: 1000 },
    Plan { name: "pro", lead_limit_month: 5000 },
    Plan { name: "enterprise", lead_limit_month: 20000 },
    Plan { name: "internal", lead_limit_month: 0 },
];

/// Look up a plan by name (case-insensitive); unknown names fall back to
/// the trial plan, matching how tenants are provisioned.
pub fn plan_by_name(name: &str) -> Plan {
    let normalized = name.trim().to_ascii_lowercase();
    PLAN_CATALOG
        .iter()
        .copied()
        .find(|p| p.name == normalized)
        .unwrap_or(DEFAULT_PLAN)
}

/// Whether `name` is a plan this deployment knows about.
pub fn is_known_plan(name: &str) -> bool {
    let normalized = name.trim().to_ascii_lowercase();
    PLAN_CATALOG.iter().any(|p| p.name == normalized)
}
