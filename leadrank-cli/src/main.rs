//! leadrank - operator CLI for the LeadRank scoring engine
//!
//! Initializes the database, provisions tenants, scores and labels leads,
//! and drives calibration/recalculation from the command line. Results
//! print as JSON so they can be piped.

use anyhow::Result;
use clap::{Parser, Subcommand};
use leadrank_common::config::Config;
use leadrank_common::db::models::{Outcome, TenantStatus};
use leadrank_common::db::{init_database, leads, tenants, thresholds};
use leadrank_engine::features::LeadSubmission;
use leadrank_engine::{
    BatchRecalculator, DemoSeeder, LeadAnalytics, LeadScorer, ThresholdCalibrator,
};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "leadrank", version, about = "LeadRank lead scoring engine")]
struct Cli {
    /// Database file path (falls back to LEADRANK_DB, then leadrank.toml)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and schema
    Init,
    /// Create a tenant workspace (idempotent)
    CreateTenant {
        tenant_id: String,
        #[arg(long, default_value = "trial")]
        plan: String,
    },
    /// Change a tenant's plan and/or status
    SetPlan {
        tenant_id: String,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        status: Option<TenantStatus>,
    },
    /// Score one lead submission
    Score {
        tenant_id: String,
        #[arg(long, default_value_t = 0)]
        time_on_site: i64,
        #[arg(long, default_value_t = 0)]
        pages_visited: i64,
        #[arg(long)]
        clicked_price: bool,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        origin: Option<String>,
    },
    /// Record a lead's outcome
    Label {
        tenant_id: String,
        lead_id: Uuid,
        #[arg(long, value_parser = ["converted", "not-converted"])]
        outcome: String,
    },
    /// Soft-delete a lead
    Delete { tenant_id: String, lead_id: Uuid },
    /// Recalibrate the tenant's decision threshold
    Recalibrate { tenant_id: String },
    /// Re-score the tenant's pending backlog
    RecalcPending {
        tenant_id: String,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Seed randomized demo leads
    Seed {
        tenant_id: String,
        #[arg(long, default_value_t = 15)]
        n: usize,
    },
    /// Funnel, status and insight stats for a tenant
    Stats { tenant_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting LeadRank CLI v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = Config::resolve(cli.db.as_deref(), None)?;
    let pool = init_database(&config.database_path).await?;

    match cli.command {
        Command::Init => {
            println!("{}", serde_json::json!({ "database": config.database_path, "ok": true }));
        }
        Command::CreateTenant { tenant_id, plan } => {
            let tenant = tenants::ensure_tenant(&pool, &tenant_id, &plan).await?;
            println!("{}", serde_json::to_string_pretty(&tenant)?);
        }
        Command::SetPlan {
            tenant_id,
            plan,
            status,
        } => {
            let tenant = tenants::update_tenant(&pool, &tenant_id, plan.as_deref(), status).await?;
            println!("{}", serde_json::to_string_pretty(&tenant)?);
        }
        Command::Score {
            tenant_id,
            time_on_site,
            pages_visited,
            clicked_price,
            name,
            origin,
        } => {
            let submission = LeadSubmission {
                name,
                origin,
                time_on_site: serde_json::json!(time_on_site),
                pages_visited: serde_json::json!(pages_visited),
                clicked_price: serde_json::json!(clicked_price),
                ..Default::default()
            };
            let scored = LeadScorer::new(pool).score_lead(&tenant_id, &submission).await?;
            println!("{}", serde_json::to_string_pretty(&scored)?);
        }
        Command::Label {
            tenant_id,
            lead_id,
            outcome,
        } => {
            let outcome = if outcome == "converted" {
                Outcome::Converted
            } else {
                Outcome::NotConverted
            };
            let found = leads::set_outcome(&pool, &tenant_id, lead_id, outcome).await?;
            if !found {
                anyhow::bail!("lead not found: {lead_id}");
            }
            println!(
                "{}",
                serde_json::json!({ "lead_id": lead_id, "outcome": outcome })
            );
        }
        Command::Delete { tenant_id, lead_id } => {
            let found = leads::soft_delete_lead(&pool, &tenant_id, lead_id).await?;
            if !found {
                anyhow::bail!("lead not found: {lead_id}");
            }
            println!("{}", serde_json::json!({ "lead_id": lead_id, "deleted": true }));
        }
        Command::Recalibrate { tenant_id } => {
            let outcome = ThresholdCalibrator::new(pool.clone())
                .recalibrate(&tenant_id)
                .await?;
            let threshold = thresholds::get_threshold(&pool, &tenant_id).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            info!(tenant_id = %tenant_id, threshold, "current decision threshold");
        }
        Command::RecalcPending { tenant_id, limit } => {
            let outcome = BatchRecalculator::new(pool)
                .recalculate_pending(&tenant_id, limit)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Seed { tenant_id, n } => {
            let outcome = DemoSeeder::new(pool).seed_demo_leads(&tenant_id, n).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Stats { tenant_id } => {
            let analytics = LeadAnalytics::new(pool.clone());
            let funnel = analytics.funnel(&tenant_id).await?;
            let status = analytics.status_counts(&tenant_id).await?;
            let insights = analytics.insights(&tenant_id, 30).await?;
            let origins = analytics.top_origins(&tenant_id, 30, 6).await?;
            let recent = leads::fetch_recent(&pool, &tenant_id, 10, 0).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "funnel": funnel,
                    "status": status,
                    "insights": insights,
                    "top_origins": origins,
                    "recent": recent,
                }))?
            );
        }
    }

    Ok(())
}
