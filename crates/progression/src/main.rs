//! `progression` binary: schema setup and the scheduled credit jobs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::info;

use progression::services::{AppContext, MonthlyTopUp, PurchaseService};
use progression::{Config, Database, DatabaseConfig, PaymentConfig, Scheduler, database};

#[derive(Parser, Debug)]
#[clap(name = "progression")]
#[clap(about = "Game progression core: schema management and scheduled credit jobs")]
struct Args {
    /// Database connection URL (MySQL/TiDB or SQLite)
    #[clap(long, env = "DATABASE_URL")]
    database_url: String,

    /// Public site URL, used to recognise absolute upload URLs
    #[clap(long, env = "SITE_URL", default_value = "")]
    site_url: String,

    /// Root of the date-sharded upload directory
    #[clap(long, env = "UPLOADS_DIR", default_value = "uploads")]
    uploads_dir: String,

    /// Payment provider secret key; purchases are disabled without it
    #[clap(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    stripe_secret_key: Option<String>,

    /// Webhook signing secret
    #[clap(long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
    stripe_webhook_secret: Option<String>,

    #[clap(long, env = "CREDIT_PRICE_CENTS", default_value_t = 35)]
    credit_price_cents: i32,

    #[clap(long, env = "REGULAR_USER_FREE_CREDITS", default_value_t = 10)]
    regular_free_credits: i32,

    #[clap(long, env = "EDUCATOR_FREE_CREDITS", default_value_t = 50)]
    educator_free_credits: i32,

    #[clap(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 50)]
    max_connections: u32,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create any missing tables and indexes
    InitSchema,
    /// Run the monthly free-credit top-up once
    Topup,
    /// Delete stale pending and failed purchases once
    CleanupPurchases,
    /// Run the scheduled jobs until interrupted
    Run,
}

impl Args {
    fn config(&self) -> Config {
        let payments = match (&self.stripe_secret_key, &self.stripe_webhook_secret) {
            (Some(secret_key), Some(webhook_secret))
                if !secret_key.is_empty() && !webhook_secret.is_empty() =>
            {
                Some(PaymentConfig::new(secret_key, webhook_secret))
            }
            _ => None,
        };
        Config {
            database: DatabaseConfig {
                url: self.database_url.clone(),
                max_connections: self.max_connections,
                ..Default::default()
            },
            site_url: self.site_url.clone(),
            uploads_dir: self.uploads_dir.clone(),
            credit_price_cents: self.credit_price_cents,
            regular_free_credits: self.regular_free_credits,
            educator_free_credits: self.educator_free_credits,
            payments,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    let _guard = monitoring::init_logging().context("Failed to initialise logging")?;

    let config = args.config();
    if !config.payments_enabled() {
        info!("Payment keys not configured, credit purchases are disabled");
    }

    let db = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let ctx = AppContext::new(db.clone(), config);

    match args.command {
        Command::InitSchema => {
            database::create_schema(db.connection())
                .await
                .context("Failed to create schema")?;
            info!("Schema is up to date");
        }
        Command::Topup => {
            let report = MonthlyTopUp::new(ctx)
                .top_up_credits()
                .await
                .context("Monthly top-up failed")?;
            info!(
                regular_users = report.regular_users,
                educators = report.educators,
                skipped = report.skipped.len(),
                failed_levels = report.failed_levels.len(),
                "Monthly top-up complete"
            );
        }
        Command::CleanupPurchases => {
            let deleted = PurchaseService::new(ctx)
                .context("Failed to create purchase service")?
                .cleanup_stale_purchases()
                .await
                .context("Stale purchase cleanup failed")?;
            info!(deleted, "Stale purchase cleanup complete");
        }
        Command::Run => {
            let mut scheduler = Scheduler::new(ctx).context("Failed to create scheduler")?;
            scheduler.start();
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal");
            scheduler.shutdown().await;
        }
    }

    Ok(())
}
