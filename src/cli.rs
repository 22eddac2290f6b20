use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::adapters::PostgresBookingRepository;
use crate::config::Config;
use crate::ports::BookingRepository;

#[derive(Parser)]
#[command(name = "cinema-core")]
#[command(about = "Cinema Core - ticket booking and wallet payment reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Booking maintenance commands
    #[command(subcommand)]
    Bookings(BookingCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum BookingCommands {
    /// Mark bookings still awaiting payment as failed
    ExpireStale {
        /// Age in minutes after which an initiated booking is abandoned
        /// (defaults to PENDING_GRACE_MINUTES)
        #[arg(long, value_name = "MINUTES")]
        older_than_minutes: Option<i64>,
    },
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_bookings_expire_stale(
    config: &Config,
    older_than_minutes: Option<i64>,
) -> anyhow::Result<()> {
    let minutes = older_than_minutes.unwrap_or(config.pending_grace_minutes);
    if minutes <= 0 {
        anyhow::bail!("--older-than-minutes must be positive");
    }

    let pool = crate::db::create_pool(config).await?;
    let repository = PostgresBookingRepository::new(pool);
    let cutoff = Utc::now() - chrono::Duration::minutes(minutes);

    let expired = repository.expire_initiated_before(cutoff).await?;

    tracing::info!(expired, cutoff = %cutoff, "Expired stale bookings");
    println!("✓ Marked {} stale booking(s) as failed", expired);
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Public Base URL: {}", config.app_base_url);
    println!("  Wallet Base URL: {}", config.gateway.base_url);
    println!("  Wallet Timeout: {}s", config.gateway.timeout.as_secs());
    println!("  Pending Grace: {} min", config.pending_grace_minutes);

    let pool = crate::db::create_pool(config).await?;
    let report = crate::startup::validate_environment(config, &pool).await?;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}

fn mask_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                raw.to_string()
            }
        }
        _ => raw.to_string(),
    }
}
