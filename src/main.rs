use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema_core::adapters::{PostgresBookingRepository, PostgresMovieCatalog};
use cinema_core::cli::{self, BookingCommands, Cli, Commands, DbCommands};
use cinema_core::config::{cors::create_cors_layer, urls::PublicUrls, Config, LogFormat};
use cinema_core::gateway::WalletGatewayClient;
use cinema_core::middleware::request_logger::RequestLogConfig;
use cinema_core::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Bookings(BookingCommands::ExpireStale { older_than_minutes }) => {
            cli::handle_bookings_expire_stale(&config, older_than_minutes).await
        }
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let urls = PublicUrls::new(&config.app_base_url)
        .map_err(|e| anyhow::anyhow!("APP_BASE_URL is not a valid URL: {}", e))?;

    let gateway = WalletGatewayClient::new(config.gateway.clone())?;
    tracing::info!(
        base_url = %config.gateway.base_url,
        circuit = gateway.circuit_state(),
        "Wallet gateway client initialized"
    );

    let state = AppState {
        bookings: Arc::new(PostgresBookingRepository::new(pool.clone())),
        catalog: Arc::new(PostgresMovieCatalog::new(pool)),
        gateway: Arc::new(gateway),
        urls,
        pending_grace: config.pending_grace(),
        request_log: RequestLogConfig {
            log_body: config.log_request_body,
        },
    };

    let app = create_app(state).layer(create_cors_layer(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
