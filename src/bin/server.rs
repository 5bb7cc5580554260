use anyhow::Context;
use clap::Parser;
use route_relay::api::create_api_server;
use route_relay::config::{generate_config_template, Cli, RelayConfig};
use route_relay::metrics;
use route_relay::service::{ExpiryScheduler, RouteService};
use route_relay::store::{PersistentStore, SqliteRouteStore, UnavailableStore};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const STORE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let config = RelayConfig::load(&cli)?;
    config.validate()?;

    init_tracing(config.json_logs);
    tracing::info!("Route relay v{} starting", env!("CARGO_PKG_VERSION"));

    if config.metrics {
        metrics::install_recorder()?;
    }

    let durable = open_durable_store(&config).await;
    let service = Arc::new(RouteService::new(durable, config.service_settings()));

    let scheduler = Arc::new(ExpiryScheduler::new(service.clone(), config.cleanup_interval()));
    let sweeper = scheduler.spawn();

    let app = create_api_server(service.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr()))?;

    tracing::info!(
        addr = %config.bind_addr(),
        cleanup_interval_secs = config.cleanup_interval_secs,
        "Route relay listening"
    );

    let shutdown_service = service.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            let notified = shutdown_service.shutdown_notice();
            tracing::info!(notified, "Shutting down");
        })
        .await
        .context("Server error")?;

    sweeper.abort();
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("route_relay=info,tower_http=info"));

    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Connect to SQLite, falling back to in-memory operation when it stays
/// unreachable. A reachable store gets an initial expired-route purge.
async fn open_durable_store(config: &RelayConfig) -> Arc<dyn PersistentStore> {
    match SqliteRouteStore::connect_with_backoff(&config.database_url, STORE_CONNECT_TIMEOUT).await {
        Ok(store) => {
            match store.purge_expired(config.route_expiry()).await {
                Ok(removed) => tracing::info!(removed, "Route store connected"),
                Err(e) => tracing::warn!(error = %e, "Initial route purge failed"),
            }
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                database_url = %config.database_url,
                "Route store unavailable, running in fallback mode"
            );
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}
