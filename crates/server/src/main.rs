//! Bus station entry point.

use std::sync::Arc;

use booking::BookingService;
use inventory_store::{InMemoryRouteStore, PostgresRouteStore, RouteStore};
use metrics_exporter_prometheus::PrometheusHandle;
use server::{Config, Orchestrator, ServiceError};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Runs the service until a signal arrives or a listener dies.
async fn run<S: RouteStore + 'static>(
    store: S,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Result<(), ServiceError> {
    let booking = Arc::new(BookingService::new(store));
    let mut orchestrator = Orchestrator::new(booking, metrics_handle, config);
    orchestrator.start().await?;

    let token = orchestrator.shutdown_token();
    tokio::select! {
        () = shutdown_signal() => {}
        () = token.cancelled() => {
            tracing::error!("a listener exited unexpectedly, shutting down");
        }
    }

    orchestrator.stop().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the store and run
    match &config.database_url {
        Some(url) => {
            tracing::info!(max_connections = config.database_max_connections, "using PostgreSQL store");
            // Writes are bounded by the database, not by dropping them.
            let store = PostgresRouteStore::connect(
                url,
                config.database_max_connections,
                config.request_timeout,
            )
            .await?;
            store.run_migrations().await?;
            run(store, metrics_handle, &config).await?;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            run(InMemoryRouteStore::new(), metrics_handle, &config).await?;
        }
    }

    tracing::info!("bus station shut down gracefully");
    Ok(())
}
