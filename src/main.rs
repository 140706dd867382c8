//! Resource Kit admin server
//!
//! Serves the cache, snapshot and field cipher components over HTTP.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resource_kit::{create_router, spawn_cleanup_task, AppState, Config};

/// Main entry point for the admin server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the cache, prefetch queue, snapshot manager and field cipher
/// 4. Start the cache sweep and, if `BACKUP_SOURCE` is set, auto-backup
/// 5. Serve the router on the configured port
/// 6. On SIGINT/SIGTERM, stop background tasks after in-flight work completes
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_kit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resource Kit server");

    let config = Config::from_env();
    info!(
        cache_max_size = config.cache_max_size,
        cache_max_age_ms = config.cache_max_age_ms,
        backup_dir = %config.backup_dir.display(),
        port = config.server_port,
        "Configuration loaded"
    );
    if config.uses_default_key() {
        warn!("ENCRYPTION_KEY is not set; using the built-in placeholder passphrase");
    }

    let state = AppState::from_config(&config).context("failed to initialize components")?;

    let sweep = spawn_cleanup_task(state.cache.clone(), config.cache().cleanup_interval);

    if let Some(source) = &config.backup_source {
        state
            .snapshots
            .start_auto_backup(source.clone(), config.backup_interval())
            .await;
    }

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    state.snapshots.stop_auto_backup().await;
    state.prefetch.clear().await;
    sweep.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = wait_or_park("Ctrl+C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Resolves when `signal` fires; parks forever if the handler cannot be installed.
async fn wait_or_park(name: &str, signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(err) = signal.await {
        error!("Failed to install {name} handler: {err}");
        std::future::pending::<()>().await;
    }
}
