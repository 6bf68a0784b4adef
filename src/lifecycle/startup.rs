//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems from a validated config in dependency order
//! - Start background tasks (health monitor, config watcher, metrics)
//! - Serve the admin API until shutdown, then stop everything
//!
//! # Design Decisions
//! - Fail fast: a bad server list or unbindable admin address is fatal
//! - A config watcher that cannot start is logged, not fatal
//! - The admin listener starts last (traffic only when ready)

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::setup_admin_router;
use crate::config::watcher::ConfigWatcher;
use crate::config::LbConfig;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::routing::Balancer;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build balancer: {0}")]
    Build(#[from] crate::error::Error),

    #[error("failed to bind admin API on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("admin API server error: {0}")]
    Serve(std::io::Error),
}

/// Run the daemon until SIGINT/SIGTERM. `config_path` enables hot reload.
pub async fn run(config: LbConfig, config_path: Option<PathBuf>) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let balancer = Arc::new(Balancer::from_config(&config)?);
    tracing::info!(
        servers = balancer.registry().len(),
        algorithm = %balancer.current_algorithm(),
        adaptive = balancer.is_adaptive(),
        "Load balancer initialized"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let monitor = balancer.monitor().spawn();

    // Dropping the watcher stops it, so it lives until shutdown.
    let _watcher = config_path.and_then(|path| spawn_reloader(path, balancer.clone(), shutdown.clone()));

    let served = if config.admin.enabled {
        serve_admin(&config, balancer.clone(), shutdown.clone()).await
    } else {
        shutdown.notified().await;
        Ok(())
    };

    // Make sure every task sees the signal even if the server failed.
    shutdown.trigger();
    if !monitor.stop().await {
        tracing::warn!("Health monitor was aborted during shutdown");
    }

    served
}

async fn serve_admin(
    config: &LbConfig,
    balancer: Arc<Balancer>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let address = config.admin.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    if config.admin.api_key.is_empty() {
        tracing::warn!("Admin API key is empty, authentication is disabled");
    }
    tracing::info!(address = %address, "Admin API listening");

    let app = setup_admin_router(balancer, &config.admin.api_key);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Admin API stopped");
    Ok(())
}

/// Watch the config file and apply each validated update.
fn spawn_reloader(
    path: PathBuf,
    balancer: Arc<Balancer>,
    shutdown: Shutdown,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, updates) = ConfigWatcher::new(&path);
    let watcher = match watcher.run() {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(path = ?path, error = %e, "Failed to start config watcher, hot reload disabled");
            return None;
        }
    };

    tokio::spawn(apply_updates(updates, balancer, shutdown));
    Some(watcher)
}

async fn apply_updates(
    mut updates: mpsc::UnboundedReceiver<LbConfig>,
    balancer: Arc<Balancer>,
    shutdown: Shutdown,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => {
                    if let Err(e) = balancer.apply_config(&config) {
                        tracing::error!(error = %e, "Rejected reloaded configuration");
                    }
                }
                None => break,
            },
            _ = shutdown.notified() => break,
        }
    }
}
