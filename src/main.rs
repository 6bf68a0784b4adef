//! Adaptive load balancer daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               ADAPTIVE LB                    │
//!                        │                                              │
//!   GET /route ──────────┼─▶ admin ──▶ routing::Balancer                │
//!   POST /outcome        │              │        │                      │
//!                        │              ▼        ▼                      │
//!                        │      load_balancer   registry ◀── health ────┼──▶ Backends
//!                        │   (adaptive + algos)  (stats)     monitor    │   (TCP/HTTP
//!                        │                                              │    probes)
//!                        │   config watcher ──▶ Balancer::apply_config  │
//!                        │   observability: tracing + Prometheus        │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use adaptive_lb::config::load_config;
use adaptive_lb::lifecycle::startup;
use adaptive_lb::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "adaptive-lb", version, about = "Adaptive load balancer")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "lb.toml")]
    config: PathBuf,

    /// Disable hot reload of the configuration file
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(path = ?args.config, error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "adaptive-lb starting"
    );

    let watch = (!args.no_watch).then(|| args.config.clone());
    startup::run(config, watch).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
