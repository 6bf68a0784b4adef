//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber once per process
//! - Resolve the log filter from `RUST_LOG` first, then config
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - A second initialization is ignored instead of panicking

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config level parses.
const FALLBACK_FILTER: &str = "adaptive_lb=info,tower_http=info";

/// Build the filter: `RUST_LOG` wins, then the configured level, then the
/// fallback.
pub fn build_filter(configured_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(scoped_level(configured_level)))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// A bare level like `debug` applies to this crate and tower_http; anything
/// containing a directive is used as is.
fn scoped_level(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("adaptive_lb={level},tower_http={level}")
    }
}

pub fn init_logging(configured_level: &str) {
    let result = tracing_subscriber::registry()
        .with(build_filter(configured_level))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
