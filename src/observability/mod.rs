//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields: server, algorithm, error)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, filtered by RUST_LOG or config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted messages
//! - Metrics are cheap (atomic increments) and no-ops until installed

pub mod logging;
pub mod metrics;
