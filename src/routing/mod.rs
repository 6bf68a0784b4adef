//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decision (balancer.rs):
//!     RoutingContext (optional client id)
//!     → registry.healthy_snapshot()
//!     → AdaptivePolicy::choose (active algorithm)
//!     → SelectionEngine::select
//!     → registry.increment_connections(chosen)
//!     → RouteDecision
//!
//! Feedback:
//!     report_outcome(id, latency, success)
//!     → registry.decrement_connections + latency sample
//!     → health counters (passive mode only)
//!
//! Views (report.rs):
//!     registry.snapshot() → HealthReport / ServerView
//! ```
//!
//! # Design Decisions
//! - The facade is the only writer of connection counts
//! - Health is driven by the probe loop unless passive health is enabled
//! - On reload the config file is authoritative: servers added through the
//!   admin API that the file does not list are deregistered

pub mod balancer;
pub mod report;

pub use balancer::{Balancer, ReloadSummary};
pub use report::{HealthReport, RouteDecision, ServerHealthView, ServerView};
