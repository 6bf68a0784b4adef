//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every backend concurrently (probe.rs: TCP, then HTTP)
//!     → registry.update_probe_result → state.rs threshold rule
//!     → events.rs callbacks on Healthy ↔ Unhealthy
//!
//! Passive health (routing::Balancer::report_outcome, opt-in):
//!     Request outcome observed
//!     → same threshold rule, same callbacks
//! ```
//!
//! # Design Decisions
//! - Servers start Unhealthy until `success_threshold` probes pass
//! - State transitions require consecutive successes/failures
//! - Probe and callback failures never leave this module
//! - Policy is swapped atomically on config reload

pub mod active;
pub mod events;
pub mod policy;
pub mod probe;
pub mod state;

pub use active::{HealthMonitor, MonitorHandle};
pub use events::{CallbackError, HealthTransition, TransitionHub};
pub use policy::{shared_policy, HealthCheckPolicy, SharedHealthPolicy};
pub use probe::{ProbeError, ProbeOutcome, Prober};
pub use state::{HealthState, HealthStatus, HealthThresholds};
