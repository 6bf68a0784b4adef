//! Server registry subsystem.
//!
//! # Data Flow
//! ```text
//! config / admin API
//!     → register(descriptor) / deregister(id)
//!     → store.rs (DashMap<ServerId, entry>, registration order)
//!
//! HealthMonitor ──update_probe_result──▶ store.rs
//! Balancer ──increment / decrement / record_response_time──▶ store.rs
//!
//! store.rs ──snapshot()──▶ Vec<ServerSnapshot> (owned copies)
//!     → SelectionEngine / AdaptivePolicy / health report
//! ```
//!
//! # Design Decisions
//! - All stats mutation goes through `ServerRegistry`; each id is its own
//!   critical section (DashMap shard lock)
//! - Snapshots are owned clones, never live views
//! - Health state changes only through the threshold rule in `health::state`
//! - Connection counts saturate at zero; unknown ids are ignored

pub mod server;
pub mod store;

pub use server::{
    ResourceGauges, ResponseTimeWindow, ServerDescriptor, ServerId, ServerSnapshot, ServerStats,
    WindowSettings,
};
pub use store::ServerRegistry;
