//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Balancer + registry → Health monitor
//!     → Config watcher → Admin listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Admin server drains → Monitor stop (bounded join) → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, stop monitor
//! - Monitor stop has a timeout: the loop is aborted after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
