//! Adaptive load-balancing core.
//!
//! Chooses a backend for each request from a registry of servers whose
//! health is tracked by a hysteresis-based probe loop, using one of six
//! selection algorithms or an adaptive policy that switches between them.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::LbConfig;
pub use error::{Error, Result};
pub use lifecycle::Shutdown;
pub use load_balancer::{Algorithm, RoutingContext};
pub use registry::{ServerId, ServerRegistry};
pub use routing::{Balancer, RouteDecision};
