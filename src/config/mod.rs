//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, LB_* environment overrides)
//!     → validation.rs (semantic checks)
//!     → LbConfig (validated, immutable)
//!     → startup builds the registry, balancer and health policy from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Balancer::apply_config reconciles servers, algorithm, policy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, HealthCheckConfig, LbConfig, ObservabilityConfig, RoutingConfig, SelectionConfig,
    ServerConfig,
};
pub use validation::ValidationError;
