//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the load
//! balancer. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LbConfig {
    /// Algorithm name (`round_robin`, `least_connections`, ...). Kept as a
    /// string so validation can report unknown names alongside other errors.
    pub algorithm: String,

    /// Let the adaptive policy choose the algorithm.
    pub adaptive: bool,

    pub selection: SelectionConfig,

    pub health_check: HealthCheckConfig,

    pub routing: RoutingConfig,

    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    /// Backend servers, in registration order.
    pub servers: Vec<ServerConfig>,
}

impl Default for LbConfig {
    fn default() -> Self {
        Self {
            algorithm: "round_robin".to_string(),
            adaptive: false,
            selection: SelectionConfig::default(),
            health_check: HealthCheckConfig::default(),
            routing: RoutingConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
            servers: Vec::new(),
        }
    }
}

/// Backend server definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Unique server identifier.
    pub id: String,

    pub host: String,

    pub port: u16,

    /// Weight for weighted round-robin (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Overrides `health_check.path` for this server.
    #[serde(default)]
    pub health_check_path: Option<String>,
}

fn default_weight() -> u32 {
    1
}

/// Response-time statistics and adaptive tuning.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Samples kept per server.
    pub response_window_capacity: usize,

    /// Newest samples averaged.
    pub average_window: usize,

    /// Average reported for a server with no samples.
    pub unknown_latency_ms: f64,

    /// Latency coefficient of variation above which least-response-time wins.
    pub cv_threshold: f64,

    /// max/min connection ratio above which least-connections wins.
    pub connection_skew_ratio: f64,

    /// Adaptive evaluation runs once per this many decisions.
    pub evaluate_every: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            response_window_capacity: 100,
            average_window: 10,
            unknown_latency_ms: 1000.0,
            cv_threshold: 0.3,
            connection_skew_ratio: 2.0,
            evaluate_every: 1,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Millisecond override for `interval_secs`.
    pub interval_ms: Option<u64>,

    /// Per-stage probe timeout in seconds.
    pub timeout_secs: u64,

    /// Millisecond override for `timeout_secs`.
    pub timeout_ms: Option<u64>,

    /// Consecutive successes before marking healthy.
    pub success_threshold: u32,

    /// Consecutive failures before marking unhealthy.
    pub failure_threshold: u32,

    pub tcp_check: bool,

    /// Port for the TCP stage; defaults to the server port.
    pub tcp_port: Option<u16>,

    pub http_check: bool,

    /// Path to probe for HTTP health checks.
    pub path: String,

    pub expected_status_codes: Vec<u16>,

    /// How long `stop()` waits for the monitor loop to exit.
    pub stop_timeout_secs: u64,
}

impl HealthCheckConfig {
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.unwrap_or(self.interval_secs.saturating_mul(1000))
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(self.timeout_secs.saturating_mul(1000))
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            interval_ms: None,
            timeout_secs: 5,
            timeout_ms: None,
            success_threshold: 2,
            failure_threshold: 3,
            tcp_check: true,
            tcp_port: None,
            http_check: true,
            path: "/health".to_string(),
            expected_status_codes: vec![200],
            stop_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Feed reported request outcomes into the health counters.
    pub passive_health: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// API key for authentication (Bearer token). Empty disables auth.
    pub api_key: String,

    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            bind_address: "127.0.0.1:5000".to_string(),
        }
    }
}
