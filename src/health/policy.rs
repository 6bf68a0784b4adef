//! Probe policy shared by the monitor and the passive outcome path.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use crate::config::HealthCheckConfig;
use crate::health::state::HealthThresholds;

/// Immutable once loaded; a config reload swaps in a whole new policy.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckPolicy {
    pub enabled: bool,
    pub interval: Duration,
    /// Per-stage probe timeout.
    pub timeout: Duration,
    pub thresholds: HealthThresholds,
    pub tcp_check: bool,
    /// Overrides the server port for the TCP stage.
    pub tcp_port: Option<u16>,
    pub http_check: bool,
    /// Used when a server has no path of its own.
    pub path: String,
    pub expected_statuses: Vec<u16>,
    /// Bounded join when stopping the monitor.
    pub stop_timeout: Duration,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self::from(&HealthCheckConfig::default())
    }
}

impl From<&HealthCheckConfig> for HealthCheckPolicy {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            enabled: config.enabled,
            interval: Duration::from_millis(config.interval_ms()),
            timeout: Duration::from_millis(config.timeout_ms()),
            thresholds: HealthThresholds {
                success_threshold: config.success_threshold,
                failure_threshold: config.failure_threshold,
            },
            tcp_check: config.tcp_check,
            tcp_port: config.tcp_port,
            http_check: config.http_check,
            path: config.path.clone(),
            expected_statuses: config.expected_status_codes.clone(),
            stop_timeout: Duration::from_secs(config.stop_timeout_secs),
        }
    }
}

/// Hot-swappable policy handle.
pub type SharedHealthPolicy = Arc<ArcSwap<HealthCheckPolicy>>;

pub fn shared_policy(policy: HealthCheckPolicy) -> SharedHealthPolicy {
    Arc::new(ArcSwap::from_pointee(policy))
}
