//! Read-only views handed to the observability layer and the admin API.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::health::HealthState;
use crate::load_balancer::{composite_score, Algorithm};
use crate::registry::ServerSnapshot;

/// Outcome of one routing decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub server_id: String,
    pub address: String,
    pub url: String,
    pub algorithm: Algorithm,
}

/// Per-server health as seen by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerHealthView {
    pub id: String,
    pub state: HealthState,
    pub healthy: bool,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Unix time of the last probe in milliseconds.
    pub last_checked: Option<u64>,
    /// Latency of the last successful probe.
    pub response_time_ms: f64,
}

impl From<&ServerSnapshot> for ServerHealthView {
    fn from(s: &ServerSnapshot) -> Self {
        let health = s.stats.health();
        Self {
            id: s.id().to_string(),
            state: health.state(),
            healthy: health.is_healthy(),
            consecutive_successes: health.consecutive_successes(),
            consecutive_failures: health.consecutive_failures(),
            last_error: s.stats.last_error.clone(),
            last_checked: s.stats.last_checked.and_then(unix_millis),
            response_time_ms: s.stats.last_probe_latency_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub total: usize,
    pub healthy_count: usize,
    pub servers: Vec<ServerHealthView>,
}

impl HealthReport {
    pub fn from_snapshot(snapshot: &[ServerSnapshot]) -> Self {
        let servers: Vec<ServerHealthView> = snapshot.iter().map(ServerHealthView::from).collect();
        Self {
            total: servers.len(),
            healthy_count: servers.iter().filter(|s| s.healthy).count(),
            servers,
        }
    }
}

/// Descriptor plus live statistics for the admin server listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerView {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub url: String,
    pub healthy: bool,
    pub active_connections: u64,
    pub avg_response_time_ms: f64,
    pub samples: usize,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    /// Composite score; `None` while unhealthy.
    pub score: Option<f64>,
}

impl From<&ServerSnapshot> for ServerView {
    fn from(s: &ServerSnapshot) -> Self {
        let score = composite_score(s);
        Self {
            id: s.id().to_string(),
            host: s.descriptor.host.clone(),
            port: s.descriptor.port,
            weight: s.weight(),
            url: s.descriptor.base_url.to_string(),
            healthy: s.is_healthy(),
            active_connections: s.active_connections(),
            avg_response_time_ms: s.avg_response_time(),
            samples: s.stats.response_times.len(),
            cpu_usage: s.stats.cpu_usage,
            memory_usage: s.stats.memory_usage,
            score: score.is_finite().then_some(score),
        }
    }
}

fn unix_millis(t: SystemTime) -> Option<u64> {
    t.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::server;

    #[test]
    fn report_counts_healthy_servers() {
        let mut down = server("b", 1, 0, &[]);
        let t = crate::health::HealthThresholds {
            success_threshold: 1,
            failure_threshold: 1,
        };
        down.stats.health_mut().record(false, &t);

        let report = HealthReport::from_snapshot(&[server("a", 1, 0, &[]), down]);
        assert_eq!(report.total, 2);
        assert_eq!(report.healthy_count, 1);
        assert_eq!(report.servers[1].state, HealthState::Unhealthy);
        assert_eq!(report.servers[1].consecutive_failures, 1);
    }

    #[test]
    fn unhealthy_server_has_no_score() {
        let mut s = server("a", 2, 4, &[100.0]);
        assert_eq!(ServerView::from(&s).score, Some((4.0 * 0.5 + 100.0 * 0.01) / 2.0));

        let t = crate::health::HealthThresholds {
            success_threshold: 1,
            failure_threshold: 1,
        };
        s.stats.health_mut().record(false, &t);
        assert_eq!(ServerView::from(&s).score, None);
    }
}
