//! Backend descriptors and live statistics.
//!
//! # Responsibilities
//! - Represent a single backend server's identity (id, address, weight)
//! - Track active connections, response-time samples and resource gauges
//! - Hold the per-server health counters

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::health::state::HealthStatus;

/// Unique identifier of a registered backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Immutable identity of a backend. Created at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub id: ServerId,
    pub host: String,
    pub port: u16,
    /// Declared weight, always >= 1.
    pub weight: u32,
    /// Overrides the policy-wide health path when set.
    pub health_check_path: Option<String>,
    /// Pre-calculated base URL (`http://host:port`).
    pub base_url: Url,
}

impl ServerDescriptor {
    pub fn new(
        id: impl Into<ServerId>,
        host: impl Into<String>,
        port: u16,
        weight: u32,
        health_check_path: Option<String>,
    ) -> Result<Self> {
        let id = id.into();
        let host = host.into();

        if weight == 0 {
            return Err(Error::InvalidWeight { id, weight });
        }
        if host.is_empty() || port == 0 {
            return Err(Error::InvalidAddress(format!("{}:{}", host, port)));
        }

        // IPv6 literals need brackets inside a URL authority.
        let authority = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        };
        let base_url = Url::parse(&format!("http://{}", authority))
            .map_err(|_| Error::InvalidAddress(authority.clone()))?;

        let health_check_path = health_check_path
            .filter(|p| !p.is_empty())
            .map(|p| if p.starts_with('/') { p } else { format!("/{}", p) });

        Ok(Self {
            id,
            host,
            port,
            weight,
            health_check_path,
            base_url,
        })
    }

    /// `host:port` as given at registration.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full URL of the health endpoint, preferring the per-server path.
    pub fn health_check_url(&self, default_path: &str) -> String {
        let path = self.health_check_path.as_deref().unwrap_or(default_path);
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

/// Sizing of every server's response-time window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSettings {
    /// Ring capacity; the oldest sample is evicted first.
    pub capacity: usize,
    /// Number of newest samples averaged.
    pub average_window: usize,
    /// Reported average while no samples exist.
    pub unknown_latency_ms: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            average_window: 10,
            unknown_latency_ms: 1000.0,
        }
    }
}

/// Fixed-capacity ring of response-time samples in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTimeWindow {
    samples: VecDeque<f64>,
    settings: WindowSettings,
}

impl ResponseTimeWindow {
    pub fn new(settings: WindowSettings) -> Self {
        let settings = WindowSettings {
            capacity: settings.capacity.max(1),
            average_window: settings.average_window.max(1),
            ..settings
        };
        Self {
            samples: VecDeque::with_capacity(settings.capacity),
            settings,
        }
    }

    pub fn push(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return;
        }
        if self.samples.len() == self.settings.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Mean of the newest `average_window` samples, or the unknown-high
    /// sentinel when the window is empty.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return self.settings.unknown_latency_ms;
        }
        let n = self.settings.average_window.min(self.samples.len());
        let sum: f64 = self.samples.iter().rev().take(n).sum();
        sum / n as f64
    }

    /// Samples oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

/// CPU/memory gauges reported by a backend's health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceGauges {
    #[serde(default)]
    pub cpu_usage: Option<f64>,
    #[serde(default)]
    pub memory_usage: Option<f64>,
}

impl ResourceGauges {
    pub fn is_empty(&self) -> bool {
        self.cpu_usage.is_none() && self.memory_usage.is_none()
    }

    /// Drops non-finite values and clamps the rest into [0, 100].
    pub fn clamped(self) -> Self {
        let clamp = |v: Option<f64>| v.filter(|x| x.is_finite()).map(|x| x.clamp(0.0, 100.0));
        Self {
            cpu_usage: clamp(self.cpu_usage),
            memory_usage: clamp(self.memory_usage),
        }
    }
}

/// Mutable statistics for one backend. Owned by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStats {
    pub active_connections: u64,
    pub response_times: ResponseTimeWindow,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    health: HealthStatus,
    pub last_checked: Option<SystemTime>,
    pub last_error: Option<String>,
    /// Latency of the last successful probe (0 after a failed one).
    pub last_probe_latency_ms: f64,
}

impl ServerStats {
    pub fn new(window: WindowSettings) -> Self {
        Self {
            active_connections: 0,
            response_times: ResponseTimeWindow::new(window),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            health: HealthStatus::default(),
            last_checked: None,
            last_error: None,
            last_probe_latency_ms: 0.0,
        }
    }

    pub fn health(&self) -> &HealthStatus {
        &self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    pub fn avg_response_time(&self) -> f64 {
        self.response_times.average_ms()
    }

    pub(crate) fn health_mut(&mut self) -> &mut HealthStatus {
        &mut self.health
    }

    pub(crate) fn apply_gauges(&mut self, gauges: ResourceGauges) {
        let gauges = gauges.clamped();
        if let Some(cpu) = gauges.cpu_usage {
            self.cpu_usage = cpu;
        }
        if let Some(mem) = gauges.memory_usage {
            self.memory_usage = mem;
        }
    }
}

/// Point-in-time copy of one registered server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSnapshot {
    pub descriptor: Arc<ServerDescriptor>,
    pub stats: ServerStats,
}

impl ServerSnapshot {
    pub fn id(&self) -> &ServerId {
        &self.descriptor.id
    }

    pub fn weight(&self) -> u32 {
        self.descriptor.weight
    }

    pub fn active_connections(&self) -> u64 {
        self.stats.active_connections
    }

    pub fn avg_response_time(&self) -> f64 {
        self.stats.avg_response_time()
    }

    pub fn is_healthy(&self) -> bool {
        self.stats.is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(capacity: usize, average_window: usize) -> ResponseTimeWindow {
        ResponseTimeWindow::new(WindowSettings {
            capacity,
            average_window,
            unknown_latency_ms: 1000.0,
        })
    }

    #[test]
    fn empty_window_reports_sentinel() {
        let w = window(10, 10);
        assert!(w.is_empty());
        assert_eq!(w.average_ms(), 1000.0);
    }

    #[test]
    fn window_evicts_oldest_first() {
        let mut w = window(3, 3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            w.push(v);
        }
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(w.latest(), Some(4.0));
    }

    #[test]
    fn average_uses_newest_samples() {
        let mut w = window(100, 2);
        for v in [100.0, 100.0, 10.0, 20.0] {
            w.push(v);
        }
        assert_eq!(w.average_ms(), 15.0);
    }

    #[test]
    fn window_ignores_invalid_samples() {
        let mut w = window(4, 4);
        w.push(f64::NAN);
        w.push(-1.0);
        assert!(w.is_empty());
    }

    #[test]
    fn descriptor_rejects_zero_weight() {
        let err = ServerDescriptor::new("a", "localhost", 8080, 0, None).unwrap_err();
        assert!(matches!(err, Error::InvalidWeight { weight: 0, .. }));
    }

    #[test]
    fn descriptor_builds_health_url() {
        let d = ServerDescriptor::new("a", "localhost", 5001, 1, Some("status".into())).unwrap();
        assert_eq!(d.health_check_url("/health"), "http://localhost:5001/status");

        let d = ServerDescriptor::new("b", "::1", 5002, 1, None).unwrap();
        assert_eq!(d.health_check_url("/health"), "http://[::1]:5002/health");
    }

    #[test]
    fn gauges_are_clamped() {
        let g = ResourceGauges {
            cpu_usage: Some(140.0),
            memory_usage: Some(-3.0),
        }
        .clamped();
        assert_eq!(g.cpu_usage, Some(100.0));
        assert_eq!(g.memory_usage, Some(0.0));
    }
}
