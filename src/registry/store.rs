//! The authoritative set of backends and their live statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::health::events::HealthTransition;
use crate::health::probe::ProbeOutcome;
use crate::health::state::HealthThresholds;
use crate::observability::metrics;
use crate::registry::server::{ServerDescriptor, ServerId, ServerSnapshot, ServerStats, WindowSettings};

#[derive(Debug)]
struct ServerEntry {
    /// Registration sequence; snapshots are ordered by it.
    order: u64,
    descriptor: Arc<ServerDescriptor>,
    stats: ServerStats,
}

impl ServerEntry {
    fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            descriptor: self.descriptor.clone(),
            stats: self.stats.clone(),
        }
    }
}

/// Concurrent server registry. Each id is its own critical section.
#[derive(Debug)]
pub struct ServerRegistry {
    servers: DashMap<ServerId, ServerEntry>,
    next_order: AtomicU64,
    window: WindowSettings,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new(WindowSettings::default())
    }
}

impl ServerRegistry {
    pub fn new(window: WindowSettings) -> Self {
        Self {
            servers: DashMap::new(),
            next_order: AtomicU64::new(0),
            window,
        }
    }

    pub fn register(&self, descriptor: ServerDescriptor) -> Result<()> {
        match self.servers.entry(descriptor.id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateServer(descriptor.id)),
            Entry::Vacant(slot) => {
                tracing::info!(
                    server = %descriptor.id,
                    address = %descriptor.address(),
                    weight = descriptor.weight,
                    "Registered backend"
                );
                slot.insert(ServerEntry {
                    order: self.next_order.fetch_add(1, Ordering::Relaxed),
                    descriptor: Arc::new(descriptor),
                    stats: ServerStats::new(self.window),
                });
                Ok(())
            }
        }
    }

    /// Remove a server. In-flight decrements for it become no-ops.
    pub fn deregister(&self, id: &ServerId) -> Result<Arc<ServerDescriptor>> {
        let (_, entry) = self
            .servers
            .remove(id)
            .ok_or_else(|| Error::UnknownServer(id.clone()))?;

        tracing::info!(
            server = %id,
            active_connections = entry.stats.active_connections,
            "Deregistered backend"
        );
        Ok(entry.descriptor)
    }

    pub fn contains(&self, id: &ServerId) -> bool {
        self.servers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn get(&self, id: &ServerId) -> Option<ServerSnapshot> {
        self.servers.get(id).map(|e| e.snapshot())
    }

    /// Owned copies of every server in registration order.
    pub fn snapshot(&self) -> Vec<ServerSnapshot> {
        let mut entries: Vec<(u64, ServerSnapshot)> = self
            .servers
            .iter()
            .map(|e| (e.order, e.snapshot()))
            .collect();
        entries.sort_unstable_by_key(|(order, _)| *order);
        entries.into_iter().map(|(_, s)| s).collect()
    }

    /// Owned copies of the Healthy servers in registration order.
    pub fn healthy_snapshot(&self) -> Vec<ServerSnapshot> {
        self.snapshot().into_iter().filter(|s| s.is_healthy()).collect()
    }

    pub fn healthy_count(&self) -> usize {
        self.servers.iter().filter(|e| e.stats.is_healthy()).count()
    }

    /// Returns `false` if the server is unknown.
    pub fn increment_connections(&self, id: &ServerId) -> bool {
        match self.servers.get_mut(id) {
            Some(mut entry) => {
                entry.stats.active_connections = entry.stats.active_connections.saturating_add(1);
                metrics::record_active_connections(id.as_str(), entry.stats.active_connections);
                true
            }
            None => false,
        }
    }

    /// Clamped at zero. Returns `false` if the server is unknown.
    pub fn decrement_connections(&self, id: &ServerId) -> bool {
        match self.servers.get_mut(id) {
            Some(mut entry) => {
                entry.stats.active_connections = entry.stats.active_connections.saturating_sub(1);
                metrics::record_active_connections(id.as_str(), entry.stats.active_connections);
                true
            }
            None => false,
        }
    }

    pub fn record_response_time(&self, id: &ServerId, latency_ms: f64) -> bool {
        match self.servers.get_mut(id) {
            Some(mut entry) => {
                entry.stats.response_times.push(latency_ms);
                true
            }
            None => false,
        }
    }

    /// Apply one active probe result. Returns the transition it caused, if any.
    pub fn update_probe_result(
        &self,
        id: &ServerId,
        outcome: &ProbeOutcome,
        thresholds: &HealthThresholds,
    ) -> Option<HealthTransition> {
        let mut entry = self.servers.get_mut(id)?;
        let stats = &mut entry.stats;

        stats.last_checked = Some(SystemTime::now());
        if outcome.success {
            stats.last_error = None;
            stats.last_probe_latency_ms = outcome.latency_ms;
            stats.response_times.push(outcome.latency_ms);
            if let Some(gauges) = outcome.gauges {
                stats.apply_gauges(gauges);
            }
        } else {
            stats.last_error = outcome.error.clone();
            stats.last_probe_latency_ms = 0.0;
        }

        apply_health(id, stats, outcome.success, thresholds)
    }

    /// Apply a passive (live traffic) outcome to the health counters only.
    pub fn record_health_result(
        &self,
        id: &ServerId,
        success: bool,
        thresholds: &HealthThresholds,
    ) -> Option<HealthTransition> {
        let mut entry = self.servers.get_mut(id)?;
        apply_health(id, &mut entry.stats, success, thresholds)
    }
}

fn apply_health(
    id: &ServerId,
    stats: &mut ServerStats,
    success: bool,
    thresholds: &HealthThresholds,
) -> Option<HealthTransition> {
    let from = stats.health().state();
    let to = stats.health_mut().record(success, thresholds)?;
    Some(HealthTransition {
        server_id: id.clone(),
        from,
        to,
        consecutive_successes: stats.health().consecutive_successes(),
        consecutive_failures: stats.health().consecutive_failures(),
        last_error: stats.last_error.clone(),
    })
}
