//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered backend, concurrently
//! - Admit servers without I/O when probing is disabled
//! - Feed outcomes through the registry's threshold rule
//! - Fire transition callbacks
//! - Stop cooperatively with a bounded join

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::health::events::{HealthTransition, TransitionHub};
use crate::health::policy::{HealthCheckPolicy, SharedHealthPolicy};
use crate::health::probe::Prober;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::{ServerDescriptor, ServerRegistry};

pub struct HealthMonitor {
    registry: Arc<ServerRegistry>,
    policy: SharedHealthPolicy,
    prober: Prober,
    events: Arc<TransitionHub>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServerRegistry>,
        policy: SharedHealthPolicy,
        events: Arc<TransitionHub>,
    ) -> Self {
        Self {
            registry,
            policy,
            prober: Prober::new(),
            events,
        }
    }

    /// Callbacks registered here also fire for passive transitions.
    pub fn events(&self) -> &Arc<TransitionHub> {
        &self.events
    }

    /// Probe every registered server once and wait for all probes (each
    /// bounded by the policy timeout). Returns the transitions committed.
    pub async fn check_all(&self) -> Vec<HealthTransition> {
        let policy = self.policy.load_full();
        let servers = self.registry.snapshot();

        let probes = servers
            .iter()
            .map(|s| self.check_server(s.descriptor.clone(), &policy));

        join_all(probes).await.into_iter().flatten().collect()
    }

    async fn check_server(
        &self,
        server: Arc<ServerDescriptor>,
        policy: &HealthCheckPolicy,
    ) -> Option<HealthTransition> {
        let outcome = self.prober.probe(&server, policy).await;
        metrics::record_probe(server.id.as_str(), outcome.success, outcome.latency_ms);

        // None when deregistered mid-probe or when no transition happened.
        let transition = self
            .registry
            .update_probe_result(&server.id, &outcome, &policy.thresholds)?;
        self.events.notify(&transition);
        Some(transition)
    }

    /// With probing disabled every server is credited one success per round,
    /// so servers still pass through the threshold rule before receiving
    /// traffic.
    pub fn admit_all(&self, policy: &HealthCheckPolicy) -> Vec<HealthTransition> {
        self.registry
            .snapshot()
            .iter()
            .filter(|s| !s.is_healthy())
            .filter_map(|s| {
                self.registry
                    .record_health_result(s.id(), true, &policy.thresholds)
            })
            .inspect(|t| {
                self.events.notify(t);
            })
            .collect()
    }

    /// Run until the shutdown signal fires. The policy is re-read every
    /// round so a config reload takes effect at the next interval.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        {
            let initial = self.policy.load();
            tracing::info!(
                interval = ?initial.interval,
                timeout = ?initial.timeout,
                path = %initial.path,
                servers = self.registry.len(),
                "Health monitor starting"
            );
        }

        loop {
            let policy = self.policy.load_full();

            if policy.enabled {
                tokio::select! {
                    transitions = self.check_all() => {
                        tracing::trace!(transitions = transitions.len(), "Health round complete");
                    }
                    _ = shutdown.recv() => break,
                }
            } else {
                self.admit_all(&policy);
            }

            tokio::select! {
                _ = time::sleep(policy.interval) => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health monitor stopped");
    }

    /// Spawn the loop on the current runtime with its own stop signal.
    pub fn spawn(self) -> MonitorHandle {
        let shutdown = Shutdown::new();
        let policy = self.policy.clone();
        let task = tokio::spawn(self.run(shutdown.subscribe()));
        MonitorHandle {
            shutdown,
            task,
            policy,
        }
    }
}

/// Owned handle to a spawned monitor loop.
pub struct MonitorHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
    policy: SharedHealthPolicy,
}

impl MonitorHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop and wait up to the stop timeout of the policy current
    /// at call time. Returns `true` if the loop exited on its own, `false`
    /// if it had to be aborted.
    pub async fn stop(mut self) -> bool {
        let stop_timeout = self.policy.load().stop_timeout;
        self.shutdown.trigger();
        match time::timeout(stop_timeout, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(timeout = ?stop_timeout, "Health monitor did not stop in time, aborting");
                self.task.abort();
                false
            }
        }
    }
}
