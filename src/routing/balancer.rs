//! The routing facade used by the request-handling layer.
//!
//! # Responsibilities
//! - Combine the adaptive policy, the selection engine and the registry's
//!   connection bookkeeping into one `route()` call
//! - Record request outcomes (latency samples, connection release,
//!   optional passive health)
//! - Serve health and server views
//! - Reconcile the server set and policies on config reload
//!
//! # Design Decisions
//! - `route()` never performs I/O
//! - Two concurrent decisions may read the same pre-increment connection
//!   count and pick the same server; this is an accepted approximation
//! - A server deregistered between selection and increment triggers a
//!   re-selection over a fresh snapshot

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::LbConfig;
use crate::error::{Error, Result};
use crate::health::{
    shared_policy, HealthCheckPolicy, HealthMonitor, SharedHealthPolicy, TransitionHub,
};
use crate::load_balancer::{
    AdaptivePolicy, AdaptiveSettings, Algorithm, RoutingContext, SelectionEngine,
};
use crate::observability::metrics;
use crate::registry::{ServerDescriptor, ServerId, ServerRegistry, WindowSettings};
use crate::routing::report::{HealthReport, RouteDecision, ServerView};

/// Selections retried when the chosen server vanishes mid-decision.
const MAX_ROUTE_ATTEMPTS: usize = 3;

/// What a config reload changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadSummary {
    pub added: Vec<ServerId>,
    pub removed: Vec<ServerId>,
    pub replaced: Vec<ServerId>,
}

#[derive(Debug)]
pub struct Balancer {
    registry: Arc<ServerRegistry>,
    engine: SelectionEngine,
    policy: AdaptivePolicy,
    health_policy: SharedHealthPolicy,
    passive_health: AtomicBool,
    events: Arc<TransitionHub>,
}

impl Balancer {
    /// A balancer pinned to `algorithm` with the default health policy.
    pub fn new(registry: Arc<ServerRegistry>, algorithm: Algorithm) -> Self {
        Self {
            registry,
            engine: SelectionEngine::new(),
            policy: AdaptivePolicy::fixed(algorithm),
            health_policy: shared_policy(HealthCheckPolicy::default()),
            passive_health: AtomicBool::new(false),
            events: Arc::new(TransitionHub::new()),
        }
    }

    pub fn with_policy(mut self, policy: AdaptivePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_health_policy(mut self, health_policy: SharedHealthPolicy) -> Self {
        self.health_policy = health_policy;
        self
    }

    pub fn with_events(mut self, events: Arc<TransitionHub>) -> Self {
        self.events = events;
        self
    }

    pub fn with_passive_health(self, enabled: bool) -> Self {
        self.passive_health.store(enabled, Ordering::Relaxed);
        self
    }

    /// Build a registry from a validated config and register every server.
    pub fn from_config(config: &LbConfig) -> Result<Self> {
        let algorithm: Algorithm = config.algorithm.parse()?;
        let registry = Arc::new(ServerRegistry::new(window_settings(config)));

        for server in &config.servers {
            registry.register(descriptor_from(server)?)?;
        }

        Ok(Self::new(registry, algorithm)
            .with_policy(AdaptivePolicy::new(
                algorithm,
                config.adaptive,
                adaptive_settings(config),
            ))
            .with_health_policy(shared_policy(HealthCheckPolicy::from(&config.health_check)))
            .with_passive_health(config.routing.passive_health))
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn health_policy(&self) -> &SharedHealthPolicy {
        &self.health_policy
    }

    pub fn events(&self) -> &Arc<TransitionHub> {
        &self.events
    }

    /// A monitor sharing this balancer's registry, policy and callbacks.
    pub fn monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.registry.clone(),
            self.health_policy.clone(),
            self.events.clone(),
        )
    }

    pub fn register(
        &self,
        id: impl Into<ServerId>,
        host: impl Into<String>,
        port: u16,
        weight: u32,
        health_check_path: Option<String>,
    ) -> Result<()> {
        let descriptor = ServerDescriptor::new(id, host, port, weight, health_check_path)?;
        self.registry.register(descriptor)
    }

    pub fn deregister(&self, id: &ServerId) -> Result<()> {
        self.registry.deregister(id).map(|_| ())
    }

    /// Choose a healthy server and count the request against it.
    pub fn route(&self, ctx: &RoutingContext) -> Result<RouteDecision> {
        for _ in 0..MAX_ROUTE_ATTEMPTS {
            let healthy = self.registry.healthy_snapshot();

            let (algorithm, switch) = self.policy.choose(&healthy);
            if switch.is_some() {
                self.engine.reset_cursor();
            }

            let index = match self.engine.select(algorithm, &healthy, ctx) {
                Ok(index) => index,
                Err(e) => {
                    metrics::record_no_healthy_servers(algorithm);
                    tracing::warn!(
                        algorithm = %algorithm,
                        registered = self.registry.len(),
                        "No healthy servers available"
                    );
                    return Err(e);
                }
            };

            let chosen = &healthy[index];
            if self.registry.increment_connections(chosen.id()) {
                metrics::record_route(algorithm, chosen.id().as_str());
                tracing::debug!(
                    server = %chosen.id(),
                    algorithm = %algorithm,
                    client = ctx.client_id().unwrap_or("-"),
                    "Routed request"
                );
                return Ok(RouteDecision {
                    server_id: chosen.id().to_string(),
                    address: chosen.descriptor.address(),
                    url: chosen.descriptor.base_url.to_string(),
                    algorithm,
                });
            }

            tracing::debug!(server = %chosen.id(), "Selected server was deregistered, reselecting");
        }

        Err(Error::NoHealthyServers)
    }

    /// Release the connection taken by `route()`. Unknown ids are ignored.
    pub fn report_outcome(&self, id: &ServerId, latency_ms: f64, success: bool) {
        if !self.registry.decrement_connections(id) {
            tracing::debug!(server = %id, "Outcome reported for unknown server");
            return;
        }
        if success {
            self.registry.record_response_time(id, latency_ms);
        }

        if self.passive_health.load(Ordering::Relaxed) {
            let thresholds = self.health_policy.load().thresholds;
            if let Some(transition) = self.registry.record_health_result(id, success, &thresholds) {
                self.events.notify(&transition);
            }
        }
    }

    /// Pin an algorithm and leave adaptive mode. Unknown names leave the
    /// current algorithm active.
    pub fn set_algorithm(&self, name: &str) -> Result<Algorithm> {
        if let Some(switch) = self.policy.set_algorithm(name)? {
            tracing::debug!(from = %switch.from, to = %switch.to, "Algorithm set");
            self.engine.reset_cursor();
        }
        Ok(self.policy.current())
    }

    pub fn set_adaptive(&self, enabled: bool) {
        self.policy.set_adaptive(enabled);
    }

    pub fn current_algorithm(&self) -> Algorithm {
        self.policy.current()
    }

    pub fn is_adaptive(&self) -> bool {
        self.policy.is_adaptive()
    }

    pub fn set_passive_health(&self, enabled: bool) {
        self.passive_health.store(enabled, Ordering::Relaxed);
    }

    pub fn passive_health(&self) -> bool {
        self.passive_health.load(Ordering::Relaxed)
    }

    pub fn health_report(&self) -> HealthReport {
        HealthReport::from_snapshot(&self.registry.snapshot())
    }

    pub fn server_views(&self) -> Vec<ServerView> {
        self.registry.snapshot().iter().map(ServerView::from).collect()
    }

    /// Apply a reloaded config. Everything is checked before anything
    /// changes, so an error leaves the balancer untouched. Window sizing is
    /// fixed at startup. The file is authoritative: servers registered at
    /// runtime that it does not list are removed.
    pub fn apply_config(&self, config: &LbConfig) -> Result<ReloadSummary> {
        let algorithm: Algorithm = config.algorithm.parse()?;
        let descriptors = config
            .servers
            .iter()
            .map(descriptor_from)
            .collect::<Result<Vec<_>>>()?;

        let mut wanted: HashSet<&ServerId> = HashSet::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            if !wanted.insert(&descriptor.id) {
                return Err(Error::DuplicateServer(descriptor.id.clone()));
            }
        }

        let mut summary = ReloadSummary::default();
        for existing in self.registry.snapshot() {
            if !wanted.contains(existing.id()) && self.registry.deregister(existing.id()).is_ok() {
                // Includes servers added at runtime through the admin API.
                tracing::warn!(server = %existing.id(), "Server absent from reloaded config, deregistered");
                summary.removed.push(existing.id().clone());
            }
        }

        for descriptor in descriptors {
            match self.registry.get(&descriptor.id) {
                Some(current) if *current.descriptor == descriptor => {}
                Some(_) => {
                    let id = descriptor.id.clone();
                    // Address or weight changed: the server restarts from Unhealthy.
                    if let Err(e) = self.registry.deregister(&id) {
                        tracing::debug!(server = %id, error = %e, "Server already gone before replacement");
                    }
                    self.registry.register(descriptor)?;
                    summary.replaced.push(id);
                }
                None => {
                    let id = descriptor.id.clone();
                    self.registry.register(descriptor)?;
                    summary.added.push(id);
                }
            }
        }

        self.health_policy
            .store(Arc::new(HealthCheckPolicy::from(&config.health_check)));
        self.policy.update_settings(adaptive_settings(config));
        if self.policy.pin(algorithm).is_some() {
            self.engine.reset_cursor();
        }
        self.policy.set_adaptive(config.adaptive);
        self.set_passive_health(config.routing.passive_health);

        tracing::info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            replaced = summary.replaced.len(),
            algorithm = %algorithm,
            adaptive = config.adaptive,
            "Configuration applied"
        );
        Ok(summary)
    }
}

fn descriptor_from(server: &crate::config::ServerConfig) -> Result<ServerDescriptor> {
    ServerDescriptor::new(
        server.id.as_str(),
        server.host.as_str(),
        server.port,
        server.weight,
        server.health_check_path.clone(),
    )
}

fn window_settings(config: &LbConfig) -> WindowSettings {
    WindowSettings {
        capacity: config.selection.response_window_capacity,
        average_window: config.selection.average_window,
        unknown_latency_ms: config.selection.unknown_latency_ms,
    }
}

fn adaptive_settings(config: &LbConfig) -> AdaptiveSettings {
    AdaptiveSettings {
        cv_threshold: config.selection.cv_threshold,
        connection_skew_ratio: config.selection.connection_skew_ratio,
        evaluate_every: config.selection.evaluate_every,
    }
}
