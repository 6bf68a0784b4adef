//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define load balancer metrics (decisions, health, probes, connections)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `lb_route_decisions_total` (counter): decisions by algorithm, server
//! - `lb_no_healthy_servers_total` (counter): decisions that found no healthy server
//! - `lb_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `lb_probe_latency_ms` (histogram): active probe latency by server, outcome
//! - `lb_algorithm_switches_total` (counter): adaptive or manual switches by from, to
//! - `lb_active_connections` (gauge): in-flight requests per server
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so library code
//!   and tests call these freely
//! - Label values are server ids and algorithm names, never client ids

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::load_balancer::Algorithm;

/// Install the global Prometheus recorder with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_route(algorithm: Algorithm, server: &str) {
    ::metrics::counter!(
        "lb_route_decisions_total",
        "algorithm" => algorithm.as_str(),
        "server" => server.to_string()
    )
    .increment(1);
}

pub fn record_no_healthy_servers(algorithm: Algorithm) {
    ::metrics::counter!("lb_no_healthy_servers_total", "algorithm" => algorithm.as_str()).increment(1);
}

pub fn record_backend_health(server: &str, healthy: bool) {
    ::metrics::gauge!("lb_backend_health", "server" => server.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_active_connections(server: &str, connections: u64) {
    ::metrics::gauge!("lb_active_connections", "server" => server.to_string()).set(connections as f64);
}

pub fn record_probe(server: &str, success: bool, latency_ms: f64) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::histogram!(
        "lb_probe_latency_ms",
        "server" => server.to_string(),
        "outcome" => outcome
    )
    .record(latency_ms);
}

pub fn record_algorithm_switch(from: Algorithm, to: Algorithm) {
    ::metrics::counter!(
        "lb_algorithm_switches_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}
