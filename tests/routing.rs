//! End-to-end routing decisions through the facade.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use adaptive_lb::load_balancer::{AdaptivePolicy, AdaptiveSettings};
use adaptive_lb::{Algorithm, Balancer, Error, RoutingContext, ServerId, ServerRegistry};
use common::mark_healthy;

fn balancer(algorithm: Algorithm, servers: &[(&str, u32)]) -> Balancer {
    let registry = Arc::new(ServerRegistry::default());
    let balancer = Balancer::new(registry.clone(), algorithm);
    for (i, (id, weight)) in servers.iter().enumerate() {
        balancer
            .register(*id, "127.0.0.1", 9000 + i as u16, *weight, None)
            .unwrap();
        mark_healthy(&registry, id);
    }
    balancer
}

fn route_counts(balancer: &Balancer, calls: usize) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for _ in 0..calls {
        let decision = balancer.route(&RoutingContext::new()).unwrap();
        *counts.entry(decision.server_id.clone()).or_insert(0) += 1;
        balancer.report_outcome(&ServerId::new(decision.server_id), 5.0, true);
    }
    counts
}

#[test]
fn weighted_round_robin_tracks_weights() {
    let balancer = balancer(Algorithm::WeightedRoundRobin, &[("a", 1), ("b", 1), ("c", 2)]);
    let counts = route_counts(&balancer, 10_000);

    for (id, expected) in [("a", 2500), ("b", 2500), ("c", 5000)] {
        let got = counts.get(id).copied().unwrap_or(0) as i64;
        assert!(
            (got - expected).abs() <= 500,
            "{} routed {} times, expected about {}",
            id,
            got,
            expected
        );
    }
}

#[test]
fn round_robin_visits_each_server_once_per_cycle() {
    let balancer = balancer(Algorithm::RoundRobin, &[("a", 1), ("b", 1), ("c", 1)]);
    let first: Vec<String> = (0..3)
        .map(|_| balancer.route(&RoutingContext::new()).unwrap().server_id)
        .collect();
    let second: Vec<String> = (0..3)
        .map(|_| balancer.route(&RoutingContext::new()).unwrap().server_id)
        .collect();

    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(sorted, vec!["a", "b", "c"]);
    assert_eq!(first, second);
}

#[test]
fn round_robin_follows_the_live_healthy_set() {
    let balancer = balancer(Algorithm::RoundRobin, &[("a", 1), ("b", 1), ("c", 1)]);
    balancer.deregister(&ServerId::new("b")).unwrap();

    let counts = route_counts(&balancer, 10);
    assert_eq!(counts.get("a"), Some(&5));
    assert_eq!(counts.get("c"), Some(&5));
    assert!(!counts.contains_key("b"));
}

#[test]
fn ip_hash_is_sticky_for_an_unchanged_set() {
    let balancer = balancer(Algorithm::IpHash, &[("a", 1), ("b", 1), ("c", 1)]);
    for client in ["10.0.0.1", "10.0.0.2", "192.168.1.77"] {
        let ctx = RoutingContext::with_client(client);
        let first = balancer.route(&ctx).unwrap().server_id;
        for _ in 0..20 {
            assert_eq!(balancer.route(&ctx).unwrap().server_id, first);
        }
    }
}

#[test]
fn unhealthy_servers_are_never_chosen() {
    let balancer = balancer(Algorithm::Random, &[("a", 1)]);
    balancer.register("b", "127.0.0.1", 9100, 1, None).unwrap();

    for _ in 0..100 {
        assert_eq!(balancer.route(&RoutingContext::new()).unwrap().server_id, "a");
    }
}

#[test]
fn empty_healthy_set_fails_for_every_algorithm() {
    let registry = Arc::new(ServerRegistry::default());
    for algorithm in Algorithm::ALL {
        let balancer = Balancer::new(registry.clone(), algorithm);
        assert_eq!(
            balancer.route(&RoutingContext::with_client("10.0.0.1")),
            Err(Error::NoHealthyServers)
        );
    }
}

#[test]
fn connections_never_go_negative() {
    let balancer = balancer(Algorithm::RoundRobin, &[("a", 1)]);
    let id = ServerId::new("a");

    balancer.report_outcome(&id, 5.0, true);
    balancer.report_outcome(&id, 5.0, false);
    assert_eq!(balancer.registry().get(&id).unwrap().active_connections(), 0);

    balancer.route(&RoutingContext::new()).unwrap();
    balancer.deregister(&id).unwrap();
    balancer.report_outcome(&id, 5.0, true);
    assert!(balancer.registry().get(&id).is_none());
}

#[test]
fn concurrent_routes_count_every_connection() {
    let balancer = Arc::new(balancer(
        Algorithm::RoundRobin,
        &[("a", 1), ("b", 1), ("c", 1), ("d", 1)],
    ));

    let decisions: Vec<String> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let balancer = balancer.clone();
                scope.spawn(move || {
                    (0..1000)
                        .map(|_| balancer.route(&RoutingContext::new()).unwrap().server_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
    });

    let snapshot = balancer.registry().snapshot();
    let total: u64 = snapshot.iter().map(|s| s.active_connections()).sum();
    assert_eq!(total, 8000);
    // The shared cursor hands out each position exactly once.
    for s in &snapshot {
        assert_eq!(s.active_connections(), 2000, "server {}", s.id());
    }

    thread::scope(|scope| {
        for chunk in decisions.chunks(1000) {
            let balancer = balancer.clone();
            scope.spawn(move || {
                for id in chunk {
                    balancer.report_outcome(&ServerId::new(id.as_str()), 3.0, true);
                }
            });
        }
    });

    let total: u64 = balancer
        .registry()
        .snapshot()
        .iter()
        .map(|s| s.active_connections())
        .sum();
    assert_eq!(total, 0);
}

#[test]
fn adaptive_mode_switches_on_latency_skew() {
    let balancer = balancer(Algorithm::RoundRobin, &[("a", 1), ("b", 1), ("c", 1)]).with_policy(
        AdaptivePolicy::new(Algorithm::RoundRobin, true, AdaptiveSettings::default()),
    );
    for _ in 0..10 {
        balancer.registry().record_response_time(&ServerId::new("c"), 200.0);
    }

    let decision = balancer.route(&RoutingContext::new()).unwrap();
    assert_eq!(decision.algorithm, Algorithm::LeastResponseTime);
    assert_eq!(balancer.current_algorithm(), Algorithm::LeastResponseTime);
    assert_ne!(decision.server_id, "c");
}

#[test]
fn adaptive_mode_stays_round_robin_when_balanced() {
    let balancer = balancer(Algorithm::RoundRobin, &[("a", 1), ("b", 1), ("c", 1)]).with_policy(
        AdaptivePolicy::new(Algorithm::LeastConnections, true, AdaptiveSettings::default()),
    );
    for (id, latency) in [("a", 50.0), ("b", 52.0), ("c", 49.0)] {
        for _ in 0..10 {
            balancer.registry().record_response_time(&ServerId::new(id), latency);
        }
    }

    let decision = balancer.route(&RoutingContext::new()).unwrap();
    assert_eq!(decision.algorithm, Algorithm::RoundRobin);
}

#[test]
fn pinning_an_algorithm_leaves_adaptive_mode() {
    let balancer = balancer(Algorithm::RoundRobin, &[("a", 1), ("b", 1)]).with_policy(
        AdaptivePolicy::new(Algorithm::RoundRobin, true, AdaptiveSettings::default()),
    );
    assert!(balancer.is_adaptive());

    assert_eq!(balancer.set_algorithm("least_connections"), Ok(Algorithm::LeastConnections));
    assert!(!balancer.is_adaptive());
    assert_eq!(
        balancer.set_algorithm("nope"),
        Err(Error::UnknownAlgorithm("nope".into()))
    );
    assert_eq!(balancer.current_algorithm(), Algorithm::LeastConnections);
}
