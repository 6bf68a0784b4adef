//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! registry.healthy_snapshot()
//!     → adaptive.rs (pick the active Algorithm, if adaptive mode is on)
//!     → SelectionEngine::select(algorithm, healthy, ctx):
//!         - round_robin.rs (cursor over the live healthy list)
//!         - least_conn.rs (fewest active connections)
//!         - weighted.rs (weight-proportional random draw)
//!         - least_response_time.rs (lowest average latency)
//!         - ip_hash.rs (client affinity)
//!         - random.rs (uniform)
//!     → index into the healthy snapshot, or NoHealthyServers
//! ```
//!
//! # Design Decisions
//! - Algorithms only ever see owned snapshots, never the registry
//! - Only round-robin keeps state across calls (its cursor)
//! - The algorithm set is closed; unknown names are a typed error

pub mod adaptive;
pub mod ip_hash;
pub mod least_conn;
pub mod least_response_time;
pub mod random;
pub mod round_robin;
pub mod score;
pub mod weighted;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::ServerSnapshot;

pub use adaptive::{AdaptivePolicy, AdaptiveSettings, AlgorithmSwitch};
pub use ip_hash::IpHash;
pub use least_conn::LeastConnections;
pub use least_response_time::LeastResponseTime;
pub use random::RandomSelection;
pub use round_robin::RoundRobin;
pub use score::composite_score;
pub use weighted::WeightedRoundRobin;

/// Every routing algorithm the core knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    LeastConnections,
    WeightedRoundRobin,
    LeastResponseTime,
    IpHash,
    Random,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::RoundRobin,
        Algorithm::LeastConnections,
        Algorithm::WeightedRoundRobin,
        Algorithm::LeastResponseTime,
        Algorithm::IpHash,
        Algorithm::Random,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::LeastConnections => "least_connections",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::LeastResponseTime => "least_response_time",
            Algorithm::IpHash => "ip_hash",
            Algorithm::Random => "random",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }
}

/// Per-request input. Lives for one decision only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingContext {
    client_id: Option<String>,
}

impl RoutingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// A selection algorithm over a healthy snapshot.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Index into `servers`, or `NoHealthyServers` when it is empty.
    fn next_server(&self, servers: &[ServerSnapshot], ctx: &RoutingContext) -> Result<usize>;
}

/// One instance of every algorithm; dispatches on [`Algorithm`].
#[derive(Debug, Default)]
pub struct SelectionEngine {
    round_robin: RoundRobin,
    least_connections: LeastConnections,
    weighted: WeightedRoundRobin,
    least_response_time: LeastResponseTime,
    ip_hash: IpHash,
    random: RandomSelection,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn strategy(&self, algorithm: Algorithm) -> &dyn LoadBalancer {
        match algorithm {
            Algorithm::RoundRobin => &self.round_robin,
            Algorithm::LeastConnections => &self.least_connections,
            Algorithm::WeightedRoundRobin => &self.weighted,
            Algorithm::LeastResponseTime => &self.least_response_time,
            Algorithm::IpHash => &self.ip_hash,
            Algorithm::Random => &self.random,
        }
    }

    pub fn select(
        &self,
        algorithm: Algorithm,
        healthy: &[ServerSnapshot],
        ctx: &RoutingContext,
    ) -> Result<usize> {
        self.strategy(algorithm).next_server(healthy, ctx)
    }

    /// Restart the round-robin cursor on its next use.
    pub fn reset_cursor(&self) {
        self.round_robin.reset();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::health::state::HealthThresholds;
    use crate::registry::{ServerDescriptor, ServerSnapshot, ServerStats, WindowSettings};
    use std::sync::Arc;

    /// A Healthy snapshot with the given weight, connections and latencies.
    pub fn server(id: &str, weight: u32, connections: u64, latencies: &[f64]) -> ServerSnapshot {
        let descriptor = ServerDescriptor::new(id, "127.0.0.1", 8000, weight, None).unwrap();
        let mut stats = ServerStats::new(WindowSettings::default());
        let t = HealthThresholds {
            success_threshold: 1,
            failure_threshold: 1,
        };
        stats.health_mut().record(true, &t);
        stats.active_connections = connections;
        for l in latencies {
            stats.response_times.push(*l);
        }
        ServerSnapshot {
            descriptor: Arc::new(descriptor),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::server;
    use super::*;

    #[test]
    fn algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
    }

    #[test]
    fn unknown_algorithm_is_an_error() {
        assert_eq!(
            "fastest".parse::<Algorithm>(),
            Err(Error::UnknownAlgorithm("fastest".into()))
        );
    }

    #[test]
    fn every_algorithm_rejects_empty_snapshot() {
        let engine = SelectionEngine::new();
        let ctx = RoutingContext::with_client("10.0.0.1");
        for algorithm in Algorithm::ALL {
            assert_eq!(engine.select(algorithm, &[], &ctx), Err(Error::NoHealthyServers));
        }
    }

    #[test]
    fn every_algorithm_returns_a_member() {
        let engine = SelectionEngine::new();
        let servers = vec![
            server("a", 1, 3, &[20.0]),
            server("b", 2, 0, &[]),
            server("c", 5, 1, &[5.0, 7.0]),
        ];
        for algorithm in Algorithm::ALL {
            for i in 0..50 {
                let ctx = RoutingContext::with_client(format!("192.168.0.{}", i));
                let idx = engine.select(algorithm, &servers, &ctx).unwrap();
                assert!(idx < servers.len(), "{} returned {}", algorithm, idx);
            }
        }
    }
}
