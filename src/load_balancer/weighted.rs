//! Weighted round-robin via a weight-proportional random draw.

use rand::Rng;

use crate::error::{Error, Result};
use crate::load_balancer::{LoadBalancer, RoutingContext};
use crate::registry::ServerSnapshot;

/// Draws `r` uniformly from `[0, total_weight)` and returns the server whose
/// cumulative weight interval contains it. Long-run selection frequency is
/// proportional to weight without any per-server counters.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin;

impl WeightedRoundRobin {
    fn pick<R: Rng>(servers: &[ServerSnapshot], rng: &mut R) -> Result<usize> {
        let total_weight: u64 = servers.iter().map(|s| s.weight().max(1) as u64).sum();
        if total_weight == 0 {
            return Err(Error::NoHealthyServers);
        }

        let target = rng.gen_range(0..total_weight);
        let mut cumulative = 0u64;
        for (idx, server) in servers.iter().enumerate() {
            cumulative += server.weight().max(1) as u64;
            if target < cumulative {
                return Ok(idx);
            }
        }
        Ok(servers.len() - 1)
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, servers: &[ServerSnapshot], _ctx: &RoutingContext) -> Result<usize> {
        if servers.is_empty() {
            return Err(Error::NoHealthyServers);
        }
        Self::pick(servers, &mut rand::thread_rng())
    }
}
