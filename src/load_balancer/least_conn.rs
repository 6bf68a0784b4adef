//! Least Connections load balancing strategy.

use crate::error::{Error, Result};
use crate::load_balancer::{LoadBalancer, RoutingContext};
use crate::registry::ServerSnapshot;

/// Selects the backend with the fewest active connections.
/// Ties go to the lower average response time, then to the earlier server.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, servers: &[ServerSnapshot], _ctx: &RoutingContext) -> Result<usize> {
        servers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.active_connections()
                    .cmp(&b.active_connections())
                    .then_with(|| a.avg_response_time().total_cmp(&b.avg_response_time()))
            })
            .map(|(idx, _)| idx)
            .ok_or(Error::NoHealthyServers)
    }
}
