//! Least response time load balancing strategy.

use crate::error::{Error, Result};
use crate::load_balancer::{LoadBalancer, RoutingContext};
use crate::registry::ServerSnapshot;

/// Selects the lowest average response time; ties go to fewer active
/// connections. Servers without samples average the unknown-high sentinel.
#[derive(Debug, Default)]
pub struct LeastResponseTime;

impl LoadBalancer for LeastResponseTime {
    fn next_server(&self, servers: &[ServerSnapshot], _ctx: &RoutingContext) -> Result<usize> {
        servers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.avg_response_time()
                    .total_cmp(&b.avg_response_time())
                    .then_with(|| a.active_connections().cmp(&b.active_connections()))
            })
            .map(|(idx, _)| idx)
            .ok_or(Error::NoHealthyServers)
    }
}
