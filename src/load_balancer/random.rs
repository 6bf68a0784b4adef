//! Uniform random selection.

use rand::Rng;

use crate::error::{Error, Result};
use crate::load_balancer::{LoadBalancer, RoutingContext};
use crate::registry::ServerSnapshot;

#[derive(Debug, Default)]
pub struct RandomSelection;

impl LoadBalancer for RandomSelection {
    fn next_server(&self, servers: &[ServerSnapshot], _ctx: &RoutingContext) -> Result<usize> {
        if servers.is_empty() {
            return Err(Error::NoHealthyServers);
        }
        Ok(rand::thread_rng().gen_range(0..servers.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::server;

    #[test]
    fn reaches_every_server() {
        let servers = vec![server("a", 1, 0, &[]), server("b", 1, 0, &[]), server("c", 1, 0, &[])];
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[RandomSelection.next_server(&servers, &RoutingContext::new()).unwrap()] = true;
        }
        assert_eq!(seen, [true; 3]);
    }
}
