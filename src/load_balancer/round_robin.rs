//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::load_balancer::{LoadBalancer, RoutingContext};
use crate::registry::ServerSnapshot;

/// Top bit of the cursor word: restart from ticket 0 on the next selection.
const STALE: usize = 1 << (usize::BITS - 1);
const TICKET_MASK: usize = !STALE;

/// Round-robin selector.
///
/// Each call takes the next ticket from a shared counter and maps it onto
/// the healthy list as it is at call time (`ticket % len`), so concurrent
/// callers interleave without skipping and a shrinking list never indexes
/// out of range. The reset flag lives in the same word as the ticket, so a
/// restart and the ticket handed out with it are one atomic step.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the cursor stale; it restarts from the first server on the next
    /// selection.
    pub fn reset(&self) {
        self.cursor.fetch_or(STALE, Ordering::AcqRel);
    }

    fn next_ticket(&self) -> usize {
        let advance = |word: usize| {
            if word & STALE != 0 {
                Some(1)
            } else {
                Some(word.wrapping_add(1) & TICKET_MASK)
            }
        };
        // The closure never returns None.
        let previous = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, advance)
        {
            Ok(word) | Err(word) => word,
        };

        if previous & STALE != 0 {
            0
        } else {
            previous
        }
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, servers: &[ServerSnapshot], _ctx: &RoutingContext) -> Result<usize> {
        if servers.is_empty() {
            return Err(Error::NoHealthyServers);
        }

        Ok(self.next_ticket() % servers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::server;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let servers = vec![server("a", 1, 0, &[]), server("b", 1, 0, &[])];
        let ctx = RoutingContext::new();

        assert_eq!(lb.next_server(&servers, &ctx).unwrap(), 0);
        assert_eq!(lb.next_server(&servers, &ctx).unwrap(), 1);
        assert_eq!(lb.next_server(&servers, &ctx).unwrap(), 0);
    }

    #[test]
    fn visits_each_server_once_per_cycle() {
        let lb = RoundRobin::new();
        let servers: Vec<_> = (0..5).map(|i| server(&format!("s{}", i), 1, 0, &[])).collect();
        let ctx = RoutingContext::new();

        for _ in 0..3 {
            let mut picks: Vec<usize> = (0..5).map(|_| lb.next_server(&servers, &ctx).unwrap()).collect();
            picks.sort_unstable();
            assert_eq!(picks, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn shrinking_list_stays_in_range() {
        let lb = RoundRobin::new();
        let three = vec![server("a", 1, 0, &[]), server("b", 1, 0, &[]), server("c", 1, 0, &[])];
        let ctx = RoutingContext::new();
        lb.next_server(&three, &ctx).unwrap();
        lb.next_server(&three, &ctx).unwrap();

        let one = vec![server("a", 1, 0, &[])];
        assert_eq!(lb.next_server(&one, &ctx).unwrap(), 0);
    }

    #[test]
    fn reset_restarts_from_first_server() {
        let lb = RoundRobin::new();
        let servers = vec![server("a", 1, 0, &[]), server("b", 1, 0, &[]), server("c", 1, 0, &[])];
        let ctx = RoutingContext::new();
        lb.next_server(&servers, &ctx).unwrap();
        lb.next_server(&servers, &ctx).unwrap();

        lb.reset();
        assert_eq!(lb.next_server(&servers, &ctx).unwrap(), 0);
        assert_eq!(lb.next_server(&servers, &ctx).unwrap(), 1);
    }

    #[test]
    fn reset_under_concurrency_keeps_cycles_even() {
        let lb = RoundRobin::new();
        let servers = vec![server("a", 1, 0, &[]), server("b", 1, 0, &[]), server("c", 1, 0, &[])];
        for _ in 0..7 {
            lb.next_server(&servers, &RoutingContext::new()).unwrap();
        }
        lb.reset();

        let mut counts = [0usize; 3];
        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let ctx = RoutingContext::new();
                        (0..300)
                            .map(|_| lb.next_server(&servers, &ctx).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for worker in workers {
                for index in worker.join().unwrap() {
                    counts[index] += 1;
                }
            }
        });

        assert_eq!(counts, [800, 800, 800]);
    }
}
