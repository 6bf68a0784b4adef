//! Composite load score for health-aware weighting.

use crate::registry::ServerSnapshot;

/// `(connections*0.5 + avg_latency_ms*0.01 + cpu*0.3 + mem*0.2) / weight`.
/// Lower is better; unhealthy servers score `+inf`.
pub fn composite_score(server: &ServerSnapshot) -> f64 {
    if !server.is_healthy() {
        return f64::INFINITY;
    }

    let stats = &server.stats;
    let raw = stats.active_connections as f64 * 0.5
        + stats.avg_response_time() * 0.01
        + stats.cpu_usage * 0.3
        + stats.memory_usage * 0.2;

    raw / server.weight().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::server;
    use crate::registry::{ServerStats, WindowSettings};

    #[test]
    fn combines_load_signals() {
        let mut s = server("a", 2, 4, &[100.0]);
        s.stats.cpu_usage = 50.0;
        s.stats.memory_usage = 10.0;
        // (2.0 + 1.0 + 15.0 + 2.0) / 2
        assert!((composite_score(&s) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn unhealthy_scores_infinite() {
        let mut s = server("a", 1, 0, &[]);
        s.stats = ServerStats::new(WindowSettings::default());
        assert!(composite_score(&s).is_infinite());
    }
}
