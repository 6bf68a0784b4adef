//! Backend health state machine.
//!
//! # States
//! - Healthy: backend receives traffic
//! - Unhealthy: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= failure_threshold
//! Unhealthy → Healthy: consecutive successes >= success_threshold
//! ```
//!
//! Every server starts Unhealthy and must earn `success_threshold`
//! consecutive successful probes before it is routed to.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthState::Healthy => f.write_str("healthy"),
            HealthState::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// Hysteresis thresholds. Zero is treated as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    pub success_threshold: u32,
    pub failure_threshold: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            success_threshold: 2,
            failure_threshold: 3,
        }
    }
}

/// Current state plus the two consecutive-outcome counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    state: HealthState,
    consecutive_successes: u32,
    consecutive_failures: u32,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            state: HealthState::Unhealthy,
            consecutive_successes: 0,
            consecutive_failures: 0,
        }
    }
}

impl HealthStatus {
    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Apply one outcome. Returns the new state when a transition happened.
    pub fn record(&mut self, success: bool, thresholds: &HealthThresholds) -> Option<HealthState> {
        if success {
            self.consecutive_failures = 0;
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);

            if self.state == HealthState::Unhealthy
                && self.consecutive_successes >= thresholds.success_threshold.max(1)
            {
                self.state = HealthState::Healthy;
                return Some(HealthState::Healthy);
            }
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);

            if self.state == HealthState::Healthy
                && self.consecutive_failures >= thresholds.failure_threshold.max(1)
            {
                self.state = HealthState::Unhealthy;
                return Some(HealthState::Unhealthy);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(success: u32, failure: u32) -> HealthThresholds {
        HealthThresholds {
            success_threshold: success,
            failure_threshold: failure,
        }
    }

    fn healthy(t: &HealthThresholds) -> HealthStatus {
        let mut status = HealthStatus::default();
        for _ in 0..t.success_threshold {
            status.record(true, t);
        }
        assert!(status.is_healthy());
        status
    }

    #[test]
    fn starts_unhealthy() {
        let status = HealthStatus::default();
        assert_eq!(status.state(), HealthState::Unhealthy);
        assert_eq!(status.consecutive_successes(), 0);
        assert_eq!(status.consecutive_failures(), 0);
    }

    #[test]
    fn flips_unhealthy_only_on_third_failure() {
        let t = thresholds(1, 3);
        let mut status = healthy(&t);

        assert_eq!(status.record(false, &t), None);
        assert_eq!(status.record(false, &t), None);
        assert!(status.is_healthy());
        assert_eq!(status.record(false, &t), Some(HealthState::Unhealthy));
        assert_eq!(status.consecutive_failures(), 3);
    }

    #[test]
    fn interleaved_success_resets_failure_streak() {
        let t = thresholds(1, 3);
        let mut status = healthy(&t);

        status.record(false, &t);
        status.record(false, &t);
        status.record(true, &t);
        assert_eq!(status.consecutive_failures(), 0);

        status.record(false, &t);
        status.record(false, &t);
        assert!(status.is_healthy());
    }

    #[test]
    fn recovery_requires_success_threshold() {
        let t = thresholds(2, 1);
        let mut status = healthy(&t);
        assert_eq!(status.record(false, &t), Some(HealthState::Unhealthy));

        assert_eq!(status.record(true, &t), None);
        assert!(!status.is_healthy());
        assert_eq!(status.record(true, &t), Some(HealthState::Healthy));
    }

    #[test]
    fn zero_threshold_behaves_as_one() {
        let t = thresholds(0, 0);
        let mut status = HealthStatus::default();
        assert_eq!(status.record(true, &t), Some(HealthState::Healthy));
        assert_eq!(status.record(false, &t), Some(HealthState::Unhealthy));
    }
}
