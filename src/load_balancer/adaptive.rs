//! Adaptive algorithm choice.
//!
//! # Rules (evaluated over the healthy snapshot)
//! ```text
//! fewer than 2 servers                         → round_robin
//! CV(avg response times) > cv_threshold        → least_response_time
//! max(connections) > ratio * min(connections)  → least_connections
//! otherwise                                    → round_robin
//! ```
//!
//! With adaptive mode off the policy simply returns the pinned algorithm.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::load_balancer::Algorithm;
use crate::observability::metrics;
use crate::registry::ServerSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveSettings {
    pub cv_threshold: f64,
    pub connection_skew_ratio: f64,
    /// Evaluate once per this many decisions.
    pub evaluate_every: u64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            cv_threshold: 0.3,
            connection_skew_ratio: 2.0,
            evaluate_every: 1,
        }
    }
}

/// An observed change of the active algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmSwitch {
    pub from: Algorithm,
    pub to: Algorithm,
}

#[derive(Debug, Clone, Copy)]
struct PolicyState {
    current: Algorithm,
    adaptive: bool,
}

#[derive(Debug)]
pub struct AdaptivePolicy {
    settings: Mutex<AdaptiveSettings>,
    state: Mutex<PolicyState>,
    decisions: AtomicU64,
}

impl AdaptivePolicy {
    pub fn new(initial: Algorithm, adaptive: bool, settings: AdaptiveSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            state: Mutex::new(PolicyState {
                current: initial,
                adaptive,
            }),
            decisions: AtomicU64::new(0),
        }
    }

    /// A policy pinned to one algorithm.
    pub fn fixed(algorithm: Algorithm) -> Self {
        Self::new(algorithm, false, AdaptiveSettings::default())
    }

    pub fn current(&self) -> Algorithm {
        self.lock_state().current
    }

    pub fn is_adaptive(&self) -> bool {
        self.lock_state().adaptive
    }

    pub fn settings(&self) -> AdaptiveSettings {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn update_settings(&self, settings: AdaptiveSettings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Pin `name` and leave adaptive mode. An unknown name leaves the policy
    /// untouched.
    pub fn set_algorithm(&self, name: &str) -> Result<Option<AlgorithmSwitch>> {
        let algorithm: Algorithm = name.parse()?;
        Ok(self.pin(algorithm))
    }

    pub fn pin(&self, algorithm: Algorithm) -> Option<AlgorithmSwitch> {
        let mut state = self.lock_state();
        state.adaptive = false;
        self.switch_to(&mut state, algorithm)
    }

    pub fn set_adaptive(&self, enabled: bool) {
        let mut state = self.lock_state();
        if state.adaptive != enabled {
            tracing::info!(adaptive = enabled, algorithm = %state.current, "Adaptive mode changed");
        }
        state.adaptive = enabled;
    }

    /// The algorithm for this decision, re-evaluating when adaptive mode is
    /// on and the throttle allows it.
    pub fn choose(&self, healthy: &[ServerSnapshot]) -> (Algorithm, Option<AlgorithmSwitch>) {
        let settings = self.settings();
        let mut state = self.lock_state();
        if !state.adaptive {
            return (state.current, None);
        }

        let n = self.decisions.fetch_add(1, Ordering::Relaxed);
        if n % settings.evaluate_every.max(1) != 0 {
            return (state.current, None);
        }

        let next = evaluate(healthy, &settings);
        let switch = self.switch_to(&mut state, next);
        (state.current, switch)
    }

    fn switch_to(&self, state: &mut PolicyState, next: Algorithm) -> Option<AlgorithmSwitch> {
        if state.current == next {
            return None;
        }
        let switch = AlgorithmSwitch {
            from: state.current,
            to: next,
        };
        state.current = next;
        tracing::info!(from = %switch.from, to = %switch.to, "Switching load balancing algorithm");
        metrics::record_algorithm_switch(switch.from, switch.to);
        Some(switch)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pure decision over a healthy snapshot.
pub fn evaluate(healthy: &[ServerSnapshot], settings: &AdaptiveSettings) -> Algorithm {
    if healthy.len() < 2 {
        return Algorithm::RoundRobin;
    }

    let latencies: Vec<f64> = healthy.iter().map(|s| s.avg_response_time()).collect();
    if let Some(cv) = coefficient_of_variation(&latencies) {
        if cv > settings.cv_threshold {
            return Algorithm::LeastResponseTime;
        }
    }

    let connections = healthy.iter().map(|s| s.active_connections());
    let max = connections.clone().max().unwrap_or(0) as f64;
    let min = connections.min().unwrap_or(0) as f64;
    if max > min * settings.connection_skew_ratio {
        return Algorithm::LeastConnections;
    }

    Algorithm::RoundRobin
}

/// Sample standard deviation over mean. `None` for fewer than two values or
/// a non-positive mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() / mean)
}
