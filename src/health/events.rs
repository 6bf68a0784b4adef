//! Health transition notifications.
//!
//! Callbacks run synchronously on the task that observed the transition.
//! A callback that returns an error or panics is logged and skipped; the
//! remaining callbacks and the monitor keep running.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::health::state::HealthState;
use crate::observability::metrics;
use crate::registry::ServerId;

/// A committed Healthy ↔ Unhealthy change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthTransition {
    pub server_id: ServerId,
    pub from: HealthState,
    pub to: HealthState,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Error a transition callback may return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl From<&str> for CallbackError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

impl From<String> for CallbackError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

pub type TransitionCallback =
    Arc<dyn Fn(&HealthTransition) -> Result<(), CallbackError> + Send + Sync>;

/// Registered transition callbacks, shared by the active monitor and the
/// passive outcome path.
#[derive(Default)]
pub struct TransitionHub {
    callbacks: RwLock<Vec<TransitionCallback>>,
}

impl std::fmt::Debug for TransitionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionHub")
            .field("callbacks", &self.len())
            .finish()
    }
}

impl TransitionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&HealthTransition) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log the transition and invoke every callback. Returns the number of
    /// callbacks that failed.
    pub fn notify(&self, transition: &HealthTransition) -> usize {
        match transition.to {
            HealthState::Healthy => tracing::info!(
                server = %transition.server_id,
                successes = transition.consecutive_successes,
                "Backend is now healthy"
            ),
            HealthState::Unhealthy => tracing::warn!(
                server = %transition.server_id,
                failures = transition.consecutive_failures,
                error = transition.last_error.as_deref().unwrap_or("none"),
                "Backend is now unhealthy"
            ),
        }
        metrics::record_backend_health(
            transition.server_id.as_str(),
            transition.to == HealthState::Healthy,
        );

        // Snapshot so callbacks may register further callbacks.
        let callbacks: Vec<TransitionCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut failed = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(transition))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::error!(server = %transition.server_id, error = %e, "Health transition callback failed");
                }
                Err(panic) => {
                    failed += 1;
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(server = %transition.server_id, panic = %msg, "Health transition callback panicked");
                }
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transition() -> HealthTransition {
        HealthTransition {
            server_id: ServerId::new("s1"),
            from: HealthState::Unhealthy,
            to: HealthState::Healthy,
            consecutive_successes: 2,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    #[test]
    fn failing_callbacks_do_not_stop_others() {
        let hub = TransitionHub::new();
        let calls = Arc::new(AtomicUsize::new(0));

        hub.register(|_| Err("boom".into()));
        hub.register(|_| panic!("callback exploded"));
        let c = calls.clone();
        hub.register(move |t| {
            assert_eq!(t.to, HealthState::Healthy);
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(hub.notify(&transition()), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_hub_notifies_nothing() {
        let hub = TransitionHub::new();
        assert!(hub.is_empty());
        assert_eq!(hub.notify(&transition()), 0);
    }
}
