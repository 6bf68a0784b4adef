//! Errors that cross the load-balancing core's boundary.
//!
//! Probe and callback failures never appear here; they stay inside the
//! health monitor (see `health::probe::ProbeError` and
//! `health::events::CallbackError`).

use thiserror::Error;

use crate::registry::ServerId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The healthy snapshot was empty. Callers map this to a 503.
    #[error("no healthy servers available")]
    NoHealthyServers,
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),
    #[error("server '{0}' is already registered")]
    DuplicateServer(ServerId),
    #[error("server '{0}' is not registered")]
    UnknownServer(ServerId),
    #[error("weight must be >= 1 for server '{id}' (got {weight})")]
    InvalidWeight { id: ServerId, weight: u32 },
    #[error("invalid server address '{0}'")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;
