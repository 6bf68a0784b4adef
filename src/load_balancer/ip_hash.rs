//! Client-affinity hashing.
//!
//! The same client maps to the same server for as long as the healthy
//! count is unchanged. Membership changes reshuffle clients; this is plain
//! modulo hashing, not a consistent-hash ring.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::load_balancer::{LoadBalancer, RoutingContext};
use crate::registry::ServerSnapshot;

/// Key used when the request carries no client identifier.
pub const ANONYMOUS_CLIENT: &str = "0.0.0.0";

#[derive(Debug, Default)]
pub struct IpHash;

/// First 128 bits of the SHA-256 digest of `client`.
pub fn affinity_hash(client: &str) -> u128 {
    let digest = Sha256::digest(client.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(bytes)
}

impl LoadBalancer for IpHash {
    fn next_server(&self, servers: &[ServerSnapshot], ctx: &RoutingContext) -> Result<usize> {
        if servers.is_empty() {
            return Err(Error::NoHealthyServers);
        }
        let client = ctx.client_id().unwrap_or(ANONYMOUS_CLIENT);
        Ok((affinity_hash(client) % servers.len() as u128) as usize)
    }
}
