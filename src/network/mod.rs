//! Network Module
//!
//! Handles HTTP communication between nodes: liveness probes, replica RPCs
//! and replica self-registration.

mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::HttpPeerClient;

use std::time::Duration;

use crate::error::Result;
use crate::replication::{ReplicaAck, ReplicationTask};

/// Outbound calls one node makes to another
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Check that the peer answers `/ping` within `timeout`
    async fn probe(&self, address: &str, timeout: Duration) -> Result<()>;

    /// Send one task to a replica and wait for its acknowledgement
    async fn deliver(&self, address: &str, task: &ReplicationTask) -> Result<ReplicaAck>;
}

/// Join a base address and a path without doubling the slash
pub fn endpoint(address: &str, path: &str) -> String {
    format!("{}{}", address.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(endpoint("http://localhost:8084", "/ping"), "http://localhost:8084/ping");
        assert_eq!(endpoint("http://localhost:8084/", "/ping"), "http://localhost:8084/ping");
    }
}
