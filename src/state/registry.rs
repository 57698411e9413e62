//! Replica Registry
//!
//! Tracks every replica that has registered with this node and whether it is
//! currently believed reachable. Records are never removed, and nothing in
//! the crate moves a replica from unhealthy back to healthy except a fresh
//! registration.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Health of a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaHealth {
    /// Address has never registered
    Unknown,
    /// Answering probes; receives replication traffic
    Healthy,
    /// Failed a probe or a delivery; skipped until it re-registers
    Unhealthy,
}

impl std::fmt::Display for ReplicaHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaHealth::Unknown => write!(f, "UNKNOWN"),
            ReplicaHealth::Healthy => write!(f, "HEALTHY"),
            ReplicaHealth::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

/// State of a single replica
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Base URL of the replica (e.g. http://localhost:8084)
    pub address: String,
    /// Current health
    pub health: ReplicaHealth,
    /// Last time the replica registered
    pub registered_at: chrono::DateTime<chrono::Utc>,
    /// Last time the health changed or was re-asserted
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ReplicaRecord {
    fn new(address: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            address,
            health: ReplicaHealth::Healthy,
            registered_at: now,
            updated_at: now,
        }
    }

    /// Check if the replica should receive replication traffic
    pub fn is_healthy(&self) -> bool {
        self.health == ReplicaHealth::Healthy
    }
}

/// Registry of replicas keyed by address
#[derive(Default)]
pub struct ReplicaRegistry {
    replicas: RwLock<HashMap<String, ReplicaRecord>>,
}

impl ReplicaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `address` as healthy
    pub async fn register(&self, address: &str) {
        let mut replicas = self.replicas.write().await;
        let previous = replicas.insert(address.to_string(), ReplicaRecord::new(address.to_string()));

        match previous {
            Some(old) if old.health == ReplicaHealth::Unhealthy => {
                tracing::info!("Replica {} re-registered, marked healthy again", address);
            }
            Some(_) => tracing::debug!("Replica {} re-registered", address),
            None => tracing::info!("Replica {} registered", address),
        }
    }

    /// Mark a known replica healthy. Returns false for unknown addresses.
    pub async fn mark_healthy(&self, address: &str) -> bool {
        self.set_health(address, ReplicaHealth::Healthy).await
    }

    /// Mark a known replica unhealthy. Returns false for unknown addresses.
    pub async fn mark_unhealthy(&self, address: &str) -> bool {
        self.set_health(address, ReplicaHealth::Unhealthy).await
    }

    async fn set_health(&self, address: &str, health: ReplicaHealth) -> bool {
        let mut replicas = self.replicas.write().await;
        match replicas.get_mut(address) {
            Some(record) => {
                if record.health != health {
                    tracing::debug!("Replica {}: {} -> {}", address, record.health, health);
                }
                record.health = health;
                record.updated_at = chrono::Utc::now();
                true
            }
            None => {
                tracing::trace!("Ignoring {} for unregistered replica {}", health, address);
                false
            }
        }
    }

    /// Point-in-time copy of every record, ordered by address
    pub async fn snapshot(&self) -> Vec<ReplicaRecord> {
        let replicas = self.replicas.read().await;
        let mut records: Vec<ReplicaRecord> = replicas.values().cloned().collect();
        records.sort_by(|a, b| a.address.cmp(&b.address));
        records
    }

    /// Addresses of replicas currently marked healthy
    pub async fn healthy_addresses(&self) -> Vec<String> {
        self.snapshot()
            .await
            .into_iter()
            .filter(ReplicaRecord::is_healthy)
            .map(|r| r.address)
            .collect()
    }

    /// Health of `address`, `Unknown` if it never registered
    pub async fn health_of(&self, address: &str) -> ReplicaHealth {
        let replicas = self.replicas.read().await;
        replicas
            .get(address)
            .map(|r| r.health)
            .unwrap_or(ReplicaHealth::Unknown)
    }

    /// Number of registered replicas
    pub async fn len(&self) -> usize {
        self.replicas.read().await.len()
    }

    /// Check if no replica has registered
    pub async fn is_empty(&self) -> bool {
        self.replicas.read().await.is_empty()
    }
}
