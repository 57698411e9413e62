//! Replica Health Monitor
//!
//! Periodically probes every replica the registry considers healthy and
//! demotes the ones that stop answering. A replica only becomes healthy again
//! by re-registering with the primary.

use std::sync::Arc;
use std::time::Duration;
use futures::future::join_all;

use crate::config::ReplicationConfig;
use crate::network::PeerTransport;
use crate::state::ReplicaRegistry;

/// Background prober for registered replicas
pub struct HealthMonitor {
    registry: Arc<ReplicaRegistry>,
    transport: Arc<dyn PeerTransport>,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Create a monitor using the replication probe settings
    pub fn new(
        config: &ReplicationConfig,
        registry: Arc<ReplicaRegistry>,
        transport: Arc<dyn PeerTransport>,
    ) -> Self {
        Self {
            registry,
            transport,
            interval: config.health_check_interval(),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Sweep forever at the configured interval
    pub async fn run(self) {
        tracing::info!(
            "Health monitor started (interval {:?}, probe timeout {:?})",
            self.interval,
            self.probe_timeout
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; replicas get one interval to come up.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let demoted = self.sweep().await;
            if !demoted.is_empty() {
                tracing::debug!("Health sweep demoted {} replica(s)", demoted.len());
            }
        }
    }

    /// Probe all healthy replicas once, returning the addresses marked unhealthy
    pub async fn sweep(&self) -> Vec<String> {
        let targets = self.registry.healthy_addresses().await;
        if targets.is_empty() {
            return Vec::new();
        }

        let probes = targets.iter().map(|address| async move {
            let result = tokio::time::timeout(
                self.probe_timeout,
                self.transport.probe(address, self.probe_timeout),
            )
            .await;
            (address, matches!(result, Ok(Ok(()))))
        });

        let mut demoted = Vec::new();
        for (address, alive) in join_all(probes).await {
            if alive {
                continue;
            }
            if self.registry.mark_unhealthy(address).await {
                tracing::warn!("Replica {} is not responding, marked unhealthy", address);
                demoted.push(address.clone());
            }
        }

        demoted
    }
}
