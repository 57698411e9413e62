//! In-memory transport for tests

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::PeerTransport;
use crate::error::{Error, Result};
use crate::replication::{ReplicaAck, ReplicationTask};

/// Transport whose peers are switched up and down by the test
#[derive(Default)]
pub(crate) struct MockTransport {
    down: Mutex<HashSet<String>>,
    rejecting: Mutex<HashSet<String>>,
    delivered: Mutex<Vec<(String, ReplicationTask)>>,
    probes: Mutex<HashMap<String, usize>>,
    delivery_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make probes and deliveries to `address` fail
    pub fn take_down(&self, address: &str) {
        self.down.lock().unwrap().insert(address.to_string());
    }

    pub fn bring_up(&self, address: &str) {
        self.down.lock().unwrap().remove(address);
    }

    /// Probes succeed but deliveries fail with a 500
    pub fn reject_deliveries(&self, address: &str) {
        self.rejecting.lock().unwrap().insert(address.to_string());
    }

    pub fn set_delivery_delay(&self, delay: Duration) {
        *self.delivery_delay.lock().unwrap() = Some(delay);
    }

    /// Tasks delivered to `address`, in completion order
    pub fn delivered_to(&self, address: &str) -> Vec<ReplicationTask> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn delivery_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    pub fn probe_count(&self, address: &str) -> usize {
        self.probes.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    fn is_down(&self, address: &str) -> bool {
        self.down.lock().unwrap().contains(address)
    }
}

#[async_trait::async_trait]
impl PeerTransport for MockTransport {
    async fn probe(&self, address: &str, _timeout: Duration) -> Result<()> {
        *self.probes.lock().unwrap().entry(address.to_string()).or_insert(0) += 1;
        if self.is_down(address) {
            return Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn deliver(&self, address: &str, task: &ReplicationTask) -> Result<ReplicaAck> {
        let delay = *self.delivery_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.is_down(address) {
            return Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }
        if self.rejecting.lock().unwrap().contains(address) {
            return Err(Error::ReplicaRejected {
                address: address.to_string(),
                status: 500,
            });
        }

        self.delivered
            .lock()
            .unwrap()
            .push((address.to_string(), task.clone()));
        Ok(ReplicaAck::for_task(task, 1))
    }
}
