//! Replication Dispatcher
//!
//! A bounded queue of replication tasks drained by a single worker. For each
//! task the worker probes every healthy replica and hands the delivery to a
//! bounded group of concurrent RPCs; it moves on to the next task without
//! waiting for those RPCs to finish. Completed deliveries are collected inside
//! the same loop, where failures mark the replica unhealthy.
//!
//! Delivery is best effort: a popped task is never retried or re-queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};

use super::protocol::ReplicaAck;
use super::task::{OperationKind, ReplicationTask};
use crate::config::ReplicationConfig;
use crate::error::{Error, Result};
use crate::network::PeerTransport;
use crate::state::{ReplicaRecord, ReplicaRegistry};

/// Counters shared between the dispatcher handle and its worker
#[derive(Debug, Default)]
pub struct DispatchStats {
    tasks_dispatched: AtomicU64,
    deliveries_started: AtomicU64,
    deliveries_succeeded: AtomicU64,
    deliveries_failed: AtomicU64,
    probes_failed: AtomicU64,
}

/// Point-in-time view of the dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub tasks_dispatched: u64,
    pub deliveries_started: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub deliveries_in_flight: u64,
    pub probes_failed: u64,
}

impl DispatchStats {
    fn snapshot(&self) -> DispatchStatsSnapshot {
        let started = self.deliveries_started.load(Ordering::Relaxed);
        let succeeded = self.deliveries_succeeded.load(Ordering::Relaxed);
        let failed = self.deliveries_failed.load(Ordering::Relaxed);
        DispatchStatsSnapshot {
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            deliveries_started: started,
            deliveries_succeeded: succeeded,
            deliveries_failed: failed,
            deliveries_in_flight: started.saturating_sub(succeeded + failed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the replication queue
#[derive(Clone)]
pub struct ReplicationDispatcher {
    tx: mpsc::Sender<ReplicationTask>,
    stats: Arc<DispatchStats>,
}

impl ReplicationDispatcher {
    /// Create the queue and the worker that drains it.
    ///
    /// The worker does nothing until [`DispatchWorker::run`] is spawned.
    pub fn new(
        config: &ReplicationConfig,
        registry: Arc<ReplicaRegistry>,
        transport: Arc<dyn PeerTransport>,
    ) -> (Self, DispatchWorker) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(DispatchStats::default());

        let worker = DispatchWorker {
            rx,
            registry,
            transport,
            probe_timeout: config.probe_timeout(),
            delivery_timeout: config.delivery_timeout(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_deliveries.max(1))),
            in_flight: JoinSet::new(),
            stats: Arc::clone(&stats),
        };

        (Self { tx, stats }, worker)
    }

    /// Append a task, waiting for room while the queue is full
    pub async fn enqueue(&self, task: ReplicationTask) -> Result<()> {
        if self.tx.capacity() == 0 {
            tracing::warn!(
                "Replication queue full ({} tasks), {} write waits for the dispatcher",
                self.tx.max_capacity(),
                task.kind()
            );
        }
        self.tx.send(task).await.map_err(|_| Error::QueueClosed)
    }

    /// Tasks waiting to be dispatched
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Current dispatch counters
    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Result of one replica RPC, reaped by the worker
struct DeliveryOutcome {
    address: String,
    kind: OperationKind,
    result: Result<ReplicaAck>,
}

/// Single consumer of the replication queue
pub struct DispatchWorker {
    rx: mpsc::Receiver<ReplicationTask>,
    registry: Arc<ReplicaRegistry>,
    transport: Arc<dyn PeerTransport>,
    probe_timeout: Duration,
    delivery_timeout: Duration,
    limiter: Arc<Semaphore>,
    in_flight: JoinSet<DeliveryOutcome>,
    stats: Arc<DispatchStats>,
}

impl DispatchWorker {
    /// Drain the queue until every producer handle is dropped
    pub async fn run(mut self) {
        tracing::info!("Replication dispatcher started");

        loop {
            tokio::select! {
                biased;
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.settle(joined).await;
                }
                next = self.rx.recv() => match next {
                    Some(task) => self.dispatch(task).await,
                    None => break,
                },
            }
        }

        while let Some(joined) = self.in_flight.join_next().await {
            self.settle(joined).await;
        }

        tracing::info!("Replication dispatcher stopped");
    }

    /// Probe each healthy replica and start delivery to the ones that answer
    async fn dispatch(&mut self, task: ReplicationTask) {
        self.stats.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
        let kind = task.kind();

        let targets: Vec<ReplicaRecord> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .filter(ReplicaRecord::is_healthy)
            .collect();

        if targets.is_empty() {
            tracing::debug!("No healthy replicas, {} task on {} not replicated", kind, task.database());
            return;
        }

        let task = Arc::new(task);
        for replica in targets {
            let address = replica.address;

            let probe = tokio::time::timeout(self.probe_timeout, self.transport.probe(&address, self.probe_timeout))
                .await
                .unwrap_or_else(|_| Err(Error::ConnectionTimeout(address.clone())));

            if let Err(e) = probe {
                self.stats.probes_failed.fetch_add(1, Ordering::Relaxed);
                self.registry.mark_unhealthy(&address).await;
                tracing::warn!("Replica {} failed pre-send probe, marked unhealthy: {}", address, e);
                continue;
            }

            let permit = match Arc::clone(&self.limiter).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::error!("Delivery limiter closed, dropping {} task", kind);
                    return;
                }
            };

            let transport = Arc::clone(&self.transport);
            let task = Arc::clone(&task);
            let timeout = self.delivery_timeout;
            self.stats.deliveries_started.fetch_add(1, Ordering::Relaxed);

            self.in_flight.spawn(async move {
                let result = tokio::time::timeout(timeout, transport.deliver(&address, &task))
                    .await
                    .unwrap_or_else(|_| Err(Error::ConnectionTimeout(address.clone())));
                drop(permit);
                DeliveryOutcome { address, kind, result }
            });
        }
    }

    /// Apply the outcome of a finished delivery
    async fn settle(&self, joined: std::result::Result<DeliveryOutcome, JoinError>) {
        match joined {
            Ok(DeliveryOutcome { address, kind, result: Ok(ack) }) => {
                self.stats.deliveries_succeeded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Replicated {} to {}: {}", kind, address, ack.message);
            }
            Ok(DeliveryOutcome { address, kind, result: Err(e) }) => {
                self.stats.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                self.registry.mark_unhealthy(&address).await;
                tracing::warn!("Failed to replicate {} to {}, marked unhealthy: {}", kind, address, e);
            }
            Err(e) => {
                self.stats.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Delivery task aborted: {}", e);
            }
        }
    }
}
