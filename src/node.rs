//! Node Service
//!
//! Everything a running node needs, held in one place and handed to the HTTP
//! layer. Writes execute locally first; only a successful local write is
//! queued for replication.

use std::sync::Arc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::executor::{JsonRow, MariaDbExecutor};
use crate::replication::{DispatchStatsSnapshot, ReplicaAck, ReplicationDispatcher, ReplicationTask};
use crate::state::{NodeRole, ReplicaRecord, ReplicaRegistry, RoleState};

/// Point-in-time report served on `/status`
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub address: String,
    pub role: NodeRole,
    pub primary_address: String,
    pub database_healthy: bool,
    pub queue_pending: usize,
    pub queue_capacity: usize,
    pub dispatch: DispatchStatsSnapshot,
    pub replicas: Vec<ReplicaRecord>,
}

/// Shared service object behind the HTTP handlers
pub struct NodeService {
    executor: Arc<MariaDbExecutor>,
    registry: Arc<ReplicaRegistry>,
    dispatcher: ReplicationDispatcher,
    role: Arc<RoleState>,
}

impl NodeService {
    /// Create a node service from its parts
    pub fn new(
        executor: Arc<MariaDbExecutor>,
        registry: Arc<ReplicaRegistry>,
        dispatcher: ReplicationDispatcher,
        role: Arc<RoleState>,
    ) -> Self {
        Self {
            executor,
            registry,
            dispatcher,
            role,
        }
    }

    /// Accept a client write: execute it here, then queue it for the replicas.
    ///
    /// Waits while the replication queue is full.
    pub async fn execute_write(&self, task: ReplicationTask) -> Result<u64> {
        task.validate()?;

        if !self.role.is_primary().await {
            return Err(Error::NotPrimary(self.role.primary_address().await));
        }

        let rows = self.apply_local(&task).await?;
        tracing::info!("Applied {} on {}, queueing for replicas", task.kind(), task.database());

        self.dispatcher.enqueue(task).await?;
        Ok(rows)
    }

    /// Apply a task pushed by the primary. Never re-queued.
    pub async fn apply_replicated(&self, task: ReplicationTask) -> Result<ReplicaAck> {
        task.validate()?;
        let rows = self.apply_local(&task).await?;
        tracing::debug!("Applied replicated {} on {}", task.kind(), task.database());
        Ok(ReplicaAck::for_task(&task, rows))
    }

    /// Read all rows of a table
    pub async fn select(&self, dbname: &str, table: &str) -> Result<Vec<JsonRow>> {
        if dbname.is_empty() || table.is_empty() {
            return Err(Error::Validation(
                "Both dbname and table parameters are required".into(),
            ));
        }

        self.executor
            .select(dbname, table)
            .await
            .map_err(|e| local_failure("query records", e))
    }

    /// Record a replica as healthy
    pub async fn register_replica(&self, address: &str) -> Result<()> {
        let address = address.trim();
        if address.is_empty() {
            return Err(Error::Validation("Replica address is required".into()));
        }

        self.registry.register(address).await;
        Ok(())
    }

    /// Current role, queue and replica view
    pub async fn status(&self) -> NodeStatus {
        NodeStatus {
            address: self.role.self_address().to_string(),
            role: self.role.role().await,
            primary_address: self.role.primary_address().await,
            database_healthy: matches!(self.executor.health_check().await, Ok(true)),
            queue_pending: self.dispatcher.pending(),
            queue_capacity: self.dispatcher.capacity(),
            dispatch: self.dispatcher.stats(),
            replicas: self.registry.snapshot().await,
        }
    }

    async fn apply_local(&self, task: &ReplicationTask) -> Result<u64> {
        let kind = task.kind();
        self.executor
            .execute(&task.to_sql())
            .await
            .map_err(|e| local_failure(kind.action(), e))
    }
}

/// Wrap an engine error as a local execution failure
fn local_failure(action: &str, err: Error) -> Error {
    let reason = match err {
        Error::Database(sqlx::Error::Database(db)) => db.message().to_string(),
        Error::Database(other) => other.to_string(),
        other => other.to_string(),
    };
    tracing::warn!("Failed to {}: {}", action, reason);
    Error::LocalExecution {
        action: action.to_string(),
        reason,
    }
}
