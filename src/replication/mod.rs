//! Replication Module
//!
//! Carries committed writes from the primary to its replicas: the task model,
//! the replica wire protocol, the dispatch queue and the health monitor.

pub mod protocol;
mod task;
mod dispatcher;
mod health;

pub use task::{quote_ident, qualified, OperationKind, ReplicationTask};
pub use protocol::{ReplicaAck, ReplicaRequest};
pub use dispatcher::{DispatchStatsSnapshot, DispatchWorker, ReplicationDispatcher};
pub use health::HealthMonitor;
