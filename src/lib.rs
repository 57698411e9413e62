//! dbrelay - Primary/Replica MariaDB Operation Relay
//!
//! A node accepts database operations over HTTP, executes them against its
//! local MariaDB server and, when it is the primary, replicates each
//! successful operation to every registered replica.
//!
//! # Architecture
//!
//! Writes go through a bounded in-memory queue drained by a single
//! dispatcher. For each task the dispatcher probes every healthy replica and
//! delivers to the ones that answer, concurrently and without waiting for the
//! deliveries before moving on. A replica that fails a probe or a delivery is
//! marked unhealthy and stays that way until it registers again.
//!
//! Delivery is best effort. There is no durable log, no retry and no
//! consensus; the failover trigger is a placeholder that promotes a single
//! well-known address.
//!
//! # Features
//!
//! - Replica registry with last-write-wins health tracking
//! - Bounded replication queue with back-pressure on writers
//! - Pre-send liveness probes and a periodic health monitor
//! - Replica self-registration and a minimal failover trigger
//! - HTTP API for schema and row operations

pub mod config;
pub mod error;
pub mod state;
pub mod replication;
pub mod executor;
pub mod network;
pub mod api;
pub mod node;

pub use config::RelayConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RelayConfig;
    pub use crate::error::{Error, Result};
    pub use crate::node::NodeService;
    pub use crate::replication::{ReplicationDispatcher, ReplicationTask};
    pub use crate::state::{ReplicaHealth, ReplicaRegistry};
}
