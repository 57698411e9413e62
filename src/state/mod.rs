//! State Management Module
//!
//! In-memory node state: the replica registry, this node's role and the
//! failover trigger that can change it.

mod registry;
mod role;
pub mod failover;

pub use registry::{ReplicaHealth, ReplicaRecord, ReplicaRegistry};
pub use role::{NodeRole, RoleState};
pub use failover::{FailoverOutcome, FailoverTrigger};
