//! Node Role
//!
//! Local view of this node's role and of which address is the primary.

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::StartupRole;

/// Role of this node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Mirrors the primary
    Follower,
    /// Running the failover stub
    Candidate,
    /// Accepts writes and replicates them
    Leader,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Leader => write!(f, "LEADER"),
            NodeRole::Follower => write!(f, "FOLLOWER"),
            NodeRole::Candidate => write!(f, "CANDIDATE"),
        }
    }
}

#[derive(Debug, Clone)]
struct RoleInner {
    role: NodeRole,
    primary_address: String,
}

/// Role and primary address, updated together
pub struct RoleState {
    self_address: String,
    inner: RwLock<RoleInner>,
}

impl RoleState {
    /// Create role state for a node
    pub fn new(self_address: String, role: NodeRole, primary_address: String) -> Self {
        Self {
            self_address,
            inner: RwLock::new(RoleInner { role, primary_address }),
        }
    }

    /// Create role state from the configured startup role
    pub fn from_startup(self_address: String, startup: StartupRole, primary_address: String) -> Self {
        match startup {
            StartupRole::Primary => {
                let me = self_address.clone();
                Self::new(self_address, NodeRole::Leader, me)
            }
            StartupRole::Replica => Self::new(self_address, NodeRole::Follower, primary_address),
        }
    }

    /// This node's advertised address
    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Current role
    pub async fn role(&self) -> NodeRole {
        self.inner.read().await.role
    }

    /// Check if this node currently accepts writes
    pub async fn is_primary(&self) -> bool {
        self.role().await == NodeRole::Leader
    }

    /// Address this node believes is the primary
    pub async fn primary_address(&self) -> String {
        self.inner.read().await.primary_address.clone()
    }

    /// Enter the candidate role
    pub async fn become_candidate(&self) {
        self.inner.write().await.role = NodeRole::Candidate;
    }

    /// Take over as primary
    pub async fn promote_to_primary(&self) {
        let mut inner = self.inner.write().await;
        inner.role = NodeRole::Leader;
        inner.primary_address = self.self_address.clone();
    }

    /// Return to following the current primary address
    pub async fn become_follower(&self) {
        self.inner.write().await.role = NodeRole::Follower;
    }
}
