//! Failover Trigger
//!
//! Watches the primary from a non-primary node and, when it stops answering,
//! runs a placeholder election: the node becomes a candidate, waits a settle
//! period, and takes over only if it is the well-known primary address.
//! There is no quorum and no term; this is not a consensus protocol.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::FailoverConfig;
use crate::network::PeerTransport;
use crate::state::{NodeRole, RoleState};

/// Outcome of one failover check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// This node is the primary; nothing to watch
    AlreadyPrimary,
    /// The primary answered its probe
    PrimaryAlive,
    /// Another election is still running on this node
    ElectionInProgress,
    /// This node took over as primary
    Promoted,
    /// Election finished without promotion
    NotEligible,
}

/// Periodic primary prober with a guarded election stub
pub struct FailoverTrigger {
    role: Arc<RoleState>,
    transport: Arc<dyn PeerTransport>,
    config: FailoverConfig,
    election_in_progress: AtomicBool,
}

impl FailoverTrigger {
    /// Create a failover trigger
    pub fn new(role: Arc<RoleState>, transport: Arc<dyn PeerTransport>, config: FailoverConfig) -> Self {
        Self {
            role,
            transport,
            config,
            election_in_progress: AtomicBool::new(false),
        }
    }

    /// Check the primary forever at the configured interval
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            "Failover trigger watching primary every {:?}",
            self.config.probe_interval()
        );

        let mut ticker = tokio::time::interval(self.config.probe_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.check_primary().await == FailoverOutcome::AlreadyPrimary {
                tracing::debug!("Node is primary, failover trigger idle");
            }
        }
    }

    /// Probe the primary once and start an election if it is gone
    pub async fn check_primary(&self) -> FailoverOutcome {
        if self.role.is_primary().await {
            return FailoverOutcome::AlreadyPrimary;
        }

        let primary = self.role.primary_address().await;
        let timeout = self.config.probe_timeout();
        let probe = tokio::time::timeout(timeout, self.transport.probe(&primary, timeout)).await;

        match probe {
            Ok(Ok(())) => FailoverOutcome::PrimaryAlive,
            Ok(Err(e)) => {
                tracing::warn!("Primary {} is unreachable: {}", primary, e);
                self.start_election().await
            }
            Err(_) => {
                tracing::warn!("Primary {} did not answer within {:?}", primary, timeout);
                self.start_election().await
            }
        }
    }

    /// Run the election stub unless one is already running
    pub async fn start_election(&self) -> FailoverOutcome {
        if self
            .election_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Election already in progress");
            return FailoverOutcome::ElectionInProgress;
        }

        self.role.become_candidate().await;
        tracing::info!("Starting election as {}", self.role.self_address());

        tokio::time::sleep(self.config.settle()).await;

        let outcome = if self.role.self_address() == self.config.well_known_primary {
            self.role.promote_to_primary().await;
            tracing::info!("Promoted {} to primary", self.role.self_address());
            FailoverOutcome::Promoted
        } else {
            self.role.become_follower().await;
            tracing::info!(
                "Election finished, {} is not the designated primary {}",
                self.role.self_address(),
                self.config.well_known_primary
            );
            FailoverOutcome::NotEligible
        };

        self.election_in_progress.store(false, Ordering::Release);
        outcome
    }

    /// Current role of this node
    pub async fn role(&self) -> NodeRole {
        self.role.role().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::mock::MockTransport;

    const PRIMARY: &str = "http://localhost:8083";
    const REPLICA: &str = "http://localhost:8084";

    fn trigger(self_address: &str, transport: &Arc<MockTransport>) -> FailoverTrigger {
        let role = Arc::new(RoleState::new(
            self_address.to_string(),
            NodeRole::Follower,
            PRIMARY.to_string(),
        ));
        let config = FailoverConfig {
            settle_ms: 50,
            probe_timeout_ms: 200,
            well_known_primary: PRIMARY.to_string(),
            ..Default::default()
        };
        FailoverTrigger::new(role, Arc::clone(transport) as Arc<dyn PeerTransport>, config)
    }

    #[tokio::test]
    async fn test_live_primary_leaves_role_alone() {
        let transport = Arc::new(MockTransport::new());
        let trigger = trigger(REPLICA, &transport);

        assert_eq!(trigger.check_primary().await, FailoverOutcome::PrimaryAlive);
        assert_eq!(trigger.role().await, NodeRole::Follower);
        assert_eq!(transport.probe_count(PRIMARY), 1);
    }

    #[tokio::test]
    async fn test_ineligible_node_returns_to_follower() {
        let transport = Arc::new(MockTransport::new());
        transport.take_down(PRIMARY);
        let trigger = trigger(REPLICA, &transport);

        assert_eq!(trigger.check_primary().await, FailoverOutcome::NotEligible);
        assert_eq!(trigger.role().await, NodeRole::Follower);

        // Guard released: a later check runs a fresh election.
        assert_eq!(trigger.check_primary().await, FailoverOutcome::NotEligible);
    }

    #[tokio::test]
    async fn test_well_known_address_is_promoted() {
        let transport = Arc::new(MockTransport::new());
        transport.take_down(PRIMARY);
        let trigger = trigger(PRIMARY, &transport);

        assert_eq!(trigger.start_election().await, FailoverOutcome::Promoted);
        assert_eq!(trigger.role().await, NodeRole::Leader);
        assert_eq!(trigger.role.primary_address().await, PRIMARY);

        // Primary nodes stop probing.
        assert_eq!(trigger.check_primary().await, FailoverOutcome::AlreadyPrimary);
        assert_eq!(transport.probe_count(PRIMARY), 0);
    }

    #[tokio::test]
    async fn test_concurrent_election_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        let trigger = Arc::new(trigger(REPLICA, &transport));

        let first = {
            let trigger = Arc::clone(&trigger);
            tokio::spawn(async move { trigger.start_election().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(trigger.role().await, NodeRole::Candidate);
        assert_eq!(trigger.start_election().await, FailoverOutcome::ElectionInProgress);
        assert_eq!(first.await.unwrap(), FailoverOutcome::NotEligible);
    }
}
