use tokio::sync::mpsc;

use crate::directory::PeerId;
use crate::election::LeadershipChange;

/// Configuration for a single elector process.
#[derive(Debug, Clone)]
pub struct ElectorConfig {
    /// Unique identity of this process within the peer group.
    pub node_id: PeerId,
    /// Expected peer count, used to compute the election quorum
    /// (`cluster_size / 2 + 1`).
    pub cluster_size: usize,
    /// Lower bound of the randomized delay before starting (or retrying) an
    /// election.
    pub election_timeout_min_ms: u64,
    /// Upper bound of the randomized election delay.
    pub election_timeout_max_ms: u64,
    /// How long a candidacy may run before the election restarts.
    pub election_check_ms: u64,
    /// Settle delay before reasserting leadership at a newly joined peer.
    pub assert_debounce_ms: u64,
    /// Capacity of the coordinator mailbox.
    pub mailbox_capacity: usize,
    /// Targets notified on every leadership change.
    pub subscriptions: Vec<mpsc::UnboundedSender<LeadershipChange>>,
}

impl Default for ElectorConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            cluster_size: 1,
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            election_check_ms: 300,
            assert_debounce_ms: 500,
            mailbox_capacity: 100,
            subscriptions: Vec::new(),
        }
    }
}

impl ElectorConfig {
    pub fn new(node_id: PeerId, cluster_size: usize) -> Self {
        Self {
            node_id,
            cluster_size,
            ..Default::default()
        }
    }

    pub fn with_election_timeout(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.election_timeout_min_ms = min_ms;
        self.election_timeout_max_ms = max_ms;
        self
    }

    pub fn with_subscription(mut self, tx: mpsc::UnboundedSender<LeadershipChange>) -> Self {
        self.subscriptions.push(tx);
        self
    }
}
