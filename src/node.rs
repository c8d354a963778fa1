use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::cache::LeadershipStatus;
use crate::config::ElectorConfig;
use crate::directory::{PeerDirectory, PeerId};
use crate::election::coordinator::Coordinator;
use crate::election::{Message, PeerMessage, StateSnapshot};
use crate::error::{QuorumError, Result};

/// Handle to a running elector process: the coordinator task plus the
/// directory registration and the leadership flag.
///
/// All protocol sends are fire-and-forget. Only `inspect` waits for an
/// answer, and only `is_leader` is synchronous.
pub struct Elector {
    id: PeerId,
    mailbox: mpsc::Sender<Message>,
    status: LeadershipStatus,
    directory: Arc<dyn PeerDirectory>,
    shutdown: CancellationToken,
}

impl Elector {
    /// Join the peer directory and start the election coordinator.
    ///
    /// Failing to join the directory is the only unrecoverable startup
    /// condition and aborts initialization.
    pub async fn spawn(config: ElectorConfig, directory: Arc<dyn PeerDirectory>) -> Result<Self> {
        let (mailbox, rx) = mpsc::channel(config.mailbox_capacity);
        let status = LeadershipStatus::new();
        let shutdown = CancellationToken::new();

        directory.join(config.node_id, mailbox.clone()).await?;

        let node_id = config.node_id;
        let coordinator = Coordinator::new(
            config,
            Arc::clone(&directory),
            status.clone(),
            mailbox.clone(),
        );
        tokio::spawn(coordinator.run(rx, shutdown.clone()));

        tracing::info!(node_id, "Elector started");
        Ok(Self {
            id: node_id,
            mailbox,
            status,
            directory,
            shutdown,
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Synchronous, non-blocking leadership check against the process-wide
    /// flag. Never touches the coordinator mailbox.
    pub fn is_leader(&self) -> bool {
        self.status.is_leader()
    }

    /// A cheap clone of the leadership flag, for handing to hot paths that
    /// should not hold the elector itself.
    pub fn status(&self) -> LeadershipStatus {
        self.status.clone()
    }

    /// Snapshot of the full election state.
    pub async fn inspect(&self) -> Result<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(Message::Inspect { reply })
            .await
            .map_err(|_| QuorumError::CoordinatorStopped)?;
        rx.await.map_err(|_| QuorumError::CoordinatorStopped)
    }

    /// Ask `target` who it believes the leader is.
    pub async fn leader_check(&self, target: PeerId) {
        self.directory
            .send(target, PeerMessage::LeaderCheck { requester: self.id })
            .await;
    }

    /// Tell `target` that this process leads `term`.
    pub async fn notify_of_leader(&self, target: PeerId, term: u64) {
        self.directory
            .send(
                target,
                PeerMessage::NotifyOfLeader {
                    leader: self.id,
                    term,
                },
            )
            .await;
    }

    /// Solicit `target`'s vote for this process at `term`.
    pub async fn announce_candidate(&self, target: PeerId, term: u64) {
        self.directory
            .send(
                target,
                PeerMessage::AnnounceCandidate {
                    candidate: self.id,
                    term,
                },
            )
            .await;
    }

    /// Cast this process's vote for `target` at `term`.
    pub async fn vote_for(&self, target: PeerId, term: u64) {
        self.directory
            .send(
                target,
                PeerMessage::CastVote {
                    voter: self.id,
                    term,
                },
            )
            .await;
    }

    /// Announce to `target` that this process won `term`.
    pub async fn new_leader(&self, target: PeerId, term: u64) {
        self.directory
            .send(
                target,
                PeerMessage::NewLeader {
                    leader: self.id,
                    term,
                },
            )
            .await;
    }

    /// Stop the coordinator and leave the peer group, letting the remaining
    /// peers re-elect if this process led.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.directory.leave(self.id).await;
        tracing::info!(node_id = self.id, "Elector stopped");
    }
}
