use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::cache::LeadershipStatus;
use crate::config::ElectorConfig;
use crate::directory::{PeerDirectory, PeerId};
use crate::election::protocol::{self, Effect};
use crate::election::state::{ElectionState, Role, StateSnapshot};
use crate::election::timer::{random_election_delay, schedule};

/// Wire protocol between peers. All sends are one-way and fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    /// Ask the receiver who it believes the leader is.
    LeaderCheck { requester: PeerId },
    /// Point-to-point answer to `LeaderCheck`.
    NotifyOfLeader { leader: PeerId, term: u64 },
    /// Broadcast by a freshly elected (or reasserting) leader.
    NewLeader { leader: PeerId, term: u64 },
    /// Vote solicitation from a candidate.
    AnnounceCandidate { candidate: PeerId, term: u64 },
    /// Vote granted to a candidate.
    CastVote { voter: PeerId, term: u64 },
}

/// Everything that can land in the coordinator's mailbox. Protocol traffic,
/// timer firings and membership events are processed strictly sequentially,
/// so the election state needs no internal locking.
#[derive(Debug)]
pub enum Message {
    Peer(PeerMessage),
    /// Timer: begin a candidacy unless a leader emerged since scheduling.
    StartElection { term: u64 },
    /// Timer: restart the election if the candidacy at `term` stalled.
    CheckElectionStatus { term: u64 },
    /// Timer: rebroadcast leadership so stragglers converge.
    AssertLeader,
    /// A peer joined the directory.
    MemberUp { peer: PeerId },
    /// A peer left the directory.
    MemberDown { peer: PeerId },
    /// Read-only state snapshot, no mutation.
    Inspect {
        reply: oneshot::Sender<StateSnapshot>,
    },
}

/// Emitted to subscribers whenever the known leader changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadershipChange {
    pub leader: Option<PeerId>,
    pub term: u64,
}

/// The election coordinator: a single-actor state machine owning all
/// election state. It mirrors role changes into the [`LeadershipStatus`]
/// flag inline, before notifying subscribers.
pub(crate) struct Coordinator {
    id: PeerId,
    state: ElectionState,
    config: ElectorConfig,
    directory: Arc<dyn PeerDirectory>,
    status: LeadershipStatus,
    self_tx: mpsc::Sender<Message>,
    subscriptions: Vec<mpsc::UnboundedSender<LeadershipChange>>,
}

impl Coordinator {
    pub(crate) fn new(
        config: ElectorConfig,
        directory: Arc<dyn PeerDirectory>,
        status: LeadershipStatus,
        self_tx: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            id: config.node_id,
            state: ElectionState::new(config.cluster_size),
            subscriptions: config.subscriptions.clone(),
            config,
            directory,
            status,
            self_tx,
        }
    }

    /// Run the coordinator main loop until shutdown or mailbox closure.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Message>, shutdown: CancellationToken) {
        // The first candidacy kicks off after randomized jitter, like every
        // later retry.
        self.schedule_start_election();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(node_id = self.id, "Coordinator shutting down");
                    break;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(msg) => self.handle(msg).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle(&mut self, msg: Message) {
        match msg {
            Message::Peer(peer_msg) => self.handle_peer(peer_msg).await,
            Message::StartElection { term } => {
                let effect = protocol::handle_start_election(&mut self.state, term, self.id);
                if !matches!(effect, Effect::None) {
                    tracing::info!(node_id = self.id, term = self.state.term, "Starting election");
                }
                self.apply(effect).await;
            }
            Message::CheckElectionStatus { term } => {
                if protocol::handle_check_election(&self.state, term) {
                    tracing::debug!(
                        node_id = self.id,
                        term,
                        votes = self.state.vote_count(),
                        needed = self.state.quorum(),
                        "Election inconclusive, retrying with fresh jitter"
                    );
                    self.schedule_start_election();
                }
            }
            Message::AssertLeader => {
                if self.state.role == Role::Leader {
                    self.directory
                        .broadcast(
                            self.id,
                            PeerMessage::NewLeader {
                                leader: self.id,
                                term: self.state.term,
                            },
                        )
                        .await;
                }
            }
            Message::MemberUp { peer } => {
                tracing::debug!(node_id = self.id, peer, "Peer joined the group");
                // Let the newcomer settle, then reassert leadership. This
                // also resolves residual duplicate leaders after a
                // partition heals.
                schedule(
                    self.self_tx.clone(),
                    Duration::from_millis(self.config.assert_debounce_ms),
                    Message::AssertLeader,
                );
            }
            Message::MemberDown { peer } => {
                if protocol::handle_member_down(&mut self.state, peer) {
                    tracing::info!(
                        node_id = self.id,
                        peer,
                        "Leader left the group, triggering re-election"
                    );
                    self.sync_status();
                    self.notify(None, self.state.term);
                    self.schedule_start_election();
                } else {
                    tracing::debug!(node_id = self.id, peer, "Peer left the group");
                }
            }
            Message::Inspect { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
        }
    }

    async fn handle_peer(&mut self, msg: PeerMessage) {
        let effect = match msg {
            PeerMessage::LeaderCheck { requester } => {
                protocol::handle_leader_check(&self.state, requester)
            }
            PeerMessage::NotifyOfLeader { leader, term }
            | PeerMessage::NewLeader { leader, term } => {
                protocol::handle_leader_announcement(&mut self.state, leader, term, self.id)
            }
            PeerMessage::AnnounceCandidate { candidate, term } => {
                protocol::handle_announce_candidate(&mut self.state, candidate, term, self.id)
            }
            PeerMessage::CastVote { voter, term } => {
                protocol::handle_cast_vote(&mut self.state, voter, term, self.id)
            }
        };
        self.apply(effect).await;
    }

    /// Carry out the side effects a pure handler requested. The leadership
    /// flag is synced first, within the same handler invocation that changed
    /// the role.
    async fn apply(&mut self, effect: Effect) {
        self.sync_status();
        match effect {
            Effect::None => {}
            Effect::SendVote { to, term } => {
                self.directory
                    .send(
                        to,
                        PeerMessage::CastVote {
                            voter: self.id,
                            term,
                        },
                    )
                    .await;
            }
            Effect::SendLeader { to, leader, term } => {
                self.directory
                    .send(to, PeerMessage::NotifyOfLeader { leader, term })
                    .await;
            }
            Effect::Candidacy { term } => {
                self.directory
                    .broadcast(
                        self.id,
                        PeerMessage::AnnounceCandidate {
                            candidate: self.id,
                            term,
                        },
                    )
                    .await;
                schedule(
                    self.self_tx.clone(),
                    Duration::from_millis(self.config.election_check_ms),
                    Message::CheckElectionStatus { term },
                );
            }
            Effect::BecameLeader { term } => {
                tracing::info!(
                    node_id = self.id,
                    term,
                    votes = self.state.vote_count(),
                    "Won election, becoming leader"
                );
                self.directory
                    .broadcast(
                        self.id,
                        PeerMessage::NewLeader {
                            leader: self.id,
                            term,
                        },
                    )
                    .await;
                self.notify(Some(self.id), term);
            }
            Effect::LeaderChanged { leader, term } => {
                self.notify(leader, term);
            }
        }
    }

    fn schedule_start_election(&self) {
        let delay = random_election_delay(
            self.config.election_timeout_min_ms,
            self.config.election_timeout_max_ms,
        );
        schedule(
            self.self_tx.clone(),
            delay,
            Message::StartElection {
                term: self.state.term,
            },
        );
    }

    fn sync_status(&self) {
        self.status.set(self.state.role == Role::Leader);
    }

    fn notify(&mut self, leader: Option<PeerId>, term: u64) {
        self.subscriptions
            .retain(|tx| tx.send(LeadershipChange { leader, term }).is_ok());
    }
}
