use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::election::{Message, PeerMessage};
use crate::error::{QuorumError, Result};

/// Identity of a peer process within the election group.
pub type PeerId = u64;

/// Abstract peer group: registration, enumeration and fire-and-forget
/// message delivery. Join and leave events surface to every registered
/// member's mailbox as [`Message::MemberUp`] / [`Message::MemberDown`].
///
/// Delivery guarantees (reliability, per-peer ordering) are the backing
/// transport's concern; implementations drop messages addressed to unknown
/// or stopped peers.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Register a member and its mailbox with the group. Failure here aborts
    /// elector startup.
    async fn join(&self, id: PeerId, mailbox: mpsc::Sender<Message>) -> Result<()>;

    /// Remove a member from the group.
    async fn leave(&self, id: PeerId);

    /// Current peer set, queried fresh at call time since membership drifts.
    async fn enumerate(&self) -> Vec<PeerId>;

    /// One-way send to a single peer.
    async fn send(&self, to: PeerId, msg: PeerMessage);

    /// One-way send to every currently known peer except `from`.
    async fn broadcast(&self, from: PeerId, msg: PeerMessage);
}

/// In-memory peer directory for single-process clusters: demos, tests, and
/// anything that runs its electors inside one runtime.
#[derive(Debug, Default)]
pub struct LocalDirectory {
    members: RwLock<HashMap<PeerId, mpsc::Sender<Message>>>,
}

impl LocalDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn deliver(&self, to: PeerId, msg: Message) {
        let mailbox = self.members.read().await.get(&to).cloned();
        match mailbox {
            Some(tx) => {
                if tx.send(msg).await.is_err() {
                    tracing::trace!(peer = to, "Dropping message for stopped peer");
                }
            }
            None => {
                tracing::trace!(peer = to, "Dropping message for unknown peer");
            }
        }
    }
}

#[async_trait]
impl PeerDirectory for LocalDirectory {
    async fn join(&self, id: PeerId, mailbox: mpsc::Sender<Message>) -> Result<()> {
        let others: Vec<mpsc::Sender<Message>> = {
            let mut members = self.members.write().await;
            if members.contains_key(&id) {
                return Err(QuorumError::JoinFailed(format!(
                    "peer {id} is already registered"
                )));
            }
            members.insert(id, mailbox);
            members
                .iter()
                .filter(|(peer, _)| **peer != id)
                .map(|(_, tx)| tx.clone())
                .collect()
        };

        tracing::debug!(peer = id, "Peer joined the directory");
        for tx in others {
            let _ = tx.send(Message::MemberUp { peer: id }).await;
        }
        Ok(())
    }

    async fn leave(&self, id: PeerId) {
        let removed = self.members.write().await.remove(&id).is_some();
        if !removed {
            return;
        }

        tracing::debug!(peer = id, "Peer left the directory");
        let others: Vec<mpsc::Sender<Message>> =
            self.members.read().await.values().cloned().collect();
        for tx in others {
            let _ = tx.send(Message::MemberDown { peer: id }).await;
        }
    }

    async fn enumerate(&self) -> Vec<PeerId> {
        self.members.read().await.keys().copied().collect()
    }

    async fn send(&self, to: PeerId, msg: PeerMessage) {
        self.deliver(to, Message::Peer(msg)).await;
    }

    async fn broadcast(&self, from: PeerId, msg: PeerMessage) {
        let targets: Vec<mpsc::Sender<Message>> = {
            self.members
                .read()
                .await
                .iter()
                .filter(|(peer, _)| **peer != from)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in targets {
            let _ = tx.send(Message::Peer(msg.clone())).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailbox() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
        mpsc::channel(16)
    }

    #[tokio::test]
    async fn join_registers_and_notifies_existing_members() {
        let directory = LocalDirectory::new();
        let (tx1, mut rx1) = mailbox();
        let (tx2, _rx2) = mailbox();

        directory.join(1, tx1).await.unwrap();
        directory.join(2, tx2).await.unwrap();

        let mut peers = directory.enumerate().await;
        peers.sort_unstable();
        assert_eq!(peers, vec![1, 2]);

        let event = rx1.recv().await.unwrap();
        assert!(matches!(event, Message::MemberUp { peer: 2 }));
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let directory = LocalDirectory::new();
        let (tx, _rx) = mailbox();
        directory.join(1, tx.clone()).await.unwrap();

        let err = directory.join(1, tx).await.unwrap_err();
        assert!(matches!(err, QuorumError::JoinFailed(_)));
    }

    #[tokio::test]
    async fn leave_notifies_remaining_members() {
        let directory = LocalDirectory::new();
        let (tx1, mut rx1) = mailbox();
        let (tx2, _rx2) = mailbox();
        directory.join(1, tx1).await.unwrap();
        directory.join(2, tx2).await.unwrap();
        // Drain the MemberUp event for node 2.
        rx1.recv().await.unwrap();

        directory.leave(2).await;

        assert_eq!(directory.enumerate().await, vec![1]);
        let event = rx1.recv().await.unwrap();
        assert!(matches!(event, Message::MemberDown { peer: 2 }));
    }

    #[tokio::test]
    async fn broadcast_skips_the_sender() {
        let directory = LocalDirectory::new();
        let (tx1, mut rx1) = mailbox();
        let (tx2, mut rx2) = mailbox();
        directory.join(1, tx1).await.unwrap();
        directory.join(2, tx2).await.unwrap();
        rx1.recv().await.unwrap();

        directory
            .broadcast(
                1,
                PeerMessage::AnnounceCandidate {
                    candidate: 1,
                    term: 1,
                },
            )
            .await;

        let msg = rx2.recv().await.unwrap();
        assert!(matches!(
            msg,
            Message::Peer(PeerMessage::AnnounceCandidate {
                candidate: 1,
                term: 1
            })
        ));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_unknown_peer_is_dropped() {
        let directory = LocalDirectory::new();
        // Should not panic or error.
        directory
            .send(99, PeerMessage::CastVote { voter: 1, term: 1 })
            .await;
    }
}
