//! Raft-style leader election among a fixed set of cooperating peers.
//!
//! Implements only the leader-election subprotocol: term progression,
//! candidacy, vote counting, quorum detection and re-election on leader
//! loss. Log replication is out of scope.

pub mod cache;
pub mod config;
pub mod directory;
pub mod election;
pub mod error;
pub mod node;

pub use cache::LeadershipStatus;
pub use config::ElectorConfig;
pub use directory::{LocalDirectory, PeerDirectory, PeerId};
pub use election::{LeadershipChange, Role, StateSnapshot};
pub use error::{QuorumError, Result};
pub use node::Elector;
