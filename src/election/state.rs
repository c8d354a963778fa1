use std::collections::HashSet;

use serde::Serialize;

use crate::directory::PeerId;

/// Election role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Candidate => write!(f, "candidate"),
            Role::Leader => write!(f, "leader"),
        }
    }
}

/// Read-only view of the election state, returned by the coordinator's
/// `Inspect` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub role: Role,
    pub term: u64,
    pub highest_seen_term: u64,
    pub voted_for: Option<PeerId>,
    pub votes_received: Vec<PeerId>,
    pub leader: Option<PeerId>,
    pub cluster_size: usize,
}

/// Per-process election state, exclusively owned and mutated by the
/// coordinator's message loop.
///
/// # Safety invariants
///
/// - `term` never decreases, and `highest_seen_term >= term` always holds.
/// - `voted_for` and `votes_received` are cleared whenever `term` advances,
///   so each process casts at most one vote per term.
/// - At most one `leader` is recorded for the latest known term; a strictly
///   newer term always supersedes it.
#[derive(Debug)]
pub struct ElectionState {
    pub role: Role,
    pub term: u64,
    /// Largest term observed in any processed message, stale ones included.
    /// Seeds new candidacies and drives the staleness filter.
    pub highest_seen_term: u64,
    pub voted_for: Option<PeerId>,
    pub votes_received: HashSet<PeerId>,
    pub leader: Option<PeerId>,
    /// Configured expected peer count, fixed for the process lifetime.
    pub cluster_size: usize,
}

impl ElectionState {
    pub fn new(cluster_size: usize) -> Self {
        Self {
            role: Role::Candidate,
            term: 0,
            highest_seen_term: 0,
            voted_for: None,
            votes_received: HashSet::new(),
            leader: None,
            cluster_size,
        }
    }

    /// Minimum vote count to win an election.
    pub fn quorum(&self) -> usize {
        self.cluster_size / 2 + 1
    }

    /// Record a term seen in an incoming message. Never lowers the watermark.
    pub fn observe_term(&mut self, term: u64) {
        if term > self.highest_seen_term {
            self.highest_seen_term = term;
        }
    }

    /// Whether a message at `term` is below the staleness watermark.
    pub fn is_stale(&self, term: u64) -> bool {
        term < self.highest_seen_term
    }

    /// Move to `term` if it is newer, resetting per-term vote bookkeeping
    /// and any leader recorded for the superseded term.
    pub fn advance_term(&mut self, term: u64) {
        if term > self.term {
            self.term = term;
            self.voted_for = None;
            self.votes_received.clear();
            self.leader = None;
        }
        self.observe_term(term);
    }

    /// Begin a candidacy at the next unseen term. Returns the new term.
    pub fn become_candidate(&mut self, my_id: PeerId) -> u64 {
        let term = self.highest_seen_term + 1;
        self.advance_term(term);
        self.role = Role::Candidate;
        self.voted_for = Some(my_id);
        term
    }

    pub fn become_leader(&mut self, my_id: PeerId) {
        self.role = Role::Leader;
        self.leader = Some(my_id);
    }

    /// Tally including the implicit self-vote.
    pub fn vote_count(&self) -> usize {
        self.votes_received.len() + 1
    }

    pub fn has_quorum(&self) -> bool {
        self.vote_count() >= self.quorum()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let mut votes_received: Vec<PeerId> = self.votes_received.iter().copied().collect();
        votes_received.sort_unstable();
        StateSnapshot {
            role: self.role,
            term: self.term,
            highest_seen_term: self.highest_seen_term,
            voted_for: self.voted_for,
            votes_received,
            leader: self.leader,
            cluster_size: self.cluster_size,
        }
    }
}
