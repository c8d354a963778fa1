//! Pure protocol handlers.
//!
//! Each handler mutates [`ElectionState`] and returns the [`Effect`] the
//! coordinator should carry out (sends, broadcasts, cache and subscriber
//! updates). Keeping the decision logic free of I/O makes every transition
//! directly testable.
//!
//! Term comparison is the sole arbiter, uniformly: a strictly greater term
//! always preempts local state (including demoting a leader), equal terms
//! are accepted only under handler-specific conditions, and anything below
//! the highest seen term is silently discarded.

use crate::directory::PeerId;
use crate::election::state::{ElectionState, Role};

/// Side effect requested by a protocol handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Reply `CastVote(self, term)` to a soliciting candidate.
    SendVote { to: PeerId, term: u64 },
    /// Reply `NotifyOfLeader(leader, term)` to a `LeaderCheck` requester.
    SendLeader { to: PeerId, leader: PeerId, term: u64 },
    /// A candidacy began: broadcast `AnnounceCandidate` and schedule the
    /// election status check.
    Candidacy { term: u64 },
    /// Quorum reached: broadcast `NewLeader`, raise the leadership flag and
    /// notify subscribers.
    BecameLeader { term: u64 },
    /// The known leader changed (adopted or lost): sync the leadership flag
    /// and notify subscribers.
    LeaderChanged { leader: Option<PeerId>, term: u64 },
}

/// `LeaderCheck`: answer with the known leader, or stay silent.
pub fn handle_leader_check(state: &ElectionState, requester: PeerId) -> Effect {
    match state.leader {
        Some(leader) => Effect::SendLeader {
            to: requester,
            leader,
            term: state.term,
        },
        None => Effect::None,
    }
}

/// `NotifyOfLeader` / `NewLeader`: adopt the announced leader unless the
/// announcement is below the highest seen term. A strictly newer term always
/// demotes a current leader.
pub fn handle_leader_announcement(
    state: &mut ElectionState,
    leader: PeerId,
    term: u64,
    my_id: PeerId,
) -> Effect {
    if state.is_stale(term) {
        tracing::trace!(leader, term, "Ignoring stale leader announcement");
        return Effect::None;
    }
    state.observe_term(term);

    if state.leader == Some(leader) && state.term == term {
        // Periodic reassertion of a leader we already follow.
        return Effect::None;
    }

    state.advance_term(term);
    state.voted_for = None;
    state.votes_received.clear();
    state.leader = Some(leader);
    state.role = if leader == my_id {
        Role::Leader
    } else {
        Role::Follower
    };

    tracing::info!(leader, term, "Adopted leader");
    Effect::LeaderChanged {
        leader: Some(leader),
        term,
    }
}

/// `AnnounceCandidate`: grant the vote for a strictly newer term
/// unconditionally (stepping down to follower), or for the current term when
/// no conflicting vote was cast. At most one vote per term.
pub fn handle_announce_candidate(
    state: &mut ElectionState,
    candidate: PeerId,
    term: u64,
    my_id: PeerId,
) -> Effect {
    if state.is_stale(term) || term < state.term {
        tracing::trace!(candidate, term, "Ignoring stale candidacy");
        return Effect::None;
    }
    state.observe_term(term);

    let granted = if term > state.term {
        state.advance_term(term);
        if candidate != my_id {
            state.role = Role::Follower;
        }
        true
    } else {
        state.voted_for.is_none() || state.voted_for == Some(candidate)
    };

    tracing::debug!(candidate, term, granted, "Vote solicitation");

    if granted {
        state.voted_for = Some(candidate);
        Effect::SendVote {
            to: candidate,
            term,
        }
    } else {
        Effect::None
    }
}

/// `CastVote`: count the vote while a candidacy at exactly this term is in
/// flight; transition to leader the moment quorum is reached. A candidate
/// becomes leader at most once per term, since the first transition leaves
/// the candidate role.
pub fn handle_cast_vote(
    state: &mut ElectionState,
    voter: PeerId,
    term: u64,
    my_id: PeerId,
) -> Effect {
    state.observe_term(term);
    if state.role != Role::Candidate || term != state.term {
        tracing::trace!(voter, term, "Ignoring vote outside an active candidacy");
        return Effect::None;
    }

    state.votes_received.insert(voter);
    tracing::debug!(
        voter,
        term,
        votes = state.vote_count(),
        needed = state.quorum(),
        "Received vote"
    );

    if state.has_quorum() {
        state.become_leader(my_id);
        Effect::BecameLeader { term }
    } else {
        Effect::None
    }
}

/// `StartElection` timer: begin a candidacy at the next unseen term, unless
/// a leader at the scheduled term or newer emerged while the timer was
/// pending (stale timer, no-op).
pub fn handle_start_election(
    state: &mut ElectionState,
    scheduled_term: u64,
    my_id: PeerId,
) -> Effect {
    if state.leader.is_some() && state.term >= scheduled_term {
        tracing::trace!(scheduled_term, "Ignoring stale election timer");
        return Effect::None;
    }

    let term = state.become_candidate(my_id);

    // A single-node cluster wins on the self-vote alone.
    if state.has_quorum() {
        state.become_leader(my_id);
        Effect::BecameLeader { term }
    } else {
        Effect::Candidacy { term }
    }
}

/// `CheckElectionStatus` timer: true when the candidacy at exactly this term
/// is still unresolved and the election should restart with fresh jitter.
pub fn handle_check_election(state: &ElectionState, scheduled_term: u64) -> bool {
    state.role == Role::Candidate && state.term == scheduled_term
}

/// `NodeDown`: true when the departed peer was the known leader, in which
/// case the caller clears the leader and triggers a re-election.
pub fn handle_member_down(state: &mut ElectionState, peer: PeerId) -> bool {
    if state.leader != Some(peer) {
        return false;
    }
    state.leader = None;
    state.role = Role::Candidate;
    true
}
