//! The four-way role state machine (spec §4.5).
//!
//! Per spec §9's design note ("Role polymorphism... map to a tagged
//! variant or small polymorphic interface"), roles are a plain Rust enum
//! rather than a trait-object hierarchy; role-specific logic lives in
//! sibling modules as `impl Node` blocks, dispatched by `Node::handle_rpc`
//! and the two background timer loops in `node.rs`.

pub mod candidate;
pub mod follower;
pub mod idle;
pub mod leader;

use std::collections::{HashMap, HashSet};

/// The node's current role and whatever volatile state is local to that
/// role instance — reset every time the role is (re-)entered.
#[derive(Debug, Clone)]
pub enum Role {
    /// Initial role, entered before persistence load completes. Accepts no
    /// RPCs (spec §4.5): inbound requests are queued by `Node` and
    /// redispatched once load finishes and the role becomes `Follower`.
    Idle,

    /// Normal steady-state role: accepts `AppendEntries` from the current
    /// leader, grants votes, and converts to `Candidate` on election timeout.
    Follower,

    /// Campaigning for leadership in the current term.
    Candidate {
        /// Peer ids (and self) that have granted a vote this term.
        votes_received: HashSet<String>,
    },

    /// Elected leader for the current term.
    Leader {
        /// Index of the next log entry to send to each peer.
        next_index: HashMap<String, u64>,
        /// Index of the highest log entry known to be replicated on each peer.
        match_index: HashMap<String, u64>,
    },
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Idle => "idle",
            Role::Follower => "follower",
            Role::Candidate { .. } => "candidate",
            Role::Leader { .. } => "leader",
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader { .. })
    }

    pub fn is_candidate(&self) -> bool {
        matches!(self, Role::Candidate { .. })
    }

    pub fn is_follower(&self) -> bool {
        matches!(self, Role::Follower)
    }
}
