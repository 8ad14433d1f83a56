//! Error kinds surfaced by the consensus core (spec §7).

use thiserror::Error;

/// Errors the core can produce.
///
/// `NotLeader` and `Config` are returned directly to callers. `Transport`
/// errors are absorbed by the role that issued the RPC (Leader retries on
/// the next heartbeat, Candidate treats it as a non-vote) and never
/// propagate past `Node`. `Persistence` and `UnknownRpc` are surfaced via
/// the `Observer::error` callback rather than swallowed, since they
/// endanger safety.
#[derive(Debug, Error, Clone)]
pub enum RaftError {
    /// A client command was sent to a node that is not the leader.
    #[error("not leader (current leader: {leader_id:?})")]
    NotLeader { leader_id: Option<String> },

    /// A peer RPC failed at the transport level.
    #[error("transport error: {0}")]
    Transport(String),

    /// The persistence backend failed to load or durably save state.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration, e.g. `max_election_timeout < min_election_timeout`.
    #[error("configuration error: {0}")]
    Config(String),

    /// A peer invoked an RPC type this node does not recognise.
    #[error("unknown rpc type: {0}")]
    UnknownRpc(String),

    /// The node has been stopped and can no longer accept requests.
    #[error("node is stopped")]
    Stopped,

    /// The log entry a `command` call submitted at `index` was overwritten
    /// by a different leader's entry before it could be committed and
    /// applied; the entry that ultimately landed at `index` is not this
    /// caller's.
    #[error("command at index {index} was superseded by a different leader's entry")]
    CommandSuperseded { index: u64 },
}
