//! Wire-level RPC payloads (spec §6).

use serde::{Deserialize, Serialize};

use crate::log::LogEntry;

/// One inbound/outbound RPC, tagged by type, per spec §6 "RPC types:
/// AppendEntries, RequestVote".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    RequestVote(RequestVoteRequest),
    AppendEntries(AppendEntriesRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    RequestVote(RequestVoteResponse),
    AppendEntries(AppendEntriesResponse),
}

impl RpcRequest {
    pub fn term(&self) -> u64 {
        match self {
            RpcRequest::RequestVote(r) => r.term,
            RpcRequest::AppendEntries(r) => r.term,
        }
    }
}

impl RpcResponse {
    pub fn term(&self) -> u64 {
        match self {
            RpcResponse::RequestVote(r) => r.term,
            RpcResponse::AppendEntries(r) => r.term,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteRequest {
    pub term: u64,
    pub candidate_id: String,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteResponse {
    pub term: u64,
    pub vote_granted: bool,
    /// Not part of spec §6's payload shape; carried for logging/bookkeeping.
    pub voter_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub term: u64,
    pub leader_id: String,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntry>,
    pub leader_commit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: u64,
    pub success: bool,
    pub follower_id: String,
    /// The follower's last log index after handling the request. Used as a
    /// conflict-resolution hint to adjust `next_index` faster than
    /// decrementing by one per round trip.
    pub last_log_index: u64,
}
