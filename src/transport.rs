//! The peer transport contract (spec §6) — an external collaborator.
//!
//! The core never opens a socket itself; it only calls through this trait.
//! A concrete in-process implementation for tests/demos lives in [`crate::mem`].

use async_trait::async_trait;

use crate::error::RaftError;
use crate::rpc::{RpcRequest, RpcResponse};

/// Carries RPCs to and from one remote node.
///
/// `connect` from spec §4.2 is folded into `invoke`: a real implementation
/// (e.g. TCP) establishes/reuses its connection on the first call —
/// "idempotent" in the sense that calling it repeatedly has no observable
/// effect beyond the RPC itself.
///
/// On transport failure this returns `Err`; it never retries. The calling
/// role decides whether and when to re-invoke (spec §4.2).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn invoke(&self, peer_id: &str, rpc: RpcRequest) -> Result<RpcResponse, RaftError>;
}
