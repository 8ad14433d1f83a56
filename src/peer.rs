//! One remote participant (spec §4.2).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::error::RaftError;
use crate::rpc::{RpcRequest, RpcResponse};
use crate::transport::Transport;

/// A remote node: connection state, pending-call bookkeeping, and the
/// transport used to reach it. Owned by `Node`; its lifetime spans the
/// owning node's lifetime (spec §4.2).
pub struct Peer {
    id: String,
    transport: Arc<dyn Transport>,
    connected: AtomicBool,
    pending_calls: AtomicU64,
}

impl Peer {
    pub fn new(id: String, transport: Arc<dyn Transport>) -> Self {
        Self {
            id,
            transport,
            connected: AtomicBool::new(false),
            pending_calls: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Establishes the underlying channel. Idempotent: calling this on an
    /// already-connected peer is a no-op.
    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn pending_calls(&self) -> u64 {
        self.pending_calls.load(Ordering::SeqCst)
    }

    /// Sends `rpc` and awaits the reply or a transport error.
    ///
    /// The "outgoing call" / "response" observable events named in spec
    /// §4.2 are logged (`debug!`) rather than promoted to a public observer
    /// API — see SPEC_FULL.md §4.2/§9: only `applied log` and `error` are
    /// external observer events.
    pub async fn invoke(&self, rpc: RpcRequest) -> Result<RpcResponse, RaftError> {
        self.connect();
        self.pending_calls.fetch_add(1, Ordering::SeqCst);
        debug!("peer {}: outgoing call {:?}", self.id, rpc.term());
        let result = self.transport.invoke(&self.id, rpc).await;
        self.pending_calls.fetch_sub(1, Ordering::SeqCst);
        match &result {
            Ok(resp) => debug!("peer {}: response term={}", self.id, resp.term()),
            Err(e) => debug!("peer {}: transport error: {}", self.id, e),
        }
        result
    }
}
