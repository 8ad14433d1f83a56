//! Fan-out of one RPC to all peers (spec §4.3).
//!
//! Ephemeral — constructed for the duration of one election or replication
//! round, then dropped. Quorum accounting is the caller's job (Candidate /
//! Leader role logic); Broadcast is only a delivery tool.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RaftError;
use crate::peer::Peer;
use crate::rpc::{RpcRequest, RpcResponse};

/// One reply from the fan-out, tagged with the peer that sent it.
pub struct BroadcastResponse {
    pub peer_id: String,
    pub result: Result<RpcResponse, RaftError>,
}

/// Sends `rpc` to every peer concurrently and streams back responses as
/// they arrive (success or transport error): one task per peer, with
/// responses drained in arrival order (not a fixed join order) so a
/// Candidate can stop as soon as it sees a majority.
pub struct Broadcast {
    rx: mpsc::Receiver<BroadcastResponse>,
    handles: Vec<JoinHandle<()>>,
}

impl Broadcast {
    /// Sends the same `rpc` to every peer (used for `RequestVote`).
    pub fn fan_out(peers: &[Arc<Peer>], rpc: RpcRequest) -> Self {
        Self::fan_out_each(peers.iter().cloned().map(|p| (p, rpc.clone())).collect())
    }

    /// Sends a per-peer `rpc` built by the caller (used for `AppendEntries`,
    /// where each peer gets a different `prev_log_index`/`entries` slice).
    pub fn fan_out_each(targets: Vec<(Arc<Peer>, RpcRequest)>) -> Self {
        let (tx, rx) = mpsc::channel(targets.len().max(1));
        let mut handles = Vec::with_capacity(targets.len());
        for (peer, rpc) in targets {
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let result = peer.invoke(rpc).await;
                let _ = tx
                    .send(BroadcastResponse {
                        peer_id: peer.id().to_string(),
                        result,
                    })
                    .await;
            }));
        }
        Self { rx, handles }
    }

    /// Awaits the next response. Returns `None` once every peer has replied
    /// (or failed) and there is nothing left in flight.
    pub async fn next_response(&mut self) -> Option<BroadcastResponse> {
        self.rx.recv().await
    }

    /// Detaches all listeners. In-flight RPCs may still complete, but their
    /// replies are discarded (spec §4.3).
    pub fn cancel(self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
