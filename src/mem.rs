//! In-memory `Transport` and `PersistenceBackend` implementations.
//!
//! Not part of the consensus core (spec §1 names both as external
//! collaborators) — these exist purely so tests and the bundled demo
//! binary can exercise the core without a real socket or disk.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::RaftError;
use crate::log::LogEntry;
use crate::node::Node;
use crate::persistence::{PersistedMeta, PersistenceBackend};
use crate::rpc::{RpcRequest, RpcResponse};
use crate::transport::Transport;

/// A shared in-process "network": a registry of node ids to their `Node`
/// handles. `MemoryTransport::invoke` looks up the target by id and calls
/// its `handle_rpc` directly, skipping serialization entirely.
#[derive(Default)]
pub struct MemoryNetwork {
    nodes: Mutex<HashMap<String, Arc<Node>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, id: String, node: Arc<Node>) {
        self.nodes.lock().unwrap().insert(id, node);
    }

    pub fn transport(self: &Arc<Self>) -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport { network: Arc::clone(self) })
    }
}

pub struct MemoryTransport {
    network: Arc<MemoryNetwork>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn invoke(&self, peer_id: &str, rpc: RpcRequest) -> Result<RpcResponse, RaftError> {
        let node = self.network.nodes.lock().unwrap().get(peer_id).cloned();
        let node = node.ok_or_else(|| RaftError::Transport(format!("unknown peer {peer_id}")))?;
        Ok(node.handle_rpc(rpc).await)
    }
}

#[derive(Default, Clone)]
struct Record {
    meta: PersistedMeta,
    last_applied: u64,
    applied: Vec<(u64, Vec<u8>)>,
}

/// A durable-in-name-only `PersistenceBackend`: everything lives in a
/// `Mutex<HashMap>` for the duration of the process.
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<HashMap<String, Record>>,
}

impl MemoryPersistence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Commands delivered to the state machine via `apply_log`, in apply order.
    pub fn applied_commands(&self, node_id: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .get(node_id)
            .map(|r| r.applied.iter().map(|(_, cmd)| cmd.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryPersistence {
    async fn load_meta(&self, node_id: &str) -> Result<PersistedMeta, RaftError> {
        Ok(self.state.lock().unwrap().get(node_id).map(|r| r.meta.clone()).unwrap_or_default())
    }

    async fn last_applied_commit_index(&self, node_id: &str) -> Result<u64, RaftError> {
        Ok(self.state.lock().unwrap().get(node_id).map(|r| r.last_applied).unwrap_or(0))
    }

    async fn save_meta(&self, node_id: &str, meta: &PersistedMeta) -> Result<(), RaftError> {
        let mut state = self.state.lock().unwrap();
        state.entry(node_id.to_string()).or_default().meta = meta.clone();
        Ok(())
    }

    async fn apply_log(&self, node_id: &str, index: u64, entry: &LogEntry) -> Result<(), RaftError> {
        let mut state = self.state.lock().unwrap();
        let record = state.entry(node_id.to_string()).or_default();
        record.applied.push((index, entry.command.clone()));
        record.last_applied = index;
        Ok(())
    }
}
