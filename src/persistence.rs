//! The persistence backend contract (spec §6) — an external collaborator.
//!
//! The core never implements this itself; it only calls through the trait.
//! A concrete in-memory implementation for tests/demos lives in [`crate::mem`].

use async_trait::async_trait;

use crate::error::RaftError;
use crate::log::{Log, LogEntry};

/// Durable `{currentTerm, votedFor, log}` as loaded from or written to the backend.
#[derive(Debug, Clone, Default)]
pub struct PersistedMeta {
    pub current_term: u64,
    pub voted_for: Option<String>,
    pub log: Log,
}

/// Durable metadata + applied-commit storage for one node.
///
/// Every method must be durable on return (spec §6): `save_meta` and
/// `apply_log` may not report success until the write has actually reached
/// stable storage, since replies whose content depends on this state are
/// only sent once it is durable (invariant 7).
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Loads persisted meta for `node_id`, or a zero-valued default if none exists.
    async fn load_meta(&self, node_id: &str) -> Result<PersistedMeta, RaftError>;

    /// Highest index already applied to the state machine for `node_id`, or 0.
    async fn last_applied_commit_index(&self, node_id: &str) -> Result<u64, RaftError>;

    /// Durably persists `meta`, overwriting whatever was previously stored.
    async fn save_meta(&self, node_id: &str, meta: &PersistedMeta) -> Result<(), RaftError>;

    /// Delivers `entry` (at `index`) to the state machine and durably
    /// records the new last-applied index, atomically with that delivery.
    async fn apply_log(&self, node_id: &str, index: u64, entry: &LogEntry) -> Result<(), RaftError>;
}
