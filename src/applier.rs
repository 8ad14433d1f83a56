//! Drains committed-but-unapplied entries to the state machine, serialised (spec §4.4).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::error;
use tokio::sync::Mutex;

use crate::error::RaftError;
use crate::node::NodeState;
use crate::observer::Observer;
use crate::persistence::PersistenceBackend;

/// Serialises state-machine application for one node.
///
/// Owns a single `persisting` flag (spec calls it a boolean; an
/// `AtomicBool` behind a `Mutex<()>`-free guard lets `maybe_persist` be
/// called from multiple places — the commit-advance path and an external
/// poke — without double-applying).
pub struct LogApplier {
    node_id: String,
    persistence: Arc<dyn PersistenceBackend>,
    persisting: AtomicBool,
    // Prevents two concurrent `maybe_persist` callers from both winning the
    // `persisting` CAS-then-proceed race and interleaving applies.
    guard: Mutex<()>,
}

impl LogApplier {
    pub fn new(node_id: String, persistence: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            node_id,
            persistence,
            persisting: AtomicBool::new(false),
            guard: Mutex::new(()),
        }
    }

    pub fn is_persisting(&self) -> bool {
        self.persisting.load(Ordering::SeqCst)
    }

    /// If `commit_index > last_applied` and nothing is currently being
    /// applied, applies entries one at a time, in strict index order,
    /// until caught up or an application fails.
    ///
    /// Applies each entry in turn as a loop within one call, rather than
    /// re-invoking itself recursively after every apply, to avoid growing
    /// the stack on a long backlog.
    pub async fn maybe_persist(&self, state: &Arc<tokio::sync::Mutex<NodeState>>, observer: &dyn Observer) {
        let _guard = self.guard.lock().await;
        if self.persisting.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            let next = {
                let s = state.lock().await;
                if s.common.commit_index <= s.common.last_applied {
                    None
                } else {
                    let index = s.common.last_applied + 1;
                    s.common.log.at(index).cloned().map(|entry| (index, entry))
                }
            };

            let Some((index, entry)) = next else {
                break;
            };

            match self.persistence.apply_log(&self.node_id, index, &entry).await {
                Ok(()) => {
                    let mut s = state.lock().await;
                    s.common.last_applied = index;
                    drop(s);
                    observer.applied_log(index, entry.term);
                }
                Err(e) => {
                    error!("[{}] failed to apply log index {}: {}", self.node_id, index, e);
                    observer.error(RaftError::Persistence(e.to_string()));
                    break;
                }
            }
        }

        self.persisting.store(false, Ordering::SeqCst);
    }
}
