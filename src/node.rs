//! The coordinator (spec §4.6): common state, peer set, `LogApplier`, and
//! the current role, routed through one `tokio::sync::Mutex`-guarded state
//! struct shared by every background task and RPC handler, with a four-way
//! `Role` and a 1-based `Log`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use log::info;
use rand::Rng;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Duration;

use crate::applier::LogApplier;
use crate::config::RaftConfig;
use crate::error::RaftError;
use crate::log::{Log, LogEntry};
use crate::observer::Observer;
use crate::peer::Peer;
use crate::persistence::PersistedMeta;
use crate::role::Role;
use crate::rpc::{RpcRequest, RpcResponse};

/// Volatile + persisted state (spec §3), plus the current role.
pub struct NodeState {
    pub common: CommonState,
    pub role: Role,
}

pub struct CommonState {
    // --- Volatile ---
    pub leader_id: Option<String>,
    pub commit_index: u64,
    pub last_applied: u64,
    /// When the current election/heartbeat timer was last (re)armed.
    pub timer_reset_at: Instant,

    // --- Persisted ---
    pub current_term: u64,
    pub voted_for: Option<String>,
    pub log: Log,
}

impl CommonState {
    fn new() -> Self {
        Self {
            leader_id: None,
            commit_index: 0,
            last_applied: 0,
            timer_reset_at: Instant::now(),
            current_term: 0,
            voted_for: None,
            log: Log::new(),
        }
    }

    /// Quorum test from spec §4.6/glossary: `⌈cluster_size / 2⌉`, where
    /// `cluster_size` counts self plus every peer.
    pub fn quorum_size(cluster_size: usize) -> usize {
        cluster_size / 2 + 1
    }
}

pub(crate) struct PendingRpc {
    pub rpc: RpcRequest,
    pub reply: oneshot::Sender<RpcResponse>,
}

/// A `command()` caller waiting on the entry it submitted at `index`.
/// `term` is the term the entry was written in at submission time; when
/// that index is eventually applied, the waiter is resolved successfully
/// only if the applied entry's term still matches — otherwise a different
/// leader's entry overwrote this one before it committed, and the caller
/// must be told its command was lost rather than wrongly told it succeeded.
pub(crate) struct CommandWaiter {
    pub term: u64,
    pub reply: oneshot::Sender<bool>,
}

/// Coordinator owning one node's entire reachable state.
pub struct Node {
    pub(crate) id: String,
    pub(crate) config: RaftConfig,
    pub(crate) state: Arc<Mutex<NodeState>>,
    pub(crate) peers: Mutex<HashMap<String, Arc<Peer>>>,
    pub(crate) applier: LogApplier,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) loaded: AtomicBool,
    pub(crate) stopped: AtomicBool,
    pub(crate) pending_rpcs: Mutex<Vec<PendingRpc>>,
    pub(crate) waiters: StdMutex<HashMap<u64, Vec<CommandWaiter>>>,
}

impl Node {
    /// Constructs a node in the `Idle` role. Does not start timers or load
    /// persisted state — call [`Node::start`] for that.
    pub fn new(config: RaftConfig, observer: Arc<dyn Observer>) -> Result<Arc<Self>, RaftError> {
        config.validate()?;
        let id = config
            .id
            .clone()
            .unwrap_or_else(|| (config.uuid)());

        let mut peers = HashMap::new();
        for peer_id in &config.peers {
            peers.insert(peer_id.clone(), Arc::new(Peer::new(peer_id.clone(), Arc::clone(&config.transport))));
        }

        let applier = LogApplier::new(id.clone(), Arc::clone(&config.persistence));

        let node = Self {
            id,
            config,
            state: Arc::new(Mutex::new(NodeState { common: CommonState::new(), role: Role::Idle })),
            peers: Mutex::new(peers),
            applier,
            observer,
            loaded: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            pending_rpcs: Mutex::new(Vec::new()),
            waiters: StdMutex::new(HashMap::new()),
        };

        Ok(Arc::new(node))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Loads persisted state, transitions Idle → Follower, then starts the
    /// election-timer and heartbeat-sender background loops.
    pub async fn start(self: &Arc<Self>) {
        self.load().await;

        let election_node = Arc::clone(self);
        tokio::spawn(async move {
            election_node.run_election_timer().await;
        });

        let heartbeat_node = Arc::clone(self);
        tokio::spawn(async move {
            heartbeat_node.run_heartbeat_sender().await;
        });
    }

    /// Issues the two persistence load calls in parallel and merges their
    /// results (spec §9 "Parallel persistence load").
    async fn load(self: &Arc<Self>) {
        let (meta_result, applied_result) = tokio::join!(
            self.config.persistence.load_meta(&self.id),
            self.config.persistence.last_applied_commit_index(&self.id),
        );

        let meta: PersistedMeta = match meta_result {
            Ok(m) => m,
            Err(e) => {
                self.observer.error(e);
                PersistedMeta::default()
            }
        };
        let last_applied = match applied_result {
            Ok(v) => v,
            Err(e) => {
                self.observer.error(e);
                0
            }
        };

        {
            let mut s = self.state.lock().await;
            s.common.current_term = meta.current_term;
            s.common.voted_for = meta.voted_for;
            s.common.log = meta.log;
            s.common.last_applied = last_applied;
            s.common.commit_index = last_applied.max(s.common.commit_index);
            s.role = Role::Follower;
            s.common.timer_reset_at = Instant::now();
            info!(
                "[{}] loaded state: term={}, voted_for={:?}, {} log entries, last_applied={}",
                self.id, s.common.current_term, s.common.voted_for, s.common.log.length(), last_applied
            );
        }

        self.loaded.store(true, Ordering::SeqCst);
        info!("[{}] loaded. transitioning Idle -> Follower", self.id);

        self.dispatch_pending_rpcs().await;
    }

    async fn dispatch_pending_rpcs(self: &Arc<Self>) {
        let pending = std::mem::take(&mut *self.pending_rpcs.lock().await);
        for p in pending {
            let response = self.handle_rpc(p.rpc).await;
            let _ = p.reply.send(response);
        }
    }

    /// Routes an inbound RPC to the current role's handler (spec §4.6).
    /// `Idle` has no handler: the request is queued and re-dispatched once
    /// the node transitions to `Follower` (spec §9 "deferred handler").
    pub async fn handle_rpc(self: &Arc<Self>, rpc: RpcRequest) -> RpcResponse {
        let is_idle = { self.state.lock().await.role.name() == "idle" };
        if is_idle {
            let (tx, rx) = oneshot::channel();
            self.pending_rpcs.lock().await.push(PendingRpc { rpc, reply: tx });
            return rx.await.unwrap_or_else(|_| {
                RpcResponse::AppendEntries(crate::rpc::AppendEntriesResponse {
                    term: 0,
                    success: false,
                    follower_id: self.id.clone(),
                    last_log_index: 0,
                })
            });
        }

        match rpc {
            RpcRequest::RequestVote(req) => RpcResponse::RequestVote(self.on_request_vote(req).await),
            RpcRequest::AppendEntries(req) => RpcResponse::AppendEntries(self.on_append_entries(req).await),
        }
    }

    /// Adds a peer to the cluster (spec §6 `join`).
    pub async fn join(&self, peer_id: String) {
        let mut peers = self.peers.lock().await;
        peers
            .entry(peer_id.clone())
            .or_insert_with(|| Arc::new(Peer::new(peer_id, Arc::clone(&self.config.transport))));
    }

    /// Graceful shutdown: marks the node stopped, which the background
    /// timer loops and `command`/RPC callers observe via `is_stopped`.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        info!("[{}] stopped", self.id);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub async fn is_leader(&self) -> bool {
        self.state.lock().await.role.is_leader()
    }

    pub async fn current_term(&self) -> u64 {
        self.state.lock().await.common.current_term
    }

    pub async fn leader_id(&self) -> Option<String> {
        self.state.lock().await.common.leader_id.clone()
    }

    pub async fn commit_index(&self) -> u64 {
        self.state.lock().await.common.commit_index
    }

    pub async fn last_applied(&self) -> u64 {
        self.state.lock().await.common.last_applied
    }

    /// Client command entry point (spec §4.5 "Client command handling").
    /// Rejects immediately with `NotLeader` if this node is not the leader
    /// — a deliberate fix of the source's ambiguous fall-through (see
    /// SPEC_FULL.md §7 item 2) — otherwise appends to the log and returns
    /// once a quorum has replicated the entry, it has been applied, and
    /// updated metadata has been persisted.
    pub async fn command(self: &Arc<Self>, cmd: Vec<u8>) -> Result<u64, RaftError> {
        if self.is_stopped() {
            return Err(RaftError::Stopped);
        }

        let (index, term) = {
            let mut s = self.state.lock().await;
            if !s.role.is_leader() {
                return Err(RaftError::NotLeader { leader_id: s.common.leader_id.clone() });
            }
            let term = s.common.current_term;
            let entry = LogEntry { term, command: cmd };
            let index = s.common.log.push(entry);
            if let Role::Leader { match_index, .. } = &mut s.role {
                match_index.insert(self.id.clone(), index);
            }
            (index, term)
        };

        let (tx, rx) = oneshot::channel();
        self.waiters.lock().unwrap().entry(index).or_default().push(CommandWaiter { term, reply: tx });

        if let Err(e) = self.persist_meta().await {
            self.observer.error(e.clone());
            return Err(e);
        }

        self.replicate_now().await;

        match rx.await {
            // The entry applied at `index` was written in the same term we
            // submitted it in: it's ours.
            Ok(true) => Ok(index),
            // A different leader's entry ended up at `index` before this
            // one committed — our command was discarded, not applied.
            Ok(false) => Err(RaftError::CommandSuperseded { index }),
            Err(_) => Err(RaftError::Stopped),
        }
    }

    pub(crate) async fn persist_meta(&self) -> Result<(), RaftError> {
        let meta = {
            let s = self.state.lock().await;
            PersistedMeta {
                current_term: s.common.current_term,
                voted_for: s.common.voted_for.clone(),
                log: s.common.log.clone(),
            }
        };
        self.config.persistence.save_meta(&self.id, &meta).await
    }

    /// Resolves every waiter registered for `applied_index`. A waiter whose
    /// submitted `term` matches `applied_term` gets `true` (its entry is
    /// the one that landed); any other waiter gets `false` — its entry was
    /// overwritten by a different leader before it committed.
    pub(crate) fn wake_waiters(&self, applied_index: u64, applied_term: u64) {
        let mut waiters = self.waiters.lock().unwrap();
        if let Some(entries) = waiters.remove(&applied_index) {
            for waiter in entries {
                let _ = waiter.reply.send(waiter.term == applied_term);
            }
        }
    }

    /// Spawns `LogApplier::maybe_persist` in the background ("poke" the
    /// applier per spec §4.4), wiring its `applied log` notification
    /// through to both waiting `command` callers and the external
    /// `Observer`.
    pub(crate) fn poke_applier(self: &Arc<Self>) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let observer = WakeObserver { node: &node, user: node.observer.as_ref() };
            node.applier.maybe_persist(&node.state, &observer).await;
        });
    }

    pub(crate) async fn snapshot_peers(&self) -> Vec<Arc<Peer>> {
        self.peers.lock().await.values().cloned().collect()
    }

    fn election_timeout(&self) -> Duration {
        let mut rng = rand::thread_rng();
        let min = self.config.min_election_timeout.as_millis() as u64;
        let max = self.config.max_election_timeout.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Fires for both `Follower` (starting its first election) and
    /// `Candidate` (restarting a stalled one) — spec §4.5: "On
    /// election-timer expiry with no majority, start a new election".
    async fn run_election_timer(self: Arc<Self>) {
        loop {
            if self.is_stopped() {
                return;
            }
            let timeout = self.election_timeout();
            tokio::time::sleep(timeout).await;
            if self.is_stopped() {
                return;
            }

            let should_fire = {
                let s = self.state.lock().await;
                (s.role.is_follower() || s.role.is_candidate()) && s.common.timer_reset_at.elapsed() >= timeout
            };

            if should_fire {
                info!("[{}] election timeout", self.id);
                self.start_election().await;
            }
        }
    }

    /// Periodic heartbeat sender: only fires while this node is the leader.
    async fn run_heartbeat_sender(self: Arc<Self>) {
        loop {
            if self.is_stopped() {
                return;
            }
            tokio::time::sleep(self.config.heartbeat_interval).await;
            if self.is_stopped() {
                return;
            }

            let is_leader = { self.state.lock().await.role.is_leader() };
            if is_leader {
                self.replicate_now().await;
            }
        }
    }
}

struct WakeObserver<'a> {
    node: &'a Node,
    user: &'a dyn Observer,
}

impl Observer for WakeObserver<'_> {
    fn applied_log(&self, index: u64, term: u64) {
        self.node.wake_waiters(index, term);
        self.user.applied_log(index, term);
    }

    fn error(&self, error: RaftError) {
        self.user.error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_size_matches_spec_examples() {
        assert_eq!(CommonState::quorum_size(1), 1); // S1: single-node cluster
        assert_eq!(CommonState::quorum_size(3), 2); // S2: three-node cluster
        assert_eq!(CommonState::quorum_size(5), 3);
        assert_eq!(CommonState::quorum_size(4), 3);
    }
}
