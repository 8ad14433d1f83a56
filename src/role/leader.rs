//! `Leader` behavior (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;

use log::info;

use crate::broadcast::Broadcast;
use crate::node::{CommonState, Node};
use crate::role::Role;
use crate::rpc::{AppendEntriesRequest, RpcRequest, RpcResponse};

impl Node {
    /// Transitions into `Leader` for `election_term`: initializes per-peer
    /// `next_index`/`match_index` and immediately broadcasts an empty
    /// `AppendEntries` heartbeat (spec §4.5 "On entry").
    pub(crate) async fn become_leader(self: &Arc<Self>, election_term: u64) {
        {
            let mut s = self.state.lock().await;
            if s.common.current_term != election_term || !s.role.is_candidate() {
                // Stale: role/term moved on while we were finishing the
                // election (spec §5 suspension-point re-check).
                return;
            }

            let last_index = s.common.log.length();
            let mut next_index = HashMap::new();
            let mut match_index = HashMap::new();
            for peer_id in &self.config.peers {
                next_index.insert(peer_id.clone(), last_index + 1);
                match_index.insert(peer_id.clone(), 0);
            }
            match_index.insert(self.id.clone(), last_index);

            s.role = Role::Leader { next_index, match_index };
            s.common.leader_id = Some(self.id.clone());
            info!("[{}] became leader for term {}", self.id, election_term);
        }

        self.replicate_now().await;
    }

    /// Sends `AppendEntries` to every peer: entries from that peer's
    /// `next_index` onward, with the correct `prev_log_index`/
    /// `prev_log_term` and `leader_commit`. Called both as the periodic
    /// heartbeat and immediately whenever the local log grows (spec §4.5).
    pub(crate) async fn replicate_now(self: &Arc<Self>) {
        let (election_term, requests) = {
            let s = self.state.lock().await;
            let Role::Leader { next_index, .. } = &s.role else {
                return;
            };

            let last_index = s.common.log.length();
            let leader_commit = s.common.commit_index;
            let mut requests = Vec::with_capacity(self.config.peers.len());
            for peer_id in &self.config.peers {
                let next = *next_index.get(peer_id).unwrap_or(&(last_index + 1));
                let prev_log_index = next.saturating_sub(1);
                let prev_log_term = s.common.log.term_at(prev_log_index);
                let entries = s.common.log.entries_from(next).to_vec();
                requests.push((
                    peer_id.clone(),
                    AppendEntriesRequest {
                        term: s.common.current_term,
                        leader_id: self.id.clone(),
                        prev_log_index,
                        prev_log_term,
                        entries,
                        leader_commit,
                    },
                ));
            }
            (s.common.current_term, requests)
        };

        if requests.is_empty() {
            return;
        }

        let peers = self.snapshot_peers().await;
        let mut targets = Vec::with_capacity(requests.len());
        for (peer_id, req) in requests {
            if let Some(peer) = peers.iter().find(|p| p.id() == peer_id) {
                targets.push((Arc::clone(peer), RpcRequest::AppendEntries(req)));
            }
        }

        let mut broadcast = Broadcast::fan_out_each(targets);
        while let Some(reply) = broadcast.next_response().await {
            let Ok(response) = reply.result else {
                // Transport error: the peer will be retried on the next
                // heartbeat/replication round (spec §4.2).
                continue;
            };
            let RpcResponse::AppendEntries(ae) = response else {
                continue;
            };
            self.handle_append_entries_reply(election_term, reply.peer_id, ae).await;
        }
    }

    async fn handle_append_entries_reply(
        self: &Arc<Self>,
        election_term: u64,
        peer_id: String,
        reply: crate::rpc::AppendEntriesResponse,
    ) {
        let mut s = self.state.lock().await;

        // Suspension point: this reply belongs to a replication round we
        // started while leader of `election_term`; if the term or role has
        // since moved on, it no longer applies (spec §5).
        if s.common.current_term != election_term || !s.role.is_leader() {
            return;
        }

        if reply.term > s.common.current_term {
            s.common.current_term = reply.term;
            s.common.voted_for = None;
            s.common.leader_id = None;
            s.role = Role::Follower;
            drop(s);
            info!("[{}] stepping down: saw higher term {} from {}", self.id, reply.term, peer_id);
            if let Err(e) = self.persist_meta().await {
                self.observer.error(e);
            }
            return;
        }

        let Role::Leader { next_index, match_index } = &mut s.role else {
            return;
        };

        if reply.success {
            let new_match = reply.last_log_index;
            let cur_match = match_index.get(&peer_id).copied().unwrap_or(0);
            if new_match > cur_match {
                match_index.insert(peer_id.clone(), new_match);
            }
            let desired_next = new_match + 1;
            let cur_next = next_index.get(&peer_id).copied().unwrap_or(1);
            if desired_next > cur_next {
                next_index.insert(peer_id, desired_next);
            }
        } else {
            let suggested = reply.last_log_index + 1;
            let cur_next = next_index.get(&peer_id).copied().unwrap_or(1);
            if suggested < cur_next {
                next_index.insert(peer_id, suggested.max(1));
            } else if cur_next > 1 {
                // No usable hint: fall back to decrementing by one so we
                // still make progress.
                next_index.insert(peer_id, cur_next - 1);
            }
        }

        self.advance_commit_index(&mut s);
        drop(s);
        self.poke_applier();
    }

    /// Commit advancement (spec §4.5 "Commit advancement"). Computes the
    /// highest index `N` replicated on a majority (including self) whose
    /// term equals the current term, and advances `commit_index` to it.
    /// The term guard is load-bearing: a leader may not commit entries from
    /// prior terms by majority replication alone (spec S6).
    fn advance_commit_index(&self, s: &mut tokio::sync::MutexGuard<'_, crate::node::NodeState>) {
        let Role::Leader { match_index, .. } = &s.role else {
            return;
        };

        let cluster_size = self.config.peers.len() + 1;
        let quorum = CommonState::quorum_size(cluster_size);
        let last_index = s.common.log.length();

        let mut new_commit = s.common.commit_index;
        for n in (s.common.commit_index + 1)..=last_index {
            let replicated = match_index.values().filter(|&&m| m >= n).count();
            if replicated >= quorum && s.common.log.term_at(n) == s.common.current_term {
                new_commit = n;
            }
        }
        if new_commit > s.common.commit_index {
            info!("[{}] advancing commit_index {} -> {}", self.id, s.common.commit_index, new_commit);
            s.common.commit_index = new_commit;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::RaftConfig;
    use crate::log::LogEntry;
    use crate::mem::{MemoryNetwork, MemoryPersistence};
    use crate::node::Node;
    use crate::observer::NullObserver;
    use crate::persistence::PersistenceBackend;
    use crate::role::Role;
    use crate::transport::Transport;

    fn lone_node() -> Arc<Node> {
        let network = MemoryNetwork::new();
        let persistence = MemoryPersistence::new();
        let config = RaftConfig {
            id: Some("n0".to_string()),
            uuid: Box::new(|| unreachable!()),
            peers: vec!["n1".to_string(), "n2".to_string()],
            min_election_timeout: Duration::from_secs(10),
            max_election_timeout: Duration::from_secs(20),
            heartbeat_interval: Duration::from_millis(1),
            persistence: persistence as Arc<dyn PersistenceBackend>,
            transport: network.transport() as Arc<dyn Transport>,
        };
        Node::new(config, Arc::new(NullObserver)).unwrap()
    }

    /// S6: entries replicated to a majority but written in a prior term
    /// must not be committed by replication count alone — only once an
    /// entry from the leader's own (current) term is also on a majority
    /// does `commit_index` cross it.
    #[tokio::test]
    async fn prior_term_entry_is_not_committed_without_current_term_entry() {
        let node = lone_node();
        let mut s = node.state.lock().await;

        s.common.current_term = 2;
        s.common.log.push(LogEntry { term: 1, command: b"a".to_vec() }); // index 1, stale term
        s.common.log.push(LogEntry { term: 2, command: b"b".to_vec() }); // index 2, current term

        let mut match_index = std::collections::HashMap::new();
        match_index.insert("n1".to_string(), 1u64); // n1 only has index 1
        match_index.insert("n2".to_string(), 1u64); // n2 only has index 1
        match_index.insert(node.id.clone(), 2); // self has both

        s.role = Role::Leader { next_index: std::collections::HashMap::new(), match_index };

        node.advance_commit_index(&mut s);
        // n0 + n1 + n2 all have index 1, a majority, but it's term 1 while
        // current_term is 2: must not commit.
        assert_eq!(s.common.commit_index, 0);

        if let Role::Leader { match_index, .. } = &mut s.role {
            match_index.insert("n1".to_string(), 2);
        }
        node.advance_commit_index(&mut s);
        // Now index 2 (current term) is on a majority (self + n1): commits
        // up through it, including the earlier prior-term entry.
        assert_eq!(s.common.commit_index, 2);
    }
}
