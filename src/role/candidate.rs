//! `Candidate` behavior (spec §4.5).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::broadcast::Broadcast;
use crate::node::{CommonState, Node};
use crate::role::Role;
use crate::rpc::{RequestVoteRequest, RpcRequest, RpcResponse};

impl Node {
    /// Enters the `Candidate` role and runs one election: increments the
    /// term, votes for self, persists, resets the election timer, and
    /// broadcasts `RequestVote` to every peer, counting granted votes
    /// (including self) until a majority is seen, a higher term is
    /// discovered, or every peer has replied without a majority.
    pub(crate) async fn start_election(self: &Arc<Self>) {
        let (election_term, last_log_index, last_log_term, quorum) = {
            let mut s = self.state.lock().await;
            s.common.current_term += 1;
            s.common.voted_for = Some(self.id.clone());
            s.common.timer_reset_at = Instant::now();

            let mut votes_received = HashSet::new();
            votes_received.insert(self.id.clone());
            s.role = Role::Candidate { votes_received };

            info!("[{}] starting election for term {}", self.id, s.common.current_term);

            let peer_count = self.config.peers.len();
            let quorum = CommonState::quorum_size(peer_count + 1);
            (s.common.current_term, s.common.log.length(), s.common.log.last_term(), quorum)
        };

        if let Err(e) = self.persist_meta().await {
            self.observer.error(e);
            return;
        }

        // Zero-peer cluster: we already hold a majority of one (spec S1).
        if quorum <= 1 {
            self.become_leader(election_term).await;
            return;
        }

        let peers = self.snapshot_peers().await;
        let request = RpcRequest::RequestVote(RequestVoteRequest {
            term: election_term,
            candidate_id: self.id.clone(),
            last_log_index,
            last_log_term,
        });

        let mut broadcast = Broadcast::fan_out(&peers, request);

        while let Some(reply) = broadcast.next_response().await {
            let Ok(response) = reply.result else {
                // Transport error: treated as a non-vote, no retry (spec §4.2).
                continue;
            };
            let RpcResponse::RequestVote(vote) = response else {
                continue;
            };

            let mut s = self.state.lock().await;

            // Suspension point: re-validate we're still the same candidacy
            // before acting on this reply (spec §5).
            if s.common.current_term != election_term || !s.role.is_candidate() {
                continue;
            }

            if vote.term > s.common.current_term {
                s.common.current_term = vote.term;
                s.common.voted_for = None;
                s.role = Role::Follower;
                drop(s);
                info!("[{}] stepping down: saw higher term {} in vote reply", self.id, vote.term);
                if let Err(e) = self.persist_meta().await {
                    self.observer.error(e);
                }
                broadcast.cancel();
                return;
            }

            if vote.vote_granted {
                let became_majority = if let Role::Candidate { votes_received } = &mut s.role {
                    votes_received.insert(vote.voter_id.clone());
                    votes_received.len() >= quorum
                } else {
                    false
                };
                drop(s);
                if became_majority {
                    broadcast.cancel();
                    self.become_leader(election_term).await;
                    return;
                }
            }
        }

        // Exhausted all replies without a majority: stay Candidate and let
        // the election timer fire a fresh election (spec §4.5).
    }
}
