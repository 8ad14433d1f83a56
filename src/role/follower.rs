//! `Follower` behavior (spec §4.5), plus the "All Server Rules" shared by
//! every role: these two RPC handlers are the ones `Node::handle_rpc`
//! dispatches to regardless of whether the current role is `Follower`,
//! `Candidate`, or `Leader` — a `Candidate`/`Leader` observing a valid
//! `AppendEntries` or a higher term steps down here exactly as a plain
//! `Follower` would.

use std::sync::Arc;
use std::time::Instant;

use log::info;

use crate::node::Node;
use crate::role::Role;
use crate::rpc::{AppendEntriesRequest, AppendEntriesResponse, RequestVoteRequest, RequestVoteResponse};

impl Node {
    /// Handles an inbound `AppendEntries` (spec §4.5 "AppendEntries
    /// acceptance"). Used as a heartbeat when `entries` is empty.
    pub(crate) async fn on_append_entries(self: &Arc<Self>, req: AppendEntriesRequest) -> AppendEntriesResponse {
        let (response, log_changed, term_changed, commit_advanced, prior_term, prior_log_index) = {
            let mut s = self.state.lock().await;
            let prior_term = s.common.current_term;
            let prior_log_index = s.common.log.length();

            if req.term < s.common.current_term {
                let response = AppendEntriesResponse {
                    term: s.common.current_term,
                    success: false,
                    follower_id: self.id.clone(),
                    last_log_index: s.common.log.length(),
                };
                (response, false, false, false, prior_term, prior_log_index)
            } else {
                let term_changed = req.term > s.common.current_term;
                if term_changed {
                    s.common.current_term = req.term;
                    s.common.voted_for = None;
                }

                if !s.role.is_follower() {
                    info!("[{}] stepping down to follower (AppendEntries from {})", self.id, req.leader_id);
                }
                s.role = Role::Follower;
                s.common.leader_id = Some(req.leader_id.clone());
                s.common.timer_reset_at = Instant::now();

                let prev_ok = req.prev_log_index == 0
                    || s.common
                        .log
                        .at(req.prev_log_index)
                        .map(|e| e.term == req.prev_log_term)
                        .unwrap_or(false);

                let mut log_changed = false;
                let mut commit_advanced = false;

                let success = if !prev_ok {
                    false
                } else {
                    let mut insert_idx = req.prev_log_index + 1;
                    for entry in &req.entries {
                        if insert_idx <= s.common.log.length() {
                            if s.common.log.term_at(insert_idx) != entry.term {
                                s.common.log.truncate_from(insert_idx);
                                s.common.log.push(entry.clone());
                                log_changed = true;
                            }
                        } else {
                            s.common.log.push(entry.clone());
                            log_changed = true;
                        }
                        insert_idx += 1;
                    }
                    let last_new_index = insert_idx - 1;

                    if req.leader_commit > s.common.commit_index {
                        s.common.commit_index = req.leader_commit.min(last_new_index);
                        commit_advanced = true;
                    }
                    true
                };

                let response = AppendEntriesResponse {
                    term: s.common.current_term,
                    success,
                    follower_id: self.id.clone(),
                    last_log_index: s.common.log.length(),
                };
                (response, log_changed, term_changed, commit_advanced, prior_term, prior_log_index)
            }
        };

        if term_changed || log_changed {
            if let Err(e) = self.persist_meta().await {
                self.observer.error(e);
                // The term/log mutation isn't durable: never reply with
                // state that hasn't actually hit stable storage (spec §7,
                // invariant 7). Report the last known-durable values so the
                // leader retries instead of wrongly believing we're caught up.
                return AppendEntriesResponse {
                    term: prior_term,
                    success: false,
                    follower_id: self.id.clone(),
                    last_log_index: prior_log_index,
                };
            }
        }
        if commit_advanced {
            self.poke_applier();
        }

        response
    }

    /// Handles an inbound `RequestVote` (spec §4.5 Follower vote-granting rule).
    pub(crate) async fn on_request_vote(self: &Arc<Self>, req: RequestVoteRequest) -> RequestVoteResponse {
        let (response, persist_needed, prior_term) = {
            let mut s = self.state.lock().await;
            let prior_term = s.common.current_term;

            let term_changed = req.term > s.common.current_term;
            if term_changed {
                s.common.current_term = req.term;
                s.common.voted_for = None;
                if !s.role.is_follower() {
                    s.role = Role::Follower;
                }
            }

            let mut vote_granted = false;
            let mut persist_needed = term_changed;

            if req.term >= s.common.current_term
                && (s.common.voted_for.is_none() || s.common.voted_for.as_deref() == Some(req.candidate_id.as_str()))
                && s.common.log.is_other_log_up_to_date(req.last_log_term, req.last_log_index)
            {
                s.common.voted_for = Some(req.candidate_id.clone());
                s.common.timer_reset_at = Instant::now();
                vote_granted = true;
                persist_needed = true;
                info!("[{}] granted vote to {} for term {}", self.id, req.candidate_id, req.term);
            }

            let response = RequestVoteResponse {
                term: s.common.current_term,
                vote_granted,
                voter_id: self.id.clone(),
            };
            (response, persist_needed, prior_term)
        };

        if persist_needed {
            if let Err(e) = self.persist_meta().await {
                self.observer.error(e);
                // The vote/term update never hit stable storage: never
                // claim it happened, or a crash-and-restart before the real
                // write lands could grant a second vote for the same term
                // (invariant 2, Election Safety).
                return RequestVoteResponse {
                    term: prior_term,
                    vote_granted: false,
                    voter_id: self.id.clone(),
                };
            }
        }

        response
    }
}
