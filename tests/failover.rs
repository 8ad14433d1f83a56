//! Failover integration test (spec §4.5 worked example S4): a leader
//! that observes a higher term in any RPC reply steps down to
//! `Follower` immediately, no matter how the higher term is learned.

use std::sync::Arc;
use std::time::Duration;

use raft_consensus::mem::{MemoryNetwork, MemoryPersistence};
use raft_consensus::observer::NullObserver;
use raft_consensus::persistence::PersistenceBackend;
use raft_consensus::rpc::{RequestVoteRequest, RpcRequest, RpcResponse};
use raft_consensus::transport::Transport;
use raft_consensus::{Node, RaftConfig};

fn config(id: &str, peers: Vec<String>, persistence: Arc<MemoryPersistence>, network: &Arc<MemoryNetwork>) -> RaftConfig {
    RaftConfig {
        id: Some(id.to_string()),
        uuid: Box::new(|| unreachable!("id is always supplied in tests")),
        peers,
        min_election_timeout: Duration::from_millis(60),
        max_election_timeout: Duration::from_millis(100),
        heartbeat_interval: Duration::from_millis(15),
        persistence: persistence as Arc<dyn PersistenceBackend>,
        transport: network.transport() as Arc<dyn Transport>,
    }
}

async fn wait_for_leader(nodes: &[Arc<Node>], timeout: Duration) -> Option<Arc<Node>> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        for node in nodes {
            if node.is_leader().await {
                return Some(Arc::clone(node));
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// A leader whose next heartbeat reply reveals a peer already on a far
/// higher term steps down to `Follower` and adopts that term, rather
/// than continuing to act as leader of a stale term.
#[tokio::test]
async fn leader_steps_down_on_higher_term_in_heartbeat_reply() {
    let ids = ["n0", "n1", "n2"];
    let network = MemoryNetwork::new();
    let persistence = MemoryPersistence::new();
    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        let peers: Vec<String> = ids.iter().filter(|p| **p != id).map(|p| p.to_string()).collect();
        let cfg = config(id, peers, Arc::clone(&persistence), &network);
        let node = Node::new(cfg, Arc::new(NullObserver)).expect("valid config");
        network.register(id.to_string(), Arc::clone(&node));
        nodes.push(node);
    }
    for node in &nodes {
        node.start().await;
    }

    let leader = wait_for_leader(&nodes, Duration::from_secs(2))
        .await
        .expect("cluster should elect a leader");
    let leader_term = leader.current_term().await;

    // A bystander (neither the leader nor ever contacted by this test's
    // RequestVote) jumps to a far higher term, the way a node would after
    // recovering from a long partition.
    let bystander = nodes.iter().find(|n| n.id() != leader.id()).expect("a non-leader node exists");
    let bump_term = leader_term + 50;
    let bump = RpcRequest::RequestVote(RequestVoteRequest {
        term: bump_term,
        candidate_id: "phantom".to_string(),
        last_log_index: 0,
        last_log_term: 0,
    });
    match bystander.handle_rpc(bump).await {
        RpcResponse::RequestVote(resp) => assert_eq!(resp.term, bump_term),
        other => panic!("expected RequestVote response, got {other:?}"),
    }
    assert_eq!(bystander.current_term().await, bump_term);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if !leader.is_leader().await {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "leader never stepped down after seeing a higher term");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(leader.current_term().await >= bump_term, "leader should have adopted the higher term");

    for node in &nodes {
        node.stop().await;
    }
}
