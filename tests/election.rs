//! Election integration tests (spec §4.5, worked examples S1-S3), run
//! against the in-memory transport/persistence harness from
//! `raft_consensus::mem`, without a real TCP listener or disk.

use std::sync::Arc;
use std::time::Duration;

use raft_consensus::mem::{MemoryNetwork, MemoryPersistence};
use raft_consensus::observer::NullObserver;
use raft_consensus::persistence::PersistenceBackend;
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

async fn build_cluster(ids: &[&str]) -> (Arc<MemoryNetwork>, Arc<MemoryPersistence>, Vec<Arc<Node>>) {
    let network = MemoryNetwork::new();
    let persistence = MemoryPersistence::new();
    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        let peers: Vec<String> = ids.iter().filter(|p| **p != *id).map(|p| p.to_string()).collect();
        let cfg = config(id, peers, Arc::clone(&persistence), &network);
        let node = Node::new(cfg, Arc::new(NullObserver)).expect("valid config");
        network.register(id.to_string(), Arc::clone(&node));
        nodes.push(node);
    }
    for node in &nodes {
        node.start().await;
    }
    (network, persistence, nodes)
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

/// S1: a single-node cluster has no peers, so it must win its own
/// election immediately (quorum of one).
#[tokio::test]
async fn single_node_cluster_elects_itself_leader() {
    let (_network, _persistence, nodes) = build_cluster(&["solo"]).await;

    let leader = wait_for_leader(&nodes, Duration::from_secs(2))
        .await
        .expect("solo node should become leader");

    assert_eq!(leader.id(), "solo");
    assert_eq!(leader.current_term().await, 1);

    for node in &nodes {
        node.stop().await;
    }
}

/// S2: a three-node cluster elects exactly one leader, and a client
/// command submitted to it is replicated, committed, and applied on
/// every node.
#[tokio::test]
async fn three_node_cluster_elects_one_leader_and_replicates() {
    let (_network, persistence, nodes) = build_cluster(&["n0", "n1", "n2"]).await;

    let leader = wait_for_leader(&nodes, Duration::from_secs(2))
        .await
        .expect("cluster should elect a leader");

    let leader_count = {
        let mut count = 0;
        for node in &nodes {
            if node.is_leader().await {
                count += 1;
            }
        }
        count
    };
    assert_eq!(leader_count, 1, "exactly one node should hold leadership");

    let index = leader.command(b"set x=1".to_vec()).await.expect("command should commit");
    assert_eq!(index, 1);

    for node in &nodes {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while node.last_applied().await < index {
            assert!(tokio::time::Instant::now() < deadline, "{} never applied index {index}", node.id());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    assert_eq!(persistence.applied_commands(leader.id()), vec![b"set x=1".to_vec()]);
    for node in &nodes {
        assert_eq!(persistence.applied_commands(node.id()), vec![b"set x=1".to_vec()], "{} diverged", node.id());
    }

    for node in &nodes {
        node.stop().await;
    }
}

/// S3: a client command sent to a non-leader node is rejected
/// immediately with `NotLeader`, without touching the log.
#[tokio::test]
async fn command_on_follower_is_rejected_immediately() {
    let (_network, _persistence, nodes) = build_cluster(&["n0", "n1", "n2"]).await;

    let leader = wait_for_leader(&nodes, Duration::from_secs(2))
        .await
        .expect("cluster should elect a leader");

    let follower = nodes.iter().find(|n| n.id() != leader.id()).expect("a follower exists");

    let result = follower.command(b"set y=1".to_vec()).await;
    match result {
        Err(raft_consensus::RaftError::NotLeader { leader_id }) => {
            assert_eq!(leader_id.as_deref(), Some(leader.id()));
        }
        other => panic!("expected NotLeader, got {other:?}"),
    }

    for node in &nodes {
        node.stop().await;
    }
}
