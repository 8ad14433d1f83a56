//! Runs a small in-process Raft cluster end to end: starts `node_count`
//! nodes wired together with the in-memory transport/persistence from
//! `raft_consensus::mem`, waits for a leader to be elected, submits
//! `commands` client commands to it, and prints the resulting log on every
//! node. Demonstrates the external interfaces from spec §6 without a real
//! network or disk.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use raft_consensus::mem::{MemoryNetwork, MemoryPersistence};
use raft_consensus::observer::NullObserver;
use raft_consensus::persistence::PersistenceBackend;
use raft_consensus::transport::Transport;
use raft_consensus::{Node, RaftConfig};

#[derive(Parser)]
#[command(version, about = "Run a small in-process Raft cluster", long_about = None)]
struct Cli {
    /// Number of nodes in the cluster
    #[arg(short = 'n', long, default_value = "3")]
    node_count: usize,

    /// Number of client commands to submit to the elected leader
    #[arg(short = 'c', long, default_value = "3")]
    commands: usize,

    /// Minimum election timeout, in milliseconds
    #[arg(long, default_value = "150")]
    min_election_timeout_ms: u64,

    /// Maximum election timeout, in milliseconds
    #[arg(long, default_value = "300")]
    max_election_timeout_ms: u64,

    /// Heartbeat interval, in milliseconds
    #[arg(long, default_value = "50")]
    heartbeat_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let network = MemoryNetwork::new();
    let persistence = MemoryPersistence::new();
    let ids: Vec<String> = (0..cli.node_count).map(|i| format!("node-{i}")).collect();

    let mut nodes = Vec::with_capacity(ids.len());
    for id in &ids {
        let peers: Vec<String> = ids.iter().filter(|p| *p != id).cloned().collect();
        let config = RaftConfig {
            id: Some(id.clone()),
            uuid: Box::new(|| unreachable!("id is always supplied in this demo")),
            peers,
            min_election_timeout: Duration::from_millis(cli.min_election_timeout_ms),
            max_election_timeout: Duration::from_millis(cli.max_election_timeout_ms),
            heartbeat_interval: Duration::from_millis(cli.heartbeat_interval_ms),
            persistence: Arc::clone(&persistence) as Arc<dyn PersistenceBackend>,
            transport: network.transport() as Arc<dyn Transport>,
        };
        let node = Node::new(config, Arc::new(NullObserver))?;
        network.register(id.clone(), Arc::clone(&node));
        nodes.push(node);
    }

    for node in &nodes {
        node.start().await;
    }

    info!("waiting for a leader to be elected...");
    let leader = wait_for_leader(&nodes).await;
    info!("{} is leader for term {}", leader.id(), leader.current_term().await);

    for i in 0..cli.commands {
        let cmd = format!("command-{i}").into_bytes();
        match leader.command(cmd).await {
            Ok(index) => info!("committed and applied at index {index}"),
            Err(e) => info!("command failed: {e}"),
        }
    }

    for node in &nodes {
        println!(
            "{}: term={} commit_index={} last_applied={}",
            node.id(),
            node.current_term().await,
            node.commit_index().await,
            node.last_applied().await,
        );
    }

    for node in &nodes {
        node.stop().await;
    }

    Ok(())
}

async fn wait_for_leader(nodes: &[Arc<Node>]) -> Arc<Node> {
    loop {
        for node in nodes {
            if node.is_leader().await {
                return Arc::clone(node);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
