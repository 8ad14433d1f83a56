//! A Raft-family consensus core.
//!
//! This crate implements the role state machine (`Idle`/`Follower`/
//! `Candidate`/`Leader`), the election protocol, log replication and commit
//! advancement, durable term/vote/log persistence, and the
//! log-application pipeline for one node in a replicated state machine.
//!
//! The physical transport between nodes, the durable storage backend, and
//! cluster membership configuration are external collaborators the core
//! only talks to through the [`transport::Transport`] and
//! [`persistence::PersistenceBackend`] traits — see those modules for the
//! contracts a host application must implement. [`mem`] provides in-memory
//! implementations of both for tests and the bundled demo binary.

pub mod applier;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod log;
pub mod mem;
pub mod node;
pub mod observer;
pub mod peer;
pub mod persistence;
pub mod role;
pub mod rpc;
pub mod transport;

pub use config::RaftConfig;
pub use error::RaftError;
pub use log::{Log, LogEntry};
pub use node::Node;
pub use observer::{NullObserver, Observer};
pub use persistence::PersistedMeta;
