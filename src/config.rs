//! Node configuration (spec §6).

use std::sync::Arc;
use std::time::Duration;

use crate::error::RaftError;
use crate::persistence::PersistenceBackend;
use crate::transport::Transport;

/// Construction-time options for a [`crate::node::Node`].
///
/// Carries the backend handles spec §6 calls out (`persistence`, and
/// `transport` for peer RPC dispatch) plus an optional explicit `id` /
/// `uuid` generator.
pub struct RaftConfig {
    /// Overrides the node's identity. If unset, `uuid` is used to generate one.
    pub id: Option<String>,

    /// Identity generator used when `id` is not supplied.
    pub uuid: Box<dyn Fn() -> String + Send + Sync>,

    /// Addresses/ids of every other node in the cluster (excludes self).
    pub peers: Vec<String>,

    pub min_election_timeout: Duration,
    pub max_election_timeout: Duration,
    pub heartbeat_interval: Duration,

    pub persistence: Arc<dyn PersistenceBackend>,
    pub transport: Arc<dyn Transport>,
}

impl RaftConfig {
    /// Validates the configuration, per spec §7 `ConfigError`.
    ///
    /// Detected at first use (node construction), not eagerly at every
    /// field assignment, matching spec.md's "detected at first use" wording.
    pub fn validate(&self) -> Result<(), RaftError> {
        if self.max_election_timeout < self.min_election_timeout {
            return Err(RaftError::Config(format!(
                "max_election_timeout ({:?}) must be >= min_election_timeout ({:?})",
                self.max_election_timeout, self.min_election_timeout
            )));
        }
        if self.heartbeat_interval >= self.min_election_timeout {
            return Err(RaftError::Config(format!(
                "heartbeat_interval ({:?}) must be strictly less than min_election_timeout ({:?})",
                self.heartbeat_interval, self.min_election_timeout
            )));
        }
        Ok(())
    }
}
