//! Server configuration.

use crate::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Tunables for one ingestion server.
///
/// Loadable from a YAML file; every field has a sensible default so embedded
/// use can start from [`ServerConfig::default`] and override selectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Stream listener bind address.
    pub tcp_bind: SocketAddr,
    /// Datagram socket bind address.
    pub udp_bind: SocketAddr,
    /// Enable the 16-byte hex parameter group (extended firmware).
    pub extended_hex_parameters: bool,
    /// Idle window after which identity-keyed sessions are evicted, seconds.
    pub session_idle_secs: u64,
    /// Inactivity window after which partial transfers are discarded, seconds.
    pub transfer_inactivity_secs: u64,
    /// Cap on one transfer's declared size, bytes.
    pub max_transfer_size: u64,
    /// Capacity of the decoded-record queue.
    pub record_queue_capacity: usize,
    /// Bounded wait when the record queue is full, milliseconds.
    pub record_enqueue_wait_ms: u64,
    /// Cadence of the session/transfer sweeper, seconds.
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_bind: SocketAddr::from(([0, 0, 0, 0], 5027)),
            udp_bind: SocketAddr::from(([0, 0, 0, 0], 5027)),
            extended_hex_parameters: false,
            session_idle_secs: 600,
            transfer_inactivity_secs: 600,
            max_transfer_size: crate::transfer::DEFAULT_MAX_TRANSFER_SIZE,
            record_queue_capacity: 1024,
            record_enqueue_wait_ms: 250,
            sweep_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    /// Load a configuration from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::config(path, e.to_string()))?;
        serde_yaml_ng::from_str(&raw).map_err(|e| ProtocolError::config(path, e.to_string()))
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    pub fn transfer_inactivity(&self) -> Duration {
        Duration::from_secs(self.transfer_inactivity_secs)
    }

    pub fn record_enqueue_wait(&self) -> Duration {
        Duration::from_millis(self.record_enqueue_wait_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
