//! Network configuration for the Ghost peer layer.

use std::time::Duration;

use ghost_core::params::{
    DEFAULT_GHOST_PORT, DEFAULT_HEALTH_PORT, DEFAULT_MAX_BIDIRECTIONAL, DEFAULT_MAX_INBOUND,
    GHOST_PROTOCOL_VERSION,
};

use crate::discovery::parse_peer_addr;

/// Configuration for the handler fleet.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// TCP port the Ghost protocol listens on.
    pub port: u16,
    /// TCP port for the one-byte health probe.
    pub health_port: u16,
    /// Handler slots that dial a known peer before falling back to listen.
    pub max_bidirectional: usize,
    /// Total handler pool size.
    pub max_inbound: usize,
    /// Fallback `"ip:port"` peers used when the peer store is empty.
    pub seed_peers: Vec<String>,
    /// Delay before a fresh handler consults its role and the peer list.
    pub startup_delay: Duration,
    /// Outbound connect timeout before degrading to listen.
    pub dial_timeout: Duration,
    /// Interval between health pings on a ready session.
    pub ping_interval: Duration,
    /// Pause before the supervisor respawns a dead handler.
    pub restart_delay: Duration,
    /// Handshake version tag announced to peers.
    pub protocol_version: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GHOST_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            max_bidirectional: DEFAULT_MAX_BIDIRECTIONAL,
            max_inbound: DEFAULT_MAX_INBOUND,
            seed_peers: Vec::new(),
            startup_delay: Duration::from_secs(2),
            dial_timeout: Duration::from_secs(1),
            ping_interval: Duration::from_secs(30),
            restart_delay: Duration::from_millis(500),
            protocol_version: GHOST_PROTOCOL_VERSION,
        }
    }
}

impl NetworkConfig {
    /// Parse the configured seed peers, dropping malformed entries.
    pub fn seed_peer_list(&self) -> Vec<(String, u16)> {
        self.seed_peers
            .iter()
            .filter_map(|s| parse_peer_addr(s))
            .collect()
    }

    /// Socket address string for the Ghost listener.
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
