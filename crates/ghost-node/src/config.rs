//! Node configuration.
//!
//! Every key is read once at startup; there is no hot reload. A TOML file
//! supplies overrides on top of the protocol defaults, and the binary may
//! override individual fields again from flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ghost_core::params::{
    ADDRESS_VERSION, DEFAULT_GHOST_PORT, DEFAULT_HEALTH_PORT, DEFAULT_MAX_BIDIRECTIONAL,
    DEFAULT_MAX_INBOUND, GHOST_PROTOCOL_VERSION,
};
use ghost_core::ConsensusParams;
use ghost_network::NetworkConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// All startup configuration for a node.
///
/// `total_token_supply` is a `u64` here because TOML has no 128-bit
/// integers; consensus widens it to `u128`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Ghost protocol TCP listen port.
    pub port: u16,
    /// Health-check TCP port.
    pub health_port: u16,
    /// Dial-or-listen handler slots.
    pub max_bidirectional_connections: usize,
    /// Total handler pool size.
    pub max_inbound_connections: usize,
    /// Fallback `"ip:port"` peers.
    pub seed_peers: Vec<String>,
    /// Encoded-block byte cap.
    pub block_size_limit: usize,
    /// Max seconds a block timestamp may exceed the local clock.
    pub future_time_limit: u64,
    /// Target seconds per block.
    pub target_solvetime: u64,
    /// Difficulty averaging window, in blocks.
    pub retargeting_window: u64,
    /// Block interval between difficulty rebalances.
    pub diff_rebalance_offset: u64,
    /// Last reward block.
    pub block_at_full_emission: u64,
    /// Terminal supply in atoms.
    pub total_token_supply: u64,
    /// Address prefix tag.
    pub address_version: u8,
    /// Handshake version tag.
    pub ghost_protocol_version: u64,
    /// Root for persistent stores.
    pub data_path: PathBuf,
    /// Log level filter string (e.g. "info", "ghost_node=debug").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let params = ConsensusParams::default();
        Self {
            port: DEFAULT_GHOST_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            max_bidirectional_connections: DEFAULT_MAX_BIDIRECTIONAL,
            max_inbound_connections: DEFAULT_MAX_INBOUND,
            seed_peers: Vec::new(),
            block_size_limit: params.block_size_limit,
            future_time_limit: params.future_time_limit,
            target_solvetime: params.target_solvetime,
            retargeting_window: params.retargeting_window,
            diff_rebalance_offset: params.diff_rebalance_offset,
            block_at_full_emission: params.block_at_full_emission,
            total_token_supply: params.total_token_supply as u64,
            address_version: ADDRESS_VERSION,
            ghost_protocol_version: GHOST_PROTOCOL_VERSION,
            data_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ghost"),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load a TOML config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The consensus-parameter view of this configuration.
    pub fn consensus_params(&self) -> ConsensusParams {
        ConsensusParams {
            block_size_limit: self.block_size_limit,
            future_time_limit: self.future_time_limit,
            target_solvetime: self.target_solvetime,
            retargeting_window: self.retargeting_window,
            diff_rebalance_offset: self.diff_rebalance_offset,
            block_at_full_emission: self.block_at_full_emission,
            total_token_supply: self.total_token_supply as u128,
        }
    }

    /// The network-layer view of this configuration.
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            port: self.port,
            health_port: self.health_port,
            max_bidirectional: self.max_bidirectional_connections,
            max_inbound: self.max_inbound_connections,
            seed_peers: self.seed_peers.clone(),
            protocol_version: self.ghost_protocol_version,
            ..NetworkConfig::default()
        }
    }

    /// Directory for peer identity records.
    pub fn peer_db_path(&self) -> PathBuf {
        self.data_path.join("peers")
    }

    /// Directory for chain state.
    pub fn chain_db_path(&self) -> PathBuf {
        self.data_path.join("chaindata")
    }
}
