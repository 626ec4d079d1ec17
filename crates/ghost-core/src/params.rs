//! Consensus parameters and protocol constants.
//!
//! All monetary values are in atoms, the smallest indivisible unit.
//! The parameters are read from configuration once at startup; the
//! validator receives them by reference and never consults global state.

use serde::{Deserialize, Serialize};

/// Default Ghost protocol TCP port.
pub const DEFAULT_GHOST_PORT: u16 = 31013;

/// Default health-check TCP port (one-byte probe/reply).
pub const DEFAULT_HEALTH_PORT: u16 = 31014;

/// Default number of dial-or-listen handler slots.
pub const DEFAULT_MAX_BIDIRECTIONAL: usize = 10;

/// Default total handler pool size.
pub const DEFAULT_MAX_INBOUND: usize = 90;

/// Ghost handshake version tag.
pub const GHOST_PROTOCOL_VERSION: u64 = 1;

/// Version byte prefixed to public keys when deriving addresses.
pub const ADDRESS_VERSION: u8 = 0x47;

/// Consensus-critical limits and emission knobs.
///
/// Mirrors the configuration keys read at startup. Two nodes disagree on
/// block admissibility as soon as any of these differ, so they are part of
/// the network definition rather than local tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    /// Upper bound on the canonical encoded size of a block, in bytes.
    pub block_size_limit: usize,
    /// Maximum seconds a block timestamp may run ahead of the local clock.
    pub future_time_limit: u64,
    /// Target seconds per block.
    pub target_solvetime: u64,
    /// Number of recent blocks the difficulty oracle averages over.
    pub retargeting_window: u64,
    /// Block interval between difficulty rebalances.
    pub diff_rebalance_offset: u64,
    /// First index with zero reward; emission runs over `0..block_at_full_emission`.
    pub block_at_full_emission: u64,
    /// Total atoms ever emitted by the reward schedule.
    pub total_token_supply: u128,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            block_size_limit: 8 * 1024 * 1024,
            future_time_limit: 7_200,
            target_solvetime: 120,
            retargeting_window: 60,
            diff_rebalance_offset: 10_000,
            block_at_full_emission: 2_000_000,
            // sigma(2_000_000) * 50, so the linear schedule divides exactly.
            total_token_supply: 100_000_050_000_000,
        }
    }
}
