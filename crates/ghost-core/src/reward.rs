//! Emission schedule.
//!
//! Rewards decay linearly to zero at `block_at_full_emission`. With
//! `N = block_at_full_emission`, `S = total_token_supply` and the
//! triangular sigma `σ(N) = N(N+1)/2`:
//!
//! ```text
//! block_reward(i) = (N − i) · S / σ(N)   for i < N, else 0
//! ```
//!
//! Summed over `0..N` the schedule yields exactly `S` whenever `σ(N)`
//! divides `S` (the shipped defaults do); otherwise integer truncation
//! loses at most `σ(N) − 1` atoms over the whole emission.

use crate::params::ConsensusParams;

/// Triangular sigma `n(n+1)/2`, the denominator of the linear schedule.
pub fn emission_sigma(n: u64) -> u128 {
    (n as u128 * (n as u128 + 1)) / 2
}

/// The reward (in atoms) for the block at `index`.
pub fn block_reward(index: u64, params: &ConsensusParams) -> u128 {
    let n = params.block_at_full_emission;
    if index >= n {
        return 0;
    }
    let sigma = emission_sigma(n);
    if sigma == 0 {
        return 0;
    }
    ((n - index) as u128).saturating_mul(params.total_token_supply) / sigma
}

/// Total atoms emitted for blocks `0..=index`.
///
/// O(index); intended for tests and audits, not per-block hot paths.
pub fn cumulative_emission(index: u64, params: &ConsensusParams) -> u128 {
    (0..=index)
        .map(|i| block_reward(i, params))
        .fold(0u128, u128::saturating_add)
}
