//! Difficulty target test.
//!
//! `difficulty` is a whole number of required leading zero bits: a block
//! hash beats the target iff, read as a 256-bit big-endian integer, it is
//! strictly below `2^(256 − difficulty)`. That holds exactly when the top
//! `difficulty` bits of the hash are zero, so the test is a leading-zero
//! count with no big-integer arithmetic. This comparison is
//! consensus-critical and must be identical across implementations.
//!
//! Retargeting itself lives with the difficulty oracle that feeds the
//! validator; the `retargeting_window` / `diff_rebalance_offset` /
//! `target_solvetime` parameters are carried in
//! [`ConsensusParams`](crate::params::ConsensusParams) for it.

/// Does `hash_hex` beat the target derived from `difficulty`?
///
/// A non-hex or non-256-bit hash never beats anything. `difficulty == 0`
/// accepts every well-formed hash; `difficulty == 256` accepts only the
/// all-zero hash; anything above 256 accepts nothing.
pub fn hash_beats_target(hash_hex: &str, difficulty: u64) -> bool {
    let Ok(bytes) = hex::decode(hash_hex) else {
        return false;
    };
    if bytes.len() != 32 {
        return false;
    }
    leading_zero_bits(&bytes) >= difficulty
}

/// Number of leading zero bits in a big-endian byte string.
fn leading_zero_bits(bytes: &[u8]) -> u64 {
    let mut count = 0u64;
    for &b in bytes {
        if b == 0 {
            count += 8;
        } else {
            count += b.leading_zeros() as u64;
            break;
        }
    }
    count
}
