//! SHA-256 hex hashing and the Merkle commitment over ordered leaf lists.
//!
//! Every hash in the protocol is lowercase hex. The Merkle construction
//! hashes each leaf first, then pairs hex digests left-to-right by
//! concatenating the two hex strings and re-hashing the ASCII bytes.
//! Odd-length layers duplicate their last element.

use sha2::{Digest, Sha256};

/// SHA-256 of `data`, rendered as lowercase hex.
pub fn sha_base16(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Merkle root of an ordered list of byte leaves.
///
/// Returns `None` for an empty list; callers preclude that case.
/// The root of a single-leaf list is `sha_base16(leaf)`.
pub fn merkle_root<T: AsRef<[u8]>>(leaves: &[T]) -> Option<String> {
    if leaves.is_empty() {
        return None;
    }

    let mut level: Vec<String> = leaves.iter().map(sha_base16).collect();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level.into_iter().next()
}

/// Reduce one Merkle layer to the next.
///
/// Pairs adjacent digests by string concatenation. An odd tail is paired
/// with itself.
fn next_level(level: &[String]) -> Vec<String> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut i = 0;
    while i < level.len() {
        let left = &level[i];
        let right = level.get(i + 1).unwrap_or(left);
        let mut joined = String::with_capacity(left.len() + right.len());
        joined.push_str(left);
        joined.push_str(right);
        next.push(sha_base16(joined));
        i += 2;
    }
    next
}
