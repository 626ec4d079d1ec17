//! Interfaces to the external collaborators.
//!
//! The ledger, the UTXO pool, the peer identity store, and the key scheme
//! are owned outside this crate; consensus code reaches them only through
//! these traits. Durable backends implement them elsewhere; `ghost-node`
//! ships in-memory reference implementations for wiring and tests.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{Block, Utxo};

/// SRP-6a material persisted per peer identifier.
///
/// `salt`, `prime`, `generator`, and `verifier` are big-endian unsigned
/// magnitudes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub identifier: String,
    pub salt: Vec<u8>,
    pub prime: Vec<u8>,
    pub generator: Vec<u8>,
    pub verifier: Vec<u8>,
}

/// Append-only ledger view.
pub trait BlockStore: Send + Sync {
    /// The current chain tip, or `None` before genesis is connected.
    fn last_block(&self) -> Result<Option<Block>, StoreError>;

    /// Block lookup by height.
    fn block_by_index(&self, index: u64) -> Result<Option<Block>, StoreError>;

    /// Append an accepted block at the tip.
    fn append(&self, block: Block) -> Result<(), StoreError>;

    /// Chain height: the tip index plus one, zero for an empty chain.
    ///
    /// Default implementation derives it from [`last_block`](Self::last_block).
    fn height(&self) -> Result<u64, StoreError> {
        Ok(self.last_block()?.map(|b| b.index + 1).unwrap_or(0))
    }
}

/// The spendability oracle behind the validator's pool check.
pub trait UtxoPool: Send + Sync {
    /// Is this exact UTXO currently spendable?
    fn is_spendable(&self, utxo: &Utxo) -> Result<bool, StoreError>;

    /// Make a UTXO spendable (its containing block was accepted).
    fn insert(&self, utxo: Utxo) -> Result<(), StoreError>;

    /// Consume a UTXO (it was referenced by an accepted input).
    fn remove(&self, txoid: &str) -> Result<(), StoreError>;
}

/// Durable peer identity store plus the known-peer address book.
pub trait PeerStore: Send + Sync {
    /// Load the SRP record for a peer identifier.
    fn load(&self, identifier: &str) -> Result<Option<PeerRecord>, StoreError>;

    /// Persist (or replace) the SRP record for a peer.
    fn save(&self, record: PeerRecord) -> Result<(), StoreError>;

    /// Ordered list of known peer addresses as `(ip, port)`.
    fn known_peers(&self) -> Result<Vec<(String, u16)>, StoreError>;

    /// Remember a peer address for future dials.
    fn add_known_peer(&self, ip: String, port: u16) -> Result<(), StoreError>;
}

/// Supplies the expected difficulty for the next block.
///
/// Retargeting is owned by the consensus oracle outside this crate; the
/// validator only compares against the value this trait hands it.
pub trait DifficultyOracle: Send + Sync {
    fn expected_difficulty(&self, last_block: Option<&Block>) -> u64;
}

/// Signature verification as the validator consumes it.
///
/// The key scheme (address encoding, curves) is a collaborator; consensus
/// only asks whether `signature` verifies for `addr` over `digest`.
pub trait SignatureVerifier: Send + Sync {
    /// Verify a base64 signature for the public key behind `addr`.
    fn verify(&self, addr: &str, signature: &str, digest: &[u8; 32]) -> bool;
}
