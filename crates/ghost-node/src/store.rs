//! In-memory reference implementations of the store interfaces.
//!
//! Good enough for wiring, tests, and single-process runs; durable
//! backends replace them behind the same `ghost-core` traits.

use std::collections::HashMap;

use parking_lot::RwLock;

use ghost_core::error::StoreError;
use ghost_core::traits::{BlockStore, DifficultyOracle, PeerRecord, PeerStore, UtxoPool};
use ghost_core::types::{Block, Utxo};

/// Append-only in-memory chain.
#[derive(Default)]
pub struct MemoryBlockStore {
    chain: RwLock<Vec<Block>>,
}

impl BlockStore for MemoryBlockStore {
    fn last_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(self.chain.read().last().cloned())
    }

    fn block_by_index(&self, index: u64) -> Result<Option<Block>, StoreError> {
        Ok(self
            .chain
            .read()
            .iter()
            .find(|b| b.index == index)
            .cloned())
    }

    fn append(&self, block: Block) -> Result<(), StoreError> {
        self.chain.write().push(block);
        Ok(())
    }
}

/// In-memory spendable-output set, keyed by txoid.
#[derive(Default)]
pub struct MemoryUtxoPool {
    utxos: RwLock<HashMap<String, Utxo>>,
}

impl UtxoPool for MemoryUtxoPool {
    fn is_spendable(&self, utxo: &Utxo) -> Result<bool, StoreError> {
        // The claimed addr and amount must match the pool's view exactly;
        // a txoid alone is not enough to spend someone else's output.
        Ok(self.utxos.read().get(&utxo.txoid) == Some(utxo))
    }

    fn insert(&self, utxo: Utxo) -> Result<(), StoreError> {
        self.utxos.write().insert(utxo.txoid.clone(), utxo);
        Ok(())
    }

    fn remove(&self, txoid: &str) -> Result<(), StoreError> {
        self.utxos.write().remove(txoid);
        Ok(())
    }
}

/// In-memory peer identity records plus the known-peer address book.
#[derive(Default)]
pub struct MemoryPeerStore {
    records: RwLock<HashMap<String, PeerRecord>>,
    peers: RwLock<Vec<(String, u16)>>,
}

impl PeerStore for MemoryPeerStore {
    fn load(&self, identifier: &str) -> Result<Option<PeerRecord>, StoreError> {
        Ok(self.records.read().get(identifier).cloned())
    }

    fn save(&self, record: PeerRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .insert(record.identifier.clone(), record);
        Ok(())
    }

    fn known_peers(&self) -> Result<Vec<(String, u16)>, StoreError> {
        Ok(self.peers.read().clone())
    }

    fn add_known_peer(&self, ip: String, port: u16) -> Result<(), StoreError> {
        let mut peers = self.peers.write();
        if !peers.iter().any(|(i, p)| *i == ip && *p == port) {
            peers.push((ip, port));
        }
        Ok(())
    }
}

/// Constant-difficulty oracle.
///
/// Retargeting is a consensus-oracle concern outside this workspace; nodes
/// that need it plug a real oracle in through the same trait.
pub struct FixedDifficulty(pub u64);

impl DifficultyOracle for FixedDifficulty {
    fn expected_difficulty(&self, _last_block: Option<&Block>) -> u64 {
        self.0
    }
}
