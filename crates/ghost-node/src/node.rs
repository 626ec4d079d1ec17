//! Node wiring: the chain facade and full startup.
//!
//! [`Chain`] bundles the stores, the signature scheme, and the consensus
//! parameters behind two entry points — `submit_block` and
//! `submit_transaction` — that the router calls for everything arriving
//! from peers. [`Node::start`] assembles the reference stores, starts the
//! fleet, and spawns the router.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::info;

use ghost_core::block_validation::{validate_block, ValidationContext};
use ghost_core::error::{BlockError, TransactionError};
use ghost_core::traits::{BlockStore, DifficultyOracle, SignatureVerifier, UtxoPool};
use ghost_core::validation::validate_transaction;
use ghost_core::{Block, ConsensusParams, Transaction, Utxo};

use ghost_network::auth::Credentials;
use ghost_network::Fleet;

use crate::config::{ConfigError, NodeConfig};
use crate::keys::Ed25519Verifier;
use crate::router::Router;
use crate::store::{FixedDifficulty, MemoryBlockStore, MemoryPeerStore, MemoryUtxoPool};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("network startup failed: {0}")]
    Network(#[from] std::io::Error),
}

/// Seconds since the Unix epoch, per the local clock.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The consensus entry point for everything arriving from peers.
pub struct Chain {
    pub blocks: Arc<dyn BlockStore>,
    pub pool: Arc<dyn UtxoPool>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub difficulty: Arc<dyn DifficultyOracle>,
    pub params: ConsensusParams,
}

impl Chain {
    /// Validate a candidate block against the tip and, when it is
    /// admissible, apply its UTXO changes and append it.
    pub fn submit_block(&self, block: &Block) -> Result<(), BlockError> {
        let last = self
            .blocks
            .last_block()
            .map_err(|e| BlockError::Malformed(e.to_string()))?;
        let ctx = ValidationContext {
            difficulty: self.difficulty.expected_difficulty(last.as_ref()),
            last_block: last.as_ref(),
            params: &self.params,
            now: unix_now(),
        };

        let pool = Arc::clone(&self.pool);
        let pool_check = move |u: &Utxo| pool.is_spendable(u).unwrap_or(false);
        validate_block(block, &ctx, pool_check, self.verifier.as_ref())?;

        // Spent inputs leave the pool before the new outputs enter it.
        for tx in &block.transactions {
            for input in &tx.inputs {
                let _ = self.pool.remove(&input.txoid);
            }
            for output in &tx.outputs {
                let _ = self.pool.insert(output.clone());
            }
        }
        self.blocks
            .append(block.clone())
            .map_err(|e| BlockError::Malformed(e.to_string()))?;

        info!(height = block.index, hash = %block.hash, "block accepted");
        Ok(())
    }

    /// Validate a loose transaction against the current pool.
    pub fn submit_transaction(&self, tx: &Transaction) -> Result<(), TransactionError> {
        let pool = Arc::clone(&self.pool);
        let pool_check = move |u: &Utxo| pool.is_spendable(u).unwrap_or(false);
        validate_transaction(tx, &pool_check, self.verifier.as_ref())
    }
}

/// A running node: the chain facade plus the peer fleet.
pub struct Node {
    pub chain: Arc<Chain>,
    pub fleet: Arc<Fleet>,
}

impl Node {
    /// Assemble the reference stores, start the fleet and the router.
    pub async fn start(config: NodeConfig) -> Result<Self, NodeError> {
        let params = config.consensus_params();
        let chain = Arc::new(Chain {
            blocks: Arc::new(MemoryBlockStore::default()),
            pool: Arc::new(MemoryUtxoPool::default()),
            verifier: Arc::new(Ed25519Verifier::new(config.address_version)),
            difficulty: Arc::new(FixedDifficulty(0)),
            params,
        });

        let peer_store = Arc::new(MemoryPeerStore::default());
        let credentials = Credentials::generate(format!("ghost-{}", config.port));
        let (fleet, router_rx) =
            Fleet::start(config.network_config(), peer_store, credentials).await?;
        let fleet = Arc::new(fleet);

        let router = Router {
            chain: chain.clone(),
            fleet: fleet.clone(),
        };
        tokio::spawn(router.run(router_rx));

        if let Some(ip) = ghost_network::discovery::fetch_local_ip() {
            info!(%ip, "local address");
        }
        tokio::spawn(async {
            if let Some(ip) = ghost_network::discovery::fetch_public_ip().await {
                info!(%ip, "public address to announce");
            }
        });

        info!(addr = %fleet.local_addr(), "node started");
        Ok(Self { chain, fleet })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use ghost_core::reward;
    use std::collections::BTreeMap;
    use ghost_core::types::TxType;

    const VERSION: u8 = 0x47;

    fn params() -> ConsensusParams {
        ConsensusParams {
            block_at_full_emission: 4,
            total_token_supply: 100,
            ..ConsensusParams::default()
        }
    }

    fn chain() -> Chain {
        Chain {
            blocks: Arc::new(MemoryBlockStore::default()),
            pool: Arc::new(MemoryUtxoPool::default()),
            verifier: Arc::new(Ed25519Verifier::new(VERSION)),
            difficulty: Arc::new(FixedDifficulty(0)),
            params: params(),
        }
    }

    fn seal(mut block: Block) -> Block {
        block.merkle_root = block.compute_merkle_root().unwrap_or_default();
        block.hash = block.header_hash();
        block
    }

    fn genesis(miner: &str) -> Block {
        let reward = reward::block_reward(0, &params());
        let cb = Transaction::coinbase(reward, miner, unix_now() as i64);
        seal(Block {
            index: 0,
            previous_hash: String::new(),
            hash: String::new(),
            merkle_root: String::new(),
            timestamp: unix_now(),
            nonce: 0,
            difficulty: 0,
            transactions: vec![cb],
        })
    }

    #[test]
    fn genesis_is_accepted_and_its_outputs_become_spendable() {
        let chain = chain();
        let kp = KeyPair::generate(VERSION);
        let block = genesis(&kp.address());

        chain.submit_block(&block).unwrap();

        assert_eq!(chain.blocks.height().unwrap(), 1);
        let coinbase_out = &block.transactions[0].outputs[0];
        assert!(chain.pool.is_spendable(coinbase_out).unwrap());
    }

    #[test]
    fn spending_the_coinbase_in_the_next_block() {
        let chain = chain();
        let kp = KeyPair::generate(VERSION);
        let block0 = genesis(&kp.address());
        chain.submit_block(&block0).unwrap();

        // Spend the 40-atom genesis coinbase: 35 out, 5 fee.
        let spent = block0.transactions[0].outputs[0].clone();
        let mut tx = Transaction {
            id: String::new(),
            inputs: vec![spent.clone()],
            outputs: vec![Utxo {
                txoid: String::new(),
                addr: "recipient".into(),
                amount: 35,
            }],
            sigs: BTreeMap::new(),
            txtype: TxType::P2pk,
        };
        tx.id = tx.calculate_hash().unwrap();
        tx.outputs[0].txoid = format!("{}:0", tx.id);
        let digest = tx.signing_digest();
        tx.sigs.insert(kp.address(), kp.sign(&digest));

        // reward(1) = 30 + fee 5
        let cb = Transaction::coinbase(35, &kp.address(), unix_now() as i64 + 1);
        let block1 = seal(Block {
            index: 1,
            previous_hash: block0.hash.clone(),
            hash: String::new(),
            merkle_root: String::new(),
            timestamp: unix_now(),
            nonce: 0,
            difficulty: 0,
            transactions: vec![cb, tx.clone()],
        });

        chain.submit_block(&block1).unwrap();

        // The spent UTXO left the pool; the new one entered it.
        assert!(!chain.pool.is_spendable(&spent).unwrap());
        assert!(chain.pool.is_spendable(&tx.outputs[0]).unwrap());
    }

    #[test]
    fn replayed_input_fails_the_pool_check() {
        let chain = chain();
        let kp = KeyPair::generate(VERSION);
        let block0 = genesis(&kp.address());
        chain.submit_block(&block0).unwrap();

        // A transaction claiming a UTXO the pool has never seen.
        let mut tx = Transaction {
            id: String::new(),
            inputs: vec![Utxo {
                txoid: "deadbeef:0".into(),
                addr: kp.address(),
                amount: 10,
            }],
            outputs: vec![],
            sigs: BTreeMap::new(),
            txtype: TxType::P2pk,
        };
        tx.id = tx.calculate_hash().unwrap();
        let digest = tx.signing_digest();
        tx.sigs.insert(kp.address(), kp.sign(&digest));

        assert_eq!(
            chain.submit_transaction(&tx),
            Err(TransactionError::FailedPoolCheck("deadbeef:0".into()))
        );
    }

    #[test]
    fn forged_signature_is_rejected() {
        let chain = chain();
        let owner = KeyPair::generate(VERSION);
        let thief = KeyPair::generate(VERSION);
        let block0 = genesis(&owner.address());
        chain.submit_block(&block0).unwrap();

        let spent = block0.transactions[0].outputs[0].clone();
        let mut tx = Transaction {
            id: String::new(),
            inputs: vec![spent],
            outputs: vec![],
            sigs: BTreeMap::new(),
            txtype: TxType::P2pk,
        };
        tx.id = tx.calculate_hash().unwrap();
        let digest = tx.signing_digest();
        // The thief signs, but the UTXO belongs to the owner's address.
        tx.sigs.insert(owner.address(), thief.sign(&digest));

        assert!(matches!(
            chain.submit_transaction(&tx),
            Err(TransactionError::InvalidTxSig(_))
        ));
    }

    #[test]
    fn rejected_block_leaves_no_state_behind() {
        let chain = chain();
        let kp = KeyPair::generate(VERSION);
        let mut block = genesis(&kp.address());
        // Overpay the coinbase.
        block.transactions[0].outputs[0].amount += 1;
        let block = seal(block);

        assert!(matches!(
            chain.submit_block(&block),
            Err(BlockError::InvalidCoinbase { .. })
        ));
        assert_eq!(chain.blocks.height().unwrap(), 0);
        assert!(!chain
            .pool
            .is_spendable(&block.transactions[0].outputs[0])
            .unwrap());
    }
}
