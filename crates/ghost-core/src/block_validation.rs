//! Block validation.
//!
//! [`validate_block`] is the consensus gate: a pure function from a
//! candidate block and an injected view of the world to `Ok` or the first
//! failing rule. Any divergence between implementations forks the chain,
//! so the check order and every comparison are fixed.
//!
//! The genesis block (`index == 0`) skips the index and parent-hash checks;
//! everything else applies to it unchanged.

use crate::difficulty::hash_beats_target;
use crate::error::{BlockError, TransactionError};
use crate::params::ConsensusParams;
use crate::reward::block_reward;
use crate::traits::SignatureVerifier;
use crate::types::{Block, TxType, Utxo};
use crate::validation::validate_transaction;

/// Everything the validator needs besides the candidate block itself.
///
/// The caller supplies the expected difficulty, the current chain tip
/// (`None` only for genesis), the consensus parameters, and its reading of
/// the wall clock — the validator performs no I/O of its own.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Expected difficulty for this height, from the difficulty oracle.
    pub difficulty: u64,
    /// The current chain tip. Ignored for genesis.
    pub last_block: Option<&'a Block>,
    /// Network consensus parameters.
    pub params: &'a ConsensusParams,
    /// Current wall-clock time in Unix seconds.
    pub now: u64,
}

/// Validate a candidate block. Checks run in order; the first failure is
/// returned:
///
/// 1. `index > last.index` (skipped for genesis)
/// 2. `previous_hash == last.hash` (skipped for genesis)
/// 3. coinbase well-formedness and reward amount
/// 4. every transaction validates ([`validate_transaction`])
/// 5. the header's Merkle root matches the transactions
/// 6. the recomputed hash matches the claimed hash and beats the target
/// 7. `timestamp < now + future_time_limit`
/// 8. canonical encoded size within the block size limit
pub fn validate_block<P>(
    block: &Block,
    ctx: &ValidationContext<'_>,
    pool_check: P,
    verifier: &dyn SignatureVerifier,
) -> Result<(), BlockError>
where
    P: Fn(&Utxo) -> bool,
{
    if block.index != 0 {
        // A non-genesis candidate with no tip has nothing to extend.
        let last = ctx.last_block.ok_or(BlockError::InvalidIndex {
            prev: 0,
            got: block.index,
        })?;

        if block.index <= last.index {
            return Err(BlockError::InvalidIndex {
                prev: last.index,
                got: block.index,
            });
        }

        if block.previous_hash != last.hash {
            return Err(BlockError::DoesntMatchLast {
                got: block.previous_hash.clone(),
                expected: last.hash.clone(),
            });
        }
    }

    check_coinbase(block, ctx.params)?;

    let tx_errors: Vec<(usize, TransactionError)> = block
        .transactions
        .iter()
        .enumerate()
        .filter_map(|(i, tx)| {
            validate_transaction(tx, &pool_check, verifier)
                .err()
                .map(|e| (i, e))
        })
        .collect();
    if !tx_errors.is_empty() {
        return Err(BlockError::InvalidTransactions(tx_errors));
    }

    if block.compute_merkle_root().as_deref() != Some(block.merkle_root.as_str()) {
        return Err(BlockError::InvalidMerkleRoot);
    }

    let computed = block.header_hash();
    if computed != block.hash {
        return Err(BlockError::DoesntMatchProvided {
            computed,
            claimed: block.hash.clone(),
        });
    }
    if !hash_beats_target(&block.hash, ctx.difficulty) {
        return Err(BlockError::TooHigh {
            hash: block.hash.clone(),
            difficulty: ctx.difficulty,
        });
    }

    if block.timestamp >= ctx.now.saturating_add(ctx.params.future_time_limit) {
        return Err(BlockError::TimestampTooHigh);
    }

    let size = block.encoded_size();
    if size > ctx.params.block_size_limit {
        return Err(BlockError::BlockTooLarge {
            size,
            limit: ctx.params.block_size_limit,
        });
    }

    Ok(())
}

/// Coinbase well-formedness: present, first, unique, and paying exactly
/// `block_reward(index) + Σ fees`.
///
/// A transaction whose outputs exceed its inputs contributes zero fee here;
/// the transaction check rejects it afterwards regardless.
fn check_coinbase(block: &Block, params: &ConsensusParams) -> Result<(), BlockError> {
    let Some(coinbase) = block.transactions.first() else {
        return Err(BlockError::NoCoinbase);
    };

    if coinbase.txtype != TxType::Coinbase {
        return Err(BlockError::NotCoinbase(coinbase.txtype.label().to_string()));
    }

    let coinbase_count = block
        .transactions
        .iter()
        .filter(|tx| tx.txtype == TxType::Coinbase)
        .count();
    if coinbase_count > 1 {
        return Err(BlockError::TooManyCoinbase);
    }

    let fees: u128 = block.transactions[1..]
        .iter()
        .map(|tx| tx.fee().unwrap_or(0))
        .fold(0u128, u128::saturating_add);

    let reward = block_reward(block.index, params);
    let amount = coinbase
        .outputs
        .first()
        .map(|o| o.amount)
        .unwrap_or(0);

    if amount != reward.saturating_add(fees) {
        return Err(BlockError::InvalidCoinbase {
            fees,
            reward,
            amount,
        });
    }

    Ok(())
}
