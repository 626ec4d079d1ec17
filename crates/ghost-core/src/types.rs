//! Protocol entities: UTXOs, transactions, blocks.
//!
//! All monetary values are `u128` atoms. Hashes and transaction output ids
//! travel as lowercase hex strings; a txoid is `"<tx_id>:<output_index>"`.
//!
//! Every wire-facing struct is deserialized with `deny_unknown_fields`, so
//! untrusted input cannot smuggle extra state past the schema. [`Transaction::sanitize`]
//! and [`Block::sanitize`] are the single entry points for untrusted JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical;
use crate::error::{BlockError, TransactionError};
use crate::hash::{merkle_root, sha_base16};

/// An unspent transaction output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Utxo {
    /// Globally unique id: `"<tx_id>:<output_index>"`.
    pub txoid: String,
    /// Recipient address.
    pub addr: String,
    /// Value in atoms.
    pub amount: u128,
}

/// Transaction kind. `P2PK` is the default for value transfers; `COINBASE`
/// is the input-less issuance transaction at position 0 of every block.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxType {
    #[default]
    #[serde(rename = "P2PK")]
    P2pk,
    #[serde(rename = "COINBASE")]
    Coinbase,
}

impl TxType {
    /// The wire label, as it appears in JSON and in canonical encodings.
    pub fn label(&self) -> &'static str {
        match self {
            TxType::P2pk => "P2PK",
            TxType::Coinbase => "COINBASE",
        }
    }
}

/// A transaction transferring value between addresses.
///
/// `sigs` maps each signing address to its base64 signature; keying by
/// address gives the one-pair-per-distinct-address set semantics and a
/// stable iteration order for canonical encoding.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    /// Merkle root over the ordered input txoids; for a coinbase,
    /// `SHA256(miner_address ‖ timestamp_string)`.
    pub id: String,
    /// UTXOs consumed by this transaction. Empty for a coinbase.
    #[serde(default)]
    pub inputs: Vec<Utxo>,
    /// UTXOs created by this transaction.
    pub outputs: Vec<Utxo>,
    /// Address → base64 signature over the signing digest.
    #[serde(default)]
    pub sigs: BTreeMap<String, String>,
    #[serde(default)]
    pub txtype: TxType,
}

/// Checked sum of the amounts in a UTXO list. `None` on overflow.
pub fn sum_amounts(utxos: &[Utxo]) -> Option<u128> {
    utxos.iter().try_fold(0u128, |acc, u| acc.checked_add(u.amount))
}

impl Transaction {
    /// Recompute the transaction id: the Merkle root over the ordered
    /// input txoids. `None` when there are no inputs (coinbase case).
    pub fn calculate_hash(&self) -> Option<String> {
        let txoids: Vec<&[u8]> = self.inputs.iter().map(|u| u.txoid.as_bytes()).collect();
        merkle_root(&txoids)
    }

    /// Build a coinbase paying `amount` to `miner_addr`, stamped with an
    /// explicit timestamp (Unix seconds).
    ///
    /// `id = SHA256(miner_addr ‖ timestamp_string)`; the single output's
    /// txoid is `id:0`.
    pub fn coinbase(amount: u128, miner_addr: &str, timestamp: i64) -> Self {
        let id = sha_base16(format!("{miner_addr}{timestamp}"));
        let txoid = format!("{id}:0");
        Self {
            id,
            inputs: Vec::new(),
            outputs: vec![Utxo {
                txoid,
                addr: miner_addr.to_string(),
                amount,
            }],
            sigs: BTreeMap::new(),
            txtype: TxType::Coinbase,
        }
    }

    /// Build a coinbase stamped with the current UTC time.
    pub fn generate_coinbase(amount: u128, miner_addr: &str) -> Self {
        Self::coinbase(amount, miner_addr, chrono::Utc::now().timestamp())
    }

    /// Whether this transaction claims to be a coinbase.
    pub fn is_coinbase(&self) -> bool {
        self.txtype == TxType::Coinbase
    }

    /// The fee: Σinputs − Σoutputs.
    ///
    /// `None` when either side overflows or the outputs exceed the inputs.
    pub fn fee(&self) -> Option<u128> {
        sum_amounts(&self.inputs)?.checked_sub(sum_amounts(&self.outputs)?)
    }

    /// The digest signatures commit to:
    /// `SHA256(canonical(inputs) ‖ canonical(outputs) ‖ id ‖ txtype)`.
    ///
    /// Depends only on `(inputs, outputs, id, txtype)`; reordering or
    /// amending `sigs` does not change it.
    pub fn signing_digest(&self) -> [u8; 32] {
        Sha256::digest(canonical::transaction_signing_bytes(self)).into()
    }

    /// Strictly deserialize a transaction from untrusted JSON.
    ///
    /// Unknown keys at any depth are rejected, as are non-integer amounts.
    pub fn sanitize(value: serde_json::Value) -> Result<Self, TransactionError> {
        serde_json::from_value(value).map_err(map_sanitize_error)
    }
}

/// A block as the validator consumes it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Block {
    /// Height; hashed big-endian in the canonical header.
    pub index: u64,
    /// Hash of the block at `index - 1`.
    pub previous_hash: String,
    /// Claimed block hash.
    pub hash: String,
    /// Merkle root over the canonical transaction encodings.
    pub merkle_root: String,
    /// Unix seconds.
    pub timestamp: u64,
    /// Proof-of-work nonce.
    pub nonce: u64,
    /// Difficulty the block was mined at.
    pub difficulty: u64,
    /// Ordered transactions; element 0 is the unique coinbase.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Recompute the block hash: SHA-256 hex of the canonical header.
    pub fn header_hash(&self) -> String {
        sha_base16(canonical::header_bytes(self))
    }

    /// Recompute the Merkle root over the canonical transaction encodings.
    /// `None` for an empty transaction list.
    pub fn compute_merkle_root(&self) -> Option<String> {
        let leaves: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(canonical::transaction_bytes)
            .collect();
        merkle_root(&leaves)
    }

    /// Size in bytes of the canonical block encoding.
    pub fn encoded_size(&self) -> usize {
        canonical::block_bytes(self).len()
    }

    /// The coinbase, if the block has any transactions.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Strictly deserialize a block from untrusted JSON.
    pub fn sanitize(value: serde_json::Value) -> Result<Self, BlockError> {
        serde_json::from_value(value).map_err(|e| match map_sanitize_error(e) {
            TransactionError::AmountNotInteger => {
                BlockError::InvalidTransactions(vec![(0, TransactionError::AmountNotInteger)])
            }
            TransactionError::Malformed(msg) => BlockError::Malformed(msg),
            other => BlockError::Malformed(other.to_string()),
        })
    }
}

/// Classify a serde error from untrusted input.
///
/// serde_json reports a float where an integer amount was expected as
/// "invalid type: floating point ..."; everything else is plain malformed
/// input.
fn map_sanitize_error(e: serde_json::Error) -> TransactionError {
    let msg = e.to_string();
    if msg.contains("floating point") {
        TransactionError::AmountNotInteger
    } else {
        TransactionError::Malformed(msg)
    }
}
