//! Canonical byte encodings for everything that is hashed or signed.
//!
//! Consensus data must never be hashed over a serializer-defined format, so
//! each structure has an explicit, versioned byte layout:
//!
//! - strings: u32 big-endian byte length, then UTF-8 bytes
//! - amounts: 16-byte big-endian u128
//! - lists: u32 big-endian element count, then elements
//! - every top-level encoding starts with [`CANONICAL_VERSION`]
//!
//! A transaction's signing form covers `inputs ‖ outputs ‖ id ‖ txtype` and
//! deliberately excludes `sigs` (signatures cannot commit to themselves).
//! The full transaction form appends the signature map in key order; it is
//! the Merkle leaf for the block commitment, so a tampered signature set
//! changes the block's merkle root.

use crate::types::{Block, Transaction, Utxo};

/// Version tag prefixed to every top-level canonical encoding.
pub const CANONICAL_VERSION: u8 = 1;

fn put_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_amount(buf: &mut Vec<u8>, amount: u128) {
    buf.extend_from_slice(&amount.to_be_bytes());
}

fn put_utxo(buf: &mut Vec<u8>, utxo: &Utxo) {
    put_str(buf, &utxo.txoid);
    put_str(buf, &utxo.addr);
    put_amount(buf, utxo.amount);
}

fn put_utxo_list(buf: &mut Vec<u8>, utxos: &[Utxo]) {
    buf.extend_from_slice(&(utxos.len() as u32).to_be_bytes());
    for utxo in utxos {
        put_utxo(buf, utxo);
    }
}

fn put_transaction_core(buf: &mut Vec<u8>, tx: &Transaction, include_sigs: bool) {
    put_utxo_list(buf, &tx.inputs);
    put_utxo_list(buf, &tx.outputs);
    put_str(buf, &tx.id);
    put_str(buf, tx.txtype.label());
    if include_sigs {
        buf.extend_from_slice(&(tx.sigs.len() as u32).to_be_bytes());
        // BTreeMap iteration is key-ordered, so the encoding is stable
        // under any insertion order of the signature set.
        for (addr, sig) in &tx.sigs {
            put_str(buf, addr);
            put_str(buf, sig);
        }
    }
}

fn put_header_core(buf: &mut Vec<u8>, block: &Block) {
    buf.extend_from_slice(&block.index.to_be_bytes());
    put_str(buf, &block.previous_hash);
    put_str(buf, &block.merkle_root);
    buf.extend_from_slice(&block.timestamp.to_be_bytes());
    buf.extend_from_slice(&block.nonce.to_be_bytes());
    buf.extend_from_slice(&block.difficulty.to_be_bytes());
}

/// Full canonical transaction encoding, including the signature set.
///
/// This is the Merkle leaf used for the block's transaction commitment.
pub fn transaction_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = vec![CANONICAL_VERSION];
    put_transaction_core(&mut buf, tx, true);
    buf
}

/// Canonical signing form of a transaction: `inputs ‖ outputs ‖ id ‖ txtype`.
///
/// Excludes `sigs`, so the digest is stable under any change to the
/// signature set.
pub fn transaction_signing_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = vec![CANONICAL_VERSION];
    put_transaction_core(&mut buf, tx, false);
    buf
}

/// Canonical block header encoding; the block hash is SHA-256 hex of this.
pub fn header_bytes(block: &Block) -> Vec<u8> {
    let mut buf = vec![CANONICAL_VERSION];
    put_header_core(&mut buf, block);
    buf
}

/// Canonical encoding of the whole block: header plus transaction list.
///
/// This is the encoding the block size limit is measured against.
pub fn block_bytes(block: &Block) -> Vec<u8> {
    let mut buf = vec![CANONICAL_VERSION];
    put_header_core(&mut buf, block);
    buf.extend_from_slice(&(block.transactions.len() as u32).to_be_bytes());
    for tx in &block.transactions {
        put_transaction_core(&mut buf, tx, true);
    }
    buf
}
