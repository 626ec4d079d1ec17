//! Error types for the Ghost protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction id mismatch: expected {expected}, got {got}")] InvalidTxId { expected: String, got: String },
    #[error("input not spendable: {0}")] FailedPoolCheck(String),
    #[error("signature set does not cover all input addresses")] SigSetMismatch,
    #[error("invalid signature for address {0}")] InvalidTxSig(String),
    #[error("utxo amount is not an integer")] AmountNotInteger,
    #[error("outputs exceed inputs: {outputs} > {inputs}")] OutputsExceedInputs { outputs: u128, inputs: u128 },
    #[error("value overflow")] ValueOverflow,
    #[error("malformed transaction: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("invalid index: previous {prev}, got {got}")] InvalidIndex { prev: u64, got: u64 },
    #[error("previous hash {got} does not match last block hash {expected}")] DoesntMatchLast { got: String, expected: String },
    #[error("claimed hash {claimed} does not match computed hash {computed}")] DoesntMatchProvided { computed: String, claimed: String },
    #[error("hash {hash} does not beat difficulty {difficulty}")] TooHigh { hash: String, difficulty: u64 },
    #[error("merkle root does not match transactions")] InvalidMerkleRoot,
    #[error("timestamp too far in the future")] TimestampTooHigh,
    #[error("block too large: {size} > {limit}")] BlockTooLarge { size: usize, limit: usize },
    #[error("no coinbase")] NoCoinbase,
    #[error("first transaction is {0}, not a coinbase")] NotCoinbase(String),
    #[error("more than one coinbase")] TooManyCoinbase,
    #[error("invalid coinbase: fees {fees} + reward {reward} != amount {amount}")] InvalidCoinbase { fees: u128, reward: u128, amount: u128 },
    #[error("invalid transactions: {0:?}")] InvalidTransactions(Vec<(usize, TransactionError)>),
    #[error("malformed block: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("frame does not start with the Ghost magic")] BadMagic,
    #[error("malformed frame header: {0}")] MalformedHeader(String),
    #[error("frame too large: {size} > {max}")] FrameTooLarge { size: usize, max: usize },
    #[error("unknown parameter type tag: {0:?}")] UnknownTypeTag(char),
    #[error("list-valued parameters are not supported")] ListParamUnsupported,
    #[error("malformed parameter: {0}")] MalformedParam(String),
    #[error("payload encryption failed")] EncryptFailed,
    #[error("payload decryption failed")] DecryptFailed,
    #[error("io: {0}")] Io(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed handshake: {0}")] MalformedHandshake(String),
    #[error("unknown peer: {0}")] UnknownPeer(String),
    #[error("illegal public value")] IllegalPublicValue,
    #[error("authentication rejected by peer")] Rejected,
    #[error(transparent)] Wire(#[from] WireError),
    #[error(transparent)] Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")] NotFound(String),
    #[error("store unavailable: {0}")] Unavailable(String),
}

#[derive(Error, Debug)]
pub enum GhostError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Wire(#[from] WireError),
    #[error(transparent)] Auth(#[from] AuthError),
    #[error(transparent)] Store(#[from] StoreError),
}
