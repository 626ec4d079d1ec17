//! Transaction validation.
//!
//! [`validate_transaction`] is pure: the UTXO view is injected as a
//! predicate so the same rules can run against the main chain or a fork's
//! alternate view, and signature verification goes through the
//! [`SignatureVerifier`] seam. A coinbase is accepted trivially here — its
//! reward amount is a block-level rule.

use crate::error::TransactionError;
use crate::traits::SignatureVerifier;
use crate::types::{sum_amounts, Transaction, Utxo};

/// Validate a non-coinbase transaction. Checks run in order; the first
/// failure is returned:
///
/// 1. `id` equals the Merkle root over the ordered input txoids
/// 2. every input passes `pool_check`
/// 3. every distinct input address appears in `sigs`
/// 4. every signature verifies over the signing digest
/// 5. amounts are integers — enforced by the `u128` representation at the
///    sanitization boundary, nothing to re-check here
/// 6. Σoutputs ≤ Σinputs
pub fn validate_transaction<P>(
    tx: &Transaction,
    pool_check: &P,
    verifier: &dyn SignatureVerifier,
) -> Result<(), TransactionError>
where
    P: Fn(&Utxo) -> bool,
{
    if tx.is_coinbase() {
        return Ok(());
    }

    let computed = tx.calculate_hash().unwrap_or_default();
    if computed != tx.id {
        return Err(TransactionError::InvalidTxId {
            expected: computed,
            got: tx.id.clone(),
        });
    }

    for input in &tx.inputs {
        if !pool_check(input) {
            return Err(TransactionError::FailedPoolCheck(input.txoid.clone()));
        }
    }

    if tx.inputs.iter().any(|i| !tx.sigs.contains_key(&i.addr)) {
        return Err(TransactionError::SigSetMismatch);
    }

    let digest = tx.signing_digest();
    for (addr, sig) in &tx.sigs {
        if !verifier.verify(addr, sig, &digest) {
            return Err(TransactionError::InvalidTxSig(addr.clone()));
        }
    }

    let inputs = sum_amounts(&tx.inputs).ok_or(TransactionError::ValueOverflow)?;
    let outputs = sum_amounts(&tx.outputs).ok_or(TransactionError::ValueOverflow)?;
    if outputs > inputs {
        return Err(TransactionError::OutputsExceedInputs { outputs, inputs });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxType;
    use std::collections::BTreeMap;

    /// Verifier that accepts everything.
    struct AcceptAll;
    impl SignatureVerifier for AcceptAll {
        fn verify(&self, _addr: &str, _sig: &str, _digest: &[u8; 32]) -> bool {
            true
        }
    }

    /// Verifier that rejects everything.
    struct RejectAll;
    impl SignatureVerifier for RejectAll {
        fn verify(&self, _addr: &str, _sig: &str, _digest: &[u8; 32]) -> bool {
            false
        }
    }

    fn utxo(txoid: &str, addr: &str, amount: u128) -> Utxo {
        Utxo {
            txoid: txoid.to_string(),
            addr: addr.to_string(),
            amount,
        }
    }

    /// A well-formed two-input transaction with a correct id and full
    /// signature coverage.
    fn valid_tx() -> Transaction {
        let inputs = vec![utxo("aa:0", "addr-a", 60), utxo("bb:1", "addr-b", 40)];
        let mut tx = Transaction {
            id: String::new(),
            inputs,
            outputs: vec![utxo("cc:0", "addr-c", 95)],
            sigs: BTreeMap::from([
                ("addr-a".to_string(), "c2lnYQ==".to_string()),
                ("addr-b".to_string(), "c2lnYg==".to_string()),
            ]),
            txtype: TxType::P2pk,
        };
        tx.id = tx.calculate_hash().unwrap();
        tx
    }

    fn always(_: &Utxo) -> bool {
        true
    }

    #[test]
    fn valid_transaction_passes() {
        assert_eq!(validate_transaction(&valid_tx(), &always, &AcceptAll), Ok(()));
    }

    #[test]
    fn coinbase_is_trivially_accepted() {
        let cb = Transaction::coinbase(100, "miner", 1_700_000_000);
        assert_eq!(validate_transaction(&cb, &|_| false, &RejectAll), Ok(()));
    }

    #[test]
    fn wrong_id_is_rejected_first() {
        let mut tx = valid_tx();
        let expected = tx.id.clone();
        tx.id = "00".repeat(32);
        assert_eq!(
            validate_transaction(&tx, &|_| false, &RejectAll),
            Err(TransactionError::InvalidTxId {
                expected,
                got: "00".repeat(32),
            })
        );
    }

    #[test]
    fn empty_inputs_without_coinbase_type_fail_id_check() {
        let mut tx = valid_tx();
        tx.inputs.clear();
        tx.id = "something".into();
        assert!(matches!(
            validate_transaction(&tx, &always, &AcceptAll),
            Err(TransactionError::InvalidTxId { .. })
        ));
    }

    #[test]
    fn failed_pool_check_names_the_input() {
        let tx = valid_tx();
        let reject_bb = |u: &Utxo| u.txoid != "bb:1";
        assert_eq!(
            validate_transaction(&tx, &reject_bb, &AcceptAll),
            Err(TransactionError::FailedPoolCheck("bb:1".into()))
        );
    }

    #[test]
    fn missing_signer_is_sig_set_mismatch() {
        let mut tx = valid_tx();
        tx.sigs.remove("addr-b");
        assert_eq!(
            validate_transaction(&tx, &always, &AcceptAll),
            Err(TransactionError::SigSetMismatch)
        );
    }

    #[test]
    fn extra_signer_is_allowed_by_coverage_rule() {
        let mut tx = valid_tx();
        tx.sigs.insert("addr-z".into(), "c2ln".into());
        assert_eq!(validate_transaction(&tx, &always, &AcceptAll), Ok(()));
    }

    #[test]
    fn bad_signature_is_rejected() {
        let tx = valid_tx();
        assert_eq!(
            validate_transaction(&tx, &always, &RejectAll),
            Err(TransactionError::InvalidTxSig("addr-a".into()))
        );
    }

    #[test]
    fn outputs_exceeding_inputs_are_rejected() {
        let mut tx = valid_tx();
        tx.outputs[0].amount = 101;
        assert_eq!(
            validate_transaction(&tx, &always, &AcceptAll),
            Err(TransactionError::OutputsExceedInputs {
                outputs: 101,
                inputs: 100,
            })
        );
    }

    #[test]
    fn exact_balance_is_a_zero_fee_transaction() {
        let mut tx = valid_tx();
        tx.outputs[0].amount = 100;
        assert_eq!(validate_transaction(&tx, &always, &AcceptAll), Ok(()));
    }

    #[test]
    fn input_overflow_is_value_overflow() {
        let mut tx = valid_tx();
        tx.inputs[0].amount = u128::MAX;
        tx.inputs[1].amount = 1;
        tx.id = tx.calculate_hash().unwrap();
        assert_eq!(
            validate_transaction(&tx, &always, &AcceptAll),
            Err(TransactionError::ValueOverflow)
        );
    }
}
