// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{LedgerHooks, UtxoSet};
use crate::primitives::Transaction;
use crate::vm::{verify_spend, ScriptErr};
use log::*;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TxVerifyErr {
    /// Spent output is unknown or already spent
    UnknownUtxo,

    /// Unlock and lock scripts did not pass
    Script(ScriptErr),

    /// The application hook refused the transaction
    RejectedByHook,
}

impl From<ScriptErr> for TxVerifyErr {
    fn from(other: ScriptErr) -> Self {
        Self::Script(other)
    }
}

/// Validates `tx` against `utxos` and applies it on success. On error the
/// set is left untouched.
pub fn validate_tx(
    tx: &Transaction,
    utxos: &mut UtxoSet,
    hooks: &dyn LedgerHooks,
) -> Result<(), TxVerifyErr> {
    let spent = utxos.get(&tx.utxo).ok_or(TxVerifyErr::UnknownUtxo)?;
    verify_spend(spent, tx)?;

    if !hooks.is_valid(tx, utxos) {
        return Err(TxVerifyErr::RejectedByHook);
    }

    hooks.accumulate(tx, utxos);
    Ok(())
}

/// Folds [`validate_tx`] over `txs` in order and returns the transactions
/// that validated. Each accepted transaction is visible to the next one.
pub fn validate_sequence<'a, I>(
    txs: I,
    utxos: &mut UtxoSet,
    hooks: &dyn LedgerHooks,
) -> Vec<Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    txs.into_iter()
        .filter(|tx| match validate_tx(tx, utxos, hooks) {
            Ok(()) => true,
            Err(err) => {
                debug!("Rejected transaction {}: {:?}", tx.hash(), err);
                false
            }
        })
        .cloned()
        .collect()
}

/// Returns true if every transaction validates in sequence.
pub fn validate_all(txs: &[Transaction], utxos: &mut UtxoSet, hooks: &dyn LedgerHooks) -> bool {
    txs.iter().all(|tx| match validate_tx(tx, utxos, hooks) {
        Ok(()) => true,
        Err(err) => {
            debug!("Block transaction {} is invalid: {:?}", tx.hash(), err);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{replay, BlockStore, DefaultHooks, GenesisHooks};
    use crate::primitives::{Block, Hash256};
    use crate::vm::{lock_always, OP_0};
    use quickcheck::*;

    struct RejectAll;

    impl LedgerHooks for RejectAll {
        fn is_valid(&self, _tx: &Transaction, _utxos: &UtxoSet) -> bool {
            false
        }
    }

    fn seed() -> (Transaction, UtxoSet) {
        let coinbase = Transaction::new(Hash256::zero(), lock_always(), vec![]);
        let set = std::iter::once(coinbase.clone()).collect();
        (coinbase, set)
    }

    #[test]
    fn valid_spend_updates_set() {
        let (coinbase, mut set) = seed();
        let tx = Transaction::new(coinbase.hash(), lock_always(), vec![]);

        assert_eq!(validate_tx(&tx, &mut set, &DefaultHooks), Ok(()));
        assert!(!set.contains(&coinbase.hash()));
        assert!(set.contains(&tx.hash()));
    }

    #[test]
    fn double_spend_is_rejected() {
        let (coinbase, mut set) = seed();
        let a = Transaction::new(coinbase.hash(), lock_always(), vec![]);
        let b = Transaction::new(coinbase.hash(), vec![OP_0, OP_0], vec![]);

        assert_eq!(validate_tx(&a, &mut set, &DefaultHooks), Ok(()));
        let before = set.clone();
        assert_eq!(
            validate_tx(&b, &mut set, &DefaultHooks),
            Err(TxVerifyErr::UnknownUtxo)
        );
        assert_eq!(set, before);
    }

    #[test]
    fn failures_leave_set_unchanged() {
        let (coinbase, mut set) = seed();
        let before = set.clone();

        let bad_script = Transaction::new(coinbase.hash(), lock_always(), vec![0xff]);
        assert!(matches!(
            validate_tx(&bad_script, &mut set, &DefaultHooks),
            Err(TxVerifyErr::Script(_))
        ));
        assert_eq!(set, before);

        let refused = Transaction::new(coinbase.hash(), lock_always(), vec![]);
        assert_eq!(
            validate_tx(&refused, &mut set, &RejectAll),
            Err(TxVerifyErr::RejectedByHook)
        );
        assert_eq!(set, before);
    }

    #[test]
    fn sequence_feeds_later_transactions() {
        let (coinbase, mut set) = seed();
        let a = Transaction::new(coinbase.hash(), lock_always(), vec![]);
        let b = Transaction::new(a.hash(), lock_always(), vec![]);
        let dup = Transaction::new(coinbase.hash(), vec![OP_0, OP_0], vec![]);

        let valid = validate_sequence(&[a.clone(), dup, b.clone()], &mut set, &DefaultHooks);
        assert_eq!(valid, vec![a, b.clone()]);
        assert_eq!(set.len(), 1);
        assert!(set.contains(&b.hash()));
    }

    #[test]
    fn validate_all_requires_every_transaction() {
        let (coinbase, set) = seed();
        let a = Transaction::new(coinbase.hash(), lock_always(), vec![]);
        let b = Transaction::new(a.hash(), lock_always(), vec![]);

        assert!(validate_all(&[a.clone(), b.clone()], &mut set.clone(), &DefaultHooks));
        assert!(!validate_all(&[b, a], &mut set.clone(), &DefaultHooks));
    }

    quickcheck! {
        fn validation_is_stable_across_replays(len: u8, foreign: bool) -> bool {
            let coinbase = Transaction::new(Hash256::zero(), lock_always(), vec![]);
            let genesis = Block::genesis(vec![coinbase.clone()]);
            let hooks = GenesisHooks::new(&genesis);
            let mut store = BlockStore::new(genesis);

            let mut head = store.genesis();
            let mut last = coinbase;
            for _ in 0..(len % 16) {
                let tx = Transaction::new(last.hash(), lock_always(), vec![]);
                let block = Block::new(store.node(head).unwrap().hash, vec![tx.clone()]);
                head = store.add_child(head, block).unwrap();
                last = tx;
            }

            let spent = if foreign { Hash256([9; 32]) } else { last.hash() };
            let tx = Transaction::new(spent, lock_always(), vec![]);

            let first = validate_tx(&tx, &mut replay(&store, head, &hooks).unwrap(), &hooks);
            let second = validate_tx(&tx, &mut replay(&store, head, &hooks).unwrap(), &hooks);
            first == second && first.is_ok() != foreign
        }

        fn unknown_reference_never_validates(bytes: Vec<u8>) -> bool {
            let (_, mut set) = seed();
            let before = set.clone();
            let mut utxo = [0u8; 32];
            for (i, b) in bytes.iter().take(32).enumerate() {
                utxo[i] = *b;
            }
            let utxo = Hash256(utxo);
            if set.contains(&utxo) {
                return true;
            }

            let tx = Transaction::new(utxo, lock_always(), vec![]);
            validate_tx(&tx, &mut set, &DefaultHooks) == Err(TxVerifyErr::UnknownUtxo)
                && set == before
        }
    }
}
