// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::UtxoSet;
use crate::primitives::{Block, Transaction};

/// Application extension points of the ledger.
pub trait LedgerHooks: Send + Sync {
    /// Seeds the accumulator before a branch is replayed
    fn init(&self, utxos: UtxoSet) -> UtxoSet {
        utxos
    }

    /// Applies an accepted transaction to the unspent set
    fn accumulate(&self, tx: &Transaction, utxos: &mut UtxoSet) {
        utxos.remove(&tx.utxo);
        utxos.insert(tx.clone());
    }

    /// Domain rules on top of script validation
    fn is_valid(&self, _tx: &Transaction, _utxos: &UtxoSet) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl LedgerHooks for DefaultHooks {}

/// Seeds every replay with the genesis block's transactions, making them
/// spendable even though genesis itself is never replayed.
#[derive(Debug, Clone)]
pub struct GenesisHooks {
    seed: Vec<Transaction>,
}

impl GenesisHooks {
    #[must_use]
    pub fn new(genesis: &Block) -> Self {
        Self {
            seed: genesis.transactions.clone(),
        }
    }
}

impl LedgerHooks for GenesisHooks {
    fn init(&self, mut utxos: UtxoSet) -> UtxoSet {
        for tx in self.seed.iter() {
            utxos.insert(tx.clone());
        }

        utxos
    }
}
