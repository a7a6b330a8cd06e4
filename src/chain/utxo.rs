// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::{BlockStore, LedgerHooks, NodeId, StoreErr};
use crate::primitives::{Hash256, Transaction};
use std::collections::HashMap;

/// Unspent outputs keyed by transaction hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet(HashMap<Hash256, Transaction>);

impl UtxoSet {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    #[must_use]
    pub fn get(&self, hash: &Hash256) -> Option<&Transaction> {
        self.0.get(hash)
    }

    #[must_use]
    pub fn contains(&self, hash: &Hash256) -> bool {
        self.0.contains_key(hash)
    }

    /// Inserts `tx` under its own hash
    pub fn insert(&mut self, tx: Transaction) -> Option<Transaction> {
        self.0.insert(tx.hash(), tx)
    }

    pub fn remove(&mut self, hash: &Hash256) -> Option<Transaction> {
        self.0.remove(hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash256, &Transaction)> {
        self.0.iter()
    }
}

impl FromIterator<Transaction> for UtxoSet {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        let mut set = Self::new();
        for tx in iter {
            set.insert(tx);
        }
        set
    }
}

/// Rebuilds the unspent set as of `node` by replaying its branch over the
/// seeded accumulator. Genesis transactions are not replayed.
pub fn replay(
    store: &BlockStore,
    node: NodeId,
    hooks: &dyn LedgerHooks,
) -> Result<UtxoSet, StoreErr> {
    let mut utxos = hooks.init(UtxoSet::new());

    for id in store.get_branch(node)?.into_iter().skip(1) {
        let block_node = store.node(id).ok_or(StoreErr::CorruptData)?;
        for tx in block_node.block.transactions.iter() {
            hooks.accumulate(tx, &mut utxos);
        }
    }

    Ok(utxos)
}
