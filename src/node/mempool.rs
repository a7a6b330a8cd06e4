// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::*;
use std::collections::{HashMap, HashSet};

/// Every transaction the node has seen, in arrival order. Entries are never
/// evicted on confirmation, candidates are derived per branch instead.
#[derive(Debug, Default)]
pub struct Mempool {
    pub(crate) tx_map: HashMap<Hash256, Transaction>,
    pub(crate) order: Vec<Hash256>,
}

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns false if the transaction was already present
    pub fn append(&mut self, tx: Transaction) -> bool {
        let tx_hash = tx.hash();

        // First check if we have the transaction present
        if self.tx_map.contains_key(&tx_hash) {
            return false;
        }

        self.tx_map.insert(tx_hash, tx);
        self.order.push(tx_hash);
        true
    }

    /// Appends a batch, returning how many were new
    pub fn append_batch(&mut self, txs: Vec<Transaction>) -> usize {
        txs.into_iter().map(|tx| self.append(tx)).filter(|new| *new).count()
    }

    #[must_use]
    pub fn contains(&self, tx_hash: &Hash256) -> bool {
        self.tx_map.contains_key(tx_hash)
    }

    #[must_use]
    pub fn get(&self, tx_hash: &Hash256) -> Option<&Transaction> {
        self.tx_map.get(tx_hash)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Transactions not in `confirmed`, in arrival order
    #[must_use]
    pub fn candidates(&self, confirmed: &HashSet<Hash256>) -> Vec<Transaction> {
        self.order
            .iter()
            .filter(|h| !confirmed.contains(*h))
            .filter_map(|h| self.tx_map.get(h))
            .cloned()
            .collect()
    }
}
