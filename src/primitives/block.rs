// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{Hash256, Transaction};
use bincode::enc::Encoder;
use bincode::error::EncodeError;
use bincode::{Decode, Encode};
use chrono::prelude::*;

const BLOCK_HASH_KEY: &str = "block";

#[derive(PartialEq, Eq, Debug, Clone, Encode, Decode)]
pub struct Block {
    /// Hash of the parent block, zero for genesis
    pub hash_prev: Hash256,

    /// Consensus proof. Its meaning depends on the consensus method
    pub nonce: Vec<u8>,

    /// Ordered transactions. A transaction may spend one placed before it
    pub transactions: Vec<Transaction>,

    /// Creation time in unix milliseconds
    pub created: i64,
}

/// Borrowed view of a block with a substituted nonce. Encodes to the same
/// bytes as a [`Block`] holding that nonce.
struct BlockPreimage<'a> {
    hash_prev: &'a Hash256,
    nonce: &'a [u8],
    transactions: &'a [Transaction],
    created: i64,
}

impl Encode for BlockPreimage<'_> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(self.hash_prev, encoder)?;
        Encode::encode(self.nonce, encoder)?;
        Encode::encode(self.transactions, encoder)?;
        Encode::encode(&self.created, encoder)
    }
}

impl Block {
    /// Creates an unsealed successor of `hash_prev`
    #[must_use]
    pub fn new(hash_prev: Hash256, transactions: Vec<Transaction>) -> Self {
        Self {
            hash_prev,
            nonce: Vec::new(),
            transactions,
            created: Utc::now().timestamp_millis(),
        }
    }

    /// Genesis blocks carry a fixed timestamp so that every peer
    /// configured with the same seed transactions derives the same root.
    #[must_use]
    pub fn genesis(transactions: Vec<Transaction>) -> Self {
        Self {
            hash_prev: Hash256::zero(),
            nonce: Vec::new(),
            transactions,
            created: 0,
        }
    }

    #[must_use]
    pub fn hash(&self) -> Hash256 {
        self.hash_with_nonce(&self.nonce)
    }

    /// Content hash computed as if `nonce` were the block's nonce.
    #[must_use]
    pub fn hash_with_nonce(&self, nonce: &[u8]) -> Hash256 {
        let preimage = BlockPreimage {
            hash_prev: &self.hash_prev,
            nonce,
            transactions: &self.transactions,
            created: self.created,
        };

        Hash256::hash_encoded(&preimage, BLOCK_HASH_KEY)
    }

    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.hash_prev.is_zero()
    }
}
