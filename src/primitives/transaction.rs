// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::Hash256;
use bincode::{Decode, Encode};

pub const TX_VERSION: u8 = 1;
const TX_HASH_KEY: &str = "tx";
const TX_SIGHASH_KEY: &str = "tx.sighash";

/// A spend of a single previous transaction.
///
/// There is no separate output index: the transaction referenced by `utxo`
/// is itself the spendable output and its `lock` script gates the spend.
#[derive(PartialEq, Eq, Debug, Clone, Encode, Decode)]
pub struct Transaction {
    pub version: u8,

    /// Hash of the transaction being spent
    pub utxo: Hash256,

    /// Script a spender of this transaction has to satisfy
    pub lock: Vec<u8>,

    /// Script satisfying the lock of the spent transaction
    pub unlock: Vec<u8>,
}

impl Transaction {
    #[must_use]
    pub fn new(utxo: Hash256, lock: Vec<u8>, unlock: Vec<u8>) -> Self {
        Self {
            version: TX_VERSION,
            utxo,
            lock,
            unlock,
        }
    }

    /// Content hash, also the key of this transaction in a utxo set.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        Hash256::hash_encoded(self, TX_HASH_KEY)
    }

    /// Hash of the transaction with an empty unlock script. Signatures
    /// placed in `unlock` commit to this value.
    #[must_use]
    pub fn sighash(&self) -> Hash256 {
        let stripped = Self {
            version: self.version,
            utxo: self.utxo,
            lock: self.lock.clone(),
            unlock: Vec::new(),
        };

        Hash256::hash_encoded(&stripped, TX_SIGHASH_KEY)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        crate::codec::encode_to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        crate::codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_changes_with_unlock_but_sighash_does_not() {
        let a = Transaction::new(Hash256::zero(), vec![0x51], vec![0x01, 0xaa]);
        let mut b = a.clone();
        b.unlock = vec![0x01, 0xbb];

        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.sighash(), b.sighash());
        assert_ne!(a.hash(), a.sighash());
    }

    #[test]
    fn serialized_form_starts_with_version() {
        let tx = Transaction::new(Hash256([9; 32]), vec![0x51], vec![]);
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(bytes[0], TX_VERSION);
        assert_eq!(&bytes[1..33], &[9; 32]);
        assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
    }
}
