// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::Transaction;
use crate::vm::{lock_pay_to_pubkey, unlock_with_signature};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use std::fmt;

/// Ed25519 key pair used both as a validator identity and to own outputs.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    #[must_use]
    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&secret),
        }
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0; 32];
        hex::decode_to_slice(secret, &mut out)?;
        Ok(Self::from_secret(out))
    }

    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    #[must_use]
    pub fn secret_key(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    #[must_use]
    pub fn public_hex(&self) -> String {
        hex::encode(self.public_key())
    }

    #[must_use]
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key())
    }

    /// Lock script paying to this key
    #[must_use]
    pub fn lock(&self) -> Vec<u8> {
        lock_pay_to_pubkey(&self.public_key())
    }

    /// Spends `prev`, which must be locked to this key, into an output
    /// guarded by `lock`.
    #[must_use]
    pub fn spend(&self, prev: &Transaction, lock: Vec<u8>) -> Transaction {
        let mut tx = Transaction::new(prev.hash(), lock, Vec::new());
        let signature = self.signing.sign(tx.sighash().as_bytes());
        tx.unlock = unlock_with_signature(&signature.to_bytes());
        tx
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_hex())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
