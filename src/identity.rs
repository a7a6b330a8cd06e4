// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::vm::verify_single_ed25519;
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityErr {
    InvalidPrivateKey,
}

/// Signing primitives used by consensus. Implementations may defer to a
/// key store or a remote signer, hence the async interface.
#[async_trait]
pub trait Identity: Send + Sync {
    async fn sign(&self, bytes: &[u8], private_key: &[u8]) -> Result<Vec<u8>, IdentityErr>;

    async fn verify(&self, bytes: &[u8], public_key: &[u8], signature: &[u8]) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Identity;

#[async_trait]
impl Identity for Ed25519Identity {
    async fn sign(&self, bytes: &[u8], private_key: &[u8]) -> Result<Vec<u8>, IdentityErr> {
        let secret: &[u8; 32] = private_key
            .try_into()
            .map_err(|_| IdentityErr::InvalidPrivateKey)?;
        let key = SigningKey::from_bytes(secret);
        Ok(key.sign(bytes).to_bytes().to_vec())
    }

    async fn verify(&self, bytes: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
        verify_single_ed25519(public_key, signature, bytes).is_ok()
    }
}
