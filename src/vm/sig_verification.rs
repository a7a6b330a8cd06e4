// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use ed25519_dalek::{Signature as Ed25519Signature, VerifyingKey as Ed25519VerifyingKey};

pub type SigVerificationPubKey = [u8; 32];
pub type SigVerificationSignature = [u8; 64];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SigVerificationErr {
    InvalidSignature,
    InvalidPublicKey,
}

/// Verifies an ed25519 signature given as raw bytes. Wrongly sized keys or
/// signatures are reported as invalid rather than panicking.
pub fn verify_single_ed25519(
    pub_key: &[u8],
    sig: &[u8],
    message: &[u8],
) -> Result<(), SigVerificationErr> {
    let pub_key: &SigVerificationPubKey = pub_key
        .try_into()
        .map_err(|_| SigVerificationErr::InvalidPublicKey)?;
    let sig: &SigVerificationSignature = sig
        .try_into()
        .map_err(|_| SigVerificationErr::InvalidSignature)?;
    let pub_key = Ed25519VerifyingKey::from_bytes(pub_key)
        .map_err(|_| SigVerificationErr::InvalidPublicKey)?;

    pub_key
        .verify_strict(message, &Ed25519Signature::from_bytes(sig))
        .map_err(|_| SigVerificationErr::InvalidSignature)
}
