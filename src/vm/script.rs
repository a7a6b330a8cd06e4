// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::Hash256;
use crate::vm::opcodes::*;
use crate::vm::ScriptErr;

/// Longest element a single push can carry
pub const MAX_PUSH_SIZE: usize = u8::MAX as usize;

/// Incrementally assembles a lock or unlock script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    #[must_use]
    pub fn op(mut self, op: u8) -> Self {
        self.bytes.push(op);
        self
    }

    /// Pushes `data` with the smallest push opcode that fits it. Fails
    /// with [`ScriptErr::ElementTooLarge`] past [`MAX_PUSH_SIZE`] bytes.
    pub fn push(self, data: &[u8]) -> Result<Self, ScriptErr> {
        if data.len() > MAX_PUSH_SIZE {
            return Err(ScriptErr::ElementTooLarge);
        }

        Ok(self.push_unchecked(data))
    }

    /// `data` must not exceed [`MAX_PUSH_SIZE`] bytes
    fn push_unchecked(mut self, data: &[u8]) -> Self {
        match data.len() {
            0 => self.bytes.push(OP_0),
            len if len <= OP_PUSHBYTES_MAX as usize => {
                self.bytes.push(len as u8);
                self.bytes.extend_from_slice(data);
            }
            len => {
                self.bytes.push(OP_PUSHDATA1);
                self.bytes.push(len as u8);
                self.bytes.extend_from_slice(data);
            }
        }

        self
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Lock that anyone can satisfy with an empty unlock.
#[must_use]
pub fn lock_always() -> Vec<u8> {
    ScriptBuilder::new().op(OP_TRUE).into_bytes()
}

/// Lock spendable by a signature from `pub_key`.
#[must_use]
pub fn lock_pay_to_pubkey(pub_key: &[u8; 32]) -> Vec<u8> {
    ScriptBuilder::new()
        .push_unchecked(pub_key)
        .op(OP_CHECKSIG)
        .into_bytes()
}

/// Lock spendable by revealing the preimage of `image`.
#[must_use]
pub fn lock_hash_preimage(image: &Hash256) -> Vec<u8> {
    ScriptBuilder::new()
        .op(OP_HASH256)
        .push_unchecked(image.as_bytes())
        .op(OP_EQUAL)
        .into_bytes()
}

#[must_use]
pub fn unlock_with_signature(signature: &[u8; 64]) -> Vec<u8> {
    ScriptBuilder::new().push_unchecked(signature).into_bytes()
}

pub fn unlock_with_preimage(preimage: &[u8]) -> Result<Vec<u8>, ScriptErr> {
    Ok(ScriptBuilder::new().push(preimage)?.into_bytes())
}
