// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

/// Pushes an empty element
pub const OP_0: u8 = 0x00;

/// Opcodes `0x01..=0x4b` push that many following bytes
pub const OP_PUSHBYTES_MAX: u8 = 0x4b;

/// Pushes `n` bytes, `n` given by the next byte
pub const OP_PUSHDATA1: u8 = 0x4c;

pub const OP_TRUE: u8 = 0x51;
pub const OP_NOP: u8 = 0x61;

/// Fails unless the popped element is truthy
pub const OP_VERIFY: u8 = 0x69;

/// Fails unconditionally
pub const OP_RETURN: u8 = 0x6a;

pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;

/// Replaces the top element with its 32 byte hash
pub const OP_HASH256: u8 = 0xaa;

/// Pops a public key then a signature, pushes whether the signature is
/// valid over the spending transaction's sighash
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;

/// Maximum number of bytes of a single script
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum number of non-push opcodes executed per script
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum bytes of a single stack element
pub const MAX_ELEMENT_SIZE: usize = 520;

pub const MAX_STACK_SIZE: usize = 1000;
