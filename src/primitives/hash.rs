// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use bincode::{Decode, Encode};
use std::fmt;

const HASH_KEY_PREFIX: &str = "dltree.hash.32.";

#[derive(PartialEq, Eq, Encode, Decode, Clone, Hash, PartialOrd, Ord, Default, Copy)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn zero() -> Self {
        Self([0; 32])
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64 character hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = Self::zero();
        hex::decode_to_slice(s, &mut out.0)?;
        Ok(out)
    }

    #[inline]
    pub fn hash_from_slice<T: AsRef<[u8]>>(slice: T, key: &str) -> Self {
        let mut hasher = Self::keyed_hasher(key);
        hasher.update(slice.as_ref());
        Self::from_hasher(&hasher)
    }

    /// Hashes the codec encoding of `val` without buffering it.
    #[inline]
    pub fn hash_encoded<T: Encode>(val: &T, key: &str) -> Self {
        let mut hasher = Self::keyed_hasher(key);
        crate::codec::encode_into_hasher(&mut hasher, val);
        Self::from_hasher(&hasher)
    }

    fn keyed_hasher(key: &str) -> blake3::Hasher {
        let key = format!("{HASH_KEY_PREFIX}{key}");
        blake3::Hasher::new_derive_key(&key)
    }

    fn from_hasher(hasher: &blake3::Hasher) -> Self {
        let mut out_hash = Self::zero();
        let mut out = hasher.finalize_xof();
        out.fill(&mut out_hash.0);
        out_hash
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash256").field(&self.to_hex()).finish()
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_separate_domains() {
        let a = Hash256::hash_from_slice(b"payload", "tx");
        let b = Hash256::hash_from_slice(b"payload", "block");
        assert_ne!(a, b);
        assert_eq!(a, Hash256::hash_from_slice(b"payload", "tx"));
    }

    #[test]
    fn hash_encoded_matches_encoded_slice() {
        let val = vec![1u8, 2, 3, 4];
        let encoded = crate::codec::encode_to_vec(&val).unwrap();
        assert_eq!(
            Hash256::hash_encoded(&val, "test"),
            Hash256::hash_from_slice(encoded, "test")
        );
    }

    #[test]
    fn hex_roundtrip() {
        let hash = Hash256::hash_from_slice(b"", "test");
        assert_eq!(hash.to_hex().len(), 64);
        assert_eq!(Hash256::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(Hash256::from_hex("abcd").is_err());
    }

    #[test]
    fn encodes_without_length_prefix() {
        let encoded = crate::codec::encode_to_vec(&Hash256([3; 32])).unwrap();
        assert_eq!(encoded.len(), 32);
    }
}
