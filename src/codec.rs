// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use bincode::enc::write::Writer;
use bincode::error::EncodeError;

pub const CODEC_BYTES_LIMIT: usize = 1_000_000;

const LIMIT_EXCEEDED: &str = "encoded value exceeds the codec byte limit";

/// Encodes `val`, failing if the output would not decode under
/// [`CODEC_BYTES_LIMIT`].
pub fn encode_to_vec<T: bincode::Encode>(val: &T) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode(VecWriter(&mut out), val)?;
    Ok(out)
}

pub fn encode<W: Writer, T: bincode::Encode>(writer: W, val: &T) -> Result<(), EncodeError> {
    let config = bincode::config::standard()
        .with_little_endian()
        .with_variable_int_encoding()
        .with_limit::<CODEC_BYTES_LIMIT>();

    let writer = LimitWriter {
        inner: writer,
        written: 0,
    };

    bincode::encode_into_writer(val, writer, config)
}

/// Length of the encoding of `val`, ignoring the byte limit.
pub fn encoded_len<T: bincode::Encode>(val: &T) -> usize {
    let config = bincode::config::standard()
        .with_little_endian()
        .with_variable_int_encoding();

    let mut len = 0;

    // The writer never fails and no limit is configured
    let _ = bincode::encode_into_writer(val, CountWriter(&mut len), config);
    len
}

pub fn decode<T: bincode::Decode>(bytes: &[u8]) -> Result<T, bincode::error::DecodeError> {
    let config = bincode::config::standard()
        .with_little_endian()
        .with_variable_int_encoding()
        .with_limit::<CODEC_BYTES_LIMIT>();

    bincode::decode_from_slice(bytes, config).map(|r| r.0)
}

/// Streams the encoding of a value into a blake3 hasher, same layout as
/// [`encode_to_vec`] without the byte limit.
pub fn encode_into_hasher<T: bincode::Encode>(hasher: &mut blake3::Hasher, val: &T) {
    let config = bincode::config::standard()
        .with_little_endian()
        .with_variable_int_encoding();

    // The writer never fails and no limit is configured
    let _ = bincode::encode_into_writer(val, HashWriter(hasher), config);
}

struct LimitWriter<W> {
    inner: W,
    written: usize,
}

impl<W: Writer> Writer for LimitWriter<W> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.written += bytes.len();
        if self.written > CODEC_BYTES_LIMIT {
            return Err(EncodeError::Other(LIMIT_EXCEEDED));
        }

        self.inner.write(bytes)
    }
}

struct VecWriter<'a>(&'a mut Vec<u8>);

impl Writer for VecWriter<'_> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.0.extend_from_slice(bytes);
        Ok(())
    }
}

struct CountWriter<'a>(&'a mut usize);

impl Writer for CountWriter<'_> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        *self.0 += bytes.len();
        Ok(())
    }
}

struct HashWriter<'a>(&'a mut blake3::Hasher);

impl Writer for HashWriter<'_> {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.0.update(bytes);
        Ok(())
    }
}
