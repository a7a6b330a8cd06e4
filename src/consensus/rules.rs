// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

/// Requests without a response after `n` milliseconds are dropped
pub const DEFAULT_MSG_TIMEOUT_MS: u64 = 5_000;

/// Lower bound of the randomized block production delay, in milliseconds
pub const DEFAULT_RATE_MIN_MS: u64 = 3_000;

/// Upper bound of the randomized block production delay, in milliseconds
pub const DEFAULT_RATE_MAX_MS: u64 = 6_000;

/// Application id of the default network. Peers drop messages for other ids
pub const DEFAULT_APP_ID: &str = "dltree.devnet";

/// Block hashes per GETBLOCKS page. A full page stays well below the codec
/// byte limit
pub const DEFAULT_GETBLOCKS_PAGE: usize = 16_384;

/// Upper bound of the GETBLOCKS page size a node accepts in its config
pub const MAX_GETBLOCKS_PAGE: usize = 24_000;

/// Encoded size budget of a minted block. The remainder of the codec byte
/// limit is left for the message envelope
pub const MAX_BLOCK_BYTES: usize = crate::codec::CODEC_BYTES_LIMIT - 16_384;
