// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! # dltree
//! A peer-to-peer distributed ledger engine. Peers keep a forkable tree of
//! blocks holding UTXO-style transactions, replicate it over an unreliable
//! network and converge on the deepest branch.
//!
//! ## Components
//! * **Block store**: arena tree of blocks with an incrementally maintained hash index, branch and fork queries.
//! * **UTXO replay**: the unspent set of any branch is rebuilt on demand through application hooks.
//! * **Validation**: every transaction runs its unlock script followed by the spent output's lock script on a small stack machine.
//! * **Consensus**: pluggable strategy. The shipped one accepts blocks signed by a fixed set of ed25519 keys.
//! * **Production**: validators seal pending transactions into blocks at a randomized rate.
//! * **Sync**: TX and BLOCK relay, GETBLOCKS catch-up and GETDATA fetch over any transport.

pub mod chain;
pub mod codec;
pub mod consensus;
pub mod global;
pub mod identity;
pub mod miner;
pub mod node;
pub mod primitives;
pub mod settings;
pub mod vm;
pub mod wallet;
