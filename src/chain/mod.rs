// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

pub mod hooks;
pub mod store;
pub mod utxo;
pub mod validator;

pub use hooks::*;
pub use store::*;
pub use utxo::*;
pub use validator::*;
