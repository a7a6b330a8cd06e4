// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

mod auth;
mod rules;

pub use auth::*;
pub use rules::*;

use crate::identity::{Identity, IdentityErr};
use crate::primitives::Block;
use crate::settings::ConsensusSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusMethod {
    /// Blocks are signed by one of a fixed set of keys
    Auth,
}

impl fmt::Display for ConsensusMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => f.write_str("AUTH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusErr {
    /// The authorized key set is empty
    NoAuthorizedKeys,

    /// A configured key could not be parsed
    InvalidKey(String),

    /// Invalid production delay range
    InvalidRate { min_ms: u64, max_ms: u64 },

    /// The local signer is not part of the authorized set
    UnauthorizedSigner,

    /// This instance has no signing key
    NotASigner,

    Identity(IdentityErr),
}

impl From<IdentityErr> for ConsensusErr {
    fn from(other: IdentityErr) -> Self {
        Self::Identity(other)
    }
}

impl fmt::Display for ConsensusErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthorizedKeys => f.write_str("no authorized keys configured"),
            Self::InvalidKey(key) => write!(f, "invalid key: {key}"),
            Self::InvalidRate { min_ms, max_ms } => {
                write!(f, "invalid production rate [{min_ms}, {max_ms}]")
            }
            Self::UnauthorizedSigner => f.write_str("signing key is not authorized"),
            Self::NotASigner => f.write_str("no signing key configured"),
            Self::Identity(err) => write!(f, "identity error: {err:?}"),
        }
    }
}

impl std::error::Error for ConsensusErr {}

/// Consensus strategy. The engine only goes through this trait, so a new
/// method is added by implementing it and extending [`ConsensusMethod`].
#[async_trait]
pub trait Consensus: Send + Sync {
    fn method(&self) -> ConsensusMethod;

    /// Checks the consensus proof carried by `block`
    async fn verify_nonce(&self, block: &Block) -> bool;

    /// Fills in the nonce of an otherwise complete block
    async fn seal(&self, block: Block) -> Result<Block, ConsensusErr>;

    /// Time to wait before the next production round
    fn production_delay(&self) -> Duration;
}

/// Builds the configured consensus strategy.
pub fn from_settings(
    settings: &ConsensusSettings,
    identity: Arc<dyn Identity>,
) -> Result<Arc<dyn Consensus>, ConsensusErr> {
    match settings.method {
        ConsensusMethod::Auth => {
            let keys = settings
                .authorized_keys
                .iter()
                .map(|key| decode_key(key))
                .collect::<Result<Vec<_>, _>>()?;
            let mut consensus =
                AuthConsensus::new(keys, settings.rate_min_ms, settings.rate_max_ms, identity)?;

            if let Some(secret) = settings.signing_key.as_deref() {
                consensus = consensus.with_signer(decode_key(secret)?)?;
            }

            Ok(Arc::new(consensus))
        }
    }
}

fn decode_key(key: &str) -> Result<[u8; 32], ConsensusErr> {
    let mut out = [0; 32];
    hex::decode_to_slice(key, &mut out).map_err(|_| ConsensusErr::InvalidKey(key.to_owned()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Ed25519Identity;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn settings(signer: &SigningKey) -> ConsensusSettings {
        ConsensusSettings {
            method: ConsensusMethod::Auth,
            authorized_keys: vec![hex::encode(signer.verifying_key().as_bytes())],
            rate_min_ms: 10,
            rate_max_ms: 20,
            signing_key: Some(hex::encode(signer.as_bytes())),
        }
    }

    #[tokio::test]
    async fn builds_auth_from_settings() {
        let signer = SigningKey::generate(&mut OsRng);
        let consensus = from_settings(&settings(&signer), Arc::new(Ed25519Identity)).unwrap();
        assert_eq!(consensus.method(), ConsensusMethod::Auth);

        let block = consensus
            .seal(Block::new(Default::default(), vec![]))
            .await
            .unwrap();
        assert!(consensus.verify_nonce(&block).await);
    }

    #[test]
    fn rejects_malformed_keys() {
        let signer = SigningKey::generate(&mut OsRng);
        let mut bad = settings(&signer);
        bad.authorized_keys.push("zz".to_owned());

        assert_eq!(
            from_settings(&bad, Arc::new(Ed25519Identity)).err(),
            Some(ConsensusErr::InvalidKey("zz".to_owned()))
        );
    }

    #[test]
    fn method_serializes_lowercase() {
        let encoded = toml::to_string(&ConsensusSettings::default()).unwrap();
        assert!(encoded.contains("method = \"auth\""));
    }
}
