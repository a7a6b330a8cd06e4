// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::{Consensus, ConsensusErr, ConsensusMethod};
use crate::identity::Identity;
use crate::primitives::Block;
use async_trait::async_trait;
use ed25519_dalek::{SigningKey, VerifyingKey};
use futures::future::select_ok;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

struct Signer {
    public_key: [u8; 32],
    secret_key: [u8; 32],
}

/// Authorized signer consensus.
///
/// The nonce of a block is a signature, by one of the authorized keys, over
/// the block hash computed with the nonce replaced by the signer's public
/// key.
pub struct AuthConsensus {
    authorized: Vec<[u8; 32]>,
    rate_min_ms: u64,
    rate_max_ms: u64,
    signer: Option<Signer>,
    identity: Arc<dyn Identity>,
}

impl AuthConsensus {
    pub fn new(
        authorized: Vec<[u8; 32]>,
        rate_min_ms: u64,
        rate_max_ms: u64,
        identity: Arc<dyn Identity>,
    ) -> Result<Self, ConsensusErr> {
        if authorized.is_empty() {
            return Err(ConsensusErr::NoAuthorizedKeys);
        }

        if rate_min_ms > rate_max_ms {
            return Err(ConsensusErr::InvalidRate {
                min_ms: rate_min_ms,
                max_ms: rate_max_ms,
            });
        }

        for key in authorized.iter() {
            VerifyingKey::from_bytes(key)
                .map_err(|_| ConsensusErr::InvalidKey(hex::encode(key)))?;
        }

        Ok(Self {
            authorized,
            rate_min_ms,
            rate_max_ms,
            signer: None,
            identity,
        })
    }

    /// Enables block production with the given ed25519 secret key.
    pub fn with_signer(mut self, secret_key: [u8; 32]) -> Result<Self, ConsensusErr> {
        let public_key = SigningKey::from_bytes(&secret_key)
            .verifying_key()
            .to_bytes();

        if !self.authorized.contains(&public_key) {
            return Err(ConsensusErr::UnauthorizedSigner);
        }

        self.signer = Some(Signer {
            public_key,
            secret_key,
        });

        Ok(self)
    }

    #[must_use]
    pub fn authorized_keys(&self) -> &[[u8; 32]] {
        &self.authorized
    }

    #[must_use]
    pub fn signer_public_key(&self) -> Option<[u8; 32]> {
        self.signer.as_ref().map(|s| s.public_key)
    }

    pub async fn make_nonce(&self, block: &Block) -> Result<Vec<u8>, ConsensusErr> {
        let signer = self.signer.as_ref().ok_or(ConsensusErr::NotASigner)?;
        let data = block.hash_with_nonce(&signer.public_key);
        let nonce = self
            .identity
            .sign(data.as_bytes(), &signer.secret_key)
            .await?;

        Ok(nonce)
    }
}

#[async_trait]
impl Consensus for AuthConsensus {
    fn method(&self) -> ConsensusMethod {
        ConsensusMethod::Auth
    }

    /// Resolves to true as soon as one authorized key verifies the nonce.
    async fn verify_nonce(&self, block: &Block) -> bool {
        // `select_ok` panics on an empty set
        if self.authorized.is_empty() {
            return false;
        }

        let identity = &self.identity;
        let checks = self.authorized.iter().map(|key| {
            let data = block.hash_with_nonce(key);
            Box::pin(async move {
                if identity.verify(data.as_bytes(), key, &block.nonce).await {
                    Ok(())
                } else {
                    Err(())
                }
            })
        });

        select_ok(checks).await.is_ok()
    }

    async fn seal(&self, mut block: Block) -> Result<Block, ConsensusErr> {
        block.nonce = self.make_nonce(&block).await?;
        Ok(block)
    }

    fn production_delay(&self) -> Duration {
        let delta = self.rate_max_ms - self.rate_min_ms;
        let jitter = if delta == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..delta)
        };

        Duration::from_millis(self.rate_min_ms + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Ed25519Identity;
    use crate::primitives::{Hash256, Transaction};
    use crate::vm::lock_always;
    use rand::rngs::OsRng;

    fn keys(n: usize) -> Vec<SigningKey> {
        (0..n).map(|_| SigningKey::generate(&mut OsRng)).collect()
    }

    fn public(keys: &[SigningKey]) -> Vec<[u8; 32]> {
        keys.iter().map(|k| k.verifying_key().to_bytes()).collect()
    }

    fn block() -> Block {
        let tx = Transaction::new(Hash256([4; 32]), lock_always(), vec![]);
        Block::new(Hash256([1; 32]), vec![tx])
    }

    #[tokio::test]
    async fn any_authorized_signer_is_accepted() {
        let keys = keys(3);
        for signer in keys.iter() {
            let consensus = AuthConsensus::new(public(&keys), 0, 0, Arc::new(Ed25519Identity))
                .unwrap()
                .with_signer(signer.to_bytes())
                .unwrap();
            let sealed = consensus.seal(block()).await.unwrap();

            assert!(consensus.verify_nonce(&sealed).await);
        }
    }

    #[tokio::test]
    async fn unauthorized_signer_is_rejected() {
        let keys = keys(2);
        let verifier =
            AuthConsensus::new(public(&keys[..1]), 0, 0, Arc::new(Ed25519Identity)).unwrap();
        let outsider = AuthConsensus::new(public(&keys[1..]), 0, 0, Arc::new(Ed25519Identity))
            .unwrap()
            .with_signer(keys[1].to_bytes())
            .unwrap();

        let sealed = outsider.seal(block()).await.unwrap();
        assert!(outsider.verify_nonce(&sealed).await);
        assert!(!verifier.verify_nonce(&sealed).await);
    }

    #[tokio::test]
    async fn nonce_is_bound_to_content() {
        let keys = keys(1);
        let consensus = AuthConsensus::new(public(&keys), 0, 0, Arc::new(Ed25519Identity))
            .unwrap()
            .with_signer(keys[0].to_bytes())
            .unwrap();

        let mut sealed = consensus.seal(block()).await.unwrap();
        sealed.created += 1;
        assert!(!consensus.verify_nonce(&sealed).await);
    }

    #[tokio::test]
    async fn seal_requires_signer() {
        let keys = keys(1);
        let consensus =
            AuthConsensus::new(public(&keys), 0, 0, Arc::new(Ed25519Identity)).unwrap();
        assert_eq!(
            consensus.seal(block()).await.err(),
            Some(ConsensusErr::NotASigner)
        );
    }

    #[test]
    fn construction_checks() {
        let keys = keys(2);
        assert!(matches!(
            AuthConsensus::new(vec![], 0, 0, Arc::new(Ed25519Identity)),
            Err(ConsensusErr::NoAuthorizedKeys)
        ));
        assert!(matches!(
            AuthConsensus::new(public(&keys), 10, 5, Arc::new(Ed25519Identity)),
            Err(ConsensusErr::InvalidRate { .. })
        ));
        assert!(matches!(
            AuthConsensus::new(public(&keys[..1]), 0, 0, Arc::new(Ed25519Identity))
                .unwrap()
                .with_signer(keys[1].to_bytes()),
            Err(ConsensusErr::UnauthorizedSigner)
        ));
    }

    #[test]
    fn delay_stays_in_range() {
        let keys = keys(1);
        let consensus =
            AuthConsensus::new(public(&keys), 100, 150, Arc::new(Ed25519Identity)).unwrap();

        for _ in 0..100 {
            let delay = consensus.production_delay();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay < Duration::from_millis(150));
        }
    }
}
