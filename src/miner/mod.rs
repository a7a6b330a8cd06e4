// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! Block producer state machine. A single production round is owned at a
//! time; arming a new round aborts the previous one.

use crate::codec;
use crate::primitives::{Hash256, Transaction};
use log::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProducerStatus {
    Idle,

    /// Waiting out the production delay on top of the predecessor
    Scheduled(Hash256),

    /// Building and sealing a block on top of the predecessor
    Minting(Hash256),
}

impl ProducerStatus {
    #[must_use]
    pub fn predecessor(&self) -> Option<Hash256> {
        match self {
            Self::Idle => None,
            Self::Scheduled(pred) | Self::Minting(pred) => Some(*pred),
        }
    }
}

struct ProducerState {
    status: ProducerStatus,
    handle: Option<JoinHandle<()>>,

    /// Bumped on every arm so a superseded round cannot write its status
    generation: u64,
}

pub struct BlockProducer {
    state: Mutex<ProducerState>,
}

impl Default for BlockProducer {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockProducer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProducerState {
                status: ProducerStatus::Idle,
                handle: None,
                generation: 0,
            }),
        }
    }

    #[must_use]
    pub fn status(&self) -> ProducerStatus {
        self.state.lock().status
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Aborts the running round, if any, and spawns `round` on top of
    /// `pred`. The round receives its generation number.
    pub fn arm<F, Fut>(&self, pred: Hash256, round: F) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();

        if let Some(handle) = state.handle.take() {
            handle.abort();
        }

        state.generation += 1;
        state.status = ProducerStatus::Scheduled(pred);
        let generation = state.generation;
        state.handle = Some(tokio::spawn(round(generation)));
        debug!("Armed producer round {} on {}", generation, pred);
        generation
    }

    /// Updates the status on behalf of round `generation`. Returns false if
    /// the round has been superseded.
    pub fn set_status(&self, generation: u64, status: ProducerStatus) -> bool {
        let mut state = self.state.lock();

        if state.generation != generation {
            return false;
        }

        state.status = status;
        true
    }

    /// Marks round `generation` as finished
    pub fn finish(&self, generation: u64) {
        let mut state = self.state.lock();

        if state.generation == generation {
            state.status = ProducerStatus::Idle;
            state.handle = None;
        }
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();

        if let Some(handle) = state.handle.take() {
            handle.abort();
        }

        state.generation += 1;
        state.status = ProducerStatus::Idle;
    }
}

impl Drop for BlockProducer {
    fn drop(&mut self) {
        if let Some(handle) = self.state.get_mut().handle.take() {
            handle.abort();
        }
    }
}

/// Orders `txs` so that a transaction spent by another candidate comes
/// before its spender. Unrelated transactions keep their relative order.
#[must_use]
pub fn order_candidates(txs: Vec<Transaction>) -> Vec<Transaction> {
    let index: HashMap<Hash256, usize> = txs
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.hash(), i))
        .collect();

    let mut placed = vec![false; txs.len()];
    let mut order = Vec::with_capacity(txs.len());
    let mut chain = Vec::new();

    for i in 0..txs.len() {
        if placed[i] {
            continue;
        }

        // Walk up to the oldest unplaced ancestor among the candidates
        let mut cur = i;
        placed[cur] = true;
        chain.push(cur);

        while let Some(&parent) = index.get(&txs[cur].utxo) {
            if placed[parent] {
                break;
            }

            placed[parent] = true;
            chain.push(parent);
            cur = parent;
        }

        order.extend(chain.drain(..).rev());
    }

    let mut slots: Vec<Option<Transaction>> = txs.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Longest prefix of `txs` whose encodings add up to at most `budget`
/// bytes. A prefix of a validated sequence is itself valid, the rest is
/// left for a later block.
#[must_use]
pub fn take_within_budget(mut txs: Vec<Transaction>, budget: usize) -> Vec<Transaction> {
    let mut used = 0;
    let fits = txs
        .iter()
        .take_while(|tx| {
            used += codec::encoded_len(*tx);
            used <= budget
        })
        .count();

    txs.truncate(fits);
    txs
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn spend_chain(root: Hash256, len: usize) -> Vec<Transaction> {
        let mut prev = root;
        (0..len)
            .map(|_| {
                let tx = Transaction::new(prev, vec![0x51], vec![]);
                prev = tx.hash();
                tx
            })
            .collect()
    }

    fn position(txs: &[Transaction], tx: &Transaction) -> usize {
        txs.iter().position(|t| t == tx).unwrap()
    }

    #[test]
    fn spender_after_spent() {
        let chain = spend_chain(Hash256::zero(), 3);
        let unrelated = Transaction::new(Hash256([7; 32]), vec![0x51], vec![]);
        let input = vec![
            chain[2].clone(),
            unrelated.clone(),
            chain[0].clone(),
            chain[1].clone(),
        ];

        let ordered = order_candidates(input);
        assert_eq!(
            ordered,
            vec![chain[0].clone(), chain[1].clone(), chain[2].clone(), unrelated]
        );
    }

    #[quickcheck]
    fn ordering_respects_dependencies(len: u8, seed: u64) -> TestResult {
        if len == 0 {
            return TestResult::discard();
        }

        let chain = spend_chain(Hash256([1; 32]), (len % 32) as usize + 1);
        let mut shuffled = chain.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        let ordered = order_candidates(shuffled);
        if ordered.len() != chain.len() {
            return TestResult::failed();
        }

        TestResult::from_bool(
            chain
                .windows(2)
                .all(|w| position(&ordered, &w[0]) < position(&ordered, &w[1])),
        )
    }

    #[test]
    fn budget_keeps_a_prefix() {
        let chain = spend_chain(Hash256::zero(), 10);
        let tx_len = codec::encoded_len(&chain[0]);

        let taken = take_within_budget(chain.clone(), tx_len * 4 + tx_len / 2);
        assert_eq!(taken, chain[..4].to_vec());

        assert_eq!(take_within_budget(chain.clone(), usize::MAX), chain);
        assert!(take_within_budget(chain, tx_len - 1).is_empty());
    }

    #[tokio::test]
    async fn arming_aborts_previous_round() {
        let producer = BlockProducer::new();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        let flag = first.clone();
        producer.arm(Hash256([1; 32]), move |_| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let flag = second.clone();
        let generation = producer.arm(Hash256([2; 32]), move |_| async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        assert_eq!(generation, 2);
        assert_eq!(producer.status(), ProducerStatus::Scheduled(Hash256([2; 32])));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn superseded_round_cannot_write_status() {
        let producer = BlockProducer::new();
        let old = producer.arm(Hash256([1; 32]), |_| async {});
        let new = producer.arm(Hash256([2; 32]), |_| async {});

        assert!(!producer.set_status(old, ProducerStatus::Minting(Hash256([1; 32]))));
        assert!(producer.set_status(new, ProducerStatus::Minting(Hash256([2; 32]))));
        assert_eq!(producer.status().predecessor(), Some(Hash256([2; 32])));

        producer.finish(old);
        assert_ne!(producer.status(), ProducerStatus::Idle);
        producer.finish(new);
        assert_eq!(producer.status(), ProducerStatus::Idle);
    }

    #[tokio::test]
    async fn cancel_stops_round() {
        let producer = BlockProducer::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        let generation = producer.arm(Hash256::zero(), move |_| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(true, Ordering::SeqCst);
        });

        producer.cancel();
        assert_eq!(producer.status(), ProducerStatus::Idle);
        assert!(!producer.set_status(generation, ProducerStatus::Minting(Hash256::zero())));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }
}
