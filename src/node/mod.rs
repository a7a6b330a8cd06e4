// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

pub mod memory;
mod mempool;
mod message;
mod pending;
mod transport;

pub use memory::*;
pub use mempool::*;
pub use message::*;
pub use pending::*;
pub use transport::*;

use crate::chain::{
    replay, validate_all, validate_sequence, BlockStore, GenesisHooks, LedgerHooks, StoreErr,
    UtxoSet,
};
use crate::codec;
use crate::consensus::{
    Consensus, ConsensusErr, DEFAULT_APP_ID, DEFAULT_GETBLOCKS_PAGE, DEFAULT_MSG_TIMEOUT_MS,
    MAX_BLOCK_BYTES, MAX_GETBLOCKS_PAGE,
};
use crate::miner::{order_candidates, take_within_budget, BlockProducer, ProducerStatus};
use crate::primitives::{Block, Hash256, Transaction};
use log::*;
use parking_lot::RwLock;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Messages tagged with another application id are dropped
    pub app_id: String,

    /// Whether this node produces blocks
    pub is_validator: bool,

    /// How long a request waits for its response
    pub msg_timeout: Duration,

    /// Hashes per GETBLOCKS answer, clamped to [`MAX_GETBLOCKS_PAGE`]
    pub getblocks_page: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_owned(),
            is_validator: false,
            msg_timeout: Duration::from_millis(DEFAULT_MSG_TIMEOUT_MS),
            getblocks_page: DEFAULT_GETBLOCKS_PAGE,
        }
    }
}

#[derive(Debug)]
pub enum NodeErr {
    /// A required builder argument was not supplied
    MissingArg(&'static str),

    Store(StoreErr),

    Consensus(ConsensusErr),

    Request(RequestErr),

    /// Message payload does not match its flavor
    Malformed(Flavor),
}

impl NodeErr {
    /// Store corruption. Everything else is a local, recoverable failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_corruption())
    }
}

impl From<StoreErr> for NodeErr {
    fn from(other: StoreErr) -> Self {
        Self::Store(other)
    }
}

impl From<ConsensusErr> for NodeErr {
    fn from(other: ConsensusErr) -> Self {
        Self::Consensus(other)
    }
}

impl From<RequestErr> for NodeErr {
    fn from(other: RequestErr) -> Self {
        Self::Request(other)
    }
}

impl fmt::Display for NodeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArg(arg) => write!(f, "missing argument: {arg}"),
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::Consensus(err) => write!(f, "consensus error: {err}"),
            Self::Request(err) => write!(f, "request error: {err}"),
            Self::Malformed(flavor) => write!(f, "malformed {flavor:?} message"),
        }
    }
}

impl std::error::Error for NodeErr {}

/// A ledger peer. Owns the block tree and the mempool, answers the sync
/// protocol and drives block production when it is a validator.
pub struct Node {
    config: NodeConfig,
    store: RwLock<BlockStore>,
    mempool: RwLock<Mempool>,
    hooks: Arc<dyn LedgerHooks>,
    consensus: Arc<dyn Consensus>,
    transport: Arc<dyn Transport>,
    peers: Arc<dyn PeerDiscovery>,
    pending: PendingRequests,
    producer: BlockProducer,
}

#[derive(Default)]
pub struct NodeBuilder {
    config: NodeConfig,
    genesis: Option<Block>,
    hooks: Option<Arc<dyn LedgerHooks>>,
    consensus: Option<Arc<dyn Consensus>>,
    transport: Option<Arc<dyn Transport>>,
    peers: Option<Arc<dyn PeerDiscovery>>,
}

impl NodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    #[must_use]
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn app_id(mut self, app_id: &str) -> Self {
        self.config.app_id = app_id.to_owned();
        self
    }

    #[must_use]
    pub fn validator(mut self, is_validator: bool) -> Self {
        self.config.is_validator = is_validator;
        self
    }

    #[must_use]
    pub fn msg_timeout(mut self, timeout: Duration) -> Self {
        self.config.msg_timeout = timeout;
        self
    }

    #[must_use]
    pub fn getblocks_page(mut self, page: usize) -> Self {
        self.config.getblocks_page = page;
        self
    }

    #[must_use]
    pub fn genesis(mut self, genesis: Block) -> Self {
        self.genesis = Some(genesis);
        self
    }

    /// Defaults to [`GenesisHooks`] over the genesis block
    #[must_use]
    pub fn hooks(mut self, hooks: Arc<dyn LedgerHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    #[must_use]
    pub fn consensus(mut self, consensus: Arc<dyn Consensus>) -> Self {
        self.consensus = Some(consensus);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn peers(mut self, peers: Arc<dyn PeerDiscovery>) -> Self {
        self.peers = Some(peers);
        self
    }

    pub fn build(self) -> Result<Arc<Node>, NodeErr> {
        let genesis = self.genesis.ok_or(NodeErr::MissingArg("genesis"))?;
        let consensus = self.consensus.ok_or(NodeErr::MissingArg("consensus"))?;
        let transport = self.transport.ok_or(NodeErr::MissingArg("transport"))?;
        let peers = self.peers.ok_or(NodeErr::MissingArg("peers"))?;
        let hooks = self
            .hooks
            .unwrap_or_else(|| Arc::new(GenesisHooks::new(&genesis)));

        Ok(Arc::new(Node {
            config: self.config,
            store: RwLock::new(BlockStore::new(genesis)),
            mempool: RwLock::new(Mempool::new()),
            hooks,
            consensus,
            transport,
            peers,
            pending: PendingRequests::new(),
            producer: BlockProducer::new(),
        }))
    }
}

fn first_deepest(store: &BlockStore) -> Result<Hash256, StoreErr> {
    store
        .get_deepest_blocks()
        .first()
        .and_then(|id| store.node(*id))
        .map(|node| node.hash)
        .ok_or(StoreErr::CorruptData)
}

impl Node {
    /// Arms block production if this is a validator, then catches up with
    /// the neighbors.
    pub fn start(self: &Arc<Self>) -> Result<(), NodeErr> {
        info!(
            "[{}] Online using {} consensus",
            self.local_addr(),
            self.consensus.method()
        );

        if self.config.is_validator {
            info!("[{}] As validator", self.local_addr());
            let pred = first_deepest(&self.store.read())?;
            self.schedule_production(pred);
        }

        self.catch_up()
    }

    pub fn stop(&self) {
        self.producer.cancel();
        info!("[{}] Offline", self.local_addr());
    }

    /// Dispatches inbound messages until the stream closes. Every message
    /// is handled in its own task.
    pub async fn run(self: Arc<Self>, mut inbound: Inbound) {
        while let Some((msg, from)) = inbound.recv().await {
            let node = self.clone();
            tokio::spawn(async move { node.on_message(msg, from).await });
        }

        debug!("[{}] Inbound stream closed", self.local_addr());
    }

    pub async fn on_message(self: &Arc<Self>, msg: Message, from: SocketAddr) {
        if msg.app_id != self.config.app_id {
            trace!(
                "[{}] Dropping message for app {} from {}",
                self.local_addr(),
                msg.app_id,
                from
            );
            return;
        }

        if !msg.is_request() {
            let (flavor, id) = (msg.flavor, msg.id);
            if self.pending.complete(msg) {
                debug!("[{}] {:?} REQ # {} OK", self.local_addr(), flavor, id);
            } else {
                trace!("[{}] Unsolicited {:?} RES # {}", self.local_addr(), flavor, id);
            }
            return;
        }

        debug!(
            "[{}] Inbound {:?} REQ # {} from {}",
            self.local_addr(),
            msg.flavor,
            msg.id,
            from
        );

        match self.handle_request(&msg, from).await {
            Ok(payload) => {
                if let Err(err) = self.transport.send(msg.response(payload), from).await {
                    debug!("[{}] Could not answer {}: {:?}", self.local_addr(), from, err);
                }
            }

            Err(err) if err.is_fatal() => {
                error!("[{}] Halting block production: {}", self.local_addr(), err);
                self.producer.cancel();

                if let Err(err) = self.transport.send(msg.response(Payload::Ok), from).await {
                    debug!("[{}] Could not answer {}: {:?}", self.local_addr(), from, err);
                }
            }

            Err(err) => {
                warn!("[{}] Dropping request from {}: {}", self.local_addr(), from, err);
            }
        }
    }

    async fn handle_request(
        self: &Arc<Self>,
        msg: &Message,
        from: SocketAddr,
    ) -> Result<Payload, NodeErr> {
        match (msg.flavor, &msg.data) {
            (Flavor::Tx, Payload::Tx(tx)) => Ok(self.handle_tx(tx.clone())),
            (Flavor::Block, Payload::Block(block)) => self.handle_block(block.clone()).await,
            (Flavor::GetBlocks, Payload::Cursor { start, offset }) => {
                self.handle_getblocks(start, *offset)
            }
            (Flavor::GetData, Payload::Hash(hash)) => Ok(self.handle_getdata(hash, from)),
            (flavor, _) => Err(NodeErr::Malformed(flavor)),
        }
    }

    /// Transactions are only checked when they are put in a block
    fn handle_tx(self: &Arc<Self>, tx: Transaction) -> Payload {
        self.submit_transaction(tx);
        Payload::Ok
    }

    async fn handle_block(self: &Arc<Self>, block: Block) -> Result<Payload, NodeErr> {
        let hash = block.hash();

        let parent_hash = {
            let store = self.store.read();

            // Already known
            if store.contains(&hash) {
                return Ok(Payload::Ok);
            }

            store
                .get_node(&block.hash_prev)
                .map(|id| store.node(id).map(|node| node.hash))
        };

        match parent_hash {
            // Parent unknown, we are behind
            None => {
                info!(
                    "[{}] Block {} has unknown parent {}",
                    self.local_addr(),
                    hash,
                    block.hash_prev
                );
                self.catch_up()?;
                return Ok(Payload::Ok);
            }

            Some(Some(parent_hash)) if parent_hash == block.hash_prev => {}

            Some(_) => return Err(StoreErr::CorruptData.into()),
        }

        if !self.consensus.verify_nonce(&block).await {
            warn!("[{}] Rejected block {}: bad nonce", self.local_addr(), hash);
            return Ok(Payload::Ok);
        }

        // Another handler may have attached the block while we were verifying
        let (sole_deepest, size) = {
            let mut store = self.store.write();

            if store.contains(&hash) {
                return Ok(Payload::Ok);
            }

            let parent = store
                .get_node(&block.hash_prev)
                .ok_or(StoreErr::CorruptData)?;
            let mut utxos = replay(&store, parent, self.hooks.as_ref())?;

            if !validate_all(&block.transactions, &mut utxos, self.hooks.as_ref()) {
                warn!(
                    "[{}] Rejected block {}: invalid transactions",
                    self.local_addr(),
                    hash
                );
                return Ok(Payload::Ok);
            }

            let id = store.add_child(parent, block.clone())?;
            (store.get_deepest_blocks() == [id], store.size())
        };

        info!(
            "[{}] Added new block {}, {} blocks total",
            self.local_addr(),
            hash,
            size
        );
        self.broadcast(Message::block_req(&self.config.app_id, block));

        // A new height throws away the work in progress
        if self.config.is_validator && sole_deepest {
            self.schedule_production(hash);
        }

        Ok(Payload::Ok)
    }

    /// One page of the blocks reachable from `start`, ordered by distance,
    /// excluding `start` itself. The page begins `offset` blocks in.
    fn handle_getblocks(&self, start: &Hash256, offset: u64) -> Result<Payload, NodeErr> {
        let page = self.config.getblocks_page.clamp(1, MAX_GETBLOCKS_PAGE);
        let store = self.store.read();
        let mut hashes = Vec::new();
        let mut seen = 0u64;

        if let Some(start) = store.get_node(start) {
            store.bfs(start, true, |id, node| {
                if id == start {
                    return;
                }

                if seen >= offset && hashes.len() < page {
                    hashes.push(node.hash);
                }

                seen += 1;
            })?;
        }

        let end = offset.saturating_add(hashes.len() as u64);
        let next = if end < seen { Some(end) } else { None };

        Ok(Payload::Page { hashes, next })
    }

    fn handle_getdata(self: &Arc<Self>, hash: &Hash256, from: SocketAddr) -> Payload {
        let block = self.store.read().get_block(hash);

        if let Some(block) = block {
            self.send_request(
                Message::block_req(&self.config.app_id, Block::clone(&block)),
                from,
            );
        }

        Payload::Ok
    }

    /// Advertises the last block known before any unresolved fork and
    /// fetches whatever the neighbors answer that we do not have.
    pub fn catch_up(self: &Arc<Self>) -> Result<(), NodeErr> {
        let (anchor, size) = {
            let store = self.store.read();
            let id = store.catch_up_anchor()?;
            let anchor = store.node(id).ok_or(StoreErr::CorruptData)?.hash;
            (anchor, store.size())
        };

        info!(
            "[{}] Catching up: {} known blocks, last known {}",
            self.local_addr(),
            size,
            anchor
        );

        for peer in self.peers.neighbors() {
            let node = self.clone();

            tokio::spawn(async move {
                let mut offset = 0;

                loop {
                    let req = Message::getblocks_req(&node.config.app_id, anchor, offset);
                    match node.request(req, peer).await {
                        Ok(res) => match node.fetch_missing(res, peer) {
                            Some(next) if next > offset => offset = next,
                            _ => break,
                        },
                        Err(err) => {
                            debug!("[{}] GETBLOCKS to {} failed: {}", node.local_addr(), peer, err);
                            break;
                        }
                    }
                }
            });
        }

        Ok(())
    }

    /// Sends GETDATA for every unknown hash of a GETBLOCKS page and returns
    /// the offset of the next page.
    fn fetch_missing(self: &Arc<Self>, res: Message, peer: SocketAddr) -> Option<u64> {
        let Payload::Page { hashes, next } = res.data else {
            warn!("[{}] Malformed GETBLOCKS response from {}", self.local_addr(), peer);
            return None;
        };

        let missing: Vec<_> = {
            let store = self.store.read();
            hashes.into_iter().filter(|h| !store.contains(h)).collect()
        };

        for hash in missing {
            self.send_request(Message::getdata_req(&self.config.app_id, hash), peer);
        }

        next
    }

    /// Adds `tx` to the mempool and relays it. Returns false if it was
    /// already known.
    pub fn submit_transaction(self: &Arc<Self>, tx: Transaction) -> bool {
        let fresh = self.mempool.write().append(tx.clone());

        if fresh {
            debug!("[{}] New transaction {}", self.local_addr(), tx.hash());
            self.broadcast(Message::tx_req(&self.config.app_id, tx));
        }

        fresh
    }

    /// Sends `msg` to every neighbor, each copy under its own id.
    pub fn broadcast(self: &Arc<Self>, msg: Message) {
        let neighbors = self.peers.neighbors();
        debug!(
            "[{}] Broadcasting {:?} to {} neighbors",
            self.local_addr(),
            msg.flavor,
            neighbors.len()
        );

        for peer in neighbors {
            self.send_request(msg.renewed(), peer);
        }
    }

    /// Sends a request and waits for its response or the timeout.
    pub async fn request(&self, req: Message, to: SocketAddr) -> Result<Message, NodeErr> {
        trace!(
            "[{}] Outbound {:?} REQ # {} to {}",
            self.local_addr(),
            req.flavor,
            req.id,
            to
        );

        let res = self
            .pending
            .request(self.transport.as_ref(), req, to, self.config.msg_timeout)
            .await?;

        Ok(res)
    }

    fn send_request(self: &Arc<Self>, req: Message, to: SocketAddr) {
        let node = self.clone();

        tokio::spawn(async move {
            let (flavor, id) = (req.flavor, req.id);
            if let Err(err) = node.request(req, to).await {
                debug!(
                    "[{}] {:?} REQ # {} to {} failed: {}",
                    node.local_addr(),
                    flavor,
                    id,
                    to,
                    err
                );
            }
        });
    }

    /// Restarts production on top of `pred`, dropping the round in progress.
    pub fn schedule_production(self: &Arc<Self>, pred: Hash256) {
        let node = self.clone();
        self.producer
            .arm(pred, move |generation| node.production_loop(generation, pred));
    }

    async fn production_loop(self: Arc<Self>, generation: u64, mut pred: Hash256) {
        loop {
            if !self
                .producer
                .set_status(generation, ProducerStatus::Scheduled(pred))
            {
                return;
            }

            let delay = self.consensus.production_delay();
            info!(
                "[{}] Making successor to block {} in {}ms...",
                self.local_addr(),
                pred,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;

            if !self
                .producer
                .set_status(generation, ProducerStatus::Minting(pred))
            {
                return;
            }

            match self.mint_on(pred).await {
                Ok(Some(next)) => pred = next,
                Ok(None) => {}
                Err(err) if err.is_fatal() => {
                    error!("[{}] Block production halted: {}", self.local_addr(), err);
                    break;
                }
                Err(err) => {
                    warn!("[{}] Block production stopped: {}", self.local_addr(), err);
                    break;
                }
            }
        }

        self.producer.finish(generation);
    }

    /// Builds, seals, attaches and broadcasts a block of the pending
    /// transactions that are valid on top of `pred`. Returns the new block
    /// hash, or `None` if no transaction was eligible.
    pub async fn mint_on(self: &Arc<Self>, pred: Hash256) -> Result<Option<Hash256>, NodeErr> {
        let (valid, candidates) = {
            let store = self.store.read();
            let pred_id = store.get_node(&pred).ok_or(StoreErr::UnknownNode)?;
            let confirmed = store.branch_transactions(pred_id)?;
            let candidates = order_candidates(self.mempool.read().candidates(&confirmed));
            let mut utxos = replay(&store, pred_id, self.hooks.as_ref())?;
            let valid = validate_sequence(candidates.iter(), &mut utxos, self.hooks.as_ref());
            (valid, candidates.len())
        };

        // Whatever does not fit is minted on top of this block next round
        let budget = MAX_BLOCK_BYTES.saturating_sub(codec::encoded_len(&Block::new(pred, vec![])));
        let valid = take_within_budget(valid, budget);

        // Keep working on the same predecessor
        if valid.is_empty() {
            info!("[{}] No valid new tx at block time!", self.local_addr());
            return Ok(None);
        }

        let tx_count = valid.len();
        let block = self.consensus.seal(Block::new(pred, valid)).await?;
        let hash = block.hash();

        let size = {
            let mut store = self.store.write();
            let pred_id = store.get_node(&pred).ok_or(StoreErr::CorruptData)?;
            store.add_child(pred_id, block.clone())?;
            store.size()
        };

        info!(
            "[{}] Made block {} ({} tx, {} left out) {} blocks total",
            self.local_addr(),
            hash,
            tx_count,
            candidates - tx_count,
            size
        );
        self.broadcast(Message::block_req(&self.config.app_id, block));

        Ok(Some(hash))
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.config.app_id
    }

    #[must_use]
    pub fn is_validator(&self) -> bool {
        self.config.is_validator
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.store.read().size()
    }

    #[must_use]
    pub fn contains_block(&self, hash: &Hash256) -> bool {
        self.store.read().contains(hash)
    }

    #[must_use]
    pub fn deepest_hashes(&self) -> Vec<Hash256> {
        let store = self.store.read();
        store
            .get_deepest_blocks()
            .into_iter()
            .filter_map(|id| store.node(id).map(|node| node.hash))
            .collect()
    }

    #[must_use]
    pub fn mempool_len(&self) -> usize {
        self.mempool.read().len()
    }

    #[must_use]
    pub fn producer_status(&self) -> ProducerStatus {
        self.producer.status()
    }

    /// Unspent outputs as of the first deepest block
    pub fn canonical_utxos(&self) -> Result<UtxoSet, NodeErr> {
        let store = self.store.read();
        let head = first_deepest(&store)?;
        let id = store.get_node(&head).ok_or(StoreErr::CorruptData)?;
        Ok(replay(&store, id, self.hooks.as_ref())?)
    }

    /// Runs `f` against the block store under a read lock
    pub fn with_store<R>(&self, f: impl FnOnce(&BlockStore) -> R) -> R {
        let store = self.store.read();
        f(&store)
    }
}
