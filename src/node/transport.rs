// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::node::Message;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Stream of inbound messages tagged with the sender's address
pub type Inbound = mpsc::UnboundedReceiver<(Message, SocketAddr)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErr {
    /// No peer is listening at the address
    Unreachable(SocketAddr),

    /// The message could not be serialized
    Encode(String),

    Closed,
}

/// Delivers messages to peers. Authentication and encryption are the
/// implementation's concern, messages handed over are plain records.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, msg: Message, to: SocketAddr) -> Result<(), TransportErr>;

    fn local_addr(&self) -> SocketAddr;
}

/// Supplies the peers a broadcast goes to. Consulted on every broadcast.
pub trait PeerDiscovery: Send + Sync {
    fn neighbors(&self) -> Vec<SocketAddr>;
}

/// Fixed peer list, editable at runtime.
#[derive(Debug, Default)]
pub struct StaticPeers {
    peers: RwLock<Vec<SocketAddr>>,
}

impl StaticPeers {
    #[must_use]
    pub fn new(peers: Vec<SocketAddr>) -> Self {
        Self {
            peers: RwLock::new(peers),
        }
    }

    pub fn add(&self, peer: SocketAddr) {
        let mut peers = self.peers.write();
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    pub fn remove(&self, peer: &SocketAddr) {
        self.peers.write().retain(|p| p != peer);
    }
}

impl PeerDiscovery for StaticPeers {
    fn neighbors(&self) -> Vec<SocketAddr> {
        self.peers.read().clone()
    }
}
