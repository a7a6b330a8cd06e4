// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

//! In-process network used by the devnet binary and by tests. Every frame
//! goes through the wire codec.

use crate::node::{Inbound, Message, PeerDiscovery, Transport, TransportErr};
use async_trait::async_trait;
use log::*;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

type Mailbox = mpsc::UnboundedSender<(Message, SocketAddr)>;

#[derive(Default)]
struct Hub {
    peers: BTreeMap<SocketAddr, Mailbox>,

    /// Links that silently drop traffic, stored in both directions
    cut: HashSet<(SocketAddr, SocketAddr)>,
}

#[derive(Clone, Default)]
pub struct MemoryNetwork {
    hub: Arc<RwLock<Hub>>,
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a peer at `addr`, replacing any previous one.
    #[must_use]
    pub fn join(&self, addr: SocketAddr) -> (MemoryTransport, Inbound) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub.write().peers.insert(addr, tx);

        (
            MemoryTransport {
                addr,
                hub: self.hub.clone(),
            },
            rx,
        )
    }

    pub fn leave(&self, addr: &SocketAddr) {
        self.hub.write().peers.remove(addr);
    }

    /// Drops all traffic between `a` and `b` until [`MemoryNetwork::heal`]
    pub fn cut(&self, a: SocketAddr, b: SocketAddr) {
        let mut hub = self.hub.write();
        hub.cut.insert((a, b));
        hub.cut.insert((b, a));
    }

    pub fn heal(&self, a: SocketAddr, b: SocketAddr) {
        let mut hub = self.hub.write();
        hub.cut.remove(&(a, b));
        hub.cut.remove(&(b, a));
    }

    /// Every other joined peer is a neighbor of `local`
    #[must_use]
    pub fn discovery(&self, local: SocketAddr) -> MemoryPeers {
        MemoryPeers {
            local,
            hub: self.hub.clone(),
        }
    }
}

pub struct MemoryTransport {
    addr: SocketAddr,
    hub: Arc<RwLock<Hub>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, msg: Message, to: SocketAddr) -> Result<(), TransportErr> {
        let bytes = msg
            .to_bytes()
            .map_err(|err| TransportErr::Encode(err.to_string()))?;

        let mailbox = {
            let hub = self.hub.read();
            if hub.cut.contains(&(self.addr, to)) {
                trace!("Dropping frame {} -> {}", self.addr, to);
                return Ok(());
            }

            hub.peers
                .get(&to)
                .cloned()
                .ok_or(TransportErr::Unreachable(to))?
        };

        match Message::from_bytes(&bytes) {
            Ok(decoded) => mailbox
                .send((decoded, self.addr))
                .map_err(|_| TransportErr::Closed),
            Err(err) => {
                warn!("Dropping undecodable frame from {}: {}", self.addr, err);
                Ok(())
            }
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

pub struct MemoryPeers {
    local: SocketAddr,
    hub: Arc<RwLock<Hub>>,
}

impl PeerDiscovery for MemoryPeers {
    fn neighbors(&self) -> Vec<SocketAddr> {
        self.hub
            .read()
            .peers
            .keys()
            .filter(|addr| **addr != self.local)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Hash256;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn delivers_with_sender_address() {
        let net = MemoryNetwork::new();
        let (a, _a_rx) = net.join(addr(1));
        let (_b, mut b_rx) = net.join(addr(2));

        let msg = Message::getdata_req("app", Hash256([1; 32]));
        a.send(msg.clone(), addr(2)).await.unwrap();

        let (received, from) = b_rx.recv().await.unwrap();
        assert_eq!(received, msg);
        assert_eq!(from, addr(1));
    }

    #[tokio::test]
    async fn unknown_peer_is_unreachable() {
        let net = MemoryNetwork::new();
        let (a, _rx) = net.join(addr(1));
        let msg = Message::getdata_req("app", Hash256::zero());

        assert_eq!(
            a.send(msg, addr(9)).await,
            Err(TransportErr::Unreachable(addr(9)))
        );
    }

    #[tokio::test]
    async fn cut_links_drop_silently() {
        let net = MemoryNetwork::new();
        let (a, _a_rx) = net.join(addr(1));
        let (_b, mut b_rx) = net.join(addr(2));
        net.cut(addr(1), addr(2));

        let msg = Message::getdata_req("app", Hash256::zero());
        assert!(a.send(msg.clone(), addr(2)).await.is_ok());
        assert!(b_rx.try_recv().is_err());

        net.heal(addr(1), addr(2));
        a.send(msg, addr(2)).await.unwrap();
        assert!(b_rx.recv().await.is_some());
    }

    #[test]
    fn discovery_excludes_self() {
        let net = MemoryNetwork::new();
        let _a = net.join(addr(1));
        let _b = net.join(addr(2));
        let _c = net.join(addr(3));

        assert_eq!(net.discovery(addr(2)).neighbors(), vec![addr(1), addr(3)]);
    }
}
