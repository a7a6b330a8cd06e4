// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{Block, Hash256, Transaction};
use bincode::{Decode, Encode};
use std::fmt;

/// Random id correlating a request with its response
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Encode, Decode)]
pub struct MessageId(pub u64);

impl MessageId {
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum MessageType {
    Req,
    Res,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum Flavor {
    Tx,
    Block,
    GetBlocks,
    GetData,
}

#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub enum Payload {
    Tx(Transaction),
    Block(Block),
    Hash(Hash256),

    /// GETBLOCKS position: blocks reachable from `start`, skipping the
    /// first `offset` of them
    Cursor { start: Hash256, offset: u64 },

    /// One page of a GETBLOCKS answer. `next` is the offset of the
    /// following page, if any.
    Page {
        hashes: Vec<Hash256>,
        next: Option<u64>,
    },

    Ok,
}

#[derive(Clone, PartialEq, Eq, Debug, Encode, Decode)]
pub struct Message {
    pub id: MessageId,
    pub app_id: String,
    pub kind: MessageType,
    pub flavor: Flavor,
    pub data: Payload,
}

impl Message {
    fn request(app_id: &str, flavor: Flavor, data: Payload) -> Self {
        Self {
            id: MessageId::random(),
            app_id: app_id.to_owned(),
            kind: MessageType::Req,
            flavor,
            data,
        }
    }

    #[must_use]
    pub fn tx_req(app_id: &str, tx: Transaction) -> Self {
        Self::request(app_id, Flavor::Tx, Payload::Tx(tx))
    }

    #[must_use]
    pub fn block_req(app_id: &str, block: Block) -> Self {
        Self::request(app_id, Flavor::Block, Payload::Block(block))
    }

    /// Asks for the blocks the receiver can reach from `start`, beginning
    /// at `offset` in traversal order
    #[must_use]
    pub fn getblocks_req(app_id: &str, start: Hash256, offset: u64) -> Self {
        Self::request(
            app_id,
            Flavor::GetBlocks,
            Payload::Cursor { start, offset },
        )
    }

    #[must_use]
    pub fn getdata_req(app_id: &str, block_hash: Hash256) -> Self {
        Self::request(app_id, Flavor::GetData, Payload::Hash(block_hash))
    }

    /// Response to this request, echoing its id, app id and flavor
    #[must_use]
    pub fn response(&self, data: Payload) -> Self {
        Self {
            id: self.id,
            app_id: self.app_id.clone(),
            kind: MessageType::Res,
            flavor: self.flavor,
            data,
        }
    }

    /// Same request under a fresh id
    #[must_use]
    pub fn renewed(&self) -> Self {
        let mut msg = self.clone();
        msg.id = MessageId::random();
        msg
    }

    #[must_use]
    pub fn is_request(&self) -> bool {
        self.kind == MessageType::Req
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        crate::codec::encode_to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        crate::codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_echoes_request() {
        let req = Message::getblocks_req("app", Hash256::zero(), 0);
        let res = req.response(Payload::Page {
            hashes: vec![],
            next: None,
        });

        assert_eq!(res.id, req.id);
        assert_eq!(res.app_id, "app");
        assert_eq!(res.flavor, Flavor::GetBlocks);
        assert_eq!(res.kind, MessageType::Res);
        assert!(req.is_request());
        assert!(!res.is_request());
    }

    #[test]
    fn renewed_keeps_content() {
        let req = Message::getdata_req("app", Hash256([1; 32]));
        let again = req.renewed();

        assert_ne!(again.id, req.id);
        assert_eq!(again.data, req.data);
    }

    #[test]
    fn wire_roundtrip() {
        let tx = Transaction::new(Hash256([3; 32]), vec![0x51], vec![0x00]);
        let msg = Message::block_req("app", Block::new(Hash256([2; 32]), vec![tx]));
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(Message::from_bytes(&bytes).unwrap(), msg);
        assert!(Message::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
