// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022-2023 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::primitives::{Block, Hash256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use triomphe::Arc;

/// Stable handle of a node in a [`BlockStore`]. Nodes are never removed.
pub type NodeId = usize;

#[derive(Debug)]
pub enum StoreErr {
    /// The store broke one of its structural invariants
    CorruptData,

    /// No node exists for the given handle
    UnknownNode,

    /// The block's `hash_prev` does not match the parent's hash
    InvalidParent,

    /// A block with the same hash is already stored
    DuplicateBlock,
}

impl StoreErr {
    /// Corruption must halt the caller instead of being treated as a rejection.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptData)
    }
}

impl fmt::Display for StoreErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptData => f.write_str("block store data is corrupted"),
            Self::UnknownNode => f.write_str("unknown block node"),
            Self::InvalidParent => f.write_str("block does not extend the given parent"),
            Self::DuplicateBlock => f.write_str("block is already stored"),
        }
    }
}

impl std::error::Error for StoreErr {}

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub block: Arc<Block>,
    pub hash: Hash256,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,

    /// Distance from genesis, which sits at 0
    pub depth: u64,
}

impl BlockNode {
    #[must_use]
    pub fn degree(&self) -> usize {
        self.children.len()
    }
}

/// In-memory tree of blocks rooted at genesis.
///
/// Nodes live in an arena and the hash index is patched on every insert,
/// so any handle returned by [`BlockStore::get_node`] stays valid.
#[derive(Debug, Clone)]
pub struct BlockStore {
    nodes: Vec<BlockNode>,
    index: HashMap<Hash256, NodeId>,
}

impl BlockStore {
    #[must_use]
    pub fn new(genesis: Block) -> Self {
        let hash = genesis.hash();
        let mut index = HashMap::new();
        index.insert(hash, 0);

        Self {
            nodes: vec![BlockNode {
                block: Arc::new(genesis),
                hash,
                parent: None,
                children: Vec::new(),
                depth: 0,
            }],
            index,
        }
    }

    #[must_use]
    pub fn genesis(&self) -> NodeId {
        0
    }

    /// Number of stored blocks, genesis included
    #[must_use]
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn get_node(&self, hash: &Hash256) -> Option<NodeId> {
        self.index.get(hash).copied()
    }

    #[must_use]
    pub fn contains(&self, hash: &Hash256) -> bool {
        self.index.contains_key(hash)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&BlockNode> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn get_block(&self, hash: &Hash256) -> Option<Arc<Block>> {
        self.get_node(hash)
            .and_then(|id| self.node(id))
            .map(|node| node.block.clone())
    }

    /// Looks up a handle the store itself produced. A miss here means the
    /// tree is inconsistent.
    fn linked(&self, id: NodeId) -> Result<&BlockNode, StoreErr> {
        self.nodes.get(id).ok_or(StoreErr::CorruptData)
    }

    /// Returns the nodes from genesis to `id` inclusive, ordered by depth.
    pub fn get_branch(&self, id: NodeId) -> Result<Vec<NodeId>, StoreErr> {
        let mut node = self.node(id).ok_or(StoreErr::UnknownNode)?;
        let mut branch = Vec::with_capacity(node.depth as usize + 1);
        branch.push(id);

        while let Some(parent) = node.parent {
            let parent_node = self.linked(parent)?;

            if parent_node.depth + 1 != node.depth {
                return Err(StoreErr::CorruptData);
            }

            branch.push(parent);
            node = parent_node;
        }

        if branch.last() != Some(&self.genesis()) {
            return Err(StoreErr::CorruptData);
        }

        branch.reverse();
        Ok(branch)
    }

    /// Every node at the maximum depth, in insertion order. More than one
    /// entry means there are competing branches.
    #[must_use]
    pub fn get_deepest_blocks(&self) -> Vec<NodeId> {
        let max_depth = self.nodes.iter().map(|n| n.depth).max().unwrap_or(0);

        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.depth == max_depth)
            .map(|(id, _)| id)
            .collect()
    }

    /// Attaches `block` under `parent` and indexes it.
    pub fn add_child(&mut self, parent: NodeId, block: Block) -> Result<NodeId, StoreErr> {
        let parent_node = self.node(parent).ok_or(StoreErr::UnknownNode)?;

        if block.hash_prev != parent_node.hash {
            return Err(StoreErr::InvalidParent);
        }

        let hash = block.hash();
        if self.index.contains_key(&hash) {
            return Err(StoreErr::DuplicateBlock);
        }

        let id = self.nodes.len();
        let depth = parent_node.depth + 1;
        self.nodes.push(BlockNode {
            block: Arc::new(block),
            hash,
            parent: Some(parent),
            children: Vec::new(),
            depth,
        });
        self.nodes[parent].children.push(id);
        self.index.insert(hash, id);

        Ok(id)
    }

    /// Breadth-first traversal from `start`, which is visited first. When
    /// `undirected` is set the parent edge is followed as well, reaching
    /// every node of the tree.
    pub fn bfs<F>(&self, start: NodeId, undirected: bool, mut visit: F) -> Result<(), StoreErr>
    where
        F: FnMut(NodeId, &BlockNode),
    {
        self.node(start).ok_or(StoreErr::UnknownNode)?;

        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(start);
        queue.push_back(start);

        while let Some(id) = queue.pop_front() {
            let node = self.linked(id)?;
            visit(id, node);

            let parent = if undirected { node.parent } else { None };
            for next in node.children.iter().copied().chain(parent) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        Ok(())
    }

    /// Last known block before an unresolved fork: starting at the first
    /// deepest node, walks up while the parent has more than one child.
    pub fn catch_up_anchor(&self) -> Result<NodeId, StoreErr> {
        let mut id = self
            .get_deepest_blocks()
            .first()
            .copied()
            .ok_or(StoreErr::CorruptData)?;

        while let Some(parent) = self.linked(id)?.parent {
            if self.linked(parent)?.degree() <= 1 {
                break;
            }

            id = parent;
        }

        Ok(id)
    }

    /// Hashes of every transaction included in the branch ending at `id`.
    pub fn branch_transactions(&self, id: NodeId) -> Result<HashSet<Hash256>, StoreErr> {
        let mut out = HashSet::new();

        for node_id in self.get_branch(id)? {
            for tx in self.linked(node_id)?.block.transactions.iter() {
                out.insert(tx.hash());
            }
        }

        Ok(out)
    }

    /// Points the parent link of `id` at `parent` without any checks
    #[cfg(test)]
    pub(crate) fn set_parent_unchecked(&mut self, id: NodeId, parent: NodeId) {
        self.nodes[id].parent = Some(parent);
    }
}
