// Dweve Pathweave - Multi-Path Grammar Parsing Engine
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Index-based syntax trees.
//!
//! All nodes of an [`Ast`] live in chunks of one [`MemoryArena`] and refer
//! to each other by [`NodeId`]. A node owns its children through an index-linked sibling
//! list; the parent link is a plain back-index used for navigation only.
//! Ownership is enforced at [`Ast::add_child`]: a node has at most one
//! parent and can never become its own ancestor.
//!
//! # Examples
//!
//! ```
//! use pathweave_memory::{Ast, ByteSpan, NodeKind, Order};
//!
//! let mut ast = Ast::new();
//! let root = ast.new_node(NodeKind::NonTerminal, 0, None, ByteSpan::new(0, 3));
//! let lhs = ast.new_node(NodeKind::Literal, 1, None, ByteSpan::new(0, 1));
//! let rhs = ast.new_node(NodeKind::Literal, 1, None, ByteSpan::new(2, 1));
//! ast.add_child(root, lhs).unwrap();
//! ast.add_child(root, rhs).unwrap();
//!
//! let order: Vec<_> = ast.traverse(root, Order::DepthFirst).collect();
//! assert_eq!(order, vec![root, lhs, rhs]);
//! ```

use crate::arena::{ArenaConfig, ArenaStats, MemoryArena, Region};
use crate::error::StructuralError;
use crate::interner::{StringInterner, Symbol};
use crate::span::ByteSpan;
use std::collections::VecDeque;
use std::fmt;

const NONE: u32 = u32::MAX;

/// Stable id of a node within its [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(u32);

impl NodeId {
    /// Wrap a raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw index.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Punctuation or keyword token.
    Terminal,
    /// Reduced production.
    NonTerminal,
    /// Name token.
    Identifier,
    /// Literal value token.
    Literal,
}

impl NodeKind {
    /// Wire code.
    pub const fn to_u8(self) -> u8 {
        match self {
            NodeKind::Terminal => 0,
            NodeKind::NonTerminal => 1,
            NodeKind::Identifier => 2,
            NodeKind::Literal => 3,
        }
    }

    /// Decode a wire code.
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(NodeKind::Terminal),
            1 => Some(NodeKind::NonTerminal),
            2 => Some(NodeKind::Identifier),
            3 => Some(NodeKind::Literal),
            _ => None,
        }
    }

    /// Returns `true` for token-derived kinds.
    pub const fn is_leaf_kind(self) -> bool {
        !matches!(self, NodeKind::NonTerminal)
    }
}

/// Traversal order for [`Ast::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Pre-order, children left to right.
    DepthFirst,
    /// Level by level, left to right.
    BreadthFirst,
}

/// Read-only snapshot of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Rule or terminal id; [`Ast::NO_TAG`] when unknown.
    pub tag: u32,
    pub payload: Option<Symbol>,
    pub span: ByteSpan,
    pub parent: Option<NodeId>,
    pub child_count: u32,
}

// Node record layout, 40 bytes, little-endian u32 fields after the kind byte.
const KIND: usize = 0;
const TAG: usize = 4;
const PAYLOAD: usize = 8;
const SPAN_OFFSET: usize = 12;
const SPAN_LEN: usize = 16;
const PARENT: usize = 20;
const FIRST_CHILD: usize = 24;
const LAST_CHILD: usize = 28;
const NEXT_SIBLING: usize = 32;
const CHILD_COUNT: usize = 36;

/// Bytes of one node record.
pub const NODE_RECORD_BYTES: usize = 40;

/// Nodes per arena chunk.
pub const NODE_CHUNK: usize = 1024;

const CHUNK_BYTES: usize = NODE_CHUNK * NODE_RECORD_BYTES;

/// Arena of tree nodes.
///
/// Node records live in fixed-size chunks allocated from a [`MemoryArena`];
/// a record never moves once written.
pub struct Ast {
    arena: MemoryArena,
    chunks: Vec<Region>,
    len: usize,
}

impl Ast {
    /// Tag of nodes whose rule/terminal id is not known.
    pub const NO_TAG: u32 = u32::MAX;

    /// Create an empty tree arena.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a tree arena whose first block holds `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        let chunks = capacity.div_ceil(NODE_CHUNK).max(2);
        Self {
            arena: MemoryArena::new(ArenaConfig::new().with_block_size(chunks * CHUNK_BYTES)),
            chunks: Vec::with_capacity(chunks),
            len: 0,
        }
    }

    /// Add a detached node.
    pub fn new_node(
        &mut self,
        kind: NodeKind,
        tag: u32,
        payload: Option<Symbol>,
        span: ByteSpan,
    ) -> NodeId {
        let id = self.len as u32;
        if self.len == self.chunks.len() * NODE_CHUNK {
            let region = match self.arena.allocate_batch(NODE_CHUNK, NODE_RECORD_BYTES) {
                Ok(region) => region,
                // The node arena has no hard cap and a chunk is far below the region range.
                Err(err) => unreachable!("uncapped node arena refused growth: {}", err),
            };
            self.chunks.push(region);
        }
        self.len += 1;
        if let Some(record) = self.record_mut(id) {
            record.fill(0);
            record[KIND] = kind.to_u8();
            put(record, TAG, tag);
            put(record, PAYLOAD, payload.map_or(NONE, Symbol::as_u32));
            put(record, SPAN_OFFSET, span.offset());
            put(record, SPAN_LEN, span.len());
            for field in [PARENT, FIRST_CHILD, LAST_CHILD, NEXT_SIBLING] {
                put(record, field, NONE);
            }
        }
        NodeId(id)
    }

    /// Append `child` to the children of `parent`.
    ///
    /// # Errors
    ///
    /// - `UnknownNode` if either id is not in this tree
    /// - `MultipleOwners` if `child` already has a parent
    /// - `CycleDetected` if `child` is `parent` or one of its ancestors
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), StructuralError> {
        self.check(parent)?;
        self.check(child)?;

        let existing = self.link(child.0, PARENT);
        if existing != NONE {
            return Err(StructuralError::MultipleOwners {
                child: child.0,
                existing_parent: existing,
                new_parent: parent.0,
            });
        }

        let mut cursor = parent.0;
        while cursor != NONE {
            if cursor == child.0 {
                return Err(StructuralError::CycleDetected {
                    parent: parent.0,
                    child: child.0,
                });
            }
            cursor = self.link(cursor, PARENT);
        }

        let last = self.link(parent.0, LAST_CHILD);
        if last == NONE {
            self.set_link(parent.0, FIRST_CHILD, child.0);
        } else {
            self.set_link(last, NEXT_SIBLING, child.0);
        }
        self.set_link(parent.0, LAST_CHILD, child.0);
        let count = self.link(parent.0, CHILD_COUNT);
        self.set_link(parent.0, CHILD_COUNT, count + 1);
        self.set_link(child.0, PARENT, parent.0);
        Ok(())
    }

    /// Snapshot of a node.
    pub fn node(&self, id: NodeId) -> Option<NodeView> {
        let record = self.record(id.0)?;
        let link = |field| match get(record, field) {
            NONE => None,
            raw => Some(raw),
        };
        Some(NodeView {
            id,
            kind: NodeKind::from_u8(record[KIND])?,
            tag: get(record, TAG),
            payload: link(PAYLOAD).map(Symbol::from_raw),
            span: ByteSpan::new(get(record, SPAN_OFFSET), get(record, SPAN_LEN)),
            parent: link(PARENT).map(NodeId),
            child_count: get(record, CHILD_COUNT),
        })
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        match self.link(id.0, PARENT) {
            NONE => None,
            raw => Some(NodeId(raw)),
        }
    }

    /// Children of a node, in order. Empty for unknown ids.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            ast: self,
            next: self.link(id.0, FIRST_CHILD),
        }
    }

    /// The `index`-th child of a node.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).nth(index)
    }

    /// Nodes without a parent, in creation order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.len as u32)
            .filter(|&i| self.link(i, PARENT) == NONE)
            .map(NodeId)
    }

    /// Number of edges from `id` up to its root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.parent(p);
        }
        depth
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every node. Ids handed out earlier become invalid; the arena
    /// keeps its blocks for the next nodes.
    pub fn clear(&mut self) {
        self.arena.reset();
        self.chunks.clear();
        self.len = 0;
    }

    /// Usage of the backing arena.
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Lazily walk the subtree under `root`.
    ///
    /// The walk borrows the tree immutably and ends after visiting every node
    /// of the subtree exactly once. Call again to restart.
    pub fn traverse(&self, root: NodeId, order: Order) -> Traverse<'_> {
        let valid = root.index() < self.len;
        let frontier = match order {
            Order::DepthFirst => Frontier::Depth {
                next: if valid { root.0 } else { NONE },
            },
            Order::BreadthFirst => {
                let mut queue = VecDeque::new();
                if valid {
                    queue.push_back(root.0);
                }
                Frontier::Breadth { queue }
            }
        };
        Traverse {
            ast: self,
            root: root.0,
            frontier,
        }
    }

    /// Compare two subtrees by kind, span, payload text and shape.
    ///
    /// Tags are ignored, so a tree compares equal to its deserialized copy.
    pub fn structurally_equal(
        &self,
        root: NodeId,
        strings: &StringInterner,
        other: &Ast,
        other_root: NodeId,
        other_strings: &StringInterner,
    ) -> bool {
        let mut left = self.traverse(root, Order::DepthFirst);
        let mut right = other.traverse(other_root, Order::DepthFirst);
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) => {
                    let (Some(a), Some(b)) = (self.node(a), other.node(b)) else {
                        return false;
                    };
                    if a.kind != b.kind || a.span != b.span || a.child_count != b.child_count {
                        return false;
                    }
                    let text_a = a.payload.and_then(|s| strings.resolve(s));
                    let text_b = b.payload.and_then(|s| other_strings.resolve(s));
                    if text_a != text_b {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    fn check(&self, id: NodeId) -> Result<(), StructuralError> {
        if id.index() < self.len {
            Ok(())
        } else {
            Err(StructuralError::UnknownNode {
                id: id.0,
                len: self.len,
            })
        }
    }

    fn record(&self, id: u32) -> Option<&[u8]> {
        let index = id as usize;
        if index >= self.len {
            return None;
        }
        let bytes = self.arena.bytes(*self.chunks.get(index / NODE_CHUNK)?).ok()?;
        let at = (index % NODE_CHUNK) * NODE_RECORD_BYTES;
        bytes.get(at..at + NODE_RECORD_BYTES)
    }

    fn record_mut(&mut self, id: u32) -> Option<&mut [u8]> {
        let index = id as usize;
        if index >= self.len {
            return None;
        }
        let region = *self.chunks.get(index / NODE_CHUNK)?;
        let bytes = self.arena.bytes_mut(region).ok()?;
        let at = (index % NODE_CHUNK) * NODE_RECORD_BYTES;
        bytes.get_mut(at..at + NODE_RECORD_BYTES)
    }

    /// A u32 field of node `id`; [`NONE`] for unknown ids.
    fn link(&self, id: u32, field: usize) -> u32 {
        self.record(id).map_or(NONE, |record| get(record, field))
    }

    fn set_link(&mut self, id: u32, field: usize, value: u32) {
        if let Some(record) = self.record_mut(id) {
            put(record, field, value);
        }
    }
}

fn get(record: &[u8], field: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&record[field..field + 4]);
    u32::from_le_bytes(raw)
}

fn put(record: &mut [u8], field: usize, value: u32) {
    record[field..field + 4].copy_from_slice(&value.to_le_bytes());
}

impl Default for Ast {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Ast {
    fn clone(&self) -> Self {
        let mut copy = Self {
            arena: MemoryArena::new(*self.arena.config()),
            chunks: Vec::with_capacity(self.chunks.len()),
            len: self.len,
        };
        for &region in &self.chunks {
            let copied = self
                .arena
                .bytes(region)
                .and_then(|bytes| copy.arena.alloc_copy(bytes));
            match copied {
                Ok(region) => copy.chunks.push(region),
                Err(err) => unreachable!("uncapped node arena refused a copy: {}", err),
            }
        }
        copy
    }
}

impl fmt::Debug for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ast")
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

/// Iterator over the children of one node.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    ast: &'a Ast,
    next: u32,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.next == NONE {
            return None;
        }
        let id = self.next;
        self.next = self.ast.link(id, NEXT_SIBLING);
        Some(NodeId(id))
    }
}

#[derive(Debug, Clone)]
enum Frontier {
    Depth { next: u32 },
    Breadth { queue: VecDeque<u32> },
}

/// Lazy subtree walk returned by [`Ast::traverse`].
#[derive(Debug, Clone)]
pub struct Traverse<'a> {
    ast: &'a Ast,
    root: u32,
    frontier: Frontier,
}

impl Traverse<'_> {
    /// Pre-order successor of `current` within the subtree, using only links.
    fn pre_order_successor(&self, current: u32) -> u32 {
        let ast = self.ast;
        let first = ast.link(current, FIRST_CHILD);
        if first != NONE {
            return first;
        }
        let mut cursor = current;
        while cursor != self.root {
            let sibling = ast.link(cursor, NEXT_SIBLING);
            if sibling != NONE {
                return sibling;
            }
            cursor = ast.link(cursor, PARENT);
            if cursor == NONE {
                break;
            }
        }
        NONE
    }
}

impl Iterator for Traverse<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match &mut self.frontier {
            Frontier::Depth { next } => {
                let current = *next;
                if current == NONE {
                    return None;
                }
                let successor = self.pre_order_successor(current);
                if let Frontier::Depth { next } = &mut self.frontier {
                    *next = successor;
                }
                Some(NodeId(current))
            }
            Frontier::Breadth { queue } => {
                let current = queue.pop_front()?;
                let mut child = self.ast.link(current, FIRST_CHILD);
                while child != NONE {
                    queue.push_back(child);
                    child = self.ast.link(child, NEXT_SIBLING);
                }
                Some(NodeId(current))
            }
        }
    }
}
