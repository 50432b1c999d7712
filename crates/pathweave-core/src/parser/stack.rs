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

//! Persistent LR stack shared by all parser paths.
//!
//! Nodes are never mutated or freed during a parse. A path's stack is a
//! reference to its top node; pushing creates a node pointing at the old top,
//! so forks share everything below the fork point.

use rustc_hash::FxHashSet;

use super::forest::ForestRef;
use crate::grammar::StateId;

const NO_PARENT: u32 = u32::MAX;

/// Reference to a stack node (the top of some path's stack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackRef(u32);

impl StackRef {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
struct StackNode {
    state: StateId,
    /// Tree for the symbol that led to `state`; `None` at the bottom.
    node: Option<ForestRef>,
    prev: u32,
    depth: u32,
}

#[derive(Debug, Default)]
pub(crate) struct GraphStack {
    nodes: Vec<StackNode>,
}

impl GraphStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bottom node in `state`.
    pub(crate) fn base(&mut self, state: StateId) -> StackRef {
        self.alloc(StackNode {
            state,
            node: None,
            prev: NO_PARENT,
            depth: 0,
        })
    }

    pub(crate) fn push(&mut self, below: StackRef, state: StateId, node: ForestRef) -> StackRef {
        let depth = self.nodes[below.index()].depth + 1;
        self.alloc(StackNode {
            state,
            node: Some(node),
            prev: below.0,
            depth,
        })
    }

    /// Pop `count` symbols off `top`, appending their trees to `out` left to
    /// right. Returns the new top, or `None` if the stack is too short.
    pub(crate) fn pop(&self, top: StackRef, count: usize, out: &mut Vec<ForestRef>) -> Option<StackRef> {
        let start = out.len();
        let mut at = top;
        for _ in 0..count {
            let Some(tree) = self.nodes.get(at.index()).and_then(|n| n.node) else {
                out.truncate(start);
                return None;
            };
            out.push(tree);
            at = StackRef(self.nodes[at.index()].prev);
        }
        out[start..].reverse();
        Some(at)
    }

    pub(crate) fn state(&self, top: StackRef) -> StateId {
        self.nodes[top.index()].state
    }

    pub(crate) fn node(&self, top: StackRef) -> Option<ForestRef> {
        self.nodes[top.index()].node
    }

    /// Node under `top`; `None` at the bottom.
    pub(crate) fn below(&self, top: StackRef) -> Option<StackRef> {
        let prev = self.nodes[top.index()].prev;
        (prev != NO_PARENT).then_some(StackRef(prev))
    }

    /// Number of symbols on the stack.
    pub(crate) fn depth(&self, top: StackRef) -> usize {
        self.nodes[top.index()].depth as usize
    }

    /// Trees of every symbol on the stack, bottom to top.
    pub(crate) fn spine(&self, top: StackRef) -> Vec<ForestRef> {
        let mut out = Vec::with_capacity(self.depth(top));
        let mut at = Some(top);
        while let Some(r) = at {
            let node = &self.nodes[r.index()];
            out.extend(node.node);
            at = (node.prev != NO_PARENT).then_some(StackRef(node.prev));
        }
        out.reverse();
        out
    }

    /// Trees on every stack in `tops`; shared stack nodes are visited once.
    pub(crate) fn trees(&self, tops: impl IntoIterator<Item = StackRef>) -> Vec<ForestRef> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for top in tops {
            let mut at = top.0;
            while at != NO_PARENT && seen.insert(at) {
                let node = &self.nodes[at as usize];
                out.extend(node.node);
                at = node.prev;
            }
        }
        out
    }

    /// Nodes allocated so far.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, node: StackNode) -> StackRef {
        let id = StackRef(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }
}
