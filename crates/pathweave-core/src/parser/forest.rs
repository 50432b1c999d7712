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

//! Scratch forest of partial trees.
//!
//! Every leaf and reduction of every path lands here; paths refer to trees by
//! [`ForestRef`] and share subtrees freely. Only the winning path's tree is
//! copied into an [`Ast`].
//!
//! Trees only pruned paths could reach are released by [`Forest::collect`]:
//! their slots go on a free list and are handed out again by later
//! allocations, so the node limit bounds live nodes only.

use pathweave_memory::{Ast, ByteSpan, NodeId, NodeKind, StringInterner, StructuralError, Symbol};

use crate::error::ParseError;
use crate::grammar::{AstShape, NonTerminalId, Production, TerminalId};

/// Reference to a forest node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ForestRef(u32);

impl ForestRef {
    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct ForestNode {
    kind: NodeKind,
    tag: u32,
    payload: Option<Symbol>,
    span: ByteSpan,
    first: u32,
    count: u32,
    /// Leaf of a hidden terminal; left out of `Node`/`List`/`Operator` children.
    hidden: bool,
    /// Set on nodes built by a `List` production, for flattening.
    list_of: Option<NonTerminalId>,
    /// Slot is on the free list.
    released: bool,
}

#[derive(Debug)]
pub(crate) struct Forest {
    nodes: Vec<ForestNode>,
    children: Vec<ForestRef>,
    free: Vec<u32>,
    released: usize,
    max_nodes: usize,
}

impl Forest {
    pub(crate) fn new(max_nodes: usize) -> Self {
        Self {
            nodes: Vec::new(),
            children: Vec::new(),
            free: Vec::new(),
            released: 0,
            max_nodes,
        }
    }

    /// Leaf for one token.
    pub(crate) fn leaf(
        &mut self,
        kind: NodeKind,
        terminal: TerminalId,
        payload: Option<Symbol>,
        span: ByteSpan,
        hidden: bool,
    ) -> Result<ForestRef, ParseError> {
        self.alloc(ForestNode {
            kind,
            tag: u32::from(terminal.0),
            payload,
            span,
            first: 0,
            count: 0,
            hidden,
            list_of: None,
            released: false,
        })
    }

    /// Tree for reducing `production` over `kids`.
    ///
    /// `name` is the interned rule name used as payload of `Node` and `List`
    /// nodes; `at` positions the empty span of an epsilon reduction.
    pub(crate) fn reduce(
        &mut self,
        production: &Production,
        kids: &[ForestRef],
        name: Symbol,
        at: u32,
    ) -> Result<ForestRef, ParseError> {
        let span = kids
            .iter()
            .map(|&k| self.nodes[k.index()].span)
            .reduce(ByteSpan::cover)
            .unwrap_or(ByteSpan::point(at));
        let tag = production.id.0;
        let first = self.children.len() as u32;

        let (payload, list_of) = match production.shape {
            AstShape::Passthrough(i) if i < kids.len() => return Ok(kids[i]),
            AstShape::Operator(i) if i < kids.len() => {
                let payload = self.nodes[kids[i].index()].payload;
                for (j, &k) in kids.iter().enumerate() {
                    if j != i && !self.nodes[k.index()].hidden {
                        self.children.push(k);
                    }
                }
                (payload, None)
            }
            AstShape::List => {
                for (j, &k) in kids.iter().enumerate() {
                    let node = &self.nodes[k.index()];
                    if j == 0 && node.list_of == Some(production.lhs) {
                        let (start, end) = (node.first as usize, (node.first + node.count) as usize);
                        self.children.extend_from_within(start..end);
                    } else if !node.hidden {
                        self.children.push(k);
                    }
                }
                (Some(name), Some(production.lhs))
            }
            _ => {
                self.children
                    .extend(kids.iter().copied().filter(|k| !self.nodes[k.index()].hidden));
                (Some(name), None)
            }
        };
        let count = self.children.len() as u32 - first;
        self.alloc(ForestNode {
            kind: NodeKind::NonTerminal,
            tag,
            payload,
            span,
            first,
            count,
            hidden: false,
            list_of,
            released: false,
        })
    }

    pub(crate) fn kind(&self, r: ForestRef) -> NodeKind {
        self.nodes[r.index()].kind
    }

    pub(crate) fn payload(&self, r: ForestRef) -> Option<Symbol> {
        self.nodes[r.index()].payload
    }

    pub(crate) fn span(&self, r: ForestRef) -> ByteSpan {
        self.nodes[r.index()].span
    }

    pub(crate) fn children(&self, r: ForestRef) -> &[ForestRef] {
        let node = &self.nodes[r.index()];
        &self.children[node.first as usize..(node.first + node.count) as usize]
    }

    /// Name carried by a subtree: the payload of a leaf, or of the leftmost
    /// identifier leaf below a branch.
    pub(crate) fn name_of(&self, r: ForestRef) -> Option<(Symbol, ByteSpan)> {
        if self.kind(r).is_leaf_kind() {
            return self.payload(r).map(|s| (s, self.span(r)));
        }
        let mut work = vec![r];
        while let Some(at) = work.pop() {
            if self.kind(at) == NodeKind::Identifier {
                if let Some(sym) = self.payload(at) {
                    return Some((sym, self.span(at)));
                }
            }
            work.extend(self.children(at).iter().rev());
        }
        None
    }

    /// Live nodes.
    pub(crate) fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Nodes released by collections so far.
    pub(crate) fn released(&self) -> usize {
        self.released
    }

    pub(crate) fn is_live(&self, r: ForestRef) -> bool {
        self.nodes.get(r.index()).is_some_and(|n| !n.released)
    }

    /// Release every node not reachable from `roots` and compact the child
    /// lists of the rest. Refs to released nodes must not be used again.
    ///
    /// Returns the number of nodes released.
    pub(crate) fn collect(&mut self, roots: &[ForestRef]) -> usize {
        let mut marked = vec![false; self.nodes.len()];
        let mut work = roots.to_vec();
        while let Some(r) = work.pop() {
            if std::mem::replace(&mut marked[r.index()], true) {
                continue;
            }
            work.extend_from_slice(self.children(r));
        }

        let Self {
            nodes, children, free, ..
        } = self;
        let mut kept = Vec::with_capacity(children.len());
        let mut released = 0;
        for (i, node) in nodes.iter_mut().enumerate() {
            if marked[i] {
                let (start, end) = (node.first as usize, (node.first + node.count) as usize);
                node.first = kept.len() as u32;
                kept.extend_from_slice(&children[start..end]);
            } else if !node.released {
                node.released = true;
                node.first = 0;
                node.count = 0;
                node.list_of = None;
                free.push(i as u32);
                released += 1;
            }
        }
        *children = kept;
        self.released += released;
        released
    }

    /// Copy the tree under `root` into `ast`, re-interning payloads from
    /// `src` into `dst`.
    pub(crate) fn materialize(
        &self,
        root: ForestRef,
        src: &StringInterner,
        ast: &mut Ast,
        dst: &mut StringInterner,
    ) -> Result<NodeId, StructuralError> {
        let top = self.copy_node(root, src, ast, dst);
        let mut work: Vec<(ForestRef, NodeId)> = self.children(root).iter().rev().map(|&c| (c, top)).collect();
        while let Some((r, parent)) = work.pop() {
            let id = self.copy_node(r, src, ast, dst);
            ast.add_child(parent, id)?;
            work.extend(self.children(r).iter().rev().map(|&c| (c, id)));
        }
        Ok(top)
    }

    fn copy_node(&self, r: ForestRef, src: &StringInterner, ast: &mut Ast, dst: &mut StringInterner) -> NodeId {
        let node = &self.nodes[r.index()];
        let payload = node.payload.and_then(|s| src.resolve(s)).map(|text| dst.intern(text));
        ast.new_node(node.kind, node.tag, payload, node.span)
    }

    fn alloc(&mut self, node: ForestNode) -> Result<ForestRef, ParseError> {
        let live = self.len();
        if live >= self.max_nodes {
            return Err(ParseError::limit("node", live + 1, self.max_nodes));
        }
        if let Some(slot) = self.free.pop() {
            self.nodes[slot as usize] = node;
            return Ok(ForestRef(slot));
        }
        let id = ForestRef(self.nodes.len() as u32);
        self.nodes.push(node);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{ProductionCondition, ProductionId};
    use smallvec::SmallVec;

    fn production(shape: AstShape) -> Production {
        Production {
            id: ProductionId(7),
            lhs: NonTerminalId(1),
            rhs: Vec::new(),
            shape,
            condition: ProductionCondition::Always,
            actions: SmallVec::new(),
        }
    }

    struct Fixture {
        forest: Forest,
        strings: StringInterner,
        name: Symbol,
    }

    impl Fixture {
        fn new() -> Self {
            let mut strings = StringInterner::new();
            let name = strings.intern("expr");
            Self {
                forest: Forest::new(usize::MAX),
                strings,
                name,
            }
        }

        fn leaf(&mut self, text: &str, offset: u32, hidden: bool) -> ForestRef {
            let sym = self.strings.intern(text);
            let span = ByteSpan::new(offset, text.len() as u32);
            self.forest
                .leaf(NodeKind::Terminal, TerminalId(0), Some(sym), span, hidden)
                .unwrap()
        }

        fn text(&self, r: ForestRef) -> &str {
            self.forest
                .payload(r)
                .and_then(|s| self.strings.resolve(s))
                .unwrap_or("")
        }
    }

    // ==================== Shape tests ====================

    #[test]
    fn test_node_skips_hidden() {
        let mut fx = Fixture::new();
        let open = fx.leaf("(", 0, true);
        let x = fx.leaf("x", 1, false);
        let close = fx.leaf(")", 2, true);
        let node = fx
            .forest
            .reduce(&production(AstShape::Node), &[open, x, close], fx.name, 0)
            .unwrap();
        assert_eq!(fx.forest.children(node), &[x]);
        assert_eq!(fx.forest.span(node), ByteSpan::new(0, 3));
        assert_eq!(fx.text(node), "expr");
    }

    #[test]
    fn test_passthrough() {
        let mut fx = Fixture::new();
        let open = fx.leaf("(", 0, true);
        let x = fx.leaf("x", 1, false);
        let before = fx.forest.len();
        let out = fx
            .forest
            .reduce(&production(AstShape::Passthrough(1)), &[open, x], fx.name, 0)
            .unwrap();
        assert_eq!(out, x);
        assert_eq!(fx.forest.len(), before);
    }

    #[test]
    fn test_operator() {
        let mut fx = Fixture::new();
        let a = fx.leaf("2", 0, false);
        let plus = fx.leaf("+", 1, false);
        let b = fx.leaf("3", 2, false);
        let node = fx
            .forest
            .reduce(&production(AstShape::Operator(1)), &[a, plus, b], fx.name, 0)
            .unwrap();
        assert_eq!(fx.text(node), "+");
        assert_eq!(fx.forest.children(node), &[a, b]);
        assert_eq!(fx.forest.kind(node), NodeKind::NonTerminal);
    }

    #[test]
    fn test_list_flattens_left_recursion() {
        let mut fx = Fixture::new();
        let list = production(AstShape::List);
        let a = fx.leaf("a", 0, false);
        let comma = fx.leaf(",", 1, true);
        let b = fx.leaf("b", 2, false);
        let c = fx.leaf("c", 4, false);
        let first = fx.forest.reduce(&list, &[a], fx.name, 0).unwrap();
        let second = fx.forest.reduce(&list, &[first, comma, b], fx.name, 0).unwrap();
        let third = fx.forest.reduce(&list, &[second, comma, c], fx.name, 0).unwrap();
        assert_eq!(fx.forest.children(third), &[a, b, c]);
        assert_eq!(fx.forest.span(third), ByteSpan::new(0, 5));
    }

    #[test]
    fn test_epsilon_reduction_gets_point_span() {
        let mut fx = Fixture::new();
        let node = fx.forest.reduce(&production(AstShape::Node), &[], fx.name, 9).unwrap();
        assert_eq!(fx.forest.span(node), ByteSpan::point(9));
        assert!(fx.forest.children(node).is_empty());
    }

    #[test]
    fn test_node_limit() {
        let mut forest = Forest::new(1);
        let span = ByteSpan::new(0, 1);
        forest.leaf(NodeKind::Terminal, TerminalId(0), None, span, false).unwrap();
        let err = forest
            .leaf(NodeKind::Terminal, TerminalId(0), None, span, false)
            .unwrap_err();
        assert!(matches!(err, ParseError::LimitExceeded { limit: "node", actual: 2, max: 1 }));
    }

    // ==================== Collection tests ====================

    #[test]
    fn test_collect_releases_unreachable() {
        let mut fx = Fixture::new();
        let a = fx.leaf("a", 0, false);
        let b = fx.leaf("b", 1, false);
        let dead = fx.forest.reduce(&production(AstShape::Node), &[b], fx.name, 0).unwrap();
        let live = fx.forest.reduce(&production(AstShape::Node), &[a], fx.name, 0).unwrap();
        assert_eq!(fx.forest.len(), 4);

        assert_eq!(fx.forest.collect(&[live]), 2);
        assert_eq!(fx.forest.len(), 2);
        assert_eq!(fx.forest.released(), 2);
        assert!(fx.forest.is_live(a));
        assert!(!fx.forest.is_live(b));
        assert!(!fx.forest.is_live(dead));
        // Child lists of survivors are compacted, not lost.
        assert_eq!(fx.forest.children(live), &[a]);
        assert_eq!(fx.text(live), "expr");

        // A second collection with the same roots releases nothing.
        assert_eq!(fx.forest.collect(&[live]), 0);
        assert_eq!(fx.forest.released(), 2);
    }

    #[test]
    fn test_released_slots_are_reused() {
        let mut fx = Fixture::new();
        let a = fx.leaf("a", 0, false);
        let b = fx.leaf("b", 1, false);
        fx.forest.collect(&[a]);
        let c = fx.leaf("c", 2, false);
        assert_eq!(c, b);
        assert!(fx.forest.is_live(c));
        assert_eq!(fx.text(c), "c");
        assert_eq!(fx.forest.len(), 2);
    }

    #[test]
    fn test_node_limit_counts_live_nodes() {
        let mut forest = Forest::new(2);
        let span = ByteSpan::new(0, 1);
        let keep = forest.leaf(NodeKind::Terminal, TerminalId(0), None, span, false).unwrap();
        forest.leaf(NodeKind::Terminal, TerminalId(0), None, span, false).unwrap();
        assert!(forest.leaf(NodeKind::Terminal, TerminalId(0), None, span, false).is_err());
        forest.collect(&[keep]);
        assert!(forest.leaf(NodeKind::Terminal, TerminalId(0), None, span, false).is_ok());
    }

    #[test]
    fn test_collect_keeps_shared_list_children() {
        let mut fx = Fixture::new();
        let list = production(AstShape::List);
        let a = fx.leaf("a", 0, false);
        let b = fx.leaf("b", 1, false);
        let c = fx.leaf("c", 2, false);
        let first = fx.forest.reduce(&list, &[a], fx.name, 0).unwrap();
        let left = fx.forest.reduce(&list, &[first, b], fx.name, 0).unwrap();
        let right = fx.forest.reduce(&list, &[first, c], fx.name, 0).unwrap();
        fx.forest.collect(&[right, first]);
        assert!(!fx.forest.is_live(left));
        assert!(!fx.forest.is_live(b));
        assert_eq!(fx.forest.children(right), &[a, c]);
        assert_eq!(fx.forest.children(first), &[a]);
        let d = fx.leaf("d", 3, false);
        let extended = fx.forest.reduce(&list, &[first, d], fx.name, 0).unwrap();
        assert_eq!(fx.forest.children(extended), &[a, d]);
    }

    // ==================== Name tests ====================

    #[test]
    fn test_name_of_finds_leftmost_identifier() {
        let mut fx = Fixture::new();
        let star = fx.leaf("*", 0, false);
        let sym = fx.strings.intern("p");
        let ident = fx
            .forest
            .leaf(NodeKind::Identifier, TerminalId(1), Some(sym), ByteSpan::new(1, 1), false)
            .unwrap();
        let node = fx
            .forest
            .reduce(&production(AstShape::Node), &[star, ident], fx.name, 0)
            .unwrap();
        assert_eq!(fx.forest.name_of(node), Some((sym, ByteSpan::new(1, 1))));
        assert_eq!(fx.forest.name_of(ident), Some((sym, ByteSpan::new(1, 1))));
    }

    // ==================== Materialize tests ====================

    #[test]
    fn test_materialize_copies_subtree() {
        let mut fx = Fixture::new();
        let a = fx.leaf("2", 0, false);
        let plus = fx.leaf("+", 1, false);
        let b = fx.leaf("3", 2, false);
        let node = fx
            .forest
            .reduce(&production(AstShape::Operator(1)), &[a, plus, b], fx.name, 0)
            .unwrap();

        let mut ast = Ast::new();
        let mut dst = StringInterner::new();
        let root = fx.forest.materialize(node, &fx.strings, &mut ast, &mut dst).unwrap();
        assert_eq!(ast.len(), 3);
        let kids: Vec<_> = ast.children(root).collect();
        assert_eq!(kids.len(), 2);
        let text = |id: NodeId| ast.node(id).and_then(|n| n.payload).and_then(|s| dst.resolve(s));
        assert_eq!(text(root), Some("+"));
        assert_eq!(text(kids[0]), Some("2"));
        assert_eq!(text(kids[1]), Some("3"));
        assert_eq!(dst.len(), 3);
        assert_eq!(ast.node(root).unwrap().tag, 7);
    }
}
