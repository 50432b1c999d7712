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

//! Visitor-based tree walking.
//!
//! [`Ast::traverse`] yields node ids; this module layers enter/leave events
//! on top of it for consumers that need to know where subtrees end (printers,
//! symbol collectors, converters).
//!
//! # Example
//!
//! ```
//! use pathweave_memory::traverse::{walk, AstVisitor, VisitorContext};
//! use pathweave_memory::{Ast, ByteSpan, NodeKind, NodeView};
//!
//! struct Printer { out: String }
//!
//! impl AstVisitor for Printer {
//!     type Error = std::convert::Infallible;
//!
//!     fn enter_node(&mut self, node: &NodeView, ctx: &VisitorContext) -> Result<(), Self::Error> {
//!         self.out.push_str(&format!("{}{:?}\n", "  ".repeat(ctx.depth), node.kind));
//!         Ok(())
//!     }
//! }
//!
//! let mut ast = Ast::new();
//! let root = ast.new_node(NodeKind::NonTerminal, 0, None, ByteSpan::new(0, 1));
//! let leaf = ast.new_node(NodeKind::Literal, 1, None, ByteSpan::new(0, 1));
//! ast.add_child(root, leaf).unwrap();
//!
//! let mut printer = Printer { out: String::new() };
//! walk(&ast, root, &mut printer).unwrap();
//! assert_eq!(printer.out, "NonTerminal\n  Literal\n");
//! ```

use crate::ast::{Ast, NodeId, NodeKind, NodeView};

/// Context provided to visitors during a walk.
#[derive(Debug, Clone)]
pub struct VisitorContext<'a> {
    /// Distance from the walk root (0 = root).
    pub depth: usize,
    /// Ids from the walk root down to the parent of the current node.
    pub ancestors: Vec<NodeId>,
    /// The tree being walked.
    pub ast: &'a Ast,
}

impl<'a> VisitorContext<'a> {
    fn new(ast: &'a Ast) -> Self {
        Self {
            depth: 0,
            ancestors: Vec::new(),
            ast,
        }
    }

    /// Parent of the current node within the walk.
    pub fn parent(&self) -> Option<NodeId> {
        self.ancestors.last().copied()
    }
}

/// Callbacks for [`walk`].
///
/// Every method has a no-op default.
pub trait AstVisitor {
    /// Error type returned by visitor methods.
    type Error;

    /// Called before the children of `node`.
    fn enter_node(&mut self, _node: &NodeView, _ctx: &VisitorContext) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called after the children of `node`.
    fn leave_node(&mut self, _node: &NodeView, _ctx: &VisitorContext) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Walk the subtree under `root` depth-first, calling `visitor` on entry
/// and exit of every node.
///
/// The walk uses an explicit stack, so tree depth is bounded only by memory.
pub fn walk<V: AstVisitor>(ast: &Ast, root: NodeId, visitor: &mut V) -> Result<(), V::Error> {
    let Some(root_view) = ast.node(root) else {
        return Ok(());
    };
    let mut ctx = VisitorContext::new(ast);
    // (node, its children still to visit)
    let mut stack = vec![(root_view, ast.children(root))];
    visitor.enter_node(&root_view, &ctx)?;

    while let Some((view, children)) = stack.last_mut() {
        match children.next() {
            Some(child) => {
                let Some(child_view) = ast.node(child) else {
                    continue;
                };
                let parent = view.id;
                ctx.ancestors.push(parent);
                ctx.depth += 1;
                visitor.enter_node(&child_view, &ctx)?;
                stack.push((child_view, ast.children(child)));
            }
            None => {
                let view = *view;
                stack.pop();
                visitor.leave_node(&view, &ctx)?;
                if ctx.ancestors.pop().is_some() {
                    ctx.depth -= 1;
                }
            }
        }
    }
    Ok(())
}

/// Counts nodes per kind and the maximum depth.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsCollector {
    pub terminal_count: usize,
    pub non_terminal_count: usize,
    pub identifier_count: usize,
    pub literal_count: usize,
    pub max_depth: usize,
}

impl StatsCollector {
    /// Total nodes visited.
    pub fn total(&self) -> usize {
        self.terminal_count + self.non_terminal_count + self.identifier_count + self.literal_count
    }
}

impl AstVisitor for StatsCollector {
    type Error = std::convert::Infallible;

    fn enter_node(&mut self, node: &NodeView, ctx: &VisitorContext) -> Result<(), Self::Error> {
        match node.kind {
            NodeKind::Terminal => self.terminal_count += 1,
            NodeKind::NonTerminal => self.non_terminal_count += 1,
            NodeKind::Identifier => self.identifier_count += 1,
            NodeKind::Literal => self.literal_count += 1,
        }
        self.max_depth = self.max_depth.max(ctx.depth);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::ByteSpan;

    fn sample() -> (Ast, NodeId) {
        // stmt(decl(ident, lit), term)
        let mut ast = Ast::new();
        let stmt = ast.new_node(NodeKind::NonTerminal, 0, None, ByteSpan::new(0, 6));
        let decl = ast.new_node(NodeKind::NonTerminal, 1, None, ByteSpan::new(0, 5));
        let ident = ast.new_node(NodeKind::Identifier, 2, None, ByteSpan::new(0, 1));
        let lit = ast.new_node(NodeKind::Literal, 3, None, ByteSpan::new(4, 1));
        let term = ast.new_node(NodeKind::Terminal, 4, None, ByteSpan::new(5, 1));
        ast.add_child(stmt, decl).unwrap();
        ast.add_child(decl, ident).unwrap();
        ast.add_child(decl, lit).unwrap();
        ast.add_child(stmt, term).unwrap();
        (ast, stmt)
    }

    #[test]
    fn test_walk_stats() {
        let (ast, root) = sample();
        let mut stats = StatsCollector::default();
        walk(&ast, root, &mut stats).unwrap();
        assert_eq!(stats.non_terminal_count, 2);
        assert_eq!(stats.identifier_count, 1);
        assert_eq!(stats.literal_count, 1);
        assert_eq!(stats.terminal_count, 1);
        assert_eq!(stats.total(), 5);
        assert_eq!(stats.max_depth, 2);
    }

    #[test]
    fn test_walk_unknown_root() {
        let ast = Ast::new();
        let mut stats = StatsCollector::default();
        walk(&ast, NodeId::from_raw(3), &mut stats).unwrap();
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_enter_leave_nesting() {
        struct Events {
            log: Vec<String>,
        }

        impl AstVisitor for Events {
            type Error = std::convert::Infallible;

            fn enter_node(&mut self, node: &NodeView, ctx: &VisitorContext) -> Result<(), Self::Error> {
                self.log.push(format!("+{}@{}", node.tag, ctx.depth));
                Ok(())
            }

            fn leave_node(&mut self, node: &NodeView, ctx: &VisitorContext) -> Result<(), Self::Error> {
                self.log.push(format!("-{}@{}", node.tag, ctx.depth));
                Ok(())
            }
        }

        let (ast, root) = sample();
        let mut events = Events { log: Vec::new() };
        walk(&ast, root, &mut events).unwrap();
        assert_eq!(
            events.log,
            vec!["+0@0", "+1@1", "+2@2", "-2@2", "+3@2", "-3@2", "-1@1", "+4@1", "-4@1", "-0@0"]
        );
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        struct StopAtLiteral {
            seen: usize,
        }

        impl AstVisitor for StopAtLiteral {
            type Error = String;

            fn enter_node(&mut self, node: &NodeView, _ctx: &VisitorContext) -> Result<(), Self::Error> {
                self.seen += 1;
                if node.kind == NodeKind::Literal {
                    return Err("literal".to_string());
                }
                Ok(())
            }
        }

        let (ast, root) = sample();
        let mut visitor = StopAtLiteral { seen: 0 };
        assert_eq!(walk(&ast, root, &mut visitor), Err("literal".to_string()));
        assert_eq!(visitor.seen, 4);
    }

    #[test]
    fn test_context_parent() {
        struct Parents {
            pairs: Vec<(u32, Option<u32>)>,
        }

        impl AstVisitor for Parents {
            type Error = std::convert::Infallible;

            fn enter_node(&mut self, node: &NodeView, ctx: &VisitorContext) -> Result<(), Self::Error> {
                self.pairs.push((node.tag, ctx.parent().map(|p| p.as_u32())));
                Ok(())
            }
        }

        let (ast, root) = sample();
        let mut visitor = Parents { pairs: Vec::new() };
        walk(&ast, root, &mut visitor).unwrap();
        assert_eq!(visitor.pairs[0], (0, None));
        assert_eq!(visitor.pairs[2], (2, Some(1)));
    }
}
