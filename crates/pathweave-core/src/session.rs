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

//! Parse sessions and committed trees.
//!
//! A [`ParseSession`] threads one grammar, one string interner and one set of
//! options through any number of parses. Nothing is cached globally; two
//! sessions over the same `Arc<Grammar>` are independent.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pathweave_core::grammar::{AstShape, GrammarBuilder};
//! use pathweave_core::ParseSession;
//!
//! let mut b = GrammarBuilder::new();
//! b.pattern("N", "[0-9]+");
//! b.literal("PLUS", "+");
//! b.rule("sum", &["sum", "PLUS", "N"]).shape(AstShape::Operator(1));
//! b.rule("sum", &["N"]).shape(AstShape::Passthrough(0));
//! b.start("sum");
//! let grammar = Arc::new(b.build().unwrap());
//!
//! let mut session = ParseSession::new(grammar);
//! let tree = session.parse("1+2").unwrap();
//! assert_eq!(tree.text(tree.root()), Some("+"));
//!
//! let bytes = session.serialize(&tree);
//! let back = session.deserialize(&bytes).unwrap();
//! assert!(tree.structurally_equal(&back));
//! ```

use std::sync::Arc;

use pathweave_memory::{Ast, IntegrityError, NodeId, StringInterner, ZeroCopySerializer};

use crate::context::{ContextId, ContextSensitiveEngine, ScopeTree};
use crate::error::{ParseError, Result};
use crate::grammar::{Grammar, TerminalSet};
use crate::lexer::{StepLexer, TokenBatches};
use crate::options::ParseOptions;
use crate::parser::{ParseStats, StepParser};

/// A committed parse tree with its own compact string table.
#[derive(Debug, Clone)]
pub struct AstHandle {
    ast: Ast,
    strings: StringInterner,
    root: NodeId,
    stats: ParseStats,
}

impl AstHandle {
    pub(crate) fn new(ast: Ast, strings: StringInterner, root: NodeId, stats: ParseStats) -> Self {
        Self {
            ast,
            strings,
            root,
            stats,
        }
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn strings(&self) -> &StringInterner {
        &self.strings
    }

    /// Payload text of `node` (operator, identifier, literal or rule name).
    pub fn text(&self, node: NodeId) -> Option<&str> {
        let sym = self.ast.node(node)?.payload?;
        self.strings.resolve(sym)
    }

    /// Counters of the parse that produced this tree. Zeroed for decoded
    /// trees.
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Same kinds, topology, payload text and spans.
    pub fn structurally_equal(&self, other: &AstHandle) -> bool {
        self.ast
            .structurally_equal(self.root, &self.strings, &other.ast, other.root, &other.strings)
    }

    /// Encode into a checksummed frame.
    pub fn serialize(&self) -> Vec<u8> {
        ZeroCopySerializer::new()
            .serialize_ast(&self.ast, self.root, &self.strings)
            .to_vec()
    }

    /// Decode a frame written by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// `IntegrityError` for a damaged or foreign payload, or one without a
    /// tree.
    pub fn deserialize(bytes: &[u8]) -> Result<AstHandle> {
        let decoded = ZeroCopySerializer::new().deserialize_ast(bytes)?;
        let root = decoded
            .root
            .ok_or_else(|| IntegrityError::Malformed("payload holds no tree".to_string()))?;
        Ok(AstHandle::new(decoded.ast, decoded.strings, root, ParseStats::default()))
    }
}

/// Grammar, interner and options for a series of parses.
#[derive(Debug)]
pub struct ParseSession {
    grammar: Arc<Grammar>,
    strings: StringInterner,
    options: ParseOptions,
    serializer: ZeroCopySerializer,
}

impl ParseSession {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self::with_options(grammar, ParseOptions::default())
    }

    pub fn with_options(grammar: Arc<Grammar>, options: ParseOptions) -> Self {
        Self {
            grammar,
            strings: StringInterner::new(),
            options,
            serializer: ZeroCopySerializer::new(),
        }
    }

    pub fn grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: ParseOptions) {
        self.options = options;
    }

    /// Interner shared by every parse of this session.
    pub fn strings(&self) -> &StringInterner {
        &self.strings
    }

    pub fn engine(&self) -> ContextSensitiveEngine<'_> {
        ContextSensitiveEngine::new(&self.grammar).with_max_scope_depth(self.options.limits.max_scope_depth)
    }

    /// Terminals admissible in `context` of `scopes`.
    pub fn valid_terminals(&self, scopes: &ScopeTree, context: ContextId) -> TerminalSet {
        self.engine().valid_terminals(scopes, context)
    }

    /// A step parser over `source`, for callers that drive steps themselves.
    pub fn parser<'s>(&'s mut self, source: &'s str) -> Result<StepParser<'s>> {
        StepParser::new(&self.grammar, source, &mut self.strings, self.options.clone())
    }

    /// Parse `source` to completion.
    pub fn parse(&mut self, source: &str) -> Result<AstHandle> {
        self.parser(source)?.finish()
    }

    /// Lex `source` without parsing, every terminal admissible everywhere.
    ///
    /// # Errors
    ///
    /// `ParseError::LimitExceeded` if the source is larger than
    /// `Limits::max_source_size`.
    pub fn tokenize<'s>(&'s mut self, source: &'s str) -> Result<TokenBatches<'s>> {
        let limits = &self.options.limits;
        if source.len() > limits.max_source_size {
            return Err(ParseError::limit("source size", source.len(), limits.max_source_size).into());
        }
        let lexer = StepLexer::new(&self.grammar, source, &mut self.strings, self.options.lexer)
            .with_max_tokens(limits.max_tokens);
        Ok(TokenBatches::new(lexer))
    }

    /// Encode `handle`, reusing this session's scratch buffers.
    pub fn serialize(&mut self, handle: &AstHandle) -> Vec<u8> {
        self.serializer
            .serialize_ast(&handle.ast, handle.root, &handle.strings)
            .to_vec()
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<AstHandle> {
        AstHandle::deserialize(bytes)
    }
}

/// Parse `source` with default options.
pub fn parse(grammar: &Arc<Grammar>, source: &str) -> Result<AstHandle> {
    ParseSession::new(Arc::clone(grammar)).parse(source)
}

/// Encode a committed tree.
pub fn serialize(handle: &AstHandle) -> Vec<u8> {
    handle.serialize()
}

/// Decode a tree written by [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Result<AstHandle> {
    AstHandle::deserialize(bytes)
}
