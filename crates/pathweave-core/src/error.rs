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

//! Error types for grammar construction, lexing, context tracking and parsing.
//!
//! Every family is a separate enum so callers can match on the layer that
//! failed; [`Error`] aggregates them (including the memory-substrate errors)
//! for APIs that can fail in more than one layer.

use std::fmt;

use pathweave_memory::{Ast, IntegrityError, NodeId, ResourceError, SourcePos, StringInterner, StructuralError};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Any error the parsing engine can produce.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl Error {
    /// Source position of the failure, if the error has one.
    pub fn position(&self) -> Option<SourcePos> {
        match self {
            Error::Lex(e) => Some(e.position()),
            Error::Parse(e) => e.position(),
            Error::Context(e) => e.position(),
            _ => None,
        }
    }

    /// Whether the input (rather than the grammar or a resource) was at fault.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::Lex(_) | Error::Context(_))
            || matches!(self, Error::Parse(e) if !e.is_limit())
    }
}

// ==================== Grammar errors ====================

/// Grammar validation failures reported by `GrammarBuilder::build`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    /// No start symbol was set.
    #[error("grammar has no start symbol")]
    MissingStart,

    /// The start symbol has no productions.
    #[error("start symbol '{name}' is not defined by any rule")]
    UndefinedStart { name: String },

    /// A name is declared twice, or used both as terminal and non-terminal.
    #[error("symbol '{name}' is declared more than once")]
    DuplicateSymbol { name: String },

    /// A rule refers to a symbol that is neither a terminal nor a rule.
    #[error("rule '{rule}' refers to undefined symbol '{name}'")]
    UndefinedSymbol { name: String, rule: String },

    /// A terminal regex failed to compile.
    #[error("terminal '{name}' has an invalid pattern: {message}")]
    InvalidPattern { name: String, message: String },

    /// A literal or keyword terminal with empty text.
    #[error("terminal '{name}' matches the empty string")]
    EmptyPattern { name: String },

    /// A non-terminal that can never derive a terminal string.
    #[error("non-terminal '{name}' is unproductive (derives no finite string)")]
    Unproductive { name: String },

    /// An AST shape names a child the production does not have.
    #[error("rule '{rule}' shape refers to child {index}, but the rule has {len} symbols")]
    InvalidShape { rule: String, index: usize, len: usize },

    /// A semantic action names a child the production does not have.
    #[error("rule '{rule}' action refers to child {index}, but the rule has {len} symbols")]
    InvalidAction { rule: String, index: usize, len: usize },

    /// More symbols than the 16-bit id space holds.
    #[error("grammar declares {count} {what}, maximum is {max}")]
    TooManySymbols { what: &'static str, count: usize, max: usize },
}

// ==================== Lexical errors ====================

/// Tokenization failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    /// Every lexer path died before the input was exhausted.
    #[error("line {line}, column {column}: no viable token at offset {offset} (tried: {})", join(.attempted))]
    NoViablePath {
        offset: usize,
        line: u32,
        column: u32,
        attempted: Vec<String>,
    },
}

impl LexError {
    pub fn position(&self) -> SourcePos {
        match self {
            LexError::NoViablePath { line, column, .. } => SourcePos::new(*line, *column),
        }
    }

    pub fn offset(&self) -> usize {
        match self {
            LexError::NoViablePath { offset, .. } => *offset,
        }
    }
}

// ==================== Context errors ====================

/// Symbol table and scope failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// A name resolved in no enclosing scope.
    #[error("{}undefined symbol '{name}'", at(.pos))]
    UndefinedSymbol { name: String, pos: Option<SourcePos> },

    /// A name exists outside an isolated scope but is not on its allow-list.
    #[error("{}symbol '{name}' is not visible from embedded language '{language}'", at(.pos))]
    ScopeViolation {
        name: String,
        language: String,
        pos: Option<SourcePos>,
    },

    /// A scope close with no open scope to close.
    #[error("{}scope closed at top level", at(.pos))]
    UnbalancedScope { pos: Option<SourcePos> },

    /// Scope nesting beyond `Limits::max_scope_depth`.
    #[error("{}scope depth {depth} exceeds maximum {max}", at(.pos))]
    ScopeTooDeep {
        depth: usize,
        max: usize,
        pos: Option<SourcePos>,
    },

    /// A context id that does not belong to the scope tree.
    #[error("unknown context #{id}")]
    UnknownContext { id: u32 },
}

impl ContextError {
    pub fn position(&self) -> Option<SourcePos> {
        match self {
            ContextError::UndefinedSymbol { pos, .. }
            | ContextError::ScopeViolation { pos, .. }
            | ContextError::UnbalancedScope { pos }
            | ContextError::ScopeTooDeep { pos, .. } => *pos,
            ContextError::UnknownContext { .. } => None,
        }
    }

    /// Attach a source position if none is set yet.
    pub fn with_pos(mut self, at: SourcePos) -> Self {
        match &mut self {
            ContextError::UndefinedSymbol { pos, .. }
            | ContextError::ScopeViolation { pos, .. }
            | ContextError::UnbalancedScope { pos }
            | ContextError::ScopeTooDeep { pos, .. } => {
                pos.get_or_insert(at);
            }
            ContextError::UnknownContext { .. } => {}
        }
        self
    }
}

// ==================== Parse errors ====================

/// The parse trees of the highest-scoring failed path.
///
/// One root per symbol on the path's stack, left to right.
#[derive(Debug, Clone)]
pub struct PartialAst {
    pub ast: Ast,
    pub strings: StringInterner,
    pub roots: Vec<NodeId>,
}

/// Parse failures.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Every parser path died.
    #[error("line {}, column {}: unexpected {found}, expected one of: {}", .pos.line(), .pos.column(), join(.expected))]
    NoViableParse {
        offset: usize,
        pos: SourcePos,
        expected: Vec<String>,
        found: String,
        partial: Option<Box<PartialAst>>,
    },

    /// More than one path accepted under `AmbiguityPolicy::Report`.
    #[error("input is ambiguous: {count} parses accepted")]
    UnresolvedAmbiguity { count: usize, scores: Vec<i64> },

    /// A configured resource limit was hit.
    #[error("{limit} limit exceeded: {actual} > {max}")]
    LimitExceeded {
        limit: &'static str,
        actual: usize,
        max: usize,
    },
}

impl ParseError {
    pub fn position(&self) -> Option<SourcePos> {
        match self {
            ParseError::NoViableParse { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    pub fn is_limit(&self) -> bool {
        matches!(self, ParseError::LimitExceeded { .. })
    }

    pub fn is_ambiguity(&self) -> bool {
        matches!(self, ParseError::UnresolvedAmbiguity { .. })
    }

    pub(crate) fn limit(limit: &'static str, actual: usize, max: usize) -> Self {
        ParseError::LimitExceeded { limit, actual, max }
    }
}

fn join(items: &[String]) -> String {
    if items.is_empty() {
        "nothing".to_string()
    } else {
        items.join(", ")
    }
}

fn at(pos: &Option<SourcePos>) -> Prefix {
    Prefix(*pos)
}

struct Prefix(Option<SourcePos>);

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pos) => write!(f, "line {}, column {}: ", pos.line(), pos.column()),
            None => Ok(()),
        }
    }
}
