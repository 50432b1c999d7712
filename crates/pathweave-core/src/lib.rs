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

//! Multi-path grammar parsing engine.
//!
//! Pathweave tokenizes and parses input under ambiguity: wherever the lexer
//! or the LR tables allow more than one continuation, the parse forks and
//! every branch advances in lock step. Branches die on dead ends, are capped
//! by score, and the survivors are resolved when input ends.
//!
//! # Modules
//!
//! - [`grammar`]: grammar definition ([`GrammarBuilder`]), terminal sets and
//!   LR(0) tables with SLR(1) lookahead
//! - [`context`]: scopes, symbol tables, embedded-language rules
//! - [`lexer`]: the multi-path step lexer and standalone token streams
//! - [`parser`]: the multi-path step parser
//! - [`session`]: parse sessions and committed trees ([`AstHandle`])
//!
//! Storage (interner, tokens, trees, binary format) lives in
//! `pathweave-memory` and is re-exported as [`memory`].
//!
//! # Features
//!
//! - `parallel`: compute admissible terminal sets with rayon
//! - `serde`: `Serialize`/`Deserialize` on options, limits and stats
//!
//! # Logging
//!
//! The engine emits `tracing` events: `debug` per parse, `trace` per step,
//! `warn` when the path cap prunes or a grammar has LR conflicts. No
//! subscriber is installed.

pub mod context;
mod error;
pub mod grammar;
pub mod lexer;
mod limits;
mod options;
pub mod parser;
pub mod session;

pub use pathweave_memory as memory;

pub use context::{ContextId, ContextSensitiveEngine, ScopeTree, SymbolInfo};
pub use error::{ContextError, Error, GrammarError, LexError, ParseError, PartialAst, Result};
pub use grammar::{Grammar, GrammarBuilder, TerminalSet};
pub use lexer::{LexerOptions, StepLexer, TokenBatch, TokenBatches};
pub use limits::Limits;
pub use options::{AmbiguityPolicy, ParseOptions, ParseOptionsBuilder};
pub use parser::{ParseStats, ParserPath, PathId, PathStatus, StepParser, StepReport};
pub use session::{deserialize, parse, serialize, AstHandle, ParseSession};
