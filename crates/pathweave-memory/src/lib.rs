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

//! Memory substrate for the Pathweave parsing engine.
//!
//! Building blocks shared by the lexer and parser:
//!
//! - [`MemoryArena`] - bump allocation from large blocks, bulk reset
//! - [`StepScratch`] - per-step scratch collections
//! - [`StringInterner`] - string deduplication with dense [`Symbol`] ids
//! - [`ObjectPool`] - reuse of frequently created objects
//! - [`AlignedToken`] / [`TokenArray`] - compact token storage
//! - [`Ast`] - index-based syntax trees
//! - [`ZeroCopySerializer`] - CRC-protected binary format

pub mod arena;
pub mod ast;
pub mod error;
pub mod interner;
pub mod pool;
pub mod scratch;
pub mod serialize;
pub mod span;
pub mod token;
pub mod traverse;

pub use arena::{Alignment, ArenaConfig, ArenaStats, MemoryArena, Region};
pub use ast::{Ast, Children, NodeId, NodeKind, NodeView, Order, Traverse, NODE_CHUNK, NODE_RECORD_BYTES};
pub use error::{IntegrityError, ResourceError, StructuralError};
pub use interner::{InternerStats, StringInterner, Symbol};
pub use pool::{ObjectPool, PoolConfig, PoolStats, Pooled, Reusable, SyncObjectPool};
pub use scratch::StepScratch;
pub use serialize::{
    payload_flags, ArchivedAst, ArchivedNode, DecodedAst, DecodedTokens, ZeroCopySerializer,
};
pub use span::{ByteSpan, LineIndex, SourcePos};
pub use token::{AlignedToken, TokenArray, TokenKind, TokenPayload, TOKEN_CHUNK, TOKEN_STORAGE_BYTES};
pub use traverse::{walk, AstVisitor, StatsCollector, VisitorContext};
