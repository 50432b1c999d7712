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

//! Token records and bulk token storage.
//!
//! [`AlignedToken`] is the fixed 32-byte record handed between lexer and
//! parser. [`TokenArray`] stores many tokens column-wise (kinds, payloads,
//! spans and positions in separate arrays) so scans over a single field
//! touch contiguous memory. Storage grows in fixed chunks, each one region
//! of a [`MemoryArena`]; existing tokens never move.

use crate::arena::{ArenaConfig, ArenaStats, MemoryArena, Region};
use crate::error::ResourceError;
use crate::interner::Symbol;
use crate::span::{ByteSpan, SourcePos};
use std::fmt;

/// Number of tokens per [`TokenArray`] chunk.
pub const TOKEN_CHUNK: usize = 4096;

/// Terminal kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenKind(pub u16);

impl TokenKind {
    /// End-of-input marker.
    pub const EOF: TokenKind = TokenKind(u16::MAX);

    /// The kind as a table index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == TokenKind::EOF {
            f.write_str("<eof>")
        } else {
            write!(f, "t{}", self.0)
        }
    }
}

/// Optional value attached to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenPayload {
    /// No payload.
    #[default]
    None,
    /// Interned lexeme (identifiers, strings).
    Interned(Symbol),
    /// Numeric value.
    Scalar(i64),
}

impl TokenPayload {
    pub(crate) const TAG_NONE: u8 = 0;
    pub(crate) const TAG_INTERNED: u8 = 1;
    pub(crate) const TAG_SCALAR: u8 = 2;

    pub(crate) fn to_raw(self) -> (u8, i64) {
        match self {
            TokenPayload::None => (Self::TAG_NONE, -1),
            TokenPayload::Interned(sym) => (Self::TAG_INTERNED, sym.as_u32() as i64),
            TokenPayload::Scalar(value) => (Self::TAG_SCALAR, value),
        }
    }

    pub(crate) fn from_raw(tag: u8, raw: i64) -> Option<Self> {
        match tag {
            Self::TAG_NONE => Some(TokenPayload::None),
            Self::TAG_INTERNED => u32::try_from(raw)
                .ok()
                .map(|id| TokenPayload::Interned(Symbol::from_raw(id))),
            Self::TAG_SCALAR => Some(TokenPayload::Scalar(raw)),
            _ => None,
        }
    }

    /// The interned symbol, if any.
    pub fn symbol(self) -> Option<Symbol> {
        match self {
            TokenPayload::Interned(sym) => Some(sym),
            _ => None,
        }
    }
}

/// Fixed-size token record, 32 bytes and 32-byte aligned.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C, align(32))]
pub struct AlignedToken {
    payload: i64,
    kind: u16,
    payload_tag: u8,
    flags: u8,
    offset: u32,
    len: u32,
    line: u32,
    column: u32,
}

const _: () = assert!(std::mem::size_of::<AlignedToken>() == 32);
const _: () = assert!(std::mem::align_of::<AlignedToken>() == 32);

impl AlignedToken {
    /// Matched text is a reserved keyword.
    pub const FLAG_KEYWORD: u8 = 0x01;
    /// Synthesized end-of-input token.
    pub const FLAG_EOF: u8 = 0x02;
    /// Token opened or closed an embedded-language region.
    pub const FLAG_BOUNDARY: u8 = 0x04;

    /// Create a token without payload.
    pub fn new(kind: TokenKind, span: ByteSpan, pos: SourcePos) -> Self {
        Self {
            payload: -1,
            kind: kind.0,
            payload_tag: TokenPayload::TAG_NONE,
            flags: 0,
            offset: span.offset(),
            len: span.len(),
            line: pos.line(),
            column: pos.column(),
        }
    }

    /// Create the end-of-input token at `offset`.
    pub fn eof(offset: u32, pos: SourcePos) -> Self {
        Self::new(TokenKind::EOF, ByteSpan::point(offset), pos).with_flags(Self::FLAG_EOF)
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: TokenPayload) -> Self {
        let (tag, raw) = payload.to_raw();
        self.payload_tag = tag;
        self.payload = raw;
        self
    }

    /// Set flag bits.
    pub fn with_flags(mut self, flags: u8) -> Self {
        self.flags |= flags;
        self
    }

    #[inline]
    pub fn kind(&self) -> TokenKind {
        TokenKind(self.kind)
    }

    #[inline]
    pub fn payload(&self) -> TokenPayload {
        TokenPayload::from_raw(self.payload_tag, self.payload).unwrap_or_default()
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    #[inline]
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    #[inline]
    pub fn span(&self) -> ByteSpan {
        ByteSpan::new(self.offset, self.len)
    }

    #[inline]
    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column)
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EOF.0
    }
}

impl fmt::Debug for AlignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedToken")
            .field("kind", &self.kind())
            .field("payload", &self.payload())
            .field("span", &self.span())
            .field("pos", &self.pos())
            .field("flags", &self.flags)
            .finish()
    }
}

/// Bytes one token occupies across the columns of a chunk: kind 2, flags 1,
/// payload tag 1, payload 8, span 8, line/column 8.
pub const TOKEN_STORAGE_BYTES: usize = 28;

// Column offsets inside a chunk region.
const KINDS: usize = 0;
const FLAGS: usize = KINDS + 2 * TOKEN_CHUNK;
const TAGS: usize = FLAGS + TOKEN_CHUNK;
const PAYLOADS: usize = TAGS + TOKEN_CHUNK;
const SPANS: usize = PAYLOADS + 8 * TOKEN_CHUNK;
const POSITIONS: usize = SPANS + 8 * TOKEN_CHUNK;
const CHUNK_BYTES: usize = TOKEN_CHUNK * TOKEN_STORAGE_BYTES;

const _: () = assert!(POSITIONS + 8 * TOKEN_CHUNK == CHUNK_BYTES);

fn put<const N: usize>(bytes: &mut [u8], at: usize, value: [u8; N]) {
    bytes[at..at + N].copy_from_slice(&value);
}

fn take<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

/// One arena region holding the columns of up to [`TOKEN_CHUNK`] tokens.
#[derive(Debug, Clone, Copy)]
struct TokenChunk {
    region: Region,
    len: usize,
}

impl TokenChunk {
    fn write(&mut self, bytes: &mut [u8], token: &AlignedToken) {
        let i = self.len;
        put(bytes, KINDS + 2 * i, token.kind.to_le_bytes());
        bytes[FLAGS + i] = token.flags;
        bytes[TAGS + i] = token.payload_tag;
        put(bytes, PAYLOADS + 8 * i, token.payload.to_le_bytes());
        put(bytes, SPANS + 8 * i, token.offset.to_le_bytes());
        put(bytes, SPANS + 8 * i + 4, token.len.to_le_bytes());
        put(bytes, POSITIONS + 8 * i, token.line.to_le_bytes());
        put(bytes, POSITIONS + 8 * i + 4, token.column.to_le_bytes());
        self.len += 1;
    }

    fn kind(bytes: &[u8], i: usize) -> u16 {
        u16::from_le_bytes(take(bytes, KINDS + 2 * i))
    }

    fn span(bytes: &[u8], i: usize) -> ByteSpan {
        ByteSpan::new(
            u32::from_le_bytes(take(bytes, SPANS + 8 * i)),
            u32::from_le_bytes(take(bytes, SPANS + 8 * i + 4)),
        )
    }

    fn read(bytes: &[u8], i: usize) -> AlignedToken {
        let span = Self::span(bytes, i);
        AlignedToken {
            payload: i64::from_le_bytes(take(bytes, PAYLOADS + 8 * i)),
            kind: Self::kind(bytes, i),
            payload_tag: bytes[TAGS + i],
            flags: bytes[FLAGS + i],
            offset: span.offset(),
            len: span.len(),
            line: u32::from_le_bytes(take(bytes, POSITIONS + 8 * i)),
            column: u32::from_le_bytes(take(bytes, POSITIONS + 8 * i + 4)),
        }
    }
}

/// Column-oriented, chunked token storage backed by a [`MemoryArena`].
///
/// Each chunk is one arena region allocated with
/// [`MemoryArena::allocate_batch`]; a chunk is never moved once allocated.
///
/// # Examples
///
/// ```
/// use pathweave_memory::{AlignedToken, ByteSpan, SourcePos, TokenArray, TokenKind};
///
/// let mut tokens = TokenArray::new();
/// let id = tokens.push(AlignedToken::new(TokenKind(3), ByteSpan::new(0, 2), SourcePos::start())).unwrap();
/// assert_eq!(tokens.get(id).map(|t| t.kind()), Some(TokenKind(3)));
/// ```
pub struct TokenArray {
    arena: MemoryArena,
    chunks: Vec<TokenChunk>,
    len: usize,
}

impl TokenArray {
    /// Create an empty array. No chunk is reserved until the first push.
    pub fn new() -> Self {
        Self::with_arena_config(ArenaConfig::new().with_block_size(2 * CHUNK_BYTES))
    }

    /// Create an empty array whose chunks come from an arena configured by
    /// `config`. A capped arena makes [`push`](Self::push) fail with
    /// [`ResourceError::ArenaExhausted`] once a new chunk would not fit.
    pub fn with_arena_config(config: ArenaConfig) -> Self {
        Self {
            arena: MemoryArena::new(config),
            chunks: Vec::new(),
            len: 0,
        }
    }

    /// Collect `tokens` into a new array.
    pub fn from_tokens<I: IntoIterator<Item = AlignedToken>>(tokens: I) -> Result<Self, ResourceError> {
        let mut array = Self::new();
        for token in tokens {
            array.push(token)?;
        }
        Ok(array)
    }

    /// Append a token and return its index.
    pub fn push(&mut self, token: AlignedToken) -> Result<usize, ResourceError> {
        if self.chunks.last().map_or(true, |c| c.len == TOKEN_CHUNK) {
            let region = self.arena.allocate_batch(TOKEN_CHUNK, TOKEN_STORAGE_BYTES)?;
            self.chunks.push(TokenChunk { region, len: 0 });
        }
        if let Some(chunk) = self.chunks.last_mut() {
            let bytes = self.arena.bytes_mut(chunk.region)?;
            chunk.write(bytes, &token);
        }
        self.len += 1;
        Ok(self.len - 1)
    }

    /// Append every token in `tokens`, in order.
    pub fn append_slice(&mut self, tokens: &[AlignedToken]) -> Result<(), ResourceError> {
        for token in tokens {
            self.push(*token)?;
        }
        Ok(())
    }

    fn column(&self, index: usize) -> Option<(&[u8], usize)> {
        if index >= self.len {
            return None;
        }
        let chunk = self.chunks.get(index / TOKEN_CHUNK)?;
        let bytes = self.arena.bytes(chunk.region).ok()?;
        Some((bytes, index % TOKEN_CHUNK))
    }

    /// Token at `index`.
    pub fn get(&self, index: usize) -> Option<AlignedToken> {
        self.column(index).map(|(bytes, i)| TokenChunk::read(bytes, i))
    }

    /// Kind of the token at `index` without assembling the full record.
    pub fn kind(&self, index: usize) -> Option<TokenKind> {
        self.column(index).map(|(bytes, i)| TokenKind(TokenChunk::kind(bytes, i)))
    }

    /// Span of the token at `index`.
    pub fn span(&self, index: usize) -> Option<ByteSpan> {
        self.column(index).map(|(bytes, i)| TokenChunk::span(bytes, i))
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate tokens in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = AlignedToken> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// Iterate kinds only.
    pub fn kinds(&self) -> impl Iterator<Item = TokenKind> + '_ {
        (0..self.len).filter_map(move |i| self.kind(i))
    }

    /// Remove every token. The arena keeps its blocks for the next pushes.
    pub fn clear(&mut self) {
        self.arena.reset();
        self.chunks.clear();
        self.len = 0;
    }

    /// Bytes reserved by the backing arena.
    pub fn memory_usage(&self) -> usize {
        self.arena.stats().bytes_reserved
    }

    /// Usage of the backing arena.
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }
}

impl Default for TokenArray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenArray")
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .field("arena", &self.arena.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: u16, offset: u32) -> AlignedToken {
        AlignedToken::new(TokenKind(kind), ByteSpan::new(offset, 1), SourcePos::new(1, offset + 1))
    }

    // ==================== AlignedToken tests ====================

    #[test]
    fn test_aligned_token_layout() {
        assert_eq!(std::mem::size_of::<AlignedToken>(), 32);
        assert_eq!(std::mem::align_of::<AlignedToken>(), 32);
        let tokens = [tok(1, 0), tok(2, 1)];
        for token in &tokens {
            assert_eq!(token as *const AlignedToken as usize % 32, 0);
        }
    }

    #[test]
    fn test_payload_variants() {
        let base = tok(1, 0);
        assert_eq!(base.payload(), TokenPayload::None);
        let sym = base.with_payload(TokenPayload::Interned(Symbol::from_raw(9)));
        assert_eq!(sym.payload().symbol(), Some(Symbol::from_raw(9)));
        let scalar = base.with_payload(TokenPayload::Scalar(-42));
        assert_eq!(scalar.payload(), TokenPayload::Scalar(-42));
    }

    #[test]
    fn test_eof_token() {
        let eof = AlignedToken::eof(10, SourcePos::new(2, 3));
        assert!(eof.is_eof());
        assert!(eof.has_flag(AlignedToken::FLAG_EOF));
        assert!(eof.span().is_empty());
    }

    // ==================== TokenArray tests ====================

    #[test]
    fn test_push_get() {
        let mut tokens = TokenArray::new();
        let a = tokens.push(tok(1, 0)).unwrap();
        let b = tokens.push(tok(2, 1).with_payload(TokenPayload::Scalar(5))).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.get(a), Some(tok(1, 0)));
        assert_eq!(tokens.get(b).map(|t| t.payload()), Some(TokenPayload::Scalar(5)));
        assert_eq!(tokens.get(2), None);
    }

    #[test]
    fn test_every_field_survives_columns() {
        let token = AlignedToken::new(TokenKind(0xBEEF), ByteSpan::new(70_000, 12), SourcePos::new(900, 77))
            .with_payload(TokenPayload::Scalar(i64::MIN))
            .with_flags(AlignedToken::FLAG_KEYWORD | AlignedToken::FLAG_BOUNDARY);
        let mut tokens = TokenArray::new();
        let id = tokens.push(token).unwrap();
        assert_eq!(tokens.get(id), Some(token));
        assert_eq!(tokens.span(id), Some(ByteSpan::new(70_000, 12)));
    }

    #[test]
    fn test_growth_across_chunks_keeps_order() {
        let mut tokens = TokenArray::new();
        let count = TOKEN_CHUNK * 2 + 17;
        for i in 0..count {
            tokens.push(tok((i % 100) as u16, i as u32)).unwrap();
        }
        assert_eq!(tokens.len(), count);
        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(token.kind(), TokenKind((i % 100) as u16));
            assert_eq!(token.span().offset(), i as u32);
        }
        assert_eq!(tokens.kind(TOKEN_CHUNK), Some(TokenKind((TOKEN_CHUNK % 100) as u16)));
    }

    #[test]
    fn test_chunks_are_arena_regions() {
        let mut tokens = TokenArray::new();
        assert_eq!(tokens.arena_stats().allocation_count, 0);
        for i in 0..=TOKEN_CHUNK as u32 {
            tokens.push(tok(1, i)).unwrap();
        }
        let stats = tokens.arena_stats();
        assert_eq!(stats.allocation_count, 2);
        assert_eq!(stats.bytes_used, 2 * TOKEN_CHUNK * TOKEN_STORAGE_BYTES);
    }

    #[test]
    fn test_capped_arena_refuses_new_chunk() {
        let config = ArenaConfig::new()
            .with_block_size(TOKEN_CHUNK * TOKEN_STORAGE_BYTES)
            .with_max_bytes(TOKEN_CHUNK * TOKEN_STORAGE_BYTES + 64);
        let mut tokens = TokenArray::with_arena_config(config);
        for i in 0..TOKEN_CHUNK as u32 {
            tokens.push(tok(1, i)).unwrap();
        }
        assert!(matches!(
            tokens.push(tok(1, 0)),
            Err(ResourceError::ArenaExhausted { .. })
        ));
        assert_eq!(tokens.len(), TOKEN_CHUNK);
    }

    #[test]
    fn test_append_slice() {
        let mut tokens = TokenArray::new();
        tokens.push(tok(1, 0)).unwrap();
        tokens.append_slice(&[tok(2, 1), tok(3, 2)]).unwrap();
        let kinds: Vec<_> = tokens.kinds().collect();
        assert_eq!(kinds, vec![TokenKind(1), TokenKind(2), TokenKind(3)]);
    }

    #[test]
    fn test_clear_reuses_arena_blocks() {
        let mut tokens = TokenArray::from_tokens((0..TOKEN_CHUNK as u32 + 1).map(|i| tok(1, i))).unwrap();
        let reserved = tokens.memory_usage();
        tokens.clear();
        assert!(tokens.is_empty());
        assert_eq!(tokens.get(0), None);
        tokens.push(tok(4, 0)).unwrap();
        assert_eq!(tokens.kind(0), Some(TokenKind(4)));
        assert_eq!(tokens.memory_usage(), reserved);
        assert_eq!(tokens.arena_stats().generation, 1);
    }
}
