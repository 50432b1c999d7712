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

//! Binary exchange format for trees, tokens and string tables.
//!
//! Every payload is framed the same way (all integers little-endian):
//!
//! ```text
//! [magic "PWZC":4][version:u16][flags:u16][body ...][crc32:u32]
//! ```
//!
//! The CRC32 (IEEE) covers every byte before it and is verified before the
//! body is decoded. Bodies:
//!
//! - string table: `[count:u32]` then `[len:u32][utf8]*`
//! - node table: `[count:u32]` then 21-byte records
//!   `{kind:u8, parent_idx:i32, child_count:u32, payload_string_id:i32,
//!   pos_offset:u32, pos_len:u32}` in pre-order
//! - token table: `[count:u32]` then 28-byte records
//!   `{kind:u16, flags:u8, payload_tag:u8, payload:i64, pos_offset:u32,
//!   pos_len:u32, line:u32, column:u32}`
//!
//! A tree payload is `string table + node table` (flags `AST | STRINGS`); a
//! token payload is `string table + token table` (flags `TOKENS | STRINGS`).
//! Only referenced strings are written, in first-use order, so equal logical
//! content always encodes to identical bytes.
//!
//! [`ArchivedAst`] reads node records in place from the payload buffer;
//! [`ZeroCopySerializer::deserialize_ast`] materializes an owned [`Ast`].

use crate::arena::{MemoryArena, Region};
use crate::ast::{Ast, NodeId, NodeKind, Order};
use crate::error::{IntegrityError, ResourceError};
use crate::interner::{StringInterner, Symbol};
use crate::span::{ByteSpan, SourcePos};
use crate::token::{AlignedToken, TokenArray, TokenKind, TokenPayload};
use hashbrown::HashMap;

/// Leading magic bytes.
pub const MAGIC: [u8; 4] = *b"PWZC";
/// Format version written and accepted.
pub const VERSION: u16 = 1;

/// Header flag bits.
pub mod flags {
    /// Body holds a node table.
    pub const AST: u16 = 0x1;
    /// Body holds a token table.
    pub const TOKENS: u16 = 0x2;
    /// Body holds a string table.
    pub const STRINGS: u16 = 0x4;
}

const HEADER_LEN: usize = 8;
const CRC_LEN: usize = 4;
const NODE_RECORD_LEN: usize = 21;
const TOKEN_RECORD_LEN: usize = 28;

// ==================== Framing ====================

pub(crate) struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub(crate) fn begin(flags: u16) -> Self {
        Self::begin_in(Vec::new(), flags)
    }

    pub(crate) fn begin_in(mut buf: Vec<u8>, flags: u16) -> Self {
        buf.clear();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&flags.to_le_bytes());
        Self { buf }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn string_table<'s>(&mut self, strings: impl IntoIterator<Item = &'s str>) {
        let count_at = self.buf.len();
        self.u32(0);
        let mut count = 0u32;
        for text in strings {
            self.u32(text.len() as u32);
            self.buf.extend_from_slice(text.as_bytes());
            count += 1;
        }
        self.buf[count_at..count_at + 4].copy_from_slice(&count.to_le_bytes());
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        let crc = crc32fast::hash(&self.buf);
        self.buf.extend_from_slice(&crc.to_le_bytes());
        self.buf
    }
}

pub(crate) struct FrameReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
    flags: u16,
}

impl<'a> FrameReader<'a> {
    /// Validate header and checksum, positioning the reader at the body.
    pub(crate) fn open(bytes: &'a [u8]) -> Result<Self, IntegrityError> {
        let truncated = |needed: usize| IntegrityError::Truncated {
            offset: 0,
            needed,
            available: bytes.len(),
        };
        let magic: [u8; 4] = bytes
            .get(..4)
            .and_then(|m| m.try_into().ok())
            .ok_or_else(|| truncated(4))?;
        if magic != MAGIC {
            return Err(IntegrityError::MagicMismatch {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = bytes
            .get(4..6)
            .map(|v| u16::from_le_bytes([v[0], v[1]]))
            .ok_or_else(|| truncated(6))?;
        if version != VERSION {
            return Err(IntegrityError::VersionUnsupported {
                found: version,
                supported: VERSION,
            });
        }
        if bytes.len() < HEADER_LEN + CRC_LEN {
            return Err(truncated(HEADER_LEN + CRC_LEN));
        }
        let end = bytes.len() - CRC_LEN;
        let stored = u32::from_le_bytes([bytes[end], bytes[end + 1], bytes[end + 2], bytes[end + 3]]);
        let computed = crc32fast::hash(&bytes[..end]);
        if stored != computed {
            return Err(IntegrityError::ChecksumMismatch { stored, computed });
        }
        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        Ok(Self {
            bytes,
            pos: HEADER_LEN,
            end,
            flags,
        })
    }

    pub(crate) fn flags(&self) -> u16 {
        self.flags
    }

    pub(crate) fn expect_flags(&self, expected: u16) -> Result<(), IntegrityError> {
        if self.flags != expected {
            return Err(IntegrityError::Malformed(format!(
                "flags {:#06x}, expected {:#06x}",
                self.flags, expected
            )));
        }
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.end - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], IntegrityError> {
        if self.remaining() < n {
            return Err(IntegrityError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], IntegrityError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, IntegrityError> {
        self.array().map(u32::from_le_bytes)
    }

    pub(crate) fn string_table(&mut self) -> Result<Vec<&'a str>, IntegrityError> {
        let count = self.u32()? as usize;
        // Each entry needs at least its length prefix.
        if count > self.remaining() / 4 {
            return Err(IntegrityError::Malformed(format!(
                "string table claims {} entries in {} bytes",
                count,
                self.remaining()
            )));
        }
        let mut strings = Vec::with_capacity(count);
        for i in 0..count {
            let len = self.u32()? as usize;
            let raw = self.take(len)?;
            let text = std::str::from_utf8(raw).map_err(|e| {
                IntegrityError::Malformed(format!("string {} is not UTF-8: {}", i, e))
            })?;
            strings.push(text);
        }
        Ok(strings)
    }

    /// Count prefix followed by `count` fixed-width records.
    fn record_table(&mut self, record_len: usize) -> Result<(usize, &'a [u8]), IntegrityError> {
        let count = self.u32()? as usize;
        let len = count.checked_mul(record_len).ok_or_else(|| {
            IntegrityError::Malformed(format!("record count {} overflows", count))
        })?;
        Ok((count, self.take(len)?))
    }

    pub(crate) fn finish(self) -> Result<(), IntegrityError> {
        if self.pos != self.end {
            return Err(IntegrityError::Malformed(format!(
                "{} trailing bytes after body",
                self.end - self.pos
            )));
        }
        Ok(())
    }
}

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le_i32(b: &[u8], at: usize) -> i32 {
    le_u32(b, at) as i32
}

fn le_i64(b: &[u8], at: usize) -> i64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[at..at + 8]);
    i64::from_le_bytes(raw)
}

// ==================== Archived views ====================

/// One node record read in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchivedNode<'a> {
    pub kind: NodeKind,
    /// Index of the parent record; `None` for the root.
    pub parent: Option<u32>,
    pub child_count: u32,
    pub payload: Option<&'a str>,
    pub span: ByteSpan,
}

/// Validated tree payload, borrowed from its buffer.
///
/// Opening checks the frame, every record and the pre-order topology, so
/// [`ArchivedAst::node`] never fails for in-range indices.
#[derive(Debug, Clone)]
pub struct ArchivedAst<'a> {
    strings: Vec<&'a str>,
    records: &'a [u8],
    count: usize,
}

impl<'a> ArchivedAst<'a> {
    /// Validate `bytes` and expose its node table without copying.
    pub fn open(bytes: &'a [u8]) -> Result<Self, IntegrityError> {
        let mut reader = FrameReader::open(bytes)?;
        reader.expect_flags(flags::AST | flags::STRINGS)?;
        let strings = reader.string_table()?;
        let (count, records) = reader.record_table(NODE_RECORD_LEN)?;
        reader.finish()?;

        let archived = Self {
            strings,
            records,
            count,
        };
        archived.validate()?;
        Ok(archived)
    }

    /// Number of node records.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` for an empty tree.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The string table.
    pub fn strings(&self) -> &[&'a str] {
        &self.strings
    }

    /// Record `index` in pre-order.
    pub fn node(&self, index: usize) -> Option<ArchivedNode<'a>> {
        if index >= self.count {
            return None;
        }
        self.decode(index).ok()
    }

    /// Iterate records in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = ArchivedNode<'a>> + '_ {
        (0..self.count).filter_map(move |i| self.node(i))
    }

    /// Materialize an owned tree and string table.
    pub fn to_owned_ast(&self) -> Result<DecodedAst, IntegrityError> {
        let mut strings = StringInterner::new();
        let symbols: Vec<Symbol> = self.strings.iter().map(|s| strings.intern(s)).collect();
        let mut ast = Ast::with_capacity(self.count);
        for i in 0..self.count {
            let node = self.decode(i)?;
            let payload = self
                .raw_payload(i)
                .and_then(|id| symbols.get(id as usize).copied());
            let id = ast.new_node(node.kind, Ast::NO_TAG, payload, node.span);
            if let Some(parent) = node.parent {
                ast.add_child(NodeId::from_raw(parent), id)
                    .map_err(|e| IntegrityError::Malformed(e.to_string()))?;
            }
        }
        let root = (self.count > 0).then_some(NodeId::from_raw(0));
        Ok(DecodedAst { ast, strings, root })
    }

    fn record(&self, index: usize) -> &'a [u8] {
        let at = index * NODE_RECORD_LEN;
        &self.records[at..at + NODE_RECORD_LEN]
    }

    fn raw_payload(&self, index: usize) -> Option<u32> {
        let id = le_i32(self.record(index), 9);
        (id >= 0).then_some(id as u32)
    }

    fn decode(&self, index: usize) -> Result<ArchivedNode<'a>, IntegrityError> {
        let r = self.record(index);
        let kind = NodeKind::from_u8(r[0]).ok_or_else(|| {
            IntegrityError::Malformed(format!("node {} has unknown kind {}", index, r[0]))
        })?;
        let parent = le_i32(r, 1);
        let child_count = le_u32(r, 5);
        let payload_id = le_i32(r, 9);
        let offset = le_u32(r, 13);
        let len = le_u32(r, 17);

        let payload = match payload_id {
            -1 => None,
            id if id >= 0 => Some(*self.strings.get(id as usize).ok_or_else(|| {
                IntegrityError::Malformed(format!(
                    "node {} references string {} of {}",
                    index,
                    id,
                    self.strings.len()
                ))
            })?),
            id => {
                return Err(IntegrityError::Malformed(format!(
                    "node {} has payload id {}",
                    index, id
                )))
            }
        };
        if offset.checked_add(len).is_none() {
            return Err(IntegrityError::Malformed(format!(
                "node {} span {}+{} overflows",
                index, offset, len
            )));
        }
        Ok(ArchivedNode {
            kind,
            parent: (parent >= 0).then_some(parent as u32),
            child_count,
            payload,
            span: ByteSpan::new(offset, len),
        })
    }

    /// Record 0 is the only root; every other record's parent is on the
    /// current pre-order path; child counts match.
    fn validate(&self) -> Result<(), IntegrityError> {
        let mut seen_children = vec![0u32; self.count];
        let mut path: Vec<u32> = Vec::new();
        for i in 0..self.count {
            let node = self.decode(i)?;
            let raw_parent = le_i32(self.record(i), 1);
            match (i, node.parent) {
                (0, None) if raw_parent == -1 => {}
                (0, _) => {
                    return Err(IntegrityError::Malformed("first node must be the root".into()))
                }
                (_, None) => {
                    return Err(IntegrityError::Malformed(format!(
                        "node {} has parent index {}",
                        i, raw_parent
                    )))
                }
                (_, Some(parent)) => {
                    while path.last().is_some_and(|&top| top != parent) {
                        path.pop();
                    }
                    if path.is_empty() {
                        return Err(IntegrityError::Malformed(format!(
                            "node {} is not in pre-order under node {}",
                            i, parent
                        )));
                    }
                    seen_children[parent as usize] += 1;
                }
            }
            path.push(i as u32);
        }
        for i in 0..self.count {
            let declared = le_u32(self.record(i), 5);
            if declared != seen_children[i] {
                return Err(IntegrityError::Malformed(format!(
                    "node {} declares {} children, table has {}",
                    i, declared, seen_children[i]
                )));
            }
        }
        Ok(())
    }
}

/// Owned result of decoding a tree payload.
#[derive(Debug, Clone)]
pub struct DecodedAst {
    pub ast: Ast,
    pub strings: StringInterner,
    /// `None` when the payload holds no nodes.
    pub root: Option<NodeId>,
}

/// Owned result of decoding a token payload.
#[derive(Debug)]
pub struct DecodedTokens {
    pub tokens: TokenArray,
    pub strings: StringInterner,
}

// ==================== Serializer ====================

/// Encoder/decoder with reusable scratch buffers.
#[derive(Debug, Default)]
pub struct ZeroCopySerializer {
    buf: Vec<u8>,
    order: Vec<NodeId>,
    node_index: HashMap<NodeId, u32>,
    string_index: HashMap<Symbol, u32>,
    string_order: Vec<Symbol>,
}

impl ZeroCopySerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the subtree under `root`.
    ///
    /// `root` is written with parent index -1 even when it has a parent in
    /// `ast`. Unknown roots encode as an empty tree.
    pub fn serialize_ast(&mut self, ast: &Ast, root: NodeId, strings: &StringInterner) -> &[u8] {
        self.reset_scratch();
        self.order.extend(ast.traverse(root, Order::DepthFirst));
        for (i, &id) in self.order.iter().enumerate() {
            self.node_index.insert(id, i as u32);
            if let Some(sym) = ast.node(id).and_then(|n| n.payload) {
                Self::note_string(&mut self.string_index, &mut self.string_order, sym);
            }
        }

        let mut w = FrameWriter::begin_in(std::mem::take(&mut self.buf), flags::AST | flags::STRINGS);
        w.string_table(
            self.string_order
                .iter()
                .map(|&sym| table_text(strings, sym)),
        );
        w.u32(self.order.len() as u32);
        for (i, &id) in self.order.iter().enumerate() {
            let Some(node) = ast.node(id) else { continue };
            let parent = match node.parent.and_then(|p| self.node_index.get(&p)) {
                Some(&p) if i > 0 => p as i32,
                _ => -1,
            };
            let payload = node
                .payload
                .and_then(|s| self.string_index.get(&s))
                .map_or(-1, |&s| s as i32);
            w.u8(node.kind.to_u8());
            w.i32(parent);
            w.u32(node.child_count);
            w.i32(payload);
            w.u32(node.span.offset());
            w.u32(node.span.len());
        }
        self.buf = w.finish();
        &self.buf
    }

    /// Decode a tree payload into owned storage.
    pub fn deserialize_ast(&self, bytes: &[u8]) -> Result<DecodedAst, IntegrityError> {
        ArchivedAst::open(bytes)?.to_owned_ast()
    }

    /// Encode a token array.
    pub fn serialize_tokens(&mut self, tokens: &TokenArray, strings: &StringInterner) -> &[u8] {
        self.reset_scratch();
        for token in tokens.iter() {
            if let Some(sym) = token.payload().symbol() {
                Self::note_string(&mut self.string_index, &mut self.string_order, sym);
            }
        }

        let mut w = FrameWriter::begin_in(std::mem::take(&mut self.buf), flags::TOKENS | flags::STRINGS);
        w.string_table(
            self.string_order
                .iter()
                .map(|&sym| table_text(strings, sym)),
        );
        w.u32(tokens.len() as u32);
        for token in tokens.iter() {
            let payload = match token.payload() {
                TokenPayload::Interned(sym) => TokenPayload::Interned(Symbol::from_raw(
                    self.string_index.get(&sym).copied().unwrap_or(0),
                )),
                other => other,
            };
            let (tag, raw) = payload.to_raw();
            let span = token.span();
            let pos = token.pos();
            w.u16(token.kind().0);
            w.u8(token.flags());
            w.u8(tag);
            w.i64(raw);
            w.u32(span.offset());
            w.u32(span.len());
            w.u32(pos.line());
            w.u32(pos.column());
        }
        self.buf = w.finish();
        &self.buf
    }

    /// Decode a token payload.
    pub fn deserialize_tokens(&self, bytes: &[u8]) -> Result<DecodedTokens, IntegrityError> {
        let mut reader = FrameReader::open(bytes)?;
        reader.expect_flags(flags::TOKENS | flags::STRINGS)?;
        let table = reader.string_table()?;
        let (count, records) = reader.record_table(TOKEN_RECORD_LEN)?;
        reader.finish()?;

        let mut strings = StringInterner::new();
        let symbols: Vec<Symbol> = table.iter().map(|s| strings.intern(s)).collect();
        let mut tokens = TokenArray::new();
        for i in 0..count {
            let r = &records[i * TOKEN_RECORD_LEN..(i + 1) * TOKEN_RECORD_LEN];
            let token_flags = r[2];
            let tag = r[3];
            let raw = le_i64(r, 4);
            let payload = match TokenPayload::from_raw(tag, raw) {
                Some(TokenPayload::Interned(id)) => TokenPayload::Interned(
                    *symbols.get(id.index()).ok_or_else(|| {
                        IntegrityError::Malformed(format!(
                            "token {} references string {} of {}",
                            i,
                            id.as_u32(),
                            symbols.len()
                        ))
                    })?,
                ),
                Some(TokenPayload::None) if raw != -1 => {
                    return Err(IntegrityError::Malformed(format!(
                        "token {} has no payload but raw value {}",
                        i, raw
                    )))
                }
                Some(payload) => payload,
                None => {
                    return Err(IntegrityError::Malformed(format!(
                        "token {} has payload tag {}",
                        i, tag
                    )))
                }
            };
            let span = ByteSpan::new(le_u32(r, 12), le_u32(r, 16));
            let pos = SourcePos::new(le_u32(r, 20), le_u32(r, 24));
            tokens
                .push(
                    AlignedToken::new(TokenKind(le_u16(r, 0)), span, pos)
                        .with_payload(payload)
                        .with_flags(token_flags),
                )
                .map_err(|e| IntegrityError::Malformed(format!("token table: {}", e)))?;
        }
        Ok(DecodedTokens { tokens, strings })
    }

    /// Encode a subtree directly into an arena region.
    pub fn serialize_ast_into(
        &mut self,
        ast: &Ast,
        root: NodeId,
        strings: &StringInterner,
        arena: &mut MemoryArena,
    ) -> Result<Region, ResourceError> {
        let bytes = self.serialize_ast(ast, root, strings);
        arena.alloc_copy(bytes)
    }

    fn reset_scratch(&mut self) {
        self.order.clear();
        self.node_index.clear();
        self.string_index.clear();
        self.string_order.clear();
    }

    fn note_string(index: &mut HashMap<Symbol, u32>, order: &mut Vec<Symbol>, sym: Symbol) {
        if !index.contains_key(&sym) {
            index.insert(sym, order.len() as u32);
            order.push(sym);
        }
    }
}

/// Text written to the string table for `sym`.
///
/// Symbols always come from the interner the payload was built with; a miss
/// means the caller passed the wrong interner.
fn table_text(strings: &StringInterner, sym: Symbol) -> &str {
    let text = strings.resolve(sym);
    debug_assert!(text.is_some(), "symbol {} is not in the interner", sym.as_u32());
    text.unwrap_or_default()
}

/// Header flags of a framed payload, after full validation of the frame.
pub fn payload_flags(bytes: &[u8]) -> Result<u16, IntegrityError> {
    FrameReader::open(bytes).map(|r| r.flags())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `+`(2, `*`(3, 4)) over "2+3*4".
    fn arithmetic(strings: &mut StringInterner) -> (Ast, NodeId) {
        let mut ast = Ast::new();
        let plus = ast.new_node(NodeKind::NonTerminal, 0, Some(strings.intern("+")), ByteSpan::new(0, 5));
        let two = ast.new_node(NodeKind::Literal, 1, Some(strings.intern("2")), ByteSpan::new(0, 1));
        let times = ast.new_node(NodeKind::NonTerminal, 0, Some(strings.intern("*")), ByteSpan::new(2, 3));
        let three = ast.new_node(NodeKind::Literal, 1, Some(strings.intern("3")), ByteSpan::new(2, 1));
        let four = ast.new_node(NodeKind::Literal, 1, Some(strings.intern("4")), ByteSpan::new(4, 1));
        ast.add_child(plus, two).unwrap();
        ast.add_child(plus, times).unwrap();
        ast.add_child(times, three).unwrap();
        ast.add_child(times, four).unwrap();
        (ast, plus)
    }

    // ==================== Tree payload tests ====================

    #[test]
    fn test_ast_round_trip() {
        let mut strings = StringInterner::new();
        let (ast, root) = arithmetic(&mut strings);
        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_ast(&ast, root, &strings).to_vec();

        let decoded = ser.deserialize_ast(&bytes).unwrap();
        let new_root = decoded.root.unwrap();
        assert!(ast.structurally_equal(root, &strings, &decoded.ast, new_root, &decoded.strings));
        assert_eq!(decoded.ast.node(new_root).unwrap().tag, Ast::NO_TAG);
    }

    #[test]
    fn test_ast_layout() {
        let mut strings = StringInterner::new();
        let (ast, root) = arithmetic(&mut strings);
        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_ast(&ast, root, &strings).to_vec();

        assert_eq!(&bytes[..4], b"PWZC");
        assert_eq!(le_u16(&bytes, 4), 1);
        assert_eq!(le_u16(&bytes, 6), flags::AST | flags::STRINGS);
        // 5 one-byte strings, 5 nodes
        let strings_len = 4 + 5 * (4 + 1);
        assert_eq!(bytes.len(), 8 + strings_len + 4 + 5 * 21 + 4);
    }

    #[test]
    fn test_equal_content_encodes_identically() {
        let mut s1 = StringInterner::new();
        let (a1, r1) = arithmetic(&mut s1);

        // Same logical tree, different interner ids and node creation order.
        let mut s2 = StringInterner::new();
        s2.intern("unrelated");
        let four_sym = s2.intern("4");
        let mut a2 = Ast::new();
        let four = a2.new_node(NodeKind::Literal, 9, Some(four_sym), ByteSpan::new(4, 1));
        let three = a2.new_node(NodeKind::Literal, 9, Some(s2.intern("3")), ByteSpan::new(2, 1));
        let times = a2.new_node(NodeKind::NonTerminal, 9, Some(s2.intern("*")), ByteSpan::new(2, 3));
        let two = a2.new_node(NodeKind::Literal, 9, Some(s2.intern("2")), ByteSpan::new(0, 1));
        let plus = a2.new_node(NodeKind::NonTerminal, 9, Some(s2.intern("+")), ByteSpan::new(0, 5));
        a2.add_child(times, three).unwrap();
        a2.add_child(times, four).unwrap();
        a2.add_child(plus, two).unwrap();
        a2.add_child(plus, times).unwrap();

        let mut ser = ZeroCopySerializer::new();
        let b1 = ser.serialize_ast(&a1, r1, &s1).to_vec();
        let b2 = ser.serialize_ast(&a2, plus, &s2).to_vec();
        assert_eq!(b1, b2);
    }

    #[test]
    fn test_archived_view_reads_in_place() {
        let mut strings = StringInterner::new();
        let (ast, root) = arithmetic(&mut strings);
        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_ast(&ast, root, &strings).to_vec();

        let archived = ArchivedAst::open(&bytes).unwrap();
        assert_eq!(archived.len(), 5);
        let payloads: Vec<_> = archived.nodes().map(|n| n.payload.unwrap()).collect();
        assert_eq!(payloads, vec!["+", "2", "*", "3", "4"]);
        let times = archived.node(2).unwrap();
        assert_eq!(times.parent, Some(0));
        assert_eq!(times.child_count, 2);
    }

    #[test]
    fn test_empty_tree() {
        let ast = Ast::new();
        let strings = StringInterner::new();
        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_ast(&ast, NodeId::from_raw(0), &strings).to_vec();
        let decoded = ser.deserialize_ast(&bytes).unwrap();
        assert!(decoded.root.is_none());
        assert!(decoded.ast.is_empty());
    }

    #[test]
    fn test_serialize_into_arena() {
        let mut strings = StringInterner::new();
        let (ast, root) = arithmetic(&mut strings);
        let mut ser = ZeroCopySerializer::new();
        let mut arena = MemoryArena::default();
        let region = ser.serialize_ast_into(&ast, root, &strings, &mut arena).unwrap();
        let stored = arena.bytes(region).unwrap();
        assert!(ArchivedAst::open(stored).is_ok());
    }

    // ==================== Integrity tests ====================

    #[test]
    fn test_flipped_node_byte_is_checksum_mismatch() {
        let mut strings = StringInterner::new();
        let (ast, root) = arithmetic(&mut strings);
        let mut ser = ZeroCopySerializer::new();
        let mut bytes = ser.serialize_ast(&ast, root, &strings).to_vec();
        let in_node_table = bytes.len() - 4 - 21 * 2;
        bytes[in_node_table] ^= 0x01;
        assert!(matches!(
            ser.deserialize_ast(&bytes),
            Err(IntegrityError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = StringInterner::new().serialize();
        bytes[0] = b'X';
        assert!(matches!(
            payload_flags(&bytes),
            Err(IntegrityError::MagicMismatch { .. })
        ));
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = StringInterner::new().serialize();
        bytes[4] = 9;
        assert_eq!(
            payload_flags(&bytes),
            Err(IntegrityError::VersionUnsupported {
                found: 9,
                supported: VERSION
            })
        );
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            payload_flags(b"PW"),
            Err(IntegrityError::Truncated { .. })
        ));
        assert!(matches!(
            payload_flags(b"PWZC\x01\x00\x04\x00"),
            Err(IntegrityError::Truncated { .. })
        ));
    }

    #[test]
    fn test_wrong_payload_kind_is_malformed() {
        let bytes = StringInterner::new().serialize();
        assert!(matches!(
            ArchivedAst::open(&bytes),
            Err(IntegrityError::Malformed(_))
        ));
    }

    fn reframe(body: &[u8], flags: u16) -> Vec<u8> {
        let mut w = FrameWriter::begin(flags);
        w.buf.extend_from_slice(body);
        w.finish()
    }

    #[test]
    fn test_checksum_valid_bad_topology_is_malformed() {
        // Two roots.
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&2u32.to_le_bytes());
        for _ in 0..2 {
            body.push(NodeKind::Literal.to_u8());
            body.extend_from_slice(&(-1i32).to_le_bytes());
            body.extend_from_slice(&0u32.to_le_bytes());
            body.extend_from_slice(&(-1i32).to_le_bytes());
            body.extend_from_slice(&0u32.to_le_bytes());
            body.extend_from_slice(&1u32.to_le_bytes());
        }
        let bytes = reframe(&body, flags::AST | flags::STRINGS);
        assert!(matches!(
            ArchivedAst::open(&bytes),
            Err(IntegrityError::Malformed(_))
        ));
    }

    #[test]
    fn test_checksum_valid_bad_string_ref_is_malformed() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        body.push(NodeKind::Identifier.to_u8());
        body.extend_from_slice(&(-1i32).to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&3i32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        let bytes = reframe(&body, flags::AST | flags::STRINGS);
        assert!(matches!(
            ArchivedAst::open(&bytes),
            Err(IntegrityError::Malformed(_))
        ));
    }

    // ==================== Token payload tests ====================

    #[test]
    fn test_token_round_trip() {
        let mut strings = StringInterner::new();
        strings.intern("skipped");
        let name = strings.intern("count");
        let mut tokens = TokenArray::new();
        tokens.push(
            AlignedToken::new(TokenKind(4), ByteSpan::new(0, 5), SourcePos::new(1, 1))
                .with_payload(TokenPayload::Interned(name)),
        ).unwrap();
        tokens.push(
            AlignedToken::new(TokenKind(2), ByteSpan::new(6, 2), SourcePos::new(1, 7))
                .with_payload(TokenPayload::Scalar(42)),
        ).unwrap();
        tokens.push(AlignedToken::eof(8, SourcePos::new(1, 9))).unwrap();

        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_tokens(&tokens, &strings).to_vec();
        assert_eq!(payload_flags(&bytes), Ok(flags::TOKENS | flags::STRINGS));

        let decoded = ser.deserialize_tokens(&bytes).unwrap();
        assert_eq!(decoded.tokens.len(), 3);
        assert_eq!(decoded.strings.len(), 1);
        let first = decoded.tokens.get(0).unwrap();
        let sym = first.payload().symbol().unwrap();
        assert_eq!(decoded.strings.resolve(sym), Some("count"));
        assert_eq!(decoded.tokens.get(1).unwrap().payload(), TokenPayload::Scalar(42));
        let last = decoded.tokens.get(2).unwrap();
        assert_eq!(last.kind(), TokenKind::EOF);
        assert_eq!(last.pos(), SourcePos::new(1, 9));
    }

    #[test]
    fn test_token_record_width() {
        let strings = StringInterner::new();
        let tokens = TokenArray::from_tokens(
            (0..3).map(|i| AlignedToken::new(TokenKind(1), ByteSpan::new(i, 1), SourcePos::start())),
        )
        .unwrap();
        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_tokens(&tokens, &strings);
        assert_eq!(bytes.len(), 8 + 4 + 4 + 3 * 28 + 4);
    }

    #[test]
    fn test_token_flags_round_trip() {
        let strings = StringInterner::new();
        let mut tokens = TokenArray::new();
        tokens.push(
            AlignedToken::new(TokenKind(3), ByteSpan::new(0, 3), SourcePos::start())
                .with_flags(AlignedToken::FLAG_KEYWORD | AlignedToken::FLAG_BOUNDARY),
        ).unwrap();
        tokens.push(AlignedToken::new(TokenKind(1), ByteSpan::new(4, 1), SourcePos::new(1, 5))).unwrap();
        tokens.push(AlignedToken::eof(5, SourcePos::new(1, 6))).unwrap();

        let mut ser = ZeroCopySerializer::new();
        let bytes = ser.serialize_tokens(&tokens, &strings).to_vec();
        let decoded = ser.deserialize_tokens(&bytes).unwrap();
        assert!(decoded.tokens.iter().eq(tokens.iter()));

        let keyword = decoded.tokens.get(0).unwrap();
        assert!(keyword.has_flag(AlignedToken::FLAG_KEYWORD));
        assert!(keyword.has_flag(AlignedToken::FLAG_BOUNDARY));
        assert!(!keyword.has_flag(AlignedToken::FLAG_EOF));
        assert_eq!(decoded.tokens.get(1).unwrap().flags(), 0);
        assert!(decoded.tokens.get(2).unwrap().has_flag(AlignedToken::FLAG_EOF));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "is not in the interner")]
    fn test_foreign_symbol_caught() {
        let mut other = StringInterner::new();
        let foreign = other.intern("elsewhere");
        let mut tokens = TokenArray::new();
        tokens.push(
            AlignedToken::new(TokenKind(1), ByteSpan::new(0, 1), SourcePos::start())
                .with_payload(TokenPayload::Interned(foreign)),
        ).unwrap();
        let mut ser = ZeroCopySerializer::new();
        ser.serialize_tokens(&tokens, &StringInterner::new());
    }
}
