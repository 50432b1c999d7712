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

//! Source positions and byte spans for tokens and AST nodes.
//!
//! Tokens and nodes carry two kinds of location: a [`ByteSpan`] (offset and
//! length into the source buffer, what the serializer stores) and a
//! [`SourcePos`] (1-based line and column, what diagnostics print).
//! [`LineIndex`] converts between the two.
//!
//! # Examples
//!
//! ```
//! use pathweave_memory::{ByteSpan, LineIndex, SourcePos};
//!
//! let index = LineIndex::new("let x\nlet y");
//! assert_eq!(index.position(6), SourcePos::new(2, 1));
//!
//! let span = ByteSpan::new(4, 1);
//! assert_eq!(span.end(), 5);
//! ```

use std::fmt;

/// A position in source code (line and column).
///
/// Line and column numbers are 1-indexed by convention; columns count
/// characters, not bytes. `SourcePos::default()` (0, 0) means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourcePos {
    line: u32,
    column: u32,
}

impl SourcePos {
    /// Creates a new source position.
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Creates a position at the start of the input (line 1, column 1).
    #[inline]
    pub const fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Returns the line number.
    #[inline]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Returns the column number.
    #[inline]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Advances the position past `ch`.
    #[inline]
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    /// Advances the position past every character of `text`.
    pub fn advance_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.advance(ch);
        }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A half-open byte range `[offset, offset + len)` into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteSpan {
    offset: u32,
    len: u32,
}

impl ByteSpan {
    /// Creates a span starting at `offset` covering `len` bytes.
    #[inline]
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// Creates a zero-width span at `offset`.
    #[inline]
    pub const fn point(offset: u32) -> Self {
        Self { offset, len: 0 }
    }

    /// Start offset (inclusive).
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Length in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Returns `true` for zero-width spans.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// End offset (exclusive).
    #[inline]
    pub const fn end(&self) -> u32 {
        self.offset + self.len
    }

    /// Smallest span covering both `self` and `other`.
    pub fn cover(self, other: ByteSpan) -> ByteSpan {
        let start = self.offset.min(other.offset);
        let end = self.end().max(other.end());
        ByteSpan::new(start, end - start)
    }

    /// Slices `source` by this span, if the span lies on char boundaries.
    pub fn slice<'s>(&self, source: &'s str) -> Option<&'s str> {
        source.get(self.offset as usize..self.end() as usize)
    }
}

impl fmt::Display for ByteSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.offset, self.end())
    }
}

/// Offset-to-position lookup table for one source buffer.
///
/// Built once per source in O(n); lookups are O(log lines).
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first character of each line.
    line_starts: Vec<u32>,
    /// Columns are counted in characters, so non-ASCII input keeps its text.
    text: Option<Box<str>>,
    source_len: u32,
}

impl LineIndex {
    /// Builds the index for `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        let text = if source.is_ascii() {
            None
        } else {
            Some(source.into())
        };
        Self {
            line_starts,
            text,
            source_len: source.len() as u32,
        }
    }

    /// Number of lines in the source (at least 1).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Converts a byte offset into a 1-based line/column position.
    ///
    /// Offsets past the end clamp to the end of input.
    pub fn position(&self, offset: u32) -> SourcePos {
        let offset = offset.min(self.source_len);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx];
        let column = match &self.text {
            None => offset - line_start,
            Some(text) => text
                .get(line_start as usize..offset as usize)
                .map(|s| s.chars().count() as u32)
                .unwrap_or(offset - line_start),
        };
        SourcePos::new(line_idx as u32 + 1, column + 1)
    }
}
