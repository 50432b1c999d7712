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

//! String interning.
//!
//! [`StringInterner`] maps string content to dense [`Symbol`] ids and back.
//! Text is copied once into a [`MemoryArena`]; the lookup table stores only
//! ids, so interning a string that is already present allocates nothing.
//!
//! Hashing uses SipHash with per-interner random keys, so adversarial input
//! (for example embedded-language source fragments) cannot force collisions.
//!
//! # Examples
//!
//! ```
//! use pathweave_memory::StringInterner;
//!
//! let mut strings = StringInterner::new();
//! let a = strings.intern("\"foo\"");
//! let b = strings.intern("\"foo\"");
//! assert_eq!(a, b);
//! assert_eq!(strings.resolve(a), Some("\"foo\""));
//! assert_eq!(strings.stats().unique_count, 1);
//! ```

use crate::arena::{ArenaConfig, ArenaStats, MemoryArena, Region};
use crate::error::IntegrityError;
use crate::serialize::{flags, FrameReader, FrameWriter};
use hashbrown::HashTable;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::BuildHasher;

/// Dense id of an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol(u32);

impl Symbol {
    /// Wrap a raw id (as stored in serialized tables).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// The id as a table index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interner usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InternerStats {
    /// Number of distinct strings.
    pub unique_count: usize,
    /// Total `intern` calls, hits included.
    pub total_intern_calls: u64,
    /// Bytes of string content stored.
    pub bytes: usize,
    /// Backing arena usage.
    pub arena: ArenaStats,
}

/// Append-only bijection between strings and [`Symbol`]s.
pub struct StringInterner {
    arena: MemoryArena,
    entries: Vec<Region>,
    table: HashTable<u32>,
    hasher: RandomState,
    intern_calls: u64,
    text_bytes: usize,
}

fn region_text(arena: &MemoryArena, region: Region) -> &str {
    // Every region was written from a `&str` and the arena is never reset
    // while the interner lives, so both lookups succeed.
    match arena.bytes(region).map(std::str::from_utf8) {
        Ok(Ok(text)) => text,
        _ => {
            debug_assert!(false, "interner region no longer holds valid text");
            ""
        }
    }
}

impl StringInterner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::with_block_size(16 * 1024)
    }

    /// Create an interner whose text arena grows in blocks of `block_size`.
    pub fn with_block_size(block_size: usize) -> Self {
        Self::with_config(ArenaConfig::new().with_block_size(block_size))
    }

    // The text arena is always uncapped; see `insert_new`.
    fn with_config(config: ArenaConfig) -> Self {
        Self {
            arena: MemoryArena::new(config),
            entries: Vec::new(),
            table: HashTable::new(),
            hasher: RandomState::new(),
            intern_calls: 0,
            text_bytes: 0,
        }
    }

    /// Intern `text`, returning the existing id when the content is known.
    ///
    /// # Panics
    ///
    /// If `text` is longer than `u32::MAX` bytes, the largest arena region.
    pub fn intern(&mut self, text: &str) -> Symbol {
        self.intern_calls += 1;
        if let Some(sym) = self.get(text) {
            return sym;
        }
        self.insert_new(text)
    }

    /// Look up `text` without inserting it.
    pub fn get(&self, text: &str) -> Option<Symbol> {
        let hash = self.hasher.hash_one(text);
        self.table
            .find(hash, |&id| {
                region_text(&self.arena, self.entries[id as usize]) == text
            })
            .map(|&id| Symbol(id))
    }

    /// Resolve an id back to its text. O(1) lookup.
    pub fn resolve(&self, symbol: Symbol) -> Option<&str> {
        self.entries
            .get(symbol.index())
            .map(|&region| region_text(&self.arena, region))
    }

    /// Number of distinct strings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(symbol, text)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, &region)| (Symbol(i as u32), region_text(&self.arena, region)))
    }

    /// Usage counters.
    pub fn stats(&self) -> InternerStats {
        InternerStats {
            unique_count: self.entries.len(),
            total_intern_calls: self.intern_calls,
            bytes: self.text_bytes,
            arena: self.arena.stats(),
        }
    }

    /// Encode the table (ids are positions) with the standard frame.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = FrameWriter::begin(flags::STRINGS);
        writer.string_table(self.iter().map(|(_, text)| text));
        writer.finish()
    }

    /// Decode a table produced by [`StringInterner::serialize`].
    ///
    /// Ids are preserved: the n-th string gets `Symbol(n)`.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, IntegrityError> {
        let mut reader = FrameReader::open(bytes)?;
        reader.expect_flags(flags::STRINGS)?;
        let strings = reader.string_table()?;
        reader.finish()?;

        let mut interner = Self::new();
        for (i, text) in strings.into_iter().enumerate() {
            let sym = interner.intern(text);
            if sym.index() != i {
                return Err(IntegrityError::Malformed(format!(
                    "duplicate string {:?} at table index {}",
                    text, i
                )));
            }
        }
        interner.intern_calls = 0;
        Ok(interner)
    }

    fn insert_new(&mut self, text: &str) -> Symbol {
        let region = match self.arena.alloc_copy(text.as_bytes()) {
            Ok(region) => region,
            // Uncapped arena: only a text past the u32 region range is refused.
            Err(err) => panic!("cannot intern {} bytes: {}", text.len(), err),
        };
        let id = self.entries.len() as u32;
        self.entries.push(region);
        self.text_bytes += text.len();

        let hash = self.hasher.hash_one(text);
        let Self {
            arena,
            entries,
            table,
            hasher,
            ..
        } = self;
        table.insert_unique(hash, id, |&existing| {
            hasher.hash_one(region_text(arena, entries[existing as usize]))
        });
        Symbol(id)
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StringInterner {
    fn clone(&self) -> Self {
        let mut copy = Self::with_config(*self.arena.config());
        for (_, text) in self.iter() {
            copy.insert_new(text);
        }
        copy.intern_calls = self.intern_calls;
        copy
    }
}

impl fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringInterner")
            .field("len", &self.entries.len())
            .field("bytes", &self.text_bytes)
            .finish()
    }
}
