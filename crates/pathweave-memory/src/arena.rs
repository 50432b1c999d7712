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

//! Block-based bump arena for byte regions.
//!
//! A [`MemoryArena`] owns one or more contiguous blocks. Allocation bumps an
//! offset inside the current block; when a block is full a new one is
//! appended. Blocks are never moved or shrunk while the arena lives, so every
//! handed-out [`Region`] stays valid until [`MemoryArena::reset`].
//!
//! Regions are handles, not pointers: access goes through
//! [`MemoryArena::bytes`] / [`MemoryArena::bytes_mut`], which reject handles
//! from an earlier generation.
//!
//! # Examples
//!
//! ```
//! use pathweave_memory::{ArenaConfig, MemoryArena};
//!
//! let mut arena = MemoryArena::new(ArenaConfig::default());
//! let region = arena.alloc_copy(b"hello").unwrap();
//! assert_eq!(arena.bytes(region).unwrap(), b"hello");
//!
//! arena.reset();
//! assert!(arena.bytes(region).is_err());
//! ```

use crate::error::ResourceError;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(1);

/// Alignment policy for allocations that do not request one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Alignment {
    /// 8-byte alignment (pointer-sized records).
    #[default]
    A8,
    /// 16-byte alignment (SIMD lanes).
    A16,
    /// 32-byte alignment (half cache line, [`crate::AlignedToken`] records).
    A32,
}

impl Alignment {
    /// The alignment in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Alignment::A8 => 8,
            Alignment::A16 => 16,
            Alignment::A32 => 32,
        }
    }
}

/// Arena sizing and growth policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArenaConfig {
    block_size: usize,
    alignment: Alignment,
    max_bytes: Option<usize>,
}

impl ArenaConfig {
    /// Default block size (64 KiB).
    pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

    /// Create a configuration with default block size, 8-byte alignment and
    /// no hard cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the size of each newly grown block.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(64);
        self
    }

    /// Set the default alignment policy.
    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    /// Cap the total reserved bytes; growth beyond it fails with
    /// [`ResourceError::ArenaExhausted`].
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Block size for new blocks.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Default alignment.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Hard cap on reserved bytes, if any.
    pub fn max_bytes(&self) -> Option<usize> {
        self.max_bytes
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            alignment: Alignment::default(),
            max_bytes: None,
        }
    }
}

/// Handle to a byte range inside a [`MemoryArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    arena: u32,
    generation: u32,
    block: u32,
    offset: u32,
    len: u32,
}

impl Region {
    /// Index of the block holding this region.
    #[inline]
    pub fn block(&self) -> u32 {
        self.block
    }

    /// Offset of the first byte inside its block.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Returns `true` for zero-length regions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Arena generation the region was allocated in.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Usage snapshot of a [`MemoryArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArenaStats {
    /// Bytes handed out (including alignment padding).
    pub bytes_used: usize,
    /// Bytes reserved across all blocks.
    pub bytes_reserved: usize,
    /// Number of backing blocks.
    pub block_count: usize,
    /// Allocations since the last reset.
    pub allocation_count: usize,
    /// Number of resets so far.
    pub generation: u32,
}

struct Block {
    data: Box<[u8]>,
    used: usize,
}

impl Block {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    /// Offset inside this block where an allocation of `size` bytes aligned to
    /// `align` would start, if it fits.
    fn fit(&self, size: usize, align: usize) -> Option<usize> {
        let base = self.data.as_ptr() as usize;
        let cursor = base + self.used;
        let aligned = cursor.checked_add(align - 1)? & !(align - 1);
        let start = aligned - base;
        let end = start.checked_add(size)?;
        (end <= self.data.len()).then_some(start)
    }
}

/// Bump allocator over large contiguous byte blocks.
pub struct MemoryArena {
    id: u32,
    config: ArenaConfig,
    blocks: Vec<Block>,
    /// Block that receives small allocations.
    current: usize,
    generation: u32,
    bytes_used: usize,
    allocation_count: usize,
}

impl MemoryArena {
    /// Create an arena. No block is reserved until the first allocation.
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            config,
            blocks: Vec::new(),
            current: 0,
            generation: 0,
            bytes_used: 0,
            allocation_count: 0,
        }
    }

    /// The configuration this arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Allocate `size` zeroed bytes aligned to `align`.
    ///
    /// Either succeeds or grows a new block; fails only when the configured
    /// hard cap refuses growth, or `align` is not a supported power of two.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<Region, ResourceError> {
        if !align.is_power_of_two() || align > 32 {
            return Err(ResourceError::InvalidAlignment { align });
        }
        // Region lengths and offsets are u32.
        if u32::try_from(size).is_err() {
            return Err(self.exhausted(size, u32::MAX as usize));
        }

        if let Some(block) = self.blocks.get(self.current) {
            if let Some(start) = block.fit(size, align) {
                return self.commit(self.current, start, size);
            }
        }

        // Large requests get a dedicated block so the current one keeps
        // serving small allocations.
        let dedicated = size > self.config.block_size / 2;
        let capacity = if dedicated {
            size + align
        } else {
            self.config.block_size
        };
        let index = self.grow(capacity, size)?;
        if !dedicated {
            self.current = index;
        }
        let start = self.blocks[index]
            .fit(size, align)
            .ok_or_else(|| self.exhausted(size, self.config.max_bytes.unwrap_or(usize::MAX)))?;
        self.commit(index, start, size)
    }

    /// Allocate one contiguous region for `count` elements of `elem_size`
    /// bytes, using the arena's default alignment.
    pub fn allocate_batch(&mut self, count: usize, elem_size: usize) -> Result<Region, ResourceError> {
        let size = count
            .checked_mul(elem_size)
            .ok_or(ResourceError::ArenaExhausted {
                requested: usize::MAX,
                used: self.bytes_used,
                limit: self.config.max_bytes.unwrap_or(usize::MAX),
            })?;
        self.allocate(size, self.config.alignment.bytes())
    }

    /// Allocate a region and copy `data` into it.
    pub fn alloc_copy(&mut self, data: &[u8]) -> Result<Region, ResourceError> {
        let region = self.allocate(data.len(), 1)?;
        self.bytes_mut(region)?.copy_from_slice(data);
        Ok(region)
    }

    /// Read access to a region.
    pub fn bytes(&self, region: Region) -> Result<&[u8], ResourceError> {
        self.check(region)?;
        let start = region.offset as usize;
        Ok(&self.blocks[region.block as usize].data[start..start + region.len as usize])
    }

    /// Write access to a region.
    pub fn bytes_mut(&mut self, region: Region) -> Result<&mut [u8], ResourceError> {
        self.check(region)?;
        let start = region.offset as usize;
        Ok(&mut self.blocks[region.block as usize].data[start..start + region.len as usize])
    }

    /// Bulk-free every allocation.
    ///
    /// Blocks are kept for reuse; the generation advances so every earlier
    /// [`Region`] is rejected from now on.
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.used = 0;
        }
        // Dedicated oversized blocks are not worth keeping across generations.
        let block_size = self.config.block_size;
        self.blocks.retain(|b| b.data.len() <= block_size);
        self.current = 0;
        self.bytes_used = 0;
        self.allocation_count = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Usage snapshot.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            bytes_used: self.bytes_used,
            bytes_reserved: self.reserved(),
            block_count: self.blocks.len(),
            allocation_count: self.allocation_count,
            generation: self.generation,
        }
    }

    fn reserved(&self) -> usize {
        self.blocks.iter().map(|b| b.data.len()).sum()
    }

    fn grow(&mut self, capacity: usize, requested: usize) -> Result<usize, ResourceError> {
        if let Some(limit) = self.config.max_bytes {
            if self.reserved().saturating_add(capacity) > limit {
                return Err(ResourceError::ArenaExhausted {
                    requested,
                    used: self.bytes_used,
                    limit,
                });
            }
        }
        // After a reset, empty blocks after `current` are reused first.
        let reuse = (self.current + 1..self.blocks.len())
            .find(|&i| self.blocks[i].used == 0 && self.blocks[i].data.len() >= capacity);
        if let Some(index) = reuse {
            return Ok(index);
        }
        tracing::trace!(capacity, blocks = self.blocks.len() + 1, "arena grew a block");
        self.blocks.push(Block::with_capacity(capacity));
        Ok(self.blocks.len() - 1)
    }

    fn exhausted(&self, requested: usize, limit: usize) -> ResourceError {
        ResourceError::ArenaExhausted {
            requested,
            used: self.bytes_used,
            limit,
        }
    }

    fn commit(&mut self, block: usize, start: usize, size: usize) -> Result<Region, ResourceError> {
        let narrow = |value: usize| u32::try_from(value).map_err(|_| self.exhausted(size, u32::MAX as usize));
        let (block_index, offset, len) = (narrow(block)?, narrow(start)?, narrow(size)?);
        let b = &mut self.blocks[block];
        let padding = start - b.used;
        b.data[start..start + size].fill(0);
        b.used = start + size;
        self.bytes_used += padding + size;
        self.allocation_count += 1;
        Ok(Region {
            arena: self.id,
            generation: self.generation,
            block: block_index,
            offset,
            len,
        })
    }

    fn check(&self, region: Region) -> Result<(), ResourceError> {
        if region.arena != self.id
            || region.generation != self.generation
            || region.block as usize >= self.blocks.len()
        {
            return Err(ResourceError::StaleRegion {
                region_generation: region.generation,
                arena_generation: self.generation,
            });
        }
        Ok(())
    }
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl std::fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryArena")
            .field("id", &self.id)
            .field("stats", &self.stats())
            .finish()
    }
}
