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

//! Per-step scratch allocation.
//!
//! The step parser builds short-lived work lists (reduce closures, candidate
//! lists) on every step and throws them away at the end of it. Allocating
//! those from a bump arena that is reset between steps keeps the hot loop
//! free of allocator traffic once the arena has warmed up.
//!
//! Only the collections themselves live in the arena; anything that must
//! outlive the step is copied out before [`StepScratch::reset`].

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

/// Bump arena reset once per parser step.
pub struct StepScratch {
    bump: Bump,
    resets: u64,
}

impl StepScratch {
    /// Create an empty scratch arena.
    pub fn new() -> Self {
        Self {
            bump: Bump::new(),
            resets: 0,
        }
    }

    /// Create a scratch arena with `capacity` bytes pre-reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bump: Bump::with_capacity(capacity),
            resets: 0,
        }
    }

    /// Allocate a value in the arena and return a reference to it.
    pub fn alloc<T>(&self, value: T) -> &mut T {
        self.bump.alloc(value)
    }

    /// Start an empty vector backed by the arena.
    pub fn vec<T>(&self) -> BumpVec<'_, T> {
        BumpVec::new_in(&self.bump)
    }

    /// Start a vector backed by the arena with room for `capacity` items.
    pub fn vec_with_capacity<T>(&self, capacity: usize) -> BumpVec<'_, T> {
        BumpVec::with_capacity_in(capacity, &self.bump)
    }

    /// Free every allocation made since the last reset.
    ///
    /// Capacity is retained, so a warmed-up arena does not touch the global
    /// allocator again.
    pub fn reset(&mut self) {
        self.bump.reset();
        self.resets += 1;
    }

    /// Bytes currently held by the arena (including retained capacity).
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }

    /// Number of resets so far (one per parser step).
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

impl Default for StepScratch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepScratch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepScratch")
            .field("allocated_bytes", &self.allocated_bytes())
            .field("resets", &self.resets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_alloc() {
        let scratch = StepScratch::new();
        let x = scratch.alloc(42u32);
        *x += 1;
        assert_eq!(*x, 43);
    }

    #[test]
    fn test_scratch_vec() {
        let scratch = StepScratch::new();
        let mut items = scratch.vec();
        for i in 0..100u32 {
            items.push(i);
        }
        assert_eq!(items.len(), 100);
        assert_eq!(items[99], 99);
    }

    #[test]
    fn test_scratch_reset_reuses_capacity() {
        let mut scratch = StepScratch::with_capacity(4096);
        {
            let mut items = scratch.vec_with_capacity(256);
            items.extend(0..256u64);
        }
        let before = scratch.allocated_bytes();
        assert!(before > 0);

        scratch.reset();
        assert_eq!(scratch.resets(), 1);

        {
            let mut items = scratch.vec_with_capacity(256);
            items.extend(0..256u64);
        }
        // Retained capacity means the second step does not grow the arena.
        assert!(scratch.allocated_bytes() <= before);
    }
}
