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

//! Error types for the memory substrate.
//!
//! Three families, each fatal to the operation that raised it:
//!
//! - [`ResourceError`] - arena caps, stale handles, pool misuse
//! - [`StructuralError`] - AST ownership and topology violations
//! - [`IntegrityError`] - corrupted or foreign serialized payloads

use thiserror::Error;

/// Resource exhaustion or lifecycle misuse.
///
/// Carries enough context (request size, current usage) for the caller to
/// decide whether to retry with a larger budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// The arena hit its configured hard cap and may not grow another block.
    #[error("arena exhausted: requested {requested} bytes with {used} of {limit} bytes in use")]
    ArenaExhausted {
        requested: usize,
        used: usize,
        limit: usize,
    },

    /// Alignment is not one of the supported powers of two.
    #[error("unsupported alignment {align} (expected 1, 2, 4, 8, 16 or 32)")]
    InvalidAlignment { align: usize },

    /// A region handle from a released generation or another arena.
    #[error("stale region: handle generation {region_generation}, arena generation {arena_generation}")]
    StaleRegion {
        region_generation: u32,
        arena_generation: u32,
    },

    /// An object was released into a pool it was not acquired from.
    #[error("pool misuse: object from pool #{origin} released into pool #{target}")]
    PoolMisuse { origin: u64, target: u64 },
}

impl ResourceError {
    /// Returns `true` if retrying with a larger budget could succeed.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResourceError::ArenaExhausted { .. })
    }
}

/// Violations of AST ownership rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StructuralError {
    /// The child already has a parent; nodes are owned by exactly one parent.
    #[error("node {child} already owned by node {existing_parent}, cannot add to node {new_parent}")]
    MultipleOwners {
        child: u32,
        existing_parent: u32,
        new_parent: u32,
    },

    /// Attaching the child would make a node its own ancestor.
    #[error("adding node {child} under node {parent} would create a cycle")]
    CycleDetected { parent: u32, child: u32 },

    /// A node id that does not exist in this tree.
    #[error("unknown node id {id} (tree has {len} nodes)")]
    UnknownNode { id: u32, len: usize },
}

/// Serialized payload failed validation.
///
/// Deserialization never returns partially decoded data alongside one of
/// these errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntegrityError {
    /// The leading magic bytes are not a Pathweave payload.
    #[error("magic mismatch: expected {expected:?}, found {found:?}")]
    MagicMismatch { expected: [u8; 4], found: [u8; 4] },

    /// The format version is newer or older than this build understands.
    #[error("unsupported format version {found} (supported: {supported})")]
    VersionUnsupported { found: u16, supported: u16 },

    /// CRC32 over the payload does not match the trailing checksum.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// The payload ended before a complete value could be read.
    #[error("truncated payload: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Checksum-valid data that violates the format's structural rules.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl IntegrityError {
    /// Returns `true` if the payload was damaged after it was written.
    #[inline]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            IntegrityError::ChecksumMismatch { .. } | IntegrityError::Truncated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_exhausted_message_carries_sizes() {
        let err = ResourceError::ArenaExhausted {
            requested: 128,
            used: 4000,
            limit: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("128"));
        assert!(msg.contains("4096"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_pool_misuse_not_retryable() {
        let err = ResourceError::PoolMisuse { origin: 1, target: 2 };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_multiple_owners_message() {
        let err = StructuralError::MultipleOwners {
            child: 3,
            existing_parent: 1,
            new_parent: 2,
        };
        assert_eq!(
            err.to_string(),
            "node 3 already owned by node 1, cannot add to node 2"
        );
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let err = IntegrityError::ChecksumMismatch {
            stored: 1,
            computed: 2,
        };
        assert!(err.is_corruption());
        assert!(!IntegrityError::Malformed("x".into()).is_corruption());
    }
}
