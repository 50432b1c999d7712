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

//! Resource limits for multi-path parsing.

/// Configurable bounds on the work a single parse may do.
///
/// Ambiguous grammars can fork paths combinatorially; these limits keep the
/// worst case bounded. Only `max_active_paths` prunes silently (lowest score
/// first); every other limit aborts the parse with
/// [`ParseError::LimitExceeded`](crate::ParseError::LimitExceeded).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum source size in bytes (default: 64MB).
    pub max_source_size: usize,
    /// Maximum simultaneously active parser paths (default: 64).
    pub max_active_paths: usize,
    /// Maximum parser steps (default: 10M).
    pub max_steps: usize,
    /// Maximum reductions a single path may perform in one step (default: 10k).
    pub max_reductions_per_step: usize,
    /// Maximum tokens stored for one parse, across all paths (default: 10M).
    pub max_tokens: usize,
    /// Maximum live scratch tree nodes for one parse, across all paths
    /// (default: 10M). Nodes released after their paths were pruned do not count.
    pub max_nodes: usize,
    /// Maximum nested scope depth (default: 256).
    pub max_scope_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_source_size: 64 * 1024 * 1024, // 64MB
            max_active_paths: 64,
            max_steps: 10_000_000,
            max_reductions_per_step: 10_000,
            max_tokens: 10_000_000,
            max_nodes: 10_000_000,
            max_scope_depth: 256,
        }
    }
}

impl Limits {
    /// Create limits with no restrictions (for testing).
    pub fn unlimited() -> Self {
        Self {
            max_source_size: usize::MAX,
            max_active_paths: usize::MAX,
            max_steps: usize::MAX,
            max_reductions_per_step: usize::MAX,
            max_tokens: usize::MAX,
            max_nodes: usize::MAX,
            max_scope_depth: usize::MAX,
        }
    }

    /// Tight limits for untrusted input.
    pub fn strict() -> Self {
        Self {
            max_source_size: 1024 * 1024, // 1MB
            max_active_paths: 16,
            max_steps: 1_000_000,
            max_reductions_per_step: 1_000,
            max_tokens: 1_000_000,
            max_nodes: 1_000_000,
            max_scope_depth: 64,
        }
    }
}
