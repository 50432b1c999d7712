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

//! Parser configuration.

use crate::lexer::LexerOptions;
use crate::limits::Limits;

/// What to do when more than one path accepts the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AmbiguityPolicy {
    /// Fail with `ParseError::UnresolvedAmbiguity`.
    #[default]
    Report,
    /// Keep the accepted path with the lowest id (created first).
    FirstCreated,
    /// Keep the accepted path with the highest score; ties go to the lowest id.
    HighestScore,
}

/// Options for a multi-path parse.
///
/// # Examples
///
/// ```
/// use pathweave_core::{AmbiguityPolicy, ParseOptions};
///
/// let opts = ParseOptions::builder()
///     .max_active_paths(8)
///     .ambiguity(AmbiguityPolicy::FirstCreated)
///     .build();
/// assert_eq!(opts.limits.max_active_paths, 8);
///
/// // Direct field access works too
/// let mut opts = ParseOptions::default();
/// opts.strict_symbols = false;
/// opts.limits.max_steps = 1_000;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseOptions {
    /// Resource limits.
    pub limits: Limits,
    /// Lexer behavior.
    pub lexer: LexerOptions,
    /// Resolution of multiple accepted paths.
    pub ambiguity: AmbiguityPolicy,
    /// Prune paths whose symbol references do not resolve. When off, an
    /// unresolved reference only lowers the path's score.
    pub strict_symbols: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            lexer: LexerOptions::default(),
            ambiguity: AmbiguityPolicy::Report,
            strict_symbols: true,
        }
    }
}

impl ParseOptions {
    /// Create a new builder for ParseOptions.
    pub fn builder() -> ParseOptionsBuilder {
        ParseOptionsBuilder::new()
    }

    /// Strict limits and lexer options for untrusted input.
    pub fn strict() -> Self {
        Self {
            limits: Limits::strict(),
            lexer: LexerOptions::strict(),
            ..Self::default()
        }
    }
}

/// Fluent construction of [`ParseOptions`].
#[derive(Debug, Clone)]
pub struct ParseOptionsBuilder {
    options: ParseOptions,
}

impl ParseOptionsBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self {
            options: ParseOptions::default(),
        }
    }

    /// Replace all limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.options.limits = limits;
        self
    }

    /// Replace the lexer options.
    pub fn lexer(mut self, lexer: LexerOptions) -> Self {
        self.options.lexer = lexer;
        self
    }

    /// Set the ambiguity policy (default: `Report`).
    pub fn ambiguity(mut self, policy: AmbiguityPolicy) -> Self {
        self.options.ambiguity = policy;
        self
    }

    /// Set strict symbol resolution (default: true).
    pub fn strict_symbols(mut self, strict: bool) -> Self {
        self.options.strict_symbols = strict;
        self
    }

    /// Set the maximum source size in bytes (default: 64MB).
    pub fn max_source_size(mut self, size: usize) -> Self {
        self.options.limits.max_source_size = size;
        self
    }

    /// Set the active path cap (default: 64). Values below 1 act as 1.
    pub fn max_active_paths(mut self, count: usize) -> Self {
        self.options.limits.max_active_paths = count;
        self
    }

    /// Set the maximum number of parser steps (default: 10M).
    pub fn max_steps(mut self, count: usize) -> Self {
        self.options.limits.max_steps = count;
        self
    }

    /// Set the per-path reduction bound for one step (default: 10k).
    pub fn max_reductions_per_step(mut self, count: usize) -> Self {
        self.options.limits.max_reductions_per_step = count;
        self
    }

    /// Set the maximum number of stored tokens (default: 10M).
    pub fn max_tokens(mut self, count: usize) -> Self {
        self.options.limits.max_tokens = count;
        self
    }

    /// Set the maximum number of tree nodes (default: 10M).
    pub fn max_nodes(mut self, count: usize) -> Self {
        self.options.limits.max_nodes = count;
        self
    }

    /// Set the maximum scope nesting depth (default: 256).
    pub fn max_scope_depth(mut self, depth: usize) -> Self {
        self.options.limits.max_scope_depth = depth;
        self
    }

    /// Fork on equal-length lexer matches.
    pub fn fork_equal_length(mut self, fork: bool) -> Self {
        self.options.lexer = self.options.lexer.with_fork_equal_length(fork);
        self
    }

    /// Build the ParseOptions.
    pub fn build(self) -> ParseOptions {
        self.options
    }
}

impl Default for ParseOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Default tests ====================

    #[test]
    fn test_defaults() {
        let opts = ParseOptions::default();
        assert_eq!(opts.limits, Limits::default());
        assert_eq!(opts.ambiguity, AmbiguityPolicy::Report);
        assert!(opts.strict_symbols);
        assert!(!opts.lexer.fork_equal_length());
    }

    #[test]
    fn test_strict_preset() {
        let opts = ParseOptions::strict();
        assert_eq!(opts.limits, Limits::strict());
        assert!(opts.lexer.longest_match_only());
        assert!(opts.strict_symbols);
    }

    // ==================== Builder tests ====================

    #[test]
    fn test_builder_defaults_match_default() {
        assert_eq!(ParseOptions::builder().build(), ParseOptions::default());
    }

    #[test]
    fn test_builder_chain() {
        let opts = ParseOptions::builder()
            .max_source_size(10)
            .max_active_paths(2)
            .max_steps(3)
            .max_reductions_per_step(4)
            .max_tokens(5)
            .max_nodes(6)
            .max_scope_depth(7)
            .ambiguity(AmbiguityPolicy::HighestScore)
            .strict_symbols(false)
            .fork_equal_length(true)
            .build();
        assert_eq!(opts.limits.max_source_size, 10);
        assert_eq!(opts.limits.max_active_paths, 2);
        assert_eq!(opts.limits.max_steps, 3);
        assert_eq!(opts.limits.max_reductions_per_step, 4);
        assert_eq!(opts.limits.max_tokens, 5);
        assert_eq!(opts.limits.max_nodes, 6);
        assert_eq!(opts.limits.max_scope_depth, 7);
        assert_eq!(opts.ambiguity, AmbiguityPolicy::HighestScore);
        assert!(!opts.strict_symbols);
        assert!(opts.lexer.fork_equal_length());
    }

    #[test]
    fn test_builder_replaces_limits() {
        let opts = ParseOptions::builder().limits(Limits::unlimited()).build();
        assert_eq!(opts.limits.max_steps, usize::MAX);
    }
}
