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

//! Configuration for the step lexer.
//!
//! Defaults suit trusted grammars and input. For untrusted input use
//! `LexerOptions::strict()` or tighten individual limits.

/// Step lexer behavior and resource limits.
///
/// # Examples
///
/// ```
/// use pathweave_core::LexerOptions;
///
/// let options = LexerOptions::default();
/// assert!(!options.fork_equal_length());
///
/// let forking = LexerOptions::new()
///     .with_fork_equal_length(true)
///     .with_max_lexeme_length(4096);
/// assert!(forking.fork_equal_length());
/// assert_eq!(forking.max_lexeme_length(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LexerOptions {
    /// Fork on equal-length matches of different terminals.
    ///
    /// When off, the first-declared terminal wins a length tie.
    fork_equal_length: bool,

    /// Keep only the longest match per path (no length-based forking).
    ///
    /// Default: off, shorter matches fork new paths.
    longest_match_only: bool,

    /// Maximum length of a single lexeme in bytes.
    ///
    /// Default: 16 MB.
    max_lexeme_length: usize,

    /// Maximum lexer mode stack depth.
    ///
    /// Default: 256 levels.
    max_mode_depth: usize,

    /// Maximum bracket nesting depth tracked per path.
    ///
    /// Default: 1,000 levels.
    max_nesting_depth: usize,
}

impl LexerOptions {
    /// Default maximum lexeme length (16 MB).
    pub const DEFAULT_MAX_LEXEME_LENGTH: usize = 16 * 1024 * 1024;

    /// Default maximum mode stack depth (256 levels).
    pub const DEFAULT_MAX_MODE_DEPTH: usize = 256;

    /// Default maximum bracket nesting depth (1,000 levels).
    pub const DEFAULT_MAX_NESTING_DEPTH: usize = 1_000;

    /// Create options with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict limits for untrusted input.
    pub fn strict() -> Self {
        Self {
            fork_equal_length: false,
            longest_match_only: true,
            max_lexeme_length: 64 * 1024,
            max_mode_depth: 32,
            max_nesting_depth: 128,
        }
    }

    /// Fork on equal-length matches.
    #[inline]
    pub fn with_fork_equal_length(mut self, fork: bool) -> Self {
        self.fork_equal_length = fork;
        self
    }

    /// Keep only the longest match per path.
    #[inline]
    pub fn with_longest_match_only(mut self, longest: bool) -> Self {
        self.longest_match_only = longest;
        self
    }

    /// Set the maximum lexeme length in bytes.
    #[inline]
    pub fn with_max_lexeme_length(mut self, max: usize) -> Self {
        self.max_lexeme_length = max;
        self
    }

    /// Set the maximum mode stack depth.
    #[inline]
    pub fn with_max_mode_depth(mut self, max: usize) -> Self {
        self.max_mode_depth = max;
        self
    }

    /// Set the maximum bracket nesting depth.
    #[inline]
    pub fn with_max_nesting_depth(mut self, max: usize) -> Self {
        self.max_nesting_depth = max;
        self
    }

    #[inline]
    pub fn fork_equal_length(&self) -> bool {
        self.fork_equal_length
    }

    #[inline]
    pub fn longest_match_only(&self) -> bool {
        self.longest_match_only
    }

    #[inline]
    pub fn max_lexeme_length(&self) -> usize {
        self.max_lexeme_length
    }

    #[inline]
    pub fn max_mode_depth(&self) -> usize {
        self.max_mode_depth
    }

    #[inline]
    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            fork_equal_length: false,
            longest_match_only: false,
            max_lexeme_length: Self::DEFAULT_MAX_LEXEME_LENGTH,
            max_mode_depth: Self::DEFAULT_MAX_MODE_DEPTH,
            max_nesting_depth: Self::DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}
