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

//! Multi-path step lexer.
//!
//! The lexer never decides on its own which terminals to try: each step the
//! caller hands it a list of [`LexRequest`]s (a path plus the terminals
//! admissible for it) and gets back one [`TokenBatch`] with every token
//! matched for every request. A request that matches several terminals of
//! different lengths forks the path.
//!
//! Tokens are stored once per parse in a [`TokenArray`]; each path records
//! only its last token and the array keeps a predecessor link per token, so
//! forks share their common prefix.
//!
//! [`TokenBatches`] drives the same machinery without a parser, trying every
//! terminal of the current mode on every path.

mod matcher;
pub mod options;

pub use options::LexerOptions;

use pathweave_memory::{
    AlignedToken, ByteSpan, LineIndex, ObjectPool, PoolConfig, Pooled, SourcePos, StringInterner, TokenArray,
    TokenPayload,
};
use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::context::{ContextSensitiveEngine, ScopeTree};
use crate::error::{Error, LexError, ParseError};
use crate::grammar::{
    BracketEffect, Grammar, ModeEffect, ModeId, ScopeEffect, TerminalDef, TerminalId, TerminalSet,
};
use matcher::MatchMemo;

/// Predecessor marker for the first token of a path.
const NO_TOKEN: u32 = u32::MAX;

/// Index of a lexer path within one [`StepLexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LexPathId(pub u32);

impl LexPathId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle of a lexer path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexPathStatus {
    Active,
    Pruned,
    /// Matched end of input.
    Completed,
}

/// Mode stack, bracket depth and interpolation flag of one path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LexState {
    /// Pushed modes; empty means the default mode.
    modes: SmallVec<[ModeId; 4]>,
    nesting: u32,
    interpolating: bool,
}

impl LexState {
    /// Mode terminals are matched in.
    pub fn mode(&self) -> ModeId {
        self.modes.last().copied().unwrap_or(ModeId::DEFAULT)
    }

    /// Number of modes pushed above the default mode.
    pub fn mode_depth(&self) -> usize {
        self.modes.len()
    }

    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    /// Whether the current mode is an interpolation mode.
    pub fn is_interpolating(&self) -> bool {
        self.interpolating
    }

    /// State after matching `def`, or `None` if its effects cannot apply
    /// (popping the default mode, exceeding a depth limit).
    fn after(&self, def: &TerminalDef, grammar: &Grammar, options: &LexerOptions) -> Option<LexState> {
        if def.mode_effect == ModeEffect::None && def.bracket == BracketEffect::None {
            return Some(self.clone());
        }
        let mut next = self.clone();
        match def.mode_effect {
            ModeEffect::None => {}
            ModeEffect::PushMode(mode) => {
                if next.modes.len() >= options.max_mode_depth() {
                    return None;
                }
                next.modes.push(mode);
            }
            ModeEffect::PopMode => {
                next.modes.pop()?;
            }
        }
        match def.bracket {
            BracketEffect::None => {}
            BracketEffect::Open => {
                if next.nesting as usize >= options.max_nesting_depth() {
                    return None;
                }
                next.nesting += 1;
            }
            BracketEffect::Close => next.nesting = next.nesting.saturating_sub(1),
        }
        next.interpolating = grammar.mode(next.mode()).is_some_and(|m| m.interpolation);
        Some(next)
    }
}

/// One tokenization hypothesis.
#[derive(Debug, Clone)]
pub struct LexerPath {
    id: LexPathId,
    offset: u32,
    last_token: Option<u32>,
    state: LexState,
    status: LexPathStatus,
    origin: Option<LexPathId>,
}

impl LexerPath {
    pub fn id(&self) -> LexPathId {
        self.id
    }

    /// Byte offset just past the last token (before any trivia).
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Index of the path's last token in the shared [`TokenArray`].
    pub fn last_token(&self) -> Option<u32> {
        self.last_token
    }

    pub fn state(&self) -> &LexState {
        &self.state
    }

    pub fn status(&self) -> LexPathStatus {
        self.status
    }

    /// Path this one was advanced from.
    pub fn origin(&self) -> Option<LexPathId> {
        self.origin
    }
}

/// Advance `path` by one token drawn from `admissible`.
///
/// `scopes` is the requesting parser path's scope tree; scope restrictions
/// and symbol conditions are evaluated against its current context.
#[derive(Debug, Clone, Copy)]
pub struct LexRequest<'r> {
    pub path: LexPathId,
    pub admissible: &'r TerminalSet,
    pub scopes: &'r ScopeTree,
}

/// One token matched for one request.
#[derive(Debug, Clone, Copy)]
pub struct LexedToken {
    /// Index of the request in the slice passed to [`StepLexer::step`].
    pub request: u32,
    pub terminal: TerminalId,
    /// Index of the token in the shared [`TokenArray`].
    pub index: u32,
    pub token: AlignedToken,
    /// Path positioned after the token.
    pub path: LexPathId,
}

/// Every token produced by one lexer step.
#[derive(Debug)]
pub struct TokenBatch {
    step: u64,
    entries: Pooled<Vec<LexedToken>>,
}

impl TokenBatch {
    /// Step number (1-based).
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LexedToken> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[LexedToken] {
        &self.entries
    }
}

impl<'b> IntoIterator for &'b TokenBatch {
    type Item = &'b LexedToken;
    type IntoIter = std::slice::Iter<'b, LexedToken>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of [`StepLexer::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Offset after trivia.
    pub offset: u32,
    /// Longest match among the probed terminals.
    pub found: Option<(TerminalId, u32)>,
}

/// Lexer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LexerStats {
    pub steps: u64,
    pub paths: usize,
    pub tokens: usize,
    pub memo_entries: usize,
    pub memo_hits: u64,
    pub memo_misses: u64,
}

/// Multi-path lexer over one source buffer.
pub struct StepLexer<'a> {
    grammar: &'a Grammar,
    engine: ContextSensitiveEngine<'a>,
    source: &'a str,
    lines: LineIndex,
    options: LexerOptions,
    strings: &'a mut StringInterner,
    tokens: TokenArray,
    predecessors: Vec<u32>,
    paths: Vec<LexerPath>,
    successors: FxHashMap<(u32, u16, u32), LexPathId>,
    memo: MatchMemo,
    pool: ObjectPool<Vec<LexedToken>>,
    max_tokens: usize,
    steps: u64,
}

impl<'a> StepLexer<'a> {
    /// Create a lexer with one active path at offset 0.
    pub fn new(
        grammar: &'a Grammar,
        source: &'a str,
        strings: &'a mut StringInterner,
        options: LexerOptions,
    ) -> Self {
        Self {
            grammar,
            engine: ContextSensitiveEngine::new(grammar),
            source,
            lines: LineIndex::new(source),
            options,
            strings,
            tokens: TokenArray::new(),
            predecessors: Vec::new(),
            paths: vec![LexerPath {
                id: LexPathId(0),
                offset: 0,
                last_token: None,
                state: LexState::default(),
                status: LexPathStatus::Active,
                origin: None,
            }],
            successors: FxHashMap::default(),
            memo: MatchMemo::default(),
            pool: ObjectPool::new(PoolConfig::new().with_max_idle(4), Vec::new),
            max_tokens: usize::MAX,
            steps: 0,
        }
    }

    /// Fail a step once the token store would exceed `max` tokens.
    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    /// The path every parse starts from.
    pub fn root(&self) -> LexPathId {
        LexPathId(0)
    }

    pub fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn path(&self, id: LexPathId) -> Option<&LexerPath> {
        self.paths.get(id.index())
    }

    /// Every path created so far, in creation order.
    pub fn paths(&self) -> &[LexerPath] {
        &self.paths
    }

    /// The shared token store.
    pub fn tokens(&self) -> &TokenArray {
        &self.tokens
    }

    /// Source text of a stored token.
    pub fn token_text(&self, index: u32) -> Option<&'a str> {
        let span = self.tokens.span(index as usize)?;
        span.slice(self.source)
    }

    /// Token indices of `path`, first to last.
    pub fn path_tokens(&self, path: LexPathId) -> Vec<u32> {
        let mut out = Vec::new();
        let mut next = self.path(path).and_then(|p| p.last_token);
        while let Some(index) = next {
            out.push(index);
            next = self
                .predecessors
                .get(index as usize)
                .copied()
                .filter(|&p| p != NO_TOKEN);
        }
        out.reverse();
        out
    }

    /// Line/column of a byte offset.
    pub fn position(&self, offset: u32) -> SourcePos {
        self.lines.position(offset)
    }

    pub fn strings(&self) -> &StringInterner {
        self.strings
    }

    pub fn strings_mut(&mut self) -> &mut StringInterner {
        self.strings
    }

    pub fn stats(&self) -> LexerStats {
        let (memo_hits, memo_misses) = self.memo.counters();
        LexerStats {
            steps: self.steps,
            paths: self.paths.len(),
            tokens: self.tokens.len(),
            memo_entries: self.memo.len(),
            memo_hits,
            memo_misses,
        }
    }

    /// Mark a path dead; later requests for it yield nothing.
    pub fn prune(&mut self, path: LexPathId) {
        if let Some(p) = self.paths.get_mut(path.index()) {
            if p.status == LexPathStatus::Active {
                p.status = LexPathStatus::Pruned;
            }
        }
    }

    /// Offset of the next token of `path`, after trivia.
    pub fn content_offset(&mut self, path: LexPathId) -> u32 {
        match self.paths.get(path.index()) {
            Some(p) => {
                let mode = p.state.mode();
                self.memo.skip(self.grammar, self.source, p.offset, mode, self.options.max_lexeme_length())
            }
            None => self.source.len() as u32,
        }
    }

    /// Return a batch's buffer for reuse.
    pub fn recycle(&mut self, batch: TokenBatch) {
        // The buffer came from this lexer's pool, so release cannot fail.
        let _ = self.pool.release(batch.entries);
    }

    /// Advance every requested path by one token.
    ///
    /// Requests for paths that are not active produce nothing. Identical
    /// successors (same path, terminal and length) are created once and
    /// shared by every request that produces them.
    ///
    /// # Errors
    ///
    /// `ParseError::LimitExceeded` when the token store is full.
    pub fn step(&mut self, requests: &[LexRequest<'_>]) -> Result<TokenBatch, Error> {
        self.steps += 1;
        self.successors.clear();
        let mut entries = self.pool.acquire();
        for (i, request) in requests.iter().enumerate() {
            let active = self
                .path(request.path)
                .is_some_and(|p| p.status == LexPathStatus::Active);
            if !active {
                continue;
            }
            let (at, candidates) = self.candidates(request.path, request.admissible, request.scopes);
            for (terminal, len, state) in candidates {
                let (index, token, path) = self.advance(request.path, at, terminal, len, state)?;
                entries.push(LexedToken {
                    request: i as u32,
                    terminal,
                    index,
                    token,
                    path,
                });
            }
        }
        trace!(step = self.steps, requests = requests.len(), tokens = entries.len(), "lexer step");
        Ok(TokenBatch {
            step: self.steps,
            entries,
        })
    }

    /// Longest match of any terminal in `set` at `path`, without creating
    /// tokens or paths.
    pub fn probe(&mut self, path: LexPathId, set: &TerminalSet, scopes: &ScopeTree) -> Probe {
        let (offset, candidates) = self.candidates(path, set, scopes);
        Probe {
            offset,
            found: candidates.first().map(|&(t, len, _)| (t, len)),
        }
    }

    /// Matches for `path`, longest first, filtered by context and tie rules.
    fn candidates(
        &mut self,
        path: LexPathId,
        set: &TerminalSet,
        scopes: &ScopeTree,
    ) -> (u32, SmallVec<[(TerminalId, u32, LexState); 4]>) {
        let Some(p) = self.paths.get(path.index()) else {
            return (self.source.len() as u32, SmallVec::new());
        };
        let (offset, state) = (p.offset, p.state.clone());
        let mode = state.mode();
        let max_len = self.options.max_lexeme_length();
        let at = self.memo.skip(self.grammar, self.source, offset, mode, max_len);
        let Some(mode_set) = self.grammar.mode_terminals(mode) else {
            return (at, SmallVec::new());
        };

        let mut found: SmallVec<[(TerminalId, u32, LexState); 4]> = SmallVec::new();
        for terminal in set.iter() {
            if !mode_set.contains(terminal) {
                continue;
            }
            let Some(len) = self.memo.terminal(self.grammar, self.source, at, terminal, max_len) else {
                continue;
            };
            let text = &self.source[at as usize..(at + len) as usize];
            if !self.engine.token_allowed(terminal, text, scopes, scopes.current()) {
                continue;
            }
            if let Some(next) = state.after(self.grammar.terminal(terminal), self.grammar, &self.options) {
                found.push((terminal, len, next));
            }
        }
        // Stable: equal lengths stay in declaration order.
        found.sort_by(|a, b| b.1.cmp(&a.1));

        let longest = found.first().map(|c| c.1);
        let mut kept: SmallVec<[(TerminalId, u32, LexState); 4]> = SmallVec::new();
        for candidate in found {
            if self.options.longest_match_only() && Some(candidate.1) != longest {
                break;
            }
            let tie = kept.last().is_some_and(|k| k.1 == candidate.1);
            if tie && !self.options.fork_equal_length() {
                continue;
            }
            kept.push(candidate);
        }
        (at, kept)
    }

    fn advance(
        &mut self,
        from: LexPathId,
        at: u32,
        terminal: TerminalId,
        len: u32,
        state: LexState,
    ) -> Result<(u32, AlignedToken, LexPathId), Error> {
        let key = (from.0, terminal.0, len);
        if let Some(&existing) = self.successors.get(&key) {
            let index = self.paths[existing.index()].last_token.unwrap_or(NO_TOKEN);
            if let Some(token) = self.tokens.get(index as usize) {
                return Ok((index, token, existing));
            }
        }
        if self.tokens.len() >= self.max_tokens {
            return Err(ParseError::limit("token", self.tokens.len() + 1, self.max_tokens).into());
        }

        let grammar = self.grammar;
        let def = grammar.terminal(terminal);
        let pos = self.lines.position(at);
        let is_eof = terminal == grammar.eof();
        let token = if is_eof {
            AlignedToken::eof(at, pos)
        } else {
            let text = &self.source[at as usize..(at + len) as usize];
            let payload = match text.parse::<i64>() {
                Ok(value) if def.scalar => TokenPayload::Scalar(value),
                _ => TokenPayload::Interned(self.strings.intern(text)),
            };
            let mut flags = 0;
            if def.is_keyword() {
                flags |= AlignedToken::FLAG_KEYWORD;
            }
            if let ScopeEffect::Open(kind) = def.scope_effect {
                if grammar.language_of(kind).is_some() {
                    flags |= AlignedToken::FLAG_BOUNDARY;
                }
            }
            AlignedToken::new(terminal.token_kind(grammar), ByteSpan::new(at, len), pos)
                .with_payload(payload)
                .with_flags(flags)
        };

        let index = self.tokens.push(token)? as u32;
        let previous = self.paths[from.index()].last_token.unwrap_or(NO_TOKEN);
        self.predecessors.push(previous);
        let id = LexPathId(self.paths.len() as u32);
        self.paths.push(LexerPath {
            id,
            offset: at + len,
            last_token: Some(index),
            state,
            status: if is_eof {
                LexPathStatus::Completed
            } else {
                LexPathStatus::Active
            },
            origin: Some(from),
        });
        self.successors.insert(key, id);
        Ok((index, token, id))
    }
}

impl std::fmt::Debug for StepLexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepLexer")
            .field("source_len", &self.source.len())
            .field("paths", &self.paths.len())
            .field("tokens", &self.tokens.len())
            .field("steps", &self.steps)
            .finish()
    }
}

// ==================== Standalone tokenization ====================

/// Lazy, finite stream of token batches, one per lexer step.
///
/// Every active path is offered every terminal of its mode. Paths that end up
/// at the same offset in the same state after the same terminal are merged,
/// so overlapping terminals grow the live set linearly. The stream ends
/// when all paths have matched end of input, or yields one
/// `LexError::NoViablePath` and ends when every path dies first. To restart,
/// build a new stream over the same source.
pub struct TokenBatches<'a> {
    lexer: StepLexer<'a>,
    admissible: TerminalSet,
    scopes: ScopeTree,
    active: Vec<LexPathId>,
    done: bool,
}

impl<'a> TokenBatches<'a> {
    pub fn new(lexer: StepLexer<'a>) -> Self {
        let scopes = ScopeTree::new();
        let engine = ContextSensitiveEngine::new(lexer.grammar);
        let admissible = engine.valid_terminals(&scopes, scopes.current());
        let active = vec![lexer.root()];
        Self {
            lexer,
            admissible,
            scopes,
            active,
            done: false,
        }
    }

    /// The underlying lexer (token store, paths, interner).
    pub fn lexer(&self) -> &StepLexer<'a> {
        &self.lexer
    }

    /// Consume the stream, keeping the lexer.
    pub fn into_lexer(self) -> StepLexer<'a> {
        self.lexer
    }

    fn dead_end(&mut self) -> LexError {
        let mut offset = 0;
        let mut attempted = TerminalSet::default();
        for &path in &self.active {
            offset = offset.max(self.lexer.content_offset(path));
            let mode = self.lexer.path(path).map(|p| p.state.mode()).unwrap_or(ModeId::DEFAULT);
            if let Some(set) = self.lexer.grammar.mode_terminals(mode) {
                attempted.union_with(set);
            }
        }
        attempted.intersect_with(&self.admissible);
        let pos = self.lexer.position(offset);
        LexError::NoViablePath {
            offset: offset as usize,
            line: pos.line(),
            column: pos.column(),
            attempted: self.lexer.grammar.terminal_names(&attempted),
        }
    }
}

impl Iterator for TokenBatches<'_> {
    type Item = Result<TokenBatch, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.active.is_empty() {
            return None;
        }
        let requests: Vec<LexRequest<'_>> = self
            .active
            .iter()
            .map(|&path| LexRequest {
                path,
                admissible: &self.admissible,
                scopes: &self.scopes,
            })
            .collect();
        let batch = match self.lexer.step(&requests) {
            Ok(batch) => batch,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if batch.is_empty() {
            self.done = true;
            let err = self.dead_end();
            self.lexer.recycle(batch);
            return Some(Err(err.into()));
        }

        let mut advanced = vec![false; self.active.len()];
        let mut next = Vec::new();
        let mut merged = Vec::new();
        // Paths at the same offset in the same state after the same terminal
        // lex identically from here on; the first one created stands for all.
        let mut live: FxHashMap<(u32, LexState, TerminalId), LexPathId> = FxHashMap::default();
        for entry in &batch {
            advanced[entry.request as usize] = true;
            let Some(path) = self.lexer.path(entry.path) else {
                continue;
            };
            if path.status != LexPathStatus::Active {
                continue;
            }
            match live.entry((path.offset, path.state.clone(), entry.terminal)) {
                Entry::Vacant(slot) => {
                    slot.insert(entry.path);
                    next.push(entry.path);
                }
                Entry::Occupied(slot) if *slot.get() != entry.path => merged.push(entry.path),
                Entry::Occupied(_) => {}
            }
        }
        for (i, &path) in self.active.iter().enumerate() {
            if !advanced[i] {
                self.lexer.prune(path);
            }
        }
        for path in merged {
            self.lexer.prune(path);
        }
        self.active = next;
        Some(Ok(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;
    use pathweave_memory::TokenKind;

    fn calc() -> Grammar {
        let mut b = GrammarBuilder::new();
        b.pattern("NUMBER", "[0-9]+").scalar();
        b.identifier("IDENT", "[a-z]+");
        b.keyword("LET", "let");
        b.literal("GT", ">");
        b.literal("SHR", ">>");
        b.literal("PLUS", "+");
        b.skip("WS", r"\s+");
        b.rule("s", &["NUMBER"]);
        b.start("s");
        b.build().unwrap()
    }

    fn texts(lexer: &StepLexer<'_>, path: LexPathId) -> Vec<String> {
        lexer
            .path_tokens(path)
            .into_iter()
            .map(|i| lexer.token_text(i).unwrap_or("").to_string())
            .collect()
    }

    // ==================== Step tests ====================

    #[test]
    fn test_single_step() {
        let g = calc();
        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, "  12 + x", &mut strings, LexerOptions::default());
        let scopes = ScopeTree::new();
        let set: TerminalSet = [g.terminal_by_name("NUMBER").unwrap()].into_iter().collect();
        let batch = lexer
            .step(&[LexRequest {
                path: lexer.root(),
                admissible: &set,
                scopes: &scopes,
            }])
            .unwrap();
        assert_eq!(batch.len(), 1);
        let entry = batch.as_slice()[0];
        assert_eq!(entry.token.span(), ByteSpan::new(2, 2));
        assert_eq!(entry.token.payload(), TokenPayload::Scalar(12));
        assert_eq!(entry.token.pos(), SourcePos::new(1, 3));
        assert_eq!(lexer.path(entry.path).unwrap().offset(), 4);
    }

    #[test]
    fn test_different_lengths_fork() {
        let g = calc();
        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, ">>", &mut strings, LexerOptions::default());
        let scopes = ScopeTree::new();
        let set = TerminalSet::full(g.terminal_count());
        let batch = lexer
            .step(&[LexRequest {
                path: lexer.root(),
                admissible: &set,
                scopes: &scopes,
            }])
            .unwrap();
        let names: Vec<&str> = batch.iter().map(|e| g.terminal_name(e.terminal)).collect();
        assert_eq!(names, vec!["SHR", "GT"]);
    }

    #[test]
    fn test_longest_match_only() {
        let g = calc();
        let mut strings = StringInterner::new();
        let options = LexerOptions::new().with_longest_match_only(true);
        let mut lexer = StepLexer::new(&g, ">>", &mut strings, options);
        let scopes = ScopeTree::new();
        let set = TerminalSet::full(g.terminal_count());
        let batch = lexer
            .step(&[LexRequest {
                path: lexer.root(),
                admissible: &set,
                scopes: &scopes,
            }])
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(g.terminal_name(batch.as_slice()[0].terminal), "SHR");
    }

    #[test]
    fn test_keyword_wins_equal_length_tie() {
        let mut b = GrammarBuilder::new();
        b.keyword("LET", "let");
        b.pattern("WORD", "[a-z]+");
        b.rule("s", &["WORD"]);
        b.start("s");
        let g = b.build().unwrap();
        let scopes = ScopeTree::new();
        let set = TerminalSet::full(g.terminal_count());

        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, "let", &mut strings, LexerOptions::default());
        let root = lexer.root();
        let batch = lexer.step(&[LexRequest { path: root, admissible: &set, scopes: &scopes }]).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(g.terminal_name(batch.as_slice()[0].terminal), "LET");
        assert!(batch.as_slice()[0].token.has_flag(AlignedToken::FLAG_KEYWORD));

        let mut strings = StringInterner::new();
        let forking = LexerOptions::new().with_fork_equal_length(true);
        let mut lexer = StepLexer::new(&g, "let", &mut strings, forking);
        let batch = lexer.step(&[LexRequest { path: root, admissible: &set, scopes: &scopes }]).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_successors_deduplicated() {
        let g = calc();
        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, "7", &mut strings, LexerOptions::default());
        let scopes = ScopeTree::new();
        let set: TerminalSet = [g.terminal_by_name("NUMBER").unwrap()].into_iter().collect();
        let root = lexer.root();
        let request = LexRequest {
            path: root,
            admissible: &set,
            scopes: &scopes,
        };
        let batch = lexer.step(&[request, request]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.as_slice()[0].path, batch.as_slice()[1].path);
        assert_eq!(lexer.tokens().len(), 1);
    }

    #[test]
    fn test_eof_completes_path() {
        let g = calc();
        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, "  ", &mut strings, LexerOptions::default());
        let scopes = ScopeTree::new();
        let set: TerminalSet = [g.eof()].into_iter().collect();
        let root = lexer.root();
        let batch = lexer.step(&[LexRequest { path: root, admissible: &set, scopes: &scopes }]).unwrap();
        let entry = batch.as_slice()[0];
        assert!(entry.token.is_eof());
        assert_eq!(entry.token.kind(), TokenKind::EOF);
        assert_eq!(entry.token.span(), ByteSpan::point(2));
        assert_eq!(lexer.path(entry.path).unwrap().status(), LexPathStatus::Completed);
    }

    #[test]
    fn test_token_limit() {
        let g = calc();
        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, "1", &mut strings, LexerOptions::default()).with_max_tokens(0);
        let scopes = ScopeTree::new();
        let set = TerminalSet::full(g.terminal_count());
        let root = lexer.root();
        let err = lexer
            .step(&[LexRequest { path: root, admissible: &set, scopes: &scopes }])
            .unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError::LimitExceeded { limit: "token", .. })));
    }

    #[test]
    fn test_probe_does_not_create_tokens() {
        let g = calc();
        let mut strings = StringInterner::new();
        let mut lexer = StepLexer::new(&g, " x", &mut strings, LexerOptions::default());
        let scopes = ScopeTree::new();
        let set = TerminalSet::full(g.terminal_count());
        let root = lexer.root();
        let probe = lexer.probe(root, &set, &scopes);
        assert_eq!(probe.offset, 1);
        assert_eq!(probe.found, Some((g.terminal_by_name("IDENT").unwrap(), 1)));
        assert!(lexer.tokens().is_empty());
    }

    // ==================== Mode tests ====================

    #[test]
    fn test_mode_push_pop() {
        let mut b = GrammarBuilder::new();
        b.literal("QUOTE", "\"").push_mode("str");
        b.pattern("TEXT", r#"[^"]+"#).in_modes(&["str"]);
        b.literal("END", "\"").in_modes(&["str"]).pop_mode();
        b.identifier("IDENT", "[a-z]+");
        b.mode("str", true);
        b.rule("s", &["IDENT"]);
        b.start("s");
        let g = b.build().unwrap();

        let mut strings = StringInterner::new();
        let lexer = StepLexer::new(&g, "a\"b c\"d", &mut strings, LexerOptions::default());
        let mut batches = TokenBatches::new(lexer);
        let mut saw_interpolating = false;
        while let Some(batch) = batches.next() {
            let batch = batch.unwrap();
            for entry in &batch {
                let path = batches.lexer().path(entry.path).unwrap();
                saw_interpolating |= path.state().is_interpolating();
            }
        }
        assert!(saw_interpolating);
        let lexer = batches.into_lexer();
        let done = lexer
            .paths()
            .iter()
            .find(|p| p.status() == LexPathStatus::Completed)
            .unwrap();
        assert_eq!(texts(&lexer, done.id()), vec!["a", "\"", "b c", "\"", "d", ""]);
        assert_eq!(done.state().mode(), ModeId::DEFAULT);
    }

    // ==================== Standalone stream tests ====================

    #[test]
    fn test_token_batches_finish() {
        let g = calc();
        let mut strings = StringInterner::new();
        let lexer = StepLexer::new(&g, "let x + 1", &mut strings, LexerOptions::default());
        let batches: Vec<_> = TokenBatches::new(lexer).collect();
        // let, x, +, 1, <eof>
        assert_eq!(batches.len(), 5);
        assert!(batches.iter().all(|b| b.is_ok()));
    }

    #[test]
    fn test_token_batches_merge_overlapping_paths() {
        let g = calc();
        let source = ">".repeat(40);
        let mut strings = StringInterner::new();
        let lexer = StepLexer::new(&g, &source, &mut strings, LexerOptions::default());
        let mut batches = TokenBatches::new(lexer);
        let mut widest = 0;
        while let Some(batch) = batches.next() {
            widest = widest.max(batch.unwrap().len());
        }
        // one live path per (offset, last terminal), each forking GT/SHR
        assert!(widest <= 4 * (source.len() + 1), "batch of {widest} tokens");
        let lexer = batches.into_lexer();
        assert!(lexer.paths().len() < 4_000, "{} lexer paths", lexer.paths().len());

        let done = lexer
            .paths()
            .iter()
            .find(|p| p.status() == LexPathStatus::Completed)
            .unwrap();
        let lexed: String = texts(&lexer, done.id()).concat();
        assert_eq!(lexed, source);
    }

    #[test]
    fn test_token_batches_dead_end() {
        let g = calc();
        let mut strings = StringInterner::new();
        let lexer = StepLexer::new(&g, "1 $", &mut strings, LexerOptions::default());
        let mut batches = TokenBatches::new(lexer);
        assert!(batches.next().unwrap().is_ok());
        let err = batches.next().unwrap().unwrap_err();
        match err {
            Error::Lex(LexError::NoViablePath {
                offset,
                line,
                column,
                attempted,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!((line, column), (1, 3));
                assert!(attempted.contains(&"NUMBER".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(batches.next().is_none());
    }
}
