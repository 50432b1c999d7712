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

//! Terminal matching and the per-parse match memo.

use rustc_hash::FxHashMap;

use crate::grammar::{Grammar, ModeId, TerminalDef, TerminalId, TerminalPattern};

/// Length of the match of `def` at the start of `rest`.
///
/// Only end of input may match the empty string.
pub(crate) fn match_terminal(def: &TerminalDef, rest: &str, grammar: &Grammar) -> Option<usize> {
    let len = match &def.pattern {
        TerminalPattern::EndOfInput => return rest.is_empty().then_some(0),
        TerminalPattern::Literal(text) => rest.starts_with(text.as_str()).then_some(text.len())?,
        TerminalPattern::Keyword(text) => {
            if !rest.starts_with(text.as_str()) {
                return None;
            }
            if rest[text.len()..].chars().next().is_some_and(is_ident_char) {
                return None;
            }
            text.len()
        }
        TerminalPattern::Pattern {
            regex,
            exclude_reserved,
            ..
        } => {
            let m = regex.find(rest)?;
            if m.start() != 0 {
                return None;
            }
            if *exclude_reserved && grammar.is_reserved(m.as_str()) {
                return None;
            }
            m.end()
        }
    };
    (len > 0).then_some(len)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Memoized match results for one source buffer.
///
/// Forked paths often sit at the same offset; each (offset, terminal) pair is
/// matched against the source at most once per parse.
#[derive(Debug, Default)]
pub(crate) struct MatchMemo {
    matches: FxHashMap<(u32, u16), Option<u32>>,
    skips: FxHashMap<(u32, u16), u32>,
    hits: u64,
    misses: u64,
}

impl MatchMemo {
    /// Match length of `terminal` at `offset`, if it matches within `max_len`.
    pub(crate) fn terminal(
        &mut self,
        grammar: &Grammar,
        source: &str,
        offset: u32,
        terminal: TerminalId,
        max_len: usize,
    ) -> Option<u32> {
        if let Some(&cached) = self.matches.get(&(offset, terminal.0)) {
            self.hits += 1;
            return cached;
        }
        self.misses += 1;
        let result = source
            .get(offset as usize..)
            .and_then(|rest| match_terminal(grammar.terminal(terminal), rest, grammar))
            .filter(|&len| len <= max_len)
            .map(|len| len as u32);
        self.matches.insert((offset, terminal.0), result);
        result
    }

    /// Offset after any trivia of `mode` starting at `offset`.
    pub(crate) fn skip(&mut self, grammar: &Grammar, source: &str, offset: u32, mode: ModeId, max_len: usize) -> u32 {
        if let Some(&end) = self.skips.get(&(offset, mode.0)) {
            return end;
        }
        let skips = grammar.mode_skips(mode);
        let mut at = offset;
        loop {
            let longest = skips
                .iter()
                .filter_map(|&t| self.terminal(grammar, source, at, t, max_len))
                .max();
            match longest {
                Some(len) => at += len,
                None => break,
            }
        }
        self.skips.insert((offset, mode.0), at);
        at
    }

    /// (hits, misses) of the match table.
    pub(crate) fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub(crate) fn len(&self) -> usize {
        self.matches.len()
    }
}
