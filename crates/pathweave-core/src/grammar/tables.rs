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

//! LR(0) automaton with SLR(1) lookahead sets.
//!
//! Conflicts are kept rather than resolved: a state may both shift and
//! reduce, or reduce by several productions, for the same lookahead. The
//! step parser forks a path for each alternative, so the tables only need
//! to be sound, not deterministic.

use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::terminal_set::TerminalSet;
use super::{GrammarSymbol, NonTerminalDef, NonTerminalId, Production, ProductionId, TerminalId};

/// Index of an LR state. State 0 is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl StateId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Production index of the augmented start rule `S' -> S`.
const AUGMENTED: u32 = u32::MAX;

/// An LR(0) item: a production with a dot position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Item {
    production: u32,
    dot: u32,
}

/// Actions of one LR state.
#[derive(Debug, Clone, Default)]
pub struct LrState {
    shifts: Vec<(TerminalId, StateId)>,
    gotos: Vec<(NonTerminalId, StateId)>,
    reductions: SmallVec<[ProductionId; 2]>,
    accept: bool,
    shift_set: TerminalSet,
}

impl LrState {
    /// Target of shifting `terminal`, if the state can shift it.
    pub fn shift(&self, terminal: TerminalId) -> Option<StateId> {
        self.shifts
            .binary_search_by_key(&terminal, |&(t, _)| t)
            .ok()
            .map(|i| self.shifts[i].1)
    }

    /// Target after reducing to `nonterminal` with this state on top.
    pub fn goto(&self, nonterminal: NonTerminalId) -> Option<StateId> {
        self.gotos
            .binary_search_by_key(&nonterminal, |&(n, _)| n)
            .ok()
            .map(|i| self.gotos[i].1)
    }

    /// Productions completed in this state.
    pub fn reductions(&self) -> &[ProductionId] {
        &self.reductions
    }

    /// Whether the start symbol is complete here (accept on end of input).
    pub fn accepts(&self) -> bool {
        self.accept
    }

    /// Terminals this state can shift.
    pub fn shift_set(&self) -> &TerminalSet {
        &self.shift_set
    }
}

/// The compiled automaton plus FIRST/FOLLOW sets.
#[derive(Debug, Clone)]
pub struct LrTables {
    states: Vec<LrState>,
    first: Vec<TerminalSet>,
    follow: Vec<TerminalSet>,
    nullable: FixedBitSet,
    conflicts: usize,
}

impl LrTables {
    pub(crate) fn build(
        nonterminals: &[NonTerminalDef],
        productions: &[Production],
        terminal_count: usize,
        start: NonTerminalId,
        eof: TerminalId,
    ) -> Self {
        let nullable = nullable_set(nonterminals.len(), productions);
        let first = first_sets(nonterminals.len(), productions, &nullable, terminal_count);
        let follow = follow_sets(nonterminals.len(), productions, &nullable, &first, start, eof, terminal_count);

        let mut builder = AutomatonBuilder {
            nonterminals,
            productions,
            augmented: [GrammarSymbol::NonTerminal(start)],
            terminal_count,
        };
        let states = builder.states();
        let mut tables = Self {
            states,
            first,
            follow,
            nullable,
            conflicts: 0,
        };
        tables.conflicts = tables.count_conflicts(productions, eof);
        tables
    }

    pub fn state(&self, id: StateId) -> &LrState {
        &self.states[id.index()]
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn initial(&self) -> StateId {
        StateId(0)
    }

    /// Terminals that can start a string derived from `nonterminal`.
    pub fn first(&self, nonterminal: NonTerminalId) -> &TerminalSet {
        &self.first[nonterminal.index()]
    }

    /// Terminals that can follow `nonterminal` (SLR lookahead).
    pub fn follow(&self, nonterminal: NonTerminalId) -> &TerminalSet {
        &self.follow[nonterminal.index()]
    }

    pub fn is_nullable(&self, nonterminal: NonTerminalId) -> bool {
        self.nullable.contains(nonterminal.index())
    }

    /// States with a shift/reduce or reduce/reduce conflict.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    fn count_conflicts(&self, productions: &[Production], eof: TerminalId) -> usize {
        let mut count = 0;
        for state in &self.states {
            let mut seen = state.shift_set.clone();
            if state.accept {
                seen.insert(eof);
            }
            let mut conflicted = false;
            for &p in &state.reductions {
                let follow = &self.follow[productions[p.index()].lhs.index()];
                if seen.intersects(follow) {
                    conflicted = true;
                }
                seen.union_with(follow);
            }
            if conflicted {
                count += 1;
            }
        }
        count
    }
}

// ==================== FIRST / FOLLOW ====================

fn nullable_set(count: usize, productions: &[Production]) -> FixedBitSet {
    let mut nullable = FixedBitSet::with_capacity(count);
    let mut changed = true;
    while changed {
        changed = false;
        for p in productions {
            if nullable.contains(p.lhs.index()) {
                continue;
            }
            let all = p.rhs.iter().all(|s| match s {
                GrammarSymbol::Terminal(_) => false,
                GrammarSymbol::NonTerminal(n) => nullable.contains(n.index()),
            });
            if all {
                nullable.insert(p.lhs.index());
                changed = true;
            }
        }
    }
    nullable
}

fn first_sets(
    count: usize,
    productions: &[Production],
    nullable: &FixedBitSet,
    terminal_count: usize,
) -> Vec<TerminalSet> {
    let mut first = vec![TerminalSet::with_capacity(terminal_count); count];
    let mut changed = true;
    while changed {
        changed = false;
        for p in productions {
            let mut acc = first[p.lhs.index()].clone();
            for symbol in &p.rhs {
                match *symbol {
                    GrammarSymbol::Terminal(t) => {
                        acc.insert(t);
                        break;
                    }
                    GrammarSymbol::NonTerminal(n) => {
                        acc.union_with(&first[n.index()]);
                        if !nullable.contains(n.index()) {
                            break;
                        }
                    }
                }
            }
            if acc != first[p.lhs.index()] {
                first[p.lhs.index()] = acc;
                changed = true;
            }
        }
    }
    first
}

fn follow_sets(
    count: usize,
    productions: &[Production],
    nullable: &FixedBitSet,
    first: &[TerminalSet],
    start: NonTerminalId,
    eof: TerminalId,
    terminal_count: usize,
) -> Vec<TerminalSet> {
    let mut follow = vec![TerminalSet::with_capacity(terminal_count); count];
    follow[start.index()].insert(eof);
    let mut changed = true;
    while changed {
        changed = false;
        for p in productions {
            for (i, symbol) in p.rhs.iter().enumerate() {
                let GrammarSymbol::NonTerminal(b) = *symbol else {
                    continue;
                };
                let mut acc = follow[b.index()].clone();
                let mut rest_nullable = true;
                for next in &p.rhs[i + 1..] {
                    match *next {
                        GrammarSymbol::Terminal(t) => {
                            acc.insert(t);
                            rest_nullable = false;
                        }
                        GrammarSymbol::NonTerminal(n) => {
                            acc.union_with(&first[n.index()]);
                            rest_nullable = nullable.contains(n.index());
                        }
                    }
                    if !rest_nullable {
                        break;
                    }
                }
                if rest_nullable {
                    acc.union_with(&follow[p.lhs.index()]);
                }
                if acc != follow[b.index()] {
                    follow[b.index()] = acc;
                    changed = true;
                }
            }
        }
    }
    follow
}

// ==================== Canonical LR(0) collection ====================

struct AutomatonBuilder<'g> {
    nonterminals: &'g [NonTerminalDef],
    productions: &'g [Production],
    augmented: [GrammarSymbol; 1],
    terminal_count: usize,
}

impl AutomatonBuilder<'_> {
    fn rhs(&self, production: u32) -> &[GrammarSymbol] {
        if production == AUGMENTED {
            &self.augmented
        } else {
            &self.productions[production as usize].rhs
        }
    }

    fn next_symbol(&self, item: Item) -> Option<GrammarSymbol> {
        self.rhs(item.production).get(item.dot as usize).copied()
    }

    fn closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut items = kernel.to_vec();
        let mut expanded = FixedBitSet::with_capacity(self.nonterminals.len());
        let mut i = 0;
        while i < items.len() {
            if let Some(GrammarSymbol::NonTerminal(n)) = self.next_symbol(items[i]) {
                if !expanded.put(n.index()) {
                    for p in &self.nonterminals[n.index()].productions {
                        items.push(Item {
                            production: p.0,
                            dot: 0,
                        });
                    }
                }
            }
            i += 1;
        }
        items
    }

    fn states(&mut self) -> Vec<LrState> {
        let initial = vec![Item {
            production: AUGMENTED,
            dot: 0,
        }];
        let mut kernels: Vec<Vec<Item>> = vec![initial.clone()];
        let mut index: FxHashMap<Vec<Item>, u32> = FxHashMap::default();
        index.insert(initial, 0);
        let mut states = Vec::new();

        let mut next = 0;
        while next < kernels.len() {
            let items = self.closure(&kernels[next]);
            next += 1;

            let mut state = LrState {
                shift_set: TerminalSet::with_capacity(self.terminal_count),
                ..LrState::default()
            };
            let mut transitions: BTreeMap<GrammarSymbol, Vec<Item>> = BTreeMap::new();
            for item in items {
                match self.next_symbol(item) {
                    Some(symbol) => transitions.entry(symbol).or_default().push(Item {
                        production: item.production,
                        dot: item.dot + 1,
                    }),
                    None if item.production == AUGMENTED => state.accept = true,
                    None => state.reductions.push(ProductionId(item.production)),
                }
            }
            for (symbol, mut kernel) in transitions {
                kernel.sort_unstable();
                kernel.dedup();
                let target = match index.get(&kernel) {
                    Some(&id) => id,
                    None => {
                        let id = kernels.len() as u32;
                        index.insert(kernel.clone(), id);
                        kernels.push(kernel);
                        id
                    }
                };
                match symbol {
                    GrammarSymbol::Terminal(t) => {
                        state.shifts.push((t, StateId(target)));
                        state.shift_set.insert(t);
                    }
                    GrammarSymbol::NonTerminal(n) => state.gotos.push((n, StateId(target))),
                }
            }
            state.reductions.sort_unstable();
            states.push(state);
        }
        states
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::{AstShape, Grammar, GrammarBuilder, GrammarSymbol};

    fn expr_grammar() -> Grammar {
        let mut b = GrammarBuilder::new();
        b.pattern("NUMBER", "[0-9]+");
        b.literal("PLUS", "+");
        b.literal("STAR", "*");
        b.literal("LPAREN", "(");
        b.literal("RPAREN", ")");
        b.rule("expr", &["expr", "PLUS", "term"]).shape(AstShape::Operator(1));
        b.rule("expr", &["term"]).shape(AstShape::Passthrough(0));
        b.rule("term", &["term", "STAR", "factor"]).shape(AstShape::Operator(1));
        b.rule("term", &["factor"]).shape(AstShape::Passthrough(0));
        b.rule("factor", &["NUMBER"]).shape(AstShape::Passthrough(0));
        b.rule("factor", &["LPAREN", "expr", "RPAREN"]).shape(AstShape::Passthrough(1));
        b.start("expr");
        b.build().unwrap()
    }

    fn names(g: &Grammar, set: &crate::grammar::TerminalSet) -> Vec<String> {
        g.terminal_names(set)
    }

    #[test]
    fn test_first_follow() {
        let g = expr_grammar();
        let t = g.tables();
        let expr = g.nonterminal_by_name("expr").unwrap();
        let factor = g.nonterminal_by_name("factor").unwrap();
        assert_eq!(names(&g, t.first(expr)), vec!["NUMBER", "LPAREN"]);
        assert_eq!(names(&g, t.follow(expr)), vec!["PLUS", "RPAREN", "<eof>"]);
        assert_eq!(names(&g, t.follow(factor)), vec!["PLUS", "STAR", "RPAREN", "<eof>"]);
        assert!(!t.is_nullable(expr));
    }

    #[test]
    fn test_classic_expression_grammar_is_slr() {
        let g = expr_grammar();
        // The textbook LR(0) automaton for this grammar has 12 states.
        assert_eq!(g.tables().len(), 12);
        assert_eq!(g.tables().conflicts(), 0);
    }

    #[test]
    fn test_initial_state_actions() {
        let g = expr_grammar();
        let t = g.tables();
        let s0 = t.state(t.initial());
        let number = g.terminal_by_name("NUMBER").unwrap();
        let plus = g.terminal_by_name("PLUS").unwrap();
        assert!(s0.shift(number).is_some());
        assert!(s0.shift(plus).is_none());
        let expr = g.nonterminal_by_name("expr").unwrap();
        let after_expr = t.state(s0.goto(expr).unwrap());
        assert!(after_expr.accepts());
        assert!(after_expr.shift(plus).is_some());
        assert!(after_expr.reductions().is_empty());
    }

    #[test]
    fn test_ambiguous_grammar_has_conflicts() {
        let mut b = GrammarBuilder::new();
        b.literal("N", "n");
        b.literal("PLUS", "+");
        b.rule("e", &["e", "PLUS", "e"]);
        b.rule("e", &["N"]);
        b.start("e");
        let g = b.build().unwrap();
        assert_eq!(g.tables().conflicts(), 1);
    }

    #[test]
    fn test_nullable_rules() {
        let mut b = GrammarBuilder::new();
        b.literal("X", "x");
        b.rule("list", &["list", "X"]).shape(AstShape::List);
        b.rule("list", &[]);
        b.start("list");
        let g = b.build().unwrap();
        let list = g.nonterminal_by_name("list").unwrap();
        assert!(g.tables().is_nullable(list));
        let s0 = g.tables().state(g.tables().initial());
        assert_eq!(s0.reductions().len(), 1);
        assert!(matches!(
            g.production(s0.reductions()[0]).rhs.first(),
            None | Some(GrammarSymbol::Terminal(_))
        ));
    }
}
