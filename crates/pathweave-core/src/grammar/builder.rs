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

//! Fluent construction and validation of [`Grammar`] values.
//!
//! ```
//! use pathweave_core::grammar::{AstShape, GrammarBuilder};
//!
//! let mut b = GrammarBuilder::new();
//! b.pattern("NUMBER", "[0-9]+");
//! b.literal("PLUS", "+");
//! b.skip("WS", r"[ \t]+");
//! b.rule("sum", &["sum", "PLUS", "NUMBER"]).shape(AstShape::Operator(1));
//! b.rule("sum", &["NUMBER"]).shape(AstShape::Passthrough(0));
//! b.start("sum");
//! let grammar = b.build().unwrap();
//! assert_eq!(grammar.productions().len(), 2);
//! ```

use pathweave_memory::NodeKind;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::tables::LrTables;
use super::terminal_set::TerminalSet;
use super::{
    AstShape, BracketEffect, EmbeddedLanguage, Grammar, GrammarSymbol, LanguageId, ModeDef,
    ModeEffect, ModeId, NonTerminalDef, NonTerminalId, Production, ProductionCondition,
    ProductionId, ScopeDef, ScopeEffect, ScopeKind, ScopeRestriction, SemanticAction,
    SymbolCondition, SymbolKind, TerminalDef, TerminalId, TerminalPattern,
};
use crate::error::GrammarError;

/// Highest id the 16-bit symbol spaces can hold (one is kept for end of input).
const MAX_SYMBOLS: usize = u16::MAX as usize - 1;

#[derive(Debug, Clone)]
enum PatternSpec {
    Literal(String),
    Keyword(String),
    Regex { source: String, exclude_reserved: bool },
}

#[derive(Debug, Clone)]
struct PendingTerminal {
    spec: PatternSpec,
    /// Everything but the compiled pattern.
    def: TerminalDef,
}

#[derive(Debug, Clone)]
struct PendingRule {
    lhs: String,
    rhs: Vec<String>,
    shape: AstShape,
    condition: ProductionCondition,
    actions: SmallVec<[SemanticAction; 1]>,
    disabled_in: Vec<ScopeKind>,
}

/// Collects terminal and rule declarations, then validates and compiles them.
///
/// Scope kinds, symbol kinds and modes are registered by name the first time
/// they are mentioned.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    terminals: Vec<PendingTerminal>,
    rules: Vec<PendingRule>,
    modes: Vec<ModeDef>,
    scopes: Vec<ScopeDef>,
    symbol_kinds: Vec<String>,
    languages: Vec<EmbeddedLanguage>,
    start: Option<String>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self {
            terminals: Vec::new(),
            rules: Vec::new(),
            modes: vec![ModeDef {
                name: "default".to_string(),
                interpolation: false,
            }],
            scopes: vec![ScopeDef {
                name: "root".to_string(),
                ..ScopeDef::default()
            }],
            symbol_kinds: Vec::new(),
            languages: Vec::new(),
            start: None,
        }
    }

    // ==================== Terminals ====================

    /// A terminal matching `text` exactly.
    pub fn literal(&mut self, name: &str, text: &str) -> TerminalHandle<'_> {
        self.push_terminal(name, PatternSpec::Literal(text.to_string()), NodeKind::Terminal)
    }

    /// A reserved word: `text` not followed by an identifier character.
    pub fn keyword(&mut self, name: &str, text: &str) -> TerminalHandle<'_> {
        self.push_terminal(name, PatternSpec::Keyword(text.to_string()), NodeKind::Terminal)
    }

    /// A regex terminal producing literal leaves.
    pub fn pattern(&mut self, name: &str, regex: &str) -> TerminalHandle<'_> {
        let spec = PatternSpec::Regex {
            source: regex.to_string(),
            exclude_reserved: false,
        };
        self.push_terminal(name, spec, NodeKind::Literal)
    }

    /// A regex terminal producing identifier leaves; keywords never match it.
    pub fn identifier(&mut self, name: &str, regex: &str) -> TerminalHandle<'_> {
        let spec = PatternSpec::Regex {
            source: regex.to_string(),
            exclude_reserved: true,
        };
        self.push_terminal(name, spec, NodeKind::Identifier)
    }

    /// Trivia skipped between tokens (whitespace, comments).
    pub fn skip(&mut self, name: &str, regex: &str) -> TerminalHandle<'_> {
        let spec = PatternSpec::Regex {
            source: regex.to_string(),
            exclude_reserved: false,
        };
        let mut handle = self.push_terminal(name, spec, NodeKind::Terminal);
        handle.def().skip = true;
        handle
    }

    fn push_terminal(&mut self, name: &str, spec: PatternSpec, kind: NodeKind) -> TerminalHandle<'_> {
        let index = self.terminals.len();
        self.terminals.push(PendingTerminal {
            spec,
            def: TerminalDef::new(name.to_string(), TerminalPattern::EndOfInput, kind),
        });
        TerminalHandle {
            builder: self,
            index,
        }
    }

    // ==================== Rules ====================

    /// Add the production `lhs -> rhs`. Symbols are terminal or rule names.
    pub fn rule(&mut self, lhs: &str, rhs: &[&str]) -> RuleHandle<'_> {
        let index = self.rules.len();
        self.rules.push(PendingRule {
            lhs: lhs.to_string(),
            rhs: rhs.iter().map(|s| s.to_string()).collect(),
            shape: AstShape::Node,
            condition: ProductionCondition::Always,
            actions: SmallVec::new(),
            disabled_in: Vec::new(),
        });
        RuleHandle {
            builder: self,
            index,
        }
    }

    /// Set the start symbol.
    pub fn start(&mut self, name: &str) -> &mut Self {
        self.start = Some(name.to_string());
        self
    }

    // ==================== Registries ====================

    /// Declare a lexer mode, or update an existing one.
    pub fn mode(&mut self, name: &str, interpolation: bool) -> ModeId {
        let id = self.mode_id(name);
        self.modes[id.index()].interpolation = interpolation;
        id
    }

    /// Host an embedded language in scopes of kind `scope`; only names in
    /// `allow` resolve to outer declarations from inside it.
    pub fn embedded_language(&mut self, name: &str, scope: &str, allow: &[&str]) -> LanguageId {
        let scope = self.scope_kind(scope);
        let id = LanguageId(self.languages.len() as u16);
        self.languages.push(EmbeddedLanguage {
            name: name.to_string(),
            scope,
            allow: allow.iter().map(|s| s.to_string()).collect(),
        });
        self.scopes[scope.index()].language = Some(id);
        id
    }

    /// Id of the scope kind `name`, registering it if new.
    pub fn scope_kind(&mut self, name: &str) -> ScopeKind {
        match self.scopes.iter().position(|s| s.name == name) {
            Some(i) => ScopeKind(i as u16),
            None => {
                self.scopes.push(ScopeDef {
                    name: name.to_string(),
                    ..ScopeDef::default()
                });
                ScopeKind((self.scopes.len() - 1) as u16)
            }
        }
    }

    /// Id of the symbol kind `name`, registering it if new.
    pub fn symbol_kind(&mut self, name: &str) -> SymbolKind {
        match self.symbol_kinds.iter().position(|s| s == name) {
            Some(i) => SymbolKind(i as u16),
            None => {
                self.symbol_kinds.push(name.to_string());
                SymbolKind((self.symbol_kinds.len() - 1) as u16)
            }
        }
    }

    fn mode_id(&mut self, name: &str) -> ModeId {
        match self.modes.iter().position(|m| m.name == name) {
            Some(i) => ModeId(i as u16),
            None => {
                self.modes.push(ModeDef {
                    name: name.to_string(),
                    interpolation: false,
                });
                ModeId((self.modes.len() - 1) as u16)
            }
        }
    }

    // ==================== Build ====================

    /// Validate the declarations and compile the LR tables.
    ///
    /// # Errors
    ///
    /// The first [`GrammarError`] found, checking the start symbol, terminal
    /// names and patterns, rule symbols, shapes and actions, then
    /// productivity.
    pub fn build(&self) -> Result<Grammar, GrammarError> {
        let start_name = self.start.as_deref().ok_or(GrammarError::MissingStart)?;
        check_count("terminals", self.terminals.len() + 1)?;
        check_count("scope kinds", self.scopes.len())?;

        let mut terminal_ids: FxHashMap<&str, TerminalId> = FxHashMap::default();
        let mut terminals = Vec::with_capacity(self.terminals.len() + 1);
        for (i, pending) in self.terminals.iter().enumerate() {
            let name = pending.def.name.as_str();
            if terminal_ids.insert(name, TerminalId(i as u16)).is_some() {
                return Err(GrammarError::DuplicateSymbol {
                    name: name.to_string(),
                });
            }
            let mut def = pending.def.clone();
            def.pattern = compile(name, &pending.spec)?;
            terminals.push(def);
        }
        let eof = TerminalId(terminals.len() as u16);
        let mut eof_def = TerminalDef::new("<eof>".to_string(), TerminalPattern::EndOfInput, NodeKind::Terminal);
        eof_def.hidden = true;
        terminals.push(eof_def);

        let mut nonterminal_ids: FxHashMap<&str, NonTerminalId> = FxHashMap::default();
        let mut nonterminals: Vec<NonTerminalDef> = Vec::new();
        for rule in &self.rules {
            if nonterminal_ids.contains_key(rule.lhs.as_str()) {
                continue;
            }
            if terminal_ids.contains_key(rule.lhs.as_str()) {
                return Err(GrammarError::DuplicateSymbol {
                    name: rule.lhs.clone(),
                });
            }
            nonterminal_ids.insert(rule.lhs.as_str(), NonTerminalId(nonterminals.len() as u16));
            nonterminals.push(NonTerminalDef {
                name: rule.lhs.clone(),
                productions: Vec::new(),
            });
        }
        check_count("non-terminals", nonterminals.len())?;
        let start = *nonterminal_ids
            .get(start_name)
            .ok_or_else(|| GrammarError::UndefinedStart {
                name: start_name.to_string(),
            })?;

        let mut scopes = self.scopes.clone();
        let mut productions = Vec::with_capacity(self.rules.len());
        for (i, rule) in self.rules.iter().enumerate() {
            let id = ProductionId(i as u32);
            let lhs = nonterminal_ids[rule.lhs.as_str()];
            let mut rhs = Vec::with_capacity(rule.rhs.len());
            for name in &rule.rhs {
                let symbol = if let Some(&t) = terminal_ids.get(name.as_str()) {
                    GrammarSymbol::Terminal(t)
                } else if let Some(&n) = nonterminal_ids.get(name.as_str()) {
                    GrammarSymbol::NonTerminal(n)
                } else {
                    return Err(GrammarError::UndefinedSymbol {
                        name: name.clone(),
                        rule: rule.lhs.clone(),
                    });
                };
                rhs.push(symbol);
            }
            if let AstShape::Passthrough(index) | AstShape::Operator(index) = rule.shape {
                if index >= rhs.len() {
                    return Err(GrammarError::InvalidShape {
                        rule: rule.lhs.clone(),
                        index,
                        len: rhs.len(),
                    });
                }
            }
            for action in &rule.actions {
                let (SemanticAction::Declare { child, .. } | SemanticAction::Reference { child }) = *action;
                if child >= rhs.len() {
                    return Err(GrammarError::InvalidAction {
                        rule: rule.lhs.clone(),
                        index: child,
                        len: rhs.len(),
                    });
                }
            }
            for kind in &rule.disabled_in {
                scopes[kind.index()].disabled.push(id);
            }
            nonterminals[lhs.index()].productions.push(id);
            productions.push(Production {
                id,
                lhs,
                rhs,
                shape: rule.shape,
                condition: rule.condition.clone(),
                actions: rule.actions.clone(),
            });
        }

        if let Some(name) = first_unproductive(&nonterminals, &productions) {
            return Err(GrammarError::Unproductive { name });
        }

        let reserved: FxHashSet<String> = terminals
            .iter()
            .filter_map(|t| match &t.pattern {
                TerminalPattern::Keyword(text) => Some(text.clone()),
                _ => None,
            })
            .collect();

        let mut mode_terminals = Vec::with_capacity(self.modes.len());
        let mut mode_skips = Vec::with_capacity(self.modes.len());
        for mode in 0..self.modes.len() {
            let mode = ModeId(mode as u16);
            let mut set = TerminalSet::with_capacity(terminals.len());
            let mut skips = Vec::new();
            for (i, t) in terminals.iter().enumerate() {
                let id = TerminalId(i as u16);
                if id == eof {
                    set.insert(id);
                } else if t.in_mode(mode) {
                    if t.skip {
                        skips.push(id);
                    } else {
                        set.insert(id);
                    }
                }
            }
            mode_terminals.push(set);
            mode_skips.push(skips);
        }

        let tables = LrTables::build(&nonterminals, &productions, terminals.len(), start, eof);
        if tables.conflicts() > 0 {
            warn!(
                conflicts = tables.conflicts(),
                "grammar has LR conflicts; conflicting input forks parse paths"
            );
        }
        debug!(
            terminals = terminals.len(),
            nonterminals = nonterminals.len(),
            productions = productions.len(),
            states = tables.len(),
            "grammar built"
        );

        Ok(Grammar {
            terminals,
            nonterminals,
            productions,
            modes: self.modes.clone(),
            scopes,
            symbol_kinds: self.symbol_kinds.clone(),
            languages: self.languages.clone(),
            start,
            eof,
            reserved,
            mode_terminals,
            mode_skips,
            tables,
        })
    }
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_count(what: &'static str, count: usize) -> Result<(), GrammarError> {
    if count > MAX_SYMBOLS {
        Err(GrammarError::TooManySymbols {
            what,
            count,
            max: MAX_SYMBOLS,
        })
    } else {
        Ok(())
    }
}

fn compile(name: &str, spec: &PatternSpec) -> Result<TerminalPattern, GrammarError> {
    match spec {
        PatternSpec::Literal(text) | PatternSpec::Keyword(text) if text.is_empty() => {
            Err(GrammarError::EmptyPattern {
                name: name.to_string(),
            })
        }
        PatternSpec::Literal(text) => Ok(TerminalPattern::Literal(text.clone())),
        PatternSpec::Keyword(text) => Ok(TerminalPattern::Keyword(text.clone())),
        PatternSpec::Regex {
            source,
            exclude_reserved,
        } => {
            let regex = Regex::new(&format!("^(?:{source})")).map_err(|e| GrammarError::InvalidPattern {
                name: name.to_string(),
                message: e.to_string(),
            })?;
            Ok(TerminalPattern::Pattern {
                source: source.clone(),
                regex,
                exclude_reserved: *exclude_reserved,
            })
        }
    }
}

/// Name of the first non-terminal that derives no terminal string.
fn first_unproductive(nonterminals: &[NonTerminalDef], productions: &[Production]) -> Option<String> {
    let mut productive = vec![false; nonterminals.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for p in productions {
            if productive[p.lhs.index()] {
                continue;
            }
            let all = p.rhs.iter().all(|s| match s {
                GrammarSymbol::Terminal(_) => true,
                GrammarSymbol::NonTerminal(n) => productive[n.index()],
            });
            if all {
                productive[p.lhs.index()] = true;
                changed = true;
            }
        }
    }
    productive
        .iter()
        .position(|p| !p)
        .map(|i| nonterminals[i].name.clone())
}

// ==================== Handles ====================

/// Refines the terminal just declared.
pub struct TerminalHandle<'b> {
    builder: &'b mut GrammarBuilder,
    index: usize,
}

impl TerminalHandle<'_> {
    fn def(&mut self) -> &mut TerminalDef {
        &mut self.builder.terminals[self.index].def
    }

    pub fn id(&self) -> TerminalId {
        TerminalId(self.index as u16)
    }

    /// Leave the leaf out of `Node` and `List` children.
    pub fn hidden(mut self) -> Self {
        self.def().hidden = true;
        self
    }

    /// Store the lexeme as an integer payload.
    pub fn scalar(mut self) -> Self {
        self.def().scalar = true;
        self
    }

    pub fn node_kind(mut self, kind: NodeKind) -> Self {
        self.def().node_kind = kind;
        self
    }

    /// Reject regex matches that spell a keyword.
    pub fn exclude_reserved(mut self) -> Self {
        if let PatternSpec::Regex {
            exclude_reserved, ..
        } = &mut self.builder.terminals[self.index].spec
        {
            *exclude_reserved = true;
        }
        self
    }

    /// Only recognized inside a scope of one of these kinds.
    pub fn only_in(mut self, kinds: &[&str]) -> Self {
        let kinds = kinds.iter().map(|k| self.builder.scope_kind(k)).collect();
        self.def().scope = ScopeRestriction::OnlyIn(kinds);
        self
    }

    /// Never recognized inside a scope of any of these kinds.
    pub fn not_in(mut self, kinds: &[&str]) -> Self {
        let kinds = kinds.iter().map(|k| self.builder.scope_kind(k)).collect();
        self.def().scope = ScopeRestriction::NotIn(kinds);
        self
    }

    /// Only recognized when the text names a declared symbol of `kind`.
    pub fn declared_as(mut self, kind: &str) -> Self {
        let kind = self.builder.symbol_kind(kind);
        self.def().condition = Some(SymbolCondition::DeclaredAs(kind));
        self
    }

    /// Not recognized when the text names a declared symbol of `kind`.
    pub fn not_declared_as(mut self, kind: &str) -> Self {
        let kind = self.builder.symbol_kind(kind);
        self.def().condition = Some(SymbolCondition::NotDeclaredAs(kind));
        self
    }

    /// Replace the set of modes the terminal is recognized in.
    pub fn in_modes(mut self, modes: &[&str]) -> Self {
        let modes = modes.iter().map(|m| self.builder.mode_id(m)).collect();
        self.def().modes = modes;
        self
    }

    pub fn push_mode(mut self, mode: &str) -> Self {
        let mode = self.builder.mode_id(mode);
        self.def().mode_effect = ModeEffect::PushMode(mode);
        self
    }

    pub fn pop_mode(mut self) -> Self {
        self.def().mode_effect = ModeEffect::PopMode;
        self
    }

    /// Shifting this terminal enters a new scope of `kind`.
    pub fn opens_scope(mut self, kind: &str) -> Self {
        let kind = self.builder.scope_kind(kind);
        self.def().scope_effect = ScopeEffect::Open(kind);
        self
    }

    /// Shifting this terminal leaves the current scope.
    pub fn closes_scope(mut self) -> Self {
        self.def().scope_effect = ScopeEffect::Close;
        self
    }

    pub fn opens_bracket(mut self) -> Self {
        self.def().bracket = BracketEffect::Open;
        self
    }

    pub fn closes_bracket(mut self) -> Self {
        self.def().bracket = BracketEffect::Close;
        self
    }
}

/// Refines the production just added.
pub struct RuleHandle<'b> {
    builder: &'b mut GrammarBuilder,
    index: usize,
}

impl RuleHandle<'_> {
    fn rule(&mut self) -> &mut PendingRule {
        &mut self.builder.rules[self.index]
    }

    pub fn id(&self) -> ProductionId {
        ProductionId(self.index as u32)
    }

    pub fn shape(mut self, shape: AstShape) -> Self {
        self.rule().shape = shape;
        self
    }

    pub fn condition(mut self, condition: ProductionCondition) -> Self {
        self.rule().condition = condition;
        self
    }

    /// Only reducible inside a scope of `kind`.
    pub fn in_scope(mut self, kind: &str) -> Self {
        let kind = self.builder.scope_kind(kind);
        self.rule().condition = ProductionCondition::InScope(kind);
        self
    }

    /// Not reducible inside a scope of `kind`.
    pub fn not_in_scope(mut self, kind: &str) -> Self {
        let kind = self.builder.scope_kind(kind);
        self.rule().condition = ProductionCondition::NotInScope(kind);
        self
    }

    /// Only reducible while `name` resolves.
    pub fn when_declared(mut self, name: &str) -> Self {
        self.rule().condition = ProductionCondition::SymbolDeclared(name.to_string());
        self
    }

    /// Declare the identifier under child `child` as a symbol of `kind`.
    pub fn declares(mut self, child: usize, kind: &str) -> Self {
        let kind = self.builder.symbol_kind(kind);
        self.rule().actions.push(SemanticAction::Declare { child, kind });
        self
    }

    /// Resolve the identifier under child `child`.
    pub fn references(mut self, child: usize) -> Self {
        self.rule().actions.push(SemanticAction::Reference { child });
        self
    }

    /// Disable this production inside scopes of `kind`.
    pub fn disabled_in(mut self, kind: &str) -> Self {
        let kind = self.builder.scope_kind(kind);
        self.rule().disabled_in.push(kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arithmetic() -> GrammarBuilder {
        let mut b = GrammarBuilder::new();
        b.pattern("NUMBER", "[0-9]+");
        b.literal("PLUS", "+");
        b.rule("expr", &["expr", "PLUS", "NUMBER"]).shape(AstShape::Operator(1));
        b.rule("expr", &["NUMBER"]).shape(AstShape::Passthrough(0));
        b.start("expr");
        b
    }

    // ==================== Validation tests ====================

    #[test]
    fn test_build_ok() {
        let g = arithmetic().build().unwrap();
        assert_eq!(g.terminal_count(), 3);
        assert_eq!(g.nonterminals().len(), 1);
        assert_eq!(g.nonterminal(g.start()).productions.len(), 2);
    }

    #[test]
    fn test_missing_start() {
        let mut b = GrammarBuilder::new();
        b.literal("A", "a");
        b.rule("s", &["A"]);
        assert_eq!(b.build().unwrap_err(), GrammarError::MissingStart);
    }

    #[test]
    fn test_undefined_start() {
        let mut b = arithmetic();
        b.start("program");
        assert_eq!(
            b.build().unwrap_err(),
            GrammarError::UndefinedStart {
                name: "program".to_string()
            }
        );
    }

    #[test]
    fn test_undefined_symbol() {
        let mut b = arithmetic();
        b.rule("expr", &["MINUS"]);
        assert_eq!(
            b.build().unwrap_err(),
            GrammarError::UndefinedSymbol {
                name: "MINUS".to_string(),
                rule: "expr".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_terminal() {
        let mut b = arithmetic();
        b.literal("PLUS", "plus");
        assert!(matches!(b.build(), Err(GrammarError::DuplicateSymbol { .. })));
    }

    #[test]
    fn test_terminal_rule_name_clash() {
        let mut b = arithmetic();
        b.rule("PLUS", &["NUMBER"]);
        assert!(matches!(b.build(), Err(GrammarError::DuplicateSymbol { .. })));
    }

    #[test]
    fn test_invalid_regex() {
        let mut b = arithmetic();
        b.pattern("BAD", "[a-");
        assert!(matches!(b.build(), Err(GrammarError::InvalidPattern { name, .. }) if name == "BAD"));
    }

    #[test]
    fn test_empty_literal() {
        let mut b = arithmetic();
        b.literal("NOTHING", "");
        assert!(matches!(b.build(), Err(GrammarError::EmptyPattern { .. })));
    }

    #[test]
    fn test_unproductive() {
        let mut b = arithmetic();
        b.rule("loop", &["loop", "PLUS"]);
        assert_eq!(
            b.build().unwrap_err(),
            GrammarError::Unproductive {
                name: "loop".to_string()
            }
        );
    }

    #[test]
    fn test_shape_out_of_range() {
        let mut b = arithmetic();
        b.rule("expr", &["PLUS"]).shape(AstShape::Passthrough(3));
        assert!(matches!(b.build(), Err(GrammarError::InvalidShape { index: 3, len: 1, .. })));
    }

    #[test]
    fn test_action_out_of_range() {
        let mut b = arithmetic();
        b.rule("expr", &["PLUS"]).declares(1, "var");
        assert!(matches!(b.build(), Err(GrammarError::InvalidAction { index: 1, .. })));
    }

    // ==================== Registry tests ====================

    #[test]
    fn test_scope_and_mode_registration() {
        let mut b = arithmetic();
        b.literal("LBRACE", "{").opens_scope("block");
        b.literal("RBRACE", "}").closes_scope();
        b.keyword("GLOBAL", "global").not_in(&["block"]);
        b.literal("QUOTE", "\"").push_mode("string");
        b.mode("string", true);
        let g = b.build().unwrap();

        let block = g.scope_kind("block").unwrap();
        assert_eq!(g.scope_name(block), "block");
        assert_eq!(g.scope_kind("root"), Some(ScopeKind::ROOT));
        let global = g.terminal(g.terminal_by_name("GLOBAL").unwrap());
        assert_eq!(global.scope, ScopeRestriction::NotIn(SmallVec::from_slice(&[block])));
        let string = g.mode_by_name("string").unwrap();
        assert!(g.mode(string).unwrap().interpolation);
        let quote = g.terminal(g.terminal_by_name("QUOTE").unwrap());
        assert_eq!(quote.mode_effect, ModeEffect::PushMode(string));
    }

    #[test]
    fn test_embedded_language_marks_scope() {
        let mut b = arithmetic();
        b.literal("SQL_OPEN", "sql{").opens_scope("sql");
        let lang = b.embedded_language("sql", "sql", &["shared"]);
        let g = b.build().unwrap();
        let sql = g.scope_kind("sql").unwrap();
        assert_eq!(g.scope(sql).unwrap().language, Some(lang));
        assert!(g.language_of(sql).unwrap().allows("shared"));
        assert!(g.language_of(ScopeKind::ROOT).is_none());
    }

    #[test]
    fn test_disabled_rule_recorded_on_scope() {
        let mut b = arithmetic();
        let id = b.rule("expr", &["PLUS"]).disabled_in("block").id();
        let g = b.build().unwrap();
        let block = g.scope_kind("block").unwrap();
        assert_eq!(g.scope(block).unwrap().disabled, vec![id]);
    }

    #[test]
    fn test_identifier_excludes_keywords() {
        let mut b = arithmetic();
        b.keyword("LET", "let");
        let ident = b.identifier("IDENT", "[a-z]+").id();
        let g = b.build().unwrap();
        assert!(matches!(
            g.terminal(ident).pattern,
            TerminalPattern::Pattern { exclude_reserved: true, .. }
        ));
        assert!(g.is_reserved("let"));
    }
}
