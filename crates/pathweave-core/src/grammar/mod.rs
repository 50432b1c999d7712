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

//! Grammar model: terminals, productions, scopes, modes and LR tables.
//!
//! A [`Grammar`] is built once with [`GrammarBuilder`], then shared read-only
//! (`Arc<Grammar>`) by any number of parse sessions. Everything in it is
//! plain data indexed by small dense ids.

pub mod builder;
pub mod tables;
pub mod terminal_set;

pub use builder::{GrammarBuilder, RuleHandle, TerminalHandle};
pub use tables::{LrState, LrTables, StateId};
pub use terminal_set::TerminalSet;

use std::fmt;

use pathweave_memory::{NodeKind, TokenKind};
use regex::Regex;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

// ==================== Ids ====================

macro_rules! dense_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub $repr);

        impl $name {
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

dense_id!(
    /// A terminal, in declaration order. The end-of-input terminal is last.
    TerminalId(u16)
);
dense_id!(
    /// A non-terminal, in order of first appearance as a rule head.
    NonTerminalId(u16)
);
dense_id!(
    /// A production, in the order rules were added.
    ProductionId(u32)
);
dense_id!(
    /// A lexer mode.
    ModeId(u16)
);
dense_id!(
    /// A kind of scope (block, function, embedded language, ...).
    ScopeKind(u16)
);
dense_id!(
    /// A kind of declared symbol (variable, typedef, ...).
    SymbolKind(u16)
);
dense_id!(
    /// An embedded language.
    LanguageId(u16)
);

impl TerminalId {
    /// Kind stamped on tokens of this terminal.
    pub fn token_kind(self, grammar: &Grammar) -> TokenKind {
        if self == grammar.eof() {
            TokenKind::EOF
        } else {
            TokenKind(self.0)
        }
    }
}

impl ModeId {
    /// The mode every lexer path starts in.
    pub const DEFAULT: ModeId = ModeId(0);
}

impl ScopeKind {
    /// Kind of the root scope of every parse.
    pub const ROOT: ScopeKind = ScopeKind(0);
}

/// A grammar symbol on the right-hand side of a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GrammarSymbol {
    Terminal(TerminalId),
    NonTerminal(NonTerminalId),
}

// ==================== Terminals ====================

/// How a terminal recognizes its text.
#[derive(Debug, Clone)]
pub enum TerminalPattern {
    /// Exact text.
    Literal(String),
    /// Exact text not followed by an identifier character.
    Keyword(String),
    /// Regex anchored at the current offset.
    Pattern {
        source: String,
        regex: Regex,
        /// Reject matches that spell a keyword of the grammar.
        exclude_reserved: bool,
    },
    /// Zero-width match at the end of input.
    EndOfInput,
}

/// Where in the scope tree a terminal may be recognized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScopeRestriction {
    #[default]
    Anywhere,
    /// Some enclosing scope has one of these kinds.
    OnlyIn(SmallVec<[ScopeKind; 2]>),
    /// No enclosing scope has any of these kinds.
    NotIn(SmallVec<[ScopeKind; 2]>),
}

/// A condition on the matched text, checked against the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCondition {
    /// The text resolves to a symbol of this kind (typedef names).
    DeclaredAs(SymbolKind),
    /// The text does not resolve to a symbol of this kind.
    NotDeclaredAs(SymbolKind),
}

/// Lexer mode change after a terminal is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeEffect {
    #[default]
    None,
    PushMode(ModeId),
    PopMode,
}

/// Scope change when a terminal is shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeEffect {
    #[default]
    None,
    Open(ScopeKind),
    Close,
}

/// Bracket nesting change after a terminal is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BracketEffect {
    #[default]
    None,
    Open,
    Close,
}

/// A terminal definition.
#[derive(Debug, Clone)]
pub struct TerminalDef {
    pub name: String,
    pub pattern: TerminalPattern,
    /// Kind of the leaf node built for this terminal.
    pub node_kind: NodeKind,
    /// Left out of `Node` and `List` children (punctuation).
    pub hidden: bool,
    /// Trivia: skipped between tokens, never handed to the parser.
    pub skip: bool,
    /// Payload is the lexeme parsed as an integer instead of interned text.
    pub scalar: bool,
    pub scope: ScopeRestriction,
    pub condition: Option<SymbolCondition>,
    /// Modes the terminal is recognized in.
    pub modes: SmallVec<[ModeId; 2]>,
    pub mode_effect: ModeEffect,
    pub scope_effect: ScopeEffect,
    pub bracket: BracketEffect,
}

impl TerminalDef {
    pub(crate) fn new(name: String, pattern: TerminalPattern, node_kind: NodeKind) -> Self {
        Self {
            name,
            pattern,
            node_kind,
            hidden: false,
            skip: false,
            scalar: false,
            scope: ScopeRestriction::Anywhere,
            condition: None,
            modes: SmallVec::from_slice(&[ModeId::DEFAULT]),
            mode_effect: ModeEffect::None,
            scope_effect: ScopeEffect::None,
            bracket: BracketEffect::None,
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(self.pattern, TerminalPattern::Keyword(_))
    }

    /// Whether the terminal is recognized in `mode`.
    pub fn in_mode(&self, mode: ModeId) -> bool {
        self.modes.contains(&mode)
    }
}

// ==================== Productions ====================

/// Guard deciding whether a production may be reduced in a context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProductionCondition {
    #[default]
    Always,
    InScope(ScopeKind),
    NotInScope(ScopeKind),
    SymbolDeclared(String),
}

/// How a reduction is turned into tree nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AstShape {
    /// A non-terminal node over all visible children, payload = rule name.
    #[default]
    Node,
    /// No node; the reduction yields child `i` unchanged.
    Passthrough(usize),
    /// A node whose payload is child `i`'s lexeme, over the other children.
    Operator(usize),
    /// Like `Node`, but a left-recursive occurrence of the same rule is
    /// flattened into one node.
    List,
}

/// Symbol-table effect of a reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticAction {
    /// Declare the identifier under child `child` with `kind` in the current scope.
    Declare { child: usize, kind: SymbolKind },
    /// Resolve the identifier under child `child`.
    Reference { child: usize },
}

/// A production `lhs -> rhs`.
#[derive(Debug, Clone)]
pub struct Production {
    pub id: ProductionId,
    pub lhs: NonTerminalId,
    pub rhs: Vec<GrammarSymbol>,
    pub shape: AstShape,
    pub condition: ProductionCondition,
    pub actions: SmallVec<[SemanticAction; 1]>,
}

/// A non-terminal and its productions.
#[derive(Debug, Clone)]
pub struct NonTerminalDef {
    pub name: String,
    pub productions: Vec<ProductionId>,
}

// ==================== Modes, scopes, languages ====================

#[derive(Debug, Clone)]
pub struct ModeDef {
    pub name: String,
    /// Paths in this mode report `LexState::is_interpolating`.
    pub interpolation: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScopeDef {
    pub name: String,
    /// Set when this kind of scope hosts an embedded language.
    pub language: Option<LanguageId>,
    /// Productions that may not be reduced anywhere inside this scope.
    pub disabled: Vec<ProductionId>,
}

/// An embedded language hosted in an isolated scope.
#[derive(Debug, Clone)]
pub struct EmbeddedLanguage {
    pub name: String,
    pub scope: ScopeKind,
    /// Outer names visible from inside.
    pub allow: Vec<String>,
}

impl EmbeddedLanguage {
    pub fn allows(&self, name: &str) -> bool {
        self.allow.iter().any(|a| a == name)
    }
}

// ==================== Grammar ====================

/// An immutable, validated grammar with its LR tables.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) terminals: Vec<TerminalDef>,
    pub(crate) nonterminals: Vec<NonTerminalDef>,
    pub(crate) productions: Vec<Production>,
    pub(crate) modes: Vec<ModeDef>,
    pub(crate) scopes: Vec<ScopeDef>,
    pub(crate) symbol_kinds: Vec<String>,
    pub(crate) languages: Vec<EmbeddedLanguage>,
    pub(crate) start: NonTerminalId,
    pub(crate) eof: TerminalId,
    pub(crate) reserved: FxHashSet<String>,
    /// Non-skip terminals per mode (plus end of input).
    pub(crate) mode_terminals: Vec<TerminalSet>,
    /// Skip terminals per mode.
    pub(crate) mode_skips: Vec<Vec<TerminalId>>,
    pub(crate) tables: LrTables,
}

impl Grammar {
    /// Start building a grammar.
    pub fn builder() -> GrammarBuilder {
        GrammarBuilder::new()
    }

    pub fn terminal(&self, id: TerminalId) -> &TerminalDef {
        &self.terminals[id.index()]
    }

    pub fn terminals(&self) -> &[TerminalDef] {
        &self.terminals
    }

    /// Number of terminals, end of input included.
    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalId> {
        self.terminals
            .iter()
            .position(|t| t.name == name)
            .map(|i| TerminalId(i as u16))
    }

    /// Name of a terminal, or of the token kind it was stamped with.
    pub fn terminal_name(&self, id: TerminalId) -> &str {
        self.terminals
            .get(id.index())
            .map(|t| t.name.as_str())
            .unwrap_or("<unknown>")
    }

    /// Terminal a token kind was produced by.
    pub fn terminal_for_kind(&self, kind: TokenKind) -> TerminalId {
        if kind == TokenKind::EOF {
            self.eof
        } else {
            TerminalId(kind.0)
        }
    }

    pub fn nonterminal(&self, id: NonTerminalId) -> &NonTerminalDef {
        &self.nonterminals[id.index()]
    }

    pub fn nonterminals(&self) -> &[NonTerminalDef] {
        &self.nonterminals
    }

    pub fn nonterminal_by_name(&self, name: &str) -> Option<NonTerminalId> {
        self.nonterminals
            .iter()
            .position(|n| n.name == name)
            .map(|i| NonTerminalId(i as u16))
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.index()]
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Name of the rule a production belongs to.
    pub fn rule_name(&self, id: ProductionId) -> &str {
        &self.nonterminal(self.production(id).lhs).name
    }

    pub fn start(&self) -> NonTerminalId {
        self.start
    }

    /// The end-of-input terminal.
    pub fn eof(&self) -> TerminalId {
        self.eof
    }

    pub fn tables(&self) -> &LrTables {
        &self.tables
    }

    pub fn mode(&self, id: ModeId) -> Option<&ModeDef> {
        self.modes.get(id.index())
    }

    pub fn mode_by_name(&self, name: &str) -> Option<ModeId> {
        self.modes
            .iter()
            .position(|m| m.name == name)
            .map(|i| ModeId(i as u16))
    }

    /// Terminals recognized in `mode`, end of input included.
    pub fn mode_terminals(&self, mode: ModeId) -> Option<&TerminalSet> {
        self.mode_terminals.get(mode.index())
    }

    /// Trivia terminals of `mode`.
    pub fn mode_skips(&self, mode: ModeId) -> &[TerminalId] {
        self.mode_skips
            .get(mode.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn scope(&self, kind: ScopeKind) -> Option<&ScopeDef> {
        self.scopes.get(kind.index())
    }

    pub fn scope_kind(&self, name: &str) -> Option<ScopeKind> {
        self.scopes
            .iter()
            .position(|s| s.name == name)
            .map(|i| ScopeKind(i as u16))
    }

    pub fn scope_name(&self, kind: ScopeKind) -> &str {
        self.scope(kind).map(|s| s.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn symbol_kind(&self, name: &str) -> Option<SymbolKind> {
        self.symbol_kinds
            .iter()
            .position(|s| s == name)
            .map(|i| SymbolKind(i as u16))
    }

    pub fn symbol_kind_name(&self, kind: SymbolKind) -> &str {
        self.symbol_kinds
            .get(kind.index())
            .map(String::as_str)
            .unwrap_or("<unknown>")
    }

    pub fn language(&self, id: LanguageId) -> Option<&EmbeddedLanguage> {
        self.languages.get(id.index())
    }

    pub fn languages(&self) -> &[EmbeddedLanguage] {
        &self.languages
    }

    /// Language hosted by scopes of `kind`, if any.
    pub fn language_of(&self, kind: ScopeKind) -> Option<&EmbeddedLanguage> {
        self.scope(kind)
            .and_then(|s| s.language)
            .and_then(|l| self.language(l))
    }

    /// Whether `text` spells a keyword of this grammar.
    pub fn is_reserved(&self, text: &str) -> bool {
        self.reserved.contains(text)
    }

    /// Names of the given terminals, in id order.
    pub fn terminal_names(&self, set: &TerminalSet) -> Vec<String> {
        set.iter().map(|t| self.terminal_name(t).to_string()).collect()
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for production in &self.productions {
            write!(f, "{} ->", self.nonterminal(production.lhs).name)?;
            if production.rhs.is_empty() {
                write!(f, " ε")?;
            }
            for symbol in &production.rhs {
                match symbol {
                    GrammarSymbol::Terminal(t) => write!(f, " {}", self.terminal_name(*t))?,
                    GrammarSymbol::NonTerminal(n) => write!(f, " {}", self.nonterminal(*n).name)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
