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

//! Scope trees, symbol tables and the context-sensitive filtering of
//! terminals and productions.
//!
//! Each parser path owns an `Arc<ScopeTree>` and clones it on first write,
//! so forks share their symbol tables until one of them declares something.
//! [`ContextSensitiveEngine`] holds no state of its own: it interprets a
//! scope tree against the grammar's restrictions and conditions.

use pathweave_memory::ByteSpan;
use rustc_hash::FxHashMap;

use crate::error::ContextError;
use crate::grammar::{
    Grammar, ProductionCondition, ProductionId, ScopeKind, ScopeRestriction, SymbolCondition, SymbolKind,
    TerminalId, TerminalSet,
};

/// Index of a context within one [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl ContextId {
    /// The root context of every tree.
    pub const ROOT: ContextId = ContextId(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: Box<str>,
    pub kind: SymbolKind,
    /// Context the symbol was declared in.
    pub scope: ContextId,
    pub definition: ByteSpan,
    pub usages: Vec<ByteSpan>,
}

/// One node of the scope tree.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub id: ContextId,
    pub parent: Option<ContextId>,
    pub kind: ScopeKind,
    /// Productions disabled in this context and below.
    pub overrides: Vec<ProductionId>,
    symbols: FxHashMap<Box<str>, SymbolInfo>,
    depth: usize,
    closed: bool,
}

impl ParseContext {
    /// Symbol declared directly in this context.
    pub fn local(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols.get(name)
    }

    /// Symbols declared directly in this context, in no particular order.
    pub fn symbols(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.symbols.values()
    }

    /// Nesting depth (root = 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the context has been exited.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// All contexts one path has entered, plus the one it is in.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    contexts: Vec<ParseContext>,
    current: ContextId,
}

impl ScopeTree {
    /// A tree holding only the root context.
    pub fn new() -> Self {
        Self {
            contexts: vec![ParseContext {
                id: ContextId::ROOT,
                parent: None,
                kind: ScopeKind::ROOT,
                overrides: Vec::new(),
                symbols: FxHashMap::default(),
                depth: 0,
                closed: false,
            }],
            current: ContextId::ROOT,
        }
    }

    /// The innermost open context.
    pub fn current(&self) -> ContextId {
        self.current
    }

    pub fn context(&self, id: ContextId) -> Option<&ParseContext> {
        self.contexts.get(id.index())
    }

    /// Number of contexts ever entered, root included.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// `id` and its ancestors, innermost first.
    pub fn chain(&self, id: ContextId) -> Chain<'_> {
        Chain {
            tree: self,
            next: self.context(id).map(|c| c.id),
        }
    }

    fn get(&self, id: ContextId) -> Result<&ParseContext, ContextError> {
        self.contexts
            .get(id.index())
            .ok_or(ContextError::UnknownContext { id: id.0 })
    }

    fn get_mut(&mut self, id: ContextId) -> Result<&mut ParseContext, ContextError> {
        self.contexts
            .get_mut(id.index())
            .ok_or(ContextError::UnknownContext { id: id.0 })
    }
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator from a context up to the root.
pub struct Chain<'t> {
    tree: &'t ScopeTree,
    next: Option<ContextId>,
}

impl<'t> Iterator for Chain<'t> {
    type Item = &'t ParseContext;

    fn next(&mut self) -> Option<Self::Item> {
        let context = self.tree.context(self.next?)?;
        self.next = context.parent;
        Some(context)
    }
}

/// Interprets scope trees against a grammar.
#[derive(Debug, Clone, Copy)]
pub struct ContextSensitiveEngine<'g> {
    grammar: &'g Grammar,
    max_scope_depth: usize,
}

impl<'g> ContextSensitiveEngine<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            max_scope_depth: usize::MAX,
        }
    }

    pub fn with_max_scope_depth(mut self, max: usize) -> Self {
        self.max_scope_depth = max;
        self
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Terminals whose scope restriction holds in `context`.
    ///
    /// Symbol conditions depend on the matched text and are checked per
    /// match by [`token_allowed`](Self::token_allowed). End of input is always
    /// included; trivia never is.
    pub fn valid_terminals(&self, scopes: &ScopeTree, context: ContextId) -> TerminalSet {
        let mut set = TerminalSet::with_capacity(self.grammar.terminal_count());
        for (i, terminal) in self.grammar.terminals().iter().enumerate() {
            if !terminal.skip && self.restriction_holds(&terminal.scope, scopes, context) {
                set.insert(TerminalId(i as u16));
            }
        }
        set
    }

    /// Productions that may be reduced in `context`.
    pub fn activate_rules(&self, scopes: &ScopeTree, context: ContextId) -> Vec<ProductionId> {
        self.grammar
            .productions()
            .iter()
            .filter(|p| self.is_rule_active(p.id, scopes, context))
            .map(|p| p.id)
            .collect()
    }

    /// Whether `production`'s condition holds and no enclosing context disables it.
    pub fn is_rule_active(&self, production: ProductionId, scopes: &ScopeTree, context: ContextId) -> bool {
        if scopes.chain(context).any(|c| c.overrides.contains(&production)) {
            return false;
        }
        match &self.grammar.production(production).condition {
            ProductionCondition::Always => true,
            ProductionCondition::InScope(kind) => scopes.chain(context).any(|c| c.kind == *kind),
            ProductionCondition::NotInScope(kind) => !scopes.chain(context).any(|c| c.kind == *kind),
            ProductionCondition::SymbolDeclared(name) => self.resolve_symbol(name, scopes, context).is_ok(),
        }
    }

    /// Whether `terminal` may be recognized with `text` in `context`.
    pub fn token_allowed(&self, terminal: TerminalId, text: &str, scopes: &ScopeTree, context: ContextId) -> bool {
        let def = self.grammar.terminal(terminal);
        if !self.restriction_holds(&def.scope, scopes, context) {
            return false;
        }
        match def.condition {
            None => true,
            Some(SymbolCondition::DeclaredAs(kind)) => self.declared_as(text, kind, scopes, context),
            Some(SymbolCondition::NotDeclaredAs(kind)) => !self.declared_as(text, kind, scopes, context),
        }
    }

    fn declared_as(&self, name: &str, kind: SymbolKind, scopes: &ScopeTree, context: ContextId) -> bool {
        matches!(self.resolve_symbol(name, scopes, context), Ok(info) if info.kind == kind)
    }

    fn restriction_holds(&self, restriction: &ScopeRestriction, scopes: &ScopeTree, context: ContextId) -> bool {
        match restriction {
            ScopeRestriction::Anywhere => true,
            ScopeRestriction::OnlyIn(kinds) => scopes.chain(context).any(|c| kinds.contains(&c.kind)),
            ScopeRestriction::NotIn(kinds) => !scopes.chain(context).any(|c| kinds.contains(&c.kind)),
        }
    }

    /// Look `name` up from `context` outwards; the innermost declaration wins.
    ///
    /// Leaving an embedded-language context restricts the lookup to that
    /// language's allow-list.
    ///
    /// # Errors
    ///
    /// - `ScopeViolation` if the name is only declared beyond an isolation
    ///   boundary that does not allow it
    /// - `UndefinedSymbol` if no context declares it
    pub fn resolve_symbol<'t>(
        &self,
        name: &str,
        scopes: &'t ScopeTree,
        context: ContextId,
    ) -> Result<&'t SymbolInfo, ContextError> {
        for ctx in scopes.chain(context) {
            let Some(info) = ctx.symbols.get(name) else {
                continue;
            };
            // Every isolated context left on the way out must allow the name.
            let blocked = scopes
                .chain(context)
                .take_while(|c| c.id != ctx.id)
                .filter_map(|c| self.grammar.language_of(c.kind))
                .find(|lang| !lang.allows(name));
            return match blocked {
                Some(lang) => Err(ContextError::ScopeViolation {
                    name: name.to_string(),
                    language: lang.name.clone(),
                    pos: None,
                }),
                None => Ok(info),
            };
        }
        Err(ContextError::UndefinedSymbol {
            name: name.to_string(),
            pos: None,
        })
    }

    /// Open a child context of `parent` and make it current.
    pub fn enter_context(
        &self,
        scopes: &mut ScopeTree,
        parent: ContextId,
        kind: ScopeKind,
    ) -> Result<ContextId, ContextError> {
        let depth = scopes.get(parent)?.depth + 1;
        if depth > self.max_scope_depth {
            return Err(ContextError::ScopeTooDeep {
                depth,
                max: self.max_scope_depth,
                pos: None,
            });
        }
        let id = ContextId(scopes.contexts.len() as u32);
        let overrides = self
            .grammar
            .scope(kind)
            .map(|s| s.disabled.clone())
            .unwrap_or_default();
        scopes.contexts.push(ParseContext {
            id,
            parent: Some(parent),
            kind,
            overrides,
            symbols: FxHashMap::default(),
            depth,
            closed: false,
        });
        scopes.current = id;
        Ok(id)
    }

    /// Close `context` and make its parent current.
    ///
    /// # Errors
    ///
    /// `UnbalancedScope` for the root context.
    pub fn exit_context(&self, scopes: &mut ScopeTree, context: ContextId) -> Result<ContextId, ContextError> {
        let ctx = scopes.get_mut(context)?;
        let Some(parent) = ctx.parent else {
            return Err(ContextError::UnbalancedScope { pos: None });
        };
        ctx.closed = true;
        scopes.current = parent;
        Ok(parent)
    }

    /// Declare `name` in `context`. A redeclaration in the same context
    /// replaces the earlier one.
    pub fn declare(
        &self,
        scopes: &mut ScopeTree,
        context: ContextId,
        name: &str,
        kind: SymbolKind,
        definition: ByteSpan,
    ) -> Result<(), ContextError> {
        let ctx = scopes.get_mut(context)?;
        ctx.symbols.insert(
            name.into(),
            SymbolInfo {
                name: name.into(),
                kind,
                scope: context,
                definition,
                usages: Vec::new(),
            },
        );
        Ok(())
    }

    /// Resolve `name` and record a usage at `span` on the symbol found.
    pub fn record_usage(
        &self,
        scopes: &mut ScopeTree,
        context: ContextId,
        name: &str,
        span: ByteSpan,
    ) -> Result<(), ContextError> {
        let owner = self.resolve_symbol(name, scopes, context)?.scope;
        if let Some(info) = scopes.get_mut(owner)?.symbols.get_mut(name) {
            info.usages.push(span);
        }
        Ok(())
    }
}
