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

//! Multi-path step parser.
//!
//! Every parser path owns an LR stack (a reference into the shared
//! [`GraphStack`](stack::GraphStack)), a lexer path and a copy-on-write scope
//! tree. One call to [`StepParser::step`] advances every active path by one
//! token:
//!
//! 1. **Close**: apply every reduction the LR tables allow, constrained by
//!    SLR lookahead and the path's context. Each reachable stack is a
//!    candidate configuration.
//! 2. **Admit**: intersect each configuration's shift set with the terminals
//!    valid in its context.
//! 3. **Lex**: hand all configurations to the step lexer as one batch.
//! 4. **Shift**: every token produced for a configuration becomes a successor
//!    path. Tokens that fork the lexer fork the parser.
//! 5. **Prune**: paths without successors die; the highest-scoring one is
//!    kept as the failure to report.
//! 6. **Cap**: beyond `Limits::max_active_paths`, the lowest-scoring paths
//!    are dropped.
//! 7. **Collect**: after a step that pruned paths, once the scratch forest
//!    has doubled since the last collection, trees only pruned paths could
//!    reach are released for reuse.
//!
//! A path that shifts end of input is accepted. Parsing ends when no path is
//! active; [`StepParser::finish`] then resolves the accepted paths according
//! to the [`AmbiguityPolicy`].
//!
//! # Scoring
//!
//! `score = 4 * tokens + reductions - 8 * conflicts`, where a conflict is a
//! fork or a symbol reference that did not resolve in lenient mode.

mod forest;
mod stack;

use std::cmp::Reverse;
use std::sync::Arc;

use pathweave_memory::{Ast, StepScratch, StringInterner, Symbol, TokenPayload};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::context::{ContextSensitiveEngine, ScopeTree};
use crate::error::{ContextError, Error, LexError, ParseError, PartialAst, Result};
use crate::grammar::{Grammar, Production, ScopeEffect, SemanticAction, StateId, TerminalId, TerminalSet};
use crate::lexer::{LexPathId, LexRequest, LexedToken, StepLexer};
use crate::options::{AmbiguityPolicy, ParseOptions};
use crate::session::AstHandle;
use forest::{Forest, ForestRef};
use stack::{GraphStack, StackRef};

const TOKEN_WEIGHT: i64 = 4;
const CONFLICT_PENALTY: i64 = 8;

/// Index of a parser path, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(pub u32);

impl PathId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle of a parser path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    Active,
    Pruned,
    /// Completed the start symbol at end of input.
    Accepted,
}

/// One parse hypothesis.
///
/// A path that advances without forking keeps its id; forks get fresh ids.
#[derive(Debug, Clone)]
pub struct ParserPath {
    id: PathId,
    lex: LexPathId,
    stack: StackRef,
    scopes: Arc<ScopeTree>,
    tokens: u32,
    reductions: u32,
    conflicts: u32,
    status: PathStatus,
}

impl ParserPath {
    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn lex_path(&self) -> LexPathId {
        self.lex
    }

    pub fn status(&self) -> PathStatus {
        self.status
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    pub fn reductions(&self) -> u32 {
        self.reductions
    }

    pub fn conflicts(&self) -> u32 {
        self.conflicts
    }

    /// `4 * tokens + reductions - 8 * conflicts`.
    pub fn score(&self) -> i64 {
        TOKEN_WEIGHT * i64::from(self.tokens) + i64::from(self.reductions) - CONFLICT_PENALTY * i64::from(self.conflicts)
    }
}

/// Outcome of one [`StepParser::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepReport {
    pub step: u64,
    /// Paths still active after the step.
    pub active: usize,
    /// Paths that died or were cut by the cap in this step.
    pub pruned: usize,
    /// Paths that accepted in this step.
    pub accepted: usize,
    /// Paths forked in this step.
    pub created: usize,
    /// No path is active any more.
    pub finished: bool,
}

/// Counters for a whole parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseStats {
    pub steps: u64,
    pub paths_created: usize,
    pub paths_pruned: usize,
    pub accepted: usize,
    pub reductions: u64,
    pub max_active: usize,
    pub tokens: usize,
    /// Live scratch forest nodes.
    pub forest_nodes: usize,
    /// Scratch nodes released after their paths were pruned.
    pub forest_released: usize,
    pub stack_nodes: usize,
    pub memo_hits: u64,
}

/// A stack reachable by reductions within one step.
#[derive(Debug, Clone)]
struct Config {
    owner: PathId,
    stack: StackRef,
    scopes: Arc<ScopeTree>,
    /// Terminals allowed next, from the FOLLOW sets of the reductions made.
    constraint: Option<TerminalSet>,
    reductions: u32,
    conflicts: u32,
}

#[derive(Debug)]
enum FailureKind {
    Lexical { attempted: Vec<String> },
    Syntactic { expected: Vec<String>, found: String },
    Semantic(ContextError),
}

#[derive(Debug)]
struct Failure {
    path: PathId,
    offset: u32,
    score: i64,
    stack: StackRef,
    kind: FailureKind,
}

/// Incremental multi-path parser over one source.
pub struct StepParser<'a> {
    grammar: &'a Grammar,
    engine: ContextSensitiveEngine<'a>,
    options: ParseOptions,
    lexer: StepLexer<'a>,
    stack: GraphStack,
    forest: Forest,
    /// Live forest nodes after the last collection.
    forest_retained: usize,
    paths: Vec<ParserPath>,
    active: Vec<PathId>,
    accepted: Vec<(PathId, ForestRef)>,
    failure: Option<Failure>,
    /// Leaf per token index; tokens shared by several paths share the leaf.
    leaves: FxHashMap<u32, ForestRef>,
    /// Interned non-terminal names, the payload of `Node` and `List` trees.
    rule_names: Vec<Symbol>,
    scratch: StepScratch,
    steps: u64,
    pruned: usize,
    reductions: u64,
    max_active: usize,
}

impl<'a> StepParser<'a> {
    /// Start a parse of `source`. Payload strings are interned into `strings`.
    ///
    /// # Errors
    ///
    /// `ParseError::LimitExceeded` if the source is larger than
    /// `Limits::max_source_size`.
    pub fn new(
        grammar: &'a Grammar,
        source: &'a str,
        strings: &'a mut StringInterner,
        options: ParseOptions,
    ) -> Result<Self> {
        let limits = &options.limits;
        if source.len() > limits.max_source_size {
            return Err(ParseError::limit("source size", source.len(), limits.max_source_size).into());
        }
        let engine = ContextSensitiveEngine::new(grammar).with_max_scope_depth(limits.max_scope_depth);
        let rule_names = grammar.nonterminals().iter().map(|nt| strings.intern(&nt.name)).collect();
        let lexer = StepLexer::new(grammar, source, strings, options.lexer).with_max_tokens(limits.max_tokens);
        let forest = Forest::new(limits.max_nodes);
        let mut stack = GraphStack::new();
        let base = stack.base(grammar.tables().initial());
        let root = ParserPath {
            id: PathId(0),
            lex: lexer.root(),
            stack: base,
            scopes: Arc::new(ScopeTree::new()),
            tokens: 0,
            reductions: 0,
            conflicts: 0,
            status: PathStatus::Active,
        };
        Ok(Self {
            grammar,
            engine,
            options,
            lexer,
            stack,
            forest,
            forest_retained: 0,
            paths: vec![root],
            active: vec![PathId(0)],
            accepted: Vec::new(),
            failure: None,
            leaves: FxHashMap::default(),
            rule_names,
            scratch: StepScratch::new(),
            steps: 0,
            pruned: 0,
            reductions: 0,
            max_active: 1,
        })
    }

    pub fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// The underlying lexer (tokens, lexer paths, interner).
    pub fn lexer(&self) -> &StepLexer<'a> {
        &self.lexer
    }

    /// Every path created so far, indexed by [`PathId`].
    pub fn paths(&self) -> &[ParserPath] {
        &self.paths
    }

    pub fn path(&self, id: PathId) -> Option<&ParserPath> {
        self.paths.get(id.index())
    }

    /// Active paths in creation order.
    pub fn active(&self) -> &[PathId] {
        &self.active
    }

    /// Ids of the paths accepted so far.
    pub fn accepted(&self) -> impl Iterator<Item = PathId> + '_ {
        self.accepted.iter().map(|&(id, _)| id)
    }

    pub fn is_finished(&self) -> bool {
        self.active.is_empty()
    }

    /// Terminals the context of path `id` admits.
    pub fn valid_terminals(&self, id: PathId) -> Option<TerminalSet> {
        let path = self.path(id)?;
        Some(self.engine.valid_terminals(&path.scopes, path.scopes.current()))
    }

    pub fn stats(&self) -> ParseStats {
        let lexer = self.lexer.stats();
        ParseStats {
            steps: self.steps,
            paths_created: self.paths.len(),
            paths_pruned: self.pruned,
            accepted: self.accepted.len(),
            reductions: self.reductions,
            max_active: self.max_active,
            tokens: lexer.tokens,
            forest_nodes: self.forest.len(),
            forest_released: self.forest.released(),
            stack_nodes: self.stack.len(),
            memo_hits: lexer.memo_hits,
        }
    }

    /// Advance every active path by one token.
    ///
    /// Once no path is active this does nothing and reports `finished`.
    ///
    /// # Errors
    ///
    /// `ParseError::LimitExceeded` when a step, token, node or reduction
    /// limit is hit. Dead ends are not errors here; they surface from
    /// [`finish`](Self::finish).
    pub fn step(&mut self) -> Result<StepReport> {
        if self.active.is_empty() {
            return Ok(self.report(0, 0, 0));
        }
        self.steps += 1;
        let max_steps = self.options.limits.max_steps;
        if self.steps as usize > max_steps {
            return Err(ParseError::limit("step", self.steps as usize, max_steps).into());
        }

        let owners = std::mem::take(&mut self.active);
        let mut semantic: FxHashMap<PathId, ContextError> = FxHashMap::default();

        // Close
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.reset();
        let mut configs = Vec::with_capacity(owners.len());
        for &owner in &owners {
            self.close(owner, &scratch, &mut configs, &mut semantic)?;
        }
        self.scratch = scratch;

        // Admit
        let admissible = admissible_sets(self.grammar, &self.engine, &self.stack, &configs);

        // Lex
        let mut requests = Vec::with_capacity(configs.len());
        let mut request_config = Vec::with_capacity(configs.len());
        for (i, (config, set)) in configs.iter().zip(&admissible).enumerate() {
            if set.is_empty() {
                continue;
            }
            requests.push(LexRequest {
                path: self.paths[config.owner.index()].lex,
                admissible: set,
                scopes: &config.scopes,
            });
            request_config.push(i);
        }
        let batch = self.lexer.step(&requests)?;
        let advanced: FxHashSet<LexPathId> = batch.iter().map(|e| requests[e.request as usize].path).collect();
        for request in &requests {
            if !advanced.contains(&request.path) {
                self.lexer.prune(request.path);
            }
        }

        // Shift
        let eof = self.grammar.eof();
        let mut born: Vec<(PathId, ParserPath)> = Vec::new();
        let mut claimed: FxHashSet<PathId> = FxHashSet::default();
        let mut next_id = self.paths.len() as u32;
        for entry in batch.iter() {
            let config = &configs[request_config[entry.request as usize]];
            let owner = config.owner;
            let mut scopes = Arc::clone(&config.scopes);
            let (stack, status) = if entry.terminal == eof {
                (config.stack, PathStatus::Accepted)
            } else {
                let state = self.grammar.tables().state(self.stack.state(config.stack));
                let Some(next) = state.shift(entry.terminal) else {
                    continue;
                };
                let leaf = self.leaf(entry)?;
                if let Err(e) = self.apply_scope_effect(entry.terminal, &mut scopes) {
                    semantic.entry(owner).or_insert(e.with_pos(entry.token.pos()));
                    continue;
                }
                (self.stack.push(config.stack, next, leaf), PathStatus::Active)
            };
            let id = if claimed.insert(owner) {
                owner
            } else {
                next_id += 1;
                PathId(next_id - 1)
            };
            born.push((
                owner,
                ParserPath {
                    id,
                    lex: entry.path,
                    stack,
                    scopes,
                    tokens: self.paths[owner.index()].tokens + 1,
                    reductions: config.reductions,
                    conflicts: config.conflicts,
                    status,
                },
            ));
        }
        self.lexer.recycle(batch);

        // Forks count against every branch.
        let mut fanout: FxHashMap<PathId, u32> = FxHashMap::default();
        for (owner, _) in &born {
            *fanout.entry(*owner).or_default() += 1;
        }
        for (owner, path) in &mut born {
            if fanout.get(owner).is_some_and(|&n| n > 1) {
                path.conflicts += 1;
            }
        }

        // Prune
        let mut pruned = 0;
        for &owner in &owners {
            if claimed.contains(&owner) {
                continue;
            }
            self.paths[owner.index()].status = PathStatus::Pruned;
            pruned += 1;
            let (offset, kind) = match semantic.remove(&owner) {
                Some(e) => {
                    let offset = self.lexer.content_offset(self.paths[owner.index()].lex);
                    (offset, FailureKind::Semantic(e))
                }
                None => self.diagnose(owner, &configs, &admissible),
            };
            self.record_failure(owner, offset, kind);
        }

        let created = next_id as usize - self.paths.len();
        let mut accepted = 0;
        for (_, mut path) in born {
            let id = path.id;
            match path.status {
                PathStatus::Accepted => match self.stack.node(path.stack) {
                    Some(root) => {
                        self.accepted.push((id, root));
                        accepted += 1;
                    }
                    None => path.status = PathStatus::Pruned,
                },
                PathStatus::Active => self.active.push(id),
                PathStatus::Pruned => {}
            }
            if id.index() < self.paths.len() {
                self.paths[id.index()] = path;
            } else {
                self.paths.push(path);
            }
        }

        // Cap
        let cap = self.options.limits.max_active_paths.max(1);
        if self.active.len() > cap {
            let paths = &self.paths;
            self.active.sort_by_key(|id| (Reverse(paths[id.index()].score()), *id));
            let dropped = self.active.split_off(cap);
            warn!(
                step = self.steps,
                kept = cap,
                dropped = dropped.len(),
                "active path cap reached, pruning lowest scores"
            );
            for id in &dropped {
                self.paths[id.index()].status = PathStatus::Pruned;
            }
            pruned += dropped.len();
        }
        self.active.sort_unstable();

        // Collect
        if pruned > 0 && self.forest.len() >= 2 * self.forest_retained {
            self.collect_forest();
        }

        self.pruned += pruned;
        self.max_active = self.max_active.max(self.active.len());
        let report = self.report(pruned, accepted, created);
        trace!(
            step = report.step,
            configs = configs.len(),
            active = report.active,
            pruned = report.pruned,
            accepted = report.accepted,
            created = report.created,
            "parser step"
        );
        Ok(report)
    }

    /// Step until no path is active and resolve the outcome.
    ///
    /// # Errors
    ///
    /// - `LexError::NoViablePath` if the highest-scoring pruned path died
    ///   because no token matched
    /// - `ParseError::NoViableParse` if it died on an unexpected token
    /// - `ContextError` if it died on a scope or symbol error
    /// - `ParseError::UnresolvedAmbiguity` if several paths accepted under
    ///   `AmbiguityPolicy::Report`
    /// - `ParseError::LimitExceeded` from any step
    pub fn finish(mut self) -> Result<AstHandle> {
        while !self.is_finished() {
            self.step()?;
        }
        let stats = self.stats();
        debug!(
            steps = stats.steps,
            created = stats.paths_created,
            pruned = stats.paths_pruned,
            accepted = stats.accepted,
            tokens = stats.tokens,
            "parse finished"
        );

        let Some(&first) = self.accepted.first() else {
            return Err(self.failure_error());
        };
        let (_, root) = if self.accepted.len() == 1 {
            first
        } else {
            match self.options.ambiguity {
                AmbiguityPolicy::Report => {
                    let scores = self.accepted.iter().map(|(id, _)| self.paths[id.index()].score()).collect();
                    return Err(ParseError::UnresolvedAmbiguity {
                        count: self.accepted.len(),
                        scores,
                    }
                    .into());
                }
                AmbiguityPolicy::FirstCreated => {
                    self.accepted.iter().copied().min_by_key(|&(id, _)| id).unwrap_or(first)
                }
                AmbiguityPolicy::HighestScore => self
                    .accepted
                    .iter()
                    .copied()
                    .max_by_key(|&(id, _)| (self.paths[id.index()].score(), Reverse(id)))
                    .unwrap_or(first),
            }
        };

        let mut ast = Ast::with_capacity(self.forest.len());
        let mut strings = StringInterner::new();
        let root = self.forest.materialize(root, self.lexer.strings(), &mut ast, &mut strings)?;
        Ok(AstHandle::new(ast, strings, root, stats))
    }

    /// Release forest nodes that no active path, accepted tree or recorded
    /// failure can reach.
    fn collect_forest(&mut self) {
        // A failure is only reported when nothing accepts.
        if !self.accepted.is_empty() {
            self.failure = None;
        }
        let tops = self
            .active
            .iter()
            .map(|id| self.paths[id.index()].stack)
            .chain(self.failure.as_ref().map(|f| f.stack));
        let mut roots = self.stack.trees(tops);
        roots.extend(self.accepted.iter().map(|&(_, root)| root));
        let released = self.forest.collect(&roots);
        let forest = &self.forest;
        self.leaves.retain(|_, leaf| forest.is_live(*leaf));
        self.forest_retained = self.forest.len();
        trace!(step = self.steps, released, live = self.forest_retained, "forest collected");
    }

    fn report(&self, pruned: usize, accepted: usize, created: usize) -> StepReport {
        StepReport {
            step: self.steps,
            active: self.active.len(),
            pruned,
            accepted,
            created,
            finished: self.active.is_empty(),
        }
    }

    /// Every configuration reachable from `owner` by reductions, appended to
    /// `out` (the unreduced stack first).
    fn close(
        &mut self,
        owner: PathId,
        scratch: &StepScratch,
        out: &mut Vec<Config>,
        semantic: &mut FxHashMap<PathId, ContextError>,
    ) -> Result<()> {
        let grammar = self.grammar;
        let tables = grammar.tables();
        let path = &self.paths[owner.index()];
        let base = Config {
            owner,
            stack: path.stack,
            scopes: Arc::clone(&path.scopes),
            constraint: None,
            reductions: path.reductions,
            conflicts: path.conflicts,
        };
        let at = self.lexer.content_offset(path.lex);
        let limit = self.options.limits.max_reductions_per_step;
        let strict = self.options.strict_symbols;

        let mut seen: FxHashSet<(StateId, Option<StackRef>)> = FxHashSet::default();
        seen.insert((self.stack.state(base.stack), self.stack.below(base.stack)));
        let mut work = scratch.vec::<Config>();
        work.push(base);
        let mut kids = Vec::new();
        let mut performed = 0usize;

        while let Some(config) = work.pop() {
            let state = tables.state(self.stack.state(config.stack));
            for &id in state.reductions() {
                let production = grammar.production(id);
                let follow = tables.follow(production.lhs);
                let constraint = match &config.constraint {
                    Some(c) => {
                        let mut c = c.clone();
                        c.intersect_with(follow);
                        c
                    }
                    None => follow.clone(),
                };
                if constraint.is_empty() || !self.engine.is_rule_active(id, &config.scopes, config.scopes.current()) {
                    continue;
                }
                kids.clear();
                let Some(below) = self.stack.pop(config.stack, production.rhs.len(), &mut kids) else {
                    continue;
                };
                let Some(goto) = tables.state(self.stack.state(below)).goto(production.lhs) else {
                    continue;
                };
                if !seen.insert((goto, Some(below))) {
                    continue;
                }
                performed += 1;
                if performed > limit {
                    return Err(ParseError::limit("reductions per step", performed, limit).into());
                }

                let mut scopes = Arc::clone(&config.scopes);
                let mut conflicts = config.conflicts;
                if let Err(e) = self.run_actions(production, &kids, &mut scopes) {
                    if strict {
                        semantic.entry(owner).or_insert(e);
                        continue;
                    }
                    conflicts += 1;
                }
                let node = self.forest.reduce(production, &kids, self.rule_names[production.lhs.index()], at)?;
                let stack = self.stack.push(below, goto, node);
                work.push(Config {
                    owner,
                    stack,
                    scopes,
                    constraint: Some(constraint),
                    reductions: config.reductions + 1,
                    conflicts,
                });
            }
            out.push(config);
        }
        self.reductions += performed as u64;
        Ok(())
    }

    fn run_actions(
        &self,
        production: &Production,
        kids: &[ForestRef],
        scopes: &mut Arc<ScopeTree>,
    ) -> std::result::Result<(), ContextError> {
        for action in &production.actions {
            let (child, declare) = match *action {
                SemanticAction::Declare { child, kind } => (child, Some(kind)),
                SemanticAction::Reference { child } => (child, None),
            };
            let Some((sym, span)) = kids.get(child).and_then(|&k| self.forest.name_of(k)) else {
                continue;
            };
            let Some(name) = self.lexer.strings().resolve(sym) else {
                continue;
            };
            let tree = Arc::make_mut(scopes);
            let current = tree.current();
            let result = match declare {
                Some(kind) => self.engine.declare(tree, current, name, kind, span),
                None => self.engine.record_usage(tree, current, name, span),
            };
            result.map_err(|e| e.with_pos(self.lexer.position(span.offset())))?;
        }
        Ok(())
    }

    fn apply_scope_effect(
        &self,
        terminal: TerminalId,
        scopes: &mut Arc<ScopeTree>,
    ) -> std::result::Result<(), ContextError> {
        match self.grammar.terminal(terminal).scope_effect {
            ScopeEffect::None => Ok(()),
            ScopeEffect::Open(kind) => {
                let tree = Arc::make_mut(scopes);
                let current = tree.current();
                self.engine.enter_context(tree, current, kind).map(|_| ())
            }
            ScopeEffect::Close => {
                let tree = Arc::make_mut(scopes);
                let current = tree.current();
                self.engine.exit_context(tree, current).map(|_| ())
            }
        }
    }

    fn leaf(&mut self, entry: &LexedToken) -> Result<ForestRef> {
        if let Some(&leaf) = self.leaves.get(&entry.index) {
            return Ok(leaf);
        }
        let def = self.grammar.terminal(entry.terminal);
        let payload = match entry.token.payload() {
            TokenPayload::Interned(sym) => Some(sym),
            TokenPayload::Scalar(_) => self
                .lexer
                .token_text(entry.index)
                .map(|text| self.lexer.strings_mut().intern(text)),
            TokenPayload::None => None,
        };
        let leaf = self
            .forest
            .leaf(def.node_kind, entry.terminal, payload, entry.token.span(), def.hidden)?;
        self.leaves.insert(entry.index, leaf);
        Ok(leaf)
    }

    /// Why `owner` got no token: nothing in its context matched (lexical) or
    /// something matched that the grammar does not allow here (syntactic).
    fn diagnose(&mut self, owner: PathId, configs: &[Config], admissible: &[TerminalSet]) -> (u32, FailureKind) {
        let grammar = self.grammar;
        let path = &self.paths[owner.index()];
        let (lex, scopes) = (path.lex, Arc::clone(&path.scopes));
        let mut expected = TerminalSet::default();
        for (config, set) in configs.iter().zip(admissible) {
            if config.owner == owner {
                expected.union_with(set);
            }
        }
        let valid = self.engine.valid_terminals(&scopes, scopes.current());
        let probe = self.lexer.probe(lex, &valid, &scopes);
        let expected_names = grammar.terminal_names(&expected);
        if probe.found.is_none() && !expected.is_empty() {
            return (
                probe.offset,
                FailureKind::Lexical {
                    attempted: expected_names,
                },
            );
        }

        let source = self.lexer.source();
        let at = probe.offset as usize;
        let found = match probe.found {
            Some((t, _)) if t == grammar.eof() => None,
            Some((_, len)) => source.get(at..at + len as usize).map(|text| format!("'{text}'")),
            None => source.get(at..).and_then(|rest| rest.chars().next()).map(|c| format!("'{c}'")),
        };
        (
            probe.offset,
            FailureKind::Syntactic {
                expected: expected_names,
                found: found.unwrap_or_else(|| "end of input".to_string()),
            },
        )
    }

    /// Keep the failure of the highest-scoring pruned path, lowest id on a
    /// tie.
    fn record_failure(&mut self, owner: PathId, offset: u32, kind: FailureKind) {
        let path = &self.paths[owner.index()];
        let score = path.score();
        let better = match &self.failure {
            None => true,
            Some(best) => (score, Reverse(owner)) > (best.score, Reverse(best.path)),
        };
        if better {
            self.failure = Some(Failure {
                path: owner,
                offset,
                score,
                stack: path.stack,
                kind,
            });
        }
    }

    fn failure_error(&mut self) -> Error {
        let Some(failure) = self.failure.take() else {
            let offset = self.lexer.source().len() as u32;
            return ParseError::NoViableParse {
                offset: offset as usize,
                pos: self.lexer.position(offset),
                expected: Vec::new(),
                found: "end of input".to_string(),
                partial: None,
            }
            .into();
        };
        let pos = self.lexer.position(failure.offset);
        match failure.kind {
            FailureKind::Lexical { attempted } => LexError::NoViablePath {
                offset: failure.offset as usize,
                line: pos.line(),
                column: pos.column(),
                attempted,
            }
            .into(),
            FailureKind::Semantic(e) => e.with_pos(pos).into(),
            FailureKind::Syntactic { expected, found } => ParseError::NoViableParse {
                offset: failure.offset as usize,
                pos,
                expected,
                found,
                partial: self.partial(failure.stack).map(Box::new),
            }
            .into(),
        }
    }

    /// Trees of every symbol on `stack`, bottom to top.
    fn partial(&self, stack: StackRef) -> Option<PartialAst> {
        let mut ast = Ast::new();
        let mut strings = StringInterner::new();
        let roots = self
            .stack
            .spine(stack)
            .into_iter()
            .map(|r| self.forest.materialize(r, self.lexer.strings(), &mut ast, &mut strings))
            .collect::<std::result::Result<Vec<_>, _>>()
            .ok()?;
        Some(PartialAst { ast, strings, roots })
    }
}

impl std::fmt::Debug for StepParser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepParser")
            .field("steps", &self.steps)
            .field("paths", &self.paths.len())
            .field("active", &self.active.len())
            .field("accepted", &self.accepted.len())
            .finish()
    }
}

fn admissible_for(
    grammar: &Grammar,
    engine: &ContextSensitiveEngine<'_>,
    stack: &GraphStack,
    config: &Config,
) -> TerminalSet {
    let state = grammar.tables().state(stack.state(config.stack));
    let mut set = state.shift_set().clone();
    if let Some(constraint) = &config.constraint {
        set.intersect_with(constraint);
    }
    if !set.is_empty() {
        set.intersect_with(&engine.valid_terminals(&config.scopes, config.scopes.current()));
    }
    let eof = grammar.eof();
    if state.accepts() && config.constraint.as_ref().map_or(true, |c| c.contains(eof)) {
        set.insert(eof);
    }
    set
}

#[cfg(feature = "parallel")]
fn admissible_sets(
    grammar: &Grammar,
    engine: &ContextSensitiveEngine<'_>,
    stack: &GraphStack,
    configs: &[Config],
) -> Vec<TerminalSet> {
    use rayon::prelude::*;
    configs
        .par_iter()
        .map(|config| admissible_for(grammar, engine, stack, config))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn admissible_sets(
    grammar: &Grammar,
    engine: &ContextSensitiveEngine<'_>,
    stack: &GraphStack,
    configs: &[Config],
) -> Vec<TerminalSet> {
    configs
        .iter()
        .map(|config| admissible_for(grammar, engine, stack, config))
        .collect()
}
