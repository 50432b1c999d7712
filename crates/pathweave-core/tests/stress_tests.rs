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

//! Stress tests: large inputs, deep nesting, wide ambiguity, threads.

use std::sync::Arc;
use std::thread;

use pathweave_core::memory::{walk, StatsCollector};
use pathweave_core::{parse, AmbiguityPolicy, Error, Limits, ParseError, ParseOptions, ParseSession};
use pathweave_test::{grammars, sources};

// =============================================================================
// Large Inputs
// =============================================================================

#[test]
fn test_long_sum() {
    let source = sources::sum_chain(10_000);
    let tree = parse(&grammars::arithmetic(), &source).unwrap();
    assert_eq!(tree.ast().len(), 2 * 10_000 - 1);
    assert_eq!(tree.stats().max_active, 1);
}

#[test]
fn test_mixed_arithmetic() {
    let source = sources::mixed_arithmetic(5_000);
    let tree = parse(&grammars::arithmetic(), &source).unwrap();
    let mut stats = StatsCollector::default();
    walk(tree.ast(), tree.root(), &mut stats).unwrap();
    assert_eq!(stats.literal_count, 5_000);
}

#[test]
fn test_many_typedef_statements() {
    let source = sources::typedef_unit(3_000);
    let tree = parse(&grammars::typedef(), &source).unwrap();
    assert_eq!(tree.ast().children(tree.root()).count(), 3_000);
}

// =============================================================================
// Deep Nesting
// =============================================================================

#[test]
fn test_deep_parentheses() {
    let source = sources::nested_parens(2_000);
    let tree = parse(&grammars::arithmetic(), &source).unwrap();
    // parentheses are hidden and passed through
    assert_eq!(tree.ast().len(), 1);
}

#[test]
fn test_nested_blocks_within_limit() {
    let source = sources::nested_blocks(200);
    assert!(parse(&grammars::blocks(), &source).is_ok());
}

#[test]
fn test_nested_blocks_beyond_scope_limit() {
    let source = sources::nested_blocks(40);
    let options = ParseOptions::builder().max_scope_depth(16).build();
    let err = ParseSession::with_options(grammars::blocks(), options)
        .parse(&source)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Context(pathweave_core::ContextError::ScopeTooDeep { max: 16, .. })
    ));
}

// =============================================================================
// Ambiguity Pressure
// =============================================================================

#[test]
fn test_wide_ambiguity_under_cap() {
    let source = sources::sum_chain(40);
    let options = ParseOptions::builder()
        .max_active_paths(8)
        .ambiguity(AmbiguityPolicy::HighestScore)
        .build();
    let tree = ParseSession::with_options(grammars::ambiguous_sum(), options)
        .parse(&source)
        .unwrap();
    let stats = tree.stats();
    assert!(stats.max_active <= 8);
    assert!(stats.paths_pruned > 0);
    assert_eq!(tree.ast().len(), 79);
}

#[test]
fn test_step_limit_stops_long_parse() {
    let source = sources::sum_chain(1_000);
    let options = ParseOptions::builder()
        .limits(Limits {
            max_steps: 100,
            ..Limits::default()
        })
        .build();
    let err = ParseSession::with_options(grammars::arithmetic(), options)
        .parse(&source)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Parse(ParseError::LimitExceeded { limit: "step", .. })
    ));
}

#[test]
fn test_node_limit() {
    let source = sources::sum_chain(100);
    let options = ParseOptions::builder().max_nodes(50).build();
    let err = ParseSession::with_options(grammars::arithmetic(), options)
        .parse(&source)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Parse(ParseError::LimitExceeded { limit: "node", .. })
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_sessions_share_grammar() {
    let grammar = grammars::typedef();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let grammar = Arc::clone(&grammar);
            thread::spawn(move || {
                let source = sources::typedef_unit(100 + i * 10);
                parse(&grammar, &source).map(|tree| tree.ast().children(tree.root()).count())
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let count = handle.join().unwrap().unwrap();
        assert_eq!(count, 100 + i * 10);
    }
}

#[test]
fn test_trees_move_across_threads() {
    let tree = parse(&grammars::arithmetic(), "1+2*3").unwrap();
    let bytes = thread::spawn(move || pathweave_core::serialize(&tree)).join().unwrap();
    assert!(pathweave_core::deserialize(&bytes).is_ok());
}
