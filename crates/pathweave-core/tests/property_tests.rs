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

//! Property-based tests for the parsing engine.

use pathweave_core::memory::{NodeKind, Order};
use pathweave_core::{parse, Error, ParseError, ParseOptions, ParseSession};
use pathweave_test::grammars;
use proptest::prelude::*;

/// Numbers and operators as an arithmetic source, plus the numbers.
fn arithmetic_source() -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec((0u32..10_000, prop::bool::ANY, 0usize..3), 1..24).prop_map(|terms| {
        let mut source = String::new();
        let mut numbers = Vec::new();
        for (i, (n, star, spaces)) in terms.into_iter().enumerate() {
            if i > 0 {
                source.push_str(&" ".repeat(spaces));
                source.push(if star { '*' } else { '+' });
                source.push_str(&" ".repeat(spaces));
            }
            source.push_str(&n.to_string());
            numbers.push(n.to_string());
        }
        (source, numbers)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: unambiguous input has exactly one accepted path, and its
    /// leaves are the operands in source order.
    #[test]
    fn prop_arithmetic_single_parse((source, numbers) in arithmetic_source()) {
        let tree = parse(&grammars::arithmetic(), &source).unwrap();
        prop_assert_eq!(tree.stats().accepted, 1);
        let leaves: Vec<String> = tree
            .ast()
            .traverse(tree.root(), Order::DepthFirst)
            .filter(|&id| tree.ast().node(id).is_some_and(|n| n.kind == NodeKind::Literal))
            .filter_map(|id| tree.text(id).map(str::to_string))
            .collect();
        prop_assert_eq!(leaves, numbers);
    }

    /// Property: parsing is deterministic, stats included.
    #[test]
    fn prop_parse_deterministic((source, _) in arithmetic_source()) {
        let grammar = grammars::arithmetic();
        let a = parse(&grammar, &source).unwrap();
        let b = parse(&grammar, &source).unwrap();
        prop_assert!(a.structurally_equal(&b));
        prop_assert_eq!(a.stats(), b.stats());
    }

    /// Property: serialize then deserialize preserves structure.
    #[test]
    fn prop_tree_round_trip((source, _) in arithmetic_source()) {
        let tree = parse(&grammars::arithmetic(), &source).unwrap();
        let back = pathweave_core::deserialize(&pathweave_core::serialize(&tree)).unwrap();
        prop_assert!(tree.structurally_equal(&back));
    }

    /// Property: a trailing operator fails at end of input.
    #[test]
    fn prop_trailing_operator_fails_at_end((source, _) in arithmetic_source()) {
        let broken = format!("{source}+");
        let err = parse(&grammars::arithmetic(), &broken).unwrap_err();
        match err {
            Error::Parse(ParseError::NoViableParse { offset, found, .. }) => {
                prop_assert_eq!(offset, broken.len());
                prop_assert_eq!(found, "end of input");
            }
            other => prop_assert!(false, "unexpected error: {:?}", other),
        }
    }

    /// Property: arbitrary input never panics.
    #[test]
    fn prop_arbitrary_input_terminates(source in ".{0,40}") {
        let grammar = grammars::embedded_sql();
        let _ = parse(&grammar, &source);
    }

    /// Property: under a cap of one path, ambiguous sums still yield one tree.
    #[test]
    fn prop_capped_ambiguity_resolves(terms in 1usize..12) {
        let source = pathweave_test::sources::sum_chain(terms);
        let options = ParseOptions::builder().max_active_paths(1).build();
        let mut session = ParseSession::with_options(grammars::ambiguous_sum(), options);
        let tree = session.parse(&source).unwrap();
        prop_assert_eq!(tree.stats().accepted, 1);
        prop_assert_eq!(tree.ast().len(), 2 * terms - 1);
    }
}
