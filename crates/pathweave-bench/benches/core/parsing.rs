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

//! Parser benchmarks: unambiguous, context-sensitive and ambiguous
//! workloads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pathweave_bench::{size_label, sizes};
use pathweave_core::{AmbiguityPolicy, ParseOptions, ParseSession};
use pathweave_test::{grammars, sources};

// ============================================================================
// Unambiguous Parsing
// ============================================================================

fn bench_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_arithmetic");
    let grammar = grammars::arithmetic();

    for size in sizes::ALL {
        let source = sources::mixed_arithmetic(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_label(size)), &source, |b, source| {
            let mut session = ParseSession::new(grammar.clone());
            b.iter(|| session.parse(black_box(source)).unwrap())
        });
    }
    group.finish();
}

fn bench_typedef(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_typedef");
    let grammar = grammars::typedef();

    for size in [sizes::SMALL, sizes::MEDIUM] {
        let source = sources::typedef_unit(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_label(size)), &source, |b, source| {
            let mut session = ParseSession::new(grammar.clone());
            b.iter(|| session.parse(black_box(source)).unwrap())
        });
    }
    group.finish();
}

// ============================================================================
// Ambiguous Parsing
// ============================================================================

fn bench_ambiguous_cap(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_ambiguous_cap");
    let grammar = grammars::ambiguous_sum();
    let source = sources::sum_chain(64);

    for cap in [1usize, 8, 64] {
        let options = ParseOptions::builder()
            .max_active_paths(cap)
            .ambiguity(AmbiguityPolicy::HighestScore)
            .build();
        group.bench_with_input(BenchmarkId::from_parameter(cap), &options, |b, options| {
            let mut session = ParseSession::with_options(grammar.clone(), options.clone());
            b.iter(|| session.parse(black_box(&source)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_arithmetic, bench_typedef, bench_ambiguous_cap);
criterion_main!(benches);
