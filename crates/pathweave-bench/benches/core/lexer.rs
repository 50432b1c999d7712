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

//! Lexer benchmarks: standalone token streams.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pathweave_bench::{size_label, sizes};
use pathweave_core::ParseSession;
use pathweave_test::{grammars, sources};

fn bench_token_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("lex_token_stream");
    let grammar = grammars::arithmetic();

    for size in sizes::ALL {
        let source = sources::mixed_arithmetic(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_label(size)), &source, |b, source| {
            let mut session = ParseSession::new(grammar.clone());
            b.iter(|| {
                let mut tokens = 0;
                for batch in session.tokenize(black_box(source)).unwrap() {
                    tokens += batch.unwrap().len();
                }
                tokens
            })
        });
    }
    group.finish();
}

fn bench_mode_switching(c: &mut Criterion) {
    let grammar = grammars::format_strings();
    let source = vec!["f\"item {a} of {b + c}\""; 200].join(" + ");

    c.bench_function("lex_format_strings", |b| {
        let mut session = ParseSession::new(grammar.clone());
        b.iter(|| session.parse(black_box(&source)).unwrap())
    });
}

criterion_group!(benches, bench_token_stream, bench_mode_switching);
criterion_main!(benches);
