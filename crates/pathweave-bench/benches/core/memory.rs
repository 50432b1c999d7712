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

//! Memory substrate benchmarks: interning and tree serialization.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pathweave_bench::{size_label, sizes};
use pathweave_memory::{StringInterner, ZeroCopySerializer};
use pathweave_test::{grammars, sources};

fn bench_intern(c: &mut Criterion) {
    let mut group = c.benchmark_group("intern");
    let words: Vec<String> = (0..sizes::MEDIUM).map(|i| format!("ident_{}", i % 250)).collect();
    group.throughput(Throughput::Elements(words.len() as u64));

    group.bench_function("mixed_hits", |b| {
        b.iter(|| {
            let mut strings = StringInterner::new();
            for w in &words {
                black_box(strings.intern(w));
            }
            strings.len()
        })
    });
    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize_tree");
    let grammar = grammars::arithmetic();

    for size in sizes::ALL {
        let tree = pathweave_core::parse(&grammar, &sources::mixed_arithmetic(size)).unwrap();
        group.throughput(Throughput::Elements(tree.ast().len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", size_label(size)), &tree, |b, tree| {
            let mut serializer = ZeroCopySerializer::new();
            b.iter(|| serializer.serialize_ast(tree.ast(), tree.root(), tree.strings()).len())
        });

        let bytes = pathweave_core::serialize(&tree);
        group.bench_with_input(BenchmarkId::new("decode", size_label(size)), &bytes, |b, bytes| {
            let serializer = ZeroCopySerializer::new();
            b.iter(|| serializer.deserialize_ast(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_intern, bench_serialize);
criterion_main!(benches);
