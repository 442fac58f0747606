// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polyframe_compile::params::{find_assignment, rewrite, rewrite_all, Parameter, RewriteOptions};
use polyframe_compile::stl;
use polyframe_compile::worker::runtime::mock::binary_stl;

fn model_source(extra_modules: usize) -> String {
    let mut source = String::from(
        "// Bracket\nwidth = 10; // mm\ndepth = 20;\nlabel = \"A;B\";\nholes = [1, 2, 3];\n",
    );
    for i in 0..extra_modules {
        source.push_str(&format!(
            "module part_{i}(width = 3) {{\n  width = width * 2;\n  cube([width, {i}, 1]);\n}}\n"
        ));
    }
    source.push_str("height = 5;\n");
    source
}

fn bench_rewrite(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");

    for modules in [0, 50, 500] {
        let source = model_source(modules);
        group.bench_with_input(BenchmarkId::new("last_line", modules), &source, |b, source| {
            let parameter = Parameter::number("height", 12.5);
            b.iter(|| rewrite(black_box(source), black_box(&parameter)));
        });
    }

    let source = model_source(50);
    group.bench_function("find_missing", |b| {
        b.iter(|| find_assignment(black_box(&source), black_box("thickness")));
    });

    let parameters = vec![
        Parameter::number("width", 25.0),
        Parameter::number("depth", 40.0),
        Parameter::number("thickness", 2.0),
    ];
    group.bench_function("rewrite_all_injecting", |b| {
        b.iter(|| rewrite_all(black_box(&source), &parameters, RewriteOptions::injecting()));
    });

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("stl_validate");

    for triangles in [12u32, 10_000, 1_000_000] {
        let bytes = binary_stl(triangles);
        group.bench_with_input(BenchmarkId::new("triangles", triangles), &bytes, |b, bytes| {
            b.iter(|| stl::validate(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rewrite, bench_validate);
criterion_main!(benches);
