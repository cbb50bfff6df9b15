//! Benchmarks for SPDX license expression parsing and canonicalization.

use criterion::{Criterion, criterion_group, criterion_main};
use deps_spdx::{canonicalize, parse_license_expression, render, validate};
use std::hint::black_box;

fn wide_or(n: usize) -> String {
    let ids = ["MIT", "Apache-2.0", "BSD-3-Clause", "ISC", "Zlib"];
    (0..n).map(|i| ids[i % ids.len()]).collect::<Vec<_>>().join(" OR ")
}

fn nested_mixed(depth: usize) -> String {
    let mut expr = "MIT".to_string();
    for i in 0..depth {
        expr = if i % 2 == 0 { format!("({expr}) AND Apache-2.0") } else { format!("({expr}) OR BSD-3-Clause") };
    }
    expr
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("spdx_parse");

    let wide = wide_or(50);
    group.bench_function("wide_or_50", |b| b.iter(|| parse_license_expression(black_box(&wide)).unwrap()));

    let nested = nested_mixed(20);
    group.bench_function("nested_mixed_20", |b| {
        b.iter(|| parse_license_expression(black_box(&nested)).unwrap())
    });

    group.finish();
}

fn bench_canonicalize_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("spdx_canon");

    let parsed = parse_license_expression(&nested_mixed(20)).unwrap();
    group.bench_function("canonicalize_nested_mixed_20", |b| {
        b.iter(|| canonicalize(black_box(&parsed)).unwrap())
    });

    let canon = canonicalize(&parsed).unwrap();
    group.bench_function("render_nested_mixed_20", |b| b.iter(|| render(black_box(&canon))));

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("spdx_validate");

    let parsed = parse_license_expression(&wide_or(50)).unwrap();
    group.bench_function("validate_wide_or_50", |b| b.iter(|| validate(black_box(&parsed)).unwrap()));

    group.finish();
}

criterion_group!(benches, bench_parse, bench_canonicalize_and_render, bench_validate);
criterion_main!(benches);
