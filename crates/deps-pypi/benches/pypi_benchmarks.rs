//! Benchmarks for the PyPI backtracking resolver and its supporting
//! parsers.

use criterion::{Criterion, criterion_group, criterion_main};
use deps_core::{
    CancellationToken, Ecosystem, LocalDataSource, PackageKey, RequirementVersion, Resolver,
    Version, VersionAttrs, VersionKey,
};
use deps_pypi::{
    Pep440Semver, PypiResolver, canon_package_name, parse_dependency, parse_marker, parse_metadata,
};
use std::hint::black_box;
use std::sync::Arc;

fn pkg(name: &str) -> PackageKey {
    PackageKey::new(Ecosystem::PyPI, name)
}

fn concrete(name: &str, version: &str) -> Version {
    Version::new(VersionKey::concrete(pkg(name), version), VersionAttrs::default())
}

fn req(name: &str, range: &str) -> RequirementVersion {
    RequirementVersion::new(
        VersionKey::requirement(pkg(name), range),
        deps_core::DependencyAttrs::default(),
    )
}

/// A chain of `n` packages, each pinned to exactly one version, so the
/// resolver never backtracks.
fn linear_chain(n: usize) -> (LocalDataSource, VersionKey) {
    let mut builder = LocalDataSource::builder(Ecosystem::PyPI, Arc::new(Pep440Semver));
    builder = builder.add_version(concrete("root", "1.0.0"));
    builder = builder.add_requirements(
        VersionKey::concrete(pkg("root"), "1.0.0"),
        vec![req("pkg-0", "==1.0.0")],
    );
    for i in 0..n {
        builder = builder.add_version(concrete(&format!("pkg-{i}"), "1.0.0"));
        if i + 1 < n {
            builder = builder.add_requirements(
                VersionKey::concrete(pkg(&format!("pkg-{i}")), "1.0.0"),
                vec![req(&format!("pkg-{}", i + 1), "==1.0.0")],
            );
        }
    }
    (builder.build(), VersionKey::concrete(pkg("root"), "1.0.0"))
}

/// Every package has `width` versions and an unconstrained requirement,
/// forcing the resolver to consider (but not backtrack past) every
/// candidate before landing on the newest.
fn wide_candidate_set(width: usize) -> (LocalDataSource, VersionKey) {
    let mut builder = LocalDataSource::builder(Ecosystem::PyPI, Arc::new(Pep440Semver));
    builder = builder.add_version(concrete("root", "1.0.0"));
    builder = builder.add_requirements(
        VersionKey::concrete(pkg("root"), "1.0.0"),
        vec![req("leaf", ">=1.0.0")],
    );
    for i in 0..width {
        builder = builder.add_version(concrete("leaf", &format!("{i}.0.0")));
    }
    (builder.build(), VersionKey::concrete(pkg("root"), "1.0.0"))
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("pypi_resolve");

    let (chain_source, chain_root) = linear_chain(20);
    group.bench_function("linear_chain_20", |b| {
        b.iter(|| {
            PypiResolver::new()
                .resolve(black_box(&chain_source), black_box(&chain_root), &CancellationToken::new())
                .unwrap()
        })
    });

    let (wide_source, wide_root) = wide_candidate_set(50);
    group.bench_function("wide_candidate_set_50", |b| {
        b.iter(|| {
            PypiResolver::new()
                .resolve(black_box(&wide_source), black_box(&wide_root), &CancellationToken::new())
                .unwrap()
        })
    });

    group.finish();
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pypi_parsing");

    group.bench_function("canon_package_name", |b| {
        b.iter(|| canon_package_name(black_box("Flask_SQLAlchemy.Ext")))
    });

    group.bench_function("parse_dependency_with_marker", |b| {
        b.iter(|| {
            parse_dependency(black_box(
                "requests[security,socks]>=2.28.0,<3.0; python_version>='3.8'",
            ))
        })
    });

    group.bench_function("parse_marker", |b| {
        b.iter(|| {
            parse_marker(black_box(
                "os_name == 'posix' and (sys_platform == 'win32' or sys_platform == 'linux')",
            ))
        })
    });

    let metadata_text = b"Metadata-Version: 2.1\nName: requests\nVersion: 2.31.0\nRequires-Dist: urllib3>=1.21.1\nRequires-Dist: idna (<4,>=2.5)\nRequires-Dist: charset-normalizer (<4,>=2)\n\nLong description.\n";
    group.bench_function("parse_metadata", |b| {
        b.iter(|| parse_metadata(black_box(metadata_text)))
    });

    group.finish();
}

fn bench_semver(c: &mut Criterion) {
    use deps_core::SemverSystem;

    let semver = Pep440Semver;
    let mut group = c.benchmark_group("pep440_semver");

    group.bench_function("matches_compatible_release", |b| {
        b.iter(|| semver.matches(black_box("~=2.28.0"), black_box("2.28.2")))
    });

    group.bench_function("compare", |b| {
        b.iter(|| semver.compare(black_box("2.28.0"), black_box("2.28.2")))
    });

    group.finish();
}

criterion_group!(benches, bench_resolve, bench_parsing, bench_semver);
criterion_main!(benches);
