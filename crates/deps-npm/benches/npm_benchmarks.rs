//! Benchmarks for the npm install-tree resolver and its semver dialect.

use criterion::{Criterion, criterion_group, criterion_main};
use deps_core::{
    CancellationToken, DependencyAttrs, Ecosystem, LocalDataSource, PackageKey, RequirementVersion,
    Resolver, Version, VersionAttrs, VersionKey,
};
use deps_npm::{NpmResolver, NpmSemver};
use std::hint::black_box;
use std::sync::Arc;

fn pkg(name: &str) -> PackageKey {
    PackageKey::new(Ecosystem::Npm, name)
}

fn concrete(name: &str, version: &str) -> Version {
    Version::new(VersionKey::concrete(pkg(name), version), VersionAttrs::default())
}

fn req(name: &str, range: &str) -> RequirementVersion {
    RequirementVersion::new(VersionKey::requirement(pkg(name), range), DependencyAttrs::default())
}

/// A layered universe: `root` depends on `n` distinct leaf packages,
/// each pinned with a simple caret range against a single version.
fn wide_universe(n: usize) -> (LocalDataSource, VersionKey) {
    let mut builder = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
        .add_version(concrete("root", "1.0.0"));
    let mut reqs = Vec::new();
    for i in 0..n {
        let name = format!("leaf-{i}");
        builder = builder.add_version(concrete(&name, "1.0.0"));
        reqs.push(req(&name, "^1.0.0"));
    }
    builder = builder.add_requirements(VersionKey::concrete(pkg("root"), "1.0.0"), reqs);
    (builder.build(), VersionKey::concrete(pkg("root"), "1.0.0"))
}

/// A deep chain forcing repeated hoist-vs-conflict checks: each level
/// depends on the next and also re-depends on a shared package at an
/// incompatible version, so every level installs its own copy.
fn deep_conflict_chain(depth: usize) -> (LocalDataSource, VersionKey) {
    let mut builder = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver));
    for i in 0..depth {
        let name = format!("level-{i}");
        builder = builder.add_version(concrete(&name, "1.0.0"));
        let mut reqs = vec![req("shared", &format!("{}", i + 1))];
        if i + 1 < depth {
            reqs.push(req(&format!("level-{}", i + 1), "1"));
        }
        builder = builder.add_requirements(VersionKey::concrete(pkg(&name), "1.0.0"), reqs);
    }
    for i in 0..depth {
        builder = builder.add_version(concrete("shared", &format!("{}.0.0", i + 1)));
    }
    (builder.build(), VersionKey::concrete(pkg("level-0"), "1.0.0"))
}

fn bench_wide_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("npm_resolve");

    group.bench_function("wide_50_leaves", |b| {
        let (source, root) = wide_universe(50);
        b.iter(|| {
            NpmResolver
                .resolve(black_box(&source), black_box(&root), &CancellationToken::new())
                .unwrap()
        })
    });

    group.bench_function("deep_conflict_chain_20", |b| {
        let (source, root) = deep_conflict_chain(20);
        b.iter(|| {
            NpmResolver
                .resolve(black_box(&source), black_box(&root), &CancellationToken::new())
                .unwrap()
        })
    });

    group.finish();
}

fn bench_semver(c: &mut Criterion) {
    use deps_core::SemverSystem;

    let mut group = c.benchmark_group("npm_semver");
    let semver = NpmSemver;

    group.bench_function("compare", |b| {
        b.iter(|| semver.compare(black_box("4.18.0"), black_box("4.18.2")))
    });

    group.bench_function("matches_caret", |b| {
        b.iter(|| semver.matches(black_box("^4.18.0"), black_box("4.18.2")))
    });

    group.finish();
}

criterion_group!(benches, bench_wide_resolve, bench_semver);
criterion_main!(benches);
