//! The `SemverSystem` capability boundary.
//!
//! §1 of the core specification keeps the actual version-comparison
//! engine out of scope: the core "consumes an opaque `SemverSystem`
//! capability with `Parse`, `ParseConstraint`, `Compare`, `Match`,
//! `MatchPrerelease`, `Difference` operations for each of npm, Maven,
//! PyPI dialects." We model that capability as a single object-safe
//! trait so the three resolvers share one seam; each ecosystem crate
//! supplies the concrete implementation for its own dialect
//! (`deps_npm::semver::NpmSemver` over `node-semver`,
//! `deps_pypi::semver::Pep440Semver` over `pep440_rs`,
//! `deps_maven::semver::MavenSemver` hand-rolled — see DESIGN.md).

use std::cmp::Ordering;

/// The kind of change between two versions, as reported by `difference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difference {
    Major,
    Minor,
    Patch,
    Prerelease,
}

/// An ecosystem's version dialect: parsing, ordering, and constraint
/// matching. Implementations are expected to be cheap to construct and
/// stateless (or hold only static dialect configuration).
pub trait SemverSystem: Send + Sync {
    /// Whether `version` parses as a concrete version in this dialect.
    fn parseable(&self, version: &str) -> bool;

    /// Whether `constraint` parses as a requirement in this dialect.
    fn constraint_parseable(&self, constraint: &str) -> bool;

    /// Ascending comparison of two concrete, parseable versions.
    ///
    /// Panics if either string fails to parse; callers must check
    /// `parseable` first (matching the core's practice of only ever
    /// comparing versions already known to parse, e.g. during sort).
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Whether `version` is a pre-release under this dialect.
    fn is_prerelease(&self, version: &str) -> bool;

    /// Whether `version` satisfies `constraint`, excluding pre-releases
    /// unless the constraint itself admits one.
    fn matches(&self, constraint: &str, version: &str) -> bool;

    /// Whether `version` satisfies `constraint`, admitting pre-releases
    /// unconditionally (used by the PyPI resolver's pre-release
    /// promotion rule, §4.9).
    fn matches_prerelease(&self, constraint: &str, version: &str) -> bool;

    /// The kind of change between two parseable versions, if any.
    fn difference(&self, a: &str, b: &str) -> Option<Difference>;
}
