//! Shared data model, matching, and graph algorithms behind the npm,
//! Maven, and PyPI dependency resolvers.
//!
//! # Architecture
//!
//! - [`ident`] — package/version identity and the compact attribute
//!   sets carried on resolved nodes and edges.
//! - [`semver_system`] — the object-safe capability boundary each
//!   ecosystem's version dialect implements.
//! - [`matching`] — ordering and requirement-matching rules shared by
//!   every resolver (`sort_versions`, `match_requirement`, ...).
//! - [`source`] — the `PackageDataSource` trait resolvers read through,
//!   plus an in-memory `LocalDataSource` used by tests and fixtures.
//! - [`graph`] — `ResolvedGraph`, its canonicalization, and its
//!   spanning-tree text rendering.
//! - [`fixture`] — the parser for the line-oriented universe/expected-graph
//!   test format built on top of `graph`'s text rendering.
//! - [`resolver`] — the shared `Resolver` trait and `CancellationToken`.
//! - [`cache`] — a small generic LRU cache used by the PyPI resolver.
//! - [`error`] — the core error type every other module returns.

pub mod cache;
pub mod error;
pub mod fixture;
pub mod graph;
pub mod ident;
pub mod matching;
pub mod resolver;
pub mod semver_system;
pub mod source;

pub use cache::LruCache;
pub use error::{CoreError, NotFound, Result};
pub use fixture::{Fixture, parse_graph_text};
pub use graph::{Edge, Node, NodeError, ResolvedGraph};
pub use ident::{
    AttrSet, DepKey, DependencyAttrs, Ecosystem, FlagKey, PackageKey, RequirementVersion, VerKey,
    Version, VersionAttrs, VersionKey, VersionType,
};
pub use resolver::{CancellationToken, Resolver};
pub use semver_system::{Difference, SemverSystem};
pub use source::{LocalDataSource, LocalDataSourceBuilder, PackageDataSource};
