//! Maven POM processing and the BFS nearest-wins resolver.
//!
//! `parser::parse_pom` reads a `pom.xml` into a [`types::Project`];
//! `merge::merge_parent` and `merge::merge_profiles` fold in ancestor
//! POMs and activated profiles; `merge::interpolate` resolves
//! `${property}` placeholders; `dependency::process_dependencies` folds
//! BOM imports into the dependency-management view and fills empty
//! fields on direct dependencies from it. `resolver::MavenResolver`
//! consumes the result through `deps_core::PackageDataSource` to
//! produce a `deps_core::ResolvedGraph`.

pub mod dependency;
pub mod error;
pub mod merge;
pub mod parser;
pub mod resolver;
pub mod semver;
pub mod types;

pub use dependency::{FetchDependencyManagement, process_dependencies};
pub use error::{MavenError, Result};
pub use merge::{ActivationContext, interpolate, merge_parent, merge_profiles};
pub use parser::parse_pom;
pub use resolver::MavenResolver;
pub use semver::MavenSemver;
pub use types::{
    Activation, Dependency, DependencyKey, Developer, Exclusion, License, OsActivation, Parent,
    Profile, Project, PropertyActivation, Repository, Scope,
};
