//! PyPI metadata parsing, PEP 508 dependency/marker evaluation, and the
//! pip-style backtracking resolver.

pub mod dependency;
pub mod error;
pub mod marker;
pub mod metadata;
pub mod name;
pub mod resolver;
pub mod semver;

pub use dependency::{Dependency, parse_dependency};
pub use error::{PypiError, Result};
pub use marker::{Environment, Marker, eval as eval_marker, parse as parse_marker};
pub use metadata::{Metadata, parse_metadata};
pub use name::canon_package_name;
pub use resolver::{PypiResolveOptions, PypiResolver};
pub use semver::Pep440Semver;
