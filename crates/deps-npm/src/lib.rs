//! The npm install-tree resolver.
//!
//! Mirrors `npm install` on an empty workspace: a single pass that
//! reuses already-resolved ancestors when their version satisfies a
//! requirement, and otherwise hoists a freshly selected version as far
//! toward the root as sibling collisions and slot protection allow.

pub mod error;
pub mod resolver;
pub mod semver;

pub use error::{NpmError, Result};
pub use resolver::NpmResolver;
pub use semver::NpmSemver;
