//! Errors specific to POM parsing, merging, and Maven resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MavenError {
    #[error("ecosystem mismatch: expected maven, got {actual}")]
    EcosystemMismatch { actual: String },

    #[error("root version key must be concrete: {0}")]
    NotConcrete(String),

    #[error("malformed pom.xml: {message}")]
    ParseError { message: String },

    #[error("invalid UTF-8 in pom.xml")]
    InvalidUtf8,

    #[error("dependency management import cycle or budget exceeded fetching {0}:{1}:{2}")]
    ImportBudgetExceeded(String, String, String),

    #[error(transparent)]
    Core(#[from] deps_core::CoreError),
}

pub type Result<T> = std::result::Result<T, MavenError>;
