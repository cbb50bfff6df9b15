//! Errors specific to PyPI metadata parsing and resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PypiError {
    #[error("ecosystem mismatch: expected pypi, got {actual}")]
    EcosystemMismatch { actual: String },

    #[error("root version key must be concrete: {0}")]
    NotConcrete(String),

    #[error("malformed PEP 508 dependency specifier: {0}")]
    DependencyParse(String),

    #[error("malformed PEP 508 environment marker: {0}")]
    MarkerParse(String),

    #[error("invalid UTF-8 in metadata text")]
    InvalidUtf8,

    #[error("metadata is missing a required header: {0}")]
    MissingHeader(&'static str),

    #[error(transparent)]
    Core(#[from] deps_core::CoreError),
}

pub type Result<T> = std::result::Result<T, PypiError>;
