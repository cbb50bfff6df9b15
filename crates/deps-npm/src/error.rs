//! Errors specific to npm install-tree resolution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NpmError {
    #[error("ecosystem mismatch: expected npm, got {actual}")]
    EcosystemMismatch { actual: String },

    #[error("root version key must be concrete: {0}")]
    NotConcrete(String),

    #[error(transparent)]
    Core(#[from] deps_core::CoreError),
}

pub type Result<T> = std::result::Result<T, NpmError>;
