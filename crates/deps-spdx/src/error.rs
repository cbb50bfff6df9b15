//! Errors from SPDX license expression parsing and canonicalization.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpdxError {
    #[error("empty license expression")]
    Empty,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token {found:?} at byte {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unmatched '(' at byte {pos}")]
    UnmatchedParen { pos: usize },

    #[error("trailing input {found:?} at byte {pos}")]
    TrailingInput { found: String, pos: usize },

    #[error("unknown license id: {0}")]
    UnknownLicenseId(String),

    #[error("unknown exception id: {0}")]
    UnknownExceptionId(String),
}

pub type Result<T> = std::result::Result<T, SpdxError>;
