//! The license-expression AST (§4.6).
//!
//! Grouping from source parens is represented by nesting alone: a `with`
//! production wrapped in `( ... )` returns its inner node directly, so
//! `(MIT AND Apache-2.0)` and `MIT AND Apache-2.0` parse to the same
//! `And` node. [`crate::canon::render`] reintroduces parens only where a
//! child's conjunction differs from its parent's.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseExpression {
    /// A bare license id, optionally suffixed with the SPDX `+` ("or
    /// later version of this license") marker.
    License { id: String, or_later: bool },
    /// `license WITH exception-id`.
    With { license: Box<LicenseExpression>, exception: String },
    And(Vec<LicenseExpression>),
    Or(Vec<LicenseExpression>),
}
