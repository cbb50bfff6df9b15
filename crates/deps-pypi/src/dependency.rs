//! `ParseDependency` (§4.5): the PEP 508 dependency-specifier grammar.
//!
//! ```text
//! name (whitespace | "[" extras "]" | "(" constraint ")" | constraint)* (";" env-marker)?
//! ```

use crate::error::{PypiError, Result};
use crate::name::canon_package_name;

/// One parsed PEP 508 dependency line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Canonicalized distribution name.
    pub name: String,
    /// Raw, uncanonicalized name as written in the source text.
    pub raw_name: String,
    /// Extras named in `[...]`, in source order.
    pub extras: Vec<String>,
    /// Everything up to `;`, with surrounding parens stripped. Empty if
    /// no constraint was given.
    pub constraint: String,
    /// Everything after `;`, unparsed (parsed lazily by `marker::parse`).
    pub marker: Option<String>,
}

pub fn parse_dependency(text: &str) -> Result<Dependency> {
    let text = text.trim();
    let (body, marker) = match text.split_once(';') {
        Some((body, marker)) => (body.trim(), Some(marker.trim().to_string())),
        None => (text, None),
    };

    let mut chars = body.char_indices().peekable();
    let name_start = 0;
    let mut name_end = body.len();
    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() || c == '[' || c == '(' || is_constraint_start(c) {
            name_end = i;
            break;
        }
        chars.next();
    }
    let raw_name = body[name_start..name_end].trim().to_string();
    if raw_name.is_empty() {
        return Err(PypiError::DependencyParse(format!(
            "missing package name in {text:?}"
        )));
    }
    let name = canon_package_name(&raw_name);

    let mut rest = body[name_end..].trim_start();
    let mut extras = Vec::new();
    if let Some(after_bracket) = rest.strip_prefix('[') {
        let Some(close) = after_bracket.find(']') else {
            return Err(PypiError::DependencyParse(format!(
                "unterminated extras list in {text:?}"
            )));
        };
        extras = after_bracket[..close]
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        rest = after_bracket[close + 1..].trim_start();
    }

    let constraint = if let Some(after_paren) = rest.strip_prefix('(') {
        let Some(close) = after_paren.rfind(')') else {
            return Err(PypiError::DependencyParse(format!(
                "unterminated constraint parens in {text:?}"
            )));
        };
        after_paren[..close].trim().to_string()
    } else {
        rest.trim().to_string()
    };

    Ok(Dependency {
        name,
        raw_name,
        extras,
        constraint,
        marker,
    })
}

fn is_constraint_start(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '!' | '~')
}
