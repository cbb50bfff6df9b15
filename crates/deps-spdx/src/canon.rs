//! Canonicalization (§4.6): recase ids to their registered spelling,
//! flatten nesting that shares its parent's conjunction, sort simple
//! expressions before compound ones within a list, and render the
//! result back to canonical text.

use crate::error::{Result, SpdxError};
use crate::tables::{canonical_exception_id, canonical_license_id};
use crate::types::LicenseExpression;

/// Recases every id, flattens redundant nesting, and reorders each
/// AND/OR list. Errors if any license or exception id is not
/// registered — canonicalization and validation share one id lookup.
pub fn canonicalize(expr: &LicenseExpression) -> Result<LicenseExpression> {
    match expr {
        LicenseExpression::License { id, or_later } => {
            let canon = canonical_license_id(id).ok_or_else(|| {
                tracing::warn!(id, "unknown license id during canonicalization");
                SpdxError::UnknownLicenseId(id.clone())
            })?;
            Ok(LicenseExpression::License { id: canon.to_string(), or_later: *or_later })
        }
        LicenseExpression::With { license, exception } => {
            let license = canonicalize(license)?;
            let canon = canonical_exception_id(exception).ok_or_else(|| {
                tracing::warn!(exception, "unknown exception id during canonicalization");
                SpdxError::UnknownExceptionId(exception.clone())
            })?;
            Ok(LicenseExpression::With { license: Box::new(license), exception: canon.to_string() })
        }
        LicenseExpression::And(children) => Ok(LicenseExpression::And(canonicalize_list(children, true)?)),
        LicenseExpression::Or(children) => Ok(LicenseExpression::Or(canonicalize_list(children, false)?)),
    }
}

fn canonicalize_list(children: &[LicenseExpression], is_and: bool) -> Result<Vec<LicenseExpression>> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        let canon_child = canonicalize(child)?;
        match canon_child {
            LicenseExpression::And(grandchildren) if is_and => flat.extend(grandchildren),
            LicenseExpression::Or(grandchildren) if !is_and => flat.extend(grandchildren),
            other => flat.push(other),
        }
    }

    let (mut simple, compound): (Vec<_>, Vec<_>) =
        flat.into_iter().partition(|c| !matches!(c, LicenseExpression::And(_) | LicenseExpression::Or(_)));
    simple.sort_by(|a, b| render(a).cmp(&render(b)));
    simple.extend(compound);
    Ok(simple)
}

enum Conjunction {
    And,
    Or,
}

fn conjunction_of(expr: &LicenseExpression) -> Option<Conjunction> {
    match expr {
        LicenseExpression::And(_) => Some(Conjunction::And),
        LicenseExpression::Or(_) => Some(Conjunction::Or),
        _ => None,
    }
}

/// Renders an expression to canonical text. A child keeps its source
/// parens only when its own conjunction differs from its parent's;
/// outermost parens are always dropped.
pub fn render(expr: &LicenseExpression) -> String {
    render_under(expr, None)
}

fn render_under(expr: &LicenseExpression, parent: Option<&Conjunction>) -> String {
    match expr {
        LicenseExpression::License { id, or_later } => {
            if *or_later { format!("{id}+") } else { id.clone() }
        }
        LicenseExpression::With { license, exception } => {
            format!("{} WITH {exception}", render_under(license, None))
        }
        LicenseExpression::And(children) => {
            let body = render_joined(children, &Conjunction::And);
            wrap_if_needed(body, &Conjunction::And, parent)
        }
        LicenseExpression::Or(children) => {
            let body = render_joined(children, &Conjunction::Or);
            wrap_if_needed(body, &Conjunction::Or, parent)
        }
    }
}

fn render_joined(children: &[LicenseExpression], own: &Conjunction) -> String {
    let keyword = match own {
        Conjunction::And => "AND",
        Conjunction::Or => "OR",
    };
    children
        .iter()
        .map(|c| render_under(c, Some(own)))
        .collect::<Vec<_>>()
        .join(&format!(" {keyword} "))
}

fn wrap_if_needed(body: String, own: &Conjunction, parent: Option<&Conjunction>) -> String {
    match (own, parent) {
        (Conjunction::And, Some(Conjunction::Or)) | (Conjunction::Or, Some(Conjunction::And)) => {
            format!("({body})")
        }
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_license_expression;

    fn canon_text(text: &str) -> String {
        render(&canonicalize(&parse_license_expression(text).unwrap()).unwrap())
    }

    #[test]
    fn drops_redundant_outer_parens() {
        assert_eq!(canon_text("(LGPL-2.1 AND MIT)"), "LGPL-2.1 AND MIT");
    }

    #[test]
    fn keeps_parens_where_conjunction_differs_from_parent() {
        assert_eq!(canon_text("LGPL-2.1 OR MIT AND BSD-3-Clause"), "LGPL-2.1 OR (BSD-3-Clause AND MIT)");
    }

    #[test]
    fn recases_ids_to_their_registered_spelling() {
        assert_eq!(canon_text("mit"), "MIT");
        assert_eq!(canon_text("apache-2.0"), "Apache-2.0");
    }

    #[test]
    fn sorts_simple_children_before_compound_children() {
        assert_eq!(canon_text("(MIT OR Apache-2.0) AND ISC"), "ISC AND (Apache-2.0 OR MIT)");
    }

    #[test]
    fn preserves_relative_order_among_compound_children() {
        assert_eq!(
            canon_text("(MIT AND Apache-2.0) OR (ISC AND Zlib)"),
            "(Apache-2.0 AND MIT) OR (ISC AND Zlib)"
        );
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = canonicalize(&parse_license_expression("LGPL-2.1 OR MIT AND BSD-3-Clause").unwrap()).unwrap();
        let reparsed = parse_license_expression(&render(&once)).unwrap();
        let twice = canonicalize(&reparsed).unwrap();
        assert_eq!(render(&once), render(&twice));
    }

    #[test]
    fn unknown_license_id_is_rejected() {
        let expr = parse_license_expression("not-a-real-license").unwrap();
        assert!(matches!(canonicalize(&expr), Err(SpdxError::UnknownLicenseId(_))));
    }

    #[test]
    fn unknown_exception_id_is_rejected() {
        let expr = parse_license_expression("MIT WITH not-a-real-exception").unwrap();
        assert!(matches!(canonicalize(&expr), Err(SpdxError::UnknownExceptionId(_))));
    }
}
