//! `Valid()` (§4.6): checks every license and exception id against the
//! built-in tables without rewriting the tree — unlike [`crate::canon::canonicalize`],
//! which produces a recased copy, this only reports the first offending id.

use crate::error::{Result, SpdxError};
use crate::tables::{canonical_exception_id, canonical_license_id};
use crate::types::LicenseExpression;

pub fn validate(expr: &LicenseExpression) -> Result<()> {
    match expr {
        LicenseExpression::License { id, .. } => {
            if canonical_license_id(id).is_none() {
                return Err(SpdxError::UnknownLicenseId(id.clone()));
            }
            Ok(())
        }
        LicenseExpression::With { license, exception } => {
            validate(license)?;
            if canonical_exception_id(exception).is_none() {
                return Err(SpdxError::UnknownExceptionId(exception.clone()));
            }
            Ok(())
        }
        LicenseExpression::And(children) | LicenseExpression::Or(children) => {
            children.iter().try_for_each(validate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_license_expression;

    #[test]
    fn accepts_a_known_expression() {
        let expr = parse_license_expression("MIT OR Apache-2.0").unwrap();
        assert!(validate(&expr).is_ok());
    }

    #[test]
    fn rejects_an_unknown_license_id_anywhere_in_the_tree() {
        let expr = parse_license_expression("MIT AND (Apache-2.0 OR not-a-real-license)").unwrap();
        assert!(matches!(validate(&expr), Err(SpdxError::UnknownLicenseId(_))));
    }

    #[test]
    fn is_case_insensitive() {
        let expr = parse_license_expression("mit").unwrap();
        assert!(validate(&expr).is_ok());
    }

    #[test]
    fn rejects_an_unknown_exception_id() {
        let expr = parse_license_expression("GPL-2.0-only WITH not-a-real-exception").unwrap();
        assert!(matches!(validate(&expr), Err(SpdxError::UnknownExceptionId(_))));
    }
}
