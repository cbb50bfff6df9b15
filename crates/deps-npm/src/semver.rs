//! `NpmSemver`: the npm version dialect over the `node-semver` crate.

use std::cmp::Ordering;

use deps_core::{Difference, SemverSystem};
use node_semver::{Range, Version};

#[derive(Debug, Default)]
pub struct NpmSemver;

/// The major/minor/patch triple before any `-prerelease` or `+build`
/// suffix, read directly off the string rather than through
/// `node_semver`'s internals — cheap and dialect-agnostic enough to
/// share with `difference`.
fn numeric_core(version: &str) -> Option<(u64, u64, u64)> {
    let core = version.split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    Some((major, minor, patch))
}

impl SemverSystem for NpmSemver {
    fn parseable(&self, version: &str) -> bool {
        version.parse::<Version>().is_ok()
    }

    fn constraint_parseable(&self, constraint: &str) -> bool {
        constraint.parse::<Range>().is_ok()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let va: Version = a.parse().expect("caller checked parseable");
        let vb: Version = b.parse().expect("caller checked parseable");
        va.cmp(&vb)
    }

    fn is_prerelease(&self, version: &str) -> bool {
        version.split_once('-').is_some_and(|(_, rest)| !rest.is_empty())
    }

    fn matches(&self, constraint: &str, version: &str) -> bool {
        let Ok(range) = constraint.parse::<Range>() else {
            return false;
        };
        let Ok(v) = version.parse::<Version>() else {
            return false;
        };
        range.satisfies(&v)
    }

    fn matches_prerelease(&self, constraint: &str, version: &str) -> bool {
        // npm only admits a prerelease when the range itself names the
        // same [major, minor, patch] prerelease tuple; `node_semver`
        // already implements that rule in `satisfies`, so there is no
        // separate "admit any prerelease" mode to add here (unlike PyPI).
        self.matches(constraint, version)
    }

    fn difference(&self, a: &str, b: &str) -> Option<Difference> {
        let (a_core, b_core) = (numeric_core(a)?, numeric_core(b)?);
        if a_core.0 != b_core.0 {
            Some(Difference::Major)
        } else if a_core.1 != b_core.1 {
            Some(Difference::Minor)
        } else if a_core.2 != b_core.2 {
            Some(Difference::Patch)
        } else if self.is_prerelease(a) != self.is_prerelease(b) {
            Some(Difference::Prerelease)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_by_precedence() {
        let s = NpmSemver;
        assert_eq!(s.compare("1.2.0", "1.10.0"), Ordering::Less);
    }

    #[test]
    fn matches_caret_range() {
        let s = NpmSemver;
        assert!(s.matches("^1.0.0", "1.4.2"));
        assert!(!s.matches("^1.0.0", "2.0.0"));
    }

    #[test]
    fn detects_prerelease() {
        let s = NpmSemver;
        assert!(s.is_prerelease("1.0.0-beta.1"));
        assert!(!s.is_prerelease("1.0.0"));
    }

    #[test]
    fn difference_classifies_change_kind() {
        let s = NpmSemver;
        assert_eq!(s.difference("1.0.0", "2.0.0"), Some(Difference::Major));
        assert_eq!(s.difference("1.0.0", "1.1.0"), Some(Difference::Minor));
        assert_eq!(s.difference("1.0.0", "1.0.1"), Some(Difference::Patch));
        assert_eq!(s.difference("1.0.0", "1.0.0"), None);
    }
}
