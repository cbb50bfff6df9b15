//! Version ordering and requirement matching (§4.3).

use crate::ident::{DepKey, Ecosystem, RequirementVersion, VerKey, Version};
use crate::semver_system::SemverSystem;

/// Does this version's `Tags` attribute list include `tag`?
fn has_tag(version: &Version, tag: &str) -> bool {
    version
        .attrs
        .get(VerKey::Tags)
        .map(|tags| tags.split(',').any(|t| t == tag))
        .unwrap_or(false)
}

/// Ascending sort by the ecosystem's semver `compare`, with npm's
/// tag-aware tail adjustment (§4.3).
///
/// Unparseable versions (only possible for npm, where registries may
/// carry junk tags as "versions") sort after all parseable ones,
/// lexicographically among themselves.
pub fn sort_versions(ecosystem: Ecosystem, semver: &dyn SemverSystem, versions: &mut Vec<Version>) {
    versions.sort_by(|a, b| {
        let (pa, pb) = (
            semver.parseable(a.version_str()),
            semver.parseable(b.version_str()),
        );
        match (pa, pb) {
            (true, true) => semver.compare(a.version_str(), b.version_str()),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => a.version_str().cmp(b.version_str()),
        }
    });

    if ecosystem != Ecosystem::Npm {
        return;
    }

    let Some(latest_idx) = versions.iter().position(|v| has_tag(v, "latest")) else {
        return;
    };
    let latest_is_prerelease = semver.parseable(versions[latest_idx].version_str())
        && semver.is_prerelease(versions[latest_idx].version_str());
    let any_non_prerelease = versions.iter().any(|v| {
        semver.parseable(v.version_str()) && !semver.is_prerelease(v.version_str())
    });
    if latest_is_prerelease && any_non_prerelease {
        return;
    }
    let latest = versions.remove(latest_idx);
    versions.push(latest);
}

/// The name npm uses to address a dependency: its `KnownAs` alias if
/// present, otherwise the package name.
fn npm_addressed_name(req: &RequirementVersion) -> &str {
    req.attrs.get(DepKey::KnownAs).unwrap_or(&req.package().name)
}

/// Order in which a resolver should process a node's direct dependency
/// requirements (§4.3). Only npm reorders; every other ecosystem
/// preserves the order the data source returned.
pub fn sort_dependencies(ecosystem: Ecosystem, deps: &mut [RequirementVersion]) {
    if ecosystem != Ecosystem::Npm {
        return;
    }
    deps.sort_by(|a, b| {
        let dev_a = a.attrs.flag(DepKey::Dev);
        let dev_b = b.attrs.flag(DepKey::Dev);
        if dev_a != dev_b {
            return dev_a.cmp(&dev_b); // false (non-dev) before true (dev)
        }
        let (na, nb) = (npm_addressed_name(a), npm_addressed_name(b));
        let ci = na.to_lowercase().cmp(&nb.to_lowercase());
        if ci != std::cmp::Ordering::Equal {
            return ci;
        }
        // case-insensitive tie: lowercase sorts before uppercase, letter by letter
        compare_lowercase_first(na, nb)
    });
}

fn compare_lowercase_first(a: &str, b: &str) -> std::cmp::Ordering {
    for (ca, cb) in a.chars().zip(b.chars()) {
        if ca != cb {
            let la = ca.is_lowercase();
            let lb = cb.is_lowercase();
            if la != lb {
                return lb.cmp(&la); // lowercase (true) sorts first
            }
            return ca.cmp(&cb);
        }
    }
    a.len().cmp(&b.len())
}

/// Match a requirement string against a package's concrete versions,
/// per §4.3. `versions` is expected pre-sorted by `sort_versions`; the
/// result preserves that order.
pub fn match_requirement(
    ecosystem: Ecosystem,
    semver: &dyn SemverSystem,
    requirement: &str,
    versions: &[Version],
) -> Vec<Version> {
    if semver.constraint_parseable(requirement) {
        return versions
            .iter()
            .filter(|v| semver.parseable(v.version_str()))
            .filter(|v| semver.matches(requirement, v.version_str()))
            .cloned()
            .collect();
    }

    if let Some(exact) = versions.iter().find(|v| v.version_str() == requirement) {
        return vec![exact.clone()];
    }

    if ecosystem == Ecosystem::Npm {
        if let Some(tagged) = versions.iter().find(|v| has_tag(v, requirement)) {
            return vec![tagged.clone()];
        }
    }

    Vec::new()
}

/// Match a requirement admitting pre-release candidates unconditionally
/// (used by the PyPI resolver's pre-release promotion rule, §4.9).
pub fn match_requirement_prerelease(
    semver: &dyn SemverSystem,
    requirement: &str,
    versions: &[Version],
) -> Vec<Version> {
    if semver.constraint_parseable(requirement) {
        return versions
            .iter()
            .filter(|v| semver.parseable(v.version_str()))
            .filter(|v| semver.matches_prerelease(requirement, v.version_str()))
            .cloned()
            .collect();
    }
    versions
        .iter()
        .find(|v| v.version_str() == requirement)
        .cloned()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{DependencyAttrs, Ecosystem, PackageKey, VersionAttrs, VersionKey};
    use std::cmp::Ordering;

    /// A tiny in-test semver system: versions are dotted integer tuples,
    /// constraints are bare exact-match strings or "*".
    struct ToySemver;
    impl SemverSystem for ToySemver {
        fn parseable(&self, v: &str) -> bool {
            v.split('.').all(|p| p.parse::<u64>().is_ok())
        }
        fn constraint_parseable(&self, c: &str) -> bool {
            c == "*" || self.parseable(c)
        }
        fn compare(&self, a: &str, b: &str) -> Ordering {
            let pa: Vec<u64> = a.split('.').map(|p| p.parse().unwrap()).collect();
            let pb: Vec<u64> = b.split('.').map(|p| p.parse().unwrap()).collect();
            pa.cmp(&pb)
        }
        fn is_prerelease(&self, _v: &str) -> bool {
            false
        }
        fn matches(&self, c: &str, v: &str) -> bool {
            c == "*" || c == v
        }
        fn matches_prerelease(&self, c: &str, v: &str) -> bool {
            self.matches(c, v)
        }
        fn difference(&self, _a: &str, _b: &str) -> Option<crate::semver_system::Difference> {
            None
        }
    }

    fn ver(name: &str, version: &str) -> Version {
        Version::new(
            VersionKey::concrete(PackageKey::new(Ecosystem::Npm, name), version),
            VersionAttrs::default(),
        )
    }

    #[test]
    fn sort_versions_ascending() {
        let mut vs = vec![ver("a", "2.0.0"), ver("a", "1.0.0"), ver("a", "10.0.0")];
        sort_versions(Ecosystem::Npm, &ToySemver, &mut vs);
        let strs: Vec<_> = vs.iter().map(|v| v.version_str()).collect();
        assert_eq!(strs, vec!["1.0.0", "2.0.0", "10.0.0"]);
    }

    #[test]
    fn latest_tag_moves_to_end() {
        let mut tagged = ver("a", "1.0.0");
        tagged.attrs.set(VerKey::Tags, "latest");
        let mut vs = vec![tagged, ver("a", "2.0.0")];
        sort_versions(Ecosystem::Npm, &ToySemver, &mut vs);
        assert_eq!(vs.last().unwrap().version_str(), "1.0.0");
    }

    #[test]
    fn match_requirement_exact_fallback() {
        let vs = vec![ver("a", "1.0.0-beta")];
        let got = match_requirement(Ecosystem::Npm, &ToySemver, "1.0.0-beta", &vs);
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn sort_dependencies_npm_case_insensitive_dev_last() {
        let pk = |n: &str| PackageKey::new(Ecosystem::Npm, n);
        let mut dev = RequirementVersion::new(
            VersionKey::requirement(pk("Zeta"), "*"),
            DependencyAttrs::default(),
        );
        dev.attrs.set_flag(DepKey::Dev, true);
        let alpha = RequirementVersion::new(
            VersionKey::requirement(pk("alpha"), "*"),
            DependencyAttrs::default(),
        );
        let mut deps = vec![dev, alpha];
        sort_dependencies(Ecosystem::Npm, &mut deps);
        assert_eq!(deps[0].package().name, "alpha");
        assert_eq!(deps[1].package().name, "Zeta");
    }
}
