//! `PackageDataSource` (§4.1): the capability every resolver consumes to
//! read package listings, version attributes, and dependency lists.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::ident::{Ecosystem, PackageKey, RequirementVersion, Version, VersionKey};
use crate::matching;
use crate::resolver::CancellationToken;
use crate::semver_system::SemverSystem;

/// Read-only package metadata source. Resolvers read through this trait
/// and never write; an adapter backing a remote fetch is free to cache
/// internally as long as it serializes mutation of that cache (§5).
pub trait PackageDataSource: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;
    fn semver(&self) -> &dyn SemverSystem;

    /// Metadata for one concrete version.
    fn version(&self, key: &VersionKey, cancel: &CancellationToken) -> Result<Version>;

    /// Every known concrete version of a package.
    fn versions(&self, key: &PackageKey, cancel: &CancellationToken) -> Result<Vec<Version>>;

    /// The direct dependencies of one concrete version, in data-source
    /// order (ordering matters for some ecosystems, §4.5).
    fn requirements(
        &self,
        key: &VersionKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<RequirementVersion>>;

    /// The concrete versions satisfying `key.version` (a requirement
    /// string), in the ecosystem-specific preferred order. The default
    /// implementation composes `versions` with `matching::match_requirement`;
    /// override only if an adapter can do this more directly (e.g. a
    /// remote registry with native "matching versions" query).
    fn matching_versions(&self, key: &VersionKey, cancel: &CancellationToken) -> Result<Vec<Version>> {
        let mut versions = self.versions(&key.package, cancel)?;
        matching::sort_versions(self.ecosystem(), self.semver(), &mut versions);
        Ok(matching::match_requirement(
            self.ecosystem(),
            self.semver(),
            &key.version,
            &versions,
        ))
    }

    /// Packages bundled directly inside this concrete version's tarball
    /// (npm only, §4.7). Each returned `Version` carries a mangled
    /// `<root>><root-version>><path>` package name and a `DerivedFrom`
    /// attribute naming the real package it stands in for. Every other
    /// ecosystem keeps the default: nothing is ever bundled.
    fn bundled_versions(&self, key: &VersionKey, cancel: &CancellationToken) -> Result<Vec<Version>> {
        let _ = (key, cancel);
        Ok(Vec::new())
    }
}

/// An in-memory `PackageDataSource` used to drive tests and the schema
/// fixture format (§4.10). Built with `LocalDataSourceBuilder`, which
/// inserts-and-sorts and ensures every package referenced by a
/// dependency has at least an empty version list.
pub struct LocalDataSource {
    ecosystem: Ecosystem,
    semver: Arc<dyn SemverSystem>,
    versions: HashMap<PackageKey, Vec<Version>>,
    requirements: HashMap<VersionKey, Vec<RequirementVersion>>,
    bundled: HashMap<VersionKey, Vec<Version>>,
}

impl LocalDataSource {
    pub fn builder(ecosystem: Ecosystem, semver: Arc<dyn SemverSystem>) -> LocalDataSourceBuilder {
        LocalDataSourceBuilder {
            ds: LocalDataSource {
                ecosystem,
                semver,
                versions: HashMap::new(),
                requirements: HashMap::new(),
                bundled: HashMap::new(),
            },
        }
    }
}

impl PackageDataSource for LocalDataSource {
    fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    fn semver(&self) -> &dyn SemverSystem {
        self.semver.as_ref()
    }

    fn version(&self, key: &VersionKey, _cancel: &CancellationToken) -> Result<Version> {
        self.versions
            .get(&key.package)
            .and_then(|vs| vs.iter().find(|v| v.version_str() == key.version))
            .cloned()
            .ok_or_else(|| CoreError::NotFound(key.to_string()))
    }

    fn versions(&self, key: &PackageKey, _cancel: &CancellationToken) -> Result<Vec<Version>> {
        self.versions
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(key.to_string()))
    }

    fn requirements(
        &self,
        key: &VersionKey,
        _cancel: &CancellationToken,
    ) -> Result<Vec<RequirementVersion>> {
        self.requirements
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(key.to_string()))
    }

    fn bundled_versions(&self, key: &VersionKey, _cancel: &CancellationToken) -> Result<Vec<Version>> {
        Ok(self.bundled.get(key).cloned().unwrap_or_default())
    }
}

/// Builder for `LocalDataSource`. Every `add_*` call keeps the store
/// internally consistent: versions lists stay sorted, and any package
/// named only as a dependency target gets an (initially empty) entry.
pub struct LocalDataSourceBuilder {
    ds: LocalDataSource,
}

impl LocalDataSourceBuilder {
    pub fn add_version(mut self, version: Version) -> Self {
        let key = version.package().clone();
        self.ds.versions.entry(key).or_default().push(version);
        self
    }

    pub fn add_requirements(mut self, key: VersionKey, reqs: Vec<RequirementVersion>) -> Self {
        for req in &reqs {
            self.ds.versions.entry(req.package().clone()).or_default();
        }
        self.ds.requirements.insert(key, reqs);
        self
    }

    /// Register `bundled` as content bundled directly inside `key`'s
    /// tarball (npm, §4.7). `bundled` is expected to carry a mangled
    /// package name and a `VerKey::DerivedFrom` attribute already set.
    pub fn add_bundled(mut self, key: VersionKey, bundled: Version) -> Self {
        self.ds.bundled.entry(key).or_default().push(bundled);
        self
    }

    pub fn build(mut self) -> LocalDataSource {
        for versions in self.ds.versions.values_mut() {
            matching::sort_versions(self.ds.ecosystem, self.ds.semver.as_ref(), versions);
        }
        self.ds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{DependencyAttrs, VersionAttrs};
    use std::cmp::Ordering;

    struct ToySemver;
    impl SemverSystem for ToySemver {
        fn parseable(&self, v: &str) -> bool {
            v.chars().all(|c| c.is_ascii_digit() || c == '.')
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

    #[test]
    fn referenced_package_gets_empty_version_list() {
        let pk = PackageKey::new(Ecosystem::Npm, "root");
        let dep_pk = PackageKey::new(Ecosystem::Npm, "missing-dep");
        let root_key = VersionKey::concrete(pk.clone(), "1.0.0");
        let req = RequirementVersion::new(
            VersionKey::requirement(dep_pk.clone(), "*"),
            DependencyAttrs::default(),
        );
        let ds = LocalDataSource::builder(Ecosystem::Npm, Arc::new(ToySemver))
            .add_version(Version::new(root_key.clone(), VersionAttrs::default()))
            .add_requirements(root_key, vec![req])
            .build();

        let token = CancellationToken::new();
        assert_eq!(ds.versions(&dep_pk, &token).unwrap().len(), 0);
    }

    #[test]
    fn matching_versions_uses_ecosystem_ordering_and_constraint() {
        let pk = PackageKey::new(Ecosystem::Npm, "left-pad");
        let ds = LocalDataSource::builder(Ecosystem::Npm, Arc::new(ToySemver))
            .add_version(Version::new(
                VersionKey::concrete(pk.clone(), "2.0.0"),
                VersionAttrs::default(),
            ))
            .add_version(Version::new(
                VersionKey::concrete(pk.clone(), "1.0.0"),
                VersionAttrs::default(),
            ))
            .build();

        let token = CancellationToken::new();
        let matches = ds
            .matching_versions(&VersionKey::requirement(pk, "*"), &token)
            .unwrap();
        let strs: Vec<_> = matches.iter().map(|v| v.version_str()).collect();
        assert_eq!(strs, vec!["1.0.0", "2.0.0"]);
    }
}
