//! Package/version identity and the attribute sets attached to
//! dependency edges and concrete versions.
//!
//! Mirrors §3 of the core specification: a closed key enum per
//! attribute-set flavor, three of whose variants are flags packed into a
//! bitmask, the rest stored in a small ordered map.

use std::fmt;

/// Which package ecosystem a key belongs to.
///
/// Determines semver dialect, requirement syntax, and resolver choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ecosystem {
    Npm,
    Maven,
    PyPI,
    Unknown,
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Npm => "npm",
            Self::Maven => "maven",
            Self::PyPI => "pypi",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// `(Ecosystem, Name)`. Name is opaque: npm names may contain `/`
/// (scope) and `>` (mangled bundle, see the npm resolver); Maven names
/// are `groupId:artifactId`; PyPI names are canonical distribution
/// names (see `deps_pypi::CanonPackageName`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageKey {
    pub ecosystem: Ecosystem,
    pub name: String,
}

impl PackageKey {
    pub fn new(ecosystem: Ecosystem, name: impl Into<String>) -> Self {
        Self {
            ecosystem,
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ecosystem, self.name)
    }
}

/// Whether a `VersionKey`'s version string names one concrete version or
/// a requirement to be matched against candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionType {
    Concrete,
    Requirement,
}

/// `(PackageKey, VersionType, VersionString)`.
///
/// A value type: equality and the comparison order below are purely
/// structural. Comparison order is ecosystem, name, type, then
/// lexicographic on the version string — *not* semver order, since
/// comparing two arbitrary requirement/version strings semantically
/// requires an ecosystem-specific `SemverSystem`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionKey {
    pub package: PackageKey,
    pub version_type: VersionType,
    pub version: String,
}

impl VersionKey {
    pub fn concrete(package: PackageKey, version: impl Into<String>) -> Self {
        Self {
            package,
            version_type: VersionType::Concrete,
            version: version.into(),
        }
    }

    pub fn requirement(package: PackageKey, version: impl Into<String>) -> Self {
        Self {
            package,
            version_type: VersionType::Requirement,
            version: version.into(),
        }
    }

    pub fn is_concrete(&self) -> bool {
        matches!(self.version_type, VersionType::Concrete)
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.version)
    }
}

/// Keys that may appear in a dependency (edge) attribute set.
///
/// `Dev`, `Opt`, `Test` are the three flag keys packed into the set's
/// bitmask and consume no value storage; every other variant is a
/// valued key stored in the set's small map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DepKey {
    Dev,
    Opt,
    Test,
    XTest,
    Framework,
    Scope,
    MavenClassifier,
    MavenArtifactType,
    MavenDependencyOrigin,
    MavenExclusions,
    EnabledDependencies,
    KnownAs,
    Environment,
    Selector,
}

impl DepKey {
    /// Bit position in the set's bitmask, or `None` if this key stores a
    /// value instead.
    const fn flag_bit(self) -> Option<u8> {
        match self {
            Self::Dev => Some(0),
            Self::Opt => Some(1),
            Self::Test => Some(2),
            _ => None,
        }
    }
}

/// Keys that may appear in a concrete-version attribute set.
///
/// `Blocked`, `Deleted`, `Error` are the flag keys; the rest are valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerKey {
    Blocked,
    Deleted,
    Error,
    Redirect,
    Features,
    DerivedFrom,
    Registries,
    Tags,
    Ident,
    Created,
}

impl VerKey {
    const fn flag_bit(self) -> Option<u8> {
        match self {
            Self::Blocked => Some(0),
            Self::Deleted => Some(1),
            Self::Error => Some(2),
            _ => None,
        }
    }
}

/// Small ordered map from a closed key enum to string values, with three
/// boolean-valued keys packed into a bitmask instead of stored in the
/// map (see the module doc and design note 9 of the core specification).
///
/// Generic over the key enum so `DepKey` and `VerKey` attribute sets
/// share one implementation; `K::flag_bit` selects which three variants
/// are flags.
#[derive(Debug, Clone, Default)]
pub struct AttrSet<K> {
    flags: u8,
    values: Vec<(K, String)>,
}

/// Keys usable in an `AttrSet` must say which of their variants (if any)
/// are bitmask flags.
pub trait FlagKey: Copy + Eq {
    fn flag_bit(self) -> Option<u8>;
}

impl FlagKey for DepKey {
    fn flag_bit(self) -> Option<u8> {
        DepKey::flag_bit(self)
    }
}

impl FlagKey for VerKey {
    fn flag_bit(self) -> Option<u8> {
        VerKey::flag_bit(self)
    }
}

impl<K: FlagKey> AttrSet<K> {
    pub fn new() -> Self {
        Self {
            flags: 0,
            values: Vec::new(),
        }
    }

    /// Set a flag key. Panics (in debug) if `key` is not a flag key —
    /// callers should use `set` for valued keys.
    pub fn set_flag(&mut self, key: K, on: bool) -> &mut Self {
        let bit = key.flag_bit().expect("set_flag called with a valued key");
        if on {
            self.flags |= 1 << bit;
        } else {
            self.flags &= !(1 << bit);
        }
        self
    }

    pub fn flag(&self, key: K) -> bool {
        let bit = key.flag_bit().expect("flag called with a valued key");
        self.flags & (1 << bit) != 0
    }

    /// Set a valued key, replacing any prior value and preserving the
    /// position of the first insertion.
    pub fn set(&mut self, key: K, value: impl Into<String>) -> &mut Self {
        debug_assert!(key.flag_bit().is_none(), "set called with a flag key");
        let value = value.into();
        if let Some(entry) = self.values.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.values.push((key, value));
        }
        self
    }

    pub fn get(&self, key: K) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.flags == 0 && self.values.is_empty()
    }
}

impl<K: FlagKey + Ord + Clone> AttrSet<K> {
    fn sort_key(&self) -> (u8, Vec<(K, String)>) {
        let mut values = self.values.clone();
        values.sort();
        (self.flags, values)
    }
}

impl<K: FlagKey + Ord + Clone> PartialEq for AttrSet<K> {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}
impl<K: FlagKey + Ord + Clone> Eq for AttrSet<K> {}

impl<K: FlagKey + Ord + Clone> PartialOrd for AttrSet<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: FlagKey + Ord + Clone> Ord for AttrSet<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

pub type DependencyAttrs = AttrSet<DepKey>;
pub type VersionAttrs = AttrSet<VerKey>;

/// A `VersionKey` of type `Requirement` plus the dependency attribute
/// set that was declared alongside it (dev/optional/scope/etc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementVersion {
    pub key: VersionKey,
    pub attrs: DependencyAttrs,
}

impl RequirementVersion {
    pub fn new(key: VersionKey, attrs: DependencyAttrs) -> Self {
        debug_assert_eq!(key.version_type, VersionType::Requirement);
        Self { key, attrs }
    }

    pub fn package(&self) -> &PackageKey {
        &self.key.package
    }

    pub fn requirement_str(&self) -> &str {
        &self.key.version
    }
}

/// A `VersionKey` of type `Concrete` plus its version attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub key: VersionKey,
    pub attrs: VersionAttrs,
}

impl Version {
    pub fn new(key: VersionKey, attrs: VersionAttrs) -> Self {
        debug_assert_eq!(key.version_type, VersionType::Concrete);
        Self { key, attrs }
    }

    pub fn package(&self) -> &PackageKey {
        &self.key.package
    }

    pub fn version_str(&self) -> &str {
        &self.key.version
    }
}
