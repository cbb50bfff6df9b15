//! The POM object model (§4.4): the fields `MergeParent`, `MergeProfiles`,
//! `Interpolate`, and `ProcessDependencies` operate over.

use std::str::FromStr;

/// `scope=import, type=pom` dependency management entries route through
/// the BOM-import queue; everything else is a direct or managed
/// dependency declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Compile,
    Test,
    Runtime,
    Provided,
    System,
    Import,
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "test" => Self::Test,
            "runtime" => Self::Runtime,
            "provided" => Self::Provided,
            "system" => Self::System,
            "import" => Self::Import,
            _ => Self::Compile,
        })
    }
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Test => "test",
            Self::Runtime => "runtime",
            Self::Provided => "provided",
            Self::System => "system",
            Self::Import => "import",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

/// The key `ProcessDependencies` deduplicates direct dependencies and
/// dependency management entries by. Type defaults to `jar`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    pub group_id: String,
    pub artifact_id: String,
    pub kind: String,
    pub classifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    /// Empty until interpolated/substituted from dependency management.
    pub version: String,
    pub kind: String,
    pub classifier: Option<String>,
    pub scope: Scope,
    pub optional: bool,
    pub exclusions: Vec<Exclusion>,
}

impl Dependency {
    pub fn key(&self) -> DependencyKey {
        DependencyKey {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            kind: self.kind.clone(),
            classifier: self.classifier.clone(),
        }
    }

    pub fn coordinate(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct License {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Developer {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

/// `!`-prefixed values mean "active when this does NOT match" (§4.4.1).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OsActivation {
    pub family: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub arch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertyActivation {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Activation {
    pub jdk: Option<String>,
    pub os: Option<OsActivation>,
    pub property: Option<PropertyActivation>,
    pub active_by_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Profile {
    pub id: String,
    pub activation: Activation,
    pub properties: Vec<(String, String)>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
    pub parent: Option<Parent>,
    /// Insertion order preserved: `Interpolate` needs child-overrides-parent
    /// semantics, which a map would not record.
    pub properties: Vec<(String, String)>,
    pub dependencies: Vec<Dependency>,
    pub dependency_management: Vec<Dependency>,
    pub profiles: Vec<Profile>,
    pub repositories: Vec<Repository>,
    pub licenses: Vec<License>,
    pub developers: Vec<Developer>,
}

impl Project {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}
