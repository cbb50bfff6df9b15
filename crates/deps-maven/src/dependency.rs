//! `ProcessDependencies(fetchDependencyManagement)` (§4.4): resolves BOM
//! imports into the dependency-management view, then fills empty fields
//! on each direct dependency from that view.

use std::collections::HashSet;

use crate::error::{MavenError, Result};
use crate::types::{Dependency, DependencyKey, Project, Scope};

/// Iteration budget against BOM import cycles.
const MAX_IMPORTS: usize = 300;
/// Matches the parent-ancestry chain budget parents are fetched under;
/// recorded here so both limits live next to each other.
const MAX_PARENTS: usize = 100;

fn dedup_by_key(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(deps.len());
    for dep in deps {
        if seen.insert(dep.key()) {
            out.push(dep);
        }
    }
    out
}

/// `fetchDependencyManagement(groupId, artifactId, version)`: returns the
/// dependency-management entries of the named BOM's POM (after its own
/// parent merge, profile merge, and interpolation — not a second round of
/// `ProcessDependencies`, which would recurse into imports it does not
/// own).
pub trait FetchDependencyManagement {
    fn fetch(&mut self, group_id: &str, artifact_id: &str, version: &str) -> Result<Vec<Dependency>>;
}

impl<F> FetchDependencyManagement for F
where
    F: FnMut(&str, &str, &str) -> Result<Vec<Dependency>>,
{
    fn fetch(&mut self, group_id: &str, artifact_id: &str, version: &str) -> Result<Vec<Dependency>> {
        self(group_id, artifact_id, version)
    }
}

pub fn process_dependencies(project: &mut Project, fetch: &mut dyn FetchDependencyManagement) -> Result<()> {
    project.dependencies = dedup_by_key(std::mem::take(&mut project.dependencies));
    project.dependency_management = dedup_by_key(std::mem::take(&mut project.dependency_management));

    let mut imports: Vec<Dependency> = project
        .dependency_management
        .iter()
        .filter(|d| d.scope == Scope::Import && d.kind == "pom")
        .cloned()
        .collect();
    let mut imported: HashSet<(String, String, String)> = HashSet::new();
    let mut iterations = 0usize;

    while let Some(bom) = imports.pop() {
        let coordinate = (bom.group_id.clone(), bom.artifact_id.clone(), bom.version.clone());
        if !imported.insert(coordinate.clone()) {
            continue;
        }
        iterations += 1;
        if iterations > MAX_IMPORTS {
            return Err(MavenError::ImportBudgetExceeded(coordinate.0, coordinate.1, coordinate.2));
        }

        let entries = fetch.fetch(&bom.group_id, &bom.artifact_id, &bom.version)?;
        let mut existing: HashSet<DependencyKey> =
            project.dependency_management.iter().map(Dependency::key).collect();
        for entry in entries {
            if entry.scope == Scope::Import && entry.kind == "pom" {
                imports.push(entry);
                continue;
            }
            if existing.insert(entry.key()) {
                project.dependency_management.push(entry);
            }
        }
    }

    let management: std::collections::HashMap<DependencyKey, Dependency> =
        project.dependency_management.iter().map(|d| (d.key(), d.clone())).collect();

    for dep in &mut project.dependencies {
        let Some(managed) = management.get(&dep.key()) else {
            continue;
        };
        if dep.version.is_empty() {
            dep.version = managed.version.clone();
        }
        if dep.scope == Scope::default() && managed.scope != Scope::default() {
            dep.scope = managed.scope;
        }
        if dep.exclusions.is_empty() {
            dep.exclusions = managed.exclusions.clone();
        }
    }

    Ok(())
}

/// Referenced by callers fetching parent POMs alongside BOM imports so
/// both share one budget discipline; the resolver enforces it directly
/// since this module never walks `Parent` chains itself.
pub const MAX_PARENT_CHAIN: usize = MAX_PARENTS;
