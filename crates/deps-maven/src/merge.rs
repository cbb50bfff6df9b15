//! `MergeParent`, `MergeProfiles`/`Activation`, and `Interpolate` (§4.4).

use std::collections::HashSet;

use crate::types::{Activation, Dependency, Developer, License, Profile, Project, Repository};

/// Field-level parent merge: the child wins on every scalar field; list
/// fields (licenses, developers) come from the parent only when the
/// child's list is empty; dependencies, repositories, profiles,
/// dependency management are appended; properties merge with the
/// parent's entries first (child may override, since property lookup
/// takes the *last* matching entry — see `Project::property`).
pub fn merge_parent(mut child: Project, parent: &Project) -> Project {
    merge_parent_into(&mut child, parent);
    child
}

fn merge_parent_into(child: &mut Project, parent: &Project) {
    let mut merged_properties = parent.properties.clone();
    merged_properties.append(&mut child.properties);
    child.properties = merged_properties;

    if child.licenses.is_empty() {
        child.licenses = parent.licenses.clone();
    }
    if child.developers.is_empty() {
        child.developers = parent.developers.clone();
    }

    let mut deps = parent.dependencies.clone();
    deps.append(&mut child.dependencies);
    child.dependencies = deps;

    let mut mgmt = parent.dependency_management.clone();
    mgmt.append(&mut child.dependency_management);
    child.dependency_management = mgmt;

    let mut repos = parent.repositories.clone();
    repos.append(&mut child.repositories);
    child.repositories = repos;

    let mut profiles = parent.profiles.clone();
    profiles.append(&mut child.profiles);
    child.profiles = profiles;
}

/// Runtime facts an `Activation` is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct ActivationContext<'a> {
    pub jdk: &'a str,
    pub os_family: &'a str,
    pub os_name: &'a str,
    pub os_version: &'a str,
    pub os_arch: &'a str,
    /// Properties visible for `<property>` activation, e.g. project
    /// properties merged with system properties.
    pub properties: &'a [(String, String)],
}

fn neg_match(expected: &str, actual: &str) -> bool {
    if let Some(rest) = expected.strip_prefix('!') {
        !rest.eq_ignore_ascii_case(actual)
    } else {
        expected.eq_ignore_ascii_case(actual)
    }
}

/// §4.4.1's JDK criterion: a "simple" (single-version) spec is a
/// major.minor prefix match; anything else is treated as a range
/// constraint via `semver`.
fn jdk_matches(spec: &str, jdk: &str, semver: &dyn deps_core::SemverSystem) -> bool {
    if spec.is_empty() {
        return true;
    }
    let is_simple = spec.chars().all(|c| c.is_ascii_digit() || c == '.');
    if is_simple {
        jdk.starts_with(spec)
    } else {
        semver.matches(spec, jdk)
    }
}

fn property_matches(activation: &crate::types::PropertyActivation, ctx: &ActivationContext) -> bool {
    let found = ctx.properties.iter().find(|(k, _)| *k == activation.name);
    match &activation.value {
        None => {
            // name-only: active iff the name starts with "!" (meaning
            // "active when NOT present") XORed against presence.
            let negated = activation.name.starts_with('!');
            found.is_some() != negated
        }
        Some(expected) => match found {
            Some((_, actual)) => neg_match(expected, actual),
            None => expected.starts_with('!'),
        },
    }
}

fn activation_matches(
    activation: &Activation,
    ctx: &ActivationContext,
    semver: &dyn deps_core::SemverSystem,
) -> bool {
    if let Some(jdk) = activation.jdk.as_deref() {
        if !jdk_matches(jdk, ctx.jdk, semver) {
            return false;
        }
    }
    if let Some(os) = &activation.os {
        if let Some(family) = os.family.as_deref() {
            if !family.is_empty() && !neg_match(family, ctx.os_family) {
                return false;
            }
        }
        if let Some(name) = os.name.as_deref() {
            if !name.is_empty() && !neg_match(name, ctx.os_name) {
                return false;
            }
        }
        if let Some(version) = os.version.as_deref() {
            if !version.is_empty() && !neg_match(version, ctx.os_version) {
                return false;
            }
        }
        if let Some(arch) = os.arch.as_deref() {
            if !arch.is_empty() && !neg_match(arch, ctx.os_arch) {
                return false;
            }
        }
    }
    if let Some(property) = &activation.property {
        if !property_matches(property, ctx) {
            return false;
        }
    }
    true
}

/// Evaluate every profile's activation; merge all that activate, or (if
/// none do) all whose `activeByDefault` is true.
pub fn merge_profiles(project: &mut Project, ctx: &ActivationContext, semver: &dyn deps_core::SemverSystem) {
    let activated: Vec<Profile> = project
        .profiles
        .iter()
        .filter(|p| activation_matches(&p.activation, ctx, semver))
        .cloned()
        .collect();

    let to_merge = if activated.is_empty() {
        project.profiles.iter().filter(|p| p.activation.active_by_default).cloned().collect()
    } else {
        activated
    };

    for profile in to_merge {
        // Profile properties override project properties: appended last,
        // since `Project::property` reads the last matching entry.
        project.properties.extend(profile.properties);
        project.dependency_management.extend(profile.dependency_management);
        project.dependencies.extend(profile.dependencies);
        project.repositories.extend(profile.repositories);
    }
}

/// Build the interpolation property map: project properties, then
/// synthetic `groupId`/`version`/`parent.groupId`/`parent.version`, each
/// available bare and under `pom.`/`project.` prefixes. Bare keys are
/// overridable by an explicit property of the same name; prefixed keys
/// are not.
fn property_map(project: &Project) -> Vec<(String, String)> {
    let mut map: Vec<(String, String)> = project.properties.clone();

    let synthetic = [
        ("groupId", project.group_id.clone()),
        ("version", project.version.clone()),
        (
            "parent.groupId",
            project.parent.as_ref().map(|p| p.group_id.clone()).unwrap_or_default(),
        ),
        (
            "parent.version",
            project.parent.as_ref().map(|p| p.version.clone()).unwrap_or_default(),
        ),
    ];

    for (key, value) in synthetic {
        if !map.iter().any(|(k, _)| k == key) {
            map.push((key.to_string(), value.clone()));
        }
        for prefix in ["pom.", "project."] {
            map.push((format!("{prefix}{key}"), value.clone()));
        }
    }
    map
}

fn lookup<'a>(map: &'a [(String, String)], key: &str) -> Option<&'a str> {
    map.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Substitute `${key}` placeholders in `text`, recursing into the
/// substituted value and tracking keys currently being resolved to break
/// cycles. Returns `None` if any placeholder (direct or via a cycle)
/// cannot be resolved.
fn interpolate_str(text: &str, map: &[(String, String)], resolving: &mut HashSet<String>) -> Option<String> {
    let mut out = String::new();
    let mut rest = text;
    loop {
        let Some(start) = rest.find("${") else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // unterminated placeholder: leave the rest verbatim.
            out.push_str(&rest[start..]);
            break;
        };
        let key = &after[..end];
        if resolving.contains(key) {
            return None;
        }
        let value = lookup(map, key)?;
        resolving.insert(key.to_string());
        let resolved = interpolate_str(value, map, resolving)?;
        resolving.remove(key);
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }
    Some(out)
}

fn interpolate_opt(field: &mut Option<String>, map: &[(String, String)]) -> bool {
    let Some(text) = field.as_ref() else { return true };
    let mut resolving = HashSet::new();
    match interpolate_str(text, map, &mut resolving) {
        Some(resolved) => {
            *field = Some(resolved);
            true
        }
        None => false,
    }
}

fn interpolate_field(field: &mut String, map: &[(String, String)]) -> bool {
    let mut resolving = HashSet::new();
    match interpolate_str(field, map, &mut resolving) {
        Some(resolved) => {
            *field = resolved;
            true
        }
        None => false,
    }
}

fn interpolate_dependency(dep: &mut Dependency, map: &[(String, String)]) -> bool {
    interpolate_field(&mut dep.group_id, map)
        && interpolate_field(&mut dep.artifact_id, map)
        && interpolate_field(&mut dep.version, map)
}

fn interpolate_license(l: &mut License, map: &[(String, String)]) -> bool {
    interpolate_opt(&mut l.name, map) && interpolate_opt(&mut l.url, map)
}

fn interpolate_developer(d: &mut Developer, map: &[(String, String)]) -> bool {
    interpolate_opt(&mut d.id, map) && interpolate_opt(&mut d.name, map) && interpolate_opt(&mut d.email, map)
}

fn interpolate_repository(r: &mut Repository, map: &[(String, String)]) -> bool {
    interpolate_field(&mut r.id, map) && interpolate_field(&mut r.url, map)
}

/// Substitute every `${...}` placeholder across the project's string
/// fields, dropping list elements (dependency/license/developer/
/// repository) that still carry an unresolved placeholder after the
/// attempt.
pub fn interpolate(project: &mut Project) {
    let map = property_map(project);

    interpolate_field(&mut project.group_id, &map);
    interpolate_field(&mut project.artifact_id, &map);
    interpolate_field(&mut project.version, &map);
    interpolate_field(&mut project.packaging, &map);

    project.dependencies.retain_mut(|d| interpolate_dependency(d, &map));
    project.dependency_management.retain_mut(|d| interpolate_dependency(d, &map));
    project.licenses.retain_mut(|l| interpolate_license(l, &map));
    project.developers.retain_mut(|d| interpolate_developer(d, &map));
    project.repositories.retain_mut(|r| interpolate_repository(r, &map));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Scope;

    fn dep(group: &str, artifact: &str, version: &str) -> Dependency {
        Dependency {
            group_id: group.to_string(),
            artifact_id: artifact.to_string(),
            version: version.to_string(),
            kind: "jar".to_string(),
            classifier: None,
            scope: Scope::Compile,
            optional: false,
            exclusions: vec![],
        }
    }

    #[test]
    fn merge_parent_appends_lists_and_child_wins_scalars() {
        let parent = Project {
            group_id: "com.example".into(),
            dependencies: vec![dep("g", "a", "1")],
            licenses: vec![License { name: Some("MIT".into()), url: None }],
            ..Default::default()
        };
        let mut child = Project { dependencies: vec![dep("g", "b", "2")], ..Default::default() };
        merge_parent_into(&mut child, &parent);
        assert_eq!(child.dependencies.len(), 2);
        assert_eq!(child.dependencies[0].artifact_id, "a");
        assert_eq!(child.licenses[0].name.as_deref(), Some("MIT"));
    }

    #[test]
    fn merge_parent_keeps_child_licenses_when_nonempty() {
        let parent = Project { licenses: vec![License { name: Some("MIT".into()), url: None }], ..Default::default() };
        let mut child = Project { licenses: vec![License { name: Some("Apache-2.0".into()), url: None }], ..Default::default() };
        merge_parent_into(&mut child, &parent);
        assert_eq!(child.licenses[0].name.as_deref(), Some("Apache-2.0"));
    }

    #[test]
    fn interpolate_substitutes_property_and_synthetic_keys() {
        let mut project = Project {
            group_id: "com.example".into(),
            version: "1.0.0".into(),
            properties: vec![("lib.version".to_string(), "2.3.4".to_string())],
            dependencies: vec![dep("${groupId}", "x", "${lib.version}")],
            ..Default::default()
        };
        interpolate(&mut project);
        assert_eq!(project.dependencies[0].group_id, "com.example");
        assert_eq!(project.dependencies[0].version, "2.3.4");
    }

    #[test]
    fn interpolate_drops_dependency_with_unresolved_placeholder() {
        let mut project = Project { dependencies: vec![dep("g", "a", "${missing}")], ..Default::default() };
        interpolate(&mut project);
        assert!(project.dependencies.is_empty());
    }

    #[test]
    fn interpolate_breaks_cycles_and_drops() {
        let mut project = Project {
            properties: vec![("a".to_string(), "${b}".to_string()), ("b".to_string(), "${a}".to_string())],
            dependencies: vec![dep("${a}", "x", "1")],
            ..Default::default()
        };
        interpolate(&mut project);
        assert!(project.dependencies.is_empty());
    }

    #[test]
    fn activation_property_name_only_negated() {
        let activation = Activation {
            property: Some(crate::types::PropertyActivation { name: "!skip".to_string(), value: None }),
            ..Default::default()
        };
        let ctx = ActivationContext { properties: &[], ..Default::default() };
        assert!(activation_matches(&activation, &ctx, &crate::semver::MavenSemver));
    }

    #[test]
    fn activation_os_negation() {
        let activation = Activation {
            os: Some(crate::types::OsActivation { family: Some("!windows".to_string()), ..Default::default() }),
            ..Default::default()
        };
        let ctx = ActivationContext { os_family: "unix", ..Default::default() };
        assert!(activation_matches(&activation, &ctx, &crate::semver::MavenSemver));
    }

    #[test]
    fn merge_profiles_merges_active_by_default_when_none_activate() {
        let mut project = Project {
            profiles: vec![Profile {
                id: "p1".to_string(),
                activation: Activation { active_by_default: true, ..Default::default() },
                dependencies: vec![dep("g", "a", "1")],
                ..Default::default()
            }],
            ..Default::default()
        };
        let ctx = ActivationContext::default();
        merge_profiles(&mut project, &ctx, &crate::semver::MavenSemver);
        assert_eq!(project.dependencies.len(), 1);
    }

    #[test]
    fn parent_merge_public_entry_point() {
        let parent = Project {
            artifact_id: "parent-pom".into(),
            dependencies: vec![dep("g", "from-parent", "1")],
            ..Default::default()
        };
        let child = Project { artifact_id: "child".into(), ..Default::default() };
        let merged = merge_parent(child, &parent);
        assert_eq!(merged.artifact_id, "child");
        assert_eq!(merged.dependencies.len(), 1);
    }
}
