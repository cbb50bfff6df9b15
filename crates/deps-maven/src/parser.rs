//! `pom.xml` parsing via a `quick_xml` SAX reader (§4.4), extended from a
//! bare dependency-list walk into the full object model: parent,
//! profiles (with activation), dependency management, properties,
//! repositories, licenses, and developers.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{MavenError, Result};
use crate::types::{
    Activation, Dependency, Developer, Exclusion, License, OsActivation, Parent, Profile,
    Project, PropertyActivation, Repository, Scope,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Root,
    Parent,
    Properties,
    Dependencies,
    DependencyManagement,
    Dependency,
    Exclusions,
    Exclusion,
    Repositories,
    Repository,
    Licenses,
    License,
    Developers,
    Developer,
    Profiles,
    Profile,
    ProfileProperties,
    Activation,
    ActivationOs,
    ActivationProperty,
    /// A tag inside `Dependency`/`Repository`/`License`/`Developer`/`Parent`
    /// whose text is a plain scalar field (groupId, url, email, ...).
    Field,
}

#[derive(Default)]
struct DepAccum {
    group_id: String,
    artifact_id: String,
    version: String,
    kind: String,
    classifier: Option<String>,
    scope: Option<String>,
    optional: bool,
    exclusions: Vec<Exclusion>,
}

impl DepAccum {
    fn finish(self) -> Dependency {
        Dependency {
            group_id: self.group_id,
            artifact_id: self.artifact_id,
            version: self.version,
            kind: if self.kind.is_empty() { "jar".to_string() } else { self.kind },
            classifier: self.classifier,
            scope: self.scope.as_deref().map(|s| s.parse().unwrap()).unwrap_or_default(),
            optional: self.optional,
            exclusions: self.exclusions,
        }
    }
}

/// Which in-progress list new text/end events feed: the top-level
/// project or the profile currently being accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepTarget {
    Project,
    ProjectManagement,
    Profile,
    ProfileManagement,
}

#[derive(Default)]
struct ProfileAccum {
    id: String,
    activation: Activation,
    properties: Vec<(String, String)>,
    dependencies: Vec<Dependency>,
    dependency_management: Vec<Dependency>,
    repositories: Vec<Repository>,
}

pub fn parse_pom(bytes: &[u8]) -> Result<Project> {
    let content = std::str::from_utf8(bytes).map_err(|_| MavenError::InvalidUtf8)?;

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = vec![Frame::Root];
    let mut project = Project::default();

    let mut current_parent: Option<Parent> = None;
    let mut current_dep: Option<DepAccum> = None;
    let mut dep_target = DepTarget::Project;
    let mut mgmt_owner = DepTarget::ProjectManagement;
    let mut repo_target = DepTarget::Project;
    let mut current_repo: Option<Repository> = None;
    let mut current_license: Option<License> = None;
    let mut current_developer: Option<Developer> = None;
    let mut current_profile: Option<ProfileAccum> = None;
    let mut current_prop_key: Option<String> = None;
    let mut current_field: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| MavenError::ParseError { message: e.to_string() })?;

        match event {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let top = stack.last().cloned().unwrap_or(Frame::Root);

                match (&top, tag.as_str()) {
                    (Frame::Root, "parent") => {
                        current_parent = Some(Parent {
                            group_id: String::new(),
                            artifact_id: String::new(),
                            version: String::new(),
                            relative_path: None,
                        });
                        stack.push(Frame::Parent);
                    }
                    (Frame::Root, "properties") => stack.push(Frame::Properties),
                    (Frame::Profile, "properties") => stack.push(Frame::ProfileProperties),
                    (Frame::Properties | Frame::ProfileProperties, key) => {
                        current_prop_key = Some(key.to_string());
                    }
                    (Frame::Root, "dependencies") => {
                        dep_target = DepTarget::Project;
                        stack.push(Frame::Dependencies);
                    }
                    (Frame::Root, "dependencyManagement") => {
                        mgmt_owner = DepTarget::ProjectManagement;
                        stack.push(Frame::DependencyManagement);
                    }
                    (Frame::DependencyManagement, "dependencies") => {
                        dep_target = mgmt_owner;
                        stack.push(Frame::Dependencies);
                    }
                    (Frame::Profile, "dependencies") => {
                        dep_target = DepTarget::Profile;
                        stack.push(Frame::Dependencies);
                    }
                    (Frame::Profile, "dependencyManagement") => {
                        mgmt_owner = DepTarget::ProfileManagement;
                        stack.push(Frame::DependencyManagement);
                    }
                    (Frame::Dependencies, "dependency") => {
                        current_dep = Some(DepAccum::default());
                        stack.push(Frame::Dependency);
                    }
                    (Frame::Dependency, "exclusions") => stack.push(Frame::Exclusions),
                    (Frame::Exclusions, "exclusion") => {
                        if let Some(dep) = current_dep.as_mut() {
                            dep.exclusions.push(Exclusion { group_id: String::new(), artifact_id: String::new() });
                        }
                        stack.push(Frame::Exclusion);
                    }
                    (Frame::Root, "repositories") => {
                        repo_target = DepTarget::Project;
                        stack.push(Frame::Repositories);
                    }
                    (Frame::Profile, "repositories") => {
                        repo_target = DepTarget::Profile;
                        stack.push(Frame::Repositories);
                    }
                    (Frame::Repositories, "repository") => {
                        current_repo = Some(Repository { id: String::new(), url: String::new() });
                        stack.push(Frame::Repository);
                    }
                    (Frame::Root, "licenses") => stack.push(Frame::Licenses),
                    (Frame::Licenses, "license") => {
                        current_license = Some(License::default());
                        stack.push(Frame::License);
                    }
                    (Frame::Root, "developers") => stack.push(Frame::Developers),
                    (Frame::Developers, "developer") => {
                        current_developer = Some(Developer::default());
                        stack.push(Frame::Developer);
                    }
                    (Frame::Root, "profiles") => stack.push(Frame::Profiles),
                    (Frame::Profiles, "profile") => {
                        current_profile = Some(ProfileAccum::default());
                        stack.push(Frame::Profile);
                    }
                    (Frame::Profile, "activation") => stack.push(Frame::Activation),
                    (Frame::Activation, "activeByDefault") => stack.push(Frame::Field),
                    (Frame::Activation, "jdk") => stack.push(Frame::Field),
                    (Frame::Activation, "os") => {
                        if let Some(p) = current_profile.as_mut() {
                            p.activation.os = Some(OsActivation::default());
                        }
                        stack.push(Frame::ActivationOs);
                    }
                    (Frame::Activation, "property") => {
                        if let Some(p) = current_profile.as_mut() {
                            p.activation.property = Some(PropertyActivation::default());
                        }
                        stack.push(Frame::ActivationProperty);
                    }
                    // Treated as a scalar text field; unmodeled container
                    // children (e.g. <build><plugins>) fall through here too,
                    // but their first nested close tag pops this Field frame
                    // and the rest is silently ignored, so the stack still
                    // balances overall.
                    (
                        Frame::Root
                        | Frame::Parent
                        | Frame::Dependency
                        | Frame::Exclusion
                        | Frame::Repository
                        | Frame::License
                        | Frame::Developer
                        | Frame::ActivationOs
                        | Frame::ActivationProperty
                        | Frame::Profile,
                        field,
                    ) => {
                        current_field = Some(field.to_string());
                        stack.push(Frame::Field);
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                let text = decode_text(e);
                let top = stack.last().cloned().unwrap_or(Frame::Root);

                match top {
                    Frame::Properties => {
                        if let Some(key) = current_prop_key.take() {
                            project.properties.push((key, text));
                        }
                    }
                    Frame::ProfileProperties => {
                        if let (Some(key), Some(p)) = (current_prop_key.take(), current_profile.as_mut()) {
                            p.properties.push((key, text));
                        }
                    }
                    Frame::Field => apply_field(
                        &mut project,
                        &mut current_parent,
                        &mut current_dep,
                        &mut current_repo,
                        &mut current_license,
                        &mut current_developer,
                        &mut current_profile,
                        stack.get(stack.len().saturating_sub(2)).cloned(),
                        current_field.as_deref(),
                        &text,
                    ),
                    _ => {}
                }
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                let top = stack.last().cloned().unwrap_or(Frame::Root);

                match (&top, tag.as_str()) {
                    (Frame::Field, _) => {
                        stack.pop();
                        current_field = None;
                    }
                    (Frame::Parent, "parent") => {
                        stack.pop();
                        project.parent = current_parent.take();
                    }
                    (Frame::Properties, "properties") | (Frame::ProfileProperties, "properties") => {
                        stack.pop();
                    }
                    (Frame::Exclusion, "exclusion") => {
                        stack.pop();
                    }
                    (Frame::Exclusions, "exclusions") => {
                        stack.pop();
                    }
                    (Frame::Dependency, "dependency") => {
                        stack.pop();
                        if let Some(dep) = current_dep.take() {
                            push_dependency(&mut project, &mut current_profile, dep_target, dep.finish());
                        }
                    }
                    (Frame::Dependencies, "dependencies") => {
                        stack.pop();
                    }
                    (Frame::DependencyManagement, "dependencyManagement") => {
                        stack.pop();
                    }
                    (Frame::Repository, "repository") => {
                        stack.pop();
                        if let Some(repo) = current_repo.take() {
                            match repo_target {
                                DepTarget::Profile => {
                                    if let Some(p) = current_profile.as_mut() {
                                        p.repositories.push(repo);
                                    }
                                }
                                _ => project.repositories.push(repo),
                            }
                        }
                    }
                    (Frame::Repositories, "repositories") => {
                        stack.pop();
                    }
                    (Frame::License, "license") => {
                        stack.pop();
                        if let Some(l) = current_license.take() {
                            project.licenses.push(l);
                        }
                    }
                    (Frame::Licenses, "licenses") => {
                        stack.pop();
                    }
                    (Frame::Developer, "developer") => {
                        stack.pop();
                        if let Some(d) = current_developer.take() {
                            project.developers.push(d);
                        }
                    }
                    (Frame::Developers, "developers") => {
                        stack.pop();
                    }
                    (Frame::ActivationOs, "os") => {
                        stack.pop();
                    }
                    (Frame::ActivationProperty, "property") => {
                        stack.pop();
                    }
                    (Frame::Activation, "activation") => {
                        stack.pop();
                    }
                    (Frame::Profile, "profile") => {
                        stack.pop();
                        if let Some(p) = current_profile.take() {
                            project.profiles.push(Profile {
                                id: p.id,
                                activation: p.activation,
                                properties: p.properties,
                                dependencies: p.dependencies,
                                dependency_management: p.dependency_management,
                                repositories: p.repositories,
                            });
                        }
                    }
                    (Frame::Profiles, "profiles") => {
                        stack.pop();
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(project)
}

fn decode_text(e: &quick_xml::events::BytesText) -> String {
    match e.decode() {
        Ok(cow) => {
            let s = cow.trim().to_string();
            quick_xml::escape::unescape(&s).map(|c| c.into_owned()).unwrap_or(s)
        }
        Err(_) => String::from_utf8_lossy(e.as_ref()).trim().to_string(),
    }
}

fn push_dependency(project: &mut Project, profile: &mut Option<ProfileAccum>, target: DepTarget, dep: Dependency) {
    match target {
        DepTarget::Project => project.dependencies.push(dep),
        DepTarget::ProjectManagement => project.dependency_management.push(dep),
        DepTarget::Profile => {
            if let Some(p) = profile.as_mut() {
                p.dependencies.push(dep);
            }
        }
        DepTarget::ProfileManagement => {
            if let Some(p) = profile.as_mut() {
                p.dependency_management.push(dep);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_field(
    project: &mut Project,
    current_parent: &mut Option<Parent>,
    current_dep: &mut Option<DepAccum>,
    current_repo: &mut Option<Repository>,
    current_license: &mut Option<License>,
    current_developer: &mut Option<Developer>,
    current_profile: &mut Option<ProfileAccum>,
    owner: Option<Frame>,
    field: Option<&str>,
    text: &str,
) {
    let Some(field) = field else { return };
    match owner {
        Some(Frame::Parent) => {
            if let Some(p) = current_parent.as_mut() {
                match field {
                    "groupId" => p.group_id = text.to_string(),
                    "artifactId" => p.artifact_id = text.to_string(),
                    "version" => p.version = text.to_string(),
                    "relativePath" => p.relative_path = Some(text.to_string()),
                    _ => {}
                }
            }
        }
        Some(Frame::Dependency) | Some(Frame::Exclusion) => {
            if let Some(dep) = current_dep.as_mut() {
                if matches!(owner, Some(Frame::Exclusion)) {
                    if let Some(excl) = dep.exclusions.last_mut() {
                        match field {
                            "groupId" => excl.group_id = text.to_string(),
                            "artifactId" => excl.artifact_id = text.to_string(),
                            _ => {}
                        }
                    }
                } else {
                    match field {
                        "groupId" => dep.group_id = text.to_string(),
                        "artifactId" => dep.artifact_id = text.to_string(),
                        "version" => dep.version = text.to_string(),
                        "type" => dep.kind = text.to_string(),
                        "classifier" => dep.classifier = Some(text.to_string()),
                        "scope" => dep.scope = Some(text.to_string()),
                        "optional" => dep.optional = text.eq_ignore_ascii_case("true"),
                        _ => {}
                    }
                }
            }
        }
        Some(Frame::Repository) => {
            if let Some(r) = current_repo.as_mut() {
                match field {
                    "id" => r.id = text.to_string(),
                    "url" => r.url = text.to_string(),
                    _ => {}
                }
            }
        }
        Some(Frame::License) => {
            if let Some(l) = current_license.as_mut() {
                match field {
                    "name" => l.name = Some(text.to_string()),
                    "url" => l.url = Some(text.to_string()),
                    _ => {}
                }
            }
        }
        Some(Frame::Developer) => {
            if let Some(d) = current_developer.as_mut() {
                match field {
                    "id" => d.id = Some(text.to_string()),
                    "name" => d.name = Some(text.to_string()),
                    "email" => d.email = Some(text.to_string()),
                    _ => {}
                }
            }
        }
        Some(Frame::ActivationOs) => {
            if let Some(p) = current_profile.as_mut() {
                if let Some(os) = p.activation.os.as_mut() {
                    match field {
                        "family" => os.family = Some(text.to_string()),
                        "name" => os.name = Some(text.to_string()),
                        "version" => os.version = Some(text.to_string()),
                        "arch" => os.arch = Some(text.to_string()),
                        _ => {}
                    }
                }
            }
        }
        Some(Frame::ActivationProperty) => {
            if let Some(p) = current_profile.as_mut() {
                if let Some(prop) = p.activation.property.as_mut() {
                    match field {
                        "name" => prop.name = text.to_string(),
                        "value" => prop.value = Some(text.to_string()),
                        _ => {}
                    }
                }
            }
        }
        Some(Frame::Activation) => {
            if let Some(p) = current_profile.as_mut() {
                match field {
                    "jdk" => p.activation.jdk = Some(text.to_string()),
                    "activeByDefault" => p.activation.active_by_default = text.eq_ignore_ascii_case("true"),
                    _ => {}
                }
            }
        }
        Some(Frame::Profile) => {
            if field == "id" {
                if let Some(p) = current_profile.as_mut() {
                    p.id = text.to_string();
                }
            }
        }
        Some(Frame::Root) | None => match field {
            "groupId" => project.group_id = text.to_string(),
            "artifactId" => project.artifact_id = text.to_string(),
            "version" => project.version = text.to_string(),
            "packaging" => project.packaging = text.to_string(),
            _ => {}
        },
        _ => {}
    }
}
