//! The Maven BFS "nearest wins" resolver (§4.8).

use std::collections::{HashMap, VecDeque};

use deps_core::{
    CancellationToken, CoreError, DepKey, Ecosystem, PackageDataSource, PackageKey,
    RequirementVersion, Resolver, ResolvedGraph, Result, VerKey, Version, VersionKey, VersionType,
};

const DEFAULT_REGISTRY: &str = "default";
const MAVEN_CENTRAL: &str = "central";

/// A package plus its classifier and type — the coordinate
/// `concreteVersions`/`nodes` dedup a resolved node by (collapsed into
/// one map here: nearest wins means the first resolution of a
/// coordinate is authoritative, so there is never a second, differently
/// versioned entry to distinguish the two maps by).
type Coordinate = (PackageKey, Option<String>, String);

fn classifier_of(attrs: &deps_core::DependencyAttrs) -> Option<String> {
    attrs.get(DepKey::MavenClassifier).map(str::to_string)
}

fn kind_of(attrs: &deps_core::DependencyAttrs) -> String {
    attrs.get(DepKey::MavenArtifactType).unwrap_or("jar").to_string()
}

fn split_coordinate(name: &str) -> (&str, &str) {
    name.split_once(':').unwrap_or((name, ""))
}

/// `group:artifact` patterns from a pipe- or comma-separated
/// `MavenExclusions` attribute, `*` wildcards and all.
fn parse_exclusions(raw: &str) -> Vec<(String, String)> {
    raw.split(['|', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.split_once(':'))
        .map(|(g, a)| (g.to_string(), a.to_string()))
        .collect()
}

fn exclusion_matches(patterns: &[(String, String)], group: &str, artifact: &str) -> bool {
    patterns.iter().any(|(g, a)| (g == "*" || g == group) && (a == "*" || a == artifact))
}

/// The root's dependency-management view: entries the data source marks
/// `MavenDependencyOrigin` in the root's own requirement list exist only
/// so empty-version dependencies elsewhere in the tree can be
/// substituted against them.
fn build_management_view(root_reqs: &[RequirementVersion]) -> HashMap<Coordinate, String> {
    let mut map = HashMap::new();
    for req in root_reqs {
        if req.attrs.get(DepKey::MavenDependencyOrigin).is_none() {
            continue;
        }
        let key = (req.package().clone(), classifier_of(&req.attrs), kind_of(&req.attrs));
        map.entry(key).or_insert_with(|| req.requirement_str().to_string());
    }
    map
}

/// `Registries` entries prefixed `dep:` name registries this version
/// advertises for its own dependents to use when fetching further down
/// the branch.
fn advertised_repositories(version: &Version) -> Vec<String> {
    version
        .attrs
        .get(VerKey::Registries)
        .map(|raw| {
            raw.split('|')
                .filter_map(|e| e.trim().strip_prefix("dep:"))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Single-registry mode keeps a candidate only if one of the (unprefixed)
/// registries it was fetched on is the default registry, Maven Central,
/// or reachable through the branch's inherited repositories.
fn registry_reachable(version: &Version, branch_repositories: &[String]) -> bool {
    let Some(raw) = version.attrs.get(VerKey::Registries) else {
        return true;
    };
    raw.split('|').map(str::trim).filter(|e| !e.starts_with("dep:")).any(|name| {
        name.is_empty()
            || name.eq_ignore_ascii_case(DEFAULT_REGISTRY)
            || name.eq_ignore_ascii_case(MAVEN_CENTRAL)
            || branch_repositories.iter().any(|r| r.eq_ignore_ascii_case(name))
    })
}

/// Highest-sorted candidate, preferring an exact textual match to the
/// requirement (soft requirement preference, §4.8). `candidates` must
/// already be ascending-sorted by `PackageDataSource::matching_versions`.
fn pick_candidate(requirement: &str, candidates: &[Version]) -> Option<Version> {
    candidates
        .iter()
        .rev()
        .find(|v| v.version_str() == requirement)
        .or_else(|| candidates.last())
        .cloned()
}

struct QueueItem {
    graph_node: usize,
    version_key: VersionKey,
    exclusions: Vec<(String, String)>,
    repositories: Vec<String>,
    is_root: bool,
    recurse: bool,
}

#[derive(Default)]
pub struct MavenResolver;

impl Resolver for MavenResolver {
    fn resolve(&self, source: &dyn PackageDataSource, root: &VersionKey, cancel: &CancellationToken) -> Result<ResolvedGraph> {
        if source.ecosystem() != Ecosystem::Maven {
            return Err(CoreError::EcosystemMismatch { expected: "maven", actual: source.ecosystem().to_string() });
        }
        if root.version_type != VersionType::Concrete {
            return Err(CoreError::NotConcrete(root.to_string()));
        }

        let (single, rejected_any) = self.resolve_pass(source, root, cancel, false)?;
        if !rejected_any {
            return Ok(single);
        }

        let (mut multi, _) = self.resolve_pass(source, root, cancel, true)?;
        if single.to_text() == multi.to_text() {
            Ok(single)
        } else {
            multi.append_error("multi-registry resolution differ: missing repository configuration");
            Ok(multi)
        }
    }
}

impl MavenResolver {
    fn resolve_pass(
        &self,
        source: &dyn PackageDataSource,
        root: &VersionKey,
        cancel: &CancellationToken,
        multi: bool,
    ) -> Result<(ResolvedGraph, bool)> {
        let mut graph = ResolvedGraph::new();
        let mut resolved: HashMap<Coordinate, usize> = HashMap::new();
        let mut rejected_any = false;

        let root_graph_id = graph.add_node(root.clone());
        resolved.insert((root.package.clone(), None, "jar".into()), root_graph_id);

        let root_reqs = source.requirements(root, cancel)?;
        let mgt = build_management_view(&root_reqs);

        let mut queue: VecDeque<QueueItem> = VecDeque::new();
        queue.push_back(QueueItem {
            graph_node: root_graph_id,
            version_key: root.clone(),
            exclusions: Vec::new(),
            repositories: Vec::new(),
            is_root: true,
            recurse: true,
        });

        while let Some(item) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            if !item.recurse {
                continue;
            }

            let reqs = match source.requirements(&item.version_key, cancel) {
                Ok(r) => r,
                Err(CoreError::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };

            for req in &reqs {
                if req.attrs.flag(DepKey::Test) || req.attrs.flag(DepKey::Opt) {
                    continue;
                }
                if req.attrs.get(DepKey::Scope) == Some("provided") && !item.is_root {
                    continue;
                }
                if req.attrs.get(DepKey::MavenDependencyOrigin).is_some() {
                    continue;
                }

                let (group, artifact) = split_coordinate(&req.package().name);
                if exclusion_matches(&item.exclusions, group, artifact) {
                    continue;
                }

                let effective_req = if req.requirement_str().is_empty() {
                    let key = (req.package().clone(), classifier_of(&req.attrs), kind_of(&req.attrs));
                    match mgt.get(&key) {
                        Some(version) => {
                            let mut r = req.clone();
                            r.key.version = version.clone();
                            r
                        }
                        None => {
                            graph.add_error(item.graph_node, req.requirement_str(), "empty version with no dependency management entry");
                            continue;
                        }
                    }
                } else {
                    req.clone()
                };

                let classifier = classifier_of(&effective_req.attrs);
                let kind = kind_of(&effective_req.attrs);
                let coordinate = (effective_req.package().clone(), classifier, kind.clone());

                // Nearest wins: once a coordinate has a resolved node,
                // every later requirement for it (however it conflicts)
                // just attaches to that node.
                if let Some(&existing) = resolved.get(&coordinate) {
                    graph.add_edge(item.graph_node, existing, effective_req.requirement_str(), effective_req.attrs.clone())?;
                    continue;
                }

                let mut candidates = match source.matching_versions(&effective_req.key, cancel) {
                    Ok(c) => c,
                    Err(CoreError::NotFound(_)) => Vec::new(),
                    Err(e) => return Err(e),
                };
                if !multi {
                    let before = candidates.len();
                    candidates.retain(|v| registry_reachable(v, &item.repositories));
                    if candidates.len() < before {
                        rejected_any = true;
                    }
                }
                let Some(chosen) = pick_candidate(effective_req.requirement_str(), &candidates) else {
                    graph.add_error(item.graph_node, effective_req.requirement_str(), "could not find a version satisfying the requirement");
                    continue;
                };

                let new_key = VersionKey::concrete(chosen.package().clone(), chosen.version_str());
                let new_graph_id = graph.add_node(new_key.clone());
                let mut edge_attrs = effective_req.attrs.clone();
                edge_attrs.set(DepKey::Selector, "true");
                graph.add_edge(item.graph_node, new_graph_id, effective_req.requirement_str(), edge_attrs)?;
                resolved.insert(coordinate, new_graph_id);

                let own_exclusions = req.attrs.get(DepKey::MavenExclusions).map(parse_exclusions).unwrap_or_default();
                let mut exclusions = item.exclusions.clone();
                exclusions.extend(own_exclusions);

                let mut repositories = item.repositories.clone();
                repositories.extend(advertised_repositories(&chosen));

                // ear/war/rar bundle their dependencies rather than
                // resolving them transitively.
                let recurse = !matches!(kind.as_str(), "ear" | "war" | "rar");

                queue.push_back(QueueItem {
                    graph_node: new_graph_id,
                    version_key: new_key,
                    exclusions,
                    repositories,
                    is_root: false,
                    recurse,
                });
            }
        }

        graph.canon()?;
        Ok((graph, rejected_any))
    }
}
