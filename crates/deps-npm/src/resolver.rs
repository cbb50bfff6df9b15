//! The npm install-tree resolver (§4.7): builds a tree mimicking
//! `npm install` on an empty workspace, then flattens it into a
//! `ResolvedGraph`.

use std::collections::{HashMap, HashSet};

use deps_core::{
    CancellationToken, CoreError, DepKey, Ecosystem, PackageDataSource, PackageKey,
    RequirementVersion, Resolver, ResolvedGraph, Result, VerKey, Version, VersionKey, VersionType,
    matching,
};

/// One node of the in-progress install tree. `addressed_name` is the key
/// under which the node's parent reaches it (its package name, or its
/// `KnownAs` alias) — this is what sibling-collision and slot-protection
/// checks compare against. Direct and alias children live in separate
/// maps (§4.7's "a child map keyed by package, an alias child map keyed
/// by alias name"), each with its own slot-protection set.
///
/// A bundled node (one injected from `PackageDataSource::bundled_versions`
/// rather than created by a normal requirement resolution) starts with
/// `graph_node: None` and no pending requirements of its own: it is not
/// pushed onto the processing stack, and only gains a graph node the
/// first time some requirement reuses it.
struct TreeNode {
    parent: Option<usize>,
    addressed_name: String,
    version: VersionKey,
    graph_node: Option<usize>,
    pending: Vec<RequirementVersion>,
    children: HashMap<String, usize>,
    alias_children: HashMap<String, usize>,
    protected: HashSet<String>,
    alias_protected: HashSet<String>,
    bundled: bool,
}

pub struct NpmResolver;

impl Default for NpmResolver {
    fn default() -> Self {
        Self
    }
}

impl Resolver for NpmResolver {
    fn resolve(
        &self,
        source: &dyn PackageDataSource,
        root: &VersionKey,
        cancel: &CancellationToken,
    ) -> Result<ResolvedGraph> {
        if source.ecosystem() != Ecosystem::Npm {
            return Err(CoreError::EcosystemMismatch {
                expected: "npm",
                actual: source.ecosystem().to_string(),
            });
        }
        if root.version_type != VersionType::Concrete {
            return Err(CoreError::NotConcrete(root.to_string()));
        }

        let mut graph = ResolvedGraph::new();
        let mut arena: Vec<TreeNode> = Vec::new();

        let root_graph_id = graph.add_node(root.clone());
        let mut root_reqs = source.requirements(root, cancel)?;
        matching::sort_dependencies(Ecosystem::Npm, &mut root_reqs);
        arena.push(TreeNode {
            parent: None,
            addressed_name: root.package.name.clone(),
            version: root.clone(),
            graph_node: Some(root_graph_id),
            pending: root_reqs,
            children: HashMap::new(),
            alias_children: HashMap::new(),
            protected: HashSet::new(),
            alias_protected: HashSet::new(),
            bundled: false,
        });
        self.inject_bundles(source, &mut arena, 0, cancel)?;

        let mut stack = vec![0usize];
        while let Some(current) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            let reqs = std::mem::take(&mut arena[current].pending);
            for req in reqs {
                self.process_requirement(source, &mut graph, &mut arena, &mut stack, current, &req, cancel)?;
            }
        }

        for node in &arena {
            if node.bundled && node.graph_node.is_none() {
                graph.append_error(format!("unused bundled version: {}", node.version));
            }
        }

        graph.canon()?;
        Ok(graph)
    }
}

/// Outcome of walking from a node up toward the root looking for an
/// already-installed node addressed by the same name (§4.7 step 2b).
enum Reuse {
    /// Reuse `node`, found at ancestor level `owner`.
    Found { node: usize, owner: usize },
    /// The nearest match was a bundled node whose `DerivedFrom` version
    /// does not satisfy the requirement; it has already been deleted
    /// from `owner`'s child map and the new node must install exactly at
    /// `owner`, not be hoisted further.
    InstallAt { owner: usize },
    None,
}

impl NpmResolver {
    /// Recursively inject synthetic tree children for every package
    /// bundled inside `node`'s tarball (§4.7 "Bundles"), before `node`
    /// itself (or, for the root, before the selection loop starts) is
    /// processed. Bundled nodes are addressed by their origin package
    /// name — the name a later requirement will actually reference —
    /// and never receive pending requirements of their own.
    fn inject_bundles(
        &self,
        source: &dyn PackageDataSource,
        arena: &mut Vec<TreeNode>,
        node: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let parent_key = arena[node].version.clone();
        let bundled = source.bundled_versions(&parent_key, cancel)?;
        for version in bundled {
            let origin_name = version
                .attrs
                .get(VerKey::DerivedFrom)
                .unwrap_or(&version.key.package.name)
                .to_string();

            let new_id = arena.len();
            arena.push(TreeNode {
                parent: Some(node),
                addressed_name: origin_name.clone(),
                version: version.key.clone(),
                graph_node: None,
                pending: Vec::new(),
                children: HashMap::new(),
                alias_children: HashMap::new(),
                protected: HashSet::new(),
                alias_protected: HashSet::new(),
                bundled: true,
            });
            arena[node].children.insert(origin_name, new_id);
            self.inject_bundles(source, arena, new_id, cancel)?;
        }
        Ok(())
    }

    /// Walk from `current` up to the root looking for a node addressed
    /// by `addressed_name` (in the direct or alias map per `via_alias`)
    /// whose version satisfies the requirement. See `Reuse`.
    fn find_reuse(
        &self,
        arena: &mut [TreeNode],
        current: usize,
        addressed_name: &str,
        via_alias: bool,
        is_wildcard: bool,
        candidates: &[Version],
    ) -> Reuse {
        let mut walker = Some(current);
        while let Some(node) = walker {
            let found = if via_alias {
                arena[node].alias_children.get(addressed_name).copied()
            } else {
                arena[node].children.get(addressed_name).copied()
            };
            if let Some(child) = found {
                let satisfies =
                    is_wildcard || candidates.iter().any(|v| v.version_str() == arena[child].version.version);
                if satisfies {
                    return Reuse::Found { node: child, owner: node };
                }
                if arena[child].bundled {
                    if via_alias {
                        arena[node].alias_children.remove(addressed_name);
                    } else {
                        arena[node].children.remove(addressed_name);
                    }
                    return Reuse::InstallAt { owner: node };
                }
                // A non-bundled mismatch does not block the search:
                // keep walking toward the root past this level.
            }
            walker = arena[node].parent;
        }
        Reuse::None
    }

    #[allow(clippy::too_many_arguments)]
    fn process_requirement(
        &self,
        source: &dyn PackageDataSource,
        graph: &mut ResolvedGraph,
        arena: &mut Vec<TreeNode>,
        stack: &mut Vec<usize>,
        current: usize,
        req: &RequirementVersion,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let via_alias = req.attrs.get(DepKey::KnownAs).is_some();
        let addressed_name = req
            .attrs
            .get(DepKey::KnownAs)
            .unwrap_or(&req.package().name)
            .to_string();
        let is_wildcard = req.requirement_str() == "*";

        let candidates = match source.matching_versions(&req.key, cancel) {
            Ok(candidates) => candidates,
            Err(CoreError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        if candidates.is_empty() {
            graph.add_error(
                arena[current].graph_node.expect("processed node always has a graph id"),
                req.requirement_str(),
                "could not find a version satisfying the requirement",
            );
            return Ok(());
        }
        let would_pick = self.pick_would_pick(&candidates);

        match self.find_reuse(arena, current, &addressed_name, via_alias, is_wildcard, &candidates) {
            Reuse::Found { node: target, owner } => {
                let target_graph_id = match arena[target].graph_node {
                    Some(id) => id,
                    None => {
                        let key = VersionKey::concrete(
                            PackageKey::new(Ecosystem::Npm, arena[target].addressed_name.clone()),
                            arena[target].version.version.clone(),
                        );
                        let id = graph.add_node(key);
                        arena[target].graph_node = Some(id);
                        id
                    }
                };
                graph.add_edge(
                    arena[current].graph_node.expect("processed node always has a graph id"),
                    target_graph_id,
                    req.requirement_str(),
                    req.attrs.clone(),
                )?;
                // Protect the addressed name on every level strictly
                // between `current` and `owner` so a later hoist cannot
                // shadow this reuse.
                let mut level = Some(current);
                while let Some(l) = level {
                    if l == owner {
                        break;
                    }
                    if via_alias {
                        arena[l].alias_protected.insert(addressed_name.clone());
                    } else {
                        arena[l].protected.insert(addressed_name.clone());
                    }
                    level = arena[l].parent;
                }
                Ok(())
            }
            outcome @ (Reuse::InstallAt { .. } | Reuse::None) => {
                // Refuse to shadow a non-root ancestor of the same package.
                let mut ancestor = arena[current].parent;
                while let Some(a) = ancestor {
                    if arena[a].version.package == req.key.package && arena[a].parent.is_some() {
                        graph.add_error(
                            arena[current].graph_node.expect("processed node always has a graph id"),
                            req.requirement_str(),
                            "unreachable version: would shadow a non-root ancestor of the same package",
                        );
                        return Ok(());
                    }
                    ancestor = arena[a].parent;
                }

                let chosen = match outcome {
                    Reuse::InstallAt { owner } => owner,
                    _ => {
                        // Hoist as far toward the root as there is no
                        // sibling collision or slot protection for this
                        // name.
                        let mut chosen = current;
                        let mut probe = arena[current].parent;
                        while let Some(p) = probe {
                            let blocked = if via_alias {
                                arena[p].alias_children.contains_key(&addressed_name)
                                    || arena[p].alias_protected.contains(&addressed_name)
                            } else {
                                arena[p].children.contains_key(&addressed_name)
                                    || arena[p].protected.contains(&addressed_name)
                            };
                            if blocked {
                                break;
                            }
                            chosen = p;
                            probe = arena[p].parent;
                        }
                        chosen
                    }
                };

                let mut attrs = req.attrs.clone();
                attrs.set(DepKey::Selector, "true");
                let concrete_key = would_pick.key.clone();
                let mut pending = match source.requirements(&concrete_key, cancel) {
                    Ok(reqs) => reqs,
                    Err(CoreError::NotFound(_)) => Vec::new(),
                    Err(e) => return Err(e),
                };
                matching::sort_dependencies(Ecosystem::Npm, &mut pending);

                let new_graph_id = graph.add_node(concrete_key.clone());
                graph.add_edge(
                    arena[current].graph_node.expect("processed node always has a graph id"),
                    new_graph_id,
                    req.requirement_str(),
                    attrs,
                )?;

                let new_id = arena.len();
                arena.push(TreeNode {
                    parent: Some(chosen),
                    addressed_name: addressed_name.clone(),
                    version: concrete_key,
                    graph_node: Some(new_graph_id),
                    pending,
                    children: HashMap::new(),
                    alias_children: HashMap::new(),
                    protected: HashSet::new(),
                    alias_protected: HashSet::new(),
                    bundled: false,
                });
                if via_alias {
                    arena[chosen].alias_children.insert(addressed_name, new_id);
                } else {
                    arena[chosen].children.insert(addressed_name, new_id);
                }
                self.inject_bundles(source, arena, new_id, cancel)?;
                stack.push(new_id);
                Ok(())
            }
        }
    }

    /// §4.7 step 2e: the highest candidate, unless `latest` is among the
    /// candidates and not `Blocked`, in which case `latest` is promoted
    /// over it.
    fn pick_would_pick(&self, candidates: &[Version]) -> Version {
        let latest = candidates.iter().find(|v| {
            v.attrs
                .get(VerKey::Tags)
                .is_some_and(|tags| tags.split(',').any(|t| t == "latest"))
        });
        if let Some(latest) = latest {
            if !latest.attrs.flag(VerKey::Blocked) {
                return latest.clone();
            }
        }
        candidates.last().expect("caller checked candidates is non-empty").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semver::NpmSemver;
    use deps_core::{DependencyAttrs, LocalDataSource, VersionAttrs};
    use std::sync::Arc;

    fn pkg(name: &str) -> PackageKey {
        PackageKey::new(Ecosystem::Npm, name)
    }

    fn concrete(name: &str, version: &str) -> Version {
        Version::new(VersionKey::concrete(pkg(name), version), VersionAttrs::default())
    }

    fn req(name: &str, range: &str) -> RequirementVersion {
        RequirementVersion::new(VersionKey::requirement(pkg(name), range), DependencyAttrs::default())
    }

    /// §8's canonical npm scenario: the soft requirement on `bob` from
    /// alice@2.0's first-processed dependency is pinned at the root;
    /// chuck's conflicting `bob@2` requirement installs underneath chuck.
    #[test]
    fn soft_requirement_pinned_at_root_conflict_nested() {
        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_version(concrete("alice", "2.0.0"))
            .add_version(concrete("bob", "0.1.0"))
            .add_version(concrete("bob", "1.0.0"))
            .add_version(concrete("bob", "2.0.0"))
            .add_version(concrete("chuck", "1.0.0"))
            .add_requirements(
                VersionKey::concrete(pkg("alice"), "1.0.0"),
                vec![req("bob", "1")],
            )
            .add_requirements(
                VersionKey::concrete(pkg("alice"), "2.0.0"),
                vec![req("bob", "1"), req("chuck", "1")],
            )
            .add_requirements(VersionKey::concrete(pkg("chuck"), "1.0.0"), vec![req("bob", "2")])
            .build();

        let root = VersionKey::concrete(pkg("alice"), "2.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        let bob_nodes: Vec<_> = graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.version.package.name == "bob")
            .collect();
        assert_eq!(bob_nodes.len(), 2, "bob@1 at root and bob@2 under chuck");

        let root_bob = bob_nodes
            .iter()
            .find(|(i, _)| graph.edges.iter().any(|e| e.from == 0 && e.to == *i))
            .expect("root has a direct bob edge");
        assert_eq!(root_bob.1.version.version, "1.0.0");

        let nested_bob = bob_nodes.iter().find(|(i, _)| *i != root_bob.0).unwrap();
        assert_eq!(nested_bob.1.version.version, "2.0.0");
    }

    #[test]
    fn missing_candidate_records_node_error_not_a_hard_failure() {
        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_requirements(
                VersionKey::concrete(pkg("alice"), "1.0.0"),
                vec![req("missing", "^1.0.0")],
            )
            .build();

        let root = VersionKey::concrete(pkg("alice"), "1.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        assert!(graph.nodes[0].errors.iter().any(|e| e.requirement == "^1.0.0"));
    }

    #[test]
    fn latest_tag_is_promoted_over_a_higher_untagged_candidate() {
        let mut tagged = concrete("bob", "1.0.0");
        tagged.attrs.set(VerKey::Tags, "latest");
        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_version(tagged)
            .add_version(concrete("bob", "2.0.0"))
            .add_requirements(VersionKey::concrete(pkg("alice"), "1.0.0"), vec![req("bob", "*")])
            .build();

        let root = VersionKey::concrete(pkg("alice"), "1.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        let bob = graph.nodes.iter().find(|n| n.version.package.name == "bob").unwrap();
        assert_eq!(bob.version.version, "1.0.0");
    }

    #[test]
    fn a_blocked_latest_is_not_promoted() {
        let mut tagged = concrete("bob", "1.0.0");
        tagged.attrs.set(VerKey::Tags, "latest");
        tagged.attrs.set_flag(VerKey::Blocked, true);
        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_version(tagged)
            .add_version(concrete("bob", "2.0.0"))
            .add_requirements(VersionKey::concrete(pkg("alice"), "1.0.0"), vec![req("bob", "*")])
            .build();

        let root = VersionKey::concrete(pkg("alice"), "1.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        let bob = graph.nodes.iter().find(|n| n.version.package.name == "bob").unwrap();
        assert_eq!(bob.version.version, "2.0.0");
    }

    /// §4.7 "Bundles": a package bundled inside the root's tarball is
    /// injected as a synthetic tree child before the root is processed,
    /// and the root's own requirement on the same package reuses it
    /// instead of installing a second copy.
    #[test]
    fn a_satisfying_bundled_dependency_is_reused() {
        let mut bundled_bob = Version::new(
            VersionKey::concrete(pkg("alice>1.0.0>node_modules/bob"), "1.0.0"),
            VersionAttrs::default(),
        );
        bundled_bob.attrs.set(VerKey::DerivedFrom, "bob");

        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_version(concrete("bob", "1.0.0"))
            .add_requirements(VersionKey::concrete(pkg("alice"), "1.0.0"), vec![req("bob", "^1.0.0")])
            .add_bundled(VersionKey::concrete(pkg("alice"), "1.0.0"), bundled_bob)
            .build();

        let root = VersionKey::concrete(pkg("alice"), "1.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        let bob_nodes: Vec<_> = graph.nodes.iter().filter(|n| n.version.package.name == "bob").collect();
        assert_eq!(bob_nodes.len(), 1, "the bundled bob is reused, not reinstalled");
        assert_eq!(bob_nodes[0].version.version, "1.0.0");
        assert_eq!(graph.error, None);
    }

    /// A bundled dependency whose version does not satisfy the root's
    /// requirement is deleted from its slot and a freshly resolved
    /// version installs there instead (§4.7 step 2b).
    #[test]
    fn a_non_satisfying_bundled_dependency_is_replaced() {
        let mut bundled_bob = Version::new(
            VersionKey::concrete(pkg("alice>1.0.0>node_modules/bob"), "1.0.0"),
            VersionAttrs::default(),
        );
        bundled_bob.attrs.set(VerKey::DerivedFrom, "bob");

        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_version(concrete("bob", "1.0.0"))
            .add_version(concrete("bob", "2.0.0"))
            .add_requirements(VersionKey::concrete(pkg("alice"), "1.0.0"), vec![req("bob", "^2.0.0")])
            .add_bundled(VersionKey::concrete(pkg("alice"), "1.0.0"), bundled_bob)
            .build();

        let root = VersionKey::concrete(pkg("alice"), "1.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        let bob_nodes: Vec<_> = graph.nodes.iter().filter(|n| n.version.package.name == "bob").collect();
        assert_eq!(bob_nodes.len(), 1);
        assert_eq!(bob_nodes[0].version.version, "2.0.0");
        assert!(
            graph.error.as_ref().is_some_and(|e| e.contains("unused bundled version")),
            "the replaced bundled node was never selected: {:?}",
            graph.error
        );
    }

    /// A bundled dependency that nothing ever requires is reported as an
    /// unused bundled version (§4.7 step 3).
    #[test]
    fn an_unreferenced_bundled_dependency_is_reported_unused() {
        let mut bundled_left_pad = Version::new(
            VersionKey::concrete(pkg("alice>1.0.0>node_modules/left-pad"), "1.0.0"),
            VersionAttrs::default(),
        );
        bundled_left_pad.attrs.set(VerKey::DerivedFrom, "left-pad");

        let source = LocalDataSource::builder(Ecosystem::Npm, Arc::new(NpmSemver))
            .add_version(concrete("alice", "1.0.0"))
            .add_bundled(VersionKey::concrete(pkg("alice"), "1.0.0"), bundled_left_pad)
            .build();

        let root = VersionKey::concrete(pkg("alice"), "1.0.0");
        let graph = NpmResolver
            .resolve(&source, &root, &CancellationToken::new())
            .unwrap();

        assert!(graph.error.as_ref().is_some_and(|e| e.contains("unused bundled version")));
    }
}
