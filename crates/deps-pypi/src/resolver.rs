//! The PyPI backtracking resolver (§4.9), following pip's `resolvelib`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use deps_core::cache::DEFAULT_CACHE_CAPACITY;
use deps_core::{
    CancellationToken, CoreError, DepKey, Ecosystem, LruCache, PackageDataSource, PackageKey,
    RequirementVersion, Resolver, ResolvedGraph, SemverSystem, Version, VersionKey, VersionType,
    matching,
};

use crate::error::Result as PypiResult;
use crate::marker::{self, Marker};

const MAX_ROUNDS: usize = 200_000;

/// Explicit, `Default`-constructible configuration for [`PypiResolver`],
/// mirroring the teacher's `EcosystemConfig` pattern rather than reading
/// environment variables.
#[derive(Debug, Clone)]
pub struct PypiResolveOptions {
    /// Backtracking round budget (§4.9, §8's excessive-backtracking
    /// scenario); exceeding it yields `Graph.Error`, not a failure.
    pub max_rounds: usize,
}

impl Default for PypiResolveOptions {
    fn default() -> Self {
        Self { max_rounds: MAX_ROUNDS }
    }
}

#[derive(Debug, Clone)]
struct Criterion {
    requirements: Vec<RequirementVersion>,
    parents: Vec<Option<VersionKey>>,
    extras: Vec<String>,
    incompatibilities: HashSet<VersionKey>,
    candidates: Vec<VersionKey>,
}

impl Criterion {
    fn admits(&self, pin: &VersionKey) -> bool {
        self.candidates.contains(pin)
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    mapping: Vec<(PackageKey, VersionKey)>,
    criteria: Vec<(PackageKey, Criterion)>,
    /// The (package, pin) decision that produced this state by pushing it
    /// onto the stack, used by backtracking to find the failed pin.
    decision: Option<(PackageKey, VersionKey)>,
}

impl State {
    fn pin(&self, pkg: &PackageKey) -> Option<&VersionKey> {
        self.mapping.iter().find(|(p, _)| p == pkg).map(|(_, v)| v)
    }

    fn set_pin(&mut self, pkg: PackageKey, version: VersionKey) {
        if let Some(entry) = self.mapping.iter_mut().find(|(p, _)| *p == pkg) {
            entry.1 = version;
        } else {
            self.mapping.push((pkg, version));
        }
    }

    fn criterion(&self, pkg: &PackageKey) -> Option<&Criterion> {
        self.criteria.iter().find(|(p, _)| p == pkg).map(|(_, c)| c)
    }

    fn set_criterion(&mut self, pkg: PackageKey, criterion: Criterion) {
        if let Some(entry) = self.criteria.iter_mut().find(|(p, _)| *p == pkg) {
            entry.1 = criterion;
        } else {
            self.criteria.push((pkg, criterion));
        }
    }
}

/// The PyPI resolver. Owns LRU caches (§4.9, bounded at 10 000 each) for
/// parsed markers, the admits-prerelease test per requirement text, and
/// prerelease-inclusive match results.
#[derive(Debug)]
pub struct PypiResolver {
    options: PypiResolveOptions,
    marker_cache: RefCell<LruCache<String, Marker>>,
    admits_prerelease_cache: RefCell<LruCache<String, bool>>,
    prerelease_match_cache: RefCell<LruCache<(String, String), bool>>,
}

impl Default for PypiResolver {
    fn default() -> Self {
        Self::with_options(PypiResolveOptions::default())
    }
}

impl PypiResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: PypiResolveOptions) -> Self {
        Self {
            options,
            marker_cache: RefCell::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
            admits_prerelease_cache: RefCell::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
            prerelease_match_cache: RefCell::new(LruCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    fn cached_marker(&self, text: &str) -> PypiResult<Marker> {
        if let Some(m) = self.marker_cache.borrow_mut().get(&text.to_string()) {
            return Ok(m.clone());
        }
        let parsed = marker::parse(text)?;
        self.marker_cache
            .borrow_mut()
            .insert(text.to_string(), parsed.clone());
        Ok(parsed)
    }

    fn cached_admits_prerelease(&self, semver: &dyn SemverSystem, requirement: &str) -> bool {
        if let Some(&cached) = self.admits_prerelease_cache.borrow_mut().get(&requirement.to_string()) {
            return cached;
        }
        let result = admits_prerelease(semver, requirement);
        self.admits_prerelease_cache
            .borrow_mut()
            .insert(requirement.to_string(), result);
        result
    }

    fn cached_prerelease_match(&self, semver: &dyn SemverSystem, requirement: &str, version: &str) -> bool {
        let key = (requirement.to_string(), version.to_string());
        if let Some(&cached) = self.prerelease_match_cache.borrow_mut().get(&key) {
            return cached;
        }
        let result = semver.matches_prerelease(requirement, version);
        self.prerelease_match_cache.borrow_mut().insert(key, result);
        result
    }

    /// The direct dependencies of `key`, filtered by PEP 508 markers
    /// against `extras`. Marker parse/eval failures drop the offending
    /// dependency rather than failing the whole resolve (§7).
    fn filtered_dependencies(
        &self,
        source: &dyn PackageDataSource,
        key: &VersionKey,
        root: &VersionKey,
        extras: &[String],
        cancel: &CancellationToken,
    ) -> deps_core::Result<Vec<RequirementVersion>> {
        let reqs = match source.requirements(key, cancel) {
            Ok(reqs) => reqs,
            Err(CoreError::NotFound(_)) if key != root => Vec::new(),
            Err(e) => return Err(e),
        };

        let extras: HashSet<String> = extras.iter().cloned().collect();
        let mut out = Vec::new();
        for req in reqs {
            let keep = match req.attrs.get(DepKey::Environment) {
                Some(marker_text) if !marker_text.trim().is_empty() => {
                    match self.cached_marker(marker_text) {
                        Ok(parsed) => match marker::eval(&parsed, &extras) {
                            Ok(b) => b,
                            Err(e) => {
                                tracing::warn!(marker = marker_text, error = %e, "skipping dependency with unevaluable marker");
                                false
                            }
                        },
                        Err(e) => {
                            tracing::warn!(marker = marker_text, error = %e, "skipping dependency with unparseable marker");
                            false
                        }
                    }
                }
                _ => true,
            };
            if keep {
                out.push(req);
            }
        }
        Ok(out)
    }

    /// Try to fold `req` (declared on `parent`, `None` for the root) into
    /// `state`'s criterion for its package. Returns `false` (without
    /// mutating `state`'s prior candidate set beyond recomputation) when
    /// the resulting candidate set is empty.
    fn merge_into_criterion(
        &self,
        state: &mut State,
        source: &dyn PackageDataSource,
        root: &VersionKey,
        req: &RequirementVersion,
        parent: Option<VersionKey>,
        cancel: &CancellationToken,
    ) -> deps_core::Result<bool> {
        let pkg = req.package().clone();
        let semver = source.semver();
        let existing = state.criterion(&pkg).cloned();

        let mut extras = existing.as_ref().map(|c| c.extras.clone()).unwrap_or_default();
        if let Some(enabled) = req.attrs.get(DepKey::EnabledDependencies) {
            for e in enabled.split(',') {
                let e = e.trim().to_string();
                if !e.is_empty() && !extras.contains(&e) {
                    extras.push(e);
                }
            }
        }

        let mut requirements = existing.as_ref().map(|c| c.requirements.clone()).unwrap_or_default();
        requirements.push(req.clone());
        let mut parents = existing.as_ref().map(|c| c.parents.clone()).unwrap_or_default();
        parents.push(parent);
        let incompatibilities = existing.as_ref().map(|c| c.incompatibilities.clone()).unwrap_or_default();

        let promote_prerelease = requirements.len() > 1
            && requirements
                .iter()
                .any(|r| self.cached_admits_prerelease(semver, r.requirement_str()));

        let candidates = if pkg == root.package {
            if requirements.iter().all(|r| req_matches_root(semver, r, root)) {
                vec![root.clone()]
            } else {
                Vec::new()
            }
        } else if promote_prerelease {
            let mut versions = source.versions(&pkg, cancel)?;
            matching::sort_versions(source.ecosystem(), semver, &mut versions);
            let mut sets: Vec<HashSet<VersionKey>> = Vec::new();
            for r in &requirements {
                let matched: HashSet<VersionKey> = versions
                    .iter()
                    .filter(|v| self.cached_prerelease_match(semver, r.requirement_str(), v.version_str()))
                    .map(|v| v.key.clone())
                    .collect();
                sets.push(matched);
            }
            intersect_ordered(&versions, &sets, &incompatibilities)
        } else {
            let mut sets: Vec<HashSet<VersionKey>> = Vec::new();
            let mut ordered: Vec<VersionKey> = Vec::new();
            for r in &requirements {
                let matched = source.matching_versions(&r.key, cancel)?;
                if ordered.is_empty() {
                    ordered = matched.iter().map(|v| v.key.clone()).collect();
                }
                sets.push(matched.into_iter().map(|v| v.key).collect());
            }
            let mut versions_key_order = ordered;
            for set in &sets {
                versions_key_order.retain(|k| set.contains(k));
            }
            versions_key_order.retain(|k| !incompatibilities.contains(k));
            versions_key_order
        };

        if candidates.is_empty() {
            return Ok(false);
        }

        state.set_criterion(
            pkg,
            Criterion {
                requirements,
                parents,
                extras,
                incompatibilities,
                candidates,
            },
        );
        Ok(true)
    }
}

fn req_matches_root(semver: &dyn SemverSystem, req: &RequirementVersion, root: &VersionKey) -> bool {
    let r = req.requirement_str();
    r == "*" || r == root.version || (semver.constraint_parseable(r) && semver.matches(r, &root.version))
}

/// Whether `requirement` has a pre-release lower bound (§4.9's trigger
/// for re-matching a criterion's requirements pre-release-inclusively).
fn admits_prerelease(semver: &dyn SemverSystem, requirement: &str) -> bool {
    requirement.split(',').any(|clause| {
        let operand = clause.trim().trim_start_matches(|c: char| matches!(c, '<' | '>' | '=' | '!' | '~'));
        semver.parseable(operand) && semver.is_prerelease(operand)
    })
}

fn intersect_ordered(
    versions: &[Version],
    sets: &[HashSet<VersionKey>],
    incompatibilities: &HashSet<VersionKey>,
) -> Vec<VersionKey> {
    versions
        .iter()
        .map(|v| v.key.clone())
        .filter(|k| sets.iter().all(|s| s.contains(k)))
        .filter(|k| !incompatibilities.contains(k))
        .collect()
}

/// (delayThis, restrictiveRating, order, name) — ascending order picks
/// the package a round should act on next.
fn preference_key(pkg: &PackageKey, criterion: &Criterion, user_requested: &[PackageKey]) -> (bool, u8, usize, String) {
    let delay_this = pkg.name.to_lowercase() == "setuptools";
    let restrictive = if criterion.requirements.iter().any(|r| r.requirement_str().contains("==")) {
        1
    } else if criterion.requirements.iter().any(|r| !r.requirement_str().is_empty()) {
        2
    } else {
        3
    };
    let order = user_requested.iter().position(|p| p == pkg).unwrap_or(usize::MAX);
    (delay_this, restrictive, order, pkg.name.clone())
}

impl Resolver for PypiResolver {
    fn resolve(
        &self,
        source: &dyn PackageDataSource,
        root: &VersionKey,
        cancel: &CancellationToken,
    ) -> deps_core::Result<ResolvedGraph> {
        if source.ecosystem() != Ecosystem::PyPI {
            return Err(CoreError::EcosystemMismatch {
                expected: "pypi",
                actual: source.ecosystem().to_string(),
            });
        }
        if root.version_type != VersionType::Concrete {
            return Err(CoreError::NotConcrete(root.to_string()));
        }

        let mut graph = ResolvedGraph::new();

        let root_reqs = self.filtered_dependencies(source, root, root, &[], cancel)?;
        let user_requested: Vec<PackageKey> = root_reqs.iter().map(|r| r.package().clone()).collect();

        let mut initial = State::default();
        initial.set_pin(root.package.clone(), root.clone());
        for req in &root_reqs {
            if !self.merge_into_criterion(&mut initial, source, root, req, None, cancel)? {
                graph.append_error("resolution impossible: a root requirement has no satisfying version");
                return Ok(graph);
            }
        }

        let mut stack = vec![initial.clone(), initial];

        let mut rounds = 0usize;
        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            rounds += 1;
            if rounds > self.options.max_rounds {
                graph.append_error("resolution impossible: exceeded the backtracking round limit");
                return Ok(graph);
            }

            let top = stack.last().expect("stack invariant: never empty");
            let unsatisfied: Vec<PackageKey> = top
                .criteria
                .iter()
                .filter(|(pkg, criterion)| match top.pin(pkg) {
                    Some(pin) => !criterion.admits(pin),
                    None => true,
                })
                .map(|(pkg, _)| pkg.clone())
                .collect();

            if unsatisfied.is_empty() {
                break;
            }

            let pkg = unsatisfied
                .iter()
                .min_by_key(|pkg| {
                    let criterion = top.criterion(pkg).expect("unsatisfied package has a criterion");
                    preference_key(pkg, criterion, &user_requested)
                })
                .expect("unsatisfied is non-empty")
                .clone();
            let criterion = top.criterion(&pkg).expect("picked package has a criterion").clone();

            let mut found = None;
            for candidate in criterion.candidates.iter().rev() {
                let mut scratch = top.clone();
                scratch.set_pin(pkg.clone(), candidate.clone());
                let extras = scratch.criterion(&pkg).map(|c| c.extras.clone()).unwrap_or_default();
                let deps = self.filtered_dependencies(source, candidate, root, &extras, cancel)?;

                let mut ok = true;
                for dep in &deps {
                    if !self.merge_into_criterion(&mut scratch, source, root, dep, Some(candidate.clone()), cancel)? {
                        ok = false;
                        break;
                    }
                }
                if ok {
                    scratch.decision = Some((pkg.clone(), candidate.clone()));
                    found = Some(scratch);
                    break;
                }
            }

            if let Some(next) = found {
                stack.push(next);
                continue;
            }

            // Backtrack. Retract the most recent decision by marking its
            // pin incompatible two states back; if that leaves some
            // criterion with no candidates left, the retracted state
            // itself becomes a dead end and the cascade continues
            // further up the stack. (Unlike a full resolvelib-style
            // incompatibility trace, the union below is not scoped to
            // the specific package that ran dry — a conflict local to
            // one branch can spuriously poison an unrelated criterion
            // carried by an ancestor state; see DESIGN.md.)
            let mut impossible = false;
            loop {
                if stack.len() < 3 {
                    impossible = true;
                    break;
                }
                let failed_state = stack.pop().expect("len >= 3");
                let mut base = stack.pop().expect("len >= 3").clone();
                let Some((failed_pkg, failed_pin)) = failed_state.decision.clone() else {
                    impossible = true;
                    break;
                };

                for (pkg, criterion) in &failed_state.criteria {
                    if let Some((_, existing)) = base.criteria.iter_mut().find(|(p, _)| p == pkg) {
                        for incompat in &criterion.incompatibilities {
                            existing.incompatibilities.insert(incompat.clone());
                        }
                    }
                }
                if let Some((_, c)) = base.criteria.iter_mut().find(|(p, _)| *p == failed_pkg) {
                    c.incompatibilities.insert(failed_pin);
                }
                for (_, criterion) in &mut base.criteria {
                    criterion.candidates.retain(|v| !criterion.incompatibilities.contains(v));
                }

                stack.push(base);
                if !stack
                    .last()
                    .expect("just pushed")
                    .criteria
                    .iter()
                    .any(|(_, c)| c.candidates.is_empty())
                {
                    break;
                }
            }
            if impossible {
                graph.append_error("resolution impossible: backtracking exhausted the state stack");
                return Ok(graph);
            }
        }

        let top = stack.last().expect("stack invariant: never empty");
        build_graph(root, &top.mapping, &top.criteria, &mut graph)?;
        graph.canon()?;
        Ok(graph)
    }
}

fn build_graph(
    root: &VersionKey,
    mapping: &[(PackageKey, VersionKey)],
    criteria: &[(PackageKey, Criterion)],
    graph: &mut ResolvedGraph,
) -> deps_core::Result<()> {
    let mut node_of: HashMap<VersionKey, usize> = HashMap::new();
    let root_id = graph.add_node(root.clone());
    node_of.insert(root.clone(), root_id);

    let mut queue = VecDeque::new();
    queue.push_back(root.clone());
    let mut added_edges: HashSet<(usize, usize, String)> = HashSet::new();

    while let Some(parent_pin) = queue.pop_front() {
        for (pkg, criterion) in criteria {
            let Some(pin) = mapping.iter().find(|(p, _)| p == pkg).map(|(_, v)| v.clone()) else {
                continue;
            };
            for (req, req_parent) in criterion.requirements.iter().zip(criterion.parents.iter()) {
                let matches_parent = match req_parent {
                    Some(p) => *p == parent_pin,
                    None => parent_pin == *root,
                };
                if !matches_parent {
                    continue;
                }
                let is_new = !node_of.contains_key(&pin);
                let to = *node_of.entry(pin.clone()).or_insert_with(|| graph.add_node(pin.clone()));
                let from = node_of[&parent_pin];
                let edge_key = (from, to, req.requirement_str().to_string());
                if added_edges.insert(edge_key) {
                    graph.add_edge(from, to, req.requirement_str(), req.attrs.clone())?;
                }
                if is_new {
                    queue.push_back(pin.clone());
                }
            }
        }
    }
    Ok(())
}
