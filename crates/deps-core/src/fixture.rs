//! The schema/test fixture text format (§4.10): a small line-oriented
//! DSL describing a package universe plus the graph text a resolver run
//! against it is expected to produce.
//!
//! ```text
//! ecosystem npm
//! root left-pad 1.0.0
//!
//! pkg left-pad 1.0.0
//! dep left-pad@1.0.0 foo ^1.0.0
//!   flag dev
//! pkg foo 1.0.0
//!
//! expect
//! $0 npm:left-pad@1.0.0
//! └─$1 npm:foo@1.0.0
//! ```
//!
//! Lines are one of: `ecosystem <name>`, `root <name> <version>`,
//! `pkg <name> <version>`, `dep <name>@<version> <depname> <requirement>`,
//! a following indented `flag <name>` / `attr <key> <value>` attaching to
//! the most recent `pkg`/`dep` line, a blank or `#`-comment line, and a
//! terminal `expect` line after which every remaining line is taken
//! verbatim as the expected `ResolvedGraph::to_text()` output.
//!
//! `parse_graph_text` is the inverse of that last piece: it parses an
//! `expect` block (or any `ResolvedGraph::to_text()` output) back into a
//! `ResolvedGraph`, so the text form round-trips.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::graph::ResolvedGraph;
use crate::ident::{
    DepKey, DependencyAttrs, Ecosystem, PackageKey, RequirementVersion, VerKey, Version,
    VersionAttrs, VersionKey,
};
use crate::semver_system::SemverSystem;
use crate::source::{LocalDataSource, LocalDataSourceBuilder};

/// A parsed fixture: the data source built from its universe, the
/// requested resolution root, and the raw expected graph text.
pub struct Fixture {
    pub source: LocalDataSource,
    pub root: VersionKey,
    pub expected: String,
}

enum Target {
    Version(usize),
    Dependency(usize, usize),
}

fn parse_err(line: usize, message: impl Into<String>) -> CoreError {
    CoreError::FixtureParse {
        line,
        message: message.into(),
    }
}

pub fn parse(text: &str, semver: Arc<dyn SemverSystem>) -> Result<Fixture> {
    let mut ecosystem: Option<Ecosystem> = None;
    let mut root: Option<(String, String)> = None;
    let mut versions: Vec<(PackageKey, String, VersionAttrs)> = Vec::new();
    let mut groups: Vec<(VersionKey, Vec<RequirementVersion>)> = Vec::new();
    let mut target: Option<Target> = None;
    let mut expect_lines: Vec<&str> = Vec::new();
    let mut in_expect = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = idx + 1;
        if in_expect {
            expect_lines.push(raw_line);
            continue;
        }

        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if raw_line.starts_with(' ') || raw_line.starts_with('\t') {
            let mut parts = trimmed.split_whitespace();
            let kind = parts.next().ok_or_else(|| parse_err(line, "empty indented line"))?;
            match kind {
                "flag" => {
                    let name = parts
                        .next()
                        .ok_or_else(|| parse_err(line, "flag missing name"))?;
                    apply_flag(&mut versions, &mut groups, &target, name, line)?;
                }
                "attr" => {
                    let key = parts
                        .next()
                        .ok_or_else(|| parse_err(line, "attr missing key"))?;
                    let value: Vec<&str> = parts.collect();
                    if value.is_empty() {
                        return Err(parse_err(line, "attr missing value"));
                    }
                    apply_attr(&mut versions, &mut groups, &target, key, &value.join(" "), line)?;
                }
                other => return Err(parse_err(line, format!("unknown indented directive '{other}'"))),
            }
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let kind = parts.next().ok_or_else(|| parse_err(line, "empty line"))?;
        match kind {
            "ecosystem" => {
                let name = parts
                    .next()
                    .ok_or_else(|| parse_err(line, "ecosystem missing name"))?;
                ecosystem = Some(parse_ecosystem(name, line)?);
            }
            "root" => {
                let name = parts.next().ok_or_else(|| parse_err(line, "root missing name"))?;
                let version = parts
                    .next()
                    .ok_or_else(|| parse_err(line, "root missing version"))?;
                root = Some((name.to_string(), version.to_string()));
            }
            "pkg" => {
                let eco = ecosystem.ok_or_else(|| parse_err(line, "'pkg' before 'ecosystem'"))?;
                let name = parts.next().ok_or_else(|| parse_err(line, "pkg missing name"))?;
                let version = parts
                    .next()
                    .ok_or_else(|| parse_err(line, "pkg missing version"))?;
                versions.push((PackageKey::new(eco, name), version.to_string(), VersionAttrs::new()));
                target = Some(Target::Version(versions.len() - 1));
            }
            "dep" => {
                let eco = ecosystem.ok_or_else(|| parse_err(line, "'dep' before 'ecosystem'"))?;
                let from = parts.next().ok_or_else(|| parse_err(line, "dep missing source"))?;
                let (from_name, from_version) = split_at_version(from, line)?;
                let to_name = parts
                    .next()
                    .ok_or_else(|| parse_err(line, "dep missing target name"))?;
                let requirement = parts
                    .next()
                    .ok_or_else(|| parse_err(line, "dep missing requirement"))?;

                let from_key = VersionKey::concrete(PackageKey::new(eco, from_name), from_version);
                let group_idx = match groups.iter().position(|(k, _)| *k == from_key) {
                    Some(i) => i,
                    None => {
                        groups.push((from_key, Vec::new()));
                        groups.len() - 1
                    }
                };
                let req = RequirementVersion::new(
                    VersionKey::requirement(PackageKey::new(eco, to_name), requirement),
                    DependencyAttrs::new(),
                );
                groups[group_idx].1.push(req);
                target = Some(Target::Dependency(group_idx, groups[group_idx].1.len() - 1));
            }
            "expect" => in_expect = true,
            other => return Err(parse_err(line, format!("unknown directive '{other}'"))),
        }
    }

    let ecosystem = ecosystem.ok_or_else(|| parse_err(0, "missing 'ecosystem' directive"))?;
    let (root_name, root_version) = root.ok_or_else(|| parse_err(0, "missing 'root' directive"))?;
    let root_key = VersionKey::concrete(PackageKey::new(ecosystem, root_name), root_version);

    let mut builder = LocalDataSource::builder(ecosystem, semver);
    for (package, version, attrs) in versions {
        builder = builder.add_version(Version::new(VersionKey::concrete(package, version), attrs));
    }
    for (key, reqs) in groups {
        builder = builder.add_requirements(key, reqs);
    }

    Ok(Fixture {
        source: builder.build(),
        root: root_key,
        expected: expect_lines.join("\n"),
    })
}

fn split_at_version(s: &str, line: usize) -> Result<(&str, &str)> {
    s.split_once('@')
        .ok_or_else(|| parse_err(line, format!("expected 'name@version', got '{s}'")))
}

fn parse_ecosystem(name: &str, line: usize) -> Result<Ecosystem> {
    match name {
        "npm" => Ok(Ecosystem::Npm),
        "maven" => Ok(Ecosystem::Maven),
        "pypi" => Ok(Ecosystem::PyPI),
        "unknown" => Ok(Ecosystem::Unknown),
        other => Err(parse_err(line, format!("unknown ecosystem '{other}'"))),
    }
}

fn dep_flag_key(name: &str, line: usize) -> Result<DepKey> {
    match name {
        "dev" => Ok(DepKey::Dev),
        "opt" => Ok(DepKey::Opt),
        "test" => Ok(DepKey::Test),
        other => Err(parse_err(line, format!("'{other}' is not a dependency flag"))),
    }
}

fn dep_attr_key(name: &str, line: usize) -> Result<DepKey> {
    match name {
        "xtest" => Ok(DepKey::XTest),
        "framework" => Ok(DepKey::Framework),
        "scope" => Ok(DepKey::Scope),
        "maven_classifier" => Ok(DepKey::MavenClassifier),
        "maven_artifact_type" => Ok(DepKey::MavenArtifactType),
        "maven_dependency_origin" => Ok(DepKey::MavenDependencyOrigin),
        "maven_exclusions" => Ok(DepKey::MavenExclusions),
        "enabled_dependencies" => Ok(DepKey::EnabledDependencies),
        "known_as" => Ok(DepKey::KnownAs),
        "environment" => Ok(DepKey::Environment),
        "selector" => Ok(DepKey::Selector),
        other => Err(parse_err(line, format!("'{other}' is not a dependency attribute"))),
    }
}

fn ver_flag_key(name: &str, line: usize) -> Result<VerKey> {
    match name {
        "blocked" => Ok(VerKey::Blocked),
        "deleted" => Ok(VerKey::Deleted),
        "error" => Ok(VerKey::Error),
        other => Err(parse_err(line, format!("'{other}' is not a version flag"))),
    }
}

fn ver_attr_key(name: &str, line: usize) -> Result<VerKey> {
    match name {
        "redirect" => Ok(VerKey::Redirect),
        "features" => Ok(VerKey::Features),
        "derived_from" => Ok(VerKey::DerivedFrom),
        "registries" => Ok(VerKey::Registries),
        "tags" => Ok(VerKey::Tags),
        "ident" => Ok(VerKey::Ident),
        "created" => Ok(VerKey::Created),
        other => Err(parse_err(line, format!("'{other}' is not a version attribute"))),
    }
}

fn apply_flag(
    versions: &mut [(PackageKey, String, VersionAttrs)],
    groups: &mut [(VersionKey, Vec<RequirementVersion>)],
    target: &Option<Target>,
    name: &str,
    line: usize,
) -> Result<()> {
    match target {
        Some(Target::Version(i)) => {
            let key = ver_flag_key(name, line)?;
            versions[*i].2.set_flag(key, true);
            Ok(())
        }
        Some(Target::Dependency(g, i)) => {
            let key = dep_flag_key(name, line)?;
            groups[*g].1[*i].attrs.set_flag(key, true);
            Ok(())
        }
        None => Err(parse_err(line, "flag with no preceding 'pkg'/'dep' line")),
    }
}

fn apply_attr(
    versions: &mut [(PackageKey, String, VersionAttrs)],
    groups: &mut [(VersionKey, Vec<RequirementVersion>)],
    target: &Option<Target>,
    key: &str,
    value: &str,
    line: usize,
) -> Result<()> {
    match target {
        Some(Target::Version(i)) => {
            let k = ver_attr_key(key, line)?;
            versions[*i].2.set(k, value);
            Ok(())
        }
        Some(Target::Dependency(g, i)) => {
            let k = dep_attr_key(key, line)?;
            groups[*g].1[*i].attrs.set(k, value);
            Ok(())
        }
        None => Err(parse_err(line, "attr with no preceding 'pkg'/'dep' line")),
    }
}

/// The inverse of `ResolvedGraph::to_text()` (§4.2, §6): parses the
/// spanning-tree text form back into a `ResolvedGraph`. Edge
/// `requirement` text and dependency attrs are only ever shown in the
/// text form for back-reference edges (`$N@requirement`); a creating
/// edge's requirement is not recoverable from the text and is left
/// empty, which is harmless since `to_text()` never reads it either —
/// re-rendering the parsed graph reproduces the exact input text.
pub fn parse_graph_text(text: &str) -> Result<ResolvedGraph> {
    let mut lines: Vec<&str> = text.lines().collect();
    while matches!(lines.last(), Some(l) if l.trim().is_empty()) {
        lines.pop();
    }

    let mut graph_error = None;
    if let Some(last) = lines.last() {
        if let Some(rest) = last.strip_prefix("ERROR: ") {
            if !rest.contains(" (for ") {
                graph_error = Some(rest.to_string());
                lines.pop();
            }
        }
    }

    let mut graph = ResolvedGraph::new();
    if lines.is_empty() {
        graph.error = graph_error;
        return Ok(graph);
    }

    let (n, version_str) = parse_dollar_header(lines[0], 1)?;
    if n != 0 {
        return Err(parse_err(1, "the root node must be '$0'"));
    }
    let root_id = graph.add_node(parse_version_key(version_str, 1)?);
    let mut ids: HashMap<u64, usize> = HashMap::new();
    ids.insert(0, root_id);

    let mut pos = 1usize;
    parse_block(&lines, &mut pos, "", root_id, &mut graph, &mut ids)?;
    if pos != lines.len() {
        return Err(parse_err(pos + 1, "content after the graph was not consumed"));
    }

    graph.error = graph_error;
    Ok(graph)
}

/// Parse the lines belonging to `node`'s body (its own error lines, then
/// its child edges) at indentation `prefix`, advancing `*pos` past
/// everything consumed.
fn parse_block(
    lines: &[&str],
    pos: &mut usize,
    prefix: &str,
    node: usize,
    graph: &mut ResolvedGraph,
    ids: &mut HashMap<u64, usize>,
) -> Result<()> {
    while *pos < lines.len() {
        let line = lines[*pos];
        let Some(rest) = line.strip_prefix(prefix) else {
            break;
        };
        let Some(msg) = rest.strip_prefix("ERROR: ") else {
            break;
        };
        let (message, requirement) = split_node_error(msg, *pos + 1)?;
        graph.add_error(node, requirement, message);
        *pos += 1;
    }

    while *pos < lines.len() {
        let line = lines[*pos];
        let line_no = *pos + 1;
        let Some(rest) = line.strip_prefix(prefix) else {
            break;
        };
        let (last, rest) = if let Some(r) = rest.strip_prefix("└─") {
            (true, r)
        } else if let Some(r) = rest.strip_prefix("├─") {
            (false, r)
        } else {
            break;
        };

        let child_prefix = format!("{prefix}{}", if last { "  " } else { "│ " });
        *pos += 1;

        let after_dollar = rest
            .strip_prefix('$')
            .ok_or_else(|| parse_err(line_no, format!("expected a child reference, got '{line}'")))?;
        let digits_end = after_dollar
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| parse_err(line_no, format!("malformed child line '{line}'")))?;
        let (n_str, tail) = after_dollar.split_at(digits_end);
        let n: u64 = n_str
            .parse()
            .map_err(|_| parse_err(line_no, format!("'{n_str}' is not a node index")))?;

        if let Some(req) = tail.strip_prefix('@') {
            // Back-reference: edge into an already-created node.
            let target = *ids
                .get(&n)
                .ok_or_else(|| parse_err(line_no, format!("back-reference to unknown node '${n}'")))?;
            graph.add_edge(node, target, req, DependencyAttrs::default())?;
        } else if let Some(version_str) = tail.strip_prefix(' ') {
            // Creating edge: a new node, rendered inline.
            let child = graph.add_node(parse_version_key(version_str, line_no)?);
            ids.insert(n, child);
            graph.add_edge(node, child, "", DependencyAttrs::default())?;
            parse_block(lines, pos, &child_prefix, child, graph, ids)?;
        } else {
            return Err(parse_err(line_no, format!("malformed child line '{line}'")));
        }
    }
    Ok(())
}

/// Split a `"$N <version>"` line into its node index and version text.
fn parse_dollar_header(s: &str, line: usize) -> Result<(u64, &str)> {
    let rest = s
        .strip_prefix('$')
        .ok_or_else(|| parse_err(line, format!("expected '$N ...', got '{s}'")))?;
    let (n, version_str) = rest
        .split_once(' ')
        .ok_or_else(|| parse_err(line, format!("expected '$N <version>', got '{s}'")))?;
    let n: u64 = n
        .parse()
        .map_err(|_| parse_err(line, format!("'{n}' is not a node index")))?;
    Ok((n, version_str))
}

/// Split `"{message} (for {requirement})"` as rendered by
/// `ResolvedGraph::to_text`.
fn split_node_error(s: &str, line: usize) -> Result<(&str, &str)> {
    let (message, rest) = s
        .rsplit_once(" (for ")
        .ok_or_else(|| parse_err(line, format!("expected '<message> (for <requirement>)', got '{s}'")))?;
    let requirement = rest
        .strip_suffix(')')
        .ok_or_else(|| parse_err(line, format!("unterminated requirement in '{s}'")))?;
    Ok((message, requirement))
}

/// Parse `"{ecosystem}:{name}@{version}"` (`VersionKey`'s `Display`).
/// `rsplit_once('@')` is deliberate: npm scoped names (`@scope/name`)
/// contain a leading `@` of their own, but never inside the version.
fn parse_version_key(s: &str, line: usize) -> Result<VersionKey> {
    let (eco_str, rest) = s
        .split_once(':')
        .ok_or_else(|| parse_err(line, format!("expected 'ecosystem:name@version', got '{s}'")))?;
    let ecosystem = parse_ecosystem(eco_str, line)?;
    let (name, version) = rest
        .rsplit_once('@')
        .ok_or_else(|| parse_err(line, format!("expected 'ecosystem:name@version', got '{s}'")))?;
    Ok(VersionKey::concrete(PackageKey::new(ecosystem, name), version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResolvedGraph;
    use crate::resolver::CancellationToken;
    use std::cmp::Ordering;

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

    const FIXTURE: &str = "\
ecosystem npm
root left-pad 1.0.0

pkg left-pad 1.0.0
dep left-pad@1.0.0 foo ^1.0.0
  flag dev
pkg foo 1.0.0
  attr tags latest

expect
$0 npm:left-pad@1.0.0
└─$1 npm:foo@1.0.0
";

    #[test]
    fn parses_universe_and_expected_text() {
        let fx = parse(FIXTURE, Arc::new(ToySemver)).unwrap();
        assert_eq!(fx.root.package.name, "left-pad");
        assert!(fx.expected.starts_with("$0 npm:left-pad@1.0.0"));

        let token = CancellationToken::new();
        let foo_versions = fx
            .source
            .versions(&PackageKey::new(Ecosystem::Npm, "foo"), &token)
            .unwrap();
        assert_eq!(foo_versions.len(), 1);
        assert_eq!(foo_versions[0].attrs.get(VerKey::Tags), Some("latest"));

        let reqs = fx.source.requirements(&fx.root, &token).unwrap();
        assert_eq!(reqs.len(), 1);
        assert!(reqs[0].attrs.flag(DepKey::Dev));
    }

    #[test]
    fn matches_a_hand_built_graphs_to_text() {
        use crate::ident::DependencyAttrs;

        let mut g = ResolvedGraph::new();
        let root = g.add_node(VersionKey::concrete(
            PackageKey::new(Ecosystem::Npm, "left-pad"),
            "1.0.0",
        ));
        let foo = g.add_node(VersionKey::concrete(
            PackageKey::new(Ecosystem::Npm, "foo"),
            "1.0.0",
        ));
        g.add_edge(root, foo, "^1.0.0", DependencyAttrs::default()).unwrap();
        g.canon().unwrap();

        let fx = parse(FIXTURE, Arc::new(ToySemver)).unwrap();
        assert_eq!(fx.expected, g.to_text().trim_end());
    }

    #[test]
    fn rejects_unknown_directive() {
        let err = parse("ecosystem npm\nbogus thing\n", Arc::new(ToySemver)).unwrap_err();
        assert!(matches!(err, CoreError::FixtureParse { .. }));
    }

    /// Testable invariant 1 (§8): `G.Canon() == Canon(Parse(G.String()))`.
    /// Built by hand rather than through a resolver so the fixture covers
    /// a back-reference, a per-node error, and a graph-level error in one
    /// shape.
    #[test]
    fn graph_text_round_trips_through_the_schema_parser() {
        use crate::ident::DependencyAttrs;

        let mut g = ResolvedGraph::new();
        let root = g.add_node(VersionKey::concrete(PackageKey::new(Ecosystem::Npm, "alice"), "2.0.0"));
        let bob = g.add_node(VersionKey::concrete(PackageKey::new(Ecosystem::Npm, "bob"), "1.0.0"));
        let chuck = g.add_node(VersionKey::concrete(PackageKey::new(Ecosystem::Npm, "chuck"), "1.0.0"));
        g.add_edge(root, bob, "^1.0.0", DependencyAttrs::default()).unwrap();
        g.add_edge(root, chuck, "^1.0.0", DependencyAttrs::default()).unwrap();
        g.add_edge(chuck, bob, "^1.0.0", DependencyAttrs::default()).unwrap();
        g.add_error(chuck, "^99.0.0", "could not find a version satisfying the requirement");
        g.append_error("unused bundled version: npm:left-pad>1.0.0>x@1.0.0");
        g.canon().unwrap();

        let text = g.to_text();
        let reparsed = parse_graph_text(&text).unwrap();
        let mut reparsed = reparsed;
        reparsed.canon().unwrap();

        assert_eq!(text, reparsed.to_text());
    }

    #[test]
    fn parse_graph_text_handles_a_graph_level_error_with_no_nodes() {
        let g = parse_graph_text("ERROR: no root found\n").unwrap();
        assert!(g.nodes.is_empty());
        assert_eq!(g.error.as_deref(), Some("no root found"));
    }
}
