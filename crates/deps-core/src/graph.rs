//! The resolved dependency graph and its canonicalization (§4.2).

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::time::Duration;

use crate::error::{CoreError, Result};
use crate::ident::{DependencyAttrs, VersionKey};

/// A per-node resolution error: the requirement that triggered it and a
/// human-readable message (e.g. "could not find a version satisfying
/// ^99.0.0").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeError {
    pub requirement: String,
    pub message: String,
}

impl NodeError {
    pub fn new(requirement: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            message: message.into(),
        }
    }
}

/// One resolved package version in the graph. Node index 0 is always the
/// resolution root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub version: VersionKey,
    pub errors: Vec<NodeError>,
}

impl Node {
    fn sort_key(&self) -> (&VersionKey, &Vec<NodeError>) {
        (&self.version, &self.errors)
    }
}

/// A directed dependency edge from one resolved node to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub requirement: String,
    pub attrs: DependencyAttrs,
}

impl Edge {
    fn sort_key(&self) -> (usize, usize, &str, &DependencyAttrs) {
        (self.from, self.to, self.requirement.as_str(), &self.attrs)
    }
}

/// The output of a resolver: an ordered node list, an ordered edge list,
/// an optional graph-level error, and a measured duration.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ResolvedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its index. Callers are responsible for
    /// deduplication (typically via a `VersionKey -> NodeId` map owned by
    /// the resolver); the graph itself never merges nodes.
    pub fn add_node(&mut self, version: VersionKey) -> usize {
        self.nodes.push(Node {
            version,
            errors: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add an edge between two existing node indices.
    pub fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        requirement: impl Into<String>,
        attrs: DependencyAttrs,
    ) -> Result<()> {
        if from >= self.nodes.len() {
            return Err(CoreError::UnreachedNode(from));
        }
        if to >= self.nodes.len() {
            return Err(CoreError::UnreachedNode(to));
        }
        self.edges.push(Edge {
            from,
            to,
            requirement: requirement.into(),
            attrs,
        });
        Ok(())
    }

    /// Attach a per-node error.
    pub fn add_error(
        &mut self,
        node: usize,
        requirement: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.nodes[node]
            .errors
            .push(NodeError::new(requirement, message));
    }

    /// Append to the graph-level error string, joining with `"; "` if one
    /// is already present (used by the Maven multi-registry warning).
    pub fn append_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        match &mut self.error {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(&message);
            }
            None => self.error = Some(message),
        }
    }

    /// Canonicalize node and edge order for deterministic comparison
    /// (§4.2). Idempotent: calling this twice produces the same graph.
    pub fn canon(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.errors.sort();
        }

        let order = match self.try_simple_sort() {
            Some(order) => order,
            None => self.bfs_order()?,
        };
        self.renumber(&order);

        self.edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(())
    }

    fn try_simple_sort(&self) -> Option<Vec<usize>> {
        let n = self.nodes.len();
        if n == 0 {
            return Some(vec![]);
        }
        let mut rest: Vec<usize> = (1..n).collect();
        rest.sort_by(|&a, &b| self.nodes[a].sort_key().cmp(&self.nodes[b].sort_key()));
        for pair in rest.windows(2) {
            if self.nodes[pair[0]].sort_key() == self.nodes[pair[1]].sort_key() {
                return None;
            }
        }
        let mut order = vec![0];
        order.extend(rest);
        Some(order)
    }

    fn bfs_order(&self) -> Result<Vec<usize>> {
        let n = self.nodes.len();
        if n == 0 {
            return Ok(vec![]);
        }
        let mut order = vec![0];
        let mut visited = vec![false; n];
        visited[0] = true;
        let mut queue = VecDeque::new();
        queue.push_back(0usize);

        while let Some(cur) = queue.pop_front() {
            let mut targets: Vec<usize> = self
                .edges
                .iter()
                .filter(|e| e.from == cur)
                .map(|e| e.to)
                .collect();
            targets.sort_unstable();
            targets.dedup();
            let mut adjacents: Vec<usize> = targets.into_iter().filter(|&t| !visited[t]).collect();
            adjacents.sort_by(|&a, &b| self.nodes[a].sort_key().cmp(&self.nodes[b].sort_key()));

            for pair in adjacents.windows(2) {
                if self.nodes[pair[0]].sort_key() == self.nodes[pair[1]].sort_key() {
                    return Err(CoreError::DuplicateDirectDependency(
                        self.nodes[pair[0]].version.to_string(),
                    ));
                }
            }

            for t in adjacents {
                if !visited[t] {
                    visited[t] = true;
                    order.push(t);
                    queue.push_back(t);
                }
            }
        }

        if order.len() != n {
            let unreached = (0..n).find(|&i| !visited[i]).expect("order.len() != n");
            return Err(CoreError::UnreachedNode(unreached));
        }
        Ok(order)
    }

    fn renumber(&mut self, order: &[usize]) {
        let mut old_to_new = vec![0usize; self.nodes.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            old_to_new[old_idx] = new_idx;
        }
        let mut nodes = vec![
            Node {
                version: self.nodes[0].version.clone(),
                errors: Vec::new()
            };
            self.nodes.len()
        ];
        for (old_idx, new_idx) in old_to_new.iter().enumerate() {
            nodes[*new_idx] = self.nodes[old_idx].clone();
        }
        self.nodes = nodes;
        for edge in &mut self.edges {
            edge.from = old_to_new[edge.from];
            edge.to = old_to_new[edge.to];
        }
    }

    /// The index of the first inbound edge to each node, in current edge
    /// order — that edge forms the node's position in the spanning tree
    /// rendered by `to_text`.
    fn creating_edges(&self) -> Vec<Option<usize>> {
        let mut creating = vec![None; self.nodes.len()];
        for (ei, edge) in self.edges.iter().enumerate() {
            if creating[edge.to].is_none() {
                creating[edge.to] = Some(ei);
            }
        }
        creating
    }

    /// Render the canonical, schema-parser-reversible text form (§4.2,
    /// §6 "Graph serialization"): a spanning tree from node 0, with
    /// non-tree inbound edges rendered as `$N@requirement` back-references.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if self.nodes.is_empty() {
            if let Some(err) = &self.error {
                let _ = writeln!(out, "ERROR: {err}");
            }
            return out;
        }

        let creating = self.creating_edges();
        self.write_node(&mut out, 0, "", true, &creating);
        if let Some(err) = &self.error {
            let _ = writeln!(out, "ERROR: {err}");
        }
        out
    }

    fn write_node(
        &self,
        out: &mut String,
        node: usize,
        prefix: &str,
        is_root: bool,
        creating: &[Option<usize>],
    ) {
        if is_root {
            let _ = writeln!(out, "${node} {}", self.nodes[node].version);
        }
        for err in &self.nodes[node].errors {
            let _ = writeln!(out, "{prefix}ERROR: {} (for {})", err.message, err.requirement);
        }

        let mut out_edges: Vec<usize> = (0..self.edges.len())
            .filter(|&ei| self.edges[ei].from == node)
            .collect();
        out_edges.sort_by(|&a, &b| self.edges[a].sort_key().cmp(&self.edges[b].sort_key()));

        for (i, &ei) in out_edges.iter().enumerate() {
            let edge = &self.edges[ei];
            let last = i == out_edges.len() - 1;
            let connector = if last { "└─" } else { "├─" };
            let child_prefix = format!("{prefix}{}", if last { "  " } else { "│ " });

            if creating[edge.to] == Some(ei) {
                let _ = writeln!(
                    out,
                    "{prefix}{connector}${} {}",
                    edge.to, self.nodes[edge.to].version
                );
                self.write_node(out, edge.to, &child_prefix, false, creating);
            } else {
                let _ = writeln!(out, "{prefix}{connector}${}@{}", edge.to, edge.requirement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{DepKey, Ecosystem, PackageKey};

    fn vk(name: &str, version: &str) -> VersionKey {
        VersionKey::concrete(PackageKey::new(Ecosystem::Npm, name), version)
    }

    #[test]
    fn canon_is_idempotent() {
        let mut g = ResolvedGraph::new();
        let root = g.add_node(vk("alice", "2.0.0"));
        let bob1 = g.add_node(vk("bob", "1.0.0"));
        let chuck = g.add_node(vk("chuck", "1.0.0"));
        let bob2 = g.add_node(vk("bob", "2.0.0"));
        g.add_edge(root, bob1, "^1", DependencyAttrs::default()).unwrap();
        g.add_edge(root, chuck, "^1", DependencyAttrs::default()).unwrap();
        g.add_edge(chuck, bob2, "^2", DependencyAttrs::default()).unwrap();

        g.canon().unwrap();
        let once = g.to_text();
        g.canon().unwrap();
        let twice = g.to_text();
        assert_eq!(once, twice);
    }

    #[test]
    fn bfs_detects_duplicate_direct_dependency() {
        let mut g = ResolvedGraph::new();
        let root = g.add_node(vk("alice", "1.0.0"));
        // two nodes with identical (VersionKey, errors) reachable from root
        // at the same BFS level force the BFS fallback to fail, since the
        // simple-sort pass already ties on the same key.
        let a = g.add_node(vk("bob", "1.0.0"));
        let b = g.add_node(vk("bob", "1.0.0"));
        g.add_edge(root, a, "^1", DependencyAttrs::default()).unwrap();
        g.add_edge(root, b, "^1", DependencyAttrs::default()).unwrap();

        let err = g.canon().unwrap_err();
        assert!(matches!(err, CoreError::DuplicateDirectDependency(_)));
    }

    #[test]
    fn to_text_renders_back_reference_for_shared_dependency() {
        let mut g = ResolvedGraph::new();
        let root = g.add_node(vk("alice", "2.0.0"));
        let bob = g.add_node(vk("bob", "1.0.0"));
        let chuck = g.add_node(vk("chuck", "1.0.0"));
        g.add_edge(root, bob, "^1", DependencyAttrs::default()).unwrap();
        g.add_edge(root, chuck, "^1", DependencyAttrs::default()).unwrap();
        g.add_edge(chuck, bob, "^1", DependencyAttrs::default()).unwrap();
        g.canon().unwrap();
        let text = g.to_text();
        assert!(text.contains("$1@^1"), "back-reference missing:\n{text}");
    }

    #[test]
    fn renders_node_errors() {
        let mut g = ResolvedGraph::new();
        let root = g.add_node(vk("alice", "1.0.0"));
        g.add_error(root, "^99.0.0", "could not find a version");
        g.canon().unwrap();
        let text = g.to_text();
        assert!(text.contains("ERROR: could not find a version (for ^99.0.0)"));
    }
}
