//! Dependency graph over the objects of one package.
//!
//! An edge `A → B` means "A depends on B" (A references B). Edges come from:
//!
//! - process model nodes: `interface_uuid` links and named references in
//!   node scripts;
//! - named references in an object's `code` (`rule!Name`, `cons!Name`,
//!   `recordType!Name` by default);
//! - record type relationships (`target_uuid`).
//!
//! Named references resolve through a [`NameIndex`] built once per package.
//! References that do not resolve are left out of the graph and kept as
//! [`UnresolvedReference`] diagnostics. The graph may contain cycles,
//! including self-references; ordering handles them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ReferenceSite, UnresolvedReference};
use crate::model::{NameIndex, Object, ObjectId, Package};

/// Reference prefixes scanned by default.
pub const DEFAULT_REFERENCE_PREFIXES: [&str; 3] = ["rule!", "cons!", "recordType!"];

// ---------------------------------------------------------------------------
// GraphOptions
// ---------------------------------------------------------------------------

/// Knobs for graph construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphOptions {
    /// Token prefixes that introduce a named reference in code.
    pub reference_prefixes: Vec<String>,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            reference_prefixes: DEFAULT_REFERENCE_PREFIXES
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// DependencyGraph
// ---------------------------------------------------------------------------

/// UUID → list of UUIDs it depends on.
///
/// Every object of the source package(s) is a key, possibly with an empty
/// list. Each adjacency list is duplicate-free and keeps first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    edges: BTreeMap<ObjectId, Vec<ObjectId>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unresolved: Vec<UnresolvedReference>,
}

/// Direct neighbours of one object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Dependencies {
    /// Objects this object depends on, in adjacency order.
    pub parents: Vec<ObjectId>,
    /// Objects that depend on this object, in UUID order.
    pub children: Vec<ObjectId>,
}

impl DependencyGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no edges (no-op if present).
    pub fn add_node(&mut self, uuid: ObjectId) {
        self.edges.entry(uuid).or_default();
    }

    /// Add `dependent → dependency`. Both endpoints become nodes; a repeated
    /// edge is ignored.
    pub fn add_edge(&mut self, dependent: ObjectId, dependency: ObjectId) {
        self.add_node(dependency.clone());
        let list = self.edges.entry(dependent).or_default();
        if !list.contains(&dependency) {
            list.push(dependency);
        }
    }

    /// Build a graph from an edge list (for tests and tooling).
    #[must_use]
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (ObjectId, ObjectId)>,
    {
        let mut graph = Self::new();
        for (dependent, dependency) in edges {
            graph.add_edge(dependent, dependency);
        }
        graph
    }

    /// Direct dependencies of `uuid` (empty if unknown).
    #[must_use]
    pub fn dependencies_of(&self, uuid: &ObjectId) -> &[ObjectId] {
        self.edges.get(uuid).map(Vec::as_slice).unwrap_or_default()
    }

    /// Objects whose adjacency list contains `uuid`, in UUID order.
    #[must_use]
    pub fn dependents_of(&self, uuid: &ObjectId) -> Vec<&ObjectId> {
        self.edges
            .iter()
            .filter(|(_, deps)| deps.contains(uuid))
            .map(|(from, _)| from)
            .collect()
    }

    /// Returns `true` if `dependent → dependency` is an edge.
    #[must_use]
    pub fn has_edge(&self, dependent: &ObjectId, dependency: &ObjectId) -> bool {
        self.dependencies_of(dependent).contains(dependency)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Iterate `(uuid, dependencies)` in UUID order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &[ObjectId])> {
        self.edges.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// References that could not be resolved while building this graph.
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Combine two graphs.
    ///
    /// Adjacency lists keep `self`'s order, followed by edges only `other`
    /// has. Unresolved diagnostics are concatenated and deduplicated.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for (from, deps) in &other.edges {
            merged.add_node(from.clone());
            for dep in deps {
                merged.add_edge(from.clone(), dep.clone());
            }
        }
        merged.unresolved.extend(other.unresolved.iter().cloned());
        merged.unresolved.sort();
        merged.unresolved.dedup();
        merged
    }
}

/// Parents (direct dependencies) and children (direct dependents) of `uuid`.
#[must_use]
pub fn get_dependencies(uuid: &ObjectId, graph: &DependencyGraph) -> Dependencies {
    Dependencies {
        parents: graph.dependencies_of(uuid).to_vec(),
        children: graph.dependents_of(uuid).into_iter().cloned().collect(),
    }
}

// ---------------------------------------------------------------------------
// build_graph
// ---------------------------------------------------------------------------

/// Build the dependency graph of one package.
#[must_use]
pub fn build_graph(package: &Package, options: &GraphOptions) -> DependencyGraph {
    let names = package.name_index();
    let mut graph = DependencyGraph::new();

    for obj in package.objects() {
        graph.add_node(obj.uuid.clone());
        collect_object_edges(obj, package, &names, options, &mut graph);
    }

    for unresolved in &graph.unresolved {
        tracing::debug!(
            from = %unresolved.from,
            reference = %unresolved.reference,
            site = %unresolved.site,
            "reference not resolved; omitted from dependency graph"
        );
    }
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        unresolved = graph.unresolved.len(),
        "dependency graph built"
    );

    graph
}

fn collect_object_edges(
    obj: &Object,
    package: &Package,
    names: &NameIndex,
    options: &GraphOptions,
    graph: &mut DependencyGraph,
) {
    // Process model nodes first: they are the primary structure of a model.
    for node in obj.nodes() {
        if let Some(target) = &node.interface_uuid {
            if package.contains(target) {
                graph.add_edge(obj.uuid.clone(), target.clone());
            } else {
                graph.unresolved.push(UnresolvedReference {
                    from: obj.uuid.clone(),
                    reference: target.to_string(),
                    site: ReferenceSite::NodeInterface {
                        node_uuid: node.node_uuid.clone(),
                    },
                });
            }
        }
        if let Some(script) = &node.script {
            let site = ReferenceSite::NodeScript {
                node_uuid: node.node_uuid.clone(),
            };
            resolve_named(obj, script, &site, names, options, graph);
        }
    }

    if let Some(code) = &obj.code {
        resolve_named(obj, code, &ReferenceSite::Code, names, options, graph);
    }

    if let Some(record) = obj.record_type() {
        for rel in &record.relationships {
            if package.contains(&rel.target_uuid) {
                graph.add_edge(obj.uuid.clone(), rel.target_uuid.clone());
            } else {
                graph.unresolved.push(UnresolvedReference {
                    from: obj.uuid.clone(),
                    reference: rel.target_uuid.to_string(),
                    site: ReferenceSite::Relationship {
                        name: rel.name.clone(),
                    },
                });
            }
        }
    }
}

fn resolve_named(
    obj: &Object,
    text: &str,
    site: &ReferenceSite,
    names: &NameIndex,
    options: &GraphOptions,
    graph: &mut DependencyGraph,
) {
    for token in scan_references(text, &options.reference_prefixes) {
        if let Some(target) = names.resolve(token.name) {
            graph.add_edge(obj.uuid.clone(), target.clone());
        } else {
            let reference = format!("{}{}", token.prefix, token.name);
            let already = graph
                .unresolved
                .iter()
                .any(|u| u.from == obj.uuid && u.reference == reference && &u.site == site);
            if !already {
                graph.unresolved.push(UnresolvedReference {
                    from: obj.uuid.clone(),
                    reference,
                    site: site.clone(),
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Reference scanning
// ---------------------------------------------------------------------------

/// One named reference found in text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReferenceToken<'a> {
    /// The prefix that introduced it (e.g. `"rule!"`).
    pub prefix: &'a str,
    /// The referenced name.
    pub name: &'a str,
    /// Byte offset of the prefix in the scanned text.
    pub offset: usize,
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Find every `<prefix><Name>` token in `text`, in textual order.
///
/// A prefix only counts when it does not continue an identifier (so
/// `subrule!x` is not a `rule!` reference). Names are runs of ASCII letters,
/// digits and underscores; an empty name is ignored.
#[must_use]
pub fn scan_references<'a>(text: &'a str, prefixes: &'a [String]) -> Vec<ReferenceToken<'a>> {
    let mut tokens = Vec::new();

    for prefix in prefixes {
        if prefix.is_empty() {
            continue;
        }
        for (offset, _) in text.match_indices(prefix.as_str()) {
            let continues_identifier = text[..offset]
                .chars()
                .next_back()
                .is_some_and(is_name_char);
            if continues_identifier {
                continue;
            }
            let rest = &text[offset + prefix.len()..];
            let end = rest.find(|c: char| !is_name_char(c)).unwrap_or(rest.len());
            if end == 0 {
                continue;
            }
            tokens.push(ReferenceToken {
                prefix: prefix.as_str(),
                name: &rest[..end],
                offset,
            });
        }
    }

    tokens.sort_by_key(|t| t.offset);
    tokens
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
