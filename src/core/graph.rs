//! core::graph
//!
//! Dependency graph derived from the document registry.
//!
//! # Architecture
//!
//! The graph is a directed structure over document identifiers with two
//! edge kinds:
//! - **Structural**: child to parent, from the declared `parent` field
//! - **Referential**: document to dependency, from `depends_on` and
//!   cross-module inline references
//!
//! It is built once per run from the registry and is read-only afterwards,
//! so verification workers share it by reference.
//!
//! # Invariants
//!
//! - Only indexed documents are nodes; edges to unknown identifiers are
//!   kept as declarations but never traversed
//! - All query results are ordered by identifier, independent of build
//!   order and traversal start

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;

use super::registry::DocumentRegistry;
use super::types::{Breadcrumb, DocumentId};

/// Upper bound on cycles enumerated per edge kind.
pub const CYCLE_LIMIT: usize = 1000;

/// Which edge kinds a cycle runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// Parent edges only.
    Structural,
    /// At least one dependency edge.
    Referential,
}

/// A closed chain of identifiers, rotated to start at its smallest member.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Cycle {
    pub kind: CycleKind,
    pub ids: Vec<DocumentId>,
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut chain: Vec<&str> = self.ids.iter().map(DocumentId::as_str).collect();
        if let Some(first) = chain.first().copied() {
            chain.push(first);
        }
        f.write_str(&chain.join(" -> "))
    }
}

/// Why a document is disconnected from the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    /// The declared parent does not exist, or the document declares no
    /// parent but is not the designated root.
    InvalidParent,
    /// The parent exists, but its chain never reaches a root.
    IsolatedComponent,
}

impl OrphanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrphanReason::InvalidParent => "invalid_parent",
            OrphanReason::IsolatedComponent => "isolated_component",
        }
    }
}

impl std::fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub id: DocumentId,
    pub parent: Option<DocumentId>,
    pub reason: OrphanReason,
}

/// A declared breadcrumb that disagrees with the parent chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbMismatch {
    pub id: DocumentId,
    pub declared: Breadcrumb,
    pub actual: Breadcrumb,
}

/// How a node's parent chain ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    /// Reaches a root.
    Rooted,
    /// Declared parent missing (or unrooted parent-less node).
    Dangling,
    /// The chain reaches a structural cycle.
    Cyclic,
}

/// The dependency graph.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<DocumentId>,
    /// Declared parent per node, whether or not it exists.
    parents: BTreeMap<DocumentId, DocumentId>,
    /// Children per existing parent.
    children: BTreeMap<DocumentId, BTreeSet<DocumentId>>,
    /// Dependencies per node, restricted to existing nodes.
    dependencies: BTreeMap<DocumentId, BTreeSet<DocumentId>>,
    /// Reverse of `dependencies`.
    dependents: BTreeMap<DocumentId, BTreeSet<DocumentId>>,
    breadcrumbs: BTreeMap<DocumentId, Breadcrumb>,
    root_id: Option<DocumentId>,
}

impl DependencyGraph {
    /// Build the graph from the registry's indexed documents.
    ///
    /// # Example
    ///
    /// ```
    /// use corpuscheck::core::document::parse_document;
    /// use corpuscheck::core::graph::DependencyGraph;
    /// use corpuscheck::core::metadata::SchemaDefinition;
    /// use corpuscheck::core::registry::DocumentRegistry;
    /// use corpuscheck::core::types::DocumentId;
    /// use std::path::Path;
    ///
    /// let schema = SchemaDefinition::standard(&[]);
    /// let docs = vec![
    ///     parse_document(Path::new("1.md"), "---\nid: \"1\"\nparent: null\n---\n", None, &schema),
    ///     parse_document(Path::new("1.1.md"), "---\nid: \"1.1\"\nparent: \"1\"\n---\n", None, &schema),
    /// ];
    /// let registry = DocumentRegistry::build(docs);
    /// let graph = DependencyGraph::build(&registry, None);
    ///
    /// let root = DocumentId::new("1").unwrap();
    /// assert_eq!(graph.children(&root).len(), 1);
    /// assert!(graph.find_cycles().is_empty());
    /// ```
    pub fn build(registry: &DocumentRegistry, root_id: Option<&DocumentId>) -> Self {
        let mut graph = Self {
            root_id: root_id.cloned(),
            ..Self::default()
        };

        for doc in registry.iter() {
            if let Some(id) = &doc.id {
                graph.nodes.insert(id.clone());
            }
        }

        for doc in registry.iter() {
            let Some(id) = &doc.id else { continue };

            if let Some(parent) = &doc.parent {
                graph.parents.insert(id.clone(), parent.clone());
                if graph.nodes.contains(parent) {
                    graph
                        .children
                        .entry(parent.clone())
                        .or_default()
                        .insert(id.clone());
                }
            }

            for dep in &doc.dependencies {
                if graph.nodes.contains(dep) && dep != id {
                    graph
                        .dependencies
                        .entry(id.clone())
                        .or_default()
                        .insert(dep.clone());
                    graph
                        .dependents
                        .entry(dep.clone())
                        .or_default()
                        .insert(id.clone());
                }
            }

            if let Some(crumb) = &doc.breadcrumb {
                graph.breadcrumbs.insert(id.clone(), crumb.clone());
            }
        }

        graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DocumentId> {
        self.nodes.iter()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.nodes.contains(id)
    }

    /// The declared parent, if it exists in the graph.
    pub fn parent(&self, id: &DocumentId) -> Option<&DocumentId> {
        self.parents.get(id).filter(|p| self.nodes.contains(*p))
    }

    /// Direct children, ordered.
    pub fn children(&self, id: &DocumentId) -> Vec<&DocumentId> {
        self.children
            .get(id)
            .map(|c| c.iter().collect())
            .unwrap_or_default()
    }

    pub fn dependencies(&self, id: &DocumentId) -> Vec<&DocumentId> {
        self.dependencies
            .get(id)
            .map(|d| d.iter().collect())
            .unwrap_or_default()
    }

    pub fn dependents(&self, id: &DocumentId) -> Vec<&DocumentId> {
        self.dependents
            .get(id)
            .map(|d| d.iter().collect())
            .unwrap_or_default()
    }

    /// Nodes that terminate a parent chain: the designated root if one is
    /// configured, else every node without a parent.
    pub fn roots(&self) -> Vec<&DocumentId> {
        self.nodes.iter().filter(|id| self.is_root(id)).collect()
    }

    fn is_root(&self, id: &DocumentId) -> bool {
        match &self.root_id {
            Some(root) => root == id,
            None => !self.parents.contains_key(id),
        }
    }

    /// All transitive children, via breadth-first traversal.
    pub fn descendants(&self, id: &DocumentId) -> BTreeSet<DocumentId> {
        self.bfs(id, |node| self.children(node))
    }

    /// Everything that transitively depends on `id`: its children and the
    /// documents that declare a dependency on it, followed in reverse.
    ///
    /// The starting identifier is never part of the result.
    pub fn impact(&self, id: &DocumentId) -> BTreeSet<DocumentId> {
        self.bfs(id, |node| {
            let mut next = self.children(node);
            next.extend(self.dependents(node));
            next
        })
    }

    fn bfs<'a, F>(&'a self, start: &DocumentId, next: F) -> BTreeSet<DocumentId>
    where
        F: Fn(&DocumentId) -> Vec<&'a DocumentId>,
    {
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<&DocumentId> = next(start).into_iter().collect();

        while let Some(current) = queue.pop_front() {
            if current != start && result.insert(current.clone()) {
                queue.extend(next(current));
            }
        }

        result
    }

    /// Existing ancestors from immediate parent toward the root.
    ///
    /// Stops at a missing parent or when the chain loops.
    pub fn ancestors(&self, id: &DocumentId) -> Vec<DocumentId> {
        let mut result = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut current = id;

        while !self.is_root(current) {
            let Some(parent) = self.parent(current) else { break };
            if !seen.insert(parent) {
                break;
            }
            result.push(parent.clone());
            current = parent;
        }

        result
    }

    /// Number of ancestors, for documents whose chain reaches a root.
    pub fn depth(&self, id: &DocumentId) -> Option<usize> {
        (self.anchor(id) == Anchor::Rooted).then(|| self.ancestors(id).len())
    }

    fn anchor(&self, id: &DocumentId) -> Anchor {
        let mut seen = BTreeSet::new();
        let mut current = id;
        loop {
            if self.is_root(current) {
                return Anchor::Rooted;
            }
            if !seen.insert(current) {
                return Anchor::Cyclic;
            }
            match self.parents.get(current) {
                None => return Anchor::Dangling,
                Some(parent) if !self.nodes.contains(parent) => return Anchor::Dangling,
                Some(parent) => current = parent,
            }
        }
    }

    /// Find cycles over parent edges, then over parent and dependency
    /// edges together.
    ///
    /// Every elementary cycle is reported, so two loops sharing a node are
    /// two findings. Each starts at its smallest identifier and appears
    /// once. Cycles through parent edges only are [`CycleKind::Structural`];
    /// cycles through any dependency edge are [`CycleKind::Referential`].
    /// At most [`CYCLE_LIMIT`] cycles of each kind are enumerated.
    pub fn find_cycles(&self) -> Vec<Cycle> {
        let structural = self.elementary_cycles(|node| self.parent(node).into_iter().collect());

        let combined = self.elementary_cycles(|node| {
            let mut next: Vec<&DocumentId> = self.parent(node).into_iter().collect();
            next.extend(self.dependencies(node));
            next
        });

        let mut cycles: BTreeSet<Cycle> = structural
            .iter()
            .map(|ids| Cycle {
                kind: CycleKind::Structural,
                ids: ids.clone(),
            })
            .collect();

        for ids in combined {
            if structural.contains(&ids) || self.is_parent_chain(&ids) {
                continue;
            }
            cycles.insert(Cycle {
                kind: CycleKind::Referential,
                ids,
            });
        }

        cycles.into_iter().collect()
    }

    fn is_parent_chain(&self, ids: &[DocumentId]) -> bool {
        ids.iter()
            .zip(ids.iter().cycle().skip(1))
            .all(|(a, b)| self.parent(a) == Some(b))
    }

    /// Johnson's circuit search, iterative.
    ///
    /// From each start node in order, only nodes not smaller than the start
    /// are entered, so every cycle is found once and already begins at its
    /// smallest member. A node stays blocked until a cycle is found through
    /// it, which keeps the work per start linear between cycles.
    fn elementary_cycles<'a, F>(&'a self, successors: F) -> BTreeSet<Vec<DocumentId>>
    where
        F: Fn(&'a DocumentId) -> Vec<&'a DocumentId>,
    {
        struct Frame<'a> {
            node: &'a DocumentId,
            next: Vec<&'a DocumentId>,
            pos: usize,
            closed: bool,
        }

        let mut found = BTreeSet::new();

        for start in &self.nodes {
            if found.len() >= CYCLE_LIMIT {
                break;
            }

            let next = |node: &'a DocumentId| -> Vec<&'a DocumentId> {
                let mut next: Vec<&DocumentId> =
                    successors(node).into_iter().filter(|w| *w >= start).collect();
                next.sort();
                next.dedup();
                next
            };

            let mut blocked: HashSet<&DocumentId> = HashSet::from([start]);
            let mut waiting: HashMap<&DocumentId, HashSet<&DocumentId>> = HashMap::new();
            let mut stack = vec![Frame {
                node: start,
                next: next(start),
                pos: 0,
                closed: false,
            }];

            while let Some(frame) = stack.last_mut() {
                if let Some(&target) = frame.next.get(frame.pos) {
                    frame.pos += 1;
                    if target == start {
                        frame.closed = true;
                        if found.len() < CYCLE_LIMIT {
                            found.insert(stack.iter().map(|f| f.node.clone()).collect());
                        }
                    } else if blocked.insert(target) {
                        stack.push(Frame {
                            node: target,
                            next: next(target),
                            pos: 0,
                            closed: false,
                        });
                    }
                    continue;
                }

                let Some(done) = stack.pop() else {
                    break;
                };
                if done.closed {
                    unblock(done.node, &mut blocked, &mut waiting);
                } else {
                    for target in &done.next {
                        waiting.entry(*target).or_default().insert(done.node);
                    }
                }
                if let Some(caller) = stack.last_mut() {
                    caller.closed |= done.closed;
                }
            }
        }

        found
    }

    /// Documents whose parent chain does not reach a root.
    ///
    /// Documents that are themselves on a structural cycle are reported by
    /// [`DependencyGraph::find_cycles`] instead.
    pub fn orphans(&self) -> Vec<Orphan> {
        let on_cycle: BTreeSet<DocumentId> = self
            .elementary_cycles(|node| self.parent(node).into_iter().collect())
            .into_iter()
            .flatten()
            .collect();

        let mut orphans = Vec::new();
        for id in &self.nodes {
            if self.is_root(id) || on_cycle.contains(id) {
                continue;
            }

            let parent = self.parents.get(id).cloned();
            let reason = match &parent {
                None => Some(OrphanReason::InvalidParent),
                Some(p) if !self.nodes.contains(p) => Some(OrphanReason::InvalidParent),
                Some(_) => match self.anchor(id) {
                    Anchor::Rooted => None,
                    Anchor::Dangling | Anchor::Cyclic => Some(OrphanReason::IsolatedComponent),
                },
            };

            if let Some(reason) = reason {
                orphans.push(Orphan {
                    id: id.clone(),
                    parent,
                    reason,
                });
            }
        }
        orphans
    }

    /// Declared breadcrumbs that differ from the walked parent chain.
    ///
    /// Only documents whose chain reaches a root are compared; the others
    /// are reported as orphans or cycles.
    pub fn breadcrumb_mismatches(&self) -> Vec<BreadcrumbMismatch> {
        self.breadcrumbs
            .iter()
            .filter(|(id, _)| self.anchor(id) == Anchor::Rooted)
            .filter_map(|(id, declared)| {
                let mut chain = self.ancestors(id);
                chain.reverse();
                (declared.ids() != chain.as_slice()).then(|| BreadcrumbMismatch {
                    id: id.clone(),
                    declared: declared.clone(),
                    actual: Breadcrumb::new(chain),
                })
            })
            .collect()
    }
}

/// Release `node` and, transitively, every node waiting on it.
fn unblock<'a>(
    node: &'a DocumentId,
    blocked: &mut HashSet<&'a DocumentId>,
    waiting: &mut HashMap<&'a DocumentId, HashSet<&'a DocumentId>>,
) {
    let mut work = vec![node];
    while let Some(current) = work.pop() {
        if blocked.remove(current) {
            if let Some(released) = waiting.remove(current) {
                work.extend(released);
            }
        }
    }
}
