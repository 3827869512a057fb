//! Property-based tests for core domain types and the dependency graph.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::BTreeSet;
use std::path::Path;

use proptest::prelude::*;

use corpuscheck::core::document::parse_document;
use corpuscheck::core::graph::{CycleKind, DependencyGraph};
use corpuscheck::core::metadata::SchemaDefinition;
use corpuscheck::core::registry::DocumentRegistry;
use corpuscheck::core::types::{Breadcrumb, ContentHash, DocumentId};
use corpuscheck::engine::health::Severity;
use corpuscheck::engine::phases::PhaseCode;
use corpuscheck::engine::PhaseSelection;

/// Node `i` is named `i + 1`.
fn name(i: usize) -> String {
    (i + 1).to_string()
}

/// Strategy for a small corpus: a parent slot and dependency list per node.
fn corpus_shape() -> impl Strategy<Value = Vec<(Option<usize>, Vec<usize>)>> {
    (1usize..9).prop_flat_map(|n| {
        prop::collection::vec(
            (
                prop::option::of(0..n),
                prop::collection::vec(0..n, 0..3),
            ),
            n,
        )
    })
}

/// Build a graph; self references are dropped so every cycle has two members.
fn graph_of(shape: &[(Option<usize>, Vec<usize>)]) -> DependencyGraph {
    let schema = SchemaDefinition::standard(&[]);
    let documents = shape
        .iter()
        .enumerate()
        .map(|(i, (parent, deps))| {
            let parent = parent
                .filter(|p| *p != i)
                .map(|p| format!("\"{}\"", name(p)))
                .unwrap_or_else(|| "null".to_string());
            let deps: Vec<String> = deps
                .iter()
                .filter(|d| **d != i)
                .map(|d| format!("\"{}\"", name(*d)))
                .collect();
            let content = format!(
                "---\nid: \"{}\"\nparent: {parent}\ndepends_on: [{}]\n---\n",
                name(i),
                deps.join(", ")
            );
            parse_document(Path::new(&format!("{}.md", name(i))), &content, None, &schema)
        })
        .collect();
    DependencyGraph::build(&DocumentRegistry::build(documents), None)
}

/// Nodes whose parent walk returns to themselves, computed directly.
fn on_parent_cycle(shape: &[(Option<usize>, Vec<usize>)]) -> BTreeSet<String> {
    let parent = |i: usize| shape[i].0.filter(|p| *p != i);
    (0..shape.len())
        .filter(|&start| {
            let mut current = parent(start);
            for _ in 0..shape.len() {
                match current {
                    Some(node) if node == start => return true,
                    Some(node) => current = parent(node),
                    None => return false,
                }
            }
            false
        })
        .map(name)
        .collect()
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u64..200).prop_map(|n| n.to_string()),
        "[a-z][a-z0-9_-]{0,6}",
    ]
}

fn valid_id() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..5).prop_map(|segments| segments.join("."))
}

proptest! {
    /// Every reported cycle starts at its smallest member and follows real edges.
    #[test]
    fn cycles_are_normalized_and_follow_edges(shape in corpus_shape()) {
        let graph = graph_of(&shape);
        for cycle in graph.find_cycles() {
            let first = &cycle.ids[0];
            prop_assert!(cycle.ids.iter().all(|id| first <= id));

            let distinct: BTreeSet<&DocumentId> = cycle.ids.iter().collect();
            prop_assert_eq!(distinct.len(), cycle.ids.len());

            for (a, b) in cycle.ids.iter().zip(cycle.ids.iter().cycle().skip(1)) {
                let parent_edge = graph.parent(a) == Some(b);
                match cycle.kind {
                    CycleKind::Structural => prop_assert!(parent_edge),
                    CycleKind::Referential => {
                        prop_assert!(parent_edge || graph.dependencies(a).contains(&b));
                    }
                }
            }
        }
    }

    /// Structural cycles cover exactly the nodes whose parent walk loops.
    #[test]
    fn structural_cycles_match_parent_walks(shape in corpus_shape()) {
        let graph = graph_of(&shape);
        let reported: BTreeSet<String> = graph
            .find_cycles()
            .into_iter()
            .filter(|c| c.kind == CycleKind::Structural)
            .flat_map(|c| c.ids)
            .map(String::from)
            .collect();
        prop_assert_eq!(reported, on_parent_cycle(&shape));
    }

    /// Cycles are reported once no matter where traversal starts.
    #[test]
    fn cycles_are_never_duplicated(shape in corpus_shape()) {
        let cycles = graph_of(&shape).find_cycles();
        let distinct: BTreeSet<_> = cycles.iter().collect();
        prop_assert_eq!(distinct.len(), cycles.len());
    }

    /// A parent chain that always points at an earlier node is a rooted forest.
    #[test]
    fn forward_parent_chains_have_no_orphans(shape in corpus_shape()) {
        let forest: Vec<(Option<usize>, Vec<usize>)> = shape
            .into_iter()
            .enumerate()
            .map(|(i, (parent, _))| (parent.filter(|p| *p < i), Vec::new()))
            .collect();
        let graph = graph_of(&forest);
        prop_assert!(graph.find_cycles().is_empty());
        prop_assert!(graph.orphans().is_empty());
    }

    /// Any valid identifier round-trips through serde.
    #[test]
    fn document_id_serde_roundtrip(raw in valid_id()) {
        let id = DocumentId::new(raw.as_str()).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: DocumentId = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(id, parsed);
    }

    /// Numeric segments order numerically, so 1.9 sorts before 1.10.
    #[test]
    fn numeric_segments_order_numerically(prefix in 0u64..50, a in 0u64..1000, b in 0u64..1000) {
        let left = DocumentId::new(format!("{prefix}.{a}")).unwrap();
        let right = DocumentId::new(format!("{prefix}.{b}")).unwrap();
        prop_assert_eq!(left.cmp(&right), a.cmp(&b));
    }

    /// An identifier is under every prefix of its own segments.
    #[test]
    fn identifiers_are_under_their_prefixes(raw in valid_id()) {
        let id = DocumentId::new(raw.as_str()).unwrap();
        let segments: Vec<&str> = raw.split('.').collect();
        for end in 1..=segments.len() {
            let prefix = segments[..end].join(".");
            prop_assert!(id.is_under(&prefix), "{} not under {}", raw, prefix);
        }
    }

    /// Breadcrumbs print in the form they parse from.
    #[test]
    fn breadcrumb_display_roundtrip(ids in prop::collection::vec(valid_id(), 0..5)) {
        let crumb = Breadcrumb::parse(&ids.join(" / ")).unwrap();
        prop_assert_eq!(crumb.len(), ids.len());
        let reparsed = Breadcrumb::parse(&crumb.to_string()).unwrap();
        prop_assert_eq!(crumb, reparsed);
    }

    /// Line endings and surrounding whitespace never change the hash.
    #[test]
    fn hash_ignores_line_endings(lines in prop::collection::vec("[a-z ]{0,20}", 1..8)) {
        let unix = lines.join("\n");
        let windows = lines.join("\r\n");
        let padded = format!("\n\n{unix}\n  ");
        prop_assert_eq!(ContentHash::of_body(&unix), ContentHash::of_body(&windows));
        prop_assert_eq!(ContentHash::of_body(&unix), ContentHash::of_body(&padded));
        prop_assert_eq!(ContentHash::of_body(&unix).as_str().len(), 16);
    }

    /// Severity order agrees with its position and its name round-trips.
    #[test]
    fn severity_order_is_total(a in 0usize..4, b in 0usize..4) {
        let (left, right) = (Severity::ALL[a], Severity::ALL[b]);
        prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        prop_assert_eq!(Severity::parse(left.as_str()).unwrap(), left);
        prop_assert_eq!(Severity::parse(&left.as_str().to_uppercase()).unwrap(), left);
    }

    /// Quick runs are a subset of full runs, and single phases select one.
    #[test]
    fn phase_selections_are_consistent(index in 0usize..22) {
        let code = PhaseCode::ALL[index];
        prop_assert_eq!(PhaseCode::parse(code.as_str()).unwrap(), code);

        let only: Vec<PhaseCode> = PhaseSelection::Only(code).phases().map(|d| d.code).collect();
        prop_assert_eq!(only, vec![code]);

        let all: BTreeSet<PhaseCode> = PhaseSelection::All.phases().map(|d| d.code).collect();
        prop_assert!(PhaseSelection::Quick.phases().all(|d| all.contains(&d.code) && !d.slow));
        prop_assert_eq!(all.len(), 22);
    }
}
