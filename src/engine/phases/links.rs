//! engine::phases::links
//!
//! Inline `[[...]]` references and `depends_on` entries must resolve.
//!
//! A reference with a hierarchical identifier resolves when the identifier
//! is indexed. Any other reference resolves against file stems and titles,
//! compared case-insensitively, so `[[Glossary]]` finds `glossary.md` or a
//! document titled "Glossary".

use std::collections::HashSet;

use crate::core::document::Document;
use crate::core::registry::DocumentRegistry;
use crate::core::text::Reference;
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::{PhaseCode, PhaseContext};

/// Lowercased names a non-hierarchical reference can resolve to.
pub(super) struct NameIndex {
    names: HashSet<String>,
}

impl NameIndex {
    pub(super) fn build(registry: &DocumentRegistry) -> Self {
        let mut names = HashSet::new();
        for doc in registry.all() {
            if let Some(stem) = doc.path.file_stem() {
                names.insert(stem.to_string_lossy().to_lowercase());
            }
            if let Some(title) = &doc.title {
                names.insert(title.trim().to_lowercase());
            }
        }
        Self { names }
    }

    pub(super) fn contains(&self, target: &str) -> bool {
        self.names.contains(&target.trim().to_lowercase())
    }
}

pub(super) fn resolves(reference: &Reference, registry: &DocumentRegistry, names: &NameIndex) -> bool {
    if let Some(id) = &reference.id {
        if registry.contains(id) {
            return true;
        }
    }
    names.contains(&reference.target)
}

/// V08: broken references and unresolved dependencies.
pub fn links(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    let names = NameIndex::build(ctx.registry);
    ctx.registry
        .all()
        .flat_map(|doc| document_links(ctx, doc, &names))
        .collect()
}

fn document_links(ctx: &PhaseContext<'_>, doc: &Document, names: &NameIndex) -> Vec<Issue> {
    let broken = doc
        .references
        .iter()
        .filter(|reference| !resolves(reference, ctx.registry, names))
        .map(|reference| {
            Issue::new(
                PhaseCode::V08,
                IssueKind::BrokenLink,
                Severity::Warning,
                format!("line {}: [[{}]] does not resolve", reference.line, reference.target),
            )
            .at(doc)
            .with_evidence(Evidence::Target {
                target: reference.target.clone(),
            })
            .with_evidence(Evidence::Line {
                line: reference.line,
                detail: reference.target.clone(),
            })
        });

    let unresolved = doc
        .declared_dependencies
        .iter()
        .filter(|dep| !ctx.registry.contains(dep))
        .map(|dep| {
            Issue::new(
                PhaseCode::V08,
                IssueKind::UnresolvedDependency,
                Severity::Error,
                format!("depends_on entry {dep} does not exist"),
            )
            .at(doc)
            .with_evidence(Evidence::Target {
                target: dep.to_string(),
            })
        });

    broken.chain(unresolved).collect()
}
