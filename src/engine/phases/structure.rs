//! engine::phases::structure
//!
//! Front-matter schema and the shape of the document tree.

use std::collections::HashMap;

use crate::core::document::{Document, DocumentProblem};
use crate::core::graph::{CycleKind, OrphanReason};
use crate::core::metadata::ViolationKind;
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::{PhaseCode, PhaseContext};

/// Fields whose problems a repair can resolve.
const REPAIRABLE_FIELDS: [&str; 2] = ["last_updated", "content_hash"];

/// V01: decoding failures and missing or malformed fields.
pub fn schema(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    doc.problems
        .iter()
        .map(|problem| match problem {
            DocumentProblem::Unparseable(error) => Issue::new(
                PhaseCode::V01,
                IssueKind::ParseError,
                Severity::Error,
                format!("front-matter could not be parsed: {error}"),
            )
            .at(doc),
            DocumentProblem::Schema(violation) => {
                let (kind, expected, found) = match &violation.kind {
                    ViolationKind::Missing => (IssueKind::MissingField, None, None),
                    ViolationKind::Malformed { expected, found } => (
                        IssueKind::MalformedField,
                        Some(expected.clone()),
                        Some(found.clone()),
                    ),
                };
                let issue = Issue::new(PhaseCode::V01, kind, Severity::Error, violation.to_string())
                    .at(doc)
                    .with_evidence(Evidence::Field {
                        name: violation.field.clone(),
                        expected,
                        found,
                    });
                if REPAIRABLE_FIELDS.contains(&violation.field.as_str()) {
                    issue.fixable()
                } else {
                    issue
                }
            }
        })
        .collect()
}

/// V02: every later path that reuses a taken identifier.
pub fn unique_ids(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    ctx.registry
        .collisions()
        .iter()
        .map(|collision| {
            let mut issue = Issue::new(
                PhaseCode::V02,
                IssueKind::DuplicateId,
                Severity::Error,
                format!(
                    "identifier {} is already used by {}",
                    collision.id,
                    collision.kept.display()
                ),
            )
            .at_path(collision.duplicate.clone())
            .with_evidence(Evidence::Collision {
                kept: collision.kept.clone(),
                duplicate: collision.duplicate.clone(),
            });
            issue.document = Some(collision.id.clone());
            issue
        })
        .collect()
}

/// V03: documents whose parent chain does not reach a root.
pub fn parents(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    ctx.graph
        .orphans()
        .into_iter()
        .filter_map(|orphan| {
            let doc = ctx.registry.get(&orphan.id)?;
            let (kind, severity, message) = match (orphan.reason, &orphan.parent) {
                (OrphanReason::InvalidParent, Some(parent)) => (
                    IssueKind::InvalidParent,
                    Severity::Error,
                    format!("parent {parent} does not exist"),
                ),
                (OrphanReason::InvalidParent, None) => (
                    IssueKind::InvalidParent,
                    Severity::Error,
                    "declares no parent but is not the designated root".to_string(),
                ),
                (OrphanReason::IsolatedComponent, _) => (
                    IssueKind::IsolatedComponent,
                    Severity::Warning,
                    "parent chain never reaches a root".to_string(),
                ),
            };
            Some(
                Issue::new(PhaseCode::V03, kind, severity, message)
                    .at(doc)
                    .with_evidence(Evidence::Parent {
                        parent: orphan.parent.as_ref().map(ToString::to_string),
                        reason: orphan.reason.to_string(),
                    }),
            )
        })
        .collect()
}

/// V04: declared breadcrumbs that disagree with the parent chain.
pub fn breadcrumbs(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    ctx.graph
        .breadcrumb_mismatches()
        .into_iter()
        .filter_map(|mismatch| {
            let doc = ctx.registry.get(&mismatch.id)?;
            Some(
                Issue::new(
                    PhaseCode::V04,
                    IssueKind::BreadcrumbMismatch,
                    Severity::Error,
                    format!(
                        "breadcrumb [{}] does not match parent chain [{}]",
                        mismatch.declared, mismatch.actual
                    ),
                )
                .at(doc)
                .with_evidence(Evidence::Breadcrumb {
                    declared: mismatch.declared.to_string(),
                    actual: mismatch.actual.to_string(),
                }),
            )
        })
        .collect()
}

/// V05: parent cycles and dependency cycles, one issue per cycle.
pub fn cycles(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    ctx.graph
        .find_cycles()
        .into_iter()
        .map(|cycle| {
            let (kind, severity, label) = match cycle.kind {
                CycleKind::Structural => (IssueKind::StructuralCycle, Severity::Error, "parent"),
                CycleKind::Referential => (
                    IssueKind::ReferentialCycle,
                    ctx.config.referential_cycle_severity,
                    "dependency",
                ),
            };
            let issue = Issue::new(
                PhaseCode::V05,
                kind,
                severity,
                format!("{label} cycle: {cycle}"),
            );
            let issue = match cycle.ids.first().and_then(|id| ctx.registry.get(id)) {
                Some(doc) => issue.at(doc),
                None => issue,
            };
            issue.with_evidence(Evidence::Cycle {
                ids: cycle.ids.iter().map(ToString::to_string).collect(),
            })
        })
        .collect()
}

/// V17: declared `children_count` against the actual number of children.
pub fn children_count(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    ctx.registry
        .iter()
        .filter_map(|doc| {
            let declared = doc.children_count?;
            let id = doc.id.as_ref()?;
            let actual = ctx.graph.children(id).len() as u64;
            (declared != actual).then(|| {
                Issue::new(
                    PhaseCode::V17,
                    IssueKind::ChildrenCountMismatch,
                    Severity::Warning,
                    format!("children_count is {declared} but {actual} children exist"),
                )
                .at(doc)
                .with_evidence(Evidence::Count {
                    line: None,
                    subject: id.to_string(),
                    declared: Some(declared),
                    actual,
                })
            })
        })
        .collect()
}

/// V18: a `type` field outside the accepted document types. Documents
/// without one are not checked.
pub fn types(ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    let Some(value) = doc.extra.get("type") else {
        return Vec::new();
    };
    let found = match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if ctx.config.is_known_type(&found) {
        return Vec::new();
    }
    vec![Issue::new(
        PhaseCode::V18,
        IssueKind::NonStandardType,
        Severity::Warning,
        format!("type \"{found}\" is not a known document type"),
    )
    .at(doc)
    .with_evidence(Evidence::Field {
        name: "type".into(),
        expected: Some(ctx.config.document_types.join(", ")),
        found: Some(found),
    })]
}

/// V22: titles shared by several documents, compared case-insensitively.
/// The first in path order keeps the title; each later one is reported.
pub fn duplicate_titles(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    let mut first_seen: HashMap<String, &Document> = HashMap::new();
    let mut issues = Vec::new();
    for doc in ctx.registry.all() {
        let Some(title) = doc.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        match first_seen.get(&title.to_lowercase()) {
            Some(kept) => issues.push(
                Issue::new(
                    PhaseCode::V22,
                    IssueKind::DuplicateTitle,
                    Severity::Warning,
                    format!("title \"{title}\" is also used by {}", kept.path.display()),
                )
                .at(doc)
                .with_evidence(Evidence::Collision {
                    kept: kept.path.clone(),
                    duplicate: doc.path.clone(),
                }),
            ),
            None => {
                first_seen.insert(title.to_lowercase(), doc);
            }
        }
    }
    issues
}
