//! doctor::fixes
//!
//! Repair categories and the changes they generate.
//!
//! # Architecture
//!
//! A generator looks at one document in the current registry and returns
//! the [`FixChange`]s that would bring it in line. Generators are pure: they
//! read the parsed document and the registry and perform no I/O. Applying a
//! change is a pure text transformation of the file content.
//!
//! # Invariants
//!
//! - A generator returns nothing for a document it has already repaired,
//!   which makes every category idempotent
//! - Date and hash repairs touch only their own front-matter line
//! - Table repairs touch only the count cell they name

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::config::EngineConfig;
use crate::core::document::Document;
use crate::core::metadata::edit::{replace_body, set_field};
use crate::core::metadata::frontmatter::split_frontmatter;
use crate::core::metadata::schema::format_timestamp;
use crate::core::registry::DocumentRegistry;
use crate::core::types::DocumentId;
use crate::engine::health::{Evidence, Issue, IssueKind};
use crate::engine::phases::coherence::exceeds_tolerance;
use crate::engine::phases::tables::{descendant_cells, set_count_cells};
use crate::engine::phases::PhaseCode;

/// A family of repairs, applied in declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FixCategory {
    /// Descendant counts in content tables.
    TableRepair,
    /// `last_updated` from the file modification time.
    DateSync,
    /// `content_hash` from the body.
    HashSync,
}

impl FixCategory {
    pub const ALL: [FixCategory; 3] = [
        FixCategory::TableRepair,
        FixCategory::DateSync,
        FixCategory::HashSync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FixCategory::TableRepair => "table-repair",
            FixCategory::DateSync => "date-sync",
            FixCategory::HashSync => "hash-sync",
        }
    }

    /// Whether the category rewrites front-matter only.
    pub fn is_metadata_only(&self) -> bool {
        !matches!(self, FixCategory::TableRepair)
    }

    /// The phase whose findings this category resolves.
    pub fn phase(&self) -> PhaseCode {
        match self {
            FixCategory::TableRepair => PhaseCode::V14,
            FixCategory::DateSync => PhaseCode::V06,
            FixCategory::HashSync => PhaseCode::V07,
        }
    }

    /// The category that repairs an issue, if any.
    pub fn for_issue(issue: &Issue) -> Option<Self> {
        if !issue.fixable {
            return None;
        }
        match issue.kind {
            IssueKind::DescendantTableMismatch => Some(FixCategory::TableRepair),
            IssueKind::DateDrift => Some(FixCategory::DateSync),
            IssueKind::HashMismatch => Some(FixCategory::HashSync),
            IssueKind::MissingField | IssueKind::MalformedField => {
                issue.evidence.iter().find_map(|e| match e {
                    Evidence::Field { name, .. } if name == "last_updated" => {
                        Some(FixCategory::DateSync)
                    }
                    Evidence::Field { name, .. } if name == "content_hash" => {
                        Some(FixCategory::HashSync)
                    }
                    _ => None,
                })
            }
            _ => None,
        }
    }

    /// Changes this category would make to one document.
    pub fn generate(
        &self,
        registry: &DocumentRegistry,
        config: &EngineConfig,
        doc: &Document,
    ) -> Vec<FixChange> {
        if doc.is_stub() {
            return Vec::new();
        }
        match self {
            FixCategory::TableRepair => table_changes(registry, doc),
            FixCategory::DateSync => date_change(config, doc).into_iter().collect(),
            FixCategory::HashSync => hash_change(doc).into_iter().collect(),
        }
    }
}

impl std::fmt::Display for FixCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a change does to the file text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edit {
    /// Set a front-matter field to a literal YAML value.
    Field { key: String, value: String },
    /// Set a descendant-count cell in the body.
    TableCell { line: usize, column: usize, value: u64 },
}

/// One proposed modification to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixChange {
    pub category: FixCategory,
    pub kind: IssueKind,
    pub document: Option<DocumentId>,
    /// Relative to the corpus root.
    pub path: PathBuf,
    pub edit: Edit,
    pub before: Option<String>,
    pub after: String,
}

impl FixChange {
    /// The part of the file the change writes: a field name or a cell.
    pub fn target(&self) -> String {
        match &self.edit {
            Edit::Field { key, .. } => key.clone(),
            Edit::TableCell { line, column, .. } => format!("table:{line}:{column}"),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{}: {} {} -> {}",
            self.path.display(),
            self.target(),
            self.before.as_deref().unwrap_or("(none)"),
            self.after
        )
    }

    /// Apply to full file content. `None` when the content has no
    /// front-matter block to edit.
    pub fn apply(&self, content: &str) -> Option<String> {
        match &self.edit {
            Edit::Field { key, value } => set_field(content, key, value),
            Edit::TableCell {
                line,
                column,
                value,
            } => {
                let (_, body) = split_frontmatter(content).ok()?;
                let cells = BTreeMap::from([(*line, (*column, *value))]);
                replace_body(content, &set_count_cells(body, &cells))
            }
        }
    }
}

fn table_changes(registry: &DocumentRegistry, doc: &Document) -> Vec<FixChange> {
    descendant_cells(&doc.body, registry)
        .into_iter()
        .filter(|cell| !cell.is_correct())
        .map(|cell| FixChange {
            category: FixCategory::TableRepair,
            kind: IssueKind::DescendantTableMismatch,
            document: doc.id.clone(),
            path: doc.path.clone(),
            edit: Edit::TableCell {
                line: cell.line,
                column: cell.column,
                value: cell.actual,
            },
            before: cell.declared.map(|d| d.to_string()),
            after: cell.actual.to_string(),
        })
        .collect()
}

fn date_change(config: &EngineConfig, doc: &Document) -> Option<FixChange> {
    let modified = doc.modified_local()?;
    let kind = match &doc.last_updated {
        None => IssueKind::MissingField,
        Some(_) if exceeds_tolerance(doc, config.date_tolerance_minutes) => IssueKind::DateDrift,
        Some(_) => return None,
    };
    let after = format_timestamp(&modified);
    Some(FixChange {
        category: FixCategory::DateSync,
        kind,
        document: doc.id.clone(),
        path: doc.path.clone(),
        edit: Edit::Field {
            key: "last_updated".into(),
            value: format!("\"{after}\""),
        },
        before: doc.last_updated.as_ref().map(format_timestamp),
        after,
    })
}

fn hash_change(doc: &Document) -> Option<FixChange> {
    let kind = match &doc.content_hash {
        Some(stored) if stored == &doc.body_hash => return None,
        Some(_) => IssueKind::HashMismatch,
        None => IssueKind::MissingField,
    };
    Some(FixChange {
        category: FixCategory::HashSync,
        kind,
        document: doc.id.clone(),
        path: doc.path.clone(),
        edit: Edit::Field {
            key: "content_hash".into(),
            value: format!("\"{}\"", doc.body_hash),
        },
        before: doc.content_hash.as_ref().map(ToString::to_string),
        after: doc.body_hash.to_string(),
    })
}
