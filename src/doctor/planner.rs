//! doctor::planner
//!
//! Ordering and conflict checking for one batch of changes.
//!
//! # Invariants
//!
//! - Accepted changes are ordered by (issue kind, document identifier, path,
//!   target), so a batch applies identically on every run
//! - At most one value is written to any (path, target); a later change with
//!   a different value is skipped and reported, an identical one is dropped

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::fixes::FixChange;

/// A change skipped because an earlier one already set the same target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixConflict {
    pub kept: FixChange,
    pub skipped: FixChange,
}

impl FixConflict {
    pub fn path(&self) -> &PathBuf {
        &self.kept.path
    }

    pub fn to_issue(&self) -> Issue {
        let issue = Issue::new(
            self.kept.category.phase(),
            IssueKind::FixConflict,
            Severity::Warning,
            format!(
                "{} already set to {}; skipped {}",
                self.kept.target(),
                self.kept.after,
                self.skipped.after
            ),
        )
        .at_path(self.kept.path.clone())
        .with_evidence(Evidence::Conflict {
            field: self.kept.target(),
            kept: self.kept.after.clone(),
            skipped: self.skipped.after.clone(),
        });
        Issue {
            document: self.kept.document.clone(),
            ..issue
        }
    }
}

/// An ordered, conflict-free batch.
#[derive(Debug, Clone, Default)]
pub struct FixPlan {
    pub changes: Vec<FixChange>,
    pub conflicts: Vec<FixConflict>,
}

impl FixPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Accepted changes grouped by path, paths in order.
    pub fn by_path(&self) -> Vec<(PathBuf, Vec<&FixChange>)> {
        let mut grouped: std::collections::BTreeMap<PathBuf, Vec<&FixChange>> =
            std::collections::BTreeMap::new();
        for change in &self.changes {
            grouped.entry(change.path.clone()).or_default().push(change);
        }
        grouped.into_iter().collect()
    }
}

/// Sort a batch and drop conflicting duplicates.
pub fn plan(mut changes: Vec<FixChange>) -> FixPlan {
    changes.sort_by(|a, b| {
        (a.kind, &a.document, &a.path, a.target()).cmp(&(b.kind, &b.document, &b.path, b.target()))
    });

    let mut taken: HashMap<(PathBuf, String), usize> = HashMap::new();
    let mut result = FixPlan::default();
    for change in changes {
        let key = (change.path.clone(), change.target());
        match taken.get(&key) {
            Some(&index) => {
                let kept = &result.changes[index];
                if kept.after != change.after {
                    warn!(
                        path = %change.path.display(),
                        target = %key.1,
                        kept = %kept.after,
                        skipped = %change.after,
                        "conflicting repair skipped"
                    );
                    result.conflicts.push(FixConflict {
                        kept: kept.clone(),
                        skipped: change,
                    });
                }
            }
            None => {
                taken.insert(key, result.changes.len());
                result.changes.push(change);
            }
        }
    }
    result
}
