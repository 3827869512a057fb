//! engine::health
//!
//! Issues and severities produced by verification.
//!
//! # Architecture
//!
//! Every phase reports its findings as [`Issue`] values. Issues are
//! immutable once built and carry:
//! - `IssueId` (stable and deterministic from phase, location and evidence)
//! - [`Severity`] (`Hint < Info < Warning < Error`)
//! - [`IssueKind`] from a closed vocabulary
//! - Evidence (fields, cycle traces, line numbers, counts)
//!
//! # Example
//!
//! ```
//! use corpuscheck::engine::health::{Evidence, Issue, IssueKind, Severity};
//! use corpuscheck::engine::phases::PhaseCode;
//!
//! let issue = Issue::new(
//!     PhaseCode::V07,
//!     IssueKind::HashMismatch,
//!     Severity::Error,
//!     "stored content_hash does not match body",
//! )
//! .at_path("1/1.2.md")
//! .with_evidence(Evidence::Hash {
//!     stored: Some("0000000000000000".into()),
//!     actual: "9f86d081884c7d65".into(),
//! })
//! .fixable();
//!
//! assert!(issue.is_at_least(Severity::Warning));
//! assert!(issue.id.as_str().starts_with("hash-mismatch:"));
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::types::DocumentId;
use crate::engine::phases::PhaseCode;

/// Severity of an issue, totally ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hint,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity '{0}' (expected hint, info, warning or error)")]
pub struct ParseSeverityError(pub String);

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Hint,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Hint => "hint",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Parse a lowercase (or any-case) severity name.
    pub fn parse(s: &str) -> Result<Self, ParseSeverityError> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseSeverityError(s.to_string()))
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed vocabulary of issue kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    ParseError,
    MissingField,
    MalformedField,
    DuplicateId,
    InvalidParent,
    IsolatedComponent,
    BreadcrumbMismatch,
    StructuralCycle,
    ReferentialCycle,
    DateDrift,
    HashMismatch,
    BrokenLink,
    UnresolvedDependency,
    HeadingStructure,
    DuplicateHeader,
    LineTooLong,
    UnclosedCodeBlock,
    TableMissingSeparator,
    DescendantTableMismatch,
    Placeholder,
    LowWordCount,
    ChildrenCountMismatch,
    NonStandardType,
    MissingEmbed,
    MissingImage,
    InvalidMermaid,
    DuplicateTitle,
    UnreadablePath,
    FixConflict,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::ParseError => "parse-error",
            IssueKind::MissingField => "missing-field",
            IssueKind::MalformedField => "malformed-field",
            IssueKind::DuplicateId => "duplicate-id",
            IssueKind::InvalidParent => "invalid-parent",
            IssueKind::IsolatedComponent => "isolated-component",
            IssueKind::BreadcrumbMismatch => "breadcrumb-mismatch",
            IssueKind::StructuralCycle => "structural-cycle",
            IssueKind::ReferentialCycle => "referential-cycle",
            IssueKind::DateDrift => "date-drift",
            IssueKind::HashMismatch => "hash-mismatch",
            IssueKind::BrokenLink => "broken-link",
            IssueKind::UnresolvedDependency => "unresolved-dependency",
            IssueKind::HeadingStructure => "heading-structure",
            IssueKind::DuplicateHeader => "duplicate-header",
            IssueKind::LineTooLong => "line-too-long",
            IssueKind::UnclosedCodeBlock => "unclosed-code-block",
            IssueKind::TableMissingSeparator => "table-missing-separator",
            IssueKind::DescendantTableMismatch => "descendant-table-mismatch",
            IssueKind::Placeholder => "placeholder",
            IssueKind::LowWordCount => "low-word-count",
            IssueKind::ChildrenCountMismatch => "children-count-mismatch",
            IssueKind::NonStandardType => "non-standard-type",
            IssueKind::MissingEmbed => "missing-embed",
            IssueKind::MissingImage => "missing-image",
            IssueKind::InvalidMermaid => "invalid-mermaid",
            IssueKind::DuplicateTitle => "duplicate-title",
            IssueKind::UnreadablePath => "unreadable-path",
            IssueKind::FixConflict => "fix-conflict",
        }
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stable, deterministic issue identifier: `kind:hash(key)`.
///
/// ```
/// use corpuscheck::engine::health::IssueId;
///
/// let id = IssueId::new("broken-link", "1.md|target");
/// assert!(id.as_str().starts_with("broken-link:"));
/// assert_eq!(id, IssueId::new("broken-link", "1.md|target"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// The hash is a truncated SHA-256 of the key (8 hex chars).
    pub fn new(kind: &str, key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        Self(format!("{}:{}", kind, hex::encode(&digest[..4])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concrete details behind an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    /// A front-matter field.
    Field {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expected: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        found: Option<String>,
    },

    /// A cycle trace, starting at its smallest identifier.
    Cycle { ids: Vec<String> },

    /// A declared parent and why it does not connect.
    Parent {
        parent: Option<String>,
        reason: String,
    },

    /// Two paths claiming one identifier.
    Collision { kept: PathBuf, duplicate: PathBuf },

    Breadcrumb { declared: String, actual: String },

    /// Stored date against file modification time.
    Drift {
        stored: Option<String>,
        modified: String,
        minutes: i64,
    },

    Hash {
        stored: Option<String>,
        actual: String,
    },

    /// An unresolved reference target.
    Target { target: String },

    /// A position in the body.
    Line { line: usize, detail: String },

    /// A declared count against the actual one.
    Count {
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<usize>,
        subject: String,
        /// None when the declared value is not a number.
        declared: Option<u64>,
        actual: u64,
    },

    /// A filesystem failure.
    Io { message: String },

    /// A repair that lost to an earlier one on the same field.
    Conflict {
        field: String,
        kept: String,
        skipped: String,
    },
}

impl Evidence {
    /// The identifying part of the evidence, for issue ids.
    pub fn key(&self) -> String {
        match self {
            Evidence::Field { name, .. } => name.clone(),
            Evidence::Cycle { ids } => ids.join(","),
            Evidence::Parent { parent, reason } => {
                format!("{}:{}", parent.as_deref().unwrap_or("-"), reason)
            }
            Evidence::Collision { duplicate, .. } => duplicate.display().to_string(),
            Evidence::Breadcrumb { declared, .. } => declared.clone(),
            Evidence::Drift { .. } => "last_updated".to_string(),
            Evidence::Hash { .. } => "content_hash".to_string(),
            Evidence::Target { target } => target.clone(),
            Evidence::Line { line, detail } => format!("{line}:{detail}"),
            Evidence::Count { line, subject, .. } => {
                format!("{}:{}", line.unwrap_or(0), subject)
            }
            Evidence::Io { .. } => "io".to_string(),
            Evidence::Conflict { field, skipped, .. } => format!("{field}:{skipped}"),
        }
    }
}

/// A finding from verification or repair.
#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub id: IssueId,
    pub phase: PhaseCode,
    pub kind: IssueKind,
    pub severity: Severity,
    /// Path relative to the corpus root.
    pub path: Option<PathBuf>,
    pub document: Option<DocumentId>,
    pub message: String,
    pub fixable: bool,
    pub evidence: Vec<Evidence>,
}

impl Issue {
    pub fn new(
        phase: PhaseCode,
        kind: IssueKind,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        let mut issue = Self {
            id: IssueId::new(kind.as_str(), ""),
            phase,
            kind,
            severity,
            path: None,
            document: None,
            message: message.into(),
            fixable: false,
            evidence: Vec::new(),
        };
        issue.rekey();
        issue
    }

    /// Locate the issue at a document (path and identifier).
    pub fn at(mut self, document: &crate::core::document::Document) -> Self {
        self.path = Some(document.path.clone());
        self.document = document.id.clone();
        self.rekey();
        self
    }

    pub fn at_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self.rekey();
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self.rekey();
        self
    }

    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }

    pub fn is_at_least(&self, threshold: Severity) -> bool {
        self.severity >= threshold
    }

    /// Ordering used by reports: path, phase, kind, message.
    pub fn sort_key(&self) -> (Option<&PathBuf>, PhaseCode, IssueKind, &str) {
        (self.path.as_ref(), self.phase, self.kind, &self.message)
    }

    fn rekey(&mut self) {
        let mut key = format!(
            "{}|{}",
            self.phase,
            self.path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        );
        for evidence in &self.evidence {
            key.push('|');
            key.push_str(&evidence.key());
        }
        self.id = IssueId::new(self.kind.as_str(), &key);
    }
}

impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Issue {}

impl std::hash::Hash for Issue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Sort issues into report order and drop duplicates by id.
pub fn sort_issues(issues: &mut Vec<Issue>) {
    issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()).then_with(|| a.id.cmp(&b.id)));
    let mut seen = std::collections::HashSet::new();
    issues.retain(|issue| seen.insert(issue.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    mod severity {
        use super::*;

        #[test]
        fn total_order() {
            assert!(Severity::Hint < Severity::Info);
            assert!(Severity::Info < Severity::Warning);
            assert!(Severity::Warning < Severity::Error);
            assert_eq!(Severity::ALL.iter().max(), Some(&Severity::Error));
        }

        #[test]
        fn parse_and_display() {
            for sev in Severity::ALL {
                assert_eq!(Severity::parse(sev.as_str()).unwrap(), sev);
            }
            assert_eq!(Severity::parse("WARNING").unwrap(), Severity::Warning);
            assert!(Severity::parse("fatal").is_err());
            assert_eq!(Severity::Error.to_string(), "error");
        }

        #[test]
        fn serde_lowercase() {
            let json = serde_json::to_string(&Severity::Info).unwrap();
            assert_eq!(json, "\"info\"");
        }
    }

    mod issue_kind {
        use super::*;

        #[test]
        fn serde_matches_display() {
            for kind in [
                IssueKind::ParseError,
                IssueKind::DescendantTableMismatch,
                IssueKind::NonStandardType,
                IssueKind::InvalidMermaid,
                IssueKind::FixConflict,
            ] {
                let json = serde_json::to_string(&kind).unwrap();
                assert_eq!(json, format!("\"{}\"", kind));
            }
        }
    }

    mod issue_id {
        use super::*;

        #[test]
        fn deterministic_for_same_input() {
            assert_eq!(IssueId::new("x", "key"), IssueId::new("x", "key"));
            assert_ne!(IssueId::new("x", "key"), IssueId::new("x", "other"));
        }

        #[test]
        fn has_eight_hex_chars() {
            let id = IssueId::new("placeholder", "a");
            let hash = id.as_str().split(':').nth(1).unwrap();
            assert_eq!(hash.len(), 8);
        }
    }

    mod issue {
        use super::*;

        fn sample(path: &str, line: usize) -> Issue {
            Issue::new(
                PhaseCode::V11,
                IssueKind::LineTooLong,
                Severity::Info,
                "line too long",
            )
            .at_path(path)
            .with_evidence(Evidence::Line {
                line,
                detail: "320".into(),
            })
        }

        #[test]
        fn id_depends_on_location_and_evidence() {
            assert_eq!(sample("a.md", 3), sample("a.md", 3));
            assert_ne!(sample("a.md", 3), sample("a.md", 4));
            assert_ne!(sample("a.md", 3), sample("b.md", 3));
        }

        #[test]
        fn threshold() {
            let issue = sample("a.md", 1);
            assert!(issue.is_at_least(Severity::Hint));
            assert!(issue.is_at_least(Severity::Info));
            assert!(!issue.is_at_least(Severity::Warning));
        }

        #[test]
        fn sort_and_dedupe() {
            let mut issues = vec![sample("b.md", 1), sample("a.md", 2), sample("b.md", 1)];
            sort_issues(&mut issues);
            assert_eq!(issues.len(), 2);
            assert_eq!(issues[0].path.as_deref(), Some(std::path::Path::new("a.md")));
        }

        #[test]
        fn serializes_kind_and_evidence() {
            let json = serde_json::to_value(sample("a.md", 7)).unwrap();
            assert_eq!(json["kind"], "line-too-long");
            assert_eq!(json["phase"], "V11");
            assert_eq!(json["evidence"][0]["type"], "line");
            assert_eq!(json["evidence"][0]["line"], 7);
        }
    }
}
