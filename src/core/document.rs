//! core::document
//!
//! The document model and the never-failing document parser.
//!
//! # Stubs
//!
//! A file whose front-matter cannot be decoded still becomes a
//! [`Document`]: a stub with its path, body and the decoding failure
//! recorded in [`Document::problems`]. Stubs carry no identifier, so they
//! never take part in the graph, but sibling documents are unaffected.
//!
//! # Dependencies
//!
//! A document depends on every identifier in its `depends_on` list and on
//! every inline `[[...]]` reference whose hierarchical identifier lies in a
//! different module. References inside the document's own module are
//! navigation, not dependencies; they are kept in [`Document::references`]
//! for link resolution only.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

use crate::core::metadata::frontmatter::{split_frontmatter, FrontmatterError};
use crate::core::metadata::schema::{
    breadcrumb_field, date_field, hash_field, identifier_field, identifier_list_field,
    integer_field, string_field, SchemaDefinition, SchemaViolation,
};
use crate::core::text::{self, Reference};
use crate::core::types::{Breadcrumb, ContentHash, DocStatus, DocumentId};

/// Front-matter keys with a typed home on [`Document`].
pub const KNOWN_FIELDS: [&str; 9] = [
    "id",
    "title",
    "parent",
    "breadcrumb",
    "status",
    "last_updated",
    "content_hash",
    "depends_on",
    "children_count",
];

/// Something wrong with a single document, found while parsing it.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentProblem {
    /// Front-matter could not be decoded; the document is a stub.
    Unparseable(FrontmatterError),
    /// A field is missing or malformed.
    Schema(SchemaViolation),
}

/// One parsed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: Option<DocumentId>,
    pub path: PathBuf,
    pub title: Option<String>,
    pub parent: Option<DocumentId>,
    pub breadcrumb: Option<Breadcrumb>,
    pub status: Option<DocStatus>,
    /// The digest stored in front-matter.
    pub content_hash: Option<ContentHash>,
    pub last_updated: Option<DateTime<Local>>,
    pub word_count: usize,
    /// Unknown front-matter fields, ordered by name.
    pub extra: BTreeMap<String, Value>,
    pub dependencies: Vec<DocumentId>,
    /// The digest of the current body.
    pub body_hash: ContentHash,
    pub children_count: Option<u64>,

    #[serde(skip)]
    pub body: String,
    #[serde(skip)]
    pub declared_dependencies: Vec<DocumentId>,
    #[serde(skip)]
    pub references: Vec<Reference>,
    #[serde(skip)]
    pub modified: Option<SystemTime>,
    #[serde(skip)]
    pub problems: Vec<DocumentProblem>,
}

impl Document {
    /// True when front-matter could not be decoded.
    pub fn is_stub(&self) -> bool {
        self.problems
            .iter()
            .any(|p| matches!(p, DocumentProblem::Unparseable(_)))
    }

    /// True when this document declares itself a root (`parent: null`).
    pub fn is_root(&self) -> bool {
        self.id.is_some() && self.parent.is_none() && !self.is_stub()
    }

    /// Identifier if present, else the path, for messages.
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => id.to_string(),
            None => self.path.display().to_string(),
        }
    }

    /// Whether the document lies under a module prefix. Documents without
    /// an identifier are under no module.
    pub fn is_under(&self, prefix: &str) -> bool {
        self.id.as_ref().map(|id| id.is_under(prefix)).unwrap_or(false)
    }

    /// Modification time in local time.
    pub fn modified_local(&self) -> Option<DateTime<Local>> {
        self.modified.map(DateTime::<Local>::from)
    }

    fn stub(path: &Path, body: &str, modified: Option<SystemTime>, error: FrontmatterError) -> Self {
        Self {
            id: None,
            path: path.to_path_buf(),
            title: None,
            parent: None,
            breadcrumb: None,
            status: None,
            content_hash: None,
            last_updated: None,
            word_count: text::word_count(body),
            extra: BTreeMap::new(),
            dependencies: Vec::new(),
            body_hash: ContentHash::of_body(body),
            children_count: None,
            body: body.to_string(),
            declared_dependencies: Vec::new(),
            references: text::references(body),
            modified,
            problems: vec![DocumentProblem::Unparseable(error)],
        }
    }
}

/// Parse one document. Never fails.
///
/// Malformed front-matter yields a stub; schema violations are recorded on
/// the document, which is otherwise populated with whatever decoded.
///
/// # Example
///
/// ```
/// use corpuscheck::core::document::parse_document;
/// use corpuscheck::core::metadata::SchemaDefinition;
/// use std::path::Path;
///
/// let schema = SchemaDefinition::standard(&["id".into(), "title".into()]);
/// let doc = parse_document(
///     Path::new("1/1.2.md"),
///     "---\nid: \"1.2\"\ntitle: Scope\nparent: \"1\"\n---\nSee [[2.1 Budget]].\n",
///     None,
///     &schema,
/// );
/// assert_eq!(doc.id.unwrap().as_str(), "1.2");
/// assert_eq!(doc.dependencies[0].as_str(), "2.1");
///
/// let stub = parse_document(Path::new("broken.md"), "no front-matter", None, &schema);
/// assert!(stub.is_stub());
/// ```
pub fn parse_document(
    path: &Path,
    content: &str,
    modified: Option<SystemTime>,
    schema: &SchemaDefinition,
) -> Document {
    let (fm, body) = match split_frontmatter(content) {
        Ok(split) => split,
        Err(error) => return Document::stub(path, content, modified, error),
    };

    let problems: Vec<DocumentProblem> = schema
        .validate(&fm)
        .into_iter()
        .map(DocumentProblem::Schema)
        .collect();

    let id = identifier_field(&fm, "id").ok().flatten();
    let declared_dependencies = identifier_list_field(&fm, "depends_on").unwrap_or_default();
    let references = text::references(body);

    let mut dependencies: BTreeSet<DocumentId> = declared_dependencies.iter().cloned().collect();
    if let Some(own) = &id {
        for reference in &references {
            if let Some(target) = &reference.id {
                if target.module() != own.module() {
                    dependencies.insert(target.clone());
                }
            }
        }
        dependencies.remove(own);
    }

    let extra = fm
        .fields
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Document {
        id,
        path: path.to_path_buf(),
        title: string_field(&fm, "title").ok().flatten(),
        parent: identifier_field(&fm, "parent").ok().flatten(),
        breadcrumb: breadcrumb_field(&fm, "breadcrumb").ok().flatten(),
        status: string_field(&fm, "status")
            .ok()
            .flatten()
            .and_then(|s| s.parse().ok()),
        content_hash: hash_field(&fm, "content_hash").ok().flatten(),
        last_updated: date_field(&fm, "last_updated").ok().flatten(),
        word_count: text::word_count(body),
        extra,
        dependencies: dependencies.into_iter().collect(),
        body_hash: ContentHash::of_body(body),
        children_count: integer_field(&fm, "children_count").ok().flatten(),
        body: body.to_string(),
        declared_dependencies,
        references,
        modified,
        problems,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> SchemaDefinition {
        let required: Vec<String> = crate::core::config::DEFAULT_REQUIRED_FIELDS
            .iter()
            .map(|s| s.to_string())
            .collect();
        SchemaDefinition::standard(&required)
    }

    fn full(extra: &str, body: &str) -> String {
        format!(
            "---\nid: \"1.2\"\ntitle: Scope\nparent: \"1\"\nbreadcrumb: [\"1\"]\nstatus: active\n\
             last_updated: \"2024-03-01 10:00\"\ncontent_hash: \"{}\"\n{extra}---\n{body}",
            ContentHash::of_body(body)
        )
    }

    #[test]
    fn complete_document() {
        let doc = parse_document(Path::new("a.md"), &full("", "Hello world\n"), None, &schema());
        assert!(doc.problems.is_empty());
        assert!(!doc.is_stub());
        assert_eq!(doc.title.as_deref(), Some("Scope"));
        assert_eq!(doc.parent.as_ref().unwrap().as_str(), "1");
        assert_eq!(doc.status, Some(DocStatus::Active));
        assert_eq!(doc.word_count, 2);
        assert_eq!(doc.content_hash.as_ref(), Some(&doc.body_hash));
    }

    #[test]
    fn unknown_fields_are_retained() {
        let doc = parse_document(
            Path::new("a.md"),
            &full("owner: finance\nreviewers: [a, b]\n", "x"),
            None,
            &schema(),
        );
        assert_eq!(doc.extra.len(), 2);
        assert_eq!(doc.extra["owner"], Value::String("finance".into()));
    }

    #[test]
    fn malformed_frontmatter_is_stub() {
        let doc = parse_document(
            Path::new("bad.md"),
            "---\ntitle: [broken\n---\nbody text\n",
            None,
            &schema(),
        );
        assert!(doc.is_stub());
        assert!(doc.id.is_none());
        assert_eq!(doc.problems.len(), 1);
        assert!(matches!(
            doc.problems[0],
            DocumentProblem::Unparseable(FrontmatterError::Yaml(_))
        ));
    }

    #[test]
    fn schema_violations_do_not_block_parsing() {
        let doc = parse_document(
            Path::new("a.md"),
            "---\nid: \"4\"\ntitle: Four\nstatus: unknown\n---\nbody",
            None,
            &schema(),
        );
        assert!(!doc.is_stub());
        assert_eq!(doc.id.as_ref().unwrap().as_str(), "4");
        assert!(doc.status.is_none());
        assert!(doc.problems.len() >= 4);
    }

    #[test]
    fn dependencies_merge_declared_and_cross_module_references() {
        let body = "See [[1.3 Sibling]], [[2.1 Budget]] and [[3|three]].\n";
        let doc = parse_document(
            Path::new("a.md"),
            &full("depends_on: [\"4.1\", \"2.1\"]\n", body),
            None,
            &schema(),
        );
        let deps: Vec<&str> = doc.dependencies.iter().map(DocumentId::as_str).collect();
        assert_eq!(deps, vec!["2.1", "3", "4.1"]);
        assert_eq!(doc.references.len(), 3);
        assert_eq!(doc.declared_dependencies.len(), 2);
    }

    #[test]
    fn root_document() {
        let doc = parse_document(
            Path::new("root.md"),
            "---\nid: \"1\"\ntitle: Root\nparent: null\nbreadcrumb: []\n---\n",
            None,
            &schema(),
        );
        assert!(doc.is_root());
        assert!(doc.breadcrumb.unwrap().is_empty());
    }

    #[test]
    fn snapshot_serialization_skips_body() {
        let doc = parse_document(Path::new("a.md"), &full("", "secret body"), None, &schema());
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("body").is_none());
        assert!(json.get("body_hash").is_some());
    }
}
