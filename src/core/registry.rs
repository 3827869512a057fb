//! core::registry
//!
//! The canonical in-memory store of parsed documents.
//!
//! # Architecture
//!
//! Files are read and parsed in parallel ([`load_documents`]); the parsed
//! documents are then merged single-threaded in `Path` order, the order
//! the scanner returns ([`DocumentRegistry::build`]), so "first seen" is
//! deterministic.
//!
//! # Invariants
//!
//! - Identifiers are unique in the identifier index; a later document with
//!   a taken identifier is kept by path only and recorded as a [`Collision`]
//! - Every document, including stubs and collisions, is reachable by path
//! - The registry is never mutated in place; repairs rebuild it

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::core::document::{parse_document, Document};
use crate::core::metadata::SchemaDefinition;
use crate::core::types::{DocStatus, DocumentId};

/// A duplicate identifier across two paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub id: DocumentId,
    /// The first-seen path, which owns the identifier.
    pub kept: PathBuf,
    /// The later path, indexed by path only.
    pub duplicate: PathBuf,
}

/// A file that could not be read during loading.
#[derive(Debug)]
pub struct ReadFailure {
    pub path: PathBuf,
    pub error: std::io::Error,
}

/// Read and parse files in parallel.
///
/// `paths` are relative to `root`. Call inside a rayon pool to bound the
/// worker count. Output order is unspecified; [`DocumentRegistry::build`]
/// sorts.
pub fn load_documents(
    root: &Path,
    paths: &[PathBuf],
    schema: &SchemaDefinition,
) -> (Vec<Document>, Vec<ReadFailure>) {
    let results: Vec<Result<Document, ReadFailure>> = paths
        .par_iter()
        .map(|relative| {
            let absolute = root.join(relative);
            let content = std::fs::read_to_string(&absolute).map_err(|error| ReadFailure {
                path: relative.clone(),
                error,
            })?;
            let modified = std::fs::metadata(&absolute)
                .and_then(|m| m.modified())
                .ok();
            Ok(parse_document(relative, &content, modified, schema))
        })
        .collect();

    let mut documents = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(doc) => documents.push(doc),
            Err(failure) => failures.push(failure),
        }
    }
    (documents, failures)
}

/// The document registry.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    /// Every document, in path order.
    documents: Vec<Document>,
    by_id: BTreeMap<DocumentId, usize>,
    by_path: HashMap<PathBuf, usize>,
    collisions: Vec<Collision>,
}

impl DocumentRegistry {
    /// Build a registry from parsed documents.
    ///
    /// # Example
    ///
    /// ```
    /// use corpuscheck::core::document::parse_document;
    /// use corpuscheck::core::metadata::SchemaDefinition;
    /// use corpuscheck::core::registry::DocumentRegistry;
    /// use std::path::Path;
    ///
    /// let schema = SchemaDefinition::standard(&[]);
    /// let a = parse_document(Path::new("a.md"), "---\nid: \"1\"\n---\n", None, &schema);
    /// let b = parse_document(Path::new("b.md"), "---\nid: \"1\"\n---\n", None, &schema);
    ///
    /// let registry = DocumentRegistry::build(vec![b, a]);
    /// assert_eq!(registry.len(), 1);
    /// assert_eq!(registry.collisions().len(), 1);
    /// assert_eq!(registry.collisions()[0].kept, Path::new("a.md"));
    /// ```
    pub fn build(mut documents: Vec<Document>) -> Self {
        documents.sort_by(|a, b| a.path.cmp(&b.path));

        let mut registry = Self::default();
        for doc in documents {
            registry.insert(doc);
        }
        debug!(
            documents = registry.documents.len(),
            indexed = registry.by_id.len(),
            collisions = registry.collisions.len(),
            "registry built"
        );
        registry
    }

    fn insert(&mut self, doc: Document) {
        let index = self.documents.len();
        self.by_path.insert(doc.path.clone(), index);

        if let Some(id) = &doc.id {
            if !doc.is_stub() {
                match self.by_id.get(id) {
                    Some(&existing) => self.collisions.push(Collision {
                        id: id.clone(),
                        kept: self.documents[existing].path.clone(),
                        duplicate: doc.path.clone(),
                    }),
                    None => {
                        self.by_id.insert(id.clone(), index);
                    }
                }
            }
        }

        self.documents.push(doc);
    }

    /// Rebuild with some documents replaced (matched by path).
    pub fn with_replaced(self, replacements: Vec<Document>) -> Self {
        let mut by_path: HashMap<PathBuf, Document> = replacements
            .into_iter()
            .map(|doc| (doc.path.clone(), doc))
            .collect();
        let mut documents: Vec<Document> = self
            .documents
            .into_iter()
            .map(|doc| by_path.remove(&doc.path).unwrap_or(doc))
            .collect();
        documents.extend(by_path.into_values());
        Self::build(documents)
    }

    /// Look up a document by identifier.
    pub fn get(&self, id: &DocumentId) -> Option<&Document> {
        self.by_id.get(id).map(|&i| &self.documents[i])
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Look up any document (stubs and collisions included) by path.
    pub fn get_by_path(&self, path: &Path) -> Option<&Document> {
        self.by_path.get(path).map(|&i| &self.documents[i])
    }

    /// Indexed documents, ordered by identifier.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.by_id.values().map(|&i| &self.documents[i])
    }

    /// Indexed identifiers, ordered.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.by_id.keys()
    }

    /// Every document, ordered by path.
    pub fn all(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    /// Documents not indexed by identifier because they have none
    /// (unparseable front-matter or a missing `id`), ordered by path.
    pub fn stubs(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| d.is_stub() || d.id.is_none())
    }

    pub fn with_status(&self, status: DocStatus) -> impl Iterator<Item = &Document> {
        self.iter().filter(move |d| d.status == Some(status))
    }

    /// Indexed documents whose identifier equals `prefix` or starts with
    /// `prefix.`.
    pub fn under_module<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Document> {
        self.iter().filter(move |d| d.is_under(prefix))
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents of any kind.
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Deterministic capture of the registry contents.
    pub fn snapshot(&self) -> RegistrySnapshot<'_> {
        RegistrySnapshot {
            documents: self.iter().collect(),
            stubs: self.stubs().map(|d| d.path.clone()).collect(),
            collisions: self.collisions.clone(),
        }
    }
}

/// Serializable registry capture: documents ordered by identifier, stubs
/// and collisions ordered by path.
#[derive(Debug, Serialize)]
pub struct RegistrySnapshot<'a> {
    pub documents: Vec<&'a Document>,
    pub stubs: Vec<PathBuf>,
    pub collisions: Vec<Collision>,
}

impl RegistrySnapshot<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
