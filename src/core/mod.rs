//! core
//!
//! Domain types, document model and structure for corpuscheck.
//!
//! # Modules
//!
//! - [`types`] - Strong types: DocumentId, DocStatus, Breadcrumb, ContentHash
//! - [`metadata`] - Front-matter extraction, schema and line edits
//! - [`text`] - Body scanning: headings, references, tables, placeholders
//! - [`document`] - The document model and parser
//! - [`registry`] - Identifier and path indexes over parsed documents
//! - [`graph`] - Parent and dependency graph
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for engine state
//! - [`ops`] - Write locks
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at construction
//! - Parsing never fails; problems are recorded on the document
//! - All queries are deterministic

pub mod config;
pub mod document;
pub mod graph;
pub mod metadata;
pub mod ops;
pub mod paths;
pub mod registry;
pub mod text;
pub mod types;
