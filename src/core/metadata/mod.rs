//! core::metadata
//!
//! Document front-matter: extraction, schema, and line-level edits.
//!
//! # Modules
//!
//! - [`frontmatter`] - Split a document into YAML front-matter and body
//! - [`schema`] - Field types, required fields, typed decoding
//! - [`edit`] - Rewrite single front-matter lines for repairs
//!
//! # Example
//!
//! ```
//! use corpuscheck::core::metadata::{split_frontmatter, SchemaDefinition};
//!
//! let content = "---\nid: \"1\"\ntitle: Root\nparent: null\nbreadcrumb: []\nstatus: active\n---\nBody\n";
//! let (fm, body) = split_frontmatter(content).unwrap();
//! let schema = SchemaDefinition::standard(&["id".into(), "title".into(), "status".into()]);
//! assert!(schema.validate(&fm).is_empty());
//! assert_eq!(body, "Body\n");
//! ```

pub mod edit;
pub mod frontmatter;
pub mod schema;

pub use frontmatter::{split_frontmatter, Frontmatter, FrontmatterError};
pub use schema::{FieldSpec, FieldType, SchemaDefinition, SchemaViolation, ViolationKind};
