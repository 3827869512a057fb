//! corpuscheck - verification and repair for hierarchical Markdown corpora
//!
//! A corpus is a directory tree of Markdown files, each opening with a YAML
//! front-matter block that names the document, its parent and its place in
//! the hierarchy. corpuscheck indexes the corpus, runs a battery of
//! independent checks over it, and applies deterministic repairs for the
//! findings that have exactly one right answer.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Orchestrates Scan -> Parse -> Merge -> Graph -> Phases
//! - [`core`] - Domain types, front-matter, registry, graph, configuration
//! - [`doctor`] - Deterministic repair of fixable issues
//! - [`ui`] - Text and JSON output
//!
//! # Correctness Invariants
//!
//! 1. No phase mutates the registry, the graph or the filesystem
//! 2. Every repair goes through the fix router, under the corpus lock
//! 3. A cached clean result is only trusted for the exact content it saw
//! 4. Reports are deterministic: identical input yields identical output

pub mod cli;
pub mod core;
pub mod doctor;
pub mod engine;
pub mod ui;
