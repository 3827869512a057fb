//! Shared fixtures for integration tests.
//!
//! A [`TestCorpus`] is a real directory tree in a temp dir, written with
//! well-formed documents unless a test writes raw content on purpose.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use chrono::Local;
use tempfile::TempDir;

use corpuscheck::core::config::EngineConfig;
use corpuscheck::core::metadata::schema::format_timestamp;
use corpuscheck::core::types::ContentHash;
use corpuscheck::engine::Engine;

/// A body long enough for the coverage phase, with one H1.
pub fn body(title: &str) -> String {
    format!("# {title}\n\n{}", "plain filler words for coverage\n".repeat(12))
}

/// Front-matter fields for a well-formed document, without date and hash.
pub fn front(id: &str, parent: Option<&str>, breadcrumb: &[&str]) -> String {
    let parent = parent
        .map(|p| format!("\"{p}\""))
        .unwrap_or_else(|| "null".to_string());
    let crumb: Vec<String> = breadcrumb.iter().map(|c| format!("\"{c}\"")).collect();
    format!(
        "id: \"{id}\"\ntitle: Document {id}\nparent: {parent}\nbreadcrumb: [{}]\nstatus: active\n",
        crumb.join(", ")
    )
}

/// A complete document dated now, with a matching hash.
pub fn document(id: &str, parent: Option<&str>, breadcrumb: &[&str], body: &str) -> String {
    format!(
        "---\n{}last_updated: \"{}\"\ncontent_hash: \"{}\"\n---\n{body}",
        front(id, parent, breadcrumb),
        format_timestamp(&Local::now()),
        ContentHash::of_body(body)
    )
}

pub struct TestCorpus {
    dir: TempDir,
}

impl TestCorpus {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// A small valid tree: 1 <- 1.1 <- 1.1.1, 1 <- 1.2.
    pub fn tree() -> Self {
        let corpus = Self::new();
        corpus.add("1.md", "1", None, &[]);
        corpus.add("1/1.1.md", "1.1", Some("1"), &["1"]);
        corpus.add("1/1.1/1.1.1.md", "1.1.1", Some("1.1"), &["1", "1.1"]);
        corpus.add("1/1.2.md", "1.2", Some("1"), &["1"]);
        corpus
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let full = self.path().join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("failed to create dirs");
        }
        fs::write(full, content).expect("failed to write file");
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path().join(relative)).expect("failed to read file")
    }

    /// Write a well-formed document with the standard body.
    pub fn add(&self, relative: &str, id: &str, parent: Option<&str>, breadcrumb: &[&str]) {
        self.write(
            relative,
            &document(id, parent, breadcrumb, &body(&format!("Document {id}"))),
        );
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            workers: 2,
            ..EngineConfig::default()
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine_with(self.config())
    }

    pub fn engine_with(&self, config: EngineConfig) -> Engine {
        Engine::open(self.path(), config).expect("failed to open engine")
    }
}
