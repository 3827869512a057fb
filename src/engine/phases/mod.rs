//! engine::phases
//!
//! The verification phase table.
//!
//! # Architecture
//!
//! Phases are data, not types: [`PHASES`] is a static table of
//! [`PhaseDescriptor`]s, each pairing a code and flags with a plain
//! function. Document-scoped phases check one document at a time and can
//! run in parallel and be cached per document; corpus-scoped phases see the
//! whole registry and graph.
//!
//! Every phase function is pure: it reads the [`PhaseContext`] and returns
//! the issues it found. Adding a phase means writing one function and one
//! table row.
//!
//! # Modules
//!
//! - [`structure`] - Schema, identifiers, parents, breadcrumbs, cycles, types, titles
//! - [`coherence`] - Dates and content hashes
//! - [`links`] - Inline references and declared dependencies
//! - [`media`] - Embeds and images on disk
//! - [`format`] - Headings, line length, code fences, Mermaid, placeholders
//! - [`tables`] - Table separators and descendant counts
//! - [`coverage`] - Word counts
//!
//! # Caching
//!
//! Only phases whose result depends on the body alone are cache eligible.
//! Coverage is not: its threshold follows the front-matter identifier.

pub mod coherence;
pub mod coverage;
pub mod format;
pub mod links;
pub mod media;
pub mod structure;
pub mod tables;

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::EngineConfig;
use crate::core::document::Document;
use crate::core::graph::DependencyGraph;
use crate::core::metadata::SchemaDefinition;
use crate::core::registry::DocumentRegistry;
use crate::engine::health::Issue;

/// Phase codes, ordered as they run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PhaseCode {
    V01,
    V02,
    V03,
    V04,
    V05,
    V06,
    V07,
    V08,
    V09,
    V10,
    V11,
    V12,
    V13,
    V14,
    V15,
    V16,
    V17,
    V18,
    V19,
    V20,
    V21,
    V22,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase '{0}' (use a code like V07, a number like 7, or a name like hashes)")]
pub struct ParsePhaseError(pub String);

impl PhaseCode {
    pub const ALL: [PhaseCode; 22] = [
        PhaseCode::V01,
        PhaseCode::V02,
        PhaseCode::V03,
        PhaseCode::V04,
        PhaseCode::V05,
        PhaseCode::V06,
        PhaseCode::V07,
        PhaseCode::V08,
        PhaseCode::V09,
        PhaseCode::V10,
        PhaseCode::V11,
        PhaseCode::V12,
        PhaseCode::V13,
        PhaseCode::V14,
        PhaseCode::V15,
        PhaseCode::V16,
        PhaseCode::V17,
        PhaseCode::V18,
        PhaseCode::V19,
        PhaseCode::V20,
        PhaseCode::V21,
        PhaseCode::V22,
    ];

    /// 1-based phase number.
    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseCode::V01 => "V01",
            PhaseCode::V02 => "V02",
            PhaseCode::V03 => "V03",
            PhaseCode::V04 => "V04",
            PhaseCode::V05 => "V05",
            PhaseCode::V06 => "V06",
            PhaseCode::V07 => "V07",
            PhaseCode::V08 => "V08",
            PhaseCode::V09 => "V09",
            PhaseCode::V10 => "V10",
            PhaseCode::V11 => "V11",
            PhaseCode::V12 => "V12",
            PhaseCode::V13 => "V13",
            PhaseCode::V14 => "V14",
            PhaseCode::V15 => "V15",
            PhaseCode::V16 => "V16",
            PhaseCode::V17 => "V17",
            PhaseCode::V18 => "V18",
            PhaseCode::V19 => "V19",
            PhaseCode::V20 => "V20",
            PhaseCode::V21 => "V21",
            PhaseCode::V22 => "V22",
        }
    }

    /// Parse a code (`V07`, `v7`), a number (`7`) or a name (`hashes`).
    ///
    /// ```
    /// use corpuscheck::engine::phases::PhaseCode;
    ///
    /// assert_eq!(PhaseCode::parse("V07").unwrap(), PhaseCode::V07);
    /// assert_eq!(PhaseCode::parse("7").unwrap(), PhaseCode::V07);
    /// assert_eq!(PhaseCode::parse("hashes").unwrap(), PhaseCode::V07);
    /// assert!(PhaseCode::parse("V99").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, ParsePhaseError> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('V')
            .or_else(|| trimmed.strip_prefix('v'))
            .unwrap_or(trimmed);

        if let Ok(n) = digits.parse::<usize>() {
            if (1..=Self::ALL.len()).contains(&n) {
                return Ok(Self::ALL[n - 1]);
            }
            return Err(ParsePhaseError(s.to_string()));
        }

        PHASES
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(trimmed))
            .map(|d| d.code)
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }

    pub fn descriptor(&self) -> &'static PhaseDescriptor {
        &PHASES[*self as usize]
    }
}

impl FromStr for PhaseCode {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for PhaseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only inputs shared by every phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub root: &'a Path,
    pub registry: &'a DocumentRegistry,
    pub graph: &'a DependencyGraph,
    pub config: &'a EngineConfig,
    pub schema: &'a SchemaDefinition,
}

/// How a phase is applied.
#[derive(Clone, Copy)]
pub enum PhaseScope {
    /// Once per document.
    Document(fn(&PhaseContext<'_>, &Document) -> Vec<Issue>),
    /// Once per run over the whole corpus.
    Corpus(fn(&PhaseContext<'_>) -> Vec<Issue>),
}

impl std::fmt::Debug for PhaseScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseScope::Document(_) => f.write_str("Document"),
            PhaseScope::Corpus(_) => f.write_str("Corpus"),
        }
    }
}

/// One row of the phase table.
#[derive(Debug, Clone, Copy)]
pub struct PhaseDescriptor {
    pub code: PhaseCode,
    pub name: &'static str,
    /// Excluded from quick runs.
    pub slow: bool,
    /// Some of its issues can be repaired.
    pub fixable: bool,
    /// Clean results may be cached per document hash.
    pub cache_eligible: bool,
    pub scope: PhaseScope,
}

impl PhaseDescriptor {
    pub fn is_document_scoped(&self) -> bool {
        matches!(self.scope, PhaseScope::Document(_))
    }
}

const fn phase(
    code: PhaseCode,
    name: &'static str,
    slow: bool,
    fixable: bool,
    cache_eligible: bool,
    scope: PhaseScope,
) -> PhaseDescriptor {
    PhaseDescriptor {
        code,
        name,
        slow,
        fixable,
        cache_eligible,
        scope,
    }
}

/// Every phase, in execution order. Indexed by `PhaseCode as usize`.
pub static PHASES: [PhaseDescriptor; 22] = [
    phase(PhaseCode::V01, "schema", false, true, false, PhaseScope::Document(structure::schema)),
    phase(PhaseCode::V02, "unique-ids", false, false, false, PhaseScope::Corpus(structure::unique_ids)),
    phase(PhaseCode::V03, "parents", false, false, false, PhaseScope::Corpus(structure::parents)),
    phase(PhaseCode::V04, "breadcrumbs", false, false, false, PhaseScope::Corpus(structure::breadcrumbs)),
    phase(PhaseCode::V05, "cycles", false, false, false, PhaseScope::Corpus(structure::cycles)),
    phase(PhaseCode::V06, "dates", false, true, false, PhaseScope::Document(coherence::dates)),
    phase(PhaseCode::V07, "hashes", true, true, false, PhaseScope::Document(coherence::hashes)),
    phase(PhaseCode::V08, "links", true, false, false, PhaseScope::Corpus(links::links)),
    phase(PhaseCode::V09, "headings", false, false, true, PhaseScope::Document(format::headings)),
    phase(PhaseCode::V10, "duplicate-headers", false, false, true, PhaseScope::Document(format::duplicate_headers)),
    phase(PhaseCode::V11, "line-length", false, false, true, PhaseScope::Document(format::line_length)),
    phase(PhaseCode::V12, "code-blocks", false, false, true, PhaseScope::Document(format::code_blocks)),
    phase(PhaseCode::V13, "tables", false, false, true, PhaseScope::Document(tables::separators)),
    phase(PhaseCode::V14, "descendant-tables", false, true, false, PhaseScope::Corpus(tables::descendant_counts)),
    phase(PhaseCode::V15, "placeholders", true, false, true, PhaseScope::Document(format::placeholders)),
    phase(PhaseCode::V16, "coverage", true, false, false, PhaseScope::Document(coverage::coverage)),
    phase(PhaseCode::V17, "children-count", false, false, false, PhaseScope::Corpus(structure::children_count)),
    phase(PhaseCode::V18, "types", false, false, false, PhaseScope::Document(structure::types)),
    phase(PhaseCode::V19, "embeds", true, false, false, PhaseScope::Corpus(media::embeds)),
    phase(PhaseCode::V20, "images", true, false, false, PhaseScope::Document(media::images)),
    phase(PhaseCode::V21, "mermaid", false, false, true, PhaseScope::Document(format::mermaid)),
    phase(PhaseCode::V22, "duplicate-titles", false, false, false, PhaseScope::Corpus(structure::duplicate_titles)),
];

/// Phases excluded from quick runs.
pub fn slow_phases() -> impl Iterator<Item = PhaseCode> {
    PHASES.iter().filter(|d| d.slow).map(|d| d.code)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the phase tests.

    use std::path::{Path, PathBuf};

    use super::PhaseContext;
    use crate::core::config::EngineConfig;
    use crate::core::document::{parse_document, Document};
    use crate::core::graph::DependencyGraph;
    use crate::core::metadata::SchemaDefinition;
    use crate::core::registry::DocumentRegistry;

    /// An in-memory corpus for phase tests.
    pub struct Fixture {
        pub registry: DocumentRegistry,
        pub graph: DependencyGraph,
        pub config: EngineConfig,
        pub schema: SchemaDefinition,
        pub root: PathBuf,
    }

    impl Fixture {
        /// Build from (path, full content) pairs under the default config.
        pub fn new<S: AsRef<str>>(files: &[(&str, S)]) -> Self {
            Self::with_config(files, EngineConfig::default())
        }

        pub fn with_config<S: AsRef<str>>(files: &[(&str, S)], config: EngineConfig) -> Self {
            let schema = SchemaDefinition::standard(&config.effective_required_fields());
            let docs: Vec<Document> = files
                .iter()
                .map(|(path, content)| {
                    parse_document(Path::new(path), content.as_ref(), None, &schema)
                })
                .collect();
            let registry = DocumentRegistry::build(docs);
            let graph = DependencyGraph::build(&registry, config.root_id.as_ref());
            Self {
                registry,
                graph,
                config,
                schema,
                root: PathBuf::from("."),
            }
        }

        pub fn context(&self) -> PhaseContext<'_> {
            PhaseContext {
                root: &self.root,
                registry: &self.registry,
                graph: &self.graph,
                config: &self.config,
                schema: &self.schema,
            }
        }

        pub fn doc(&self, path: &str) -> &Document {
            self.registry
                .get_by_path(Path::new(path))
                .expect("fixture document exists")
        }
    }

    /// Front-matter for a well-formed document.
    pub fn front(id: &str, parent: Option<&str>, breadcrumb: &[&str]) -> String {
        let parent = parent
            .map(|p| format!("\"{p}\""))
            .unwrap_or_else(|| "null".to_string());
        let crumb: Vec<String> = breadcrumb.iter().map(|c| format!("\"{c}\"")).collect();
        format!(
            "id: \"{id}\"\ntitle: Doc {id}\nparent: {parent}\nbreadcrumb: [{}]\nstatus: active\n",
            crumb.join(", ")
        )
    }

    /// A complete document with a matching hash and a fixed date.
    pub fn document(id: &str, parent: Option<&str>, breadcrumb: &[&str], body: &str) -> String {
        format!(
            "---\n{}last_updated: \"2024-01-01 00:00\"\ncontent_hash: \"{}\"\n---\n{body}",
            front(id, parent, breadcrumb),
            crate::core::types::ContentHash::of_body(body)
        )
    }
}
