//! engine
//!
//! Orchestrates a run: Scan -> Parse -> Merge -> Graph -> Phases (-> Fix).
//!
//! # Architecture
//!
//! The [`Engine`] owns everything that outlives a single run over a corpus:
//! the resolved configuration, the schema derived from it, the hash cache
//! and a fixed-size rayon pool. Each operation starts from a fresh
//! [`Corpus`]:
//!
//! 1. **Scan**: walk the root ([`scan::Scanner`])
//! 2. **Parse**: read and parse files in parallel inside the pool
//! 3. **Merge**: build the registry single-threaded in path order
//! 4. **Graph**: build the dependency graph, read-only from here on
//!
//! Verification then runs the [`pipeline::Pipeline`] over the corpus and
//! persists the cache; repair hands the registry to the
//! [`crate::doctor::FixRouter`].
//!
//! # Invariants
//!
//! - All parallel work runs in the engine's pool, never the global one
//! - Only an unreadable root, an invalid configuration, a pool failure, an
//!   aborted repair or a failed cache write is fatal; everything else is an
//!   issue in the report
//! - The cache is persisted after every verification and repair
//!
//! # Example
//!
//! ```no_run
//! use corpuscheck::core::config::EngineConfig;
//! use corpuscheck::engine::{Engine, PipelineOptions};
//! use corpuscheck::engine::health::Severity;
//! use std::path::Path;
//!
//! let engine = Engine::open(Path::new("docs"), EngineConfig::default())?;
//! let report = engine.verify(&PipelineOptions::default())?;
//! std::process::exit(report.exit_code(Severity::Warning));
//! # Ok::<(), corpuscheck::engine::EngineError>(())
//! ```

pub mod cache;
pub mod health;
pub mod phases;
pub mod pipeline;
pub mod report;
pub mod scan;

pub use cache::{CacheError, CacheStore, HashCache, JsonFileStore, MemoryStore};
pub use health::{Evidence, Issue, IssueKind, Severity};
pub use phases::{PhaseCode, PhaseContext};
pub use pipeline::{Pipeline, PipelineOptions, PhaseSelection};
pub use report::{PhaseResult, VerificationReport, EXIT_CLEAN, EXIT_FATAL, EXIT_ISSUES};
pub use scan::{ScanError, ScanWarning, Scanner};

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::{ConfigError, EngineConfig};
use crate::core::graph::DependencyGraph;
use crate::core::metadata::SchemaDefinition;
use crate::core::paths::CorpusPaths;
use crate::core::registry::{load_documents, DocumentRegistry};
use crate::doctor::{FixError, FixOutcome, FixRequest, FixRouter};

/// Fatal engine errors. Everything else is reported as an issue.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Root(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("cache could not be saved: {0}")]
    CacheUnrecoverable(#[source] CacheError),

    #[error(transparent)]
    Fix(#[from] FixError),
}

/// One loaded corpus.
#[derive(Debug)]
pub struct Corpus {
    pub registry: DocumentRegistry,
    pub graph: DependencyGraph,
    /// Scan warnings plus files that could not be read.
    pub scan_warnings: Vec<ScanWarning>,
}

/// The verification engine for one corpus root.
pub struct Engine {
    paths: CorpusPaths,
    config: EngineConfig,
    schema: SchemaDefinition,
    cache: Option<HashCache>,
    pool: rayon::ThreadPool,
}

impl Engine {
    /// Open a corpus root.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Root`] when the root is missing or not a
    /// readable directory, [`EngineError::Pool`] when the worker pool cannot
    /// start.
    pub fn open(root: &Path, config: EngineConfig) -> Result<Self, EngineError> {
        Scanner::new(root, &config).check_root()?;

        let paths = CorpusPaths::new(root);
        let schema = SchemaDefinition::standard(&config.effective_required_fields());
        let cache = config.cache.then(|| {
            let location = config.cache_location(&paths);
            HashCache::new(Box::new(JsonFileStore::open(&location, config.fingerprint())))
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("corpuscheck-{i}"))
            .build()?;

        debug!(
            root = %root.display(),
            workers = config.workers.max(1),
            cache = config.cache,
            "engine opened"
        );
        Ok(Self {
            paths,
            config,
            schema,
            cache,
            pool,
        })
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    /// Scan, parse and index the corpus.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Root`] when the root became unreadable.
    pub fn load(&self) -> Result<Corpus, EngineError> {
        let scan = Scanner::new(&self.paths.root, &self.config).collect()?;
        let mut scan_warnings = scan.warnings;

        let (documents, failures) = self
            .pool
            .install(|| load_documents(&self.paths.root, &scan.files, &self.schema));
        for failure in failures {
            warn!(path = %failure.path.display(), error = %failure.error, "cannot read document");
            scan_warnings.push(ScanWarning {
                path: failure.path,
                message: failure.error.to_string(),
            });
        }

        let registry = DocumentRegistry::build(documents);
        let graph = DependencyGraph::build(&registry, self.config.root_id.as_ref());
        info!(
            documents = registry.total(),
            indexed = registry.len(),
            warnings = scan_warnings.len(),
            "corpus loaded"
        );
        Ok(Corpus {
            registry,
            graph,
            scan_warnings,
        })
    }

    /// Run the verification pipeline over a loaded corpus.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CacheUnrecoverable`] when the cache cannot be
    /// written back.
    pub fn verify_corpus(
        &self,
        corpus: &Corpus,
        options: &PipelineOptions,
    ) -> Result<VerificationReport, EngineError> {
        let ctx = PhaseContext {
            root: &self.paths.root,
            registry: &corpus.registry,
            graph: &corpus.graph,
            config: &self.config,
            schema: &self.schema,
        };
        let pipeline = Pipeline::new(ctx, options, self.cache.as_ref());
        let report = self.pool.install(|| pipeline.run(&corpus.scan_warnings));
        self.persist_cache()?;
        Ok(report)
    }

    /// Load the corpus and verify it.
    ///
    /// # Errors
    ///
    /// See [`Engine::load`] and [`Engine::verify_corpus`].
    pub fn verify(&self, options: &PipelineOptions) -> Result<VerificationReport, EngineError> {
        let corpus = self.load()?;
        self.verify_corpus(&corpus, options)
    }

    /// Load the corpus and run the requested repairs.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Fix`] when the corpus is locked or a file
    /// cannot be read or written, and [`EngineError::CacheUnrecoverable`]
    /// when the cache cannot be written back.
    pub fn fix(&self, request: &FixRequest) -> Result<FixOutcome, EngineError> {
        let corpus = self.load()?;
        let router = FixRouter::new(&self.paths, &self.config, &self.schema, self.cache.as_ref());
        let outcome = self
            .pool
            .install(|| router.run(corpus.registry, request))?;
        self.persist_cache()?;
        Ok(outcome)
    }

    fn persist_cache(&self) -> Result<(), EngineError> {
        match &self.cache {
            Some(cache) if cache.dirty_count() > 0 => {
                cache.persist().map_err(EngineError::CacheUnrecoverable)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }

    fn config() -> EngineConfig {
        EngineConfig {
            workers: 2,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = Engine::open(&dir.path().join("nope"), config());
        assert!(matches!(result, Err(EngineError::Root(_))));
    }

    #[test]
    fn load_indexes_documents_and_keeps_stubs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1.md", "---\nid: \"1\"\ntitle: Root\nparent: null\n---\nbody\n");
        write(&dir, "broken.md", "no front-matter here\n");
        let engine = Engine::open(dir.path(), config()).unwrap();

        let corpus = engine.load().unwrap();
        assert_eq!(corpus.registry.len(), 1);
        assert_eq!(corpus.registry.total(), 2);
        assert_eq!(corpus.registry.stubs().count(), 1);
        assert!(corpus.scan_warnings.is_empty());
    }

    #[test]
    fn verify_persists_the_cache() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1.md", "---\nid: \"1\"\ntitle: Root\nparent: null\n---\n# Root\n");
        let engine = Engine::open(dir.path(), config()).unwrap();

        engine.verify(&PipelineOptions::default()).unwrap();
        assert!(dir.path().join(".corpuscheck/cache.json").exists());
    }

    #[test]
    fn disabled_cache_writes_nothing() {
        let dir = TempDir::new().unwrap();
        write(&dir, "1.md", "---\nid: \"1\"\n---\n# Root\n");
        let engine = Engine::open(
            dir.path(),
            EngineConfig {
                cache: false,
                ..config()
            },
        )
        .unwrap();

        engine.verify(&PipelineOptions::default()).unwrap();
        assert!(!dir.path().join(".corpuscheck").exists());
    }
}
