//! doctor
//!
//! Deterministic repair of fixable issues.
//!
//! # Architecture
//!
//! The [`FixRouter`] turns a [`FixRequest`] into a sequence of batches, one
//! per [`FixCategory`], always in the order table repair, date sync, hash
//! sync. Each batch:
//!
//! 1. Generates changes from the current state of every document
//! 2. Orders and conflict-checks them ([`planner::plan`])
//! 3. Applies them per file, files in parallel, each write holding that
//!    path's mutex
//! 4. Re-reads the touched files so the next batch sees fresh state
//!
//! A table repair edits the body, which moves the file's modification time
//! and changes its hash; running it first lets the date and hash batches
//! settle both in the same run.
//!
//! # Invariants
//!
//! - A non-dry run holds the corpus lock from first write to last
//! - Writes are atomic; metadata-only repairs restore the modification time
//! - A dry run writes nothing, and later batches see the simulated content
//! - Every written path is invalidated in the hash cache
//! - Running the same request twice changes nothing the second time
//!
//! # Example
//!
//! ```no_run
//! use corpuscheck::core::config::EngineConfig;
//! use corpuscheck::doctor::{FixCategory, FixRequest};
//! use corpuscheck::engine::Engine;
//! use std::path::Path;
//!
//! let engine = Engine::open(Path::new("docs"), EngineConfig::default())?;
//! let outcome = engine.fix(&FixRequest::categories([FixCategory::HashSync], false))?;
//! println!("{} files written", outcome.files_written);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod fixes;
pub mod planner;

pub use fixes::{Edit, FixCategory, FixChange};
pub use planner::{FixConflict, FixPlan};

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::EngineConfig;
use crate::core::document::{parse_document, Document};
use crate::core::metadata::SchemaDefinition;
use crate::core::ops::{write_atomic, CorpusLock, LockError, PathLocks};
use crate::core::paths::CorpusPaths;
use crate::core::registry::DocumentRegistry;
use crate::engine::cache::HashCache;
use crate::engine::health::Issue;

/// Errors that abort a repair run.
#[derive(Debug, Error)]
pub enum FixError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixTarget {
    /// Every document, for these categories.
    Categories(BTreeSet<FixCategory>),
    /// Only the (category, path) pairs the issues point at.
    Issues(Vec<Issue>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRequest {
    pub target: FixTarget,
    pub dry_run: bool,
}

impl FixRequest {
    pub fn categories(categories: impl IntoIterator<Item = FixCategory>, dry_run: bool) -> Self {
        Self {
            target: FixTarget::Categories(categories.into_iter().collect()),
            dry_run,
        }
    }

    pub fn all(dry_run: bool) -> Self {
        Self::categories(FixCategory::ALL, dry_run)
    }

    pub fn issues(issues: Vec<Issue>, dry_run: bool) -> Self {
        Self {
            target: FixTarget::Issues(issues),
            dry_run,
        }
    }

    fn selected(&self) -> BTreeSet<FixCategory> {
        match &self.target {
            FixTarget::Categories(categories) => categories.clone(),
            FixTarget::Issues(issues) => FixRouter::route(issues).into_keys().collect(),
        }
    }

    fn allows(&self, change: &FixChange) -> bool {
        match &self.target {
            FixTarget::Categories(categories) => categories.contains(&change.category),
            FixTarget::Issues(issues) => issues.iter().any(|issue| {
                FixCategory::for_issue(issue) == Some(change.category)
                    && issue.path.as_ref() == Some(&change.path)
            }),
        }
    }
}

/// Result of a repair run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixOutcome {
    /// Changes applied, or that would be applied in a dry run.
    pub changes: Vec<FixChange>,
    /// `fix-conflict` issues for skipped changes.
    pub conflicts: Vec<Issue>,
    pub counts: BTreeMap<FixCategory, usize>,
    pub files_written: usize,
    pub dry_run: bool,
}

impl FixOutcome {
    pub fn total(&self) -> usize {
        self.changes.len()
    }
}

/// File state as seen by the current batch.
#[derive(Debug, Clone)]
struct FileState {
    content: String,
    modified: Option<SystemTime>,
}

/// Routes fixable issues to repair categories and runs them.
pub struct FixRouter<'a> {
    paths: &'a CorpusPaths,
    config: &'a EngineConfig,
    schema: &'a SchemaDefinition,
    cache: Option<&'a HashCache>,
    locks: PathLocks,
}

impl<'a> FixRouter<'a> {
    pub fn new(
        paths: &'a CorpusPaths,
        config: &'a EngineConfig,
        schema: &'a SchemaDefinition,
        cache: Option<&'a HashCache>,
    ) -> Self {
        Self {
            paths,
            config,
            schema,
            cache,
            locks: PathLocks::default(),
        }
    }

    /// Group fixable issues by the category that repairs them.
    pub fn route(issues: &[Issue]) -> BTreeMap<FixCategory, Vec<&Issue>> {
        let mut routed: BTreeMap<FixCategory, Vec<&Issue>> = BTreeMap::new();
        for issue in issues {
            if let Some(category) = FixCategory::for_issue(issue) {
                routed.entry(category).or_default().push(issue);
            }
        }
        routed
    }

    /// Run every selected category in order. Call inside the rayon pool
    /// that should do the writes.
    ///
    /// # Errors
    ///
    /// Returns [`FixError`] when the corpus is locked or a file cannot be
    /// read or written. Batches already written stay written.
    pub fn run(
        &self,
        registry: DocumentRegistry,
        request: &FixRequest,
    ) -> Result<FixOutcome, FixError> {
        let _lock = if request.dry_run {
            None
        } else {
            Some(CorpusLock::acquire(self.paths)?)
        };

        let selected = request.selected();
        let mut registry = registry;
        let mut simulated: HashMap<PathBuf, FileState> = HashMap::new();
        let mut written: HashSet<PathBuf> = HashSet::new();
        let mut outcome = FixOutcome {
            dry_run: request.dry_run,
            ..FixOutcome::default()
        };

        for category in FixCategory::ALL.into_iter().filter(|c| selected.contains(c)) {
            let changes: Vec<FixChange> = registry
                .all()
                .flat_map(|doc| category.generate(&registry, self.config, doc))
                .filter(|change| request.allows(change))
                .collect();
            let plan = planner::plan(changes);
            outcome
                .conflicts
                .extend(plan.conflicts.iter().map(FixConflict::to_issue));
            if plan.is_empty() {
                debug!(%category, "nothing to repair");
                continue;
            }

            let refreshed = if request.dry_run {
                self.simulate(&plan, category, &mut simulated)?
            } else {
                let refreshed = self.write(&plan, category)?;
                written.extend(refreshed.iter().map(|doc| doc.path.clone()));
                refreshed
            };

            info!(
                %category,
                changes = plan.changes.len(),
                files = refreshed.len(),
                dry_run = request.dry_run,
                "repair batch applied"
            );
            outcome.counts.insert(category, plan.changes.len());
            outcome.changes.extend(plan.changes);
            registry = registry.with_replaced(refreshed);
        }

        outcome.files_written = written.len();
        Ok(outcome)
    }

    fn read(&self, relative: &Path) -> Result<FileState, FixError> {
        let absolute = self.paths.resolve(relative);
        let content = fs::read_to_string(&absolute).map_err(|source| FixError::Read {
            path: relative.to_path_buf(),
            source,
        })?;
        let modified = fs::metadata(&absolute).and_then(|m| m.modified()).ok();
        Ok(FileState { content, modified })
    }

    fn apply(&self, state: &FileState, changes: &[&FixChange]) -> Option<String> {
        let mut content = state.content.clone();
        for change in changes {
            match change.apply(&content) {
                Some(next) => content = next,
                None => {
                    warn!(path = %change.path.display(), target = %change.target(), "no front-matter to edit");
                }
            }
        }
        (content != state.content).then_some(content)
    }

    fn reparse(&self, path: &Path, state: &FileState) -> Document {
        parse_document(path, &state.content, state.modified, self.schema)
    }

    fn simulate(
        &self,
        plan: &FixPlan,
        category: FixCategory,
        simulated: &mut HashMap<PathBuf, FileState>,
    ) -> Result<Vec<Document>, FixError> {
        let mut refreshed = Vec::new();
        for (path, changes) in plan.by_path() {
            let state = match simulated.get(&path) {
                Some(state) => state.clone(),
                None => self.read(&path)?,
            };
            let Some(content) = self.apply(&state, &changes) else {
                continue;
            };
            let next = FileState {
                content,
                modified: if category.is_metadata_only() {
                    state.modified
                } else {
                    Some(SystemTime::now())
                },
            };
            refreshed.push(self.reparse(&path, &next));
            simulated.insert(path, next);
        }
        Ok(refreshed)
    }

    fn write(&self, plan: &FixPlan, category: FixCategory) -> Result<Vec<Document>, FixError> {
        let results: Vec<Result<Option<Document>, FixError>> = plan
            .by_path()
            .into_par_iter()
            .map(|(path, changes)| self.write_file(&path, &changes, category))
            .collect();

        let mut refreshed = Vec::new();
        for result in results {
            if let Some(doc) = result? {
                refreshed.push(doc);
            }
        }
        Ok(refreshed)
    }

    fn write_file(
        &self,
        relative: &Path,
        changes: &[&FixChange],
        category: FixCategory,
    ) -> Result<Option<Document>, FixError> {
        let absolute = self.paths.resolve(relative);
        let lock = self.locks.for_path(&absolute);
        let _guard = lock.lock();

        let state = self.read(relative)?;
        let Some(content) = self.apply(&state, changes) else {
            return Ok(None);
        };
        let write_error = |source: std::io::Error| FixError::Write {
            path: relative.to_path_buf(),
            source,
        };
        write_atomic(&absolute, content.as_bytes()).map_err(write_error)?;

        if category.is_metadata_only() {
            if let Some(original) = state.modified {
                fs::File::options()
                    .write(true)
                    .open(&absolute)
                    .and_then(|file| file.set_modified(original))
                    .map_err(write_error)?;
            }
        }
        if let Some(cache) = self.cache {
            cache.invalidate(&self.paths.key(relative));
        }
        debug!(path = %relative.display(), %category, changes = changes.len(), "file repaired");

        let after = self.read(relative)?;
        Ok(Some(self.reparse(relative, &after)))
    }
}
