//! engine::scan
//!
//! Corpus discovery.
//!
//! # Architecture
//!
//! The scanner walks the corpus root with `walkdir` and yields candidate
//! document paths relative to the root. [`Scanner::paths`] is lazy and can
//! be called again to restart the walk; [`Scanner::collect`] drains it into
//! a sorted list.
//!
//! # Invariants
//!
//! - Scan is read-only
//! - An unreadable entry below the root is a warning, never fatal
//! - A missing or unreadable root is fatal
//! - Excluded directories are pruned, not filtered after descent

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::core::config::EngineConfig;

/// Fatal scan errors.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("corpus root {path} is not readable: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus root {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// A path that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    /// Relative to the root; empty when walkdir could not tell.
    pub path: PathBuf,
    pub message: String,
}

/// One step of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanItem {
    File(PathBuf),
    Warning(ScanWarning),
}

/// The drained result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Candidate documents, relative to the root, in `Path` order
    /// (component by component, so `1/1.1.md` precedes `1.md`).
    pub files: Vec<PathBuf>,
    pub warnings: Vec<ScanWarning>,
}

/// Walks a corpus root.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    extensions: Vec<String>,
    exclude_prefixes: Vec<String>,
    exclude_dirs: Vec<String>,
}

impl Scanner {
    pub fn new(root: &Path, config: &EngineConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            extensions: config.extensions.clone(),
            exclude_prefixes: config.exclude_prefixes.clone(),
            exclude_dirs: config.exclude_dirs.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Confirm the root exists and can be listed.
    pub fn check_root(&self) -> Result<(), ScanError> {
        let meta = fs::metadata(&self.root).map_err(|source| ScanError::RootUnreadable {
            path: self.root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        fs::read_dir(&self.root).map_err(|source| ScanError::RootUnreadable {
            path: self.root.clone(),
            source,
        })?;
        Ok(())
    }

    /// Lazily walk the corpus. Each call starts a fresh walk.
    pub fn paths(&self) -> impl Iterator<Item = ScanItem> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| entry.depth() == 0 || !self.is_excluded_dir(entry))
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.accepts_file(entry.path()) {
                        Some(ScanItem::File(self.relative(entry.path())))
                    } else {
                        None
                    }
                }
                Err(err) => Some(ScanItem::Warning(ScanWarning {
                    path: err.path().map(|p| self.relative(p)).unwrap_or_default(),
                    message: err
                        .io_error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| err.to_string()),
                })),
            })
    }

    /// Check the root, then drain a full walk.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] only when the root itself cannot be read.
    pub fn collect(&self) -> Result<ScanResult, ScanError> {
        self.check_root()?;

        let mut result = ScanResult::default();
        for item in self.paths() {
            match item {
                ScanItem::File(path) => result.files.push(path),
                ScanItem::Warning(warning) => {
                    warn!(
                        path = %warning.path.display(),
                        error = %warning.message,
                        "skipping unreadable path"
                    );
                    result.warnings.push(warning);
                }
            }
        }
        result.files.sort();

        debug!(
            root = %self.root.display(),
            files = result.files.len(),
            warnings = result.warnings.len(),
            "scan complete"
        );
        Ok(result)
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.exclude_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    fn accepts_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.exclude_prefixes.iter().any(|p| name.starts_with(p.as_str())) {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
