//! core::paths
//!
//! Centralized path routing for corpuscheck storage locations.
//!
//! # Storage Layout
//!
//! All engine state lives under `<root>/.corpuscheck/`:
//! - `config.toml` - Corpus configuration
//! - `lock` - Exclusive lock file held during repairs
//! - `cache.json` - Default hash cache location
//!
//! `<root>/corpuscheck.toml` is accepted as a compatibility location for
//! the corpus configuration.
//!
//! # Example
//!
//! ```
//! use corpuscheck::core::paths::CorpusPaths;
//! use std::path::PathBuf;
//!
//! let paths = CorpusPaths::new(PathBuf::from("/docs"));
//! assert_eq!(
//!     paths.config_path(),
//!     PathBuf::from("/docs/.corpuscheck/config.toml")
//! );
//! assert_eq!(
//!     paths.relative(&PathBuf::from("/docs/1/intro.md")),
//!     PathBuf::from("1/intro.md")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Name of the state directory under the corpus root.
pub const STATE_DIR: &str = ".corpuscheck";

/// Centralized path routing for one corpus.
///
/// # Invariants
///
/// - No code outside this module joins `STATE_DIR` onto a root
/// - Cache keys are always produced by [`CorpusPaths::relative`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    /// The corpus root directory.
    pub root: PathBuf,
}

impl CorpusPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base directory for engine state: `<root>/.corpuscheck/`
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// Canonical corpus config: `<root>/.corpuscheck/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.toml")
    }

    /// Compatibility corpus config: `<root>/corpuscheck.toml`
    pub fn compat_config_path(&self) -> PathBuf {
        self.root.join("corpuscheck.toml")
    }

    /// Lock file: `<root>/.corpuscheck/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    /// Default cache store: `<root>/.corpuscheck/cache.json`
    pub fn default_cache_path(&self) -> PathBuf {
        self.state_dir().join("cache.json")
    }

    /// Resolve a configured path: absolute paths are kept, relative ones
    /// are taken relative to the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Path relative to the root, falling back to the input when it lies
    /// outside the root.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    /// Stable string key for a path: relative, with `/` separators.
    pub fn key(&self, path: &Path) -> String {
        self.relative(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_locations() {
        let paths = CorpusPaths::new(PathBuf::from("/docs"));
        assert_eq!(paths.state_dir(), PathBuf::from("/docs/.corpuscheck"));
        assert_eq!(paths.lock_path(), PathBuf::from("/docs/.corpuscheck/lock"));
        assert_eq!(
            paths.default_cache_path(),
            PathBuf::from("/docs/.corpuscheck/cache.json")
        );
        assert_eq!(
            paths.compat_config_path(),
            PathBuf::from("/docs/corpuscheck.toml")
        );
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let paths = CorpusPaths::new(PathBuf::from("/docs"));
        assert_eq!(
            paths.resolve(Path::new("/tmp/cache.json")),
            PathBuf::from("/tmp/cache.json")
        );
        assert_eq!(
            paths.resolve(Path::new("state/cache.json")),
            PathBuf::from("/docs/state/cache.json")
        );
    }

    #[test]
    fn key_uses_forward_slashes() {
        let paths = CorpusPaths::new(PathBuf::from("/docs"));
        let path = PathBuf::from("/docs").join("1").join("1.1").join("a.md");
        assert_eq!(paths.key(&path), "1/1.1/a.md");
    }

    #[test]
    fn relative_outside_root_is_unchanged() {
        let paths = CorpusPaths::new(PathBuf::from("/docs"));
        assert_eq!(
            paths.relative(Path::new("/other/a.md")),
            PathBuf::from("/other/a.md")
        );
    }
}
