//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Corpus config file
//! 4. Explicit `--config` file
//! 5. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$CORPUSCHECK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/corpuscheck/config.toml`
//! 3. `~/.corpuscheck/config.toml`
//!
//! # Corpus Config Locations
//!
//! Searched in order:
//! 1. `<root>/.corpuscheck/config.toml` (canonical)
//! 2. `<root>/corpuscheck.toml` (compatibility, warns)
//!
//! # Example
//!
//! ```no_run
//! use corpuscheck::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Path::new("/path/to/docs"), None).unwrap();
//! let config = result.config;
//! println!("min words: {}", config.min_words);
//! ```

pub mod schema;

pub use schema::ConfigFile;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::CorpusPaths;
use crate::core::types::{DocumentId, Fingerprint};
use crate::engine::health::Severity;

/// Fields every document must carry regardless of configuration.
pub const MINIMUM_REQUIRED_FIELDS: [&str; 5] = ["id", "title", "parent", "breadcrumb", "status"];

/// Default required field set.
pub const DEFAULT_REQUIRED_FIELDS: [&str; 7] = [
    "id",
    "title",
    "parent",
    "breadcrumb",
    "status",
    "last_updated",
    "content_hash",
];

/// Default accepted values of the `type` front-matter field.
pub const DEFAULT_DOCUMENT_TYPES: [&str; 14] = [
    "leaf",
    "module",
    "section",
    "container",
    "index",
    "master_index",
    "specification",
    "document",
    "integration",
    "testing",
    "feature",
    "strategy",
    "configuration",
    "edge_case",
];

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The resolved configuration.
    pub config: EngineConfig,
    /// Files that contributed, in application order.
    pub sources: Vec<PathBuf>,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Fully resolved engine configuration.
///
/// Every value is concrete; defaults have already been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub min_words: usize,
    pub module_min_words: BTreeMap<String, usize>,
    pub required_fields: Vec<String>,
    pub data_dir: PathBuf,
    pub colors: bool,
    pub verbose: bool,
    pub date_tolerance_minutes: u64,
    pub referential_cycle_severity: Severity,
    pub max_line_length: usize,
    pub root_id: Option<DocumentId>,
    pub extensions: Vec<String>,
    pub exclude_prefixes: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub workers: usize,
    pub cache: bool,
    pub cache_path: Option<PathBuf>,
    /// Lowercase names accepted in the `type` field.
    pub document_types: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_words: 50,
            module_min_words: BTreeMap::new(),
            required_fields: DEFAULT_REQUIRED_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            data_dir: PathBuf::from("."),
            colors: true,
            verbose: false,
            date_tolerance_minutes: 1440,
            referential_cycle_severity: Severity::Warning,
            max_line_length: 300,
            root_id: None,
            extensions: vec!["md".to_string()],
            exclude_prefixes: vec![
                "test_".to_string(),
                "_test".to_string(),
                "fixture_".to_string(),
            ],
            exclude_dirs: vec![".git".to_string(), ".corpuscheck".to_string()],
            workers: default_workers(),
            cache: true,
            cache_path: None,
            document_types: DEFAULT_DOCUMENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl EngineConfig {
    /// Apply one configuration file on top of the current values.
    pub fn apply(&mut self, file: &ConfigFile) -> Result<(), ConfigError> {
        file.validate()?;

        if let Some(v) = file.min_words {
            self.min_words = v;
        }
        if let Some(v) = &file.module_min_words {
            self.module_min_words = v.clone();
        }
        if let Some(v) = &file.required_fields {
            self.required_fields = v.iter().map(|f| f.trim().to_string()).collect();
        }
        if let Some(v) = &file.data_dir {
            self.data_dir = v.clone();
        }
        if let Some(v) = file.colors {
            self.colors = v;
        }
        if let Some(v) = file.verbose {
            self.verbose = v;
        }
        if let Some(v) = file.date_tolerance_minutes {
            self.date_tolerance_minutes = v;
        }
        if let Some(v) = file.referential_cycle_severity {
            self.referential_cycle_severity = v;
        }
        if let Some(v) = file.max_line_length {
            self.max_line_length = v;
        }
        if let Some(v) = &file.root_id {
            self.root_id = Some(
                DocumentId::new(v.as_str())
                    .map_err(|e| ConfigError::InvalidValue(format!("invalid root_id: {e}")))?,
            );
        }
        if let Some(v) = &file.extensions {
            self.extensions = v.clone();
        }
        if let Some(v) = &file.exclude_prefixes {
            self.exclude_prefixes = v.clone();
        }
        if let Some(v) = &file.exclude_dirs {
            self.exclude_dirs = v.clone();
        }
        if let Some(v) = file.workers {
            self.workers = v;
        }
        if let Some(v) = file.cache {
            self.cache = v;
        }
        if let Some(v) = &file.cache_path {
            self.cache_path = Some(v.clone());
        }
        if let Some(v) = &file.document_types {
            self.document_types = v.iter().map(|t| t.trim().to_lowercase()).collect();
        }
        Ok(())
    }

    /// The required field set actually enforced: the configured set plus
    /// the fields that are always required, without duplicates.
    pub fn effective_required_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = MINIMUM_REQUIRED_FIELDS
            .iter()
            .map(|s| s.to_string())
            .collect();
        for field in &self.required_fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }

    /// Coverage threshold for a document: the most specific matching
    /// `module_min_words` prefix, else `min_words`.
    pub fn min_words_for(&self, id: Option<&DocumentId>) -> usize {
        let Some(id) = id else {
            return self.min_words;
        };
        self.module_min_words
            .iter()
            .filter(|(prefix, _)| id.is_under(prefix))
            .max_by_key(|(prefix, _)| prefix.split('.').count())
            .map(|(_, words)| *words)
            .unwrap_or(self.min_words)
    }

    /// Whether a `type` value is one of the accepted document types.
    pub fn is_known_type(&self, value: &str) -> bool {
        let value = value.trim().to_lowercase();
        self.document_types.iter().any(|t| *t == value)
    }

    /// Hash cache location for a corpus.
    pub fn cache_location(&self, paths: &CorpusPaths) -> PathBuf {
        match &self.cache_path {
            Some(path) => paths.resolve(path),
            None => paths.default_cache_path(),
        }
    }

    /// Fingerprint of every option that can change a phase result.
    ///
    /// Presentation options, worker count and scan filters are excluded.
    pub fn fingerprint(&self) -> Fingerprint {
        let modules = serde_json::to_string(&self.module_min_words).unwrap_or_default();
        Fingerprint::compute(&[
            ("version", env!("CARGO_PKG_VERSION").to_string()),
            ("min_words", self.min_words.to_string()),
            ("module_min_words", modules),
            ("required_fields", self.effective_required_fields().join(",")),
            (
                "date_tolerance_minutes",
                self.date_tolerance_minutes.to_string(),
            ),
            (
                "referential_cycle_severity",
                self.referential_cycle_severity.to_string(),
            ),
            ("max_line_length", self.max_line_length.to_string()),
            ("document_types", self.document_types.join(",")),
            (
                "root_id",
                self.root_id
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            ),
        ])
    }
}

/// Configuration loader.
pub struct Config;

impl Config {
    /// Load configuration for a corpus from default locations.
    ///
    /// `explicit` is an additional file (e.g. from `--config`) applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_layers(Self::find_global(), root, explicit)
    }

    /// Load with an already resolved global file.
    pub fn load_layers(
        global: Option<PathBuf>,
        root: &Path,
        explicit: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut config = EngineConfig::default();
        let mut sources = Vec::new();
        let mut warnings = Vec::new();

        if let Some(path) = global {
            config.apply(&Self::read_file(&path)?)?;
            sources.push(path);
        }

        if let Some(path) = Self::find_corpus(root, &mut warnings) {
            config.apply(&Self::read_file(&path)?)?;
            sources.push(path);
        }

        if let Some(path) = explicit {
            config.apply(&Self::read_file(path)?)?;
            sources.push(path.to_path_buf());
        }

        Ok(ConfigLoadResult {
            config,
            sources,
            warnings,
        })
    }

    /// Locate the global configuration file, if any.
    pub fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CORPUSCHECK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("corpuscheck/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".corpuscheck/config.toml"))
            .filter(|path| path.exists())
    }

    fn find_corpus(root: &Path, warnings: &mut Vec<ConfigWarning>) -> Option<PathBuf> {
        let paths = CorpusPaths::new(root.to_path_buf());

        let canonical = paths.config_path();
        if canonical.exists() {
            return Some(canonical);
        }

        let compat = paths.compat_config_path();
        if compat.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Using deprecated config location. Please move to '{}'",
                    canonical.display()
                ),
                path: compat.clone(),
            });
            return Some(compat);
        }

        None
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_corpus_config(root: &Path, contents: &str) {
        let dir = root.join(".corpuscheck");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), contents).unwrap();
    }

    #[test]
    fn defaults_without_files() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_layers(None, temp.path(), None).unwrap();
        let config = result.config;

        assert_eq!(config.min_words, 50);
        assert_eq!(config.date_tolerance_minutes, 1440);
        assert_eq!(config.referential_cycle_severity, Severity::Warning);
        assert_eq!(config.max_line_length, 300);
        assert_eq!(config.required_fields.len(), 7);
        assert!(result.sources.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn corpus_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "min_words = 10\nmax_line_length = 120").unwrap();
        write_corpus_config(temp.path(), "min_words = 20");

        let result = Config::load_layers(Some(global), temp.path(), None).unwrap();
        assert_eq!(result.config.min_words, 20);
        assert_eq!(result.config.max_line_length, 120);
        assert_eq!(result.sources.len(), 2);
    }

    #[test]
    fn explicit_file_applied_last() {
        let temp = TempDir::new().unwrap();
        write_corpus_config(temp.path(), "min_words = 20");
        let explicit = temp.path().join("ci.toml");
        fs::write(&explicit, "min_words = 5").unwrap();

        let result = Config::load_layers(None, temp.path(), Some(&explicit)).unwrap();
        assert_eq!(result.config.min_words, 5);
    }

    #[test]
    fn compat_location_warns() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("corpuscheck.toml"), "min_words = 7").unwrap();

        let result = Config::load_layers(None, temp.path(), None).unwrap();
        assert_eq!(result.config.min_words, 7);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("deprecated"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        write_corpus_config(temp.path(), "min_words = 7\nunknown_field = true");
        assert!(Config::load_layers(None, temp.path(), None).is_err());
    }

    #[test]
    fn minimum_fields_always_enforced() {
        let config = EngineConfig {
            required_fields: vec!["title".to_string(), "owner".to_string()],
            ..Default::default()
        };
        let fields = config.effective_required_fields();
        for required in MINIMUM_REQUIRED_FIELDS {
            assert!(fields.iter().any(|f| f == required));
        }
        assert!(fields.iter().any(|f| f == "owner"));
        assert_eq!(fields.iter().filter(|f| *f == "title").count(), 1);
    }

    #[test]
    fn most_specific_module_threshold_wins() {
        let mut modules = BTreeMap::new();
        modules.insert("3".to_string(), 100);
        modules.insert("3.1".to_string(), 200);
        let config = EngineConfig {
            module_min_words: modules,
            ..Default::default()
        };

        let deep = DocumentId::new("3.1.4").unwrap();
        let sibling = DocumentId::new("3.2").unwrap();
        let other = DocumentId::new("4").unwrap();
        assert_eq!(config.min_words_for(Some(&deep)), 200);
        assert_eq!(config.min_words_for(Some(&sibling)), 100);
        assert_eq!(config.min_words_for(Some(&other)), 50);
        assert_eq!(config.min_words_for(None), 50);
    }

    #[test]
    fn fingerprint_tracks_result_affecting_options() {
        let base = EngineConfig::default();
        let presentation = EngineConfig {
            colors: false,
            workers: 3,
            ..Default::default()
        };
        let stricter = EngineConfig {
            min_words: 99,
            ..Default::default()
        };
        assert_eq!(base.fingerprint(), presentation.fingerprint());
        assert_ne!(base.fingerprint(), stricter.fingerprint());
    }

    #[test]
    fn cache_location_resolves_relative_to_root() {
        let paths = CorpusPaths::new(PathBuf::from("/docs"));
        let mut config = EngineConfig::default();
        assert_eq!(
            config.cache_location(&paths),
            PathBuf::from("/docs/.corpuscheck/cache.json")
        );
        config.cache_path = Some(PathBuf::from("build/cache.json"));
        assert_eq!(
            config.cache_location(&paths),
            PathBuf::from("/docs/build/cache.json")
        );
    }
}
