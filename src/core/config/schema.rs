//! core::config::schema
//!
//! Configuration file schema.
//!
//! Global and corpus files share one shape: every key is optional, and a
//! key set in a later file overrides the earlier value.
//!
//! # Validation
//!
//! Values are validated after parsing (e.g. `root_id` must be a valid
//! document identifier, `required_fields` may not name an empty field).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::DocumentId;
use crate::engine::health::Severity;

/// One configuration file (global or corpus scope).
///
/// # Example
///
/// ```toml
/// min_words = 80
/// required_fields = ["id", "title", "parent", "breadcrumb", "status"]
/// date_tolerance_minutes = 60
/// referential_cycle_severity = "error"
/// root_id = "0"
///
/// [module_min_words]
/// "3" = 150
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Coverage threshold in words
    pub min_words: Option<usize>,

    /// Per-module coverage thresholds, keyed by identifier prefix
    pub module_min_words: Option<BTreeMap<String, usize>>,

    /// Front-matter fields a document must carry
    pub required_fields: Option<Vec<String>>,

    /// Corpus root relative to the working directory
    pub data_dir: Option<PathBuf>,

    /// Presentation only
    pub colors: Option<bool>,

    /// Presentation only
    pub verbose: Option<bool>,

    /// Drift window for `last_updated` vs file modification time
    pub date_tolerance_minutes: Option<u64>,

    /// Severity for cycles through `depends_on` edges
    pub referential_cycle_severity: Option<Severity>,

    /// Longest accepted line, in characters
    pub max_line_length: Option<usize>,

    /// Designated root document
    pub root_id: Option<String>,

    /// Recognized document extensions, without the dot
    pub extensions: Option<Vec<String>>,

    /// File name prefixes that are never scanned
    pub exclude_prefixes: Option<Vec<String>>,

    /// Directory names that are never descended into
    pub exclude_dirs: Option<Vec<String>>,

    /// Worker pool size
    pub workers: Option<usize>,

    /// Whether the hash cache is used
    pub cache: Option<bool>,

    /// Hash cache location, relative to the corpus root
    pub cache_path: Option<PathBuf>,

    /// Accepted values of the `type` front-matter field
    pub document_types: Option<Vec<String>>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(root) = &self.root_id {
            DocumentId::new(root.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("invalid root_id: {e}")))?;
        }

        if let Some(fields) = &self.required_fields {
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "required_fields cannot contain an empty name".to_string(),
                ));
            }
        }

        if let Some(modules) = &self.module_min_words {
            for prefix in modules.keys() {
                DocumentId::new(prefix.as_str()).map_err(|e| {
                    ConfigError::InvalidValue(format!("invalid module_min_words key: {e}"))
                })?;
            }
        }

        if let Some(extensions) = &self.extensions {
            if extensions.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "extensions cannot be empty".to_string(),
                ));
            }
            if let Some(bad) = extensions.iter().find(|e| e.starts_with('.')) {
                return Err(ConfigError::InvalidValue(format!(
                    "extension '{bad}' should not start with a dot"
                )));
            }
        }

        if let Some(types) = &self.document_types {
            if types.iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(
                    "document_types cannot contain an empty name".to_string(),
                ));
            }
        }

        if self.workers == Some(0) {
            return Err(ConfigError::InvalidValue(
                "workers must be at least 1".to_string(),
            ));
        }

        if self.max_line_length == Some(0) {
            return Err(ConfigError::InvalidValue(
                "max_line_length must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
