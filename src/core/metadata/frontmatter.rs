//! core::metadata::frontmatter
//!
//! Splits a document into its YAML front-matter block and body.
//!
//! # Format
//!
//! The first line must be `---` (a leading BOM is tolerated). The block
//! ends at the next line that is exactly `---` or `...`. Everything after
//! the closing delimiter is the body.
//!
//! The block is decoded with `serde_yaml` and converted to
//! `serde_json::Value` so downstream validation handles a single value type.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Errors from front-matter extraction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrontmatterError {
    #[error("missing front-matter: first line is not '---'")]
    Missing,

    #[error("unterminated front-matter: no closing '---' after line {opened_at}")]
    Unterminated { opened_at: usize },

    #[error("invalid front-matter YAML: {0}")]
    Yaml(String),
}

/// A decoded front-matter block.
#[derive(Debug, Clone, PartialEq)]
pub struct Frontmatter {
    /// Decoded fields, ordered by name.
    pub fields: BTreeMap<String, Value>,
    /// The raw YAML text between the delimiters.
    pub raw: String,
    /// 1-based line number of the closing delimiter.
    pub end_line: usize,
}

impl Frontmatter {
    /// The literal text of a top-level scalar, as written.
    ///
    /// YAML reads `id: 1.10` as the float `1.1`; identifiers are recovered
    /// from the source text instead of the decoded number.
    pub fn scalar_text(&self, key: &str) -> Option<String> {
        self.raw.lines().find_map(|line| {
            let rest = line.strip_prefix(key)?.strip_prefix(':')?;
            let value = match rest.find(" #") {
                Some(idx) => &rest[..idx],
                None => rest,
            };
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| value.to_string())
        })
    }
}

/// Split content into decoded front-matter and body text.
///
/// # Errors
///
/// - [`FrontmatterError::Missing`] if the first line is not `---`
/// - [`FrontmatterError::Unterminated`] if no closing delimiter follows
/// - [`FrontmatterError::Yaml`] if the block is not a YAML mapping
///
/// # Example
///
/// ```
/// use corpuscheck::core::metadata::frontmatter::split_frontmatter;
///
/// let (fm, body) = split_frontmatter("---\ntitle: Intro\n---\n# Intro\n").unwrap();
/// assert_eq!(fm.fields["title"], "Intro");
/// assert_eq!(body, "# Intro\n");
/// ```
pub fn split_frontmatter(content: &str) -> Result<(Frontmatter, &str), FrontmatterError> {
    let content = content.trim_start_matches('\u{feff}');

    let first_end = content.find('\n').unwrap_or(content.len());
    if content[..first_end].trim_end() != "---" {
        return Err(FrontmatterError::Missing);
    }

    let mut offset = (first_end + 1).min(content.len());
    let yaml_start = offset;
    let mut line_no = 1;

    while offset < content.len() {
        line_no += 1;
        let line_end = content[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(content.len());
        let line = content[offset..line_end].trim_end();

        if line == "---" || line == "..." {
            let raw = &content[yaml_start..offset];
            let body_start = (line_end + 1).min(content.len());
            let fields = decode(raw)?;
            return Ok((
                Frontmatter {
                    fields,
                    raw: raw.to_string(),
                    end_line: line_no,
                },
                &content[body_start..],
            ));
        }
        offset = line_end + 1;
    }

    Err(FrontmatterError::Unterminated { opened_at: 1 })
}

fn decode(raw: &str) -> Result<BTreeMap<String, Value>, FrontmatterError> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let yaml: serde_yaml::Value =
        serde_yaml::from_str(raw).map_err(|e| FrontmatterError::Yaml(e.to_string()))?;
    let json: Value =
        serde_json::to_value(yaml).map_err(|e| FrontmatterError::Yaml(e.to_string()))?;

    match json {
        Value::Object(map) => Ok(map.into_iter().collect()),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(FrontmatterError::Yaml(format!(
            "expected a mapping, found {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
