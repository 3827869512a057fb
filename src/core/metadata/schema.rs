//! core::metadata::schema
//!
//! Front-matter schema and typed field decoding.
//!
//! # Schema Design
//!
//! - The schema is data: a list of [`FieldSpec`]s, each with a type and a
//!   required flag, built from the configured required-field set
//! - Absent and mistyped fields are different violations
//!   ([`ViolationKind::Missing`] vs [`ViolationKind::Malformed`])
//! - Unknown fields are never violations; they are retained as extras
//!
//! # Dates
//!
//! Timestamps accept `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM`,
//! `YYYY-MM-DD` (local midnight) and RFC 3339.
//!
//! # Example
//!
//! ```
//! use corpuscheck::core::metadata::frontmatter::split_frontmatter;
//! use corpuscheck::core::metadata::schema::{SchemaDefinition, ViolationKind};
//!
//! let schema = SchemaDefinition::standard(&["id".into(), "title".into()]);
//! let (fm, _) = split_frontmatter("---\nid: \"1..2\"\n---\n").unwrap();
//! let violations = schema.validate(&fm);
//!
//! assert_eq!(violations.len(), 2);
//! assert!(violations.iter().any(|v| v.field == "title" && v.kind == ViolationKind::Missing));
//! ```

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;

use super::frontmatter::Frontmatter;
use crate::core::types::{Breadcrumb, ContentHash, DocStatus, DocumentId};

/// Fields where an empty string is a meaningful value.
const EMPTY_IS_VALUE: [&str; 2] = ["parent", "breadcrumb"];

/// Format written by repairs.
pub const WRITE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Type expected for a front-matter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Any value; only presence is checked
    Any,
    String,
    Integer,
    Date,
    Identifier,
    IdentifierList,
    Breadcrumb,
    Enum(Vec<String>),
    Hash,
}

impl FieldType {
    fn describe(&self) -> String {
        match self {
            FieldType::Any => "any value".to_string(),
            FieldType::String => "a string".to_string(),
            FieldType::Integer => "a non-negative integer".to_string(),
            FieldType::Date => "a date (YYYY-MM-DD[ HH:MM[:SS]] or RFC 3339)".to_string(),
            FieldType::Identifier => "a document identifier".to_string(),
            FieldType::IdentifierList => "a list of document identifiers".to_string(),
            FieldType::Breadcrumb => "a breadcrumb (list or 'a > b')".to_string(),
            FieldType::Enum(values) => format!("one of: {}", values.join(", ")),
            FieldType::Hash => format!("{} hex characters", ContentHash::LEN),
        }
    }
}

/// One field in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
}

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Missing,
    Malformed { expected: String, found: String },
}

/// A single schema violation on one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub field: String,
    pub kind: ViolationKind,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "required field '{}' is missing", self.field),
            ViolationKind::Malformed { expected, found } => write!(
                f,
                "field '{}' is malformed: expected {expected}, found {found}",
                self.field
            ),
        }
    }
}

/// The front-matter schema applied to every document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    fields: Vec<FieldSpec>,
}

impl SchemaDefinition {
    /// The known field types with `required` flagged from the given set.
    ///
    /// Required names outside the known set are checked for presence only.
    pub fn standard(required: &[String]) -> Self {
        let statuses = DocStatus::ALL
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let known = [
            ("id", FieldType::Identifier),
            ("title", FieldType::String),
            ("parent", FieldType::Identifier),
            ("breadcrumb", FieldType::Breadcrumb),
            ("status", FieldType::Enum(statuses)),
            ("last_updated", FieldType::Date),
            ("content_hash", FieldType::Hash),
            ("depends_on", FieldType::IdentifierList),
            ("children_count", FieldType::Integer),
        ];

        let mut fields: Vec<FieldSpec> = known
            .into_iter()
            .map(|(name, field_type)| FieldSpec {
                name: name.to_string(),
                field_type,
                required: required.iter().any(|r| r == name),
            })
            .collect();

        for name in required {
            if !fields.iter().any(|f| &f.name == name) {
                fields.push(FieldSpec {
                    name: name.clone(),
                    field_type: FieldType::Any,
                    required: true,
                });
            }
        }

        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.field(name).map(|f| f.required).unwrap_or(false)
    }

    /// Validate decoded front-matter against the schema.
    ///
    /// Violations are returned in schema order. `parent: null` is accepted
    /// as present; it marks a root document. So is an empty `breadcrumb`.
    pub fn validate(&self, fm: &Frontmatter) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        for spec in &self.fields {
            let value = fm.fields.get(&spec.name);
            let absent = match value {
                None => true,
                Some(Value::Null) => spec.name != "parent",
                Some(Value::String(s)) => s.trim().is_empty() && !EMPTY_IS_VALUE.contains(&spec.name.as_str()),
                Some(_) => false,
            };

            if absent {
                if spec.required {
                    violations.push(SchemaViolation {
                        field: spec.name.clone(),
                        kind: ViolationKind::Missing,
                    });
                }
                continue;
            }

            if let Err(found) = check_type(fm, &spec.name, &spec.field_type) {
                violations.push(SchemaViolation {
                    field: spec.name.clone(),
                    kind: ViolationKind::Malformed {
                        expected: spec.field_type.describe(),
                        found,
                    },
                });
            }
        }
        violations
    }
}

fn check_type(fm: &Frontmatter, name: &str, field_type: &FieldType) -> Result<(), String> {
    match field_type {
        FieldType::Any => Ok(()),
        FieldType::String => string_field(fm, name).map(|_| ()),
        FieldType::Integer => integer_field(fm, name).map(|_| ()),
        FieldType::Date => date_field(fm, name).map(|_| ()),
        FieldType::Identifier => identifier_field(fm, name).map(|_| ()),
        FieldType::IdentifierList => identifier_list_field(fm, name).map(|_| ()),
        FieldType::Breadcrumb => breadcrumb_field(fm, name).map(|_| ()),
        FieldType::Hash => hash_field(fm, name).map(|_| ()),
        FieldType::Enum(values) => {
            let text = string_field(fm, name)?.unwrap_or_default();
            let lowered = text.trim().to_ascii_lowercase();
            if values.iter().any(|v| *v == lowered) {
                Ok(())
            } else {
                Err(format!("'{text}'"))
            }
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

/// Read a string field. Numbers and booleans are accepted as their text.
pub fn string_field(fm: &Frontmatter, name: &str) -> Result<Option<String>, String> {
    match fm.fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(_)) | Some(Value::Bool(_)) => {
            Ok(fm.scalar_text(name).or_else(|| fm.fields.get(name).map(|v| v.to_string())))
        }
        Some(other) => Err(describe(other)),
    }
}

/// Read a non-negative integer field.
pub fn integer_field(fm: &Frontmatter, name: &str) -> Result<Option<u64>, String> {
    match fm.fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| n.to_string()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format!("'{s}'")),
        Some(other) => Err(describe(other)),
    }
}

/// Read a date field.
pub fn date_field(fm: &Frontmatter, name: &str) -> Result<Option<DateTime<Local>>, String> {
    match string_field(fm, name)? {
        None => Ok(None),
        Some(text) => parse_timestamp(&text)
            .map(Some)
            .ok_or_else(|| format!("'{text}'")),
    }
}

/// Read an identifier field. Empty strings read as absent.
pub fn identifier_field(fm: &Frontmatter, name: &str) -> Result<Option<DocumentId>, String> {
    match string_field(fm, name)? {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => DocumentId::new(reference_target(&text))
            .map(Some)
            .map_err(|_| format!("'{text}'")),
    }
}

/// Read a list of identifiers. A single scalar is a one-element list.
pub fn identifier_list_field(fm: &Frontmatter, name: &str) -> Result<Vec<DocumentId>, String> {
    let items: Vec<String> = match fm.fields.get(name) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(describe(other)),
            })
            .collect::<Result<_, _>>()?,
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::Number(n)) => vec![fm.scalar_text(name).unwrap_or_else(|| n.to_string())],
        Some(other) => return Err(describe(other)),
    };

    items
        .iter()
        .map(|item| DocumentId::new(reference_target(item)).map_err(|_| format!("'{item}'")))
        .collect()
}

/// Read a breadcrumb field: a list of identifiers or a `>`/`/` separated
/// string.
pub fn breadcrumb_field(fm: &Frontmatter, name: &str) -> Result<Option<Breadcrumb>, String> {
    match fm.fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(_)) => identifier_list_field(fm, name).map(|ids| Some(Breadcrumb::new(ids))),
        Some(Value::String(s)) => Breadcrumb::parse(s)
            .map(Some)
            .map_err(|_| format!("'{s}'")),
        Some(Value::Number(_)) => {
            let text = fm.scalar_text(name).unwrap_or_default();
            Breadcrumb::parse(&text)
                .map(Some)
                .map_err(|_| format!("'{text}'"))
        }
        Some(other) => Err(describe(other)),
    }
}

/// Read a stored content hash.
pub fn hash_field(fm: &Frontmatter, name: &str) -> Result<Option<ContentHash>, String> {
    match string_field(fm, name)? {
        None => Ok(None),
        Some(text) => ContentHash::new(text.as_str())
            .map(Some)
            .map_err(|_| format!("'{text}'")),
    }
}

/// Strip wikilink decoration from a reference: `[[1.2 Scope]]` reads as
/// `1.2`.
fn reference_target(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("[[")
        .and_then(|t| t.strip_suffix("]]"))
        .unwrap_or(text);
    inner
        .split(|c: char| c.is_whitespace() || c == '|' || c == '#')
        .next()
        .unwrap_or(inner)
}

/// Parse a timestamp in any accepted format, in local time.
///
/// # Example
///
/// ```
/// use corpuscheck::core::metadata::schema::parse_timestamp;
///
/// assert!(parse_timestamp("2024-03-01 12:30").is_some());
/// assert!(parse_timestamp("2024-03-01").is_some());
/// assert!(parse_timestamp("2024-03-01T12:30:00Z").is_some());
/// assert!(parse_timestamp("March 1st").is_none());
/// ```
pub fn parse_timestamp(text: &str) -> Option<DateTime<Local>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

/// Render a timestamp the way repairs write it.
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format(WRITE_DATE_FORMAT).to_string()
}
