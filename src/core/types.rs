//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`DocumentId`] - Validated hierarchical document identifier (`3.1.7`)
//! - [`DocStatus`] - Closed set of document lifecycle states
//! - [`Breadcrumb`] - Declared ancestor chain, root first
//! - [`ContentHash`] - Truncated SHA-256 digest of a document body
//! - [`Fingerprint`] - Stable hash over configuration that affects results
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so a document that made it into the registry
//! with an identifier always has a well-formed one.
//!
//! # Examples
//!
//! ```
//! use corpuscheck::core::types::{Breadcrumb, DocumentId};
//!
//! let id = DocumentId::new("3.1.7").unwrap();
//! assert_eq!(id.parent_prefix().unwrap().as_str(), "3.1");
//! assert!(id.is_under("3"));
//!
//! let crumb = Breadcrumb::parse("0 > 3 > 3.1").unwrap();
//! assert_eq!(crumb.len(), 3);
//!
//! assert!(DocumentId::new("3..1").is_err());
//! ```

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("invalid status '{0}', expected one of: active, prepared, future, accepted, archived")]
    InvalidStatus(String),

    #[error("invalid breadcrumb: {0}")]
    InvalidBreadcrumb(String),

    #[error("invalid content hash: {0}")]
    InvalidHash(String),
}

/// A validated hierarchical document identifier.
///
/// Identifiers are dot-separated segments. Each segment is a non-empty run
/// of ASCII alphanumerics, `-` or `_`. Numeric segments order numerically,
/// so `3.10` sorts after `3.9`.
///
/// # Example
///
/// ```
/// use corpuscheck::core::types::DocumentId;
///
/// let a = DocumentId::new("3.9").unwrap();
/// let b = DocumentId::new("3.10").unwrap();
/// assert!(a < b);
///
/// assert!(DocumentId::new("").is_err());
/// assert!(DocumentId::new("3.").is_err());
/// assert!(DocumentId::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new validated identifier.
    ///
    /// Surrounding whitespace and quotes are trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidDocumentId` if any segment is empty or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        let id = id.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<(), TypeError> {
        if id.is_empty() {
            return Err(TypeError::InvalidDocumentId(
                "identifier cannot be empty".into(),
            ));
        }
        for segment in id.split('.') {
            if segment.is_empty() {
                return Err(TypeError::InvalidDocumentId(format!(
                    "'{id}' has an empty segment"
                )));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(TypeError::InvalidDocumentId(format!(
                    "'{id}' contains characters outside [A-Za-z0-9_-]"
                )));
            }
        }
        Ok(())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// First segment, which names the module the document belongs to.
    pub fn module(&self) -> &str {
        self.segments().next().unwrap_or(&self.0)
    }

    /// The identifier with its last segment removed, if any.
    ///
    /// This is a naming convention only; the authoritative parent is
    /// the declared `parent` field.
    pub fn parent_prefix(&self) -> Option<DocumentId> {
        self.0
            .rfind('.')
            .map(|idx| DocumentId(self.0[..idx].to_string()))
    }

    /// Check whether this identifier equals `prefix` or lies beneath it.
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('.');
        if prefix.is_empty() {
            return true;
        }
        self.0 == prefix
            || (self.0.starts_with(prefix) && self.0[prefix.len()..].starts_with('.'))
    }
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl Ord for DocumentId {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments();
        let mut right = other.segments();
        loop {
            match (left.next(), right.next()) {
                (Some(a), Some(b)) => match compare_segments(a, b) {
                    Ordering::Equal => continue,
                    unequal => return unequal,
                },
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (None, None) => return self.0.cmp(&other.0),
            }
        }
    }
}

impl PartialOrd for DocumentId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for DocumentId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl FromStr for DocumentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocStatus {
    Active,
    Prepared,
    Future,
    Accepted,
    Archived,
}

impl DocStatus {
    /// All states, in declaration order.
    pub const ALL: [DocStatus; 5] = [
        DocStatus::Active,
        DocStatus::Prepared,
        DocStatus::Future,
        DocStatus::Accepted,
        DocStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocStatus::Active => "active",
            DocStatus::Prepared => "prepared",
            DocStatus::Future => "future",
            DocStatus::Accepted => "accepted",
            DocStatus::Archived => "archived",
        }
    }
}

impl FromStr for DocStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        DocStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| TypeError::InvalidStatus(s.to_string()))
    }
}

impl std::fmt::Display for DocStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The declared ancestor chain of a document, root first, self excluded.
///
/// The root document has an empty breadcrumb.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Breadcrumb(Vec<DocumentId>);

impl Breadcrumb {
    /// Create a breadcrumb from already validated identifiers.
    pub fn new(ids: Vec<DocumentId>) -> Self {
        Self(ids)
    }

    /// Parse the string form: identifiers separated by `>` or `/`.
    ///
    /// An empty string is the root breadcrumb.
    ///
    /// # Example
    ///
    /// ```
    /// use corpuscheck::core::types::Breadcrumb;
    ///
    /// let crumb = Breadcrumb::parse("1 / 1.2").unwrap();
    /// assert_eq!(crumb.to_string(), "1 > 1.2");
    /// assert!(Breadcrumb::parse("").unwrap().is_empty());
    /// assert!(Breadcrumb::parse("1 > > 1.2").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        trimmed
            .split(['>', '/'])
            .map(|segment| {
                let segment = segment.trim();
                if segment.is_empty() {
                    return Err(TypeError::InvalidBreadcrumb(format!(
                        "'{s}' has an empty segment"
                    )));
                }
                DocumentId::new(segment)
                    .map_err(|e| TypeError::InvalidBreadcrumb(format!("'{s}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn ids(&self) -> &[DocumentId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last declared ancestor, which should be the parent.
    pub fn last(&self) -> Option<&DocumentId> {
        self.0.last()
    }
}

impl std::fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .0
            .iter()
            .map(DocumentId::as_str)
            .collect::<Vec<_>>()
            .join(" > ");
        f.write_str(&joined)
    }
}

/// Truncated SHA-256 digest of a document body (16 lowercase hex chars).
///
/// # Example
///
/// ```
/// use corpuscheck::core::types::ContentHash;
///
/// let a = ContentHash::of_body("Hello\r\nworld\n");
/// let b = ContentHash::of_body("Hello\nworld");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), ContentHash::LEN);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Number of hex characters kept from the digest.
    pub const LEN: usize = 16;

    /// Parse a stored hash. Case is normalized; quotes are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidHash` unless the value is exactly
    /// [`ContentHash::LEN`] hex characters.
    pub fn new(hash: impl Into<String>) -> Result<Self, TypeError> {
        let hash = hash.into();
        let hash = hash
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_ascii_lowercase();
        if hash.len() != Self::LEN || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidHash(format!(
                "expected {} hex characters, got '{hash}'",
                Self::LEN
            )));
        }
        Ok(Self(hash))
    }

    /// Hash a document body.
    ///
    /// Line endings are normalized to `\n` and surrounding whitespace is
    /// trimmed so that editor round trips do not register as drift.
    pub fn of_body(body: &str) -> Self {
        let normalized = body.replace("\r\n", "\n");
        let mut hasher = Sha256::new();
        hasher.update(normalized.trim().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..Self::LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentHash {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stable hash over the configuration values that influence phase results.
///
/// Stored alongside the hash cache: a cache written under a different
/// fingerprint is discarded, since its clean verdicts no longer hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint over `(key, value)` pairs.
    ///
    /// Pairs are sorted by key before hashing so input order does not matter.
    pub fn compute(pairs: &[(&str, String)]) -> Self {
        let mut sorted: Vec<_> = pairs.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (key, value) in sorted {
            hasher.update(key.as_bytes());
            hasher.update(b"\0");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod document_id {
        use super::*;

        #[test]
        fn valid_ids() {
            assert!(DocumentId::new("0").is_ok());
            assert!(DocumentId::new("3.1.7").is_ok());
            assert!(DocumentId::new("intro").is_ok());
            assert!(DocumentId::new("A-1.b_2").is_ok());
        }

        #[test]
        fn quotes_and_whitespace_trimmed() {
            let id = DocumentId::new(" \"1.2\" ").unwrap();
            assert_eq!(id.as_str(), "1.2");
        }

        #[test]
        fn invalid_ids_rejected() {
            assert!(DocumentId::new("").is_err());
            assert!(DocumentId::new(".1").is_err());
            assert!(DocumentId::new("1.").is_err());
            assert!(DocumentId::new("1..2").is_err());
            assert!(DocumentId::new("1/2").is_err());
            assert!(DocumentId::new("a b").is_err());
        }

        #[test]
        fn numeric_segments_order_numerically() {
            let mut ids: Vec<DocumentId> = ["1.10", "1.2", "1", "2", "1.2.1"]
                .iter()
                .map(|s| DocumentId::new(*s).unwrap())
                .collect();
            ids.sort();
            let sorted: Vec<&str> = ids.iter().map(DocumentId::as_str).collect();
            assert_eq!(sorted, vec!["1", "1.2", "1.2.1", "1.10", "2"]);
        }

        #[test]
        fn module_and_prefix() {
            let id = DocumentId::new("3.1.7").unwrap();
            assert_eq!(id.module(), "3");
            assert_eq!(id.depth(), 3);
            assert_eq!(id.parent_prefix().unwrap().as_str(), "3.1");
            assert!(DocumentId::new("3").unwrap().parent_prefix().is_none());
        }

        #[test]
        fn is_under_respects_segment_boundaries() {
            let id = DocumentId::new("3.10.1").unwrap();
            assert!(id.is_under("3"));
            assert!(id.is_under("3.10"));
            assert!(id.is_under("3.10.1"));
            assert!(!id.is_under("3.1"));
            assert!(id.is_under(""));
        }

        #[test]
        fn serde_roundtrip() {
            let id = DocumentId::new("2.4").unwrap();
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"2.4\"");
            let parsed: DocumentId = serde_json::from_str(&json).unwrap();
            assert_eq!(id, parsed);
        }
    }

    mod status {
        use super::*;

        #[test]
        fn parse_is_case_insensitive() {
            assert_eq!("Active".parse::<DocStatus>().unwrap(), DocStatus::Active);
            assert_eq!(
                " archived ".parse::<DocStatus>().unwrap(),
                DocStatus::Archived
            );
        }

        #[test]
        fn unknown_status_rejected() {
            assert_eq!(
                "draft".parse::<DocStatus>(),
                Err(TypeError::InvalidStatus("draft".into()))
            );
        }
    }

    mod breadcrumb {
        use super::*;

        #[test]
        fn parses_both_separators() {
            let a = Breadcrumb::parse("0 > 1 > 1.1").unwrap();
            let b = Breadcrumb::parse("0/1/1.1").unwrap();
            assert_eq!(a, b);
            assert_eq!(a.last().unwrap().as_str(), "1.1");
        }

        #[test]
        fn invalid_segment_rejected() {
            assert!(Breadcrumb::parse("0 > bad id").is_err());
        }
    }

    mod hash {
        use super::*;

        #[test]
        fn stored_hash_normalized() {
            let h = ContentHash::new("\"ABCDEF0123456789\"").unwrap();
            assert_eq!(h.as_str(), "abcdef0123456789");
        }

        #[test]
        fn wrong_length_rejected() {
            assert!(ContentHash::new("abc").is_err());
            assert!(ContentHash::new("zzzzzzzzzzzzzzzz").is_err());
        }

        #[test]
        fn body_hash_ignores_surrounding_whitespace() {
            assert_eq!(
                ContentHash::of_body("\n\nbody text\n"),
                ContentHash::of_body("body text")
            );
            assert_ne!(
                ContentHash::of_body("body text"),
                ContentHash::of_body("body  text")
            );
        }
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = Fingerprint::compute(&[("a", "1".into()), ("b", "2".into())]);
        let b = Fingerprint::compute(&[("b", "2".into()), ("a", "1".into())]);
        assert_eq!(a, b);
        let c = Fingerprint::compute(&[("a", "1".into()), ("b", "3".into())]);
        assert_ne!(a, c);
    }
}
