//! core::text
//!
//! Markdown body scanning shared by phases and repairs.
//!
//! # Patterns
//!
//! All regexes are compiled once through `once_cell::sync::Lazy`.
//!
//! # Code blocks
//!
//! Lines inside fenced code blocks (```` ``` ````) are not prose: headings,
//! tables, references and placeholders inside them are ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::DocumentId;

/// Wiki reference: `[[target]]`, `[[target|alias]]`, `[[target\|alias]]`.
/// A leading `!` marks an embed.
static WIKILINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(!?)\[\[([^\]]+)\]\]").expect("static pattern is valid")
});

/// Markdown image: `![alt](path "title")`.
static IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").expect("static pattern is valid")
});

/// ATX heading: `## Title ##`.
static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(#{1,6})[ \t]+(.+?)[ \t#]*$").expect("static pattern is valid")
});

/// Leading hierarchical identifier: `1.2.3` in `1.2.3. Scope`.
static HIERARCHICAL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)*)\.?(?:\s|$)").expect("static pattern is valid")
});

/// Table separator row: `|---|:---:|`.
static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?$")
        .expect("static pattern is valid")
});

/// Placeholder markers left in unfinished prose.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[TODO\]|\[TBD\]|\b(?:TBD|TODO|FIXME|XXX|PENDING)\b|(?i:lorem ipsum)|(?i:\bplaceholder\b)",
    )
    .expect("static pattern is valid")
});

/// A line of body text with its 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    pub number: usize,
    pub text: &'a str,
    pub in_code: bool,
}

/// Iterate body lines, marking those inside fenced code blocks.
///
/// Fence lines themselves are marked `in_code`.
pub fn lines(body: &str) -> Vec<Line<'_>> {
    let mut in_code = false;
    body.lines()
        .enumerate()
        .map(|(i, text)| {
            let fence = is_fence(text);
            let line = Line {
                number: i + 1,
                text,
                in_code: in_code || fence,
            };
            if fence {
                in_code = !in_code;
            }
            line
        })
        .collect()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Number of fence lines. An odd count means a block is never closed.
pub fn fence_count(body: &str) -> usize {
    body.lines().filter(|l| is_fence(l)).count()
}

/// Count prose words: whitespace separated tokens with at least one
/// alphanumeric character, outside code blocks.
pub fn word_count(body: &str) -> usize {
    lines(body)
        .iter()
        .filter(|l| !l.in_code)
        .flat_map(|l| l.text.split_whitespace())
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

/// An ATX heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub line: usize,
    pub level: usize,
    pub text: String,
}

/// Headings outside code blocks, in document order.
pub fn headings(body: &str) -> Vec<Heading> {
    lines(body)
        .iter()
        .filter(|l| !l.in_code)
        .filter_map(|l| {
            let caps = HEADING.captures(l.text)?;
            Some(Heading {
                line: l.number,
                level: caps[1].len(),
                text: caps[2].trim().to_string(),
            })
        })
        .collect()
}

/// An inline reference in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub line: usize,
    /// Target text with alias and anchor removed.
    pub target: String,
    /// The leading hierarchical identifier of the target, if it has one.
    pub id: Option<DocumentId>,
}

/// Inline `[[...]]` references outside code blocks. Embeds (`![[...]]`)
/// are not references; see [`embeds`].
///
/// # Example
///
/// ```
/// use corpuscheck::core::text::references;
///
/// let refs = references("See [[2.1 Budget]] and [[intro|the intro]]. ![[logo.png]]");
/// assert_eq!(refs.len(), 2);
/// assert_eq!(refs[0].id.as_ref().unwrap().as_str(), "2.1");
/// assert_eq!(refs[1].target, "intro");
/// assert!(refs[1].id.is_none());
/// ```
pub fn references(body: &str) -> Vec<Reference> {
    wikilinks(body, false)
}

/// Embedded `![[...]]` targets outside code blocks.
pub fn embeds(body: &str) -> Vec<Reference> {
    wikilinks(body, true)
}

fn wikilinks(body: &str, embedded: bool) -> Vec<Reference> {
    lines(body)
        .iter()
        .filter(|l| !l.in_code)
        .flat_map(|l| {
            WIKILINK.captures_iter(l.text).filter_map(move |caps| {
                if caps[1].is_empty() == embedded {
                    return None;
                }
                let target = reference_target(&caps[2]);
                if target.is_empty() {
                    return None;
                }
                Some(Reference {
                    line: l.number,
                    id: leading_id(&target),
                    target,
                })
            })
        })
        .collect()
}

fn reference_target(inner: &str) -> String {
    let end = inner.find(['|', '#']).unwrap_or(inner.len());
    inner[..end].trim_end_matches('\\').trim().to_string()
}

/// The hierarchical identifier at the start of a reference target, if any.
///
/// `1.2`, `1.2 Scope` and `1.2. Scope` all yield `1.2`.
pub fn leading_id(target: &str) -> Option<DocumentId> {
    HIERARCHICAL_ID
        .captures(target.trim())
        .and_then(|caps| DocumentId::new(&caps[1]).ok())
}

/// A Markdown table: consecutive lines starting with `|`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table<'a> {
    /// Rows in order; the first is the header.
    pub rows: Vec<Line<'a>>,
    pub has_separator: bool,
}

impl<'a> Table<'a> {
    pub fn start_line(&self) -> usize {
        self.rows.first().map(|l| l.number).unwrap_or(0)
    }

    /// Header cells, trimmed and lowercased.
    pub fn header(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|l| split_row(l.text).iter().map(|c| c.trim().to_lowercase()).collect())
            .unwrap_or_default()
    }

    /// Rows after the header that are not separator rows.
    pub fn data_rows(&self) -> impl Iterator<Item = &Line<'a>> {
        self.rows.iter().skip(1).filter(|l| !is_separator(l.text))
    }
}

/// Tables outside code blocks.
pub fn tables(body: &str) -> Vec<Table<'_>> {
    fn flush<'a>(rows: &mut Vec<Line<'a>>, out: &mut Vec<Table<'a>>) {
        if !rows.is_empty() {
            let has_separator = rows.get(1).map(|l| is_separator(l.text)).unwrap_or(false);
            out.push(Table {
                rows: std::mem::take(rows),
                has_separator,
            });
        }
    }

    let mut tables = Vec::new();
    let mut current = Vec::new();
    for line in lines(body) {
        if !line.in_code && line.text.trim_start().starts_with('|') {
            current.push(line);
        } else {
            flush(&mut current, &mut tables);
        }
    }
    flush(&mut current, &mut tables);
    tables
}

pub fn is_separator(line: &str) -> bool {
    TABLE_SEPARATOR.is_match(line.trim())
}

/// Split a table row into cells. Escaped pipes (`\|`) stay inside a cell;
/// leading and trailing border pipes are dropped.
pub fn split_row(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let bytes = inner.as_bytes();
    let mut cells = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    for i in 0..bytes.len() {
        match bytes[i] {
            b'[' if bytes.get(i + 1) == Some(&b'[') => depth += 1,
            b']' if bytes.get(i + 1) == Some(&b']') => depth = depth.saturating_sub(1),
            b'|' if (i == 0 || bytes[i - 1] != b'\\') && depth == 0 => {
                cells.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    cells.push(&inner[start..]);
    cells
}

/// A Markdown image outside code blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub line: usize,
    pub alt: String,
    /// Path with title, query and fragment removed.
    pub target: String,
}

impl Image {
    /// Remote and inline images are not files in the corpus.
    pub fn is_external(&self) -> bool {
        let lower = self.target.to_ascii_lowercase();
        lower.starts_with("http://")
            || lower.starts_with("https://")
            || lower.starts_with("//")
            || lower.starts_with("data:")
            || lower.starts_with("mailto:")
    }
}

/// Images outside code blocks.
///
/// ```
/// use corpuscheck::core::text::images;
///
/// let found = images(r#"![Plan](img/plan.png "Floor plan") ![](https://x.org/a.png)"#);
/// assert_eq!(found[0].target, "img/plan.png");
/// assert!(found[1].is_external());
/// ```
pub fn images(body: &str) -> Vec<Image> {
    lines(body)
        .iter()
        .filter(|l| !l.in_code)
        .flat_map(|l| {
            IMAGE.captures_iter(l.text).filter_map(move |caps| {
                let target = image_target(&caps[2]);
                if target.is_empty() {
                    return None;
                }
                Some(Image {
                    line: l.number,
                    alt: caps[1].trim().to_string(),
                    target,
                })
            })
        })
        .collect()
}

fn image_target(raw: &str) -> String {
    let raw = raw.trim();
    let path = match raw.strip_prefix('<') {
        Some(rest) => rest.split('>').next().unwrap_or(rest),
        None => raw.split_whitespace().next().unwrap_or(raw),
    };
    let end = path.find(['#', '?']).unwrap_or(path.len());
    path[..end].to_string()
}

/// A closed fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Line of the opening fence.
    pub line: usize,
    /// Info string's first word, lowercased. Empty when absent.
    pub lang: String,
    pub content: Vec<String>,
}

/// Closed fenced code blocks in document order. An unclosed trailing
/// block is left out.
pub fn code_blocks(body: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<CodeBlock> = None;
    for (i, text) in body.lines().enumerate() {
        if is_fence(text) {
            match open.take() {
                Some(block) => blocks.push(block),
                None => {
                    let info = text.trim_start().trim_start_matches('`');
                    open = Some(CodeBlock {
                        line: i + 1,
                        lang: info
                            .split_whitespace()
                            .next()
                            .unwrap_or("")
                            .to_lowercase(),
                        content: Vec::new(),
                    });
                }
            }
        } else if let Some(block) = open.as_mut() {
            block.content.push(text.to_string());
        }
    }
    blocks
}

/// Placeholder markers outside code blocks, as (line, matched text).
pub fn placeholders(body: &str) -> Vec<(usize, String)> {
    lines(body)
        .iter()
        .filter(|l| !l.in_code)
        .flat_map(|l| {
            PLACEHOLDER
                .find_iter(l.text)
                .map(move |m| (l.number, m.as_str().to_string()))
        })
        .collect()
}
