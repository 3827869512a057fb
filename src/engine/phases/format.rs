//! engine::phases::format
//!
//! Per-document Markdown hygiene. Every check here looks at the body only,
//! which makes their clean results safe to cache by content hash.

use std::collections::HashMap;

use crate::core::document::Document;
use crate::core::text;
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::{PhaseCode, PhaseContext};

fn line_issue(
    code: PhaseCode,
    kind: IssueKind,
    severity: Severity,
    doc: &Document,
    line: usize,
    detail: impl Into<String>,
    message: String,
) -> Issue {
    Issue::new(code, kind, severity, message)
        .at(doc)
        .with_evidence(Evidence::Line {
            line,
            detail: detail.into(),
        })
}

/// V09: more than one H1, and headings that skip a level.
pub fn headings(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    let headings = text::headings(&doc.body);
    let mut issues = Vec::new();

    let h1: Vec<&text::Heading> = headings.iter().filter(|h| h.level == 1).collect();
    if let [_, extra, ..] = h1.as_slice() {
        issues.push(line_issue(
            PhaseCode::V09,
            IssueKind::HeadingStructure,
            Severity::Warning,
            doc,
            extra.line,
            "multiple-h1",
            format!("{} top-level headings; expected one", h1.len()),
        ));
    }

    for pair in headings.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.level > prev.level + 1 {
            issues.push(line_issue(
                PhaseCode::V09,
                IssueKind::HeadingStructure,
                Severity::Info,
                doc,
                next.line,
                format!("h{}-h{}", prev.level, next.level),
                format!(
                    "line {}: heading jumps from level {} to {}",
                    next.line, prev.level, next.level
                ),
            ));
        }
    }
    issues
}

/// V10: the same heading text used twice.
pub fn duplicate_headers(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    let mut issues = Vec::new();
    for heading in text::headings(&doc.body) {
        let key = heading.text.to_lowercase();
        match first_seen.get(&key) {
            Some(first) => issues.push(line_issue(
                PhaseCode::V10,
                IssueKind::DuplicateHeader,
                Severity::Warning,
                doc,
                heading.line,
                key,
                format!(
                    "line {}: heading \"{}\" repeats line {first}",
                    heading.line, heading.text
                ),
            )),
            None => {
                first_seen.insert(key, heading.line);
            }
        }
    }
    issues
}

/// V11: prose lines longer than the configured limit. Code and table rows
/// are exempt.
pub fn line_length(ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    let max = ctx.config.max_line_length;
    text::lines(&doc.body)
        .into_iter()
        .filter(|l| !l.in_code && !l.text.trim_start().starts_with('|'))
        .filter_map(|l| {
            let length = l.text.chars().count();
            (length > max).then(|| {
                line_issue(
                    PhaseCode::V11,
                    IssueKind::LineTooLong,
                    Severity::Info,
                    doc,
                    l.number,
                    length.to_string(),
                    format!("line {}: {length} characters (max {max})", l.number),
                )
            })
        })
        .collect()
}

/// V12: a code fence that is never closed.
pub fn code_blocks(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    if text::fence_count(&doc.body) % 2 == 0 {
        return Vec::new();
    }
    let opening = text::lines(&doc.body)
        .into_iter()
        .rev()
        .find(|l| l.text.trim_start().starts_with("```"))
        .map(|l| l.number)
        .unwrap_or(0);
    vec![line_issue(
        PhaseCode::V12,
        IssueKind::UnclosedCodeBlock,
        Severity::Error,
        doc,
        opening,
        "unclosed",
        format!("line {opening}: code block is never closed"),
    )]
}

/// V15: placeholder markers left in prose.
pub fn placeholders(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    text::placeholders(&doc.body)
        .into_iter()
        .map(|(line, marker)| {
            line_issue(
                PhaseCode::V15,
                IssueKind::Placeholder,
                Severity::Warning,
                doc,
                line,
                marker.clone(),
                format!("line {line}: placeholder \"{marker}\""),
            )
        })
        .collect()
}

/// Diagram types a Mermaid block may open with.
const MERMAID_DIAGRAMS: [&str; 27] = [
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "classDiagram-v2",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "journey",
    "gantt",
    "pie",
    "quadrantChart",
    "requirementDiagram",
    "gitGraph",
    "C4Context",
    "C4Container",
    "C4Component",
    "C4Dynamic",
    "C4Deployment",
    "mindmap",
    "timeline",
    "sankey-beta",
    "xychart-beta",
    "block-beta",
    "packet-beta",
    "architecture-beta",
    "kanban",
];

/// The first statement of a Mermaid block, past blank lines, `%%` comments
/// and a `---` config header.
fn mermaid_head(content: &[String]) -> Option<&str> {
    let mut in_header = false;
    for line in content.iter().map(|l| l.trim()) {
        if line == "---" {
            in_header = !in_header;
            continue;
        }
        if in_header || line.is_empty() || line.starts_with("%%") {
            continue;
        }
        return Some(line);
    }
    None
}

/// V21: Mermaid blocks that do not open with a known diagram type. Empty
/// blocks are skipped.
pub fn mermaid(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    text::code_blocks(&doc.body)
        .into_iter()
        .filter(|block| block.lang == "mermaid")
        .filter_map(|block| {
            let head = mermaid_head(&block.content)?;
            let keyword = head
                .split(|c: char| c.is_whitespace() || c == ';')
                .next()
                .unwrap_or(head);
            if MERMAID_DIAGRAMS.contains(&keyword) {
                return None;
            }
            Some(line_issue(
                PhaseCode::V21,
                IssueKind::InvalidMermaid,
                Severity::Warning,
                doc,
                block.line,
                keyword.to_string(),
                format!(
                    "line {}: mermaid block starts with unknown diagram \"{keyword}\"",
                    block.line
                ),
            ))
        })
        .collect()
}
