//! engine::phases::tables
//!
//! Markdown tables: header separators and descendant-count columns.
//!
//! # Descendant tables
//!
//! Module overviews carry content tables listing sub-documents, with one
//! column naming the document (a `[[...]]` reference) and one column named
//! `descendants` (or `nietos`) stating how many indexed documents sit
//! beneath it. The count is every identifier strictly under the referenced
//! identifier's prefix, at any depth.
//!
//! [`descendant_cells`] is the single reader of these tables; the phase
//! reports mismatches and the table repair rewrites them through
//! [`set_count_cells`].

use std::collections::BTreeMap;

use crate::core::document::Document;
use crate::core::registry::DocumentRegistry;
use crate::core::text::{self, Table};
use crate::core::types::DocumentId;
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::{PhaseCode, PhaseContext};

/// Header names of the count column, lowercased.
const COUNT_HEADERS: [&str; 2] = ["descendants", "nietos"];

/// One count cell of a descendant table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescendantCell {
    /// 1-based body line of the row.
    pub line: usize,
    pub id: DocumentId,
    /// Column index of the count cell within the row.
    pub column: usize,
    /// `None` when the cell is not a number.
    pub declared: Option<u64>,
    pub actual: u64,
}

impl DescendantCell {
    pub fn is_correct(&self) -> bool {
        self.declared == Some(self.actual)
    }
}

/// Number of indexed documents strictly under `id`.
pub fn count_descendants(registry: &DocumentRegistry, id: &DocumentId) -> u64 {
    registry
        .under_module(id.as_str())
        .filter(|doc| doc.id.as_ref() != Some(id))
        .count() as u64
}

fn columns(table: &Table<'_>) -> Option<(usize, usize)> {
    let header = table.header();
    let count = header.iter().position(|h| COUNT_HEADERS.contains(&h.as_str()))?;
    let id = header.iter().position(|h| h == "id").or_else(|| {
        table.data_rows().find_map(|row| {
            text::split_row(row.text)
                .iter()
                .position(|cell| cell.trim().starts_with("[["))
        })
    })?;
    (id != count).then_some((id, count))
}

fn cell_id(cell: &str) -> Option<DocumentId> {
    match text::references(cell).into_iter().next() {
        Some(reference) => reference.id,
        None => text::leading_id(cell),
    }
}

/// Every count cell in the body's descendant tables whose referenced
/// identifier is indexed.
pub fn descendant_cells(body: &str, registry: &DocumentRegistry) -> Vec<DescendantCell> {
    let mut cells = Vec::new();
    for table in text::tables(body) {
        let Some((id_column, count_column)) = columns(&table) else {
            continue;
        };
        for row in table.data_rows() {
            let parts = text::split_row(row.text);
            let (Some(id_cell), Some(count_cell)) = (parts.get(id_column), parts.get(count_column))
            else {
                continue;
            };
            let Some(id) = cell_id(id_cell).filter(|id| registry.contains(id)) else {
                continue;
            };
            cells.push(DescendantCell {
                line: row.number,
                actual: count_descendants(registry, &id),
                declared: count_cell.trim().parse().ok(),
                column: count_column,
                id,
            });
        }
    }
    cells
}

fn rewrite_row(line: &str, column: usize, value: u64) -> String {
    let indent = &line[..line.len() - line.trim_start().len()];
    let trimmed = line.trim();
    let mut cells: Vec<String> = text::split_row(trimmed).iter().map(|c| c.to_string()).collect();
    if let Some(cell) = cells.get_mut(column) {
        *cell = format!(" {value} ");
    }
    let leading = if trimmed.starts_with('|') { "|" } else { "" };
    let trailing = if trimmed.ends_with('|') && trimmed.len() > 1 { "|" } else { "" };
    format!("{indent}{leading}{}{trailing}", cells.join("|"))
}

/// Set the cells at (line, column) to new counts, keeping every other byte
/// of the body, line endings included.
pub fn set_count_cells(body: &str, cells: &BTreeMap<usize, (usize, u64)>) -> String {
    let mut out = String::with_capacity(body.len());
    for (index, piece) in body.split_inclusive('\n').enumerate() {
        match cells.get(&(index + 1)) {
            Some(&(column, value)) => {
                let content = piece.trim_end_matches('\n').trim_end_matches('\r');
                out.push_str(&rewrite_row(content, column, value));
                out.push_str(&piece[content.len()..]);
            }
            None => out.push_str(piece),
        }
    }
    out
}

/// V13: tables whose second row is not a header separator.
pub fn separators(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    text::tables(&doc.body)
        .into_iter()
        .filter(|table| !table.has_separator)
        .map(|table| {
            let line = table.start_line();
            Issue::new(
                PhaseCode::V13,
                IssueKind::TableMissingSeparator,
                Severity::Warning,
                format!("line {line}: table has no header separator row"),
            )
            .at(doc)
            .with_evidence(Evidence::Line {
                line,
                detail: "separator".into(),
            })
        })
        .collect()
}

/// V14: declared descendant counts that disagree with the registry.
pub fn descendant_counts(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    ctx.registry
        .all()
        .filter(|doc| !doc.is_stub())
        .flat_map(|doc| {
            descendant_cells(&doc.body, ctx.registry)
                .into_iter()
                .filter(|cell| !cell.is_correct())
                .map(move |cell| {
                    let declared = cell
                        .declared
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "not a number".to_string());
                    Issue::new(
                        PhaseCode::V14,
                        IssueKind::DescendantTableMismatch,
                        Severity::Warning,
                        format!(
                            "line {}: {} declares {declared} descendants, found {}",
                            cell.line, cell.id, cell.actual
                        ),
                    )
                    .at(doc)
                    .with_evidence(Evidence::Count {
                        line: Some(cell.line),
                        subject: cell.id.to_string(),
                        declared: cell.declared,
                        actual: cell.actual,
                    })
                    .fixable()
                })
        })
        .collect()
}
