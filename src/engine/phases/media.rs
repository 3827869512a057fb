//! engine::phases::media
//!
//! Embedded notes and images must exist.
//!
//! An embed naming a Markdown document (`![[1.2 Goals]]`, `![[glossary]]`)
//! resolves the way an inline reference does. An embed naming any other
//! file (`![[logo.png]]`) and every local image are looked up on disk,
//! first next to the embedding document and then at the corpus root.
//! Remote images are never checked.

use std::path::{Path, PathBuf};

use crate::core::document::Document;
use crate::core::text::{self, Reference};
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::links::{resolves, NameIndex};
use super::{PhaseCode, PhaseContext};

/// Candidate locations for a file referenced from `doc`.
fn candidates(ctx: &PhaseContext<'_>, doc: &Document, target: &str) -> [PathBuf; 2] {
    let target = target.replace("%20", " ");
    let relative = Path::new(target.trim_start_matches('/'));
    let dir = doc.path.parent().unwrap_or_else(|| Path::new(""));
    [ctx.root.join(dir).join(relative), ctx.root.join(relative)]
}

fn exists(ctx: &PhaseContext<'_>, doc: &Document, target: &str) -> bool {
    candidates(ctx, doc, target).iter().any(|p| p.is_file())
}

/// Extension of an embed target, lowercased. `1.2 Goals` has none.
fn extension(target: &str) -> Option<String> {
    let name = target.rsplit('/').next().unwrap_or(target);
    let (_, ext) = name.rsplit_once('.')?;
    let is_word = ext.chars().all(|c| c.is_ascii_alphanumeric());
    let is_number = ext.chars().all(|c| c.is_ascii_digit());
    (!ext.is_empty() && is_word && !is_number).then(|| ext.to_ascii_lowercase())
}

fn embed_resolves(
    ctx: &PhaseContext<'_>,
    doc: &Document,
    embed: &Reference,
    names: &NameIndex,
) -> bool {
    match extension(&embed.target).as_deref() {
        Some("md") => {
            let stem = embed.target.trim_end_matches(".md").trim_end_matches(".MD");
            names.contains(stem) || exists(ctx, doc, &embed.target)
        }
        Some(_) => exists(ctx, doc, &embed.target),
        None => {
            resolves(embed, ctx.registry, names)
                || exists(ctx, doc, &format!("{}.md", embed.target))
        }
    }
}

/// V19: `![[...]]` embeds whose target is neither a document nor a file.
pub fn embeds(ctx: &PhaseContext<'_>) -> Vec<Issue> {
    let names = NameIndex::build(ctx.registry);
    ctx.registry
        .all()
        .flat_map(|doc| {
            text::embeds(&doc.body)
                .into_iter()
                .filter(|embed| !embed_resolves(ctx, doc, embed, &names))
                .map(|embed| {
                    Issue::new(
                        PhaseCode::V19,
                        IssueKind::MissingEmbed,
                        Severity::Warning,
                        format!("line {}: ![[{}]] does not resolve", embed.line, embed.target),
                    )
                    .at(doc)
                    .with_evidence(Evidence::Target {
                        target: embed.target.clone(),
                    })
                    .with_evidence(Evidence::Line {
                        line: embed.line,
                        detail: embed.target,
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// V20: local images that are not on disk.
pub fn images(ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    text::images(&doc.body)
        .into_iter()
        .filter(|image| !image.is_external() && !exists(ctx, doc, &image.target))
        .map(|image| {
            Issue::new(
                PhaseCode::V20,
                IssueKind::MissingImage,
                Severity::Warning,
                format!("line {}: image {} not found", image.line, image.target),
            )
            .at(doc)
            .with_evidence(Evidence::Line {
                line: image.line,
                detail: image.target,
            })
        })
        .collect()
}
