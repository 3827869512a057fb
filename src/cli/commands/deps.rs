//! deps command - Read-only queries on the dependency graph

use anyhow::{bail, Context as _, Result};
use serde_json::json;

use crate::cli::args::DepsQuery;
use crate::cli::Context;
use crate::core::types::DocumentId;
use crate::engine::report::{EXIT_CLEAN, EXIT_ISSUES};
use crate::ui::{output, render};

/// Cycles and orphans exit 1 when any are found; impact always exits 0.
pub fn deps(ctx: &Context, query: &DepsQuery, json: bool) -> Result<i32> {
    let engine = ctx.engine()?;
    let corpus = engine.load()?;
    let graph = &corpus.graph;

    match query {
        DepsQuery::Cycles => {
            let cycles = graph.find_cycles();
            if json {
                output::json(&cycles)?;
            } else {
                output::print(render::cycles(&cycles));
            }
            Ok(if cycles.is_empty() { EXIT_CLEAN } else { EXIT_ISSUES })
        }
        DepsQuery::Orphans => {
            let orphans = graph.orphans();
            if json {
                output::json(&orphans)?;
            } else {
                output::print(render::orphans(&orphans));
            }
            Ok(if orphans.is_empty() { EXIT_CLEAN } else { EXIT_ISSUES })
        }
        DepsQuery::Impact { id } => {
            let id = DocumentId::new(id.as_str())
                .with_context(|| format!("'{id}' is not a document identifier"))?;
            if !graph.contains(&id) {
                bail!("document {id} is not in the corpus");
            }
            let affected = graph.impact(&id);
            if json {
                output::json(&json!({ "id": id, "affected": affected }))?;
            } else {
                output::print(render::impact(&id, &affected));
            }
            Ok(EXIT_CLEAN)
        }
    }
}
