//! snapshot command - Print the registry snapshot

use anyhow::Result;

use crate::cli::Context;
use crate::engine::report::EXIT_CLEAN;
use crate::ui::output;

pub fn snapshot(ctx: &Context) -> Result<i32> {
    let engine = ctx.engine()?;
    let corpus = engine.load()?;
    output::print(corpus.registry.snapshot().to_json()?);
    Ok(EXIT_CLEAN)
}
