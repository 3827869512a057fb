//! fix command - Apply deterministic repairs
//!
//! Exit code 1 when a repair was skipped because of a conflict.

use anyhow::Result;

use crate::cli::args::FixArgs;
use crate::cli::Context;
use crate::doctor::FixRequest;
use crate::engine::report::{EXIT_CLEAN, EXIT_ISSUES};
use crate::ui::{output, render};

pub fn fix(ctx: &Context, args: &FixArgs) -> Result<i32> {
    let engine = ctx.engine()?;
    let request = FixRequest::categories(args.categories(), args.dry_run);
    let outcome = engine.fix(&request)?;

    if args.json {
        output::json(&outcome)?;
    } else {
        output::print(render::fix_outcome(&outcome, ctx.verbosity, ctx.colors));
    }
    Ok(if outcome.conflicts.is_empty() {
        EXIT_CLEAN
    } else {
        EXIT_ISSUES
    })
}
