//! verify command - Run the verification pipeline and report issues

use anyhow::Result;

use crate::cli::args::VerifyArgs;
use crate::cli::Context;
use crate::ui::{output, render};

/// Run the selected phases. Exit code 1 when any issue reaches `--fail-on`.
pub fn verify(ctx: &Context, args: &VerifyArgs) -> Result<i32> {
    let engine = ctx.engine()?;
    let report = engine.verify(&args.pipeline_options())?;

    if args.json {
        output::json(&report)?;
    } else {
        let text = render::report(&report, ctx.verbosity, ctx.colors);
        output::print(text);
    }
    Ok(report.exit_code(args.fail_on))
}
