//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the engine for the resolved root
//! 2. Calls the engine to run the command
//! 3. Formats and displays output (text or JSON)
//! 4. Returns the exit code
//!
//! Handlers do NOT read or write documents directly.

mod deps;
mod fix;
mod snapshot;
mod verify;

pub use deps::deps;
pub use fix::fix;
pub use snapshot::snapshot;
pub use verify::verify;

use anyhow::Result;

use super::args::Command;
use super::Context;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<i32> {
    match command {
        Command::Verify(args) => verify(ctx, &args),
        Command::Fix(args) => fix(ctx, &args),
        Command::Deps { query, json } => deps(ctx, &query, json),
        Command::Snapshot => snapshot(ctx),
    }
}
