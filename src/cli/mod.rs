//! cli
//!
//! Command-line interface layer for corpuscheck.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Resolve the corpus root and configuration
//! - Delegate to command handlers
//! - Does NOT inspect or modify documents directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine::Engine`]; every finding and every repair comes from
//! there. Handlers return the process exit code.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::core::config::{Config, EngineConfig};
use crate::engine::{Engine, EngineError};
use crate::ui::output::Verbosity;

/// Everything a handler needs besides its own arguments.
pub struct Context {
    pub root: PathBuf,
    pub config: EngineConfig,
    pub verbosity: Verbosity,
    pub colors: bool,
}

impl Context {
    /// Resolve root and configuration from the global flags.
    ///
    /// Without `--root`, the corpus root is `data_dir` from the loaded
    /// configuration, and the configuration is reloaded for that root.
    pub fn from_cli(cli: &Cli) -> Result<Self, EngineError> {
        let start = cli.root.clone().unwrap_or_else(|| PathBuf::from("."));
        let mut loaded = Config::load(&start, cli.config.as_deref())?;
        let mut root = start;
        if cli.root.is_none() && loaded.config.data_dir != Path::new(".") {
            root = loaded.config.data_dir.clone();
            loaded = Config::load(&root, cli.config.as_deref())?;
        }
        for warning in &loaded.warnings {
            warn!(path = %warning.path.display(), "{}", warning.message);
        }

        let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose || loaded.config.verbose);
        let colors = loaded.config.colors && std::io::stdout().is_terminal();
        Ok(Self {
            root,
            config: loaded.config,
            verbosity,
            colors,
        })
    }

    pub fn engine(&self) -> Result<Engine, EngineError> {
        Engine::open(&self.root, self.config.clone())
    }
}

/// Run the CLI application and return the exit code.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<i32> {
    let ctx = Context::from_cli(&cli)?;
    commands::dispatch(cli.command, &ctx)
}
