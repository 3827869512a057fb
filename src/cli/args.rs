//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--root <dir>`: Corpus root (default: `data_dir` from config, else `.`)
//! - `--config <file>`: Extra config file, applied last
//! - `--verbose` / `-v`: Info logging and per-phase statistics
//! - `--debug`: Debug logging
//! - `--quiet` / `-q`: Summary line only

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::doctor::FixCategory;
use crate::engine::health::Severity;
use crate::engine::phases::PhaseCode;
use crate::engine::pipeline::{PhaseSelection, PipelineOptions};

/// corpuscheck - verify and repair hierarchical Markdown corpora
#[derive(Parser, Debug)]
#[command(name = "corpuscheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Corpus root directory
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Additional config file, applied after the global and corpus files
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Info logging and per-phase statistics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Summary line only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run verification phases and report issues
    #[command(after_help = "\
EXAMPLES:
    # Every phase
    corpuscheck verify

    # Skip the slow phases
    corpuscheck verify --quick

    # One phase, by code, number or name
    corpuscheck verify --phase V07
    corpuscheck verify --phase hashes

    # One module, machine-readable
    corpuscheck verify --module 1.2 --json

EXIT CODES:
    0  no issue at or above --fail-on
    1  at least one issue at or above --fail-on
    2  the run could not complete")]
    Verify(VerifyArgs),

    /// Apply deterministic repairs
    #[command(after_help = "\
Repairs run in a fixed order: tables, then dates, then hashes.
With no category flag, every category runs.

EXAMPLES:
    # Preview every repair
    corpuscheck fix --dry-run

    # Refresh stale content hashes only
    corpuscheck fix --hashes")]
    Fix(FixArgs),

    /// Query the dependency graph
    Deps {
        #[command(subcommand)]
        query: DepsQuery,

        /// Output as JSON
        #[arg(long, global = true)]
        json: bool,
    },

    /// Print the registry snapshot as JSON
    Snapshot,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Run a single phase (code, number or name)
    #[arg(long, value_name = "PHASE", value_parser = parse_phase, conflicts_with = "quick")]
    pub phase: Option<PhaseCode>,

    /// Run only the fast phases
    #[arg(long)]
    pub quick: bool,

    /// Restrict to documents under this identifier prefix
    #[arg(long, value_name = "PREFIX")]
    pub module: Option<String>,

    /// Stop after the first phase that reports an error
    #[arg(long)]
    pub fail_fast: bool,

    /// Ignore the hash cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Lowest severity that makes the exit code 1
    #[arg(long, value_name = "SEVERITY", default_value = "warning", value_parser = parse_severity)]
    pub fail_on: Severity,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl VerifyArgs {
    pub fn pipeline_options(&self) -> PipelineOptions {
        let selection = match (self.phase, self.quick) {
            (Some(code), _) => PhaseSelection::Only(code),
            (None, true) => PhaseSelection::Quick,
            (None, false) => PhaseSelection::All,
        };
        PipelineOptions {
            selection,
            module: self.module.clone(),
            fail_fast: self.fail_fast,
            use_cache: !self.no_cache,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct FixArgs {
    /// Descendant counts in content tables
    #[arg(long)]
    pub tables: bool,

    /// last_updated from file modification time
    #[arg(long)]
    pub dates: bool,

    /// content_hash from the body
    #[arg(long)]
    pub hashes: bool,

    /// Every category (the default)
    #[arg(long)]
    pub all: bool,

    /// Show what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl FixArgs {
    /// Selected categories, all of them when none is named.
    pub fn categories(&self) -> Vec<FixCategory> {
        let named: Vec<FixCategory> = [
            (self.tables, FixCategory::TableRepair),
            (self.dates, FixCategory::DateSync),
            (self.hashes, FixCategory::HashSync),
        ]
        .into_iter()
        .filter_map(|(on, category)| on.then_some(category))
        .collect();
        if self.all || named.is_empty() {
            FixCategory::ALL.to_vec()
        } else {
            named
        }
    }
}

/// Graph queries.
#[derive(Subcommand, Debug)]
pub enum DepsQuery {
    /// Structural and referential cycles
    Cycles,
    /// Documents whose parent chain never reaches a root
    Orphans,
    /// Documents affected by a change to one document
    Impact {
        /// Document identifier
        id: String,
    },
}

fn parse_phase(s: &str) -> Result<PhaseCode, String> {
    PhaseCode::parse(s).map_err(|e| e.to_string())
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn verify_flags_build_options() {
        let cli = Cli::parse_from(["corpuscheck", "verify", "--phase", "hashes", "--module", "1", "--no-cache"]);
        let Command::Verify(args) = cli.command else {
            panic!("expected verify");
        };
        let options = args.pipeline_options();
        assert_eq!(options.selection, PhaseSelection::Only(PhaseCode::V07));
        assert_eq!(options.module.as_deref(), Some("1"));
        assert!(!options.use_cache);
        assert_eq!(args.fail_on, Severity::Warning);
    }

    #[test]
    fn quick_and_phase_conflict() {
        assert!(Cli::try_parse_from(["corpuscheck", "verify", "--quick", "--phase", "V01"]).is_err());
    }

    #[test]
    fn fix_defaults_to_every_category() {
        assert_eq!(FixArgs::default().categories(), FixCategory::ALL.to_vec());
        let args = FixArgs {
            hashes: true,
            ..FixArgs::default()
        };
        assert_eq!(args.categories(), vec![FixCategory::HashSync]);
    }

    #[test]
    fn log_level_follows_flags() {
        let cli = Cli::parse_from(["corpuscheck", "--debug", "snapshot"]);
        assert_eq!(cli.log_level(), "debug");
        let cli = Cli::parse_from(["corpuscheck", "snapshot", "-v"]);
        assert_eq!(cli.log_level(), "info");
    }
}
