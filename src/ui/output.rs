//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Reports go to stdout and respect the quiet flag; diagnostics go to
//! stderr. With `--json`, stdout carries exactly one JSON document.

use std::fmt::Display;

use serde::Serialize;

use crate::engine::health::Severity;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Summary line only
    Quiet,
    /// Issues and summary
    Normal,
    /// Issues, per-phase statistics and summary
    Verbose,
}

impl Verbosity {
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

/// Print rendered output. Quiet mode is applied by the renderers.
pub fn print(message: impl Display) {
    println!("{}", message);
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print any serializable value as pretty JSON.
pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A severity label, colored with ANSI codes when `colors` is set.
pub fn severity_label(severity: Severity, colors: bool) -> String {
    if !colors {
        return severity.as_str().to_string();
    }
    let code = match severity {
        Severity::Error => "31",
        Severity::Warning => "33",
        Severity::Info => "36",
        Severity::Hint => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", severity.as_str())
}
