//! ui::render
//!
//! Plain-text renderings of reports, repair outcomes and graph queries.
//! Every function returns a string; printing is left to [`super::output`].

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::core::graph::{Cycle, CycleKind, Orphan};
use crate::core::types::DocumentId;
use crate::doctor::FixOutcome;
use crate::engine::health::{Issue, Severity};
use crate::engine::report::VerificationReport;

use super::output::{severity_label, Verbosity};

fn issue_line(issue: &Issue, colors: bool) -> String {
    let location = match (&issue.path, &issue.document) {
        (Some(path), Some(id)) => format!("{} [{}]", path.display(), id),
        (Some(path), None) => path.display().to_string(),
        (None, Some(id)) => format!("[{}]", id),
        (None, None) => "-".to_string(),
    };
    let fix = if issue.fixable { " (fixable)" } else { "" };
    format!(
        "{} {} {}: {} {}{}",
        issue.phase.as_str(),
        severity_label(issue.severity, colors),
        issue.kind,
        location,
        issue.message,
        fix
    )
}

/// One line: `N documents, E errors, W warnings, ...`.
pub fn report_summary(report: &VerificationReport) -> String {
    let counts = report.by_severity();
    let mut parts = vec![format!("{} documents", report.documents)];
    for severity in Severity::ALL.into_iter().rev() {
        let n = counts.get(&severity).copied().unwrap_or(0);
        parts.push(format!("{n} {}", plural(severity.as_str(), n)));
    }
    if report.fixable_count() > 0 {
        parts.push(format!("{} fixable", report.fixable_count()));
    }
    if report.fail_fast_triggered {
        parts.push("stopped early".to_string());
    }
    parts.join(", ")
}

fn plural(word: &str, n: usize) -> String {
    if n == 1 || word == "info" {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

/// Full text report.
pub fn report(report: &VerificationReport, verbosity: Verbosity, colors: bool) -> String {
    let mut out = String::new();
    if verbosity != Verbosity::Quiet {
        for issue in &report.issues {
            let _ = writeln!(out, "{}", issue_line(issue, colors));
        }
    }
    if verbosity == Verbosity::Verbose {
        if !report.issues.is_empty() {
            out.push('\n');
        }
        for phase in &report.phases {
            let _ = writeln!(
                out,
                "{} {:<18} checked {:>4}  passed {:>4}  failed {:>4}  cached {:>4}  {} ms",
                phase.code.as_str(),
                phase.name,
                phase.checked,
                phase.passed,
                phase.failed,
                phase.skipped,
                phase.duration_ms
            );
        }
        let _ = writeln!(
            out,
            "executions {}, cache skips {}, scan warnings {}",
            report.executions, report.cache_skips, report.scan_warnings
        );
    }
    out.push_str(&report_summary(report));
    out
}

/// Text rendering of a repair run.
pub fn fix_outcome(outcome: &FixOutcome, verbosity: Verbosity, colors: bool) -> String {
    let mut out = String::new();
    if verbosity != Verbosity::Quiet {
        for change in &outcome.changes {
            let _ = writeln!(out, "{} {}", change.category, change.describe());
        }
        for conflict in &outcome.conflicts {
            let _ = writeln!(out, "{}", issue_line(conflict, colors));
        }
    }
    let verb = if outcome.dry_run { "would apply" } else { "applied" };
    let mut summary = format!(
        "{verb} {} {}",
        outcome.total(),
        plural("change", outcome.total())
    );
    for (category, count) in &outcome.counts {
        let _ = write!(summary, ", {category} {count}");
    }
    if !outcome.dry_run {
        let _ = write!(
            summary,
            "; {} {} written",
            outcome.files_written,
            plural("file", outcome.files_written)
        );
    }
    if !outcome.conflicts.is_empty() {
        let _ = write!(
            summary,
            "; {} {} skipped",
            outcome.conflicts.len(),
            plural("conflict", outcome.conflicts.len())
        );
    }
    out.push_str(&summary);
    out
}

pub fn cycles(cycles: &[Cycle]) -> String {
    if cycles.is_empty() {
        return "no cycles".to_string();
    }
    cycles
        .iter()
        .map(|cycle| {
            let kind = match cycle.kind {
                CycleKind::Structural => "structural",
                CycleKind::Referential => "referential",
            };
            format!("{kind}: {cycle}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn orphans(orphans: &[Orphan]) -> String {
    if orphans.is_empty() {
        return "no orphans".to_string();
    }
    orphans
        .iter()
        .map(|orphan| {
            let parent = orphan
                .parent
                .as_ref()
                .map(DocumentId::as_str)
                .unwrap_or("-");
            format!("{} (parent {}): {}", orphan.id, parent, orphan.reason)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn impact(id: &DocumentId, affected: &BTreeSet<DocumentId>) -> String {
    if affected.is_empty() {
        return format!("nothing depends on {id}");
    }
    let mut out = format!("{} {} affected by {id}:", affected.len(), plural("document", affected.len()));
    for doc in affected {
        let _ = write!(out, "\n  {doc}");
    }
    out
}
