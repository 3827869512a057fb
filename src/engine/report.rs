//! engine::report
//!
//! The result of one verification run.
//!
//! # Invariants
//!
//! - `issues` is sorted by (path, phase, kind, message) and holds no two
//!   issues with the same id
//! - `phases` lists executed phases in table order
//! - `executions + cache_skips` equals the document checks the run covered

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::health::{Issue, Severity};
use crate::engine::phases::PhaseCode;

/// Exit code when no issue reaches the threshold.
pub const EXIT_CLEAN: i32 = 0;
/// Exit code when at least one issue reaches the threshold.
pub const EXIT_ISSUES: i32 = 1;
/// Exit code for a run that could not complete.
pub const EXIT_FATAL: i32 = 2;

/// Statistics for one executed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseResult {
    pub code: PhaseCode,
    pub name: &'static str,
    /// Documents the phase looked at, including cache skips.
    pub checked: usize,
    pub passed: usize,
    pub failed: usize,
    /// Documents skipped because the cache vouched for them.
    pub skipped: usize,
    pub issues: usize,
    pub duration_ms: u64,
}

impl PhaseResult {
    pub fn new(code: PhaseCode) -> Self {
        Self {
            code,
            name: code.descriptor().name,
            checked: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            issues: 0,
            duration_ms: 0,
        }
    }
}

/// Everything a verification run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub phases: Vec<PhaseResult>,
    pub issues: Vec<Issue>,
    /// Document checks that actually ran.
    pub executions: usize,
    pub cache_skips: usize,
    pub fail_fast_triggered: bool,
    pub scan_warnings: usize,
    pub documents: usize,
}

impl VerificationReport {
    /// 1 when any issue is at or above `threshold`, else 0.
    pub fn exit_code(&self, threshold: Severity) -> i32 {
        if self.issues.iter().any(|i| i.is_at_least(threshold)) {
            EXIT_ISSUES
        } else {
            EXIT_CLEAN
        }
    }

    pub fn count_at_least(&self, threshold: Severity) -> usize {
        self.issues.iter().filter(|i| i.is_at_least(threshold)).count()
    }

    /// Issue count per severity, for summaries.
    pub fn by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn fixable_count(&self) -> usize {
        self.issues.iter().filter(|i| i.fixable).count()
    }

    pub fn phase(&self, code: PhaseCode) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.code == code)
    }

    pub fn issues_for(&self, code: PhaseCode) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.phase == code)
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}
