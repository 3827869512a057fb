//! engine::pipeline
//!
//! Runs the phase table over a loaded corpus.
//!
//! # Architecture
//!
//! Phases are dispatched one at a time in table order. Within a
//! document-scoped phase the documents fan out across the current rayon
//! pool; each worker returns its own issue list and the lists are
//! concatenated afterwards, so no issue buffer is shared between workers.
//! Corpus-scoped phases run on the calling thread.
//!
//! For cache-eligible phases each (document, phase) pair is first checked
//! against the [`HashCache`]: a document whose current hash was already
//! verified for the phase is skipped. Only a clean result marks the pair
//! verified, so a document with issues is re-checked, and re-reports the
//! same issues, on every run.
//!
//! # Invariants
//!
//! - Fail-fast is observed only between phases; a dispatched phase always
//!   completes
//! - Module filtering restricts document phases to documents under the
//!   prefix and drops corpus-phase issues about documents outside it
//! - The returned issues are sorted and deduplicated

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::document::Document;
use crate::core::paths::CorpusPaths;
use crate::engine::cache::HashCache;
use crate::engine::health::{sort_issues, Evidence, Issue, IssueKind, Severity};
use crate::engine::phases::{PhaseCode, PhaseContext, PhaseDescriptor, PhaseScope, PHASES};
use crate::engine::report::{PhaseResult, VerificationReport};
use crate::engine::scan::ScanWarning;

/// Which phases a run includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseSelection {
    #[default]
    All,
    /// Every phase not marked slow.
    Quick,
    Only(PhaseCode),
}

impl PhaseSelection {
    pub fn includes(&self, descriptor: &PhaseDescriptor) -> bool {
        match self {
            PhaseSelection::All => true,
            PhaseSelection::Quick => !descriptor.slow,
            PhaseSelection::Only(code) => descriptor.code == *code,
        }
    }

    /// Selected phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = &'static PhaseDescriptor> + '_ {
        PHASES.iter().filter(move |d| self.includes(d))
    }
}

/// Options for one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub selection: PhaseSelection,
    /// Restrict the run to identifiers under this prefix.
    pub module: Option<String>,
    /// Stop dispatching phases after the first Error issue.
    pub fail_fast: bool,
    pub use_cache: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            selection: PhaseSelection::All,
            module: None,
            fail_fast: false,
            use_cache: true,
        }
    }
}

/// Outcome of checking one document in one phase.
enum Check {
    Skipped,
    Ran(Vec<Issue>),
}

/// A configured run over one corpus.
pub struct Pipeline<'a> {
    ctx: PhaseContext<'a>,
    options: &'a PipelineOptions,
    cache: Option<&'a HashCache>,
    paths: CorpusPaths,
    stop: AtomicBool,
}

impl<'a> Pipeline<'a> {
    /// `cache` is ignored unless `options.use_cache` is set.
    pub fn new(
        ctx: PhaseContext<'a>,
        options: &'a PipelineOptions,
        cache: Option<&'a HashCache>,
    ) -> Self {
        Self {
            paths: CorpusPaths::new(ctx.root),
            cache: cache.filter(|_| options.use_cache),
            ctx,
            options,
            stop: AtomicBool::new(false),
        }
    }

    fn in_scope(&self, doc: &Document) -> bool {
        match &self.options.module {
            Some(prefix) => doc.is_under(prefix),
            None => true,
        }
    }

    fn issue_in_scope(&self, issue: &Issue) -> bool {
        match (&self.options.module, &issue.document) {
            (None, _) => true,
            (Some(prefix), Some(id)) => id.is_under(prefix),
            (Some(_), None) => false,
        }
    }

    /// Run every selected phase. Call inside the rayon pool that should do
    /// the work.
    pub fn run(&self, scan_warnings: &[ScanWarning]) -> VerificationReport {
        let started = Instant::now();
        let mut report = VerificationReport {
            scan_warnings: scan_warnings.len(),
            documents: self.ctx.registry.total(),
            ..VerificationReport::default()
        };
        let mut issues: Vec<Issue> = scan_warnings.iter().map(unreadable_path).collect();

        for descriptor in self.options.selection.phases() {
            if self.stop.load(Ordering::SeqCst) {
                report.fail_fast_triggered = true;
                info!(next = %descriptor.code, "fail-fast: remaining phases not dispatched");
                break;
            }

            let phase_started = Instant::now();
            let (mut result, phase_issues) = match descriptor.scope {
                PhaseScope::Document(check) => self.run_documents(descriptor, check),
                PhaseScope::Corpus(check) => self.run_corpus(descriptor, check),
            };
            result.duration_ms = phase_started.elapsed().as_millis() as u64;

            debug!(
                phase = %descriptor.code,
                name = descriptor.name,
                checked = result.checked,
                skipped = result.skipped,
                issues = result.issues,
                ms = result.duration_ms,
                "phase complete"
            );

            report.executions += result.checked - result.skipped;
            report.cache_skips += result.skipped;
            if self.options.fail_fast && phase_issues.iter().any(|i| i.severity == Severity::Error)
            {
                self.stop.store(true, Ordering::SeqCst);
            }
            issues.extend(phase_issues);
            report.phases.push(result);
        }

        sort_issues(&mut issues);
        report.issues = issues;
        info!(
            phases = report.phases.len(),
            issues = report.issues.len(),
            executions = report.executions,
            cache_skips = report.cache_skips,
            ms = started.elapsed().as_millis() as u64,
            "verification complete"
        );
        report
    }

    fn run_documents(
        &self,
        descriptor: &PhaseDescriptor,
        check: fn(&PhaseContext<'_>, &Document) -> Vec<Issue>,
    ) -> (PhaseResult, Vec<Issue>) {
        let documents: Vec<&Document> = self.ctx.registry.all().filter(|d| self.in_scope(d)).collect();

        let checks: Vec<Check> = documents
            .par_iter()
            .map(|doc| self.check_document(descriptor, check, doc))
            .collect();

        let mut result = PhaseResult::new(descriptor.code);
        let mut issues = Vec::new();
        for outcome in checks {
            result.checked += 1;
            match outcome {
                Check::Skipped => {
                    result.skipped += 1;
                    result.passed += 1;
                }
                Check::Ran(found) if found.is_empty() => result.passed += 1,
                Check::Ran(found) => {
                    result.failed += 1;
                    result.issues += found.len();
                    issues.extend(found);
                }
            }
        }
        (result, issues)
    }

    fn check_document(
        &self,
        descriptor: &PhaseDescriptor,
        check: fn(&PhaseContext<'_>, &Document) -> Vec<Issue>,
        doc: &Document,
    ) -> Check {
        let cache = self.cache.filter(|_| descriptor.cache_eligible);
        let Some(cache) = cache else {
            return Check::Ran(check(&self.ctx, doc));
        };

        let key = self.paths.key(&doc.path);
        cache.observe(&key, &doc.body_hash);
        if cache.is_verified(&key, &doc.body_hash, descriptor.code) {
            return Check::Skipped;
        }
        let issues = check(&self.ctx, doc);
        if issues.is_empty() {
            cache.mark_verified(&key, &doc.body_hash, descriptor.code);
        }
        Check::Ran(issues)
    }

    fn run_corpus(
        &self,
        descriptor: &PhaseDescriptor,
        check: fn(&PhaseContext<'_>) -> Vec<Issue>,
    ) -> (PhaseResult, Vec<Issue>) {
        let issues: Vec<Issue> = check(&self.ctx)
            .into_iter()
            .filter(|i| self.issue_in_scope(i))
            .collect();

        let mut result = PhaseResult::new(descriptor.code);
        let checked = match &self.options.module {
            Some(prefix) => self.ctx.registry.under_module(prefix).count(),
            None => self.ctx.registry.len(),
        };
        let mut failing: Vec<_> = issues.iter().filter_map(|i| i.document.as_ref()).collect();
        failing.sort();
        failing.dedup();

        result.checked = checked;
        result.failed = failing.len().min(checked);
        result.passed = checked - result.failed;
        result.issues = issues.len();
        (result, issues)
    }
}

fn unreadable_path(warning: &ScanWarning) -> Issue {
    let issue = Issue::new(
        PhaseCode::V01,
        IssueKind::UnreadablePath,
        Severity::Warning,
        format!("cannot read {}: {}", warning.path.display(), warning.message),
    )
    .with_evidence(Evidence::Io {
        message: warning.message.clone(),
    });
    if warning.path.as_os_str().is_empty() {
        issue
    } else {
        issue.at_path(warning.path.clone())
    }
}
