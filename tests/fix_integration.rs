//! Integration tests for the repair flow on real files.
//!
//! Each test damages a valid corpus, repairs it through the engine and
//! verifies the result, then repairs again to check idempotence.

mod common;

use std::fs::{self, File};
use std::time::{Duration, SystemTime};

use common::{body, document, TestCorpus};

use corpuscheck::core::metadata::edit::{field_text, set_field};
use corpuscheck::core::ops::CorpusLock;
use corpuscheck::core::paths::CorpusPaths;
use corpuscheck::core::types::ContentHash;
use corpuscheck::doctor::{FixCategory, FixError, FixRequest};
use corpuscheck::engine::health::IssueKind;
use corpuscheck::engine::{EngineError, PipelineOptions, VerificationReport};

const STALE_HASH: &str = "\"0000000000000000\"";

fn verify(corpus: &TestCorpus) -> VerificationReport {
    corpus
        .engine()
        .verify(&PipelineOptions::default())
        .expect("verify failed")
}

fn has_kind(report: &VerificationReport, kind: IssueKind) -> bool {
    report.issues.iter().any(|i| i.kind == kind)
}

/// Replace one front-matter field of a corpus file.
fn tamper(corpus: &TestCorpus, relative: &str, key: &str, value: &str) {
    let content = corpus.read(relative);
    corpus.write(relative, &set_field(&content, key, value).unwrap());
}

fn modified(corpus: &TestCorpus, relative: &str) -> SystemTime {
    fs::metadata(corpus.path().join(relative))
        .unwrap()
        .modified()
        .unwrap()
}

fn backdate(corpus: &TestCorpus, relative: &str, by: Duration) -> SystemTime {
    let time = SystemTime::now() - by;
    File::options()
        .write(true)
        .open(corpus.path().join(relative))
        .unwrap()
        .set_modified(time)
        .unwrap();
    modified(corpus, relative)
}

// =============================================================================
// Hash sync
// =============================================================================

mod hashes {
    use super::*;

    #[test]
    fn stale_hash_is_repaired_once() {
        let corpus = TestCorpus::tree();
        tamper(&corpus, "1/1.2.md", "content_hash", STALE_HASH);
        assert!(has_kind(&verify(&corpus), IssueKind::HashMismatch));

        let engine = corpus.engine();
        let outcome = engine
            .fix(&FixRequest::categories([FixCategory::HashSync], false))
            .unwrap();
        assert_eq!(outcome.total(), 1);
        assert_eq!(outcome.files_written, 1);
        assert_eq!(outcome.counts.get(&FixCategory::HashSync), Some(&1));

        assert!(verify(&corpus).is_clean());

        let again = engine.fix(&FixRequest::all(false)).unwrap();
        assert_eq!(again.total(), 0);
        assert_eq!(again.files_written, 0);
    }

    #[test]
    fn repair_keeps_the_modification_time() {
        let corpus = TestCorpus::tree();
        tamper(&corpus, "1/1.1.md", "content_hash", STALE_HASH);
        let before = backdate(&corpus, "1/1.1.md", Duration::from_secs(2 * 3600));

        corpus
            .engine()
            .fix(&FixRequest::categories([FixCategory::HashSync], false))
            .unwrap();

        assert_eq!(modified(&corpus, "1/1.1.md"), before);
        let expected = ContentHash::of_body(&body("Document 1.1"));
        assert_eq!(
            field_text(&corpus.read("1/1.1.md"), "content_hash").as_deref(),
            Some(format!("\"{expected}\"").as_str())
        );
    }

    #[test]
    fn missing_hash_is_filled() {
        let corpus = TestCorpus::new();
        let text = body("Root");
        corpus.write(
            "1.md",
            &format!(
                "---\n{}last_updated: \"{}\"\n---\n{text}",
                common::front("1", None, &[]),
                corpuscheck::core::metadata::schema::format_timestamp(&chrono::Local::now())
            ),
        );
        assert!(has_kind(&verify(&corpus), IssueKind::MissingField));

        let outcome = corpus.engine().fix(&FixRequest::all(false)).unwrap();
        assert_eq!(outcome.counts.get(&FixCategory::HashSync), Some(&1));
        assert!(verify(&corpus).is_clean());
    }
}

// =============================================================================
// Date sync
// =============================================================================

mod dates {
    use super::*;

    #[test]
    fn drifted_date_follows_the_file() {
        let corpus = TestCorpus::tree();
        tamper(&corpus, "1/1.2.md", "last_updated", "\"2020-01-01 00:00\"");
        let before = modified(&corpus, "1/1.2.md");
        assert!(has_kind(&verify(&corpus), IssueKind::DateDrift));

        let outcome = corpus
            .engine()
            .fix(&FixRequest::categories([FixCategory::DateSync], false))
            .unwrap();
        assert_eq!(outcome.total(), 1);
        assert_eq!(outcome.changes[0].before.as_deref(), Some("2020-01-01 00:00"));

        assert_eq!(modified(&corpus, "1/1.2.md"), before);
        let report = verify(&corpus);
        assert!(!has_kind(&report, IssueKind::DateDrift), "{:#?}", report.issues);

        let again = corpus
            .engine()
            .fix(&FixRequest::categories([FixCategory::DateSync], false))
            .unwrap();
        assert_eq!(again.total(), 0);
    }

    #[test]
    fn drift_within_tolerance_is_left_alone() {
        let corpus = TestCorpus::tree();
        backdate(&corpus, "1.md", Duration::from_secs(3600));

        let outcome = corpus
            .engine()
            .fix(&FixRequest::categories([FixCategory::DateSync], false))
            .unwrap();
        assert_eq!(outcome.total(), 0);
    }
}

// =============================================================================
// Table repair and ordering
// =============================================================================

mod tables {
    use super::*;

    fn overview(count_1_1: u64, count_1_2: u64) -> String {
        format!(
            "{}\n| Document | Descendants |\n|---|---|\n| [[1.1]] | {count_1_1} |\n| [[1.2]] | {count_1_2} |\n",
            body("Overview")
        )
    }

    fn damaged() -> TestCorpus {
        let corpus = TestCorpus::tree();
        corpus.write("1.md", &document("1", None, &[], &overview(5, 0)));
        corpus
    }

    #[test]
    fn counts_then_hash_in_one_run() {
        let corpus = damaged();
        assert!(has_kind(&verify(&corpus), IssueKind::DescendantTableMismatch));

        let outcome = corpus.engine().fix(&FixRequest::all(false)).unwrap();
        assert_eq!(outcome.counts.get(&FixCategory::TableRepair), Some(&1));
        assert_eq!(outcome.counts.get(&FixCategory::HashSync), Some(&1));
        assert_eq!(outcome.files_written, 1);
        assert!(outcome.conflicts.is_empty());

        let content = corpus.read("1.md");
        assert!(content.contains("| [[1.1]] | 1 |"));
        assert!(content.contains("| [[1.2]] | 0 |"));
        let report = verify(&corpus);
        assert!(report.is_clean(), "{:#?}", report.issues);

        let again = corpus.engine().fix(&FixRequest::all(false)).unwrap();
        assert_eq!(again.total(), 0);
    }

    #[test]
    fn dry_run_writes_nothing_but_sees_its_own_changes() {
        let corpus = damaged();
        let before = corpus.read("1.md");

        let outcome = corpus.engine().fix(&FixRequest::all(true)).unwrap();
        assert!(outcome.dry_run);
        assert_eq!(outcome.files_written, 0);
        assert_eq!(outcome.counts.get(&FixCategory::TableRepair), Some(&1));
        assert_eq!(outcome.counts.get(&FixCategory::HashSync), Some(&1));

        assert_eq!(corpus.read("1.md"), before);
        assert!(!corpus.path().join(".corpuscheck/lock").exists());
    }
}

// =============================================================================
// Requests and locking
// =============================================================================

mod requests {
    use super::*;

    #[test]
    fn issue_requests_touch_only_their_documents() {
        let corpus = TestCorpus::tree();
        tamper(&corpus, "1/1.1.md", "content_hash", STALE_HASH);
        tamper(&corpus, "1/1.2.md", "content_hash", STALE_HASH);

        let report = verify(&corpus);
        let targeted: Vec<_> = report
            .issues
            .into_iter()
            .filter(|i| i.kind == IssueKind::HashMismatch)
            .filter(|i| i.path.as_deref() == Some(std::path::Path::new("1/1.1.md")))
            .collect();
        assert_eq!(targeted.len(), 1);

        let outcome = corpus
            .engine()
            .fix(&FixRequest::issues(targeted, false))
            .unwrap();
        assert_eq!(outcome.total(), 1);
        assert_eq!(
            field_text(&corpus.read("1/1.2.md"), "content_hash").as_deref(),
            Some(STALE_HASH)
        );
    }

    #[test]
    fn locked_corpus_refuses_repairs() {
        let corpus = TestCorpus::tree();
        let _held = CorpusLock::acquire(&CorpusPaths::new(corpus.path())).unwrap();

        let result = corpus.engine().fix(&FixRequest::all(false));
        assert!(matches!(
            result,
            Err(EngineError::Fix(FixError::Lock(_)))
        ));
    }

    #[test]
    fn repairs_invalidate_the_cache() {
        let corpus = TestCorpus::tree();
        verify(&corpus);
        tamper(&corpus, "1/1.2.md", "content_hash", STALE_HASH);

        corpus.engine().fix(&FixRequest::all(false)).unwrap();
        let report = verify(&corpus);
        assert!(report.is_clean());
        assert_eq!(report.cache_skips, 7 * 3);
    }
}
