//! Integration tests for verification over real corpora on disk.
//!
//! These tests exercise the full flow: Scan -> Parse -> Merge -> Graph ->
//! Phases, including the persisted hash cache across engine instances.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{body, document, TestCorpus};

use corpuscheck::core::config::EngineConfig;
use corpuscheck::engine::health::{IssueKind, Severity};
use corpuscheck::engine::phases::slow_phases;
use corpuscheck::engine::{PhaseCode, PhaseSelection, PipelineOptions, VerificationReport};

/// Cache-eligible phases: V09-V13, V15, V21.
const CACHED_PHASES: usize = 7;

fn verify(corpus: &TestCorpus) -> VerificationReport {
    corpus
        .engine()
        .verify(&PipelineOptions::default())
        .expect("verify failed")
}

fn kinds(report: &VerificationReport) -> Vec<IssueKind> {
    report.issues.iter().map(|i| i.kind).collect()
}

// =============================================================================
// Findings
// =============================================================================

mod findings {
    use super::*;

    #[test]
    fn valid_tree_is_clean() {
        let corpus = TestCorpus::tree();
        let report = verify(&corpus);

        assert!(report.is_clean(), "unexpected issues: {:#?}", report.issues);
        assert_eq!(report.documents, 4);
        assert_eq!(report.phases.len(), 22);
        assert_eq!(report.exit_code(Severity::Hint), 0);
    }

    #[test]
    fn structural_damage_is_reported() {
        let corpus = TestCorpus::tree();
        corpus.add("2.md", "1.2", None, &[]);
        corpus.add("9.md", "9", Some("8"), &["8"]);
        corpus.add("5/5.md", "5", Some("6"), &["6"]);
        corpus.add("5/6.md", "6", Some("5"), &["5"]);

        let report = verify(&corpus);
        let found = kinds(&report);
        assert!(found.contains(&IssueKind::DuplicateId));
        assert!(found.contains(&IssueKind::InvalidParent));
        assert!(found.contains(&IssueKind::StructuralCycle));
        assert_eq!(report.exit_code(Severity::Warning), 1);
    }

    #[test]
    fn malformed_front_matter_is_a_parse_error() {
        let corpus = TestCorpus::tree();
        corpus.write("broken.md", "---\nid: [unclosed\n---\nbody\n");

        let report = verify(&corpus);
        let parse_errors: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::ParseError)
            .collect();
        assert_eq!(parse_errors.len(), 1);
        assert_eq!(parse_errors[0].severity, Severity::Error);
        assert_eq!(report.documents, 5);
    }

    #[test]
    fn undecodable_file_becomes_unreadable_path() {
        let corpus = TestCorpus::tree();
        std::fs::write(corpus.path().join("binary.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let report = verify(&corpus);
        assert_eq!(report.scan_warnings, 1);
        let issue = report
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::UnreadablePath)
            .expect("unreadable-path issue");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.path.as_deref(), Some(std::path::Path::new("binary.md")));
    }

    #[test]
    fn stale_hash_and_placeholder() {
        let corpus = TestCorpus::tree();
        let stale = corpus.read("1/1.2.md").replace("plain filler", "TODO filler");
        corpus.write("1/1.2.md", &stale);

        let report = verify(&corpus);
        let found = kinds(&report);
        assert!(found.contains(&IssueKind::HashMismatch));
        assert!(found.contains(&IssueKind::Placeholder));
        assert!(report.fixable_count() >= 1);
    }

    #[test]
    fn excluded_files_are_not_scanned() {
        let corpus = TestCorpus::tree();
        corpus.write("test_scratch.md", "no front-matter\n");
        corpus.write(".git/notes.md", "no front-matter\n");
        corpus.write("notes.txt", "no front-matter\n");

        let report = verify(&corpus);
        assert_eq!(report.documents, 4);
        assert!(report.is_clean());
    }
}

// =============================================================================
// Options
// =============================================================================

mod options {
    use super::*;

    #[test]
    fn quick_skips_slow_phases() {
        let corpus = TestCorpus::tree();
        let options = PipelineOptions {
            selection: PhaseSelection::Quick,
            ..PipelineOptions::default()
        };
        let report = corpus.engine().verify(&options).unwrap();

        for slow in slow_phases() {
            assert!(report.phase(slow).is_none(), "{slow} ran in quick mode");
        }
        assert!(report.phase(PhaseCode::V01).is_some());
    }

    #[test]
    fn quick_findings_match_the_fast_phases_of_a_full_run() {
        let corpus = TestCorpus::tree();
        let stale = corpus.read("1/1.2.md").replace("plain filler", "TODO filler");
        corpus.write("1/1.2.md", &stale);
        let long = format!("{}{}\n", body("Document 1.1"), "word ".repeat(100));
        corpus.write("1/1.1.md", &document("1.1", Some("1"), &["1"], &long));
        corpus.add("2.md", "1.1", None, &[]);
        corpus.add("9.md", "9", Some("8"), &["8"]);

        let run = |selection| {
            let options = PipelineOptions {
                selection,
                use_cache: false,
                ..PipelineOptions::default()
            };
            corpus.engine().verify(&options).unwrap()
        };
        let quick = run(PhaseSelection::Quick);
        let full = run(PhaseSelection::All);

        let ids = |report: &VerificationReport, fast_only: bool| -> BTreeSet<String> {
            report
                .issues
                .iter()
                .filter(|i| !fast_only || !i.phase.descriptor().slow)
                .map(|i| i.id.to_string())
                .collect()
        };
        assert!(quick.issues.iter().all(|i| !i.phase.descriptor().slow));
        assert_eq!(ids(&quick, false), ids(&full, true));
        assert!(ids(&full, false).len() > ids(&quick, false).len());

        let quick_kinds = kinds(&quick);
        assert!(quick_kinds.contains(&IssueKind::DuplicateId));
        assert!(quick_kinds.contains(&IssueKind::InvalidParent));
        assert!(quick_kinds.contains(&IssueKind::LineTooLong));
        assert!(!quick_kinds.contains(&IssueKind::HashMismatch));
        assert!(!quick_kinds.contains(&IssueKind::Placeholder));
    }

    #[test]
    fn single_phase() {
        let corpus = TestCorpus::tree();
        let options = PipelineOptions {
            selection: PhaseSelection::Only(PhaseCode::V11),
            ..PipelineOptions::default()
        };
        let report = corpus.engine().verify(&options).unwrap();
        assert_eq!(report.phases.len(), 1);
        assert_eq!(report.phases[0].checked, 4);
    }

    #[test]
    fn module_filter_limits_documents_and_issues() {
        let corpus = TestCorpus::tree();
        corpus.write("1/1.2.md", &document("1.2", Some("1"), &["1"], "# Short\n"));
        corpus.write("1/1.1/1.1.1.md", &document("1.1.1", Some("1.1"), &["1", "1.1"], "# Tiny\n"));

        let options = PipelineOptions {
            module: Some("1.1".into()),
            ..PipelineOptions::default()
        };
        let report = corpus.engine().verify(&options).unwrap();

        assert_eq!(report.phase(PhaseCode::V16).unwrap().checked, 2);
        assert!(report
            .issues
            .iter()
            .all(|i| i.document.as_ref().is_some_and(|id| id.is_under("1.1"))));
        assert_eq!(report.issues_for(PhaseCode::V16).count(), 1);
    }

    #[test]
    fn fail_fast_stops_after_schema_errors() {
        let corpus = TestCorpus::tree();
        corpus.write("3.md", "---\nid: \"3\"\n---\n# Three\n");

        let options = PipelineOptions {
            fail_fast: true,
            ..PipelineOptions::default()
        };
        let report = corpus.engine().verify(&options).unwrap();

        assert!(report.fail_fast_triggered);
        assert_eq!(report.phases.len(), 1);
        assert!(report.issues.iter().all(|i| i.phase == PhaseCode::V01));
    }
}

// =============================================================================
// Cache
// =============================================================================

mod cache {
    use super::*;

    #[test]
    fn second_run_skips_clean_documents() {
        let corpus = TestCorpus::tree();

        let first = verify(&corpus);
        assert_eq!(first.cache_skips, 0);

        let second = verify(&corpus);
        assert_eq!(second.cache_skips, CACHED_PHASES * 4);
        assert_eq!(
            kinds(&first),
            kinds(&second),
            "cache changed the findings"
        );
    }

    #[test]
    fn edited_document_is_checked_again() {
        let corpus = TestCorpus::tree();
        verify(&corpus);

        let edited = document("1.2", Some("1"), &["1"], &format!("{}FIXME\n", body("Two")));
        corpus.write("1/1.2.md", &edited);

        let report = verify(&corpus);
        assert_eq!(report.cache_skips, CACHED_PHASES * 3);
        assert_eq!(report.issues_for(PhaseCode::V15).count(), 1);
    }

    #[test]
    fn issues_are_never_cached() {
        let corpus = TestCorpus::tree();
        corpus.write(
            "1/1.2.md",
            &document("1.2", Some("1"), &["1"], &format!("{}TBD\n", body("Two"))),
        );

        let first = verify(&corpus);
        let second = verify(&corpus);
        assert_eq!(first.issues_for(PhaseCode::V15).count(), 1);
        assert_eq!(second.issues_for(PhaseCode::V15).count(), 1);
    }

    #[test]
    fn identifier_change_rechecks_coverage() {
        let corpus = TestCorpus::new();
        let text = "# Short\n\nthree words here\n";
        let config = || EngineConfig {
            min_words: 5,
            module_min_words: BTreeMap::from([("2".to_string(), 2)]),
            ..corpus.config()
        };

        corpus.write("x.md", &document("2", None, &[], text));
        let first = corpus
            .engine_with(config())
            .verify(&PipelineOptions::default())
            .unwrap();
        assert_eq!(first.issues_for(PhaseCode::V16).count(), 0);

        corpus.write("x.md", &document("1", None, &[], text));
        let second = corpus
            .engine_with(config())
            .verify(&PipelineOptions::default())
            .unwrap();
        assert_eq!(second.issues_for(PhaseCode::V16).count(), 1);
        assert!(second.cache_skips > 0);
    }

    #[test]
    fn no_cache_option_bypasses_the_cache() {
        let corpus = TestCorpus::tree();
        verify(&corpus);

        let options = PipelineOptions {
            use_cache: false,
            ..PipelineOptions::default()
        };
        let report = corpus.engine().verify(&options).unwrap();
        assert_eq!(report.cache_skips, 0);
    }

    #[test]
    fn configuration_change_resets_the_cache() {
        let corpus = TestCorpus::tree();
        verify(&corpus);

        let config = EngineConfig {
            min_words: 10,
            ..corpus.config()
        };
        let report = corpus
            .engine_with(config)
            .verify(&PipelineOptions::default())
            .unwrap();
        assert_eq!(report.cache_skips, 0);
    }

    #[test]
    fn corrupt_cache_file_is_ignored() {
        let corpus = TestCorpus::tree();
        corpus.write(".corpuscheck/cache.json", "{ not json");

        let report = verify(&corpus);
        assert!(report.is_clean());
        assert_eq!(report.cache_skips, 0);
        assert!(serde_json::from_str::<serde_json::Value>(
            &corpus.read(".corpuscheck/cache.json")
        )
        .is_ok());
    }
}
