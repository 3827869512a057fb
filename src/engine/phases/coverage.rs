//! engine::phases::coverage
//!
//! Documents too short for their module. The threshold is the longest
//! matching `module_min_words` prefix, falling back to `min_words`.

use crate::core::document::Document;
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::{PhaseCode, PhaseContext};

/// V16: word count below the module threshold.
///
/// An empty body is a Warning; a short one is Info.
pub fn coverage(ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    if doc.is_stub() {
        return Vec::new();
    }
    let threshold = ctx.config.min_words_for(doc.id.as_ref());
    if doc.word_count >= threshold {
        return Vec::new();
    }

    let severity = if doc.word_count == 0 {
        Severity::Warning
    } else {
        Severity::Info
    };
    vec![Issue::new(
        PhaseCode::V16,
        IssueKind::LowWordCount,
        severity,
        format!("{} words, below the threshold of {threshold}", doc.word_count),
    )
    .at(doc)
    .with_evidence(Evidence::Count {
        line: None,
        subject: "words".into(),
        declared: Some(threshold as u64),
        actual: doc.word_count as u64,
    })]
}
