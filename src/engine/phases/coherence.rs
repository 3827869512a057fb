//! engine::phases::coherence
//!
//! Metadata that must agree with the file: dates and content hashes.
//!
//! The drift rule lives here and is shared with the date repair, so the
//! phase and the repair can never disagree about what counts as drift.

use crate::core::document::Document;
use crate::core::metadata::schema::format_timestamp;
use crate::engine::health::{Evidence, Issue, IssueKind, Severity};

use super::{PhaseCode, PhaseContext};

/// Minutes between the stored `last_updated` and the file modification
/// time, when both are known.
pub fn drift_minutes(doc: &Document) -> Option<i64> {
    let stored = doc.last_updated?;
    let modified = doc.modified_local()?;
    Some((modified - stored).num_minutes().abs())
}

/// Whether a document's date drifts beyond the tolerance.
pub fn exceeds_tolerance(doc: &Document, tolerance_minutes: u64) -> bool {
    drift_minutes(doc)
        .map(|drift| drift > i64::try_from(tolerance_minutes).unwrap_or(i64::MAX))
        .unwrap_or(false)
}

/// V06: `last_updated` too far from the file modification time.
pub fn dates(ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    let tolerance = ctx.config.date_tolerance_minutes;
    if doc.is_stub() || !exceeds_tolerance(doc, tolerance) {
        return Vec::new();
    }
    let (Some(drift), Some(modified)) = (drift_minutes(doc), doc.modified_local()) else {
        return Vec::new();
    };

    vec![Issue::new(
        PhaseCode::V06,
        IssueKind::DateDrift,
        Severity::Warning,
        format!("last_updated is {drift} minutes away from the file modification time (tolerance {tolerance})"),
    )
    .at(doc)
    .with_evidence(Evidence::Drift {
        stored: doc.last_updated.as_ref().map(format_timestamp),
        modified: format_timestamp(&modified),
        minutes: drift,
    })
    .fixable()]
}

/// V07: stored `content_hash` against the hash of the current body.
pub fn hashes(_ctx: &PhaseContext<'_>, doc: &Document) -> Vec<Issue> {
    match &doc.content_hash {
        Some(stored) if stored != &doc.body_hash => vec![Issue::new(
            PhaseCode::V07,
            IssueKind::HashMismatch,
            Severity::Error,
            format!(
                "content_hash {stored} does not match body hash {}",
                doc.body_hash
            ),
        )
        .at(doc)
        .with_evidence(Evidence::Hash {
            stored: Some(stored.to_string()),
            actual: doc.body_hash.to_string(),
        })
        .fixable()],
        _ => Vec::new(),
    }
}
