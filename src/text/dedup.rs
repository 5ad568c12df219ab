//! Near-duplicate Sentence Removal
//!
//! Cleans merged retrieval output before it goes into a prompt. Sentences
//! are kept in first-seen order; a later sentence is dropped when it scores
//! strictly above the threshold against any sentence already kept.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::segment::sentences;
use super::similarity::ratio;

/// Default similarity threshold above which a sentence counts as a duplicate.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Sentence counts for one deduplication pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    /// Non-empty sentence units found in the input
    pub candidates: usize,
    /// Units kept in the output
    pub retained: usize,
    /// Units dropped as near-duplicates
    pub dropped: usize,
}

/// Deduplicate `text` at `threshold`, joining kept sentences with single spaces.
///
/// Total over all inputs: empty or blank text gives an empty string, text
/// with no sentence punctuation comes back trimmed as a single unit.
pub fn deduplicate(text: &str, threshold: f64) -> String {
    deduplicate_with_report(text, threshold).0
}

/// [`deduplicate`] at [`DEFAULT_THRESHOLD`].
pub fn deduplicate_default(text: &str) -> String {
    deduplicate(text, DEFAULT_THRESHOLD)
}

/// Deduplicate and report how many units were kept and dropped.
pub fn deduplicate_with_report(text: &str, threshold: f64) -> (String, DedupReport) {
    let mut retained: Vec<&str> = Vec::new();
    let mut report = DedupReport::default();

    for candidate in sentences(text) {
        report.candidates += 1;
        let duplicate = retained
            .iter()
            .any(|kept| ratio(candidate, kept) > threshold);
        if duplicate {
            report.dropped += 1;
        } else {
            retained.push(candidate);
        }
    }
    report.retained = retained.len();

    debug!(
        candidates = report.candidates,
        retained = report.retained,
        dropped = report.dropped,
        threshold = threshold,
        "Deduplicated sentences"
    );

    (retained.join(" "), report)
}
