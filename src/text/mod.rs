//! Text Processing Module
//!
//! Sentence segmentation, sequence similarity, and near-duplicate removal
//! for merged retrieval output.

pub mod dedup;
pub mod segment;
pub mod similarity;

pub use dedup::{deduplicate, deduplicate_default, deduplicate_with_report, DedupReport, DEFAULT_THRESHOLD};
pub use segment::sentences;
pub use similarity::{ratio, MatchBlock, SequenceMatcher};
