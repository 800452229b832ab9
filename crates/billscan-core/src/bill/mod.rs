//! Bill extraction: field parsers, strategies, normalization and dedup.

pub mod dedup;
pub mod normalize;
pub mod rules;
pub mod strategies;

pub use dedup::{DedupKey, deduplicate};
pub use normalize::{DEFAULT_CATEGORY, normalize};
pub use strategies::{
    BillExtractor, ConfidencePolicy, Document, PatternExtractor, RegexExtractor,
    UserFieldExtractor,
};
