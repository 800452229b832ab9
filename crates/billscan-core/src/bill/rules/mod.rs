//! Language-aware field parsers shared by the extraction strategies.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod vendor;

pub use amounts::{
    AmountExtractor, currency_token_regex, format_amount, parse_amount, parse_amount_stripping,
    select_payable,
};
pub use dates::{DateExtractor, DateParser};
pub use vendor::{VendorHints, resolve_vendor};

/// A parser for one kind of bill value (amounts, dates) in free text.
pub trait FieldExtractor {
    type Output;

    /// First value in reading order.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Every value, in reading order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A parsed value together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionMatch<T> {
    pub value: T,
    /// How sure the parser is of the reading, 0.0 - 1.0.
    pub confidence: f32,
    /// Byte span in the searched text.
    pub position: Option<(usize, usize)>,
    /// The matched text, verbatim.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }
}
