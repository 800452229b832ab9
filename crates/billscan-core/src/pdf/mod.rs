//! PDF text recovery.
//!
//! Text is obtained through an ordered list of [`TextRecoveryStrategy`]s,
//! from the document model down to raw byte heuristics, driven by
//! [`RecoveryChain`].

mod byte_scan;
mod chain;
mod extractor;
mod stream_scan;

pub use byte_scan::ByteRangeScan;
pub use chain::RecoveryChain;
pub use extractor::StructuredExtractor;
pub use stream_scan::StreamMarkerScan;

use crate::error::{ExtractionError, PdfError};

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// One way of turning PDF bytes into text.
pub trait TextRecoveryStrategy: Send + Sync {
    /// Short name for logs and results.
    fn name(&self) -> &'static str;

    /// How much to trust text from this strategy (0.0 - 1.0).
    fn confidence_hint(&self) -> f32;

    /// Run on the blocking pool, raced against the structured timeout.
    fn time_bounded(&self) -> bool {
        false
    }

    /// Recover text, or `None` when the strategy finds nothing usable.
    fn recover(&self, bytes: &[u8]) -> Option<String>;
}

/// A strategy that did not finish.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryFailure {
    pub strategy: &'static str,
    pub error: ExtractionError,
}

/// Text assembled by the recovery chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredText {
    /// Primary text plus any appended fallback texts.
    pub text: String,
    /// Hint of the first strategy that produced text; 0 when none did.
    pub confidence_hint: f32,
    /// Strategies whose text is included, in order.
    pub strategies: Vec<&'static str>,
    /// Strategies that timed out or crashed.
    pub failures: Vec<RecoveryFailure>,
}

impl RecoveredText {
    /// Text supplied by the caller, trusted as fully decoded.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence_hint: 1.0,
            strategies: vec!["provided"],
            failures: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence_hint: 0.0,
            strategies: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// First timeout among the failures.
    pub fn timeout(&self) -> Option<&ExtractionError> {
        self.failures
            .iter()
            .map(|f| &f.error)
            .find(|e| matches!(e, ExtractionError::Timeout { .. }))
    }
}

/// Decode one byte as Latin-1, except that the Latin-2 positions of the
/// Hungarian double-acute letters map to ő, ű, Ő and Ű.
pub(crate) fn decode_byte(b: u8) -> char {
    match b {
        0xD5 => 'Ő',
        0xDB => 'Ű',
        0xF5 => 'ő',
        0xFB => 'ű',
        _ => char::from(b),
    }
}
