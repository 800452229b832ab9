//! Error types for the billscan-core library.

use serde::Serialize;
use thiserror::Error;

use crate::patterns::Field;

/// Main error type for the billscan library.
#[derive(Error, Debug)]
pub enum BillscanError {
    /// Pattern pack loading or compilation error.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while loading or compiling a language pattern pack.
#[derive(Error, Debug)]
pub enum PatternError {
    /// The pack file could not be parsed.
    #[error("failed to parse pattern pack {source_name}: {reason}")]
    Parse { source_name: String, reason: String },

    /// A regex in the pack failed to compile.
    #[error("invalid pattern for {field} in pack '{language}': {reason}")]
    InvalidPattern {
        language: String,
        field: String,
        reason: String,
    },

    /// A field pattern has no capturing group to extract from.
    #[error("pattern for {field} in pack '{language}' has no capture group")]
    MissingCaptureGroup { language: String, field: String },

    /// A structurally invalid pack (weights out of range, bad month table, ...).
    #[error("invalid pattern pack '{language}': {reason}")]
    InvalidPack { language: String, reason: String },

    /// The store has no pack for the default language.
    #[error("no pattern pack for default language '{0}'")]
    MissingDefault(String),

    /// Two packs were supplied for the same language.
    #[error("duplicate pattern pack for language '{0}'")]
    DuplicatePack(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors raised by chunked transfer session transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// No session is open for the connection.
    #[error("no transfer session for connection {0}")]
    UnknownSession(u64),

    /// A session is already open for the connection.
    #[error("transfer session already open for connection {0}")]
    SessionExists(u64),

    /// The declared chunk count is zero or above the configured limit.
    #[error("invalid chunk count {requested} (limit {limit})")]
    InvalidChunkCount { requested: usize, limit: usize },

    /// Chunk index outside `0..total`.
    #[error("chunk index {index} out of range (total {total})")]
    IndexOutOfRange { index: usize, total: usize },

    /// The assembled transfer would exceed the configured byte limit.
    #[error("transfer exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// `complete` was called while a chunk slot was still empty.
    #[error("missing chunk {index} of {total}")]
    MissingChunk { index: usize, total: usize },
}

/// Why a single document produced no bill.
///
/// These never abort a batch: every variant is carried inside a failed
/// [`ExtractionResult`](crate::models::bill::ExtractionResult).
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionError {
    /// The bill-likelihood gate rejected the document.
    #[error("not a bill (confidence {confidence:.2})")]
    NotABill { confidence: f32 },

    /// A mandatory field could not be extracted or parsed.
    #[error("missing required field: {field}")]
    MissingField { field: Field },

    /// No recovery strategy could decode the input.
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    /// A bounded extraction step ran out of time.
    #[error("extraction timed out after {millis}ms")]
    Timeout { millis: u64 },
}

/// Result type for the billscan library.
pub type Result<T> = std::result::Result<T, BillscanError>;
