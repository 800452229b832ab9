//! Core library for finding bills in emails and PDF attachments.
//!
//! This crate provides:
//! - Per-language pattern packs (English, Hungarian) compiled from JSON
//! - Locale-aware amount and date parsing
//! - PDF text recovery from the document model down to raw bytes
//! - Pattern, regex and user-field extraction strategies
//! - Bill normalization and batch deduplication
//! - Chunked PDF transfer sessions

pub mod bill;
pub mod error;
pub mod language;
pub mod models;
pub mod patterns;
pub mod pdf;
pub mod scan;
pub mod transfer;

pub use bill::rules::{format_amount, parse_amount};
pub use bill::{BillExtractor, Document, deduplicate, normalize};
pub use error::{BillscanError, ExtractionError, Result};
pub use language::Language;
pub use models::bill::{Bill, BillSource, ExtractionMethod, ExtractionResult, UserFieldValue};
pub use models::config::EngineConfig;
pub use models::context::{EmailContext, PdfContent, PdfContext, ScanInput};
pub use patterns::{Field, LanguagePatternPack, PatternStore};
pub use pdf::{RecoveredText, RecoveryChain, TextRecoveryStrategy};
pub use scan::{BatchOutcome, BatchScan, BatchStats, BillScanner};
pub use transfer::{CompletedTransfer, ConnectionId, TransferMetadata, TransferSessions};
