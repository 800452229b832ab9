//! Data models for bills, extraction inputs and engine configuration.

pub mod bill;
pub mod config;
pub mod context;

pub use bill::{
    Bill, BillSource, ExtractionMethod, ExtractionResult, RawBill, SourceKind, UserFieldValue,
};
pub use config::{EngineConfig, ExtractionConfig, PatternConfig, RecoveryConfig, TransferConfig};
pub use context::{EmailContext, PdfContent, PdfContext, ScanInput};
