//! The canonical bill record and the per-document extraction result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::language::Language;

/// A normalized bill.
///
/// Created once per successful extraction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Deterministic identifier derived from the source.
    pub id: String,

    /// Vendor (biller) name.
    pub vendor: String,

    /// Payable amount, never negative.
    pub amount: Decimal,

    /// ISO 4217 currency code.
    pub currency: String,

    /// Date the bill was issued.
    pub billing_date: NaiveDate,

    /// Payment deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Spending category ("Utilities", "Telecommunications", ... or "Other").
    pub category: String,

    /// Customer or account identifier at the vendor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,

    /// Invoice or statement number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Where the bill came from.
    pub source: BillSource,

    /// Strategy that produced the bill.
    pub extraction_method: ExtractionMethod,

    /// Language of the pack used for extraction.
    pub language: Language,

    /// Confidence of the extraction (0.0 - 1.0).
    pub extraction_confidence: f32,

    /// Always false on creation.
    pub is_paid: bool,

    /// User-configured fields, kept apart from the fixed schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, UserFieldValue>,
}

/// Kind of document a bill was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Email,
    Pdf,
    Manual,
    Combined,
}

/// Source descriptor carrying the identifiers a bill id is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillSource {
    pub kind: SourceKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Sequence number for manually entered bills.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

impl BillSource {
    pub fn email(message_id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Email,
            message_id: Some(message_id.into()),
            attachment_id: None,
            file_name: None,
            sequence: None,
        }
    }

    pub fn pdf(
        message_id: Option<String>,
        attachment_id: Option<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            kind: SourceKind::Pdf,
            message_id,
            attachment_id,
            file_name: Some(file_name.into()),
            sequence: None,
        }
    }

    pub fn manual(sequence: u64) -> Self {
        Self {
            kind: SourceKind::Manual,
            message_id: None,
            attachment_id: None,
            file_name: None,
            sequence: Some(sequence),
        }
    }

    /// A bill assembled from an email and its attachments.
    pub fn combined(message_id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Combined,
            message_id: Some(message_id.into()),
            attachment_id: None,
            file_name: None,
            sequence: None,
        }
    }

    /// Deterministic bill id.
    ///
    /// `email-<msg>`, `pdf-<msg>-<attachment>`, `pdf-<msg>`, `pdf-<file>`,
    /// `manual-<n>`, `combined-<msg>`.
    pub fn bill_id(&self) -> String {
        let message = self.message_id.as_deref().unwrap_or("unknown");
        match self.kind {
            SourceKind::Email => format!("email-{message}"),
            SourceKind::Combined => format!("combined-{message}"),
            SourceKind::Manual => format!("manual-{}", self.sequence.unwrap_or(0)),
            SourceKind::Pdf => match (&self.message_id, &self.attachment_id, &self.file_name) {
                (Some(msg), Some(att), _) => format!("pdf-{msg}-{att}"),
                (Some(msg), None, _) => format!("pdf-{msg}"),
                (None, _, Some(file)) => format!("pdf-{file}"),
                (None, _, None) => "pdf-unknown".to_string(),
            },
        }
    }
}

/// Extraction strategy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Pack field patterns behind the document-identifier gate.
    Pattern,
    /// Pack patterns plus generic amount regexes and keyword proximity.
    Regex,
    /// User-configured output fields.
    UserFields,
}

impl ExtractionMethod {
    pub const ALL: [ExtractionMethod; 3] = [
        ExtractionMethod::Pattern,
        ExtractionMethod::Regex,
        ExtractionMethod::UserFields,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionMethod::Pattern => "pattern",
            ExtractionMethod::Regex => "regex",
            ExtractionMethod::UserFields => "user_fields",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pattern" => Ok(ExtractionMethod::Pattern),
            "regex" => Ok(ExtractionMethod::Regex),
            "user_fields" | "user" => Ok(ExtractionMethod::UserFields),
            other => Err(format!(
                "unknown strategy '{other}' (expected pattern, regex or user_fields)"
            )),
        }
    }
}

/// Typed value of a user-configured field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UserFieldValue {
    Amount(Decimal),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for UserFieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserFieldValue::Amount(amount) => write!(f, "{amount}"),
            UserFieldValue::Date(date) => write!(f, "{date}"),
            UserFieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Field values as a strategy found them, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBill {
    pub vendor: Option<String>,
    pub amount: Decimal,
    pub currency: Option<String>,
    pub billing_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub account_number: Option<String>,
    pub invoice_number: Option<String>,
    pub custom_fields: BTreeMap<String, UserFieldValue>,
}

/// Outcome of one extraction attempt on one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub bills: Vec<Bill>,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ExtractionError>,
}

impl ExtractionResult {
    /// A successful result carrying `bills`.
    pub fn found(bills: Vec<Bill>, confidence: f32) -> Self {
        Self {
            success: true,
            bills,
            confidence: clamp_confidence(confidence),
            error: None,
        }
    }

    /// A failed result; never carries bills.
    pub fn failed(error: ExtractionError, confidence: f32) -> Self {
        Self {
            success: false,
            bills: Vec::new(),
            confidence: clamp_confidence(confidence),
            error: Some(error),
        }
    }

    /// Human-readable failure reason.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Field;

    #[test]
    fn test_bill_ids() {
        assert_eq!(BillSource::email("m1").bill_id(), "email-m1");
        assert_eq!(
            BillSource::pdf(Some("m1".into()), Some("a2".into()), "x.pdf").bill_id(),
            "pdf-m1-a2"
        );
        assert_eq!(BillSource::pdf(None, None, "x.pdf").bill_id(), "pdf-x.pdf");
        assert_eq!(BillSource::manual(7).bill_id(), "manual-7");
        assert_eq!(BillSource::combined("m9").bill_id(), "combined-m9");
    }

    #[test]
    fn test_failed_result_has_no_bills() {
        let result = ExtractionResult::failed(
            ExtractionError::MissingField {
                field: Field::Amount,
            },
            1.7,
        );
        assert!(!result.success);
        assert!(result.bills.is_empty());
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.error_message().unwrap(), "missing required field: amount");
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(ExtractionResult::found(Vec::new(), -0.5).confidence, 0.0);
        assert_eq!(ExtractionResult::found(Vec::new(), f32::NAN).confidence, 0.0);
    }

    #[test]
    fn test_extraction_method_from_str() {
        assert_eq!("Regex".parse::<ExtractionMethod>(), Ok(ExtractionMethod::Regex));
        assert_eq!("user-fields".parse::<ExtractionMethod>(), Ok(ExtractionMethod::UserFields));
        assert!("ml".parse::<ExtractionMethod>().is_err());
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let json = serde_json::to_value(ExtractionError::Timeout { millis: 10 }).unwrap();
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["millis"], 10);
    }
}
