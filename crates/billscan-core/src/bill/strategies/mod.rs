//! Extraction strategies.
//!
//! Every strategy turns one [`Document`] into an [`ExtractionResult`]. They
//! share the field readers in this module and one [`ConfidencePolicy`], and
//! differ in how they gate the document and where they look for the amount.

mod heuristic;
mod pattern;
pub mod user_fields;

pub use heuristic::RegexExtractor;
pub use pattern::PatternExtractor;
pub use user_fields::{UserFieldExtractor, UserFieldKind, UserFieldSpec};

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::normalize::normalize;
use super::rules::{DateExtractor, DateParser, FieldExtractor, VendorHints, resolve_vendor};
use crate::error::ExtractionError;
use crate::language::Language;
use crate::models::bill::{
    BillSource, ExtractionMethod, ExtractionResult, RawBill, UserFieldValue,
};
use crate::models::config::ExtractionConfig;
use crate::models::context::{EmailContext, PdfContext};
use crate::patterns::{Field, LanguagePatternPack, VendorOverride};
use crate::pdf::RecoveredText;

/// A bill extraction strategy.
pub trait BillExtractor: Send + Sync {
    /// Method stamped on the bills this strategy produces.
    fn method(&self) -> ExtractionMethod;

    /// Language used when the document has no usable hint and detection ties.
    fn default_language(&self) -> Language;

    /// Extract from an already assembled document.
    fn extract_document(&self, doc: &Document<'_>) -> ExtractionResult;

    /// Extract from an email's subject and body.
    fn extract_from_email(&self, ctx: &EmailContext) -> ExtractionResult {
        if ctx.subject.trim().is_empty() && ctx.body.trim().is_empty() {
            return ExtractionResult::failed(
                ExtractionError::MalformedInput {
                    reason: "email has no subject or body".to_string(),
                },
                0.0,
            );
        }
        let doc = Document::from_email(ctx, self.default_language());
        self.extract_document(&doc)
    }

    /// Extract from text recovered out of a PDF.
    fn extract_from_pdf(&self, ctx: &PdfContext, recovered: &RecoveredText) -> ExtractionResult {
        if recovered.is_empty() {
            let error = recovered.timeout().cloned().unwrap_or_else(|| {
                ExtractionError::MalformedInput {
                    reason: format!("no text could be recovered from {}", ctx.file_name),
                }
            });
            return ExtractionResult::failed(error, 0.0);
        }
        let doc = Document::from_pdf(ctx, recovered, self.default_language());
        self.extract_document(&doc)
    }
}

/// One document prepared for extraction.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub text: Cow<'a, str>,
    pub language: Language,
    /// Skips the bill-likelihood gates.
    pub trusted: bool,
    pub source: BillSource,
    /// Receive date of the carrying email.
    pub received_on: Option<NaiveDate>,
    pub sender: Option<&'a str>,
    pub file_name: Option<&'a str>,
    /// Confidence hint of the text recovery; 1.0 for email text.
    pub recovery_hint: f32,
}

impl<'a> Document<'a> {
    pub fn from_email(ctx: &'a EmailContext, default_language: Language) -> Self {
        let text = ctx.text();
        let language = Language::resolve_or(ctx.language.as_deref(), &text, default_language);
        Self {
            text: Cow::Owned(text),
            language,
            trusted: ctx.trusted_source,
            source: BillSource::email(ctx.message_id.as_str()),
            received_on: ctx.received_at.map(|t| t.date_naive()),
            sender: Some(ctx.sender.as_str()).filter(|s| !s.trim().is_empty()),
            file_name: None,
            recovery_hint: 1.0,
        }
    }

    pub fn from_pdf(
        ctx: &'a PdfContext,
        recovered: &'a RecoveredText,
        default_language: Language,
    ) -> Self {
        let language =
            Language::resolve_or(ctx.language.as_deref(), &recovered.text, default_language);
        Self {
            text: Cow::Borrowed(recovered.text.as_str()),
            language,
            trusted: ctx.trusted_source,
            source: BillSource::pdf(
                ctx.source_message_id.clone(),
                ctx.attachment_id.clone(),
                ctx.file_name.as_str(),
            ),
            received_on: ctx.received_at.map(|t| t.date_naive()),
            sender: None,
            file_name: Some(ctx.file_name.as_str()),
            recovery_hint: recovered.confidence_hint,
        }
    }

    /// Plain-text document, mostly for tests and the CLI's `.txt` input.
    pub fn from_text(text: &'a str, language: Language, source: BillSource) -> Self {
        Self {
            text: Cow::Borrowed(text),
            language,
            trusted: false,
            source,
            received_on: None,
            sender: None,
            file_name: None,
            recovery_hint: 1.0,
        }
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn with_recovery_hint(mut self, hint: f32) -> Self {
        self.recovery_hint = hint;
        self
    }
}

/// Floors and caps applied to a strategy's raw score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    pub trusted_floor: f32,
    pub rejection_cap: f32,
    pub vendor_floor: f32,
}

impl ConfidencePolicy {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            trusted_floor: config.trusted_confidence_floor,
            rejection_cap: config.rejection_confidence_cap,
            vendor_floor: config.vendor_override_floor,
        }
    }

    /// Confidence reported with a failure; never above the rejection cap.
    pub fn rejected(&self, score: f32, doc: &Document<'_>) -> f32 {
        (score * doc.recovery_hint).min(self.rejection_cap).clamp(0.0, 1.0)
    }

    /// Confidence of an accepted bill.
    ///
    /// The score is scaled by the recovery hint first, then raised to the
    /// vendor-override and trusted-source floors.
    pub fn accepted(&self, score: f32, doc: &Document<'_>, vendor_override: bool) -> f32 {
        let mut confidence = score * doc.recovery_hint;
        if vendor_override {
            confidence = confidence.max(self.vendor_floor);
        }
        if doc.trusted {
            confidence = confidence.max(self.trusted_floor);
        }
        confidence.clamp(0.0, 1.0)
    }

    /// Gate rejection.
    pub fn not_a_bill(&self, score: f32, doc: &Document<'_>) -> ExtractionResult {
        let confidence = self.rejected(score, doc);
        ExtractionResult::failed(ExtractionError::NotABill { confidence }, confidence)
    }

    /// A required field is absent or unusable.
    pub fn missing(&self, field: Field, score: f32, doc: &Document<'_>) -> ExtractionResult {
        ExtractionResult::failed(
            ExtractionError::MissingField { field },
            self.rejected(score, doc),
        )
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

/// Fields every strategy reads the same way.
#[derive(Debug)]
pub(crate) struct SharedFields<'p> {
    pub vendor_override: Option<&'p VendorOverride>,
    pub vendor: String,
    /// A vendor pattern or override matched, as opposed to a sender or file fallback.
    pub vendor_matched: bool,
    pub due_date: Option<NaiveDate>,
    pub billing_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub account_number: Option<String>,
    pub invoice_number: Option<String>,
}

impl<'p> SharedFields<'p> {
    pub fn read(doc: &Document<'_>, pack: &'p LanguagePatternPack) -> Self {
        let text = doc.text.as_ref();
        let dates = DateParser::for_pack(pack);

        let vendor_override = pack.match_vendor(text);
        let vendor_pattern = pack.extract_field(text, Field::Vendor);
        let vendor_matched = vendor_override.is_some() || vendor_pattern.is_some();
        let vendor = resolve_vendor(&VendorHints {
            override_name: vendor_override.map(VendorOverride::name),
            pattern: vendor_pattern,
            sender: doc.sender,
            file_name: doc.file_name,
        });

        let due_date = pack
            .extract_field(text, Field::DueDate)
            .and_then(|raw| dates.parse(&raw));
        let billing_date = pack
            .extract_field(text, Field::BillingDate)
            .and_then(|raw| dates.parse(&raw))
            .or(doc.received_on)
            .or_else(|| {
                DateExtractor::new(dates)
                    .extract_all(text)
                    .into_iter()
                    .map(|m| m.value)
                    .find(|d| Some(*d) != due_date)
            });

        let category = vendor_override
            .and_then(VendorOverride::category)
            .map(str::to_string)
            .or_else(|| pack.detect_service_type(text).map(|s| s.category));

        Self {
            vendor_override,
            vendor,
            vendor_matched,
            due_date,
            billing_date,
            category,
            account_number: pack.extract_field(text, Field::AccountNumber),
            invoice_number: pack.extract_field(text, Field::InvoiceNumber),
        }
    }
}

/// The amount a strategy settled on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FoundAmount {
    pub amount: Decimal,
    pub currency: Option<String>,
    /// Came from pack or vendor patterns rather than a generic regex.
    pub from_pack: bool,
}

/// Build the accepted result from the shared fields and the chosen amount.
pub(crate) fn assemble(
    doc: &Document<'_>,
    pack: &LanguagePatternPack,
    method: ExtractionMethod,
    policy: &ConfidencePolicy,
    shared: SharedFields<'_>,
    found: FoundAmount,
    custom_fields: BTreeMap<String, UserFieldValue>,
) -> ExtractionResult {
    let text = doc.text.as_ref();

    let mut score = pack.calculate_confidence(text);
    if found.from_pack && shared.due_date.is_some() && shared.vendor_matched {
        score = score.max(pack.weights().full_extraction);
    }
    let confidence = policy.accepted(score, doc, shared.vendor_override.is_some());

    let currency = shared
        .vendor_override
        .and_then(VendorOverride::currency)
        .map(str::to_string)
        .or(found.currency)
        .or_else(|| pack.detect_currency(text).map(str::to_string));

    debug!(
        "Fields for {}: vendor={}, due={:?}, billing={:?}, score={:.2}",
        doc.source.bill_id(),
        shared.vendor,
        shared.due_date,
        shared.billing_date,
        score
    );

    let raw = RawBill {
        vendor: Some(shared.vendor),
        amount: found.amount,
        currency,
        billing_date: shared.billing_date,
        due_date: shared.due_date,
        category: shared.category,
        account_number: shared.account_number,
        invoice_number: shared.invoice_number,
        custom_fields,
    };
    let bill = normalize(raw, doc.source.clone(), pack, method, confidence);

    info!(
        "{} strategy found bill {}: {} {} {} (confidence {:.2})",
        method, bill.id, bill.vendor, bill.amount, bill.currency, confidence
    );
    ExtractionResult::found(vec![bill], confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternStore;
    use chrono::{TimeZone, Utc};

    fn doc(text: &str) -> Document<'_> {
        Document::from_text(text, Language::English, BillSource::email("t"))
    }

    #[test]
    fn test_policy_floors() {
        let policy = ConfidencePolicy::default();
        let d = doc("x");
        assert_eq!(policy.accepted(0.4, &d, false), 0.4);
        assert_eq!(policy.accepted(0.4, &d, true), 0.7);
        assert_eq!(policy.accepted(0.4, &d.clone().trusted(true), false), 0.85);
        assert_eq!(policy.accepted(1.7, &d, false), 1.0);
    }

    #[test]
    fn test_policy_scales_by_recovery_hint_before_floors() {
        let policy = ConfidencePolicy::default();
        let d = doc("x").with_recovery_hint(0.5);
        assert_eq!(policy.accepted(0.8, &d, false), 0.4);
        assert_eq!(policy.accepted(0.8, &d, true), 0.7);
    }

    #[test]
    fn test_rejection_is_capped() {
        let policy = ConfidencePolicy::default();
        assert_eq!(policy.rejected(0.9, &doc("x")), 0.2);
        assert_eq!(policy.rejected(0.1, &doc("x")), 0.1);

        let result = policy.not_a_bill(0.9, &doc("x"));
        assert!(!result.success);
        assert_eq!(result.error, Some(ExtractionError::NotABill { confidence: 0.2 }));
    }

    #[test]
    fn test_email_document() {
        let ctx = EmailContext::new("m1", "Számla", "Fizetendő összeg: 121.975 Ft")
            .with_sender("MVM <szamla@mvm.hu>")
            .with_received_at(Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap());
        let d = Document::from_email(&ctx, Language::English);
        assert_eq!(d.language, Language::Hungarian);
        assert_eq!(d.source.bill_id(), "email-m1");
        assert_eq!(d.received_on, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(d.sender, Some("MVM <szamla@mvm.hu>"));
    }

    #[test]
    fn test_language_hint_wins_over_detection() {
        let ctx = EmailContext::new("m1", "Invoice", "Amount due: $5").with_language("hu");
        assert_eq!(
            Document::from_email(&ctx, Language::English).language,
            Language::Hungarian
        );
    }

    #[test]
    fn test_shared_fields() {
        let store = PatternStore::builtin().unwrap();
        let text = "PG&E Energy Statement\nStatement Date: 05/20/2023\n\
                    Payment Due Date: 06/15/2023\nAccount Number: 1234 5678 90\n\
                    Your electric service";
        let d = doc(text);
        let shared = SharedFields::read(&d, store.pack(Language::English));
        assert_eq!(shared.vendor, "Pacific Gas and Electric");
        assert!(shared.vendor_matched);
        assert_eq!(shared.due_date, NaiveDate::from_ymd_opt(2023, 6, 15));
        assert_eq!(shared.billing_date, NaiveDate::from_ymd_opt(2023, 5, 20));
        assert_eq!(shared.category.as_deref(), Some("Utilities"));
        assert_eq!(shared.account_number.as_deref(), Some("1234567890"));
    }

    #[test]
    fn test_billing_date_falls_back_to_other_date() {
        let store = PatternStore::builtin().unwrap();
        let d = doc("Due date: 06/15/2023\nService from 05/01/2023");
        let shared = SharedFields::read(&d, store.pack(Language::English));
        assert_eq!(shared.billing_date, NaiveDate::from_ymd_opt(2023, 5, 1));
    }
}
