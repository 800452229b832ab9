//! User-configured output fields.
//!
//! A user names the columns they want ("Amount Due", "Customer ID",
//! "Reading"). Each name is classified into a kind, the pack patterns for
//! that kind are reused, and a `"<name>: value"` label is the fallback. The
//! values land in [`Bill::custom_fields`](crate::models::bill::Bill), never in
//! the fixed fields.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{BillExtractor, ConfidencePolicy, Document, FoundAmount, SharedFields, assemble};
use crate::bill::rules::DateParser;
use crate::error::PatternError;
use crate::language::Language;
use crate::models::bill::{ExtractionMethod, ExtractionResult, UserFieldValue};
use crate::models::config::ExtractionConfig;
use crate::patterns::{Field, LanguagePatternPack, PatternStore};

/// What a user field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFieldKind {
    Amount,
    Date,
    Vendor,
    AccountNumber,
    InvoiceNumber,
    Text,
}

/// A configured output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFieldSpec {
    pub name: String,
    /// Classified from the name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<UserFieldKind>,
}

impl UserFieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: UserFieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn resolved_kind(&self) -> UserFieldKind {
        self.kind.unwrap_or_else(|| classify(&self.name))
    }
}

const AMOUNT_WORDS: &[&str] = &[
    "amount", "total", "sum", "price", "cost", "fee", "balance", "charge", "összeg", "osszeg",
    "végösszeg", "fizetendő", "díj", "dij",
];
const DATE_WORDS: &[&str] = &[
    "date", "due", "deadline", "issued", "dátum", "datum", "határidő", "hatarido", "kelt",
    "esedékes",
];
const DUE_WORDS: &[&str] = &["due", "deadline", "határidő", "hatarido", "esedékes"];
const VENDOR_WORDS: &[&str] = &[
    "vendor", "company", "biller", "merchant", "provider", "payee", "supplier", "szolgáltató",
    "eladó", "cég",
];
const INVOICE_WORDS: &[&str] = &["invoice", "bill", "statement", "reference", "számla", "szamla", "sorszám"];
const ACCOUNT_WORDS: &[&str] = &[
    "account", "customer", "client", "contract", "ügyfél", "ugyfel", "azonosító", "szerződés",
];

/// Classify a field name by its words, first matching kind wins:
/// amount, date, vendor, invoice number, account number, else text.
pub fn classify(name: &str) -> UserFieldKind {
    let tokens = tokens(name);
    let has = |words: &[&str]| tokens.iter().any(|t| words.iter().any(|w| t.starts_with(w)));

    if has(AMOUNT_WORDS) {
        UserFieldKind::Amount
    } else if has(DATE_WORDS) {
        UserFieldKind::Date
    } else if has(VENDOR_WORDS) {
        UserFieldKind::Vendor
    } else if has(INVOICE_WORDS) {
        UserFieldKind::InvoiceNumber
    } else if has(ACCOUNT_WORDS) {
        UserFieldKind::AccountNumber
    } else {
        UserFieldKind::Text
    }
}

fn tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug)]
struct CompiledField {
    name: String,
    kind: UserFieldKind,
    /// Date fields naming a deadline read the due-date patterns.
    due: bool,
    label: Regex,
}

/// Strategy producing a bill plus the configured user fields.
pub struct UserFieldExtractor {
    store: Arc<PatternStore>,
    policy: ConfidencePolicy,
    default_language: Language,
    fields: Vec<CompiledField>,
}

impl UserFieldExtractor {
    pub fn new(store: Arc<PatternStore>, config: &ExtractionConfig) -> Result<Self, PatternError> {
        let fields = config
            .user_fields
            .iter()
            .map(|spec| {
                let label = Regex::new(&format!(
                    r"(?im){}\s*:\s*([^\n]*\S)",
                    regex::escape(spec.name.trim())
                ))
                .map_err(|e| PatternError::InvalidPattern {
                    language: "user".to_string(),
                    field: spec.name.clone(),
                    reason: e.to_string(),
                })?;
                let kind = spec.resolved_kind();
                debug!("User field '{}' classified as {:?}", spec.name, kind);
                Ok(CompiledField {
                    name: spec.name.clone(),
                    kind,
                    due: tokens(&spec.name)
                        .iter()
                        .any(|t| DUE_WORDS.iter().any(|w| t.starts_with(w))),
                    label,
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        Ok(Self {
            store,
            policy: ConfidencePolicy::from_config(config),
            default_language: config.default_language,
            fields,
        })
    }

    /// Names of the configured fields, in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn read_field(
        &self,
        field: &CompiledField,
        text: &str,
        pack: &LanguagePatternPack,
        shared: &SharedFields<'_>,
    ) -> Option<UserFieldValue> {
        let labelled = || {
            field
                .label
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };
        let dates = DateParser::for_pack(pack);

        match field.kind {
            UserFieldKind::Amount => labelled()
                .map(|raw| pack.parse_amount(&raw))
                .filter(|a| *a > Decimal::ZERO)
                .or_else(|| {
                    pack.extract_field(text, Field::Amount)
                        .map(|raw| pack.parse_amount(&raw))
                        .filter(|a| *a > Decimal::ZERO)
                })
                .map(UserFieldValue::Amount),
            UserFieldKind::Date => labelled()
                .and_then(|raw| dates.parse(&raw))
                .or(if field.due {
                    shared.due_date
                } else {
                    shared.billing_date
                })
                .map(UserFieldValue::Date),
            UserFieldKind::Vendor => labelled()
                .or_else(|| Some(shared.vendor.clone()))
                .map(UserFieldValue::Text),
            UserFieldKind::AccountNumber => labelled()
                .or_else(|| shared.account_number.clone())
                .map(UserFieldValue::Text),
            UserFieldKind::InvoiceNumber => labelled()
                .or_else(|| shared.invoice_number.clone())
                .map(UserFieldValue::Text),
            UserFieldKind::Text => labelled().map(UserFieldValue::Text),
        }
    }
}

impl BillExtractor for UserFieldExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::UserFields
    }

    fn default_language(&self) -> Language {
        self.default_language
    }

    fn extract_document(&self, doc: &Document<'_>) -> ExtractionResult {
        let pack = self.store.pack(doc.language);
        let text = doc.text.as_ref();

        if !doc.trusted && !pack.is_likely_bill(text) {
            return self.policy.not_a_bill(pack.calculate_confidence(text), doc);
        }

        let shared = SharedFields::read(doc, pack);
        let mut custom_fields = BTreeMap::new();
        for field in &self.fields {
            match self.read_field(field, text, pack, &shared) {
                Some(value) => {
                    trace!("User field '{}' = {}", field.name, value);
                    custom_fields.insert(field.name.clone(), value);
                }
                None => debug!("User field '{}' not found", field.name),
            }
        }

        let user_amount = self
            .fields
            .iter()
            .filter(|f| f.kind == UserFieldKind::Amount)
            .find_map(|f| match custom_fields.get(&f.name) {
                Some(UserFieldValue::Amount(amount)) => Some(*amount),
                _ => None,
            });

        let found = match user_amount {
            Some(amount) => Some(FoundAmount {
                amount,
                currency: pack.detect_currency(text).map(str::to_string),
                from_pack: true,
            }),
            None => pack.extract_field_match(text, Field::Amount).and_then(|m| {
                let amount = pack.parse_amount(&m.value);
                (amount > Decimal::ZERO).then(|| FoundAmount {
                    amount,
                    currency: pack.currency_near(text, m.start, m.end).map(str::to_string),
                    from_pack: true,
                })
            }),
        };

        let Some(found) = found else {
            return self.policy.missing(Field::Amount, pack.calculate_confidence(text), doc);
        };
        assemble(doc, pack, self.method(), &self.policy, shared, found, custom_fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bill::BillSource;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_classify() {
        assert_eq!(classify("Amount Due"), UserFieldKind::Amount);
        assert_eq!(classify("Due Date"), UserFieldKind::Date);
        assert_eq!(classify("Invoice Date"), UserFieldKind::Date);
        assert_eq!(classify("Service Provider"), UserFieldKind::Vendor);
        assert_eq!(classify("Invoice #"), UserFieldKind::InvoiceNumber);
        assert_eq!(classify("Customer ID"), UserFieldKind::AccountNumber);
        assert_eq!(classify("Fizetendő összeg"), UserFieldKind::Amount);
        assert_eq!(classify("Fizetési határidő"), UserFieldKind::Date);
        assert_eq!(classify("Meter Reading"), UserFieldKind::Text);
    }

    #[test]
    fn test_explicit_kind_wins() {
        let spec = UserFieldSpec::new("Total Units").with_kind(UserFieldKind::Text);
        assert_eq!(spec.resolved_kind(), UserFieldKind::Text);
        assert_eq!(UserFieldSpec::new("Total Units").resolved_kind(), UserFieldKind::Amount);
    }

    #[test]
    fn test_spec_serde() {
        let spec: UserFieldSpec =
            serde_json::from_str(r#"{"name": "Reading", "kind": "account_number"}"#).unwrap();
        assert_eq!(spec.kind, Some(UserFieldKind::AccountNumber));
        let spec: UserFieldSpec = serde_json::from_str(r#"{"name": "Reading"}"#).unwrap();
        assert_eq!(spec.kind, None);
    }

    #[test]
    fn test_custom_fields_are_typed_and_separate() {
        let config = ExtractionConfig {
            user_fields: vec![
                UserFieldSpec::new("Amount Due"),
                UserFieldSpec::new("Due Date"),
                UserFieldSpec::new("Meter Reading"),
                UserFieldSpec::new("Customer ID"),
            ],
            ..Default::default()
        };
        let store = Arc::new(PatternStore::builtin().unwrap());
        let extractor = UserFieldExtractor::new(store, &config).unwrap();
        assert_eq!(
            extractor.field_names(),
            vec!["Amount Due", "Due Date", "Meter Reading", "Customer ID"]
        );

        let text = "Water bill\nCustomer ID: WTR-99812\nMeter Reading: 10421 gallons\n\
                    Amount Due: $64.20\nDue Date: 07/01/2023";
        let doc = Document::from_text(text, Language::English, BillSource::email("u1"));
        let result = extractor.extract_document(&doc);
        assert!(result.success, "{:?}", result.error);

        let bill = &result.bills[0];
        assert_eq!(bill.amount, Decimal::from_str("64.20").unwrap());
        assert_eq!(bill.extraction_method, ExtractionMethod::UserFields);
        assert_eq!(
            bill.custom_fields.get("Amount Due"),
            Some(&UserFieldValue::Amount(Decimal::from_str("64.20").unwrap()))
        );
        assert_eq!(
            bill.custom_fields.get("Due Date"),
            Some(&UserFieldValue::Date(NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()))
        );
        assert_eq!(
            bill.custom_fields.get("Meter Reading"),
            Some(&UserFieldValue::Text("10421 gallons".to_string()))
        );
        assert_eq!(
            bill.custom_fields.get("Customer ID"),
            Some(&UserFieldValue::Text("WTR-99812".to_string()))
        );
        assert_eq!(bill.account_number.as_deref(), Some("WTR-99812"));
    }

    #[test]
    fn test_missing_text_field_is_omitted() {
        let config = ExtractionConfig {
            user_fields: vec![UserFieldSpec::new("Tariff")],
            ..Default::default()
        };
        let store = Arc::new(PatternStore::builtin().unwrap());
        let extractor = UserFieldExtractor::new(store, &config).unwrap();
        let doc = Document::from_text(
            "Invoice\nTotal due: $10.00",
            Language::English,
            BillSource::email("u2"),
        );
        let result = extractor.extract_document(&doc);
        assert!(result.success);
        assert!(result.bills[0].custom_fields.is_empty());
    }
}
