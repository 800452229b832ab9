//! Turns strategy output into a canonical [`Bill`].

use chrono::{Local, NaiveDate};
use tracing::trace;

use crate::models::bill::{Bill, BillSource, ExtractionMethod, RawBill};
use crate::patterns::LanguagePatternPack;

/// Category used when neither a vendor override nor a service type decides.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Build a bill from raw fields, filling defaults and stamping identity.
///
/// Missing category becomes `Other`, missing currency the pack's default,
/// missing billing date today. The id comes from `source`.
pub fn normalize(
    raw: RawBill,
    source: BillSource,
    pack: &LanguagePatternPack,
    method: ExtractionMethod,
    confidence: f32,
) -> Bill {
    let id = source.bill_id();
    trace!("Normalizing bill {} from {:?}", id, source.kind);

    Bill {
        id,
        vendor: non_empty(raw.vendor).unwrap_or_else(|| "Unknown".to_string()),
        amount: raw.amount.abs(),
        currency: non_empty(raw.currency)
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| pack.default_currency().to_string()),
        billing_date: raw.billing_date.unwrap_or_else(today),
        due_date: raw.due_date,
        category: non_empty(raw.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        account_number: non_empty(raw.account_number),
        invoice_number: non_empty(raw.invoice_number),
        source,
        extraction_method: method,
        language: pack.language(),
        extraction_confidence: confidence.clamp(0.0, 1.0),
        is_paid: false,
        custom_fields: raw.custom_fields,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::patterns::PatternStore;
    use rust_decimal::Decimal;

    #[test]
    fn test_defaults_are_filled() {
        let store = PatternStore::builtin().unwrap();
        let raw = RawBill {
            amount: Decimal::new(121975, 0),
            vendor: Some("  ".to_string()),
            ..Default::default()
        };
        let bill = normalize(
            raw,
            BillSource::email("m1"),
            store.pack(Language::Hungarian),
            ExtractionMethod::Pattern,
            0.9,
        );

        assert_eq!(bill.id, "email-m1");
        assert_eq!(bill.vendor, "Unknown");
        assert_eq!(bill.currency, "HUF");
        assert_eq!(bill.category, DEFAULT_CATEGORY);
        assert_eq!(bill.language, Language::Hungarian);
        assert!(!bill.is_paid);
        assert_eq!(bill.billing_date, today());
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let store = PatternStore::builtin().unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        let raw = RawBill {
            amount: Decimal::new(13500, 2),
            currency: Some("eur".to_string()),
            category: Some("Utilities".to_string()),
            billing_date: Some(date),
            ..Default::default()
        };
        let bill = normalize(
            raw,
            BillSource::pdf(None, None, "a.pdf"),
            store.pack(Language::English),
            ExtractionMethod::Regex,
            2.0,
        );
        assert_eq!(bill.id, "pdf-a.pdf");
        assert_eq!(bill.currency, "EUR");
        assert_eq!(bill.category, "Utilities");
        assert_eq!(bill.billing_date, date);
        assert_eq!(bill.extraction_confidence, 1.0);
    }
}
