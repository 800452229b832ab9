//! Batch-level duplicate removal.

use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::bill::Bill;

/// Content key: normalized vendor, amount in cents, billing day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    vendor: String,
    cents: Decimal,
    day: NaiveDate,
}

impl DedupKey {
    pub fn of(bill: &Bill) -> Self {
        Self {
            vendor: normalize_vendor(&bill.vendor),
            cents: bill.amount.round_dp(2),
            day: bill.billing_date,
        }
    }
}

/// Lowercased alphanumerics only: `"PG&E, Inc."` -> `"pgeinc"`.
pub fn normalize_vendor(vendor: &str) -> String {
    vendor
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Drop bills that repeat an earlier bill's content key or id.
///
/// Keeps the first occurrence and the input order.
pub fn deduplicate(bills: Vec<Bill>) -> Vec<Bill> {
    let before = bills.len();
    let mut seen_keys = HashSet::new();
    let mut seen_ids = HashSet::new();

    let kept: Vec<Bill> = bills
        .into_iter()
        .filter(|bill| {
            let key = DedupKey::of(bill);
            if seen_keys.contains(&key) || seen_ids.contains(&bill.id) {
                return false;
            }
            seen_keys.insert(key);
            seen_ids.insert(bill.id.clone());
            true
        })
        .collect();

    if kept.len() < before {
        debug!("Removed {} duplicate bills", before - kept.len());
    }
    kept
}
