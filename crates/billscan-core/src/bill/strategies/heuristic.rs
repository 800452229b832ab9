//! Regex strategy: pack patterns plus generic currency amounts.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use super::{BillExtractor, ConfidencePolicy, Document, FoundAmount, SharedFields, assemble};
use crate::bill::rules::{AmountExtractor, FieldExtractor, select_payable};
use crate::language::Language;
use crate::models::bill::{ExtractionMethod, ExtractionResult};
use crate::models::config::ExtractionConfig;
use crate::patterns::{Field, FieldMatch, LanguagePatternPack, PatternStore};

/// Looks for the amount in three places, in order:
///
/// 1. the highlighted amount box of a matched vendor override,
/// 2. the pack's amount patterns,
/// 3. any currency-marked amount, preferring the one closest after a
///    payable-total keyword, else the largest.
///
/// Gated by the pack's bill-likelihood test unless the source is trusted.
pub struct RegexExtractor {
    store: Arc<PatternStore>,
    policy: ConfidencePolicy,
    default_language: Language,
    proximity_window: usize,
}

impl RegexExtractor {
    pub fn new(store: Arc<PatternStore>, config: &ExtractionConfig) -> Self {
        Self {
            store,
            policy: ConfidencePolicy::from_config(config),
            default_language: config.default_language,
            proximity_window: config.proximity_window,
        }
    }

    fn find_amount(
        &self,
        text: &str,
        pack: &LanguagePatternPack,
        shared: &SharedFields<'_>,
    ) -> Option<FoundAmount> {
        let from_match = |m: FieldMatch| {
            let amount = pack.parse_amount(&m.value);
            (amount > Decimal::ZERO).then(|| FoundAmount {
                amount,
                currency: pack.currency_near(text, m.start, m.end).map(str::to_string),
                from_pack: true,
            })
        };

        if let Some(found) = shared
            .vendor_override
            .and_then(|v| v.highlighted_amount(text))
            .and_then(from_match)
        {
            trace!("Amount from highlighted box");
            return Some(found);
        }

        if let Some(found) = pack
            .extract_field_all(text, Field::Amount)
            .into_iter()
            .find_map(from_match)
        {
            trace!("Amount from pack patterns");
            return Some(found);
        }

        let candidates = AmountExtractor::new(pack.language()).extract_all(text);
        debug!("{} generic amount candidates", candidates.len());
        let keywords = pack.amount_keyword_spans(text);
        select_payable(text, candidates, &keywords, self.proximity_window).map(|m| FoundAmount {
            amount: m.value.amount,
            currency: m.value.currency.map(str::to_string),
            from_pack: false,
        })
    }
}

impl BillExtractor for RegexExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Regex
    }

    fn default_language(&self) -> Language {
        self.default_language
    }

    fn extract_document(&self, doc: &Document<'_>) -> ExtractionResult {
        let pack = self.store.pack(doc.language);
        let text = doc.text.as_ref();

        if !doc.trusted && !pack.is_likely_bill(text) {
            debug!(
                "{} failed the bill-likelihood gate ({} indicators)",
                doc.source.bill_id(),
                pack.indicator_count(text)
            );
            return self.policy.not_a_bill(pack.calculate_confidence(text), doc);
        }

        let shared = SharedFields::read(doc, pack);
        let Some(found) = self.find_amount(text, pack, &shared) else {
            return self.policy.missing(Field::Amount, pack.calculate_confidence(text), doc);
        };
        assemble(doc, pack, self.method(), &self.policy, shared, found, BTreeMap::new())
    }
}
