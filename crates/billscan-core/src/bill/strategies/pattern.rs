//! Pack-pattern strategy behind the document-identifier gate.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::debug;

use super::{BillExtractor, ConfidencePolicy, Document, FoundAmount, SharedFields, assemble};
use crate::language::Language;
use crate::models::bill::{ExtractionMethod, ExtractionResult};
use crate::models::config::ExtractionConfig;
use crate::patterns::{Field, PatternStore};

/// Reads the amount only through the language pack's amount patterns.
///
/// Documents without a document-identifier phrase are rejected unless the
/// source is trusted.
pub struct PatternExtractor {
    store: Arc<PatternStore>,
    policy: ConfidencePolicy,
    default_language: Language,
}

impl PatternExtractor {
    pub fn new(store: Arc<PatternStore>, config: &ExtractionConfig) -> Self {
        Self {
            store,
            policy: ConfidencePolicy::from_config(config),
            default_language: config.default_language,
        }
    }
}

impl BillExtractor for PatternExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Pattern
    }

    fn default_language(&self) -> Language {
        self.default_language
    }

    fn extract_document(&self, doc: &Document<'_>) -> ExtractionResult {
        let pack = self.store.pack(doc.language);
        let text = doc.text.as_ref();

        if !doc.trusted && !pack.matches_document_identifier(text) {
            debug!("No {} document identifier in {}", pack.language(), doc.source.bill_id());
            return self.policy.not_a_bill(pack.calculate_confidence(text), doc);
        }

        let Some(amount_match) = pack.extract_field_match(text, Field::Amount) else {
            return self.policy.missing(Field::Amount, pack.calculate_confidence(text), doc);
        };
        let amount = pack.parse_amount(&amount_match.value);
        if amount <= Decimal::ZERO {
            debug!("Amount '{}' parsed to zero", amount_match.value);
            return self.policy.missing(Field::Amount, pack.calculate_confidence(text), doc);
        }

        let found = FoundAmount {
            amount,
            currency: pack
                .currency_near(text, amount_match.start, amount_match.end)
                .map(str::to_string),
            from_pack: true,
        };
        let shared = SharedFields::read(doc, pack);
        assemble(doc, pack, self.method(), &self.policy, shared, found, BTreeMap::new())
    }
}
