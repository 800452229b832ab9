//! Scanner facade: recovery chain, strategies and batch bookkeeping.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bill::dedup::deduplicate;
use crate::bill::strategies::{
    BillExtractor, PatternExtractor, RegexExtractor, UserFieldExtractor,
};
use crate::error::{ExtractionError, Result};
use crate::models::bill::{Bill, ExtractionMethod, ExtractionResult};
use crate::models::config::{EngineConfig, ExtractionConfig};
use crate::models::context::{EmailContext, PdfContent, PdfContext, ScanInput};
use crate::patterns::PatternStore;
use crate::pdf::{RecoveredText, RecoveryChain};

/// Runs documents through text recovery and the configured strategies.
pub struct BillScanner {
    store: Arc<PatternStore>,
    chain: RecoveryChain,
    strategies: Vec<Box<dyn BillExtractor>>,
}

impl BillScanner {
    /// Scanner over `store` with the strategies named in the config.
    pub fn new(store: Arc<PatternStore>, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let strategies = config
            .extraction
            .strategies
            .iter()
            .map(|method| build_strategy(*method, Arc::clone(&store), &config.extraction))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Scanner ready with strategies [{}]",
            config
                .extraction
                .strategies
                .iter()
                .map(ExtractionMethod::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self {
            store,
            chain: RecoveryChain::standard(&config.recovery),
            strategies,
        })
    }

    /// Scanner with packs from `patterns.pattern_dir`, or the built-in packs.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let store = match &config.patterns.pattern_dir {
            Some(dir) => PatternStore::from_dir(dir)?,
            None => PatternStore::builtin()?,
        };
        Self::new(Arc::new(store), config)
    }

    /// Replace the strategy list.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn BillExtractor>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Replace the recovery chain.
    pub fn with_chain(mut self, chain: RecoveryChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn chain(&self) -> &RecoveryChain {
        &self.chain
    }

    /// Scan one document.
    pub async fn scan(&self, input: &ScanInput) -> ExtractionResult {
        match input {
            ScanInput::Email(ctx) => self.scan_email(ctx),
            ScanInput::Pdf(ctx) => self.scan_pdf(ctx).await,
        }
    }

    pub fn scan_email(&self, ctx: &EmailContext) -> ExtractionResult {
        debug!("Scanning email {}", ctx.message_id);
        self.run(|strategy| strategy.extract_from_email(ctx))
    }

    /// Recover the PDF's text, then extract.
    pub async fn scan_pdf(&self, ctx: &PdfContext) -> ExtractionResult {
        debug!("Scanning PDF {}", ctx.file_name);
        let recovered = match &ctx.content {
            PdfContent::Bytes(bytes) => self.chain.recover(bytes).await,
            PdfContent::Text(text) => RecoveredText::from_text(text.as_str()),
        };
        self.extract_recovered(ctx, &recovered)
    }

    /// Extract from text the caller already recovered.
    pub fn extract_recovered(&self, ctx: &PdfContext, recovered: &RecoveredText) -> ExtractionResult {
        self.run(|strategy| strategy.extract_from_pdf(ctx, recovered))
    }

    /// Scan documents one after another and deduplicate the bills.
    pub async fn scan_batch(&self, inputs: impl IntoIterator<Item = ScanInput>) -> BatchOutcome {
        let mut batch = BatchScan::new();
        for input in inputs {
            let result = self.scan(&input).await;
            batch.record(input.label(), result);
        }
        batch.finish()
    }

    /// First successful strategy wins; otherwise the most confident failure.
    fn run(&self, extract: impl Fn(&dyn BillExtractor) -> ExtractionResult) -> ExtractionResult {
        let mut best: Option<ExtractionResult> = None;

        for strategy in &self.strategies {
            let result = extract(strategy.as_ref());
            if result.success {
                return result;
            }
            debug!(
                "Strategy {} failed: {}",
                strategy.method(),
                result.error_message().unwrap_or_default()
            );
            if best.as_ref().is_none_or(|b| result.confidence > b.confidence) {
                best = Some(result);
            }
        }

        best.unwrap_or_else(|| {
            ExtractionResult::failed(
                ExtractionError::MalformedInput {
                    reason: "no extraction strategy configured".to_string(),
                },
                0.0,
            )
        })
    }
}

fn build_strategy(
    method: ExtractionMethod,
    store: Arc<PatternStore>,
    config: &ExtractionConfig,
) -> Result<Box<dyn BillExtractor>> {
    let strategy: Box<dyn BillExtractor> = match method {
        ExtractionMethod::Pattern => Box::new(PatternExtractor::new(store, config)),
        ExtractionMethod::Regex => Box::new(RegexExtractor::new(store, config)),
        ExtractionMethod::UserFields => Box::new(UserFieldExtractor::new(store, config)?),
    };
    Ok(strategy)
}

/// Counters reported for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub processed: usize,
    /// Bills left after deduplication.
    pub bills_found: usize,
    /// Failed documents other than those rejected as not a bill.
    pub errors: usize,
}

/// A document that produced no bill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub label: String,
    pub error: ExtractionError,
}

/// Deduplicated bills and stats of a finished batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub bills: Vec<Bill>,
    pub stats: BatchStats,
    pub failures: Vec<BatchFailure>,
}

/// Accumulates per-document results; one failure never stops the batch.
#[derive(Debug, Default)]
pub struct BatchScan {
    bills: Vec<Bill>,
    processed: usize,
    errors: usize,
    failures: Vec<BatchFailure>,
}

impl BatchScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: &str, result: ExtractionResult) {
        self.processed += 1;
        if result.success {
            self.bills.extend(result.bills);
            return;
        }

        let error = result.error.unwrap_or(ExtractionError::MalformedInput {
            reason: "failed without an error".to_string(),
        });
        if matches!(error, ExtractionError::NotABill { .. }) {
            debug!("{} is not a bill", label);
        } else {
            warn!("{}: {}", label, error);
            self.errors += 1;
        }
        self.failures.push(BatchFailure {
            label: label.to_string(),
            error,
        });
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Deduplicate and report.
    pub fn finish(self) -> BatchOutcome {
        let found = self.bills.len();
        let bills = deduplicate(self.bills);
        let stats = BatchStats {
            processed: self.processed,
            bills_found: bills.len(),
            errors: self.errors,
        };
        info!(
            "Batch done: {} processed, {} bills ({} duplicates dropped), {} errors",
            stats.processed,
            stats.bills_found,
            found - bills.len(),
            stats.errors
        );
        BatchOutcome {
            bills,
            stats,
            failures: self.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::strategies::UserFieldSpec;
    use crate::language::Language;
    use pretty_assertions::assert_eq;

    fn scanner() -> BillScanner {
        BillScanner::from_config(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_regex_strategy_catches_what_pattern_misses() {
        // no identifier phrase, but enough indicator words
        let ctx = EmailContext::new(
            "m1",
            "Your monthly charges",
            "Balance for account 4411: the amount you pay this month is $58.10",
        );
        let result = scanner().scan_email(&ctx);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.bills[0].extraction_method, ExtractionMethod::Regex);
    }

    #[test]
    fn test_most_confident_failure_is_reported() {
        let ctx = EmailContext::new("m2", "Lunch", "See you at noon");
        let result = scanner().scan_email(&ctx);
        assert!(!result.success);
        assert!(matches!(result.error, Some(ExtractionError::NotABill { .. })));
    }

    #[test]
    fn test_no_strategies() {
        let result = scanner()
            .with_strategies(Vec::new())
            .scan_email(&EmailContext::new("m3", "Invoice", "Total due: $1.00"));
        assert!(matches!(result.error, Some(ExtractionError::MalformedInput { .. })));
    }

    #[test]
    fn test_user_field_strategy_from_config() {
        let mut config = EngineConfig::default();
        config.extraction.strategies = vec![ExtractionMethod::UserFields];
        config.extraction.user_fields = vec![UserFieldSpec::new("Plan")];
        let scanner = BillScanner::from_config(&config).unwrap();

        let ctx = EmailContext::new("m4", "Mobile bill", "Plan: Unlimited Plus\nAmount due: $70.00");
        let result = scanner.scan_email(&ctx);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.bills[0].custom_fields.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.extraction.strategies.clear();
        assert!(BillScanner::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_batch_counts_and_dedup() {
        let body = "Invoice\nAmount due: $25.00\nInvoice date: 03/01/2024";
        let inputs = vec![
            ScanInput::from(EmailContext::new("a", "Invoice", body).with_sender("Acme <b@acme.com>")),
            ScanInput::from(EmailContext::new("b", "Invoice", body).with_sender("ACME <c@acme.com>")),
            ScanInput::from(EmailContext::new("c", "Hi", "How are you?")),
            ScanInput::from(PdfContext::from_bytes(vec![0, 0, 0], "broken.pdf")),
        ];
        let outcome = scanner().scan_batch(inputs).await;

        assert_eq!(
            outcome.stats,
            BatchStats {
                processed: 4,
                bills_found: 1,
                errors: 1,
            }
        );
        assert_eq!(outcome.bills[0].id, "email-a");
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[1].label, "broken.pdf");
    }

    #[tokio::test]
    async fn test_pdf_text_content_skips_recovery() {
        let ctx = PdfContext::from_text("Számla\nFizetendő összeg: 8.990 Ft", "telekom.pdf")
            .with_source("m5", Some("att-1".to_string()));
        let result = scanner().scan(&ScanInput::Pdf(ctx)).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.bills[0].id, "pdf-m5-att-1");
        assert_eq!(result.bills[0].language, Language::Hungarian);
    }

    #[test]
    fn test_custom_strategy_list() {
        let store = Arc::new(PatternStore::builtin().unwrap());
        let config = ExtractionConfig::default();
        let scanner = scanner().with_strategies(vec![
            Box::new(PatternExtractor::new(store, &config)) as Box<dyn BillExtractor>,
        ]);
        let result = scanner.scan_email(&EmailContext::new("m6", "", "Bill\nTotal due: $3.00"));
        assert_eq!(result.bills[0].extraction_method, ExtractionMethod::Pattern);
    }
}
