//! Ordered driver over the text recovery strategies.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    ByteRangeScan, RecoveredText, RecoveryFailure, StreamMarkerScan, StructuredExtractor,
    TextRecoveryStrategy,
};
use crate::error::ExtractionError;
use crate::models::config::RecoveryConfig;

/// Tries strategies in order until the text is long enough.
///
/// Strategies after the first one that produced text only run while that
/// primary text is shorter than `min_primary_chars`; their output is appended.
#[derive(Clone)]
pub struct RecoveryChain {
    strategies: Vec<Arc<dyn TextRecoveryStrategy>>,
    structured_timeout: Duration,
    min_primary_chars: usize,
}

impl RecoveryChain {
    /// Structured extraction, then stream markers, then byte ranges.
    pub fn standard(config: &RecoveryConfig) -> Self {
        Self::new(
            vec![
                Arc::new(StructuredExtractor::new()),
                Arc::new(StreamMarkerScan::new()),
                Arc::new(ByteRangeScan::new(config.min_run_len)),
            ],
            config,
        )
    }

    pub fn new(strategies: Vec<Arc<dyn TextRecoveryStrategy>>, config: &RecoveryConfig) -> Self {
        Self {
            strategies,
            structured_timeout: Duration::from_millis(config.structured_timeout_ms),
            min_primary_chars: config.min_primary_chars,
        }
    }

    /// Names of the strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Recover text from `bytes`. Never fails; empty text means nothing worked.
    pub async fn recover(&self, bytes: &[u8]) -> RecoveredText {
        let shared: Arc<[u8]> = Arc::from(bytes);
        let mut result = RecoveredText::empty();
        let mut primary_len = 0usize;

        for strategy in &self.strategies {
            if !result.strategies.is_empty() && primary_len >= self.min_primary_chars {
                break;
            }

            let text = if strategy.time_bounded() {
                match self.run_bounded(Arc::clone(strategy), Arc::clone(&shared)).await {
                    Ok(text) => text,
                    Err(error) => {
                        warn!("Recovery strategy '{}' failed: {}", strategy.name(), error);
                        result.failures.push(RecoveryFailure {
                            strategy: strategy.name(),
                            error,
                        });
                        continue;
                    }
                }
            } else {
                strategy.recover(&shared)
            };

            let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
                debug!("Recovery strategy '{}' found no text", strategy.name());
                continue;
            };

            if result.strategies.is_empty() {
                primary_len = text.trim().chars().count();
                result.confidence_hint = strategy.confidence_hint();
                result.text = text;
            } else {
                result.text.push('\n');
                result.text.push_str(&text);
            }
            debug!("Recovery strategy '{}' produced text", strategy.name());
            result.strategies.push(strategy.name());
        }

        info!(
            "Recovered {} chars from {} bytes via [{}]",
            result.text.chars().count(),
            bytes.len(),
            result.strategies.join(", ")
        );
        result
    }

    /// Run a strategy on the blocking pool, racing it against the timeout.
    ///
    /// A timed-out task is left to finish on its own thread; its output is
    /// discarded.
    async fn run_bounded(
        &self,
        strategy: Arc<dyn TextRecoveryStrategy>,
        bytes: Arc<[u8]>,
    ) -> Result<Option<String>, ExtractionError> {
        let task = tokio::task::spawn_blocking(move || strategy.recover(&bytes));

        match tokio::time::timeout(self.structured_timeout, task).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(join_error)) => Err(ExtractionError::MalformedInput {
                reason: format!("recovery task crashed: {join_error}"),
            }),
            Err(_) => Err(ExtractionError::Timeout {
                millis: self.structured_timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed {
        name: &'static str,
        hint: f32,
        text: Option<&'static str>,
    }

    impl TextRecoveryStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn confidence_hint(&self) -> f32 {
            self.hint
        }
        fn recover(&self, _bytes: &[u8]) -> Option<String> {
            self.text.map(str::to_string)
        }
    }

    struct Slow;

    impl TextRecoveryStrategy for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn confidence_hint(&self) -> f32 {
            1.0
        }
        fn time_bounded(&self) -> bool {
            true
        }
        fn recover(&self, _bytes: &[u8]) -> Option<String> {
            std::thread::sleep(Duration::from_millis(300));
            Some("too late".to_string())
        }
    }

    struct Crashing;

    impl TextRecoveryStrategy for Crashing {
        fn name(&self) -> &'static str {
            "crashing"
        }
        fn confidence_hint(&self) -> f32 {
            1.0
        }
        fn time_bounded(&self) -> bool {
            true
        }
        fn recover(&self, _bytes: &[u8]) -> Option<String> {
            panic!("decoder bug")
        }
    }

    fn fixed(name: &'static str, hint: f32, text: Option<&'static str>) -> Arc<dyn TextRecoveryStrategy> {
        Arc::new(Fixed { name, hint, text })
    }

    fn config(timeout_ms: u64) -> RecoveryConfig {
        RecoveryConfig {
            structured_timeout_ms: timeout_ms,
            min_primary_chars: 20,
            min_run_len: 4,
        }
    }

    #[tokio::test]
    async fn test_long_primary_stops_chain() {
        let chain = RecoveryChain::new(
            vec![
                fixed("a", 1.0, Some("a long enough primary text here")),
                fixed("b", 0.5, Some("never used")),
            ],
            &config(1000),
        );
        let recovered = chain.recover(b"").await;
        assert_eq!(recovered.text, "a long enough primary text here");
        assert_eq!(recovered.strategies, vec!["a"]);
        assert_eq!(recovered.confidence_hint, 1.0);
    }

    #[tokio::test]
    async fn test_short_primary_gets_fallbacks_appended() {
        let chain = RecoveryChain::new(
            vec![
                fixed("a", 1.0, None),
                fixed("b", 0.7, Some("short")),
                fixed("c", 0.5, Some("more text")),
            ],
            &config(1000),
        );
        let recovered = chain.recover(b"").await;
        assert_eq!(recovered.text, "short\nmore text");
        assert_eq!(recovered.strategies, vec!["b", "c"]);
        assert_eq!(recovered.confidence_hint, 0.7);
    }

    #[tokio::test]
    async fn test_nothing_recovered_is_empty_not_error() {
        let chain = RecoveryChain::new(vec![fixed("a", 1.0, None)], &config(1000));
        let recovered = chain.recover(b"\x00").await;
        assert!(recovered.is_empty());
        assert_eq!(recovered.confidence_hint, 0.0);
        assert!(recovered.failures.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_moves_on() {
        let chain = RecoveryChain::new(
            vec![Arc::new(Slow) as Arc<dyn TextRecoveryStrategy>, fixed("b", 0.5, Some("fallback text that is long enough"))],
            &config(10),
        );
        let recovered = chain.recover(b"").await;
        assert_eq!(recovered.strategies, vec!["b"]);
        assert_eq!(
            recovered.failures,
            vec![RecoveryFailure {
                strategy: "slow",
                error: ExtractionError::Timeout { millis: 10 },
            }]
        );
        assert!(recovered.timeout().is_some());
    }

    #[tokio::test]
    async fn test_panic_is_recorded() {
        let chain = RecoveryChain::new(
            vec![Arc::new(Crashing) as Arc<dyn TextRecoveryStrategy>, fixed("b", 0.5, Some("ok"))],
            &config(1000),
        );
        let recovered = chain.recover(b"").await;
        assert_eq!(recovered.text, "ok");
        assert_eq!(recovered.failures.len(), 1);
        assert!(matches!(
            recovered.failures[0].error,
            ExtractionError::MalformedInput { .. }
        ));
    }

    #[tokio::test]
    async fn test_standard_chain_on_raw_text_operators() {
        let bytes = b"%PDF-1.4 broken\nBT /F1 12 Tf (Invoice) Tj ET\n";
        let recovered = RecoveryChain::standard(&RecoveryConfig::default())
            .recover(bytes)
            .await;
        assert_eq!(recovered.confidence_hint, 0.7);
        assert!(recovered.text.starts_with("Invoice"));
        assert_eq!(recovered.strategies, vec!["stream-markers", "byte-ranges"]);
    }
}
