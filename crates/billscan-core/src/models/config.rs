//! Configuration structures for the extraction engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::bill::strategies::user_fields::UserFieldSpec;
use crate::error::{BillscanError, Result};
use crate::language::Language;
use crate::models::bill::ExtractionMethod;

/// Main configuration for the billscan engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// PDF text recovery.
    pub recovery: RecoveryConfig,

    /// Strategy selection and confidence policy.
    pub extraction: ExtractionConfig,

    /// Chunked transfer limits.
    pub transfer: TransferConfig,

    /// Pattern pack location.
    pub patterns: PatternConfig,
}

/// PDF text recovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Time allowed for structured extraction before falling back.
    pub structured_timeout_ms: u64,

    /// Primary text shorter than this gets the fallback texts appended.
    pub min_primary_chars: usize,

    /// Shortest byte run kept by the byte-range scan.
    pub min_run_len: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            structured_timeout_ms: 10_000,
            min_primary_chars: 100,
            min_run_len: 4,
        }
    }
}

/// Extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Strategies tried in order until one succeeds.
    pub strategies: Vec<ExtractionMethod>,

    /// Language used when neither a hint nor detection decides.
    pub default_language: Language,

    /// Minimum confidence for trusted sources.
    pub trusted_confidence_floor: f32,

    /// Highest confidence reported for a gate rejection.
    pub rejection_confidence_cap: f32,

    /// Minimum confidence when a vendor override matches.
    pub vendor_override_floor: f32,

    /// Characters before an amount searched for a payable-total keyword.
    pub proximity_window: usize,

    /// Output fields for the user-field strategy.
    pub user_fields: Vec<UserFieldSpec>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategies: vec![ExtractionMethod::Pattern, ExtractionMethod::Regex],
            default_language: Language::default(),
            trusted_confidence_floor: 0.85,
            rejection_confidence_cap: 0.2,
            vendor_override_floor: 0.7,
            proximity_window: 80,
            user_fields: Vec::new(),
        }
    }
}

/// Chunked transfer limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Largest chunk count a session may declare.
    pub max_chunks: usize,

    /// Largest assembled transfer in bytes.
    pub max_total_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_chunks: 1024,
            max_total_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Pattern pack location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Directory with `<code>.json` packs; built-in packs when unset.
    pub pattern_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let e = &self.extraction;
        for (name, value) in [
            ("trusted_confidence_floor", e.trusted_confidence_floor),
            ("rejection_confidence_cap", e.rejection_confidence_cap),
            ("vendor_override_floor", e.vendor_override_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BillscanError::Config(format!(
                    "extraction.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if e.strategies.is_empty() {
            return Err(BillscanError::Config(
                "extraction.strategies must not be empty".to_string(),
            ));
        }
        if self.transfer.max_chunks == 0 {
            return Err(BillscanError::Config(
                "transfer.max_chunks must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.recovery.min_primary_chars, 100);
        assert_eq!(config.extraction.trusted_confidence_floor, 0.85);
        assert_eq!(config.extraction.rejection_confidence_cap, 0.2);
        assert_eq!(config.extraction.vendor_override_floor, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"extraction": {"strategies": ["regex"]}}"#).unwrap();
        assert_eq!(config.extraction.strategies, vec![ExtractionMethod::Regex]);
        assert_eq!(config.extraction.proximity_window, 80);
        assert_eq!(config.transfer.max_chunks, 1024);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("billscan-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = EngineConfig::default();
        config.extraction.default_language = Language::Hungarian;
        config.save(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.extraction.default_language, Language::Hungarian);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_validate_rejects_out_of_range_floor() {
        let mut config = EngineConfig::default();
        config.extraction.trusted_confidence_floor = 1.2;
        assert!(matches!(config.validate(), Err(BillscanError::Config(_))));
    }
}
