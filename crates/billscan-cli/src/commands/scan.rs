//! Scan command - find bills in a single email, PDF or text file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use billscan_core::{BatchScan, BillScanner, EngineConfig, ExtractionMethod, ExtractionResult};

use super::config::load_config;
use super::input::{self, InputOptions};
use super::output::{OutputFormat, format_bills};

/// Engine options shared by `scan` and `batch`.
#[derive(Args, Clone, Debug, Default)]
pub struct EngineArgs {
    /// Language code hint (en, hu); detected from the text when omitted
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Treat the source as trusted and skip the bill-likelihood gate
    #[arg(long)]
    pub trusted: bool,

    /// Strategies to try in order (pattern, regex, user_fields)
    #[arg(long = "strategy", value_delimiter = ',')]
    pub strategies: Vec<ExtractionMethod>,

    /// Directory with <code>.json pattern packs
    #[arg(long)]
    pub pattern_dir: Option<PathBuf>,
}

impl EngineArgs {
    pub fn input_options(&self) -> InputOptions {
        InputOptions {
            language: self.lang.clone(),
            trusted: self.trusted,
        }
    }

    /// Apply the flags on top of the loaded config.
    pub fn apply(&self, config: &mut EngineConfig) {
        if !self.strategies.is_empty() {
            config.extraction.strategies = self.strategies.clone();
        }
        if let Some(dir) = &self.pattern_dir {
            config.patterns.pattern_dir = Some(dir.clone());
        }
    }

    pub fn build_scanner(&self, config_path: Option<&str>) -> anyhow::Result<BillScanner> {
        let mut config = load_config(config_path)?;
        self.apply(&mut config);
        Ok(BillScanner::from_config(&config)?)
    }
}

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Input file (.pdf, .eml or .txt)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show extraction confidence scores
    #[arg(long)]
    show_confidence: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let scanner = args.engine.build_scanner(config_path)?;
    let inputs = input::load(&args.input, &args.engine.input_options())?;

    info!("Scanning file: {}", args.input.display());

    let mut batch = BatchScan::new();
    let mut best_failure: Option<ExtractionResult> = None;
    for input in &inputs {
        let result = scanner.scan(input).await;
        if args.show_confidence {
            eprintln!(
                "{} {}: {} ({:.1}%)",
                style("ℹ").blue(),
                input.label(),
                if result.success { "bill" } else { "no bill" },
                result.confidence * 100.0
            );
        }
        if !result.success
            && best_failure
                .as_ref()
                .is_none_or(|b| result.confidence > b.confidence)
        {
            best_failure = Some(result.clone());
        }
        batch.record(input.label(), result);
    }
    let outcome = batch.finish();

    if outcome.bills.is_empty() {
        let reason = best_failure
            .and_then(|r| r.error_message())
            .unwrap_or_else(|| "no bill found".to_string());
        anyhow::bail!("No bill found in {}: {}", args.input.display(), reason);
    }

    let output = format_bills(&outcome.bills, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let engine = EngineArgs {
            strategies: vec![ExtractionMethod::Regex],
            pattern_dir: Some(PathBuf::from("/tmp/packs")),
            ..Default::default()
        };
        let mut config = EngineConfig::default();
        engine.apply(&mut config);
        assert_eq!(config.extraction.strategies, vec![ExtractionMethod::Regex]);
        assert_eq!(config.patterns.pattern_dir, Some(PathBuf::from("/tmp/packs")));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = EngineConfig::default();
        EngineArgs::default().apply(&mut config);
        assert_eq!(
            config.extraction.strategies,
            vec![ExtractionMethod::Pattern, ExtractionMethod::Regex]
        );
    }
}
