//! Batch command - scan many files and deduplicate the bills found.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use billscan_core::error::ExtractionError;
use billscan_core::{BatchScan, ExtractionResult};

use super::input;
use super::output::{OutputFormat, format_bills};
use super::scan::EngineArgs;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input files
    #[arg(required = true)]
    input: String,

    /// Output directory for the bill list and summary
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for the bill list
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a per-document summary CSV
    #[arg(long)]
    summary: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

/// One row of the summary CSV.
struct DocumentRow {
    file: String,
    label: String,
    success: bool,
    bill_id: String,
    confidence: f32,
    processing_time_ms: u64,
    error: String,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let scanner = args.engine.build_scanner(config_path)?;
    let options = args.engine.input_options();

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| input::is_supported(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to scan",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut batch = BatchScan::new();
    let mut rows = Vec::new();

    // One document at a time; a failure never stops the batch
    for path in &files {
        let file = path.display().to_string();
        let file_start = Instant::now();

        match input::load(path, &options) {
            Ok(inputs) => {
                for doc in inputs {
                    let doc_start = Instant::now();
                    let result = scanner.scan(&doc).await;
                    rows.push(row_for(&file, doc.label(), &result, doc_start));
                    batch.record(doc.label(), result);
                }
            }
            Err(e) => {
                warn!("Failed to load {}: {}", file, e);
                let result = ExtractionResult::failed(
                    ExtractionError::MalformedInput {
                        reason: e.to_string(),
                    },
                    0.0,
                );
                rows.push(row_for(&file, &file, &result, file_start));
                batch.record(&file, result);
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    let outcome = batch.finish();
    let bills_output = format_bills(&outcome.bills, args.format)?;

    match &args.output_dir {
        Some(output_dir) => {
            let bills_path = output_dir.join(format!("bills.{}", args.format.extension()));
            fs::write(&bills_path, bills_output)?;
            debug!("Wrote bills to {}", bills_path.display());
            println!(
                "{} Bills written to {}",
                style("✓").green(),
                bills_path.display()
            );
        }
        None => println!("{}", bills_output),
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &rows)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let stats = outcome.stats;
    eprintln!();
    eprintln!(
        "{} Scanned {} documents from {} files in {:?}",
        style("✓").green(),
        stats.processed,
        files.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} bills found, {} errors",
        style(stats.bills_found).green(),
        style(stats.errors).red()
    );

    let errors: Vec<_> = outcome
        .failures
        .iter()
        .filter(|f| !matches!(f.error, ExtractionError::NotABill { .. }))
        .collect();
    if !errors.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed documents:").red());
        for failure in errors {
            eprintln!("  - {}: {}", failure.label, failure.error);
        }
    }

    Ok(())
}

fn row_for(file: &str, label: &str, result: &ExtractionResult, started: Instant) -> DocumentRow {
    DocumentRow {
        file: file.to_string(),
        label: label.to_string(),
        success: result.success,
        bill_id: result
            .bills
            .first()
            .map(|b| b.id.clone())
            .unwrap_or_default(),
        confidence: result.confidence,
        processing_time_ms: started.elapsed().as_millis() as u64,
        error: result.error_message().unwrap_or_default(),
    }
}

fn write_summary(path: &Path, rows: &[DocumentRow]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "file",
        "document",
        "status",
        "bill_id",
        "confidence",
        "processing_time_ms",
        "error",
    ])?;

    for row in rows {
        let confidence = format!("{:.2}", row.confidence);
        let time = row.processing_time_ms.to_string();
        let record: [&str; 7] = [
            &row.file,
            &row.label,
            if row.success { "bill" } else { "no_bill" },
            &row.bill_id,
            &confidence,
            &time,
            &row.error,
        ];
        wtr.write_record(record)?;
    }

    wtr.flush()?;
    Ok(())
}
