//! Patterns command - inspect pattern packs and try them on a document.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use billscan_core::{Field, Language, PatternStore, PdfContent, RecoveryChain, ScanInput};

use super::config::load_config;
use super::input::{self, InputOptions};

/// Arguments for the patterns command.
#[derive(Args)]
pub struct PatternsArgs {
    /// Directory with <code>.json pattern packs
    #[arg(long, global = true)]
    pattern_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: PatternsCommand,
}

#[derive(Subcommand)]
enum PatternsCommand {
    /// List packs, or print one pack as JSON
    Show {
        /// Language code of the pack to print
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Run the pack queries on a file
    Check {
        /// Input file (.pdf, .eml or .txt)
        input: PathBuf,

        /// Language code; detected from the text when omitted
        #[arg(short, long)]
        lang: Option<String>,
    },
}

pub async fn run(args: PatternsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let dir = args.pattern_dir.or(config.patterns.pattern_dir.clone());
    let store = match &dir {
        Some(dir) => PatternStore::from_dir(dir)?,
        None => PatternStore::builtin()?,
    };

    match args.command {
        PatternsCommand::Show { lang } => show(&store, lang.as_deref()),
        PatternsCommand::Check { input, lang } => {
            let chain = RecoveryChain::standard(&config.recovery);
            check(&store, &chain, &input, lang.as_deref()).await
        }
    }
}

fn show(store: &PatternStore, lang: Option<&str>) -> anyhow::Result<()> {
    match lang {
        Some(code) => {
            let language = Language::try_from_code(code)
                .ok_or_else(|| anyhow::anyhow!("Unsupported language: {}", code))?;
            let pack = store.pack(language);
            println!("{}", serde_json::to_string_pretty(pack.definition())?);
        }
        None => {
            for language in store.languages() {
                let def = store.pack(language).definition();
                println!(
                    "{}  v{}  {} fields, {} service types, {} vendors, default currency {}",
                    style(language.code()).bold(),
                    def.version,
                    def.fields.len(),
                    def.service_types.len(),
                    def.vendors.len(),
                    def.default_currency
                );
            }
        }
    }
    Ok(())
}

async fn check(
    store: &PatternStore,
    chain: &RecoveryChain,
    path: &Path,
    lang: Option<&str>,
) -> anyhow::Result<()> {
    let options = InputOptions {
        language: lang.map(str::to_string),
        trusted: false,
    };
    let inputs = input::load(path, &options)?;
    let first = inputs
        .first()
        .ok_or_else(|| anyhow::anyhow!("Nothing to check in {}", path.display()))?;

    let text = match first {
        ScanInput::Email(ctx) => ctx.text(),
        ScanInput::Pdf(ctx) => match &ctx.content {
            PdfContent::Text(text) => text.clone(),
            PdfContent::Bytes(bytes) => chain.recover(bytes).await.text,
        },
    };

    let language = Language::resolve_or(lang, &text, store.default_language());
    let pack = store.pack(language);

    let yes_no = |b: bool| if b { style("yes").green() } else { style("no").red() };

    println!("Language:            {}", language.code());
    println!(
        "Document identifier: {}",
        yes_no(pack.matches_document_identifier(&text))
    );
    println!("Indicator words:     {}", pack.indicator_count(&text));
    println!("Likely bill:         {}", yes_no(pack.is_likely_bill(&text)));
    println!();

    for field in Field::ALL {
        let value = pack.extract_field(&text, field);
        println!(
            "{:<20} {}",
            format!("{}:", field),
            value.as_deref().unwrap_or("-")
        );
    }
    println!();

    match pack.detect_service_type(&text) {
        Some(found) => println!("Service type:        {} ({})", found.service_type, found.category),
        None => println!("Service type:        -"),
    }
    println!(
        "Vendor override:     {}",
        pack.match_vendor(&text).map(|v| v.name()).unwrap_or("-")
    );
    println!(
        "Currency:            {}",
        pack.detect_currency(&text)
            .unwrap_or(pack.default_currency())
    );
    println!(
        "Confidence:          {:.2}",
        pack.calculate_confidence(&text)
    );

    Ok(())
}
