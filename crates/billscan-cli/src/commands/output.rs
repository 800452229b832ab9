//! Rendering bills as JSON, CSV or text.

use billscan_core::{Bill, format_amount};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_bills(bills: &[Bill], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(bills)?),
        OutputFormat::Csv => format_csv(bills),
        OutputFormat::Text => Ok(format_text(bills)),
    }
}

fn format_csv(bills: &[Bill]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "vendor",
        "amount",
        "currency",
        "billing_date",
        "due_date",
        "category",
        "account_number",
        "invoice_number",
        "method",
        "language",
        "confidence",
    ])?;

    for bill in bills {
        let amount = bill.amount.to_string();
        let billing_date = bill.billing_date.to_string();
        let due_date = bill.due_date.map(|d| d.to_string()).unwrap_or_default();
        let confidence = format!("{:.2}", bill.extraction_confidence);
        let row: [&str; 12] = [
            &bill.id,
            &bill.vendor,
            &amount,
            &bill.currency,
            &billing_date,
            &due_date,
            &bill.category,
            bill.account_number.as_deref().unwrap_or(""),
            bill.invoice_number.as_deref().unwrap_or(""),
            bill.extraction_method.name(),
            bill.language.code(),
            &confidence,
        ];
        wtr.write_record(row)?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(bills: &[Bill]) -> String {
    let mut output = String::new();

    for (i, bill) in bills.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        output.push_str(&format!("Bill: {}\n", bill.id));
        output.push_str(&format!("  Vendor:   {}\n", bill.vendor));
        output.push_str(&format!(
            "  Amount:   {} {}\n",
            format_amount(bill.amount, bill.language),
            bill.currency
        ));
        output.push_str(&format!("  Billed:   {}\n", bill.billing_date));
        if let Some(due_date) = bill.due_date {
            output.push_str(&format!("  Due:      {}\n", due_date));
        }
        output.push_str(&format!("  Category: {}\n", bill.category));
        if let Some(account) = &bill.account_number {
            output.push_str(&format!("  Account:  {}\n", account));
        }
        if let Some(invoice) = &bill.invoice_number {
            output.push_str(&format!("  Invoice:  {}\n", invoice));
        }
        for (name, value) in &bill.custom_fields {
            output.push_str(&format!("  {}: {}\n", name, value));
        }
        output.push_str(&format!(
            "  Method:   {} ({:.0}%)\n",
            bill.extraction_method,
            bill.extraction_confidence * 100.0
        ));
    }

    output
}
