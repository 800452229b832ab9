//! Vendor name resolution.

use std::path::Path;

use super::patterns::{DISPLAY_NAME, EMAIL_ADDRESS};

const GENERIC_SENDER_NAMES: &[&str] = &[
    "noreply", "no-reply", "no reply", "donotreply", "billing", "invoice", "invoices",
    "ertesito", "értesítő", "szamla", "számla", "info", "customer service", "ügyfélszolgálat",
];

const GENERIC_SUBDOMAINS: &[&str] = &["mail", "email", "billing", "noreply", "no-reply", "e", "info", "ebill", "szamla"];

const GENERIC_FILE_STEMS: &[&str] = &[
    "invoice", "bill", "statement", "document", "attachment", "scan", "szamla", "számla", "egyenleg",
];

/// Vendor evidence collected from one document, strongest first.
#[derive(Debug, Clone, Default)]
pub struct VendorHints<'a> {
    /// Canonical name of a matched vendor override.
    pub override_name: Option<&'a str>,
    /// Value captured by the pack's vendor patterns.
    pub pattern: Option<String>,
    /// `From` header of the carrying email.
    pub sender: Option<&'a str>,
    /// PDF file name.
    pub file_name: Option<&'a str>,
}

/// Pick the vendor name from the strongest available hint, or `"Unknown"`.
pub fn resolve_vendor(hints: &VendorHints<'_>) -> String {
    hints
        .override_name
        .map(str::to_string)
        .or_else(|| hints.pattern.clone().filter(|p| !p.trim().is_empty()))
        .or_else(|| hints.sender.and_then(sender_display_name))
        .or_else(|| hints.sender.and_then(sender_domain_name))
        .or_else(|| hints.file_name.and_then(file_stem_name))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// `"PG&E Billing" <billing@pge.com>` -> `PG&E Billing`.
pub fn sender_display_name(sender: &str) -> Option<String> {
    let caps = DISPLAY_NAME.captures(sender)?;
    let name = caps.get(1)?.as_str().trim();
    let lower = name.to_lowercase();
    if name.is_empty() || name.contains('@') || GENERIC_SENDER_NAMES.contains(&lower.as_str()) {
        return None;
    }
    Some(name.to_string())
}

/// `billing@mail.pge.com` -> `Pge`.
pub fn sender_domain_name(sender: &str) -> Option<String> {
    let caps = EMAIL_ADDRESS.captures(sender)?;
    let domain = caps.get(1)?.as_str().to_lowercase();

    let labels: Vec<&str> = domain.split('.').collect();
    // drop the TLD
    let label = labels[..labels.len().saturating_sub(1)]
        .iter()
        .rev()
        .find(|l| !GENERIC_SUBDOMAINS.contains(*l))?;

    Some(capitalize(label))
}

/// `Comcast_March-2023.pdf` -> `Comcast March 2023`.
pub fn file_stem_name(file_name: &str) -> Option<String> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    let name = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let lower = name.to_lowercase();
    let generic = GENERIC_FILE_STEMS
        .iter()
        .any(|g| lower == *g || lower.starts_with(&format!("{g} ")));
    if generic || !name.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(name)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
