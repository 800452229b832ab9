//! Turning files on disk into scanner inputs.

use std::fs;
use std::path::Path;

use chrono::DateTime;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail, parse_mail};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use billscan_core::{EmailContext, PdfContext, ScanInput};

/// Elements whose content is never shown to the reader.
const HIDDEN_ELEMENTS: [&str; 6] = ["head", "title", "style", "script", "noscript", "template"];

/// Elements that put their text on a line of its own.
const BLOCK_ELEMENTS: [&str; 20] = [
    "address", "article", "blockquote", "br", "dd", "div", "dt", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "hr", "li", "p", "section", "tr",
];

/// Extensions the scanner accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["pdf", "eml", "txt"];

/// Per-run overrides applied to every loaded input.
#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub language: Option<String>,
    pub trusted: bool,
}

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(path).as_str())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_string()
}

/// Load one file. An `.eml` yields the email plus one input per PDF attachment.
pub fn load(path: &Path, options: &InputOptions) -> anyhow::Result<Vec<ScanInput>> {
    let extension = extension_of(path);
    let file_name = file_name_of(path);

    let inputs = match extension.as_str() {
        "pdf" => {
            let data = fs::read(path)?;
            vec![ScanInput::Pdf(apply_pdf(
                PdfContext::from_bytes(data, file_name),
                options,
            ))]
        }
        "txt" => {
            let text = fs::read_to_string(path)?;
            vec![ScanInput::Pdf(apply_pdf(
                PdfContext::from_text(text, file_name),
                options,
            ))]
        }
        "eml" => {
            let data = fs::read(path)?;
            load_email(&data, &file_name, options)?
        }
        _ => anyhow::bail!("Unsupported file format: {}", path.display()),
    };

    debug!("{} produced {} input(s)", path.display(), inputs.len());
    Ok(inputs)
}

fn apply_pdf(mut ctx: PdfContext, options: &InputOptions) -> PdfContext {
    if let Some(lang) = &options.language {
        ctx = ctx.with_language(lang.clone());
    }
    ctx.trusted(options.trusted)
}

fn load_email(
    data: &[u8],
    file_name: &str,
    options: &InputOptions,
) -> anyhow::Result<Vec<ScanInput>> {
    let mail = parse_mail(data).map_err(|e| anyhow::anyhow!("Failed to parse email: {}", e))?;

    let message_id = mail
        .headers
        .get_first_value("Message-ID")
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| file_name.trim_end_matches(".eml").to_string());
    let subject = mail.headers.get_first_value("Subject").unwrap_or_default();
    let sender = mail.headers.get_first_value("From").unwrap_or_default();
    let received_at = mail
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    let body = best_body(&mail).unwrap_or_default();

    let mut email = EmailContext::new(message_id.clone(), subject, body)
        .with_sender(sender)
        .trusted(options.trusted);
    if let Some(at) = received_at {
        email = email.with_received_at(at);
    }
    if let Some(lang) = &options.language {
        email = email.with_language(lang.clone());
    }

    let mut inputs = vec![ScanInput::Email(email)];

    let mut attachments = Vec::new();
    collect_pdf_attachments(&mail, &mut attachments);
    for (index, (name, bytes)) in attachments.into_iter().enumerate() {
        let mut ctx = PdfContext::from_bytes(bytes, name)
            .with_source(message_id.clone(), Some(format!("att-{}", index + 1)));
        if let Some(at) = received_at {
            ctx = ctx.with_received_at(at);
        }
        inputs.push(ScanInput::Pdf(apply_pdf(ctx, options)));
    }

    Ok(inputs)
}

/// Plain text part if there is one, else the visible text of the HTML part.
fn best_body(mail: &ParsedMail) -> Option<String> {
    fn walk(mail: &ParsedMail, mimetype: &str) -> Option<String> {
        if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) && !is_attachment(mail) {
            if let Ok(body) = mail.get_body() {
                return Some(body);
            }
        }
        mail.subparts.iter().find_map(|part| walk(part, mimetype))
    }

    walk(mail, "text/plain").or_else(|| walk(mail, "text/html").map(|html| html_to_text(&html)))
}

fn is_attachment(part: &ParsedMail) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
}

fn collect_pdf_attachments(mail: &ParsedMail, out: &mut Vec<(String, Vec<u8>)>) {
    for part in &mail.subparts {
        collect_pdf_attachments(part, out);
    }

    let disposition = mail.get_content_disposition();
    let name = disposition
        .params
        .get("filename")
        .or_else(|| mail.ctype.params.get("name"))
        .cloned();
    let is_pdf = mail.ctype.mimetype.eq_ignore_ascii_case("application/pdf")
        || name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().ends_with(".pdf"));
    if !is_pdf {
        return;
    }

    match mail.get_body_raw() {
        Ok(bytes) => out.push((name.unwrap_or_else(|| "attachment.pdf".to_string()), bytes)),
        Err(e) => warn!("Skipping unreadable PDF attachment: {}", e),
    }
}

/// Text nodes of an HTML document with entities decoded, one block per line.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_ELEMENTS.contains(&name) {
        return;
    }

    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            collect_text(child, out);
        }
    }
    if block {
        out.push('\n');
    } else if matches!(name, "td" | "th") {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use billscan_core::{BillScanner, EngineConfig};

    const EMAIL: &str = "From: \"Metro Water\" <bills@metrowater.com>\r\n\
Subject: Your water bill\r\n\
Message-ID: <abc123@metrowater.com>\r\n\
Date: Tue, 05 Mar 2024 09:30:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Amount due: $42.10\r\n";

    #[test]
    fn test_load_email_headers() {
        let inputs = load_email(EMAIL.as_bytes(), "water.eml", &InputOptions::default()).unwrap();
        assert_eq!(inputs.len(), 1);
        let ScanInput::Email(email) = &inputs[0] else {
            panic!("expected an email input");
        };
        assert_eq!(email.message_id, "abc123@metrowater.com");
        assert_eq!(email.subject, "Your water bill");
        assert!(email.sender.contains("Metro Water"));
        assert!(email.body.contains("$42.10"));
        assert!(email.received_at.is_some());
    }

    #[test]
    fn test_options_applied() {
        let options = InputOptions {
            language: Some("hu".to_string()),
            trusted: true,
        };
        let inputs = load_email(EMAIL.as_bytes(), "water.eml", &options).unwrap();
        assert!(inputs[0].is_trusted());
        assert_eq!(inputs[0].language_hint(), Some("hu"));
    }

    const HTML_EMAIL: &str = "From: \"Metro Water\" <bills@metrowater.com>\r\n\
Subject: Your water bill\r\n\
Message-ID: <html1@metrowater.com>\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><head><title>Bill</title><style>.amt{color:red}</style></head><body>\
<h1>Invoice</h1><p>Amount due: <span class=\"amt\">&#36;42.10</span></p>\
<script>var shown = false;</script></body></html>\r\n";

    fn body_of(inputs: &[ScanInput]) -> &str {
        let ScanInput::Email(email) = &inputs[0] else {
            panic!("expected an email input");
        };
        &email.body
    }

    #[test]
    fn test_html_body_is_visible_text() {
        let html = "<html><head><style>.amt{color:red}</style></head><body>\
            <p>Fizetend&#337; &ouml;sszeg:&nbsp;<b>12&nbsp;500 Ft</b></p>\
            <table><tr><td>Gas</td><td>&#36;5 &amp; up</td></tr></table></body></html>";
        assert_eq!(html_to_text(html), "Fizetendő összeg: 12 500 Ft\nGas $5 & up");
    }

    #[test]
    fn test_html_only_email_body() {
        let inputs = load_email(HTML_EMAIL.as_bytes(), "water.eml", &InputOptions::default()).unwrap();
        assert_eq!(body_of(&inputs), "Invoice\nAmount due: $42.10");
    }

    #[tokio::test]
    async fn test_html_only_email_scans_as_bill() {
        let inputs = load_email(HTML_EMAIL.as_bytes(), "water.eml", &InputOptions::default()).unwrap();
        let scanner = BillScanner::from_config(&EngineConfig::default()).unwrap();

        let result = scanner.scan(&inputs[0]).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.bills[0].amount.to_string(), "42.10");
        assert_eq!(result.bills[0].currency, "USD");
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("a/B.PDF")));
        assert!(is_supported(Path::new("mail.eml")));
        assert!(!is_supported(Path::new("photo.png")));
    }
}
