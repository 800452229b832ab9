//! Extraction inputs: one email, or one PDF attachment.

use chrono::{DateTime, Utc};

use crate::models::bill::SourceKind;

/// An email already fetched by the caller.
#[derive(Debug, Clone, Default)]
pub struct EmailContext {
    pub message_id: String,
    pub subject: String,
    pub body: String,
    /// `From` header, e.g. `"PG&E" <billing@pge.com>`.
    pub sender: String,
    pub received_at: Option<DateTime<Utc>>,
    /// Sender whitelisted by the user; skips the bill-likelihood gate.
    pub trusted_source: bool,
    /// Language code hint.
    pub language: Option<String>,
}

impl EmailContext {
    pub fn new(
        message_id: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            subject: subject.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language = Some(code.into());
        self
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted_source = trusted;
        self
    }

    /// Subject and body as one searchable text.
    pub fn text(&self) -> String {
        if self.subject.is_empty() {
            self.body.clone()
        } else {
            format!("{}\n{}", self.subject, self.body)
        }
    }
}

/// PDF payload: raw bytes, or text a caller already extracted.
#[derive(Debug, Clone)]
pub enum PdfContent {
    Bytes(Vec<u8>),
    Text(String),
}

/// A PDF attachment or standalone PDF file.
#[derive(Debug, Clone)]
pub struct PdfContext {
    pub content: PdfContent,
    pub file_name: String,
    pub source_message_id: Option<String>,
    pub attachment_id: Option<String>,
    pub language: Option<String>,
    pub trusted_source: bool,
    /// Receive time of the carrying email, used as a billing-date fallback.
    pub received_at: Option<DateTime<Utc>>,
}

impl PdfContext {
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self::new(PdfContent::Bytes(bytes), file_name)
    }

    pub fn from_text(text: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self::new(PdfContent::Text(text.into()), file_name)
    }

    fn new(content: PdfContent, file_name: impl Into<String>) -> Self {
        Self {
            content,
            file_name: file_name.into(),
            source_message_id: None,
            attachment_id: None,
            language: None,
            trusted_source: false,
            received_at: None,
        }
    }

    /// Attach the ids of the email this PDF came with.
    pub fn with_source(
        mut self,
        message_id: impl Into<String>,
        attachment_id: Option<String>,
    ) -> Self {
        self.source_message_id = Some(message_id.into());
        self.attachment_id = attachment_id;
        self
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language = Some(code.into());
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted_source = trusted;
        self
    }
}

/// One document handed to the engine by the batch coordinator.
#[derive(Debug, Clone)]
pub enum ScanInput {
    Email(EmailContext),
    Pdf(PdfContext),
}

impl ScanInput {
    pub fn kind(&self) -> SourceKind {
        match self {
            ScanInput::Email(_) => SourceKind::Email,
            ScanInput::Pdf(_) => SourceKind::Pdf,
        }
    }

    pub fn language_hint(&self) -> Option<&str> {
        match self {
            ScanInput::Email(ctx) => ctx.language.as_deref(),
            ScanInput::Pdf(ctx) => ctx.language.as_deref(),
        }
    }

    pub fn is_trusted(&self) -> bool {
        match self {
            ScanInput::Email(ctx) => ctx.trusted_source,
            ScanInput::Pdf(ctx) => ctx.trusted_source,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        match self {
            ScanInput::Email(ctx) => &ctx.message_id,
            ScanInput::Pdf(ctx) => &ctx.file_name,
        }
    }
}

impl From<EmailContext> for ScanInput {
    fn from(ctx: EmailContext) -> Self {
        ScanInput::Email(ctx)
    }
}

impl From<PdfContext> for ScanInput {
    fn from(ctx: PdfContext) -> Self {
        ScanInput::Pdf(ctx)
    }
}
