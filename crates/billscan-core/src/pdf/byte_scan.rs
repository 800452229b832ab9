//! Last-resort text recovery from printable byte runs.

use super::{TextRecoveryStrategy, decode_byte};

/// PDF syntax words dropped from recovered runs.
const PDF_TOKENS: &[&str] = &[
    "obj", "endobj", "stream", "endstream", "xref", "trailer", "startxref", "%%EOF", "R", "BT",
    "ET", "Tf", "Td", "TD", "Tj", "TJ", "Tm", "T*", "Tc", "Tw", "TL", "Tz", "re", "cm", "q", "Q",
    "f", "S", "BDC", "EMC", "gs", "Do", "rg", "RG", "n", "W",
];

/// Keeps runs of printable ASCII and Latin letters, discarding binary data
/// and PDF syntax.
pub struct ByteRangeScan {
    min_run_len: usize,
}

impl ByteRangeScan {
    pub fn new(min_run_len: usize) -> Self {
        Self {
            min_run_len: min_run_len.max(1),
        }
    }

    /// Printable runs, one per line.
    pub fn scan(&self, bytes: &[u8]) -> String {
        let mut lines = Vec::new();
        let mut run = String::new();

        for &b in bytes {
            if is_text_byte(b) {
                run.push(decode_byte(b));
            } else {
                self.flush(&mut run, &mut lines);
            }
        }
        self.flush(&mut run, &mut lines);

        lines.join("\n")
    }

    fn flush(&self, run: &mut String, lines: &mut Vec<String>) {
        if run.chars().count() >= self.min_run_len {
            for line in run.lines() {
                if let Some(cleaned) = self.clean_line(line) {
                    lines.push(cleaned);
                }
            }
        }
        run.clear();
    }

    fn clean_line(&self, line: &str) -> Option<String> {
        let words: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '[' || c == ']')
            .filter(|w| !w.is_empty())
            .filter(|w| !is_pdf_syntax(w))
            .collect();
        let cleaned = words.join(" ");

        let total = cleaned.chars().count();
        if total < self.min_run_len {
            return None;
        }
        let texty = cleaned
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == ' ')
            .count();
        let has_letters = cleaned.chars().filter(|c| c.is_alphabetic()).count() >= 2;
        (has_letters && texty * 10 >= total * 6).then_some(cleaned)
    }
}

impl TextRecoveryStrategy for ByteRangeScan {
    fn name(&self) -> &'static str {
        "byte-ranges"
    }

    fn confidence_hint(&self) -> f32 {
        0.5
    }

    fn recover(&self, bytes: &[u8]) -> Option<String> {
        let text = self.scan(bytes);
        (!text.trim().is_empty()).then_some(text)
    }
}

fn is_text_byte(b: u8) -> bool {
    matches!(b, 0x20..=0x7E | b'\t' | b'\n' | b'\r' | 0xC0..=0xFF) && b != 0xD7 && b != 0xF7
}

fn is_pdf_syntax(word: &str) -> bool {
    word.starts_with('/')
        || word.starts_with("<<")
        || word.ends_with(">>")
        || word.starts_with("%PDF")
        || PDF_TOKENS.contains(&word)
}
