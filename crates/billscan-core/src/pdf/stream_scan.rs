//! Text recovery from string operands in uncompressed content streams.

use tracing::trace;

use super::{TextRecoveryStrategy, decode_byte};

/// Collects `(...)` and `<...>` string operands from `BT`/`ET` text blocks
/// in the raw bytes. When the file has no text blocks at all, every literal
/// string is taken.
pub struct StreamMarkerScan {
    min_printable_ratio: f32,
}

impl StreamMarkerScan {
    pub fn new() -> Self {
        Self {
            min_printable_ratio: 0.8,
        }
    }

    /// Scan `bytes` and return the decoded string runs.
    pub fn scan(&self, bytes: &[u8]) -> String {
        let has_text_blocks = contains_operator(bytes, b"BT");
        let mut out = String::new();
        let mut in_text = false;
        let mut in_array = false;
        let mut i = 0;

        while i < bytes.len() {
            let b = bytes[i];
            let active = in_text || !has_text_blocks;
            match b {
                b'(' => {
                    let (raw, next) = read_literal(bytes, i + 1);
                    if active {
                        self.push_run(&mut out, &raw);
                    }
                    i = next;
                    continue;
                }
                b'<' if bytes.get(i + 1) == Some(&b'<') => {
                    i += 2;
                    continue;
                }
                b'<' if in_text => {
                    let (raw, next) = read_hex(bytes, i + 1);
                    self.push_run(&mut out, &raw);
                    i = next;
                    continue;
                }
                b'[' => in_array = true,
                b']' => in_array = false,
                b'-' if in_array && in_text => {
                    // Large negative kerning inside TJ is a word gap.
                    let (number, next) = read_number(bytes, i);
                    if number < -150.0 && !out.ends_with([' ', '\n']) {
                        out.push(' ');
                    }
                    i = next;
                    continue;
                }
                b if b.is_ascii_alphabetic() || b == b'\'' || b == b'"' || b == b'*' => {
                    let start = i;
                    while i < bytes.len()
                        && (bytes[i].is_ascii_alphabetic() || matches!(bytes[i], b'*' | b'\'' | b'"'))
                    {
                        i += 1;
                    }
                    match &bytes[start..i] {
                        b"BT" => in_text = true,
                        b"ET" => {
                            in_text = false;
                            push_break(&mut out);
                        }
                        b"Td" | b"TD" | b"T*" | b"Tm" | b"'" | b"\"" if in_text => push_break(&mut out),
                        _ => {}
                    }
                    continue;
                }
                _ => {}
            }
            i += 1;
        }

        out.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push_run(&self, out: &mut String, raw: &[u8]) {
        if raw.is_empty() {
            return;
        }
        let decoded: String = raw.iter().map(|b| decode_byte(*b)).collect();
        let printable = decoded
            .chars()
            .filter(|c| !c.is_control() || c.is_whitespace())
            .count();
        if (printable as f32) < self.min_printable_ratio * decoded.chars().count() as f32 {
            trace!("Skipping binary string run of {} bytes", raw.len());
            return;
        }
        out.push_str(&decoded);
    }
}

impl Default for StreamMarkerScan {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecoveryStrategy for StreamMarkerScan {
    fn name(&self) -> &'static str {
        "stream-markers"
    }

    fn confidence_hint(&self) -> f32 {
        0.7
    }

    fn recover(&self, bytes: &[u8]) -> Option<String> {
        let text = self.scan(bytes);
        (!text.trim().is_empty()).then_some(text)
    }
}

fn push_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Whether `op` occurs as a whitespace-delimited token.
fn contains_operator(bytes: &[u8], op: &[u8]) -> bool {
    bytes.windows(op.len() + 2).any(|w| {
        w[0].is_ascii_whitespace() && &w[1..=op.len()] == op && w[op.len() + 1].is_ascii_whitespace()
    })
}

/// Read a literal string body starting after `(`; returns the bytes and the
/// index after the closing `)`.
fn read_literal(bytes: &[u8], mut i: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut depth = 1;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' => {
                i += 1;
                let Some(&esc) = bytes.get(i) else { break };
                match esc {
                    b'n' => out.push(b'\n'),
                    b'r' => out.push(b'\r'),
                    b't' => out.push(b'\t'),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0C),
                    b'(' | b')' | b'\\' => out.push(esc),
                    b'\r' => {
                        // line continuation
                        if bytes.get(i + 1) == Some(&b'\n') {
                            i += 1;
                        }
                    }
                    b'\n' => {}
                    b'0'..=b'7' => {
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 3 && i < bytes.len() && (b'0'..=b'7').contains(&bytes[i]) {
                            value = value * 8 + u32::from(bytes[i] - b'0');
                            digits += 1;
                            i += 1;
                        }
                        out.push((value & 0xFF) as u8);
                        continue;
                    }
                    other => out.push(other),
                }
            }
            b'(' => {
                depth += 1;
                out.push(b);
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return (out, i + 1);
                }
                out.push(b);
            }
            _ => out.push(b),
        }
        i += 1;
    }
    (out, i)
}

/// Read a hex string body starting after `<`.
fn read_hex(bytes: &[u8], mut i: usize) -> (Vec<u8>, usize) {
    let mut nibbles = Vec::new();
    while i < bytes.len() && bytes[i] != b'>' {
        if let Some(n) = (bytes[i] as char).to_digit(16) {
            nibbles.push(n as u8);
        }
        i += 1;
    }
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    let out = nibbles.chunks(2).map(|p| (p[0] << 4) | p[1]).collect();
    (out, (i + 1).min(bytes.len()))
}

fn read_number(bytes: &[u8], start: usize) -> (f32, usize) {
    let mut i = start + 1;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    let value = std::str::from_utf8(&bytes[start..i])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);
    (value, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_blocks() {
        let bytes = b"%PDF-1.4\n1 0 obj << /Producer (Acme Writer) >> endobj\n\
            stream\nBT /F1 12 Tf 72 712 Td (Total Amount Due: $135.00) Tj ET\n\
            BT 72 690 Td [(Payment) -250 (Due)] TJ ET\nendstream";
        let text = StreamMarkerScan::new().scan(bytes);
        assert_eq!(text, "Total Amount Due: $135.00\nPayment Due");
    }

    #[test]
    fn test_escapes_and_nesting() {
        let bytes = b" BT (a\\(b\\) \\101\\102 (nested)) Tj ET ";
        assert_eq!(StreamMarkerScan::new().scan(bytes), "a(b) AB (nested)");
    }

    #[test]
    fn test_hex_strings() {
        let bytes = b" BT <48656C6C6F> Tj ET ";
        assert_eq!(StreamMarkerScan::new().scan(bytes), "Hello");
    }

    #[test]
    fn test_literals_outside_text_blocks_when_none_exist() {
        let bytes = b"garbage (Invoice 42) more";
        assert_eq!(StreamMarkerScan::new().scan(bytes), "Invoice 42");
    }

    #[test]
    fn test_latin2_letters() {
        let bytes = b" BT (Fizetend\xF5 \xF6sszeg) Tj ET ";
        assert_eq!(StreamMarkerScan::new().scan(bytes), "Fizetendő összeg");
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(StreamMarkerScan::new().recover(b"\x00\x01\x02"), None);
    }
}
