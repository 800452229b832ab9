//! Supported document languages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A language with a shipped pattern pack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "hu")]
    Hungarian,
}

const HUNGARIAN_LETTERS: &[char] = &['ő', 'ű', 'Ő', 'Ű', 'á', 'é', 'í', 'ó', 'ö', 'ú', 'ü'];

const HUNGARIAN_MARKERS: &[&str] = &[
    "számla", "fizetendő", "összeg", "határidő", "és", "az", "forint", "ft", "kérjük", "díj",
];

const ENGLISH_MARKERS: &[&str] = &[
    "the", "and", "your", "bill", "amount", "due", "payment", "total", "please", "account",
];

impl Language {
    /// All supported languages.
    pub const ALL: [Language; 2] = [Language::English, Language::Hungarian];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hungarian => "hu",
        }
    }

    /// Resolve a language code. Unknown codes fall back to the default.
    ///
    /// Case and region subtags are ignored (`"HU"`, `"hu-HU"`, `"en_US"`).
    pub fn from_code(code: &str) -> Self {
        Self::try_from_code(code).unwrap_or_default()
    }

    /// Resolve a language code, returning `None` for unsupported codes.
    pub fn try_from_code(code: &str) -> Option<Self> {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match primary.as_str() {
            "en" | "eng" | "english" => Some(Language::English),
            "hu" | "hun" | "hungarian" | "magyar" => Some(Language::Hungarian),
            _ => None,
        }
    }

    /// Resolve an optional hint, falling back to detection on `text`.
    pub fn resolve(hint: Option<&str>, text: &str) -> Self {
        Self::resolve_or(hint, text, Language::default())
    }

    /// Like [`resolve`](Self::resolve) with an explicit tie-break language.
    pub fn resolve_or(hint: Option<&str>, text: &str, fallback: Language) -> Self {
        hint.and_then(Self::try_from_code)
            .unwrap_or_else(|| Self::detect_or(text, fallback))
    }

    /// Guess the language of `text` from letters and marker words.
    pub fn detect(text: &str) -> Self {
        Self::detect_or(text, Language::default())
    }

    /// Like [`detect`](Self::detect), returning `fallback` on a tie.
    pub fn detect_or(text: &str, fallback: Language) -> Self {
        let letters = text.chars().filter(|c| HUNGARIAN_LETTERS.contains(c)).count();

        let mut hu_words = 0usize;
        let mut en_words = 0usize;
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            if HUNGARIAN_MARKERS.contains(&word.as_str()) {
                hu_words += 1;
            }
            if ENGLISH_MARKERS.contains(&word.as_str()) {
                en_words += 1;
            }
        }

        // Marker words weigh twice as much as accented letters.
        let hu_score = hu_words * 2 + letters;
        let en_score = en_words * 2;

        match hu_score.cmp(&en_score) {
            std::cmp::Ordering::Greater => Language::Hungarian,
            std::cmp::Ordering::Less => Language::English,
            std::cmp::Ordering::Equal => fallback,
        }
    }

    /// Currency words written next to amounts in this language.
    pub(crate) fn currency_tokens(&self) -> &'static [&'static str] {
        match self {
            Language::English => &["US$", "USD", "EUR", "GBP", "CAD", "dollars", "dollar"],
            Language::Hungarian => &["HUF", "forint", "Ft.", "Ft", "EUR", "euró"],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
