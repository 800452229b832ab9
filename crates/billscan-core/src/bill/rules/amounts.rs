//! Locale-aware amount parsing and generic amount detection.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::{AMOUNT_SUFFIX, CODE_AMOUNT, SIGN_AMOUNT, currency_code};
use super::{ExtractionMatch, FieldExtractor};
use crate::language::Language;

lazy_static! {
    static ref EN_CURRENCY_TOKENS: Regex = token_regex(Language::English);
    static ref HU_CURRENCY_TOKENS: Regex = token_regex(Language::Hungarian);
}

fn token_regex(language: Language) -> Regex {
    currency_token_regex(language, &[]).unwrap()
}

fn currency_tokens(language: Language) -> &'static Regex {
    match language {
        Language::English => &EN_CURRENCY_TOKENS,
        Language::Hungarian => &HU_CURRENCY_TOKENS,
    }
}

/// Matcher for the language's currency words plus `symbols`, longest first.
pub fn currency_token_regex(language: Language, symbols: &[&str]) -> Result<Regex, regex::Error> {
    let mut tokens: Vec<&str> = language.currency_tokens().to_vec();
    tokens.extend(symbols.iter().copied().filter(|s| !s.is_empty()));
    tokens.sort_by_key(|t| std::cmp::Reverse(t.len()));
    tokens.dedup();

    let alternation = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i){alternation}|[$€£]"))
}

/// Parse a raw amount string using the language's conventions.
///
/// A `,` or `.` followed by exactly one or two digits at the end is the
/// decimal separator; every other separator groups thousands. Anything that
/// does not look like a number gives zero. Signs are dropped.
///
/// Only the built-in currency words are stripped; use
/// [`LanguagePatternPack::parse_amount`](crate::patterns::LanguagePatternPack::parse_amount)
/// to honour a pack's own currency table.
pub fn parse_amount(raw: &str, language: Language) -> Decimal {
    parse_amount_stripping(raw, currency_tokens(language))
}

/// [`parse_amount`] with every match of `currency` removed first.
pub fn parse_amount_stripping(raw: &str, currency: &Regex) -> Decimal {
    let stripped = currency.replace_all(raw, "");

    let cleaned: String = stripped
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Decimal::ZERO;
    }

    let decimal_at = cleaned.rfind([',', '.']).filter(|&pos| {
        let tail = &cleaned[pos + 1..];
        (1..=2).contains(&tail.len()) && tail.chars().all(|c| c.is_ascii_digit())
    });

    let normalized = match decimal_at {
        Some(pos) => {
            let integer: String = cleaned[..pos].chars().filter(char::is_ascii_digit).collect();
            let integer = if integer.is_empty() { "0".to_string() } else { integer };
            format!("{}.{}", integer, &cleaned[pos + 1..])
        }
        None => cleaned.chars().filter(char::is_ascii_digit).collect(),
    };

    Decimal::from_str(&normalized).unwrap_or(Decimal::ZERO)
}

/// Format an amount the way the language writes it.
///
/// English: `175,945.50`. Hungarian: `175 945` or `1 234,56`.
pub fn format_amount(amount: Decimal, language: Language) -> String {
    let s = format!("{:.2}", amount.abs().round_dp(2));
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s.as_str(), "00"));

    let group = match language {
        Language::English => ',',
        Language::Hungarian => ' ',
    };

    // Add thousand separators
    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(group);
        }
        formatted.push(*c);
    }

    match language {
        Language::English => format!("{formatted}.{decimal_part}"),
        Language::Hungarian if decimal_part == "00" => formatted,
        Language::Hungarian => format!("{formatted},{decimal_part}"),
    }
}

/// An amount with the currency written next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Option<&'static str>,
}

/// Finds currency-marked amounts anywhere in a text.
pub struct AmountExtractor {
    language: Language,
}

impl AmountExtractor {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Money>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results: Vec<Self::Output> = Vec::new();

        let prefixed = SIGN_AMOUNT
            .captures_iter(text)
            .chain(CODE_AMOUNT.captures_iter(text))
            .map(|caps| (caps, 1, 2, 0.8));
        let suffixed = AMOUNT_SUFFIX.captures_iter(text).map(|caps| (caps, 2, 1, 0.7));

        for (caps, symbol_group, number_group, confidence) in prefixed.chain(suffixed) {
            let (Some(full), Some(symbol), Some(number)) =
                (caps.get(0), caps.get(symbol_group), caps.get(number_group))
            else {
                continue;
            };

            let overlaps = results.iter().any(|r| {
                r.position
                    .is_some_and(|(start, end)| full.start() < end && start < full.end())
            });
            if overlaps {
                continue;
            }

            let money = Money {
                amount: parse_amount(number.as_str(), self.language),
                currency: currency_code(symbol.as_str()),
            };
            results.push(
                ExtractionMatch::new(money, confidence, full.as_str())
                    .with_position(full.start(), full.end()),
            );
        }

        results.sort_by_key(|r| r.position.map(|(start, _)| start).unwrap_or(0));
        results
    }
}

/// Pick the payable total among `candidates`.
///
/// The positive amount with the closest keyword ending at most `window`
/// characters before it wins; without any such keyword, the largest amount.
pub fn select_payable(
    text: &str,
    candidates: Vec<ExtractionMatch<Money>>,
    keyword_spans: &[(usize, usize)],
    window: usize,
) -> Option<ExtractionMatch<Money>> {
    let positive: Vec<_> = candidates
        .into_iter()
        .filter(|c| c.value.amount > Decimal::ZERO)
        .collect();

    let mut nearest: Option<(usize, usize)> = None;
    for (idx, candidate) in positive.iter().enumerate() {
        let Some((start, _)) = candidate.position else {
            continue;
        };
        let distance = keyword_spans
            .iter()
            .filter(|(_, kw_end)| *kw_end <= start)
            .map(|(_, kw_end)| text[*kw_end..start].chars().count())
            .filter(|d| *d <= window)
            .min();
        if let Some(d) = distance {
            if nearest.is_none_or(|(_, best)| d < best) {
                nearest = Some((idx, d));
            }
        }
    }

    if let Some((idx, _)) = nearest {
        return positive.into_iter().nth(idx);
    }

    positive
        .into_iter()
        .reduce(|best, c| if c.value.amount > best.value.amount { c } else { best })
}
