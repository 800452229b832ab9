//! Language pattern store.
//!
//! Each supported language ships a JSON pattern pack (`patterns/<code>.json`)
//! that is compiled once into an immutable [`LanguagePatternPack`]. Packs are
//! handed to the extraction strategies through a [`PatternStore`]; nothing is
//! mutated after construction.

pub mod builtin;
pub mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bill::rules::{currency_token_regex, parse_amount_stripping};
use crate::error::PatternError;
use crate::language::Language;
pub use schema::{
    ConfidenceWeights, CurrencyDef, DateOrder, FieldPatternsDef, PatternPackDef, PostProcess,
    ServiceTypeDef, VendorOverrideDef,
};

/// Capture group for a number with optional thousands and decimal separators.
///
/// `175.945`, `175,945.50`, `1 234,56`, `135.00`, `42`.
pub const NUMBER_FRAGMENT: &str =
    r"(\d{1,3}(?:[ \x{00A0}.,]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?)";

/// Capture group for a numeric or written-out date.
///
/// `2023.06.15.`, `2023. június 15.`, `06/15/2023`, `June 15, 2023`, `15 June 2023`.
pub const DATE_FRAGMENT: &str = concat!(
    r"(\d{4}[./-]\s?\d{1,2}[./-]\s?\d{1,2}\.?",
    r"|\d{4}\.?\s+\p{L}{3,}\.?\s+\d{1,2}\.?",
    r"|\d{1,2}[./-]\s?\d{1,2}[./-]\s?\d{2,4}",
    r"|\p{L}{3,}\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}",
    r"|\d{1,2}\.?\s+\p{L}{3,}\.?,?\s+\d{4})"
);

/// A field of the fixed bill schema that packs carry patterns for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Amount,
    DueDate,
    BillingDate,
    Vendor,
    AccountNumber,
    InvoiceNumber,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Amount,
        Field::DueDate,
        Field::BillingDate,
        Field::Vendor,
        Field::AccountNumber,
        Field::InvoiceNumber,
    ];

    /// Name used in the pack files.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::DueDate => "dueDate",
            Field::BillingDate => "billingDate",
            Field::Vendor => "vendor",
            Field::AccountNumber => "accountNumber",
            Field::InvoiceNumber => "invoiceNumber",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A field value together with the span of the whole pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// Post-processed capture.
    pub value: String,
    /// Byte offset where the full match starts.
    pub start: usize,
    /// Byte offset where the full match ends.
    pub end: usize,
}

/// Result of a service-type lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMatch {
    pub service_type: String,
    pub category: String,
}

#[derive(Debug)]
struct FieldPatterns {
    patterns: Vec<Regex>,
    post_process: PostProcess,
}

#[derive(Debug)]
struct ServiceType {
    service_type: String,
    category: String,
    identifiers: Vec<String>,
}

#[derive(Debug)]
struct CurrencySymbol {
    code: String,
    matcher: Regex,
}

/// A compiled vendor override.
#[derive(Debug)]
pub struct VendorOverride {
    name: String,
    category: Option<String>,
    currency: Option<String>,
    matcher: Regex,
    highlighted_amount: Vec<Regex>,
}

impl VendorOverride {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    /// Whether `text` names this vendor (whole-word, case-insensitive).
    pub fn is_named_in(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    /// First capture of the vendor's highlighted amount box, with its span.
    pub fn highlighted_amount(&self, text: &str) -> Option<FieldMatch> {
        self.highlighted_amount.iter().find_map(|re| {
            let caps = re.captures(text)?;
            let whole = caps.get(0)?;
            let value = caps.get(1)?.as_str().trim().to_string();
            Some(FieldMatch {
                value,
                start: whole.start(),
                end: whole.end(),
            })
        })
    }
}

/// An immutable, compiled pattern pack for one language.
#[derive(Debug)]
pub struct LanguagePatternPack {
    language: Language,
    definition: PatternPackDef,
    document_identifiers: Vec<String>,
    bill_indicators: Vec<String>,
    amount_keywords: Vec<String>,
    amount_keyword_matcher: Option<Regex>,
    fields: BTreeMap<Field, FieldPatterns>,
    service_types: Vec<ServiceType>,
    currencies: Vec<CurrencySymbol>,
    currency_tokens: Regex,
    vendors: Vec<VendorOverride>,
    month_names: Vec<Vec<String>>,
}

impl LanguagePatternPack {
    /// Compile a pack definition.
    ///
    /// Every pattern must compile and expose a capture group; weights must lie
    /// in `[0, 1]`; the month table, if present, must have twelve entries.
    pub fn compile(definition: PatternPackDef) -> Result<Self, PatternError> {
        let language = Language::try_from_code(&definition.language).ok_or_else(|| {
            PatternError::InvalidPack {
                language: definition.language.clone(),
                reason: "unsupported language code".to_string(),
            }
        })?;
        let code = language.code().to_string();

        for (name, weight) in definition.weights.all() {
            if !(0.0..=1.0).contains(&weight) {
                return Err(PatternError::InvalidPack {
                    language: code,
                    reason: format!("weight {name} = {weight} outside [0, 1]"),
                });
            }
        }

        if !definition.month_names.is_empty() && definition.month_names.len() != 12 {
            return Err(PatternError::InvalidPack {
                language: code,
                reason: format!("expected 12 month entries, found {}", definition.month_names.len()),
            });
        }

        let currencies = definition
            .currencies
            .iter()
            .map(|c| {
                Ok(CurrencySymbol {
                    code: c.code.clone(),
                    matcher: symbol_matcher(&c.symbol, &code)?,
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        let symbols: Vec<&str> = definition.currencies.iter().map(|c| c.symbol.as_str()).collect();
        let currency_tokens =
            currency_token_regex(language, &symbols).map_err(|e| PatternError::InvalidPattern {
                language: code.clone(),
                field: "currencies".to_string(),
                reason: e.to_string(),
            })?;

        let currency_fragment = currency_fragment(&definition.currencies);

        let mut fields = BTreeMap::new();
        for (field, def) in &definition.fields {
            let patterns = def
                .patterns
                .iter()
                .map(|p| compile_pattern(p, &currency_fragment, &code, field.name()))
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert(
                *field,
                FieldPatterns {
                    patterns,
                    post_process: def.post_process,
                },
            );
        }

        let vendors = definition
            .vendors
            .iter()
            .map(|v| {
                let names = std::iter::once(&v.name).chain(v.aliases.iter());
                let alternation = names
                    .map(|n| regex::escape(n))
                    .collect::<Vec<_>>()
                    .join("|");
                let matcher = Regex::new(&format!(r"(?i)(?:^|\W)(?:{alternation})(?:\W|$)"))
                    .map_err(|e| PatternError::InvalidPattern {
                        language: code.clone(),
                        field: format!("vendor {}", v.name),
                        reason: e.to_string(),
                    })?;
                let highlighted_amount = v
                    .highlighted_amount_patterns
                    .iter()
                    .map(|p| compile_pattern(p, &currency_fragment, &code, "highlightedAmount"))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(VendorOverride {
                    name: v.name.clone(),
                    category: v.category.clone(),
                    currency: v.currency.clone(),
                    matcher,
                    highlighted_amount,
                })
            })
            .collect::<Result<Vec<_>, PatternError>>()?;

        let amount_keyword_matcher = if definition.amount_keywords.is_empty() {
            None
        } else {
            let alternation = definition
                .amount_keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!("(?i){alternation}")).map_err(|e| {
                PatternError::InvalidPattern {
                    language: code.clone(),
                    field: "amountKeywords".to_string(),
                    reason: e.to_string(),
                }
            })?;
            Some(re)
        };

        let service_types = definition
            .service_types
            .iter()
            .map(|s| ServiceType {
                service_type: s.service_type.clone(),
                category: s.category.clone(),
                identifiers: lowercase_all(&s.identifiers),
            })
            .collect();

        debug!(
            "Compiled pattern pack '{}' v{} ({} fields, {} vendors)",
            code,
            definition.version,
            fields.len(),
            vendors.len()
        );

        Ok(Self {
            language,
            document_identifiers: lowercase_all(&definition.document_identifiers),
            bill_indicators: lowercase_all(&definition.bill_indicators),
            amount_keywords: lowercase_all(&definition.amount_keywords),
            amount_keyword_matcher,
            month_names: definition.month_names.iter().map(|m| lowercase_all(m)).collect(),
            fields,
            service_types,
            currencies,
            currency_tokens,
            vendors,
            definition,
        })
    }

    /// Parse and compile a pack from JSON.
    pub fn from_json(json: &str, source_name: &str) -> Result<Self, PatternError> {
        let definition: PatternPackDef =
            serde_json::from_str(json).map_err(|e| PatternError::Parse {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;
        Self::compile(definition)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// The definition this pack was compiled from.
    pub fn definition(&self) -> &PatternPackDef {
        &self.definition
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.definition.weights
    }

    pub fn default_currency(&self) -> &str {
        &self.definition.default_currency
    }

    pub fn date_order(&self) -> DateOrder {
        self.definition.date_order
    }

    /// Lowercased month spellings, January first.
    pub fn month_names(&self) -> &[Vec<String>] {
        &self.month_names
    }

    /// Lowercased payable-total keywords.
    pub fn amount_keywords(&self) -> &[String] {
        &self.amount_keywords
    }

    /// Byte spans of payable-total keywords in `text`.
    pub fn amount_keyword_spans(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.amount_keyword_matcher {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    pub fn vendors(&self) -> &[VendorOverride] {
        &self.vendors
    }

    /// Case-insensitive substring test against the document identifiers.
    pub fn matches_document_identifier(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.document_identifiers.iter().any(|id| lower.contains(id.as_str()))
    }

    /// Number of distinct bill-indicator words present in `text`.
    pub fn indicator_count(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.bill_indicators
            .iter()
            .filter(|w| lower.contains(w.as_str()))
            .count()
    }

    /// Bill-likelihood gate: an identifier phrase, or enough indicator words.
    pub fn is_likely_bill(&self, text: &str) -> bool {
        self.matches_document_identifier(text)
            || self.indicator_count(text) >= self.definition.min_indicator_matches
    }

    /// First capture of the field's patterns, tried in declaration order.
    pub fn extract_field(&self, text: &str, field: Field) -> Option<String> {
        self.extract_field_match(text, field).map(|m| m.value)
    }

    /// Like [`extract_field`](Self::extract_field), keeping the match span.
    pub fn extract_field_match(&self, text: &str, field: Field) -> Option<FieldMatch> {
        let patterns = self.fields.get(&field)?;
        for re in &patterns.patterns {
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = patterns.post_process.apply(group.as_str());
            if value.is_empty() {
                continue;
            }
            return Some(FieldMatch {
                value,
                start: whole.start(),
                end: whole.end(),
            });
        }
        None
    }

    /// Every capture of every pattern for `field`, in declaration order.
    pub fn extract_field_all(&self, text: &str, field: Field) -> Vec<FieldMatch> {
        let Some(patterns) = self.fields.get(&field) else {
            return Vec::new();
        };
        patterns
            .patterns
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let value = patterns.post_process.apply(caps.get(1)?.as_str());
                (!value.is_empty()).then_some(FieldMatch {
                    value,
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect()
    }

    /// First taxonomy entry with an identifier phrase in `text`.
    pub fn detect_service_type(&self, text: &str) -> Option<ServiceMatch> {
        let lower = text.to_lowercase();
        self.service_types
            .iter()
            .find(|s| s.identifiers.iter().any(|id| lower.contains(id.as_str())))
            .map(|s| ServiceMatch {
                service_type: s.service_type.clone(),
                category: s.category.clone(),
            })
    }

    /// First vendor override named in `text`.
    pub fn match_vendor(&self, text: &str) -> Option<&VendorOverride> {
        self.vendors.iter().find(|v| v.is_named_in(text))
    }

    /// First currency (in table order) whose symbol occurs in `text`.
    pub fn detect_currency(&self, text: &str) -> Option<&str> {
        self.currencies
            .iter()
            .find(|c| c.matcher.is_match(text))
            .map(|c| c.code.as_str())
    }

    /// Parse an amount after stripping this pack's currency symbols.
    pub fn parse_amount(&self, raw: &str) -> Decimal {
        parse_amount_stripping(raw, &self.currency_tokens)
    }

    /// Currency written inside or right after the span `start..end`.
    pub fn currency_near(&self, text: &str, start: usize, end: usize) -> Option<&str> {
        let window_end = text[end..]
            .char_indices()
            .nth(8)
            .map(|(i, _)| end + i)
            .unwrap_or(text.len());
        let window_start = text[..start]
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.detect_currency(&text[window_start..window_end])
    }

    /// Additive bill-likelihood score in `[0, 1]`.
    ///
    /// identifier hit, plus capped indicator words, plus two or more extracted
    /// fields, plus a vendor override, plus a resolved service type.
    pub fn calculate_confidence(&self, text: &str) -> f32 {
        let w = self.weights();
        let mut score = 0.0f32;

        if self.matches_document_identifier(text) {
            score += w.keyword_match;
        }

        let indicators = self.indicator_count(text) as f32;
        score += (indicators * w.indicator_step).min(w.indicator_cap);

        let extracted = Field::ALL
            .iter()
            .filter(|f| self.extract_field(text, **f).is_some())
            .count();
        if extracted >= 2 {
            score += w.pattern_match;
        }

        if self.match_vendor(text).is_some() {
            score += w.vendor_match;
        }

        if self.detect_service_type(text).is_some() {
            score += w.service_type_match;
        }

        score.clamp(0.0, 1.0)
    }
}

/// Read-only collection of compiled packs, one per language.
#[derive(Debug)]
pub struct PatternStore {
    default_pack: LanguagePatternPack,
    others: BTreeMap<Language, LanguagePatternPack>,
}

impl PatternStore {
    /// Build a store from compiled packs.
    ///
    /// The default language must be present; other languages may be missing
    /// and then resolve to the default pack.
    pub fn from_packs(
        packs: impl IntoIterator<Item = LanguagePatternPack>,
        default_language: Language,
    ) -> Result<Self, PatternError> {
        let mut map = BTreeMap::new();
        for pack in packs {
            let language = pack.language();
            if map.insert(language, pack).is_some() {
                return Err(PatternError::DuplicatePack(language.code().to_string()));
            }
        }
        let default_pack = map
            .remove(&default_language)
            .ok_or_else(|| PatternError::MissingDefault(default_language.code().to_string()))?;
        Ok(Self {
            default_pack,
            others: map,
        })
    }

    /// Store with the packs compiled into the binary.
    pub fn builtin() -> Result<Self, PatternError> {
        let packs = Language::ALL
            .iter()
            .map(|l| builtin::load_builtin(*l))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_packs(packs, Language::default())
    }

    /// Load `<code>.json` packs from `dir`, using the built-in pack for any
    /// language without a file.
    pub fn from_dir(dir: &Path) -> Result<Self, PatternError> {
        let mut packs = Vec::with_capacity(Language::ALL.len());
        for language in Language::ALL {
            let path = dir.join(format!("{}.json", language.code()));
            if path.exists() {
                let json = std::fs::read_to_string(&path).map_err(|e| PatternError::Parse {
                    source_name: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                let pack = LanguagePatternPack::from_json(&json, &path.display().to_string())?;
                if pack.language() != language {
                    return Err(PatternError::InvalidPack {
                        language: pack.language().code().to_string(),
                        reason: format!("found in {}", path.display()),
                    });
                }
                debug!("Loaded pattern pack from {}", path.display());
                packs.push(pack);
            } else {
                warn!(
                    "No pattern pack at {}, using built-in '{}' pack",
                    path.display(),
                    language
                );
                packs.push(builtin::load_builtin(language)?);
            }
        }
        Self::from_packs(packs, Language::default())
    }

    pub fn default_language(&self) -> Language {
        self.default_pack.language()
    }

    /// Languages with their own pack, default first.
    pub fn languages(&self) -> Vec<Language> {
        std::iter::once(self.default_language())
            .chain(self.others.keys().copied())
            .collect()
    }

    /// Pack for `language`, or the default pack if none was loaded.
    pub fn pack(&self, language: Language) -> &LanguagePatternPack {
        self.others.get(&language).unwrap_or(&self.default_pack)
    }

    /// Pack for a raw language code; unknown codes get the default pack.
    pub fn pack_for_code(&self, code: &str) -> &LanguagePatternPack {
        match Language::try_from_code(code) {
            Some(language) => self.pack(language),
            None => &self.default_pack,
        }
    }

    pub fn matches_document_identifier(&self, text: &str, language: Language) -> bool {
        self.pack(language).matches_document_identifier(text)
    }

    pub fn extract_field(&self, text: &str, field: Field, language: Language) -> Option<String> {
        self.pack(language).extract_field(text, field)
    }

    pub fn detect_service_type(&self, text: &str, language: Language) -> Option<ServiceMatch> {
        self.pack(language).detect_service_type(text)
    }

    pub fn calculate_confidence(&self, text: &str, language: Language) -> f32 {
        self.pack(language).calculate_confidence(text)
    }
}

fn lowercase_all(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// Word-bounded matcher for alphabetic symbols (`Ft` must not match `Kft`),
/// literal matcher for signs like `$`.
fn symbol_matcher(symbol: &str, language: &str) -> Result<Regex, PatternError> {
    let escaped = regex::escape(symbol);
    let starts_alnum = symbol.chars().next().is_some_and(char::is_alphanumeric);
    let ends_alnum = symbol.chars().last().is_some_and(char::is_alphanumeric);
    let pattern = format!(
        "{}{}{}",
        if starts_alnum { r"\b" } else { "" },
        escaped,
        if ends_alnum { r"\b" } else { "" }
    );
    Regex::new(&pattern).map_err(|e| PatternError::InvalidPattern {
        language: language.to_string(),
        field: format!("currency {symbol}"),
        reason: e.to_string(),
    })
}

fn currency_fragment(currencies: &[CurrencyDef]) -> String {
    if currencies.is_empty() {
        return String::new();
    }
    let alternation = currencies
        .iter()
        .map(|c| regex::escape(&c.symbol))
        .collect::<Vec<_>>()
        .join("|");
    format!("(?:{alternation})?")
}

/// Expand `{number}`, `{date}` and `{currency}` and compile.
fn compile_pattern(
    pattern: &str,
    currency: &str,
    language: &str,
    field: &str,
) -> Result<Regex, PatternError> {
    let expanded = pattern
        .replace("{number}", NUMBER_FRAGMENT)
        .replace("{date}", DATE_FRAGMENT)
        .replace("{currency}", currency);

    let re = Regex::new(&expanded).map_err(|e| PatternError::InvalidPattern {
        language: language.to_string(),
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    if re.captures_len() < 2 {
        return Err(PatternError::MissingCaptureGroup {
            language: language.to_string(),
            field: field.to_string(),
        });
    }
    Ok(re)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PatternStore {
        PatternStore::builtin().unwrap()
    }

    fn synthetic_pack(json_fields: &str) -> PatternPackDef {
        let json = format!(
            r#"{{
                "language": "en",
                "documentIdentifiers": ["widget notice"],
                "billIndicators": ["owe", "pay"],
                "fields": {json_fields},
                "currencies": [{{"symbol": "W$", "code": "WDG"}}],
                "defaultCurrency": "WDG",
                "weights": {{
                    "keywordMatch": 0.5, "patternMatch": 0.2, "vendorMatch": 0.1,
                    "serviceTypeMatch": 0.1, "fullExtraction": 0.8,
                    "indicatorStep": 0.05, "indicatorCap": 0.1
                }}
            }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_builtin_store_has_every_language() {
        let store = store();
        for language in Language::ALL {
            assert_eq!(store.pack(language).language(), language);
        }
    }

    #[test]
    fn test_unknown_code_resolves_to_default_pack() {
        let store = store();
        assert_eq!(store.pack_for_code("fr").language(), Language::English);
        assert_eq!(store.pack_for_code("hu").language(), Language::Hungarian);
    }

    #[test]
    fn test_synthetic_store_falls_back_to_default() {
        let pack = LanguagePatternPack::compile(synthetic_pack(r#"{}"#)).unwrap();
        let store = PatternStore::from_packs([pack], Language::English).unwrap();
        assert_eq!(store.pack(Language::Hungarian).language(), Language::English);
        assert!(store.matches_document_identifier("Your WIDGET NOTICE", Language::Hungarian));
    }

    #[test]
    fn test_store_requires_default_pack() {
        let pack = LanguagePatternPack::compile(synthetic_pack(r#"{}"#)).unwrap();
        let err = PatternStore::from_packs([pack], Language::Hungarian).unwrap_err();
        assert!(matches!(err, PatternError::MissingDefault(_)));
    }

    #[test]
    fn test_pattern_without_group_is_rejected() {
        let def = synthetic_pack(r#"{"amount": {"patterns": ["total \\d+"]}}"#);
        let err = LanguagePatternPack::compile(def).unwrap_err();
        assert!(matches!(err, PatternError::MissingCaptureGroup { .. }));
    }

    #[test]
    fn test_weight_out_of_range_is_rejected() {
        let mut def = synthetic_pack(r#"{}"#);
        def.weights.keyword_match = 1.5;
        assert!(LanguagePatternPack::compile(def).is_err());
    }

    #[test]
    fn test_matches_document_identifier_case_insensitive() {
        let store = store();
        assert!(store.matches_document_identifier("YOUR INVOICE IS READY", Language::English));
        assert!(store.matches_document_identifier("Elektronikus SZÁMLA", Language::Hungarian));
        assert!(!store.matches_document_identifier("Lunch on Friday?", Language::English));
    }

    #[test]
    fn test_extract_field_first_pattern_wins() {
        let def = synthetic_pack(
            r#"{"amount": {"patterns": ["owe\\s+{currency}{number}", "pay\\s+(\\d+)"]}}"#,
        );
        let pack = LanguagePatternPack::compile(def).unwrap();
        assert_eq!(
            pack.extract_field("pay 5 then owe W$12.50", Field::Amount),
            Some("12.50".to_string())
        );
        assert_eq!(pack.extract_field("pay 5", Field::Amount), Some("5".to_string()));
        assert_eq!(pack.extract_field("nothing", Field::Amount), None);
        assert_eq!(pack.extract_field("pay 5", Field::Vendor), None);
    }

    #[test]
    fn test_parse_amount_strips_pack_currencies() {
        let mut def = synthetic_pack(r#"{}"#);
        def.currencies.push(CurrencyDef {
            symbol: "Gr.".to_string(),
            code: "GRD".to_string(),
        });
        let pack = LanguagePatternPack::compile(def).unwrap();
        assert_eq!(pack.parse_amount("12,50 Gr."), Decimal::new(1250, 2));
        assert_eq!(pack.parse_amount("W$1,234.56"), Decimal::new(123456, 2));
        assert_eq!(pack.parse_amount("Gr."), Decimal::ZERO);
    }

    #[test]
    fn test_extract_field_applies_post_processing() {
        let store = store();
        assert_eq!(
            store.extract_field("Account Number: 1234 5678 90", Field::AccountNumber, Language::English),
            Some("1234567890".to_string())
        );
        assert_eq!(
            store.extract_field("Invoice #inv-2023/77", Field::InvoiceNumber, Language::English),
            Some("INV-2023/77".to_string())
        );
    }

    #[test]
    fn test_hungarian_fields() {
        let store = store();
        let text = "Számla sorszáma: E-2023/4411\nFizetendő összeg: 121.975 Ft\nFizetési határidő: 2023.07.10.";
        assert_eq!(
            store.extract_field(text, Field::Amount, Language::Hungarian),
            Some("121.975".to_string())
        );
        assert_eq!(
            store.extract_field(text, Field::DueDate, Language::Hungarian),
            Some("2023.07.10.".to_string())
        );
        assert_eq!(
            store.extract_field(text, Field::InvoiceNumber, Language::Hungarian),
            Some("E-2023/4411".to_string())
        );
    }

    #[test]
    fn test_detect_service_type() {
        let store = store();
        let found = store
            .detect_service_type("Your March Electric Bill", Language::English)
            .unwrap();
        assert_eq!(found.service_type, "electricity");
        assert_eq!(found.category, "Utilities");
        assert_eq!(store.detect_service_type("Hello there", Language::English), None);
    }

    #[test]
    fn test_currency_symbols_are_word_bounded() {
        let pack = store();
        let pack = pack.pack(Language::Hungarian);
        assert_eq!(pack.detect_currency("Példa Kft. szolgáltató"), None);
        assert_eq!(pack.detect_currency("12 500 Ft"), Some("HUF"));
    }

    #[test]
    fn test_currency_near_span() {
        let pack = store();
        let pack = pack.pack(Language::English);
        let text = "Total: 10.00 EUR and elsewhere $5";
        assert_eq!(pack.currency_near(text, 0, 12), Some("EUR"));
    }

    #[test]
    fn test_vendor_match_is_word_bounded() {
        let store = store();
        let pack = store.pack(Language::English);
        assert_eq!(pack.match_vendor("Your AWS invoice").map(|v| v.name()), Some("Amazon Web Services"));
        assert!(pack.match_vendor("new laws apply").is_none());
    }

    #[test]
    fn test_calculate_confidence_components() {
        let pack = LanguagePatternPack::compile(synthetic_pack(
            r#"{"amount": {"patterns": ["owe\\s+{number}"]}, "vendor": {"patterns": ["from\\s+(\\w+)"]}}"#,
        ))
        .unwrap();

        assert_eq!(pack.calculate_confidence("hello"), 0.0);
        // identifier only
        assert!((pack.calculate_confidence("widget notice") - 0.5).abs() < 1e-6);
        // identifier + two indicators (0.05 each, capped at 0.1) + two fields
        let score = pack.calculate_confidence("widget notice: owe 12, pay from Acme");
        assert!((score - 0.8).abs() < 1e-6, "score = {score}");
    }

    #[test]
    fn test_confidence_is_clamped() {
        let store = store();
        let text = "Electric bill invoice statement. Total amount due: $135.00. \
                    Payment due date: 06/15/2023. Account number: 123 456. PG&E. \
                    Balance, charges, autopay, pay, billing period.";
        for language in Language::ALL {
            let score = store.calculate_confidence(text, language);
            assert!((0.0..=1.0).contains(&score));
        }
        assert!((store.calculate_confidence(text, Language::English) - 1.0).abs() < 1e-6);
    }
}
