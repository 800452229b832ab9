//! Serde definitions mirroring the `patterns/<code>.json` files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Field;

/// A language pattern pack as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternPackDef {
    /// Language code (`en`, `hu`).
    pub language: String,

    /// Data version, bumped whenever patterns or weights change.
    #[serde(default)]
    pub version: u32,

    /// Phrases that identify a bill-like document.
    pub document_identifiers: Vec<String>,

    /// Generic words that make a document more bill-like.
    #[serde(default)]
    pub bill_indicators: Vec<String>,

    /// Indicator words needed to pass the likelihood gate without an identifier.
    #[serde(default = "default_min_indicator_matches")]
    pub min_indicator_matches: usize,

    /// Words that mark a payable total, nearest first.
    #[serde(default)]
    pub amount_keywords: Vec<String>,

    /// Field extraction patterns, most specific first.
    pub fields: BTreeMap<Field, FieldPatternsDef>,

    /// Service-type taxonomy, matched in declaration order.
    #[serde(default)]
    pub service_types: Vec<ServiceTypeDef>,

    /// Currency symbol table, matched in declaration order.
    #[serde(default)]
    pub currencies: Vec<CurrencyDef>,

    /// Currency used when the document names none.
    pub default_currency: String,

    /// Vendor-specific overrides.
    #[serde(default)]
    pub vendors: Vec<VendorOverrideDef>,

    /// Confidence weights.
    pub weights: ConfidenceWeights,

    /// Day/month order for numeric dates whose year comes last.
    #[serde(default)]
    pub date_order: DateOrder,

    /// Twelve lists of month spellings, January first.
    #[serde(default)]
    pub month_names: Vec<Vec<String>>,
}

fn default_min_indicator_matches() -> usize {
    2
}

/// Patterns for a single field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatternsDef {
    /// Regexes with one capture group each.
    pub patterns: Vec<String>,

    /// Post-processing applied to the captured text.
    #[serde(default)]
    pub post_process: PostProcess,
}

/// Post-processing directive for a captured field value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PostProcess {
    /// Trim surrounding whitespace.
    #[default]
    Trim,
    /// Remove all whitespace.
    StripWhitespace,
    /// Collapse whitespace runs into single spaces.
    CollapseWhitespace,
    /// Trim and uppercase.
    Uppercase,
}

impl PostProcess {
    pub fn apply(&self, value: &str) -> String {
        match self {
            PostProcess::Trim => value.trim().to_string(),
            PostProcess::StripWhitespace => value.chars().filter(|c| !c.is_whitespace()).collect(),
            PostProcess::CollapseWhitespace => value.split_whitespace().collect::<Vec<_>>().join(" "),
            PostProcess::Uppercase => value.trim().to_uppercase(),
        }
    }
}

/// One entry of the service-type taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceTypeDef {
    #[serde(rename = "type")]
    pub service_type: String,
    pub category: String,
    pub identifiers: Vec<String>,
}

/// Currency symbol to ISO code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyDef {
    pub symbol: String,
    pub code: String,
}

/// Vendor-specific override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOverrideDef {
    /// Canonical vendor name, used as the bill's vendor on a match.
    pub name: String,

    /// Other spellings that identify the vendor.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Forced category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Forced currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Patterns for the vendor's highlighted payable-amount box.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlighted_amount_patterns: Vec<String>,
}

/// Additive confidence weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceWeights {
    /// A document identifier phrase occurs.
    pub keyword_match: f32,
    /// Two or more fields extract.
    pub pattern_match: f32,
    /// A vendor override matches.
    pub vendor_match: f32,
    /// A service type resolves.
    pub service_type_match: f32,
    /// Floor when amount, due date and vendor all extract from patterns.
    pub full_extraction: f32,
    /// Added per bill-indicator word.
    pub indicator_step: f32,
    /// Cap on the indicator contribution.
    pub indicator_cap: f32,
}

impl ConfidenceWeights {
    pub(crate) fn all(&self) -> [(&'static str, f32); 7] {
        [
            ("keywordMatch", self.keyword_match),
            ("patternMatch", self.pattern_match),
            ("vendorMatch", self.vendor_match),
            ("serviceTypeMatch", self.service_type_match),
            ("fullExtraction", self.full_extraction),
            ("indicatorStep", self.indicator_step),
            ("indicatorCap", self.indicator_cap),
        ]
    }
}

/// Order of the parts in numeric dates such as `06/07/2023`.
///
/// Dates that start with a four-digit year are always read year-month-day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrder {
    Mdy,
    #[default]
    Dmy,
    Ymd,
}
