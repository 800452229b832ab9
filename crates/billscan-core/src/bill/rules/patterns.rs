//! Language-independent regex patterns.

use lazy_static::lazy_static;
use regex::Regex;

use crate::patterns::{DATE_FRAGMENT, NUMBER_FRAGMENT};

lazy_static! {
    // Amount after a currency sign: "$135.00", "€ 12,50", "US$1,000"
    pub static ref SIGN_AMOUNT: Regex = Regex::new(&format!(
        r"(US\$|CA\$|\$|€|£)\s?{NUMBER_FRAGMENT}"
    )).unwrap();

    // Amount after an ISO code: "USD 40.00", "HUF 12 500"
    pub static ref CODE_AMOUNT: Regex = Regex::new(&format!(
        r"\b(USD|EUR|GBP|HUF|CAD)\s?{NUMBER_FRAGMENT}"
    )).unwrap();

    // Amount before a currency word or sign: "121.975 Ft", "12,50 EUR", "9 €"
    pub static ref AMOUNT_SUFFIX: Regex = Regex::new(&format!(
        r"{NUMBER_FRAGMENT}\s?(Ft\b\.?|HUF\b|forint\b|EUR\b|USD\b|GBP\b|€|euró\b|dollars?\b)"
    )).unwrap();

    // Any date the shared fragment recognizes
    pub static ref ANY_DATE: Regex = Regex::new(DATE_FRAGMENT).unwrap();

    // Mailbox with optional display name: "PG&E Billing" <billing@pge.com>
    pub static ref DISPLAY_NAME: Regex = Regex::new(
        r#"^\s*"?([^"<>]+?)"?\s*<[^>]+>"#
    ).unwrap();

    pub static ref EMAIL_ADDRESS: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})"
    ).unwrap();
}

/// Map a symbol matched by the generic regexes to its ISO code.
pub fn currency_code(symbol: &str) -> Option<&'static str> {
    let symbol = symbol.trim_end_matches('.');
    let code = match symbol.to_lowercase().as_str() {
        "us$" | "$" | "usd" | "dollar" | "dollars" => "USD",
        "ca$" | "cad" => "CAD",
        "€" | "eur" | "euró" => "EUR",
        "£" | "gbp" => "GBP",
        "ft" | "huf" | "forint" => "HUF",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_amount() {
        let caps = SIGN_AMOUNT.captures("Total: $1,234.56 due").unwrap();
        assert_eq!(&caps[1], "$");
        assert_eq!(&caps[2], "1,234.56");
    }

    #[test]
    fn test_amount_suffix() {
        let caps = AMOUNT_SUFFIX.captures("Összesen 121.975 Ft").unwrap();
        assert_eq!(&caps[1], "121.975");
        assert_eq!(currency_code(&caps[2]), Some("HUF"));
        assert!(AMOUNT_SUFFIX.captures("12 Kft").is_none());
    }

    #[test]
    fn test_display_name() {
        let caps = DISPLAY_NAME.captures(r#""PG&E Billing" <billing@pge.com>"#).unwrap();
        assert_eq!(&caps[1], "PG&E Billing");
        assert!(DISPLAY_NAME.captures("billing@pge.com").is_none());
    }

    #[test]
    fn test_currency_code() {
        assert_eq!(currency_code("Ft."), Some("HUF"));
        assert_eq!(currency_code("US$"), Some("USD"));
        assert_eq!(currency_code("¥"), None);
    }
}
