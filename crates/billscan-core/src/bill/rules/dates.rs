//! Date parsing with per-language part order and month names.

use chrono::{Datelike, NaiveDate};

use super::patterns::ANY_DATE;
use super::{ExtractionMatch, FieldExtractor};
use crate::patterns::{DateOrder, LanguagePatternPack};

/// Parses the date strings captured by pack patterns.
#[derive(Debug, Clone, Copy)]
pub struct DateParser<'a> {
    order: DateOrder,
    months: &'a [Vec<String>],
}

impl<'a> DateParser<'a> {
    pub fn new(order: DateOrder, months: &'a [Vec<String>]) -> Self {
        Self { order, months }
    }

    pub fn for_pack(pack: &'a LanguagePatternPack) -> Self {
        Self::new(pack.date_order(), pack.month_names())
    }

    /// Parse `06/15/2023`, `2023.06.15.`, `2023. június 15.`, `June 15th, 2023`, ...
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let mut numbers: Vec<&str> = Vec::new();
        let mut month_from_name: Option<u32> = None;

        for token in raw.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let digits_end = token
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map(|(i, _)| i)
                .unwrap_or(token.len());

            if digits_end > 0 {
                // "15th" -> "15"
                numbers.push(&token[..digits_end]);
            } else if month_from_name.is_none() {
                month_from_name = self.month_number(token);
            }
        }

        match month_from_name {
            Some(month) => self.parse_named(&numbers, month),
            None => self.parse_numeric(&numbers),
        }
    }

    fn parse_named(&self, numbers: &[&str], month: u32) -> Option<NaiveDate> {
        let [first, second] = numbers else {
            return None;
        };
        let (year, day) = if first.len() == 4 {
            (first, second)
        } else {
            (second, first)
        };
        NaiveDate::from_ymd_opt(parse_year(year)?, month, day.parse().ok()?)
    }

    fn parse_numeric(&self, numbers: &[&str]) -> Option<NaiveDate> {
        let [a, b, c] = numbers else {
            return None;
        };

        let (year, mut month, mut day) = if a.len() == 4 {
            (parse_year(a)?, b.parse::<u32>().ok()?, c.parse::<u32>().ok()?)
        } else {
            match self.order {
                DateOrder::Mdy => (parse_year(c)?, a.parse().ok()?, b.parse().ok()?),
                DateOrder::Dmy => (parse_year(c)?, b.parse().ok()?, a.parse().ok()?),
                DateOrder::Ymd => (parse_year(a)?, b.parse().ok()?, c.parse().ok()?),
            }
        };

        if month > 12 && day <= 12 {
            std::mem::swap(&mut month, &mut day);
        }

        NaiveDate::from_ymd_opt(year, month, day)
    }

    fn month_number(&self, token: &str) -> Option<u32> {
        let token = token.to_lowercase();
        if token.chars().count() < 3 {
            return None;
        }
        self.months
            .iter()
            .position(|spellings| {
                spellings
                    .iter()
                    .any(|s| token == *s || (token.starts_with(s.as_str()) && s.chars().count() >= 3))
            })
            .map(|idx| idx as u32 + 1)
    }
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    if s.len() <= 2 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 {
            Some(2000 + year)
        } else {
            Some(1900 + year)
        }
    } else if s.len() == 4 {
        Some(year)
    } else {
        None
    }
}

/// Finds every parseable date in a text.
pub struct DateExtractor<'a> {
    parser: DateParser<'a>,
}

impl<'a> DateExtractor<'a> {
    pub fn new(parser: DateParser<'a>) -> Self {
        Self { parser }
    }
}

impl FieldExtractor for DateExtractor<'_> {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        ANY_DATE
            .find_iter(text)
            .filter_map(|m| {
                let date = self.parser.parse(m.as_str())?;
                // Reject implausible years picked up from reference numbers.
                if !(1990..=2100).contains(&date.year()) {
                    return None;
                }
                Some(ExtractionMatch::new(date, 0.6, m.as_str()).with_position(m.start(), m.end()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternStore;
    use crate::language::Language;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_numeric_dates_follow_pack_order() {
        let store = PatternStore::builtin().unwrap();
        let en = DateParser::for_pack(store.pack(Language::English));
        let hu = DateParser::for_pack(store.pack(Language::Hungarian));

        assert_eq!(en.parse("06/07/2023"), Some(ymd(2023, 6, 7)));
        assert_eq!(hu.parse("06.07.2023"), Some(ymd(2023, 7, 6)));
        assert_eq!(en.parse("06/15/2023"), Some(ymd(2023, 6, 15)));
    }

    #[test]
    fn test_year_first_dates() {
        let store = PatternStore::builtin().unwrap();
        let hu = DateParser::for_pack(store.pack(Language::Hungarian));
        assert_eq!(hu.parse("2023.07.10."), Some(ymd(2023, 7, 10)));
        assert_eq!(hu.parse("2023-07-10"), Some(ymd(2023, 7, 10)));
    }

    #[test]
    fn test_swapped_day_and_month() {
        let store = PatternStore::builtin().unwrap();
        let en = DateParser::for_pack(store.pack(Language::English));
        assert_eq!(en.parse("15/06/2023"), Some(ymd(2023, 6, 15)));
    }

    #[test]
    fn test_month_names() {
        let store = PatternStore::builtin().unwrap();
        let en = DateParser::for_pack(store.pack(Language::English));
        let hu = DateParser::for_pack(store.pack(Language::Hungarian));

        assert_eq!(en.parse("June 15th, 2023"), Some(ymd(2023, 6, 15)));
        assert_eq!(en.parse("15 Sept 2023"), Some(ymd(2023, 9, 15)));
        assert_eq!(hu.parse("2023. június 15."), Some(ymd(2023, 6, 15)));
        assert_eq!(hu.parse("2023. márc. 5."), Some(ymd(2023, 3, 5)));
    }

    #[test]
    fn test_two_digit_year() {
        let store = PatternStore::builtin().unwrap();
        let hu = DateParser::for_pack(store.pack(Language::Hungarian));
        assert_eq!(hu.parse("15.01.24"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_invalid_dates() {
        let store = PatternStore::builtin().unwrap();
        let en = DateParser::for_pack(store.pack(Language::English));
        assert_eq!(en.parse("13/13/2023"), None);
        assert_eq!(en.parse("Smarch 5, 2023"), None);
        assert_eq!(en.parse("12/2023"), None);
    }

    #[test]
    fn test_extract_all_dates() {
        let store = PatternStore::builtin().unwrap();
        let extractor = DateExtractor::new(DateParser::for_pack(store.pack(Language::English)));
        let found = extractor.extract_all("Issued 05/01/2023, ref 12/12/1700, due June 1, 2023");
        let dates: Vec<_> = found.into_iter().map(|m| m.value).collect();
        assert_eq!(dates, vec![ymd(2023, 5, 1), ymd(2023, 6, 1)]);
    }
}
