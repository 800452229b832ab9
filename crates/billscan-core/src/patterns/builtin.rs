use crate::error::PatternError;
use crate::language::Language;
use crate::patterns::LanguagePatternPack;
use crate::patterns::schema::PatternPackDef;

const EN_JSON: &str = include_str!("../../patterns/en.json");
const HU_JSON: &str = include_str!("../../patterns/hu.json");

/// Raw JSON of the pack shipped for `language`.
pub fn builtin_json(language: Language) -> &'static str {
    match language {
        Language::English => EN_JSON,
        Language::Hungarian => HU_JSON,
    }
}

/// Parse the shipped pack definition for `language`.
pub fn builtin_definition(language: Language) -> Result<PatternPackDef, PatternError> {
    serde_json::from_str(builtin_json(language)).map_err(|e| PatternError::Parse {
        source_name: format!("builtin:{}", language.code()),
        reason: e.to_string(),
    })
}

/// Parse and compile the shipped pack for `language`.
pub fn load_builtin(language: Language) -> Result<LanguagePatternPack, PatternError> {
    LanguagePatternPack::compile(builtin_definition(language)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_packs_compile() {
        for language in Language::ALL {
            let pack = load_builtin(language).unwrap();
            assert_eq!(pack.language(), language);
            assert_eq!(pack.month_names().len(), 12);
        }
    }

    #[test]
    fn test_builtin_definitions_carry_every_field() {
        use crate::patterns::Field;
        for language in Language::ALL {
            let def = builtin_definition(language).unwrap();
            for field in Field::ALL {
                assert!(def.fields.contains_key(&field), "{language} lacks {field}");
            }
        }
    }

    #[test]
    fn test_packs_ship_inside_the_crate() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("patterns");
        for language in Language::ALL {
            let path = dir.join(format!("{}.json", language.code()));
            let on_disk = std::fs::read_to_string(&path).unwrap();
            assert_eq!(on_disk, builtin_json(language), "{}", path.display());
        }
    }

    #[test]
    fn test_default_currencies() {
        assert_eq!(load_builtin(Language::English).unwrap().default_currency(), "USD");
        assert_eq!(load_builtin(Language::Hungarian).unwrap().default_currency(), "HUF");
    }
}
