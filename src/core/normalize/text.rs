//! Text canonicalization helpers

/// Trims and collapses internal runs of whitespace to a single space
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-cases each whitespace-separated word
///
/// Only the first character of a word is uppercased; the rest are lowercased.
pub fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical form of an identifying name
pub fn normalize_identity(value: &str) -> String {
    collapse_whitespace(value).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b\n c  "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("mEDICARE  plan"), "Medicare Plan");
        assert_eq!(title_case("o'neil"), "O'neil");
        assert_eq!(title_case("élodie"), "Élodie");
    }

    #[test]
    fn test_normalize_identity_is_case_and_space_insensitive() {
        assert_eq!(
            normalize_identity("Bobby  JACKSON"),
            normalize_identity(" bobby jackson ")
        );
    }
}
