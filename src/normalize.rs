// src/normalize.rs
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::gazetteer::Gazetteer;

/// Arabic-Indic digits and their ASCII replacements.
const ARABIC_DIGITS: [(char, char); 10] = [
    ('٠', '0'),
    ('١', '1'),
    ('٢', '2'),
    ('٣', '3'),
    ('٤', '4'),
    ('٥', '5'),
    ('٦', '6'),
    ('٧', '7'),
    ('٨', '8'),
    ('٩', '9'),
];

/// Hamza/alef variants folded to a single canonical form.
const ARABIC_LETTER_FOLDS: [(char, char); 8] = [
    ('إ', 'ا'),
    ('أ', 'ا'),
    ('آ', 'ا'),
    ('ا', 'ا'),
    ('ى', 'ي'),
    ('ئ', 'ء'),
    ('ء', 'ء'),
    ('ؤ', 'ء'),
];

/// Everything outside word characters, whitespace, digits and the Arabic
/// letter range becomes a space.
static NON_ADDRESS_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\d\x{0600}-\x{06FF}]").unwrap());

/// Canonicalizes raw address text: script/digit transliteration, typo
/// correction, punctuation stripping, lowercasing, abbreviation expansion.
///
/// `normalize` is total and idempotent; degenerate input yields an empty
/// string.
pub struct TextNormalizer {
    /// Whole-word typo substitutions, compiled longest-key-first so that
    /// e.g. "salmiyah" wins over a shorter overlapping misspelling.
    typo_patterns: Vec<(Regex, String)>,
    abbreviation_map: HashMap<String, String>,
}

impl TextNormalizer {
    pub fn new(gazetteer: &Gazetteer) -> Self {
        let mut typos: Vec<(&String, &String)> = gazetteer.common_typos.iter().collect();
        typos.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let typo_patterns = typos
            .into_iter()
            .filter_map(|(typo, correct)| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(typo));
                // Escaped literals always compile; skip defensively anyway.
                Regex::new(&pattern).ok().map(|re| (re, correct.clone()))
            })
            .collect();

        Self {
            typo_patterns,
            abbreviation_map: gazetteer.abbreviation_map.clone(),
        }
    }

    pub fn normalize(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }

        // (a) Arabic-Indic digits, (b) letter-variant folding.
        let mut text: String = text
            .trim()
            .chars()
            .map(|c| {
                if let Some(&(_, ascii)) = ARABIC_DIGITS.iter().find(|(arabic, _)| *arabic == c) {
                    ascii
                } else if let Some(&(_, folded)) =
                    ARABIC_LETTER_FOLDS.iter().find(|(variant, _)| *variant == c)
                {
                    folded
                } else {
                    c
                }
            })
            .collect();

        // (c) Whole-word typo corrections, longest match first.
        for (pattern, correct) in &self.typo_patterns {
            text = pattern.replace_all(&text, correct.as_str()).into_owned();
        }

        // (d) Strip punctuation, (e) lowercase.
        let text = NON_ADDRESS_CHARS.replace_all(&text, " ").to_lowercase();

        // (f) Expand abbreviations token by token.
        text.split_whitespace()
            .map(|word| {
                self.abbreviation_map
                    .get(word)
                    .map(String::as_str)
                    .unwrap_or(word)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::tests::test_gazetteer;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new(&test_gazetteer())
    }

    #[test]
    fn normalizes_mixed_script_address() {
        let n = normalizer();
        assert_eq!(
            n.normalize("Salmiya, Blk ٤, St 2"),
            "salmiya block 4 street 2"
        );
    }

    #[test]
    fn folds_arabic_letter_variants() {
        let n = normalizer();
        assert_eq!(n.normalize("شارع أحمد"), "شارع احمد");
    }

    #[test]
    fn corrects_typos_as_whole_words() {
        let n = normalizer();
        assert_eq!(n.normalize("Salmya block 2"), "salmiya block 2");
        // Not a whole word, must pass through untouched.
        assert_eq!(n.normalize("dsalmyad"), "dsalmyad");
    }

    #[test]
    fn idempotent() {
        let n = normalizer();
        for raw in [
            "Salmiya, Block 1, Street 1",
            "  Hawally -- blk 4 / tunis st.  ",
            "شارع تونس، حولي، قطعة ٤",
            "",
            "!!! ... ///",
            "12345",
        ] {
            let once = n.normalize(raw);
            assert_eq!(n.normalize(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn degenerate_input_yields_empty() {
        let n = normalizer();
        assert_eq!(n.normalize(""), "");
        assert_eq!(n.normalize("   "), "");
        assert_eq!(n.normalize(",.;:!?"), "");
    }
}
