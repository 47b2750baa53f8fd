// src/extract.rs
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use crate::constants::{MIN_AREA_FUZZY_SCORE, UNKNOWN};
use crate::models::ParsedAddress;
use crate::phonetic::nysiis;

/// Street-type keywords, full forms plus Arabic equivalents.
pub const STREET_KEYWORDS: [&str; 10] = [
    "street", "avenue", "road", "lane", "crescent", "شارع", "جادة", "طريق", "حارة", "هلال",
];

/// Abbreviated street-type keywords that survive normalization when the
/// abbreviation map does not cover them.
pub const STREET_KEYWORD_ABBREVS: [&str; 5] = ["st", "ave", "rd", "ln", "cr"];

/// Tokens that mark a structural component boundary inside an address.
pub const STRUCTURAL_KEYWORDS: [&str; 5] = ["block", "building", "floor", "apartment", "apt"];

/// Score given to an exact phonetic-code area match.
const PHONETIC_MATCH_SCORE: f64 = 0.9;

/// Penalty applied to multi-word area candidates so that a long name does
/// not outrank a short exact one on partial overlap.
const MULTI_WORD_AREA_PENALTY: f64 = 0.1;

/// Minimum word-overlap ratio for an area candidate.
const MIN_AREA_OVERLAP: f64 = 0.5;

static BLOCK_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}[a-zA-Z]?$").unwrap());

/// Block patterns, tried strictly in order; the order is a contract.
static BLOCK_CASCADE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"block\s+(\d{1,3}[a-zA-Z]?)").unwrap(),
        Regex::new(r"blk\s+(\d{1,3}[a-zA-Z]?)").unwrap(),
        Regex::new(r"b\s+(\d{1,3}[a-zA-Z]?)").unwrap(),
        Regex::new(
            r"(\d{1,3}[a-zA-Z]?)\s*(?:street|st|avenue|ave|road|rd|lane|ln|crescent|cr|شارع|جادة|طريق|حارة|هلال)",
        )
        .unwrap(),
    ]
});

/// Street patterns, tried strictly in order: keyword-then-name,
/// abbreviated-keyword-then-name, name-then-keyword. The trailing group
/// consumes the next structural keyword / trailing number / end of string,
/// bounding the lazy capture the same way the boundary tokens bound a
/// spoken address.
static STREET_CASCADE: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(
            r"(?:street|avenue|road|lane|crescent|شارع|جادة|طريق|حارة|هلال)\s+([\w\s\-]+?)\s*(?:block|building\s+\d+|floor|apartment|apt|\d+\s*$|$)",
        )
        .unwrap(),
        Regex::new(
            r"(?:st|ave|rd|ln|cr)\s+([\w\s\-]+?)\s*(?:block|building\s+\d+|floor|apartment|apt|\d+\s*$|$)",
        )
        .unwrap(),
        Regex::new(
            r"([\w\s\-]+?)\s+(?:street|avenue|road|lane|crescent|st|ave|rd|ln|cr|شارع|جادة|طريق|حارة|هلال)\s*(?:block|building\s+\d+|floor|apartment|apt|\d+\s*$|$)",
        )
        .unwrap(),
    ]
});

static STREET_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:street|avenue|road|lane|crescent|شارع|جادة|طريق|حارة|هلال)?\s*[\d\w\s\-]+$",
    )
    .unwrap()
});

static NUMBERED_STREET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:street|avenue|road|lane|crescent|شارع|جادة|طريق|حارة|هلال)?\s*\d+$").unwrap()
});

static NAMED_STREET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:street|avenue|road|lane|crescent|شارع|جادة|طريق|حارة|هلال)?\s*[\w\s\-]+$")
        .unwrap()
});

static BUILDING_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"building\s+(\d+)|(\d+)\s*$").unwrap());
static FLOOR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"floor\s+(\d+)").unwrap());
static APARTMENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:apt|apartment)\s+(\w+)").unwrap());

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// `true` when `block` has the 1-3 digits plus optional letter shape.
pub fn is_valid_block(block: &str) -> bool {
    !block.is_empty() && BLOCK_FORMAT.is_match(block.trim())
}

/// Category of a street value: purely numeric, a named street, or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreetType {
    Numbered,
    Named,
    Unknown,
}

impl StreetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreetType::Numbered => "numbered",
            StreetType::Named => "named",
            StreetType::Unknown => "unknown",
        }
    }
}

/// Token-sort similarity on a 0-100 scale: both sides are tokenized,
/// sorted and rejoined before the edit-distance ratio is taken, so word
/// order does not matter.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let sort = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    strsim::normalized_levenshtein(&sort(a), &sort(b)) * 100.0
}

/// Pulls structured components out of normalized address text. All
/// sub-extractions degrade to `"unknown"`, never fail.
pub struct ComponentExtractor {
    /// Normalized, deduplicated gazetteer area names.
    areas: Vec<String>,
    /// Pre-split words per area, parallel to `areas`.
    area_words: Vec<Vec<String>>,
    /// NYSIIS code -> area, computed once at construction.
    phonetic_areas: HashMap<String, String>,
    /// Normalized form of the capital's center name.
    capital_center: String,
}

impl ComponentExtractor {
    pub fn new(areas: Vec<String>, capital_center: String) -> Self {
        let area_words = areas
            .iter()
            .map(|area| area.split_whitespace().map(str::to_string).collect())
            .collect();
        let mut phonetic_areas = HashMap::new();
        for area in &areas {
            let code = nysiis(area);
            if !code.is_empty() {
                phonetic_areas.insert(code, area.clone());
            }
        }
        Self {
            areas,
            area_words,
            phonetic_areas,
            capital_center,
        }
    }

    pub fn areas(&self) -> &[String] {
        &self.areas
    }

    /// Parse a normalized address into its components. Total: degenerate
    /// input produces the fully-populated default.
    pub fn parse(&self, normalized: &str) -> ParsedAddress {
        let mut result = ParsedAddress::default();
        if normalized.trim().is_empty() {
            return result;
        }

        let area = self.extract_area(normalized);
        if area != UNKNOWN {
            result.area = area;
        }
        let block = self.extract_block(normalized);
        if block != UNKNOWN {
            result.block = block;
        }
        let street = self.extract_street(normalized);
        if street != UNKNOWN {
            result.street = street;
        }

        if let Some(caps) = BUILDING_PATTERN.captures(normalized) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                result.building_number = m.as_str().to_string();
            }
        }
        if let Some(caps) = FLOOR_PATTERN.captures(normalized) {
            result.floor = caps[1].to_string();
        }
        if let Some(caps) = APARTMENT_PATTERN.captures(normalized) {
            result.apartment = caps[1].to_string();
        }

        result
    }

    /// Resolve the area by word overlap, phonetic code, capital special
    /// case, then fuzzy similarity. Returns `"unknown"` or a configured
    /// area name, never an invented value.
    pub fn extract_area(&self, text: &str) -> String {
        let text_words: HashSet<&str> = text.split_whitespace().collect();

        // (candidate index, score, position, word count)
        let mut candidates: Vec<(usize, f64, usize, usize)> = Vec::new();
        for (idx, area) in self.areas.iter().enumerate() {
            let words = &self.area_words[idx];
            if words.is_empty() {
                continue;
            }
            let overlap = words
                .iter()
                .filter(|w| text_words.contains(w.as_str()))
                .count();
            let score = overlap as f64 / words.len() as f64;
            if score < MIN_AREA_OVERLAP {
                continue;
            }
            if let Some(position) = text.find(area.as_str()) {
                let penalty = if words.len() > 1 {
                    MULTI_WORD_AREA_PENALTY
                } else {
                    0.0
                };
                candidates.push((idx, score - penalty, position, words.len()));
            }
        }

        let text_code = nysiis(text);
        if let Some(area) = self.phonetic_areas.get(&text_code) {
            if let Some(idx) = self.areas.iter().position(|a| a == area) {
                candidates.push((idx, PHONETIC_MATCH_SCORE, 0, 1));
            }
        }

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
        });
        if let Some(&(idx, ..)) = candidates.first() {
            return self.areas[idx].clone();
        }

        // Capital special case: the center name matches unless the text
        // names one of its distinct districts.
        if !self.capital_center.is_empty()
            && text.contains(self.capital_center.as_str())
            && !text.contains("sharq")
            && !text.contains("mubarak")
        {
            if let Some(area) = self.areas.iter().find(|a| **a == self.capital_center) {
                return area.clone();
            }
        }

        // Fuzzy last resort.
        let best = self
            .areas
            .iter()
            .map(|area| (area, token_sort_ratio(text, area)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        if let Some((area, score)) = best {
            if score >= MIN_AREA_FUZZY_SCORE {
                debug!("Fuzzy area match '{}' at {:.1}", area, score);
                return area.clone();
            }
        }

        UNKNOWN.to_string()
    }

    /// First pattern in the cascade whose capture validates wins.
    pub fn extract_block(&self, text: &str) -> String {
        for pattern in BLOCK_CASCADE.iter() {
            if let Some(caps) = pattern.captures(text) {
                let candidate = caps[1].trim();
                if is_valid_block(candidate) {
                    return candidate.to_string();
                }
            }
        }
        UNKNOWN.to_string()
    }

    pub fn extract_street(&self, text: &str) -> String {
        for pattern in STREET_CASCADE.iter() {
            if let Some(caps) = pattern.captures(text) {
                let street = caps[1].trim();
                if self.is_acceptable_street(street) {
                    return street.to_string();
                }
            }
        }
        self.extract_street_by_window(text)
    }

    /// Fallback scan: around every street keyword, collect the run of words
    /// after and before it, stopping at structural boundaries, bare
    /// numbers and known area tokens. First validated window wins.
    fn extract_street_by_window(&self, text: &str) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            if !STREET_KEYWORDS.contains(word) && !STREET_KEYWORD_ABBREVS.contains(word) {
                continue;
            }

            let mut after: Vec<&str> = Vec::new();
            for &next in &words[i + 1..] {
                if STRUCTURAL_KEYWORDS.contains(&next)
                    || BARE_NUMBER.is_match(next)
                    || self.areas.iter().any(|a| a == next)
                {
                    break;
                }
                after.push(next);
            }

            let mut before: Vec<&str> = Vec::new();
            for j in (0..i).rev() {
                let prev = words[j];
                // A "block <number>" label ends the backward scan, the
                // number itself included.
                if j >= 1 && words[j - 1] == "block" && is_valid_block(prev) {
                    break;
                }
                if STRUCTURAL_KEYWORDS.contains(&prev) || self.areas.iter().any(|a| a == prev) {
                    break;
                }
                before.insert(0, prev);
            }

            let street = before
                .into_iter()
                .chain(after)
                .collect::<Vec<_>>()
                .join(" ");
            let street = street.trim();
            if !street.is_empty() && self.is_acceptable_street(street) {
                return street.to_string();
            }
        }
        UNKNOWN.to_string()
    }

    /// Street-format validation plus the containment checks: a street value
    /// may not embed a known area name or a structural keyword.
    fn is_acceptable_street(&self, street: &str) -> bool {
        is_valid_street_format(street)
            && !self.areas.iter().any(|area| street.contains(area.as_str()))
            && !STRUCTURAL_KEYWORDS.iter().any(|kw| street.contains(kw))
    }
}

/// Length and token-shape validation for a street candidate.
pub fn is_valid_street_format(street: &str) -> bool {
    !street.is_empty() && street.chars().count() <= 100 && STREET_FORMAT.is_match(street)
}

/// Categorize a street value; feeds both the feature builder and the
/// confidence penalty.
pub fn categorize_street(street: &str) -> StreetType {
    if street.is_empty() || street == UNKNOWN {
        return StreetType::Unknown;
    }
    if NUMBERED_STREET.is_match(street) {
        return StreetType::Numbered;
    }
    if NAMED_STREET.is_match(street) {
        return StreetType::Named;
    }
    StreetType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::tests::test_gazetteer;
    use crate::normalize::TextNormalizer;

    fn extractor() -> ComponentExtractor {
        let gazetteer = test_gazetteer();
        let normalizer = TextNormalizer::new(&gazetteer);
        ComponentExtractor::new(
            gazetteer.normalized_areas(&normalizer),
            normalizer.normalize("kuwait city"),
        )
    }

    #[test]
    fn block_validator_boundaries() {
        assert!(is_valid_block("12"));
        assert!(is_valid_block("7A"));
        assert!(is_valid_block("1"));
        assert!(is_valid_block("999b"));
        assert!(!is_valid_block("1234"));
        assert!(!is_valid_block("A"));
        assert!(!is_valid_block(""));
        assert!(!is_valid_block("12AB"));
    }

    #[test]
    fn block_cascade_priority() {
        let e = extractor();
        // "block" pattern must win over the number-before-keyword pattern.
        assert_eq!(e.extract_block("4 street block 7"), "7");
        assert_eq!(e.extract_block("blk 12a"), "12a");
        assert_eq!(e.extract_block("b 9 street tunis"), "9");
        assert_eq!(e.extract_block("12 street tunis"), "12");
        assert_eq!(e.extract_block("block of flats"), "unknown");
    }

    #[test]
    fn street_keyword_then_name() {
        let e = extractor();
        assert_eq!(e.extract_street("street tunis block 4"), "tunis");
        assert_eq!(e.extract_street("street 1"), "1");
    }

    #[test]
    fn street_name_then_keyword() {
        let e = extractor();
        assert_eq!(e.extract_street("hawalli tunis street block 4"), "tunis");
    }

    #[test]
    fn street_stops_before_trailing_building_number() {
        let e = extractor();
        assert_eq!(e.extract_street("block 4 street beirut 22"), "beirut");
    }

    #[test]
    fn street_window_fallback() {
        let e = extractor();
        // Regex forms reject the capture (area token inside), the window
        // scan stops the forward run at the area token instead.
        assert_eq!(e.extract_street("street beirut hawalli"), "beirut");
    }

    #[test]
    fn street_window_stops_backward_at_block_label() {
        let e = extractor();
        // Regex forms only offer "block 4 tunis", which embeds a structural
        // keyword. The backward scan must stop at the "block 4" label so the
        // block number does not leak into the street name.
        assert_eq!(e.extract_street("block 4 tunis street"), "tunis");
    }

    #[test]
    fn street_rejects_area_and_structural_words() {
        let e = extractor();
        assert_eq!(e.extract_street("street salmiya"), "unknown");
        assert_eq!(e.extract_street("no such thing"), "unknown");
    }

    #[test]
    fn area_word_overlap_and_position() {
        let e = extractor();
        assert_eq!(e.extract_area("salmiya block 1 street 1"), "salmiya");
        assert_eq!(e.extract_area("block 2 hawalli"), "hawalli");
    }

    #[test]
    fn area_multi_word() {
        let e = extractor();
        assert_eq!(
            e.extract_area("mubarak al kabeer block 2 street 34"),
            "mubarak al kabeer"
        );
    }

    #[test]
    fn area_capital_special_case() {
        let e = extractor();
        assert_eq!(e.extract_area("kuwait city block 3"), "kuwait city");
        // A district token overrides the capital center.
        assert_eq!(e.extract_area("sharq kuwait city"), "sharq");
    }

    #[test]
    fn area_fuzzy_fallback() {
        let e = extractor();
        // No overlap, no typo entry, no phonetic collision; the fuzzy
        // scorer still clears the acceptance threshold.
        assert_eq!(e.extract_area("salmia"), "salmiya");
        // Phonetic codes collide for a trailing doubled vowel.
        assert_eq!(e.extract_area("salmiyaa"), "salmiya");
    }

    #[test]
    fn area_resolution_closure() {
        let e = extractor();
        let mut inputs = vec![
            "salmiya block 1 street 1".to_string(),
            "gibberish qwerty".to_string(),
            "mishref".to_string(),
            "".to_string(),
            "123 456".to_string(),
            "mubarak al kabeer street 9".to_string(),
        ];
        for (i, area) in e.areas().iter().enumerate() {
            inputs.push(format!("{} block {}", area, i + 1));
        }
        for input in inputs {
            let area = e.extract_area(&input);
            assert!(
                area == UNKNOWN || e.areas().contains(&area),
                "invented area {:?} for {:?}",
                area,
                input
            );
        }
    }

    #[test]
    fn other_components() {
        let e = extractor();
        let parsed = e.parse("salmiya block 4 street 2 building 14 floor 3 apartment 7b");
        assert_eq!(parsed.building_number, "14");
        assert_eq!(parsed.floor, "3");
        assert_eq!(parsed.apartment, "7b");
    }

    #[test]
    fn trailing_number_is_building() {
        let e = extractor();
        let parsed = e.parse("rawda block 5 street 50 12");
        assert_eq!(parsed.building_number, "12");
    }

    #[test]
    fn degenerate_parse_is_fully_unknown() {
        let e = extractor();
        for input in ["", "   ", "!!!"] {
            let parsed = e.parse(input);
            assert_eq!(parsed.area, "unknown");
            assert_eq!(parsed.block, "unknown");
            assert_eq!(parsed.street, "unknown");
            assert!(parsed.building_number.is_empty());
        }
    }

    #[test]
    fn street_categorization() {
        assert_eq!(categorize_street("street 1"), StreetType::Numbered);
        assert_eq!(categorize_street("2"), StreetType::Numbered);
        assert_eq!(categorize_street("tunis"), StreetType::Named);
        assert_eq!(categorize_street("unknown"), StreetType::Unknown);
        assert_eq!(categorize_street(""), StreetType::Unknown);
    }
}
