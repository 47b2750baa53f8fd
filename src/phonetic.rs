// src/phonetic.rs
//
// NYSIIS phonetic coding. Collapses a Latin-script name to its consonant
// skeleton so that spelling variants of the same spoken area name ("salmiya",
// "salmiyah") produce identical codes.

fn is_vowel(c: char) -> bool {
    matches!(c, 'A' | 'E' | 'I' | 'O' | 'U')
}

/// Compute the NYSIIS code of `input`. Non-ASCII-alphabetic characters are
/// ignored; an input without letters yields an empty code.
pub fn nysiis(input: &str) -> String {
    let mut s: Vec<char> = input
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if s.is_empty() {
        return String::new();
    }

    // Prefix transformations.
    if s.len() >= 3 && s[..3] == ['M', 'A', 'C'] {
        s.splice(..3, ['M', 'C', 'C']);
    } else if s.len() >= 2 && s[..2] == ['K', 'N'] {
        s.splice(..2, ['N', 'N']);
    } else if s[0] == 'K' {
        s[0] = 'C';
    } else if s.len() >= 2 && (s[..2] == ['P', 'H'] || s[..2] == ['P', 'F']) {
        s.splice(..2, ['F', 'F']);
    } else if s.len() >= 3 && s[..3] == ['S', 'C', 'H'] {
        s.splice(..3, ['S', 'S', 'S']);
    }

    // Suffix transformations.
    let n = s.len();
    if n >= 2 {
        match (s[n - 2], s[n - 1]) {
            ('E', 'E') | ('I', 'E') => {
                s.truncate(n - 2);
                s.push('Y');
            }
            ('D', 'T') | ('R', 'T') | ('R', 'D') | ('N', 'T') | ('N', 'D') => {
                s.truncate(n - 2);
                s.push('D');
            }
            _ => {}
        }
    }

    let mut key: Vec<char> = vec![s[0]];
    let mut i = 1;
    while i < s.len() {
        let (replacement, advance): (&[char], usize) = if s[i..].starts_with(&['E', 'V']) {
            (&['A', 'F'], 2)
        } else if is_vowel(s[i]) {
            (&['A'], 1)
        } else if s[i..].starts_with(&['S', 'C', 'H']) {
            (&['S', 'S', 'S'], 3)
        } else if s[i..].starts_with(&['P', 'H']) {
            (&['F', 'F'], 2)
        } else if s[i] == 'Q' {
            (&['G'], 1)
        } else if s[i] == 'Z' {
            (&['S'], 1)
        } else if s[i] == 'M' {
            (&['N'], 1)
        } else if s[i] == 'K' {
            if s.get(i + 1) == Some(&'N') {
                (&['N'], 1)
            } else {
                (&['C'], 1)
            }
        } else if s[i] == 'H' {
            let prev = s[i - 1];
            let next_is_vowel = s.get(i + 1).copied().map(is_vowel).unwrap_or(false);
            if !is_vowel(prev) || !next_is_vowel {
                // H between non-vowels takes the previous character.
                match key.last() {
                    Some(&last) => {
                        i += 1;
                        if last != prev {
                            key.push(prev);
                        }
                        continue;
                    }
                    None => (&['H'], 1),
                }
            } else {
                (&['H'], 1)
            }
        } else if s[i] == 'W' && is_vowel(s[i - 1]) {
            let prev = s[i - 1];
            i += 1;
            if key.last() != Some(&prev) {
                key.push(prev);
            }
            continue;
        } else {
            // Any other consonant passes through; borrow from the slice so
            // all arms share a type.
            (std::slice::from_ref(&s[i]), 1)
        };

        for &c in replacement {
            if key.last() != Some(&c) {
                key.push(c);
            }
        }
        i += advance;
    }

    // Final trims: trailing S, AY -> Y, trailing A.
    if key.len() > 1 && key.last() == Some(&'S') {
        key.pop();
    }
    if key.len() >= 2 && key[key.len() - 2] == 'A' && key[key.len() - 1] == 'Y' {
        key.truncate(key.len() - 2);
        key.push('Y');
    }
    if key.len() > 1 && key.last() == Some(&'A') {
        key.pop();
    }

    key.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spelling_variants_collide() {
        assert_eq!(nysiis("salmiya"), nysiis("salmiyah"));
        assert_eq!(nysiis("rumaithiya"), nysiis("rumaithiyah"));
        assert_eq!(nysiis("dasma"), nysiis("dasmah"));
    }

    #[test]
    fn distinct_names_diverge() {
        assert_ne!(nysiis("salmiya"), nysiis("hawalli"));
        assert_ne!(nysiis("mishref"), nysiis("dasma"));
    }

    #[test]
    fn classic_prefix_rules() {
        assert!(nysiis("knight").starts_with('N'));
        assert!(nysiis("kuwait").starts_with('C'));
        assert!(nysiis("phillip").starts_with('F'));
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(nysiis(""), "");
        assert_eq!(nysiis("123 !؟"), "");
        assert_eq!(nysiis("a"), "A");
    }
}
