//! Text normalizer for searches.
//!
//! Handles:
//! - Case folding
//! - Diacritic removal (João → joao, Conceição → conceicao)
//! - Whitespace trimming and collapsing

use std::collections::HashMap;
use std::sync::OnceLock;

/// Normalizer for free-text search keys.
pub struct Normalizer {
    /// Accented lowercase letter → ASCII base letter
    diacritics: HashMap<char, char>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with the default Latin table.
    pub fn new() -> Self {
        Self {
            diacritics: Self::default_diacritics(),
        }
    }

    /// Shared default instance.
    pub fn shared() -> &'static Normalizer {
        static SHARED: OnceLock<Normalizer> = OnceLock::new();
        SHARED.get_or_init(Normalizer::new)
    }

    /// Fold text to its search key: lowercase, no diacritics, single spaces.
    pub fn fold(&self, text: &str) -> String {
        let mut folded = String::with_capacity(text.len());
        for word in text.split_whitespace() {
            if !folded.is_empty() {
                folded.push(' ');
            }
            for c in word.chars().flat_map(char::to_lowercase) {
                folded.push(self.diacritics.get(&c).copied().unwrap_or(c));
            }
        }
        folded
    }

    /// Check whether `needle` occurs in `haystack`, ignoring case and diacritics.
    ///
    /// A blank needle matches everything.
    pub fn contains(&self, haystack: &str, needle: &str) -> bool {
        let needle = self.fold(needle);
        needle.is_empty() || self.fold(haystack).contains(&needle)
    }

    /// Add a custom mapping.
    pub fn add_mapping(&mut self, from: char, to: char) {
        for lower in from.to_lowercase() {
            self.diacritics.insert(lower, to);
        }
    }

    /// Default Latin diacritic table (lowercase only; input is lowercased first).
    fn default_diacritics() -> HashMap<char, char> {
        let mut map = HashMap::new();

        for c in ['á', 'à', 'â', 'ã', 'ä', 'å'] {
            map.insert(c, 'a');
        }
        for c in ['é', 'è', 'ê', 'ë'] {
            map.insert(c, 'e');
        }
        for c in ['í', 'ì', 'î', 'ï'] {
            map.insert(c, 'i');
        }
        for c in ['ó', 'ò', 'ô', 'õ', 'ö'] {
            map.insert(c, 'o');
        }
        for c in ['ú', 'ù', 'û', 'ü'] {
            map.insert(c, 'u');
        }
        map.insert('ç', 'c');
        map.insert('ñ', 'n');
        map.insert('ý', 'y');
        map.insert('ÿ', 'y');

        map
    }
}

/// Fold with the shared normalizer.
pub fn fold(text: &str) -> String {
    Normalizer::shared().fold(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_portuguese_names() {
        assert_eq!(fold("João"), "joao");
        assert_eq!(fold("  CONCEIÇÃO  da   Silva "), "conceicao da silva");
        assert_eq!(fold("Antônio Ângelo"), "antonio angelo");
    }

    #[test]
    fn test_contains() {
        let n = Normalizer::new();
        assert!(n.contains("Maria José", "jose"));
        assert!(n.contains("Maria José", ""));
        assert!(!n.contains("Maria", "joão"));
    }

    #[test]
    fn test_custom_mapping() {
        let mut n = Normalizer::new();
        n.add_mapping('Ø', 'o');
        assert_eq!(n.fold("ØRJAN"), "orjan");
    }
}
