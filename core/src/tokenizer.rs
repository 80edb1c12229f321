use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::BTreeMap;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref SEPARATOR: Regex = Regex::new(r"[^A-Za-zА-Яа-яЁё0-9']+").expect("valid regex");
}

/// Count lowercase tokens. Anything outside latin/cyrillic letters, digits
/// and the apostrophe separates tokens.
pub fn tokenize(text: &str) -> BTreeMap<String, u32> {
    let normalized = text.nfc().collect::<String>();
    let mut counts = BTreeMap::new();
    for token in SEPARATOR.split(&normalized).filter(|t| !t.is_empty()) {
        *counts.entry(token.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

/// Russian snowball stemmer plus the tokenizer, shared by indexing and querying.
pub struct Analyzer {
    stemmer: Stemmer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer").field("algorithm", &"russian").finish()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self { stemmer: Stemmer::create(Algorithm::Russian) }
    }

    pub fn stem(&self, token: &str) -> String {
        self.stemmer.stem(token).into_owned()
    }

    /// Stemmed term counts. Tokens sharing a stem are summed.
    pub fn terms(&self, text: &str) -> BTreeMap<String, u32> {
        let mut terms = BTreeMap::new();
        for (token, count) in tokenize(text) {
            *terms.entry(self.stem(&token)).or_insert(0) += count;
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tokenize() {
        let t = tokenize("Hello, мир! 123 test's");
        let expected: BTreeMap<String, u32> = [("hello", 1), ("мир", 1), ("123", 1), ("test's", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(t, expected);
    }

    #[test]
    fn inflections_share_a_term() {
        let analyzer = Analyzer::new();
        let terms = analyzer.terms("кот кота коты");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms.get(&analyzer.stem("кот")), Some(&3));
    }
}
