//! Canonical text and term normalization.
//!
//! Every offset in the pipeline is a character index into a
//! [`CanonicalText`]. Regex engines report byte offsets, so the conversion
//! lives here and nowhere else.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Immutable flat character stream derived from one document.
#[derive(Clone, PartialEq, Eq)]
pub struct CanonicalText {
    text: String,
    /// Byte offset of every char, plus a trailing `text.len()` sentinel.
    boundaries: Vec<usize>,
}

impl CanonicalText {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { text, boundaries }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `[start, end)` character range, clamped to the text.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let end = end.min(self.len());
        let start = start.min(end);
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        if index >= self.len() {
            return None;
        }
        self.text[self.boundaries[index]..].chars().next()
    }
}

impl fmt::Debug for CanonicalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalText")
            .field("chars", &self.len())
            .finish()
    }
}

impl fmt::Display for CanonicalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Default for CanonicalText {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl From<&str> for CanonicalText {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Byte-to-char conversion for an arbitrary slice, used by detectors that
/// see only a window of the canonical text.
pub(crate) struct CharIndex {
    boundaries: Vec<usize>,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());
        Self { boundaries }
    }

    pub(crate) fn char_of(&self, byte: usize) -> usize {
        match self.boundaries.binary_search(&byte) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }
}

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// NFKC-normalizes a term and collapses whitespace. Used for allowlist
/// comparison and stable-label keys.
pub fn normalize_term(s: &str) -> String {
    static WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Valid whitespace regex"));
    let nfkc: String = s.nfkc().collect();
    WS.replace_all(&nfkc, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_offsets_on_japanese() {
        let t = CanonicalText::new("甲はABC");
        assert_eq!(t.len(), 5);
        assert_eq!(t.slice(1, 3), "はA");
        assert_eq!(t.char_at(0), Some('甲'));
        assert_eq!(t.char_at(5), None);
    }

    #[test]
    fn test_slice_clamps() {
        let t = CanonicalText::new("abc");
        assert_eq!(t.slice(2, 10), "c");
        assert_eq!(t.slice(5, 10), "");
    }

    #[test]
    fn test_normalize_term() {
        assert_eq!(normalize_term("  ＡＢＣ　株式会社 "), "ABC 株式会社");
        assert_eq!(normalize_term("\t"), "");
    }
}
