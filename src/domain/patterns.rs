//! Regex candidate source for Japanese legal text.
//!
//! This is the high-throughput detector used for very large documents and as
//! the fallback when a richer detector fails on a window. Look-around
//! assertions are expressed as a capture group (the reported span) plus
//! character guards checked on either side of it.

use super::{entity, Candidate, CandidateSource, Provenance};
use crate::error::RedactorResult;
use crate::text::CharIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Condition on the character adjacent to a match. Start and end of text
/// always pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Any,
    NotDigit,
    NotAsciiAlnum,
    /// Not a Unicode word character (letters, digits, kanji, kana, `_`).
    NotWord,
    /// Not a word character, `-` or `.`.
    NotEmailChar,
}

impl Guard {
    fn allows(self, c: Option<char>) -> bool {
        let Some(c) = c else { return true };
        match self {
            Self::Any => true,
            Self::NotDigit => !c.is_numeric(),
            Self::NotAsciiAlnum => !c.is_ascii_alphanumeric(),
            Self::NotWord => !is_word_char(c),
            Self::NotEmailChar => !(is_word_char(c) || c == '-' || c == '.'),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// One named pattern producing candidates of a single entity type.
#[derive(Debug, Clone)]
pub struct FastPattern {
    pub entity_type: &'static str,
    pub name: &'static str,
    pub score: f64,
    regex: Regex,
    /// Capture group holding the reported span (0 = whole match).
    group: usize,
    before: Guard,
    after: Guard,
}

impl FastPattern {
    fn new(entity_type: &'static str, name: &'static str, pattern: &str, score: f64) -> Self {
        Self::from_regex(
            entity_type,
            name,
            Regex::new(pattern).expect("Valid built-in pattern"),
            score,
        )
    }

    pub(crate) fn from_regex(
        entity_type: &'static str,
        name: &'static str,
        regex: Regex,
        score: f64,
    ) -> Self {
        Self {
            entity_type,
            name,
            score,
            regex,
            group: 0,
            before: Guard::Any,
            after: Guard::Any,
        }
    }

    fn group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }

    pub(crate) fn guarded(mut self, before: Guard, after: Guard) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Byte ranges of every accepted match, left to right.
    pub fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        let mut pos = 0;

        while pos <= text.len() {
            let Some(caps) = self.regex.captures_at(text, pos) else {
                break;
            };
            let Some(whole) = caps.get(0) else { break };
            let span = caps.get(self.group).unwrap_or(whole);

            let before = text[..span.start()].chars().next_back();
            let after = text[span.end()..].chars().next();

            if !span.is_empty() && self.before.allows(before) && self.after.allows(after) {
                out.push(span.range());
                pos = if span.end() > whole.start() {
                    span.end()
                } else {
                    next_char_boundary(text, whole.start())
                };
            } else {
                pos = next_char_boundary(text, whole.start());
            }
        }
        out
    }
}

fn next_char_boundary(text: &str, byte: usize) -> usize {
    text[byte..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| byte + c.len_utf8())
}

/// The built-in pattern set.
pub fn default_patterns() -> &'static [FastPattern] {
    static PATTERNS: Lazy<Vec<FastPattern>> = Lazy::new(|| {
        use Guard::*;
        vec![
            FastPattern::new(
                entity::EMAIL,
                "email_regex",
                r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
                0.99,
            )
            .guarded(NotEmailChar, NotEmailChar),
            FastPattern::new(
                entity::PHONE,
                "phone_regex",
                r"0\d{1,4}[-\x{30FC}]?\d{1,4}[-\x{30FC}]?\d{3,4}",
                0.85,
            )
            .guarded(NotDigit, NotDigit),
            FastPattern::new(entity::ID, "jp_postal", r"\d{3}[-\x{30FC}]?\d{4}", 0.95)
                .guarded(NotDigit, NotDigit),
            FastPattern::new(entity::ID, "compact_id", r"[A-Z]{1,3}\d{2,6}", 0.80)
                .guarded(NotAsciiAlnum, NotAsciiAlnum),
            FastPattern::new(
                entity::ID,
                "hyphenated_id",
                r"[A-Z]{2,10}-\d{2,4}(?:-[A-Z0-9]{1,6}){1,6}",
                0.85,
            )
            .guarded(NotAsciiAlnum, NotAsciiAlnum),
            FastPattern::new(
                entity::PERSON,
                "jp_name_line_with_space",
                r"(?m)^[\t \x{3000}]*[一-龥]{1,4}[\t \x{3000}]+[一-龥]{1,4}[\t \x{3000}]*$",
                0.86,
            ),
            FastPattern::new(
                entity::PERSON,
                "tanto_single_surname",
                r"担当[:：]([一-龥]{2,4})",
                0.82,
            )
            .group(1),
            FastPattern::new(
                entity::PERSON,
                "tanto_single_surname_paren",
                r"\(担当[:：]([一-龥]{2,4})\)",
                0.80,
            )
            .group(1),
            FastPattern::new(
                entity::PERSON,
                "tanto_single_surname_fwparen",
                r"（担当[:：]([一-龥]{2,4})）",
                0.80,
            )
            .group(1),
            FastPattern::new(entity::ID, "age_after_colon", r"年齢[:：](\d{1,3})", 0.75).group(1),
            FastPattern::new(
                entity::ID,
                "age_standalone_line_before_gender",
                r"\n(\d{1,3})\n(?:男|女)\n",
                0.78,
            )
            .group(1),
            FastPattern::new(
                entity::MONEY,
                "money_amount",
                r"(?:[¥￥]\s*(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)|(?:(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s*(?:円|万円|千円|百万円))",
                0.85,
            ),
            FastPattern::new(
                entity::DATE,
                "ymd",
                r"\d{4}[/.\-年]\s*\d{1,2}[/.\-月]\s*\d{1,2}\s*(?:日)?",
                0.80,
            ),
            FastPattern::new(
                entity::DATE,
                "wareki",
                r"(?:令和|平成|昭和|R|H|S)\s*(?:\d{1,2}|元)\s*年",
                0.75,
            ),
            FastPattern::new(
                entity::ADDRESS,
                "addr_hint",
                r"..??[都道府県].{1,30}?[市区町村].{0,40}",
                0.55,
            ),
            FastPattern::new(
                entity::COMPANY,
                "kabushiki_1",
                r"(?:株式会社|有限会社|合同会社)\s*\S{1,30}",
                0.70,
            ),
            FastPattern::new(
                entity::COMPANY,
                "kabushiki_2",
                r"\S{1,30}\s*(?:株式会社|有限会社|合同会社)",
                0.70,
            ),
            FastPattern::new(entity::COMPANY, "abbr", r"(?:（株）|\(株\))\s*\S{1,30}", 0.65),
            FastPattern::new(entity::PARTIES, "parties", r"甲|乙|丙|丁", 0.99)
                .guarded(NotWord, NotWord),
        ]
    });
    &PATTERNS
}

/// Candidate source backed by a list of [`FastPattern`]s.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    patterns: Vec<FastPattern>,
}

impl PatternDetector {
    /// Detector with the built-in Japanese pattern set.
    pub fn new() -> Self {
        Self {
            patterns: default_patterns().to_vec(),
        }
    }

    /// Detector restricted to the given entity types.
    pub fn only(entities: &[&str]) -> Self {
        Self {
            patterns: default_patterns()
                .iter()
                .filter(|p| entities.contains(&p.entity_type))
                .cloned()
                .collect(),
        }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSource for PatternDetector {
    fn produce_candidates(&self, text: &str) -> RedactorResult<Vec<Candidate>> {
        let index = CharIndex::new(text);
        let mut out: Vec<Candidate> = self
            .patterns
            .iter()
            .flat_map(|p| {
                let index = &index;
                p.find_ranges(text).into_iter().map(move |r| {
                    Candidate::new(index.char_of(r.start), index.char_of(r.end), p.entity_type, p.score)
                        .with_provenance(Provenance::Detector)
                })
            })
            .collect();

        out.sort_by(|a, b| a.start.cmp(&b.start).then(b.len().cmp(&a.len())));
        Ok(out)
    }

    fn name(&self) -> &str {
        "PatternDetector"
    }
}
