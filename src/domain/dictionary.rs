//! User dictionaries: exact term lists turned into a single alternation.

use super::patterns::{FastPattern, Guard};
use super::{entity, Candidate, CandidateSource, Provenance};
use crate::error::{RedactorError, RedactorResult};
use crate::text::CharIndex;
use regex::RegexBuilder;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Maximum number of terms read from one dictionary file.
pub const TERM_LIMIT: usize = 50_000;

const COMPANY_FILE: &str = "custom_companies.txt";
const KEYWORD_FILE: &str = "custom_keywords.txt";

/// Reads one term per line. Blank lines and `#` comments are skipped; a
/// missing file yields no terms.
pub fn load_terms(path: &Path) -> RedactorResult<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RedactorError::io(path, e)),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.starts_with('#'))
        .take(TERM_LIMIT)
        .map(str::to_string)
        .collect())
}

/// Candidate source matching a fixed list of terms, longest first.
#[derive(Debug, Clone)]
pub struct DictionaryDetector {
    name: String,
    pattern: FastPattern,
    term_count: usize,
}

impl DictionaryDetector {
    /// Builds a detector from terms. Returns `None` when there are no terms.
    pub fn from_terms(
        entity_type: &'static str,
        mut terms: Vec<String>,
        score: f64,
        word_boundaries: bool,
    ) -> RedactorResult<Option<Self>> {
        terms.retain(|t| !t.is_empty());
        if terms.is_empty() {
            return Ok(None);
        }
        terms.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        terms.dedup();

        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&alternation)
            .size_limit(64 * (1 << 20))
            .build()
            .map_err(|e| RedactorError::PatternError {
                pattern: format!("dictionary:{}", entity_type),
                reason: e.to_string(),
            })?;

        let mut pattern = FastPattern::from_regex(entity_type, "dictionary", regex, score);
        if word_boundaries {
            pattern = pattern.guarded(Guard::NotWord, Guard::NotWord);
        }

        Ok(Some(Self {
            name: format!("DICT_{}", entity_type),
            pattern,
            term_count: terms.len(),
        }))
    }

    /// Loads `custom_companies.txt` (COMPANY, word-bounded) and
    /// `custom_keywords.txt` (KEYWORD, substring) from `dir`.
    pub fn load_dir(dir: &Path) -> RedactorResult<Vec<Self>> {
        let mut out = Vec::new();

        let companies = load_terms(&dir.join(COMPANY_FILE))?;
        if let Some(d) = Self::from_terms(entity::COMPANY, companies, 0.995, true)? {
            log::info!("Loaded {} company term(s) from {}", d.term_count, dir.display());
            out.push(d);
        }

        let keywords = load_terms(&dir.join(KEYWORD_FILE))?;
        if let Some(d) = Self::from_terms(entity::KEYWORD, keywords, 0.99, false)? {
            log::info!("Loaded {} keyword term(s) from {}", d.term_count, dir.display());
            out.push(d);
        }

        Ok(out)
    }

    pub fn term_count(&self) -> usize {
        self.term_count
    }
}

impl CandidateSource for DictionaryDetector {
    fn produce_candidates(&self, text: &str) -> RedactorResult<Vec<Candidate>> {
        let index = CharIndex::new(text);
        Ok(self
            .pattern
            .find_ranges(text)
            .into_iter()
            .map(|r| {
                Candidate::new(
                    index.char_of(r.start),
                    index.char_of(r.end),
                    self.pattern.entity_type,
                    self.pattern.score,
                )
                .with_provenance(Provenance::Dictionary)
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
