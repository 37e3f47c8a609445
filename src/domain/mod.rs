//! Candidate sources and Japanese domain rules.
//!
//! Any detector (pattern, dictionary, statistical) plugs in through
//! [`CandidateSource`]. Detectors are chosen when the analyzer is built and
//! held as trait objects; nothing downstream knows which one produced a span.

pub mod address;
pub mod date;
pub mod dictionary;
pub mod parties;
pub mod patterns;

pub use address::Gazetteer;
pub use dictionary::DictionaryDetector;
pub use parties::{extract_parties, PartyExtraction};
pub use patterns::PatternDetector;

use crate::config::Policy;
use crate::error::RedactorResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity type names used by the built-in detectors.
pub mod entity {
    pub const EMAIL: &str = "EMAIL";
    pub const PHONE: &str = "PHONE";
    pub const ID: &str = "ID";
    pub const PERSON: &str = "PERSON";
    pub const ADDRESS: &str = "ADDRESS";
    pub const COMPANY: &str = "COMPANY";
    pub const MONEY: &str = "MONEY";
    pub const DATE: &str = "DATE";
    pub const KEYWORD: &str = "KEYWORD";
    pub const PARTIES: &str = "PARTIES";
    pub const CUSTOM: &str = "CUSTOM";
}

/// Where a candidate came from. `Forced` always wins overlap resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Detector,
    Dictionary,
    Forced,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Detector => "detector",
            Self::Dictionary => "dictionary",
            Self::Forced => "forced",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unresolved detection over `[start, end)` character offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub start: usize,
    pub end: usize,
    pub entity_type: String,
    pub score: f64,
    pub provenance: Provenance,
    /// Caller-supplied label (forced masks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Caller-supplied reason (forced masks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_reason: Option<String>,
}

impl Candidate {
    pub fn new(start: usize, end: usize, entity_type: &str, score: f64) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.to_string(),
            score,
            provenance: Provenance::Detector,
            label: None,
            forced_reason: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && self.end > start
    }

    /// Shifts offsets by `offset` characters (window rebasing).
    pub fn rebased(mut self, offset: usize) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

/// A source of typed, scored candidate spans.
///
/// Offsets in the returned candidates are character indices into `text`.
/// An `Err` means the whole input could not be analyzed; callers decide
/// whether to fall back.
pub trait CandidateSource: Send + Sync {
    fn produce_candidates(&self, text: &str) -> RedactorResult<Vec<Candidate>>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Several candidate sources run as one. Output of entities disabled in the
/// policy is dropped.
pub struct DetectorSet {
    sources: Vec<Box<dyn CandidateSource>>,
    disabled: Vec<String>,
}

impl DetectorSet {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            disabled: Vec::new(),
        }
    }

    /// Patterns plus any dictionaries found in the policy's `dict_dir`.
    pub fn from_policy(policy: &Policy) -> RedactorResult<Self> {
        let mut set = Self::new().with_source(Box::new(PatternDetector::new()));
        if let Some(dir) = &policy.dict_dir {
            for detector in DictionaryDetector::load_dir(dir)? {
                set = set.with_source(Box::new(detector));
            }
        }
        Ok(set.with_policy_filter(policy))
    }

    pub fn with_source(mut self, source: Box<dyn CandidateSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_policy_filter(mut self, policy: &Policy) -> Self {
        self.disabled = policy
            .entities
            .iter()
            .filter(|e| !policy.is_enabled(&e.name))
            .map(|e| e.name.clone())
            .collect();
        self
    }
}

impl Default for DetectorSet {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSource for DetectorSet {
    fn produce_candidates(&self, text: &str) -> RedactorResult<Vec<Candidate>> {
        let mut out = Vec::new();
        for source in &self.sources {
            let found = source.produce_candidates(text)?;
            log::debug!("{}: {} candidate(s)", source.name(), found.len());
            out.extend(
                found
                    .into_iter()
                    .filter(|c| !self.disabled.iter().any(|d| *d == c.entity_type)),
            );
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "DetectorSet"
    }
}
