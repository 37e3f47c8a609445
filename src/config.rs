//! Redaction policy and per-run overrides.
//!
//! The policy is plain data. It is normally loaded from YAML by the caller,
//! but every field has a default so a partial document (or none at all) is
//! valid:
//!
//! ```yaml
//! output:
//!   mode: "BLACK"
//!   black_min_len: 4
//! entities:
//!   - name: "PHONE"
//!     priority: 100
//! ```

use crate::error::{RedactorError, RedactorResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// How masked spans are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputMode {
    /// Pseudonymous labels and granular renderings.
    #[default]
    Label,
    /// Filler characters.
    Black,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressGranularity {
    UntilPref,
    #[default]
    UntilCity,
    FullMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateGranularity {
    #[default]
    Year,
    #[serde(rename = "YM")]
    YearMonth,
    FullMask,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Allowlist {
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalPolicy {
    pub allowlist: Allowlist,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPolicy {
    pub mode: OutputMode,
    pub black_min_len: usize,
    /// Entity type → label template (`{n}` / `{n:02d}` placeholders).
    pub label_format: BTreeMap<String, String>,
}

impl Default for OutputPolicy {
    fn default() -> Self {
        let label_format = [
            ("PERSON", "[PERSON_{n:02d}]"),
            ("COMPANY", "[COMPANY_{n:02d}]"),
            ("ADDRESS", "[ADDRESS]"),
            ("EMAIL", "[EMAIL]"),
            ("PHONE", "[PHONE]"),
            ("MONEY", "[MONEY]"),
            ("DATE", "[DATE]"),
            ("ID", "[ID]"),
            ("PARTIES", ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            mode: OutputMode::Label,
            black_min_len: 3,
            label_format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewPolicy {
    pub threshold: f64,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self { threshold: 0.80 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AddressPolicy {
    pub granularity: AddressGranularity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatePolicy {
    pub granularity: DateGranularity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfPolicy {
    pub japanese_ratio_threshold: f64,
    /// Cap on rectangles per hit, for both coordinate and search location.
    pub max_rects_per_term: usize,
    /// Minimum trimmed length of a term before text search is attempted.
    pub min_term_length: usize,
    /// Vertical tolerance (points) for merging glyphs onto one line.
    pub line_tolerance: f32,
    /// Padding (points) added around each redaction rectangle.
    pub padding: f32,
}

impl Default for PdfPolicy {
    fn default() -> Self {
        Self {
            japanese_ratio_threshold: 0.20,
            max_rects_per_term: 50,
            min_term_length: 2,
            line_tolerance: 2.0,
            padding: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityPolicy {
    pub name: String,
    pub enabled: bool,
    pub tier: u8,
    pub priority: i32,
}

impl Default for EntityPolicy {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            tier: 1,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformancePolicy {
    pub force_fast: bool,
    pub fast_threshold_chars: usize,
    pub nlp_chunk_size: usize,
    pub nlp_chunk_overlap: usize,
}

impl Default for PerformancePolicy {
    fn default() -> Self {
        Self {
            force_fast: false,
            fast_threshold_chars: 400_000,
            nlp_chunk_size: 15_000,
            nlp_chunk_overlap: 300,
        }
    }
}

/// Bounds for the two fixed-window heuristics of the labeler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsPolicy {
    /// Max characters a designator-only company span may grow by.
    pub company_expand_max: usize,
    /// Characters searched on each side of a money span for context words.
    pub money_context_window: usize,
}

impl Default for HeuristicsPolicy {
    fn default() -> Self {
        Self {
            company_expand_max: 80,
            money_context_window: 12,
        }
    }
}

/// Complete redaction policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub version: u32,
    pub global: GlobalPolicy,
    pub output: OutputPolicy,
    pub review: ReviewPolicy,
    pub address: AddressPolicy,
    pub date: DatePolicy,
    pub pdf: PdfPolicy,
    pub entities: Vec<EntityPolicy>,
    pub performance: PerformancePolicy,
    pub heuristics: HeuristicsPolicy,
    /// Directory holding dictionaries and gazetteers.
    pub dict_dir: Option<PathBuf>,
}

impl Default for Policy {
    fn default() -> Self {
        let entities = [
            ("EMAIL", 1, 100),
            ("PHONE", 1, 100),
            ("ID", 1, 100),
            ("PERSON", 1, 90),
            ("ADDRESS", 1, 90),
            ("COMPANY", 2, 80),
            ("MONEY", 2, 70),
            ("DATE", 2, 70),
            ("KEYWORD", 3, 60),
            ("PARTIES", 0, 10),
        ]
        .into_iter()
        .map(|(name, tier, priority)| EntityPolicy {
            name: name.to_string(),
            enabled: true,
            tier,
            priority,
        })
        .collect();

        Self {
            version: 1,
            global: GlobalPolicy {
                allowlist: Allowlist {
                    terms: ["甲", "乙", "丙", "丁"].iter().map(|s| s.to_string()).collect(),
                },
            },
            output: OutputPolicy::default(),
            review: ReviewPolicy::default(),
            address: AddressPolicy::default(),
            date: DatePolicy::default(),
            pdf: PdfPolicy::default(),
            entities,
            performance: PerformancePolicy::default(),
            heuristics: HeuristicsPolicy::default(),
            dict_dir: None,
        }
    }
}

impl Policy {
    pub fn from_yaml_str(yaml: &str) -> RedactorResult<Self> {
        let mut policy: Policy = serde_yaml::from_str(yaml)?;
        policy.fill_defaults();
        policy.validate()?;
        Ok(policy)
    }

    /// Entity types a YAML `entities` list or `label_format` map leaves out
    /// keep their built-in entry.
    fn fill_defaults(&mut self) {
        let defaults = Policy::default();
        for default in defaults.entities {
            if !self.entities.iter().any(|e| e.name == default.name) {
                self.entities.push(default);
            }
        }
        for (entity, template) in defaults.output.label_format {
            self.output.label_format.entry(entity).or_insert(template);
        }
    }

    pub fn load(path: &Path) -> RedactorResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| RedactorError::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> RedactorResult<()> {
        let perf = &self.performance;
        if perf.nlp_chunk_size == 0 {
            return Err(RedactorError::Config {
                reason: "performance.nlp_chunk_size must be positive".to_string(),
            });
        }
        if perf.nlp_chunk_overlap >= perf.nlp_chunk_size {
            return Err(RedactorError::Config {
                reason: "performance.nlp_chunk_overlap must be smaller than nlp_chunk_size"
                    .to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.review.threshold) {
            return Err(RedactorError::Config {
                reason: format!("review.threshold {} outside [0, 1]", self.review.threshold),
            });
        }
        Ok(())
    }

    /// Configured overlap priority; unknown entity types rank 0.
    pub fn priority(&self, entity: &str) -> i32 {
        self.entities
            .iter()
            .find(|e| e.name == entity)
            .map(|e| e.priority)
            .unwrap_or(0)
    }

    /// Entities without a policy entry are enabled.
    pub fn is_enabled(&self, entity: &str) -> bool {
        self.entities
            .iter()
            .find(|e| e.name == entity)
            .map_or(true, |e| e.enabled)
    }

    pub fn set_priority(&mut self, entity: &str, priority: i32) {
        match self.entities.iter_mut().find(|e| e.name == entity) {
            Some(e) => e.priority = priority,
            None => self.entities.push(EntityPolicy {
                name: entity.to_string(),
                priority,
                ..EntityPolicy::default()
            }),
        }
    }
}

/// A caller-forced mask over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedMask {
    pub start: usize,
    pub end: usize,
    #[serde(default = "ForcedMask::default_entity")]
    pub entity_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ForcedMask {
    fn default_entity() -> String {
        "CUSTOM".to_string()
    }

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            entity_type: Self::default_entity(),
            label: None,
            reason: None,
        }
    }

    pub fn with_entity(mut self, entity: &str) -> Self {
        self.entity_type = entity.to_string();
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }
}

/// Per-run caller overrides. Immutable for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeOverrides {
    pub once_allowlist: Vec<String>,
    pub forced_masks: Vec<ForcedMask>,
    pub keep_spans: Vec<Range<usize>>,
}

impl RuntimeOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_once(mut self, term: &str) -> Self {
        self.once_allowlist.push(term.to_string());
        self
    }

    pub fn force(mut self, mask: ForcedMask) -> Self {
        self.forced_masks.push(mask);
        self
    }

    pub fn keep(mut self, span: Range<usize>) -> Self {
        self.keep_spans.push(span);
        self
    }

    /// Forced masks that are non-empty and inside a text of `len` chars.
    pub fn valid_forced_masks(&self, len: usize) -> impl Iterator<Item = &ForcedMask> {
        self.forced_masks
            .iter()
            .filter(move |m| m.start < m.end && m.end <= len)
    }

    pub fn valid_keep_spans(&self) -> impl Iterator<Item = &Range<usize>> {
        self.keep_spans.iter().filter(|r| r.start < r.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_priorities() {
        let policy = Policy::default();
        assert_eq!(policy.priority("PHONE"), 100);
        assert_eq!(policy.priority("COMPANY"), 80);
        assert_eq!(policy.priority("UNKNOWN"), 0);
        assert!(policy.is_enabled("UNKNOWN"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let policy = Policy::from_yaml_str(
            "output:\n  mode: BLACK\n  black_min_len: 4\naddress:\n  granularity: UNTIL_PREF\n",
        )
        .unwrap();
        assert_eq!(policy.output.mode, OutputMode::Black);
        assert_eq!(policy.output.black_min_len, 4);
        assert_eq!(policy.address.granularity, AddressGranularity::UntilPref);
        assert_eq!(policy.review.threshold, 0.80);
        assert_eq!(policy.performance.nlp_chunk_size, 15_000);
    }

    #[test]
    fn test_entity_list_merges_with_defaults() {
        let policy = Policy::from_yaml_str(
            "entities:\n  - { name: KEYWORD, enabled: false, tier: 3, priority: 60 }\n",
        )
        .unwrap();
        assert!(!policy.is_enabled("KEYWORD"));
        assert_eq!(policy.priority("PHONE"), 100);
        assert_eq!(policy.entities.len(), Policy::default().entities.len());
    }

    #[test]
    fn test_label_format_merges_with_defaults() {
        let policy =
            Policy::from_yaml_str("output:\n  label_format:\n    PERSON: \"<{n}>\"\n").unwrap();
        assert_eq!(policy.output.label_format["PERSON"], "<{n}>");
        assert_eq!(policy.output.label_format["PHONE"], "[PHONE]");
    }

    #[test]
    fn test_date_granularity_ym() {
        let policy = Policy::from_yaml_str("date:\n  granularity: YM\n").unwrap();
        assert_eq!(policy.date.granularity, DateGranularity::YearMonth);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let err = Policy::from_yaml_str(
            "performance:\n  nlp_chunk_size: 100\n  nlp_chunk_overlap: 100\n",
        )
        .unwrap_err();
        assert!(matches!(err, RedactorError::Config { .. }));
    }

    #[test]
    fn test_forced_mask_validation() {
        let overrides = RuntimeOverrides::new()
            .force(ForcedMask::new(0, 3))
            .force(ForcedMask::new(4, 4))
            .force(ForcedMask::new(5, 99));
        assert_eq!(overrides.valid_forced_masks(10).count(), 1);
    }
}
