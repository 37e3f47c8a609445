//! Replacement text and reason codes for resolved candidates.

use super::hit::{Hit, Reason};
use crate::config::{OutputMode, Policy};
use crate::domain::address::Gazetteer;
use crate::domain::date::date_granular;
use crate::domain::{entity, Candidate, Provenance};
use crate::text::{normalize_term, CanonicalText};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

/// Filler used in blackout mode.
pub const BLACK_CHAR: char = '■';

pub const MONEY_CONTEXT_WORDS: [&str; 19] = [
    "円", "¥", "￥", "税込", "税抜", "合計", "総額", "対価", "報酬", "単価", "金額", "支払", "請求",
    "入金", "振込", "売買代金", "委託料", "利用料", "料金",
];

const CORP_DESIGNATORS: [&str; 5] = ["株式会社", "有限会社", "合同会社", "合名会社", "合資会社"];
const CORP_ABBREVIATIONS: [&str; 2] = ["(株)", "（株）"];

fn is_boundary(c: char) -> bool {
    c.is_whitespace()
        || "、。,.，．:：;；()（）[]［］{}｛｝<>＜＞《》【】「」『』\"'“”‘’・/\\|?!？！".contains(c)
}

/// `max(min_len, len)` filler characters.
pub fn blackout(len: usize, min_len: usize) -> String {
    std::iter::repeat(BLACK_CHAR).take(len.max(min_len)).collect()
}

/// Expands `{n}` and `{n:0Wd}` in a label template.
pub fn format_label(template: &str, n: usize) -> String {
    static PLACEHOLDER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{n(?::0?(\d+)d)?\}").expect("Valid label placeholder regex"));
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match caps.get(1) {
            Some(width) => {
                let width: usize = width.as_str().parse().unwrap_or(0);
                format!("{:0width$}", n, width = width)
            }
            None => n.to_string(),
        })
        .into_owned()
}

/// Run-scoped pseudonym assignment. Create one per redaction run.
#[derive(Debug, Default)]
pub struct StableLabelState {
    counters: HashMap<String, usize>,
    issued: HashMap<(String, String), String>,
}

impl StableLabelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label for `original`, reusing the one already issued for the same
    /// entity type and normalized text.
    pub fn label_for(&mut self, entity_type: &str, original: &str, policy: &Policy) -> String {
        let key = (entity_type.to_string(), normalize_term(original));
        if let Some(label) = self.issued.get(&key) {
            return label.clone();
        }

        let n = self.counters.entry(entity_type.to_string()).or_insert(0);
        *n += 1;
        let label = match policy.output.label_format.get(entity_type) {
            Some(template) => format_label(template, *n),
            None => format_label(&format!("[{}_{{n:02d}}]", entity_type), *n),
        };
        self.issued.insert(key, label.clone());
        label
    }
}

/// Turns resolved candidates into hits.
pub struct Labeler<'a> {
    policy: &'a Policy,
    gazetteer: &'a Gazetteer,
    allowlist: HashSet<String>,
}

impl<'a> Labeler<'a> {
    /// `allowlist` holds every pass-through term for this run; terms are
    /// compared after normalization.
    pub fn new(policy: &'a Policy, gazetteer: &'a Gazetteer, allowlist: &[String]) -> Self {
        Self {
            policy,
            gazetteer,
            allowlist: allowlist
                .iter()
                .map(|t| normalize_term(t))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_allowlisted(&self, term: &str) -> bool {
        let t = normalize_term(term);
        !t.is_empty() && self.allowlist.contains(&t)
    }

    fn has_money_context(&self, text: &CanonicalText, start: usize, end: usize) -> bool {
        let window = self.policy.heuristics.money_context_window;
        let ctx = text.slice(start.saturating_sub(window), end + window);
        MONEY_CONTEXT_WORDS.iter().any(|w| ctx.contains(w))
    }

    /// Widens a designator-only company span to the adjacent name, without
    /// crossing `lower` or `upper`. The name is looked for after the
    /// designator first; a full designator with nothing after it is treated
    /// as a suffix and widened to the left.
    fn expand_company(
        &self,
        text: &CanonicalText,
        start: usize,
        end: usize,
        lower: usize,
        upper: usize,
    ) -> (usize, usize) {
        let max = self.policy.heuristics.company_expand_max;
        let seg = text.slice(start, end);
        let upper = upper.min(text.len());
        let designator = CORP_DESIGNATORS.contains(&seg);
        if !designator && !CORP_ABBREVIATIONS.contains(&seg) {
            return (start, end);
        }

        let mut r = end;
        while r < upper && text.char_at(r).map_or(false, char::is_whitespace) {
            r += 1;
        }
        let mut consumed = 0;
        while r < upper && consumed < max && text.char_at(r).map_or(false, |c| !is_boundary(c)) {
            r += 1;
            consumed += 1;
        }
        if consumed > 0 {
            return (start, r);
        }
        if !designator {
            return (start, end);
        }

        let mut l = start;
        while l > lower && text.char_at(l - 1).map_or(false, char::is_whitespace) {
            l -= 1;
        }
        consumed = 0;
        while l > lower && consumed < max && text.char_at(l - 1).map_or(false, |c| !is_boundary(c)) {
            l -= 1;
            consumed += 1;
        }
        if consumed > 0 {
            (l, end)
        } else {
            (start, end)
        }
    }

    /// Labels resolved, sorted, non-overlapping candidates in order.
    pub fn label_all(
        &self,
        text: &CanonicalText,
        resolved: &[Candidate],
        state: &mut StableLabelState,
    ) -> Vec<Hit> {
        let mut hits: Vec<Hit> = Vec::with_capacity(resolved.len());
        for (i, candidate) in resolved.iter().enumerate() {
            let lower = hits.last().map_or(0, |h| h.end);
            let upper = resolved.get(i + 1).map_or(text.len(), |n| n.start);

            let mut candidate = candidate.clone();
            if candidate.entity_type == entity::COMPANY && candidate.provenance != Provenance::Forced {
                let (s, e) = self.expand_company(text, candidate.start, candidate.end, lower, upper);
                if (s, e) != (candidate.start, candidate.end) {
                    log::debug!(
                        "Expanded COMPANY [{}, {}) to [{}, {})",
                        candidate.start,
                        candidate.end,
                        s,
                        e
                    );
                }
                candidate.start = s;
                candidate.end = e;
            }
            hits.push(self.label(text, &candidate, state));
        }
        hits
    }

    /// Decides replacement and reason for one candidate.
    pub fn label(&self, text: &CanonicalText, candidate: &Candidate, state: &mut StableLabelState) -> Hit {
        let original = text.slice(candidate.start, candidate.end).to_string();
        let output = &self.policy.output;
        let black = output.mode == OutputMode::Black;
        let entity_type = candidate.entity_type.as_str();

        let (replacement, reason) = if candidate.provenance == Provenance::Forced {
            let replacement = if black {
                blackout(original.chars().count(), output.black_min_len)
            } else {
                match &candidate.label {
                    Some(label) if !label.is_empty() => label.clone(),
                    _ => state.label_for(entity_type, &original, self.policy),
                }
            };
            let reason = candidate
                .forced_reason
                .clone()
                .unwrap_or_else(|| Reason::FORCED_DEFAULT.to_string());
            (replacement, Reason::Forced(reason))
        } else if entity_type == entity::PARTIES {
            (original.clone(), Reason::KeepParties)
        } else if self.is_allowlisted(&original) {
            (original.clone(), Reason::KeepAllowlist)
        } else if entity_type == entity::MONEY
            && !self.has_money_context(text, candidate.start, candidate.end)
        {
            (original.clone(), Reason::KeepMoneyNoContext)
        } else if black {
            (
                blackout(original.chars().count(), output.black_min_len),
                Reason::MaskBlack,
            )
        } else if entity_type == entity::DATE {
            (
                date_granular(&original, self.policy.date.granularity),
                Reason::MaskDateGranular,
            )
        } else if entity_type == entity::ADDRESS {
            (
                self.gazetteer
                    .mask_address(&original, self.policy.address.granularity),
                Reason::MaskAddressGranular,
            )
        } else {
            (
                state.label_for(entity_type, &original, self.policy),
                Reason::MaskStableId,
            )
        };

        let mut hit = Hit::from_candidate(candidate, original, replacement, reason);
        let score = hit.score;
        hit.review_flag = (score > 0.0 && score < self.policy.review.threshold)
            || hit.reason == Reason::KeepMoneyNoContext
            || hit.is_forced();
        hit
    }
}
