//! Overlap resolution.
//!
//! Candidates are ranked by provenance (forced first), configured entity
//! priority, span length and score, in that order. Priority comes before
//! length so that a long low-precision span (a money pattern running into an
//! address, say) cannot swallow a shorter but more specific entity.

use crate::config::Policy;
use crate::domain::{Candidate, Provenance};
use std::cmp::Ordering;
use std::ops::Range;

pub struct OverlapResolver<'a> {
    policy: &'a Policy,
}

impl<'a> OverlapResolver<'a> {
    pub fn new(policy: &'a Policy) -> Self {
        Self { policy }
    }

    /// Ranks two candidates irrespective of position. `Less` means `a` wins.
    pub fn rank(&self, a: &Candidate, b: &Candidate) -> Ordering {
        let forced = |c: &Candidate| u8::from(c.provenance != Provenance::Forced);
        forced(a)
            .cmp(&forced(b))
            .then_with(|| {
                self.policy
                    .priority(&b.entity_type)
                    .cmp(&self.policy.priority(&a.entity_type))
            })
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| b.score.total_cmp(&a.score))
    }

    pub fn outranks(&self, a: &Candidate, b: &Candidate) -> bool {
        self.rank(a, b) == Ordering::Less
    }

    /// Reduces candidates to a sorted, non-overlapping set, then drops any
    /// span touching a keep range. Overlapping losers are discarded whole.
    pub fn resolve(&self, mut candidates: Vec<Candidate>, keep_spans: &[Range<usize>]) -> Vec<Candidate> {
        candidates.retain(|c| !c.is_empty());
        candidates.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| self.rank(a, b)));

        let mut resolved: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for c in candidates {
            match resolved.last_mut() {
                Some(prev) if c.start < prev.end => {
                    if self.outranks(&c, prev) {
                        *prev = c;
                    }
                }
                _ => resolved.push(c),
            }
        }

        if !keep_spans.is_empty() {
            resolved.retain(|c| !keep_spans.iter().any(|k| c.overlaps(k.start, k.end)));
        }
        resolved
    }
}

/// Sweep used inside a single detector pass and across chunk seams: sorted
/// by start then length, an overlapping candidate replaces the previous one
/// only when strictly better by (priority, length, score).
pub fn merge_overlaps(mut candidates: Vec<Candidate>, policy: &Policy) -> Vec<Candidate> {
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.len().cmp(&a.len())));

    let key_cmp = |a: &Candidate, b: &Candidate| {
        policy
            .priority(&a.entity_type)
            .cmp(&policy.priority(&b.entity_type))
            .then_with(|| a.len().cmp(&b.len()))
            .then_with(|| a.score.total_cmp(&b.score))
    };

    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for c in candidates {
        match merged.last_mut() {
            Some(prev) if c.start < prev.end => {
                if key_cmp(&c, prev) == Ordering::Greater {
                    *prev = c;
                }
            }
            _ => merged.push(c),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced(start: usize, end: usize) -> Candidate {
        Candidate::new(start, end, "CUSTOM", 1.0).with_provenance(Provenance::Forced)
    }

    #[test]
    fn test_forced_beats_everything() {
        let policy = Policy::default();
        let resolver = OverlapResolver::new(&policy);
        let out = resolver.resolve(
            vec![Candidate::new(0, 10, "PHONE", 0.99), forced(2, 4)],
            &[],
        );
        assert_eq!(out, vec![forced(2, 4)]);
    }

    #[test]
    fn test_priority_before_length() {
        let policy = Policy::default();
        let resolver = OverlapResolver::new(&policy);
        let out = resolver.resolve(
            vec![
                Candidate::new(0, 20, "MONEY", 0.85),
                Candidate::new(5, 8, "ADDRESS", 0.55),
            ],
            &[],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_type, "ADDRESS");
    }

    #[test]
    fn test_length_then_score() {
        let policy = Policy::default();
        let resolver = OverlapResolver::new(&policy);
        let longer = Candidate::new(0, 5, "PERSON", 0.5);
        let shorter = Candidate::new(0, 3, "PERSON", 0.9);
        assert!(resolver.outranks(&longer, &shorter));

        let better = Candidate::new(0, 3, "PERSON", 0.9);
        let worse = Candidate::new(1, 4, "PERSON", 0.8);
        assert_eq!(resolver.resolve(vec![worse, better.clone()], &[]), vec![better]);
    }

    #[test]
    fn test_keep_span_excludes_whole_hit() {
        let policy = Policy::default();
        let resolver = OverlapResolver::new(&policy);
        let out = resolver.resolve(
            vec![
                Candidate::new(0, 4, "PERSON", 0.9),
                Candidate::new(10, 14, "PHONE", 0.9),
            ],
            &[3..4],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start, 10);
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        let policy = Policy::default();
        let resolver = OverlapResolver::new(&policy);
        let out = resolver.resolve(
            vec![
                Candidate::new(0, 3, "PERSON", 0.9),
                Candidate::new(3, 6, "PERSON", 0.9),
            ],
            &[],
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_merge_overlaps_keeps_first_on_tie() {
        let policy = Policy::default();
        let a = Candidate::new(0, 4, "ID", 0.9);
        let b = Candidate::new(0, 4, "ID", 0.9).with_provenance(Provenance::Dictionary);
        let out = merge_overlaps(vec![a.clone(), b], &policy);
        assert_eq!(out, vec![a]);
    }
}
