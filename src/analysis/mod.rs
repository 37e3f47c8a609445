//! Candidate generation, overlap resolution and labeling for one text.
//!
//! An [`Analyzer`] is built once per policy and may be run any number of
//! times. Each run owns a fresh [`RunContext`], so re-running with different
//! overrides never reuses labels from a previous run.

pub mod chunk;
pub mod hit;
pub mod label;
pub mod resolve;

pub use chunk::{split_windows, ChunkCoordinator, ChunkReport, Window, WindowOutcome};
pub use hit::{Diagnostic, Hit, Reason};
pub use label::{Labeler, StableLabelState};
pub use resolve::OverlapResolver;

use crate::config::{Policy, RuntimeOverrides};
use crate::domain::{
    extract_parties, Candidate, CandidateSource, DetectorSet, Gazetteer, PartyExtraction,
    PatternDetector, Provenance,
};
use crate::error::RedactorResult;
use crate::text::CanonicalText;
use serde::Serialize;
use std::collections::BTreeMap;

/// How candidates were produced for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Primary detector over the whole text.
    Single,
    /// Primary detector over overlapping windows.
    Chunked,
    /// Pattern detector only.
    Fast,
}

/// Mutable state of one redaction run.
#[derive(Debug, Default)]
pub struct RunContext {
    pub labels: StableLabelState,
    pub hits: Vec<Hit>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of analyzing one canonical text.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub doc_id: String,
    pub mode: AnalysisMode,
    pub hits: Vec<Hit>,
    /// Canonical text with every hit replaced.
    pub masked_text: String,
    pub party_auto: PartyExtraction,
    pub chunks: Option<ChunkReport>,
    pub review_threshold: f64,
}

impl Analysis {
    pub fn review_hits(&self) -> usize {
        self.hits.iter().filter(|h| h.review_flag).count()
    }

    pub fn by_entity(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for hit in &self.hits {
            *counts.entry(hit.entity_type.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Replaces each hit's range in `text` with its replacement.
pub fn apply_hits(text: &CanonicalText, hits: &[Hit]) -> String {
    let mut out = String::with_capacity(text.as_str().len());
    let mut last = 0;
    for hit in hits {
        if hit.start < last {
            continue;
        }
        out.push_str(text.slice(last, hit.start));
        out.push_str(&hit.replacement);
        last = hit.end;
    }
    out.push_str(text.slice(last, text.len()));
    out
}

pub struct Analyzer {
    policy: Policy,
    primary: Box<dyn CandidateSource>,
    fallback: Box<dyn CandidateSource>,
    gazetteer: Gazetteer,
}

impl Analyzer {
    /// Pattern and dictionary detectors as primary, patterns alone as
    /// fallback, gazetteer from `dict_dir` when set.
    pub fn new(policy: Policy) -> RedactorResult<Self> {
        let primary = DetectorSet::from_policy(&policy)?;
        let fallback = DetectorSet::new()
            .with_source(Box::new(PatternDetector::new()))
            .with_policy_filter(&policy);
        let gazetteer = match &policy.dict_dir {
            Some(dir) => Gazetteer::load_dir(dir)?,
            None => Gazetteer::builtin(),
        };
        Ok(Self::with_detectors(policy, Box::new(primary), Box::new(fallback)).with_gazetteer(gazetteer))
    }

    pub fn with_detectors(
        policy: Policy,
        primary: Box<dyn CandidateSource>,
        fallback: Box<dyn CandidateSource>,
    ) -> Self {
        Self {
            policy,
            primary,
            fallback,
            gazetteer: Gazetteer::builtin(),
        }
    }

    pub fn with_gazetteer(mut self, gazetteer: Gazetteer) -> Self {
        self.gazetteer = gazetteer;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Runs the pipeline with a fresh context.
    pub fn run(&self, text: &CanonicalText, doc_id: &str, overrides: &RuntimeOverrides) -> Analysis {
        let mut ctx = RunContext::new();
        self.run_with(text, doc_id, overrides, &mut ctx)
    }

    /// Runs the pipeline, accumulating labels and hits into `ctx`.
    pub fn run_with(
        &self,
        text: &CanonicalText,
        doc_id: &str,
        overrides: &RuntimeOverrides,
        ctx: &mut RunContext,
    ) -> Analysis {
        let party_auto = extract_parties(text.as_str());
        let allowlist = self.allowlist(&party_auto, overrides);

        let (mode, mut candidates, chunks) = self.candidates(text);
        candidates.extend(overrides.valid_forced_masks(text.len()).map(|m| {
            let mut c = Candidate::new(m.start, m.end, &m.entity_type, 1.0)
                .with_provenance(Provenance::Forced);
            c.label = m.label.clone();
            c.forced_reason = m.reason.clone();
            c
        }));
        candidates.retain(|c| c.start < c.end && c.end <= text.len());

        let keep_spans: Vec<_> = overrides.valid_keep_spans().cloned().collect();
        let resolved = OverlapResolver::new(&self.policy).resolve(candidates, &keep_spans);

        let labeler = Labeler::new(&self.policy, &self.gazetteer, &allowlist);
        ctx.hits = labeler.label_all(text, &resolved, &mut ctx.labels);
        log::info!(
            "Analysis of '{}' ({:?}): {} hit(s), {} flagged for review",
            doc_id,
            mode,
            ctx.hits.len(),
            ctx.hits.iter().filter(|h| h.review_flag).count()
        );

        Analysis {
            doc_id: doc_id.to_string(),
            mode,
            masked_text: apply_hits(text, &ctx.hits),
            hits: ctx.hits.clone(),
            party_auto,
            chunks,
            review_threshold: self.policy.review.threshold,
        }
    }

    fn allowlist(&self, parties: &PartyExtraction, overrides: &RuntimeOverrides) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for term in self
            .policy
            .global
            .allowlist
            .terms
            .iter()
            .chain(&parties.self_names)
            .chain(&parties.allowlist_labels)
            .chain(&overrides.once_allowlist)
        {
            if !out.contains(term) {
                out.push(term.clone());
            }
        }
        out
    }

    fn candidates(&self, text: &CanonicalText) -> (AnalysisMode, Vec<Candidate>, Option<ChunkReport>) {
        let perf = &self.policy.performance;
        let len = text.len();

        if perf.force_fast || len >= perf.fast_threshold_chars {
            log::info!("Analysis: pattern-only mode ({} chars)", len);
            return (AnalysisMode::Fast, self.fallback_pass(text), None);
        }

        if len >= perf.nlp_chunk_size {
            let coordinator =
                ChunkCoordinator::new(&self.policy, self.primary.as_ref(), self.fallback.as_ref());
            let (found, report) = coordinator.analyze(text);
            return (AnalysisMode::Chunked, found, Some(report));
        }

        log::info!("Analysis: single pass ({} chars)", len);
        match self.primary.produce_candidates(text.as_str()) {
            Ok(found) => (
                AnalysisMode::Single,
                resolve::merge_overlaps(found, &self.policy),
                None,
            ),
            Err(e) => {
                log::warn!("{} failed ({}), using {}", self.primary.name(), e, self.fallback.name());
                (AnalysisMode::Fast, self.fallback_pass(text), None)
            }
        }
    }

    fn fallback_pass(&self, text: &CanonicalText) -> Vec<Candidate> {
        match self.fallback.produce_candidates(text.as_str()) {
            Ok(found) => found,
            Err(e) => {
                log::warn!("{} failed, no candidates: {}", self.fallback.name(), e);
                Vec::new()
            }
        }
    }
}
