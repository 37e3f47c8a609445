//! Geometric redaction of hits on fixed-layout pages.
//!
//! Each hit is located in three tiers: the character map, then a text search
//! over the open document, then giving up and flagging the hit. Every tier
//! returns a `Result` so the failure that ended the chain is reported on the
//! hit rather than swallowed.

use crate::analysis::{Diagnostic, Hit};
use crate::config::PdfPolicy;
use crate::document::pdf::{CharMap, PageGlyphs, PageRect, Rect};
use crate::error::RedactorResult;
use crate::text::char_len;
use serde::Serialize;
use std::path::Path;

/// Operations a fixed-layout document must support to be redacted.
pub trait PdfBackend {
    fn page_count(&self) -> usize;

    /// Glyphs of every page in reading order.
    fn page_glyphs(&mut self) -> RedactorResult<Vec<PageGlyphs>>;

    /// Boxes of occurrences of `needle` on one page, at most `max_hits`.
    fn search(&mut self, page: usize, needle: &str, max_hits: usize) -> RedactorResult<Vec<Rect>>;

    /// Queues an opaque redaction region. Nothing is removed until
    /// [`PdfBackend::apply_redactions`].
    fn add_redaction(&mut self, page: usize, rect: Rect) -> RedactorResult<()>;

    /// Physically removes content under every queued region. Returns the
    /// number of pages modified.
    fn apply_redactions(&mut self) -> RedactorResult<usize>;

    fn save(&mut self, output: &Path) -> RedactorResult<()>;
}

/// Why a hit could not be placed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateFailure {
    /// No character map was extracted.
    NoCharMap,
    /// The hit lies outside the mapped range.
    OutOfRange,
    /// The mapped characters have no geometry.
    NoGeometry,
    /// Search term below the minimum length.
    TermTooShort,
    /// Search found nothing.
    SearchFailed,
    /// More rectangles than the configured cap.
    TooManyHits(usize),
}

impl LocateFailure {
    /// Diagnostic recorded on the hit when this failure ends the chain.
    pub fn diagnostic(self) -> Diagnostic {
        match self {
            Self::TermTooShort => Diagnostic::PdfTermTooShort,
            Self::TooManyHits(_) => Diagnostic::PdfTooManyHits,
            Self::NoCharMap | Self::OutOfRange | Self::NoGeometry | Self::SearchFailed => {
                Diagnostic::PdfSearchFailed
            }
        }
    }
}

/// How a hit was placed.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Coordinates(Vec<PageRect>),
    Search(Vec<PageRect>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PdfStats {
    pub applied_rects: usize,
    pub coord_mapped: usize,
    pub search_fallback: usize,
    pub search_misses: usize,
    pub skipped_too_many: usize,
    pub term_too_short: usize,
    pub pages_modified: usize,
}

pub struct QuadRedactor<'a> {
    policy: &'a PdfPolicy,
    pending: Vec<PageRect>,
    stats: PdfStats,
}

impl<'a> QuadRedactor<'a> {
    pub fn new(policy: &'a PdfPolicy) -> Self {
        Self {
            policy,
            pending: Vec::new(),
            stats: PdfStats::default(),
        }
    }

    /// First tier: exact positions from the character map.
    pub fn locate_by_coordinates(&self, map: &CharMap, hit: &Hit) -> Result<Vec<PageRect>, LocateFailure> {
        if !map.is_usable() {
            return Err(LocateFailure::NoCharMap);
        }
        if hit.end > map.len() {
            return Err(LocateFailure::OutOfRange);
        }
        let rects = map.rects_for_span(hit.start, hit.end, self.policy.line_tolerance);
        match rects.len() {
            0 => Err(LocateFailure::NoGeometry),
            n if n > self.policy.max_rects_per_term => Err(LocateFailure::TooManyHits(n)),
            _ => Ok(rects),
        }
    }

    /// Second tier: search the document for the hit's original text.
    pub fn locate_by_search(
        &self,
        backend: &mut dyn PdfBackend,
        hit: &Hit,
    ) -> Result<Vec<PageRect>, LocateFailure> {
        let term = hit.original.trim();
        if term.is_empty() || char_len(term) < self.policy.min_term_length {
            return Err(LocateFailure::TermTooShort);
        }

        let cap = self.policy.max_rects_per_term;
        let mut found = Vec::new();
        for page in 0..backend.page_count() {
            match backend.search(page, term, cap + 1) {
                Ok(rects) => found.extend(rects.into_iter().map(|rect| PageRect { page, rect })),
                Err(e) => log::warn!("Search on page {} failed: {}", page + 1, e),
            }
            if found.len() > cap {
                return Err(LocateFailure::TooManyHits(found.len()));
            }
        }
        if found.is_empty() {
            Err(LocateFailure::SearchFailed)
        } else {
            Ok(found)
        }
    }

    /// Runs the tiers in order. Too many coordinate rectangles is final;
    /// any other coordinate miss falls through to search.
    pub fn locate(
        &self,
        backend: &mut dyn PdfBackend,
        map: &CharMap,
        hit: &Hit,
    ) -> Result<Placement, LocateFailure> {
        match self.locate_by_coordinates(map, hit) {
            Ok(rects) => Ok(Placement::Coordinates(rects)),
            Err(f @ LocateFailure::TooManyHits(_)) => Err(f),
            Err(f) => {
                log::debug!("Coordinates for [{}, {}) unavailable ({:?}), searching", hit.start, hit.end, f);
                self.locate_by_search(backend, hit).map(Placement::Search)
            }
        }
    }

    /// Places every writable hit, then applies all queued redactions at once.
    pub fn redact(
        mut self,
        backend: &mut dyn PdfBackend,
        map: &CharMap,
        hits: &mut [Hit],
    ) -> RedactorResult<PdfStats> {
        for hit in hits.iter_mut() {
            if !hit.needs_write() || hit.original.is_empty() || hit.start >= hit.end {
                continue;
            }
            match self.locate(backend, map, hit) {
                Ok(Placement::Coordinates(rects)) => {
                    self.stats.coord_mapped += 1;
                    let padding = self.policy.padding;
                    self.queue(rects.into_iter().map(|r| PageRect {
                        page: r.page,
                        rect: r.rect.padded(padding),
                    }));
                }
                Ok(Placement::Search(rects)) => {
                    self.stats.search_fallback += 1;
                    self.queue(rects);
                }
                Err(failure) => {
                    match failure {
                        LocateFailure::TooManyHits(n) => {
                            log::warn!("Skipping [{}, {}): {} rectangles", hit.start, hit.end, n);
                            self.stats.skipped_too_many += 1;
                        }
                        LocateFailure::TermTooShort => self.stats.term_too_short += 1,
                        _ => {
                            log::warn!("Could not place [{}, {}) on any page", hit.start, hit.end);
                            self.stats.search_misses += 1;
                        }
                    }
                    hit.flag(failure.diagnostic());
                }
            }
        }

        if !self.pending.is_empty() {
            for r in &self.pending {
                backend.add_redaction(r.page, r.rect)?;
            }
            self.stats.pages_modified = backend.apply_redactions()?;
        }
        log::info!(
            "PDF redaction: {} rect(s), {} by coordinates, {} by search, {} unplaced",
            self.stats.applied_rects,
            self.stats.coord_mapped,
            self.stats.search_fallback,
            self.stats.search_misses + self.stats.skipped_too_many + self.stats.term_too_short
        );
        Ok(self.stats)
    }

    fn queue(&mut self, rects: impl IntoIterator<Item = PageRect>) {
        for r in rects {
            self.stats.applied_rects += 1;
            self.pending.push(r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Reason;
    use crate::document::pdf::{build_char_map, Glyph, GlyphLine};
    use crate::domain::{Candidate, Provenance};

    #[derive(Default)]
    struct Recording {
        pages: Vec<PageGlyphs>,
        search_results: Vec<Rect>,
        added: Vec<(usize, Rect)>,
        applied: bool,
    }

    impl PdfBackend for Recording {
        fn page_count(&self) -> usize {
            self.pages.len().max(1)
        }

        fn page_glyphs(&mut self) -> RedactorResult<Vec<PageGlyphs>> {
            Ok(self.pages.clone())
        }

        fn search(&mut self, _page: usize, _needle: &str, max_hits: usize) -> RedactorResult<Vec<Rect>> {
            Ok(self.search_results.iter().take(max_hits).copied().collect())
        }

        fn add_redaction(&mut self, page: usize, rect: Rect) -> RedactorResult<()> {
            self.added.push((page, rect));
            Ok(())
        }

        fn apply_redactions(&mut self) -> RedactorResult<usize> {
            self.applied = true;
            Ok(1)
        }

        fn save(&mut self, _output: &Path) -> RedactorResult<()> {
            Ok(())
        }
    }

    fn hit(start: usize, end: usize, original: &str) -> Hit {
        let c = Candidate::new(start, end, "PERSON", 0.9).with_provenance(Provenance::Detector);
        Hit::from_candidate(&c, original.to_string(), "[PERSON_01]".into(), Reason::MaskStableId)
    }

    fn two_lines() -> CharMap {
        let glyph = |c, x: f32, y: f32| Glyph::new(c, Rect::new(x, y, x + 10.0, y + 10.0));
        build_char_map(&[PageGlyphs {
            lines: vec![GlyphLine {
                bbox: Rect::new(0.0, 99.0, 20.0, 210.0),
                glyphs: vec![glyph('山', 0.0, 100.0), glyph('田', 10.0, 101.0), glyph('様', 0.0, 200.0)],
            }],
        }])
    }

    fn policy() -> PdfPolicy {
        PdfPolicy {
            padding: 0.0,
            ..PdfPolicy::default()
        }
    }

    #[test]
    fn test_two_rects_across_vertical_gap() {
        let policy = policy();
        let mut backend = Recording::default();
        let mut hits = vec![hit(0, 3, "山田様")];
        let stats = QuadRedactor::new(&policy)
            .redact(&mut backend, &two_lines(), &mut hits)
            .unwrap();

        assert_eq!(stats.applied_rects, 2);
        assert_eq!(stats.coord_mapped, 1);
        assert_eq!(backend.added.len(), 2);
        assert!(backend.applied);
        assert!(!hits[0].review_flag);
    }

    #[test]
    fn test_out_of_range_falls_back_to_search() {
        let policy = policy();
        let mut backend = Recording {
            search_results: vec![Rect::new(1.0, 1.0, 2.0, 2.0)],
            ..Default::default()
        };
        let mut hits = vec![hit(10, 13, "山田様")];
        let stats = QuadRedactor::new(&policy)
            .redact(&mut backend, &two_lines(), &mut hits)
            .unwrap();
        assert_eq!(stats.search_fallback, 1);
        assert_eq!(backend.added, vec![(0, Rect::new(1.0, 1.0, 2.0, 2.0))]);
    }

    #[test]
    fn test_search_miss_flags_hit() {
        let policy = policy();
        let mut backend = Recording::default();
        let mut hits = vec![hit(10, 13, "山田様")];
        let stats = QuadRedactor::new(&policy)
            .redact(&mut backend, &CharMap::default(), &mut hits)
            .unwrap();
        assert_eq!(stats.search_misses, 1);
        assert!(hits[0].review_flag);
        assert_eq!(hits[0].diagnostics, vec![Diagnostic::PdfSearchFailed]);
        assert!(!backend.applied);
    }

    #[test]
    fn test_too_many_search_results() {
        let policy = PdfPolicy {
            max_rects_per_term: 2,
            ..policy()
        };
        let mut backend = Recording {
            search_results: vec![Rect::new(0.0, 0.0, 1.0, 1.0); 5],
            ..Default::default()
        };
        let mut hits = vec![hit(0, 2, "田中")];
        let stats = QuadRedactor::new(&policy)
            .redact(&mut backend, &CharMap::default(), &mut hits)
            .unwrap();
        assert_eq!(stats.skipped_too_many, 1);
        assert_eq!(hits[0].diagnostics, vec![Diagnostic::PdfTooManyHits]);
        assert!(backend.added.is_empty());
    }

    #[test]
    fn test_short_term_is_not_searched() {
        let policy = policy();
        let mut backend = Recording {
            search_results: vec![Rect::new(0.0, 0.0, 1.0, 1.0)],
            ..Default::default()
        };
        let mut hits = vec![hit(0, 1, "甲")];
        QuadRedactor::new(&policy)
            .redact(&mut backend, &CharMap::default(), &mut hits)
            .unwrap();
        assert_eq!(hits[0].diagnostics, vec![Diagnostic::PdfTermTooShort]);
    }

    #[test]
    fn test_padding_applied_to_coordinate_rects() {
        let policy = PdfPolicy {
            padding: 0.5,
            ..PdfPolicy::default()
        };
        let mut backend = Recording::default();
        let mut hits = vec![hit(0, 1, "山")];
        QuadRedactor::new(&policy)
            .redact(&mut backend, &two_lines(), &mut hits)
            .unwrap();
        assert_eq!(backend.added[0].1, Rect::new(-0.5, 99.5, 10.5, 110.5));
    }
}
