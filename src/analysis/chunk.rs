//! Windowed analysis of oversized texts.

use super::resolve::merge_overlaps;
use crate::config::Policy;
use crate::domain::{Candidate, CandidateSource};
use crate::text::CanonicalText;

/// A window over the canonical text, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub len: usize,
}

impl Window {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// How one window was analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    Primary,
    Fallback,
    Skipped,
}

/// Per-window outcomes of a chunked run, in window order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub windows: Vec<(Window, WindowOutcome)>,
}

impl ChunkReport {
    pub fn count(&self, outcome: WindowOutcome) -> usize {
        self.windows.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// Splits `text` into windows of at most `size` characters overlapping by
/// `overlap`. A cut prefers the last newline in the second half of the
/// window; the newline stays with the earlier window.
pub fn split_windows(text: &CanonicalText, size: usize, overlap: usize) -> Vec<Window> {
    let total = text.len();
    if total <= size || size == 0 {
        return vec![Window { offset: 0, len: total }];
    }

    let mut windows = Vec::new();
    let mut pos = 0;
    while pos < total {
        let mut end = (pos + size).min(total);
        if end < total {
            let floor = pos + size / 2;
            if let Some(nl) = (floor..end).rev().find(|&i| text.char_at(i) == Some('\n')) {
                if nl > pos {
                    end = nl + 1;
                }
            }
        }
        windows.push(Window {
            offset: pos,
            len: end - pos,
        });
        if end == total {
            break;
        }

        let next = end.saturating_sub(overlap);
        pos = if next <= pos { end } else { next };
    }
    windows
}

/// Runs a primary candidate source window by window, falling back to a
/// cheaper source for any window the primary fails on.
pub struct ChunkCoordinator<'a> {
    policy: &'a Policy,
    primary: &'a dyn CandidateSource,
    fallback: &'a dyn CandidateSource,
}

impl<'a> ChunkCoordinator<'a> {
    pub fn new(
        policy: &'a Policy,
        primary: &'a dyn CandidateSource,
        fallback: &'a dyn CandidateSource,
    ) -> Self {
        Self {
            policy,
            primary,
            fallback,
        }
    }

    /// Analyzes every window in order and reconciles duplicates from the
    /// overlap margins. Window failures are never fatal.
    pub fn analyze(&self, text: &CanonicalText) -> (Vec<Candidate>, ChunkReport) {
        let perf = &self.policy.performance;
        let windows = split_windows(text, perf.nlp_chunk_size, perf.nlp_chunk_overlap);
        log::info!("Chunked analysis: {} window(s), {} chars", windows.len(), text.len());

        let mut all = Vec::new();
        let mut report = ChunkReport::default();

        for (i, window) in windows.iter().enumerate() {
            log::debug!(
                "  window {}/{} (offset={}, len={})",
                i + 1,
                windows.len(),
                window.offset,
                window.len
            );
            let slice = text.slice(window.offset, window.end());

            let outcome = match self.primary.produce_candidates(slice) {
                Ok(found) => {
                    all.extend(
                        merge_overlaps(found, self.policy)
                            .into_iter()
                            .map(|c| c.rebased(window.offset)),
                    );
                    WindowOutcome::Primary
                }
                Err(e) => {
                    log::warn!(
                        "{} failed on window {} ({}), using {}",
                        self.primary.name(),
                        i + 1,
                        e,
                        self.fallback.name()
                    );
                    match self.fallback.produce_candidates(slice) {
                        Ok(found) => {
                            all.extend(found.into_iter().map(|c| c.rebased(window.offset)));
                            WindowOutcome::Fallback
                        }
                        Err(e) => {
                            log::warn!("Fallback failed on window {}, skipping: {}", i + 1, e);
                            WindowOutcome::Skipped
                        }
                    }
                }
            };
            report.windows.push((*window, outcome));
        }

        (merge_overlaps(all, self.policy), report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RedactorError, RedactorResult};

    #[test]
    fn test_short_text_is_one_window() {
        let text = CanonicalText::new("短い文");
        assert_eq!(split_windows(&text, 10, 2), vec![Window { offset: 0, len: 3 }]);
    }

    #[test]
    fn test_windows_cover_text_and_overlap() {
        let text = CanonicalText::new("a".repeat(25));
        let windows = split_windows(&text, 10, 3);
        assert_eq!(windows.first().map(|w| w.offset), Some(0));
        assert_eq!(windows.last().map(|w| w.end()), Some(25));
        for pair in windows.windows(2) {
            assert_eq!(pair[1].offset, pair[0].end() - 3);
        }
    }

    #[test]
    fn test_cut_prefers_newline() {
        let text = CanonicalText::new(format!("{}\n{}", "a".repeat(7), "b".repeat(10)));
        let windows = split_windows(&text, 10, 2);
        assert_eq!(windows[0], Window { offset: 0, len: 8 });
        assert_eq!(windows[1].offset, 6);
    }

    #[test]
    fn test_no_redundant_tail_window() {
        let text = CanonicalText::new("x".repeat(20));
        let windows = split_windows(&text, 10, 5);
        assert_eq!(windows.last().map(|w| w.end()), Some(20));
        assert_eq!(windows.iter().filter(|w| w.end() == 20).count(), 1);
    }

    struct FailsOn(&'static str);

    impl CandidateSource for FailsOn {
        fn produce_candidates(&self, text: &str) -> RedactorResult<Vec<Candidate>> {
            if text.contains(self.0) {
                return Err(RedactorError::Detector {
                    detector: "FailsOn".into(),
                    reason: "out of memory".into(),
                });
            }
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "FailsOn"
        }
    }

    struct FirstChar;

    impl CandidateSource for FirstChar {
        fn produce_candidates(&self, _text: &str) -> RedactorResult<Vec<Candidate>> {
            Ok(vec![Candidate::new(0, 1, "ID", 0.5)])
        }

        fn name(&self) -> &str {
            "FirstChar"
        }
    }

    #[test]
    fn test_failed_window_falls_back_with_rebased_offsets() {
        let mut policy = Policy::default();
        policy.performance.nlp_chunk_size = 10;
        policy.performance.nlp_chunk_overlap = 0;

        let text = CanonicalText::new(format!("{}{}", "a".repeat(10), "bbbbXbbbbb"));
        let primary = FailsOn("X");
        let coordinator = ChunkCoordinator::new(&policy, &primary, &FirstChar);
        let (found, report) = coordinator.analyze(&text);

        assert_eq!(report.count(WindowOutcome::Primary), 1);
        assert_eq!(report.count(WindowOutcome::Fallback), 1);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].start, found[0].end), (10, 11));
    }

    #[test]
    fn test_double_failure_skips_window() {
        let mut policy = Policy::default();
        policy.performance.nlp_chunk_size = 10;
        policy.performance.nlp_chunk_overlap = 0;

        let text = CanonicalText::new("X".repeat(15));
        let failing = FailsOn("X");
        let coordinator = ChunkCoordinator::new(&policy, &failing, &failing);
        let (found, report) = coordinator.analyze(&text);
        assert!(found.is_empty());
        assert_eq!(report.count(WindowOutcome::Skipped), 2);
    }
}
