//! Offset-based replacement inside formatting runs.

use super::model::{DocxDocument, ParaId, RunId};
use crate::document::ContainerRef;
use crate::text::char_len;
use std::collections::BTreeMap;

pub const WARN_CELL_FLATTENED: &str = "warning:cell_flattened";
pub const WARN_EDIT_OUT_OF_RANGE: &str = "warning:edit_out_of_range";

/// One replacement in container-local character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceEdit {
    pub container: ContainerRef,
    pub local_start: usize,
    pub local_end: usize,
    pub replacement: String,
    /// Index of the originating hit.
    pub hit: usize,
}

/// What [`RunSplicer::apply`] managed to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpliceOutcome {
    pub applied: usize,
    /// Hit indices with at least one edit that could not be written.
    pub failed_hits: Vec<usize>,
    pub warnings: Vec<String>,
}

/// Applies edits to a document, splitting runs so that no formatting crosses
/// a replacement boundary.
pub struct RunSplicer<'d> {
    doc: &'d mut DocxDocument,
    outcome: SpliceOutcome,
}

impl<'d> RunSplicer<'d> {
    pub fn new(doc: &'d mut DocxDocument) -> Self {
        Self {
            doc,
            outcome: SpliceOutcome::default(),
        }
    }

    /// Applies all edits, highest offset first within each container.
    pub fn apply(mut self, edits: Vec<SpliceEdit>) -> SpliceOutcome {
        let mut by_container: BTreeMap<(u8, usize), Vec<SpliceEdit>> = BTreeMap::new();
        for edit in edits {
            let key = match edit.container {
                ContainerRef::Paragraph(p) => (0, p),
                ContainerRef::Cell(c) => (1, c),
            };
            by_container.entry(key).or_default().push(edit);
        }

        for (_, mut group) in by_container {
            group.sort_by(|a, b| b.local_start.cmp(&a.local_start).then(b.local_end.cmp(&a.local_end)));
            for edit in group {
                let ok = match edit.container {
                    ContainerRef::Paragraph(p) => {
                        self.splice_paragraph(p, edit.local_start, edit.local_end, &edit.replacement)
                    }
                    ContainerRef::Cell(c) => {
                        self.splice_cell(c, edit.local_start, edit.local_end, &edit.replacement)
                    }
                };
                if ok {
                    self.outcome.applied += 1;
                } else {
                    log::warn!(
                        "Edit [{}, {}) outside {:?}",
                        edit.local_start,
                        edit.local_end,
                        edit.container
                    );
                    self.warn(WARN_EDIT_OUT_OF_RANGE);
                    if !self.outcome.failed_hits.contains(&edit.hit) {
                        self.outcome.failed_hits.push(edit.hit);
                    }
                }
            }
        }
        self.outcome.failed_hits.sort_unstable();
        self.outcome
    }

    fn warn(&mut self, warning: &str) {
        if !self.outcome.warnings.iter().any(|w| w == warning) {
            self.outcome.warnings.push(warning.to_string());
        }
    }

    /// Character ranges of the non-empty runs of a paragraph.
    fn run_spans(&self, para: ParaId) -> Vec<(RunId, usize, usize)> {
        let mut pos = 0;
        let mut spans = Vec::new();
        for &id in &self.doc.paragraph(para).runs {
            let len = char_len(self.doc.run(id).text());
            if len > 0 {
                spans.push((id, pos, pos + len));
            }
            pos += len;
        }
        spans
    }

    /// Replaces `[start, end)` of a paragraph's text.
    pub(crate) fn splice_paragraph(&mut self, para: ParaId, start: usize, end: usize, replacement: &str) -> bool {
        let spans = self.run_spans(para);
        let Some(first) = spans.iter().position(|&(_, _, re)| re > start) else {
            return false;
        };
        let Some(last) = spans.iter().rposition(|&(_, rs, _)| rs < end) else {
            return false;
        };
        if start >= end || last < first || end > spans[last].2 {
            return false;
        }

        let (first_id, first_start, _) = spans[first];
        let first_text = self.doc.run(first_id).text().to_string();
        let prefix: String = first_text.chars().take(start.saturating_sub(first_start)).collect();

        if first == last {
            let suffix: String = first_text.chars().skip(end - first_start).collect();
            self.doc
                .set_run_text(first_id, format!("{}{}{}", prefix, replacement, suffix));
            return true;
        }

        let (last_id, last_start, _) = spans[last];
        let suffix: String = self.doc.run(last_id).text().chars().skip(end - last_start).collect();
        self.doc.set_run_text(last_id, suffix);

        for &(id, _, _) in &spans[first + 1..last] {
            self.doc.set_run_text(id, String::new());
        }

        if prefix.is_empty() {
            self.doc.set_run_text(first_id, replacement.to_string());
        } else {
            self.doc.set_run_text(first_id, prefix);
            self.doc.insert_run_after(para, first_id, replacement.to_string());
        }
        true
    }

    /// Replaces `[start, end)` of a cell's text (paragraphs joined by `\n`).
    fn splice_cell(&mut self, cell: usize, start: usize, end: usize, replacement: &str) -> bool {
        let paragraphs = self.doc.cell(cell).paragraphs.clone();
        let mut offsets = Vec::with_capacity(paragraphs.len());
        let mut pos = 0;
        for &p in &paragraphs {
            let len = char_len(&self.doc.paragraph_text(p));
            offsets.push((p, pos, pos + len));
            pos += len + 1;
        }

        let Some(fi) = offsets.iter().position(|&(_, _, pe)| pe >= start) else {
            return false;
        };
        let Some(li) = offsets.iter().rposition(|&(_, ps, _)| ps < end) else {
            return false;
        };
        if li < fi || end > offsets[li].2 {
            return false;
        }

        if fi == li {
            let (p, ps, _) = offsets[fi];
            return self.splice_paragraph(p, start - ps, end - ps, replacement);
        }

        // The edit spans paragraphs: collapse the affected paragraphs into
        // the first one as plain text.
        log::info!("Flattening cell {} paragraphs {}..={}", cell, fi, li);
        self.warn(WARN_CELL_FLATTENED);

        let region_start = offsets[fi].1;
        let combined = offsets[fi..=li]
            .iter()
            .map(|&(p, _, _)| self.doc.paragraph_text(p))
            .collect::<Vec<_>>()
            .join("\n");
        let chars: Vec<char> = combined.chars().collect();
        let (s, e) = (start - region_start, end - region_start);
        let flattened: String = chars[..s]
            .iter()
            .chain(replacement.chars().collect::<Vec<_>>().iter())
            .chain(chars[e..].iter())
            .collect();

        let first_para = offsets[fi].0;
        let first_runs = self.doc.paragraph(first_para).runs.clone();
        let Some((&head, rest)) = first_runs.split_first() else {
            return false;
        };
        self.doc.set_run_text(head, flattened);
        for &r in rest {
            self.doc.set_run_text(r, String::new());
        }
        for &(p, _, _) in &offsets[fi + 1..=li] {
            for r in self.doc.paragraph(p).runs.clone() {
                self.doc.set_run_text(r, String::new());
            }
        }
        true
    }
}
