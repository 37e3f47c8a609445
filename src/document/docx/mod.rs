//! Word-processor documents: segment mapping over the run model and
//! write-back of resolved hits.

pub mod model;
pub mod splice;

pub use model::{DocxDocument, PartKind};
pub use splice::{RunSplicer, SpliceEdit, SpliceOutcome};

use super::{ContainerRef, SegmentKind, SegmentMap, SegmentMapBuilder};
use crate::analysis::label::BLACK_CHAR;
use crate::analysis::{Diagnostic, Hit};
use crate::text::CanonicalText;

/// Canonical text of a document plus the map back into its containers.
#[derive(Debug, Clone)]
pub struct MappedDocument {
    pub text: CanonicalText,
    pub map: SegmentMap,
    pub warnings: Vec<String>,
}

/// Lays out headers, footers and the body as segments. Within each part the
/// paragraphs outside tables come first, then every cell in document order.
pub fn map_segments(doc: &DocxDocument) -> MappedDocument {
    let mut builder = SegmentMapBuilder::new();
    for index in doc.parts_in_order() {
        let part = doc.part(index);
        let (para_kind, cell_kind) = match part.kind {
            PartKind::Header => (SegmentKind::Header, SegmentKind::Header),
            PartKind::Footer => (SegmentKind::Footer, SegmentKind::Footer),
            PartKind::Body => (SegmentKind::Paragraph, SegmentKind::Cell),
        };
        for &p in &part.paragraphs {
            builder.push(para_kind, ContainerRef::Paragraph(p), doc.paragraph_text(p));
        }
        for &c in &part.cells {
            builder.push(cell_kind, ContainerRef::Cell(c), doc.cell_text(c));
        }
    }

    let (text, map) = builder.finish();
    log::debug!("Mapped {} segment(s), {} chars", map.len(), text.len());
    MappedDocument {
        text,
        map,
        warnings: doc.warnings().to_vec(),
    }
}

/// Translates hits into container-local edits.
///
/// A hit that lands in no segment is flagged and dropped. A hit that crosses a
/// boundary is split into one edit per piece and flagged; black fill is sized
/// to each piece, labels are repeated.
pub fn plan_edits(map: &SegmentMap, hits: &mut [Hit]) -> Vec<SpliceEdit> {
    let mut edits = Vec::new();
    for (index, hit) in hits.iter_mut().enumerate().filter(|(_, h)| h.needs_write()) {
        let located = map.locate(hit.start, hit.end);
        if located.pieces.is_empty() {
            log::warn!("No segment covers hit [{}, {})", hit.start, hit.end);
            hit.flag(Diagnostic::SegmentNotFound);
            continue;
        }

        let split = located.pieces.len() > 1;
        if located.crosses_boundary {
            hit.flag(Diagnostic::SegmentOverlapApplied);
        }
        let black = !hit.replacement.is_empty() && hit.replacement.chars().all(|c| c == BLACK_CHAR);

        for piece in &located.pieces {
            let Some(segment) = map.get(piece.segment) else {
                continue;
            };
            let replacement = if split && black {
                std::iter::repeat(BLACK_CHAR)
                    .take(piece.local_end - piece.local_start)
                    .collect()
            } else {
                hit.replacement.clone()
            };
            edits.push(SpliceEdit {
                container: segment.container,
                local_start: piece.local_start,
                local_end: piece.local_end,
                replacement,
                hit: index,
            });
        }
    }
    edits
}

/// Writes hits back into the document. Returns the number of applied edits
/// and the splicer's warnings. A hit with an edit the splicer could not write
/// is flagged as not found.
pub fn apply_hits(doc: &mut DocxDocument, map: &SegmentMap, hits: &mut [Hit]) -> (usize, Vec<String>) {
    let edits = plan_edits(map, hits);
    let outcome = RunSplicer::new(doc).apply(edits);
    for &index in &outcome.failed_hits {
        if let Some(hit) = hits.get_mut(index) {
            hit.flag(Diagnostic::SegmentNotFound);
        }
    }
    (outcome.applied, outcome.warnings)
}
