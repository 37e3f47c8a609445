//! Segment mapping: canonical text plus a reversible map back to the
//! containers it was read from.
//!
//! Segments are laid out in traversal order, each followed by one `\n`
//! separator, so `text.len() == Σ segment.len() + segments.len()`.

pub mod docx;
pub mod pdf;

use crate::text::{char_len, CanonicalText};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Paragraph,
    Cell,
    Header,
    Footer,
}

impl SegmentKind {
    fn prefix(self) -> char {
        match self {
            Self::Paragraph => 'P',
            Self::Cell => 'C',
            Self::Header => 'H',
            Self::Footer => 'F',
        }
    }
}

/// Non-owning handle to a container in a parsed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Paragraph(usize),
    Cell(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub id: String,
    pub kind: SegmentKind,
    pub container: ContainerRef,
    pub local_text: String,
    pub global_start: usize,
    pub global_end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.global_end - self.global_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {})", self.id, self.global_start, self.global_end)
    }
}

/// Part of a hit that falls inside one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPiece {
    pub segment: usize,
    pub local_start: usize,
    pub local_end: usize,
}

/// Where a global range lands in the segment map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub pieces: Vec<SegmentPiece>,
    /// The range touches more than one segment or a separator.
    pub crosses_boundary: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentMap {
    segments: Vec<Segment>,
}

impl SegmentMap {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments intersecting `[start, end)`, with local offsets.
    pub fn locate(&self, start: usize, end: usize) -> Located {
        let mut pieces = Vec::new();
        if start >= end {
            return Located {
                pieces,
                crosses_boundary: false,
            };
        }

        let first = self.segments.partition_point(|s| s.global_end <= start);
        for (i, seg) in self.segments.iter().enumerate().skip(first) {
            if seg.global_start >= end {
                break;
            }
            let s = start.max(seg.global_start);
            let e = end.min(seg.global_end);
            if s < e {
                pieces.push(SegmentPiece {
                    segment: i,
                    local_start: s - seg.global_start,
                    local_end: e - seg.global_start,
                });
            }
        }

        let crosses_boundary = match pieces.as_slice() {
            [only] => {
                let seg = &self.segments[only.segment];
                start < seg.global_start || end > seg.global_end
            }
            [] => false,
            _ => true,
        };
        Located {
            pieces,
            crosses_boundary,
        }
    }

    /// Rebuilds the canonical text from the segments.
    pub fn reconstruct(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push_str(&seg.local_text);
            out.push('\n');
        }
        out
    }
}

/// Accumulates segments and their canonical text in traversal order.
#[derive(Debug, Default)]
pub struct SegmentMapBuilder {
    text: String,
    pos: usize,
    segments: Vec<Segment>,
    counters: [usize; 4],
}

impl SegmentMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: SegmentKind, container: ContainerRef, local_text: String) {
        let slot = kind as usize;
        let id = format!("{}{:06}", kind.prefix(), self.counters[slot]);
        self.counters[slot] += 1;

        let len = char_len(&local_text);
        self.text.push_str(&local_text);
        self.text.push('\n');
        self.segments.push(Segment {
            id,
            kind,
            container,
            local_text,
            global_start: self.pos,
            global_end: self.pos + len,
        });
        self.pos += len + 1;
    }

    pub fn finish(self) -> (CanonicalText, SegmentMap) {
        (
            CanonicalText::new(self.text),
            SegmentMap {
                segments: self.segments,
            },
        )
    }
}
