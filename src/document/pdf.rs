//! Character-coordinate map for fixed-layout pages.
//!
//! Text is assembled page → line → glyph. Every line and every page is
//! closed by a `\n` placeholder with zero geometry, so each index of the
//! canonical text has exactly one [`CharPosition`].

use crate::text::CanonicalText;
use serde::Serialize;

/// Axis-aligned rectangle in page space (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        x0: 0.0,
        y0: 0.0,
        x1: 0.0,
        y1: 0.0,
    };

    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn padded(&self, margin: f32) -> Rect {
        Rect {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }
}

/// One glyph as reported by a backend. `bbox` is absent when the backend
/// only knows the enclosing line.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub character: char,
    pub bbox: Option<Rect>,
}

impl Glyph {
    pub fn new(character: char, bbox: Rect) -> Self {
        Self {
            character,
            bbox: Some(bbox),
        }
    }

    pub fn unboxed(character: char) -> Self {
        Self {
            character,
            bbox: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphLine {
    pub bbox: Rect,
    pub glyphs: Vec<Glyph>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageGlyphs {
    pub lines: Vec<GlyphLine>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharPosition {
    pub page_index: usize,
    pub bbox: Rect,
    pub character: char,
    /// Line or page break; never redacted.
    pub placeholder: bool,
}

impl CharPosition {
    fn placeholder(page_index: usize) -> Self {
        Self {
            page_index,
            bbox: Rect::ZERO,
            character: '\n',
            placeholder: true,
        }
    }

    /// Whether this position can contribute to a redaction rectangle.
    pub fn has_geometry(&self) -> bool {
        !self.placeholder && !self.bbox.is_zero()
    }
}

/// A rectangle on a specific page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageRect {
    pub page: usize,
    pub rect: Rect,
}

/// Canonical text plus one position per character.
#[derive(Debug, Clone, Default)]
pub struct CharMap {
    text: CanonicalText,
    positions: Vec<CharPosition>,
}

impl CharMap {
    pub fn text(&self) -> &CanonicalText {
        &self.text
    }

    pub fn positions(&self) -> &[CharPosition] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether the map can serve coordinate lookups at all.
    pub fn is_usable(&self) -> bool {
        !self.is_empty() && self.positions.len() == self.text.len()
    }

    /// One rectangle per run of consecutive same-page glyphs whose `y0`
    /// differs from the run's first glyph by less than `tolerance`.
    /// Empty when the span is out of range.
    pub fn rects_for_span(&self, start: usize, end: usize, tolerance: f32) -> Vec<PageRect> {
        if start >= end || end > self.positions.len() {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut current: Option<(usize, f32, Rect)> = None;
        for pos in self.positions[start..end].iter().filter(|p| p.has_geometry()) {
            match current.as_mut() {
                Some((page, line_y0, rect))
                    if *page == pos.page_index && (pos.bbox.y0 - *line_y0).abs() < tolerance =>
                {
                    *rect = rect.union(&pos.bbox);
                }
                _ => {
                    if let Some((page, _, rect)) = current.take() {
                        out.push(PageRect { page, rect });
                    }
                    current = Some((pos.page_index, pos.bbox.y0, pos.bbox));
                }
            }
        }
        if let Some((page, _, rect)) = current {
            out.push(PageRect { page, rect });
        }
        out
    }
}

/// Builds the character map for a document.
pub fn build_char_map(pages: &[PageGlyphs]) -> CharMap {
    let mut text = String::new();
    let mut positions = Vec::new();

    for (page_index, page) in pages.iter().enumerate() {
        for line in &page.lines {
            let n = line.glyphs.len().max(1) as f32;
            let step = line.bbox.width() / n;
            for (i, glyph) in line.glyphs.iter().enumerate() {
                let bbox = glyph.bbox.unwrap_or_else(|| {
                    let x0 = line.bbox.x0 + step * i as f32;
                    Rect::new(x0, line.bbox.y0, x0 + step, line.bbox.y1)
                });
                text.push(glyph.character);
                positions.push(CharPosition {
                    page_index,
                    bbox,
                    character: glyph.character,
                    placeholder: false,
                });
            }
            text.push('\n');
            positions.push(CharPosition::placeholder(page_index));
        }
        text.push('\n');
        positions.push(CharPosition::placeholder(page_index));
    }

    log::debug!("Character map: {} page(s), {} position(s)", pages.len(), positions.len());
    CharMap {
        text: CanonicalText::new(text),
        positions,
    }
}

/// Share of hiragana, katakana and CJK ideographs in `s`.
pub fn japanese_ratio(s: &str) -> f64 {
    let total = s.chars().count();
    if total == 0 {
        return 0.0;
    }
    let jp = s
        .chars()
        .filter(|&c| matches!(c as u32, 0x3040..=0x30FF | 0x4E00..=0x9FFF))
        .count();
    jp as f64 / total as f64
}
