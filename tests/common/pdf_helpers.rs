//! PDF inspection helpers and an in-memory backend.

use anyhow::Result;
use legal_redactor::document::pdf::{Glyph, GlyphLine, PageGlyphs, Rect};
use legal_redactor::redaction::PdfBackend;
use legal_redactor::RedactorResult;
use std::path::Path;

/// Glyph width used by [`FakePdfBackend`].
const GLYPH_W: f32 = 10.0;
/// Glyph height used by [`FakePdfBackend`].
const GLYPH_H: f32 = 12.0;

/// Backend holding laid-out text in memory. Redactions remove every glyph
/// whose center lies inside a queued rectangle.
#[derive(Debug, Clone, Default)]
pub struct FakePdfBackend {
    pub pages: Vec<PageGlyphs>,
    pub queued: Vec<(usize, Rect)>,
    pub applied: Vec<(usize, Rect)>,
    /// Return no glyphs, as for a scanned page.
    pub without_char_map: bool,
}

impl FakePdfBackend {
    /// One page per inner slice; each `(y, text)` is a line starting at x=0.
    pub fn from_pages(pages: &[&[(f32, &str)]]) -> Self {
        let pages = pages
            .iter()
            .map(|lines| PageGlyphs {
                lines: lines.iter().map(|(y, text)| Self::line(*y, text)).collect(),
            })
            .collect();
        Self::from_glyphs(pages)
    }

    pub fn from_glyphs(pages: Vec<PageGlyphs>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    fn line(y: f32, text: &str) -> GlyphLine {
        let glyphs: Vec<Glyph> = text
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let x = GLYPH_W * i as f32;
                Glyph::new(c, Rect::new(x, y, x + GLYPH_W, y + GLYPH_H))
            })
            .collect();
        GlyphLine {
            bbox: Rect::new(0.0, y, GLYPH_W * glyphs.len() as f32, y + GLYPH_H),
            glyphs,
        }
    }

    /// Remaining text of a page, lines joined by `\n`.
    pub fn page_text(&self, page: usize) -> String {
        self.pages[page]
            .lines
            .iter()
            .map(|l| l.glyphs.iter().map(|g| g.character).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn covers(rect: &Rect, glyph: &Rect) -> bool {
    let cx = (glyph.x0 + glyph.x1) / 2.0;
    let cy = (glyph.y0 + glyph.y1) / 2.0;
    rect.x0 <= cx && cx <= rect.x1 && rect.y0 <= cy && cy <= rect.y1
}

impl PdfBackend for FakePdfBackend {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_glyphs(&mut self) -> RedactorResult<Vec<PageGlyphs>> {
        if self.without_char_map {
            return Ok(Vec::new());
        }
        Ok(self.pages.clone())
    }

    fn search(&mut self, page: usize, needle: &str, max_hits: usize) -> RedactorResult<Vec<Rect>> {
        let n = needle.chars().count();
        let mut out = Vec::new();
        if n == 0 {
            return Ok(out);
        }
        for line in &self.pages[page].lines {
            let chars: Vec<char> = line.glyphs.iter().map(|g| g.character).collect();
            let target: Vec<char> = needle.chars().collect();
            for start in 0..chars.len().saturating_sub(n - 1) {
                if chars[start..start + n] == target[..] {
                    let boxes: Vec<Rect> = line.glyphs[start..start + n]
                        .iter()
                        .filter_map(|g| g.bbox)
                        .collect();
                    if let Some(first) = boxes.first() {
                        out.push(boxes.iter().fold(*first, |acc, b| acc.union(b)));
                    }
                }
            }
        }
        out.truncate(max_hits);
        Ok(out)
    }

    fn add_redaction(&mut self, page: usize, rect: Rect) -> RedactorResult<()> {
        self.queued.push((page, rect));
        Ok(())
    }

    fn apply_redactions(&mut self) -> RedactorResult<usize> {
        let queued = std::mem::take(&mut self.queued);
        let mut pages: Vec<usize> = queued.iter().map(|(p, _)| *p).collect();
        pages.sort_unstable();
        pages.dedup();

        for (page, rect) in &queued {
            for line in &mut self.pages[*page].lines {
                line.glyphs.retain(|g| g.bbox.map_or(true, |b| !covers(rect, &b)));
            }
        }
        self.applied.extend(queued);
        Ok(pages.len())
    }

    fn save(&mut self, _output: &Path) -> RedactorResult<()> {
        Ok(())
    }
}

/// Extracts text from a PDF file with an independent extractor.
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    let bytes = std::fs::read(pdf_path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| anyhow::anyhow!("Failed to extract text: {}", e))
}

/// Validates that a PDF is loadable and has basic structure.
pub fn is_valid_pdf(pdf_path: &Path) -> bool {
    ::lopdf::Document::load(pdf_path).is_ok()
}
