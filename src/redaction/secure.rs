//! Secure PDF redaction using MuPDF.
//!
//! Redaction annotations are placed at exact glyph coordinates and applied
//! with `pdf_redact_page`, which removes the underlying content rather than
//! drawing over it.

use super::quad::{PdfBackend, QuadRedactor};
use super::strategy::{doc_id, DocumentFormat, FormatWarnings, RedactionReport, RedactionStrategy};
use crate::analysis::Analyzer;
use crate::config::RuntimeOverrides;
use crate::document::pdf::{build_char_map, japanese_ratio, Glyph, GlyphLine, PageGlyphs, Rect};
use crate::error::{RedactorError, RedactorResult};
use std::collections::BTreeMap;
use std::path::Path;

use mupdf::pdf::{PdfAnnotationType, PdfDocument, PdfPage};
use mupdf::{Quad, Rect as MuRect, TextPageFlags};

pub const WARN_LOW_JAPANESE_RATIO: &str = "warning:pdf_low_japanese_ratio";
pub const WARN_NO_CHAR_MAP: &str = "warning:pdf_no_char_map";

fn path_str<'p>(path: &'p Path, parameter: &str) -> RedactorResult<&'p str> {
    path.to_str().ok_or_else(|| RedactorError::InvalidInput {
        parameter: parameter.to_string(),
        reason: "Path contains invalid UTF-8".to_string(),
    })
}

fn quad_bounds(quad: &Quad) -> Rect {
    Rect {
        x0: quad.ul.x.min(quad.ll.x).min(quad.ur.x).min(quad.lr.x),
        y0: quad.ul.y.min(quad.ll.y).min(quad.ur.y).min(quad.lr.y),
        x1: quad.ul.x.max(quad.ll.x).max(quad.ur.x).max(quad.lr.x),
        y1: quad.ul.y.max(quad.ll.y).max(quad.ur.y).max(quad.lr.y),
    }
}

/// [`PdfBackend`] over an open MuPDF document.
pub struct MupdfBackend {
    doc: PdfDocument,
    page_count: usize,
    pending: BTreeMap<usize, Vec<Rect>>,
}

impl MupdfBackend {
    pub fn open(input: &Path) -> RedactorResult<Self> {
        let doc = PdfDocument::open(path_str(input, "input")?).map_err(|e| {
            RedactorError::PdfProcessing {
                message: "Failed to open PDF with MuPDF".to_string(),
                page: None,
                source: Some(Box::new(e)),
            }
        })?;
        let page_count = doc.page_count().map_err(|e| RedactorError::BackendError {
            backend: "MuPDF".to_string(),
            message: format!("Failed to get page count: {}", e),
            source: Some(Box::new(e)),
        })?;
        Ok(Self {
            doc,
            page_count: page_count.max(0) as usize,
            pending: BTreeMap::new(),
        })
    }

    fn load_page(&self, page: usize) -> RedactorResult<mupdf::Page> {
        self.doc
            .load_page(page as i32)
            .map_err(|e| RedactorError::PdfProcessing {
                message: format!("Failed to load page {}", page + 1),
                page: Some(page + 1),
                source: Some(Box::new(e)),
            })
    }
}

impl PdfBackend for MupdfBackend {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_glyphs(&mut self) -> RedactorResult<Vec<PageGlyphs>> {
        let mut pages = Vec::with_capacity(self.page_count);
        for index in 0..self.page_count {
            let page = self.load_page(index)?;
            let text_page = page
                .to_text_page(TextPageFlags::PRESERVE_WHITESPACE)
                .map_err(|e| RedactorError::PdfProcessing {
                    message: "Failed to extract text".to_string(),
                    page: Some(index + 1),
                    source: Some(Box::new(e)),
                })?;

            let mut lines = Vec::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let b = line.bounds();
                    let glyphs = line
                        .chars()
                        .filter_map(|ch| {
                            let c = ch.char()?;
                            let bbox = quad_bounds(&ch.quad());
                            Some(if bbox.width() > 0.0 && bbox.height() > 0.0 {
                                Glyph::new(c, bbox)
                            } else {
                                Glyph::unboxed(c)
                            })
                        })
                        .collect();
                    lines.push(GlyphLine {
                        bbox: Rect::new(b.x0, b.y0, b.x1, b.y1),
                        glyphs,
                    });
                }
            }
            pages.push(PageGlyphs { lines });
        }
        Ok(pages)
    }

    fn search(&mut self, page: usize, needle: &str, max_hits: usize) -> RedactorResult<Vec<Rect>> {
        let hits = self
            .load_page(page)?
            .search(needle, max_hits as u32)
            .map_err(|e| RedactorError::BackendError {
                backend: "MuPDF".to_string(),
                message: format!("Search failed for pattern: {}", needle),
                source: Some(Box::new(e)),
            })?;
        Ok(hits.into_iter().map(|quad| quad_bounds(&quad)).collect())
    }

    fn add_redaction(&mut self, page: usize, rect: Rect) -> RedactorResult<()> {
        if page >= self.page_count {
            return Err(RedactorError::InvalidInput {
                parameter: "page".to_string(),
                reason: format!("page {} out of range", page + 1),
            });
        }
        self.pending.entry(page).or_default().push(rect);
        Ok(())
    }

    fn apply_redactions(&mut self) -> RedactorResult<usize> {
        let pending = std::mem::take(&mut self.pending);
        let mut modified = 0;
        for (index, rects) in pending {
            let page = self.load_page(index)?;
            let mut pdf_page = match PdfPage::try_from(page) {
                Ok(p) => p,
                Err(_) => continue,
            };

            for rect in &rects {
                let annot = pdf_page
                    .create_annotation(PdfAnnotationType::Redact)
                    .map_err(|e| RedactorError::PdfProcessing {
                        message: "Failed to create redaction annotation".to_string(),
                        page: Some(index + 1),
                        source: Some(Box::new(e)),
                    })?;
                let mu_rect = MuRect {
                    x0: rect.x0,
                    y0: rect.y0,
                    x1: rect.x1,
                    y1: rect.y1,
                };
                unsafe {
                    ffi::set_annotation_rect(&annot, mu_rect);
                }
            }

            pdf_page
                .redact()
                .map_err(|e| RedactorError::PdfProcessing {
                    message: format!("Failed to apply redactions on page {}", index + 1),
                    page: Some(index + 1),
                    source: Some(Box::new(e)),
                })?;
            log::debug!("Page {}: {} region(s) removed", index + 1, rects.len());
            modified += 1;
        }
        Ok(modified)
    }

    fn save(&mut self, output: &Path) -> RedactorResult<()> {
        self.doc
            .save(path_str(output, "output")?)
            .map_err(|e| RedactorError::PdfProcessing {
                message: "Failed to save redacted PDF".to_string(),
                page: None,
                source: Some(Box::new(e)),
            })?;
        pin_file_id(output)
    }
}

/// Copies the first trailer `/ID` element over the second. MuPDF fills the
/// second with fresh random bytes on every save.
fn pin_file_id(path: &Path) -> RedactorResult<()> {
    let failed = |action: &str, e: &dyn std::fmt::Display| RedactorError::PdfProcessing {
        message: format!("Failed to {} saved PDF: {}", action, e),
        page: None,
        source: None,
    };

    let mut doc = lopdf::Document::load(path).map_err(|e| failed("reload", &e))?;
    let first = match doc.trailer.get(b"ID").and_then(|id| id.as_array()) {
        Ok(id) if id.len() >= 2 => {
            if id[0] == id[1] {
                return Ok(());
            }
            id[0].clone()
        }
        _ => return Ok(()),
    };
    doc.trailer
        .set("ID", lopdf::Object::Array(vec![first.clone(), first]));
    doc.save(path).map_err(|e| failed("rewrite", &e))?;
    log::debug!("Pinned file identifier of {}", path.display());
    Ok(())
}

/// Runs extraction, analysis and geometric redaction against any backend.
/// The caller saves the backend afterwards.
pub fn redact_with_backend(
    backend: &mut dyn PdfBackend,
    doc_id: &str,
    analyzer: &Analyzer,
    overrides: &RuntimeOverrides,
) -> RedactorResult<RedactionReport> {
    let pages = backend.page_glyphs()?;
    let map = build_char_map(&pages);
    let policy = analyzer.policy();

    let mut warnings = FormatWarnings::default();
    let ratio = japanese_ratio(map.text().as_str());
    if ratio < policy.pdf.japanese_ratio_threshold {
        log::warn!("{}: Japanese character ratio {:.2} below threshold", doc_id, ratio);
        FormatWarnings::push_unique(&mut warnings.pdf, WARN_LOW_JAPANESE_RATIO);
    }
    if !map.is_usable() {
        log::warn!("{}: no character map", doc_id);
        FormatWarnings::push_unique(&mut warnings.pdf, WARN_NO_CHAR_MAP);
    }

    let mut analysis = analyzer.run(map.text(), doc_id, overrides);
    let stats = QuadRedactor::new(&policy.pdf).redact(backend, &map, &mut analysis.hits)?;

    Ok(RedactionReport {
        format: DocumentFormat::Pdf,
        instances_redacted: stats.coord_mapped + stats.search_fallback,
        analysis,
        canonical_text: map.text().as_str().to_string(),
        warnings,
        pdf_stats: Some(stats),
    })
}

/// PDF strategy backed by MuPDF.
#[derive(Debug, Clone, Default)]
pub struct SecureRedactionStrategy;

impl SecureRedactionStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RedactionStrategy for SecureRedactionStrategy {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn redact(
        &self,
        input: &Path,
        output: &Path,
        analyzer: &Analyzer,
        overrides: &RuntimeOverrides,
    ) -> RedactorResult<RedactionReport> {
        let mut backend = MupdfBackend::open(input)?;
        let report = redact_with_backend(&mut backend, &doc_id(input), analyzer, overrides)?;

        if report.has_redactions() {
            backend.save(output)?;
        } else {
            std::fs::copy(input, output).map_err(|e| RedactorError::io(output, e))?;
        }
        Ok(report)
    }

    fn extract_text(&self, input: &Path) -> RedactorResult<String> {
        let mut backend = MupdfBackend::open(input)?;
        let pages = backend.page_glyphs()?;
        Ok(build_char_map(&pages).text().as_str().to_string())
    }

    fn name(&self) -> &str {
        "SecureRedaction"
    }

    fn is_secure(&self) -> bool {
        true
    }
}

/// FFI helpers for MuPDF annotation operations.
mod ffi {
    use mupdf::pdf::PdfAnnotation;
    use mupdf::Rect;

    /// Sets the rectangle for a PDF annotation via FFI.
    ///
    /// # Safety
    /// The annotation must be valid and the context properly initialized.
    pub unsafe fn set_annotation_rect(annot: &PdfAnnotation, rect: Rect) {
        #[repr(C)]
        struct PdfAnnotRaw {
            inner: *mut mupdf_sys::pdf_annot,
        }

        let annot_raw = std::mem::transmute::<&PdfAnnotation, &PdfAnnotRaw>(annot);
        let ctx = mupdf_sys::mupdf_new_base_context();

        if !ctx.is_null() {
            let fz_rect = mupdf_sys::fz_rect {
                x0: rect.x0,
                y0: rect.y0,
                x1: rect.x1,
                y1: rect.y1,
            };

            mupdf_sys::pdf_set_annot_rect(ctx, annot_raw.inner, fz_rect);
            mupdf_sys::mupdf_drop_base_context(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_identity() {
        let strategy = SecureRedactionStrategy::new();
        assert_eq!(strategy.name(), "SecureRedaction");
        assert_eq!(strategy.format(), DocumentFormat::Pdf);
        assert!(strategy.is_secure());
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(MupdfBackend::open(Path::new("/nonexistent/none.pdf")).is_err());
    }
}
