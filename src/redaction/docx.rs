//! Word-processor strategy: segment map, analysis, run splicing.

use super::strategy::{doc_id, DocumentFormat, FormatWarnings, RedactionReport, RedactionStrategy};
use crate::analysis::Analyzer;
use crate::config::RuntimeOverrides;
use crate::document::docx::{self, DocxDocument};
use crate::error::RedactorResult;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct DocxRedactionStrategy;

impl DocxRedactionStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Runs the pipeline on an already-open document and rewrites it in
    /// place.
    pub fn redact_document(
        &self,
        doc: &mut DocxDocument,
        doc_id: &str,
        analyzer: &Analyzer,
        overrides: &RuntimeOverrides,
    ) -> RedactionReport {
        let mapped = docx::map_segments(doc);
        for warning in &mapped.warnings {
            log::warn!("{}: {}", doc_id, warning);
        }

        let mut analysis = analyzer.run(&mapped.text, doc_id, overrides);
        let (applied, splice_warnings) = docx::apply_hits(doc, &mapped.map, &mut analysis.hits);

        let mut warnings = FormatWarnings::default();
        for w in mapped.warnings.iter().chain(&splice_warnings) {
            FormatWarnings::push_unique(&mut warnings.docx, w.as_str());
        }

        RedactionReport {
            format: DocumentFormat::Docx,
            analysis,
            canonical_text: mapped.text.into_string(),
            warnings,
            instances_redacted: applied,
            pdf_stats: None,
        }
    }
}

impl RedactionStrategy for DocxRedactionStrategy {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn redact(
        &self,
        input: &Path,
        output: &Path,
        analyzer: &Analyzer,
        overrides: &RuntimeOverrides,
    ) -> RedactorResult<RedactionReport> {
        let mut doc = DocxDocument::open(input)?;
        let report = self.redact_document(&mut doc, &doc_id(input), analyzer, overrides);
        doc.save(output)?;
        Ok(report)
    }

    fn extract_text(&self, input: &Path) -> RedactorResult<String> {
        let doc = DocxDocument::open(input)?;
        Ok(docx::map_segments(&doc).text.into_string())
    }

    fn name(&self) -> &str {
        "DocxRunSplice"
    }

    fn is_secure(&self) -> bool {
        true
    }
}
