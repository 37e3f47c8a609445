//! Plain-text strategy.

use super::strategy::{doc_id, DocumentFormat, FormatWarnings, RedactionReport, RedactionStrategy};
use crate::analysis::Analyzer;
use crate::config::RuntimeOverrides;
use crate::error::{RedactorError, RedactorResult};
use crate::text::CanonicalText;
use std::path::Path;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes UTF-8, dropping a leading BOM and replacing invalid bytes.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, Default)]
pub struct TextRedactionStrategy;

impl TextRedactionStrategy {
    pub fn new() -> Self {
        Self
    }

    fn read(&self, input: &Path) -> RedactorResult<CanonicalText> {
        let bytes = std::fs::read(input).map_err(|e| RedactorError::io(input, e))?;
        Ok(CanonicalText::new(decode_text(&bytes)))
    }
}

impl RedactionStrategy for TextRedactionStrategy {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn redact(
        &self,
        input: &Path,
        output: &Path,
        analyzer: &Analyzer,
        overrides: &RuntimeOverrides,
    ) -> RedactorResult<RedactionReport> {
        let text = self.read(input)?;
        let analysis = analyzer.run(&text, &doc_id(input), overrides);
        std::fs::write(output, analysis.masked_text.as_bytes()).map_err(|e| RedactorError::io(output, e))?;

        Ok(RedactionReport {
            format: DocumentFormat::Text,
            instances_redacted: analysis.hits.iter().filter(|h| h.needs_write()).count(),
            analysis,
            canonical_text: text.into_string(),
            warnings: FormatWarnings::default(),
            pdf_stats: None,
        })
    }

    fn extract_text(&self, input: &Path) -> RedactorResult<String> {
        Ok(self.read(input)?.into_string())
    }

    fn name(&self) -> &str {
        "PlainText"
    }

    fn is_secure(&self) -> bool {
        true
    }
}
