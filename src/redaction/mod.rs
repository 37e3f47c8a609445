//! Redaction strategies and the service that routes documents to them.
//!
//! One strategy per format: plain text, word-processor runs, and MuPDF
//! quad redaction. The service owns the analyzer and picks the strategy from
//! the input's extension.

pub mod docx;
pub mod quad;
pub mod secure;
pub mod strategy;
pub mod text;

pub use docx::DocxRedactionStrategy;
pub use quad::{LocateFailure, PdfBackend, PdfStats, Placement, QuadRedactor};
pub use secure::{redact_with_backend, MupdfBackend, SecureRedactionStrategy};
pub use strategy::{DocumentFormat, FormatWarnings, RedactionReport, RedactionStrategy};
pub use text::TextRedactionStrategy;

use crate::analysis::Analyzer;
use crate::config::{Policy, RuntimeOverrides};
use crate::error::{RedactorError, RedactorResult};
use std::path::Path;

/// Redaction service coordinating strategy execution.
pub struct RedactionService {
    analyzer: Analyzer,
    strategies: Vec<Box<dyn RedactionStrategy>>,
}

impl RedactionService {
    /// Builds the analyzer from `policy` with the default strategies.
    pub fn new(policy: Policy) -> RedactorResult<Self> {
        Ok(Self::with_analyzer(Analyzer::new(policy)?))
    }

    pub fn with_analyzer(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            strategies: vec![
                Box::new(TextRedactionStrategy::new()),
                Box::new(DocxRedactionStrategy::new()),
                Box::new(SecureRedactionStrategy::new()),
            ],
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    fn strategy_for(&self, input: &Path) -> RedactorResult<&dyn RedactionStrategy> {
        let format = DocumentFormat::from_path(input)?;
        self.strategies
            .iter()
            .find(|s| s.format() == format)
            .map(|s| s.as_ref())
            .ok_or_else(|| RedactorError::InvalidInput {
                parameter: "input".to_string(),
                reason: format!("no strategy registered for {:?}", format),
            })
    }

    /// Redacts `input` into `output`.
    pub fn redact(
        &self,
        input: &Path,
        output: &Path,
        overrides: &RuntimeOverrides,
    ) -> RedactorResult<RedactionReport> {
        if !input.exists() {
            return Err(RedactorError::Io {
                path: input.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Input file does not exist",
                ),
            });
        }

        let strategy = self.strategy_for(input)?;
        log::info!("Redacting {} with {}", input.display(), strategy.name());
        strategy.redact(input, output, &self.analyzer, overrides)
    }

    /// Canonical text of a document.
    pub fn extract_text(&self, input: &Path) -> RedactorResult<String> {
        self.strategy_for(input)?.extract_text(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_is_io_error() {
        let service = RedactionService::new(Policy::default()).unwrap();
        let err = service
            .redact(Path::new("/nonexistent/a.txt"), Path::new("/tmp/b.txt"), &RuntimeOverrides::new())
            .unwrap_err();
        assert!(matches!(err, RedactorError::Io { .. }));
    }

    #[test]
    fn test_strategy_chosen_by_extension() {
        let service = RedactionService::new(Policy::default()).unwrap();
        assert_eq!(service.strategy_for(Path::new("a.DOCX")).unwrap().name(), "DocxRunSplice");
        assert_eq!(service.strategy_for(Path::new("a.md")).unwrap().name(), "PlainText");
        assert!(service.strategy_for(Path::new("a.rtf")).is_err());
    }
}
