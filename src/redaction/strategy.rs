//! Redaction strategy trait and supporting types.
//!
//! A strategy owns one document format: it extracts canonical text, runs the
//! analyzer over it and writes the plan back in that format's native way.

use super::quad::PdfStats;
use crate::analysis::{Analysis, Analyzer};
use crate::config::RuntimeOverrides;
use crate::error::{RedactorError, RedactorResult};
use serde::Serialize;
use std::path::Path;

/// Document formats the service can route to a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Docx,
    Pdf,
}

impl DocumentFormat {
    /// Picks the format from a file extension, case-insensitively.
    pub fn from_path(path: &Path) -> RedactorResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "text" | "md" => Ok(Self::Text),
            "docx" => Ok(Self::Docx),
            "pdf" => Ok(Self::Pdf),
            other => Err(RedactorError::InvalidInput {
                parameter: "input".to_string(),
                reason: format!("unsupported file extension '{}'", other),
            }),
        }
    }
}

/// Structural warnings per format, as consumed by the review payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormatWarnings {
    pub docx: Vec<String>,
    pub pdf: Vec<String>,
}

impl FormatWarnings {
    pub fn is_empty(&self) -> bool {
        self.docx.is_empty() && self.pdf.is_empty()
    }

    pub(crate) fn push_unique(list: &mut Vec<String>, warning: impl Into<String>) {
        let warning = warning.into();
        if !list.contains(&warning) {
            list.push(warning);
        }
    }
}

/// Outcome of one extract-analyze-write cycle.
#[derive(Debug, Clone)]
pub struct RedactionReport {
    pub format: DocumentFormat,
    /// Hits carry the writer's review flags and diagnostics.
    pub analysis: Analysis,
    pub canonical_text: String,
    pub warnings: FormatWarnings,
    /// Container edits (DOCX) or hits placed (PDF) or hits applied (text).
    pub instances_redacted: usize,
    pub pdf_stats: Option<PdfStats>,
}

impl RedactionReport {
    pub fn has_redactions(&self) -> bool {
        self.instances_redacted > 0
    }
}

/// Strategy for redacting one document format.
pub trait RedactionStrategy: Send + Sync {
    fn format(&self) -> DocumentFormat;

    /// Extracts, analyzes and writes `output`.
    fn redact(
        &self,
        input: &Path,
        output: &Path,
        analyzer: &Analyzer,
        overrides: &RuntimeOverrides,
    ) -> RedactorResult<RedactionReport>;

    /// Canonical text exactly as the analyzer would see it.
    fn extract_text(&self, input: &Path) -> RedactorResult<String>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;

    /// Whether redacted content is physically removed rather than covered.
    fn is_secure(&self) -> bool;
}

pub(crate) fn doc_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
