//! Error types for the redaction library.
//!
//! Only document-level failures (open, parse, save) are errors. A single
//! malformed span never produces an `Err`; it is recorded on the hit as a
//! review reason instead.

use std::io;
use std::path::PathBuf;

/// Result type alias for redaction operations.
pub type RedactorResult<T> = Result<T, RedactorError>;

/// Error type for all redaction operations.
///
/// Variants are grouped by source so callers can tell a missing file from a
/// corrupt container from a backend failure.
#[derive(Debug, thiserror::Error)]
pub enum RedactorError {
    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Error occurred during PDF processing
    #[error("PDF processing error{}: {message}", .page.map(|p| format!(" on page {}", p)).unwrap_or_default())]
    PdfProcessing {
        message: String,
        page: Option<usize>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A word-processor container could not be read or rebuilt
    #[error("DOCX error in part '{part}': {reason}")]
    DocxFormat { part: String, reason: String },

    /// Pattern matching or regex compilation error
    #[error("Pattern error for '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },

    /// Text extraction failed
    #[error("Text extraction failed for '{}': {reason}", .path.display())]
    TextExtraction { path: PathBuf, reason: String },

    /// A candidate source failed on its input
    #[error("Detector '{detector}' failed: {reason}")]
    Detector { detector: String, reason: String },

    /// Policy could not be parsed or is inconsistent
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidInput { parameter: String, reason: String },

    /// Backend-specific error (MuPDF, zip, XML, ...)
    #[error("{backend} backend error: {message}")]
    BackendError {
        backend: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RedactorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn docx(part: impl Into<String>, reason: impl ToString) -> Self {
        Self::DocxFormat {
            part: part.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<io::Error> for RedactorError {
    fn from(err: io::Error) -> Self {
        Self::BackendError {
            backend: "std::io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<regex::Error> for RedactorError {
    fn from(err: regex::Error) -> Self {
        Self::PatternError {
            pattern: "<unknown>".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for RedactorError {
    fn from(err: anyhow::Error) -> Self {
        Self::BackendError {
            backend: "anyhow".to_string(),
            message: err.to_string(),
            source: None,
        }
    }
}

impl From<zip::result::ZipError> for RedactorError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::BackendError {
            backend: "zip".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<quick_xml::Error> for RedactorError {
    fn from(err: quick_xml::Error) -> Self {
        Self::BackendError {
            backend: "quick-xml".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for RedactorError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for RedactorError {
    fn from(err: serde_json::Error) -> Self {
        Self::BackendError {
            backend: "serde_json".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RedactorError::DocxFormat {
            part: "word/document.xml".to_string(),
            reason: "unexpected EOF".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DOCX error in part 'word/document.xml': unexpected EOF"
        );
    }

    #[test]
    fn test_pdf_error_page_suffix() {
        let err = RedactorError::PdfProcessing {
            message: "bad annotation".to_string(),
            page: Some(3),
            source: None,
        };
        assert_eq!(err.to_string(), "PDF processing error on page 3: bad annotation");
    }
}
