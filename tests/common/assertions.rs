//! Custom assertions over redacted documents.

use legal_redactor::document::docx::{map_segments, DocxDocument};
use std::path::Path;

/// Canonical text of a word-processor file.
pub fn docx_text(path: &Path) -> String {
    let doc = DocxDocument::open(path)
        .unwrap_or_else(|e| panic!("Failed to open '{}': {}", path.display(), e));
    map_segments(&doc).text.as_str().to_string()
}

/// Asserts that `pattern` no longer occurs in a redacted word-processor file.
///
/// # Panics
/// Panics if the pattern is still present.
pub fn assert_docx_redacted(path: &Path, pattern: &str) {
    let text = docx_text(path);
    assert!(
        !text.contains(pattern),
        "Pattern '{}' should be redacted but was found in '{}'.\nText: {}",
        pattern,
        path.display(),
        text
    );
}

/// Asserts that `pattern` is still present in a word-processor file.
///
/// # Panics
/// Panics if the pattern is missing.
pub fn assert_docx_preserved(path: &Path, pattern: &str) {
    let text = docx_text(path);
    assert!(
        text.contains(pattern),
        "Pattern '{}' should be preserved but was not found in '{}'.\nText: {}",
        pattern,
        path.display(),
        text
    );
}
