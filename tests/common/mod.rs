//! Common test utilities and helpers.
//!
//! - Document builders (word-processor packages, PDFs)
//! - An in-memory PDF backend
//! - Assertions over redacted output

pub mod assertions;
pub mod fixtures;
pub mod pdf_helpers;

pub use assertions::*;
pub use fixtures::*;
pub use pdf_helpers::*;
