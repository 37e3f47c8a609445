//! Position-preserving redaction of Japanese legal documents.
//!
//! A document (plain text, `.docx`, or PDF) is flattened into one canonical
//! character stream with a reversible map back to its containers. Candidates
//! from any number of detectors are resolved into one non-overlapping plan,
//! labeled, and written back into the original document: text edits inside
//! formatting runs for word-processor files, MuPDF redaction at exact glyph
//! coordinates for PDFs.
//!
//! # Architecture
//!
//! - [`domain`]: candidate sources (patterns, dictionaries) and Japanese
//!   domain rules (party definitions, dates, addresses)
//! - [`analysis`]: chunking, overlap resolution and labeling
//! - [`document`]: segment mapping for word-processor files and the PDF
//!   character-coordinate map
//! - [`redaction`]: per-format strategies and the service layer
//! - [`report`]: CSV export and the review payload
//! - [`config`]: policy and per-run overrides
//! - [`error`]: error handling
//!
//! # Quick Start
//!
//! ```no_run
//! use legal_redactor::{Policy, RedactionService, RuntimeOverrides};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = RedactionService::new(Policy::default())?;
//! let report = service.redact(
//!     Path::new("contract.docx"),
//!     Path::new("contract.redacted.docx"),
//!     &RuntimeOverrides::new().allow_once("東京本社"),
//! )?;
//! println!("{} hit(s)", report.analysis.hits.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Analyzing text directly
//!
//! ```
//! use legal_redactor::{Analyzer, CanonicalText, Policy, RuntimeOverrides};
//!
//! let analyzer = Analyzer::new(Policy::default()).unwrap();
//! let text = CanonicalText::new("甲、連絡先は050-1234-5678です。");
//! let analysis = analyzer.run(&text, "memo", &RuntimeOverrides::new());
//! assert_eq!(analysis.masked_text, "甲、連絡先は[PHONE]です。");
//! ```

pub mod analysis;
pub mod config;
pub mod document;
pub mod domain;
pub mod error;
pub mod redaction;
pub mod report;
pub mod text;

pub use analysis::{Analysis, Analyzer, Hit, Reason};
pub use config::{ForcedMask, OutputMode, Policy, RuntimeOverrides};
pub use domain::{Candidate, CandidateSource, Provenance};
pub use error::{RedactorError, RedactorResult};
pub use redaction::{DocumentFormat, RedactionReport, RedactionService, RedactionStrategy};
pub use report::ReviewPayload;
pub use text::CanonicalText;
