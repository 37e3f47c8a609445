//! Resolved, labeled redaction decisions.

use crate::domain::{Candidate, Provenance};
use serde::{Serialize, Serializer};
use std::fmt;

/// Audit reason for a hit's replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    KeepParties,
    KeepAllowlist,
    KeepMoneyNoContext,
    MaskBlack,
    MaskDateGranular,
    MaskAddressGranular,
    MaskStableId,
    /// Caller-forced mask; carries the caller's reason code.
    Forced(String),
}

impl Reason {
    pub const FORCED_DEFAULT: &'static str = "forced:mask_once";

    pub fn as_str(&self) -> &str {
        match self {
            Self::KeepParties => "keep:parties",
            Self::KeepAllowlist => "keep:allowlist",
            Self::KeepMoneyNoContext => "keep:money_no_context",
            Self::MaskBlack => "mask:black",
            Self::MaskDateGranular => "mask:date_granular",
            Self::MaskAddressGranular => "mask:address_granular",
            Self::MaskStableId => "mask:stable_id",
            Self::Forced(r) => r,
        }
    }

    /// Keep reasons leave the original text in place.
    pub fn is_keep(&self) -> bool {
        matches!(
            self,
            Self::KeepParties | Self::KeepAllowlist | Self::KeepMoneyNoContext
        )
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Reason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Why a hit needs a human look beyond its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Diagnostic {
    /// No segment or character position covers the hit; nothing was written.
    SegmentNotFound,
    /// The hit was split across segment boundaries.
    SegmentOverlapApplied,
    PdfTooManyHits,
    PdfSearchFailed,
    PdfTermTooShort,
}

impl Diagnostic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SegmentNotFound => "warning:segment_not_found",
            Self::SegmentOverlapApplied => "warning:segment_overlap_applied",
            Self::PdfTooManyHits => "warning:pdf_too_many_hits",
            Self::PdfSearchFailed => "warning:pdf_search_failed",
            Self::PdfTermTooShort => "warning:pdf_term_too_short",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Diagnostic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A final, non-overlapping redaction decision over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub replacement: String,
    pub score: f64,
    pub reason: Reason,
    #[serde(rename = "source")]
    pub provenance: Provenance,
    pub review_flag: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Hit {
    pub(crate) fn from_candidate(
        candidate: &Candidate,
        original: String,
        replacement: String,
        reason: Reason,
    ) -> Self {
        Self {
            entity_type: candidate.entity_type.clone(),
            start: candidate.start,
            end: candidate.end,
            original,
            replacement,
            score: candidate.score,
            reason,
            provenance: candidate.provenance,
            review_flag: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_forced(&self) -> bool {
        self.provenance == Provenance::Forced
    }

    /// Whether a writer must change the document for this hit.
    pub fn needs_write(&self) -> bool {
        !self.reason.is_keep()
    }

    /// Flags the hit for review with a diagnostic.
    pub fn flag(&mut self, diagnostic: Diagnostic) {
        self.review_flag = true;
        if !self.diagnostics.contains(&diagnostic) {
            self.diagnostics.push(diagnostic);
        }
    }

    /// Reason plus diagnostics, `;`-joined, as written to reports.
    pub fn reason_code(&self) -> String {
        std::iter::once(self.reason.as_str())
            .chain(self.diagnostics.iter().map(|d| d.as_str()))
            .collect::<Vec<_>>()
            .join(";")
    }
}
