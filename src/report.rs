//! Hit export (CSV) and the review payload (JSON).

use crate::analysis::Hit;
use crate::domain::PartyExtraction;
use crate::error::{RedactorError, RedactorResult};
use crate::redaction::{FormatWarnings, PdfStats, RedactionReport};
use crate::text::CanonicalText;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 8] = [
    "entity_type",
    "start",
    "end",
    "original",
    "replacement",
    "score",
    "reason",
    "source",
];

/// Characters of context on each side of a review item.
pub const CONTEXT_WINDOW: usize = 24;

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes hits as CSV with a header row. Quoting follows RFC 4180.
pub fn write_csv<W: Write>(mut out: W, hits: &[Hit]) -> std::io::Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;
    for hit in hits {
        let row = [
            csv_field(&hit.entity_type),
            hit.start.to_string(),
            hit.end.to_string(),
            csv_field(&hit.original),
            csv_field(&hit.replacement),
            format!("{:.3}", hit.score),
            csv_field(&hit.reason_code()),
            hit.provenance.as_str().to_string(),
        ];
        writeln!(out, "{}", row.join(","))?;
    }
    Ok(())
}

pub fn save_csv(path: &Path, hits: &[Hit]) -> RedactorResult<()> {
    let mut buf = Vec::new();
    write_csv(&mut buf, hits).map_err(|e| RedactorError::io(path, e))?;
    std::fs::write(path, buf).map_err(|e| RedactorError::io(path, e))
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_hits: usize,
    pub review_hits: usize,
    pub by_entity: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_stats: Option<PdfStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub span_id: String,
    pub mark_id: String,
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub original: String,
    pub replacement: String,
    pub score: f64,
    pub reason: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub id: String,
    pub span_id: String,
    pub mark_id: String,
    pub entity_type: String,
    pub context_preview: String,
    pub offset: [usize; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct PartyAuto {
    pub self_names: Vec<String>,
    pub counter_names: Vec<String>,
}

impl From<&PartyExtraction> for PartyAuto {
    fn from(p: &PartyExtraction) -> Self {
        Self {
            self_names: p.self_names.clone(),
            counter_names: p.counter_names.clone(),
        }
    }
}

/// Record consumed by an external review surface.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPayload {
    pub doc_id: String,
    pub party_auto: PartyAuto,
    pub summary: Summary,
    pub spans: Vec<SpanRecord>,
    pub review_items: Vec<ReviewItem>,
    pub warnings: FormatWarnings,
}

/// `±CONTEXT_WINDOW` characters around `[start, end)`, newlines flattened.
pub fn context_preview(text: &CanonicalText, start: usize, end: usize) -> String {
    let s = start.saturating_sub(CONTEXT_WINDOW);
    let e = (end + CONTEXT_WINDOW).min(text.len());
    text.slice(s, e).replace('\n', " ")
}

impl ReviewPayload {
    pub fn build(report: &RedactionReport) -> Self {
        let analysis = &report.analysis;
        let text = CanonicalText::new(report.canonical_text.as_str());

        let mut spans = Vec::with_capacity(analysis.hits.len());
        let mut review_items = Vec::new();
        for (i, hit) in analysis.hits.iter().enumerate() {
            let span_id = format!("span_{:06}", i + 1);
            let mark_id = format!("m{:06}", i + 1);
            if hit.review_flag {
                review_items.push(ReviewItem {
                    id: format!("rev_{:06}", review_items.len() + 1),
                    span_id: span_id.clone(),
                    mark_id: mark_id.clone(),
                    entity_type: hit.entity_type.clone(),
                    context_preview: context_preview(&text, hit.start, hit.end),
                    offset: [hit.start, hit.end],
                });
            }
            spans.push(SpanRecord {
                span_id,
                mark_id,
                entity_type: hit.entity_type.clone(),
                start: hit.start,
                end: hit.end,
                original: hit.original.clone(),
                replacement: hit.replacement.clone(),
                score: hit.score,
                reason: hit.reason_code(),
                source: hit.provenance.as_str().to_string(),
            });
        }

        Self {
            doc_id: analysis.doc_id.clone(),
            party_auto: PartyAuto::from(&analysis.party_auto),
            summary: Summary {
                total_hits: analysis.hits.len(),
                review_hits: analysis.review_hits(),
                by_entity: analysis.by_entity(),
                pdf_stats: report.pdf_stats.clone(),
            },
            spans,
            review_items,
            warnings: report.warnings.clone(),
        }
    }

    pub fn to_json(&self) -> RedactorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> RedactorResult<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| RedactorError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Analysis, AnalysisMode, Reason};
    use crate::domain::{Candidate, Provenance};
    use crate::redaction::DocumentFormat;

    fn hit(start: usize, end: usize, original: &str, replacement: &str, review: bool) -> Hit {
        let c = Candidate::new(start, end, "PERSON", 0.5).with_provenance(Provenance::Detector);
        let mut h = Hit::from_candidate(&c, original.into(), replacement.into(), Reason::MaskStableId);
        h.review_flag = review;
        h
    }

    fn report(text: &str, hits: Vec<Hit>) -> RedactionReport {
        RedactionReport {
            format: DocumentFormat::Text,
            analysis: Analysis {
                doc_id: "doc.txt".into(),
                mode: AnalysisMode::Single,
                hits,
                masked_text: String::new(),
                party_auto: PartyExtraction::default(),
                chunks: None,
                review_threshold: 0.8,
            },
            canonical_text: text.into(),
            warnings: FormatWarnings::default(),
            instances_redacted: 0,
            pdf_stats: None,
        }
    }

    #[test]
    fn test_csv_field_order_and_quoting() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[hit(0, 2, "a,\"b\"", "[P]", false)]).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "entity_type,start,end,original,replacement,score,reason,source"
        );
        assert_eq!(
            lines.next().unwrap(),
            "PERSON,0,2,\"a,\"\"b\"\"\",[P],0.500,mask:stable_id,detector"
        );
    }

    #[test]
    fn test_review_payload_ids_and_context() {
        let text = "前\n山田太郎様";
        let payload = ReviewPayload::build(&report(
            text,
            vec![hit(0, 1, "前", "[X]", false), hit(2, 6, "山田太郎", "[PERSON_01]", true)],
        ));

        assert_eq!(payload.spans[1].span_id, "span_000002");
        assert_eq!(payload.spans[1].mark_id, "m000002");
        assert_eq!(payload.review_items.len(), 1);
        assert_eq!(payload.review_items[0].id, "rev_000001");
        assert_eq!(payload.review_items[0].span_id, "span_000002");
        assert_eq!(payload.review_items[0].context_preview, "前 山田太郎様");
        assert_eq!(payload.summary.review_hits, 1);

        let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(json["warnings"]["docx"], serde_json::json!([]));
        assert_eq!(json["review_items"][0]["offset"], serde_json::json!([2, 6]));
        assert_eq!(json["summary"]["by_entity"]["PERSON"], 2);
    }
}
