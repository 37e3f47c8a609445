//! Arena model of a word-processor package.
//!
//! Each XML part is split into raw byte ranges and formatting runs. Runs,
//! paragraphs and cells live in arenas addressed by index; a run split adds a
//! node with [`DocxDocument::insert_run_after`]. A run that was never edited
//! is written back exactly as it was read.

use crate::error::{RedactorError, RedactorResult};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read, Write};
use std::path::Path;

pub type RunId = usize;
pub type ParaId = usize;
pub type CellId = usize;

pub const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";
const HEADER_REL: &str = "/header";
const FOOTER_REL: &str = "/footer";

pub const WARN_TRACK_CHANGES: &str = "warning:track_changes_detected";
pub const WARN_TEXTBOX: &str = "warning:textbox_not_mapped";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    Body,
    Header,
    Footer,
}

/// One `<w:r>` element.
#[derive(Debug, Clone)]
pub struct RunNode {
    open_tag: String,
    /// Raw `<w:rPr>` element, shared by every fragment split from this run.
    props: Option<String>,
    /// Raw non-text children (drawings, field characters, ...).
    extras: Vec<String>,
    /// Raw `<w:tab/>`, `<w:br/>`, `<w:cr/>` elements in order, keyed by the
    /// character they contribute.
    specials: Vec<(char, String)>,
    text: String,
    /// Source bytes; dropped once the run is edited.
    raw: Option<String>,
    /// Sibling inserted directly after this run.
    next: Option<RunId>,
}

impl RunNode {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn props(&self) -> Option<&str> {
        self.props.as_deref()
    }

    fn write_to(&self, out: &mut String) {
        if let Some(raw) = &self.raw {
            out.push_str(raw);
            return;
        }
        if self.text.is_empty() && self.extras.is_empty() {
            return;
        }

        out.push_str(&self.open_tag);
        if let Some(props) = &self.props {
            out.push_str(props);
        }
        for extra in &self.extras {
            out.push_str(extra);
        }

        let mut used = vec![false; self.specials.len()];
        let mut chunk = String::new();
        for c in self.text.chars() {
            if c != '\t' && c != '\n' {
                chunk.push(c);
                continue;
            }
            flush_text(out, &mut chunk);
            let reused = self
                .specials
                .iter()
                .enumerate()
                .find(|(i, (sc, _))| *sc == c && !used[*i]);
            match reused {
                Some((i, (_, raw))) => {
                    used[i] = true;
                    out.push_str(raw);
                }
                None if c == '\t' => out.push_str("<w:tab/>"),
                None => out.push_str("<w:br/>"),
            }
        }
        flush_text(out, &mut chunk);
        out.push_str("</w:r>");
    }
}

fn flush_text(out: &mut String, chunk: &mut String) {
    if chunk.is_empty() {
        return;
    }
    out.push_str("<w:t xml:space=\"preserve\">");
    out.push_str(&escape(chunk.as_str()));
    out.push_str("</w:t>");
    chunk.clear();
}

#[derive(Debug, Clone)]
pub struct Paragraph {
    pub part: usize,
    pub runs: Vec<RunId>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub part: usize,
    /// Direct paragraphs; nested tables have cells of their own.
    pub paragraphs: Vec<ParaId>,
}

#[derive(Debug, Clone)]
enum Piece {
    Raw(String),
    Run(RunId),
}

#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub kind: PartKind,
    /// Paragraphs outside any table.
    pub paragraphs: Vec<ParaId>,
    /// Cells in document order; a nested cell follows its parent.
    pub cells: Vec<CellId>,
    pieces: Vec<Piece>,
}

#[derive(Debug, Clone)]
struct ZipEntry {
    name: String,
    data: Vec<u8>,
    /// Index into `parts` when this entry was parsed.
    part: Option<usize>,
}

/// A parsed `.docx` package.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    entries: Vec<ZipEntry>,
    parts: Vec<Part>,
    runs: Vec<RunNode>,
    paragraphs: Vec<Paragraph>,
    cells: Vec<Cell>,
    warnings: Vec<String>,
}

impl DocxDocument {
    pub fn open(path: &Path) -> RedactorResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| RedactorError::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> RedactorResult<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.push(ZipEntry {
                name,
                data,
                part: None,
            });
        }

        let mut doc = Self {
            entries,
            parts: Vec::new(),
            runs: Vec::new(),
            paragraphs: Vec::new(),
            cells: Vec::new(),
            warnings: Vec::new(),
        };

        let body_xml = doc
            .entry_text(DOCUMENT_PART)?
            .ok_or_else(|| RedactorError::docx(DOCUMENT_PART, "missing main document part"))?;
        let references = doc.parse_part(DOCUMENT_PART, PartKind::Body, &body_xml)?;

        let targets = match doc.entry_text(DOCUMENT_RELS)? {
            Some(rels) => parse_relationships(&rels)?,
            None => Vec::new(),
        };

        // Headers and footers in the order the body references them.
        let mut seen: Vec<String> = Vec::new();
        for (kind, rel_id) in references {
            let Some((_, target)) = targets.iter().find(|(id, _)| *id == rel_id) else {
                continue;
            };
            if seen.contains(target) {
                continue;
            }
            seen.push(target.clone());

            let xml = match doc.entry_text(target) {
                Ok(Some(xml)) => xml,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Skipping unreadable {}: {}", target, e);
                    doc.warn(format!("warning:unreadable_container:{}", target));
                    continue;
                }
            };
            let snapshot = (doc.runs.len(), doc.paragraphs.len(), doc.cells.len());
            if let Err(e) = doc.parse_part(target, kind, &xml) {
                log::warn!("Skipping unreadable {}: {}", target, e);
                doc.runs.truncate(snapshot.0);
                doc.paragraphs.truncate(snapshot.1);
                doc.cells.truncate(snapshot.2);
                doc.warn(format!("warning:unreadable_container:{}", target));
            }
        }

        Ok(doc)
    }

    fn entry_text(&self, name: &str) -> RedactorResult<Option<String>> {
        match self.entries.iter().find(|e| e.name == name) {
            Some(entry) => String::from_utf8(entry.data.clone())
                .map(Some)
                .map_err(|e| RedactorError::docx(name, e)),
            None => Ok(None),
        }
    }

    fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Parts in segment order: headers, footers, then the body.
    pub fn parts_in_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.parts.len());
        for kind in [PartKind::Header, PartKind::Footer, PartKind::Body] {
            order.extend((0..self.parts.len()).filter(|&i| self.parts[i].kind == kind));
        }
        order
    }

    pub fn part(&self, index: usize) -> &Part {
        &self.parts[index]
    }

    pub fn run(&self, id: RunId) -> &RunNode {
        &self.runs[id]
    }

    pub fn paragraph(&self, id: ParaId) -> &Paragraph {
        &self.paragraphs[id]
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    pub fn paragraph_text(&self, id: ParaId) -> String {
        self.paragraphs[id]
            .runs
            .iter()
            .map(|&r| self.runs[r].text.as_str())
            .collect()
    }

    /// Direct paragraphs joined by `\n`.
    pub fn cell_text(&self, id: CellId) -> String {
        self.cells[id]
            .paragraphs
            .iter()
            .map(|&p| self.paragraph_text(p))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn set_run_text(&mut self, id: RunId, text: String) {
        let run = &mut self.runs[id];
        if run.raw.is_some() && run.text == text {
            return;
        }
        run.text = text;
        run.raw = None;
    }

    /// Inserts a new run directly after `after` in `paragraph`, carrying the
    /// same formatting properties.
    pub fn insert_run_after(&mut self, paragraph: ParaId, after: RunId, text: String) -> RunId {
        let source = &self.runs[after];
        let node = RunNode {
            open_tag: source.open_tag.clone(),
            props: source.props.clone(),
            extras: Vec::new(),
            specials: Vec::new(),
            text,
            raw: None,
            next: source.next,
        };
        let id = self.runs.len();
        self.runs.push(node);
        self.runs[after].next = Some(id);

        let runs = &mut self.paragraphs[paragraph].runs;
        let pos = runs.iter().position(|&r| r == after).map_or(runs.len(), |p| p + 1);
        runs.insert(pos, id);
        id
    }

    fn serialize_part(&self, index: usize) -> String {
        let mut out = String::new();
        for piece in &self.parts[index].pieces {
            match piece {
                Piece::Raw(raw) => out.push_str(raw),
                Piece::Run(first) => {
                    let mut cursor = Some(*first);
                    while let Some(id) = cursor {
                        self.runs[id].write_to(&mut out);
                        cursor = self.runs[id].next;
                    }
                }
            }
        }
        out
    }

    /// Writes the package. Entry order is kept and every entry gets the same
    /// fixed timestamp, so equal input gives byte-identical output.
    pub fn to_bytes(&self) -> RedactorResult<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let base = zip::write::SimpleFileOptions::default()
            .last_modified_time(zip::DateTime::default());
        let deflated = base.compression_method(zip::CompressionMethod::Deflated);
        let stored = base.compression_method(zip::CompressionMethod::Stored);

        for entry in &self.entries {
            if entry.name.ends_with('/') {
                zip.add_directory(entry.name.as_str(), stored)?;
                continue;
            }
            let options = if entry.name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(entry.name.as_str(), options)?;
            match entry.part {
                Some(part) => zip.write_all(self.serialize_part(part).as_bytes()),
                None => zip.write_all(&entry.data),
            }
            .map_err(|e| RedactorError::docx(&entry.name, e))?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub fn save(&self, path: &Path) -> RedactorResult<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| RedactorError::io(path, e))
    }

    /// Parses one XML part into the arenas and returns the header/footer
    /// references it contains.
    fn parse_part(
        &mut self,
        name: &str,
        kind: PartKind,
        xml: &str,
    ) -> RedactorResult<Vec<(PartKind, String)>> {
        let part_index = self.parts.len();
        let mut part = Part {
            name: name.to_string(),
            kind,
            paragraphs: Vec::new(),
            cells: Vec::new(),
            pieces: Vec::new(),
        };
        let mut references = Vec::new();
        let mut para_stack: Vec<ParaId> = Vec::new();
        let mut cell_stack: Vec<CellId> = Vec::new();
        let mut raw_start = 0;

        let mut reader = Reader::from_str(xml);
        loop {
            let before = reader.buffer_position();
            let event = reader.read_event().map_err(|e| RedactorError::docx(name, e))?;
            let after = reader.buffer_position();

            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:p" => {
                        let id = self.new_paragraph(part_index, &mut part, cell_stack.last());
                        para_stack.push(id);
                    }
                    b"w:tc" => {
                        let id = self.cells.len();
                        self.cells.push(Cell {
                            part: part_index,
                            paragraphs: Vec::new(),
                        });
                        part.cells.push(id);
                        cell_stack.push(id);
                    }
                    b"w:r" => {
                        if let Some(&para) = para_stack.last() {
                            if raw_start < before {
                                part.pieces.push(Piece::Raw(xml[raw_start..before].to_string()));
                            }
                            let mut run = parse_run(&mut reader, xml, name, &xml[before..after])?;
                            let end = reader.buffer_position();
                            let raw = &xml[before..end];
                            if raw.contains("<w:txbxContent") {
                                self.warn(WARN_TEXTBOX);
                            }
                            if raw.contains("<w:ins") || raw.contains("<w:del") {
                                self.warn(WARN_TRACK_CHANGES);
                            }
                            run.raw = Some(raw.to_string());

                            let id = self.runs.len();
                            self.runs.push(run);
                            self.paragraphs[para].runs.push(id);
                            part.pieces.push(Piece::Run(id));
                            raw_start = end;
                        }
                    }
                    n if is_track_change(n) => self.warn(WARN_TRACK_CHANGES),
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"w:p" => {
                        self.new_paragraph(part_index, &mut part, cell_stack.last());
                    }
                    b"w:headerReference" | b"w:footerReference" => {
                        let ref_kind = if e.name().as_ref() == b"w:headerReference" {
                            PartKind::Header
                        } else {
                            PartKind::Footer
                        };
                        if let Some(id) = attribute(&e, b"r:id") {
                            references.push((ref_kind, id));
                        }
                    }
                    n if is_track_change(n) => self.warn(WARN_TRACK_CHANGES),
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"w:p" => {
                        para_stack.pop();
                    }
                    b"w:tc" => {
                        cell_stack.pop();
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }
        if raw_start < xml.len() {
            part.pieces.push(Piece::Raw(xml[raw_start..].to_string()));
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.part = Some(part_index);
        }
        self.parts.push(part);
        Ok(references)
    }

    fn new_paragraph(&mut self, part_index: usize, part: &mut Part, cell: Option<&CellId>) -> ParaId {
        let id = self.paragraphs.len();
        self.paragraphs.push(Paragraph {
            part: part_index,
            runs: Vec::new(),
        });
        match cell {
            Some(&c) => self.cells[c].paragraphs.push(id),
            None => part.paragraphs.push(id),
        }
        id
    }
}

fn is_track_change(name: &[u8]) -> bool {
    matches!(name, b"w:ins" | b"w:del" | b"w:moveFrom" | b"w:moveTo")
}

fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Reads the children of a `<w:r>` whose start tag was just consumed.
fn parse_run(
    reader: &mut Reader<&[u8]>,
    xml: &str,
    part: &str,
    open_tag: &str,
) -> RedactorResult<RunNode> {
    #[derive(PartialEq)]
    enum Child {
        Props,
        Text,
        Other,
    }

    let mut node = RunNode {
        open_tag: open_tag.to_string(),
        props: None,
        extras: Vec::new(),
        specials: Vec::new(),
        text: String::new(),
        raw: None,
        next: None,
    };
    let mut depth = 0usize;
    let mut child = Child::Other;
    let mut child_start = 0;

    loop {
        let before = reader.buffer_position();
        let event = reader.read_event().map_err(|e| RedactorError::docx(part, e))?;
        let after = reader.buffer_position();

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    child_start = before;
                    child = match e.name().as_ref() {
                        b"w:rPr" => Child::Props,
                        b"w:t" => Child::Text,
                        _ => Child::Other,
                    };
                }
                depth += 1;
            }
            Event::Empty(e) if depth == 0 => {
                let raw = &xml[before..after];
                match e.name().as_ref() {
                    b"w:rPr" => node.props = Some(raw.to_string()),
                    b"w:tab" => {
                        node.text.push('\t');
                        node.specials.push(('\t', raw.to_string()));
                    }
                    b"w:br" | b"w:cr" => {
                        node.text.push('\n');
                        node.specials.push(('\n', raw.to_string()));
                    }
                    b"w:t" => {}
                    _ => node.extras.push(raw.to_string()),
                }
            }
            Event::Text(t) if depth == 1 && child == Child::Text => {
                let text = t.unescape().map_err(|e| RedactorError::docx(part, e))?;
                node.text.push_str(&text);
            }
            Event::CData(c) if depth == 1 && child == Child::Text => {
                node.text.push_str(&String::from_utf8_lossy(&c));
            }
            Event::End(_) => {
                if depth == 0 {
                    return Ok(node);
                }
                depth -= 1;
                if depth == 0 {
                    let raw = &xml[child_start..after];
                    match child {
                        Child::Props => node.props = Some(raw.to_string()),
                        Child::Other => node.extras.push(raw.to_string()),
                        Child::Text => {}
                    }
                }
            }
            Event::Eof => return Err(RedactorError::docx(part, "unterminated run")),
            _ => {}
        }
    }
}

/// `(Id, part name)` for header and footer relationships.
fn parse_relationships(xml: &str) -> RedactorResult<Vec<(String, String)>> {
    let mut out = Vec::new();
    let mut reader = Reader::from_str(xml);
    loop {
        match reader
            .read_event()
            .map_err(|e| RedactorError::docx(DOCUMENT_RELS, e))?
        {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let rel_type = attribute(&e, b"Type").unwrap_or_default();
                if !(rel_type.ends_with(HEADER_REL) || rel_type.ends_with(FOOTER_REL)) {
                    continue;
                }
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    let name = match target.strip_prefix('/') {
                        Some(abs) => abs.to_string(),
                        None => format!("word/{}", target),
                    };
                    out.push((id, name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;

    fn package(document: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", opts).unwrap();
        zip.write_all(CT.as_bytes()).unwrap();
        zip.start_file(DOCUMENT_PART, opts).unwrap();
        zip.write_all(document.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            inner
        )
    }

    #[test]
    fn test_untouched_document_round_trips() {
        let xml = body(r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>World</w:t></w:r></w:p>"#);
        let doc = DocxDocument::from_bytes(&package(&xml)).unwrap();
        assert_eq!(doc.serialize_part(0), xml);
        assert_eq!(doc.paragraph_text(0), "Hello World");
    }

    #[test]
    fn test_tabs_breaks_and_entities() {
        let xml = body(r#"<w:p><w:r><w:t>A&amp;B</w:t><w:tab/><w:t>C</w:t><w:br/><w:t>D</w:t></w:r></w:p>"#);
        let doc = DocxDocument::from_bytes(&package(&xml)).unwrap();
        assert_eq!(doc.paragraph_text(0), "A&B\tC\nD");
    }

    #[test]
    fn test_edited_run_keeps_props() {
        let xml = body(r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>abc</w:t></w:r></w:p>"#);
        let mut doc = DocxDocument::from_bytes(&package(&xml)).unwrap();
        doc.set_run_text(0, "x<y".to_string());
        let out = doc.serialize_part(0);
        assert!(out.contains(r#"<w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve">x&lt;y</w:t></w:r>"#));
    }

    #[test]
    fn test_insert_run_after() {
        let xml = body(r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>ab</w:t></w:r><w:r><w:t>cd</w:t></w:r></w:p>"#);
        let mut doc = DocxDocument::from_bytes(&package(&xml)).unwrap();
        doc.set_run_text(0, "a".to_string());
        let new_id = doc.insert_run_after(0, 0, "X".to_string());
        assert_eq!(doc.paragraph(0).runs, vec![0, new_id, 1]);
        assert_eq!(doc.paragraph_text(0), "aXcd");
        assert_eq!(doc.run(new_id).props(), Some("<w:rPr><w:b/></w:rPr>"));
        assert!(doc.serialize_part(0).contains("<w:t>cd</w:t>"));
    }

    #[test]
    fn test_cells_and_track_changes() {
        let xml = body(concat!(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>一</w:t></w:r></w:p><w:p><w:r><w:t>二</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:ins w:id="1"><w:r><w:t>new</w:t></w:r></w:ins></w:p>"#
        ));
        let doc = DocxDocument::from_bytes(&package(&xml)).unwrap();
        let part = doc.part(0);
        assert_eq!(part.cells.len(), 1);
        assert_eq!(part.paragraphs.len(), 1);
        assert_eq!(doc.cell_text(part.cells[0]), "一\n二");
        assert_eq!(doc.warnings(), &[WARN_TRACK_CHANGES.to_string()]);
    }

    #[test]
    fn test_output_is_deterministic() {
        let xml = body(r#"<w:p><w:r><w:t>same</w:t></w:r></w:p>"#);
        let doc = DocxDocument::from_bytes(&package(&xml)).unwrap();
        assert_eq!(doc.to_bytes().unwrap(), doc.to_bytes().unwrap());
    }
}
