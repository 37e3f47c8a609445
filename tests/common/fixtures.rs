//! Test fixtures and document builders.
//!
//! Builders write minimal but well-formed packages, following the Builder
//! pattern for clean test setup.

use anyhow::Result;
use printpdf::*;
use std::fs;
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `<w:r>` with optional raw run properties (e.g. `<w:b/>`).
fn run_xml(text: &str, props: Option<&str>) -> String {
    let props = props.map(|p| format!("<w:rPr>{}</w:rPr>", p)).unwrap_or_default();
    format!("<w:r>{}<w:t xml:space=\"preserve\">{}</w:t></w:r>", props, escape(text))
}

fn paragraph_xml(text: &str) -> String {
    format!("<w:p>{}</w:p>", run_xml(text, None))
}

/// Builder for word-processor packages.
///
/// # Example
///
/// ```no_run
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let path = DocxBuilder::new()
///     .header("社外秘")
///     .paragraph("株式会社サンプル（以下「甲」という）")
///     .table(&[&["氏名", "山田太郎"]])
///     .build(std::path::Path::new("/tmp/contract.docx"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DocxBuilder {
    body: Vec<String>,
    headers: Vec<String>,
    footers: Vec<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a paragraph with a single plain run.
    pub fn paragraph(mut self, text: &str) -> Self {
        self.body.push(paragraph_xml(text));
        self
    }

    /// Adds a paragraph made of formatted runs.
    pub fn runs(mut self, runs: &[(&str, Option<&str>)]) -> Self {
        let inner: String = runs.iter().map(|(t, p)| run_xml(t, *p)).collect();
        self.body.push(format!("<w:p>{}</w:p>", inner));
        self
    }

    /// Adds a table. A `\n` in a cell starts a new paragraph in that cell.
    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        let mut xml = String::from("<w:tbl>");
        for row in rows {
            xml.push_str("<w:tr>");
            for cell in *row {
                xml.push_str("<w:tc>");
                for line in cell.split('\n') {
                    xml.push_str(&paragraph_xml(line));
                }
                xml.push_str("</w:tc>");
            }
            xml.push_str("</w:tr>");
        }
        xml.push_str("</w:tbl>");
        self.body.push(xml);
        self
    }

    /// Adds raw body XML.
    pub fn raw(mut self, xml: &str) -> Self {
        self.body.push(xml.to_string());
        self
    }

    pub fn header(mut self, text: &str) -> Self {
        self.headers.push(text.to_string());
        self
    }

    pub fn footer(mut self, text: &str) -> Self {
        self.footers.push(text.to_string());
        self
    }

    fn document_xml(&self) -> String {
        let mut sect = String::from("<w:sectPr>");
        for i in 0..self.headers.len() {
            sect.push_str(&format!("<w:headerReference w:type=\"default\" r:id=\"rIdH{}\"/>", i + 1));
        }
        for i in 0..self.footers.len() {
            sect.push_str(&format!("<w:footerReference w:type=\"default\" r:id=\"rIdF{}\"/>", i + 1));
        }
        sect.push_str("</w:sectPr>");
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:document xmlns:w=\"{}\" xmlns:r=\"{}\"><w:body>{}{}</w:body></w:document>",
            W_NS,
            R_NS,
            self.body.concat(),
            sect
        )
    }

    fn part_xml(root: &str, text: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<w:{root} xmlns:w=\"{}\" xmlns:r=\"{}\">{}</w:{root}>",
            W_NS,
            R_NS,
            paragraph_xml(text),
            root = root
        )
    }

    fn rels_xml(&self) -> String {
        let mut rels = String::new();
        for i in 0..self.headers.len() {
            rels.push_str(&format!(
                "<Relationship Id=\"rIdH{n}\" Type=\"{}/header\" Target=\"header{n}.xml\"/>",
                R_NS,
                n = i + 1
            ));
        }
        for i in 0..self.footers.len() {
            rels.push_str(&format!(
                "<Relationship Id=\"rIdF{n}\" Type=\"{}/footer\" Target=\"footer{n}.xml\"/>",
                R_NS,
                n = i + 1
            ));
        }
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
            rels
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = zip::write::SimpleFileOptions::default();

        zip.start_file("[Content_Types].xml", opts)?;
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        )?;
        zip.start_file("word/document.xml", opts)?;
        zip.write_all(self.document_xml().as_bytes())?;
        zip.start_file("word/_rels/document.xml.rels", opts)?;
        zip.write_all(self.rels_xml().as_bytes())?;
        for (i, text) in self.headers.iter().enumerate() {
            zip.start_file(format!("word/header{}.xml", i + 1), opts)?;
            zip.write_all(Self::part_xml("hdr", text).as_bytes())?;
        }
        for (i, text) in self.footers.iter().enumerate() {
            zip.start_file(format!("word/footer{}.xml", i + 1), opts)?;
            zip.write_all(Self::part_xml("ftr", text).as_bytes())?;
        }
        Ok(zip.finish()?.into_inner())
    }

    pub fn build(&self, path: &Path) -> Result<PathBuf> {
        fs::write(path, self.to_bytes()?)?;
        Ok(path.to_path_buf())
    }
}

/// Builder for single-page test PDFs, one text line per call.
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    title: String,
    lines: Vec<String>,
    page_width: Mm,
    page_height: Mm,
}

impl TestPdfBuilder {
    pub fn new() -> Self {
        Self {
            title: "Test Document".to_string(),
            lines: Vec::new(),
            page_width: Mm(210.0),  // A4 width
            page_height: Mm(297.0), // A4 height
        }
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn build(self, output_path: &Path) -> Result<PathBuf> {
        let (doc, page1, layer1) =
            PdfDocument::new(&self.title, self.page_width, self.page_height, "Layer 1");
        let current_layer = doc.get_page(page1).get_layer(layer1);
        let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;

        for (i, line) in self.lines.iter().enumerate() {
            let y = 270.0 - 10.0 * i as f32;
            current_layer.use_text(line.as_str(), 12.0, Mm(20.0), Mm(y), &font);
        }

        doc.save(&mut BufWriter::new(fs::File::create(output_path)?))?;
        Ok(output_path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_parts() {
        let builder = DocxBuilder::new().header("H").paragraph("P").footer("F");
        assert_eq!(builder.headers.len(), 1);
        assert_eq!(builder.footers.len(), 1);
        assert!(builder.document_xml().contains("rIdH1"));
    }
}
