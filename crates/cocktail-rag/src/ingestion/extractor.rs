//! Text extraction for PDF, CSV and EPUB documents

use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::{Error, Result};
use crate::types::FileType;

use super::cleaner::clean_text;

/// Largest single archive entry read from an EPUB
const MAX_EPUB_ENTRY_BYTES: u64 = 32 * 1024 * 1024;

/// Extracted content, shaped so the chunker can pick a strategy
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedText {
    /// Running text (PDF, EPUB)
    Prose(String),
    /// Header plus rendered rows (CSV)
    Table(TableText),
}

/// A table rendered row by row, cells joined by ` | `
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableText {
    pub header: Option<String>,
    pub rows: Vec<String>,
}

impl TableText {
    /// Header line followed by `rows[start..end]`, one per line
    pub fn render(&self, start: usize, end: usize) -> String {
        let mut block = String::new();
        if let Some(header) = &self.header {
            block.push_str(header);
        }
        for row in &self.rows[start..end] {
            if !block.is_empty() {
                block.push('\n');
            }
            block.push_str(row);
        }
        block
    }
}

impl ExtractedText {
    /// Apply [`clean_text`], dropping table rows that clean to nothing
    pub fn cleaned(self) -> Self {
        match self {
            Self::Prose(text) => Self::Prose(clean_text(&text)),
            Self::Table(table) => Self::Table(TableText {
                header: table.header.map(|h| clean_text(&h)).filter(|h| !h.is_empty()),
                rows: table
                    .rows
                    .iter()
                    .map(|row| clean_text(row))
                    .filter(|row| !row.is_empty())
                    .collect(),
            }),
        }
    }

    /// Whole content as plain text
    pub fn to_text(&self) -> String {
        match self {
            Self::Prose(text) => text.clone(),
            Self::Table(table) => table.render(0, table.rows.len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Prose(text) => text.trim().is_empty(),
            Self::Table(table) => table.rows.is_empty(),
        }
    }
}

/// Multi-format text extractor
pub struct TextExtractor;

impl TextExtractor {
    /// Extract text from raw bytes of a declared type
    pub fn extract(filename: &str, file_type: FileType, data: &[u8]) -> Result<ExtractedText> {
        match file_type {
            FileType::Pdf => Self::extract_pdf(filename, data).map(ExtractedText::Prose),
            FileType::Csv => Self::extract_csv(filename, data).map(ExtractedText::Table),
            FileType::Epub => Self::extract_epub(filename, data).map(ExtractedText::Prose),
            FileType::Unknown => Err(Error::UnsupportedFormat(filename.to_string())),
        }
    }

    /// Page-ordered text via lopdf, falling back to pdf-extract for the
    /// whole file when no page yields text
    fn extract_pdf(filename: &str, data: &[u8]) -> Result<String> {
        let mut pages_text = Vec::new();

        match lopdf::Document::load_mem(data) {
            Ok(doc) => {
                for page_number in doc.get_pages().keys() {
                    match doc.extract_text(&[*page_number]) {
                        Ok(text) if !text.trim().is_empty() => pages_text.push(text),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!(filename, page = page_number, "Page text extraction failed: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::debug!(filename, "lopdf could not load document: {}", e);
            }
        }

        if !pages_text.is_empty() {
            return Ok(pages_text.join("\n"));
        }

        tracing::debug!(filename, "No per-page text, falling back to pdf-extract");
        let text = Self::pdf_extract_guarded(filename, data)?;

        if text.trim().is_empty() {
            return Err(Error::extraction(filename, "No text content could be extracted from PDF"));
        }
        Ok(text)
    }

    /// pdf-extract panics on some malformed files; run it on its own thread
    /// so a panic becomes an extraction error
    fn pdf_extract_guarded(filename: &str, data: &[u8]) -> Result<String> {
        let data = data.to_vec();
        let handle = std::thread::Builder::new()
            .name("pdf-extract".to_string())
            .spawn(move || pdf_extract::extract_text_from_mem(&data).map_err(|e| e.to_string()))?;

        match handle.join() {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(message)) => Err(Error::extraction(filename, message)),
            Err(_) => {
                tracing::error!(filename, "pdf-extract crashed");
                Err(Error::extraction(filename, "PDF parser crashed on malformed input"))
            }
        }
    }

    /// Header and rows, cells joined by ` | `
    fn extract_csv(filename: &str, data: &[u8]) -> Result<TableText> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data);

        let header = reader
            .headers()
            .map_err(|e| Error::extraction(filename, e.to_string()))?
            .iter()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" | ");

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::extraction(filename, e.to_string()))?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::trim).collect::<Vec<_>>().join(" | "));
        }

        Ok(TableText {
            header: (!header.trim().is_empty()).then_some(header),
            rows,
        })
    }

    /// Spine-ordered body text of every (X)HTML content document
    fn extract_epub(filename: &str, data: &[u8]) -> Result<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| Error::extraction(filename, format!("not a valid EPUB container: {}", e)))?;

        let content_paths = match Self::epub_spine(&mut archive) {
            Some(paths) if !paths.is_empty() => paths,
            _ => {
                tracing::debug!(filename, "EPUB spine unavailable, reading HTML entries in name order");
                let mut names: Vec<String> = archive
                    .file_names()
                    .filter(|name| is_html_name(name))
                    .map(str::to_string)
                    .collect();
                names.sort();
                names
            }
        };

        let mut sections = Vec::new();
        for path in &content_paths {
            let Some(bytes) = read_entry(&mut archive, path) else {
                tracing::debug!(filename, entry = %path, "Missing EPUB content document");
                continue;
            };
            let text = html_body_text(&String::from_utf8_lossy(&bytes))?;
            if !text.is_empty() {
                sections.push(text);
            }
        }

        if sections.is_empty() {
            return Err(Error::extraction(filename, "No text content could be extracted from EPUB"));
        }
        Ok(sections.join("\n"))
    }

    /// Resolve `META-INF/container.xml` -> OPF -> spine, returning archive paths
    fn epub_spine(archive: &mut zip::ZipArchive<Cursor<&[u8]>>) -> Option<Vec<String>> {
        let container = read_entry(archive, "META-INF/container.xml")?;
        let opf_path = first_attribute(&container, b"rootfile", b"full-path")?;
        let opf = read_entry(archive, &opf_path)?;
        let base_dir = match opf_path.rsplit_once('/') {
            Some((dir, _)) => format!("{}/", dir),
            None => String::new(),
        };

        let package = parse_opf(&opf);
        let paths = package
            .spine
            .iter()
            .filter_map(|idref| package.manifest.get(idref))
            .filter(|(href, media_type)| {
                media_type.contains("html") || is_html_name(href)
            })
            .map(|(href, _)| resolve_href(&base_dir, href))
            .collect();
        Some(paths)
    }
}

#[derive(Default)]
struct OpfPackage {
    /// id -> (href, media-type)
    manifest: HashMap<String, (String, String)>,
    /// idrefs in reading order
    spine: Vec<String>,
}

fn parse_opf(xml: &[u8]) -> OpfPackage {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut package = OpfPackage::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => {
                    let attrs = attributes(&e);
                    if let (Some(id), Some(href)) = (attrs.get("id"), attrs.get("href")) {
                        let media_type = attrs.get("media-type").cloned().unwrap_or_default();
                        package.manifest.insert(id.clone(), (href.clone(), media_type));
                    }
                }
                b"itemref" => {
                    if let Some(idref) = attributes(&e).get("idref") {
                        package.spine.push(idref.clone());
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("OPF parse error: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    package
}

fn attributes(e: &quick_xml::events::BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .flatten()
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

fn first_attribute(xml: &[u8], element: &[u8], name: &[u8]) -> Option<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == element => {
                let key = String::from_utf8_lossy(name).into_owned();
                return attributes(&e).remove(&key);
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<Vec<u8>> {
    let file = archive.by_name(name).ok()?;
    let mut bytes = Vec::new();
    file.take(MAX_EPUB_ENTRY_BYTES).read_to_end(&mut bytes).ok()?;
    Some(bytes)
}

fn resolve_href(base_dir: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or(href).replace("%20", " ");
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn is_html_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".xhtml") || lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Text nodes under `<body>`, one per line, skipping script and style
fn html_body_text(html: &str) -> Result<String> {
    let document = scraper::Html::parse_document(html);
    let body_selector = scraper::Selector::parse("body")
        .map_err(|e| Error::internal(format!("invalid selector: {:?}", e)))?;

    let Some(body) = document.select(&body_selector).next() else {
        return Ok(String::new());
    };

    let mut lines = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_code = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|el| el.name()))
            .is_some_and(|name| name == "script" || name == "style");
        let trimmed = text.trim();
        if !in_code && !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_epub(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            for (name, body) in entries {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
  </manifest>
  <spine>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

    #[test]
    fn test_epub_follows_spine_order() {
        let epub = build_epub(&[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF),
            (
                "OEBPS/text/ch2.xhtml",
                "<html><body><p>Chapter two: dilution.</p></body></html>",
            ),
            (
                "OEBPS/text/ch1.xhtml",
                "<html><head><title>x</title></head><body><h1>Chapter one</h1>\
                 <p>Citrus   acids.</p><script>var x = 1;</script></body></html>",
            ),
        ]);

        let text = match TextExtractor::extract("book.epub", FileType::Epub, &epub).unwrap() {
            ExtractedText::Prose(text) => text,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(text, "Chapter one\nCitrus   acids.\nChapter two: dilution.");
        assert!(!text.contains("var x"));
    }

    #[test]
    fn test_epub_without_container_reads_html_entries() {
        let epub = build_epub(&[
            ("b.html", "<html><body>second</body></html>"),
            ("a.html", "<html><body>first</body></html>"),
        ]);
        let extracted = TextExtractor::extract("loose.epub", FileType::Epub, &epub).unwrap();
        assert_eq!(extracted.to_text(), "first\nsecond");
    }

    #[test]
    fn test_corrupt_epub() {
        let err = TextExtractor::extract("bad.epub", FileType::Epub, b"not a zip").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn test_csv_rows() {
        let data = b"name,spirit,method\nNegroni,gin,stir\n,,\nDaiquiri , rum ,shake\nOdd,row\n";
        let table = match TextExtractor::extract("specs.csv", FileType::Csv, data).unwrap() {
            ExtractedText::Table(table) => table,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(table.header.as_deref(), Some("name | spirit | method"));
        assert_eq!(
            table.rows,
            vec!["Negroni | gin | stir", "Daiquiri | rum | shake", "Odd | row"]
        );
        assert_eq!(table.render(0, 1), "name | spirit | method\nNegroni | gin | stir");
    }

    #[test]
    fn test_corrupt_pdf() {
        let err = TextExtractor::extract("broken.pdf", FileType::Pdf, b"%PDF-garbage").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn test_unsupported() {
        let err = TextExtractor::extract("notes.docx", FileType::Unknown, b"").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_cleaned_table_drops_blank_rows() {
        let extracted = ExtractedText::Table(TableText {
            header: Some("a  |  b".to_string()),
            rows: vec!["  ".to_string(), "1 |   2".to_string()],
        })
        .cleaned();
        assert_eq!(extracted.to_text(), "a | b\n1 | 2");
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("OEBPS/", "text/ch1.xhtml#top"), "OEBPS/text/ch1.xhtml");
        assert_eq!(resolve_href("OEBPS/text/", "../ch%202.xhtml"), "OEBPS/ch 2.xhtml");
        assert_eq!(resolve_href("", "ch.html"), "ch.html");
    }
}
