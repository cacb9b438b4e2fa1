use std::io::{Cursor, Read};

use cortex_core::CortexError;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// A `.docx` file is a zip archive; the document body lives at
/// `word/document.xml` as WordprocessingML. Extract the run text of
/// every paragraph (`w:p` containing `w:t` runs), joined by newlines.
/// Pure CPU work; callers on an async runtime should run this inside
/// `tokio::task::spawn_blocking`.
pub fn extract_native_text(bytes: &[u8]) -> Result<String, CortexError> {
    let elements = extract_paragraphs(bytes)?;
    Ok(elements.join("\n"))
}

/// The structured extractor's unit of work for DOCX: one string per
/// paragraph, preserving document order. Table cells surface as their
/// own paragraphs, which is the WordprocessingML representation anyway.
pub fn extract_structured_elements(bytes: &[u8]) -> Result<Vec<String>, CortexError> {
    extract_paragraphs(bytes)
}

fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>, CortexError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CortexError::upstream(format!("docx is not a valid zip archive: {e}")))?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| CortexError::upstream(format!("docx missing word/document.xml: {e}")))?
        .read_to_string(&mut document_xml)
        .map_err(|e| CortexError::upstream(format!("docx document.xml is not valid utf-8: {e}")))?;

    parse_paragraphs(&document_xml)
}

fn parse_paragraphs(xml: &str) -> Result<Vec<String>, CortexError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text_run = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                let text = e
                    .unescape()
                    .map_err(|e| CortexError::upstream(format!("docx xml text escape error: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    let trimmed = current.trim();
                    if !trimmed.is_empty() {
                        paragraphs.push(trimmed.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(CortexError::upstream(format!("docx xml parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_paragraphs() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Revenue grew 20%</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second paragraph</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let paragraphs = parse_paragraphs(xml).unwrap();
        assert_eq!(paragraphs, vec!["Revenue grew 20%", "Second paragraph"]);
    }

    #[test]
    fn empty_body_yields_no_paragraphs() {
        let xml = r#"<w:document xmlns:w="x"><w:body></w:body></w:document>"#;
        assert!(parse_paragraphs(xml).unwrap().is_empty());
    }

    #[test]
    fn not_a_zip_archive_fails() {
        assert!(extract_native_text(b"not a zip").is_err());
    }
}
