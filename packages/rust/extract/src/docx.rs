//! `.docx` paragraph reader.
//!
//! Only direct `w:body` children named `w:p` become paragraphs.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use promptlib_shared::{PromptlibError, Result};
use quick_xml::Reader as XmlReader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;

const DOC_XML_PATH: &str = "word/document.xml";

/// Read the paragraph sequence of a `.docx` file on disk.
pub fn read_docx_paragraphs(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|e| PromptlibError::io(path, e))?;
    read_archive(file)
}

/// Read the paragraph sequence of an in-memory `.docx`.
pub fn paragraphs_from_docx_bytes(bytes: &[u8]) -> Result<Vec<String>> {
    read_archive(Cursor::new(bytes))
}

fn read_archive<R: Read + Seek>(reader: R) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| PromptlibError::document(format!("failed to open docx archive: {e}")))?;

    let mut file = archive
        .by_name(DOC_XML_PATH)
        .map_err(|e| PromptlibError::document(format!("docx missing {DOC_XML_PATH}: {e}")))?;

    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| PromptlibError::document(format!("failed to read {DOC_XML_PATH}: {e}")))?;

    parse_document_xml(&xml)
}

/// Walk `document.xml` and collect the text of each body paragraph.
///
/// A paragraph counts only when its parent is `w:body`. Paragraphs in
/// tables, content controls (`w:sdt`) and text boxes are skipped.
pub(crate) fn parse_document_xml(xml: &str) -> Result<Vec<String>> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    // Open elements, and the depth at which `w:body` children start.
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut in_body_para = false;
    let mut para_depth = 0usize;
    let mut run_depth = 0usize;
    let mut in_text = false;

    loop {
        let collecting = in_body_para && para_depth == 1;

        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let body_child = body_depth == Some(depth);
                depth += 1;
                match e.name().as_ref() {
                    b"w:body" => body_depth = Some(depth),
                    b"w:p" => {
                        para_depth += 1;
                        if body_child {
                            in_body_para = true;
                            current.clear();
                        }
                    }
                    b"w:r" => run_depth += 1,
                    b"w:t" => in_text = true,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                match e.name().as_ref() {
                    b"w:body" => body_depth = None,
                    b"w:p" => {
                        if collecting {
                            paragraphs.push(std::mem::take(&mut current));
                            in_body_para = false;
                        }
                        para_depth = para_depth.saturating_sub(1);
                    }
                    b"w:r" => run_depth = run_depth.saturating_sub(1),
                    b"w:t" => in_text = false,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:p" if body_depth == Some(depth) => paragraphs.push(String::new()),
                b"w:tab" if collecting && run_depth > 0 => current.push('\t'),
                b"w:br" if collecting && run_depth > 0 => {
                    if is_line_break(&e) {
                        current.push('\n');
                    }
                }
                b"w:cr" if collecting && run_depth > 0 => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if collecting && in_text => {
                let text = t.unescape().map_err(|e| {
                    PromptlibError::document(format!("bad text in {DOC_XML_PATH}: {e}"))
                })?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PromptlibError::document(format!(
                    "malformed {DOC_XML_PATH} at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Page and column breaks add no text; text-wrapping breaks are newlines.
fn is_line_break(br: &BytesStart<'_>) -> bool {
    !matches!(
        br.try_get_attribute("w:type"),
        Ok(Some(attr)) if matches!(attr.value.as_ref(), b"page" | b"column")
    )
}
