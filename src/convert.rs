use std::io::{Cursor, Read};
use std::path::Path;
use std::process::Command;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;
use zip::ZipArchive;

use crate::error::ConvertError;

const DOCUMENT_XML: &str = "word/document.xml";
const ANTIWORD: &str = "antiword";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Docx,
    /// Legacy Word 97-2003 binary.
    Doc,
    Text,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, ConvertError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "docx" => Ok(DocumentKind::Docx),
            "doc" => Ok(DocumentKind::Doc),
            "txt" => Ok(DocumentKind::Text),
            _ => Err(ConvertError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Only Word documents are accepted from uploads.
    pub fn is_word(self) -> bool {
        matches!(self, DocumentKind::Docx | DocumentKind::Doc)
    }
}

/// Extract the plain text body of a document, one paragraph per line.
pub fn convert_path(path: &Path) -> Result<String, ConvertError> {
    let kind = DocumentKind::from_path(path)?;
    debug!(path = %path.display(), ?kind, "Converting document");
    match kind {
        DocumentKind::Docx => docx_to_text(&std::fs::read(path)?),
        DocumentKind::Doc => run_antiword(path),
        DocumentKind::Text => Ok(std::fs::read_to_string(path)?),
    }
}

pub fn docx_to_text(bytes: &[u8]) -> Result<String, ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name(DOCUMENT_XML)?.read_to_string(&mut xml)?;
    document_xml_to_text(&xml)
}

/// Walk WordprocessingML: `w:t` runs carry text, `w:p` closes a line.
fn document_xml_to_text(xml: &str) -> Result<String, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if matches!(e.name().as_ref(), b"w:t") => in_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" | b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_text => {
                out.push_str(&e.unescape().map_err(quick_xml::Error::from)?)
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn run_antiword(path: &Path) -> Result<String, ConvertError> {
    // -w 0 keeps each paragraph on a single line
    let output = Command::new(ANTIWORD)
        .args(["-w", "0"])
        .arg(path)
        .output()
        .map_err(|e| ConvertError::External {
            program: ANTIWORD,
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ConvertError::External {
            program: ANTIWORD,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── Tests ──

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    /// Minimal docx archive whose body holds one paragraph per entry of `paragraphs`.
    pub(crate) fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| {
                if p.is_empty() {
                    "<w:p/>".to_string()
                } else {
                    format!(
                        "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                        escape(p)
                    )
                }
            })
            .collect();
        docx_with_body(&body)
    }

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{}</w:body></w:document>",
            body
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_XML, SimpleFileOptions::default()).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a.DOCX")).unwrap(), DocumentKind::Docx);
        assert_eq!(DocumentKind::from_path(Path::new("a.doc")).unwrap(), DocumentKind::Doc);
        assert_eq!(DocumentKind::from_path(Path::new("a.txt")).unwrap(), DocumentKind::Text);
        assert!(matches!(
            DocumentKind::from_path(Path::new("a.pdf")),
            Err(ConvertError::UnsupportedFormat(_))
        ));
        assert!(DocumentKind::from_path(Path::new("semextensao")).is_err());
        assert!(!DocumentKind::Text.is_word());
    }

    #[test]
    fn paragraphs_become_lines() {
        let bytes = docx_with_paragraphs(&["1. Processo 1", "", "Partes: A & B"]);
        let text = docx_to_text(&bytes).unwrap();
        assert_eq!(text, "1. Processo 1\n\nPartes: A & B\n");
    }

    #[test]
    fn runs_tabs_and_breaks() {
        let body = "<w:p><w:r><w:t>RESP:</w:t></w:r><w:r><w:tab/><w:t>Ana</w:t></w:r></w:p>\
                    <w:p><w:r><w:t>linha 1</w:t><w:br/><w:t>linha 2</w:t></w:r></w:p>\
                    <w:p><w:r><w:instrText> PAGE </w:instrText></w:r></w:p>";
        let text = docx_to_text(&docx_with_body(body)).unwrap();
        assert_eq!(text, "RESP:\tAna\nlinha 1\nlinha 2\n\n");
    }

    #[test]
    fn not_a_zip() {
        assert!(matches!(docx_to_text(b"plain text"), Err(ConvertError::Zip(_))));
    }

    #[test]
    fn missing_document_xml() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/styles.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<w:styles/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(docx_to_text(&bytes), Err(ConvertError::Zip(_))));
    }

    #[test]
    fn text_files_pass_through() {
        let text = convert_path(Path::new("tests/fixtures/relatorio.txt")).unwrap();
        assert!(text.starts_with("RELATÓRIO DE PUBLICAÇÕES\n"));
    }

    #[test]
    fn docx_from_disk() {
        let mut file = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
        file.write_all(&docx_with_paragraphs(&["1. Processo 1", "Tribunal: TJSP"]))
            .unwrap();
        let text = convert_path(file.path()).unwrap();
        assert_eq!(text, "1. Processo 1\nTribunal: TJSP\n");
    }
}
