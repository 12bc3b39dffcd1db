//! Input format detection and scanned-document probing.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
/// ZIP local-file header, shared by DOCX containers
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";
const TIFF_MAGIC_LE: &[u8] = b"II*\x00";
const TIFF_MAGIC_BE: &[u8] = b"MM\x00*";

/// Alphabetic characters a sampled page must yield for the text layer to
/// count as usable.
const TEXT_LAYER_MIN_ALPHA: usize = 20;
/// Pages sampled by the scanned probe.
const PROBE_PAGES: usize = 3;

/// What kind of document the bytes hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// PDF with a usable text layer
    PdfText,
    /// PDF whose sampled pages yield no usable text
    PdfScanned,
    /// Office Open XML word-processing document
    Docx,
    /// Raster image, treated as a single scanned page
    Image,
}

impl FileKind {
    /// The coarse type name used in the output record.
    pub fn type_name(&self) -> &'static str {
        match self {
            FileKind::PdfText | FileKind::PdfScanned => "pdf",
            FileKind::Docx => "docx",
            FileKind::Image => "image",
        }
    }

    /// Whether this input needs OCR from the start.
    pub fn is_scanned(&self) -> bool {
        matches!(self, FileKind::PdfScanned | FileKind::Image)
    }
}

/// Detection result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFile {
    /// Detected kind
    pub kind: FileKind,
    /// PDF version string when the input is a PDF
    pub pdf_version: Option<String>,
}

/// Detect the file kind from a path. Reads the whole file only for PDFs,
/// where the scanned probe needs page content.
pub fn detect_from_path<P: AsRef<Path>>(path: P) -> Result<DetectedFile> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    detect_from_bytes(&data)
}

/// Detect the file kind from bytes.
pub fn detect_from_bytes(data: &[u8]) -> Result<DetectedFile> {
    if data.len() < 8 {
        return Err(Error::UnknownFormat);
    }

    if data.starts_with(PDF_MAGIC) {
        let version = pdf_version(data);
        let kind = if pdf_has_text_layer(data) {
            FileKind::PdfText
        } else {
            FileKind::PdfScanned
        };
        return Ok(DetectedFile {
            kind,
            pdf_version: version,
        });
    }

    if data.starts_with(ZIP_MAGIC) {
        return if zip_is_docx(data) {
            Ok(DetectedFile {
                kind: FileKind::Docx,
                pdf_version: None,
            })
        } else {
            Err(Error::UnknownFormat)
        };
    }

    if data.starts_with(PNG_MAGIC)
        || data.starts_with(JPEG_MAGIC)
        || data.starts_with(TIFF_MAGIC_LE)
        || data.starts_with(TIFF_MAGIC_BE)
    {
        return Ok(DetectedFile {
            kind: FileKind::Image,
            pdf_version: None,
        });
    }

    Err(Error::UnknownFormat)
}

/// Extract the version string from a PDF header (e.g. "1.7").
fn pdf_version(data: &[u8]) -> Option<String> {
    let rest = &data[PDF_MAGIC.len()..];
    let version: String = rest
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b'.')
        .map(|b| *b as char)
        .collect();
    if version.len() == 3 { Some(version) } else { None }
}

/// Probe up to the first few pages for extractable text. A PDF whose
/// sampled pages all come back below the alphabetic floor is treated as
/// scanned.
pub fn pdf_has_text_layer(data: &[u8]) -> bool {
    let doc = match lopdf::Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) => {
            log::debug!("scanned probe could not load document: {e}");
            return false;
        }
    };
    let pages = doc.get_pages();
    for (page_num, _) in pages.iter().take(PROBE_PAGES) {
        if let Ok(text) = doc.extract_text(&[*page_num]) {
            let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
            if alpha >= TEXT_LAYER_MIN_ALPHA {
                return true;
            }
        }
    }
    false
}

/// Whether a ZIP container holds a word-processing document.
fn zip_is_docx(data: &[u8]) -> bool {
    let cursor = std::io::Cursor::new(data);
    let Ok(mut archive) = zip::ZipArchive::new(cursor) else {
        return false;
    };
    let found = archive.by_name("word/document.xml").is_ok();
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_too_short() {
        assert!(matches!(
            detect_from_bytes(b"%PDF"),
            Err(Error::UnknownFormat)
        ));
    }

    #[test]
    fn test_detect_unknown_magic() {
        assert!(matches!(
            detect_from_bytes(b"<!DOCTYPE html><html></html>"),
            Err(Error::UnknownFormat)
        ));
    }

    #[test]
    fn test_detect_image_magics() {
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(&[0u8; 16]);
        let detected = detect_from_bytes(&png).unwrap();
        assert_eq!(detected.kind, FileKind::Image);
        assert!(detected.kind.is_scanned());

        let mut jpg = JPEG_MAGIC.to_vec();
        jpg.extend_from_slice(&[0xe0; 16]);
        assert_eq!(detect_from_bytes(&jpg).unwrap().kind, FileKind::Image);
    }

    #[test]
    fn test_detect_pdf_without_pages_is_scanned() {
        // Valid header, no page tree: the probe finds no text.
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\nxref\n";
        let detected = detect_from_bytes(data).unwrap();
        assert_eq!(detected.kind, FileKind::PdfScanned);
        assert_eq!(detected.pdf_version.as_deref(), Some("1.7"));
        assert_eq!(detected.kind.type_name(), "pdf");
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!(pdf_version(b"%PDF-1.4\n"), Some("1.4".to_string()));
        assert_eq!(pdf_version(b"%PDF-2.0\n"), Some("2.0".to_string()));
        assert_eq!(pdf_version(b"%PDF-abc\n"), None);
    }

    #[test]
    fn test_zip_without_document_xml_rejected() {
        // An empty ZIP archive is not a DOCX.
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            writer
                .start_file("other.txt", zip::write::FileOptions::default())
                .unwrap();
            use std::io::Write;
            writer.write_all(b"hello").unwrap();
            writer.finish().unwrap();
        }
        assert!(matches!(
            detect_from_bytes(&buf),
            Err(Error::UnknownFormat)
        ));
    }
}
