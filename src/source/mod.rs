//! Word acquisition: turning a document into pages of positioned tokens.
//!
//! Every source emits the same token schema, so everything downstream of
//! acquisition is blind to where the words came from. The orchestrator
//! picks a source per fallback step; the sources themselves never decide.

mod docx;
mod ocr;
mod text_layer;

pub use docx::DocxSource;
pub use ocr::{OcrConfig, OcrProvider, OcrSource, OcrWord, PageRasterizer, SharedOcr, TesseractOcr};
pub use text_layer::TextLayerSource;

use std::fs;
use std::path::{Path, PathBuf};

use crate::detect::{detect_from_bytes, DetectedFile, FileKind};
use crate::error::{Error, Result};
use crate::model::Page;

/// An input document: its path, raw bytes, and detected kind.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    /// Original path (used for naming and external tools)
    pub path: PathBuf,
    /// Raw file bytes
    pub data: Vec<u8>,
    /// Detection result
    pub detected: DetectedFile,
}

impl DocumentInput {
    /// Read and detect a document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
        let detected = detect_from_bytes(&data)
            .map_err(|_| Error::InvalidInput(format!("{}: unsupported format", path.display())))?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
            detected,
        })
    }

    /// Wrap bytes that are already in memory.
    pub fn from_bytes(name: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        let detected =
            detect_from_bytes(&data).map_err(|_| Error::InvalidInput("unsupported format".into()))?;
        Ok(Self {
            path: name.into(),
            data,
            detected,
        })
    }

    /// Detected file kind.
    pub fn kind(&self) -> FileKind {
        self.detected.kind
    }

    /// File name for the output record.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// A word source: yields positioned tokens for every page of a document.
pub trait WordSource {
    /// Strategy name recorded in run metadata.
    fn name(&self) -> &'static str;

    /// Extract all pages. A page with no recoverable words comes back
    /// empty rather than failing the document; the source errs only when
    /// it cannot produce anything usable at all.
    fn acquire(&self, input: &DocumentInput) -> Result<Vec<Page>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let result = DocumentInput::from_bytes("x.bin", vec![0u8; 32]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_file_name() {
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(&[0u8; 24]);
        let input = DocumentInput::from_bytes("/tmp/scans/cv.png", png).unwrap();
        assert_eq!(input.file_name(), "cv.png");
        assert_eq!(input.kind(), FileKind::Image);
    }
}
