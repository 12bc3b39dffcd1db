//! Error types for the unresume library.

use std::io;
use thiserror::Error;

/// Result type alias for unresume operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during resume parsing.
///
/// Only [`Error::InvalidInput`], [`Error::ParseFailed`], and
/// [`Error::Cancelled`] escape a document parse. Everything else is
/// absorbed by the orchestrator, which either falls back to the next
/// extraction strategy or records the condition in the run diagnostics.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input file is missing, unreadable, or not a supported format.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The file format is not recognized.
    #[error("Unknown file format")]
    UnknownFormat,

    /// A page's text layer yielded too little alphabetic content.
    #[error("No extractable text on page {page} ({alpha_chars} alphabetic chars)")]
    NoExtractableText {
        /// 0-based page index
        page: usize,
        /// Alphabetic characters found in the body area
        alpha_chars: usize,
    },

    /// The OCR provider is not installed or its model could not be loaded.
    #[error("OCR unavailable: {0}")]
    OcrUnavailable(String),

    /// The OCR engine failed on a page.
    #[error("OCR failed on page {page}: {reason}")]
    OcrFailed {
        /// 0-based page index
        page: usize,
        /// Provider-reported failure
        reason: String,
    },

    /// The histogram classifier produced contradictory peaks.
    #[error("Ambiguous layout on page {0}")]
    LayoutAmbiguous(usize),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// Error parsing DOCX structure.
    #[error("DOCX parsing error: {0}")]
    DocxParse(String),

    /// Persisting the section database failed.
    #[error("Section database write failed: {0}")]
    DatabaseWrite(String),

    /// The section database file is corrupt.
    #[error("Section database load failed: {0}")]
    DatabaseLoad(String),

    /// The embedding provider failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// A pipeline stage exceeded its time budget.
    #[error("Stage '{stage}' timed out after {seconds}s")]
    StageTimeout {
        /// Pipeline stage name
        stage: &'static str,
        /// Configured budget in seconds
        seconds: u64,
    },

    /// The parse was cancelled between stages.
    #[error("Parse cancelled")]
    Cancelled,

    /// Every extraction strategy failed to produce usable output.
    #[error("Parse failed: {0}")]
    ParseFailed(String),

    /// Error serializing the output record.
    #[error("Rendering error: {0}")]
    Render(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl Error {
    /// Whether this error should abort the whole parse instead of
    /// triggering the next fallback strategy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::ParseFailed(_) | Error::Cancelled
        )
    }
}
