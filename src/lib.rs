//! # unresume
//!
//! Layout-aware resume section extraction for Rust.
//!
//! This library turns a resume document (PDF with a text layer, scanned
//! PDF, DOCX, or a page image) into an ordered list of labeled sections
//! (Experience, Education, Skills, ...), preserving the reading order of
//! multi-column, hybrid, and scanned layouts.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unresume::{Orchestrator, ParseOptions};
//!
//! fn main() -> unresume::Result<()> {
//!     let orchestrator = Orchestrator::new(ParseOptions::from_env())?;
//!     let output = orchestrator.parse_path("resume.pdf")?;
//!
//!     for section in &output.sections {
//!         println!("[{}] {} lines", section.name, section.lines.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## How it works
//!
//! - **Word acquisition**: positioned tokens from the PDF text layer, an
//!   OCR engine, or native DOCX flow, all in one schema
//! - **Layout classification**: 1-D vertical-density histograms decide
//!   single-column, multi-column, or hybrid per page
//! - **Line and section grouping**: y-overlap line reconstruction and
//!   multi-signal header scoring
//! - **Self-learning matcher**: header variants persist and grow across
//!   runs in a section database
//! - **Fallback strategies**: a quality score drives text-layer to OCR
//!   fallback until the result is acceptable

pub mod detect;
pub mod embed;
pub mod error;
pub mod layout;
pub mod lines;
pub mod model;
pub mod pipeline;
pub mod section;
pub mod source;

// Re-export commonly used types
pub use detect::{detect_from_bytes, detect_from_path, DetectedFile, FileKind};
pub use embed::{cosine_similarity, EmbeddingProvider, SharedEmbedder};
pub use error::{Error, Result};
pub use model::{
    BBox, CanonicalSection, FileInfo, FontFlags, JsonFormat, LayoutClass, Line, MatchKind, Page,
    PageLayout, ParseOutput, Quality, QualityRung, Section, SectionOutput, Token, UnknownHeader,
};
pub use pipeline::{
    analyze_pages, Analysis, CancelToken, Orchestrator, ParseOptions, QualitySignals, Strategy,
};
pub use section::{LearnedBatch, SectionDb, Snapshot};
pub use source::{
    DocumentInput, OcrConfig, OcrProvider, OcrWord, SharedOcr, TesseractOcr, WordSource,
};

use std::path::Path;

/// Parse a resume file with default options.
///
/// # Example
///
/// ```no_run
/// let output = unresume::parse_file("resume.pdf").unwrap();
/// println!("{} sections", output.sections.len());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParseOutput> {
    Orchestrator::new(ParseOptions::default())?.parse_path(path)
}

/// Parse a resume file with custom options.
pub fn parse_file_with_options<P: AsRef<Path>>(
    path: P,
    options: ParseOptions,
) -> Result<ParseOutput> {
    Orchestrator::new(options)?.parse_path(path)
}

/// Parse a resume from bytes. `name` is used for format-dependent
/// external tools and the output record.
pub fn parse_bytes(name: &str, data: Vec<u8>) -> Result<ParseOutput> {
    let input = DocumentInput::from_bytes(name, data)?;
    Orchestrator::new(ParseOptions::default())?.parse_input(input, &CancelToken::new())
}

/// Builder for configuring and running parses.
///
/// # Example
///
/// ```no_run
/// use unresume::Unresume;
///
/// let output = Unresume::new()
///     .with_db_path("config/sections_database")
///     .with_ocr_dpi(300)
///     .parse("resume.pdf")?;
/// # Ok::<(), unresume::Error>(())
/// ```
pub struct Unresume {
    options: ParseOptions,
    embedder: Option<SharedEmbedder>,
    ocr: Option<SharedOcr>,
}

impl Unresume {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self {
            options: ParseOptions::default(),
            embedder: None,
            ocr: None,
        }
    }

    /// Set the section database path.
    pub fn with_db_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.options = self.options.with_db_path(path);
        self
    }

    /// Keep the section database in memory only.
    pub fn without_persistence(mut self) -> Self {
        self.options = self.options.without_persistence();
        self
    }

    /// Set the OCR render resolution.
    pub fn with_ocr_dpi(mut self, dpi: u32) -> Self {
        self.options.ocr.dpi = dpi;
        self.options.ocr = self.options.ocr.clamped();
        self
    }

    /// Set the OCR languages (comma separated).
    pub fn with_ocr_languages(mut self, languages: impl Into<String>) -> Self {
        self.options.ocr.languages = languages.into();
        self
    }

    /// Fix the header score threshold.
    pub fn with_header_threshold(mut self, threshold: f32) -> Self {
        self.options = self.options.with_header_threshold(threshold);
        self
    }

    /// Enable embedding-based matching with the given provider.
    pub fn with_embedder(mut self, embedder: SharedEmbedder) -> Self {
        self.options.embeddings_enabled = true;
        self.embedder = Some(embedder);
        self
    }

    /// Use a specific OCR provider instead of auto-detection.
    pub fn with_ocr_provider(mut self, provider: SharedOcr) -> Self {
        self.ocr = Some(provider);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator> {
        let orchestrator = match self.embedder {
            Some(embedder) => Orchestrator::new_with_embedder(self.options, embedder)?,
            None => Orchestrator::new(self.options)?,
        };
        Ok(match self.ocr {
            Some(provider) => orchestrator.with_ocr_provider(provider),
            None => orchestrator,
        })
    }

    /// Build and parse one file.
    pub fn parse<P: AsRef<Path>>(self, path: P) -> Result<ParseOutput> {
        self.build()?.parse_path(path)
    }
}

impl Default for Unresume {
    fn default() -> Self {
        Self::new()
    }
}
