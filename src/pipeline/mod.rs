//! The parse orchestrator: detect, extract, analyze, segment, validate,
//! and fall back across extraction strategies.

mod quality;

pub use quality::QualitySignals;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::detect::FileKind;
use crate::embed::SharedEmbedder;
use crate::error::{Error, Result};
use crate::layout::{
    classify_page, segment_page, HeaderLookup, HistogramConfig, SegmenterConfig,
};
use crate::lines::{LineGrouper, LineGrouperConfig};
use crate::model::{
    FileInfo, LayoutInfo, Line, PageLayout, ParseOutput, Quality, RunMetadata, Section,
    SectionOutput, UnknownHeader,
};
use crate::section::{
    Assembler, HeaderDetector, HeaderDetectorConfig, LearnedBatch, LineLabel, SectionDb, Snapshot,
};
use crate::source::{
    DocumentInput, DocxSource, OcrConfig, OcrSource, SharedOcr, TesseractOcr, TextLayerSource,
    WordSource,
};

/// Default location of the persisted section database.
pub const DEFAULT_DB_PATH: &str = "config/sections_database";

/// Maximum strategies tried per document.
const MAX_STRATEGIES: usize = 3;

/// Token acquisition budget per strategy.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60);

/// A concrete extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// PDF text layer
    TextLayer,
    /// Rasterize and recognize
    Ocr,
    /// Native DOCX flow
    Docx,
}

impl Strategy {
    /// Stable name recorded in run metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::TextLayer => "text-layer",
            Strategy::Ocr => "ocr",
            Strategy::Docx => "docx",
        }
    }

    /// Ordered strategy list for a detected file kind.
    pub fn order_for(kind: FileKind) -> Vec<Strategy> {
        match kind {
            FileKind::PdfText => vec![Strategy::TextLayer, Strategy::Ocr],
            FileKind::PdfScanned | FileKind::Image => vec![Strategy::Ocr],
            FileKind::Docx => vec![Strategy::Docx, Strategy::Ocr],
        }
    }
}

/// Cooperative cancellation handle. A parse checks it between stages and
/// between pages; a cancelled parse returns [`Error::Cancelled`] without
/// committing anything.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Parse configuration.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Section database location; `None` keeps the database in memory
    pub db_path: Option<PathBuf>,
    /// OCR settings
    pub ocr: OcrConfig,
    /// Whether the embedding matcher may run
    pub embeddings_enabled: bool,
    /// Embedding similarity floor
    pub embedding_threshold: f32,
    /// Fixed header score threshold (disables adaptation)
    pub header_threshold_override: Option<f32>,
    /// Histogram classifier tunables
    pub histogram: HistogramConfig,
    /// Column segmenter tunables
    pub segmenter: SegmenterConfig,
    /// Line grouper tunables
    pub line_grouper: LineGrouperConfig,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            db_path: Some(PathBuf::from(DEFAULT_DB_PATH)),
            ocr: OcrConfig::default(),
            embeddings_enabled: false,
            embedding_threshold: crate::section::DEFAULT_EMBEDDING_THRESHOLD,
            header_threshold_override: None,
            histogram: HistogramConfig::default(),
            segmenter: SegmenterConfig::default(),
            line_grouper: LineGrouperConfig::default(),
        }
    }
}

impl ParseOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the environment (`SECTION_DB_PATH`,
    /// `EMBEDDINGS_ENABLED`, `EMBEDDING_SIMILARITY_THRESHOLD`,
    /// `HEADER_SCORE_THRESHOLD_OVERRIDE`, and the `OCR_*` family).
    pub fn from_env() -> Self {
        let mut opts = Self::default();
        opts.ocr = OcrConfig::from_env();
        if let Ok(path) = std::env::var("SECTION_DB_PATH") {
            if !path.trim().is_empty() {
                opts.db_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(enabled) = std::env::var("EMBEDDINGS_ENABLED") {
            opts.embeddings_enabled =
                matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(threshold) = std::env::var("EMBEDDING_SIMILARITY_THRESHOLD") {
            if let Ok(threshold) = threshold.parse::<f32>() {
                opts.embedding_threshold = threshold.clamp(0.0, 1.0);
            }
        }
        if let Ok(fixed) = std::env::var("HEADER_SCORE_THRESHOLD_OVERRIDE") {
            if let Ok(fixed) = fixed.parse::<f32>() {
                opts.header_threshold_override = Some(fixed);
            }
        }
        opts
    }

    /// Use an in-memory section database.
    pub fn without_persistence(mut self) -> Self {
        self.db_path = None;
        self
    }

    /// Set the section database path.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Fix the header score threshold.
    pub fn with_header_threshold(mut self, threshold: f32) -> Self {
        self.header_threshold_override = Some(threshold);
        self
    }
}

/// The result of analyzing already-acquired pages (C2 through C7).
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Sections in reading order
    pub sections: Vec<Section>,
    /// Per-page layout classification
    pub layouts: Vec<LayoutInfo>,
    /// Unmatched header candidates
    pub unknown_headers: Vec<UnknownHeader>,
    /// Header lines that resolved to a section
    pub known_header_count: usize,
    /// Non-fatal conditions
    pub warnings: Vec<String>,
}

/// Run layout classification, segmentation, line grouping, header
/// detection, and assembly over acquired pages.
///
/// This is the pure core of a parse: everything it touches is owned by
/// the call except the database snapshot and the learned batch.
pub fn analyze_pages(
    pages: &[crate::model::Page],
    snapshot: &Snapshot,
    opts: &ParseOptions,
    batch: &mut LearnedBatch,
    cancel: &CancelToken,
) -> Result<Analysis> {
    let grouper = LineGrouper::new(opts.line_grouper.clone());
    let detector = HeaderDetector::new(HeaderDetectorConfig {
        threshold_override: opts.header_threshold_override,
    });

    let mut analysis = Analysis::default();
    let mut stream: Vec<(Line, LineLabel)> = Vec::new();

    for page in pages {
        cancel.check()?;

        let layout = classify_page(page, &opts.histogram);
        if layout.ambiguous {
            analysis
                .warnings
                .push(format!("page {}: ambiguous layout, used single column", page.index));
        }

        let regions = segment_page(
            page,
            &layout,
            Some(snapshot as &dyn HeaderLookup),
            &opts.segmenter,
        );
        let columns: Vec<Vec<Line>> = regions.iter().map(|r| grouper.group(r)).collect();

        let labels = detector.label_page(&columns, snapshot, batch);
        analysis.unknown_headers.extend(labels.unknown);

        for (lines, line_labels) in columns.into_iter().zip(labels.labels) {
            for pair in lines.into_iter().zip(line_labels) {
                if pair.1.is_header() {
                    analysis.known_header_count += 1;
                }
                stream.push(pair);
            }
        }
        analysis.layouts.push(layout);
    }

    cancel.check()?;
    analysis.sections = Assembler.assemble(stream);
    Ok(analysis)
}

/// One strategy's completed run.
struct Candidate {
    strategy: Strategy,
    analysis: Analysis,
    page_count: usize,
    score: f32,
    batch: LearnedBatch,
}

/// Composes the full pipeline and drives fallback strategies.
///
/// One orchestrator serves the whole process: the section database and
/// the OCR provider are constructed once and shared by every parse.
pub struct Orchestrator {
    db: Arc<SectionDb>,
    opts: ParseOptions,
    ocr_provider: OnceLock<Option<SharedOcr>>,
    injected_ocr: Option<SharedOcr>,
}

impl Orchestrator {
    /// Create an orchestrator, opening (or seeding) the section database
    /// configured in `opts`.
    pub fn new(opts: ParseOptions) -> Result<Self> {
        Self::build(opts, None)
    }

    /// Create an orchestrator with an embedding provider attached to the
    /// section matcher. The provider is only consulted when embeddings
    /// are enabled in the options.
    pub fn new_with_embedder(opts: ParseOptions, embedder: SharedEmbedder) -> Result<Self> {
        Self::build(opts, Some(embedder))
    }

    fn build(opts: ParseOptions, embedder: Option<SharedEmbedder>) -> Result<Self> {
        let db = match &opts.db_path {
            Some(path) => SectionDb::open(path)?,
            None => SectionDb::in_memory(),
        };
        let mut db = db.with_embedding_threshold(opts.embedding_threshold);
        if opts.embeddings_enabled {
            if let Some(embedder) = embedder {
                db = db.with_embedder(embedder);
            }
        }
        Ok(Self {
            db: Arc::new(db),
            opts,
            ocr_provider: OnceLock::new(),
            injected_ocr: None,
        })
    }

    /// Create an orchestrator around an existing database.
    pub fn with_db(db: Arc<SectionDb>, opts: ParseOptions) -> Self {
        Self {
            db,
            opts,
            ocr_provider: OnceLock::new(),
            injected_ocr: None,
        }
    }

    /// Inject an OCR provider (tests, alternative engines).
    pub fn with_ocr_provider(mut self, provider: SharedOcr) -> Self {
        self.injected_ocr = Some(provider);
        self
    }

    /// The shared section database.
    pub fn database(&self) -> &Arc<SectionDb> {
        &self.db
    }

    /// Parse a document from a path.
    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<ParseOutput> {
        self.parse_input(DocumentInput::load(path)?, &CancelToken::new())
    }

    /// Parse an already-loaded document.
    pub fn parse_input(&self, input: DocumentInput, cancel: &CancelToken) -> Result<ParseOutput> {
        let kind = input.kind();
        let sources: Vec<(Strategy, Result<Box<dyn WordSource>>)> = Strategy::order_for(kind)
            .into_iter()
            .take(MAX_STRATEGIES)
            .map(|strategy| (strategy, self.make_source(strategy)))
            .collect();
        self.parse_with_sources(input, sources, cancel)
    }

    /// Drive the fallback state machine over prepared sources.
    fn parse_with_sources(
        &self,
        input: DocumentInput,
        sources: Vec<(Strategy, Result<Box<dyn WordSource>>)>,
        cancel: &CancelToken,
    ) -> Result<ParseOutput> {
        let started = Instant::now();
        cancel.check()?;

        let kind = input.kind();
        let snapshot = self.db.snapshot();
        let mut attempts: Vec<String> = Vec::new();
        let mut attempt_errors: Vec<String> = Vec::new();
        let mut best: Option<Candidate> = None;

        for (strategy, source) in sources {
            cancel.check()?;
            let source = match source {
                Ok(source) => source,
                Err(e) => {
                    log::warn!("{}: strategy unavailable: {e}", strategy.as_str());
                    attempts.push(strategy.as_str().to_string());
                    attempt_errors.push(format!("{}: {e}", strategy.as_str()));
                    continue;
                }
            };

            let acquire_started = Instant::now();
            let pages = match source.acquire(&input) {
                Ok(pages) => pages,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::info!("{}: extraction failed: {e}", strategy.as_str());
                    attempts.push(strategy.as_str().to_string());
                    attempt_errors.push(format!("{}: {e}", strategy.as_str()));
                    continue;
                }
            };
            if acquire_started.elapsed() > ACQUIRE_TIMEOUT {
                log::warn!("{}: acquisition exceeded budget", strategy.as_str());
                attempts.push(strategy.as_str().to_string());
                attempt_errors.push(format!("{}: acquisition timed out", strategy.as_str()));
                continue;
            }

            let mut batch = LearnedBatch::default();
            let analysis = analyze_pages(&pages, &snapshot, &self.opts, &mut batch, cancel)?;
            let signals = QualitySignals::evaluate(
                &analysis.sections,
                analysis.unknown_headers.len(),
                analysis.known_header_count,
                pages.len(),
            );
            let score = signals.score();
            attempts.push(strategy.as_str().to_string());

            let candidate = Candidate {
                strategy,
                analysis,
                page_count: pages.len(),
                score,
                batch,
            };
            let accept = score >= 0.6;
            if best.as_ref().map(|b| candidate.score > b.score).unwrap_or(true) {
                best = Some(candidate);
            }
            if accept {
                break;
            }
        }

        cancel.check()?;
        let Some(chosen) = best else {
            return Err(Error::ParseFailed(format!(
                "no strategy produced tokens ({})",
                attempt_errors.join("; ")
            )));
        };
        if chosen.score < 0.4 && chosen.analysis.sections.is_empty() {
            return Err(Error::ParseFailed(
                "all strategies produced empty, unusable output".into(),
            ));
        }

        // Commit learned variants; a failed write never fails the parse.
        let mut warnings = chosen.analysis.warnings.clone();
        let learned = chosen.batch.descriptions();
        if let Err(e) = self.db.commit(&chosen.batch) {
            log::warn!("section database commit failed: {e}");
            warnings.push(format!("section database commit failed: {e}"));
        }

        let fallbacks_tried: Vec<String> = attempts
            .iter()
            .filter(|name| name.as_str() != chosen.strategy.as_str())
            .cloned()
            .collect();

        Ok(build_output(
            &input,
            kind,
            chosen,
            fallbacks_tried,
            learned,
            warnings,
            started.elapsed(),
        ))
    }

    fn make_source(&self, strategy: Strategy) -> Result<Box<dyn WordSource>> {
        match strategy {
            Strategy::TextLayer => Ok(Box::new(TextLayerSource::default())),
            Strategy::Docx => Ok(Box::new(DocxSource)),
            Strategy::Ocr => {
                let provider = self.ocr().ok_or_else(|| {
                    Error::OcrUnavailable("no OCR engine found (tesseract not installed?)".into())
                })?;
                Ok(Box::new(OcrSource::new(provider, self.opts.ocr.clone())))
            }
        }
    }

    /// The process-wide OCR provider, constructed on first use.
    fn ocr(&self) -> Option<SharedOcr> {
        self.ocr_provider
            .get_or_init(|| {
                if let Some(injected) = &self.injected_ocr {
                    return Some(injected.clone());
                }
                if TesseractOcr::available() {
                    Some(Arc::new(TesseractOcr) as SharedOcr)
                } else {
                    None
                }
            })
            .clone()
    }
}

fn build_output(
    input: &DocumentInput,
    kind: FileKind,
    chosen: Candidate,
    fallbacks_tried: Vec<String>,
    learned_variants: Vec<String>,
    warnings: Vec<String>,
    elapsed: Duration,
) -> ParseOutput {
    let scanned = kind.is_scanned() || chosen.strategy == Strategy::Ocr;
    ParseOutput {
        file: FileInfo {
            name: input.file_name(),
            file_type: kind.type_name().to_string(),
            pages: chosen.page_count,
            scanned,
        },
        layouts: chosen
            .analysis
            .layouts
            .iter()
            .map(|l| PageLayout {
                page: l.page,
                layout_type: l.class.type_name().to_string(),
                columns: l.class.column_count(),
                confidence: l.confidence,
            })
            .collect(),
        sections: chosen
            .analysis
            .sections
            .iter()
            .map(|s| SectionOutput {
                name: s.name.as_str().to_string(),
                page_span: [s.page_span.0, s.page_span.1],
                lines: s.body_texts(),
            })
            .collect(),
        unknown_headers: chosen.analysis.unknown_headers,
        quality: Quality::from_score(chosen.score),
        metadata: RunMetadata {
            strategy_used: chosen.strategy.as_str().to_string(),
            fallbacks_tried,
            elapsed_ms: elapsed.as_millis() as u64,
            learned_variants,
            warnings,
        },
    }
}
