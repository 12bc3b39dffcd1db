//! OCR word source: rasterize pages, recognize words, map boxes back to
//! page coordinates.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detect::FileKind;
use crate::error::{Error, Result};
use crate::model::{BBox, Page, Token};

use super::{DocumentInput, WordSource};

/// Per-page OCR time budget.
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// OCR configuration, overridable from the environment.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Render resolution in dots per inch (clamped to [150, 400])
    pub dpi: u32,
    /// Recognition languages, comma separated (e.g. "en" or "en,de")
    pub languages: String,
    /// Hint that the provider may use GPU acceleration
    pub gpu: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            languages: "en".to_string(),
            gpu: false,
        }
    }
}

impl OcrConfig {
    /// Read `OCR_DPI`, `OCR_LANGUAGES`, and `OCR_GPU` from the
    /// environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dpi) = std::env::var("OCR_DPI") {
            if let Ok(dpi) = dpi.parse::<u32>() {
                cfg.dpi = dpi;
            }
        }
        if let Ok(langs) = std::env::var("OCR_LANGUAGES") {
            if !langs.trim().is_empty() {
                cfg.languages = langs;
            }
        }
        if let Ok(gpu) = std::env::var("OCR_GPU") {
            cfg.gpu = matches!(gpu.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        cfg.clamped()
    }

    /// Clamp the resolution to the supported range.
    pub fn clamped(mut self) -> Self {
        self.dpi = self.dpi.clamp(150, 400);
        self
    }

    /// Points per rendered pixel at this resolution.
    pub fn points_per_pixel(&self) -> f32 {
        72.0 / self.dpi as f32
    }
}

/// One recognized word in image pixel coordinates.
#[derive(Debug, Clone)]
pub struct OcrWord {
    /// Recognized text
    pub text: String,
    /// (x0, y0, x1, y1) in pixels, origin top-left
    pub bbox: [f32; 4],
    /// Recognizer confidence in [0,1]
    pub confidence: f32,
}

/// A word recognizer over a rendered page image.
pub trait OcrProvider: Send + Sync {
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;

    /// Recognize words in an image file.
    fn recognize(&self, image: &Path, languages: &str) -> Result<Vec<OcrWord>>;
}

/// Shared handle to a provider, constructed once per process.
pub type SharedOcr = Arc<dyn OcrProvider>;

/// Tesseract-backed provider using its TSV output.
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr;

impl TesseractOcr {
    /// Check that the `tesseract` binary is runnable.
    pub fn available() -> bool {
        Command::new("tesseract")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Map short language codes onto tesseract's three-letter data names.
    fn lang_arg(languages: &str) -> String {
        languages
            .split([',', '+'])
            .map(|l| match l.trim() {
                "en" | "" => "eng",
                "de" => "deu",
                "fr" => "fra",
                "es" => "spa",
                other => other,
            })
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl OcrProvider for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &Path, languages: &str) -> Result<Vec<OcrWord>> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(Self::lang_arg(languages))
            .arg("--psm")
            .arg("3")
            .arg("tsv");
        let output = run_with_timeout(cmd, PAGE_TIMEOUT)
            .map_err(|e| Error::OcrUnavailable(format!("tesseract: {e}")))?;
        parse_tsv(&output)
    }
}

/// Parse tesseract TSV: level 5 rows are words.
fn parse_tsv(output: &str) -> Result<Vec<OcrWord>> {
    let mut words = Vec::new();
    for line in output.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            cols[6].parse::<f32>(),
            cols[7].parse::<f32>(),
            cols[8].parse::<f32>(),
            cols[9].parse::<f32>(),
        ) else {
            continue;
        };
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        if conf < 0.0 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        words.push(OcrWord {
            text: text.to_string(),
            bbox: [left, top, left + width, top + height],
            confidence: (conf / 100.0).clamp(0.0, 1.0),
        });
    }
    Ok(words)
}

/// Renders PDF pages to PNG via `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PageRasterizer {
    out_dir: PathBuf,
    dpi: u32,
}

impl PageRasterizer {
    /// Create a rasterizer writing into `out_dir`.
    pub fn new(out_dir: PathBuf, dpi: u32) -> Self {
        Self { out_dir, dpi }
    }

    /// Render one page (0-based) and return the image path. The caller
    /// removes the file once the page has been recognized; one page image
    /// is the largest transient of a parse.
    pub fn render_page(&self, pdf_path: &Path, page_idx: usize) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)?;

        // pdftoppm uses 1-based page indices.
        let page_number = page_idx + 1;
        let prefix = self.out_dir.join(format!("page_{page_number:03}"));
        let prefix_str = prefix
            .to_str()
            .ok_or_else(|| Error::InvalidInput("non-UTF8 output path".into()))?;

        let mut cmd = Command::new("pdftoppm");
        cmd.arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg(page_number.to_string())
            .arg("-l")
            .arg(page_number.to_string())
            .arg(pdf_path)
            .arg(prefix_str);
        run_with_timeout(cmd, PAGE_TIMEOUT).map_err(|e| {
            Error::OcrUnavailable(format!("pdftoppm (is poppler-utils installed?): {e}"))
        })?;

        // pdftoppm appends the page number to the prefix.
        for candidate in [
            self.out_dir
                .join(format!("page_{page_number:03}-{page_number}.png")),
            self.out_dir
                .join(format!("page_{page_number:03}-{page_number:02}.png")),
            self.out_dir
                .join(format!("page_{page_number:03}-{page_number:03}.png")),
        ] {
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(Error::OcrFailed {
            page: page_idx,
            reason: "rendered image not found".into(),
        })
    }
}

/// Run a command to completion with a wall-clock budget, killing it on
/// overrun.
fn run_with_timeout(mut cmd: Command, budget: Duration) -> std::io::Result<String> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            let output = child.wait_with_output()?;
            if !status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(std::io::Error::other(format!(
                    "exited with {status}: {}",
                    stderr.trim()
                )));
            }
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        if start.elapsed() > budget {
            let _ = child.kill();
            let _ = child.wait();
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timed out after {}s", budget.as_secs()),
            ));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// OCR-backed word source.
pub struct OcrSource {
    provider: SharedOcr,
    cfg: OcrConfig,
}

impl OcrSource {
    /// Create a source around a shared provider.
    pub fn new(provider: SharedOcr, cfg: OcrConfig) -> Self {
        Self { provider, cfg }
    }

    fn page_for_image(&self, index: usize, image: &Path) -> Result<Page> {
        let (px_w, px_h) = image::image_dimensions(image)
            .map_err(|e| Error::InvalidInput(format!("unreadable image: {e}")))?;
        let scale = self.cfg.points_per_pixel();
        let mut page = Page::new(index, px_w as f32 * scale, px_h as f32 * scale);

        let words = self
            .provider
            .recognize(image, &self.cfg.languages)
            .map_err(|e| match e {
                Error::OcrUnavailable(msg) => Error::OcrUnavailable(msg),
                other => Error::OcrFailed {
                    page: index,
                    reason: other.to_string(),
                },
            })?;
        for word in words {
            let Some(text) = crate::model::normalize_token_text(&word.text) else {
                continue;
            };
            let [x0, y0, x1, y1] = word.bbox;
            let bbox = BBox::new(x0 * scale, y0 * scale, x1 * scale, y1 * scale);
            let font_size = (bbox.height() * 0.9).max(4.0);
            page.push(
                Token::new(text, index, bbox, font_size).with_confidence(word.confidence),
            );
        }
        page.finish();
        Ok(page)
    }

    fn acquire_pdf(&self, input: &DocumentInput) -> Result<Vec<Page>> {
        let page_count = lopdf::Document::load_mem(&input.data)
            .map(|d| d.get_pages().len())
            .unwrap_or(1)
            .max(1);

        let workdir = tempfile::tempdir()?;
        let rasterizer = PageRasterizer::new(workdir.path().to_path_buf(), self.cfg.dpi);

        let mut pages = Vec::with_capacity(page_count);
        for index in 0..page_count {
            let image = match rasterizer.render_page(&input.path, index) {
                Ok(path) => path,
                // A missing renderer fails the whole strategy; a bad
                // single page just comes back empty.
                Err(e @ Error::OcrUnavailable(_)) if index == 0 => return Err(e),
                Err(e) => {
                    log::warn!("page {index}: rasterization failed: {e}");
                    pages.push(Page::new(index, 612.0, 792.0));
                    continue;
                }
            };
            let page = match self.page_for_image(index, &image) {
                Ok(page) => page,
                Err(Error::OcrUnavailable(msg)) => return Err(Error::OcrUnavailable(msg)),
                Err(e) => {
                    log::warn!("page {index}: recognition failed: {e}");
                    Page::new(index, 612.0, 792.0)
                }
            };
            // Release the raster before moving to the next page.
            let _ = std::fs::remove_file(&image);
            pages.push(page);
        }
        Ok(pages)
    }
}

impl WordSource for OcrSource {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn acquire(&self, input: &DocumentInput) -> Result<Vec<Page>> {
        match input.kind() {
            FileKind::Image => Ok(vec![self.page_for_image(0, &input.path)?]),
            FileKind::PdfText | FileKind::PdfScanned => self.acquire_pdf(input),
            FileKind::Docx => {
                let pdf = convert_docx_to_pdf(&input.path)?;
                let converted = DocumentInput::load(&pdf.1)?;
                self.acquire_pdf(&converted)
            }
        }
    }
}

/// Convert a DOCX to PDF through LibreOffice so it can be rendered and
/// recognized. Returns the temp dir (kept alive) and the PDF path.
fn convert_docx_to_pdf(path: &Path) -> Result<(tempfile::TempDir, PathBuf)> {
    let outdir = tempfile::tempdir()?;
    let mut cmd = Command::new("soffice");
    cmd.arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(outdir.path())
        .arg(path);
    run_with_timeout(cmd, Duration::from_secs(60))
        .map_err(|e| Error::OcrUnavailable(format!("soffice: {e}")))?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".into());
    let pdf = outdir.path().join(format!("{stem}.pdf"));
    if !pdf.exists() {
        return Err(Error::OcrUnavailable("soffice produced no PDF".into()));
    }
    Ok((outdir, pdf))
}
