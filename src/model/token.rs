//! Positioned tokens and pages.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page coordinates (origin top-left,
/// y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a new bounding box. Coordinates are normalized so that
    /// `x0 <= x1` and `y0 <= y1`.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Box width.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Box height.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal center.
    pub fn x_center(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn y_center(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Vertical overlap with another box, in points (0 when disjoint).
    pub fn y_overlap(&self, other: &BBox) -> f32 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }

    /// Whether the x-ranges of the two boxes intersect.
    pub fn x_intersects(&self, other: &BBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Font capability flags attached to a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontFlags {
    /// Bold weight
    pub bold: bool,
    /// Italic or oblique slant
    pub italic: bool,
    /// Fixed-pitch font
    pub monospace: bool,
}

impl FontFlags {
    /// Infer flags from a PostScript font name (e.g. "Helvetica-Bold").
    pub fn from_font_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        Self {
            bold: lower.contains("bold") || lower.contains("black") || lower.contains("heavy"),
            italic: lower.contains("italic") || lower.contains("oblique"),
            monospace: lower.contains("mono") || lower.contains("courier"),
        }
    }
}

/// One positioned word in the document.
///
/// `text` never contains internal whitespace; a word source splits runs on
/// whitespace before emitting tokens. `confidence` is 1.0 for text-layer
/// tokens and the recognizer score for OCR tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Word text, non-empty, no internal whitespace
    pub text: String,
    /// 0-based page index
    pub page: usize,
    /// Bounding box in page coordinates
    pub bbox: BBox,
    /// Font size in points
    pub font_size: f32,
    /// Style flags
    pub flags: FontFlags,
    /// RGB fill color, when known
    pub color: Option<[u8; 3]>,
    /// Recognition confidence in [0,1]
    pub confidence: f32,
}

impl Token {
    /// Create a text-layer token (confidence 1.0).
    pub fn new(text: impl Into<String>, page: usize, bbox: BBox, font_size: f32) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            font_size,
            flags: FontFlags::default(),
            color: None,
            confidence: 1.0,
        }
    }

    /// Set style flags.
    pub fn with_flags(mut self, flags: FontFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set recognition confidence.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set fill color.
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }

    /// Number of alphabetic characters in the token text.
    pub fn alpha_chars(&self) -> usize {
        self.text.chars().filter(|c| c.is_alphabetic()).count()
    }
}

/// Normalize raw word text from a source: collapse internal whitespace and
/// drop the token entirely when it is standalone punctuation.
///
/// Case is preserved; interior punctuation (e.g. "B.Tech", "C++") is kept.
pub(crate) fn normalize_token_text(raw: &str) -> Option<String> {
    let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join("");
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().all(|c| !c.is_alphanumeric()) {
        return None;
    }
    Some(collapsed)
}

/// A single page of positioned tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 0-based page index
    pub index: usize,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Tokens, sorted by (y0, x0)
    pub tokens: Vec<Token>,
}

impl Page {
    /// Create an empty page.
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            tokens: Vec::new(),
        }
    }

    /// Add a token and keep the list unsorted until [`Page::finish`].
    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Sort tokens into (y0, x0) order for downstream consumers.
    pub fn finish(&mut self) {
        self.tokens.sort_by(|a, b| {
            (a.bbox.y0, a.bbox.x0)
                .partial_cmp(&(b.bbox.y0, b.bbox.x0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Whether the page carries no tokens at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Alphabetic character count over the body area (used by word sources
    /// to decide whether a text layer is usable).
    pub fn body_alpha_chars(&self) -> usize {
        self.body_tokens().map(|t| t.alpha_chars()).sum()
    }

    /// Tokens inside the body band, excluding the top 8% and bottom 5%
    /// margins where running headers and footers live.
    pub fn body_tokens(&self) -> impl Iterator<Item = &Token> {
        let top = self.height * 0.08;
        let bottom = self.height * 0.95;
        self.tokens
            .iter()
            .filter(move |t| t.bbox.y_center() >= top && t.bbox.y_center() <= bottom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalizes_corners() {
        let b = BBox::new(10.0, 20.0, 5.0, 8.0);
        assert_eq!(b.x0, 5.0);
        assert_eq!(b.x1, 10.0);
        assert_eq!(b.y0, 8.0);
        assert_eq!(b.y1, 20.0);
    }

    #[test]
    fn test_bbox_y_overlap() {
        let a = BBox::new(0.0, 10.0, 50.0, 20.0);
        let b = BBox::new(60.0, 15.0, 100.0, 25.0);
        assert_eq!(a.y_overlap(&b), 5.0);

        let c = BBox::new(0.0, 30.0, 50.0, 40.0);
        assert_eq!(a.y_overlap(&c), 0.0);
    }

    #[test]
    fn test_font_flags_from_name() {
        let flags = FontFlags::from_font_name("Helvetica-BoldOblique");
        assert!(flags.bold);
        assert!(flags.italic);
        assert!(!flags.monospace);

        let flags = FontFlags::from_font_name("Courier");
        assert!(flags.monospace);
    }

    #[test]
    fn test_normalize_token_text() {
        assert_eq!(normalize_token_text("hello"), Some("hello".into()));
        assert_eq!(normalize_token_text("he llo"), Some("hello".into()));
        assert_eq!(normalize_token_text("B.Tech"), Some("B.Tech".into()));
        assert_eq!(normalize_token_text("•"), None);
        assert_eq!(normalize_token_text("  "), None);
        assert_eq!(normalize_token_text("--"), None);
    }

    #[test]
    fn test_page_finish_sorts() {
        let mut page = Page::new(0, 612.0, 792.0);
        page.push(Token::new("b", 0, BBox::new(10.0, 50.0, 30.0, 60.0), 11.0));
        page.push(Token::new("a", 0, BBox::new(10.0, 10.0, 30.0, 20.0), 11.0));
        page.finish();
        assert_eq!(page.tokens[0].text, "a");
        assert_eq!(page.tokens[1].text, "b");
    }

    #[test]
    fn test_body_tokens_excludes_margins() {
        let mut page = Page::new(0, 612.0, 792.0);
        // Header band token (top 8% = y < 63.4)
        page.push(Token::new("hdr", 0, BBox::new(10.0, 5.0, 40.0, 15.0), 9.0));
        // Body token
        page.push(Token::new(
            "body",
            0,
            BBox::new(10.0, 300.0, 40.0, 312.0),
            11.0,
        ));
        // Footer band token (bottom 5% = y > 752.4)
        page.push(Token::new(
            "ftr",
            0,
            BBox::new(10.0, 780.0, 40.0, 790.0),
            8.0,
        ));
        page.finish();

        let body: Vec<_> = page.body_tokens().map(|t| t.text.as_str()).collect();
        assert_eq!(body, vec!["body"]);
    }
}
