//! Lines reconstructed from tokens within a column.

use serde::{Deserialize, Serialize};

use super::token::{BBox, Token};

/// A maximal horizontal cluster of tokens sharing vertical overlap within
/// one column region.
///
/// Tokens are ordered by `x0`. The spacing fields (`space_above`,
/// `space_below`, `indent_ratio`) are filled in by the line grouper once
/// neighbors are known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    /// 0-based page index
    pub page: usize,
    /// Band ordinal of the owning region
    pub band_index: usize,
    /// Column ordinal of the owning region
    pub column_index: usize,
    /// Vertical extent (y_top, y_bot)
    pub y_band: (f32, f32),
    /// Tokens ordered by x0
    pub tokens: Vec<Token>,
    /// Gap to the previous line in the column (or to the column top)
    pub space_above: f32,
    /// Gap to the next line in the column (or to the column bottom)
    pub space_below: f32,
    /// Left indent as a fraction of the column width
    pub indent_ratio: f32,
}

impl Line {
    /// Build a line from tokens, computing geometry. Spacing fields start
    /// at zero and are set by the grouper.
    pub fn from_tokens(
        page: usize,
        band_index: usize,
        column_index: usize,
        mut tokens: Vec<Token>,
    ) -> Self {
        tokens.sort_by(|a, b| {
            a.bbox
                .x0
                .partial_cmp(&b.bbox.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let y_top = tokens.iter().map(|t| t.bbox.y0).fold(f32::MAX, f32::min);
        let y_bot = tokens.iter().map(|t| t.bbox.y1).fold(f32::MIN, f32::max);
        Self {
            page,
            band_index,
            column_index,
            y_band: (y_top, y_bot),
            tokens,
            space_above: 0.0,
            space_below: 0.0,
            indent_ratio: 0.0,
        }
    }

    /// Token texts joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Line height.
    pub fn height(&self) -> f32 {
        self.y_band.1 - self.y_band.0
    }

    /// Left edge of the line.
    pub fn x0(&self) -> f32 {
        self.tokens.first().map(|t| t.bbox.x0).unwrap_or(0.0)
    }

    /// Right edge of the line.
    pub fn x1(&self) -> f32 {
        self.tokens
            .iter()
            .map(|t| t.bbox.x1)
            .fold(f32::MIN, f32::max)
    }

    /// Bounding box of the whole line.
    pub fn bbox(&self) -> BBox {
        BBox::new(self.x0(), self.y_band.0, self.x1(), self.y_band.1)
    }

    /// Largest font size on the line.
    pub fn max_font_size(&self) -> f32 {
        self.tokens
            .iter()
            .map(|t| t.font_size)
            .fold(0.0f32, f32::max)
    }

    /// Character-weighted average font size.
    pub fn avg_font_size(&self) -> f32 {
        let chars: usize = self.tokens.iter().map(|t| t.text.len()).sum();
        if chars == 0 {
            return 0.0;
        }
        let weighted: f32 = self
            .tokens
            .iter()
            .map(|t| t.font_size * t.text.len() as f32)
            .sum();
        weighted / chars as f32
    }

    /// Fraction of tokens carrying the bold flag.
    pub fn bold_ratio(&self) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        self.tokens.iter().filter(|t| t.flags.bold).count() as f32 / self.tokens.len() as f32
    }

    /// Whether the majority of tokens are bold.
    pub fn is_bold_majority(&self) -> bool {
        self.bold_ratio() >= 0.6
    }

    /// Number of tokens on the line.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the line starts with a bullet or ordered-list marker.
    pub fn starts_with_bullet(&self) -> bool {
        let Some(first) = self.tokens.first() else {
            return false;
        };
        let text = first.text.as_str();
        if matches!(text, "•" | "-" | "*" | "◦" | "·" | "●" | "▪") {
            return true;
        }
        // Ordered markers like "1." or "12."
        let mut chars = text.chars();
        let digits: String = chars.by_ref().take_while(|c| c.is_ascii_digit()).collect();
        !digits.is_empty() && text.ends_with('.') && digits.len() + 1 == text.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::token::FontFlags;

    fn token(text: &str, x0: f32, y0: f32) -> Token {
        Token::new(text, 0, BBox::new(x0, y0, x0 + 30.0, y0 + 11.0), 11.0)
    }

    #[test]
    fn test_from_tokens_orders_by_x() {
        let line = Line::from_tokens(
            0,
            0,
            0,
            vec![token("world", 50.0, 10.0), token("hello", 10.0, 10.0)],
        );
        assert_eq!(line.text(), "hello world");
        assert_eq!(line.y_band, (10.0, 21.0));
    }

    #[test]
    fn test_bold_majority() {
        let bold = FontFlags {
            bold: true,
            ..Default::default()
        };
        let mut t1 = token("EXPERIENCE", 10.0, 10.0);
        t1.flags = bold;
        let mut t2 = token("AND", 45.0, 10.0);
        t2.flags = bold;
        let t3 = token("more", 80.0, 10.0);

        let line = Line::from_tokens(0, 0, 0, vec![t1, t2, t3]);
        assert!(line.is_bold_majority());
        assert!((line.bold_ratio() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_bullet_detection() {
        let line = Line::from_tokens(0, 0, 0, vec![token("•", 10.0, 10.0), token("item", 20.0, 10.0)]);
        assert!(line.starts_with_bullet());

        let line = Line::from_tokens(0, 0, 0, vec![token("3.", 10.0, 10.0), token("item", 25.0, 10.0)]);
        assert!(line.starts_with_bullet());

        let line = Line::from_tokens(0, 0, 0, vec![token("Skills", 10.0, 10.0)]);
        assert!(!line.starts_with_bullet());
    }

    #[test]
    fn test_max_and_avg_font_size() {
        let mut big = token("Big", 10.0, 10.0);
        big.font_size = 18.0;
        let small = token("small", 50.0, 10.0);
        let line = Line::from_tokens(0, 0, 0, vec![big, small]);
        assert_eq!(line.max_font_size(), 18.0);
        assert!(line.avg_font_size() > 11.0 && line.avg_font_size() < 18.0);
    }
}
