//! Grouping column tokens into lines.

use crate::model::{ColumnRegion, Line};

/// Tunables for line reconstruction.
#[derive(Debug, Clone)]
pub struct LineGrouperConfig {
    /// Fraction of the current line height a token may start above the
    /// line bottom and still join it
    pub y_tolerance: f32,
    /// Two adjacent lines merge when the vertical gap is below this
    /// fraction of the smaller line height and their x-ranges are
    /// disjoint (superscript / descender fragments)
    pub merge_frac: f32,
}

impl Default for LineGrouperConfig {
    fn default() -> Self {
        Self {
            y_tolerance: 0.5,
            merge_frac: 0.15,
        }
    }
}

/// Groups the tokens of one column region into ordered lines.
#[derive(Debug, Clone, Default)]
pub struct LineGrouper {
    cfg: LineGrouperConfig,
}

impl LineGrouper {
    /// Create a grouper with the given tunables.
    pub fn new(cfg: LineGrouperConfig) -> Self {
        Self { cfg }
    }

    /// Reconstruct lines from a region. Tokens are swept top-down; a token
    /// opens a new line when it starts below the current line's bottom
    /// minus the tolerance fraction of the line height.
    pub fn group(&self, region: &ColumnRegion) -> Vec<Line> {
        if region.tokens.is_empty() {
            return Vec::new();
        }

        let mut tokens = region.tokens.clone();
        tokens.sort_by(|a, b| {
            (a.bbox.y0, a.bbox.x0)
                .partial_cmp(&(b.bbox.y0, b.bbox.x0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut lines: Vec<Line> = Vec::new();
        let mut current: Vec<crate::model::Token> = Vec::new();
        let mut current_bottom = f32::MIN;
        let mut current_height = 0.0f32;

        for token in tokens {
            let opens_new = !current.is_empty()
                && token.bbox.y0 > current_bottom - self.cfg.y_tolerance * current_height;
            if opens_new {
                lines.push(Line::from_tokens(
                    region.page,
                    region.band_index,
                    region.column_index,
                    std::mem::take(&mut current),
                ));
                current_bottom = f32::MIN;
                current_height = 0.0;
            }
            current_bottom = current_bottom.max(token.bbox.y1);
            current_height = current_height.max(token.bbox.height());
            current.push(token);
        }
        if !current.is_empty() {
            lines.push(Line::from_tokens(
                region.page,
                region.band_index,
                region.column_index,
                current,
            ));
        }

        let mut lines = self.merge_fragments(lines);
        self.fill_spacing(&mut lines, region);
        lines
    }

    /// Merge continuation fragments produced by superscripts and deep
    /// descenders: nearly touching lines whose x-ranges do not overlap.
    fn merge_fragments(&self, lines: Vec<Line>) -> Vec<Line> {
        let mut merged: Vec<Line> = Vec::new();
        for line in lines {
            if let Some(prev) = merged.last() {
                let min_height = prev.height().min(line.height()).max(1.0);
                let gap = line.y_band.0 - prev.y_band.1;
                let x_disjoint = !prev.bbox().x_intersects(&line.bbox());
                if gap < self.cfg.merge_frac * min_height && x_disjoint {
                    let prev = merged.pop().unwrap();
                    let mut tokens = prev.tokens;
                    tokens.extend(line.tokens);
                    merged.push(Line::from_tokens(
                        prev.page,
                        prev.band_index,
                        prev.column_index,
                        tokens,
                    ));
                    continue;
                }
            }
            merged.push(line);
        }
        merged
    }

    /// Compute inter-line gaps and indent ratios once neighbors are known.
    fn fill_spacing(&self, lines: &mut [Line], region: &ColumnRegion) {
        let column_width = region.width().max(1.0);
        let n = lines.len();
        for i in 0..n {
            let above = if i == 0 {
                lines[i].y_band.0
            } else {
                (lines[i].y_band.0 - lines[i - 1].y_band.1).max(0.0)
            };
            let below = if i + 1 == n {
                0.0
            } else {
                (lines[i + 1].y_band.0 - lines[i].y_band.1).max(0.0)
            };
            lines[i].space_above = above;
            lines[i].space_below = below;
            lines[i].indent_ratio =
                ((lines[i].x0() - region.x_bounds.0) / column_width).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Page, RegionKind, Token};

    fn region(tokens: Vec<Token>) -> ColumnRegion {
        let mut region = ColumnRegion {
            page: 0,
            band_index: 0,
            column_index: 0,
            x_bounds: (0.0, 612.0),
            kind: RegionKind::Column,
            tokens,
        };
        region.tokens.sort_by(|a, b| {
            (a.bbox.y0, a.bbox.x0)
                .partial_cmp(&(b.bbox.y0, b.bbox.x0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        region
    }

    fn token(text: &str, x0: f32, y0: f32) -> Token {
        Token::new(text, 0, BBox::new(x0, y0, x0 + 40.0, y0 + 11.0), 11.0)
    }

    #[test]
    fn test_groups_rows_into_lines() {
        let r = region(vec![
            token("world", 60.0, 100.0),
            token("hello", 10.0, 100.0),
            token("second", 10.0, 120.0),
        ]);
        let lines = LineGrouper::default().group(&r);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "hello world");
        assert_eq!(lines[1].text(), "second");
    }

    #[test]
    fn test_tolerates_small_baseline_jitter() {
        // Second token sits 3pt lower but overlaps more than half the
        // line height.
        let r = region(vec![token("a", 10.0, 100.0), token("b", 60.0, 103.0)]);
        let lines = LineGrouper::default().group(&r);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "a b");
    }

    #[test]
    fn test_merges_descender_fragment() {
        // A superscript fragment almost touching the previous line, with
        // a disjoint x-range.
        let main = Token::new("name", 0, BBox::new(10.0, 100.0, 60.0, 111.0), 11.0);
        let frag = Token::new("2", 0, BBox::new(80.0, 111.5, 86.0, 117.0), 6.0);
        let r = region(vec![main, frag]);
        let lines = LineGrouper::default().group(&r);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "name 2");
    }

    #[test]
    fn test_does_not_merge_overlapping_x() {
        // Same small gap but overlapping x-range: a genuine next line.
        let a = Token::new("one", 0, BBox::new(10.0, 100.0, 60.0, 111.0), 11.0);
        let b = Token::new("two", 0, BBox::new(12.0, 111.5, 62.0, 122.0), 11.0);
        let r = region(vec![a, b]);
        let lines = LineGrouper::default().group(&r);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_spacing_fields() {
        let r = region(vec![
            token("top", 10.0, 50.0),
            token("mid", 10.0, 100.0),
            token("bot", 10.0, 120.0),
        ]);
        let lines = LineGrouper::default().group(&r);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].space_above, 50.0);
        assert!((lines[1].space_above - 39.0).abs() < 1e-3);
        assert!((lines[1].space_below - 9.0).abs() < 1e-3);
        assert_eq!(lines[2].space_below, 0.0);
        assert!((lines[0].indent_ratio - 10.0 / 612.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_region() {
        let page = Page::new(0, 612.0, 792.0);
        let r = ColumnRegion {
            page: page.index,
            band_index: 0,
            column_index: 0,
            x_bounds: (0.0, page.width),
            kind: RegionKind::Column,
            tokens: Vec::new(),
        };
        assert!(LineGrouper::default().group(&r).is_empty());
    }
}
