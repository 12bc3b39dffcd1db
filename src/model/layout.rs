//! Layout classes and column regions.

use serde::{Deserialize, Serialize};

use super::token::Token;

/// A horizontal band of a hybrid page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    /// Vertical extent (y_top, y_bot)
    pub y_range: (f32, f32),
    /// Column bounds inside the band; a single entry means the band is
    /// full-width
    pub column_bounds: Vec<(f32, f32)>,
}

impl Band {
    /// Whether this band spans the whole page width as a single region.
    pub fn is_full_width(&self) -> bool {
        self.column_bounds.len() <= 1
    }
}

/// Column structure of one page, decided from token positions alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutClass {
    /// One column covering the page
    Single,
    /// Clean multi-column layout with a gutter reaching the histogram floor
    Multi {
        /// Left/right x-bounds per column, left to right
        column_bounds: Vec<(f32, f32)>,
    },
    /// Mixed layout: full-width bands interleaved with column bands
    Hybrid {
        /// Bands top to bottom
        bands: Vec<Band>,
    },
}

impl LayoutClass {
    /// Stable name used in the output record.
    pub fn type_name(&self) -> &'static str {
        match self {
            LayoutClass::Single => "single",
            LayoutClass::Multi { .. } => "multi",
            LayoutClass::Hybrid { .. } => "hybrid",
        }
    }

    /// Number of columns (for hybrid pages, the maximum across bands).
    pub fn column_count(&self) -> usize {
        match self {
            LayoutClass::Single => 1,
            LayoutClass::Multi { column_bounds } => column_bounds.len(),
            LayoutClass::Hybrid { bands } => bands
                .iter()
                .map(|b| b.column_bounds.len().max(1))
                .max()
                .unwrap_or(1),
        }
    }
}

/// Layout classification result for a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    /// 0-based page index
    pub page: usize,
    /// Detected class
    pub class: LayoutClass,
    /// Classifier confidence in [0,1]
    pub confidence: f32,
    /// Set when the classifier fell back to single-column because peak
    /// structure was contradictory
    pub ambiguous: bool,
}

impl LayoutInfo {
    /// Single-column result with the given confidence.
    pub fn single(page: usize, confidence: f32) -> Self {
        Self {
            page,
            class: LayoutClass::Single,
            confidence,
            ambiguous: false,
        }
    }
}

/// What a region represents inside the page traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
    /// A vertical column slab
    Column,
    /// A full-width band (serialized between column groups)
    FullBand,
}

/// A slab of a page holding the tokens assigned to it.
///
/// Regions are produced in reading order: bands top to bottom, columns left
/// to right within a band. `column_index` is unique within a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRegion {
    /// 0-based page index
    pub page: usize,
    /// Band ordinal within the page (0 for non-hybrid pages)
    pub band_index: usize,
    /// Column ordinal within the page, unique per page
    pub column_index: usize,
    /// Horizontal extent of the region
    pub x_bounds: (f32, f32),
    /// Region role in the traversal
    pub kind: RegionKind,
    /// Tokens assigned to this region
    pub tokens: Vec<Token>,
}

impl ColumnRegion {
    /// Region width.
    pub fn width(&self) -> f32 {
        self.x_bounds.1 - self.x_bounds.0
    }

    /// Horizontal centroid of the assigned tokens (region center when
    /// empty).
    pub fn centroid_x(&self) -> f32 {
        if self.tokens.is_empty() {
            return (self.x_bounds.0 + self.x_bounds.1) / 2.0;
        }
        self.tokens.iter().map(|t| t.bbox.x_center()).sum::<f32>() / self.tokens.len() as f32
    }
}
