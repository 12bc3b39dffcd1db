//! Page layout classification and column segmentation.
//!
//! The classifier works from token positions alone: a 1-D density
//! histogram over the x-axis decides whether a page is single-column,
//! clean multi-column, or a hybrid of full-width bands and column bands.
//! The segmenter then partitions tokens into column regions in reading
//! order.

mod histogram;
mod segmenter;

pub use histogram::{classify_page, HistogramConfig, XHistogram};
pub use segmenter::{segment_page, HeaderLookup, SegmenterConfig};
