//! Column segmentation: partitioning page tokens into ordered regions.

use crate::model::{
    CanonicalSection, ColumnRegion, LayoutClass, LayoutInfo, Page, RegionKind, Token,
};

/// Resolves a candidate heading string to a canonical section, using only
/// exact and normalized variant matching. Implemented by the section
/// database snapshot; the segmenter needs it to recognize multi-section
/// header lines.
pub trait HeaderLookup {
    /// Canonical section for `text`, if any variant matches.
    fn canonical_for(&self, text: &str) -> Option<CanonicalSection>;
}

/// Tunables for the column segmenter.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// A re-split is rejected when any resulting column would hold fewer
    /// tokens than this
    pub min_tokens_per_column: usize,
    /// Horizontal gap between token clusters on a line, as a fraction of
    /// the region width, above which the clusters are treated as separate
    /// header candidates
    pub cluster_gap_frac: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_tokens_per_column: 5,
            cluster_gap_frac: 0.08,
        }
    }
}

/// Partition a page's tokens into column regions in reading order: bands
/// top to bottom, columns left to right within a band.
///
/// When `lookup` is provided, the top line of each candidate column is
/// checked for side-by-side section headers; a line resolving to two or
/// more distinct canonical names at distinct x-anchors re-splits the
/// region at the midpoints between anchors.
pub fn segment_page(
    page: &Page,
    layout: &LayoutInfo,
    lookup: Option<&dyn HeaderLookup>,
    cfg: &SegmenterConfig,
) -> Vec<ColumnRegion> {
    let mut regions = match &layout.class {
        LayoutClass::Single => vec![full_width_region(page, 0, 0, RegionKind::Column)],
        LayoutClass::Multi { column_bounds } => {
            let assigned = assign_to_columns(&page.tokens, column_bounds, page.width);
            build_regions(page, 0, 0, column_bounds, assigned, RegionKind::Column)
        }
        LayoutClass::Hybrid { bands } => {
            let mut out = Vec::new();
            let mut column_counter = 0usize;
            for (band_index, band) in bands.iter().enumerate() {
                let band_tokens: Vec<Token> = page
                    .tokens
                    .iter()
                    .filter(|t| {
                        let yc = t.bbox.y_center();
                        yc >= band.y_range.0 && yc < band.y_range.1
                    })
                    .cloned()
                    .collect();
                if band_tokens.is_empty() {
                    continue;
                }
                if band.is_full_width() {
                    out.push(ColumnRegion {
                        page: page.index,
                        band_index,
                        column_index: column_counter,
                        x_bounds: (0.0, page.width),
                        kind: RegionKind::FullBand,
                        tokens: sorted(band_tokens),
                    });
                    column_counter += 1;
                } else {
                    let assigned =
                        assign_to_columns(&band_tokens, &band.column_bounds, page.width);
                    let built = build_regions(
                        page,
                        band_index,
                        column_counter,
                        &band.column_bounds,
                        assigned,
                        RegionKind::Column,
                    );
                    column_counter += built.len();
                    out.extend(built);
                }
            }
            out
        }
    };

    regions.retain(|r| !r.tokens.is_empty());
    if regions.is_empty() {
        // Every column came out empty after assignment; fall back to one
        // full-width region so no token is dropped.
        let fallback = full_width_region(page, 0, 0, RegionKind::Column);
        if fallback.tokens.is_empty() {
            return Vec::new();
        }
        return vec![fallback];
    }

    if let Some(lookup) = lookup {
        regions = resplit_multi_headers(page, regions, lookup, cfg);
    }

    renumber(&mut regions);
    regions
}

fn full_width_region(page: &Page, band: usize, column: usize, kind: RegionKind) -> ColumnRegion {
    ColumnRegion {
        page: page.index,
        band_index: band,
        column_index: column,
        x_bounds: (0.0, page.width),
        kind,
        tokens: sorted(page.tokens.clone()),
    }
}

fn sorted(mut tokens: Vec<Token>) -> Vec<Token> {
    tokens.sort_by(|a, b| {
        (a.bbox.y0, a.bbox.x0)
            .partial_cmp(&(b.bbox.y0, b.bbox.x0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    tokens
}

/// Assign tokens to columns by x-center. Tokens within one histogram bin
/// of a boundary go to the column whose token centroid is closer.
fn assign_to_columns(
    tokens: &[Token],
    bounds: &[(f32, f32)],
    page_width: f32,
) -> Vec<Vec<Token>> {
    let bin_width = (page_width / 150.0).max(1.0);
    let mut assigned: Vec<Vec<Token>> = vec![Vec::new(); bounds.len()];
    let mut deferred: Vec<Token> = Vec::new();

    'tokens: for token in tokens {
        let xc = token.bbox.x_center();
        for (i, (x0, x1)) in bounds.iter().enumerate() {
            if xc >= *x0 && xc < *x1 {
                // Near an interior boundary the choice is ambiguous.
                let near_left = i > 0 && (xc - x0).abs() <= bin_width;
                let near_right = i + 1 < bounds.len() && (x1 - xc).abs() <= bin_width;
                if near_left || near_right {
                    deferred.push(token.clone());
                } else {
                    assigned[i].push(token.clone());
                }
                continue 'tokens;
            }
        }
        // Outside every bound (rounding at page edges): nearest column.
        let nearest = bounds
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = distance_to_range(xc, **a);
                let db = distance_to_range(xc, **b);
                da.total_cmp(&db)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        assigned[nearest].push(token.clone());
    }

    // Resolve deferred tokens against the centroids of what is already
    // assigned.
    let centroids: Vec<f32> = assigned
        .iter()
        .enumerate()
        .map(|(i, col)| {
            if col.is_empty() {
                (bounds[i].0 + bounds[i].1) / 2.0
            } else {
                col.iter().map(|t| t.bbox.x_center()).sum::<f32>() / col.len() as f32
            }
        })
        .collect();
    for token in deferred {
        let xc = token.bbox.x_center();
        let nearest = centroids
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (xc - **a).abs().total_cmp(&(xc - **b).abs()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        assigned[nearest].push(token);
    }

    assigned
}

fn distance_to_range(x: f32, (lo, hi): (f32, f32)) -> f32 {
    if x < lo {
        lo - x
    } else if x > hi {
        x - hi
    } else {
        0.0
    }
}

fn build_regions(
    page: &Page,
    band_index: usize,
    column_offset: usize,
    bounds: &[(f32, f32)],
    assigned: Vec<Vec<Token>>,
    kind: RegionKind,
) -> Vec<ColumnRegion> {
    bounds
        .iter()
        .zip(assigned)
        .enumerate()
        .filter(|(_, (_, tokens))| !tokens.is_empty())
        .map(|(i, (x_bounds, tokens))| ColumnRegion {
            page: page.index,
            band_index,
            column_index: column_offset + i,
            x_bounds: *x_bounds,
            kind,
            tokens: sorted(tokens),
        })
        .collect()
}

fn renumber(regions: &mut [ColumnRegion]) {
    for (i, region) in regions.iter_mut().enumerate() {
        region.column_index = i;
    }
}

/// Tokens forming the topmost line of a region (vertical overlap with the
/// first token).
fn top_line<'a>(tokens: &'a [Token]) -> Vec<&'a Token> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let cutoff = first.bbox.y1;
    tokens
        .iter()
        .take_while(|t| t.bbox.y0 < cutoff)
        .collect()
}

/// Cluster a line's tokens on horizontal gaps.
fn cluster_by_gap<'a>(line: &[&'a Token], gap: f32) -> Vec<Vec<&'a Token>> {
    let mut sorted: Vec<&Token> = line.to_vec();
    sorted.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
    let mut clusters: Vec<Vec<&Token>> = Vec::new();
    for token in sorted {
        match clusters.last_mut() {
            Some(cluster)
                if token.bbox.x0 - cluster.last().unwrap().bbox.x1 <= gap =>
            {
                cluster.push(token);
            }
            _ => clusters.push(vec![token]),
        }
    }
    clusters
}

/// Detected header anchor inside a multi-section line.
struct Anchor {
    section: CanonicalSection,
    x_center: f32,
}

/// Look at the top line of each region: when it carries two or more
/// distinct known section headings side by side, the region is re-split so
/// each heading anchors its own column.
fn resplit_multi_headers(
    page: &Page,
    regions: Vec<ColumnRegion>,
    lookup: &dyn HeaderLookup,
    cfg: &SegmenterConfig,
) -> Vec<ColumnRegion> {
    let mut out = Vec::with_capacity(regions.len());
    for region in regions {
        match try_resplit(page, &region, lookup, cfg) {
            Some(split) => out.extend(split),
            None => out.push(region),
        }
    }
    out
}

fn try_resplit(
    page: &Page,
    region: &ColumnRegion,
    lookup: &dyn HeaderLookup,
    cfg: &SegmenterConfig,
) -> Option<Vec<ColumnRegion>> {
    let line = top_line(&region.tokens);
    if line.len() < 2 {
        return None;
    }

    let gap = region.width() * cfg.cluster_gap_frac;
    let clusters = cluster_by_gap(&line, gap);
    if clusters.len() < 2 {
        return None;
    }

    let mut anchors: Vec<Anchor> = Vec::new();
    for cluster in &clusters {
        let text = cluster
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(section) = lookup.canonical_for(&text) {
            if anchors.iter().all(|a| a.section != section) {
                let x0 = cluster.first().unwrap().bbox.x0;
                let x1 = cluster.last().unwrap().bbox.x1;
                anchors.push(Anchor {
                    section,
                    x_center: (x0 + x1) / 2.0,
                });
            }
        }
    }
    if anchors.len() < 2 {
        return None;
    }
    anchors.sort_by(|a, b| a.x_center.total_cmp(&b.x_center));

    // Boundaries at midpoints between adjacent anchors.
    let mut bounds: Vec<(f32, f32)> = Vec::with_capacity(anchors.len());
    let mut start = region.x_bounds.0;
    for pair in anchors.windows(2) {
        let cut = (pair[0].x_center + pair[1].x_center) / 2.0;
        bounds.push((start, cut));
        start = cut;
    }
    bounds.push((start, region.x_bounds.1));

    let assigned = assign_to_columns(&region.tokens, &bounds, page.width);
    if assigned
        .iter()
        .any(|col| col.len() < cfg.min_tokens_per_column)
    {
        log::debug!(
            "page {}: multi-section re-split rejected, a column would hold too few tokens",
            page.index
        );
        return None;
    }

    log::debug!(
        "page {}: re-split column {} into {} at header anchors",
        page.index,
        region.column_index,
        bounds.len()
    );
    Some(build_regions(
        page,
        region.band_index,
        region.column_index,
        &bounds,
        assigned,
        RegionKind::Column,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, LayoutInfo};

    struct FakeLookup;

    impl HeaderLookup for FakeLookup {
        fn canonical_for(&self, text: &str) -> Option<CanonicalSection> {
            let normalized: String = text
                .to_lowercase()
                .chars()
                .filter(|c| c.is_alphabetic())
                .collect();
            match normalized.as_str() {
                "experience" => Some(CanonicalSection::Experience),
                "skills" => Some(CanonicalSection::Skills),
                _ => None,
            }
        }
    }

    fn token(text: &str, x0: f32, y0: f32, w: f32) -> Token {
        Token::new(text, 0, BBox::new(x0, y0, x0 + w, y0 + 11.0), 11.0)
    }

    fn multi_header_page() -> Page {
        let mut page = Page::new(0, 600.0, 792.0);
        // One line with two headers: EXPERIENCE centered near x=80,
        // SKILLS near x=420.
        page.push(token("EXPERIENCE", 40.0, 60.0, 80.0));
        page.push(token("SKILLS", 395.0, 60.0, 50.0));
        // Body under each header.
        for i in 0..6 {
            let y = 90.0 + i as f32 * 16.0;
            page.push(token("acme", 40.0, y, 40.0));
            page.push(token("work", 90.0, y, 40.0));
            page.push(token("rust", 400.0, y, 40.0));
        }
        page.finish();
        page
    }

    #[test]
    fn test_single_layout_one_region() {
        let page = multi_header_page();
        let layout = LayoutInfo::single(0, 1.0);
        let regions = segment_page(&page, &layout, None, &SegmenterConfig::default());
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].tokens.len(), page.tokens.len());
    }

    #[test]
    fn test_multi_section_header_resplits() {
        let page = multi_header_page();
        let layout = LayoutInfo::single(0, 1.0);
        let regions = segment_page(
            &page,
            &layout,
            Some(&FakeLookup),
            &SegmenterConfig::default(),
        );
        assert_eq!(regions.len(), 2, "regions: {:#?}", regions);

        // Boundary at the midpoint between anchor centers (80, 420) = 250.
        assert!((regions[0].x_bounds.1 - 250.0).abs() < 1.0);

        let left_texts: Vec<&str> = regions[0].tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(left_texts.contains(&"EXPERIENCE"));
        assert!(left_texts.contains(&"acme"));
        let right_texts: Vec<&str> =
            regions[1].tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(right_texts.contains(&"SKILLS"));
        assert!(right_texts.contains(&"rust"));
    }

    #[test]
    fn test_resplit_rejected_when_too_few_tokens() {
        let mut page = Page::new(0, 600.0, 792.0);
        page.push(token("EXPERIENCE", 40.0, 60.0, 80.0));
        page.push(token("SKILLS", 395.0, 60.0, 50.0));
        // Only the left side has body text; right column would hold 1
        // token.
        for i in 0..6 {
            let y = 90.0 + i as f32 * 16.0;
            page.push(token("acme", 40.0, y, 40.0));
        }
        page.finish();

        let layout = LayoutInfo::single(0, 1.0);
        let regions = segment_page(
            &page,
            &layout,
            Some(&FakeLookup),
            &SegmenterConfig::default(),
        );
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_multi_layout_assigns_by_center() {
        let mut page = Page::new(0, 612.0, 792.0);
        for i in 0..10 {
            let y = 80.0 + i as f32 * 16.0;
            page.push(token("left", 50.0, y, 60.0));
            page.push(token("right", 380.0, y, 60.0));
        }
        page.finish();
        let layout = LayoutInfo {
            page: 0,
            class: LayoutClass::Multi {
                column_bounds: vec![(0.0, 300.0), (300.0, 612.0)],
            },
            confidence: 0.9,
            ambiguous: false,
        };
        let regions = segment_page(&page, &layout, None, &SegmenterConfig::default());
        assert_eq!(regions.len(), 2);
        assert!(regions[0].tokens.iter().all(|t| t.text == "left"));
        assert!(regions[1].tokens.iter().all(|t| t.text == "right"));
    }

    #[test]
    fn test_empty_page_yields_no_regions() {
        let page = Page::new(0, 612.0, 792.0);
        let layout = LayoutInfo::single(0, 1.0);
        let regions = segment_page(&page, &layout, None, &SegmenterConfig::default());
        assert!(regions.is_empty());
    }
}
