//! Multi-signal section header detection.

use crate::model::{CanonicalSection, Line, SectionMatch, UnknownHeader};

use super::database::{LearnedBatch, Snapshot};

/// Tunables for the header detector.
#[derive(Debug, Clone, Default)]
pub struct HeaderDetectorConfig {
    /// Fixed score threshold; disables the adaptive threshold
    pub threshold_override: Option<f32>,
}

/// Classification of one line.
#[derive(Debug, Clone)]
pub enum LineLabel {
    /// A section boundary with its resolved canonical name
    Header {
        /// Resolved section
        matched: SectionMatch,
        /// Detector score
        score: f32,
    },
    /// One line carrying two or more section headings side by side
    MultiHeader {
        /// Detected sections with their observed surface forms, left to
        /// right
        sections: Vec<(CanonicalSection, String)>,
        /// Detector score
        score: f32,
    },
    /// Regular content
    Body,
}

impl LineLabel {
    /// Whether this label marks a section boundary.
    pub fn is_header(&self) -> bool {
        !matches!(self, LineLabel::Body)
    }
}

/// Labels for every line of a page, column by column, plus the
/// header-scored lines that matched nothing.
#[derive(Debug, Clone, Default)]
pub struct PageLabels {
    /// One label per line, parallel to the input columns
    pub labels: Vec<Vec<LineLabel>>,
    /// Unmatched header candidates for diagnostics
    pub unknown: Vec<UnknownHeader>,
}

/// Scores lines as headers using typography, spacing, and the section
/// vocabulary.
#[derive(Debug, Clone, Default)]
pub struct HeaderDetector {
    cfg: HeaderDetectorConfig,
}

impl HeaderDetector {
    /// Create a detector with the given tunables.
    pub fn new(cfg: HeaderDetectorConfig) -> Self {
        Self { cfg }
    }

    /// Label every line of a page. `columns` holds the page's lines in
    /// traversal order, one vector per column region; the score threshold
    /// adapts to the typographic contrast across the whole page.
    pub fn label_page(
        &self,
        columns: &[Vec<Line>],
        snapshot: &Snapshot,
        batch: &mut LearnedBatch,
    ) -> PageLabels {
        let threshold = self.threshold(columns);
        let mut out = PageLabels::default();

        for lines in columns {
            let stats = ColumnStats::compute(lines);
            let mut labels: Vec<LineLabel> = Vec::with_capacity(lines.len());
            let mut in_bullet_run = false;

            for (i, line) in lines.iter().enumerate() {
                if line.starts_with_bullet() {
                    in_bullet_run = true;
                } else if line.space_above > stats.median_gap * 1.5 {
                    in_bullet_run = false;
                }

                let score = if in_bullet_run {
                    0.0
                } else {
                    self.score_line(line, &stats, snapshot)
                };

                if score < threshold {
                    labels.push(LineLabel::Body);
                    continue;
                }

                // A header directly under another header is usually a
                // subtitle; demote it unless clearly separated.
                let prev_is_header = i > 0 && labels[i - 1].is_header();
                if prev_is_header && line.space_above < stats.median_gap * 2.0 {
                    labels.push(LineLabel::Body);
                    continue;
                }

                if let Some(sections) = self.detect_multi_header(line, snapshot) {
                    for (section, surface) in &sections {
                        batch.record(*section, surface);
                    }
                    labels.push(LineLabel::MultiHeader { sections, score });
                    continue;
                }

                let text = line.text();
                let matched = snapshot.resolve_learning(&text, batch);
                if matched.is_known() {
                    labels.push(LineLabel::Header { matched, score });
                } else {
                    out.unknown.push(UnknownHeader {
                        raw: text.clone(),
                        page: line.page,
                        score,
                        suggestions: snapshot
                            .suggestions(&text, 3)
                            .into_iter()
                            .map(|(section, s)| crate::model::Suggestion {
                                name: section.as_str().to_string(),
                                score: s,
                            })
                            .collect(),
                    });
                    labels.push(LineLabel::Body);
                }
            }
            out.labels.push(labels);
        }
        out
    }

    /// Adaptive threshold: strong typographic contrast lets weaker
    /// signals through, flat typography demands more.
    fn threshold(&self, columns: &[Vec<Line>]) -> f32 {
        if let Some(fixed) = self.cfg.threshold_override {
            return fixed.clamp(0.0, 1.0);
        }
        let sizes: Vec<f32> = columns
            .iter()
            .flatten()
            .map(|l| l.avg_font_size())
            .filter(|s| *s > 0.0)
            .collect();
        if sizes.len() < 2 {
            return 0.30;
        }
        let mean = sizes.iter().sum::<f32>() / sizes.len() as f32;
        let var = sizes.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / sizes.len() as f32;
        let ratio = if mean > 0.0 { var.sqrt() / mean } else { 0.0 };
        if ratio > 0.5 {
            0.25
        } else if ratio < 0.3 {
            0.35
        } else {
            0.30
        }
    }

    fn score_line(&self, line: &Line, stats: &ColumnStats, snapshot: &Snapshot) -> f32 {
        let text = line.text();
        if text.is_empty() {
            return 0.0;
        }
        let mut score = 0.0f32;

        if snapshot.canonical_for_variants(&text).is_some() {
            score += 0.40;
        }
        if line.token_count() <= 8 && text.chars().count() <= 60 {
            score += 0.10;
        }
        if has_heading_case(&text) {
            score += 0.15;
        }
        if line.is_bold_majority() {
            score += 0.10;
        }
        if stats.median_font > 0.0 && line.max_font_size() > 1.15 * stats.median_font {
            score += 0.10;
        }
        if stats.median_gap > 0.0 && line.space_above >= 1.5 * stats.median_gap {
            score += 0.10;
        }
        if has_trailing_colon(&text) {
            score += 0.05;
        }
        score.min(1.0)
    }

    /// Find two or more known section headings sitting side by side on
    /// one line (left column header next to right column header).
    fn detect_multi_header(
        &self,
        line: &Line,
        snapshot: &Snapshot,
    ) -> Option<Vec<(CanonicalSection, String)>> {
        if line.token_count() < 2 {
            return None;
        }
        // Cluster tokens on gaps larger than three average token widths.
        let avg_width = line
            .tokens
            .iter()
            .map(|t| t.bbox.width())
            .sum::<f32>()
            / line.token_count() as f32;
        let gap = (avg_width * 1.5).max(24.0);

        let mut clusters: Vec<Vec<&crate::model::Token>> = Vec::new();
        for token in &line.tokens {
            match clusters.last_mut() {
                Some(cluster) if token.bbox.x0 - cluster.last().unwrap().bbox.x1 <= gap => {
                    cluster.push(token)
                }
                _ => clusters.push(vec![token]),
            }
        }
        if clusters.len() < 2 {
            return None;
        }

        let mut sections: Vec<(CanonicalSection, String)> = Vec::new();
        for cluster in &clusters {
            let surface = cluster
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(section) = snapshot.canonical_for_variants(&surface) {
                if sections.iter().all(|(s, _)| *s != section) {
                    sections.push((section, surface));
                }
            }
        }
        if sections.len() >= 2 {
            Some(sections)
        } else {
            None
        }
    }
}

/// Typographic baselines of one column.
struct ColumnStats {
    median_font: f32,
    median_gap: f32,
}

impl ColumnStats {
    fn compute(lines: &[Line]) -> Self {
        let mut fonts: Vec<f32> = lines.iter().map(|l| l.avg_font_size()).collect();
        let mut gaps: Vec<f32> = lines
            .iter()
            .skip(1)
            .map(|l| l.space_above)
            .filter(|g| *g > 0.0)
            .collect();
        Self {
            median_font: median(&mut fonts),
            median_gap: median(&mut gaps),
        }
    }
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    values[values.len() / 2]
}

/// ALL CAPS, or Title Case, with at least 80% alphabetic content.
fn has_heading_case(text: &str) -> bool {
    let non_space: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if non_space.is_empty() {
        return false;
    }
    let alpha = non_space.iter().filter(|c| c.is_alphabetic()).count();
    if (alpha as f32) < non_space.len() as f32 * 0.8 {
        return false;
    }

    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = letters.iter().all(|c| c.is_uppercase());
    if all_caps {
        return true;
    }
    // Title Case: every word's first letter is uppercase.
    text.split_whitespace().all(|w| {
        w.chars()
            .find(|c| c.is_alphabetic())
            .map(|c| c.is_uppercase())
            .unwrap_or(true)
    })
}

/// A trailing colon, with no other punctuation weight.
fn has_trailing_colon(text: &str) -> bool {
    text.trim_end().ends_with(':')
}

impl Snapshot {
    /// Exact/normalized variant lookup only, shared by the score signal
    /// and multi-header detection.
    pub(crate) fn canonical_for_variants(&self, text: &str) -> Option<CanonicalSection> {
        use crate::layout::HeaderLookup;
        self.canonical_for(text)
    }
}
