//! The stable, JSON-shaped output record of a parse.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Input file description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name (no directory)
    pub name: String,
    /// Detected type: "pdf", "docx", or "image"
    #[serde(rename = "type")]
    pub file_type: String,
    /// Page count
    pub pages: usize,
    /// Whether the document needed OCR
    pub scanned: bool,
}

/// Per-page layout summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    /// 0-based page index
    pub page: usize,
    /// "single", "multi", or "hybrid"
    #[serde(rename = "type")]
    pub layout_type: String,
    /// Column count
    pub columns: usize,
    /// Classifier confidence
    pub confidence: f32,
}

/// One labeled section in the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionOutput {
    /// Canonical section name
    pub name: String,
    /// First and last page the section touches
    pub page_span: [usize; 2],
    /// Body lines in reading order
    pub lines: Vec<String>,
}

/// A candidate suggestion for an unmatched header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Canonical section name
    pub name: String,
    /// Similarity score in [0,1]
    pub score: f32,
}

/// A header-scored line that did not resolve to any canonical section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnknownHeader {
    /// Raw header text
    pub raw: String,
    /// 0-based page index
    pub page: usize,
    /// Header detector score
    pub score: f32,
    /// Closest canonical sections, best first
    pub suggestions: Vec<Suggestion>,
}

/// Quality rung derived from the validation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityRung {
    Excellent,
    Acceptable,
    Poor,
    Failed,
}

impl QualityRung {
    /// Map a score to its rung.
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            QualityRung::Excellent
        } else if score >= 0.6 {
            QualityRung::Acceptable
        } else if score >= 0.4 {
            QualityRung::Poor
        } else {
            QualityRung::Failed
        }
    }

    /// Stable name used in the output record.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityRung::Excellent => "excellent",
            QualityRung::Acceptable => "acceptable",
            QualityRung::Poor => "poor",
            QualityRung::Failed => "failed",
        }
    }
}

/// Structural quality of the parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quality {
    /// Score in [0,1]
    pub score: f32,
    /// Rung label
    pub rung: QualityRung,
}

impl Quality {
    /// Build from a raw score.
    pub fn from_score(score: f32) -> Self {
        Self {
            score,
            rung: QualityRung::from_score(score),
        }
    }
}

/// Run diagnostics attached to every result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Strategy that produced the emitted result
    pub strategy_used: String,
    /// Strategies tried and abandoned, in order
    pub fallbacks_tried: Vec<String>,
    /// Wall-clock duration of the parse
    pub elapsed_ms: u64,
    /// Variants the matcher learned during this parse ("surface -> Section")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learned_variants: Vec<String>,
    /// Non-fatal conditions absorbed during the parse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// The complete result record for one document.
///
/// A failed parse still yields a well-formed record with
/// `quality.rung == "failed"` and possibly empty `sections`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    /// Input file description
    pub file: FileInfo,
    /// Per-page layout classification
    pub layouts: Vec<PageLayout>,
    /// Labeled sections in reading order
    pub sections: Vec<SectionOutput>,
    /// Header-scored lines that matched nothing
    pub unknown_headers: Vec<UnknownHeader>,
    /// Structural quality
    pub quality: Quality,
    /// Run diagnostics
    pub metadata: RunMetadata,
}

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

impl ParseOutput {
    /// Serialize the record to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        let result = match format {
            JsonFormat::Pretty => serde_json::to_string_pretty(self),
            JsonFormat::Compact => serde_json::to_string(self),
        };
        result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
    }

    /// Section names in output order.
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    /// Find a section by canonical name.
    pub fn section(&self, name: &str) -> Option<&SectionOutput> {
        self.sections.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParseOutput {
        ParseOutput {
            file: FileInfo {
                name: "cv.pdf".into(),
                file_type: "pdf".into(),
                pages: 1,
                scanned: false,
            },
            layouts: vec![PageLayout {
                page: 0,
                layout_type: "single".into(),
                columns: 1,
                confidence: 0.95,
            }],
            sections: vec![SectionOutput {
                name: "Experience".into(),
                page_span: [0, 0],
                lines: vec!["Acme Corp 2020-2022".into()],
            }],
            unknown_headers: vec![],
            quality: Quality::from_score(0.85),
            metadata: RunMetadata {
                strategy_used: "text-layer".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_rung_boundaries() {
        assert_eq!(QualityRung::from_score(0.85), QualityRung::Excellent);
        assert_eq!(QualityRung::from_score(0.8), QualityRung::Excellent);
        assert_eq!(QualityRung::from_score(0.7), QualityRung::Acceptable);
        assert_eq!(QualityRung::from_score(0.5), QualityRung::Poor);
        assert_eq!(QualityRung::from_score(0.39), QualityRung::Failed);
    }

    #[test]
    fn test_to_json_pretty() {
        let json = sample().to_json(JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"type\": \"pdf\""));
        assert!(json.contains("\"rung\": \"excellent\""));
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_to_json_compact_roundtrip() {
        let json = sample().to_json(JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        let back: ParseOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.section_names(), vec!["Experience"]);
        assert!(back.section("Experience").is_some());
        assert!(back.section("Skills").is_none());
    }
}
