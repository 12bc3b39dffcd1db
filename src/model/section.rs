//! Sections, headers, and the closed canonical section vocabulary.

use serde::{Deserialize, Serialize};

use super::line::Line;

/// The closed set of section identifiers a resume header can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalSection {
    Contact,
    Summary,
    Skills,
    Experience,
    Projects,
    Education,
    Certifications,
    Achievements,
    Publications,
    Languages,
    Volunteer,
    Hobbies,
    References,
    Declarations,
    Unknown,
}

impl CanonicalSection {
    /// All canonical sections, in a stable order.
    pub fn all() -> &'static [CanonicalSection] {
        use CanonicalSection::*;
        &[
            Contact,
            Summary,
            Skills,
            Experience,
            Projects,
            Education,
            Certifications,
            Achievements,
            Publications,
            Languages,
            Volunteer,
            Hobbies,
            References,
            Declarations,
            Unknown,
        ]
    }

    /// Stable display name, also used as the persistence key.
    pub fn as_str(&self) -> &'static str {
        use CanonicalSection::*;
        match self {
            Contact => "Contact",
            Summary => "Summary",
            Skills => "Skills",
            Experience => "Experience",
            Projects => "Projects",
            Education => "Education",
            Certifications => "Certifications",
            Achievements => "Achievements",
            Publications => "Publications",
            Languages => "Languages",
            Volunteer => "Volunteer",
            Hobbies => "Hobbies",
            References => "References",
            Declarations => "Declarations",
            Unknown => "Unknown",
        }
    }

    /// Parse a persistence key back into a canonical section.
    pub fn from_key(key: &str) -> Option<CanonicalSection> {
        CanonicalSection::all()
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(key))
    }
}

impl std::fmt::Display for CanonicalSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a header string resolved to a canonical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Literal variant match after basic lowercasing
    Exact,
    /// Match after full normalization (letter-spacing collapse etc.)
    Normalized,
    /// Cosine similarity against a learned centroid
    Embedding,
    /// Substring rule table
    Pattern,
    /// No match
    Unknown,
}

/// Result of matching a candidate header string against the database.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionMatch {
    /// Resolved canonical section
    pub section: CanonicalSection,
    /// Match mechanism
    pub kind: MatchKind,
    /// Match strength in [0,1]
    pub score: f32,
}

impl SectionMatch {
    /// The no-match result.
    pub fn unknown() -> Self {
        Self {
            section: CanonicalSection::Unknown,
            kind: MatchKind::Unknown,
            score: 0.0,
        }
    }

    /// Whether this resolved to a real section.
    pub fn is_known(&self) -> bool {
        self.section != CanonicalSection::Unknown
    }
}

/// A labeled section: a canonical name plus its body lines in reading
/// order. Body lines never include header lines.
#[derive(Debug, Clone)]
pub struct Section {
    /// Canonical name
    pub name: CanonicalSection,
    /// Body lines in reading order
    pub body: Vec<Line>,
    /// First and last page the section touches
    pub page_span: (usize, usize),
}

impl Section {
    /// Create an empty section starting on `page`.
    pub fn new(name: CanonicalSection, page: usize) -> Self {
        Self {
            name,
            body: Vec::new(),
            page_span: (page, page),
        }
    }

    /// Append a body line, widening the page span.
    pub fn push_line(&mut self, line: Line) {
        self.page_span.0 = self.page_span.0.min(line.page);
        self.page_span.1 = self.page_span.1.max(line.page);
        self.body.push(line);
    }

    /// Body line texts.
    pub fn body_texts(&self) -> Vec<String> {
        self.body.iter().map(|l| l.text()).collect()
    }

    /// Concatenated body text, newline-separated.
    pub fn content_text(&self) -> String {
        self.body_texts().join("\n")
    }
}
