//! Section detection: header scoring, the self-learning section database,
//! and assembly of labeled sections in reading order.

mod assembler;
mod database;
mod header;

pub use assembler::Assembler;
pub use database::{
    LearnedBatch, SectionDb, SectionEntry, Snapshot, DEFAULT_EMBEDDING_THRESHOLD,
};
pub use header::{HeaderDetector, HeaderDetectorConfig, LineLabel};

use unicode_normalization::UnicodeNormalization;

/// Lowercase a heading and collapse runs of whitespace, without touching
/// punctuation. This is the surface form stored for learned variants.
pub fn surface_form(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a candidate heading for matching: Unicode-fold, lowercase,
/// drop everything non-alphabetic (keeping word boundaries), and collapse
/// letter-spaced words ("e x p e r i e n c e" becomes "experience").
///
/// The function is idempotent: normalizing a normalized string returns it
/// unchanged.
pub fn normalize_heading(raw: &str) -> String {
    let folded: String = raw.nfkc().collect::<String>().to_lowercase();
    let cleaned: String = folded
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();

    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        if words[i].chars().count() == 1 {
            // Collect a run of single letters, then absorb one following
            // multi-letter word ("e x perience").
            let mut joined = String::new();
            while i < words.len() && words[i].chars().count() == 1 {
                joined.push_str(words[i]);
                i += 1;
            }
            if i < words.len() {
                joined.push_str(words[i]);
                i += 1;
            }
            out.push(joined);
        } else {
            out.push(words[i].to_string());
            i += 1;
        }
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_letter_spacing() {
        assert_eq!(normalize_heading("E X P E R I E N C E"), "experience");
        assert_eq!(normalize_heading("E Xperience"), "experience");
        assert_eq!(normalize_heading("WORK EXPERIENCE:"), "work experience");
        assert_eq!(normalize_heading("Skills & Expertise"), "skills expertise");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for s in [
            "E X P E R I E N C E",
            "Work Experience",
            "  P R O F I L E  ",
            "Education — 2020",
            "a bc d ef",
            "plan b",
            "",
        ] {
            let once = normalize_heading(s);
            assert_eq!(normalize_heading(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn test_surface_form() {
        assert_eq!(surface_form("  Work   Experience "), "work experience");
        assert_eq!(surface_form("E X P E R I E N C E"), "e x p e r i e n c e");
    }

    #[test]
    fn test_lone_single_letter_kept() {
        assert_eq!(normalize_heading("plan b"), "plan b");
    }
}
