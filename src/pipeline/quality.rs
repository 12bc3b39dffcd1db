//! Structural quality validation driving strategy fallback.

use crate::model::{CanonicalSection, Section};

/// Weighted structural signals over an assembled document.
///
/// Each signal is a predicate; the score is the sum of the weights of the
/// predicates that hold.
#[derive(Debug, Clone, Copy)]
pub struct QualitySignals {
    /// At least three sections were found
    pub enough_sections: bool,
    /// An Experience section is present
    pub has_experience: bool,
    /// In multi-page documents, no section is thinner than three body
    /// lines
    pub no_thin_sections: bool,
    /// Fewer than 20% of header-scored lines were unknown
    pub low_unknown_ratio: bool,
    /// Body lines average more than 20 characters
    pub substantial_lines: bool,
}

impl QualitySignals {
    /// Evaluate the signals for an assembled document.
    pub fn evaluate(
        sections: &[Section],
        unknown_headers: usize,
        known_headers: usize,
        page_count: usize,
    ) -> Self {
        let enough_sections = sections.len() >= 3;
        let has_experience = sections
            .iter()
            .any(|s| s.name == CanonicalSection::Experience);

        let no_thin_sections =
            page_count <= 1 || sections.iter().all(|s| s.body.len() >= 3);

        let total_headers = unknown_headers + known_headers;
        let low_unknown_ratio =
            total_headers == 0 || (unknown_headers as f32) < 0.2 * total_headers as f32;

        let line_lengths: Vec<usize> = sections
            .iter()
            .flat_map(|s| s.body.iter())
            .map(|l| l.text().chars().count())
            .collect();
        let substantial_lines = !line_lengths.is_empty()
            && line_lengths.iter().sum::<usize>() as f32 / line_lengths.len() as f32 > 20.0;

        Self {
            enough_sections,
            has_experience,
            no_thin_sections,
            low_unknown_ratio,
            substantial_lines,
        }
    }

    /// Weighted mix in [0,1].
    pub fn score(&self) -> f32 {
        let mut score = 0.0;
        if self.enough_sections {
            score += 0.30;
        }
        if self.has_experience {
            score += 0.25;
        }
        if self.no_thin_sections {
            score += 0.15;
        }
        if self.low_unknown_ratio {
            score += 0.15;
        }
        if self.substantial_lines {
            score += 0.15;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Line, Token};

    fn section(name: CanonicalSection, lines: &[&str]) -> Section {
        let mut section = Section::new(name, 0);
        for (i, text) in lines.iter().enumerate() {
            let tokens: Vec<Token> = text
                .split_whitespace()
                .enumerate()
                .map(|(j, w)| {
                    Token::new(
                        w,
                        0,
                        BBox::new(
                            72.0 + j as f32 * 60.0,
                            100.0 + i as f32 * 14.0,
                            120.0 + j as f32 * 60.0,
                            111.0 + i as f32 * 14.0,
                        ),
                        11.0,
                    )
                })
                .collect();
            section.push_line(Line::from_tokens(0, 0, 0, tokens));
        }
        section
    }

    #[test]
    fn test_full_marks() {
        let sections = vec![
            section(
                CanonicalSection::Contact,
                &["John Doe reachable at john@example.com today", "+1 555 123 4567 portfolio link", "based in Springfield with remote preference"],
            ),
            section(
                CanonicalSection::Experience,
                &["Senior engineer at Acme Corporation since 2020", "shipped the flagship billing platform rewrite", "led a team of five platform engineers"],
            ),
            section(
                CanonicalSection::Education,
                &["Bachelor of Science in Computer Science", "State University, graduated two thousand twenty", "graduated with first class honours overall"],
            ),
        ];
        let signals = QualitySignals::evaluate(&sections, 0, 3, 1);
        assert!(signals.enough_sections);
        assert!(signals.has_experience);
        assert!(signals.substantial_lines);
        assert!((signals.score() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_experience_costs_quarter() {
        let sections = vec![
            section(CanonicalSection::Summary, &["a seasoned engineer writing software"]),
            section(CanonicalSection::Skills, &["rust python kubernetes postgres redis"]),
            section(CanonicalSection::Education, &["bachelor of science in computing"]),
        ];
        let signals = QualitySignals::evaluate(&sections, 0, 3, 1);
        assert!(!signals.has_experience);
        assert!((signals.score() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_thin_sections_penalized_on_multipage() {
        let sections = vec![
            section(CanonicalSection::Experience, &["one lonely line of experience"]),
            section(CanonicalSection::Skills, &["rust and friends and tooling"]),
            section(CanonicalSection::Education, &["a degree from somewhere nice"]),
        ];
        let single = QualitySignals::evaluate(&sections, 0, 3, 1);
        assert!(single.no_thin_sections);
        let multi = QualitySignals::evaluate(&sections, 0, 3, 2);
        assert!(!multi.no_thin_sections);
        assert!(multi.score() < single.score());
    }

    #[test]
    fn test_unknown_ratio() {
        let sections = vec![section(
            CanonicalSection::Experience,
            &["plenty of perfectly reasonable content here"],
        )];
        assert!(QualitySignals::evaluate(&sections, 1, 9, 1).low_unknown_ratio);
        assert!(!QualitySignals::evaluate(&sections, 3, 7, 1).low_unknown_ratio);
    }

    #[test]
    fn test_empty_document_scores_low() {
        let signals = QualitySignals::evaluate(&[], 0, 0, 1);
        // Only the vacuous predicates hold.
        assert!(signals.score() < 0.4);
    }
}
