//! Assembling labeled lines into ordered sections.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{CanonicalSection, Line, Section};

use super::header::LineLabel;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email regex")
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d[\d\s().\-]{7,}\d").expect("phone regex"))
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(https?://|www\.)\S+|linkedin\.com\S*").expect("url regex"))
}

/// Whether a line carries contact-looking content. Phone candidates need
/// at least nine digits so year ranges do not read as numbers.
fn has_contact_token(line: &Line) -> bool {
    let text = line.text();
    if email_regex().is_match(&text) || url_regex().is_match(&text) {
        return true;
    }
    phone_regex()
        .find_iter(&text)
        .any(|m| m.as_str().chars().filter(|c| c.is_ascii_digit()).count() >= 9)
}

/// Cuts a labeled line stream into sections.
#[derive(Debug, Clone, Default)]
pub struct Assembler;

impl Assembler {
    /// Walk lines in reading order: each header opens a section, body
    /// lines attach to the current one, and repeated canonical names merge
    /// into their first occurrence.
    ///
    /// Lines before the first header become a synthetic `Contact` section
    /// when any of them carries an email, phone, or URL, otherwise
    /// `Summary`.
    pub fn assemble(&self, stream: Vec<(Line, LineLabel)>) -> Vec<Section> {
        let mut ordered: Vec<Section> = Vec::new();
        // Index into `ordered` per canonical name, for duplicate merging.
        let mut by_name: Vec<(CanonicalSection, usize)> = Vec::new();
        // Lines seen before any header.
        let mut preamble: Vec<Line> = Vec::new();
        let mut current: Option<usize> = None;

        let open = |ordered: &mut Vec<Section>,
                        by_name: &mut Vec<(CanonicalSection, usize)>,
                        name: CanonicalSection,
                        page: usize|
         -> usize {
            if let Some(&(_, idx)) = by_name.iter().find(|(n, _)| *n == name) {
                return idx;
            }
            ordered.push(Section::new(name, page));
            let idx = ordered.len() - 1;
            by_name.push((name, idx));
            idx
        };

        for (line, label) in stream {
            match label {
                LineLabel::Header { matched, .. } => {
                    current = Some(open(&mut ordered, &mut by_name, matched.section, line.page));
                }
                LineLabel::MultiHeader { sections, .. } => {
                    // The segmenter re-split usually dissolves these; when
                    // one survives, the leftmost heading wins the stream
                    // position.
                    if let Some((name, _)) = sections.first() {
                        current = Some(open(&mut ordered, &mut by_name, *name, line.page));
                    }
                }
                LineLabel::Body => match current {
                    Some(idx) => ordered[idx].push_line(line),
                    None => preamble.push(line),
                },
            }
        }

        if !preamble.is_empty() {
            let name = if preamble.iter().any(has_contact_token) {
                CanonicalSection::Contact
            } else {
                CanonicalSection::Summary
            };
            let page = preamble[0].page;
            // The preamble belongs at the front, before the first real
            // header, but merges into an existing section of the same
            // name.
            match by_name.iter().find(|(n, _)| *n == name) {
                Some(&(_, idx)) => {
                    let mut body = std::mem::take(&mut ordered[idx].body);
                    let mut section = Section::new(name, page);
                    for line in preamble {
                        section.push_line(line);
                    }
                    section.body.append(&mut body);
                    section.page_span.1 = section.page_span.1.max(ordered[idx].page_span.1);
                    ordered[idx] = section;
                }
                None => {
                    let mut section = Section::new(name, page);
                    for line in preamble {
                        section.push_line(line);
                    }
                    ordered.insert(0, section);
                    for (_, idx) in by_name.iter_mut() {
                        *idx += 1;
                    }
                }
            }
        }

        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, MatchKind, SectionMatch, Token};

    fn line(text: &str, page: usize, y: f32) -> Line {
        let tokens: Vec<Token> = text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| {
                Token::new(
                    w,
                    page,
                    BBox::new(72.0 + i as f32 * 60.0, y, 120.0 + i as f32 * 60.0, y + 11.0),
                    11.0,
                )
            })
            .collect();
        Line::from_tokens(page, 0, 0, tokens)
    }

    fn header(section: CanonicalSection) -> LineLabel {
        LineLabel::Header {
            matched: SectionMatch {
                section,
                kind: MatchKind::Exact,
                score: 0.9,
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_preamble_with_email_becomes_contact() {
        let stream = vec![
            (line("John Doe", 0, 72.0), LineLabel::Body),
            (line("john@x.com", 0, 90.0), LineLabel::Body),
            (line("EXPERIENCE", 0, 130.0), header(CanonicalSection::Experience)),
            (line("Acme Corp 2020-2022", 0, 156.0), LineLabel::Body),
        ];
        let sections = Assembler.assemble(stream);
        let names: Vec<CanonicalSection> = sections.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![CanonicalSection::Contact, CanonicalSection::Experience]
        );
        assert_eq!(sections[0].body.len(), 2);
    }

    #[test]
    fn test_preamble_without_contact_becomes_summary() {
        let stream = vec![
            (line("Seasoned platform engineer", 0, 72.0), LineLabel::Body),
            (line("EDUCATION", 0, 130.0), header(CanonicalSection::Education)),
            (line("BS CS 2020", 0, 156.0), LineLabel::Body),
        ];
        let sections = Assembler.assemble(stream);
        assert_eq!(sections[0].name, CanonicalSection::Summary);
        assert_eq!(sections[1].name, CanonicalSection::Education);
    }

    #[test]
    fn test_duplicate_headers_merge_preserving_position() {
        let stream = vec![
            (line("EXPERIENCE", 0, 100.0), header(CanonicalSection::Experience)),
            (line("Acme Corp", 0, 120.0), LineLabel::Body),
            (line("SKILLS", 0, 160.0), header(CanonicalSection::Skills)),
            (line("Rust", 0, 180.0), LineLabel::Body),
            (line("EXPERIENCE", 1, 80.0), header(CanonicalSection::Experience)),
            (line("Globex 2018", 1, 100.0), LineLabel::Body),
        ];
        let sections = Assembler.assemble(stream);
        let names: Vec<CanonicalSection> = sections.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![CanonicalSection::Experience, CanonicalSection::Skills]
        );
        assert_eq!(
            sections[0].body_texts(),
            vec!["Acme Corp".to_string(), "Globex 2018".to_string()]
        );
        assert_eq!(sections[0].page_span, (0, 1));
    }

    #[test]
    fn test_multi_header_attaches_to_first_name() {
        let stream = vec![
            (
                line("EXPERIENCE SKILLS", 0, 60.0),
                LineLabel::MultiHeader {
                    sections: vec![
                        (CanonicalSection::Experience, "EXPERIENCE".into()),
                        (CanonicalSection::Skills, "SKILLS".into()),
                    ],
                    score: 0.6,
                },
            ),
            (line("Acme Corp", 0, 90.0), LineLabel::Body),
        ];
        let sections = Assembler.assemble(stream);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].name, CanonicalSection::Experience);
        assert_eq!(sections[0].body.len(), 1);
    }

    #[test]
    fn test_empty_stream() {
        assert!(Assembler.assemble(Vec::new()).is_empty());
    }

    #[test]
    fn test_contact_detection_patterns() {
        assert!(has_contact_token(&line("reach me at jane@corp.io", 0, 0.0)));
        assert!(has_contact_token(&line("+1 (555) 123-4567", 0, 0.0)));
        assert!(has_contact_token(&line("www.example.com/portfolio", 0, 0.0)));
        assert!(!has_contact_token(&line("Seasoned engineer", 0, 0.0)));
    }
}
