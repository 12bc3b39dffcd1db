//! DOCX word source: native paragraph flow laid onto synthetic pages.
//!
//! DOCX carries no glyph geometry, so runs are flowed onto Letter-sized
//! pages with a fixed-advance layout model. The positions are synthetic
//! but consistent, which is all the downstream histogram and line
//! machinery needs: a flowed document is a clean single-column page.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::model::{BBox, FontFlags, Page, Token};

use super::{DocumentInput, WordSource};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const DEFAULT_SIZE: f32 = 11.0;

/// Extracts words from the main document part of a DOCX container.
#[derive(Debug, Clone, Default)]
pub struct DocxSource;

impl WordSource for DocxSource {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn acquire(&self, input: &DocumentInput) -> Result<Vec<Page>> {
        let xml = read_document_xml(&input.data)?;
        let runs = parse_runs(&xml)?;
        Ok(flow_runs(runs))
    }
}

/// Pull `word/document.xml` out of the ZIP container.
fn read_document_xml(data: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::DocxParse(format!("not a zip container: {e}")))?;
    let mut file = archive
        .by_name("word/document.xml")
        .map_err(|_| Error::DocxParse("word/document.xml missing".into()))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| Error::DocxParse(format!("document.xml unreadable: {e}")))?;
    Ok(xml)
}

/// One styled text run, with paragraph boundaries marked.
#[derive(Debug, Clone)]
struct DocxRun {
    text: String,
    bold: bool,
    italic: bool,
    /// Font size in points
    size: f32,
    /// True when this run starts a new paragraph
    paragraph_start: bool,
}

/// Walk the document XML and collect styled runs.
fn parse_runs(xml: &str) -> Result<Vec<DocxRun>> {
    let mut reader = Reader::from_reader(Cursor::new(xml.as_bytes()));
    let mut buf = Vec::new();

    let mut runs: Vec<DocxRun> = Vec::new();
    let mut in_text = false;
    let mut bold = false;
    let mut italic = false;
    let mut size = DEFAULT_SIZE;
    let mut paragraph_start = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::DocxParse(e.to_string()))?;
        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    paragraph_start = true;
                }
                b"w:r" => {
                    bold = false;
                    italic = false;
                    size = DEFAULT_SIZE;
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:b" => bold = !attr_is_off(&e),
                b"w:i" => italic = !attr_is_off(&e),
                b"w:sz" => {
                    // Half-points.
                    if let Some(val) = attr_value(&e, b"w:val") {
                        if let Ok(half) = val.parse::<f32>() {
                            size = half / 2.0;
                        }
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if in_text {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::DocxParse(e.to_string()))?
                        .into_owned();
                    if !text.trim().is_empty() {
                        runs.push(DocxRun {
                            text,
                            bold,
                            italic,
                            size,
                            paragraph_start,
                        });
                        paragraph_start = false;
                    }
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"w:t" {
                    in_text = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(runs)
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// `<w:b w:val="0"/>` and friends turn the property off.
fn attr_is_off(e: &quick_xml::events::BytesStart<'_>) -> bool {
    matches!(
        attr_value(e, b"w:val").as_deref(),
        Some("0") | Some("false") | Some("none")
    )
}

/// Flow runs onto synthetic pages with a fixed-advance layout model.
fn flow_runs(runs: Vec<DocxRun>) -> Vec<Page> {
    let mut pages: Vec<Page> = Vec::new();
    let mut page = Page::new(0, PAGE_WIDTH, PAGE_HEIGHT);
    let mut x = MARGIN;
    let mut y = MARGIN;
    let mut line_height = DEFAULT_SIZE * 1.5;

    for run in runs {
        let char_width = run.size * 0.55;
        if run.paragraph_start && x > MARGIN {
            x = MARGIN;
            y += line_height * 1.2;
        }
        line_height = line_height.max(run.size * 1.5);

        for word in run.text.split_whitespace() {
            let Some(clean) = crate::model::normalize_token_text(word) else {
                continue;
            };
            let width = word.chars().count() as f32 * char_width;
            if x + width > PAGE_WIDTH - MARGIN && x > MARGIN {
                x = MARGIN;
                y += line_height;
                line_height = run.size * 1.5;
            }
            if y + run.size > PAGE_HEIGHT - MARGIN {
                page.finish();
                let next_index = page.index + 1;
                pages.push(std::mem::replace(
                    &mut page,
                    Page::new(next_index, PAGE_WIDTH, PAGE_HEIGHT),
                ));
                x = MARGIN;
                y = MARGIN;
            }
            let bbox = BBox::new(x, y, x + width, y + run.size);
            let token = Token::new(clean, page.index, bbox, run.size).with_flags(FontFlags {
                bold: run.bold,
                italic: run.italic,
                monospace: false,
            });
            page.push(token);
            x += width + char_width;
        }
    }

    page.finish();
    if !page.is_empty() || pages.is_empty() {
        pages.push(page);
    }
    pages
}
