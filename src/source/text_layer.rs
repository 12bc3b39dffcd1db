//! Text-layer word source: glyph positions straight from the PDF.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use crate::error::{Error, Result};
use crate::model::{BBox, FontFlags, Page, Token};

use super::{DocumentInput, WordSource};

/// Minimum alphabetic characters across a document's body areas for the
/// text layer to count as usable.
const MIN_ALPHA_CHARS: usize = 20;

/// Extracts positioned words from a PDF text layer.
#[derive(Debug, Clone, Default)]
pub struct TextLayerSource {
    /// Override for the alphabetic-character floor
    pub min_alpha_chars: Option<usize>,
}

impl WordSource for TextLayerSource {
    fn name(&self) -> &'static str {
        "text-layer"
    }

    fn acquire(&self, input: &DocumentInput) -> Result<Vec<Page>> {
        let doc = LopdfDocument::load_mem(&input.data)?;
        let page_ids = doc.get_pages();
        let mut pages = Vec::with_capacity(page_ids.len());

        for (index, (page_num, page_id)) in page_ids.iter().enumerate() {
            let (width, height) = page_dimensions(&doc, *page_id);
            let mut page = Page::new(index, width, height);

            match extract_page_tokens(&doc, *page_id, index, height) {
                Ok(tokens) => {
                    for token in tokens {
                        page.push(token);
                    }
                }
                Err(e) => {
                    log::warn!("page {page_num}: text extraction failed: {e}");
                }
            }
            page.finish();
            pages.push(page);
        }

        let floor = self.min_alpha_chars.unwrap_or(MIN_ALPHA_CHARS);
        let best_page = pages.iter().map(|p| p.body_alpha_chars()).max().unwrap_or(0);
        if best_page < floor {
            return Err(Error::NoExtractableText {
                page: 0,
                alpha_chars: best_page,
            });
        }
        Ok(pages)
    }
}

/// Page dimensions from the MediaBox, defaulting to Letter.
fn page_dimensions(doc: &LopdfDocument, page_id: ObjectId) -> (f32, f32) {
    if let Ok(page_dict) = doc.get_dictionary(page_id) {
        if let Ok(media_box) = page_dict.get(b"MediaBox") {
            if let Ok(array) = media_box.as_array() {
                if array.len() >= 4 {
                    let width = array[2].as_float().unwrap_or(612.0);
                    let height = array[3].as_float().unwrap_or(792.0);
                    return (width, height);
                }
            }
        }
    }
    (612.0, 792.0)
}

/// Get a page's (possibly concatenated) content stream.
fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;
    let contents = page_dict
        .get(b"Contents")
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    match contents {
        Object::Reference(r) => {
            if let Ok(Object::Stream(s)) = doc.get_object(*r) {
                return s
                    .decompressed_content()
                    .map_err(|e| Error::PdfParse(e.to_string()));
            }
            Err(Error::PdfParse("invalid content stream".to_string()))
        }
        Object::Array(arr) => {
            let mut content = Vec::new();
            for obj in arr {
                if let Object::Reference(r) = obj {
                    if let Ok(Object::Stream(s)) = doc.get_object(*r) {
                        if let Ok(data) = s.decompressed_content() {
                            content.extend_from_slice(&data);
                            content.push(b' ');
                        }
                    }
                }
            }
            Ok(content)
        }
        Object::Stream(s) => s
            .decompressed_content()
            .map_err(|e| Error::PdfParse(e.to_string())),
        _ => Err(Error::PdfParse("invalid content stream".to_string())),
    }
}

/// Walk a page's content stream and emit word tokens.
fn extract_page_tokens(
    doc: &LopdfDocument,
    page_id: ObjectId,
    page_index: usize,
    page_height: f32,
) -> Result<Vec<Token>> {
    let lopdf_fonts = doc
        .get_page_fonts(page_id)
        .map_err(|e| Error::PdfParse(e.to_string()))?;

    let mut font_names = HashMap::new();
    for (name, font) in &lopdf_fonts {
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        font_names.insert(name.clone(), base_font);
    }

    let content = page_content(doc, page_id)?;
    walk_content(doc, &content, &font_names, &lopdf_fonts, page_index, page_height)
}

fn walk_content(
    doc: &LopdfDocument,
    content: &[u8],
    font_names: &HashMap<Vec<u8>, String>,
    lopdf_fonts: &BTreeMap<Vec<u8>, &lopdf::Dictionary>,
    page_index: usize,
    page_height: f32,
) -> Result<Vec<Token>> {
    let content =
        lopdf::content::Content::decode(content).map_err(|e| Error::PdfParse(e.to_string()))?;

    let mut tokens = Vec::new();
    let mut current_font = String::new();
    let mut current_font_name: Vec<u8> = Vec::new();
    let mut current_font_size: f32 = 12.0;
    let mut current_color: Option<[u8; 3]> = None;
    let mut leading: f32 = 12.0;
    let mut matrix = TextMatrix::default();
    let mut in_text = false;

    for op in content.operations {
        match op.operator.as_str() {
            "BT" => {
                in_text = true;
                matrix = TextMatrix::default();
            }
            "ET" => in_text = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Object::Name(name) = &op.operands[0] {
                        current_font_name = name.clone();
                        current_font = font_names
                            .get(name.as_slice())
                            .cloned()
                            .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                    }
                    current_font_size = number(&op.operands[1]).unwrap_or(12.0);
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    leading = l;
                }
            }
            "Td" => {
                if op.operands.len() >= 2 {
                    matrix.translate(
                        number(&op.operands[0]).unwrap_or(0.0),
                        number(&op.operands[1]).unwrap_or(0.0),
                    );
                }
            }
            "TD" => {
                if op.operands.len() >= 2 {
                    let ty = number(&op.operands[1]).unwrap_or(0.0);
                    leading = -ty;
                    matrix.translate(number(&op.operands[0]).unwrap_or(0.0), ty);
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    matrix.set(
                        number(&op.operands[0]).unwrap_or(1.0),
                        number(&op.operands[1]).unwrap_or(0.0),
                        number(&op.operands[2]).unwrap_or(0.0),
                        number(&op.operands[3]).unwrap_or(1.0),
                        number(&op.operands[4]).unwrap_or(0.0),
                        number(&op.operands[5]).unwrap_or(0.0),
                    );
                }
            }
            "T*" => matrix.next_line(leading),
            "rg" => {
                if op.operands.len() >= 3 {
                    current_color = Some([
                        channel(&op.operands[0]),
                        channel(&op.operands[1]),
                        channel(&op.operands[2]),
                    ]);
                }
            }
            "g" => {
                if let Some(v) = op.operands.first() {
                    let c = channel(v);
                    current_color = Some([c, c, c]);
                }
            }
            "Tj" | "TJ" => {
                if !in_text {
                    continue;
                }
                let encoding = lopdf_fonts
                    .get(&current_font_name)
                    .and_then(|f| f.get_font_encoding(doc).ok());

                let text = if op.operator == "TJ" {
                    decode_tj_array(doc, op.operands.first(), &encoding)
                } else if let Some(Object::String(bytes, _)) = op.operands.first() {
                    decode_string(doc, bytes, &encoding)
                } else {
                    String::new()
                };

                emit_words(
                    &mut tokens,
                    &text,
                    &matrix,
                    current_font_size,
                    &current_font,
                    current_color,
                    page_index,
                    page_height,
                );
            }
            "'" | "\"" => {
                matrix.next_line(leading);
                if !in_text {
                    continue;
                }
                let text_idx = if op.operator == "\"" { 2 } else { 0 };
                if let Some(Object::String(bytes, _)) = op.operands.get(text_idx) {
                    let encoding = lopdf_fonts
                        .get(&current_font_name)
                        .and_then(|f| f.get_font_encoding(doc).ok());
                    let text = decode_string(doc, bytes, &encoding);
                    emit_words(
                        &mut tokens,
                        &text,
                        &matrix,
                        current_font_size,
                        &current_font,
                        current_color,
                        page_index,
                        page_height,
                    );
                }
            }
            _ => {}
        }
    }

    Ok(tokens)
}

/// Decode a TJ operand array. Large negative kerning adjustments read as
/// word spaces.
fn decode_tj_array(
    doc: &LopdfDocument,
    operand: Option<&Object>,
    encoding: &Option<lopdf::Encoding>,
) -> String {
    let Some(Object::Array(arr)) = operand else {
        return String::new();
    };
    let mut combined = String::new();
    // Adjustments are in 1/1000 text-space units; -200 and beyond is a
    // word break for most fonts.
    let space_threshold = 200.0;
    for item in arr {
        match item {
            Object::String(bytes, _) => combined.push_str(&decode_string(doc, bytes, encoding)),
            Object::Integer(n) => {
                if -(*n as f32) > space_threshold && !combined.ends_with(' ') {
                    combined.push(' ');
                }
            }
            Object::Real(n) => {
                if -n > space_threshold && !combined.ends_with(' ') {
                    combined.push(' ');
                }
            }
            _ => {}
        }
    }
    combined
}

fn decode_string(
    _doc: &LopdfDocument,
    bytes: &[u8],
    encoding: &Option<lopdf::Encoding>,
) -> String {
    if let Some(enc) = encoding {
        if let Ok(decoded) = LopdfDocument::decode_text(enc, bytes) {
            return decoded;
        }
    }
    decode_text_simple(bytes)
}

/// Split decoded text into word tokens, estimating advance widths from
/// the font size.
#[allow(clippy::too_many_arguments)]
fn emit_words(
    tokens: &mut Vec<Token>,
    text: &str,
    matrix: &TextMatrix,
    font_size: f32,
    font_name: &str,
    color: Option<[u8; 3]>,
    page_index: usize,
    page_height: f32,
) {
    if text.trim().is_empty() {
        return;
    }
    let (x, y) = matrix.position();
    let scale = matrix.scale();
    let size = font_size * scale;
    let char_width = size * 0.5;
    let flags = FontFlags::from_font_name(font_name);

    // PDF y is the baseline measured bottom-up; flip to top-left origin.
    let y_top = page_height - y - size * 0.8;
    let y_bot = page_height - y + size * 0.2;

    for (offset, raw) in split_words(text) {
        let Some(clean) = crate::model::normalize_token_text(raw) else {
            continue;
        };
        let x0 = x + offset as f32 * char_width;
        let x1 = x0 + raw.chars().count() as f32 * char_width;
        let mut token = Token::new(clean, page_index, BBox::new(x0, y_top, x1, y_bot), size);
        token.flags = flags;
        token.color = color;
        tokens.push(token);
    }
}

/// Words with their character offsets inside the span.
fn split_words(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut offset = 0usize;
    let mut start: Option<usize> = None;
    let mut byte_start = 0usize;
    for (byte_idx, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                words.push((s, &text[byte_start..byte_idx]));
            }
        } else if start.is_none() {
            start = Some(offset);
            byte_start = byte_idx;
        }
        offset += 1;
    }
    if let Some(s) = start {
        words.push((s, &text[byte_start..]));
    }
    words
}

/// Simple decoding fallback when no font encoding is available.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| {
                if c.len() == 2 {
                    Some(u16::from_be_bytes([c[0], c[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }
    if let Ok(s) = String::from_utf8(bytes.to_vec()) {
        return s;
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn channel(obj: &Object) -> u8 {
    (number(obj).unwrap_or(0.0).clamp(0.0, 1.0) * 255.0) as u8
}

/// Text matrix tracking position in the content stream.
#[derive(Debug, Clone)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.e = e;
        self.f = f;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        self.e += tx * self.a + ty * self.c;
        self.f += tx * self.b + ty * self.d;
    }

    fn next_line(&mut self, leading: f32) {
        self.f -= leading * self.d;
    }

    fn position(&self) -> (f32, f32) {
        (self.e, self.f)
    }

    fn scale(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }
}
