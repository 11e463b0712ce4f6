//! Styled text runs from a page content stream.
//!
//! Tracks just enough of the text state (font, size, text matrix, leading)
//! to tell where lines break and how large and heavy each run is drawn.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};

use crate::{ExtractError, Result};

/// A piece of text drawn with one font at one size.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledRun {
    pub text: String,
    /// Effective size in points
    pub font_size: f32,
    pub is_bold: bool,
    pub is_italic: bool,
    /// Starts on a different baseline than the previous run
    pub new_line: bool,
    /// Separated from the previous run on the same line by visible space
    pub space_before: bool,
}

impl StyledRun {
    /// A plain body-text run.
    pub fn plain(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold: false,
            is_italic: false,
            new_line: true,
            space_before: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.is_italic = true;
        self
    }

    /// Continues the previous line instead of starting a new one.
    pub fn same_line(mut self) -> Self {
        self.new_line = false;
        self
    }
}

/// Font weight and slant guessed from a PostScript font name.
pub(crate) fn font_style(base_font: &str) -> (bool, bool) {
    let name = base_font.to_lowercase();
    let bold = ["bold", "black", "heavy", "semibold", "demi"].iter().any(|m| name.contains(m));
    let italic = name.contains("italic") || name.contains("oblique");
    (bold, italic)
}

/// TJ adjustments beyond this many thousandths of an em read as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Rough advance of one glyph in ems; only used to spot gaps between runs.
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
struct TextMatrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
    line_x: f32,
    line_y: f32,
}

impl Default for TextMatrix {
    fn default() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0, line_x: 0.0, line_y: 0.0 }
    }
}

impl TextMatrix {
    fn set(&mut self, a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) {
        *self = Self { a, b, c, d, e, f, line_x: e, line_y: f };
    }

    /// Moves to the start of the next line, offset from the current line start.
    fn translate(&mut self, tx: f32, ty: f32) {
        self.line_x += tx * self.a + ty * self.c;
        self.line_y += tx * self.b + ty * self.d;
        self.e = self.line_x;
        self.f = self.line_y;
    }

    /// Advances the pen along the baseline.
    fn advance(&mut self, tx: f32) {
        self.e += tx * self.a;
        self.f += tx * self.b;
    }

    fn scale(&self) -> f32 {
        let scale = (self.b * self.b + self.d * self.d).sqrt();
        if scale > 0.0 { scale } else { 1.0 }
    }
}

#[derive(Debug, Clone)]
struct FontState {
    resource: Vec<u8>,
    size: f32,
    bold: bool,
    italic: bool,
}

impl Default for FontState {
    fn default() -> Self {
        Self { resource: Vec::new(), size: 12.0, bold: false, italic: false }
    }
}

/// Extracts the styled runs of one page, in content-stream order.
///
/// # Errors
///
/// Returns [`ExtractError::InvalidDocument`] if the page or its content stream
/// cannot be decoded.
pub(crate) fn page_runs(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<StyledRun>> {
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let data = page_content(doc, page_id)?;
    let content = lopdf::content::Content::decode(&data)?;

    let mut walker = Walker::new(doc, &fonts);
    for op in &content.operations {
        walker.apply(&op.operator, &op.operands);
    }
    Ok(walker.runs)
}

fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page = doc.get_dictionary(page_id)?;
    let contents = page.get(b"Contents")?;

    match contents {
        Object::Reference(id) => match doc.get_object(*id)? {
            Object::Stream(stream) => Ok(stream.decompressed_content()?),
            _ => Err(ExtractError::InvalidDocument("page contents is not a stream".to_string())),
        },
        Object::Array(parts) => {
            let mut content = Vec::new();
            for part in parts {
                if let Object::Reference(id) = part
                    && let Ok(Object::Stream(stream)) = doc.get_object(*id)
                    && let Ok(data) = stream.decompressed_content()
                {
                    content.extend_from_slice(&data);
                    content.push(b' ');
                }
            }
            Ok(content)
        }
        Object::Stream(stream) => Ok(stream.decompressed_content()?),
        _ => Err(ExtractError::InvalidDocument("page contents is not a stream".to_string())),
    }
}

struct Walker<'a> {
    doc: &'a LopdfDocument,
    fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>,
    font: FontState,
    matrix: TextMatrix,
    leading: Option<f32>,
    /// Pen position and baseline after the last emitted run
    last: Option<(f32, f32)>,
    runs: Vec<StyledRun>,
}

impl<'a> Walker<'a> {
    fn new(doc: &'a LopdfDocument, fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>) -> Self {
        Self {
            doc,
            fonts,
            font: FontState::default(),
            matrix: TextMatrix::default(),
            leading: None,
            last: None,
            runs: Vec::new(),
        }
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "BT" => self.matrix = TextMatrix::default(),
            "Tf" => {
                if let [Object::Name(resource), size, ..] = operands {
                    self.select_font(resource, number(size).unwrap_or(12.0));
                }
            }
            "TL" => self.leading = operands.first().and_then(number),
            "Td" | "TD" => {
                if let [tx, ty, ..] = operands {
                    let (tx, ty) = (number(tx).unwrap_or(0.0), number(ty).unwrap_or(0.0));
                    if operator == "TD" {
                        self.leading = Some(-ty);
                    }
                    self.matrix.translate(tx, ty);
                }
            }
            "Tm" => {
                if operands.len() >= 6 {
                    let n: Vec<f32> = operands.iter().take(6).map(|o| number(o).unwrap_or(0.0)).collect();
                    self.matrix.set(n[0], n[1], n[2], n[3], n[4], n[5]);
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.emit(text);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let text = self.decode(bytes);
                    self.emit(text);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    let text = self.decode(bytes);
                    self.emit(text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let text = self.decode_array(items);
                    self.emit(text);
                }
            }
            _ => {}
        }
    }

    fn select_font(&mut self, resource: &[u8], size: f32) {
        let base_font = self
            .fonts
            .get(resource)
            .and_then(|f| f.get(b"BaseFont").ok())
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_default();
        let (bold, italic) = font_style(&base_font);
        self.font = FontState { resource: resource.to_vec(), size, bold, italic };
    }

    fn next_line(&mut self) {
        let leading = self.leading.unwrap_or(self.font.size * 1.2);
        self.matrix.translate(0.0, -leading);
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let encoding = self.fonts.get(&self.font.resource).and_then(|f| f.get_font_encoding(self.doc).ok());
        if let Some(encoding) = encoding
            && let Ok(text) = LopdfDocument::decode_text(&encoding, bytes)
        {
            return text;
        }
        decode_text_simple(bytes)
    }

    fn decode_array(&self, items: &[Object]) -> String {
        let mut combined = String::new();
        for item in items {
            match item {
                Object::String(bytes, _) => combined.push_str(&self.decode(bytes)),
                other => {
                    if let Some(adjustment) = number(other)
                        && -adjustment > TJ_SPACE_THRESHOLD
                        && !combined.is_empty()
                        && !combined.ends_with(char::is_whitespace)
                    {
                        combined.push(' ');
                    }
                }
            }
        }
        combined
    }

    fn emit(&mut self, text: String) {
        let glyphs = text.chars().count() as f32;
        let start = (self.matrix.e, self.matrix.f);
        self.matrix.advance(glyphs * self.font.size * AVERAGE_GLYPH_WIDTH);

        if text.trim().is_empty() {
            return;
        }

        let font_size = self.font.size * self.matrix.scale();
        let new_line = self.last.is_none_or(|(_, y)| (start.1 - y).abs() > 1.0);
        let space_before = !new_line && self.last.is_some_and(|(end_x, _)| start.0 - end_x > font_size * 0.15);

        self.last = Some((self.matrix.e, self.matrix.f));
        self.runs.push(StyledRun {
            text,
            font_size,
            is_bold: self.font.bold,
            is_italic: self.font.italic,
            new_line,
            space_before,
        });
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decodes a PDF string without font information: UTF-16BE with a byte order
/// mark, then UTF-8, then Latin-1.
pub(crate) fn decode_text_simple(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, rest @ ..] = bytes {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Helvetica", false, false)]
    #[case("Helvetica-Bold", true, false)]
    #[case("Times-BoldItalic", true, true)]
    #[case("ABCDEF+Arial-BoldMT", true, false)]
    #[case("Courier-Oblique", false, true)]
    #[case("SourceSans-Semibold", true, false)]
    fn test_font_style(#[case] name: &str, #[case] bold: bool, #[case] italic: bool) {
        assert_eq!(font_style(name), (bold, italic));
    }

    #[test]
    fn test_decode_text_simple() {
        assert_eq!(decode_text_simple(b"plain"), "plain");
        assert_eq!(decode_text_simple(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
        assert_eq!(decode_text_simple(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[test]
    fn test_text_matrix_translate_moves_line_start() {
        let mut m = TextMatrix::default();
        m.set(1.0, 0.0, 0.0, 1.0, 72.0, 700.0);
        m.advance(100.0);
        m.translate(0.0, -14.0);
        assert_eq!((m.e, m.f), (72.0, 686.0));
    }

    #[test]
    fn test_text_matrix_scale() {
        let mut m = TextMatrix::default();
        m.set(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        assert_eq!(m.scale(), 2.0);
    }
}
