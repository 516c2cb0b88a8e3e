//! Minimal A4 text layout over `printpdf`.

use std::io::BufWriter;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::error::DocumentError;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;
const LEFT: f32 = 20.0;
const INDENT: f32 = 25.0;

/// Characters per body line at 9pt.
pub const BODY_WIDTH: usize = 90;

/// Writes text top to bottom, starting new pages as needed.
pub struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: Mm,
    pages: usize,
}

impl PdfWriter {
    pub fn new(title: &str) -> Result<Self, DocumentError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| DocumentError::Font(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| DocumentError::Font(e.to_string()))?;

        Ok(Self {
            doc,
            layer,
            font,
            bold,
            y: Mm(TOP),
            pages: 1,
        })
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y.0 - height >= BOTTOM {
            return;
        }
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.pages + 1));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = Mm(TOP);
        self.pages += 1;
    }

    /// Document title line.
    pub fn title(&mut self, text: &str) {
        self.ensure_room(10.0);
        self.layer.use_text(text, 14.0, Mm(LEFT), self.y, &self.bold);
        self.y -= Mm(10.0);
    }

    /// Section heading.
    pub fn heading(&mut self, text: &str) {
        self.ensure_room(10.0);
        self.y -= Mm(4.0);
        self.layer.use_text(text, 11.0, Mm(LEFT), self.y, &self.bold);
        self.y -= Mm(6.0);
    }

    /// `label: value` line; skipped when the value is blank.
    pub fn field(&mut self, label: &str, value: &str) {
        if value.trim().is_empty() {
            return;
        }
        self.paragraph(&format!("{}: {}", label, value.trim()));
    }

    /// Wrapped body text.
    pub fn paragraph(&mut self, text: &str) {
        for line in wrap_text(text, BODY_WIDTH) {
            self.ensure_room(4.5);
            self.layer.use_text(&line, 9.0, Mm(INDENT), self.y, &self.font);
            self.y -= Mm(4.5);
        }
    }

    /// Bulleted item.
    pub fn bullet(&mut self, text: &str) {
        self.paragraph(&format!("· {}", text));
    }

    pub fn space(&mut self, mm: f32) {
        self.y -= Mm(mm);
    }

    /// Signature line at the current position.
    pub fn signature(&mut self, name: &str) {
        self.ensure_room(25.0);
        self.y -= Mm(15.0);
        self.layer
            .use_text("_________________________________", 10.0, Mm(LEFT), self.y, &self.font);
        self.y -= Mm(5.0);
        self.layer.use_text(name, 10.0, Mm(LEFT), self.y, &self.font);
        self.y -= Mm(5.0);
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Serialize the document.
    pub fn finish(self) -> Result<Vec<u8>, DocumentError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| DocumentError::Save(e.to_string()))?;
        buf.into_inner()
            .map_err(|e| DocumentError::Save(e.to_string()))
    }
}

/// Break text into lines of at most `max_chars` characters, on word boundaries.
///
/// A single word longer than the limit gets a line of its own.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;
        for word in raw_line.split_whitespace() {
            let word_len = word.chars().count();
            if current_len + word_len + 1 > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
