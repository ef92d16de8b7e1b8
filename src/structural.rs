//! Structural PDF parsing using lopdf
//!
//! Walks each page's content stream and produces the positioned text-item
//! model consumed by the run collector. Parsing is bounded in time and
//! resolves exactly once through [`parse_with_deadline`].

use crate::model::{GlyphRun, ParsedDocument, ParsedPage, ParsedText};
use crate::PdfError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Glyph advance (1/1000 em) assumed when the font has no width table
const DEFAULT_GLYPH_ADVANCE: f32 = 500.0;

/// TJ displacement (1/1000 em) beyond which a word gap is assumed
const TJ_SPACE_THRESHOLD: f32 = 250.0;

/// A parser turning PDF bytes into a page/text-item model
pub trait StructuralParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, PdfError>;
}

/// Terminal result of a bounded structural parse
#[derive(Debug)]
pub enum ParseOutcome {
    Ready(ParsedDocument),
    Failed(String),
    TimedOut(Duration),
}

/// Run `parser` on a worker thread, waiting at most `timeout`
///
/// A panic inside the parser is reported as [`ParseOutcome::Failed`]. The
/// worker owns the only sender, so the outcome is delivered at most once; if
/// the deadline passes first the late result is dropped.
///
/// Threads cannot be cancelled, so a worker that misses the deadline is
/// detached: it keeps its copy of `bytes` and its CPU time until the parser
/// returns on its own. The wait blocks the calling thread, so callers must not
/// occupy every worker of the global rayon pool, which lopdf uses internally.
pub fn parse_with_deadline(
    parser: Arc<dyn StructuralParser>,
    bytes: Arc<[u8]>,
    timeout: Option<Duration>,
) -> ParseOutcome {
    let (tx, rx) = mpsc::sync_channel::<Result<ParsedDocument, String>>(1);
    let parser_name = parser.name();

    let spawned = thread::Builder::new()
        .name(format!("{}-parse", parser_name))
        .spawn(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(|| parser.parse(&bytes))) {
                Ok(Ok(doc)) => Ok(doc),
                Ok(Err(e)) => Err(e.to_string()),
                Err(payload) => Err(panic_message(payload.as_ref())),
            };
            // Receiver is gone when the deadline already fired
            let _ = tx.send(result);
        });

    if let Err(e) = spawned {
        return ParseOutcome::Failed(format!("failed to start {} parser: {}", parser_name, e));
    }

    match timeout {
        Some(limit) => match rx.recv_timeout(limit) {
            Ok(Ok(doc)) => ParseOutcome::Ready(doc),
            Ok(Err(msg)) => ParseOutcome::Failed(msg),
            Err(RecvTimeoutError::Timeout) => ParseOutcome::TimedOut(limit),
            Err(RecvTimeoutError::Disconnected) => {
                ParseOutcome::Failed(format!("{} parser exited without a result", parser_name))
            }
        },
        None => match rx.recv() {
            Ok(Ok(doc)) => ParseOutcome::Ready(doc),
            Ok(Err(msg)) => ParseOutcome::Failed(msg),
            Err(_) => {
                ParseOutcome::Failed(format!("{} parser exited without a result", parser_name))
            }
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("parser panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("parser panicked: {}", s)
    } else {
        "parser panicked".to_string()
    }
}

/// lopdf-backed structural parser
///
/// Coordinates are converted from PDF points (origin bottom-left) to page
/// units with a top-left origin.
#[derive(Debug, Clone)]
pub struct LopdfParser {
    /// PDF points per page unit (default: 8.0)
    pub points_per_unit: f32,
}

impl Default for LopdfParser {
    fn default() -> Self {
        Self {
            points_per_unit: 8.0,
        }
    }
}

impl StructuralParser for LopdfParser {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, PdfError> {
        let doc = Document::load_mem(bytes)?;
        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(PdfError::InvalidStructure);
        }

        let mut parsed = ParsedDocument {
            pages: Vec::with_capacity(pages.len()),
        };
        for &page_id in pages.values() {
            parsed.pages.push(self.parse_page(&doc, page_id)?);
        }

        Ok(parsed)
    }
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Per-font data needed for run styling and width estimation
#[derive(Debug, Default)]
struct FontMetrics {
    face_id: usize,
    bold: bool,
    italic: bool,
    first_char: i64,
    /// Glyph widths in 1/1000 em, indexed from `first_char`
    widths: Vec<f32>,
}

impl FontMetrics {
    /// Advance of a shown string in 1/1000 em
    fn advance(&self, bytes: &[u8], decoded_chars: usize) -> f32 {
        if self.widths.is_empty() {
            return decoded_chars as f32 * DEFAULT_GLYPH_ADVANCE;
        }
        bytes
            .iter()
            .map(|&b| {
                let idx = b as i64 - self.first_char;
                if idx >= 0 {
                    self.widths
                        .get(idx as usize)
                        .copied()
                        .unwrap_or(DEFAULT_GLYPH_ADVANCE)
                } else {
                    DEFAULT_GLYPH_ADVANCE
                }
            })
            .sum()
    }
}

/// Check whether a font name indicates a bold face
pub fn is_bold_font(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("bold")
        || lower.contains("black")
        || lower.contains("heavy")
        || lower.contains("semibold")
        || lower.contains("demi")
}

/// Check whether a font name indicates an italic face
pub fn is_italic_font(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("italic") || lower.contains("oblique")
}

/// Text and graphics state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: Vec<u8>,
    font_size: f32,
    leading: f32,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            ctm_stack: Vec::new(),
            font: Vec::new(),
            font_size: 12.0,
            leading: 0.0,
            text_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            line_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            in_text_block: false,
        }
    }

    fn next_line(&mut self) {
        let leading = if self.leading > 0.0 {
            self.leading
        } else {
            self.font_size * 1.2
        };
        self.line_matrix[5] -= leading;
        self.text_matrix = self.line_matrix;
    }

    /// Advance the text matrix by `advance` (1/1000 em) along the baseline
    fn advance(&mut self, advance: f32) {
        let tx = advance / 1000.0 * self.font_size;
        self.text_matrix[4] += tx * self.text_matrix[0];
        self.text_matrix[5] += tx * self.text_matrix[1];
    }
}

/// A shown string waiting to be placed on the page
struct PendingRun {
    text: String,
    /// Starting text-space position
    origin: [f32; 6],
    /// Advance in 1/1000 em
    advance: f32,
}

impl LopdfParser {
    fn parse_page(&self, doc: &Document, page_id: ObjectId) -> Result<ParsedPage, PdfError> {
        use lopdf::content::Content;

        let media_box = media_box(doc, page_id).unwrap_or(DEFAULT_MEDIA_BOX);
        let page_top = media_box[3];

        let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
        let metrics = font_metrics(doc, &fonts);

        let content_data = doc
            .get_page_content(page_id)
            .map_err(|e| PdfError::Parse(e.to_string()))?;
        let content = Content::decode(&content_data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let mut state = TextState::new();
        let mut texts = Vec::new();

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => state.ctm_stack.push(state.ctm),
                "Q" => {
                    if let Some(saved) = state.ctm_stack.pop() {
                        state.ctm = saved;
                    }
                }
                "cm" => {
                    if op.operands.len() >= 6 {
                        let m = read_matrix(&op.operands);
                        state.ctm = multiply_matrices(&m, &state.ctm);
                    }
                }
                "BT" => {
                    state.in_text_block = true;
                    state.text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                    state.line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
                }
                "ET" => state.in_text_block = false,
                "Tf" => {
                    if op.operands.len() >= 2 {
                        if let Ok(name) = op.operands[0].as_name() {
                            state.font = name.to_vec();
                        }
                        if let Some(size) = get_number(&op.operands[1]) {
                            state.font_size = size;
                        }
                    }
                }
                "TL" => {
                    if let Some(leading) = op.operands.first().and_then(get_number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    if op.operands.len() >= 2 {
                        let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                        let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                        if op.operator == "TD" {
                            state.leading = -ty;
                        }
                        // Translation is expressed in the line matrix's own space
                        state.line_matrix[4] += tx * state.line_matrix[0] + ty * state.line_matrix[2];
                        state.line_matrix[5] += tx * state.line_matrix[1] + ty * state.line_matrix[3];
                        state.text_matrix = state.line_matrix;
                    }
                }
                "Tm" => {
                    if op.operands.len() >= 6 {
                        state.text_matrix = read_matrix(&op.operands);
                        state.line_matrix = state.text_matrix;
                    }
                }
                "T*" => state.next_line(),
                "Tj" => {
                    if state.in_text_block {
                        if let Some(operand) = op.operands.first() {
                            let run = self.show_string(doc, &fonts, &metrics, &mut state, operand);
                            texts.extend(self.place(run, &state, &metrics, page_top));
                        }
                    }
                }
                "TJ" => {
                    if state.in_text_block {
                        if let Some(Ok(array)) = op.operands.first().map(|o| o.as_array()) {
                            let run = self.show_array(doc, &fonts, &metrics, &mut state, array);
                            texts.extend(self.place(run, &state, &metrics, page_top));
                        }
                    }
                }
                "'" => {
                    state.next_line();
                    if let Some(operand) = op.operands.first() {
                        let run = self.show_string(doc, &fonts, &metrics, &mut state, operand);
                        texts.extend(self.place(run, &state, &metrics, page_top));
                    }
                }
                "\"" => {
                    // aw ac string
                    state.next_line();
                    if let Some(operand) = op.operands.get(2) {
                        let run = self.show_string(doc, &fonts, &metrics, &mut state, operand);
                        texts.extend(self.place(run, &state, &metrics, page_top));
                    }
                }
                _ => {}
            }
        }

        log::debug!("Page {:?}: {} text items", page_id, texts.len());

        Ok(ParsedPage {
            width: (media_box[2] - media_box[0]) / self.points_per_unit,
            height: (media_box[3] - media_box[1]) / self.points_per_unit,
            texts,
        })
    }

    fn show_string(
        &self,
        doc: &Document,
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        metrics: &HashMap<Vec<u8>, FontMetrics>,
        state: &mut TextState,
        operand: &Object,
    ) -> Option<PendingRun> {
        let Object::String(bytes, _) = operand else {
            return None;
        };
        let origin = state.text_matrix;
        let text = decode_string(bytes, doc, fonts.get(&state.font).copied());
        let advance = metrics
            .get(&state.font)
            .map(|m| m.advance(bytes, text.chars().count()))
            .unwrap_or(text.chars().count() as f32 * DEFAULT_GLYPH_ADVANCE);
        state.advance(advance);

        Some(PendingRun {
            text,
            origin,
            advance,
        })
    }

    fn show_array(
        &self,
        doc: &Document,
        fonts: &BTreeMap<Vec<u8>, &Dictionary>,
        metrics: &HashMap<Vec<u8>, FontMetrics>,
        state: &mut TextState,
        array: &[Object],
    ) -> Option<PendingRun> {
        let origin = state.text_matrix;
        let mut combined = String::new();
        let mut total_advance = 0.0f32;

        for element in array {
            match element {
                Object::String(bytes, _) => {
                    let text = decode_string(bytes, doc, fonts.get(&state.font).copied());
                    let advance = metrics
                        .get(&state.font)
                        .map(|m| m.advance(bytes, text.chars().count()))
                        .unwrap_or(text.chars().count() as f32 * DEFAULT_GLYPH_ADVANCE);
                    combined.push_str(&text);
                    state.advance(advance);
                    total_advance += advance;
                }
                other => {
                    if let Some(adjust) = get_number(other) {
                        if adjust < -TJ_SPACE_THRESHOLD && !combined.ends_with(' ') {
                            combined.push(' ');
                        }
                        state.advance(-adjust);
                        total_advance -= adjust;
                    }
                }
            }
        }

        if combined.is_empty() {
            return None;
        }
        Some(PendingRun {
            text: combined,
            origin,
            advance: total_advance,
        })
    }

    /// Convert a shown string into a page-unit text item
    fn place(
        &self,
        run: Option<PendingRun>,
        state: &TextState,
        metrics: &HashMap<Vec<u8>, FontMetrics>,
        page_top: f32,
    ) -> Option<ParsedText> {
        let run = run?;
        if run.text.trim().is_empty() {
            return None;
        }

        let combined = multiply_matrices(&run.origin, &state.ctm);
        let rendered_size = effective_font_size(state.font_size, &combined);
        let scale_x = (combined[0].powi(2) + combined[1].powi(2)).sqrt();
        let width_pt = (run.advance / 1000.0 * state.font_size * scale_x).max(0.0);

        let font = metrics.get(&state.font);
        let text_style = [
            font.map(|f| f.face_id as f32).unwrap_or(0.0),
            rendered_size,
            if font.is_some_and(|f| f.bold) { 1.0 } else { 0.0 },
            if font.is_some_and(|f| f.italic) { 1.0 } else { 0.0 },
        ];

        Some(ParsedText {
            x: combined[4] / self.points_per_unit,
            y: (page_top - combined[5]) / self.points_per_unit,
            w: width_pt / self.points_per_unit,
            runs: vec![GlyphRun {
                text: urlencoding::encode(&run.text).into_owned(),
                style_index: -1,
                text_style,
            }],
        })
    }
}

fn read_matrix(operands: &[Object]) -> [f32; 6] {
    [
        get_number(&operands[0]).unwrap_or(1.0),
        get_number(&operands[1]).unwrap_or(0.0),
        get_number(&operands[2]).unwrap_or(0.0),
        get_number(&operands[3]).unwrap_or(1.0),
        get_number(&operands[4]).unwrap_or(0.0),
        get_number(&operands[5]).unwrap_or(0.0),
    ]
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Compute effective font size from base size and a text-to-user matrix
fn effective_font_size(base_size: f32, matrix: &[f32; 6]) -> f32 {
    let scale_x = (matrix[0].powi(2) + matrix[1].powi(2)).sqrt();
    let scale_y = (matrix[2].powi(2) + matrix[3].powi(2)).sqrt();
    base_size * scale_x.max(scale_y)
}

/// Resolve an object that may be an indirect reference to an array
fn resolve_array<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Vec<Object>> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok(),
        other => other.as_array().ok(),
    }
}

/// Find the page's MediaBox, following inherited values up the page tree
fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound guards against cyclic Parent links
    for _ in 0..32 {
        if let Ok(obj) = dict.get(b"MediaBox") {
            let values: Vec<f32> = resolve_array(doc, obj)?.iter().filter_map(get_number).collect();
            return match values.as_slice() {
                [x0, y0, x1, y1] if x1 > x0 && y1 > y0 => Some([*x0, *y0, *x1, *y1]),
                _ => None,
            };
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn font_metrics(
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
) -> HashMap<Vec<u8>, FontMetrics> {
    fonts
        .iter()
        .enumerate()
        .map(|(face_id, (name, dict))| {
            let base_font = dict
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string())
                .unwrap_or_default();
            let first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(|o| o.as_i64().ok())
                .unwrap_or(0);
            let widths = dict
                .get(b"Widths")
                .ok()
                .and_then(|o| resolve_array(doc, o))
                .map(|arr| {
                    arr.iter()
                        .map(|w| get_number(w).unwrap_or(DEFAULT_GLYPH_ADVANCE))
                        .collect()
                })
                .unwrap_or_default();

            let metrics = FontMetrics {
                face_id,
                bold: is_bold_font(&base_font),
                italic: is_italic_font(&base_font),
                first_char,
                widths,
            };
            (name.clone(), metrics)
        })
        .collect()
}

/// Decode a string operand using the font encoding, with UTF-16BE and Latin-1 fallbacks
fn decode_string(bytes: &[u8], doc: &Document, font_dict: Option<&Dictionary>) -> String {
    if let Some(font_dict) = font_dict {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    bytes.iter().map(|&b| b as char).collect()
}
