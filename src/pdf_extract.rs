// src/pdf_extract.rs

use crate::error::EngineError;
use crate::tables::{self, PageLayout, Segment, Table, TextRun};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};
use std::cell::OnceCell;
use tracing::{debug, info, warn};

/// One page of a document: its text (newlines preserved) and its tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
    pub tables: Vec<Table>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.tables.is_empty()
    }
}

/// Opens PDF bytes into a page-addressable document.
pub trait PdfReader: Send + Sync {
    fn open(&self, name: &str, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, EngineError>;
}

/// An opened document. Dropping it releases the parsed object tree.
pub trait PdfDocument {
    fn page_count(&self) -> usize;
    /// Read a page by 0-based index. Pages that cannot be decoded come back
    /// empty rather than failing the document.
    fn read_page(&self, index: usize) -> Page;
}

/// If this share of pages carries images but no fonts, the PDF is a scan.
const SCANNED_RATIO: f64 = 0.8;

/// lopdf-backed reader with a pdf-extract text fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfReader;

impl PdfReader for LopdfReader {
    fn open(&self, name: &str, bytes: &[u8]) -> Result<Box<dyn PdfDocument>, EngineError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| EngineError::unreadable(name, format!("failed to parse PDF: {e}")))?;

        if looks_like_scanned(&doc) {
            info!(name = %name, "PDF structural check: likely scanned / image-only");
            return Err(EngineError::unreadable(
                name,
                "image-only PDF, no extractable text",
            ));
        }

        let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        info!(name = %name, pages = pages.len(), "Opened PDF");
        Ok(Box::new(LopdfDocument {
            doc,
            pages,
            bytes: bytes.to_vec(),
            fallback: OnceCell::new(),
        }))
    }
}

struct LopdfDocument {
    doc: Document,
    pages: Vec<(u32, ObjectId)>,
    bytes: Vec<u8>,
    /// Whole-document text from pdf-extract, split on form feeds.
    fallback: OnceCell<Vec<String>>,
}

impl LopdfDocument {
    fn fallback_text(&self, index: usize) -> String {
        let pages = self.fallback.get_or_init(|| {
            match ::pdf_extract::extract_text_from_mem(&self.bytes) {
                Ok(text) => text.split('\u{c}').map(str::to_string).collect(),
                Err(e) => {
                    warn!(error = %e, "pdf-extract failed, document may be scanned or corrupted");
                    Vec::new()
                }
            }
        });
        if pages.len() <= 1 {
            // No page breaks in the fallback text: attribute it to the first page.
            return if index == 0 {
                pages.first().cloned().unwrap_or_default()
            } else {
                String::new()
            };
        }
        pages.get(index).cloned().unwrap_or_default()
    }

    fn layout(&self, number: u32, id: ObjectId) -> PageLayout {
        let content = match self.doc.get_page_content(id) {
            Ok(c) => c,
            Err(e) => {
                debug!(page = number, error = %e, "Page content unavailable");
                return PageLayout::default();
            }
        };
        match Content::decode(&content) {
            Ok(content) => interpret(&content.operations),
            Err(e) => {
                debug!(page = number, error = %e, "Invalid content stream");
                PageLayout::default()
            }
        }
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn read_page(&self, index: usize) -> Page {
        let Some(&(number, id)) = self.pages.get(index) else {
            return Page::default();
        };

        let layout = self.layout(number, id);

        let mut text = self.doc.extract_text(&[number]).unwrap_or_default();
        if text.trim().is_empty() {
            text = layout_text(&layout);
        }
        if text.trim().is_empty() {
            text = self.fallback_text(index);
        }

        let mut tables = tables::find_ruled_tables(&layout);
        if tables.is_empty() {
            tables = tables::find_text_tables(&layout);
        }

        debug!(
            page = number,
            chars = text.len(),
            runs = layout.runs.len(),
            segments = layout.segments.len(),
            tables = tables.len(),
            "Read page"
        );
        Page {
            number,
            text,
            tables,
        }
    }
}

/// Heuristic: inspect the PDF object tree for signs that every page
/// is just a single image with no text operators.
///
/// We look at each page's `Resources` dictionary. If a page has
/// XObject images but **no** Font resources, it's almost certainly
/// a scanned page.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only_pages = 0;

    for object_id in pages.values() {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Ok(page_dict) = page_obj.as_dict() else {
            continue;
        };

        let resources = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_entries = |key: &[u8]| {
            resources
                .and_then(|res| res.get(key).ok())
                .and_then(|f| doc.dereference(f).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
                .is_some_and(|d| !d.is_empty())
        };

        if has_entries(b"XObject") && !has_entries(b"Font") {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    ratio >= SCANNED_RATIO
}

// ---------------------------------------------------------------------------
// Content stream interpretation
// ---------------------------------------------------------------------------

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `a` applied first, then `b`.
fn concat(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn apply(m: &Matrix, x: f64, y: f64) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn translate(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn num(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn nums<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = num(obj)?;
    }
    Some(out)
}

/// Best-effort decoding of a string operand: UTF-16BE with BOM, else Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .map(|&b| b as char)
        .filter(|c| !c.is_control())
        .collect()
}

#[derive(Default)]
struct Interpreter {
    ctm: Matrix,
    stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    leading: f64,
    font_size: f64,
    path: Vec<Segment>,
    current: Option<(f64, f64)>,
    subpath_start: Option<(f64, f64)>,
    layout: PageLayout,
}

/// Walk content-stream operators, collecting positioned text runs and
/// painted straight-line segments in user space.
pub fn interpret(operations: &[Operation]) -> PageLayout {
    let mut it = Interpreter {
        ctm: IDENTITY,
        tm: IDENTITY,
        tlm: IDENTITY,
        font_size: 10.0,
        ..Interpreter::default()
    };
    for op in operations {
        it.step(op);
    }
    it.layout
}

impl Interpreter {
    fn step(&mut self, op: &Operation) {
        let ops = &op.operands;
        match op.operator.as_str() {
            "q" => self.stack.push(self.ctm),
            "Q" => self.ctm = self.stack.pop().unwrap_or(IDENTITY),
            "cm" => {
                if let Some(m) = nums::<6>(ops) {
                    self.ctm = concat(&m, &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
            }
            "Tf" => {
                if let Some(size) = ops.get(1).and_then(num) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some([l]) = nums::<1>(ops) {
                    self.leading = l;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = nums::<2>(ops) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = nums::<2>(ops) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = nums::<6>(ops) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.move_line(0.0, -self.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = ops.first() {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "'" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = ops.first() {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "\"" => {
                self.move_line(0.0, -self.leading);
                if let Some(Object::String(bytes, _)) = ops.get(2) {
                    self.show(decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = ops.first() {
                    let mut text = String::new();
                    for part in parts {
                        match part {
                            Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                            other => {
                                // Large negative kerning is a visual word gap.
                                if num(other).is_some_and(|k| k < -200.0) {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                    self.show(text);
                }
            }
            "m" => {
                if let Some([x, y]) = nums::<2>(ops) {
                    let p = apply(&self.ctm, x, y);
                    self.current = Some(p);
                    self.subpath_start = Some(p);
                }
            }
            "l" => {
                if let Some([x, y]) = nums::<2>(ops) {
                    let p = apply(&self.ctm, x, y);
                    if let Some(from) = self.current {
                        self.push_segment(from, p);
                    }
                    self.current = Some(p);
                }
            }
            "h" => {
                if let (Some(from), Some(to)) = (self.current, self.subpath_start) {
                    self.push_segment(from, to);
                    self.current = Some(to);
                }
            }
            "re" => {
                if let Some([x, y, w, h]) = nums::<4>(ops) {
                    let corners = [
                        apply(&self.ctm, x, y),
                        apply(&self.ctm, x + w, y),
                        apply(&self.ctm, x + w, y + h),
                        apply(&self.ctm, x, y + h),
                    ];
                    for i in 0..4 {
                        self.push_segment(corners[i], corners[(i + 1) % 4]);
                    }
                    self.current = Some(corners[0]);
                    self.subpath_start = Some(corners[0]);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                self.layout.segments.append(&mut self.path);
                self.current = None;
            }
            "n" => {
                self.path.clear();
                self.current = None;
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.tlm = concat(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
    }

    fn push_segment(&mut self, from: (f64, f64), to: (f64, f64)) {
        self.path.push(Segment {
            x1: from.0,
            y1: from.1,
            x2: to.0,
            y2: to.1,
        });
    }

    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let render = concat(&self.tm, &self.ctm);
        let (x, y) = apply(&render, 0.0, 0.0);
        let scale = (render[0] * render[0] + render[1] * render[1]).sqrt();
        // Without font metrics, assume an average glyph of half the em size.
        let advance = text.chars().count() as f64 * self.font_size * 0.5;
        self.layout.runs.push(TextRun {
            x,
            y,
            width: advance * scale,
            text,
        });
        self.tm = concat(&translate(advance, 0.0), &self.tm);
    }
}

/// Page text rebuilt from runs when lopdf's own text extraction is empty.
fn layout_text(layout: &PageLayout) -> String {
    let mut runs: Vec<&TextRun> = layout.runs.iter().collect();
    runs.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
    let mut out = String::new();
    let mut last_y: Option<f64> = None;
    for run in runs {
        match last_y {
            Some(y) if (y - run.y).abs() <= 2.0 => out.push(' '),
            Some(_) => out.push('\n'),
            None => {}
        }
        out.push_str(&run.text);
        last_y = Some(run.y);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;
    use pretty_assertions::assert_eq;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn int(i: i64) -> Object {
        Object::Integer(i)
    }

    fn s(text: &str) -> Object {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    }

    #[test]
    fn test_garbage_bytes() {
        let result = LopdfReader.open("garbage.pdf", b"this is not a pdf");
        assert!(matches!(
            result,
            Err(EngineError::DocumentUnreadable { .. })
        ));
    }

    #[test]
    fn text_positions_follow_td_and_cm() {
        let ops = vec![
            op("cm", vec![int(1), int(0), int(0), int(1), int(10), int(20)]),
            op("BT", vec![]),
            op("Tf", vec![Object::Name(b"F1".to_vec()), int(10)]),
            op("Td", vec![int(100), int(700)]),
            op("Tj", vec![s("Style")]),
            op("Td", vec![int(0), int(-15)]),
            op("TJ", vec![Object::Array(vec![s("Size"), int(-300), s("XS")])]),
            op("ET", vec![]),
        ];
        let layout = interpret(&ops);
        assert_eq!(layout.runs.len(), 2);
        assert_eq!((layout.runs[0].x, layout.runs[0].y), (110.0, 720.0));
        assert_eq!(layout.runs[0].text, "Style");
        assert_eq!((layout.runs[1].x, layout.runs[1].y), (110.0, 705.0));
        assert_eq!(layout.runs[1].text, "Size XS");
    }

    #[test]
    fn rectangles_become_segments_only_when_painted() {
        let ops = vec![
            op("re", vec![int(0), int(0), int(100), int(20)]),
            op("n", vec![]),
            op("re", vec![int(0), int(0), int(100), int(20)]),
            op("S", vec![]),
            op("m", vec![int(0), int(50)]),
            op("l", vec![int(100), int(50)]),
            op("S", vec![]),
        ];
        let layout = interpret(&ops);
        assert_eq!(layout.segments.len(), 5);
        assert_eq!(
            layout.segments[4],
            Segment {
                x1: 0.0,
                y1: 50.0,
                x2: 100.0,
                y2: 50.0
            }
        );
    }

    #[test]
    fn utf16_strings_decode() {
        let bytes = [0xFE, 0xFF, 0x00, b'X', 0x00, b'S'];
        assert_eq!(decode_pdf_string(&bytes), "XS");
        assert_eq!(decode_pdf_string(b"PO#123"), "PO#123");
    }

    #[test]
    fn layout_text_orders_top_down() {
        let layout = PageLayout {
            runs: vec![
                TextRun { x: 50.0, y: 700.0, width: 10.0, text: "B".into() },
                TextRun { x: 10.0, y: 700.0, width: 10.0, text: "A".into() },
                TextRun { x: 10.0, y: 680.0, width: 10.0, text: "C".into() },
            ],
            segments: vec![],
        };
        assert_eq!(layout_text(&layout), "A B\nC");
    }
}
