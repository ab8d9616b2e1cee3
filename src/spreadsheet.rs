// src/spreadsheet.rs
//
// Price-ticket workbooks: every sheet has a fixed header row with a QTY
// column; data rows end at the first blank Style cell.

use crate::config::SpreadsheetConfig;
use crate::engine::CancelToken;
use crate::error::EngineError;
use crate::model::{SpreadsheetRecord, SpreadsheetRow};
use crate::normalize;
use calamine::{Data, Reader, Sheets, open_workbook_auto_from_rs};
use std::io::Cursor;
use tracing::{debug, info, info_span, warn};

/// A sheet as a row-major grid of cell strings, anchored at A1.
pub type Grid = Vec<Vec<String>>;

pub trait WorkbookReader: Send + Sync {
    fn open(&self, name: &str, bytes: &[u8]) -> Result<Box<dyn Workbook>, EngineError>;
}

pub trait Workbook {
    fn sheet_names(&self) -> Vec<String>;
    fn read_sheet(&mut self, sheet: &str) -> Result<Grid, EngineError>;
}

/// calamine-backed reader for xlsx/xls/ods.
#[derive(Debug, Default, Clone, Copy)]
pub struct CalamineReader;

struct CalamineWorkbook {
    name: String,
    sheets: Sheets<Cursor<Vec<u8>>>,
}

impl WorkbookReader for CalamineReader {
    fn open(&self, name: &str, bytes: &[u8]) -> Result<Box<dyn Workbook>, EngineError> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| EngineError::unreadable(name, format!("could not open workbook: {e}")))?;
        Ok(Box::new(CalamineWorkbook {
            name: name.to_string(),
            sheets,
        }))
    }
}

impl Workbook for CalamineWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names().to_vec()
    }

    fn read_sheet(&mut self, sheet: &str) -> Result<Grid, EngineError> {
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|e| EngineError::unreadable(&self.name, format!("sheet {sheet}: {e}")))?;

        // Ranges start at the first used cell; pad back out to A1.
        let (row0, col0) = range.start().unwrap_or((0, 0));
        let mut grid: Grid = vec![Vec::new(); row0 as usize];
        for row in range.rows() {
            let mut cells = vec![String::new(); col0 as usize];
            cells.extend(row.iter().map(cell_text));
            grid.push(cells);
        }
        Ok(grid)
    }
}

/// Render a cell the way it reads in the sheet; integral floats lose `.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Style,
    ColourCode,
    Size,
    Quantity,
    RetailUs,
    RetailCa,
    Sku,
    Article,
}

impl Column {
    /// Case-insensitive substring match on a header label.
    fn from_header(label: &str) -> Option<Self> {
        let l = label.to_lowercase();
        let column = if l.contains("style") {
            Column::Style
        } else if l.contains("colour") || l.contains("color") {
            Column::ColourCode
        } else if l.contains("size") {
            Column::Size
        } else if l.contains("qty") || l.contains("quantity") {
            Column::Quantity
        } else if l.contains("retail") && l.contains("ca") {
            Column::RetailCa
        } else if l.contains("retail") {
            Column::RetailUs
        } else if l.contains("sku") {
            Column::Sku
        } else if l.contains("article") {
            Column::Article
        } else {
            return None;
        };
        Some(column)
    }
}

/// Apply the header/skip/stop rules to one sheet grid.
pub fn parse_sheet(
    grid: &Grid,
    sheet: &str,
    config: &SpreadsheetConfig,
) -> Result<Vec<SpreadsheetRow>, EngineError> {
    let unsupported = |reason: &str| EngineError::SheetLayoutUnsupported {
        sheet: sheet.to_string(),
        reason: reason.to_string(),
    };
    let contains_stop = |row: &[String]| row.iter().any(|c| c.contains(&config.stop_sentence));

    let header_idx = config.header_row.saturating_sub(1);
    let header = grid
        .get(header_idx)
        .ok_or_else(|| unsupported("header row missing"))?;
    if contains_stop(header) {
        debug!(sheet, "Header row is the rounding notice, sheet is empty");
        return Ok(Vec::new());
    }

    let qty_col = header
        .iter()
        .position(|c| c.trim().eq_ignore_ascii_case("qty"))
        .or_else(|| header.iter().position(|c| c.to_lowercase().contains("qty")))
        .ok_or_else(|| unsupported("QTY column not found"))?;

    let mut columns: Vec<(usize, Column)> = Vec::new();
    for (i, label) in header.iter().enumerate().take(qty_col + 1) {
        let label = label.trim();
        if label.is_empty() || label.to_lowercase().starts_with("unnamed") {
            continue;
        }
        if let Some(col) = Column::from_header(label) {
            if !columns.iter().any(|(_, c)| *c == col) {
                columns.push((i, col));
            }
        }
    }
    let find = |col: Column| columns.iter().find(|(_, c)| *c == col).map(|(i, _)| *i);
    let style_col = find(Column::Style).ok_or_else(|| unsupported("Style column not found"))?;

    let always_skip = config.always_skip_row.checked_sub(1);
    let mut rows = Vec::new();
    for (idx, row) in grid.iter().enumerate().skip(header_idx + 1) {
        if Some(idx) == always_skip || contains_stop(row) {
            continue;
        }
        let cell = |col: Column| {
            find(col)
                .and_then(|i| row.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
        };
        let style = row.get(style_col).map(|s| s.trim()).unwrap_or("");
        if style.is_empty() {
            break;
        }
        rows.push(SpreadsheetRow {
            style: normalize::decimal(style),
            color_code: cell(Column::ColourCode).unwrap_or("").to_uppercase(),
            size: cell(Column::Size).map(normalize::size).unwrap_or_default(),
            quantity: cell(Column::Quantity).map(normalize::quantity).unwrap_or_default(),
            retail_us: cell(Column::RetailUs).map(normalize::retail),
            retail_ca: cell(Column::RetailCa).map(normalize::retail),
            sku: cell(Column::Sku).map(normalize::decimal),
            article: cell(Column::Article).map(normalize::decimal),
        });
    }
    Ok(rows)
}

/// Read every sheet of one workbook. Sheets with an unsupported layout come
/// back empty with the reason attached.
pub fn read_workbook(
    reader: &dyn WorkbookReader,
    name: &str,
    bytes: &[u8],
    config: &SpreadsheetConfig,
    cancel: &CancelToken,
) -> Result<Vec<SpreadsheetRecord>, EngineError> {
    let span = info_span!("spreadsheet", filename = %name);
    let _enter = span.enter();

    let mut workbook = reader.open(name, bytes)?;
    let mut records = Vec::new();
    for sheet in workbook.sheet_names() {
        cancel.check()?;
        let grid = workbook.read_sheet(&sheet)?;
        let mut record = SpreadsheetRecord {
            file_name: name.to_string(),
            sheet_name: sheet.clone(),
            ..SpreadsheetRecord::default()
        };
        match parse_sheet(&grid, &sheet, config) {
            Ok(rows) => record.rows = rows,
            Err(EngineError::SheetLayoutUnsupported { reason, .. }) => {
                warn!(sheet = %sheet, reason = %reason, "Unsupported sheet layout, skipping");
                record.layout_error = Some(reason);
            }
            Err(e) => return Err(e),
        }
        info!(sheet = %sheet, rows = record.rows.len(), "Sheet read");
        records.push(record);
    }
    Ok(records)
}
