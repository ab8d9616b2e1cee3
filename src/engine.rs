// src/engine.rs
//
// One comparison job: load the documents, extract the records, pick the PO
// that belongs to the WO and assemble the result.

use crate::compare::{
    self, AddressResult, FieldComparison, ProductCodeRow, SoColorRow, VsbaParity,
};
use crate::config::Config;
use crate::error::EngineError;
use crate::heuristics;
use crate::line_items;
use crate::matcher::{self, MatchOptions, MatchOutcome};
use crate::model::{
    PurchaseOrderRecord, SpreadsheetRecord, WorkOrderRecord, aggregate_items, total_quantity,
};
use crate::normalize;
use crate::pdf_extract::{LopdfReader, Page, PdfReader};
use crate::spreadsheet::{self, CalamineReader, WorkbookReader};
use crate::verdict::{self, VerdictInputs, VerdictReport};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Instrument, debug, info, info_span, warn};

/// Where a document's bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Bytes { name: String, data: Vec<u8> },
    Path(PathBuf),
}

impl DocumentSource {
    pub fn name(&self) -> String {
        match self {
            DocumentSource::Bytes { name, .. } => name.clone(),
            DocumentSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }

    async fn load(&self) -> Result<(String, Vec<u8>), EngineError> {
        let name = self.name();
        match self {
            DocumentSource::Bytes { data, .. } => Ok((name, data.clone())),
            DocumentSource::Path(path) => {
                let data = tokio::fs::read(path)
                    .await
                    .map_err(|e| EngineError::unreadable(&name, e.to_string()))?;
                Ok((name, data))
            }
        }
    }
}

/// One WO, the candidate POs, and any price-ticket workbooks.
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub work_order: DocumentSource,
    pub purchase_orders: Vec<DocumentSource>,
    pub spreadsheets: Vec<DocumentSource>,
}

/// Cooperative cancellation, checked between pages, sheets and documents.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Picks the email cover page out of a PO document's pages.
pub trait CoverPage: Send + Sync {
    fn cover_text(&self, pages: &[Page]) -> String;
}

/// POs are merged behind their email, so the cover is the first page.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstPageCover;

impl CoverPage for FirstPageCover {
    fn cover_text(&self, pages: &[Page]) -> String {
        pages.first().map(|p| p.text.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    /// SHA-256 over the WO bytes and the selected PO bytes.
    pub job_id: String,
    pub work_order: WorkOrderRecord,
    pub purchase_order: PurchaseOrderRecord,
    pub spreadsheets: Vec<SpreadsheetRecord>,
    pub fields: Vec<FieldComparison>,
    pub items: MatchOutcome,
    /// WO items against each non-empty sheet.
    pub spreadsheet_items: Vec<MatchOutcome>,
    pub product_codes: Vec<ProductCodeRow>,
    pub so_colors: Vec<SoColorRow>,
    pub address: AddressResult,
    pub vsba: VsbaParity,
    pub verdict: VerdictReport,
}

pub struct Engine {
    pdf: Box<dyn PdfReader>,
    workbook: Box<dyn WorkbookReader>,
    cover: Box<dyn CoverPage>,
    config: Config,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            pdf: Box::new(LopdfReader),
            workbook: Box::new(CalamineReader),
            cover: Box::new(FirstPageCover),
            config,
        }
    }

    pub fn with_pdf_reader(mut self, reader: impl PdfReader + 'static) -> Self {
        self.pdf = Box::new(reader);
        self
    }

    pub fn with_workbook_reader(mut self, reader: impl WorkbookReader + 'static) -> Self {
        self.workbook = Box::new(reader);
        self
    }

    pub fn with_cover_page(mut self, cover: impl CoverPage + 'static) -> Self {
        self.cover = Box::new(cover);
        self
    }

    /// Run one comparison job end to end.
    pub async fn run(
        &self,
        request: ComparisonRequest,
        cancel: &CancelToken,
    ) -> Result<ComparisonResult, EngineError> {
        let span = info_span!("comparison", work_order = %request.work_order.name());
        self.run_inner(request, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        request: ComparisonRequest,
        cancel: &CancelToken,
    ) -> Result<ComparisonResult, EngineError> {
        let (wo_name, wo_bytes) = request.work_order.load().await?;
        let wo = self.read_work_order(&wo_name, &wo_bytes, cancel)?;
        cancel.check()?;

        let mut po_bytes = Vec::with_capacity(request.purchase_orders.len());
        let mut pos = Vec::with_capacity(request.purchase_orders.len());
        for source in &request.purchase_orders {
            let (name, bytes) = source.load().await?;
            pos.push(self.read_purchase_order(&name, &bytes, cancel)?);
            po_bytes.push(bytes);
        }
        let index = select_purchase_order(&wo.po_number, &pos)?;

        let mut sheets = Vec::new();
        for source in &request.spreadsheets {
            let (name, bytes) = source.load().await?;
            sheets.extend(spreadsheet::read_workbook(
                self.workbook.as_ref(),
                &name,
                &bytes,
                &self.config.spreadsheet,
                cancel,
            )?);
        }
        cancel.check()?;

        let po = pos.swap_remove(index);
        let mut result = compare(wo, po, sheets, &self.config);
        result.job_id = job_id(&wo_bytes, &po_bytes[index]);
        info!(
            job_id = %result.job_id,
            verdict = ?result.verdict.verdict,
            reasons = result.verdict.reasons.len(),
            "Comparison finished"
        );
        Ok(result)
    }

    pub fn read_work_order(
        &self,
        name: &str,
        bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<WorkOrderRecord, EngineError> {
        let span = info_span!("pdf", kind = "work_order", filename = %name);
        let _enter = span.enter();
        let pages = read_pages(self.pdf.as_ref(), name, bytes, cancel)?;
        Ok(work_order_from_pages(&pages))
    }

    pub fn read_purchase_order(
        &self,
        name: &str,
        bytes: &[u8],
        cancel: &CancelToken,
    ) -> Result<PurchaseOrderRecord, EngineError> {
        let span = info_span!("pdf", kind = "purchase_order", filename = %name);
        let _enter = span.enter();
        let pages = read_pages(self.pdf.as_ref(), name, bytes, cancel)?;
        let cover = self.cover.cover_text(&pages);
        Ok(purchase_order_from_pages(&pages, &cover))
    }
}

/// Read every page; the document handle is released when this returns.
fn read_pages(
    reader: &dyn PdfReader,
    name: &str,
    bytes: &[u8],
    cancel: &CancelToken,
) -> Result<Vec<Page>, EngineError> {
    let doc = reader.open(name, bytes)?;
    let mut pages = Vec::with_capacity(doc.page_count());
    for index in 0..doc.page_count() {
        cancel.check()?;
        let page = doc.read_page(index);
        if page.is_empty() {
            debug!(page = index + 1, "Empty page");
        }
        pages.push(page);
    }
    if pages.iter().all(Page::is_empty) {
        return Err(EngineError::unreadable(name, "no extractable text or tables"));
    }
    Ok(pages)
}

fn page_text(pages: &[Page]) -> String {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn work_order_from_pages(pages: &[Page]) -> WorkOrderRecord {
    let text = page_text(pages);
    let mut wo = heuristics::extract_work_order_fields(&text);
    wo.items = line_items::extract_work_order_items(pages);
    if wo.quantity_total.is_empty() {
        wo.quantity_total = normalize::quantity_text(total_quantity(&wo.items));
    }
    let (filled, total) = wo.coverage();
    info!(filled, total, items = wo.items.len(), po_number = %wo.po_number, "Work order read");
    wo
}

pub fn purchase_order_from_pages(pages: &[Page], cover: &str) -> PurchaseOrderRecord {
    let text = page_text(pages);
    let mut po = heuristics::extract_purchase_order_fields(&text, cover);
    let extracted = line_items::extract_purchase_order_items(&text, cover, &po.product_code_used);
    po.items = extracted.items;
    po.product_codes_from_item_column = extracted.hang_codes;
    if po.total_quantity.is_empty() {
        po.total_quantity = normalize::quantity_text(total_quantity(&po.items));
    }
    let (filled, total) = po.coverage();
    info!(filled, total, items = po.items.len(), po_number = %po.po_number, "Purchase order read");
    po
}

/// Index of the PO belonging to the WO: exact number, then a number named in
/// the email subject, then containment either way.
pub fn select_purchase_order(
    wo_po_number: &str,
    candidates: &[PurchaseOrderRecord],
) -> Result<usize, EngineError> {
    let target = normalize::po_number(wo_po_number);
    let not_found = || EngineError::NoMatchingPo {
        po_number: wo_po_number.to_string(),
    };
    if target.is_empty() {
        return Err(not_found());
    }
    let numbers: Vec<String> = candidates
        .iter()
        .map(|po| normalize::po_number(&po.po_number))
        .collect();

    let exact = numbers.iter().position(|n| *n == target);
    let by_subject = || {
        candidates
            .iter()
            .position(|po| po.email_subject_pos.contains(&target))
    };
    let by_substring = || {
        numbers
            .iter()
            .position(|n| !n.is_empty() && (n.contains(&target) || target.contains(n.as_str())))
    };

    match exact.or_else(by_subject).or_else(by_substring) {
        Some(index) => {
            debug!(index, po_number = %target, "Purchase order selected");
            Ok(index)
        }
        None => {
            warn!(po_number = %target, candidates = candidates.len(), "No purchase order matches");
            Err(not_found())
        }
    }
}

/// Compare extracted records. Pure; `job_id` is left empty.
pub fn compare(
    wo: WorkOrderRecord,
    po: PurchaseOrderRecord,
    spreadsheets: Vec<SpreadsheetRecord>,
    config: &Config,
) -> ComparisonResult {
    let backfill_style = spreadsheets
        .iter()
        .flat_map(|s| &s.rows)
        .map(|r| r.style.clone())
        .find(|s| !s.is_empty());

    let items = matcher::match_items(
        &wo.items,
        &po.items,
        &MatchOptions {
            quantity_tolerance: config.matching.quantity_tolerance,
            backfill_style,
        },
    );

    let sheet_options = MatchOptions {
        quantity_tolerance: config.matching.quantity_tolerance,
        backfill_style: None,
    };
    let spreadsheet_items: Vec<MatchOutcome> = spreadsheets
        .iter()
        .filter(|s| !s.rows.is_empty())
        .map(|s| {
            let rows = aggregate_items(s.rows.iter().map(|r| r.to_line_item()).collect());
            matcher::match_items(&wo.items, &rows, &sheet_options)
        })
        .collect();

    let address = compare::compare_address(&wo, &po, config.matching.address_threshold);
    let fields = compare::compare_fields(&wo, &po, &address);
    let product_codes = compare::product_code_table(&wo, &po);
    let so_colors = compare::so_color_table(&wo);
    let vsba = VsbaParity::of(&wo, &po);

    let verdict = verdict::evaluate(&VerdictInputs {
        address: &address,
        product_codes: &product_codes,
        items: &items,
        spreadsheets: &spreadsheet_items,
        so_colors: &so_colors,
        vsba,
    });

    ComparisonResult {
        job_id: String::new(),
        work_order: wo,
        purchase_order: po,
        spreadsheets,
        fields,
        items,
        spreadsheet_items,
        product_codes,
        so_colors,
        address,
        vsba,
        verdict,
    }
}

fn job_id(wo_bytes: &[u8], po_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(wo_bytes);
    hasher.update(po_bytes);
    format!("{:x}", hasher.finalize())
}
