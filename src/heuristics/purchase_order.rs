// src/heuristics/purchase_order.rs
//
// Labeled scalar fields and code-bearing regions of a Purchase Order.

use super::{FieldRule, clean, find_ci, push_unique, truncate_after};
use crate::model::{PurchaseOrderRecord, VsbaSource};
use crate::normalize;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

const PO_LABELS: &[&str] = &[
    "Supplier",
    "Vendor",
    "Customer",
    "Buyer",
    "Delivery Location",
    "Delivery Date",
    "Ship Date",
    "Season",
    "Forwarder",
    "Total",
    "Payment Terms",
    "Incoterm",
    "PO Number",
    "P.O. Number",
    "PO No",
    "PO #",
    "Purchase Order",
];

/// Lines that end a `Delivery Location` or address block.
const BLOCK_TERMINATORS: &[&str] = &["Forwarder", "Delivery Date", "Payment Terms", "Incoterm"];

lazy_static! {
    static ref PO_NUMBER: FieldRule = FieldRule::new(
        &[
            r"(?i)Purchase\s+Order\s+(?:Number|No\.?)\s*:?\s*#?\s*([A-Z]{0,4}-?\d[\d\-]*)",
            r"(?i)\bP\.?\s?O\.?\s*(?:Number|No\.?|#)\s*:?\s*#?\s*([A-Z]{0,4}-?\d[\d\-]*)",
        ],
        &[],
    );
    static ref SUPPLIER: FieldRule = FieldRule::new(
        &[r"(?i)\b(?:Supplier|Vendor)(?:\s+Name)?\s*:[ \t]*([^\n]+)"],
        PO_LABELS,
    );
    static ref CUSTOMER: FieldRule = FieldRule::new(
        &[r"(?i)\b(?:Customer|Buyer)(?:\s+Name)?\s*:[ \t]*([^\n]+)"],
        PO_LABELS,
    );
    static ref DELIVERY_DATE: FieldRule = FieldRule::new(
        &[
            r"(?i)Delivery\s+Date\s*:?[ \t]*([^\n]+)",
            r"(?i)(?:Ship|Need\s+By)\s+Date\s*:?[ \t]*([^\n]+)",
        ],
        PO_LABELS,
    );
    static ref SEASON: FieldRule = FieldRule::new(&[r"(?i)\bSeason\s*:?[ \t]*([^\n]+)"], PO_LABELS);
    static ref TOTAL_QUANTITY: FieldRule = FieldRule::new(
        &[
            r"(?i)Total\s+(?:Order\s+)?(?:Quantity|Qty)\s*:?\s*([\d,]+(?:\.\d+)?)",
            r"(?i)\bTotal\s*:?\s*([\d,]+\.\d+)\s*PCS",
        ],
        &[],
    );
    static ref SEVEN_EIGHT_DIGITS: Regex = Regex::new(r"\b(\d{7,8})\b").unwrap();
    static ref SUBJECT_LINE: Regex = Regex::new(r"(?im)^\s*Subject\s*:(.*)$").unwrap();
    static ref COLUMN_GAP: Regex = Regex::new(r"\s{2,}|\t").unwrap();
    static ref DELIVERY_LOCATION: Regex = Regex::new(r"(?i)Delivery\s+Location\s*:?").unwrap();
    static ref ADDRESS_LABEL: Regex =
        Regex::new(r"(?i)(?:Ship\s+To|Delivery)\s+Address\s*:?").unwrap();
    static ref LB_CODE: Regex = Regex::new(r"(?:^|[^A-Za-z])LB\s*(\d{4,})").unwrap();
    static ref SUP_REF: Regex = Regex::new(r"(?i)Sup\.\s*Ref\.\s*:?\s*([A-Za-z0-9\-]+)").unwrap();
    static ref TAG_PRC: Regex = Regex::new(r"TAG\.PRC\.TKT_([A-Za-z0-9\-]+?)_REG").unwrap();
    static ref TAG_HANG: Regex = Regex::new(r"TAG\.HANG_([A-Za-z0-9\-]+?)_TAGPRCTKT").unwrap();
    static ref COLOR_TOKEN: Regex =
        Regex::new(r"(?:^|[^A-Za-z0-9])(C/?\d{1,4})(?:[^A-Za-z0-9]|$)").unwrap();
}

/// Extract the labeled scalars and code regions of a Purchase Order.
///
/// `cover` is the email cover page (the first page when the PO was merged
/// with its email); `text` is the concatenated text of all pages.
pub fn extract_purchase_order_fields(text: &str, cover: &str) -> PurchaseOrderRecord {
    let delivery_location = delivery_location(text);
    let address = match block_after(text, &ADDRESS_LABEL) {
        Some(block) if !block.is_empty() => block,
        _ => delivery_location.clone(),
    };

    let record = PurchaseOrderRecord {
        po_number: po_number(text, cover),
        supplier: SUPPLIER.extract(text),
        customer: CUSTOMER.extract(text),
        delivery_location,
        address,
        delivery_date: DELIVERY_DATE.extract(text),
        season: SEASON.extract(text),
        total_quantity: TOTAL_QUANTITY.extract(text),
        color_code: color_code(text),
        product_code_used: product_code_used(text),
        product_codes: product_codes(text),
        items: Vec::new(),
        email_subject_pos: email_subject_pos(cover),
        product_codes_from_item_column: Vec::new(),
        vsba_sources: vsba_sources(text),
        full_text: text.to_string(),
    };

    let (filled, total) = record.coverage();
    debug!(filled, total, codes = record.product_codes.len(), "Purchase order fields extracted");
    record
}

/// Labeled number, else a 7-8 digit token in the right-hand column of the
/// cover page, else any 7-8 digit token.
fn po_number(text: &str, cover: &str) -> String {
    let labeled = PO_NUMBER.extract(text);
    if !labeled.is_empty() {
        return labeled;
    }
    for line in cover.lines() {
        let columns: Vec<&str> = COLUMN_GAP
            .split(line.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if columns.len() < 2 {
            continue;
        }
        if let Some(m) = columns.last().and_then(|c| SEVEN_EIGHT_DIGITS.find(c)) {
            return m.as_str().to_string();
        }
    }
    SEVEN_EIGHT_DIGITS
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// PO numbers mentioned on `Subject:` lines, normalized.
fn email_subject_pos(cover: &str) -> Vec<String> {
    let mut pos = Vec::new();
    for caps in SUBJECT_LINE.captures_iter(cover) {
        for m in SEVEN_EIGHT_DIGITS.find_iter(&caps[1]) {
            push_unique(&mut pos, normalize::po_number(m.as_str()));
        }
    }
    pos
}

/// Lines following a label until a terminator line or two consecutive
/// blank lines. The rest of the label line is included.
fn block_after(text: &str, label: &Regex) -> Option<String> {
    let m = label.find(text)?;
    let mut parts = Vec::new();
    let mut blanks = 0;
    for (i, line) in text[m.end()..].lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            // nothing after the label on its own line
            if i == 0 {
                continue;
            }
            blanks += 1;
            if blanks >= 2 {
                break;
            }
            continue;
        }
        blanks = 0;
        if BLOCK_TERMINATORS.iter().any(|t| find_ci(trimmed, t).is_some()) {
            break;
        }
        parts.push(trimmed);
    }
    Some(clean(&parts.join(" ")))
}

/// Fallback block: first line mentioning a plot or building, plus following
/// lines up to a blank line or terminator.
fn plot_block(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some(start) = lines.iter().position(|l| {
        let lower = l.to_ascii_lowercase();
        lower.contains("plot") || lower.contains("building")
    }) else {
        return String::new();
    };
    let mut parts = Vec::new();
    for line in &lines[start..] {
        let trimmed = line.trim();
        if trimmed.is_empty() || BLOCK_TERMINATORS.iter().any(|t| find_ci(trimmed, t).is_some()) {
            break;
        }
        parts.push(trimmed);
    }
    clean(&parts.join(" "))
}

fn delivery_location(text: &str) -> String {
    let block = match block_after(text, &DELIVERY_LOCATION) {
        Some(block) if !block.is_empty() => block,
        _ => plot_block(text),
    };
    truncate_after(&block, "Sri Lanka", 1)
        .or_else(|| truncate_after(&block, "India", 2))
        .unwrap_or(block)
}

/// Union of every code pattern, in first-seen order.
fn product_codes(text: &str) -> Vec<String> {
    let mut codes = Vec::new();
    for caps in LB_CODE.captures_iter(text) {
        push_unique(&mut codes, format!("LB{}", &caps[1]));
    }
    for re in [&*SUP_REF, &*TAG_PRC, &*TAG_HANG] {
        for caps in re.captures_iter(text) {
            push_unique(&mut codes, caps[1].to_uppercase());
        }
    }
    codes
}

/// `Sup. Ref.` value, else the price-ticket code, with hyphens removed.
fn product_code_used(text: &str) -> String {
    SUP_REF
        .captures(text)
        .or_else(|| TAG_PRC.captures(text))
        .map(|c| c[1].replace('-', "").to_uppercase())
        .unwrap_or_default()
}

/// Every line that carries a product code, tagged with the pattern that found it.
fn vsba_sources(text: &str) -> Vec<VsbaSource> {
    let patterns: [(&str, &Regex); 4] = [
        ("LB code", &LB_CODE),
        ("Sup. Ref.", &SUP_REF),
        ("TAG.PRC.TKT", &TAG_PRC),
        ("TAG.HANG", &TAG_HANG),
    ];
    let mut sources = Vec::new();
    for line in text.lines() {
        for (label, re) in &patterns {
            if re.is_match(line) {
                sources.push(VsbaSource {
                    source: label.to_string(),
                    line: clean(line),
                    has_vsba: line.to_uppercase().contains("VSBA"),
                });
            }
        }
    }
    sources
}

/// The first `C<digits>` token following a code on a code-bearing line.
fn color_code(text: &str) -> String {
    for line in text.lines() {
        let start = [&*SUP_REF, &*TAG_PRC, &*LB_CODE]
            .iter()
            .filter_map(|re| re.find(line))
            .map(|m| m.end())
            .min();
        let Some(start) = start else { continue };
        if let Some(caps) = COLOR_TOKEN.captures(&line[start..]) {
            return caps[1].to_uppercase();
        }
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COVER: &str = "\
From: orders@example.com
Subject: PO 1234567 / 7654321 price tickets
Extracted Style Numbers: 11276771
";

    const BODY: &str = "\
PURCHASE ORDER
Supplier: Brandix Apparel Ltd      PO Number: 1234567
Customer: Victoria's Secret
Season: FA25
Delivery Date: 2025-09-30
Delivery Location:
Brandix Apparel Ltd
Plot 12, Building 4
Colombo Sri Lanka Tel 0112


Forwarder: Expeditors
Sup. Ref.: LB0123456-C1 VSBA
1 TAG.PRC.TKT_LB0123456_REG 100.0000 PCS
Total Quantity: 300
";

    #[test]
    fn labeled_fields() {
        let po = extract_purchase_order_fields(BODY, COVER);
        assert_eq!(po.po_number, "1234567");
        assert_eq!(po.supplier, "Brandix Apparel Ltd");
        assert_eq!(po.customer, "Victoria's Secret");
        assert_eq!(po.season, "FA25");
        assert_eq!(po.delivery_date, "2025-09-30");
        assert_eq!(po.total_quantity, "300");
    }

    #[test]
    fn delivery_location_block() {
        let po = extract_purchase_order_fields(BODY, COVER);
        assert_eq!(
            po.delivery_location,
            "Brandix Apparel Ltd Plot 12, Building 4 Colombo Sri Lanka"
        );
        assert_eq!(po.address, po.delivery_location);
    }

    #[test]
    fn single_blank_line_after_label() {
        let text = "Delivery Location:\n\nBrandix Apparel Ltd\nColombo Sri Lanka\n\n\nForwarder: X";
        assert_eq!(delivery_location(text), "Brandix Apparel Ltd Colombo Sri Lanka");
        let inline = "Delivery Location: Brandix Apparel Ltd\n\nColombo Sri Lanka\n";
        assert_eq!(delivery_location(inline), "Brandix Apparel Ltd Colombo Sri Lanka");
    }

    #[test]
    fn plot_fallback_and_second_india() {
        let text = "Delivery Location:\n\n\nAcme Knits\nPlot 7 Sector 2\nPune India Office India HQ\n";
        assert_eq!(delivery_location(text), "Plot 7 Sector 2 Pune India Office India");
    }

    #[test]
    fn codes_and_vsba() {
        let po = extract_purchase_order_fields(BODY, COVER);
        assert_eq!(
            po.product_codes,
            vec!["LB0123456".to_string(), "LB0123456-C1".to_string()]
        );
        assert_eq!(po.product_code_used, "LB0123456C1");
        assert_eq!(po.color_code, "C1");
        assert!(po.has_vsba());
        let labels: Vec<&str> = po.vsba_sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(labels, vec!["LB code", "Sup. Ref.", "LB code", "TAG.PRC.TKT"]);
    }

    #[test]
    fn subject_po_numbers() {
        let po = extract_purchase_order_fields(BODY, COVER);
        assert_eq!(
            po.email_subject_pos,
            vec!["1234567".to_string(), "7654321".to_string()]
        );
    }

    #[test]
    fn po_number_fallbacks() {
        let cover = "Victoria's Secret Direct      Order 88776655\n";
        assert_eq!(po_number("no label here", cover), "88776655");
        assert_eq!(po_number("ref 1234567 ok", "single column 7654321"), "1234567");
        assert_eq!(po_number("P.O. Number: 2345678", ""), "2345678");
        assert_eq!(po_number("nothing", "nothing"), "");
    }
}
