// src/heuristics/work_order.rs
//
// Labeled scalar fields of a Work Order.

use super::{FieldRule, clean, find_ci, fold_duplicates, push_unique, section, truncate_after};
use crate::model::WorkOrderRecord;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Labels that can follow a value on the same text line.
const WO_LABELS: &[&str] = &[
    "Line Item:",
    "Season:",
    "Factory ID",
    "Silhouette",
    "Date of MFR",
    "Date of Manufacture",
    "Care Instruction",
    "Delivery Date",
    "Ex-Factory Date",
    "Customer:",
    "Garment Component",
    "Product Details",
    "Product Code",
    "Size ID",
    "VS PO Number",
    "Customer Order No",
    "Country of Origin",
    "Total Quantity",
    "Total Qty",
    "SO Number",
    "SO No",
    "Deliver To",
    "Customer Delivery Name",
];

const PRODUCT_DETAILS_ENDS: &[&str] = &["Order Header Details", "Line Item:", "Deliver To"];

/// Blocks under `Deliver To:` end at the next labeled line.
const DELIVER_TO_ENDS: &[&str] = &[
    "Customer Delivery Name",
    "Delivery Date",
    "Product Details",
    "Order Header Details",
    "Line Item:",
    "Total Quantity",
    "Care Instruction",
    "Garment Component",
    "Season:",
];

lazy_static! {
    static ref PO_NUMBER: FieldRule = FieldRule::new(
        &[
            r"(?i)VS\s*PO\s*Number\s*:?\s*([A-Za-z#\.\-]*\s?\d[\d\-]*)",
            r"(?i)Customer\s+Order\s+No\.?\s*:?\s*([A-Za-z#\.\-]*\s?\d[\d\-]*)",
        ],
        &[],
    );
    static ref SEASON: FieldRule = FieldRule::new(&[r"(?i)Season\s*:?[ \t]*([^\n]+)"], WO_LABELS);
    static ref FACTORY_ID: FieldRule = FieldRule::new(&[r"(?i)Factory\s*ID\s*:?\s*(\d+)"], &[]);
    static ref SILHOUETTE: FieldRule =
        FieldRule::new(&[r"(?i)Silhouette\s*:?[ \t]*([^\n]+)"], WO_LABELS);
    static ref DATE_OF_MFR: FieldRule = FieldRule::new(
        &[r"(?i)Date\s+of\s+(?:MFR|Manufacture)\s*#?\s*:?[ \t]*([^\n]+)"],
        WO_LABELS,
    );
    static ref COUNTRY_OF_ORIGIN: FieldRule =
        FieldRule::new(&[r"(?i)made\s+in\s+([^/\n]+)"], WO_LABELS);
    static ref CARE_INSTRUCTION: FieldRule =
        FieldRule::new(&[r"(?i)Care\s+Instructions?\s*:?[ \t]*([^\n]+)"], WO_LABELS);
    static ref DELIVERY_DATE: FieldRule = FieldRule::new(
        &[
            r"(?i)Delivery\s+Date\s*:?[ \t]*([^\n]+)",
            r"(?i)Ex[\s\-]?Factory\s+Date\s*:?[ \t]*([^\n]+)",
        ],
        WO_LABELS,
    );
    static ref CUSTOMER: FieldRule = FieldRule::new(&[r"(?i)\bCustomer\s*:[ \t]*([^\n]+)"], WO_LABELS);
    static ref GARMENT_COMPONENTS: FieldRule = FieldRule::new(
        &[r"(?i)Garment\s+Components?\s*:?[ \t]*([^\n]+)"],
        WO_LABELS,
    );
    static ref QUANTITY_TOTAL: FieldRule = FieldRule::new(
        &[r"(?i)Total\s+(?:Order\s+)?(?:Quantity|Qty)\s*:?\s*([\d,]+(?:\.\d+)?)"],
        &[],
    );
    static ref DELIVERY_NAME: FieldRule = FieldRule::new(
        &[r"(?i)Customer\s+Delivery\s+Name\s*:?[ \t]*([^\n]+)"],
        WO_LABELS,
    );
    static ref PRODUCT_CODE: Regex =
        Regex::new(r"(?i)Product\s+Code\s*:?\s*([A-Z0-9][A-Z0-9\-]{3,24})\b").unwrap();
    /// A colour joined to the code by a hyphen (`-C1`, or `-C` before `/1`).
    static ref HYPHEN_COLOR: Regex = Regex::new(r"(?i)-C\d{0,4}$").unwrap();
    static ref SIZE_ID: Regex = Regex::new(r"(?i)Size\s+ID\s*:?\s*([A-Z0-9]{1,10})\b").unwrap();
    static ref VSS_VSD: Regex = Regex::new(r"\b(VS[SD])\s*#\s*:?\s*([A-Za-z0-9\-]+)").unwrap();
    static ref COLOR_TOKEN: Regex =
        Regex::new(r"(?:^|[^A-Za-z0-9])(C/?\d{1,4})(?:[^A-Za-z0-9]|$)").unwrap();
    static ref SO_NUMBER: Regex =
        Regex::new(r"(?i)\bSO\s*(?:Number|No\.?|#)\s*:?\s*([A-Za-z0-9][A-Za-z0-9\-]*)").unwrap();
    static ref BFF_PREFIX: Regex = Regex::new(r"(?i)\bBFF-\s*").unwrap();
    static ref DELIVER_TO: Regex = Regex::new(r"(?i)Deliver\s+To\s*:?").unwrap();
}

/// Extract all labeled scalars of a Work Order from its concatenated page text.
///
/// Items are filled in separately; `quantity_total` falls back to the item
/// sum at assembly time.
pub fn extract_work_order_fields(text: &str) -> WorkOrderRecord {
    let details = section(text, "Product Details", PRODUCT_DETAILS_ENDS, 1500).unwrap_or("");

    let product_code = PRODUCT_CODE
        .captures(details)
        .and_then(|c| c.get(1))
        .map(|m| HYPHEN_COLOR.replace(m.as_str(), "").to_uppercase())
        .unwrap_or_default();
    let product_code_line = details
        .lines()
        .find(|line| !product_code.is_empty() && find_ci(line, &product_code).is_some())
        .map(clean)
        .unwrap_or_default();

    let vss_vsd = vss_vsd(details)
        .or_else(|| vss_vsd(text))
        .unwrap_or_default();

    let delivery_name = DELIVERY_NAME.extract(text);
    let deliver_to = deliver_to_block(text);
    let delivery_location = delivery_location(&delivery_name, &deliver_to);
    let address = clean(&BFF_PREFIX.replace_all(
        &truncate_after(&deliver_to, "Sri Lanka", 1).unwrap_or_else(|| deliver_to.clone()),
        "",
    ));

    let mut so_numbers = Vec::new();
    for caps in SO_NUMBER.captures_iter(text) {
        push_unique(&mut so_numbers, caps[1].to_uppercase());
    }

    let record = WorkOrderRecord {
        po_number: PO_NUMBER.extract(text),
        season: SEASON.extract(text),
        factory_id: FACTORY_ID.extract(text),
        silhouette: SILHOUETTE.extract(text),
        vss_vsd,
        date_of_mfr: DATE_OF_MFR.extract(text),
        country_of_origin: COUNTRY_OF_ORIGIN.extract(text),
        care_instruction: CARE_INSTRUCTION.extract(text),
        color_code: color_after_code(&product_code_line, &product_code),
        product_code,
        size_id: SIZE_ID
            .captures(details)
            .map(|c| c[1].to_uppercase())
            .unwrap_or_default(),
        delivery_date: DELIVERY_DATE.extract(text),
        delivery_location,
        customer: CUSTOMER.extract(text),
        address,
        garment_components: GARMENT_COMPONENTS.extract(text),
        quantity_total: QUANTITY_TOTAL.extract(text),
        delivery_name,
        product_code_line,
        items: Vec::new(),
        so_numbers,
    };

    let (filled, total) = record.coverage();
    debug!(filled, total, "Work order fields extracted");
    record
}

fn vss_vsd(text: &str) -> Option<String> {
    VSS_VSD
        .captures(text)
        .map(|c| format!("{}#{}", &c[1], &c[2]))
}

/// The `C<digits>` token after the base product code. VSS/VSD values on the
/// same line are ignored.
fn color_after_code(line: &str, product_code: &str) -> String {
    if line.is_empty() {
        return String::new();
    }
    let without_vs = VSS_VSD.replace_all(line, " ");
    let start = find_ci(&without_vs, product_code)
        .map(|p| p + product_code.len())
        .unwrap_or(0);
    COLOR_TOKEN
        .captures(&without_vs[start..])
        .map(|c| c[1].to_uppercase())
        .unwrap_or_default()
}

/// Lines following `Deliver To:` (including the rest of the label line) up to
/// a blank line or the next known label.
fn deliver_to_block(text: &str) -> String {
    let Some(m) = DELIVER_TO.find(text) else {
        return String::new();
    };
    let mut parts = Vec::new();
    for (i, line) in text[m.end()..].lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if i == 0 {
                continue;
            }
            break;
        }
        if DELIVER_TO_ENDS.iter().any(|end| find_ci(trimmed, end).is_some()) {
            break;
        }
        parts.push(trimmed);
    }
    clean(&parts.join(" "))
}

/// `Customer Delivery Name` joined with the `Deliver To` block, cut after
/// "Sri Lanka", with `BFF-` prefixes and repeated names removed.
fn delivery_location(name: &str, deliver_to: &str) -> String {
    let combined = if name.is_empty() || find_ci(deliver_to, name).is_some() {
        deliver_to.to_string()
    } else {
        format!("{name} {deliver_to}")
    };
    let cut = truncate_after(&combined, "Sri Lanka", 1).unwrap_or(combined);
    let without_bff = BFF_PREFIX.replace_all(&cut, "");
    fold_duplicates(&clean(&without_bff))
}
