// src/compare.rs
//
// Scalar field comparison plus the auxiliary tables the verdict is built on.

use crate::heuristics::{find_ci, push_unique};
use crate::model::{PurchaseOrderRecord, WorkOrderRecord};
use crate::normalize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldStatus {
    Matched,
    Mismatch,
    MissingWo,
    MissingPo,
    BothEmpty,
}

/// How two non-empty values are judged equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Trimmed,
    PoNumber,
    ProductCode,
    ColorCode,
    Address,
    Quantity,
}

/// Comparable scalar fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PoNumber,
    Customer,
    DeliveryLocation,
    Address,
    DeliveryDate,
    Season,
    ColorCode,
    FactoryId,
    DateOfMfr,
    VssVsd,
    Silhouette,
    ProductCode,
    CareInstruction,
    SizeId,
    GarmentComponents,
    Quantity,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::PoNumber,
        Field::Customer,
        Field::DeliveryLocation,
        Field::Address,
        Field::DeliveryDate,
        Field::Season,
        Field::ColorCode,
        Field::FactoryId,
        Field::DateOfMfr,
        Field::VssVsd,
        Field::Silhouette,
        Field::ProductCode,
        Field::CareInstruction,
        Field::SizeId,
        Field::GarmentComponents,
        Field::Quantity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::PoNumber => "po_number",
            Field::Customer => "customer",
            Field::DeliveryLocation => "delivery_location",
            Field::Address => "address",
            Field::DeliveryDate => "delivery_date",
            Field::Season => "season",
            Field::ColorCode => "color_code",
            Field::FactoryId => "factory_id",
            Field::DateOfMfr => "date_of_mfr",
            Field::VssVsd => "vss_vsd",
            Field::Silhouette => "silhouette",
            Field::ProductCode => "product_code",
            Field::CareInstruction => "care_instruction",
            Field::SizeId => "size_id",
            Field::GarmentComponents => "garment_components",
            Field::Quantity => "quantity",
        }
    }

    fn strategy(self) -> Strategy {
        match self {
            Field::PoNumber => Strategy::PoNumber,
            Field::ProductCode => Strategy::ProductCode,
            Field::ColorCode => Strategy::ColorCode,
            Field::Address => Strategy::Address,
            Field::Quantity => Strategy::Quantity,
            _ => Strategy::Trimmed,
        }
    }

    fn wo_value(self, wo: &WorkOrderRecord) -> String {
        let value = match self {
            Field::PoNumber => &wo.po_number,
            Field::Customer => &wo.customer,
            Field::DeliveryLocation => &wo.delivery_location,
            Field::Address => &wo.address,
            Field::DeliveryDate => &wo.delivery_date,
            Field::Season => &wo.season,
            Field::ColorCode => &wo.color_code,
            Field::FactoryId => &wo.factory_id,
            Field::DateOfMfr => &wo.date_of_mfr,
            Field::VssVsd => &wo.vss_vsd,
            Field::Silhouette => &wo.silhouette,
            Field::ProductCode => &wo.product_code,
            Field::CareInstruction => &wo.care_instruction,
            Field::SizeId => &wo.size_id,
            Field::GarmentComponents => &wo.garment_components,
            Field::Quantity => &wo.quantity_total,
        };
        value.clone()
    }

    /// PO value; fields the PO carries no label for are looked up in its
    /// full text using the WO value.
    fn po_value(self, wo: &WorkOrderRecord, po: &PurchaseOrderRecord) -> String {
        match self {
            Field::PoNumber => po.po_number.clone(),
            Field::Customer => po.customer.clone(),
            Field::DeliveryLocation => po.delivery_location.clone(),
            Field::Address => po.address.clone(),
            Field::DeliveryDate => po.delivery_date.clone(),
            Field::Season => po.season.clone(),
            Field::ColorCode => po.color_code.clone(),
            Field::ProductCode => {
                if po.product_code_used.is_empty() {
                    po.product_codes.first().cloned().unwrap_or_default()
                } else {
                    po.product_code_used.clone()
                }
            }
            Field::Quantity => po.total_quantity.clone(),
            Field::FactoryId
            | Field::DateOfMfr
            | Field::VssVsd
            | Field::Silhouette
            | Field::CareInstruction
            | Field::SizeId
            | Field::GarmentComponents => {
                let wanted = self.wo_value(wo);
                if !wanted.is_empty() && find_ci(&po.full_text, &wanted).is_some() {
                    wanted
                } else {
                    String::new()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: Field,
    pub wo_value: String,
    pub po_value: String,
    pub status: FieldStatus,
}

/// Compare every field in display order.
pub fn compare_fields(
    wo: &WorkOrderRecord,
    po: &PurchaseOrderRecord,
    address: &AddressResult,
) -> Vec<FieldComparison> {
    Field::ALL
        .iter()
        .map(|&field| {
            let wo_value = field.wo_value(wo);
            let po_value = field.po_value(wo, po);
            let status = status(field.strategy(), &wo_value, &po_value, address);
            FieldComparison {
                field,
                wo_value,
                po_value,
                status,
            }
        })
        .collect()
}

fn status(strategy: Strategy, wo: &str, po: &str, address: &AddressResult) -> FieldStatus {
    let (wo, po) = (wo.trim(), po.trim());
    match (wo.is_empty(), po.is_empty()) {
        (true, true) => return FieldStatus::BothEmpty,
        (true, false) => return FieldStatus::MissingWo,
        (false, true) => return FieldStatus::MissingPo,
        (false, false) => {}
    }
    let same = match strategy {
        Strategy::Trimmed => wo == po,
        Strategy::PoNumber => normalize::po_number(wo) == normalize::po_number(po),
        Strategy::ProductCode => product_codes_overlap(wo, po),
        Strategy::ColorCode => normalize::color_code(wo) == normalize::color_code(po),
        Strategy::Address => address.matched,
        Strategy::Quantity => normalize::quantity(wo) == normalize::quantity(po),
    };
    if same {
        FieldStatus::Matched
    } else {
        FieldStatus::Mismatch
    }
}

fn product_codes_overlap(a: &str, b: &str) -> bool {
    let (a, b) = (normalize::alphanumeric_upper(a), normalize::alphanumeric_upper(b));
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}

/// Fuzzy similarity (0-100) of two addresses after cleaning.
///
/// Normalized Levenshtein: one minus edits per character of the longer
/// string, so the threshold bounds the share of characters that differ.
pub fn address_similarity(a: &str, b: &str) -> u8 {
    let (a, b) = (normalize::address(a), normalize::address(b));
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    (strsim::normalized_levenshtein(&a, &b) * 100.0).round() as u8
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressResult {
    /// WO delivery location (delivery name with the Deliver To block) vs PO.
    pub name_score: u8,
    /// WO Deliver To address vs PO address.
    pub address_score: u8,
    pub score: u8,
    pub threshold: u8,
    pub matched: bool,
}

pub fn compare_address(wo: &WorkOrderRecord, po: &PurchaseOrderRecord, threshold: u8) -> AddressResult {
    let po_location = if po.delivery_location.is_empty() {
        &po.address
    } else {
        &po.delivery_location
    };
    let name_score = address_similarity(&wo.delivery_location, po_location);
    let address_score = address_similarity(&wo.address, &po.address);
    let score = name_score.max(address_score);
    AddressResult {
        name_score,
        address_score,
        score,
        threshold,
        matched: score >= threshold,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CodeMatch {
    #[serde(rename = "Exact Match")]
    ExactMatch,
    #[serde(rename = "Partial Match")]
    PartialMatch,
    #[serde(rename = "No Match")]
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductCodeRow {
    pub wo_code: String,
    pub po_code: String,
    pub status: CodeMatch,
}

/// One row per distinct product code carried by the PO items (their
/// document-level code and the Item column codes).
pub fn product_code_table(wo: &WorkOrderRecord, po: &PurchaseOrderRecord) -> Vec<ProductCodeRow> {
    let mut codes = Vec::new();
    for item in &po.items {
        push_unique(&mut codes, item.product_code.clone());
    }
    for code in &po.product_codes_from_item_column {
        push_unique(&mut codes, code.clone());
    }

    let wo_code = normalize::product_code(&wo.product_code);
    codes
        .into_iter()
        .map(|po_code| {
            let status = if !wo_code.is_empty() && normalize::product_code(&po_code) == wo_code {
                CodeMatch::ExactMatch
            } else if product_codes_overlap(&wo_code, &po_code) {
                CodeMatch::PartialMatch
            } else {
                CodeMatch::NoMatch
            };
            ProductCodeRow {
                wo_code: wo.product_code.clone(),
                po_code,
                status,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoColorRow {
    pub color: String,
    /// First SO number containing the colour, if any.
    pub so_number: Option<String>,
}

impl SoColorRow {
    pub fn matched(&self) -> bool {
        self.so_number.is_some()
    }
}

/// Each WO item colour against the WO's SO numbers.
pub fn so_color_table(wo: &WorkOrderRecord) -> Vec<SoColorRow> {
    wo.item_colors()
        .into_iter()
        .map(|color| {
            let so_number = wo
                .so_numbers
                .iter()
                .find(|so| find_ci(so, &color).is_some())
                .cloned();
            SoColorRow { color, so_number }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VsbaParity {
    pub wo: bool,
    pub po: bool,
}

impl VsbaParity {
    pub fn of(wo: &WorkOrderRecord, po: &PurchaseOrderRecord) -> Self {
        Self {
            wo: wo.has_vsba(),
            po: po.has_vsba(),
        }
    }

    pub fn holds(&self) -> bool {
        self.wo == self.po
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItem, VsbaSource};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn records() -> (WorkOrderRecord, PurchaseOrderRecord) {
        let wo = WorkOrderRecord {
            po_number: "BFF-1234567".into(),
            customer: "Victoria's Secret".into(),
            season: "FA25".into(),
            color_code: "C/1".into(),
            factory_id: "4410".into(),
            product_code: "LB0123456".into(),
            delivery_location: "Brandix Apparel Ltd Plot 12 Colombo Sri Lanka".into(),
            address: "Plot 12 Colombo Sri Lanka".into(),
            quantity_total: "300".into(),
            ..WorkOrderRecord::default()
        };
        let po = PurchaseOrderRecord {
            po_number: "1234567".into(),
            customer: "Victoria's Secret ".into(),
            season: "SP26".into(),
            color_code: "C1".into(),
            product_code_used: "LB0123456C1".into(),
            delivery_location: "Brandix Apparel Ltd, Plot #12, Colombo Sri Lanka".into(),
            address: "Brandix Apparel Ltd, Plot #12, Colombo Sri Lanka".into(),
            total_quantity: "300.0000".into(),
            full_text: "... Factory: 4410 ...".into(),
            ..PurchaseOrderRecord::default()
        };
        (wo, po)
    }

    fn status_of(rows: &[FieldComparison], field: Field) -> FieldStatus {
        rows.iter().find(|r| r.field == field).map(|r| r.status).unwrap()
    }

    #[test]
    fn field_statuses() {
        let (wo, po) = records();
        let address = compare_address(&wo, &po, 90);
        let rows = compare_fields(&wo, &po, &address);
        assert_eq!(rows.len(), 16);
        assert_eq!(rows[0].field, Field::PoNumber);
        assert_eq!(status_of(&rows, Field::PoNumber), FieldStatus::Matched);
        assert_eq!(status_of(&rows, Field::Customer), FieldStatus::Matched);
        assert_eq!(status_of(&rows, Field::Season), FieldStatus::Mismatch);
        assert_eq!(status_of(&rows, Field::ColorCode), FieldStatus::Matched);
        assert_eq!(status_of(&rows, Field::ProductCode), FieldStatus::Matched);
        assert_eq!(status_of(&rows, Field::FactoryId), FieldStatus::Matched);
        assert_eq!(status_of(&rows, Field::Quantity), FieldStatus::Matched);
        assert_eq!(status_of(&rows, Field::DeliveryDate), FieldStatus::BothEmpty);
        assert_eq!(status_of(&rows, Field::Address), FieldStatus::Matched);
    }

    #[test]
    fn missing_sides() {
        let wo = WorkOrderRecord {
            silhouette: "Bralette".into(),
            ..WorkOrderRecord::default()
        };
        let po = PurchaseOrderRecord {
            season: "FA25".into(),
            ..PurchaseOrderRecord::default()
        };
        let address = compare_address(&wo, &po, 90);
        let rows = compare_fields(&wo, &po, &address);
        assert_eq!(status_of(&rows, Field::Silhouette), FieldStatus::MissingPo);
        assert_eq!(status_of(&rows, Field::Season), FieldStatus::MissingWo);
    }

    #[test]
    fn address_scores() {
        assert_eq!(address_similarity("Plot #12, Colombo", "plot 12 colombo"), 100);
        assert_eq!(address_similarity("", "plot 12"), 0);
        let (wo, po) = records();
        let result = compare_address(&wo, &po, 90);
        assert_eq!(result.score, result.name_score.max(result.address_score));
        assert!(result.matched);
    }

    #[test]
    fn address_threshold_boundary() {
        // 85 and 90 disagree on a near-miss address
        let a = "brandix apparel ltd plot 12 colombo";
        let b = "brandix apparels pvt plot 12 colombo";
        let score = address_similarity(a, b);
        assert!((85..90).contains(&score), "score {score}");
        let wo = WorkOrderRecord {
            address: a.into(),
            ..WorkOrderRecord::default()
        };
        let po = PurchaseOrderRecord {
            address: b.into(),
            ..PurchaseOrderRecord::default()
        };
        assert!(compare_address(&wo, &po, 85).matched);
        assert!(!compare_address(&wo, &po, 90).matched);
    }

    #[test]
    fn product_code_rows() {
        let (wo, mut po) = records();
        po.items = vec![LineItem {
            product_code: "LB0123456C1".into(),
            ..LineItem::new("11276771", "91S3", "XS", Decimal::from(100))
        }];
        po.product_codes_from_item_column = vec!["LB0123456".into(), "LB9999999".into()];
        let table = product_code_table(&wo, &po);
        let statuses: Vec<CodeMatch> = table.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![CodeMatch::PartialMatch, CodeMatch::ExactMatch, CodeMatch::NoMatch]
        );
    }

    #[test]
    fn product_code_table_empty_without_items() {
        let (wo, po) = records();
        assert!(product_code_table(&wo, &po).is_empty());
    }

    #[test]
    fn so_colors() {
        let wo = WorkOrderRecord {
            items: vec![
                LineItem::new("1", "91S3", "S", Decimal::ONE),
                LineItem::new("1", "A1B2", "S", Decimal::ONE),
            ],
            so_numbers: vec!["SO-88001-91s3".into()],
            ..WorkOrderRecord::default()
        };
        let table = so_color_table(&wo);
        assert!(table[0].matched());
        assert!(!table[1].matched());
    }

    #[test]
    fn vsba_parity() {
        let (mut wo, mut po) = records();
        assert!(VsbaParity::of(&wo, &po).holds());
        wo.product_code_line = "Product Code: LB0123456 VSBA".into();
        assert!(!VsbaParity::of(&wo, &po).holds());
        po.vsba_sources.push(VsbaSource {
            source: "Sup. Ref.".into(),
            line: "Sup. Ref.: LB0123456-VSBA".into(),
            has_vsba: true,
        });
        assert!(VsbaParity::of(&wo, &po).holds());
    }
}
