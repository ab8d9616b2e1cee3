// src/model.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of a WO, PO or spreadsheet items table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub style: String,
    pub color_code: String,
    pub size: String,
    pub quantity: Decimal,
    pub item_code: String,
    pub item_number: String,
    pub product_code: String,
    pub sku: Option<String>,
    pub article: Option<String>,
    pub retail_us: Option<String>,
    pub retail_ca: Option<String>,
    pub multi_price: Option<String>,
    pub panty_length: Option<String>,
    pub size_secondary: Option<String>,
}

impl LineItem {
    pub fn new(style: &str, color_code: &str, size: &str, quantity: Decimal) -> Self {
        Self {
            style: style.to_string(),
            color_code: color_code.to_string(),
            size: size.to_string(),
            quantity,
            ..Self::default()
        }
    }

    /// Aggregation key: (style, colour, size).
    pub fn key(&self) -> (String, String, String) {
        (self.style.clone(), self.color_code.clone(), self.size.clone())
    }
}

/// Combine items sharing (style, colour, size) by summing quantities.
///
/// The first occurrence of a key keeps its position and its optional columns.
pub fn aggregate_items(items: Vec<LineItem>) -> Vec<LineItem> {
    let mut out: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        match out.iter_mut().find(|existing| existing.key() == item.key()) {
            Some(existing) => existing.quantity += item.quantity,
            None => out.push(item),
        }
    }
    out
}

pub fn total_quantity(items: &[LineItem]) -> Decimal {
    items.iter().map(|i| i.quantity).sum()
}

/// Everything extracted from a Work Order PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderRecord {
    pub po_number: String,
    pub season: String,
    pub factory_id: String,
    pub silhouette: String,
    pub vss_vsd: String,
    pub date_of_mfr: String,
    pub country_of_origin: String,
    pub care_instruction: String,
    pub product_code: String,
    pub size_id: String,
    pub color_code: String,
    pub delivery_date: String,
    pub delivery_location: String,
    pub customer: String,
    pub address: String,
    pub garment_components: String,
    pub quantity_total: String,
    /// `Customer Delivery Name:` on its own, used for address scoring.
    pub delivery_name: String,
    /// Full text of the line carrying the product code, used for VSBA parity.
    pub product_code_line: String,
    pub items: Vec<LineItem>,
    pub so_numbers: Vec<String>,
}

impl WorkOrderRecord {
    /// How many scalar fields were extracted (out of the scalar ones).
    pub fn coverage(&self) -> (usize, usize) {
        let fields = [
            &self.po_number,
            &self.season,
            &self.factory_id,
            &self.silhouette,
            &self.vss_vsd,
            &self.date_of_mfr,
            &self.country_of_origin,
            &self.care_instruction,
            &self.product_code,
            &self.size_id,
            &self.color_code,
            &self.delivery_date,
            &self.delivery_location,
            &self.customer,
            &self.address,
            &self.garment_components,
            &self.quantity_total,
        ];
        let filled = fields.iter().filter(|v| !v.is_empty()).count();
        (filled, fields.len())
    }

    pub fn has_vsba(&self) -> bool {
        self.product_code_line.to_uppercase().contains("VSBA")
    }

    /// Distinct item colour codes in first-seen order.
    pub fn item_colors(&self) -> Vec<String> {
        let mut colors: Vec<String> = Vec::new();
        for item in &self.items {
            if !item.color_code.is_empty() && !colors.contains(&item.color_code) {
                colors.push(item.color_code.clone());
            }
        }
        colors
    }
}

/// A code-bearing region of the PO and whether it carries the VSBA marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VsbaSource {
    pub source: String,
    pub line: String,
    pub has_vsba: bool,
}

/// Everything extracted from a Purchase Order PDF (with its email cover page).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderRecord {
    pub po_number: String,
    pub supplier: String,
    pub customer: String,
    pub delivery_location: String,
    pub address: String,
    pub delivery_date: String,
    pub season: String,
    pub total_quantity: String,
    /// `C<digits>` token found next to the product code.
    pub color_code: String,
    /// `Sup. Ref.` value, else the `TAG.PRC.TKT_<code>_REG` code, hyphens removed.
    pub product_code_used: String,
    pub product_codes: Vec<String>,
    pub items: Vec<LineItem>,
    pub email_subject_pos: Vec<String>,
    pub product_codes_from_item_column: Vec<String>,
    pub vsba_sources: Vec<VsbaSource>,
    /// Concatenated page text, searched for fields without a PO label.
    #[serde(skip)]
    pub full_text: String,
}

impl PurchaseOrderRecord {
    pub fn coverage(&self) -> (usize, usize) {
        let fields = [
            &self.po_number,
            &self.supplier,
            &self.customer,
            &self.delivery_location,
            &self.address,
            &self.delivery_date,
            &self.season,
            &self.total_quantity,
        ];
        let filled = fields.iter().filter(|v| !v.is_empty()).count();
        (filled, fields.len())
    }

    pub fn has_vsba(&self) -> bool {
        self.vsba_sources.iter().any(|s| s.has_vsba)
    }
}

/// One data row of a price-ticket sheet, in canonical columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetRow {
    pub style: String,
    pub color_code: String,
    pub size: String,
    pub quantity: Decimal,
    pub retail_us: Option<String>,
    pub retail_ca: Option<String>,
    pub sku: Option<String>,
    pub article: Option<String>,
}

impl SpreadsheetRow {
    pub fn to_line_item(&self) -> LineItem {
        LineItem {
            style: self.style.clone(),
            color_code: self.color_code.clone(),
            size: self.size.clone(),
            quantity: self.quantity,
            sku: self.sku.clone(),
            article: self.article.clone(),
            retail_us: self.retail_us.clone(),
            retail_ca: self.retail_ca.clone(),
            ..LineItem::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetRecord {
    pub file_name: String,
    pub sheet_name: String,
    pub rows: Vec<SpreadsheetRow>,
    /// Set when the sheet layout was not understood and the sheet was skipped.
    pub layout_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn qty(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn aggregation_sums_duplicates() {
        let items = vec![
            LineItem::new("11276771", "91S3", "XS", qty(60)),
            LineItem::new("11276771", "91S3", "S", qty(200)),
            LineItem::new("11276771", "91S3", "XS", qty(40)),
        ];
        let agg = aggregate_items(items);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg[0].quantity, qty(100));
        assert_eq!(agg[1].quantity, qty(200));
    }

    #[test]
    fn aggregation_keys_are_unique_and_total_preserved() {
        let items = vec![
            LineItem::new("1", "A", "S", qty(1)),
            LineItem::new("1", "A", "M", qty(2)),
            LineItem::new("1", "A", "S", qty(3)),
            LineItem::new("2", "A", "S", qty(4)),
        ];
        let total = total_quantity(&items);
        let mut reversed = items.clone();
        reversed.reverse();

        let agg = aggregate_items(items);
        let agg_rev = aggregate_items(reversed);
        let mut keys: Vec<_> = agg.iter().map(LineItem::key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), agg.len());
        assert_eq!(total_quantity(&agg), total);
        assert_eq!(total_quantity(&agg_rev), total);
    }

    #[test]
    fn wo_colors_are_distinct_in_order() {
        let wo = WorkOrderRecord {
            items: vec![
                LineItem::new("1", "B2", "S", qty(1)),
                LineItem::new("1", "A1", "S", qty(1)),
                LineItem::new("1", "B2", "M", qty(1)),
            ],
            ..WorkOrderRecord::default()
        };
        assert_eq!(wo.item_colors(), vec!["B2".to_string(), "A1".to_string()]);
    }

    #[test]
    fn coverage_counts_filled() {
        let wo = WorkOrderRecord {
            po_number: "1234567".into(),
            season: "FA25".into(),
            ..WorkOrderRecord::default()
        };
        assert_eq!(wo.coverage(), (2, 17));
    }
}
