// src/line_items/work_order.rs
//
// Work Order items come from the page tables; when no table yields an item
// the page text is scanned instead.

use crate::model::{LineItem, aggregate_items};
use crate::normalize::{self, SIZE_SUFFIXES};
use crate::pdf_extract::Page;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, info};

lazy_static! {
    static ref STYLE: Regex = Regex::new(r"^\d{8}$").unwrap();
    static ref NUMERIC: Regex = Regex::new(r"^[\d,]+(?:\.\d+)?$").unwrap();
    static ref TEXT_ROW: Regex = Regex::new(
        r"(?m)\b(\d{8})\s+([A-Z0-9]{2,6})\s+(XXXL|XXL|XXG|XL|XG|XS|S|M|L|P|G)(?:/[A-Z]{1,3})?\s+\$?(\d+(?:\.\d+)?)\s+\$?(\d+(?:\.\d+)?)\s+(\d+)\s+(\d+)\s+([\d,]+(?:\.\d+)?)\b"
    )
    .unwrap();
    static ref ORDER_HEADER: Regex = Regex::new(r"Order Header Details:\s*\*?SW\d+W\*?").unwrap();
    static ref STYLE_COLOR: Regex = Regex::new(r"^\s*(\d{8})\s+([A-Z0-9]{2,6})\b(.*)$").unwrap();
    static ref SIZE_QTY: Regex = Regex::new(
        r"^\s*(XXXL|XXL|XXG|XL|XG|XS|S|M|L|P|G)(?:/[A-Z]{1,3})?\s+([\d,]+(?:\.\d+)?)\b"
    )
    .unwrap();
}

/// Column positions for one items table.
#[derive(Debug, Clone, Default, PartialEq)]
struct Columns {
    style: usize,
    color: usize,
    size: usize,
    /// `None` means "last numeric cell of the row".
    quantity: Option<usize>,
    size_secondary: Option<usize>,
    panty_length: Option<usize>,
    retail_us: Option<usize>,
    retail_ca: Option<usize>,
    multi_price: Option<usize>,
    sku: Option<usize>,
    article: Option<usize>,
}

impl Columns {
    /// Recognize a header row by its Style, Colour, Size and Quantity labels.
    fn detect(row: &[String]) -> Option<Self> {
        let (mut style, mut color, mut size, mut quantity) = (None, None, None, None);
        let mut cols = Columns::default();
        for (i, raw) in row.iter().enumerate() {
            let cell = raw.to_lowercase().replace('\n', " ");
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            if cell.contains("style") {
                style.get_or_insert(i);
            } else if cell.contains("colour") || cell.contains("color") {
                color.get_or_insert(i);
            } else if cell.contains("size") {
                if size.is_none() {
                    size = Some(i);
                } else {
                    cols.size_secondary.get_or_insert(i);
                }
            } else if cell.contains("qty") || cell.contains("quantity") {
                quantity.get_or_insert(i);
            } else if cell.contains("retail") {
                if cell.contains("ca") {
                    cols.retail_ca.get_or_insert(i);
                } else {
                    cols.retail_us.get_or_insert(i);
                }
            } else if cell.contains("multi") {
                cols.multi_price.get_or_insert(i);
            } else if cell.contains("panty") {
                cols.panty_length.get_or_insert(i);
            } else if cell.contains("sku") {
                cols.sku.get_or_insert(i);
            } else if cell.contains("article") {
                cols.article.get_or_insert(i);
            }
        }
        Some(Columns {
            style: style?,
            color: color?,
            size: size?,
            quantity: Some(quantity?),
            ..cols
        })
    }

    /// Fixed layout used when a table has no recognizable header.
    fn inferred() -> Self {
        Columns {
            style: 0,
            color: 1,
            size: 2,
            quantity: None,
            size_secondary: Some(3),
            panty_length: Some(4),
            retail_us: Some(5),
            retail_ca: Some(6),
            multi_price: Some(7),
            sku: Some(8),
            article: Some(9),
        }
    }

    fn min_width(&self) -> usize {
        self.style.max(self.color).max(self.size) + 1
    }
}

/// Extract and aggregate the items of a Work Order.
pub fn extract_work_order_items(pages: &[Page]) -> Vec<LineItem> {
    let mut items = items_from_tables(pages);
    let source = if items.is_empty() {
        let text: Vec<&str> = pages.iter().map(|p| p.text.as_str()).collect();
        items = items_from_text(&text.join("\n"));
        "text"
    } else {
        "tables"
    };
    let items = aggregate_items(items);
    info!(items = items.len(), source, "Work order items extracted");
    items
}

fn items_from_tables(pages: &[Page]) -> Vec<LineItem> {
    let mut items = Vec::new();
    // Tables continuing on later pages repeat no header.
    let mut carried: Option<Columns> = None;

    for table in pages.iter().flat_map(|p| &p.tables) {
        let mut rows = table.clone();
        rows.iter_mut().for_each(|row| join_split_sizes(row));

        let header = rows
            .iter()
            .enumerate()
            .find_map(|(i, row)| Columns::detect(row).map(|cols| (i, cols)));

        let before = items.len();
        if let Some((at, cols)) = header {
            items.extend(rows[at + 1..].iter().filter_map(|row| parse_row(row, &cols)));
            carried = Some(cols);
        } else if let Some(cols) = &carried {
            items.extend(rows.iter().filter_map(|row| parse_row(row, cols)));
        }

        if items.len() == before {
            let cols = Columns::inferred();
            items.extend(
                rows.iter()
                    .filter(|row| looks_like_item_row(row))
                    .filter_map(|row| parse_row(row, &cols)),
            );
        }
    }
    items
}

/// A size cell split over two columns (`XS/` | `XP`) is rejoined into the
/// first one; the second is blanked so column positions still line up.
fn join_split_sizes(row: &mut [String]) {
    for i in 0..row.len().saturating_sub(1) {
        let next = row[i + 1].trim().to_uppercase();
        if row[i].trim_end().ends_with('/') && SIZE_SUFFIXES.contains(&next.as_str()) {
            row[i] = format!("{}{}", row[i].trim_end(), next);
            row[i + 1].clear();
        }
    }
}

fn looks_like_item_row(row: &[String]) -> bool {
    row.first()
        .is_some_and(|c| STYLE.is_match(&normalize::decimal(c)))
        && row.iter().skip(1).any(|c| !normalize::size(c).is_empty())
}

fn parse_row(row: &[String], cols: &Columns) -> Option<LineItem> {
    if row.len() < cols.min_width() {
        return None;
    }
    let cell = |i: usize| row.get(i).map(|s| s.trim()).unwrap_or("");
    let optional = |i: Option<usize>| {
        i.map(cell)
            .filter(|s| !s.is_empty())
            .map(|s| normalize::collapse_whitespace(s))
    };

    let style = normalize::decimal(cell(cols.style));
    if !STYLE.is_match(&style) {
        return None;
    }

    let quantity = row_quantity(row, cols);
    if quantity.is_zero() {
        debug!(style = %style, "Skipping row without quantity");
        return None;
    }

    let color = cell(cols.color)
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase();

    Some(LineItem {
        style,
        color_code: color,
        size: normalize::size(cell(cols.size)),
        quantity,
        sku: optional(cols.sku).map(|s| normalize::decimal(&s)),
        article: optional(cols.article).map(|s| normalize::decimal(&s)),
        retail_us: optional(cols.retail_us).map(|s| normalize::retail(&s)),
        retail_ca: optional(cols.retail_ca).map(|s| normalize::retail(&s)),
        multi_price: optional(cols.multi_price),
        panty_length: optional(cols.panty_length),
        size_secondary: optional(cols.size_secondary),
        ..LineItem::default()
    })
}

/// The labeled quantity cell, else the last numeric cell outside the style column.
fn row_quantity(row: &[String], cols: &Columns) -> Decimal {
    let labeled = cols
        .quantity
        .and_then(|i| row.get(i))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    if let Some(raw) = labeled {
        return normalize::quantity(raw);
    }
    row.iter()
        .enumerate()
        .rev()
        .filter(|(i, _)| *i != cols.style)
        .map(|(_, c)| c.trim())
        .find(|c| NUMERIC.is_match(c))
        .map(normalize::quantity)
        .unwrap_or(Decimal::ZERO)
}

fn items_from_text(text: &str) -> Vec<LineItem> {
    let items: Vec<LineItem> = TEXT_ROW
        .captures_iter(text)
        .map(|c| LineItem {
            sku: Some(c[6].to_string()),
            article: Some(c[7].to_string()),
            retail_us: Some(normalize::retail(&c[4])),
            retail_ca: Some(normalize::retail(&c[5])),
            ..LineItem::new(&c[1], &c[2], &c[3], normalize::quantity(&c[8]))
        })
        .filter(|item| !item.quantity.is_zero())
        .collect();
    if !items.is_empty() {
        return items;
    }
    items_from_order_headers(text)
}

/// Rows inside `Order Header Details: *SW...W*` sections, where the size and
/// quantity may sit on the line after the style and colour.
fn items_from_order_headers(text: &str) -> Vec<LineItem> {
    let starts: Vec<(usize, usize)> = ORDER_HEADER
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();
    let mut items = Vec::new();
    for (n, (_, body_start)) in starts.iter().enumerate() {
        let body_end = starts.get(n + 1).map(|(s, _)| *s).unwrap_or(text.len());
        let lines: Vec<&str> = text[*body_start..body_end].lines().collect();
        for (i, line) in lines.iter().enumerate() {
            let Some(head) = STYLE_COLOR.captures(line) else {
                continue;
            };
            let rest = head.get(3).map(|m| m.as_str()).unwrap_or("");
            let size_qty = SIZE_QTY
                .captures(rest)
                .or_else(|| lines.get(i + 1).and_then(|next| SIZE_QTY.captures(next)));
            if let Some(sq) = size_qty {
                let quantity = normalize::quantity(&sq[2]);
                if !quantity.is_zero() {
                    items.push(LineItem::new(&head[1], &head[2], &sq[1], quantity));
                }
            }
        }
    }
    items
}
