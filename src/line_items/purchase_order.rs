// src/line_items/purchase_order.rs

use crate::heuristics::push_unique;
use crate::model::{LineItem, aggregate_items};
use crate::normalize;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How many lines after an item line may hold its destination line.
const DESTINATION_LOOKAHEAD: usize = 4;

lazy_static! {
    static ref TAG_DESTINATION_LABEL: Regex = Regex::new(r"Color/Size/Destination\s*:").unwrap();
    static ref CLASSIC_DESTINATION_LABEL: Regex =
        Regex::new(r"Colour/Size/Destination\s*:").unwrap();
    static ref ITEM_LINE: Regex =
        Regex::new(r"^\s*(\d{1,4})\s+(\S+)(?:\s+.*?)?\s+([\d,]+\.\d+)\s*PCS\b").unwrap();
    static ref DESTINATION: Regex =
        Regex::new(r"(?i)Colou?r\s*/\s*Size\s*/\s*Destination\s*:\s*(.*)$").unwrap();
    static ref COMBINED_SIZE: Regex =
        Regex::new(r"\b(XXL|XL|XS|S|M|L)\s*/\s*(XXG|XG|XP|P|M|G)\b").unwrap();
    static ref EXTRACTED_STYLES: Regex =
        Regex::new(r"(?i)Extracted\s+Style\s+Numbers?\s*:([^\n]*(?:\n[^\n]*)?)").unwrap();
    static ref EIGHT_DIGITS: Regex = Regex::new(r"\b\d{8}\b").unwrap();
    static ref TAG_HANG: Regex = Regex::new(r"TAG\.HANG_([A-Za-z0-9\-]+?)_TAGPRCTKT").unwrap();
}

/// PO layouts, recognized from the concatenated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoFormat {
    Tag,
    Classic,
    Unrecognized,
}

pub fn detect_format(text: &str) -> PoFormat {
    if text.contains("TAG.PRC.TKT_") && TAG_DESTINATION_LABEL.is_match(text) {
        PoFormat::Tag
    } else if CLASSIC_DESTINATION_LABEL.is_match(text) || text.contains("Sup. Ref.:") {
        PoFormat::Classic
    } else {
        PoFormat::Unrecognized
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoItems {
    pub format: PoFormat,
    pub items: Vec<LineItem>,
    /// Codes from `TAG.HANG_<code>_TAGPRCTKT` in the Item column.
    pub hang_codes: Vec<String>,
}

/// Extract and aggregate the items of a Purchase Order.
///
/// Every item receives the cover page style and the document-level
/// `product_code_used`.
pub fn extract_purchase_order_items(text: &str, cover: &str, product_code_used: &str) -> PoItems {
    let format = detect_format(text);
    if format == PoFormat::Unrecognized {
        debug!("No known purchase order item layout");
        return PoItems {
            format,
            items: Vec::new(),
            hang_codes: Vec::new(),
        };
    }

    let style = cover_style(cover);
    let lines: Vec<&str> = text.lines().collect();
    let mut items = Vec::new();
    let mut hang_codes = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = ITEM_LINE.captures(line) else {
            continue;
        };
        for hang in TAG_HANG.captures_iter(line) {
            push_unique(&mut hang_codes, hang[1].to_uppercase());
        }

        let (color, size) = match destination_after(&lines, i) {
            Some(dest) => parse_destination(&dest),
            None => {
                debug!(line = %line.trim(), "Item line without destination");
                (String::new(), String::new())
            }
        };

        items.push(LineItem {
            item_number: caps[1].to_string(),
            item_code: caps[2].to_string(),
            product_code: product_code_used.to_string(),
            ..LineItem::new(&style, &color, &size, normalize::quantity(&caps[3]))
        });
    }

    let items = aggregate_items(items);
    info!(?format, items = items.len(), hang_codes = hang_codes.len(), "Purchase order items extracted");
    PoItems {
        format,
        items,
        hang_codes,
    }
}

/// The destination string following item line `at`, stopping at the next item.
fn destination_after(lines: &[&str], at: usize) -> Option<String> {
    let window = lines.iter().enumerate().skip(at + 1).take(DESTINATION_LOOKAHEAD);
    for (i, line) in window {
        if ITEM_LINE.is_match(line) {
            return None;
        }
        let Some(caps) = DESTINATION.captures(line) else {
            continue;
        };
        let value = caps[1].trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
        // label alone on its line
        return lines[i + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(str::to_string);
    }
    None
}

/// Split `colour / size / destination` (either of the first two may come
/// first) into a colour and a canonical size.
fn parse_destination(dest: &str) -> (String, String) {
    let dest = COMBINED_SIZE.replace_all(&dest.to_uppercase(), "$1").into_owned();
    let segments: Vec<&str> = dest
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let first_token = |s: &str| s.split_whitespace().next().unwrap_or("").to_string();

    let (color, mut size) = match segments.as_slice() {
        [] => (String::new(), String::new()),
        [first, rest @ ..] if normalize::is_canonical_size(first) => (
            rest.first().copied().map(first_token).unwrap_or_default(),
            first.to_string(),
        ),
        [first, rest @ ..] => (
            first_token(*first),
            rest.first().copied().map(normalize::size).unwrap_or_default(),
        ),
    };

    if let Some((before_last, _)) = dest.rsplit_once('/') {
        let found = before_last
            .split(|c: char| c.is_whitespace() || c == '/')
            .rev()
            .find(|t| normalize::is_canonical_size(t));
        if let Some(token) = found {
            size = token.to_string();
        }
    }
    (color, size)
}

/// First 8-digit style under `Extracted Style Numbers:`, else the first
/// 8-digit token anywhere on the cover page.
fn cover_style(cover: &str) -> String {
    EXTRACTED_STYLES
        .captures(cover)
        .and_then(|c| EIGHT_DIGITS.find(c.get(1)?.as_str()))
        .or_else(|| EIGHT_DIGITS.find(cover))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    const TAG_PO: &str = "\
Item  Description                  Quantity
1 TAG.PRC.TKT_LB0123456_REG Price ticket 60.0000 PCS
Color/Size/Destination : 91S3 / XS/XP / US
2 TAG.PRC.TKT_LB0123456_REG Price ticket 200.0000 PCS
Color/Size/Destination : 91S3 / S/P / US
3 TAG.HANG_LB0123456_TAGPRCTKT Hang tag 40.0000 PCS
Color/Size/Destination :
91S3 / XS / US
";

    #[test]
    fn format_detection() {
        assert_eq!(detect_format(TAG_PO), PoFormat::Tag);
        assert_eq!(detect_format("Colour/Size/Destination: x"), PoFormat::Classic);
        assert_eq!(detect_format("Sup. Ref.: LB1"), PoFormat::Classic);
        assert_eq!(detect_format("plain text"), PoFormat::Unrecognized);
    }

    #[test]
    fn tag_items_are_aggregated() {
        let po = extract_purchase_order_items(TAG_PO, "Extracted Style Numbers: 11276771", "LB0123456");
        assert_eq!(po.items.len(), 2);
        assert_eq!(
            po.items[0].key(),
            ("11276771".to_string(), "91S3".to_string(), "XS".to_string())
        );
        assert_eq!(po.items[0].quantity, Decimal::from(100));
        assert_eq!(po.items[0].item_number, "1");
        assert_eq!(po.items[0].product_code, "LB0123456");
        assert_eq!(po.items[1].size, "S");
        assert_eq!(po.hang_codes, vec!["LB0123456".to_string()]);
    }

    #[test]
    fn destination_orders() {
        assert_eq!(parse_destination("91S3 / M / US"), ("91S3".into(), "M".into()));
        assert_eq!(parse_destination("XS / 91S3 / US"), ("91S3".into(), "XS".into()));
        assert_eq!(parse_destination("C1 BLACK / L/G / CA"), ("C1".into(), "L".into()));
        assert_eq!(parse_destination("91S3"), ("91S3".into(), String::new()));
        assert_eq!(parse_destination(""), (String::new(), String::new()));
    }

    #[test]
    fn reverse_scan_overrides_size() {
        // a size token buried inside a segment still wins
        assert_eq!(parse_destination("91S3 BLUE M / XL / US"), ("91S3".into(), "XL".into()));
        assert_eq!(parse_destination("91S3 / PINK XL / US"), ("91S3".into(), "XL".into()));
    }

    #[test]
    fn classic_style_falls_back_to_first_token() {
        let text = "Sup. Ref.: LB0123456\n10 ITEM-9 Label 12.5000 PCS\nColour/Size/Destination: 91S3 / L / US\n";
        let po = extract_purchase_order_items(text, "Order 12345678 for 11276771", "LB0123456");
        assert_eq!(po.format, PoFormat::Classic);
        assert_eq!(po.items[0].style, "12345678");
        assert_eq!(po.items[0].quantity, normalize::quantity("12.5"));
    }

    #[test]
    fn unrecognized_layout_has_no_items() {
        let po = extract_purchase_order_items("1 X 5.0 PCS", "", "");
        assert!(po.items.is_empty());
    }
}
