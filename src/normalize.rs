// src/normalize.rs

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

/// Canonical sizes in display order. Anything else sorts after these.
pub const CANONICAL_SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL", "XXXL", "P", "G", "XG", "XXG"];

/// Second halves of combined size labels (`XS/XP`, `L/G`, ...).
pub const SIZE_SUFFIXES: &[&str] = &["XP", "P", "M", "G", "XG", "XXG"];

/// Spreadsheet size codes, 33901..=33906.
const NUMERIC_SIZE_CODES: &[(&str, &str)] = &[
    ("33901", "XS"),
    ("33902", "S"),
    ("33903", "M"),
    ("33904", "L"),
    ("33905", "XL"),
    ("33906", "XXL"),
];

const PO_PREFIXES: &[&str] = &["P.O#", "P.O.", "PO#", "BFF", "PO"];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Uppercase, strip known prefixes, keep digits and hyphens.
pub fn po_number(raw: &str) -> String {
    let mut s = raw.trim().to_uppercase();
    loop {
        let trimmed = s.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '-');
        let Some(prefix) = PO_PREFIXES.iter().find(|p| trimmed.starts_with(**p)) else {
            s = trimmed.to_string();
            break;
        };
        s = trimmed[prefix.len()..].to_string();
    }
    let kept: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '-').collect();
    kept.trim_matches('-').to_string()
}

/// Uppercase, keep alphanumerics and hyphens, drop any trailing VSBA marker.
pub fn product_code(raw: &str) -> String {
    let mut s: String = raw
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    loop {
        let before = s.len();
        if let Some(stripped) = s.strip_suffix("VSBA") {
            s = stripped.to_string();
        }
        s = s.trim_end_matches('-').to_string();
        if s.len() == before {
            break;
        }
    }
    s
}

/// Uppercase alphanumerics only. Used for substring containment checks.
pub fn alphanumeric_upper(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Uppercase with slashes and whitespace removed, so `C/1` and `C1` agree.
pub fn color_code(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| *c != '/' && !c.is_whitespace())
        .collect()
}

// ---------------------------------------------------------------------------
// Sizes
// ---------------------------------------------------------------------------

pub fn is_canonical_size(s: &str) -> bool {
    CANONICAL_SIZES.contains(&s)
}

/// Position in the canonical size order; unknown sizes rank last.
pub fn size_rank(size: &str) -> usize {
    CANONICAL_SIZES
        .iter()
        .position(|s| *s == size)
        .unwrap_or(CANONICAL_SIZES.len())
}

/// Join the fragments of a size cell that wraps over several lines.
///
/// `"XS/\nXP"` and `"XS\nXP"` both become `"XS/XP"`.
pub fn join_size_lines(cell: &str) -> String {
    let mut out = String::new();
    for fragment in cell.lines().map(str::trim).filter(|f| !f.is_empty()) {
        if !out.is_empty() && !out.ends_with('/') && !fragment.starts_with('/') {
            out.push('/');
        }
        out.push_str(fragment);
    }
    out.to_uppercase()
}

/// Canonical size for a raw cell or token, or empty when it is not a size.
pub fn size(raw: &str) -> String {
    let joined = join_size_lines(raw);
    let compact: String = joined.chars().filter(|c| !c.is_whitespace()).collect();
    if is_canonical_size(&compact) {
        return compact;
    }
    if let Some(mapped) = numeric_size_code(&compact) {
        return mapped.to_string();
    }
    if let Some((left, _)) = compact.split_once('/') {
        if is_canonical_size(left) {
            return left.to_string();
        }
    }
    if !compact.is_empty() {
        debug!(raw = %raw, "Malformed size, treating as empty");
    }
    String::new()
}

/// Map a spreadsheet size code (33901..=33906, possibly written `33901.0`).
pub fn numeric_size_code(raw: &str) -> Option<&'static str> {
    let code = decimal(raw.trim());
    NUMERIC_SIZE_CODES
        .iter()
        .find(|(k, _)| *k == code)
        .map(|(_, v)| *v)
}

// ---------------------------------------------------------------------------
// Addresses and numbers
// ---------------------------------------------------------------------------

/// Lowercase, drop commas and `#`, collapse whitespace.
pub fn address(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| *c != ',' && *c != '#')
        .collect();
    collapse_whitespace(&cleaned)
}

/// Strip a trailing `.0` left over from float-typed cells.
pub fn decimal(raw: &str) -> String {
    let s = raw.trim();
    s.strip_suffix(".0").unwrap_or(s).to_string()
}

/// Strip `$` and trailing zeros after the decimal point.
pub fn retail(raw: &str) -> String {
    let s: String = raw
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

/// Parse a quantity, rounded to four decimal places. Invalid input is zero.
pub fn quantity(raw: &str) -> Decimal {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    match Decimal::from_str(&cleaned) {
        Ok(q) if q.is_sign_negative() => {
            debug!(raw = %raw, "Negative quantity, treating as zero");
            Decimal::ZERO
        }
        Ok(q) => q.round_dp(4),
        Err(_) => {
            debug!(raw = %raw, "Malformed quantity, treating as zero");
            Decimal::ZERO
        }
    }
}

/// Quantity rendered without trailing zeros, for field comparison.
pub fn quantity_text(q: Decimal) -> String {
    if q.is_zero() {
        String::new()
    } else {
        q.normalize().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn po_number_prefixes() {
        assert_eq!(po_number("PO# 1234567"), "1234567");
        assert_eq!(po_number("bff-12345678"), "12345678");
        assert_eq!(po_number("P.O. 7654321"), "7654321");
        assert_eq!(po_number("P.O#7654321"), "7654321");
        assert_eq!(po_number("BFF PO 1234-5678"), "1234-5678");
        assert_eq!(po_number("  9876543 "), "9876543");
        assert_eq!(po_number(""), "");
    }

    #[test]
    fn normalizers_are_idempotent() {
        for raw in ["PO# 1234567", "bff-1234-5", "P.O. 77", "abc"] {
            let once = po_number(raw);
            assert_eq!(po_number(&once), once);
        }
        for raw in ["LB0123456-VSBA", "lb 0123456vsbavsba", "TAG-1", "-VSBA"] {
            let once = product_code(raw);
            assert_eq!(product_code(&once), once);
        }
        for raw in ["C/1", "c 12", "91S3"] {
            let once = color_code(raw);
            assert_eq!(color_code(&once), once);
        }
        for raw in ["XS/XP", "s/p", "XS/\nXP", "XXL", "33902.0", "bogus"] {
            let once = size(raw);
            assert_eq!(size(&once), once);
        }
    }

    #[test]
    fn product_code_strips_vsba() {
        assert_eq!(product_code("lb0123456-vsba"), "LB0123456");
        assert_eq!(product_code("LB 0123456 VSBA"), "LB0123456");
        assert_eq!(product_code("TAG_12-34"), "TAG12-34");
    }

    #[test]
    fn color_slash_equivalence() {
        assert_eq!(color_code("C/1"), color_code("C1"));
        assert_eq!(color_code("c/123"), "C123");
    }

    #[test]
    fn combined_sizes_take_left_half() {
        assert_eq!(size("XS/XP"), "XS");
        assert_eq!(size("S/P"), "S");
        assert_eq!(size("M/M"), "M");
        assert_eq!(size("L/G"), "L");
        assert_eq!(size("XL/XG"), "XL");
        assert_eq!(size("XXG"), "XXG");
        assert_eq!(size("xs"), "XS");
        assert_eq!(size("XS/\nXP"), "XS");
        assert_eq!(size("32B"), "");
    }

    #[test]
    fn multi_line_size_cells_join_with_slash() {
        assert_eq!(join_size_lines("XS/\nXP"), "XS/XP");
        assert_eq!(join_size_lines("XS\nXP"), "XS/XP");
        assert_eq!(join_size_lines("M"), "M");
    }

    #[test]
    fn size_ranking() {
        assert!(size_rank("XS") < size_rank("S"));
        assert!(size_rank("XXXL") < size_rank("P"));
        assert_eq!(size_rank("?"), CANONICAL_SIZES.len());
    }

    #[test]
    fn numeric_codes() {
        assert_eq!(numeric_size_code("33901"), Some("XS"));
        assert_eq!(numeric_size_code("33906.0"), Some("XXL"));
        assert_eq!(numeric_size_code("33907"), None);
        assert_eq!(size("33903"), "M");
    }

    #[test]
    fn address_cleanup() {
        assert_eq!(address("  Plot #12,  Building 4\nColombo "), "plot 12 building 4 colombo");
    }

    #[test]
    fn retail_and_decimal() {
        assert_eq!(retail("$12.50"), "12.5");
        assert_eq!(retail("$12.00"), "12");
        assert_eq!(retail("15"), "15");
        assert_eq!(decimal("11276771.0"), "11276771");
        assert_eq!(decimal("12.05"), "12.05");
    }

    #[test]
    fn quantity_parsing() {
        assert_eq!(quantity("1,200"), Decimal::from(1200));
        assert_eq!(quantity("100.00006"), Decimal::from_str("100.0001").unwrap());
        assert_eq!(quantity(""), Decimal::ZERO);
        assert_eq!(quantity("n/a"), Decimal::ZERO);
        assert_eq!(quantity("-5"), Decimal::ZERO);
        assert_eq!(quantity_text(quantity("300.0000")), "300");
    }
}
