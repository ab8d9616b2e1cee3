// src/heuristics/mod.rs

pub mod purchase_order;
pub mod work_order;

use crate::normalize::collapse_whitespace;
use regex::Regex;

pub use purchase_order::extract_purchase_order_fields;
pub use work_order::extract_work_order_fields;

/// A scalar field: prioritized label patterns plus the labels that commonly
/// follow its value on the same line.
pub struct FieldRule {
    patterns: Vec<Regex>,
    stops: &'static [&'static str],
}

impl FieldRule {
    /// Patterns are compile-time literals with one capture group each.
    pub fn new(patterns: &[&str], stops: &'static [&'static str]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| Regex::new(p).unwrap()).collect(),
            stops,
        }
    }

    /// First pattern with a non-empty capture wins. Never fails; an empty
    /// string means "not found".
    pub fn extract(&self, text: &str) -> String {
        for re in &self.patterns {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.get(1) else { continue };
                let value = clean(&truncate_at(m.as_str(), self.stops));
                if !value.is_empty() {
                    return value;
                }
            }
        }
        String::new()
    }
}

/// Trim and collapse internal whitespace runs.
pub fn clean(raw: &str) -> String {
    collapse_whitespace(raw)
        .trim_matches(|c: char| c == ':' || c == ',' || c.is_whitespace())
        .to_string()
}

/// ASCII case-insensitive `find`.
pub fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// Cut the value at the first stop label it contains.
pub fn truncate_at(value: &str, stops: &[&str]) -> String {
    let cut = stops
        .iter()
        .filter_map(|stop| find_ci(value, stop))
        .min()
        .unwrap_or(value.len());
    value[..cut].to_string()
}

/// Keep the value up to and including the `nth` (1-based) occurrence of `marker`.
pub fn truncate_after(value: &str, marker: &str, nth: usize) -> Option<String> {
    let lower = value.to_ascii_lowercase();
    let needle = marker.to_ascii_lowercase();
    let (pos, _) = lower.match_indices(&needle).nth(nth.checked_sub(1)?)?;
    Some(value[..pos + marker.len()].to_string())
}

/// Text between `start` and the earliest of `ends` (or `max_len` bytes).
pub fn section<'a>(text: &'a str, start: &str, ends: &[&str], max_len: usize) -> Option<&'a str> {
    let begin = find_ci(text, start)? + start.len();
    let rest = &text[begin..];
    let mut end = ends
        .iter()
        .filter_map(|e| find_ci(rest, e))
        .min()
        .unwrap_or(rest.len())
        .min(max_len);
    while !rest.is_char_boundary(end) {
        end -= 1;
    }
    Some(&rest[..end])
}

/// Append if not already present, preserving first occurrence order.
pub fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Collapse a value that is the same phrase written twice ("A B A B" -> "A B"),
/// and drop a leading phrase that is repeated later on.
pub fn fold_duplicates(value: &str) -> String {
    let words: Vec<&str> = value.split_whitespace().collect();
    let n = words.len();
    if n >= 2 && n % 2 == 0 {
        let (a, b) = words.split_at(n / 2);
        if a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y)) {
            return a.join(" ");
        }
    }
    // single repeated words ("Road", "Ltd") are too common to fold
    for len in (2..=n / 2).rev() {
        let head = words[..len].join(" ");
        let tail = words[len..].join(" ");
        if find_ci(&tail, &head).is_some() {
            return tail;
        }
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_matching_pattern_wins() {
        let rule = FieldRule::new(&[r"Alpha:\s*([^\n]*)", r"Beta:\s*([^\n]*)"], &["Gamma:"]);
        assert_eq!(rule.extract("Beta: two\nAlpha: one  Gamma: x"), "one");
        assert_eq!(rule.extract("Beta:   two   words \n"), "two words");
        assert_eq!(rule.extract("nothing here"), "");
    }

    #[test]
    fn empty_capture_falls_through() {
        let rule = FieldRule::new(&[r"Alpha:([^\n]*)", r"Beta:([^\n]*)"], &[]);
        assert_eq!(rule.extract("Alpha:\nBeta: b"), "b");
    }

    #[test]
    fn truncation_helpers() {
        assert_eq!(truncate_at("FA25 Line Item: 1", &["Line Item:"]), "FA25 ");
        assert_eq!(
            truncate_after("Colombo Sri Lanka Tel 123", "Sri Lanka", 1).as_deref(),
            Some("Colombo Sri Lanka")
        );
        assert_eq!(
            truncate_after("Pune India Office India HQ", "india", 2).as_deref(),
            Some("Pune India Office India")
        );
        assert_eq!(truncate_after("Pune India", "India", 2), None);
    }

    #[test]
    fn section_is_bounded() {
        let text = "Header\nProduct Details: code X\nLine Item: 1";
        assert_eq!(
            section(text, "Product Details:", &["Line Item:"], 500),
            Some(" code X\n")
        );
        assert_eq!(section(text, "Missing:", &[], 500), None);
    }

    #[test]
    fn duplicate_folding() {
        assert_eq!(fold_duplicates("ACME Ltd ACME Ltd"), "ACME Ltd");
        assert_eq!(
            fold_duplicates("ACME Ltd ACME Ltd Plot 5 Colombo"),
            "ACME Ltd Plot 5 Colombo"
        );
        assert_eq!(fold_duplicates("Plot 5 Colombo"), "Plot 5 Colombo");
    }
}
