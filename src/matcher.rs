// src/matcher.rs
//
// Pairs WO items with PO items on (style, colour, size, quantity).

use crate::model::LineItem;
use crate::normalize;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchKind {
    #[serde(rename = "Full Match")]
    FullMatch,
    #[serde(rename = "Partial Match")]
    PartialMatch,
    #[serde(rename = "No PO Match")]
    NoPoMatch,
    #[serde(rename = "Extra PO Item")]
    ExtraPoItem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRow {
    pub kind: MatchKind,
    pub wo: Option<LineItem>,
    pub po: Option<LineItem>,
    pub style_match: bool,
    pub color_match: bool,
    pub size_match: bool,
    pub quantity_match: bool,
    /// WO quantity minus PO quantity; zero for orphan rows.
    pub quantity_diff: Decimal,
}

impl MatchRow {
    fn paired(kind: MatchKind, wo: &LineItem, po: LineItem, agreement: Agreement) -> Self {
        Self {
            kind,
            quantity_diff: wo.quantity - po.quantity,
            wo: Some(wo.clone()),
            po: Some(po),
            style_match: agreement.style,
            color_match: agreement.color,
            size_match: agreement.size,
            quantity_match: agreement.quantity,
        }
    }

    fn orphan(kind: MatchKind, wo: Option<LineItem>, po: Option<LineItem>) -> Self {
        Self {
            kind,
            wo,
            po,
            style_match: false,
            color_match: false,
            size_match: false,
            quantity_match: false,
            quantity_diff: Decimal::ZERO,
        }
    }

    /// Size of whichever side is present, for ordering.
    fn size(&self) -> &str {
        self.wo
            .as_ref()
            .or(self.po.as_ref())
            .map(|i| i.size.as_str())
            .unwrap_or("")
    }
}

/// Paired rows (full and partial) and orphan rows (no PO match, extra PO).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub matched: Vec<MatchRow>,
    pub mismatched: Vec<MatchRow>,
}

impl MatchOutcome {
    pub fn is_perfect(&self) -> bool {
        self.mismatched.is_empty() && self.matched.iter().all(|r| r.kind == MatchKind::FullMatch)
    }

    pub fn count(&self, kind: MatchKind) -> usize {
        self.matched
            .iter()
            .chain(&self.mismatched)
            .filter(|r| r.kind == kind)
            .count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchOptions {
    /// Largest |WO qty - PO qty| still counted as agreeing.
    pub quantity_tolerance: Decimal,
    /// Authoritative style from a spreadsheet, used for PO items without one.
    pub backfill_style: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Agreement {
    style: bool,
    color: bool,
    size: bool,
    quantity: bool,
}

impl Agreement {
    fn of(wo: &LineItem, po: &LineItem, tolerance: Decimal) -> Self {
        Self {
            style: wo.style == po.style,
            color: normalize::color_code(&wo.color_code) == normalize::color_code(&po.color_code),
            size: wo.size == po.size,
            quantity: (wo.quantity - po.quantity).abs() <= tolerance,
        }
    }

    fn score(&self) -> u8 {
        [self.style, self.color, self.size, self.quantity]
            .iter()
            .filter(|b| **b)
            .count() as u8
    }

    fn is_full(&self) -> bool {
        self.score() == 4
    }
}

/// Match WO items against PO items.
///
/// Each PO item is consumed at most once. Full matches are taken first for
/// each WO item; otherwise the best-scoring unused PO item (earliest on ties)
/// becomes a partial match. A WO item that agrees with no unused PO item on
/// any component has no PO match; PO items left over are extras.
pub fn match_items(wo_items: &[LineItem], po_items: &[LineItem], options: &MatchOptions) -> MatchOutcome {
    let tolerance = options.quantity_tolerance;
    let po_items: Vec<LineItem> = po_items
        .iter()
        .map(|item| backfill(item, options.backfill_style.as_deref()))
        .collect();
    let mut used = vec![false; po_items.len()];
    let mut outcome = MatchOutcome::default();

    for wo in wo_items {
        let unused = || po_items.iter().enumerate().filter(|(i, _)| !used[*i]);

        let full = unused().find(|(_, po)| Agreement::of(wo, po, tolerance).is_full());
        if let Some((i, po)) = full {
            let agreement = Agreement::of(wo, po, tolerance);
            outcome
                .matched
                .push(MatchRow::paired(MatchKind::FullMatch, wo, po.clone(), agreement));
            used[i] = true;
            continue;
        }

        // max_by_key keeps the last maximum; reverse so ties go to the earliest index
        let best = unused()
            .map(|(i, po)| (i, Agreement::of(wo, po, tolerance)))
            .filter(|(_, a)| a.score() > 0)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .max_by_key(|(_, a)| a.score());

        match best {
            Some((i, agreement)) => {
                outcome.matched.push(MatchRow::paired(
                    MatchKind::PartialMatch,
                    wo,
                    po_items[i].clone(),
                    agreement,
                ));
                used[i] = true;
            }
            None => {
                outcome
                    .mismatched
                    .push(MatchRow::orphan(MatchKind::NoPoMatch, Some(wo.clone()), None));
            }
        }
    }

    for (po, _) in po_items.iter().zip(&used).filter(|(_, u)| !**u) {
        outcome
            .mismatched
            .push(MatchRow::orphan(MatchKind::ExtraPoItem, None, Some(po.clone())));
    }

    outcome.matched.sort_by_key(|r| normalize::size_rank(r.size()));
    outcome.mismatched.sort_by_key(|r| normalize::size_rank(r.size()));

    debug!(
        full = outcome.count(MatchKind::FullMatch),
        partial = outcome.count(MatchKind::PartialMatch),
        no_po = outcome.count(MatchKind::NoPoMatch),
        extra = outcome.count(MatchKind::ExtraPoItem),
        "Items matched"
    );
    outcome
}

fn backfill(item: &LineItem, style: Option<&str>) -> LineItem {
    match style {
        Some(style) if item.style.is_empty() => LineItem {
            style: style.to_string(),
            ..item.clone()
        },
        _ => item.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(style: &str, color: &str, size: &str, qty: i64) -> LineItem {
        LineItem::new(style, color, size, Decimal::from(qty))
    }

    fn wo() -> Vec<LineItem> {
        vec![
            item("11276771", "91S3", "S", 200),
            item("11276771", "91S3", "XS", 100),
        ]
    }

    #[test]
    fn full_matches_sorted_by_size() {
        let po = vec![
            item("11276771", "91S3", "XS", 100),
            item("11276771", "91S3", "S", 200),
        ];
        let out = match_items(&wo(), &po, &MatchOptions::default());
        assert!(out.is_perfect());
        let sizes: Vec<&str> = out.matched.iter().map(|r| r.size()).collect();
        assert_eq!(sizes, vec!["XS", "S"]);
    }

    #[test]
    fn partial_match_reports_flags_and_diff() {
        let po = vec![item("11276771", "91S3", "XS", 90), item("11276771", "91S3", "S", 200)];
        let out = match_items(&wo(), &po, &MatchOptions::default());
        assert!(!out.is_perfect());
        let partial = &out.matched[0];
        assert_eq!(partial.kind, MatchKind::PartialMatch);
        assert!(partial.style_match && partial.color_match && partial.size_match);
        assert!(!partial.quantity_match);
        assert_eq!(partial.quantity_diff, Decimal::from(10));
    }

    #[test]
    fn tolerance_turns_partial_into_full() {
        let po = vec![item("11276771", "91S3", "XS", 99), item("11276771", "91S3", "S", 200)];
        let options = MatchOptions {
            quantity_tolerance: Decimal::from(1),
            ..MatchOptions::default()
        };
        assert!(match_items(&wo(), &po, &options).is_perfect());
    }

    #[test]
    fn ties_go_to_earliest_po_item() {
        let wo = vec![item("11276771", "91S3", "M", 10)];
        let po = vec![item("11276771", "AAAA", "L", 1), item("11276771", "BBBB", "XL", 2)];
        let out = match_items(&wo, &po, &MatchOptions::default());
        assert_eq!(out.matched[0].po.as_ref().unwrap().color_code, "AAAA");
        assert_eq!(out.count(MatchKind::ExtraPoItem), 1);
    }

    #[test]
    fn orphans_on_both_sides() {
        let wo = vec![item("11111111", "ZZ", "M", 5)];
        let po = vec![item("22222222", "YY", "L", 50)];
        let out = match_items(&wo, &po, &MatchOptions::default());
        assert!(out.matched.is_empty());
        assert_eq!(out.mismatched.len(), 2);
        assert_eq!(out.mismatched[0].kind, MatchKind::NoPoMatch);
        assert!(out.mismatched[0].po.is_none());
        assert_eq!(out.mismatched[1].kind, MatchKind::ExtraPoItem);
        assert!(out.mismatched[1].wo.is_none());
    }

    #[test]
    fn each_po_item_used_once() {
        let wo = vec![item("1", "A", "S", 1), item("1", "A", "S", 1)];
        let po = vec![item("1", "A", "S", 1), item("1", "A", "M", 7)];
        let out = match_items(&wo, &po, &MatchOptions::default());
        let mut used: Vec<LineItem> = out
            .matched
            .iter()
            .filter_map(|r| r.po.clone())
            .chain(out.mismatched.iter().filter(|r| r.kind == MatchKind::ExtraPoItem).filter_map(|r| r.po.clone()))
            .collect();
        used.sort_by(|a, b| a.size.cmp(&b.size));
        let mut expected = po.clone();
        expected.sort_by(|a, b| a.size.cmp(&b.size));
        assert_eq!(used, expected);
        assert_eq!(out.count(MatchKind::FullMatch), 1);
        assert_eq!(out.count(MatchKind::PartialMatch), 1);
    }

    #[test]
    fn reordering_po_keeps_full_partition() {
        let mut po = vec![
            item("11276771", "91S3", "XS", 100),
            item("11276771", "91S3", "S", 200),
        ];
        let a = match_items(&wo(), &po, &MatchOptions::default());
        po.reverse();
        let b = match_items(&wo(), &po, &MatchOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn color_slash_is_equivalent() {
        let wo = vec![item("1", "C/1", "S", 1)];
        let po = vec![item("1", "C1", "S", 1)];
        assert!(match_items(&wo, &po, &MatchOptions::default()).is_perfect());
    }

    #[test]
    fn backfill_only_fills_empty_po_styles() {
        let po = vec![item("", "91S3", "XS", 100), item("11276771", "91S3", "S", 200)];
        let options = MatchOptions {
            backfill_style: Some("11276771".to_string()),
            ..MatchOptions::default()
        };
        let out = match_items(&wo(), &po, &options);
        assert!(out.is_perfect());
        assert_eq!(out.matched[0].po.as_ref().unwrap().style, "11276771");
        assert_eq!(po[0].style, "");

        let unfilled = match_items(&wo(), &po, &MatchOptions::default());
        assert!(!unfilled.is_perfect());
    }

    #[test]
    fn empty_inputs() {
        let out = match_items(&[], &[], &MatchOptions::default());
        assert!(out.matched.is_empty() && out.mismatched.is_empty());
        assert!(out.is_perfect());
    }
}
