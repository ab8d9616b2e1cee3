// src/verdict.rs

use crate::compare::{AddressResult, CodeMatch, ProductCodeRow, SoColorRow, VsbaParity};
use crate::matcher::MatchOutcome;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    #[serde(rename = "Perfect Match")]
    PerfectMatch,
    #[serde(rename = "Review Required")]
    ReviewRequired,
}

/// A failing predicate, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    #[serde(rename = "Address mismatch")]
    AddressMismatch,
    #[serde(rename = "Product code mismatch")]
    ProductCodeMismatch,
    #[serde(rename = "Item matching issues")]
    ItemMatchingIssues,
    #[serde(rename = "Spreadsheet mismatch")]
    SpreadsheetMismatch,
    #[serde(rename = "SO/colour mismatch")]
    SoColorMismatch,
    #[serde(rename = "VSBA mismatch")]
    VsbaMismatch,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::AddressMismatch => "Address mismatch",
            FailureReason::ProductCodeMismatch => "Product code mismatch",
            FailureReason::ItemMatchingIssues => "Item matching issues",
            FailureReason::SpreadsheetMismatch => "Spreadsheet mismatch",
            FailureReason::SoColorMismatch => "SO/colour mismatch",
            FailureReason::VsbaMismatch => "VSBA mismatch",
        };
        f.write_str(s)
    }
}

/// Everything the verdict depends on.
pub struct VerdictInputs<'a> {
    pub address: &'a AddressResult,
    pub product_codes: &'a [ProductCodeRow],
    pub items: &'a MatchOutcome,
    /// One outcome per spreadsheet sheet, WO items against sheet rows.
    pub spreadsheets: &'a [MatchOutcome],
    pub so_colors: &'a [SoColorRow],
    pub vsba: VsbaParity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictReport {
    pub verdict: Verdict,
    pub reasons: Vec<FailureReason>,
}

impl VerdictReport {
    pub fn is_perfect(&self) -> bool {
        self.verdict == Verdict::PerfectMatch
    }
}

pub fn evaluate(inputs: &VerdictInputs<'_>) -> VerdictReport {
    let checks = [
        (inputs.address.matched, FailureReason::AddressMismatch),
        (
            inputs
                .product_codes
                .iter()
                .all(|r| matches!(r.status, CodeMatch::ExactMatch | CodeMatch::PartialMatch)),
            FailureReason::ProductCodeMismatch,
        ),
        (inputs.items.is_perfect(), FailureReason::ItemMatchingIssues),
        (
            inputs.spreadsheets.iter().all(MatchOutcome::is_perfect),
            FailureReason::SpreadsheetMismatch,
        ),
        (
            inputs.so_colors.iter().all(SoColorRow::matched),
            FailureReason::SoColorMismatch,
        ),
        (inputs.vsba.holds(), FailureReason::VsbaMismatch),
    ];

    let reasons: Vec<FailureReason> = checks
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, reason)| reason)
        .collect();
    let verdict = if reasons.is_empty() {
        Verdict::PerfectMatch
    } else {
        Verdict::ReviewRequired
    };
    VerdictReport { verdict, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchKind, MatchRow};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn address(matched: bool) -> AddressResult {
        AddressResult {
            name_score: 0,
            address_score: 0,
            score: if matched { 100 } else { 0 },
            threshold: 90,
            matched,
        }
    }

    fn extra_row() -> MatchRow {
        MatchRow {
            kind: MatchKind::ExtraPoItem,
            wo: None,
            po: None,
            style_match: false,
            color_match: false,
            size_match: false,
            quantity_match: false,
            quantity_diff: Decimal::ZERO,
        }
    }

    #[test]
    fn all_predicates_hold() {
        let items = MatchOutcome::default();
        let report = evaluate(&VerdictInputs {
            address: &address(true),
            product_codes: &[],
            items: &items,
            spreadsheets: &[],
            so_colors: &[],
            vsba: VsbaParity { wo: false, po: false },
        });
        assert!(report.is_perfect());
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn reasons_are_listed_in_order() {
        let items = MatchOutcome {
            matched: vec![],
            mismatched: vec![extra_row()],
        };
        let codes = [ProductCodeRow {
            wo_code: "LB1".into(),
            po_code: "LB2".into(),
            status: CodeMatch::NoMatch,
        }];
        let so = [SoColorRow {
            color: "91S3".into(),
            so_number: None,
        }];
        let report = evaluate(&VerdictInputs {
            address: &address(false),
            product_codes: &codes,
            items: &items,
            spreadsheets: std::slice::from_ref(&items),
            so_colors: &so,
            vsba: VsbaParity { wo: true, po: false },
        });
        assert_eq!(report.verdict, Verdict::ReviewRequired);
        assert_eq!(
            report.reasons,
            vec![
                FailureReason::AddressMismatch,
                FailureReason::ProductCodeMismatch,
                FailureReason::ItemMatchingIssues,
                FailureReason::SpreadsheetMismatch,
                FailureReason::SoColorMismatch,
                FailureReason::VsbaMismatch,
            ]
        );
        assert_eq!(report.reasons[2].to_string(), "Item matching issues");
    }

    #[test]
    fn serialized_labels() {
        assert_eq!(
            serde_json::to_string(&Verdict::PerfectMatch).unwrap(),
            "\"Perfect Match\""
        );
        assert_eq!(
            serde_json::to_string(&FailureReason::VsbaMismatch).unwrap(),
            "\"VSBA mismatch\""
        );
    }
}
