use rust_decimal::Decimal;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::EngineError;

/// Sentence printed on price-ticket sheets under the quantity table. A header
/// row carrying it means the sheet has no data rows.
pub const TICKET_STOP_SENTENCE: &str =
    "Ticket quantities will be rounded up in minimums and multiples of 100 pcs.";

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub spreadsheet: SpreadsheetConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MatchingConfig {
    /// Largest absolute quantity difference still counted as agreeing.
    #[serde(default)]
    pub quantity_tolerance: Decimal,
    /// Minimum fuzzy score (0-100) for the delivery address to match.
    #[serde(default = "default_address_threshold")]
    pub address_threshold: u8,
}

fn default_address_threshold() -> u8 {
    90
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            quantity_tolerance: Decimal::ZERO,
            address_threshold: default_address_threshold(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SpreadsheetConfig {
    /// 1-based row holding the column headers.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    /// 1-based row that is never read as data.
    #[serde(default = "default_always_skip_row")]
    pub always_skip_row: usize,
    #[serde(default = "default_stop_sentence")]
    pub stop_sentence: String,
}

fn default_header_row() -> usize {
    22
}

fn default_always_skip_row() -> usize {
    23
}

fn default_stop_sentence() -> String {
    TICKET_STOP_SENTENCE.to_string()
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            header_row: default_header_row(),
            always_skip_row: default_always_skip_row(),
            stop_sentence: default_stop_sentence(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let content = fs::read_to_string(&path).map_err(|e| {
            EngineError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, EngineError> {
        let cfg: Config = toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        if cfg.spreadsheet.header_row == 0 {
            return Err(EngineError::Config(
                "spreadsheet.header_row is 1-based and must be positive".to_string(),
            ));
        }
        if cfg.matching.address_threshold > 100 {
            return Err(EngineError::Config(
                "matching.address_threshold must be within 0..=100".to_string(),
            ));
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.matching.address_threshold, 90);
        assert_eq!(cfg.matching.quantity_tolerance, Decimal::ZERO);
        assert_eq!(cfg.spreadsheet.header_row, 22);
        assert_eq!(cfg.spreadsheet.always_skip_row, 23);
        assert_eq!(cfg.spreadsheet.stop_sentence, TICKET_STOP_SENTENCE);
    }

    #[test]
    fn partial_override() {
        let cfg = Config::parse(
            r#"
            [matching]
            address_threshold = 85

            [spreadsheet]
            header_row = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.matching.address_threshold, 85);
        assert_eq!(cfg.spreadsheet.header_row, 10);
        assert_eq!(cfg.spreadsheet.always_skip_row, 23);
    }

    #[test]
    fn rejects_zero_header_row() {
        let err = Config::parse("[spreadsheet]\nheader_row = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Config::load("/nonexistent/order_reconcile.toml").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
