// src/error.rs

use thiserror::Error;

/// Failures surfaced by the comparison engine.
///
/// Extractors are total and never produce these; malformed quantities and
/// sizes are recovered in place (zero / empty) and only logged.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("document '{name}' is unreadable: {reason}")]
    DocumentUnreadable { name: String, reason: String },

    #[error("sheet '{sheet}' has an unsupported layout: {reason}")]
    SheetLayoutUnsupported { sheet: String, reason: String },

    #[error("no purchase order matches work order PO number '{po_number}'")]
    NoMatchingPo { po_number: String },

    #[error("comparison job was cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn unreadable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentUnreadable {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
