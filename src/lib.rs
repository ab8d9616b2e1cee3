//! Work Order / Purchase Order reconciliation for apparel orders.
//!
//! A job reads one WO PDF, the candidate PO PDFs and any price-ticket
//! workbooks, extracts a normalized record from each, and compares them
//! field by field and item by item before issuing a verdict.

pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod heuristics;
pub mod line_items;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod pdf_extract;
pub mod spreadsheet;
pub mod tables;
pub mod verdict;

pub use config::Config;
pub use engine::{CancelToken, ComparisonRequest, ComparisonResult, DocumentSource, Engine};
pub use error::EngineError;
pub use verdict::{FailureReason, Verdict};
