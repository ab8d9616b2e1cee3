// src/line_items/mod.rs

pub mod purchase_order;
pub mod work_order;

pub use purchase_order::{PoFormat, PoItems, extract_purchase_order_items};
pub use work_order::extract_work_order_items;
