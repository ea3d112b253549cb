//! Products domain module (catalog entries with finite stock).
//!
//! This crate contains the stock rules for products, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;
pub mod stock;

pub use product::{Product, ProductId};
pub use stock::StockAdjustment;
