//! Sales orders domain module.
//!
//! This crate contains the business rules for creating a sales order,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).
//! Loading customers/products and persisting the result is the job of
//! `orderflow-infra`.

pub mod error;
pub mod order;
pub mod plan;

pub use error::OrderError;
pub use order::{NewOrder, Order, OrderId, OrderLine, OrderLineRequest};
pub use plan::{OrderPlan, plan_order};
