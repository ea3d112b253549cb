//! Parties domain module (customers).
//!
//! Customers are owned by an external registry; the order workflow only reads
//! them to confirm that the ordering party exists.

pub mod customer;

pub use customer::{Customer, CustomerId};
