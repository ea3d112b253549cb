//! Persistence boundary for order creation.
//!
//! The workflow talks to storage only through these traits. A request runs
//! inside one [`OrderTransaction`] obtained from a [`UnitOfWork`]: stock
//! decrements and the new order are committed together or not at all.
//!
//! ## Stock writes
//!
//! `ProductRepository::update_quantities` must apply each
//! [`StockAdjustment`] as a single conditional operation ("decrement by D only
//! if quantity >= D"). A refused decrement is reported as
//! [`StoreError::InsufficientStock`], never silently clamped. This closes the
//! check-then-act race between two requests that validated against the same
//! stock level.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use orderflow_parties::{Customer, CustomerId};
use orderflow_products::{Product, ProductId, StockAdjustment};
use orderflow_sales::{NewOrder, Order};

pub use in_memory::{InMemorySalesStore, InMemoryTransaction};
pub use postgres::{PostgresSalesStore, PostgresTransaction};

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to domain errors, except
/// `InsufficientStock` and `UnknownProduct`, which report a conditional write
/// refused because the stored state moved since it was read.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("concurrent write conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// The adjustment itself is malformed (e.g. a non-positive decrement).
    #[error("invalid stock adjustment for product {product_id}: {reason}")]
    InvalidAdjustment { product_id: ProductId, reason: String },

    #[error("injected fault: {0}")]
    FaultInjected(&'static str),
}

/// Customer lookup.
#[async_trait]
pub trait CustomerRepository: Send {
    async fn find_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError>;
}

/// Product lookup and stock writes.
#[async_trait]
pub trait ProductRepository: Send {
    /// Load the products among `ids` that exist. Missing ids are absent from
    /// the result; order is unspecified.
    async fn find_all_by_id(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    /// Apply every adjustment as a conditional decrement. Fails on the first
    /// adjustment that cannot be applied.
    async fn update_quantities(&mut self, adjustments: &[StockAdjustment]) -> Result<(), StoreError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderRepository: Send {
    /// Persist `order`, assigning its identifier and creation time.
    async fn create(&mut self, order: NewOrder) -> Result<Order, StoreError>;
}

/// One atomic unit of order creation.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait OrderTransaction: CustomerRepository + ProductRepository + OrderRepository {
    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

/// Source of transactions (the concrete store bound at startup).
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Tx: OrderTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
impl<U> UnitOfWork for Arc<U>
where
    U: UnitOfWork + ?Sized,
{
    type Tx = U::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}
