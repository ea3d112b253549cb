//! Order creation pipeline (application-level orchestration).
//!
//! ```text
//! CreateOrder
//!   ↓
//! 1. Resolve customer            (fail: NotFound("customer"))
//!   ↓
//! 2. Resolve referenced products (read-only snapshot)
//!   ↓
//! 3. plan_order                  (pure: validation, price snapshots, stock math)
//!   ↓
//! 4. Commit stock decrements     (conditional per product)
//!   ↓
//! 5. Create order
//!   ↓
//! commit
//! ```
//!
//! Steps 1–5 run inside one [`OrderTransaction`]. Any failure rolls it back,
//! so stock and orders are either both written or both untouched. Errors are
//! returned at the first failing step; nothing is retried.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use orderflow_parties::{Customer, CustomerId};
use orderflow_products::{Product, ProductId, StockAdjustment};
use orderflow_sales::{NewOrder, Order, OrderError, OrderLineRequest, plan_order};

use crate::store::{
    CustomerRepository, OrderRepository, OrderTransaction, ProductRepository, StoreError,
    UnitOfWork,
};

/// Request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLineRequest>,
}

/// Why an order could not be created.
#[derive(Debug, Error)]
pub enum CreateOrderError {
    /// A referenced record does not exist (the customer).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The request was rejected (unknown product, insufficient stock, ...).
    #[error(transparent)]
    Validation(#[from] OrderError),

    /// Reading or writing the store failed.
    #[error("persistence failed: {0}")]
    Persistence(StoreError),
}

impl CreateOrderError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CreateOrderError::Validation(_))
    }
}

impl From<StoreError> for CreateOrderError {
    fn from(value: StoreError) -> Self {
        match value {
            // The conditional write saw less stock than validation did.
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => CreateOrderError::Validation(OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            }),
            StoreError::UnknownProduct(product_id) => {
                CreateOrderError::Validation(OrderError::UnregisteredProduct(product_id))
            }
            other => CreateOrderError::Persistence(other),
        }
    }
}

/// Creates orders against the store bound at startup.
///
/// `U` is any [`UnitOfWork`]: `InMemorySalesStore` in tests/dev,
/// `PostgresSalesStore` in production.
#[derive(Debug, Clone)]
pub struct CreateOrderWorkflow<U> {
    store: U,
}

impl<U> CreateOrderWorkflow<U> {
    pub fn new(store: U) -> Self {
        Self { store }
    }
}

impl<U> CreateOrderWorkflow<U>
where
    U: UnitOfWork,
{
    /// Create an order for `request.customer_id` with `request.lines`.
    ///
    /// On success the returned order's lines mirror the request order and
    /// carry the product prices read inside the transaction.
    #[instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, line_count = request.lines.len())
    )]
    pub async fn create_order(&self, request: CreateOrder) -> Result<Order, CreateOrderError> {
        let mut tx = self.store.begin().await?;

        match execute(&mut tx, request).await {
            Ok(order) => {
                tx.commit().await?;
                info!(
                    order_id = %order.id_typed(),
                    lines = order.lines().len(),
                    total = order.total(),
                    "order created"
                );
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                match &err {
                    CreateOrderError::Persistence(e) => error!(error = %e, "order creation failed"),
                    other => warn!(error = %other, validation = other.is_validation(), "order rejected"),
                }
                Err(err)
            }
        }
    }
}

async fn execute<T>(tx: &mut T, request: CreateOrder) -> Result<Order, CreateOrderError>
where
    T: OrderTransaction,
{
    let customer = resolve_customer(tx, request.customer_id).await?;

    let ids = requested_product_ids(&request.lines);
    let products = resolve_products(tx, &ids).await?;
    debug!(requested = ids.len(), found = products.len(), "products resolved");

    let plan = plan_order(&request.lines, &products)?;

    commit_stock(tx, &plan.adjustments).await?;

    let order = tx
        .create(NewOrder {
            customer,
            lines: plan.lines,
        })
        .await?;
    Ok(order)
}

/// Customer lookup. Fails with `NotFound("customer")` when absent.
pub async fn resolve_customer<R>(repo: &mut R, id: CustomerId) -> Result<Customer, CreateOrderError>
where
    R: CustomerRepository + ?Sized,
{
    repo.find_by_id(id)
        .await?
        .ok_or(CreateOrderError::NotFound("customer"))
}

/// Distinct product ids referenced by `lines`.
pub fn requested_product_ids(lines: &[OrderLineRequest]) -> BTreeSet<ProductId> {
    lines.iter().map(|line| line.product_id).collect()
}

/// Stock resolver: current stock and price for the existing products among `ids`.
///
/// Missing ids are simply absent; `plan_order` reports them.
pub async fn resolve_products<R>(
    repo: &mut R,
    ids: &BTreeSet<ProductId>,
) -> Result<HashMap<ProductId, Product>, CreateOrderError>
where
    R: ProductRepository + ?Sized,
{
    let ids: Vec<ProductId> = ids.iter().copied().collect();
    let found = repo.find_all_by_id(&ids).await?;
    Ok(found
        .into_iter()
        .map(|product| (product.id_typed(), product))
        .collect())
}

/// Stock committer: all adjustments succeed or the call fails.
pub async fn commit_stock<R>(repo: &mut R, adjustments: &[StockAdjustment]) -> Result<(), CreateOrderError>
where
    R: ProductRepository + ?Sized,
{
    repo.update_quantities(adjustments).await?;
    debug!(products = adjustments.len(), "stock committed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_stock_refusal_becomes_validation_error() {
        let product_id = ProductId::generate();
        let err = CreateOrderError::from(StoreError::InsufficientStock {
            product_id,
            requested: 3,
            available: 2,
        });

        assert!(err.is_validation());
        assert!(matches!(
            err,
            CreateOrderError::Validation(OrderError::InsufficientStock { available: 2, .. })
        ));
    }

    #[test]
    fn vanished_product_becomes_unregistered_product() {
        let product_id = ProductId::generate();
        let err = CreateOrderError::from(StoreError::UnknownProduct(product_id));
        assert!(matches!(
            err,
            CreateOrderError::Validation(OrderError::UnregisteredProduct(id)) if id == product_id
        ));
    }

    #[test]
    fn backend_failures_stay_persistence_errors() {
        let err = CreateOrderError::from(StoreError::Backend("down".to_string()));
        assert!(!err.is_validation());
        assert!(matches!(err, CreateOrderError::Persistence(StoreError::Backend(_))));
    }

    #[test]
    fn requested_ids_are_deduplicated() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        let ids = requested_product_ids(&[
            OrderLineRequest::new(a, 1),
            OrderLineRequest::new(b, 1),
            OrderLineRequest::new(a, 2),
        ]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }

    #[test]
    fn create_order_request_reads_from_json() {
        let customer_id = CustomerId::generate();
        let product_id = ProductId::generate();
        let json = serde_json::json!({
            "customer_id": customer_id.to_string(),
            "lines": [{ "product_id": product_id.to_string(), "quantity": 2 }],
        });

        let request: CreateOrder = serde_json::from_value(json).unwrap();
        assert_eq!(request.customer_id, customer_id);
        assert_eq!(request.lines, vec![OrderLineRequest::new(product_id, 2)]);
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(CreateOrderError::NotFound("customer").to_string(), "customer not found");
    }
}
