use thiserror::Error;

use orderflow_products::ProductId;

/// Reasons an order request is rejected before anything is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order must contain at least one line")]
    EmptyOrder,

    #[error("quantity for product {product_id} must be positive (got {quantity})")]
    NonPositiveQuantity { product_id: ProductId, quantity: i64 },

    #[error("unregistered product: {0}")]
    UnregisteredProduct(ProductId),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("order has too many lines: line {index} cannot be numbered")]
    TooManyLines { index: usize },
}
