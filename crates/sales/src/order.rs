use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{Entity, ValueObject};
use orderflow_parties::{Customer, CustomerId};
use orderflow_products::ProductId;

orderflow_core::typed_id!(
    /// Sales order identifier.
    OrderId
);

/// One requested line as submitted by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl OrderLineRequest {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Order line: product, quantity and the unit price captured at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// 1-based position of the line in the request.
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

impl OrderLine {
    pub fn subtotal(&self) -> u64 {
        self.unit_price.saturating_mul(self.quantity.max(0) as u64)
    }
}

impl ValueObject for OrderLine {}

/// Order ready to be persisted (no identifier assigned yet).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
}

/// A created sales order. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    lines: Vec<OrderLine>,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Build the persisted representation. Only stores call this, once the
    /// identifier has been assigned.
    pub fn new(
        id: OrderId,
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            lines,
            created_at,
        }
    }

    /// Assign an identifier and creation time to a pending order.
    pub fn from_new(new_order: NewOrder, id: OrderId, created_at: DateTime<Utc>) -> Self {
        Self::new(id, new_order.customer.id_typed(), new_order.lines, created_at)
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Order total in the smallest currency unit.
    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .fold(0u64, |acc, line| acc.saturating_add(line.subtotal()))
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
