//! Stock changes produced by an order and applied by the stock committer.

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Net stock change for one product within one order.
///
/// `decrement` is the total quantity ordered for the product across all lines
/// of the request. `remaining` is the quantity the product is expected to hold
/// afterwards, computed against the snapshot read at validation time. Stores
/// must apply `decrement` conditionally and must not write `remaining` blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub decrement: i64,
    pub remaining: i64,
}

impl StockAdjustment {
    /// Stock level the product had when the adjustment was planned.
    pub fn observed(&self) -> i64 {
        self.remaining + self.decrement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_restores_pre_order_quantity() {
        let adj = StockAdjustment {
            product_id: ProductId::generate(),
            decrement: 4,
            remaining: 6,
        };
        assert_eq!(adj.observed(), 10);
    }
}
