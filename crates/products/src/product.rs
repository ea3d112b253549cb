use serde::{Deserialize, Serialize};

use orderflow_core::{DomainError, DomainResult, Entity};

orderflow_core::typed_id!(
    /// Product identifier.
    ProductId
);

/// Catalog product with its available stock.
///
/// `price` is in the smallest currency unit (e.g. cents). `quantity` is the
/// available stock and never drops below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    price: u64,
    quantity: i64,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: u64, quantity: i64) -> DomainResult<Self> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(DomainError::validation("product name must not be empty"));
        }
        if quantity < 0 {
            return Err(DomainError::validation("quantity must not be negative"));
        }

        Ok(Self {
            id,
            name,
            price,
            quantity,
        })
    }

    /// Rebuild a catalog product as stored.
    ///
    /// Only the stock invariant is checked; catalog fields are taken as-is.
    pub fn from_record(id: ProductId, name: String, price: u64, quantity: i64) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stored stock for product {id} is negative ({quantity})"
            )));
        }

        Ok(Self {
            id,
            name,
            price,
            quantity,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn has_stock_for(&self, requested: i64) -> bool {
        requested <= self.quantity
    }

    /// Remove `amount` units from stock.
    ///
    /// Conditional: refuses (and leaves stock untouched) when `amount` is not
    /// positive or exceeds the available quantity.
    pub fn withdraw(&mut self, amount: i64) -> DomainResult<i64> {
        if amount <= 0 {
            return Err(DomainError::validation("withdrawn quantity must be positive"));
        }
        if !self.has_stock_for(amount) {
            return Err(DomainError::invariant(format!(
                "insufficient stock for product {}: requested {amount}, available {}",
                self.id, self.quantity
            )));
        }

        self.quantity -= amount;
        Ok(self.quantity)
    }

    /// Catalog-side price change. Orders already placed keep their snapshot.
    pub fn reprice(&mut self, price: u64) {
        self.price = price;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_records_skip_catalog_validation_but_not_stock() {
        let id = ProductId::generate();

        let product = Product::from_record(id, String::new(), 90, 3).unwrap();
        assert_eq!(product.name(), "");
        assert_eq!(product.quantity(), 3);

        let err = Product::from_record(id, "Widget".to_string(), 90, -1).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    fn product(quantity: i64) -> Product {
        Product::new(ProductId::generate(), "Widget", 250, quantity).unwrap()
    }

    #[test]
    fn new_rejects_negative_stock() {
        let err = Product::new(ProductId::generate(), "Widget", 250, -1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn new_rejects_blank_name() {
        let err = Product::new(ProductId::generate(), "", 250, 1).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn withdraw_decrements_and_returns_remaining() {
        let mut p = product(10);
        assert_eq!(p.withdraw(4).unwrap(), 6);
        assert_eq!(p.quantity(), 6);
    }

    #[test]
    fn withdraw_can_empty_the_stock() {
        let mut p = product(3);
        assert_eq!(p.withdraw(3).unwrap(), 0);
    }

    #[test]
    fn withdraw_more_than_available_leaves_stock_untouched() {
        let mut p = product(2);
        let err = p.withdraw(5).unwrap_err();

        assert!(matches!(err, DomainError::InvariantViolation(ref msg) if msg.contains("insufficient stock")));
        assert_eq!(p.quantity(), 2);
    }

    #[test]
    fn withdraw_rejects_non_positive_amounts() {
        let mut p = product(2);
        assert!(p.withdraw(0).is_err());
        assert!(p.withdraw(-3).is_err());
        assert_eq!(p.quantity(), 2);
    }

    #[test]
    fn reprice_does_not_touch_stock() {
        let mut p = product(7);
        p.reprice(999);
        assert_eq!(p.price(), 999);
        assert_eq!(p.quantity(), 7);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: stock never goes negative, whatever sequence of withdrawals is attempted.
            #[test]
            fn stock_never_negative(
                initial in 0i64..1_000,
                attempts in prop::collection::vec(-10i64..200, 0..30)
            ) {
                let mut p = product(initial);
                let mut expected = initial;

                for amount in attempts {
                    match p.withdraw(amount) {
                        Ok(remaining) => {
                            expected -= amount;
                            prop_assert_eq!(remaining, expected);
                        }
                        Err(_) => prop_assert_eq!(p.quantity(), expected),
                    }
                    prop_assert!(p.quantity() >= 0);
                }
            }
        }
    }
}
