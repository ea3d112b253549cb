//! Order validation and stock reduction.
//!
//! `plan_order` is the decision step of order creation. It runs entirely
//! against an in-memory snapshot of the resolved products, so a rejected
//! request never causes a write.

use std::collections::HashMap;

use orderflow_products::{Product, ProductId, StockAdjustment};

use crate::error::OrderError;
use crate::order::{OrderLine, OrderLineRequest};

/// Outcome of a successful validation: the lines to persist and the stock
/// changes to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    /// One line per requested line, in request order.
    pub lines: Vec<OrderLine>,
    /// One adjustment per distinct product, in order of first mention.
    pub adjustments: Vec<StockAdjustment>,
}

/// Validate `requested` against `products` and compute price snapshots and
/// post-order stock levels.
///
/// Lines are checked in caller order:
/// - empty requests are rejected,
/// - quantities must be positive,
/// - every product must be present in `products`,
/// - every quantity must fit in the stock still available after the earlier
///   lines of the same request (repeated products accumulate).
///
/// The first failing line aborts the whole plan.
pub fn plan_order(
    requested: &[OrderLineRequest],
    products: &HashMap<ProductId, Product>,
) -> Result<OrderPlan, OrderError> {
    if requested.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let mut lines = Vec::with_capacity(requested.len());
    let mut adjustments: Vec<StockAdjustment> = Vec::new();
    let mut slot_by_product: HashMap<ProductId, usize> = HashMap::new();

    for (idx, request) in requested.iter().enumerate() {
        if request.quantity <= 0 {
            return Err(OrderError::NonPositiveQuantity {
                product_id: request.product_id,
                quantity: request.quantity,
            });
        }

        let product = products
            .get(&request.product_id)
            .ok_or(OrderError::UnregisteredProduct(request.product_id))?;

        let slot = *slot_by_product.entry(request.product_id).or_insert_with(|| {
            adjustments.push(StockAdjustment {
                product_id: request.product_id,
                decrement: 0,
                remaining: product.quantity(),
            });
            adjustments.len() - 1
        });
        let adjustment = &mut adjustments[slot];

        if request.quantity > adjustment.remaining {
            return Err(OrderError::InsufficientStock {
                product_id: request.product_id,
                requested: request.quantity,
                available: adjustment.remaining,
            });
        }

        adjustment.decrement += request.quantity;
        adjustment.remaining -= request.quantity;

        lines.push(OrderLine {
            line_no: line_number(idx)?,
            product_id: request.product_id,
            quantity: request.quantity,
            unit_price: product.price(),
        });
    }

    Ok(OrderPlan { lines, adjustments })
}

/// 1-based line number for the line at `idx`.
fn line_number(idx: usize) -> Result<u32, OrderError> {
    idx.checked_add(1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(OrderError::TooManyLines { index: idx })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(i64, u64)]) -> (Vec<ProductId>, HashMap<ProductId, Product>) {
        let mut ids = Vec::new();
        let mut map = HashMap::new();
        for (quantity, price) in entries {
            let id = ProductId::generate();
            let product = Product::new(id, "Item", *price, *quantity).unwrap();
            ids.push(id);
            map.insert(id, product);
        }
        (ids, map)
    }

    #[test]
    fn single_line_snapshots_price_and_reduces_stock() {
        let (ids, products) = catalog(&[(10, 250)]);

        let plan = plan_order(&[OrderLineRequest::new(ids[0], 4)], &products).unwrap();

        assert_eq!(
            plan.lines,
            vec![OrderLine {
                line_no: 1,
                product_id: ids[0],
                quantity: 4,
                unit_price: 250,
            }]
        );
        assert_eq!(
            plan.adjustments,
            vec![StockAdjustment {
                product_id: ids[0],
                decrement: 4,
                remaining: 6,
            }]
        );
    }

    #[test]
    fn lines_follow_request_order() {
        let (ids, products) = catalog(&[(5, 100), (5, 200), (5, 300)]);
        let request = vec![
            OrderLineRequest::new(ids[2], 1),
            OrderLineRequest::new(ids[0], 2),
            OrderLineRequest::new(ids[1], 3),
        ];

        let plan = plan_order(&request, &products).unwrap();

        let got: Vec<(u32, ProductId, u64)> = plan
            .lines
            .iter()
            .map(|l| (l.line_no, l.product_id, l.unit_price))
            .collect();
        assert_eq!(got, vec![(1, ids[2], 300), (2, ids[0], 100), (3, ids[1], 200)]);
    }

    #[test]
    fn insufficient_stock_is_rejected() {
        let (ids, products) = catalog(&[(2, 250)]);

        let err = plan_order(&[OrderLineRequest::new(ids[0], 5)], &products).unwrap_err();

        assert_eq!(
            err,
            OrderError::InsufficientStock {
                product_id: ids[0],
                requested: 5,
                available: 2,
            }
        );
    }

    #[test]
    fn unknown_product_is_rejected_even_after_valid_lines() {
        let (ids, products) = catalog(&[(10, 250)]);
        let unknown = ProductId::generate();
        let request = vec![
            OrderLineRequest::new(ids[0], 1),
            OrderLineRequest::new(unknown, 1),
        ];

        let err = plan_order(&request, &products).unwrap_err();
        assert_eq!(err, OrderError::UnregisteredProduct(unknown));
    }

    #[test]
    fn empty_request_is_rejected() {
        let (_, products) = catalog(&[(10, 250)]);
        assert_eq!(plan_order(&[], &products).unwrap_err(), OrderError::EmptyOrder);
    }

    #[test]
    fn zero_and_negative_quantities_are_rejected() {
        let (ids, products) = catalog(&[(10, 250)]);

        for quantity in [0, -3] {
            let err = plan_order(&[OrderLineRequest::new(ids[0], quantity)], &products).unwrap_err();
            assert_eq!(
                err,
                OrderError::NonPositiveQuantity {
                    product_id: ids[0],
                    quantity,
                }
            );
        }
    }

    #[test]
    fn repeated_product_accumulates_against_one_stock_figure() {
        let (ids, products) = catalog(&[(5, 250)]);
        let request = vec![
            OrderLineRequest::new(ids[0], 2),
            OrderLineRequest::new(ids[0], 3),
        ];

        let plan = plan_order(&request, &products).unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(
            plan.adjustments,
            vec![StockAdjustment {
                product_id: ids[0],
                decrement: 5,
                remaining: 0,
            }]
        );
    }

    #[test]
    fn repeated_product_exceeding_stock_in_total_is_rejected() {
        let (ids, products) = catalog(&[(5, 250)]);
        let request = vec![
            OrderLineRequest::new(ids[0], 3),
            OrderLineRequest::new(ids[0], 3),
        ];

        let err = plan_order(&request, &products).unwrap_err();
        assert_eq!(
            err,
            OrderError::InsufficientStock {
                product_id: ids[0],
                requested: 3,
                available: 2,
            }
        );
    }

    #[test]
    fn plan_does_not_touch_the_snapshot() {
        let (ids, products) = catalog(&[(10, 250)]);
        let before = products.clone();

        let _ = plan_order(&[OrderLineRequest::new(ids[0], 4)], &products).unwrap();

        assert_eq!(products, before);
    }

    #[test]
    fn line_numbers_are_one_based_and_checked() {
        assert_eq!(line_number(0), Ok(1));
        assert_eq!(line_number(41), Ok(42));
        assert_eq!(
            line_number(u32::MAX as usize),
            Err(OrderError::TooManyLines {
                index: u32::MAX as usize
            })
        );
        assert_eq!(
            line_number(usize::MAX),
            Err(OrderError::TooManyLines { index: usize::MAX })
        );
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

            /// Property: accepted plans conserve stock and keep request order and prices.
            #[test]
            fn accepted_plans_conserve_stock(
                stock in prop::collection::vec((0i64..50, 1u64..10_000), 1..6),
                picks in prop::collection::vec((0usize..6, 1i64..20), 1..12)
            ) {
                let entries: Vec<(i64, u64)> = stock;
                let (ids, products) = catalog(&entries);
                let request: Vec<OrderLineRequest> = picks
                    .iter()
                    .map(|(idx, qty)| OrderLineRequest::new(ids[idx % ids.len()], *qty))
                    .collect();

                match plan_order(&request, &products) {
                    Ok(plan) => {
                        prop_assert_eq!(plan.lines.len(), request.len());
                        for (line, req) in plan.lines.iter().zip(&request) {
                            prop_assert_eq!(line.product_id, req.product_id);
                            prop_assert_eq!(line.quantity, req.quantity);
                            prop_assert_eq!(line.unit_price, products[&req.product_id].price());
                        }
                        for adj in &plan.adjustments {
                            let requested: i64 = request
                                .iter()
                                .filter(|r| r.product_id == adj.product_id)
                                .map(|r| r.quantity)
                                .sum();
                            prop_assert_eq!(adj.decrement, requested);
                            prop_assert!(adj.remaining >= 0);
                            prop_assert_eq!(adj.observed(), products[&adj.product_id].quantity());
                        }
                    }
                    Err(err) => {
                        let over_stock = ids.iter().any(|id| {
                            let requested: i64 = request
                                .iter()
                                .filter(|r| r.product_id == *id)
                                .map(|r| r.quantity)
                                .sum();
                            requested > products[id].quantity()
                        });
                        prop_assert!(over_stock, "unexpected rejection: {err}");
                        let is_insufficient = matches!(err, OrderError::InsufficientStock { .. });
                        prop_assert!(is_insufficient);
                    }
                }
            }
        }
    }
}
