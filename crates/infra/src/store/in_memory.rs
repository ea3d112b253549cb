use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use orderflow_core::DomainError;
use orderflow_parties::{Customer, CustomerId};
use orderflow_products::{Product, ProductId, StockAdjustment};
use orderflow_sales::{NewOrder, Order, OrderId};

use super::{
    CustomerRepository, OrderRepository, OrderTransaction, ProductRepository, StoreError,
    UnitOfWork,
};

#[derive(Debug, Default)]
struct SalesState {
    customers: HashMap<CustomerId, Customer>,
    products: HashMap<ProductId, Product>,
    orders: Vec<Order>,
}

#[derive(Debug, Default)]
struct Faults {
    stock_writes: AtomicBool,
    order_writes: AtomicBool,
}

/// In-memory customer/product/order store.
///
/// Intended for tests/dev. Every transaction holds the store lock from
/// `begin` until commit/rollback, so transactions are fully serialized.
/// Uncommitted writes live in the transaction, never in the shared state.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySalesStore {
    state: Arc<Mutex<SalesState>>,
    faults: Arc<Faults>,
}

impl InMemorySalesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_customer(&self, customer: Customer) {
        let mut state = self.state.lock().await;
        state.customers.insert(customer.id_typed(), customer);
    }

    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.insert(product.id_typed(), product);
    }

    /// Current committed state of a product.
    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    /// All committed orders, in creation order.
    pub async fn orders(&self) -> Vec<Order> {
        self.state.lock().await.orders.clone()
    }

    /// Change a product's catalog price. Returns `false` if it does not exist.
    pub async fn reprice(&self, id: ProductId, price: u64) -> bool {
        let mut state = self.state.lock().await;
        match state.products.get_mut(&id) {
            Some(product) => {
                product.reprice(price);
                true
            }
            None => false,
        }
    }

    /// Make every subsequent stock write fail with `StoreError::FaultInjected`.
    pub fn fail_stock_writes(&self, fail: bool) {
        self.faults.stock_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent order write fail with `StoreError::FaultInjected`.
    pub fn fail_order_writes(&self, fail: bool) {
        self.faults.order_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UnitOfWork for InMemorySalesStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(InMemoryTransaction {
            guard,
            touched: HashMap::new(),
            pending_orders: Vec::new(),
            faults: self.faults.clone(),
        })
    }
}

/// Open transaction on an [`InMemorySalesStore`].
///
/// Holds the store lock; reads go to the committed state overlaid with this
/// transaction's own writes. Writes are kept in a log (products whose stock
/// changed, orders created) that `commit` applies to the committed state.
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<SalesState>,
    touched: HashMap<ProductId, Product>,
    pending_orders: Vec<Order>,
    faults: Arc<Faults>,
}

impl InMemoryTransaction {
    fn current_product(&self, id: &ProductId) -> Option<&Product> {
        self.touched.get(id).or_else(|| self.guard.products.get(id))
    }
}

impl core::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("touched_products", &self.touched.len())
            .field("pending_orders", &self.pending_orders.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryTransaction {
    async fn find_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        Ok(self.guard.customers.get(&id).cloned())
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn find_all_by_id(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.current_product(id).cloned())
            .collect())
    }

    async fn update_quantities(&mut self, adjustments: &[StockAdjustment]) -> Result<(), StoreError> {
        if self.faults.stock_writes.load(Ordering::SeqCst) {
            return Err(StoreError::FaultInjected("stock write"));
        }

        for adj in adjustments {
            let mut product = self
                .current_product(&adj.product_id)
                .cloned()
                .ok_or(StoreError::UnknownProduct(adj.product_id))?;

            let available = product.quantity();
            product.withdraw(adj.decrement).map_err(|e| match e {
                DomainError::InvariantViolation(_) => StoreError::InsufficientStock {
                    product_id: adj.product_id,
                    requested: adj.decrement,
                    available,
                },
                other => StoreError::InvalidAdjustment {
                    product_id: adj.product_id,
                    reason: other.to_string(),
                },
            })?;

            self.touched.insert(adj.product_id, product);
        }

        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn create(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        if self.faults.order_writes.load(Ordering::SeqCst) {
            return Err(StoreError::FaultInjected("order write"));
        }

        let order = Order::from_new(order, OrderId::generate(), Utc::now());
        self.pending_orders.push(order.clone());
        Ok(order)
    }
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTransaction {
            mut guard,
            touched,
            pending_orders,
            ..
        } = self;
        guard.products.extend(touched);
        guard.orders.extend(pending_orders);
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
