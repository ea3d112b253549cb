//! Postgres-backed sales store.
//!
//! Every order request runs in one SQL transaction. Stock is decremented with
//! a conditional `UPDATE … WHERE quantity >= $2`, so concurrent requests can
//! never oversell even though validation happens on an earlier read.
//!
//! ## Expected schema
//!
//! Migrations are owned by the deployment, not by this crate:
//!
//! ```sql
//! CREATE TABLE customers (
//!     id    UUID PRIMARY KEY,
//!     name  TEXT NOT NULL,
//!     email TEXT NOT NULL
//! );
//! CREATE TABLE products (
//!     id       UUID PRIMARY KEY,
//!     name     TEXT NOT NULL,
//!     price    BIGINT NOT NULL CHECK (price >= 0),
//!     quantity BIGINT NOT NULL CHECK (quantity >= 0)
//! );
//! CREATE TABLE orders (
//!     id          UUID PRIMARY KEY,
//!     customer_id UUID NOT NULL REFERENCES customers (id),
//!     created_at  TIMESTAMPTZ NOT NULL
//! );
//! CREATE TABLE order_lines (
//!     order_id   UUID NOT NULL REFERENCES orders (id),
//!     line_no    INTEGER NOT NULL,
//!     product_id UUID NOT NULL REFERENCES products (id),
//!     quantity   BIGINT NOT NULL CHECK (quantity > 0),
//!     unit_price BIGINT NOT NULL,
//!     PRIMARY KEY (order_id, line_no)
//! );
//! ```
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `StoreError` |
//! |------------|-----------------|--------------|
//! | unique violation | `23505` | `Conflict` |
//! | serialization failure | `40001` | `Conflict` |
//! | deadlock detected | `40P01` | `Conflict` |
//! | any other | any | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use orderflow_parties::{Customer, CustomerId};
use orderflow_products::{Product, ProductId, StockAdjustment};
use orderflow_sales::{NewOrder, Order, OrderId};

use super::{
    CustomerRepository, OrderRepository, OrderTransaction, ProductRepository, StoreError,
    UnitOfWork,
};

/// Postgres-backed store for customers, products and orders.
///
/// Uses SQLx connection pool which is thread-safe; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresSalesStore {
    pool: Arc<PgPool>,
}

impl PostgresSalesStore {
    /// Create a new PostgresSalesStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl UnitOfWork for PostgresSalesStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTransaction { tx })
    }
}

/// Open SQL transaction. Dropped without commit, it rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CustomerRepository for PostgresTransaction {
    #[instrument(skip(self), fields(customer_id = %id), err)]
    async fn find_by_id(&mut self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_customer", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let name: String = read(&row, "name")?;
        let email: String = read(&row, "email")?;
        Ok(Some(Customer::from_record(id, name, email)))
    }
}

#[async_trait]
impl ProductRepository for PostgresTransaction {
    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn find_all_by_id(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();

        let rows = sqlx::query(
            r#"
            SELECT id, name, price, quantity
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(uuids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, adjustments), fields(products = adjustments.len()), err)]
    async fn update_quantities(&mut self, adjustments: &[StockAdjustment]) -> Result<(), StoreError> {
        // Consistent lock order across concurrent transactions.
        let mut ordered = adjustments.to_vec();
        ordered.sort_by_key(|adj| adj.product_id);

        for adj in &ordered {
            let updated = sqlx::query(
                r#"
                UPDATE products
                SET quantity = quantity - $2
                WHERE id = $1 AND quantity >= $2
                RETURNING quantity
                "#,
            )
            .bind(adj.product_id.as_uuid())
            .bind(adj.decrement)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("decrement_stock", e))?;

            match updated {
                Some(row) => {
                    let remaining: i64 = read(&row, "quantity")?;
                    if remaining != adj.remaining {
                        debug!(
                            product_id = %adj.product_id,
                            expected = adj.remaining,
                            actual = remaining,
                            "stock moved between read and write"
                        );
                    }
                }
                None => return Err(self.refused_decrement(adj).await?),
            }
        }

        Ok(())
    }
}

impl PostgresTransaction {
    /// Explain why a conditional decrement matched no row.
    async fn refused_decrement(&mut self, adj: &StockAdjustment) -> Result<StoreError, StoreError> {
        let row = sqlx::query("SELECT quantity FROM products WHERE id = $1")
            .bind(adj.product_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("read_stock", e))?;

        Ok(match row {
            Some(row) => StoreError::InsufficientStock {
                product_id: adj.product_id,
                requested: adj.decrement,
                available: read(&row, "quantity")?,
            },
            None => StoreError::UnknownProduct(adj.product_id),
        })
    }
}

#[async_trait]
impl OrderRepository for PostgresTransaction {
    #[instrument(skip(self, order), fields(customer_id = %order.customer.id_typed(), lines = order.lines.len()), err)]
    async fn create(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let order = Order::from_new(order, OrderId::generate(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for line in order.lines() {
            let unit_price = i64::try_from(line.unit_price).map_err(|_| {
                StoreError::Backend(format!("unit_price {} exceeds BIGINT", line.unit_price))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id_typed().as_uuid())
            .bind(sql_line_no(line.line_no)?)
            .bind(line.product_id.as_uuid())
            .bind(line.quantity)
            .bind(unit_price)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_line", e))?;
        }

        Ok(order)
    }
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn read<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read {column}: {e}")))
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = read(row, "id")?;
    let name: String = read(row, "name")?;
    let price: i64 = read(row, "price")?;
    let quantity: i64 = read(row, "quantity")?;

    let price = u64::try_from(price)
        .map_err(|_| StoreError::Backend(format!("negative price for product {id}")))?;

    Product::from_record(ProductId::from(id), name, price, quantity)
        .map_err(|e| StoreError::Backend(format!("invalid product row {id}: {e}")))
}

/// `order_lines.line_no` is an INTEGER column.
fn sql_line_no(line_no: u32) -> Result<i32, StoreError> {
    i32::try_from(line_no)
        .map_err(|_| StoreError::Backend(format!("line_no {line_no} exceeds INTEGER")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some(code) if is_conflict_code(code) => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Backend(format!("timed out acquiring connection in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Unique violation, serialization failure, deadlock.
fn is_conflict_code(code: &str) -> bool {
    matches!(code, "23505" | "40001" | "40P01")
}
