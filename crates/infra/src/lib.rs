//! Infrastructure layer: order creation workflow, stores, config.

pub mod config;
pub mod services;
pub mod store;
pub mod workflow;


pub use config::{ConfigError, InfraConfig, StoreBackend};
pub use services::OrderServices;
pub use store::{
    CustomerRepository, InMemorySalesStore, OrderRepository, OrderTransaction, PostgresSalesStore,
    ProductRepository, StoreError, UnitOfWork,
};
pub use workflow::{CreateOrder, CreateOrderError, CreateOrderWorkflow};
