//! Store binding chosen once at startup.

use tracing::{info, warn};

use orderflow_sales::Order;

use crate::config::{InfraConfig, StoreBackend};
use crate::store::{InMemorySalesStore, PostgresSalesStore, StoreError};
use crate::workflow::{CreateOrder, CreateOrderError, CreateOrderWorkflow};

/// Order creation wired to the configured store.
#[derive(Debug, Clone)]
pub enum OrderServices {
    InMemory {
        workflow: CreateOrderWorkflow<InMemorySalesStore>,
        /// Same state the workflow writes to (for seeding and inspection).
        store: InMemorySalesStore,
    },
    Postgres {
        workflow: CreateOrderWorkflow<PostgresSalesStore>,
    },
}

impl OrderServices {
    pub async fn build(config: &InfraConfig) -> Result<Self, StoreError> {
        match &config.backend {
            StoreBackend::InMemory => {
                warn!("using in-memory order store; data is lost on exit");
                Ok(Self::in_memory(InMemorySalesStore::new()))
            }
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresSalesStore::connect(database_url, *max_connections).await?;
                info!(max_connections, "connected to postgres order store");
                Ok(Self::Postgres {
                    workflow: CreateOrderWorkflow::new(store),
                })
            }
        }
    }

    pub fn in_memory(store: InMemorySalesStore) -> Self {
        Self::InMemory {
            workflow: CreateOrderWorkflow::new(store.clone()),
            store,
        }
    }

    pub async fn create_order(&self, request: CreateOrder) -> Result<Order, CreateOrderError> {
        match self {
            Self::InMemory { workflow, .. } => workflow.create_order(request).await,
            Self::Postgres { workflow } => workflow.create_order(request).await,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::InMemory { .. } => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }

    /// The in-memory store, if that is the bound backend.
    pub fn in_memory_store(&self) -> Option<&InMemorySalesStore> {
        match self {
            Self::InMemory { store, .. } => Some(store),
            Self::Postgres { .. } => None,
        }
    }
}
