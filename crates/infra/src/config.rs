//! Startup configuration for the order store.
//!
//! Read from the process environment:
//!
//! | Variable                       | Meaning                                  |
//! |--------------------------------|------------------------------------------|
//! | `ORDERFLOW_STORE`              | `memory` (default) or `postgres`         |
//! | `DATABASE_URL`                 | Postgres URL, required for `postgres`    |
//! | `ORDERFLOW_DB_MAX_CONNECTIONS` | pool size, positive integer (default 5)  |

use thiserror::Error;

pub const STORE_VAR: &str = "ORDERFLOW_STORE";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "ORDERFLOW_DB_MAX_CONNECTIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Which store backs order creation.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

// The URL may embed credentials.
impl core::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StoreBackend::InMemory => f.write_str("InMemory"),
            StoreBackend::Postgres {
                max_connections, ..
            } => f
                .debug_struct("Postgres")
                .field("database_url", &"<redacted>")
                .field("max_connections", max_connections)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    pub backend: StoreBackend,
}

impl InfraConfig {
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::InMemory,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = lookup(STORE_VAR).unwrap_or_else(|| "memory".to_string());

        let backend = match store.trim().to_ascii_lowercase().as_str() {
            "" | "memory" | "in-memory" => StoreBackend::InMemory,
            "postgres" => {
                let database_url = lookup(DATABASE_URL_VAR)
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::Missing(DATABASE_URL_VAR))?;
                let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
                    None => DEFAULT_MAX_CONNECTIONS,
                    Some(raw) => parse_max_connections(&raw)?,
                };
                StoreBackend::Postgres {
                    database_url,
                    max_connections,
                }
            }
            _ => {
                return Err(ConfigError::Invalid {
                    key: STORE_VAR,
                    value: store,
                });
            }
        };

        Ok(Self { backend })
    }
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn parse_max_connections(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key: MAX_CONNECTIONS_VAR,
            value: raw.to_string(),
        }),
    }
}
