//! Tracing/logging setup shared by every binary that creates orders.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::LogFormat;

/// Initialize process-wide tracing from the environment.
///
/// `RUST_LOG` selects the filter (default `info`), `ORDERFLOW_LOG_FORMAT`
/// selects `json` (default) or `pretty` output. Subsequent calls are no-ops.
pub fn init() {
    let format = LogFormat::from_env_value(std::env::var(tracing::LOG_FORMAT_VAR).ok().as_deref());
    tracing::init(format);
}
