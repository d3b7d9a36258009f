//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - RUST_LOG wins over the configured level when set

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::ObservabilityConfig;

/// Initialize the global tracing subscriber.
///
/// Safe to call once per process; later calls are ignored (relevant in
/// tests, where several cases may race to initialize).
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("donation_gateway={}", config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
