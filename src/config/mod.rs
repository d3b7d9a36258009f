//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply GATEWAY_RPC_URL override)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<GatewayConfig>
//!     → subsystems observe new config
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::GatewayConfig;
pub use schema::{
    AdminConfig, ChainConfig, DonationConfig, LeaderboardConfig, ListenerConfig,
    MilestoneConfig, RetryConfig, TimeoutConfig, RPC_URL_ENV_VAR,
};
