//! Donation gateway library.
//!
//! A promotional token-donation service: an HTTP API (plus static SPA
//! hosting) over a chain RPC gateway with retry/backoff resilience, a
//! token transfer pipeline, and a best-effort donor leaderboard.

pub mod admin;
pub mod chain;
pub mod config;
pub mod donation;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod ranking;
pub mod resilience;

pub use chain::{ChainError, RpcGateway};
pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
