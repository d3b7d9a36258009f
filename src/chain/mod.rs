//! Chain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (keypair, RPC URL)
//!     → wallet.rs (key loading, signing seam, rejection detection)
//!     → client.rs (RPC gateway with failover and timeouts)
//!     → transfer.rs (ATA setup, build, sign, broadcast, confirm)
//! ```
//!
//! # Security Constraints
//! - Key material ONLY from environment variables or keypair files
//! - Never log keys or signed payloads
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the chain is unreachable

pub mod client;
pub mod transfer;
pub mod types;
pub mod wallet;

pub use client::RpcGateway;
pub use transfer::{TransferOutcome, TransferPipeline};
pub use types::{ChainConfig, ChainError, ChainResult, Severity};
pub use wallet::{DonationSigner, KeypairSigner};
