//! Donor ranking subsystem.
//!
//! # Data Flow
//! ```text
//! donation ATA
//!     → scanner.rs (signature enumeration, batched parsed-tx fetch,
//!       SPL transfer filtering, per-donor aggregation)
//!     → types.rs (ranked snapshot)
//!     → cache.rs (TTL snapshot, atomic swap)
//!     → refresher.rs (background rescan loop)
//! ```
//!
//! # Design Decisions
//! - Best-effort recomputation; no persistent or incremental index
//! - Snapshot readers never block on a scan in progress
//! - Per-transaction failures are skipped, not fatal

pub mod cache;
pub mod refresher;
pub mod scanner;
pub mod types;

pub use cache::LeaderboardCache;
pub use refresher::LeaderboardRefresher;
pub use scanner::LeaderboardScanner;
pub use types::{DonorRank, LeaderboardSnapshot};
