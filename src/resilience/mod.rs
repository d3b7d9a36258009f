//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Chain operation:
//!     → timeouts.rs (enforce hard deadline)
//!     → On failure: retries.rs (classify, retry with backoff)
//!     → backoff.rs (delay schedule with jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - User cancellation is terminal and never retried
//! - Rate limits use their own slower backoff schedule

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use retries::with_retry;
pub use timeouts::with_timeout;
