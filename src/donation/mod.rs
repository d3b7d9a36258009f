//! Donation orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → service.rs (local gate, balance/progress queries)
//!     → chain::transfer (pipeline: ATA setup, sign, send, confirm)
//!     → types.rs (outcome / progress report back to the handler)
//! ```

pub mod service;
pub mod types;

pub use service::DonationService;
pub use types::{DonationOutcome, Milestone, ProgressReport};
