//! Process lifecycle subsystem.
//!
//! # Design Decisions
//! - One broadcast channel fans the shutdown signal out to every
//!   long-running task (HTTP server, leaderboard refresher, watcher)
//! - Ctrl+C triggers the coordinator from main

pub mod shutdown;

pub use shutdown::Shutdown;
