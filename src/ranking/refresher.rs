//! Background leaderboard refresher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::ranking::cache::LeaderboardCache;
use crate::ranking::scanner::LeaderboardScanner;
use crate::ranking::types::LeaderboardSnapshot;

/// Periodically rescans donation history so interactive requests rarely
/// pay for a full scan.
pub struct LeaderboardRefresher {
    cache: Arc<LeaderboardCache>,
    scanner: LeaderboardScanner,
    interval: Duration,
}

impl LeaderboardRefresher {
    pub fn new(
        cache: Arc<LeaderboardCache>,
        scanner: LeaderboardScanner,
        interval_secs: u64,
    ) -> Self {
        Self {
            cache,
            scanner,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    /// Run the refresh loop until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Leaderboard refresher starting"
        );

        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.scanner.scan().await {
                        Ok(entries) => {
                            self.cache.store(LeaderboardSnapshot::from_entries(entries));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Background leaderboard scan failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Leaderboard refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
