//! Leaderboard snapshot cache.
//!
//! A process-local snapshot with a time-based staleness check. Readers
//! always get a consistent snapshot; refreshes swap it atomically. Not
//! coherent across instances, which is acceptable for a single gateway
//! process.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;

use crate::chain::types::ChainResult;
use crate::observability::metrics;
use crate::ranking::scanner::LeaderboardScanner;
use crate::ranking::types::LeaderboardSnapshot;

pub struct LeaderboardCache {
    snapshot: ArcSwap<LeaderboardSnapshot>,
    ttl_secs: u64,
    /// Serializes refreshes so concurrent stale reads trigger one scan.
    refresh_lock: Mutex<()>,
}

impl LeaderboardCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(LeaderboardSnapshot::empty()),
            ttl_secs,
            refresh_lock: Mutex::new(()),
        }
    }

    /// The current snapshot, however stale.
    pub fn current(&self) -> Arc<LeaderboardSnapshot> {
        self.snapshot.load_full()
    }

    /// Publish a fresh snapshot.
    pub fn store(&self, snapshot: LeaderboardSnapshot) {
        metrics::record_cache_entries(snapshot.total_donors);
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Whether the current snapshot has outlived the TTL.
    pub fn is_stale(&self) -> bool {
        self.snapshot.load().is_stale(self.ttl_secs)
    }

    /// Return a fresh snapshot, rescanning when stale or forced.
    ///
    /// A failed rescan falls back to the previous snapshot when one
    /// exists (the leaderboard is best effort); the error only surfaces
    /// when there is nothing at all to serve.
    pub async fn get_or_refresh(
        &self,
        scanner: &LeaderboardScanner,
        force: bool,
    ) -> ChainResult<Arc<LeaderboardSnapshot>> {
        if !force && !self.is_stale() {
            return Ok(self.current());
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if !force && !self.is_stale() {
            return Ok(self.current());
        }

        match scanner.scan().await {
            Ok(entries) => {
                self.store(LeaderboardSnapshot::from_entries(entries));
                Ok(self.current())
            }
            Err(e) => {
                let previous = self.current();
                if previous.fetched_at > 0 {
                    tracing::warn!(error = %e, "Leaderboard refresh failed, serving stale snapshot");
                    Ok(previous)
                } else {
                    Err(e)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::types::DonorRank;

    #[test]
    fn test_empty_cache_is_stale() {
        let cache = LeaderboardCache::new(60);
        assert!(cache.is_stale());
        assert_eq!(cache.current().total_donors, 0);
    }

    #[test]
    fn test_store_publishes_snapshot() {
        let cache = LeaderboardCache::new(60);
        cache.store(LeaderboardSnapshot::from_entries(vec![
            DonorRank {
                address: "a".to_string(),
                amount: 100.0,
            },
            DonorRank {
                address: "b".to_string(),
                amount: 50.0,
            },
        ]));

        assert!(!cache.is_stale());
        let snapshot = cache.current();
        assert_eq!(snapshot.total_donors, 2);
        assert_eq!(snapshot.entries[0].address, "a");
    }

    #[test]
    fn test_old_snapshot_is_stale() {
        let cache = LeaderboardCache::new(60);
        let mut snapshot = LeaderboardSnapshot::from_entries(Vec::new());
        snapshot.fetched_at = snapshot.fetched_at.saturating_sub(120);
        cache.store(snapshot);
        assert!(cache.is_stale());
    }
}
