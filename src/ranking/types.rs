//! Leaderboard types.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One leaderboard row: a donor address and its summed donations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorRank {
    /// Owner address of the donating wallet.
    pub address: String,
    /// Total donated, in UI token units.
    pub amount: f64,
}

/// A published leaderboard computation.
///
/// Snapshots are immutable once published; staleness is judged against
/// `fetched_at`.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardSnapshot {
    /// Ranked entries, highest total first.
    pub entries: Vec<DonorRank>,
    /// Number of distinct donors.
    pub total_donors: usize,
    /// Unix timestamp (seconds) of the scan that produced this snapshot.
    pub fetched_at: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl LeaderboardSnapshot {
    /// An empty snapshot that is always considered stale.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            total_donors: 0,
            fetched_at: 0,
        }
    }

    /// Publish a freshly computed ranking.
    pub fn from_entries(entries: Vec<DonorRank>) -> Self {
        let total_donors = entries.len();
        Self {
            entries,
            total_donors,
            fetched_at: unix_now(),
        }
    }

    /// Seconds since this snapshot was computed.
    pub fn age_secs(&self) -> u64 {
        unix_now().saturating_sub(self.fetched_at)
    }

    /// Whether the snapshot has outlived the staleness window.
    pub fn is_stale(&self, ttl_secs: u64) -> bool {
        self.fetched_at == 0 || self.age_secs() > ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_is_stale() {
        let snapshot = LeaderboardSnapshot::empty();
        assert!(snapshot.is_stale(3600));
        assert_eq!(snapshot.total_donors, 0);
    }

    #[test]
    fn test_fresh_snapshot_is_not_stale() {
        let snapshot = LeaderboardSnapshot::from_entries(vec![DonorRank {
            address: "donor".to_string(),
            amount: 5.0,
        }]);
        assert!(!snapshot.is_stale(60));
        assert_eq!(snapshot.total_donors, 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let rank = DonorRank {
            address: "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq".to_string(),
            amount: 10_000.0,
        };
        let json = serde_json::to_string(&rank).unwrap();
        let decoded: DonorRank = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, rank);
    }
}
