//! Donation service types.

use serde::Serialize;

/// A campaign milestone evaluated against current progress.
#[derive(Debug, Clone, Serialize)]
pub struct Milestone {
    /// Progress threshold in UI token units.
    pub amount: f64,
    /// Human-readable description.
    pub label: String,
    /// Whether current progress has reached the threshold.
    pub reached: bool,
}

/// Donation progress against the configured goal.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    /// Tokens received so far, in UI units.
    pub current: f64,
    /// Campaign goal, in UI units.
    pub goal: f64,
    /// Progress percentage, capped at 100.
    pub percent: f64,
    /// Display symbol of the campaign token.
    pub token_symbol: String,
    /// Milestones with their reached state.
    pub milestones: Vec<Milestone>,
}

impl ProgressReport {
    pub fn new(
        current: f64,
        goal: f64,
        token_symbol: String,
        milestones: Vec<Milestone>,
    ) -> Self {
        let percent = if goal > 0.0 {
            (current / goal * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            current,
            goal,
            percent,
            token_symbol,
            milestones,
        }
    }
}

/// Result of a donation request.
#[derive(Debug, Clone, PartialEq)]
pub enum DonationOutcome {
    /// The transfer confirmed on chain.
    Confirmed { signature: String, amount: f64 },
    /// The signature request was declined. Informational, not a failure.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_computation() {
        let report = ProgressReport::new(25_000_000.0, 100_000_000.0, "KT".to_string(), vec![]);
        assert_eq!(report.percent, 25.0);
    }

    #[test]
    fn test_percent_caps_at_hundred() {
        let report = ProgressReport::new(150.0, 100.0, "KT".to_string(), vec![]);
        assert_eq!(report.percent, 100.0);
    }

    #[test]
    fn test_zero_goal_reports_zero_percent() {
        let report = ProgressReport::new(10.0, 0.0, "KT".to_string(), vec![]);
        assert_eq!(report.percent, 0.0);
    }
}
