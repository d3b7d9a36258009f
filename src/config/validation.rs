//! Configuration validation.
//!
//! Serde handles syntactic validity; this module covers semantic checks:
//! addresses must parse, value ranges must be sane, milestones must not
//! exceed the goal's reach. All errors are collected and reported
//! together rather than failing on the first.

use std::fmt;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. "donation.token_mint").
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, field: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.into(),
    });
}

/// Validate a configuration. Pure function: returns all problems found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        err(
            &mut errors,
            "listener.bind_address",
            format!("not a valid socket address: {}", config.listener.bind_address),
        );
    }

    if config.timeouts.request_secs == 0 {
        err(&mut errors, "timeouts.request_secs", "must be greater than zero");
    }

    if config.retries.max_attempts == 0 {
        err(&mut errors, "retries.max_attempts", "must be at least 1");
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        err(
            &mut errors,
            "retries.base_delay_ms",
            "base delay exceeds max delay",
        );
    }
    if config.retries.growth_factor < 1.0 {
        err(&mut errors, "retries.growth_factor", "must be >= 1.0");
    }

    if url::Url::parse(&config.chain.rpc_url).is_err() {
        err(
            &mut errors,
            "chain.rpc_url",
            format!("not a valid URL: {}", config.chain.rpc_url),
        );
    }
    for (i, u) in config.chain.failover_urls.iter().enumerate() {
        if url::Url::parse(u).is_err() {
            err(
                &mut errors,
                &format!("chain.failover_urls[{}]", i),
                format!("not a valid URL: {}", u),
            );
        }
    }
    if !matches!(config.chain.commitment.as_str(), "processed" | "confirmed" | "finalized") {
        err(
            &mut errors,
            "chain.commitment",
            "must be one of processed, confirmed, finalized",
        );
    }
    if config.chain.rpc_timeout_secs == 0 {
        err(&mut errors, "chain.rpc_timeout_secs", "must be greater than zero");
    }

    if Pubkey::from_str(&config.donation.donation_address).is_err() {
        err(
            &mut errors,
            "donation.donation_address",
            "not a valid account address",
        );
    }
    if Pubkey::from_str(&config.donation.token_mint).is_err() {
        err(&mut errors, "donation.token_mint", "not a valid mint address");
    }
    if config.donation.goal <= 0.0 {
        err(&mut errors, "donation.goal", "must be positive");
    }
    for (i, amount) in config.donation.predefined_amounts.iter().enumerate() {
        if *amount <= 0.0 {
            err(
                &mut errors,
                &format!("donation.predefined_amounts[{}]", i),
                "must be positive",
            );
        }
    }
    for (i, milestone) in config.donation.milestones.iter().enumerate() {
        if milestone.amount <= 0.0 {
            err(
                &mut errors,
                &format!("donation.milestones[{}].amount", i),
                "must be positive",
            );
        }
    }

    if config.leaderboard.signature_limit == 0 {
        err(&mut errors, "leaderboard.signature_limit", "must be at least 1");
    }
    if config.leaderboard.tx_batch_size == 0 {
        err(&mut errors, "leaderboard.tx_batch_size", "must be at least 1");
    }

    if config.admin.enabled && config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
        err(
            &mut errors,
            "admin.api_key",
            "placeholder API key must be changed before enabling the admin surface",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.donation.donation_address =
            "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq".to_string();
        config.donation.token_mint =
            "EStPXF2Mh3NVEezeysYfhrWXnuqwmbmjqLSP9vR5pump".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_bad_addresses_rejected() {
        let mut config = valid_config();
        config.donation.donation_address = "not-an-address".to_string();
        config.donation.token_mint = "also bad".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "donation.donation_address"));
        assert!(errors.iter().any(|e| e.field == "donation.token_mint"));
    }

    #[test]
    fn test_all_errors_collected() {
        let mut config = valid_config();
        config.retries.max_attempts = 0;
        config.leaderboard.tx_batch_size = 0;
        config.chain.commitment = "instant".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }

    #[test]
    fn test_admin_placeholder_key_rejected() {
        let mut config = valid_config();
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "admin.api_key"));

        config.admin.api_key = "a-real-secret".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
