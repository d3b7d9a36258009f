//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! donation gateway. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `chain.rpc_url`.
pub const RPC_URL_ENV_VAR: &str = "GATEWAY_RPC_URL";

/// Root configuration for the donation gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS, static assets).
    pub listener: ListenerConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Retry configuration for outbound RPC calls.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Chain RPC settings.
    pub chain: ChainConfig,

    /// Donation campaign settings.
    pub donation: DonationConfig,

    /// Leaderboard scan and cache settings.
    pub leaderboard: LeaderboardConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Directory holding the built single-page frontend. When set, files
    /// are served with an index.html fallback for client-side routes.
    pub static_dir: Option<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            static_dir: None,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Retry configuration for outbound RPC calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per operation.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Base delay after a rate-limit response in milliseconds.
    pub rate_limit_base_ms: u64,

    /// Maximum delay after a rate-limit response in milliseconds.
    pub rate_limit_max_ms: u64,

    /// Multiplier applied per attempt. Public RPC endpoints throttle
    /// aggressively; 1.5 keeps the schedule under their ban windows.
    pub growth_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            rate_limit_base_ms: 1_000,
            rate_limit_max_ms: 30_000,
            growth_factor: 1.5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Chain RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL. Overridden by `GATEWAY_RPC_URL` when set.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    #[serde(default)]
    pub failover_urls: Vec<String>,

    /// Commitment level for queries and confirmation ("processed",
    /// "confirmed", "finalized").
    pub commitment: String,

    /// Require `GATEWAY_RPC_URL` to be present; startup fails otherwise.
    pub strict_env: bool,

    /// Per-call RPC timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Timeout for submitting a transaction in seconds.
    pub send_timeout_secs: u64,

    /// Timeout for the confirmation phase in seconds.
    pub confirmation_timeout_secs: u64,

    /// Interval between confirmation status polls in milliseconds.
    pub confirmation_poll_ms: u64,

    /// Number of fallback verification polls before giving up.
    pub confirmation_poll_attempts: u32,

    /// Hard ceiling for one end-to-end transfer in seconds.
    pub transfer_timeout_secs: u64,

    /// Path to the gateway keypair file (JSON byte array). The
    /// `GATEWAY_WALLET_KEYPAIR` environment variable (base58) wins over
    /// this when both are present.
    pub keypair_path: Option<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://solana-rpc.publicnode.com".to_string(),
            failover_urls: Vec::new(),
            commitment: "confirmed".to_string(),
            strict_env: false,
            rpc_timeout_secs: 30,
            send_timeout_secs: 30,
            confirmation_timeout_secs: 60,
            confirmation_poll_ms: 2_000,
            confirmation_poll_attempts: 10,
            transfer_timeout_secs: 120,
            keypair_path: None,
        }
    }
}

/// Donation campaign configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DonationConfig {
    /// The fixed destination account tracked for progress and ranking.
    pub donation_address: String,

    /// Mint address of the campaign token.
    pub token_mint: String,

    /// Decimals of the campaign token.
    pub token_decimals: u8,

    /// Display symbol of the campaign token.
    pub token_symbol: String,

    /// Campaign goal in UI token units.
    pub goal: f64,

    /// Suggested donation amounts in UI token units.
    pub predefined_amounts: Vec<f64>,

    /// Campaign milestones, evaluated against current progress.
    pub milestones: Vec<MilestoneConfig>,

    /// Delay after creating a token account before using it, in
    /// milliseconds. Fresh accounts are not always visible immediately.
    pub settle_delay_ms: u64,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            donation_address: String::new(),
            token_mint: String::new(),
            token_decimals: 6,
            token_symbol: "KT".to_string(),
            goal: 100_000_000.0,
            predefined_amounts: vec![10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0],
            milestones: Vec::new(),
            settle_delay_ms: 2_000,
        }
    }
}

/// A campaign milestone.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MilestoneConfig {
    /// Progress threshold in UI token units.
    pub amount: f64,

    /// Human-readable milestone description.
    pub label: String,
}

/// Leaderboard scan and cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Maximum number of historical signatures to enumerate per scan.
    pub signature_limit: usize,

    /// Number of transactions fetched concurrently per batch.
    pub tx_batch_size: usize,

    /// Snapshot staleness window in seconds.
    pub cache_ttl_secs: u64,

    /// Enable the background refresher.
    pub background_refresh: bool,

    /// Background refresh interval in seconds.
    pub refresh_interval_secs: u64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            signature_limit: 1_000,
            tx_batch_size: 8,
            cache_ttl_secs: 60,
            background_refresh: true,
            refresh_interval_secs: 300,
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Resolve the effective RPC URL, applying the environment override.
    ///
    /// Returns an error when `chain.strict_env` is set and the variable
    /// is absent.
    pub fn resolve_rpc_url(&self) -> Result<String, String> {
        match std::env::var(RPC_URL_ENV_VAR) {
            Ok(url) if !url.trim().is_empty() => Ok(url),
            _ if self.chain.strict_env => Err(format!(
                "{} must be set when chain.strict_env is enabled",
                RPC_URL_ENV_VAR
            )),
            _ => Ok(self.chain.rpc_url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.retries.max_attempts, 5);
        assert_eq!(config.chain.commitment, "confirmed");
        assert_eq!(config.donation.token_decimals, 6);
        assert_eq!(config.leaderboard.signature_limit, 1_000);
    }

    #[test]
    fn test_strict_env_requires_rpc_url_var() {
        std::env::remove_var(RPC_URL_ENV_VAR);

        let mut config = GatewayConfig::default();
        config.chain.strict_env = true;
        assert!(config.resolve_rpc_url().is_err());

        config.chain.strict_env = false;
        assert_eq!(config.resolve_rpc_url().unwrap(), config.chain.rpc_url);
    }

    #[test]
    fn test_minimal_toml_roundtrip() {
        let toml_str = r#"
            [donation]
            donation_address = "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq"
            token_mint = "EStPXF2Mh3NVEezeysYfhrWXnuqwmbmjqLSP9vR5pump"
            goal = 1000.0

            [chain]
            rpc_url = "http://localhost:8899"
        "#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.donation.goal, 1000.0);
        assert_eq!(config.chain.rpc_url, "http://localhost:8899");
        // Untouched sections fall back to defaults.
        assert_eq!(config.timeouts.request_secs, 30);
    }
}
