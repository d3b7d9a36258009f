//! Chain RPC client with failover, timeout, and error normalization.
//!
//! # Responsibilities
//! - Connect to one or more JSON-RPC endpoints
//! - Query token accounts, balances, signatures, parsed transactions
//! - Submit transactions
//! - Handle timeouts and network errors gracefully
//! - Provide health check for chain connectivity

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use solana_account_decoder::parse_token::{UiTokenAccount, UiTokenAmount};
use solana_client::client_error::Result as ClientResult;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig};
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, TransactionStatus, UiTransactionEncoding,
};
use tokio::time::timeout;

use crate::chain::types::{ChainConfig, ChainError, ChainResult};
use crate::observability::metrics;

/// Chain RPC client wrapper with failover support.
#[derive(Clone)]
pub struct RpcGateway {
    /// List of clients (primary + failovers).
    clients: Vec<Arc<RpcClient>>,
    /// Configuration.
    config: ChainConfig,
    /// Commitment applied to queries and sends.
    commitment: CommitmentConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl RpcGateway {
    /// Create a new gateway.
    ///
    /// Endpoint URLs are assumed validated by the config layer; invalid
    /// failover entries are skipped with a warning.
    pub fn new(config: ChainConfig) -> Self {
        let commitment = parse_commitment(&config.commitment);
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let mut clients = Vec::new();
        clients.push(Arc::new(RpcClient::new_with_timeout_and_commitment(
            config.rpc_url.clone(),
            timeout_duration,
            commitment,
        )));

        for url in &config.failover_urls {
            if url::Url::parse(url).is_ok() {
                clients.push(Arc::new(RpcClient::new_with_timeout_and_commitment(
                    url.clone(),
                    timeout_duration,
                    commitment,
                )));
            } else {
                tracing::warn!(url = %url, "Ignoring invalid failover RPC URL");
            }
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = clients.len() - 1,
            commitment = %config.commitment,
            "Chain RPC gateway initialized"
        );

        Self {
            clients,
            config,
            commitment,
            timeout_duration,
        }
    }

    /// Run `f` against each endpoint in order until one succeeds.
    ///
    /// The last classified error is preserved so callers can distinguish
    /// rate limiting from hard transport failures.
    async fn with_failover<T, F, Fut>(&self, method: &'static str, f: F) -> ChainResult<T>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let start = Instant::now();
        let mut last_error: Option<ChainError> = None;

        for (i, client) in self.clients.iter().enumerate() {
            match timeout(self.timeout_duration, f(Arc::clone(client))).await {
                Ok(Ok(result)) => {
                    metrics::record_rpc_call(method, "ok", start);
                    return Ok(result);
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint_idx = i, method, error = %e, "RPC error, trying next endpoint");
                    last_error = Some(ChainError::from_rpc(e));
                }
                Err(_) => {
                    tracing::warn!(endpoint_idx = i, method, "RPC timeout, trying next endpoint");
                    last_error = Some(ChainError::Timeout {
                        operation: method.to_string(),
                        timeout_ms: self.timeout_duration.as_millis() as u64,
                    });
                }
            }
        }

        metrics::record_rpc_call(method, "error", start);
        Err(last_error
            .unwrap_or_else(|| ChainError::Rpc(format!("All RPC endpoints failed: {}", method))))
    }

    /// Latest blockhash with its last valid block height.
    pub async fn latest_blockhash(&self) -> ChainResult<(Hash, u64)> {
        let commitment = self.commitment;
        self.with_failover("getLatestBlockhash", |c| async move {
            c.get_latest_blockhash_with_commitment(commitment).await
        })
        .await
    }

    /// Submit a signed transaction.
    ///
    /// Preflight runs at the configured commitment; the node is allowed
    /// a few internal rebroadcasts before our own retry layer kicks in.
    pub async fn send_transaction(&self, transaction: &Transaction) -> ChainResult<Signature> {
        let preflight = self.commitment.commitment;
        self.with_failover("sendTransaction", |c| async move {
            let config = RpcSendTransactionConfig {
                skip_preflight: false,
                preflight_commitment: Some(preflight),
                // Explicit encoding avoids a node-version probe per send.
                encoding: Some(UiTransactionEncoding::Base64),
                max_retries: Some(3),
                ..RpcSendTransactionConfig::default()
            };
            c.send_transaction_with_config(transaction, config).await
        })
        .await
    }

    /// Status of a single signature, if the node still tracks it.
    pub async fn signature_status(
        &self,
        signature: &Signature,
    ) -> ChainResult<Option<TransactionStatus>> {
        let signature = *signature;
        let response = self
            .with_failover("getSignatureStatuses", |c| async move {
                c.get_signature_statuses(&[signature]).await
            })
            .await?;
        Ok(response.value.into_iter().next().flatten())
    }

    /// Historical signatures touching `address`, newest first.
    pub async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> ChainResult<Vec<RpcConfirmedTransactionStatusWithSignature>> {
        let address = *address;
        let commitment = self.commitment;
        self.with_failover("getSignaturesForAddress", |c| async move {
            c.get_signatures_for_address_with_config(
                &address,
                GetConfirmedSignaturesForAddress2Config {
                    before: None,
                    until: None,
                    limit: Some(limit),
                    commitment: Some(commitment),
                },
            )
            .await
        })
        .await
    }

    /// Fetch a transaction in parsed encoding.
    pub async fn parsed_transaction(
        &self,
        signature: &Signature,
    ) -> ChainResult<EncodedConfirmedTransactionWithStatusMeta> {
        let signature = *signature;
        let commitment = self.commitment;
        self.with_failover("getTransaction", |c| async move {
            c.get_transaction_with_config(
                &signature,
                RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::JsonParsed),
                    commitment: Some(commitment),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await
        })
        .await
    }

    /// Token balance of an account, or `None` when it does not exist.
    pub async fn token_balance(&self, account: &Pubkey) -> ChainResult<Option<UiTokenAmount>> {
        let account = *account;
        let result = self
            .with_failover("getTokenAccountBalance", |c| async move {
                c.get_token_account_balance(&account).await
            })
            .await;
        match result {
            Ok(amount) => Ok(Some(amount)),
            Err(e) if is_missing_account(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parsed token account, or `None` when it does not exist.
    pub async fn token_account(&self, account: &Pubkey) -> ChainResult<Option<UiTokenAccount>> {
        let account = *account;
        let result = self
            .with_failover("getTokenAccount", |c| async move {
                c.get_token_account(&account).await
            })
            .await;
        match result {
            Ok(account) => Ok(account),
            Err(e) if is_missing_account(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether an account exists at the configured commitment.
    pub async fn account_exists(&self, account: &Pubkey) -> ChainResult<bool> {
        let account = *account;
        let commitment = self.commitment;
        let response = self
            .with_failover("getAccountInfo", |c| async move {
                c.get_account_with_commitment(&account, commitment).await
            })
            .await?;
        Ok(response.value.is_some())
    }

    /// Check if the chain is reachable and healthy.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self
            .with_failover("getSlot", |c| async move { c.get_slot().await })
            .await
            .is_ok();
        metrics::record_chain_health(healthy);
        healthy
    }

    /// Get the configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Commitment applied to queries and sends.
    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }
}

impl std::fmt::Debug for RpcGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcGateway")
            .field("rpc_url", &self.config.rpc_url)
            .field("endpoints", &self.clients.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

fn parse_commitment(level: &str) -> CommitmentConfig {
    match level {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}

/// Account-not-found surfaces as an RPC-level error string; treat it as
/// an empty balance rather than a failure.
fn is_missing_account(err: &ChainError) -> bool {
    match err {
        ChainError::Rpc(message) => {
            let lower = message.to_lowercase();
            lower.contains("could not find account") || lower.contains("accountnotfound")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ChainConfig {
        ChainConfig {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            rpc_timeout_secs: 2,
            ..ChainConfig::default()
        }
    }

    #[test]
    fn test_commitment_parsing() {
        assert_eq!(parse_commitment("processed"), CommitmentConfig::processed());
        assert_eq!(parse_commitment("finalized"), CommitmentConfig::finalized());
        assert_eq!(parse_commitment("confirmed"), CommitmentConfig::confirmed());
        // Unknown levels degrade to confirmed.
        assert_eq!(parse_commitment("instant"), CommitmentConfig::confirmed());
    }

    #[test]
    fn test_invalid_failover_urls_skipped() {
        let mut config = test_config();
        config.failover_urls.push("not a url".to_string());
        config.failover_urls.push("http://127.0.0.1:8900".to_string());

        let gateway = RpcGateway::new(config);
        assert_eq!(gateway.clients.len(), 2);
    }

    #[test]
    fn test_missing_account_detection() {
        let err = ChainError::Rpc("Invalid param: could not find account".to_string());
        assert!(is_missing_account(&err));

        let err = ChainError::Rpc("connection refused".to_string());
        assert!(!is_missing_account(&err));

        assert!(!is_missing_account(&ChainError::Cancelled));
    }

    #[tokio::test]
    async fn test_failover_surfaces_normalized_error() {
        // Nothing listens on this port; the gateway must surface a
        // normalized error instead of panicking.
        let mut config = test_config();
        config.rpc_url = "http://127.0.0.1:1".to_string();

        let gateway = RpcGateway::new(config);
        let result = gateway.latest_blockhash().await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ChainError::Rpc(_) | ChainError::Timeout { .. }
        ));
    }
}
