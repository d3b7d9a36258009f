//! Donation orchestration.
//!
//! Ties the transfer pipeline, balance queries, and progress
//! computation to one configured campaign. The insufficient-balance
//! gate lives here: an amount above the last observed wallet balance is
//! rejected before any RPC call is made.

use std::sync::Arc;
use std::str::FromStr;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use solana_account_decoder::parse_token::UiTokenAmount;
use solana_sdk::pubkey::Pubkey;
use spl_associated_token_account::get_associated_token_address;

use crate::chain::client::RpcGateway;
use crate::chain::transfer::{to_raw_amount, to_ui_amount, TransferOutcome, TransferPipeline};
use crate::chain::types::{ChainError, ChainResult};
use crate::chain::wallet::DonationSigner;
use crate::config::{DonationConfig, RetryConfig};
use crate::donation::types::{DonationOutcome, Milestone, ProgressReport};

fn ui_amount_of(amount: &UiTokenAmount, decimals: u8) -> f64 {
    amount
        .ui_amount
        .unwrap_or_else(|| to_ui_amount(amount.amount.parse::<u64>().unwrap_or(0), decimals))
}

/// Campaign-bound donation service.
pub struct DonationService {
    gateway: RpcGateway,
    pipeline: TransferPipeline,
    wallet_address: Pubkey,
    donation_owner: Pubkey,
    mint: Pubkey,
    config: DonationConfig,
    /// Last observed wallet balance, in UI units. Feeds the local gate.
    cached_balance: ArcSwapOption<f64>,
}

impl DonationService {
    pub fn new(
        gateway: RpcGateway,
        signer: Arc<dyn DonationSigner>,
        retries: RetryConfig,
        config: DonationConfig,
    ) -> ChainResult<Self> {
        let donation_owner = Pubkey::from_str(&config.donation_address)
            .map_err(|e| ChainError::Wallet(format!("invalid donation address: {}", e)))?;
        let mint = Pubkey::from_str(&config.token_mint)
            .map_err(|e| ChainError::Wallet(format!("invalid token mint: {}", e)))?;

        let wallet_address = signer.pubkey();
        let pipeline = TransferPipeline::new(
            gateway.clone(),
            signer,
            retries,
            mint,
            donation_owner,
            config.token_decimals,
            Duration::from_millis(config.settle_delay_ms),
        );

        Ok(Self {
            gateway,
            pipeline,
            wallet_address,
            donation_owner,
            mint,
            config,
            cached_balance: ArcSwapOption::from(None),
        })
    }

    /// The gateway wallet address.
    pub fn wallet_address(&self) -> Pubkey {
        self.wallet_address
    }

    /// The donation account's ATA, the address the leaderboard tracks.
    pub fn donation_ata(&self) -> Pubkey {
        get_associated_token_address(&self.donation_owner, &self.mint)
    }

    /// Campaign token mint.
    pub fn mint(&self) -> Pubkey {
        self.mint
    }

    /// Campaign configuration.
    pub fn config(&self) -> &DonationConfig {
        &self.config
    }

    /// Campaign token balance of an arbitrary owner. Missing accounts
    /// read as zero.
    pub async fn token_balance(&self, owner: &Pubkey) -> ChainResult<f64> {
        let ata = get_associated_token_address(owner, &self.mint);
        let balance = self
            .gateway
            .token_balance(&ata)
            .await?
            .map(|amount| ui_amount_of(&amount, self.config.token_decimals))
            .unwrap_or(0.0);
        Ok(balance)
    }

    /// The gateway wallet's own balance. Successful reads refresh the
    /// local gate.
    pub async fn wallet_balance(&self) -> ChainResult<f64> {
        let balance = self.token_balance(&self.wallet_address).await?;
        self.note_wallet_balance(balance);
        Ok(balance)
    }

    /// Record an observed wallet balance for the local donate gate.
    pub(crate) fn note_wallet_balance(&self, balance: f64) {
        self.cached_balance.store(Some(Arc::new(balance)));
    }

    fn cached_wallet_balance(&self) -> Option<f64> {
        self.cached_balance.load_full().map(|b| *b)
    }

    /// Donation progress against the configured goal.
    pub async fn progress(&self) -> ChainResult<ProgressReport> {
        let current = self.token_balance(&self.donation_owner).await?;

        let milestones = self
            .config
            .milestones
            .iter()
            .map(|m| Milestone {
                amount: m.amount,
                label: m.label.clone(),
                reached: current >= m.amount,
            })
            .collect();

        Ok(ProgressReport::new(
            current,
            self.config.goal,
            self.config.token_symbol.clone(),
            milestones,
        ))
    }

    /// Donate `amount` tokens from the gateway wallet.
    ///
    /// Rejects locally, before any network traffic, when the amount
    /// is invalid or exceeds the last observed wallet balance. A
    /// declined signature resolves to [`DonationOutcome::Cancelled`].
    pub async fn donate(&self, amount: f64) -> ChainResult<DonationOutcome> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ChainError::InvalidAmount(amount));
        }

        let decimals = self.config.token_decimals;
        if let Some(balance) = self.cached_wallet_balance() {
            let required = to_raw_amount(amount, decimals);
            let available = to_raw_amount(balance, decimals);
            if required > available {
                return Err(ChainError::InsufficientFunds {
                    required,
                    available,
                });
            }
        }

        match self.pipeline.send_tokens(amount).await? {
            TransferOutcome::Confirmed(signature) => {
                // Best effort; the periodic refresh will catch up anyway.
                if let Ok(balance) = self.token_balance(&self.wallet_address).await {
                    self.note_wallet_balance(balance);
                }
                Ok(DonationOutcome::Confirmed {
                    signature: signature.to_string(),
                    amount,
                })
            }
            TransferOutcome::Cancelled => Ok(DonationOutcome::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::wallet::WalletError;
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::transaction::Transaction;

    struct StaticSigner(Pubkey);

    #[async_trait]
    impl DonationSigner for StaticSigner {
        fn pubkey(&self) -> Pubkey {
            self.0
        }

        async fn sign_transaction(
            &self,
            _transaction: &mut Transaction,
            _recent_blockhash: Hash,
        ) -> Result<(), WalletError> {
            Err(WalletError::Rejected("user rejected the request".to_string()))
        }
    }

    fn test_service() -> DonationService {
        let chain = crate::config::ChainConfig {
            // Nothing listens here; the local gate must reject before
            // the gateway is ever consulted.
            rpc_url: "http://127.0.0.1:1".to_string(),
            rpc_timeout_secs: 1,
            ..Default::default()
        };
        let config = DonationConfig {
            donation_address: "S4DDsQjAwV2f9fGPNcbAQWPcQJP2GQT1VGrA5MK9Myq".to_string(),
            token_mint: "EStPXF2Mh3NVEezeysYfhrWXnuqwmbmjqLSP9vR5pump".to_string(),
            ..Default::default()
        };
        let retries = RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            rate_limit_base_ms: 1,
            rate_limit_max_ms: 1,
            growth_factor: 1.5,
        };
        DonationService::new(
            RpcGateway::new(chain),
            Arc::new(StaticSigner(Pubkey::new_unique())),
            retries,
            config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected_locally() {
        let service = test_service();
        assert!(matches!(
            service.donate(0.0).await,
            Err(ChainError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.donate(-5.0).await,
            Err(ChainError::InvalidAmount(_))
        ));
        assert!(matches!(
            service.donate(f64::NAN).await,
            Err(ChainError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_over_balance_rejected_before_any_rpc() {
        let service = test_service();
        service.note_wallet_balance(0.0);

        let start = std::time::Instant::now();
        let result = service.donate(100.0).await;

        assert!(matches!(result, Err(ChainError::InsufficientFunds { .. })));
        // The unreachable RPC endpoint was never consulted: a network
        // attempt would burn at least the 1s connect timeout.
        assert!(start.elapsed().as_millis() < 500);
    }

    #[tokio::test]
    async fn test_gate_uses_raw_units() {
        let service = test_service();
        service.note_wallet_balance(50_000.0);

        // 50,000.0000001 floors to the same raw amount as the balance;
        // the gate must not reject it.  It then proceeds to the
        // pipeline, which fails on the unreachable endpoint.
        let result = service.donate(50_000.0000001).await;
        assert!(!matches!(result, Err(ChainError::InsufficientFunds { .. })));
    }

    #[test]
    fn test_donation_ata_derivation() {
        let service = test_service();
        let ata = service.donation_ata();
        assert_ne!(ata, service.wallet_address());
        assert_ne!(ata, service.mint());
    }

    #[test]
    fn test_ui_amount_fallback_to_raw() {
        let amount = UiTokenAmount {
            ui_amount: None,
            decimals: 6,
            amount: "2500000".to_string(),
            ui_amount_string: String::new(),
        };
        assert_eq!(ui_amount_of(&amount, 6), 2.5);
    }
}
