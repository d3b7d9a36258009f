//! Token transfer pipeline: account setup, signing, submission, and
//! confirmation monitoring.
//!
//! # Responsibilities
//! - Locate or create associated token accounts for both sides
//! - Gate on the sender's on-chain balance before submitting
//! - Build, sign, and broadcast the transfer instruction
//! - Confirm via layered verification with bounded retries
//!
//! A declined signature resolves the whole pipeline to
//! [`TransferOutcome::Cancelled`]; it never surfaces as an error.

use std::sync::Arc;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::TransactionConfirmationStatus;
use spl_associated_token_account::get_associated_token_address;
use tokio::time::{interval, sleep};

use crate::chain::client::RpcGateway;
use crate::chain::types::{ChainError, ChainResult, ConfirmationOutcome};
use crate::chain::wallet::DonationSigner;
use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::{with_retry, with_timeout};

/// Result of a transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transfer landed; the signature is confirmed on chain.
    Confirmed(Signature),
    /// The user declined a signature request somewhere in the pipeline.
    Cancelled,
}

/// Convert a UI amount to raw token units, flooring fractional dust.
pub fn to_raw_amount(ui_amount: f64, decimals: u8) -> u64 {
    (ui_amount * 10f64.powi(decimals as i32)).floor() as u64
}

/// Convert raw token units to a UI amount.
pub fn to_ui_amount(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

/// Token transfer pipeline bound to one campaign.
pub struct TransferPipeline {
    gateway: RpcGateway,
    signer: Arc<dyn DonationSigner>,
    retries: RetryConfig,
    mint: Pubkey,
    donation_owner: Pubkey,
    token_decimals: u8,
    settle_delay: Duration,
}

impl TransferPipeline {
    pub fn new(
        gateway: RpcGateway,
        signer: Arc<dyn DonationSigner>,
        retries: RetryConfig,
        mint: Pubkey,
        donation_owner: Pubkey,
        token_decimals: u8,
        settle_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            signer,
            retries,
            mint,
            donation_owner,
            token_decimals,
            settle_delay,
        }
    }

    /// The campaign token's associated account for `owner`.
    pub fn ata_for(&self, owner: &Pubkey) -> Pubkey {
        get_associated_token_address(owner, &self.mint)
    }

    /// The donation account's ATA, the address the leaderboard tracks.
    pub fn donation_ata(&self) -> Pubkey {
        self.ata_for(&self.donation_owner)
    }

    /// Send `ui_amount` tokens from the signer to the donation account.
    ///
    /// The whole pipeline races a hard deadline from the chain config.
    pub async fn send_tokens(&self, ui_amount: f64) -> ChainResult<TransferOutcome> {
        let deadline = Duration::from_secs(self.gateway.config().transfer_timeout_secs);
        let result = with_timeout(deadline, "Transfer", self.run_transfer(ui_amount)).await;

        match result {
            Ok(outcome) => Ok(outcome),
            // A declined signature is an outcome, not an error.
            Err(ChainError::Cancelled) => Ok(TransferOutcome::Cancelled),
            Err(e) => Err(e),
        }
    }

    async fn run_transfer(&self, ui_amount: f64) -> ChainResult<TransferOutcome> {
        let from = self.signer.pubkey();
        let raw_amount = to_raw_amount(ui_amount, self.token_decimals);

        tracing::info!(from = %from, amount = ui_amount, "Starting token transfer");

        let from_ata = self.ensure_token_account(&from).await?;
        let to_ata = self.ensure_token_account(&self.donation_owner).await?;

        // On-chain balance gate. The service layer already rejected
        // amounts above the cached balance; this catches drift.
        let available = self.raw_balance(&from_ata).await?;
        if available < raw_amount {
            return Err(ChainError::InsufficientFunds {
                required: raw_amount,
                available,
            });
        }

        let instruction = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &from_ata,
            &self.mint,
            &to_ata,
            &from,
            &[],
            raw_amount,
            self.token_decimals,
        )
        .map_err(|e| ChainError::Rpc(format!("instruction build failed: {}", e)))?;

        let mut transaction = Transaction::new_with_payer(&[instruction], Some(&from));

        let (blockhash, _last_valid) =
            with_retry(&self.retries, "Blockhash fetch", || {
                self.gateway.latest_blockhash()
            })
            .await?;

        self.signer
            .sign_transaction(&mut transaction, blockhash)
            .await?;

        let send_deadline = Duration::from_secs(self.gateway.config().send_timeout_secs);
        let signature = with_timeout(
            send_deadline,
            "Transaction send",
            with_retry(&self.retries, "Transaction send", || {
                self.gateway.send_transaction(&transaction)
            }),
        )
        .await?;

        tracing::info!(signature = %signature, "Transaction sent");

        match self.confirm_transaction(&signature, &to_ata).await? {
            ConfirmationOutcome::Confirmed | ConfirmationOutcome::Verified => {
                metrics::record_donation("confirmed", ui_amount);
                tracing::info!(signature = %signature, "Transfer confirmed");
                Ok(TransferOutcome::Confirmed(signature))
            }
            ConfirmationOutcome::Failed(reason) => {
                metrics::record_donation("failed", ui_amount);
                Err(ChainError::Confirmation(reason))
            }
            ConfirmationOutcome::Unconfirmed => {
                metrics::record_donation("unconfirmed", ui_amount);
                Err(ChainError::Confirmation(
                    "transaction was not confirmed within the deadline".to_string(),
                ))
            }
        }
    }

    /// Locate the ATA for `owner`, creating it when absent.
    ///
    /// Creation is itself a signed transaction and follows the same
    /// send/confirm path as the transfer.
    pub async fn ensure_token_account(&self, owner: &Pubkey) -> ChainResult<Pubkey> {
        let ata = self.ata_for(owner);

        let exists = with_retry(&self.retries, "Account check", || {
            self.gateway.account_exists(&ata)
        })
        .await?;
        if exists {
            tracing::debug!(ata = %ata, "Token account exists");
            return Ok(ata);
        }

        tracing::info!(ata = %ata, owner = %owner, "Creating token account");

        let payer = self.signer.pubkey();
        let instruction = spl_associated_token_account::instruction::create_associated_token_account(
            &payer,
            owner,
            &self.mint,
            &spl_token::id(),
        );
        let mut transaction = Transaction::new_with_payer(&[instruction], Some(&payer));

        let (blockhash, _last_valid) =
            with_retry(&self.retries, "Blockhash fetch", || {
                self.gateway.latest_blockhash()
            })
            .await?;

        self.signer
            .sign_transaction(&mut transaction, blockhash)
            .await?;

        let send_deadline = Duration::from_secs(self.gateway.config().send_timeout_secs);
        let signature = with_timeout(
            send_deadline,
            "Account creation send",
            with_retry(&self.retries, "Account creation send", || {
                self.gateway.send_transaction(&transaction)
            }),
        )
        .await
        .map_err(|e| match e {
            ChainError::Cancelled => ChainError::Cancelled,
            other => ChainError::AccountCreation(other.to_string()),
        })?;

        match self.confirm_transaction(&signature, &ata).await? {
            ConfirmationOutcome::Confirmed | ConfirmationOutcome::Verified => {}
            ConfirmationOutcome::Failed(reason) => {
                return Err(ChainError::AccountCreation(reason));
            }
            ConfirmationOutcome::Unconfirmed => {
                return Err(ChainError::AccountCreation(format!(
                    "creation transaction {} not confirmed",
                    signature
                )));
            }
        }

        tracing::info!(ata = %ata, "Token account created");

        // Fresh accounts are not always visible to queries immediately.
        sleep(self.settle_delay).await;
        Ok(ata)
    }

    /// Raw token balance of an account; missing accounts read as zero.
    pub async fn raw_balance(&self, ata: &Pubkey) -> ChainResult<u64> {
        let amount = with_retry(&self.retries, "Balance check", || {
            self.gateway.token_balance(ata)
        })
        .await?;
        Ok(amount
            .and_then(|a| a.amount.parse::<u64>().ok())
            .unwrap_or(0))
    }

    /// Confirm a submitted transaction.
    ///
    /// Primary path polls signature status under the confirmation
    /// deadline. When that expires, layered verification takes over:
    /// status check, recipient balance check, then transaction-history
    /// lookup, each best effort.
    pub async fn confirm_transaction(
        &self,
        signature: &Signature,
        recipient_ata: &Pubkey,
    ) -> ChainResult<ConfirmationOutcome> {
        let chain = self.gateway.config();
        let poll = Duration::from_millis(chain.confirmation_poll_ms);
        let deadline = Duration::from_secs(chain.confirmation_timeout_secs);

        tracing::debug!(signature = %signature, "Confirming transaction");

        let primary = with_timeout(deadline, "Transaction confirmation", async {
            let mut ticker = interval(poll);
            loop {
                ticker.tick().await;
                match self.gateway.signature_status(signature).await {
                    Ok(Some(status)) => {
                        if let Some(err) = status.err {
                            return Ok(ConfirmationOutcome::Failed(err.to_string()));
                        }
                        if matches!(
                            status.confirmation_status,
                            Some(TransactionConfirmationStatus::Confirmed)
                                | Some(TransactionConfirmationStatus::Finalized)
                        ) {
                            return Ok(ConfirmationOutcome::Confirmed);
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(signature = %signature, "Transaction pending");
                    }
                    Err(e) => {
                        // Transient; the deadline bounds us.
                        tracing::debug!(signature = %signature, error = %e, "Status poll failed");
                    }
                }
            }
        })
        .await;

        match primary {
            Ok(outcome @ (ConfirmationOutcome::Confirmed | ConfirmationOutcome::Failed(_))) => {
                return Ok(outcome)
            }
            Ok(_) => {}
            Err(ChainError::Timeout { .. }) => {
                tracing::warn!(signature = %signature, "Confirmation timed out, falling back to layered verification");
            }
            Err(e) => return Err(e),
        }

        for attempt in 0..chain.confirmation_poll_attempts {
            if self.verify_transaction_success(signature, recipient_ata).await {
                return Ok(ConfirmationOutcome::Verified);
            }
            tracing::debug!(
                signature = %signature,
                attempt = attempt + 1,
                max = chain.confirmation_poll_attempts,
                "Verification poll"
            );
            sleep(poll).await;
        }

        // One last look before giving up.
        if self.verify_transaction_success(signature, recipient_ata).await {
            return Ok(ConfirmationOutcome::Verified);
        }

        Ok(ConfirmationOutcome::Unconfirmed)
    }

    /// Layered success check: status, recipient balance, then history.
    async fn verify_transaction_success(
        &self,
        signature: &Signature,
        recipient_ata: &Pubkey,
    ) -> bool {
        match self.gateway.signature_status(signature).await {
            Ok(Some(status)) => {
                let landed = matches!(
                    status.confirmation_status,
                    Some(TransactionConfirmationStatus::Confirmed)
                        | Some(TransactionConfirmationStatus::Finalized)
                );
                if landed && status.err.is_none() {
                    tracing::debug!(signature = %signature, "Verified via status check");
                    return true;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "Status verification failed"),
        }

        match self.gateway.token_balance(recipient_ata).await {
            Ok(Some(amount)) if amount.amount.parse::<u64>().unwrap_or(0) > 0 => {
                tracing::debug!(signature = %signature, "Verified via balance check");
                return true;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Balance verification failed"),
        }

        match self.gateway.parsed_transaction(signature).await {
            Ok(_) => {
                tracing::debug!(signature = %signature, "Verified via history check");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "History verification failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_amount_conversion() {
        // 10,000 KT at 6 decimals.
        assert_eq!(to_raw_amount(10_000.0, 6), 10_000_000_000);
        // Fractional dust below one raw unit is floored away.
        assert_eq!(to_raw_amount(0.0000019, 6), 1);
        assert_eq!(to_raw_amount(0.0, 6), 0);
    }

    #[test]
    fn test_ui_amount_conversion() {
        assert_eq!(to_ui_amount(10_000_000_000, 6), 10_000.0);
        assert_eq!(to_ui_amount(1, 6), 0.000001);
    }

    #[test]
    fn test_ata_derivation_is_deterministic() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let a = get_associated_token_address(&owner, &mint);
        let b = get_associated_token_address(&owner, &mint);
        assert_eq!(a, b);
        assert_ne!(a, owner);
    }
}
