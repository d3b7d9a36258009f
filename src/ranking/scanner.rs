//! Donor leaderboard reconstruction from transaction history.
//!
//! # Responsibilities
//! - Enumerate historical signatures touching the donation ATA
//! - Fetch parsed transactions concurrently in fixed-size batches
//! - Filter SPL token transfers into the donation account, verifying
//!   the mint
//! - Attribute amounts to donors and produce a descending ranking
//!
//! The scan is best effort: per-transaction failures are logged and
//! skipped, and the output is only as fresh as the history the node
//! returns.

use std::str::FromStr;
use std::time::Instant;

use dashmap::DashMap;
use futures_util::future::join_all;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction,
};

use crate::chain::client::RpcGateway;
use crate::chain::transfer::to_ui_amount;
use crate::chain::types::{ChainError, ChainResult};
use crate::config::LeaderboardConfig;
use crate::observability::metrics;
use crate::ranking::types::DonorRank;

/// A transfer instruction aimed at the donation ATA, before donor
/// resolution.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawTransfer {
    /// Whether the instruction carried its own mint (transferChecked).
    pub checked: bool,
    /// Source token account.
    pub source: String,
    /// Signing authority, when present in the parsed form.
    pub authority: Option<String>,
    /// Mint, present only for transferChecked.
    pub mint: Option<String>,
    /// UI amount, when the parsed form carries one.
    pub ui_amount: Option<f64>,
    /// Raw amount string, for plain transfers.
    pub raw_amount: Option<u64>,
}

/// Extract a donation-bound SPL transfer from one parsed instruction.
///
/// Returns `None` for anything that is not a `transfer`/`transferChecked`
/// into `donation_ata`.
pub(crate) fn parse_transfer_instruction(
    program: &str,
    parsed: &Value,
    donation_ata: &str,
) -> Option<RawTransfer> {
    if program != "spl-token" {
        return None;
    }

    let kind = parsed.get("type")?.as_str()?;
    if kind != "transfer" && kind != "transferChecked" {
        return None;
    }

    let info = parsed.get("info")?;
    if info.get("destination")?.as_str()? != donation_ata {
        return None;
    }

    let authority = info
        .get("authority")
        .or_else(|| info.get("multisigAuthority"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Some(RawTransfer {
        checked: kind == "transferChecked",
        source: info.get("source")?.as_str()?.to_string(),
        authority,
        mint: info.get("mint").and_then(|v| v.as_str()).map(str::to_string),
        ui_amount: info
            .get("tokenAmount")
            .and_then(|t| t.get("uiAmount"))
            .and_then(|v| v.as_f64()),
        raw_amount: info
            .get("amount")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok()),
    })
}

/// Flatten a parsed transaction into `(program, parsed)` instruction
/// pairs. Transactions without metadata or parsed encoding yield none.
pub(crate) fn parsed_instructions(
    tx: &EncodedConfirmedTransactionWithStatusMeta,
) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    if tx.transaction.meta.is_none() {
        return out;
    }
    if let EncodedTransaction::Json(ui_tx) = &tx.transaction.transaction {
        if let UiMessage::Parsed(message) = &ui_tx.message {
            for instruction in &message.instructions {
                if let UiInstruction::Parsed(UiParsedInstruction::Parsed(p)) = instruction {
                    out.push((p.program.clone(), p.parsed.clone()));
                }
            }
        }
    }
    out
}

/// Scanner bound to one donation ATA and mint.
#[derive(Clone)]
pub struct LeaderboardScanner {
    gateway: RpcGateway,
    donation_ata: Pubkey,
    mint: String,
    token_decimals: u8,
    config: LeaderboardConfig,
}

impl LeaderboardScanner {
    pub fn new(
        gateway: RpcGateway,
        donation_ata: Pubkey,
        mint: Pubkey,
        token_decimals: u8,
        config: LeaderboardConfig,
    ) -> Self {
        Self {
            gateway,
            donation_ata,
            mint: mint.to_string(),
            token_decimals,
            config,
        }
    }

    /// Recompute the full leaderboard.
    pub async fn scan(&self) -> ChainResult<Vec<DonorRank>> {
        let start = Instant::now();
        tracing::info!(donation_ata = %self.donation_ata, "Scanning donation history");

        let signatures = self
            .gateway
            .signatures_for_address(&self.donation_ata, self.config.signature_limit)
            .await?;

        let totals: DashMap<String, f64> = DashMap::new();
        let mut processed = 0usize;
        let mut skipped = 0usize;

        for chunk in signatures.chunks(self.config.tx_batch_size.max(1)) {
            let batch = chunk
                .iter()
                .filter(|entry| entry.err.is_none())
                .map(|entry| self.accumulate_signature(&entry.signature, &totals));

            for result in join_all(batch).await {
                match result {
                    Ok(()) => processed += 1,
                    Err(e) => {
                        // Best effort: one bad transaction must not sink
                        // the whole scan.
                        tracing::warn!(error = %e, "Skipping transaction during scan");
                        skipped += 1;
                    }
                }
            }
        }

        let mut entries: Vec<DonorRank> = totals
            .into_iter()
            .map(|(address, amount)| DonorRank { address, amount })
            .collect();
        entries.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        metrics::record_scan(entries.len(), start);
        tracing::info!(
            donors = entries.len(),
            processed,
            skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Leaderboard scan complete"
        );

        Ok(entries)
    }

    /// Fetch one transaction and fold its donation transfers into the
    /// running totals.
    async fn accumulate_signature(
        &self,
        signature: &str,
        totals: &DashMap<String, f64>,
    ) -> ChainResult<()> {
        let signature = Signature::from_str(signature)
            .map_err(|e| ChainError::Rpc(format!("malformed signature in history: {}", e)))?;

        let tx = self.gateway.parsed_transaction(&signature).await?;
        let donation_ata = self.donation_ata.to_string();

        for (program, parsed) in parsed_instructions(&tx) {
            let Some(transfer) = parse_transfer_instruction(&program, &parsed, &donation_ata)
            else {
                continue;
            };

            let Some((donor, amount)) = self.resolve_transfer(transfer).await? else {
                continue;
            };

            *totals.entry(donor).or_insert(0.0) += amount;
        }

        Ok(())
    }

    /// Verify the mint and resolve the donor address for one transfer.
    ///
    /// `transferChecked` names its mint inline; a plain `transfer` only
    /// names token accounts, so the source account is resolved to learn
    /// the mint (and the owner, when the authority is absent).
    async fn resolve_transfer(
        &self,
        transfer: RawTransfer,
    ) -> ChainResult<Option<(String, f64)>> {
        let mut source_owner = None;

        if transfer.checked {
            if transfer.mint.as_deref() != Some(self.mint.as_str()) {
                return Ok(None);
            }
        } else {
            let source = Pubkey::from_str(&transfer.source)
                .map_err(|e| ChainError::Rpc(format!("malformed source account: {}", e)))?;
            match self.gateway.token_account(&source).await? {
                Some(account) if account.mint == self.mint => {
                    source_owner = Some(account.owner);
                }
                // Wrong mint, or the source account no longer exists.
                _ => return Ok(None),
            }
        }

        let Some(donor) = transfer.authority.or(source_owner) else {
            return Ok(None);
        };

        let amount = transfer
            .ui_amount
            .or_else(|| transfer.raw_amount.map(|raw| to_ui_amount(raw, self.token_decimals)));
        let Some(amount) = amount else {
            return Ok(None);
        };

        Ok(Some((donor, amount)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DONATION_ATA: &str = "7o36UsWR1JQLpZ9PE2gn9L4SQ69CNNiWAXd4Jt7rqz9Z";

    fn checked_transfer(destination: &str, mint: &str, ui_amount: f64) -> Value {
        json!({
            "type": "transferChecked",
            "info": {
                "source": "9vHamyTWSgeZbTLeGhSyVnTQTpbdzeLuRqEMPEmuZ2mq",
                "destination": destination,
                "authority": "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1",
                "mint": mint,
                "tokenAmount": { "uiAmount": ui_amount, "decimals": 6, "amount": "10000000000" }
            }
        })
    }

    #[test]
    fn test_checked_transfer_parsed() {
        let parsed = checked_transfer(DONATION_ATA, "mint111", 10_000.0);
        let transfer =
            parse_transfer_instruction("spl-token", &parsed, DONATION_ATA).unwrap();
        assert!(transfer.checked);
        assert_eq!(transfer.mint.as_deref(), Some("mint111"));
        assert_eq!(transfer.ui_amount, Some(10_000.0));
        assert_eq!(
            transfer.authority.as_deref(),
            Some("5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1")
        );
    }

    #[test]
    fn test_wrong_destination_ignored() {
        let parsed = checked_transfer("somewhere-else", "mint111", 5.0);
        assert!(parse_transfer_instruction("spl-token", &parsed, DONATION_ATA).is_none());
    }

    #[test]
    fn test_non_token_program_ignored() {
        let parsed = checked_transfer(DONATION_ATA, "mint111", 5.0);
        assert!(parse_transfer_instruction("system", &parsed, DONATION_ATA).is_none());
    }

    #[test]
    fn test_non_transfer_type_ignored() {
        let parsed = json!({
            "type": "mintTo",
            "info": { "destination": DONATION_ATA, "amount": "5" }
        });
        assert!(parse_transfer_instruction("spl-token", &parsed, DONATION_ATA).is_none());
    }

    #[test]
    fn test_plain_transfer_carries_raw_amount() {
        let parsed = json!({
            "type": "transfer",
            "info": {
                "source": "9vHamyTWSgeZbTLeGhSyVnTQTpbdzeLuRqEMPEmuZ2mq",
                "destination": DONATION_ATA,
                "authority": "5Q544fKrFoe6tsEbD7S8EmxGTJYAKtTVhAW5Q5pge4j1",
                "amount": "2500000"
            }
        });
        let transfer =
            parse_transfer_instruction("spl-token", &parsed, DONATION_ATA).unwrap();
        assert!(!transfer.checked);
        assert_eq!(transfer.mint, None);
        assert_eq!(transfer.ui_amount, None);
        assert_eq!(transfer.raw_amount, Some(2_500_000));
    }

    #[test]
    fn test_multisig_authority_fallback() {
        let parsed = json!({
            "type": "transfer",
            "info": {
                "source": "9vHamyTWSgeZbTLeGhSyVnTQTpbdzeLuRqEMPEmuZ2mq",
                "destination": DONATION_ATA,
                "multisigAuthority": "msig11111111111111111111111111111111111111",
                "amount": "100"
            }
        });
        let transfer =
            parse_transfer_instruction("spl-token", &parsed, DONATION_ATA).unwrap();
        assert_eq!(
            transfer.authority.as_deref(),
            Some("msig11111111111111111111111111111111111111")
        );
    }
}
