//! Wallet management and transaction signing.
//!
//! # Security
//! - Key material is loaded from an environment variable or a keypair
//!   file, never from the config file itself
//! - Keys are never logged or serialized
//!
//! Signing is a trait seam: the gateway normally signs with its own
//! keypair, but any signer that can decline a request (hardware wallet
//! bridge, approval-gated signer) plugs in here. A declined signature is
//! a first-class outcome, not an error.

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use thiserror::Error;

/// Environment variable holding the gateway keypair (base58).
pub const KEYPAIR_ENV_VAR: &str = "GATEWAY_WALLET_KEYPAIR";

/// Rejection wordings observed across wallet vendors.
const REJECTION_PATTERNS: &[&str] = &[
    "user rejected",
    "rejected the request",
    "user denied",
    "user cancelled",
    "transaction was not confirmed",
    "failed to sign transaction",
    "user reject",
    "rejected by user",
    "user declined",
    "wallet adapter error",
    "signature request denied",
    "transaction rejected",
    "wallet disconnected",
];

/// Standard wallet rejection code, plus the internal code one major
/// vendor raises for the same action.
const REJECTION_CODES: &[i64] = &[4001, -32603];

/// Check whether a signing failure is a user rejection.
pub fn is_user_rejection(message: &str, code: Option<i64>) -> bool {
    if let Some(code) = code {
        if REJECTION_CODES.contains(&code) {
            return true;
        }
    }
    let lower = message.to_lowercase();
    REJECTION_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Errors raised by a signer.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The user declined the signature request.
    #[error("Signature request rejected: {0}")]
    Rejected(String),

    /// Invalid key material format or derivation error.
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Signing failed for another reason.
    #[error("Signing failed: {0}")]
    Signing(String),
}

impl WalletError {
    /// Classify a raw signing failure by message and optional code.
    pub fn classify(message: impl Into<String>, code: Option<i64>) -> Self {
        let message = message.into();
        if is_user_rejection(&message, code) {
            WalletError::Rejected(message)
        } else {
            WalletError::Signing(message)
        }
    }
}

impl From<WalletError> for crate::chain::types::ChainError {
    fn from(err: WalletError) -> Self {
        use crate::chain::types::ChainError;
        match err {
            WalletError::Rejected(_) => ChainError::Cancelled,
            WalletError::InvalidKey(msg) => ChainError::Wallet(msg),
            WalletError::Signing(msg) => ChainError::Signing(msg),
        }
    }
}

/// Transaction signing seam.
#[async_trait]
pub trait DonationSigner: Send + Sync {
    /// The signer's account address.
    fn pubkey(&self) -> Pubkey;

    /// Sign `transaction` in place with the given blockhash.
    async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        recent_blockhash: Hash,
    ) -> Result<(), WalletError>;
}

/// Signer backed by a local keypair.
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Parse a base58-encoded 64-byte keypair.
    pub fn from_base58(encoded: &str) -> Result<Self, WalletError> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| WalletError::InvalidKey(format!("base58 decode failed: {}", e)))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| WalletError::InvalidKey(format!("not a valid keypair: {}", e)))?;
        Ok(Self::new(keypair))
    }

    /// Load a JSON byte-array keypair file.
    pub fn from_file(path: &str) -> Result<Self, WalletError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WalletError::InvalidKey(format!("cannot read {}: {}", path, e)))?;
        let bytes: Vec<u8> = serde_json::from_str(&content)
            .map_err(|e| WalletError::InvalidKey(format!("malformed keypair file: {}", e)))?;
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| WalletError::InvalidKey(format!("not a valid keypair: {}", e)))?;
        Ok(Self::new(keypair))
    }

    /// Load from `GATEWAY_WALLET_KEYPAIR`, falling back to `path`.
    pub fn from_env_or_file(path: Option<&str>) -> Result<Self, WalletError> {
        if let Ok(encoded) = std::env::var(KEYPAIR_ENV_VAR) {
            if !encoded.trim().is_empty() {
                let signer = Self::from_base58(&encoded)?;
                tracing::info!(address = %signer.pubkey(), "Wallet loaded from environment");
                return Ok(signer);
            }
        }
        match path {
            Some(path) => {
                let signer = Self::from_file(path)?;
                tracing::info!(address = %signer.pubkey(), path, "Wallet loaded from file");
                Ok(signer)
            }
            None => Err(WalletError::InvalidKey(format!(
                "{} not set and no keypair_path configured",
                KEYPAIR_ENV_VAR
            ))),
        }
    }
}

#[async_trait]
impl DonationSigner for KeypairSigner {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        recent_blockhash: Hash,
    ) -> Result<(), WalletError> {
        transaction
            .try_sign(&[&self.keypair], recent_blockhash)
            .map_err(|e| WalletError::classify(e.to_string(), None))
    }
}

impl std::fmt::Debug for KeypairSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairSigner")
            .field("address", &self.keypair.pubkey())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_instruction;

    #[test]
    fn test_rejection_by_code() {
        assert!(is_user_rejection("some vendor message", Some(4001)));
        assert!(is_user_rejection("internal error", Some(-32603)));
        assert!(!is_user_rejection("internal error", Some(500)));
    }

    #[test]
    fn test_rejection_by_pattern() {
        assert!(is_user_rejection("User rejected the request.", None));
        assert!(is_user_rejection("Error: user denied transaction signature", None));
        assert!(is_user_rejection("Signature request DENIED", None));
        assert!(!is_user_rejection("connection reset by peer", None));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            WalletError::classify("user cancelled", None),
            WalletError::Rejected(_)
        ));
        assert!(matches!(
            WalletError::classify("keypair mismatch", None),
            WalletError::Signing(_)
        ));
    }

    #[test]
    fn test_base58_roundtrip() {
        let keypair = Keypair::new();
        let encoded = keypair.to_base58_string();
        let signer = KeypairSigner::from_base58(&encoded).unwrap();
        assert_eq!(signer.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_invalid_base58_rejected() {
        let result = KeypairSigner::from_base58("!!! not base58 !!!");
        assert!(matches!(result, Err(WalletError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_keypair_signing() {
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey();
        let signer = KeypairSigner::new(keypair);

        let ix = system_instruction::transfer(&pubkey, &Pubkey::new_unique(), 1);
        let mut tx = Transaction::new_with_payer(&[ix], Some(&pubkey));
        signer
            .sign_transaction(&mut tx, Hash::default())
            .await
            .unwrap();
        assert!(tx.is_signed());
    }
}
