//! Chain-specific types and error definitions.

use solana_client::client_error::ClientError;
use thiserror::Error;

// Re-export ChainConfig from config module to avoid duplication
pub use crate::config::schema::ChainConfig;

/// How a failure should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// User action, not a failure (e.g. cancelled signature request).
    Info,
    /// Transient or recoverable; worth retrying.
    Warning,
    /// Blocking failure.
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Errors that can occur during chain operations.
///
/// Every RPC and signing failure is normalized into this type at the
/// utility boundary; the HTTP layer selects user-facing messages from
/// [`ChainError::code`].
#[derive(Debug, Error)]
pub enum ChainError {
    /// The user declined to sign. Terminal, but not a failure.
    #[error("Transaction cancelled by user")]
    Cancelled,

    /// The endpoint is throttling us.
    #[error("RPC rate limited: {0}")]
    RateLimited(String),

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The transaction's blockhash expired before it landed.
    #[error("Blockhash expired")]
    BlockhashExpired,

    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The requested amount is zero, negative, or not a number.
    #[error("Invalid donation amount: {0}")]
    InvalidAmount(f64),

    /// Sender holds less than the requested amount.
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    /// Creating an associated token account failed.
    #[error("Failed to create token account: {0}")]
    AccountCreation(String),

    /// The transaction could not be confirmed.
    #[error("Transaction confirmation failed: {0}")]
    Confirmation(String),

    /// Invalid key material or wallet configuration.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Signing failed for a reason other than user rejection.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Retries exhausted without success.
    #[error("Operation failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl ChainError {
    /// Machine-readable code consumed by the UI layer.
    pub fn code(&self) -> &'static str {
        match self {
            ChainError::Cancelled => "USER_REJECTED",
            ChainError::RateLimited(_) => "RATE_LIMIT",
            ChainError::Timeout { .. } => "TIMEOUT_ERROR",
            ChainError::BlockhashExpired => "BLOCKHASH_EXPIRED",
            ChainError::Rpc(_) => "NETWORK_ERROR",
            ChainError::InvalidAmount(_) => "INVALID_AMOUNT",
            ChainError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ChainError::AccountCreation(_) => "ACCOUNT_CREATION_ERROR",
            ChainError::Confirmation(_) => "CONFIRMATION_ERROR",
            ChainError::Wallet(_) => "WALLET_ERROR",
            ChainError::Signing(_) => "SIGNING_ERROR",
            ChainError::Exhausted { .. } => "OPERATION_FAILED",
        }
    }

    /// How the error should be surfaced.
    pub fn severity(&self) -> Severity {
        match self {
            ChainError::Cancelled => Severity::Info,
            ChainError::RateLimited(_)
            | ChainError::Timeout { .. }
            | ChainError::InvalidAmount(_)
            | ChainError::InsufficientFunds { .. }
            | ChainError::Wallet(_)
            | ChainError::Signing(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Normalize a raw RPC client failure.
    ///
    /// Classification is message-based: the client library folds HTTP
    /// status and JSON-RPC errors into display strings, and endpoints
    /// word throttle responses differently.
    pub fn from_rpc(err: ClientError) -> Self {
        let message = err.to_string();
        let lower = message.to_lowercase();

        if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests")
        {
            return ChainError::RateLimited(message);
        }
        if lower.contains("blockhash not found") || lower.contains("blockhash expired") {
            return ChainError::BlockhashExpired;
        }
        ChainError::Rpc(message)
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Confirmed at the configured commitment.
    Confirmed,
    /// Verified indirectly (recipient balance or history lookup).
    Verified,
    /// Could not be confirmed within the deadline.
    Unconfirmed,
    /// The chain reports the transaction failed.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_client::client_error::ClientErrorKind;

    fn client_error(message: &str) -> ClientError {
        ClientError::from(ClientErrorKind::Custom(message.to_string()))
    }

    #[test]
    fn test_rate_limit_classification() {
        let err = ChainError::from_rpc(client_error("HTTP status client error (429 Too Many Requests)"));
        assert!(matches!(err, ChainError::RateLimited(_)));
        assert_eq!(err.code(), "RATE_LIMIT");
    }

    #[test]
    fn test_blockhash_classification() {
        let err = ChainError::from_rpc(client_error("Blockhash not found"));
        assert!(matches!(err, ChainError::BlockhashExpired));
    }

    #[test]
    fn test_generic_rpc_classification() {
        let err = ChainError::from_rpc(client_error("connection refused"));
        assert!(matches!(err, ChainError::Rpc(_)));
        assert_eq!(err.code(), "NETWORK_ERROR");
    }

    #[test]
    fn test_cancelled_is_info_not_error() {
        let err = ChainError::Cancelled;
        assert_eq!(err.severity(), Severity::Info);
        assert_eq!(err.code(), "USER_REJECTED");
    }

    #[test]
    fn test_insufficient_funds_display() {
        let err = ChainError::InsufficientFunds {
            required: 10_000_000,
            available: 500,
        };
        assert!(err.to_string().contains("10000000"));
        assert_eq!(err.severity(), Severity::Warning);
    }
}
