//! Error-to-response mapping.
//!
//! Every chain failure leaving the API is a JSON envelope carrying the
//! machine-readable code, a user-facing message, and a severity the
//! frontend uses to pick between an info banner, a warning, and a
//! blocking error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::chain::types::ChainError;

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub severity: &'static str,
}

/// API-level error with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>, severity: &'static str) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
                severity,
            },
        }
    }

    /// 400 with a warning severity, for malformed client input.
    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message, "warning")
    }
}

/// Select the user-facing message for a chain error code.
fn user_message(error: &ChainError) -> String {
    match error.code() {
        "USER_REJECTED" => "Transaction cancelled".to_string(),
        "INSUFFICIENT_FUNDS" => "Insufficient balance in your wallet".to_string(),
        "INVALID_AMOUNT" => "Please enter a valid amount".to_string(),
        "WALLET_ERROR" => "Please reconnect your wallet and try again".to_string(),
        "SIGNING_ERROR" => "Failed to sign transaction. Please try again".to_string(),
        "NETWORK_ERROR" => "Network error. Please try again".to_string(),
        "TIMEOUT_ERROR" => "Transaction timed out. Please try again".to_string(),
        "RATE_LIMIT" => "Service is busy. Please try again in a moment".to_string(),
        _ => error.to_string(),
    }
}

impl From<ChainError> for ApiError {
    fn from(error: ChainError) -> Self {
        let status = match &error {
            // Cancellation is an outcome, not a failure; handlers map it
            // before erroring, but keep the fallback consistent.
            ChainError::Cancelled => StatusCode::OK,
            ChainError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ChainError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ChainError::InvalidAmount(_)
            | ChainError::InsufficientFunds { .. }
            | ChainError::Wallet(_)
            | ChainError::Signing(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };

        let severity = error.severity().as_str();
        Self {
            status,
            body: ErrorBody {
                code: error.code().to_string(),
                message: user_message(&error),
                severity,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_429() {
        let api: ApiError = ChainError::RateLimited("busy".to_string()).into();
        assert_eq!(api.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(api.body.code, "RATE_LIMIT");
        assert_eq!(api.body.severity, "warning");
        assert_eq!(api.body.message, "Service is busy. Please try again in a moment");
    }

    #[test]
    fn test_insufficient_funds_maps_to_400_warning() {
        let api: ApiError = ChainError::InsufficientFunds {
            required: 100,
            available: 0,
        }
        .into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.body.message, "Insufficient balance in your wallet");
        assert_eq!(api.body.severity, "warning");
    }

    #[test]
    fn test_timeout_maps_to_504() {
        let api: ApiError = ChainError::Timeout {
            operation: "send".to_string(),
            timeout_ms: 1000,
        }
        .into();
        assert_eq!(api.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(api.body.code, "TIMEOUT_ERROR");
    }

    #[test]
    fn test_generic_rpc_maps_to_502_error() {
        let api: ApiError = ChainError::Rpc("boom".to_string()).into();
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api.body.severity, "error");
    }

    #[test]
    fn test_cancellation_is_info_severity() {
        let api: ApiError = ChainError::Cancelled.into();
        assert_eq!(api.status, StatusCode::OK);
        assert_eq!(api.body.severity, "info");
        assert_eq!(api.body.message, "Transaction cancelled");
    }
}
