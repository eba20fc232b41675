//! Error types for PalmPay
//!
//! All failure paths are explicit. Ledger errors guarantee that no partial
//! mutation survives; authentication errors are recoverable conditions that
//! still produce an attempt log entry.

use crate::Amount;
use thiserror::Error;

/// Result type for PalmPay operations
pub type Result<T> = std::result::Result<T, PalmPayError>;

/// PalmPay error types
#[derive(Debug, Clone, Error)]
pub enum PalmPayError {
    // ========================================================================
    // Capture & Extraction Errors
    // ========================================================================

    /// Image bytes could not be decoded
    #[error("Image decode failed: {message}")]
    Decode { message: String },

    /// Capture is unusable for feature extraction
    #[error("Capture rejected: {reason}")]
    LowQuality { reason: String },

    /// Extraction produced zero descriptors
    #[error("No features detected in capture")]
    NoFeatures,

    // ========================================================================
    // Authentication Errors
    // ========================================================================

    /// Best match fell at or below the acceptance threshold
    #[error("Authentication rejected (best score {score:.3})")]
    AuthenticationRejected { score: f64 },

    /// No enrollment template exists for the user
    #[error("No enrollment template for user {user}")]
    TemplateNotFound { user: String },

    // ========================================================================
    // Ledger Errors
    // ========================================================================

    /// Amount must be strictly positive
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Amount },

    /// Sender balance does not cover the requested amount
    #[error("Insufficient funds in account {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: String,
        requested: Amount,
        available: Amount,
    },

    /// Sender and receiver are the same account
    #[error("Cannot transfer from account {account} to itself")]
    SelfTransfer { account: String },

    /// Account does not exist
    #[error("Account {account} not found")]
    AccountNotFound { account: String },

    /// Transaction does not exist
    #[error("Transaction {transaction} not found")]
    TransactionNotFound { transaction: String },

    /// Transaction cannot be refunded
    #[error("Transaction {transaction} cannot be refunded: {reason}")]
    NotRefundable { transaction: String, reason: String },

    /// Arithmetic overflow on a balance update
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Storage layer failure; the triggering operation was rolled back
    #[error("Persistence failure: {message}")]
    Persistence { message: String },
}

impl PalmPayError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a low-quality capture error
    pub fn low_quality(reason: impl Into<String>) -> Self {
        Self::LowQuality {
            reason: reason.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Check if the caller can recover by retrying with different input
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Persistence { .. } | Self::AmountOverflow)
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "DECODE_FAILED",
            Self::LowQuality { .. } => "LOW_QUALITY_CAPTURE",
            Self::NoFeatures => "NO_FEATURES",
            Self::AuthenticationRejected { .. } => "AUTHENTICATION_REJECTED",
            Self::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::SelfTransfer { .. } => "SELF_TRANSFER",
            Self::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::NotRefundable { .. } => "NOT_REFUNDABLE",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::Persistence { .. } => "PERSISTENCE_FAILURE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PalmPayError::InsufficientFunds {
            account: "test".to_string(),
            requested: Amount::from_human(100.0),
            available: Amount::from_human(50.0),
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(PalmPayError::NoFeatures.is_recoverable());
        assert!(PalmPayError::AuthenticationRejected { score: 0.1 }.is_recoverable());
        assert!(!PalmPayError::persistence("disk full").is_recoverable());
    }
}
