//! Error types for the rollup bots

use crate::role::Role;
use thiserror::Error;

/// Main error type for the bots
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chain query error on {endpoint}: {message}")]
    ChainQuery { endpoint: String, message: String },

    #[error("Transaction {tx_hash} rejected with code {code}: {raw_log}")]
    BroadcastRejected {
        tx_hash: String,
        code: u32,
        raw_log: String,
    },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Transaction must contain at least one message")]
    EmptyTransaction,

    #[error("Wallet {0} not initialized")]
    WalletNotInitialized(Role),

    #[error("coin not found: {0}")]
    CoinNotFound(String),

    #[error("App hash is invalid, chain reported an invalid block")]
    InvalidBlock,

    #[error("Alert delivery failed: {0}")]
    Alert(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Check if error must terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::InvalidBlock)
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BotError::Database(_)
                | BotError::Http(_)
                | BotError::ChainQuery { .. }
                | BotError::BroadcastRejected { .. }
        )
    }

    /// Check if error is caused by missing setup rather than the chain
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BotError::Config(_) | BotError::WalletNotInitialized(_) | BotError::CoinNotFound(_)
        )
    }
}

/// Result type for bot operations
pub type BotResult<T> = Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(BotError::InvalidBlock.is_fatal());
        assert!(!BotError::InvalidBlock.is_retryable());

        let rejected = BotError::BroadcastRejected {
            tx_hash: "AB".to_string(),
            code: 32,
            raw_log: "account sequence mismatch".to_string(),
        };
        assert!(rejected.is_retryable());
        assert!(!rejected.is_fatal());

        assert!(BotError::WalletNotInitialized(Role::Executor).is_configuration());
        assert!(BotError::CoinNotFound("l2/abc".to_string()).is_configuration());
    }

    #[test]
    fn test_wallet_not_initialized_message() {
        let err = BotError::WalletNotInitialized(Role::BatchSubmitter);
        assert_eq!(err.to_string(), "Wallet batchSubmitter not initialized");
    }
}
