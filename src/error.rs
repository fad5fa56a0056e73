//! Error types for the ledger

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid authentication principal
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed or missing input field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-positive or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Wallet not found for user
    #[error("Wallet not found for user {0}")]
    WalletNotFound(Uuid),

    /// Project not found
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    /// Staking position not found
    #[error("Staking position not found: {0}")]
    StakingNotFound(Uuid),

    /// Referral code not found
    #[error("Referral not found: {0}")]
    ReferralNotFound(String),

    /// Debit exceeds available balance
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the operation needed
        required: Decimal,
        /// Balance actually available
        available: Decimal,
    },

    /// Concurrent-write invariant violation (stale version, reused referral, etc.)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl Error {
    /// True when the caller may safely retry the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_display() {
        let err = Error::InsufficientFunds {
            required: Decimal::new(15000, 2),
            available: Decimal::new(10000, 2),
        };
        let msg = err.to_string();
        assert!(msg.contains("150.00"));
        assert!(msg.contains("100.00"));
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(Error::Conflict("stale wallet version".into()).is_retryable());
        assert!(!Error::WalletNotFound(Uuid::new_v4()).is_retryable());
        assert!(!Error::InvalidAmount(Decimal::ZERO).is_retryable());
    }
}
