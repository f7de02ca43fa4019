//! # Engine Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  WalletError (wallet-core)  ── rejected request, typed taxonomy        │
//! │  DbError (wallet-db)        ── storage failure                         │
//! │  ConfigError                ── bad configuration                       │
//! │  Delivery                   ── the OTP sender failed                   │
//! │                                                                         │
//! │  DbError::Wallet(e) is unwrapped to EngineError::Wallet(e) so callers  │
//! │  match one place for business rejections.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use wallet_core::{InvariantViolation, ValidationError, WalletError};
use wallet_db::DbError;

use crate::config::ConfigError;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request was rejected (not found, frozen, insufficient funds, ...).
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Storage failed.
    #[error("Database error: {0}")]
    Database(DbError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The one-time code could not be handed to the sender.
    #[error("One-time code delivery failed: {0}")]
    Delivery(String),

    /// Hashing or other internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// The business rejection, if this is one.
    pub fn wallet_error(&self) -> Option<&WalletError> {
        match self {
            EngineError::Wallet(err) => Some(err),
            _ => None,
        }
    }

    /// See [`WalletError::is_recoverable`].
    pub fn is_recoverable(&self) -> bool {
        self.wallet_error().is_some_and(WalletError::is_recoverable)
    }

    /// Whether stored data broke a ledger invariant.
    pub fn is_invariant_violation(&self) -> bool {
        self.wallet_error()
            .is_some_and(WalletError::is_invariant_violation)
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Wallet(wallet) => EngineError::Wallet(wallet),
            other => EngineError::Database(other),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::from(DbError::from(err))
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Wallet(WalletError::Validation(err))
    }
}

impl From<InvariantViolation> for EngineError {
    fn from(err: InvariantViolation) -> Self {
        EngineError::Wallet(WalletError::Invariant(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_wallet_error_is_unwrapped() {
        let err = EngineError::from(DbError::Wallet(WalletError::InvalidOtp));
        assert_eq!(err.wallet_error(), Some(&WalletError::InvalidOtp));

        let err = EngineError::from(DbError::PoolExhausted);
        assert!(err.wallet_error().is_none());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_recoverable_passthrough() {
        let err = EngineError::from(WalletError::OtpRequired {
            threshold_cents: 100_000,
        });
        assert!(err.is_recoverable());

        let err = EngineError::from(InvariantViolation::new("remaining below zero"));
        assert!(err.is_invariant_violation());
        assert!(!err.is_recoverable());
    }
}
