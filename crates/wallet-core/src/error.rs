//! # Error Types
//!
//! Domain-specific error types for wallet-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  wallet-core errors (this file)                                        │
//! │  ├── WalletError        - Business rule rejections                     │
//! │  ├── ValidationError    - Input validation failures                    │
//! │  └── InvariantViolation - Corrupt state (a bug, never user error)      │
//! │                                                                         │
//! │  wallet-db errors (separate crate)                                     │
//! │  └── DbError            - Database failures + domain failures          │
//! │                                                                         │
//! │  wallet-engine errors (separate crate)                                 │
//! │  └── EngineError        - What callers see                             │
//! │                                                                         │
//! │  Flow: ValidationError → WalletError → DbError → EngineError           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Wallet Error
// =============================================================================

/// Business rule rejections of wallet operations.
///
/// Every variant is an ordinary, expected failure that leaves no state
/// change behind, except `Invariant`, which signals corrupt stored data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Gift card was already redeemed (by anyone).
    #[error("Gift card {0} has already been redeemed")]
    AlreadyRedeemed(String),

    /// Gift card status is expired or its expiry date has passed.
    #[error("Gift card {0} has expired")]
    Expired(String),

    /// Gift card was voided by an administrator.
    #[error("Gift card {0} is void")]
    Void(String),

    /// Gift card exists but is not active yet (created) or deactivated.
    #[error("Gift card {0} is not active")]
    Inactive(String),

    /// Redemption above the threshold needs a one-time code.
    ///
    /// ## User Workflow
    /// ```text
    /// redeem(code, None)
    ///      │
    ///      ▼
    /// OtpRequired { threshold: 50000 }
    ///      │
    ///      ▼
    /// request_otp(code) ──► code delivered out of band
    ///      │
    ///      ▼
    /// redeem(code, Some(otp))
    /// ```
    #[error("A one-time code is required for redemptions above {threshold_cents} cents")]
    OtpRequired { threshold_cents: i64 },

    /// One-time code mismatched, was already used, or is too old.
    #[error("Invalid or expired one-time code")]
    InvalidOtp,

    /// Velocity limit hit (daily redemptions or hourly spend).
    #[error("Rate limit exceeded: {reason}")]
    RateLimited { reason: String },

    /// Amount is zero, negative, or otherwise unusable.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Spendable balance is below the requested debit.
    #[error("Insufficient funds: available {available_cents}, requested {requested_cents}")]
    InsufficientFunds {
        available_cents: i64,
        requested_cents: i64,
    },

    /// A single lot cannot cover the requested decrement.
    #[error("Lot {lot_id} has {remaining_cents} remaining, cannot take {requested_cents}")]
    InsufficientLotBalance {
        lot_id: String,
        remaining_cents: i64,
        requested_cents: i64,
    },

    /// Card or amount is denominated in a currency this wallet does not hold.
    #[error("Currency {found} is not accepted, wallet holds {expected}")]
    CurrencyMismatch { expected: String, found: String },

    /// Wallet is frozen manually or by the auto-freeze threshold.
    #[error("Wallet for user {user_id} is frozen: {reason}")]
    WalletFrozen { user_id: i64, reason: String },

    /// The user's KYC tier does not allow this amount.
    #[error("KYC verification required for user {user_id} to move {amount_cents} cents")]
    KycRequired { user_id: i64, amount_cents: i64 },

    /// The per-user lock could not be acquired in time.
    #[error("Wallet for user {user_id} is busy, retry later")]
    Busy { user_id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Stored state broke a ledger invariant.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

impl WalletError {
    /// Whether the caller can retry the same operation with more input
    /// (a one-time code) or after a backoff (`Busy`).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WalletError::OtpRequired { .. } | WalletError::Busy { .. })
    }

    /// Whether this error signals a bug rather than a rejected request.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, WalletError::Invariant(_))
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        WalletError::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        WalletError::InvalidAmount {
            reason: reason.into(),
        }
    }

    pub fn rate_limited(reason: impl Into<String>) -> Self {
        WalletError::RateLimited {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Invariant Violation
// =============================================================================

/// A ledger invariant does not hold for stored data.
///
/// Never clamped or repaired silently; the operation that observed it is
/// aborted and the message is logged at error level by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Ledger invariant violated: {message}")]
pub struct InvariantViolation {
    pub message: String,
}

impl InvariantViolation {
    pub fn new(message: impl Into<String>) -> Self {
        InvariantViolation {
            message: message.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., lowercase currency, non-digit OTP).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate gift card code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with WalletError.
pub type WalletResult<T> = Result<T, WalletError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WalletError::InsufficientFunds {
            available_cents: 3000,
            requested_cents: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: available 3000, requested 5000"
        );

        let err = WalletError::not_found("Gift card", "ABC-123");
        assert_eq!(err.to_string(), "Gift card not found: ABC-123");

        let err = WalletError::CurrencyMismatch {
            expected: "AED".to_string(),
            found: "USD".to_string(),
        };
        assert_eq!(err.to_string(), "Currency USD is not accepted, wallet holds AED");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(WalletError::OtpRequired {
            threshold_cents: 50_000
        }
        .is_recoverable());
        assert!(WalletError::Busy { user_id: 1 }.is_recoverable());
        assert!(!WalletError::InvalidOtp.is_recoverable());
        assert!(!WalletError::AlreadyRedeemed("X".into()).is_recoverable());
    }

    #[test]
    fn test_invariant_is_distinct() {
        let err: WalletError = InvariantViolation::new("remaining -5").into();
        assert!(err.is_invariant_violation());
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "Ledger invariant violated: remaining -5");
    }

    #[test]
    fn test_validation_converts_to_wallet_error() {
        let validation_err = ValidationError::Required {
            field: "code".to_string(),
        };
        let wallet_err: WalletError = validation_err.into();
        assert!(matches!(wallet_err, WalletError::Validation(_)));
    }
}
