//! # Validation Module
//!
//! Input validation utilities for the wallet ledger.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine entry point (Rust)                                    │
//! │  ├── THIS MODULE: format and range checks                              │
//! │  └── Amount > 0, currency code, code shape                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine business rules                                        │
//! │  └── Freeze, KYC, velocity, balance                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (remaining_cents BETWEEN 0 AND amount_cents)                │
//! │  ├── UNIQUE (gift_cards.code, gift_card_batches.batch_code)            │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use wallet_core::validation::{normalize_gift_card_code, validate_currency};
//!
//! assert_eq!(normalize_gift_card_code(" gc-abc123 ").unwrap(), "GC-ABC123");
//! assert!(validate_currency("AED").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::Multiplier;
use crate::{MAX_BATCH_QUANTITY, MAX_MULTIPLIER_BPS, OTP_CODE_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates and normalizes a gift card code.
///
/// ## Rules
/// - Surrounding whitespace is ignored
/// - Must be between 4 and 32 characters
/// - Only ASCII letters, digits and hyphens
/// - Stored and compared upper-case
pub fn normalize_gift_card_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() < 4 {
        return Err(ValidationError::TooShort {
            field: "code".to_string(),
            min: 4,
        });
    }

    if code.len() > 32 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 32,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(code.to_ascii_uppercase())
}

/// Validates an ISO 4217 style currency code (three upper-case letters).
pub fn validate_currency(currency: &str) -> ValidationResult<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be three upper-case letters".to_string(),
        });
    }

    Ok(())
}

/// Validates the shape of a one-time code supplied by a user.
pub fn validate_otp_format(otp: &str) -> ValidationResult<()> {
    if otp.len() != OTP_CODE_LENGTH || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "otp".to_string(),
            reason: format!("must be {} digits", OTP_CODE_LENGTH),
        });
    }

    Ok(())
}

/// Validates a display name (promo rules, batches).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a face value in cents.
///
/// ## Example
/// ```rust
/// use wallet_core::validation::validate_value_cents;
///
/// assert!(validate_value_cents("value", 10_000).is_ok());
/// assert!(validate_value_cents("value", 0).is_err());
/// ```
pub fn validate_value_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates the number of cards in a batch.
pub fn validate_batch_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 || quantity > MAX_BATCH_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_BATCH_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a promo multiplier.
///
/// ## Rules
/// - At least 1.00x (a promo never reduces value)
/// - At most 10.00x
pub fn validate_multiplier(multiplier: Multiplier) -> ValidationResult<()> {
    let bps = multiplier.bps();
    if bps < Multiplier::ONE.bps() || bps > MAX_MULTIPLIER_BPS {
        return Err(ValidationError::OutOfRange {
            field: "multiplier".to_string(),
            min: Multiplier::ONE.bps() as i64,
            max: MAX_MULTIPLIER_BPS as i64,
        });
    }

    Ok(())
}

/// Validates a validity window in days.
pub fn validate_validity_days(days: i64) -> ValidationResult<()> {
    if !(1..=3650).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "validity_days".to_string(),
            min: 1,
            max: 3650,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
