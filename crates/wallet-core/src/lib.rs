//! # wallet-core: Pure Business Logic for the Wallet Ledger
//!
//! This crate holds every wallet rule as pure functions with zero I/O
//! dependencies: money arithmetic, lot ordering, deduction planning, promo
//! selection, balance projection, reconciliation and velocity windows.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Wallet Ledger Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Callers (checkout, admin tools, jobs)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              wallet-engine (locks, units of work)               │   │
//! │  │    redeem, deduct, credit, freeze, request_otp, balances        │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼───────────────┐  ┌───────────▼───────────────────┐   │
//! │  │  ★ wallet-core (THIS) ★      │  │  wallet-db                    │   │
//! │  │  types  money  allocation    │  │  lots, ledger, gift cards,    │   │
//! │  │  promo  balance  velocity    │  │  promo rules, otps, states    │   │
//! │  │  NO I/O • PURE FUNCTIONS     │  │  SQLite                       │   │
//! │  └──────────────────────────────┘  └───────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (WalletLot, WalletTransaction, GiftCard, PromoRule, ...)
//! - [`money`] - Money type with integer arithmetic and promo bonus rounding
//! - [`error`] - WalletError, ValidationError, InvariantViolation
//! - [`validation`] - Input validation
//! - [`pagination`] - Page parameters for ledger listings
//! - [`allocation`] - FIFO-by-expiry deduction planning
//! - [`promo`] - Promo rule selection and bonus computation
//! - [`balance`] - Balance projections, ledger replay, reconciliation
//! - [`velocity`] - Velocity windows and derived freeze state
//!
//! ## Example Usage
//!
//! ```rust
//! use wallet_core::money::Money;
//! use wallet_core::types::Multiplier;
//!
//! // A 100.00 gift card under a 1.25x promo credits 125.00
//! let base = Money::from_cents(10_000);
//! let bonus = base.bonus_for(Multiplier::from_bps(12_500));
//! assert_eq!((base + bonus).cents(), 12_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod balance;
pub mod error;
pub mod money;
pub mod pagination;
pub mod promo;
pub mod types;
pub mod validation;
pub mod velocity;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{InvariantViolation, ValidationError, WalletError, WalletResult};
pub use money::Money;
pub use pagination::{Paginated, PaginationParams};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency used when a caller does not name one.
pub const DEFAULT_CURRENCY: &str = "AED";

/// Lifetime of a lot when neither the card nor the caller sets one.
pub const DEFAULT_LOT_VALIDITY_DAYS: i64 = 365;

/// Number of digits in a one-time code.
pub const OTP_CODE_LENGTH: usize = 6;

/// Largest number of cards a single batch may issue.
pub const MAX_BATCH_QUANTITY: i64 = 10_000;

/// Upper bound for promo multipliers (10.00x).
pub const MAX_MULTIPLIER_BPS: u32 = 100_000;
