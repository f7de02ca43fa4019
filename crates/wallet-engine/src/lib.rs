//! # wallet-engine: Redemption and Spend Engines
//!
//! Turns gift cards into wallet balance and spends it, one user-locked unit
//! of work per operation.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               Wallet                                    │
//! │                                                                         │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │ RedemptionEngine │  │ DeductionEngine  │  │ CreditEngine         │  │
//! │  │ card → lot       │  │ lots → debits    │  │ refund / adjustment  │  │
//! │  └────────┬─────────┘  └────────┬─────────┘  └──────────┬───────────┘  │
//! │           │                     │                       │              │
//! │           └──────────┬──────────┴───────────────────────┘              │
//! │                      ▼                                                  │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ UserLocks (per-user mutex)  →  BEGIN  →  claim wallet_states row │  │
//! │  │ Guard: frozen? velocity?     KycGate     OtpService (argon2)     │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │  wallet-db repositories (lots, ledger, gift cards, promo rules, ...)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`wallet`] - `Wallet`, wiring every engine to one database
//! - [`redemption`] - gift card redemption, bulk redemption, OTP requests
//! - [`deduction`] - debits consuming soonest-expiring lots first
//! - [`credit`] - non gift card credits
//! - [`balance`] - balance, breakdown, ledger and reconciliation queries
//! - [`guard`] - freeze state and velocity counters
//! - [`promo`] - promo rule administration and quotes
//! - [`gift_cards`] - card and batch administration, expiry sweep
//! - [`otp`] - one-time code issue and verification
//! - [`locks`] - per-user lock registry
//! - [`collaborators`] - `KycGate` and `OtpSender`
//! - [`config`] - `WalletConfig`
//! - [`error`] - `EngineError`
//!
//! ## Quick Start
//! ```rust,ignore
//! use wallet_engine::{Wallet, WalletConfig};
//! use wallet_core::{Money, SpendContext, UserContext};
//! use wallet_db::DbConfig;
//!
//! let wallet = Wallet::open(WalletConfig::load(None)?, DbConfig::new("./wallet.db")).await?;
//! let user = UserContext::new(7, "verified");
//!
//! wallet.redeem(&user, "G100-AAAA-BBBB", None).await?;
//! wallet.deduct(&user, Money::from_cents(4_000), SpendContext::purchase("order-1")).await?;
//! ```

pub mod balance;
pub mod collaborators;
pub mod config;
pub mod credit;
pub mod deduction;
pub mod error;
pub mod gift_cards;
pub mod guard;
pub mod locks;
pub mod otp;
pub mod promo;
pub mod redemption;
pub mod wallet;

pub use balance::BalanceService;
pub use collaborators::{KycGate, LogOtpSender, OtpSender, TierLimitKyc};
pub use config::{ConfigError, OtpConfig, VelocityConfig, WalletConfig};
pub use credit::{CreditEngine, CreditResult};
pub use deduction::{DeductionEngine, DeductionResult};
pub use error::{EngineError, EngineResult};
pub use gift_cards::{BatchRequest, CardRequest, ExpirySweep, GiftCardAdmin};
pub use guard::Guard;
pub use locks::{UserLockGuard, UserLocks};
pub use otp::{IssuedOtp, OtpService, REDEEM_PURPOSE};
pub use promo::{BonusQuote, PromoService};
pub use redemption::{BulkRedemptionItem, RedemptionEngine, RedemptionResult};
pub use wallet::Wallet;
