//! # Repository Module
//!
//! Database repository implementations for the wallet ledger.
//!
//! ## Read Paths and Units of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Read path (balance, history, stats)                                   │
//! │       db.lots().list_spendable(user)          ← pool connection        │
//! │                                                                         │
//! │  Unit of work (redeem, deduct, credit)                                 │
//! │       let mut tx = db.begin().await?;                                  │
//! │       db.wallet_states().claim(&mut tx, user) ← always first           │
//! │       db.lots().list_spendable_in(&mut tx, user)                       │
//! │       db.lots().decrement_lot(&mut tx, ..)                             │
//! │       db.ledger().append(&mut tx, ..)                                  │
//! │       tx.commit().await?                       ← all or nothing        │
//! │                                                                         │
//! │  Methods taking `&mut SqliteConnection` never commit; the caller       │
//! │  owns the transaction.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`LotRepository`](lots::LotRepository) - Lots and per-lot decrements
//! - [`LedgerRepository`](ledger::LedgerRepository) - Append-only ledger
//! - [`GiftCardRepository`](gift_cards::GiftCardRepository) - Cards and redemption marking
//! - [`BatchRepository`](batches::BatchRepository) - Bulk issuance records
//! - [`PromoRuleRepository`](promo_rules::PromoRuleRepository) - Multiplier rules
//! - [`OtpRepository`](otps::OtpRepository) - Hashed one-time codes
//! - [`WalletStateRepository`](wallet_states::WalletStateRepository) - Freeze flag and write claim

pub mod batches;
pub mod gift_cards;
pub mod ledger;
pub mod lots;
pub mod otps;
pub mod promo_rules;
pub mod wallet_states;
