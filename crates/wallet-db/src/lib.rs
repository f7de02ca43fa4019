//! # wallet-db: Database Layer for the Wallet Ledger
//!
//! SQLite storage for lots, the append-only ledger, gift cards and the
//! rules around them, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  wallet-engine (redeem / deduct / credit)                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     wallet-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  lots, ledger │    │  (embedded)  │  │   │
//! │  │   │               │◄───│  gift_cards   │    │ 001_wallet_  │  │   │
//! │  │   │ SqlitePool    │    │  promo_rules  │    │   schema.sql │  │   │
//! │  │   │ begin()       │    │  otps, states │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wallet_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("wallet.db")).await?;
//! let lots = db.lots().list_spendable(42).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::batches::{BatchRepository, NewBatch};
pub use repository::gift_cards::{GiftCardRepository, RedemptionStamp};
pub use repository::ledger::{current_month, LedgerRepository, Period};
pub use repository::lots::LotRepository;
pub use repository::otps::OtpRepository;
pub use repository::promo_rules::PromoRuleRepository;
pub use repository::wallet_states::{WalletState, WalletStateRepository};

// sqlx types callers need to hold a unit of work
pub use sqlx::{Sqlite, SqliteConnection, Transaction};
