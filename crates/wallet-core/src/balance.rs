//! # Balance Projection
//!
//! Read-side projections over lots and ledger entries. Nothing here is
//! cached; callers pass in freshly loaded rows.
//!
//! ## Two Views of a Wallet
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Spendable balance  = Σ remaining of active, unexpired lots             │
//! │  Ledger balance     = Σ credits - Σ debits (running, chronological)     │
//! │                                                                         │
//! │  The two differ only by value stranded on expired or frozen lots.       │
//! │  Per lot, Σ linked credits - Σ linked debits = remaining, always.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::allocation::spendable_in_order;
use crate::money::Money;
use crate::types::{Direction, LotStatus, TransactionType, WalletLot, WalletTransaction};

// =============================================================================
// Spendable Balance
// =============================================================================

/// Sum of remaining over spendable lots.
pub fn available_balance(lots: &[WalletLot], as_of: DateTime<Utc>) -> Money {
    lots.iter()
        .filter(|lot| lot.is_spendable_at(as_of))
        .map(|lot| lot.remaining())
        .sum()
}

/// One spendable lot in a balance breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotBalance {
    pub lot_id: String,
    pub remaining: Money,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whole days until expiry, `None` for non-expiring lots.
    pub expires_in_days: Option<i64>,
}

/// Spendable balance with the lots that make it up, in consumption order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBreakdown {
    pub total: Money,
    pub lots: Vec<LotBalance>,
}

fn lot_balance(lot: &WalletLot, as_of: DateTime<Utc>) -> LotBalance {
    LotBalance {
        lot_id: lot.id.clone(),
        remaining: lot.remaining(),
        expires_at: lot.expires_at,
        expires_in_days: lot.expires_at.map(|exp| (exp - as_of).num_days()),
    }
}

pub fn breakdown(lots: Vec<WalletLot>, as_of: DateTime<Utc>) -> BalanceBreakdown {
    let ordered = spendable_in_order(lots, as_of);
    let total = ordered.iter().map(|lot| lot.remaining()).sum();
    let lots = ordered.iter().map(|lot| lot_balance(lot, as_of)).collect();
    BalanceBreakdown { total, lots }
}

/// Spendable lots expiring within `within_days` of `as_of`, soonest first.
pub fn expiring_within(
    lots: Vec<WalletLot>,
    as_of: DateTime<Utc>,
    within_days: i64,
) -> Vec<LotBalance> {
    let horizon = as_of + Duration::days(within_days);
    spendable_in_order(lots, as_of)
        .iter()
        .filter(|lot| lot.expires_at.is_some_and(|exp| exp <= horizon))
        .map(|lot| lot_balance(lot, as_of))
        .collect()
}

// =============================================================================
// Ledger Replay
// =============================================================================

/// A ledger entry decorated with the ledger balance right after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: WalletTransaction,
    pub running_balance_cents: i64,
}

/// Replays a user's full history (oldest first) and returns each entry with
/// its running balance, in the same order.
pub fn replay_running_balance(history: Vec<WalletTransaction>) -> Vec<LedgerEntry> {
    let mut balance = Money::zero();
    history
        .into_iter()
        .map(|transaction| {
            balance += transaction.signed_amount();
            LedgerEntry {
                transaction,
                running_balance_cents: balance.cents(),
            }
        })
        .collect()
}

/// Optional criteria applied to ledger listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount_cents: Option<i64>,
    pub max_amount_cents: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    pub direction: Option<Direction>,
    pub ref_type: Option<String>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        self.from.map_or(true, |from| tx.created_at >= from)
            && self.to.map_or(true, |to| tx.created_at <= to)
            && self.min_amount_cents.map_or(true, |min| tx.amount_cents >= min)
            && self.max_amount_cents.map_or(true, |max| tx.amount_cents <= max)
            && self.transaction_type.map_or(true, |t| tx.transaction_type == t)
            && self.direction.map_or(true, |d| tx.direction == d)
            && self
                .ref_type
                .as_ref()
                .map_or(true, |r| tx.ref_type.as_ref() == Some(r))
    }
}

/// Credit and debit totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub credits: Money,
    pub debits: Money,
    pub net: Money,
    pub entry_count: usize,
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Lot remaining compared against the ledger entries linked to each lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// Σ remaining over live (unexpired, non-exhausted) lots.
    pub lot_remaining_cents: i64,
    /// Σ linked credits - Σ linked debits over the same lots.
    pub ledger_net_cents: i64,
    /// Lots (any status) whose remaining disagrees with their ledger net.
    pub mismatched_lot_ids: Vec<String>,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.lot_remaining_cents == self.ledger_net_cents && self.mismatched_lot_ids.is_empty()
    }
}

/// Cross-checks lots against the ledger.
pub fn reconcile(
    lots: &[WalletLot],
    ledger: &[WalletTransaction],
    as_of: DateTime<Utc>,
) -> Reconciliation {
    let mut net_by_lot: HashMap<&str, Money> = HashMap::new();
    for tx in ledger {
        if let Some(lot_id) = tx.lot_id.as_deref() {
            *net_by_lot.entry(lot_id).or_default() += tx.signed_amount();
        }
    }

    let mut lot_remaining = Money::zero();
    let mut ledger_net = Money::zero();
    let mut mismatched_lot_ids = Vec::new();

    for lot in lots {
        let net = net_by_lot.get(lot.id.as_str()).copied().unwrap_or_default();
        if net != lot.remaining() {
            mismatched_lot_ids.push(lot.id.clone());
        }

        let live = !matches!(lot.status, LotStatus::Exhausted | LotStatus::Expired)
            && !lot.is_expired_at(as_of);
        if live {
            lot_remaining += lot.remaining();
            ledger_net += net;
        }
    }

    Reconciliation {
        lot_remaining_cents: lot_remaining.cents(),
        ledger_net_cents: ledger_net.cents(),
        mismatched_lot_ids,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
