//! # Lot Allocation
//!
//! Decides which lots a debit consumes, and in which order.
//!
//! ## Consumption Order (FIFO by expiry)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Lots (spendable only)            Debit 150.00                          │
//! │                                                                         │
//! │  L1  100.00  expires 2024-06-01  ──► take 100.00 → 0.00 (exhausted)     │
//! │  L2  200.00  expires 2024-09-01  ──► take  50.00 → 150.00               │
//! │  L3   80.00  never expires       ──► untouched                          │
//! │                                                                         │
//! │  Order: expires_at ASC, non-expiring last, then created_at, then id     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Planning is pure: the engine reads the lots inside its unit of work,
//! builds a plan here, then applies each draw through the lot store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{WalletError, WalletResult};
use crate::money::Money;
use crate::types::WalletLot;

/// A single lot's contribution to a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: String,
    pub take: Money,
    pub remaining_before: Money,
    pub remaining_after: Money,
    pub expires_at: Option<DateTime<Utc>>,
}

impl LotDraw {
    /// Whether this draw empties the lot.
    pub fn exhausts(&self) -> bool {
        self.remaining_after.is_zero()
    }
}

/// Read-only description of how a debit would be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionPlan {
    pub draws: Vec<LotDraw>,
    pub total: Money,
    pub available_before: Money,
    pub resulting_balance: Money,
}

/// Ordering used for consumption: soonest expiry first, non-expiring last.
pub fn consumption_order(a: &WalletLot, b: &WalletLot) -> Ordering {
    let by_expiry = match (a.expires_at, b.expires_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Keeps the spendable lots at `as_of` and sorts them in consumption order.
pub fn spendable_in_order(lots: Vec<WalletLot>, as_of: DateTime<Utc>) -> Vec<WalletLot> {
    let mut spendable: Vec<WalletLot> = lots
        .into_iter()
        .filter(|lot| lot.is_spendable_at(as_of))
        .collect();
    spendable.sort_by(consumption_order);
    spendable
}

/// Builds the FIFO-by-expiry plan for debiting `amount`.
///
/// `lots` may be in any order and may include unspendable lots; both are
/// handled here. Every spendable lot is checked against its invariants
/// first, so a corrupt lot aborts the plan instead of being clamped.
///
/// ## Errors
/// - `InvalidAmount` when `amount <= 0`
/// - `Invariant` when a lot's stored remaining is out of range
/// - `InsufficientFunds` when spendable balance is below `amount`
pub fn plan_deduction(
    lots: Vec<WalletLot>,
    amount: Money,
    as_of: DateTime<Utc>,
) -> WalletResult<DeductionPlan> {
    if !amount.is_positive() {
        return Err(WalletError::invalid_amount("debit amount must be positive"));
    }

    let ordered = spendable_in_order(lots, as_of);
    for lot in &ordered {
        lot.check_invariants()?;
    }

    let available_before: Money = ordered.iter().map(|lot| lot.remaining()).sum();
    if available_before < amount {
        return Err(WalletError::InsufficientFunds {
            available_cents: available_before.cents(),
            requested_cents: amount.cents(),
        });
    }

    let mut outstanding = amount;
    let mut draws = Vec::new();
    for lot in ordered {
        if outstanding.is_zero() {
            break;
        }
        let take = lot.remaining().min(outstanding);
        outstanding -= take;
        draws.push(LotDraw {
            lot_id: lot.id,
            take,
            remaining_before: Money::from_cents(lot.remaining_cents),
            remaining_after: Money::from_cents(lot.remaining_cents) - take,
            expires_at: lot.expires_at,
        });
    }

    Ok(DeductionPlan {
        draws,
        total: amount,
        available_before,
        resulting_balance: available_before - amount,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LotSource, LotStatus};
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn lot(id: &str, remaining: i64, expires_in_days: Option<i64>) -> WalletLot {
        let now = base_time();
        WalletLot {
            id: id.to_string(),
            user_id: 7,
            amount_cents: remaining,
            base_value_cents: remaining,
            bonus_value_cents: 0,
            remaining_cents: remaining,
            currency: "AED".to_string(),
            status: LotStatus::Active,
            source: LotSource::GiftCard,
            expires_at: expires_in_days.map(|d| now + Duration::days(d)),
            gift_card_id: None,
            ref_type: None,
            ref_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fifo_by_expiry_partial_draw() {
        // [10, 20] debit 15 → [0, 15]
        let lots = vec![lot("b", 2000, Some(60)), lot("a", 1000, Some(30))];
        let plan = plan_deduction(lots, Money::from_cents(1500), base_time()).unwrap();

        assert_eq!(plan.draws.len(), 2);
        assert_eq!(plan.draws[0].lot_id, "a");
        assert_eq!(plan.draws[0].take.cents(), 1000);
        assert!(plan.draws[0].exhausts());
        assert_eq!(plan.draws[1].lot_id, "b");
        assert_eq!(plan.draws[1].remaining_after.cents(), 1500);
        assert_eq!(plan.resulting_balance.cents(), 1500);
    }

    #[test]
    fn test_non_expiring_lots_consumed_last() {
        let lots = vec![lot("forever", 5000, None), lot("soon", 1000, Some(5))];
        let plan = plan_deduction(lots, Money::from_cents(500), base_time()).unwrap();
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].lot_id, "soon");
    }

    #[test]
    fn test_ties_break_by_created_at_then_id() {
        let mut older = lot("z", 100, Some(10));
        older.created_at = base_time() - Duration::hours(1);
        let newer_a = lot("a", 100, Some(10));
        let newer_b = lot("b", 100, Some(10));

        let ordered = spendable_in_order(vec![newer_b, older, newer_a], base_time());
        let ids: Vec<&str> = ordered.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }

    #[test]
    fn test_expired_and_frozen_lots_excluded() {
        let mut frozen = lot("frozen", 5000, Some(10));
        frozen.status = LotStatus::Frozen;
        let lots = vec![lot("expired", 5000, Some(-1)), frozen, lot("ok", 300, Some(10))];

        let err = plan_deduction(lots, Money::from_cents(500), base_time()).unwrap_err();
        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                available_cents: 300,
                requested_cents: 500
            }
        );
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let mut at_boundary = lot("edge", 1000, None);
        at_boundary.expires_at = Some(base_time());
        let err = plan_deduction(vec![at_boundary], Money::from_cents(100), base_time());
        assert!(matches!(err, Err(WalletError::InsufficientFunds { .. })));
    }

    #[test]
    fn test_invalid_amount() {
        let lots = vec![lot("a", 1000, None)];
        assert!(matches!(
            plan_deduction(lots.clone(), Money::zero(), base_time()),
            Err(WalletError::InvalidAmount { .. })
        ));
        assert!(matches!(
            plan_deduction(lots, Money::from_cents(-5), base_time()),
            Err(WalletError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_corrupt_lot_is_invariant_violation() {
        let mut corrupt = lot("bad", 1000, None);
        corrupt.amount_cents = 500;
        let err = plan_deduction(vec![corrupt], Money::from_cents(100), base_time()).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_exact_balance_drains_everything() {
        let lots = vec![lot("a", 1000, Some(1)), lot("b", 500, None)];
        let plan = plan_deduction(lots, Money::from_cents(1500), base_time()).unwrap();
        assert!(plan.draws.iter().all(|d| d.exhausts()));
        assert!(plan.resulting_balance.is_zero());
    }
}
