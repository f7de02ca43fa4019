//! # Deduction Engine
//!
//! Spends wallet balance, consuming lots soonest-expiring first.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  acquire user lock                                                      │
//! │  BEGIN                                                                  │
//! │    claim wallet_states(user)                                           │
//! │    frozen?            → WalletFrozen                                   │
//! │    KYC tier           → KycRequired                                    │
//! │    plan over lots     → InsufficientFunds                              │
//! │    hourly budget      → RateLimited                                    │
//! │    for each draw: decrement lot, append one debit linked to the lot    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Every rejection happens before the first write; a failure during the
//! writes drops the transaction, which rolls all of them back.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use wallet_core::allocation::{plan_deduction, DeductionPlan};
use wallet_core::{
    Direction, Money, NewTransaction, SpendContext, UserContext, WalletError, WalletTransaction,
};
use wallet_db::Database;

use crate::collaborators::KycGate;
use crate::error::EngineResult;
use crate::guard::Guard;
use crate::locks::UserLocks;

/// Outcome of a committed debit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeductionResult {
    pub amount: Money,
    /// One debit per lot drawn from, in consumption order.
    pub entries: Vec<WalletTransaction>,
    pub balance_after: Money,
}

#[derive(Clone)]
pub struct DeductionEngine {
    db: Database,
    locks: UserLocks,
    guard: Guard,
    kyc: Arc<dyn KycGate>,
}

impl DeductionEngine {
    pub fn new(db: Database, locks: UserLocks, guard: Guard, kyc: Arc<dyn KycGate>) -> Self {
        DeductionEngine {
            db,
            locks,
            guard,
            kyc,
        }
    }

    /// Debits `amount` from the user's wallet.
    pub async fn deduct(
        &self,
        user: &UserContext,
        amount: Money,
        ctx: SpendContext,
    ) -> EngineResult<DeductionResult> {
        let user_id = user.user_id;

        if !amount.is_positive() {
            return Err(WalletError::invalid_amount("debit amount must be positive").into());
        }
        if !ctx.transaction_type.is_debit_type() {
            return Err(WalletError::invalid_amount(format!(
                "{} cannot be used for debits",
                ctx.transaction_type
            ))
            .into());
        }

        let _lock = self.locks.acquire(user_id).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        self.db.wallet_states().claim(&mut tx, user_id).await?;

        let state = self.guard.freeze_state_in(&mut tx, user_id, now).await?;
        if let Err(e) = state.ensure_not_frozen(user_id) {
            warn!(user_id, amount = %amount, error = %e, "Debit rejected");
            return Err(e.into());
        }

        self.kyc.block_if_kyc_required(user, amount).await?;

        let lots = self.db.lots().list_spendable_in(&mut tx, user_id, now).await?;
        let plan = plan_deduction(lots, amount, now)?;

        if let Err(e) = state.check_spend(user_id, amount, self.guard.limits()) {
            warn!(user_id, amount = %amount, error = %e, "Debit rejected");
            return Err(e.into());
        }

        let mut entries = Vec::with_capacity(plan.draws.len());
        for draw in &plan.draws {
            let lot = self
                .db
                .lots()
                .decrement_lot(&mut tx, &draw.lot_id, draw.take)
                .await?;

            let entry = self
                .db
                .ledger()
                .append(
                    &mut tx,
                    NewTransaction {
                        user_id,
                        transaction_type: ctx.transaction_type,
                        direction: Direction::Debit,
                        amount: draw.take,
                        base_value: draw.take,
                        bonus_value: None,
                        currency: lot.currency,
                        ref_type: ctx.ref_type.clone(),
                        ref_id: ctx.ref_id.clone(),
                        gift_card_id: None,
                        promo_rule_id: None,
                        lot_id: Some(lot.id),
                        description: ctx.description.clone(),
                    },
                )
                .await?;
            entries.push(entry);
        }

        tx.commit().await?;

        info!(
            user_id,
            amount = %amount,
            lots = entries.len(),
            balance = %plan.resulting_balance,
            ref_id = ctx.ref_id.as_deref().unwrap_or_default(),
            "Wallet debited"
        );

        Ok(DeductionResult {
            amount,
            entries,
            balance_after: plan.resulting_balance,
        })
    }

    /// Read-only simulation of [`deduct`](Self::deduct): the lots that would
    /// be drawn and the balance left.
    pub async fn preview_deduction(&self, user_id: i64, amount: Money) -> EngineResult<DeductionPlan> {
        let now = Utc::now();
        let lots = self.db.lots().list_spendable(user_id, now).await?;
        Ok(plan_deduction(lots, amount, now)?)
    }
}
