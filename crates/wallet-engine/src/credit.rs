//! # Credit Engine
//!
//! Refunds, admin adjustments and promo credits: one new lot plus one
//! ledger credit linked to it, in one locked unit of work. Gift card
//! credits go through the redemption engine instead.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use wallet_core::balance::available_balance;
use wallet_core::{
    CreditContext, Direction, Money, NewLot, NewTransaction, UserContext, ValidationError,
    WalletError, WalletLot, WalletTransaction,
};
use wallet_db::Database;

use crate::config::WalletConfig;
use crate::error::EngineResult;
use crate::guard::Guard;
use crate::locks::UserLocks;

/// Outcome of a committed credit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditResult {
    pub lot: WalletLot,
    pub transaction: WalletTransaction,
    pub balance_after: Money,
}

#[derive(Debug, Clone)]
pub struct CreditEngine {
    db: Database,
    config: Arc<WalletConfig>,
    locks: UserLocks,
    guard: Guard,
}

impl CreditEngine {
    pub fn new(db: Database, config: Arc<WalletConfig>, locks: UserLocks, guard: Guard) -> Self {
        CreditEngine {
            db,
            config,
            locks,
            guard,
        }
    }

    /// Adds `amount` to the user's wallet as a new lot.
    ///
    /// ## Errors
    /// - `InvalidAmount` for a non-positive amount or a type that is not
    ///   an external credit type
    /// - `Validation` when an explicit expiry is not in the future
    /// - `WalletFrozen` when the wallet is frozen
    pub async fn credit(
        &self,
        user: &UserContext,
        amount: Money,
        ctx: CreditContext,
    ) -> EngineResult<CreditResult> {
        let user_id = user.user_id;

        if !amount.is_positive() {
            return Err(WalletError::invalid_amount("credit amount must be positive").into());
        }
        if !ctx.transaction_type.is_external_credit_type() {
            return Err(WalletError::invalid_amount(format!(
                "{} cannot be used for credits",
                ctx.transaction_type
            ))
            .into());
        }

        let _lock = self.locks.acquire(user_id).await?;
        let now = Utc::now();

        let expires_at = if ctx.non_expiring {
            None
        } else {
            let at = ctx
                .expires_at
                .unwrap_or_else(|| now + Duration::days(self.config.default_lot_validity_days));
            if at <= now {
                return Err(ValidationError::InvalidFormat {
                    field: "expires_at".to_string(),
                    reason: "must be in the future".to_string(),
                }
                .into());
            }
            Some(at)
        };

        let mut tx = self.db.begin().await?;
        self.db.wallet_states().claim(&mut tx, user_id).await?;

        let state = self.guard.freeze_state_in(&mut tx, user_id, now).await?;
        if let Err(e) = state.ensure_not_frozen(user_id) {
            warn!(user_id, amount = %amount, error = %e, "Credit rejected");
            return Err(e.into());
        }

        let lot = self
            .db
            .lots()
            .create_lot(
                &mut tx,
                NewLot {
                    user_id,
                    amount,
                    base_value: amount,
                    bonus_value: Money::zero(),
                    currency: self.config.currency.clone(),
                    source: ctx.source,
                    expires_at,
                    gift_card_id: None,
                    ref_type: ctx.ref_type.clone(),
                    ref_id: ctx.ref_id.clone(),
                },
            )
            .await?;

        let transaction = self
            .db
            .ledger()
            .append(
                &mut tx,
                NewTransaction {
                    user_id,
                    transaction_type: ctx.transaction_type,
                    direction: Direction::Credit,
                    amount,
                    base_value: amount,
                    bonus_value: None,
                    currency: lot.currency.clone(),
                    ref_type: ctx.ref_type,
                    ref_id: ctx.ref_id,
                    gift_card_id: None,
                    promo_rule_id: None,
                    lot_id: Some(lot.id.clone()),
                    description: ctx.description,
                },
            )
            .await?;

        let spendable = self.db.lots().list_spendable_in(&mut tx, user_id, now).await?;
        let balance_after = available_balance(&spendable, now);

        tx.commit().await?;

        info!(
            user_id,
            amount = %amount,
            kind = %transaction.transaction_type,
            lot_id = %lot.id,
            balance = %balance_after,
            "Wallet credited"
        );

        Ok(CreditResult {
            lot,
            transaction,
            balance_after,
        })
    }
}
