//! # Gift Card Redemption Engine
//!
//! Turns a gift card into wallet balance: one lot, one ledger credit, the
//! card marked redeemed.
//!
//! ## Redeem Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  normalize code (malformed             → NotFound)                     │
//! │  acquire user lock, BEGIN, claim wallet_states(user)                   │
//! │                                                                         │
//! │  1. card by code                      → NotFound                       │
//! │  2. card lifecycle                    → AlreadyRedeemed / Expired /    │
//! │                                         Void / Inactive                │
//! │  3. card currency vs wallet currency  → CurrencyMismatch               │
//! │  4. frozen / daily redemption limit   → WalletFrozen / RateLimited     │
//! │  5. promo: locked-in rule, or best active rule for this context        │
//! │  6. final credit above OTP threshold  → OtpRequired (no code given)    │
//! │  7. code given                        → InvalidOtp, else consumed      │
//! │  8. create lot, append credit, mark card redeemed (WHERE active)       │
//! │                                                                         │
//! │  COMMIT  (any error above drops the transaction: nothing persists)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use wallet_core::balance::available_balance;
use wallet_core::promo::{compute_bonus, resolve_applicable_rule, PromoContext};
use wallet_core::validation::normalize_gift_card_code;
use wallet_core::{
    Direction, GiftCard, LotSource, Money, NewLot, NewTransaction, TransactionType, UserContext,
    WalletError, WalletLot, WalletTransaction,
};
use wallet_db::{Database, RedemptionStamp};

use crate::config::WalletConfig;
use crate::error::{EngineError, EngineResult};
use crate::guard::Guard;
use crate::locks::UserLocks;
use crate::otp::{IssuedOtp, OtpService, REDEEM_PURPOSE};

/// Outcome of a committed redemption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedemptionResult {
    pub code: String,
    pub base_value: Money,
    pub bonus_value: Money,
    pub final_credit: Money,
    pub promo_rule_id: Option<i64>,
    pub lot: WalletLot,
    pub transaction: WalletTransaction,
    pub balance_after: Money,
}

/// One code's outcome inside a bulk redemption.
#[derive(Debug)]
pub struct BulkRedemptionItem {
    pub code: String,
    pub outcome: EngineResult<RedemptionResult>,
}

impl BulkRedemptionItem {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Clone)]
pub struct RedemptionEngine {
    db: Database,
    config: Arc<WalletConfig>,
    locks: UserLocks,
    guard: Guard,
    otp: OtpService,
}

impl RedemptionEngine {
    pub fn new(
        db: Database,
        config: Arc<WalletConfig>,
        locks: UserLocks,
        guard: Guard,
        otp: OtpService,
    ) -> Self {
        RedemptionEngine {
            db,
            config,
            locks,
            guard,
            otp,
        }
    }

    /// Redeems `code` into the user's wallet.
    pub async fn redeem(
        &self,
        user: &UserContext,
        code: &str,
        otp: Option<&str>,
    ) -> EngineResult<RedemptionResult> {
        let user_id = user.user_id;
        let code = lookup_code(code)?;

        let _lock = self.locks.acquire(user_id).await?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        self.db.wallet_states().claim(&mut tx, user_id).await?;

        let card = self
            .db
            .gift_cards()
            .get_by_code_in(&mut tx, &code)
            .await?
            .ok_or_else(|| WalletError::not_found("Gift card", code.clone()))?;

        if let Err(e) = card
            .check_redeemable(now)
            .and_then(|()| self.check_currency(&card))
        {
            warn!(user_id, code = %code, error = %e, "Redemption rejected");
            return Err(e.into());
        }

        // Freeze and velocity
        let state = self.guard.freeze_state_in(&mut tx, user_id, now).await?;
        if let Err(e) = state.check_redemption(user_id, self.guard.limits()) {
            warn!(user_id, code = %code, error = %e, "Redemption rejected");
            return Err(e.into());
        }

        // Promo
        let (promo_rule_id, bonus) = match card.promo_rule_id {
            Some(locked) => (Some(locked), Money::from_cents(card.bonus_value_cents)),
            None => {
                let rules = self.db.promo_rules().list_active_in(&mut tx).await?;
                let ctx = PromoContext::new(card.base_value(), now)
                    .with_category(card.category.clone())
                    .with_segments(user.segments.clone());
                let rule = resolve_applicable_rule(&rules, &ctx);
                (rule.map(|r| r.id), compute_bonus(card.base_value(), rule))
            }
        };
        let base = card.base_value();
        let final_credit = base + bonus;

        // One-time code
        let threshold = self.config.otp.amount_threshold_cents;
        match otp {
            None if final_credit.cents() > threshold => {
                info!(user_id, code = %code, amount = %final_credit, "One-time code required");
                return Err(WalletError::OtpRequired {
                    threshold_cents: threshold,
                }
                .into());
            }
            None => {}
            Some(otp) => {
                self.otp
                    .verify_and_consume_in(&mut tx, user_id, &card.id, REDEEM_PURPOSE, otp, now)
                    .await?;
            }
        }

        // Writes
        let validity_days = card
            .validity_days
            .unwrap_or(self.config.default_lot_validity_days);
        let lot = self
            .db
            .lots()
            .create_lot(
                &mut tx,
                NewLot {
                    user_id,
                    amount: final_credit,
                    base_value: base,
                    bonus_value: bonus,
                    currency: card.currency.clone(),
                    source: LotSource::GiftCard,
                    expires_at: Some(now + Duration::days(validity_days)),
                    gift_card_id: Some(card.id.clone()),
                    ref_type: Some("gift_card".to_string()),
                    ref_id: Some(card.code.clone()),
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
                    transaction_type: TransactionType::GiftCardRedeem,
                    direction: Direction::Credit,
                    amount: final_credit,
                    base_value: base,
                    bonus_value: Some(bonus),
                    currency: card.currency.clone(),
                    ref_type: Some("gift_card".to_string()),
                    ref_id: Some(card.code.clone()),
                    gift_card_id: Some(card.id.clone()),
                    promo_rule_id,
                    lot_id: Some(lot.id.clone()),
                    description: Some(format!("Gift card {}", card.code)),
                },
            )
            .await?;

        self.db
            .gift_cards()
            .mark_redeemed(
                &mut tx,
                &card,
                RedemptionStamp {
                    user_id,
                    bonus_value: bonus,
                    final_credit,
                    promo_rule_id,
                    redeemed_at: now,
                },
            )
            .await?;

        let spendable = self.db.lots().list_spendable_in(&mut tx, user_id, now).await?;
        let balance_after = available_balance(&spendable, now);

        tx.commit().await?;

        info!(
            user_id,
            code = %card.code,
            base = %base,
            bonus = %bonus,
            credited = %final_credit,
            promo_rule_id,
            balance = %balance_after,
            "Gift card redeemed"
        );

        Ok(RedemptionResult {
            code: card.code,
            base_value: base,
            bonus_value: bonus,
            final_credit,
            promo_rule_id,
            lot,
            transaction,
            balance_after,
        })
    }

    /// Redeems each code on its own; one failure never stops the rest.
    pub async fn bulk_redeem(&self, user: &UserContext, codes: &[String]) -> Vec<BulkRedemptionItem> {
        let mut items = Vec::with_capacity(codes.len());
        for code in codes {
            let outcome = self.redeem(user, code, None).await;
            items.push(BulkRedemptionItem {
                code: code.clone(),
                outcome,
            });
        }

        let redeemed = items.iter().filter(|item| item.is_success()).count();
        info!(user_id = user.user_id, total = items.len(), redeemed, "Bulk redemption finished");
        items
    }

    /// Issues a one-time code for redeeming `code` and sends it to the user.
    ///
    /// The card must currently be redeemable.
    pub async fn request_otp(&self, user: &UserContext, code: &str) -> EngineResult<IssuedOtp> {
        let code = lookup_code(code)?;
        let card = self.redeemable_card(&code).await?;
        self.otp.issue(user, &card.id, REDEEM_PURPOSE).await
    }

    async fn redeemable_card(&self, code: &str) -> EngineResult<GiftCard> {
        let card = self
            .db
            .gift_cards()
            .get_by_code(code)
            .await?
            .ok_or_else(|| EngineError::from(WalletError::not_found("Gift card", code)))?;
        card.check_redeemable(Utc::now())?;
        self.check_currency(&card)?;
        Ok(card)
    }

    fn check_currency(&self, card: &GiftCard) -> Result<(), WalletError> {
        if card.currency == self.config.currency {
            Ok(())
        } else {
            Err(WalletError::CurrencyMismatch {
                expected: self.config.currency.clone(),
                found: card.currency.clone(),
            })
        }
    }
}

/// A code that cannot be a gift card code names no card.
fn lookup_code(code: &str) -> Result<String, WalletError> {
    normalize_gift_card_code(code).map_err(|_| WalletError::not_found("Gift card", code.trim()))
}
