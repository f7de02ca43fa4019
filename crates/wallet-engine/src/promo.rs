//! # Promo Rule Administration
//!
//! Rule selection itself is pure (`wallet_core::promo`); this service
//! validates and stores rules and evaluates them against live data.

use chrono::Utc;
use tracing::info;

use wallet_core::promo::{compute_bonus, resolve_applicable_rule, PromoContext};
use wallet_core::validation::{validate_multiplier, validate_name};
use wallet_core::{Money, NewPromoRule, PromoRule, ValidationError};
use wallet_db::Database;

use crate::error::EngineResult;

/// The rule a credit would get and the bonus it earns.
#[derive(Debug, Clone, PartialEq)]
pub struct BonusQuote {
    pub rule: Option<PromoRule>,
    pub base: Money,
    pub bonus: Money,
    pub final_credit: Money,
}

#[derive(Debug, Clone)]
pub struct PromoService {
    db: Database,
}

impl PromoService {
    pub fn new(db: Database) -> Self {
        PromoService { db }
    }

    /// Validates and stores a rule.
    pub async fn create_rule(&self, rule: NewPromoRule) -> EngineResult<PromoRule> {
        validate_name("name", &rule.name)?;
        validate_multiplier(rule.multiplier)?;
        if let (Some(start), Some(end)) = (rule.start_date, rule.end_date) {
            if end < start {
                return Err(ValidationError::InvalidFormat {
                    field: "end_date".to_string(),
                    reason: "must not be before start_date".to_string(),
                }
                .into());
            }
        }
        if let Some(min) = rule.conditions.min_amount_cents {
            if min < 0 {
                return Err(ValidationError::MustBePositive {
                    field: "conditions.min_amount_cents".to_string(),
                }
                .into());
            }
        }

        let created = self.db.promo_rules().insert(rule).await?;
        info!(id = created.id, rule_type = %created.rule_type, multiplier = %created.multiplier, "Promo rule stored");
        Ok(created)
    }

    pub async fn set_active(&self, id: i64, active: bool) -> EngineResult<PromoRule> {
        Ok(self.db.promo_rules().set_active(id, active).await?)
    }

    pub async fn list_active(&self) -> EngineResult<Vec<PromoRule>> {
        Ok(self.db.promo_rules().list_active().await?)
    }

    /// Evaluates active rules for a credit happening now.
    pub async fn quote(&self, ctx: PromoContext) -> EngineResult<BonusQuote> {
        let rules = self.list_active().await?;
        let rule = resolve_applicable_rule(&rules, &ctx).cloned();
        let bonus = compute_bonus(ctx.amount, rule.as_ref());

        Ok(BonusQuote {
            rule,
            base: ctx.amount,
            bonus,
            final_credit: ctx.amount + bonus,
        })
    }

    /// Quote for a plain amount with no category or segments.
    pub async fn quote_amount(&self, amount: Money) -> EngineResult<BonusQuote> {
        self.quote(PromoContext::new(amount, Utc::now())).await
    }
}
