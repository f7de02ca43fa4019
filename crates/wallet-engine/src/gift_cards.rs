//! # Gift Card Administration
//!
//! Issuing single cards and batches, moving cards along their lifecycle and
//! sweeping expired lots and cards.
//!
//! Cards issued against a promo rule lock the bonus in at issuance: the
//! stored `bonus_value` is what redemption credits, whatever the rule looks
//! like by then.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use wallet_core::validation::{
    normalize_gift_card_code, validate_batch_quantity, validate_currency, validate_name,
    validate_validity_days, validate_value_cents,
};
use wallet_core::{
    BatchStats, BatchStatus, GiftCard, GiftCardBatch, GiftCardStatus, Money, NewGiftCard,
    ValidationError, WalletError,
};
use wallet_db::{Database, DbError, NewBatch};

use crate::error::{EngineError, EngineResult};

/// Unambiguous code characters (no 0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const MAX_CODE_ATTEMPTS: usize = 5;

/// Longest batch code that still leaves room for the `-XXXX-XXXX` suffix.
const MAX_BATCH_CODE_LEN: usize = 22;

/// Input for issuing one card.
#[derive(Debug, Clone)]
pub struct CardRequest {
    /// Generated when absent.
    pub code: Option<String>,
    pub value: Money,
    pub currency: String,
    pub promo_rule_id: Option<i64>,
    pub category: Option<String>,
    pub validity_days: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_to: Option<String>,
    /// Issue straight into `active` instead of `created`.
    pub activate: bool,
}

impl CardRequest {
    pub fn new(value: Money, currency: impl Into<String>) -> Self {
        CardRequest {
            code: None,
            value,
            currency: currency.into(),
            promo_rule_id: None,
            category: None,
            validity_days: None,
            expires_at: None,
            issued_to: None,
            activate: false,
        }
    }
}

/// Input for issuing a batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub name: String,
    /// Prefix of every generated card code.
    pub batch_code: String,
    pub quantity: i64,
    pub value: Money,
    pub currency: String,
    pub promo_rule_id: Option<i64>,
    pub category: Option<String>,
    pub validity_days: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// What one expiry sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySweep {
    pub lots_expired: u64,
    pub cards_expired: u64,
}

#[derive(Debug, Clone)]
pub struct GiftCardAdmin {
    db: Database,
    currency: String,
}

impl GiftCardAdmin {
    /// Admin issuing cards in `currency`, the wallet's currency.
    pub fn new(db: Database, currency: impl Into<String>) -> Self {
        GiftCardAdmin {
            db,
            currency: currency.into(),
        }
    }

    fn check_currency(&self, currency: &str) -> EngineResult<()> {
        validate_currency(currency)?;
        if currency != self.currency {
            return Err(WalletError::CurrencyMismatch {
                expected: self.currency.clone(),
                found: currency.to_string(),
            }
            .into());
        }
        Ok(())
    }

    // =========================================================================
    // Issuance
    // =========================================================================

    /// Issues one card, in `created` status unless `activate` is set.
    pub async fn issue_card(&self, req: CardRequest) -> EngineResult<GiftCard> {
        validate_value_cents("value", req.value.cents())?;
        self.check_currency(&req.currency)?;
        if let Some(days) = req.validity_days {
            validate_validity_days(days)?;
        }
        ensure_future("expires_at", req.expires_at)?;

        let bonus = self.locked_in_bonus(req.promo_rule_id, req.value).await?;
        let status = if req.activate {
            GiftCardStatus::Active
        } else {
            GiftCardStatus::Created
        };

        let card = NewGiftCard {
            code: String::new(),
            original_value: req.value,
            base_value: req.value,
            bonus_value: bonus,
            currency: req.currency,
            batch_id: None,
            promo_rule_id: req.promo_rule_id,
            category: req.category,
            validity_days: req.validity_days,
            status,
            issued_to: req.issued_to,
            expires_at: req.expires_at,
        };

        let created = match req.code {
            Some(code) => {
                let code = normalize_gift_card_code(&code)?;
                self.db
                    .gift_cards()
                    .insert(NewGiftCard { code, ..card })
                    .await?
            }
            None => self.insert_with_generated_code(card).await?,
        };

        info!(code = %created.code, value = %created.base_value(), status = %created.status, "Gift card issued");
        Ok(created)
    }

    async fn insert_with_generated_code(&self, card: NewGiftCard) -> EngineResult<GiftCard> {
        let repo = self.db.gift_cards();
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(None);
            match repo.insert(NewGiftCard { code, ..card.clone() }).await {
                Err(DbError::UniqueViolation { value, .. }) => {
                    warn!(code = %value, "Generated gift card code collided, retrying");
                }
                other => return Ok(other?),
            }
        }
        Err(EngineError::Internal("could not generate a unique gift card code".to_string()))
    }

    /// Issues `quantity` cards under one batch in `draft` status.
    ///
    /// The batch and all of its cards are written in one unit of work.
    pub async fn create_batch(&self, req: BatchRequest) -> EngineResult<GiftCardBatch> {
        validate_name("name", &req.name)?;
        validate_batch_quantity(req.quantity)?;
        validate_value_cents("value", req.value.cents())?;
        self.check_currency(&req.currency)?;
        if let Some(days) = req.validity_days {
            validate_validity_days(days)?;
        }
        ensure_future("expires_at", req.expires_at)?;

        let batch_code = normalize_gift_card_code(&req.batch_code)?;
        if batch_code.len() > MAX_BATCH_CODE_LEN {
            return Err(ValidationError::TooLong {
                field: "batch_code".to_string(),
                max: MAX_BATCH_CODE_LEN,
            }
            .into());
        }

        let bonus = self.locked_in_bonus(req.promo_rule_id, req.value).await?;

        let mut tx = self.db.begin().await?;
        let batch = self
            .db
            .batches()
            .insert_in(
                &mut tx,
                NewBatch {
                    name: req.name,
                    batch_code: batch_code.clone(),
                    quantity: req.quantity,
                    original_value: req.value,
                    promo_rule_id: req.promo_rule_id,
                    final_credit: req.value + bonus,
                    expires_at: req.expires_at,
                    metadata: req.metadata,
                },
            )
            .await?;

        let cards = self.db.gift_cards();
        for _ in 0..req.quantity {
            let mut attempts = 0;
            loop {
                attempts += 1;
                let code = generate_code(Some(&batch_code));
                let card = NewGiftCard {
                    code,
                    original_value: req.value,
                    base_value: req.value,
                    bonus_value: bonus,
                    currency: req.currency.clone(),
                    batch_id: Some(batch.id.clone()),
                    promo_rule_id: req.promo_rule_id,
                    category: req.category.clone(),
                    validity_days: req.validity_days,
                    status: GiftCardStatus::Created,
                    issued_to: None,
                    expires_at: req.expires_at,
                };
                match cards.insert_in(&mut tx, card).await {
                    Err(DbError::UniqueViolation { .. }) if attempts < MAX_CODE_ATTEMPTS => continue,
                    other => {
                        other?;
                        break;
                    }
                }
            }
        }

        tx.commit().await?;

        info!(
            batch_id = %batch.id,
            batch_code = %batch.batch_code,
            quantity = batch.quantity,
            "Gift card batch created"
        );
        Ok(batch)
    }

    /// Bonus a card issued under `promo_rule_id` carries.
    async fn locked_in_bonus(&self, promo_rule_id: Option<i64>, value: Money) -> EngineResult<Money> {
        let Some(id) = promo_rule_id else {
            return Ok(Money::zero());
        };
        let rule = self
            .db
            .promo_rules()
            .get_by_id(id)
            .await?
            .ok_or_else(|| WalletError::not_found("Promo rule", id.to_string()))?;
        Ok(value.bonus_for(rule.multiplier))
    }

    // =========================================================================
    // Batch lifecycle
    // =========================================================================

    /// Moves a draft batch to `active` together with its `created` cards.
    pub async fn activate_batch(&self, batch_id: &str) -> EngineResult<u64> {
        let mut tx = self.db.begin().await?;
        let batch = self.batch_in_status(&mut tx, batch_id, &[BatchStatus::Draft]).await?;

        let activated = self.db.gift_cards().activate_batch_cards(&mut tx, &batch.id).await?;
        self.db
            .batches()
            .set_status_in(&mut tx, &batch.id, BatchStatus::Active)
            .await?;
        tx.commit().await?;

        info!(batch_id, activated, "Gift card batch activated");
        Ok(activated)
    }

    /// Cancels a batch, voiding every card not yet redeemed.
    pub async fn cancel_batch(&self, batch_id: &str) -> EngineResult<u64> {
        let mut tx = self.db.begin().await?;
        let batch = self
            .batch_in_status(&mut tx, batch_id, &[BatchStatus::Draft, BatchStatus::Active])
            .await?;

        let voided = self.db.gift_cards().void_batch_cards(&mut tx, &batch.id).await?;
        self.db
            .batches()
            .set_status_in(&mut tx, &batch.id, BatchStatus::Cancelled)
            .await?;
        tx.commit().await?;

        info!(batch_id, voided, "Gift card batch cancelled");
        Ok(voided)
    }

    pub async fn batch_stats(&self, batch_id: &str) -> EngineResult<BatchStats> {
        if self.db.batches().get_by_id(batch_id).await?.is_none() {
            return Err(WalletError::not_found("Batch", batch_id).into());
        }
        Ok(self.db.gift_cards().batch_stats(batch_id).await?)
    }

    async fn batch_in_status(
        &self,
        conn: &mut wallet_db::SqliteConnection,
        batch_id: &str,
        allowed: &[BatchStatus],
    ) -> EngineResult<GiftCardBatch> {
        let batch = self
            .db
            .batches()
            .get_by_id_in(conn, batch_id)
            .await?
            .ok_or_else(|| WalletError::not_found("Batch", batch_id))?;

        if !allowed.contains(&batch.status) {
            return Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("batch is {}", batch.status),
            }
            .into());
        }
        Ok(batch)
    }

    // =========================================================================
    // Card lifecycle
    // =========================================================================

    /// Activates or deactivates a card.
    pub async fn set_card_active(&self, code: &str, active: bool) -> EngineResult<GiftCard> {
        let code = normalize_gift_card_code(code)?;
        let to = if active {
            GiftCardStatus::Active
        } else {
            GiftCardStatus::Inactive
        };
        Ok(self.db.gift_cards().transition(&code, to).await?)
    }

    pub async fn void_card(&self, code: &str) -> EngineResult<GiftCard> {
        let code = normalize_gift_card_code(code)?;
        Ok(self.db.gift_cards().transition(&code, GiftCardStatus::Void).await?)
    }

    pub async fn get_card(&self, code: &str) -> EngineResult<GiftCard> {
        let code = normalize_gift_card_code(code)?;
        self.db
            .gift_cards()
            .get_by_code(&code)
            .await?
            .ok_or_else(|| WalletError::not_found("Gift card", code).into())
    }

    /// Expires lots and unredeemed cards that are past due at `as_of`.
    pub async fn sweep_expired(&self, as_of: DateTime<Utc>) -> EngineResult<ExpirySweep> {
        let sweep = ExpirySweep {
            lots_expired: self.db.lots().expire_due(as_of).await?,
            cards_expired: self.db.gift_cards().expire_due(as_of).await?,
        };
        if sweep.lots_expired > 0 || sweep.cards_expired > 0 {
            info!(lots = sweep.lots_expired, cards = sweep.cards_expired, "Expiry sweep");
        }
        Ok(sweep)
    }
}

fn ensure_future(field: &str, at: Option<DateTime<Utc>>) -> EngineResult<()> {
    match at {
        Some(at) if at <= Utc::now() => Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be in the future".to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

/// `XXXX-XXXX-XXXX`, or `{prefix}-XXXX-XXXX` when a prefix is given.
pub fn generate_code(prefix: Option<&str>) -> String {
    let mut rng = rand::thread_rng();
    let head = match prefix {
        Some(prefix) => prefix.to_string(),
        None => random_group(&mut rng),
    };
    format!("{}-{}-{}", head, random_group(&mut rng), random_group(&mut rng))
}

fn random_group(rng: &mut impl Rng) -> String {
    (0..4)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_core::{Multiplier, NewPromoRule, PromoConditions, PromoRuleType};
    use wallet_db::DbConfig;

    async fn admin() -> (GiftCardAdmin, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        (GiftCardAdmin::new(db.clone(), "AED"), db)
    }

    fn batch_request(quantity: i64) -> BatchRequest {
        BatchRequest {
            name: "Eid gifts".to_string(),
            batch_code: "eid25".to_string(),
            quantity,
            value: Money::from_cents(5_000),
            currency: "AED".to_string(),
            promo_rule_id: None,
            category: None,
            validity_days: Some(30),
            expires_at: None,
            metadata: serde_json::json!({ "campaign": "eid" }),
        }
    }

    #[test]
    fn test_generated_codes_are_valid() {
        let code = generate_code(None);
        assert_eq!(code.len(), 14);
        assert_eq!(normalize_gift_card_code(&code).unwrap(), code);
        assert!(!code.contains('0') && !code.contains('O'));

        assert!(generate_code(Some("EID")).starts_with("EID-"));
    }

    #[tokio::test]
    async fn test_issue_card_locks_in_bonus() {
        let (admin, db) = admin().await;
        let rule = db
            .promo_rules()
            .insert(NewPromoRule {
                name: "Launch".to_string(),
                rule_type: PromoRuleType::Global,
                multiplier: Multiplier::from_bps(11_000),
                start_date: None,
                end_date: None,
                conditions: PromoConditions::default(),
                is_active: true,
            })
            .await
            .unwrap();

        let mut req = CardRequest::new(Money::from_cents(10_000), "AED");
        req.code = Some(" gift-1234 ".to_string());
        req.promo_rule_id = Some(rule.id);
        let card = admin.issue_card(req).await.unwrap();

        assert_eq!(card.code, "GIFT-1234");
        assert_eq!(card.status, GiftCardStatus::Created);
        assert_eq!(card.bonus_value_cents, 1_000);
        assert_eq!(card.final_credit_cents, 11_000);
    }

    #[tokio::test]
    async fn test_issue_card_rejects_past_expiry() {
        let (admin, _db) = admin().await;
        let mut req = CardRequest::new(Money::from_cents(1_000), "AED");
        req.expires_at = Some(Utc::now() - chrono::Duration::days(1));

        let err = admin.issue_card(req).await.unwrap_err();
        assert!(matches!(err.wallet_error(), Some(WalletError::Validation(_))));
    }

    #[tokio::test]
    async fn test_foreign_currency_is_not_issued() {
        let (admin, db) = admin().await;
        let err = admin
            .issue_card(CardRequest::new(Money::from_cents(10_000), "USD"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.wallet_error(),
            Some(WalletError::CurrencyMismatch { found, .. }) if found == "USD"
        ));

        let mut req = batch_request(3);
        req.currency = "USD".to_string();
        let err = admin.create_batch(req).await.unwrap_err();
        assert!(matches!(err.wallet_error(), Some(WalletError::CurrencyMismatch { .. })));
        assert!(db.batches().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_lifecycle() {
        let (admin, db) = admin().await;
        let batch = admin.create_batch(batch_request(4)).await.unwrap();
        assert_eq!(batch.status, BatchStatus::Draft);
        assert_eq!(batch.batch_code, "EID25");

        let cards = db.gift_cards().list_by_batch(&batch.id).await.unwrap();
        assert_eq!(cards.len(), 4);
        assert!(cards.iter().all(|c| c.code.starts_with("EID25-") && c.status == GiftCardStatus::Created));

        assert_eq!(admin.activate_batch(&batch.id).await.unwrap(), 4);
        // A second activation is refused: the batch is no longer a draft.
        assert!(admin.activate_batch(&batch.id).await.is_err());

        assert_eq!(admin.cancel_batch(&batch.id).await.unwrap(), 4);
        let stats = admin.batch_stats(&batch.id).await.unwrap();
        assert_eq!(stats.total_cards, 4);
        assert_eq!(stats.redeemed_cards, 0);
        assert_eq!(stats.redemption_rate_bps, 0);
    }

    #[tokio::test]
    async fn test_card_lifecycle_transitions() {
        let (admin, _db) = admin().await;
        let mut req = CardRequest::new(Money::from_cents(1_000), "AED");
        req.code = Some("LIFE-0001".to_string());
        admin.issue_card(req).await.unwrap();

        let card = admin.set_card_active("life-0001", true).await.unwrap();
        assert_eq!(card.status, GiftCardStatus::Active);
        let card = admin.set_card_active("LIFE-0001", false).await.unwrap();
        assert_eq!(card.status, GiftCardStatus::Inactive);
        let card = admin.set_card_active("LIFE-0001", true).await.unwrap();
        assert_eq!(card.status, GiftCardStatus::Active);

        let card = admin.void_card("LIFE-0001").await.unwrap();
        assert_eq!(card.status, GiftCardStatus::Void);

        let err = admin.set_card_active("LIFE-0001", true).await.unwrap_err();
        assert!(matches!(err.wallet_error(), Some(WalletError::Void(_))));
    }
}
