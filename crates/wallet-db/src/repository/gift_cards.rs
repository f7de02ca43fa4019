//! # Gift Card Repository
//!
//! Database operations for gift cards.
//!
//! ## Exactly-once Redemption
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE gift_cards SET status = 'redeemed', ...                         │
//! │  WHERE id = ? AND status = 'active'                                     │
//! │                                                                         │
//! │  rows_affected = 1  → this unit of work owns the redemption             │
//! │  rows_affected = 0  → someone else got there first → AlreadyRedeemed    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use wallet_core::{
    new_id, BatchStats, GiftCard, GiftCardStatus, Money, NewGiftCard, WalletError,
};

const CARD_COLUMNS: &str = r#"
    id, code, original_value_cents, base_value_cents, bonus_value_cents, final_credit_cents,
    currency, batch_id, promo_rule_id, category, validity_days, status, issued_to,
    redeemed_by, redeemed_at, expires_at, created_at, updated_at
"#;

/// Values fixed on a card at the moment it is redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionStamp {
    pub user_id: i64,
    pub bonus_value: Money,
    pub final_credit: Money,
    pub promo_rule_id: Option<i64>,
    pub redeemed_at: DateTime<Utc>,
}

/// Repository for gift card operations.
#[derive(Debug, Clone)]
pub struct GiftCardRepository {
    pool: SqlitePool,
}

impl GiftCardRepository {
    /// Creates a new GiftCardRepository.
    pub fn new(pool: SqlitePool) -> Self {
        GiftCardRepository { pool }
    }

    /// Issues a card.
    pub async fn insert(&self, card: NewGiftCard) -> DbResult<GiftCard> {
        let mut conn = self.pool.acquire().await?;
        self.insert_in(&mut conn, card).await
    }

    /// Issues a card inside a unit of work.
    ///
    /// ## Errors
    /// - `UniqueViolation` when the code is already taken
    pub async fn insert_in(
        &self,
        conn: &mut SqliteConnection,
        card: NewGiftCard,
    ) -> DbResult<GiftCard> {
        let now = Utc::now();
        let created = GiftCard {
            id: new_id(),
            code: card.code,
            original_value_cents: card.original_value.cents(),
            base_value_cents: card.base_value.cents(),
            bonus_value_cents: card.bonus_value.cents(),
            final_credit_cents: (card.base_value + card.bonus_value).cents(),
            currency: card.currency,
            batch_id: card.batch_id,
            promo_rule_id: card.promo_rule_id,
            category: card.category,
            validity_days: card.validity_days,
            status: card.status,
            issued_to: card.issued_to,
            redeemed_by: None,
            redeemed_at: None,
            expires_at: card.expires_at,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %created.id, code = %created.code, status = %created.status, "Issuing gift card");

        sqlx::query(
            r#"
            INSERT INTO gift_cards (
                id, code, original_value_cents, base_value_cents, bonus_value_cents,
                final_credit_cents, currency, batch_id, promo_rule_id, category,
                validity_days, status, issued_to, redeemed_by, redeemed_at,
                expires_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18
            )
            "#,
        )
        .bind(&created.id)
        .bind(&created.code)
        .bind(created.original_value_cents)
        .bind(created.base_value_cents)
        .bind(created.bonus_value_cents)
        .bind(created.final_credit_cents)
        .bind(&created.currency)
        .bind(&created.batch_id)
        .bind(created.promo_rule_id)
        .bind(&created.category)
        .bind(created.validity_days)
        .bind(created.status)
        .bind(&created.issued_to)
        .bind(created.redeemed_by)
        .bind(created.redeemed_at)
        .bind(created.expires_at)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: created.code.clone(),
            },
            other => other,
        })?;

        Ok(created)
    }

    /// Gets a card by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<GiftCard>> {
        let sql = format!("SELECT {} FROM gift_cards WHERE id = ?1", CARD_COLUMNS);
        let card = sqlx::query_as::<_, GiftCard>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(card)
    }

    /// Gets a card by its (normalized) code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<GiftCard>> {
        let mut conn = self.pool.acquire().await?;
        self.get_by_code_in(&mut conn, code).await
    }

    /// Gets a card by code inside a unit of work.
    pub async fn get_by_code_in(
        &self,
        conn: &mut SqliteConnection,
        code: &str,
    ) -> DbResult<Option<GiftCard>> {
        let sql = format!("SELECT {} FROM gift_cards WHERE code = ?1", CARD_COLUMNS);
        let card = sqlx::query_as::<_, GiftCard>(&sql)
            .bind(code)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(card)
    }

    /// Lists the cards of a batch, in issue order.
    pub async fn list_by_batch(&self, batch_id: &str) -> DbResult<Vec<GiftCard>> {
        let sql = format!(
            "SELECT {} FROM gift_cards WHERE batch_id = ?1 ORDER BY created_at, code",
            CARD_COLUMNS
        );
        let cards = sqlx::query_as::<_, GiftCard>(&sql)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(cards)
    }

    /// Moves a single card along its lifecycle.
    ///
    /// ## Errors
    /// - `NotFound` when no card has this code
    /// - the card's redemption rejection (`AlreadyRedeemed`, `Void`, ...)
    ///   when the lifecycle forbids the move
    pub async fn transition(&self, code: &str, to: GiftCardStatus) -> DbResult<GiftCard> {
        let mut conn = self.pool.acquire().await?;
        let card = self
            .get_by_code_in(&mut conn, code)
            .await?
            .ok_or_else(|| DbError::not_found("Gift card", code))?;

        if card.status == to {
            return Ok(card);
        }
        if !card.status.can_transition_to(to) {
            return Err(transition_rejection(&card).into());
        }

        let result = sqlx::query(
            r#"
            UPDATE gift_cards SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(&card.id)
        .bind(card.status)
        .bind(to)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(transition_rejection(&card).into());
        }

        info!(code, from = %card.status, to = %to, "Gift card status changed");

        self.get_by_code_in(&mut conn, code)
            .await?
            .ok_or_else(|| DbError::not_found("Gift card", code))
    }

    /// Marks an active card redeemed inside the redeem unit of work.
    ///
    /// ## Errors
    /// - `AlreadyRedeemed` when the card is no longer active
    pub async fn mark_redeemed(
        &self,
        conn: &mut SqliteConnection,
        card: &GiftCard,
        stamp: RedemptionStamp,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE gift_cards SET
                status = 'redeemed',
                redeemed_by = ?2,
                redeemed_at = ?3,
                bonus_value_cents = ?4,
                final_credit_cents = ?5,
                promo_rule_id = ?6,
                updated_at = ?3
            WHERE id = ?1 AND status = 'active'
            "#,
        )
        .bind(&card.id)
        .bind(stamp.user_id)
        .bind(stamp.redeemed_at)
        .bind(stamp.bonus_value.cents())
        .bind(stamp.final_credit.cents())
        .bind(stamp.promo_rule_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::AlreadyRedeemed(card.code.clone()).into());
        }

        debug!(code = %card.code, user_id = stamp.user_id, "Gift card marked redeemed");
        Ok(())
    }

    /// Activates every `created` card of a batch.
    pub async fn activate_batch_cards(
        &self,
        conn: &mut SqliteConnection,
        batch_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE gift_cards SET status = 'active', updated_at = ?2
            WHERE batch_id = ?1 AND status = 'created'
            "#,
        )
        .bind(batch_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Voids every unredeemed card of a batch.
    pub async fn void_batch_cards(
        &self,
        conn: &mut SqliteConnection,
        batch_id: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE gift_cards SET status = 'void', updated_at = ?2
            WHERE batch_id = ?1 AND status IN ('created', 'active', 'inactive')
            "#,
        )
        .bind(batch_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Marks unredeemed cards past their expiry date as expired.
    pub async fn expire_due(&self, as_of: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE gift_cards SET status = 'expired', updated_at = ?1
            WHERE status IN ('created', 'active', 'inactive')
              AND expires_at IS NOT NULL
              AND expires_at <= ?2
            "#,
        )
        .bind(Utc::now())
        .bind(as_of)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Aggregates over a batch's cards.
    pub async fn batch_stats(&self, batch_id: &str) -> DbResult<BatchStats> {
        let (total, redeemed, redeemed_cents): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'redeemed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'redeemed' THEN final_credit_cents ELSE 0 END), 0)
            FROM gift_cards
            WHERE batch_id = ?1
            "#,
        )
        .bind(batch_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(BatchStats::new(total, redeemed, redeemed_cents))
    }
}

/// Error for a lifecycle move the card's current status forbids.
fn transition_rejection(card: &GiftCard) -> WalletError {
    match card.status {
        GiftCardStatus::Redeemed => WalletError::AlreadyRedeemed(card.code.clone()),
        GiftCardStatus::Expired => WalletError::Expired(card.code.clone()),
        GiftCardStatus::Void => WalletError::Void(card.code.clone()),
        GiftCardStatus::Created | GiftCardStatus::Inactive | GiftCardStatus::Active => {
            WalletError::Inactive(card.code.clone())
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
