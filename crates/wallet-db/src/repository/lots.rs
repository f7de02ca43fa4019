//! # Lot Repository
//!
//! Persistence for wallet lots and the consumption primitive.
//!
//! ## Lot Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Lot Lifecycle                                   │
//! │                                                                         │
//! │  create_lot() ──► active ──decrement_lot()──► remaining = 0 ──► exhausted│
//! │                     │ ▲                                                 │
//! │       set_frozen()  ▼ │  set_frozen(false)                              │
//! │                   frozen                                                │
//! │                     │                                                   │
//! │  expire_due(as_of): active past expires_at ──► expired                 │
//! │                                                                         │
//! │  Lots are never deleted; remaining never increases.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use wallet_core::allocation::spendable_in_order;
use wallet_core::{new_id, LotStatus, Money, NewLot, WalletError, WalletLot};

const LOT_COLUMNS: &str = r#"
    id, user_id, amount_cents, base_value_cents, bonus_value_cents, remaining_cents,
    currency, status, source, expires_at, gift_card_id, ref_type, ref_id,
    created_at, updated_at
"#;

/// Repository for wallet lot operations.
#[derive(Debug, Clone)]
pub struct LotRepository {
    pool: SqlitePool,
}

impl LotRepository {
    /// Creates a new LotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LotRepository { pool }
    }

    /// Creates a lot inside the caller's unit of work.
    ///
    /// ## Errors
    /// - `InvalidAmount` when the amount is not positive or does not equal
    ///   base + bonus
    pub async fn create_lot(&self, conn: &mut SqliteConnection, lot: NewLot) -> DbResult<WalletLot> {
        if !lot.amount.is_positive() {
            return Err(WalletError::invalid_amount("lot amount must be positive").into());
        }
        if lot.base_value + lot.bonus_value != lot.amount {
            return Err(WalletError::invalid_amount(format!(
                "lot amount {} does not equal base {} + bonus {}",
                lot.amount, lot.base_value, lot.bonus_value
            ))
            .into());
        }

        let now = Utc::now();
        let created = WalletLot {
            id: new_id(),
            user_id: lot.user_id,
            amount_cents: lot.amount.cents(),
            base_value_cents: lot.base_value.cents(),
            bonus_value_cents: lot.bonus_value.cents(),
            remaining_cents: lot.amount.cents(),
            currency: lot.currency,
            status: LotStatus::Active,
            source: lot.source,
            expires_at: lot.expires_at,
            gift_card_id: lot.gift_card_id,
            ref_type: lot.ref_type,
            ref_id: lot.ref_id,
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %created.id,
            user_id = created.user_id,
            amount = created.amount_cents,
            source = %created.source,
            "Creating wallet lot"
        );

        sqlx::query(
            r#"
            INSERT INTO wallet_lots (
                id, user_id, amount_cents, base_value_cents, bonus_value_cents, remaining_cents,
                currency, status, source, expires_at, gift_card_id, ref_type, ref_id,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15
            )
            "#,
        )
        .bind(&created.id)
        .bind(created.user_id)
        .bind(created.amount_cents)
        .bind(created.base_value_cents)
        .bind(created.bonus_value_cents)
        .bind(created.remaining_cents)
        .bind(&created.currency)
        .bind(created.status)
        .bind(created.source)
        .bind(created.expires_at)
        .bind(&created.gift_card_id)
        .bind(&created.ref_type)
        .bind(&created.ref_id)
        .bind(created.created_at)
        .bind(created.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Gets a lot by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<WalletLot>> {
        let mut conn = self.pool.acquire().await?;
        self.get_by_id_in(&mut conn, id).await
    }

    /// Gets a lot by ID inside a unit of work.
    pub async fn get_by_id_in(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<WalletLot>> {
        let sql = format!("SELECT {} FROM wallet_lots WHERE id = ?1", LOT_COLUMNS);
        let lot = sqlx::query_as::<_, WalletLot>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(lot)
    }

    /// Lists every lot of a user (any status), oldest first.
    pub async fn list_for_user(&self, user_id: i64) -> DbResult<Vec<WalletLot>> {
        let mut conn = self.pool.acquire().await?;
        self.list_for_user_in(&mut conn, user_id).await
    }

    /// Lists every lot of a user inside a unit of work.
    pub async fn list_for_user_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> DbResult<Vec<WalletLot>> {
        let sql = format!(
            "SELECT {} FROM wallet_lots WHERE user_id = ?1 ORDER BY created_at, id",
            LOT_COLUMNS
        );
        let lots = sqlx::query_as::<_, WalletLot>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(lots)
    }

    /// Spendable lots at `as_of`, in consumption order.
    pub async fn list_spendable(&self, user_id: i64, as_of: DateTime<Utc>) -> DbResult<Vec<WalletLot>> {
        let mut conn = self.pool.acquire().await?;
        self.list_spendable_in(&mut conn, user_id, as_of).await
    }

    /// Spendable lots at `as_of` inside a unit of work.
    ///
    /// SQL narrows to active lots with value left; expiry and ordering are
    /// applied by `wallet_core::allocation` so the rule lives in one place.
    pub async fn list_spendable_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        as_of: DateTime<Utc>,
    ) -> DbResult<Vec<WalletLot>> {
        let sql = format!(
            "SELECT {} FROM wallet_lots WHERE user_id = ?1 AND status = 'active' AND remaining_cents > 0",
            LOT_COLUMNS
        );
        let lots = sqlx::query_as::<_, WalletLot>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(spendable_in_order(lots, as_of))
    }

    /// Takes `amount` from a single lot inside the caller's unit of work.
    ///
    /// ## Errors
    /// - `NotFound` when the lot doesn't exist
    /// - `Invariant` when the stored lot is already out of range
    /// - `InsufficientLotBalance` when `amount > remaining` or the lot is
    ///   not active
    /// - `InvalidAmount` when `amount <= 0`
    pub async fn decrement_lot(
        &self,
        conn: &mut SqliteConnection,
        lot_id: &str,
        amount: Money,
    ) -> DbResult<WalletLot> {
        if !amount.is_positive() {
            return Err(WalletError::invalid_amount("decrement must be positive").into());
        }

        let lot = self
            .get_by_id_in(conn, lot_id)
            .await?
            .ok_or_else(|| DbError::not_found("Wallet lot", lot_id))?;

        lot.check_invariants()?;

        if lot.status != LotStatus::Active || amount.cents() > lot.remaining_cents {
            return Err(WalletError::InsufficientLotBalance {
                lot_id: lot.id,
                remaining_cents: if lot.status == LotStatus::Active {
                    lot.remaining_cents
                } else {
                    0
                },
                requested_cents: amount.cents(),
            }
            .into());
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE wallet_lots SET
                remaining_cents = remaining_cents - ?2,
                status = CASE WHEN remaining_cents - ?2 = 0 THEN 'exhausted' ELSE status END,
                updated_at = ?3
            WHERE id = ?1 AND status = 'active' AND remaining_cents >= ?2
            "#,
        )
        .bind(lot_id)
        .bind(amount.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::InsufficientLotBalance {
                lot_id: lot_id.to_string(),
                remaining_cents: lot.remaining_cents,
                requested_cents: amount.cents(),
            }
            .into());
        }

        debug!(lot_id, taken = amount.cents(), "Decremented wallet lot");

        self.get_by_id_in(conn, lot_id)
            .await?
            .ok_or_else(|| DbError::not_found("Wallet lot", lot_id))
    }

    /// Marks every active lot past its expiry as expired.
    ///
    /// ## Returns
    /// Number of lots swept.
    pub async fn expire_due(&self, as_of: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_lots SET
                status = 'expired',
                updated_at = ?1
            WHERE status = 'active'
              AND expires_at IS NOT NULL
              AND expires_at <= ?2
            "#,
        )
        .bind(Utc::now())
        .bind(as_of)
        .execute(&self.pool)
        .await?;

        let swept = result.rows_affected();
        if swept > 0 {
            info!(swept, as_of = %as_of, "Expired wallet lots");
        }
        Ok(swept)
    }

    /// Freezes or unfreezes a single lot inside a unit of work.
    ///
    /// Only `active ⇄ frozen` transitions happen; exhausted and expired lots
    /// are returned unchanged, as is a lot already in the target state.
    pub async fn set_frozen(
        &self,
        conn: &mut SqliteConnection,
        lot_id: &str,
        frozen: bool,
    ) -> DbResult<WalletLot> {
        let (from, to) = if frozen {
            (LotStatus::Active, LotStatus::Frozen)
        } else {
            (LotStatus::Frozen, LotStatus::Active)
        };

        let result = sqlx::query(
            r#"
            UPDATE wallet_lots SET status = ?3, updated_at = ?4
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(lot_id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            debug!(lot_id, frozen, "Changed lot freeze state");
        }

        self.get_by_id_in(conn, lot_id)
            .await?
            .ok_or_else(|| DbError::not_found("Wallet lot", lot_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use wallet_core::LotSource;

    fn new_lot(user_id: i64, cents: i64, expires_at: Option<DateTime<Utc>>) -> NewLot {
        NewLot {
            user_id,
            amount: Money::from_cents(cents),
            base_value: Money::from_cents(cents),
            bonus_value: Money::zero(),
            currency: "AED".to_string(),
            source: LotSource::AdminAdjustment,
            expires_at,
            gift_card_id: None,
            ref_type: None,
            ref_id: None,
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = db.lots();

        let mut tx = db.begin().await.unwrap();
        let lot = repo.create_lot(&mut tx, new_lot(1, 5000, None)).await.unwrap();
        tx.commit().await.unwrap();

        let loaded = repo.get_by_id(&lot.id).await.unwrap().unwrap();
        assert_eq!(loaded.remaining_cents, 5000);
        assert_eq!(loaded.status, LotStatus::Active);
        assert_eq!(loaded.id, lot.id);
        assert_eq!(loaded.source, LotSource::AdminAdjustment);
    }

    #[tokio::test]
    async fn test_create_rejects_non_positive_amount() {
        let db = setup().await;
        let mut tx = db.begin().await.unwrap();
        let err = db.lots().create_lot(&mut tx, new_lot(1, 0, None)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Wallet(WalletError::InvalidAmount { .. })
        ));
    }

    #[tokio::test]
    async fn test_decrement_to_exhausted() {
        let db = setup().await;
        let repo = db.lots();

        let mut tx = db.begin().await.unwrap();
        let lot = repo.create_lot(&mut tx, new_lot(1, 1000, None)).await.unwrap();
        let partial = repo
            .decrement_lot(&mut tx, &lot.id, Money::from_cents(400))
            .await
            .unwrap();
        assert_eq!(partial.remaining_cents, 600);
        assert_eq!(partial.status, LotStatus::Active);

        let drained = repo
            .decrement_lot(&mut tx, &lot.id, Money::from_cents(600))
            .await
            .unwrap();
        assert_eq!(drained.remaining_cents, 0);
        assert_eq!(drained.status, LotStatus::Exhausted);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_decrement_beyond_remaining_fails() {
        let db = setup().await;
        let repo = db.lots();

        let mut tx = db.begin().await.unwrap();
        let lot = repo.create_lot(&mut tx, new_lot(1, 1000, None)).await.unwrap();
        let err = repo
            .decrement_lot(&mut tx, &lot.id, Money::from_cents(1001))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Wallet(WalletError::InsufficientLotBalance {
                remaining_cents: 1000,
                requested_cents: 1001,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_spendable_order_and_expiry_sweep() {
        let db = setup().await;
        let repo = db.lots();
        let now = Utc::now();

        let mut tx = db.begin().await.unwrap();
        let never = repo.create_lot(&mut tx, new_lot(1, 300, None)).await.unwrap();
        let late = repo
            .create_lot(&mut tx, new_lot(1, 200, Some(now + Duration::days(30))))
            .await
            .unwrap();
        let soon = repo
            .create_lot(&mut tx, new_lot(1, 100, Some(now + Duration::days(1))))
            .await
            .unwrap();
        let gone = repo
            .create_lot(&mut tx, new_lot(1, 999, Some(now - Duration::days(1))))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let spendable = repo.list_spendable(1, now).await.unwrap();
        let ids: Vec<&str> = spendable.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![soon.id.as_str(), late.id.as_str(), never.id.as_str()]);

        let swept = repo.expire_due(now).await.unwrap();
        assert_eq!(swept, 1);
        let expired = repo.get_by_id(&gone.id).await.unwrap().unwrap();
        assert_eq!(expired.status, LotStatus::Expired);
        assert_eq!(expired.remaining_cents, 999);
    }

    #[tokio::test]
    async fn test_freeze_lot() {
        let db = setup().await;
        let repo = db.lots();

        let mut tx = db.begin().await.unwrap();
        let lot = repo.create_lot(&mut tx, new_lot(1, 1000, None)).await.unwrap();
        let frozen = repo.set_frozen(&mut tx, &lot.id, true).await.unwrap();
        assert_eq!(frozen.status, LotStatus::Frozen);

        let err = repo
            .decrement_lot(&mut tx, &lot.id, Money::from_cents(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Wallet(WalletError::InsufficientLotBalance { .. })
        ));

        let thawed = repo.set_frozen(&mut tx, &lot.id, false).await.unwrap();
        assert_eq!(thawed.status, LotStatus::Active);
        tx.commit().await.unwrap();

        assert_eq!(repo.list_spendable(1, Utc::now()).await.unwrap().len(), 1);
    }
}
