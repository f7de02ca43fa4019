//! # Gift Card Batch Repository
//!
//! A batch row is written in the same unit of work as its cards, so a
//! batch never exists with only some of its cards.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use wallet_core::{new_id, BatchStatus, GiftCardBatch, Money};

const BATCH_COLUMNS: &str = r#"
    id, name, batch_code, quantity, original_value_cents, promo_rule_id,
    final_credit_cents, expires_at, status, metadata, created_at
"#;

/// Input for recording a batch.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub name: String,
    pub batch_code: String,
    pub quantity: i64,
    pub original_value: Money,
    pub promo_rule_id: Option<i64>,
    pub final_credit: Money,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

/// Repository for gift card batches.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Records a batch in `draft` status.
    pub async fn insert_in(
        &self,
        conn: &mut SqliteConnection,
        batch: NewBatch,
    ) -> DbResult<GiftCardBatch> {
        let created = GiftCardBatch {
            id: new_id(),
            name: batch.name,
            batch_code: batch.batch_code,
            quantity: batch.quantity,
            original_value_cents: batch.original_value.cents(),
            promo_rule_id: batch.promo_rule_id,
            final_credit_cents: batch.final_credit.cents(),
            expires_at: batch.expires_at,
            status: BatchStatus::Draft,
            metadata: serde_json::to_string(&batch.metadata)?,
            created_at: Utc::now(),
        };

        debug!(id = %created.id, batch_code = %created.batch_code, quantity = created.quantity, "Recording batch");

        sqlx::query(
            r#"
            INSERT INTO gift_card_batches (
                id, name, batch_code, quantity, original_value_cents, promo_rule_id,
                final_credit_cents, expires_at, status, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&created.id)
        .bind(&created.name)
        .bind(&created.batch_code)
        .bind(created.quantity)
        .bind(created.original_value_cents)
        .bind(created.promo_rule_id)
        .bind(created.final_credit_cents)
        .bind(created.expires_at)
        .bind(created.status)
        .bind(&created.metadata)
        .bind(created.created_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: created.batch_code.clone(),
            },
            other => other,
        })?;

        Ok(created)
    }

    /// Gets a batch by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<GiftCardBatch>> {
        let mut conn = self.pool.acquire().await?;
        self.get_by_id_in(&mut conn, id).await
    }

    /// Gets a batch by ID inside a unit of work.
    pub async fn get_by_id_in(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<GiftCardBatch>> {
        let sql = format!("SELECT {} FROM gift_card_batches WHERE id = ?1", BATCH_COLUMNS);
        let batch = sqlx::query_as::<_, GiftCardBatch>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(batch)
    }

    /// Lists batches, newest first.
    pub async fn list(&self) -> DbResult<Vec<GiftCardBatch>> {
        let sql = format!(
            "SELECT {} FROM gift_card_batches ORDER BY created_at DESC, batch_code",
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, GiftCardBatch>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    /// Sets a batch's status.
    pub async fn set_status_in(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        status: BatchStatus,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE gift_card_batches SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Gift card batch", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
