//! # One-time Code Repository
//!
//! Stores argon2 hashes of issued codes. Verification compares hashes in
//! `wallet-engine`; this layer only finds the newest live code and burns it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use wallet_core::{new_id, OtpCode};

const OTP_COLUMNS: &str = r#"
    id, user_id, gift_card_id, purpose, code_hash, expires_at, consumed_at, created_at
"#;

/// Repository for one-time codes.
#[derive(Debug, Clone)]
pub struct OtpRepository {
    pool: SqlitePool,
}

impl OtpRepository {
    /// Creates a new OtpRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OtpRepository { pool }
    }

    /// Stores a freshly issued code hash.
    pub async fn insert(
        &self,
        user_id: i64,
        gift_card_id: &str,
        purpose: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<OtpCode> {
        let otp = OtpCode {
            id: new_id(),
            user_id,
            gift_card_id: gift_card_id.to_string(),
            purpose: purpose.to_string(),
            code_hash: code_hash.to_string(),
            expires_at,
            consumed_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO otp_codes (
                id, user_id, gift_card_id, purpose, code_hash, expires_at, consumed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&otp.id)
        .bind(otp.user_id)
        .bind(&otp.gift_card_id)
        .bind(&otp.purpose)
        .bind(&otp.code_hash)
        .bind(otp.expires_at)
        .bind(otp.consumed_at)
        .bind(otp.created_at)
        .execute(&self.pool)
        .await?;

        debug!(user_id, gift_card_id, purpose, "Stored one-time code");
        Ok(otp)
    }

    /// Newest unconsumed, unexpired code for this user, card and purpose.
    pub async fn latest_live_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        gift_card_id: &str,
        purpose: &str,
        as_of: DateTime<Utc>,
    ) -> DbResult<Option<OtpCode>> {
        let sql = format!(
            r#"
            SELECT {} FROM otp_codes
            WHERE user_id = ?1 AND gift_card_id = ?2 AND purpose = ?3
              AND consumed_at IS NULL
              AND expires_at > ?4
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
            OTP_COLUMNS
        );
        let otp = sqlx::query_as::<_, OtpCode>(&sql)
            .bind(user_id)
            .bind(gift_card_id)
            .bind(purpose)
            .bind(as_of)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(otp)
    }

    /// Marks a code used. Returns false when it was already consumed.
    pub async fn consume(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE otp_codes SET consumed_at = ?2 WHERE id = ?1 AND consumed_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
