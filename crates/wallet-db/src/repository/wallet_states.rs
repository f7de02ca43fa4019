//! # Wallet State Repository
//!
//! One row per wallet owner: the manual freeze flag, and the row every
//! unit of work claims first.
//!
//! ## Why Claim First
//! ```text
//! BEGIN (deferred)
//!   UPSERT wallet_states(user)   ← takes SQLite's write lock right away
//!   SELECT lots / ledger         ← reads see a stable wallet
//!   UPDATE lots, INSERT ledger
//! COMMIT
//! ```
//! A deferred transaction that reads before it writes can fail with
//! SQLITE_BUSY when it later upgrades to a writer; claiming first turns
//! that into an ordinary `busy_timeout` wait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Persisted per-user wallet state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WalletState {
    pub user_id: i64,
    pub frozen: bool,
    pub frozen_reason: Option<String>,
    pub frozen_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by every claim; counts units of work on this wallet.
    pub version: i64,
}

/// Repository for wallet state rows.
#[derive(Debug, Clone)]
pub struct WalletStateRepository {
    pool: SqlitePool,
}

impl WalletStateRepository {
    /// Creates a new WalletStateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WalletStateRepository { pool }
    }

    /// Gets the state row for a user, if one was ever written.
    pub async fn get(&self, user_id: i64) -> DbResult<Option<WalletState>> {
        let mut conn = self.pool.acquire().await?;
        self.get_in(&mut conn, user_id).await
    }

    /// Gets the state row inside a unit of work.
    pub async fn get_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> DbResult<Option<WalletState>> {
        let state = sqlx::query_as::<_, WalletState>(
            r#"
            SELECT user_id, frozen, frozen_reason, frozen_at, updated_at, version
            FROM wallet_states
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(state)
    }

    /// Claims the user's row for the current unit of work.
    ///
    /// Must be the first statement of every mutating transaction.
    pub async fn claim(&self, conn: &mut SqliteConnection, user_id: i64) -> DbResult<WalletState> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO wallet_states (user_id, frozen, updated_at, version)
            VALUES (?1, 0, ?2, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                version = version + 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let state = sqlx::query_as::<_, WalletState>(
            r#"
            SELECT user_id, frozen, frozen_reason, frozen_at, updated_at, version
            FROM wallet_states
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

        debug!(user_id, version = state.version, "Claimed wallet state");
        Ok(state)
    }

    /// Sets or clears the manual freeze flag. Idempotent.
    pub async fn set_frozen(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        frozen: bool,
        reason: Option<&str>,
    ) -> DbResult<WalletState> {
        let now = Utc::now();
        let frozen_at = frozen.then_some(now);
        let reason = if frozen { reason } else { None };

        sqlx::query(
            r#"
            INSERT INTO wallet_states (user_id, frozen, frozen_reason, frozen_at, updated_at, version)
            VALUES (?1, ?2, ?3, ?4, ?5, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                frozen = excluded.frozen,
                frozen_reason = excluded.frozen_reason,
                frozen_at = CASE
                    WHEN wallet_states.frozen = 1 AND excluded.frozen = 1 THEN wallet_states.frozen_at
                    ELSE excluded.frozen_at
                END,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(frozen)
        .bind(reason)
        .bind(frozen_at)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(user_id, frozen, "Updated wallet freeze flag");

        let state = self.get_in(conn, user_id).await?;
        state.ok_or_else(|| crate::DbError::not_found("Wallet state", user_id.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_claim_creates_and_bumps_version() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.wallet_states();

        let mut tx = db.begin().await.unwrap();
        let first = repo.claim(&mut tx, 1).await.unwrap();
        let second = repo.claim(&mut tx, 1).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(!second.frozen);
    }

    #[tokio::test]
    async fn test_freeze_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.wallet_states();

        let mut tx = db.begin().await.unwrap();
        let frozen = repo.set_frozen(&mut tx, 3, true, Some("chargeback")).await.unwrap();
        let again = repo.set_frozen(&mut tx, 3, true, Some("chargeback")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(again.frozen);
        assert_eq!(frozen.frozen_at, again.frozen_at);
        assert_eq!(again.frozen_reason.as_deref(), Some("chargeback"));

        let mut tx = db.begin().await.unwrap();
        let thawed = repo.set_frozen(&mut tx, 3, false, None).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!thawed.frozen);
        assert!(thawed.frozen_reason.is_none());
        assert!(thawed.frozen_at.is_none());
    }
}
