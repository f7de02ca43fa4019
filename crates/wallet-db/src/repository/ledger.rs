//! # Ledger Repository
//!
//! The append-only transaction log.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  append(conn, NewTransaction)   ← the ONLY write                        │
//! │                                                                         │
//! │  No update, no delete: the schema also carries triggers that abort     │
//! │  any UPDATE or DELETE on wallet_transactions.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Read Path
//! Listings replay the user's full history to attach a running balance to
//! each entry, then filter and page newest-first.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use wallet_core::balance::{replay_running_balance, LedgerEntry, MonthlySummary, TransactionFilter};
use wallet_core::{
    new_id, Direction, Money, NewTransaction, Paginated, PaginationParams, TransactionStatus,
    TransactionType, WalletError, WalletTransaction,
};

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, transaction_type, direction, amount_cents, base_value_cents,
    bonus_value_cents, currency, ref_type, ref_id, gift_card_id, promo_rule_id,
    lot_id, description, status, created_at
"#;

/// Half-open time range `[from, to)`; `None` leaves a side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Period {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Period {
    /// The whole history.
    pub fn all() -> Self {
        Period::default()
    }

    /// Everything at or after `from`.
    pub fn since(from: DateTime<Utc>) -> Self {
        Period {
            from: Some(from),
            to: None,
        }
    }

    /// One calendar month in UTC.
    pub fn month(year: i32, month: u32) -> DbResult<Self> {
        let invalid = || DbError::Wallet(WalletError::Validation(
            wallet_core::ValidationError::OutOfRange {
                field: "month".to_string(),
                min: 1,
                max: 12,
            },
        ));
        let from = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let to = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .ok_or_else(invalid)?;
        Ok(Period {
            from: Some(from),
            to: Some(to),
        })
    }
}

/// Repository for ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends an entry inside the caller's unit of work.
    pub async fn append(
        &self,
        conn: &mut SqliteConnection,
        entry: NewTransaction,
    ) -> DbResult<WalletTransaction> {
        if !entry.amount.is_positive() {
            return Err(WalletError::invalid_amount("ledger amount must be positive").into());
        }

        let tx = WalletTransaction {
            id: new_id(),
            user_id: entry.user_id,
            transaction_type: entry.transaction_type,
            direction: entry.direction,
            amount_cents: entry.amount.cents(),
            base_value_cents: entry.base_value.cents(),
            bonus_value_cents: entry.bonus_value.map(|b| b.cents()),
            currency: entry.currency,
            ref_type: entry.ref_type,
            ref_id: entry.ref_id,
            gift_card_id: entry.gift_card_id,
            promo_rule_id: entry.promo_rule_id,
            lot_id: entry.lot_id,
            description: entry.description,
            status: TransactionStatus::Completed,
            created_at: Utc::now(),
        };

        debug!(
            id = %tx.id,
            user_id = tx.user_id,
            kind = %tx.transaction_type,
            direction = %tx.direction,
            amount = tx.amount_cents,
            "Appending ledger entry"
        );

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, user_id, transaction_type, direction, amount_cents, base_value_cents,
                bonus_value_cents, currency, ref_type, ref_id, gift_card_id, promo_rule_id,
                lot_id, description, status, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16
            )
            "#,
        )
        .bind(&tx.id)
        .bind(tx.user_id)
        .bind(tx.transaction_type)
        .bind(tx.direction)
        .bind(tx.amount_cents)
        .bind(tx.base_value_cents)
        .bind(tx.bonus_value_cents)
        .bind(&tx.currency)
        .bind(&tx.ref_type)
        .bind(&tx.ref_id)
        .bind(&tx.gift_card_id)
        .bind(tx.promo_rule_id)
        .bind(&tx.lot_id)
        .bind(&tx.description)
        .bind(tx.status)
        .bind(tx.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// Gets an entry by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<WalletTransaction>> {
        let sql = format!("SELECT {} FROM wallet_transactions WHERE id = ?1", TRANSACTION_COLUMNS);
        let tx = sqlx::query_as::<_, WalletTransaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tx)
    }

    /// A user's full history, oldest first.
    pub async fn history(&self, user_id: i64) -> DbResult<Vec<WalletTransaction>> {
        let mut conn = self.pool.acquire().await?;
        self.history_in(&mut conn, user_id).await
    }

    /// A user's full history inside a unit of work.
    pub async fn history_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> DbResult<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE user_id = ?1 ORDER BY created_at, rowid",
            TRANSACTION_COLUMNS
        );
        let entries = sqlx::query_as::<_, WalletTransaction>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(entries)
    }

    /// Entries linked to a lot, for reconciliation.
    pub async fn list_lot_linked(&self, user_id: i64) -> DbResult<Vec<WalletTransaction>> {
        let mut conn = self.pool.acquire().await?;
        self.list_lot_linked_in(&mut conn, user_id).await
    }

    /// Lot-linked entries read through the caller's connection, so they can
    /// be compared with lots read in the same transaction.
    pub async fn list_lot_linked_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> DbResult<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE user_id = ?1 AND lot_id IS NOT NULL ORDER BY created_at, rowid",
            TRANSACTION_COLUMNS
        );
        let entries = sqlx::query_as::<_, WalletTransaction>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(entries)
    }

    /// Filtered, newest-first page of a user's ledger.
    ///
    /// Each entry carries the ledger balance right after it was written,
    /// computed over the unfiltered history.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
        params: PaginationParams,
    ) -> DbResult<Paginated<LedgerEntry>> {
        let history = self.history(user_id).await?;

        let mut entries: Vec<LedgerEntry> = replay_running_balance(history)
            .into_iter()
            .filter(|entry| filter.matches(&entry.transaction))
            .collect();
        entries.reverse();

        Ok(Paginated::from_vec(entries, params))
    }

    /// Total amount in one direction over a period.
    pub async fn sum_by_direction(
        &self,
        user_id: i64,
        direction: Direction,
        period: Period,
    ) -> DbResult<Money> {
        let mut conn = self.pool.acquire().await?;
        self.sum_by_direction_in(&mut conn, user_id, direction, period)
            .await
    }

    /// Total amount in one direction over a period, inside a unit of work.
    pub async fn sum_by_direction_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        direction: Direction,
        period: Period,
    ) -> DbResult<Money> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_cents)
            FROM wallet_transactions
            WHERE user_id = ?1
              AND direction = ?2
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at < ?4)
            "#,
        )
        .bind(user_id)
        .bind(direction)
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Money::from_cents(total.unwrap_or(0)))
    }

    /// Number of entries of one type written at or after `since`.
    pub async fn count_since(
        &self,
        user_id: i64,
        transaction_type: TransactionType,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        self.count_since_in(&mut conn, user_id, transaction_type, since)
            .await
    }

    /// Number of entries of one type since `since`, inside a unit of work.
    pub async fn count_since_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        transaction_type: TransactionType,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM wallet_transactions
            WHERE user_id = ?1 AND transaction_type = ?2 AND created_at >= ?3
            "#,
        )
        .bind(user_id)
        .bind(transaction_type)
        .bind(since)
        .fetch_one(&mut *conn)
        .await?;

        Ok(count)
    }

    /// Credits, debits and entry count for one UTC calendar month.
    pub async fn monthly_summary(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
    ) -> DbResult<MonthlySummary> {
        let period = Period::month(year, month)?;
        let mut conn = self.pool.acquire().await?;

        let credits = self
            .sum_by_direction_in(&mut conn, user_id, Direction::Credit, period)
            .await?;
        let debits = self
            .sum_by_direction_in(&mut conn, user_id, Direction::Debit, period)
            .await?;

        let entry_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM wallet_transactions
            WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3
            "#,
        )
        .bind(user_id)
        .bind(period.from)
        .bind(period.to)
        .fetch_one(&mut *conn)
        .await?;

        Ok(MonthlySummary {
            year,
            month,
            credits,
            debits,
            net: credits - debits,
            entry_count: entry_count as usize,
        })
    }
}

/// The current UTC month as `(year, month)`.
pub fn current_month(now: DateTime<Utc>) -> (i32, u32) {
    (now.year(), now.month())
}

// =============================================================================
// Unit Tests
// =============================================================================
