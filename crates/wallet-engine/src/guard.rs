//! # Lock / Freeze Guard
//!
//! Manual freezes live in `wallet_states`; everything else (auto-freeze,
//! velocity counters) is derived from the ledger each time it is needed,
//! so counters never drift from what was actually committed.
//!
//! ## Windows
//! ```text
//! daily redemptions    [UTC midnight, now]
//! hourly spend         [top of the UTC hour, now]
//! auto-freeze          [now - 24h, now]       frozen when total > threshold
//! ```

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use wallet_core::velocity::{
    day_window_start, hour_window_start, rolling_day_start, FreezeState, VelocityLimits,
};
use wallet_core::{Direction, TransactionType, WalletLot};
use wallet_db::{Database, DbError, Period, SqliteConnection};

use crate::error::EngineResult;
use crate::locks::UserLocks;

/// Reads and changes a wallet's freeze state.
#[derive(Debug, Clone)]
pub struct Guard {
    db: Database,
    locks: UserLocks,
    limits: VelocityLimits,
}

impl Guard {
    pub fn new(db: Database, locks: UserLocks, limits: VelocityLimits) -> Self {
        Guard { db, locks, limits }
    }

    pub fn limits(&self) -> &VelocityLimits {
        &self.limits
    }

    /// Freeze flag and velocity counters read through `conn`.
    pub async fn freeze_state_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> EngineResult<FreezeState> {
        let ledger = self.db.ledger();

        let manual = self.db.wallet_states().get_in(conn, user_id).await?;
        let daily = ledger
            .count_since_in(conn, user_id, TransactionType::GiftCardRedeem, day_window_start(now))
            .await?;
        let hourly = ledger
            .sum_by_direction_in(conn, user_id, Direction::Debit, Period::since(hour_window_start(now)))
            .await?;
        let last_24h = ledger
            .sum_by_direction_in(conn, user_id, Direction::Debit, Period::since(rolling_day_start(now)))
            .await?;

        let (manually_frozen, reason) = match manual {
            Some(state) => (state.frozen, state.frozen_reason),
            None => (false, None),
        };

        Ok(FreezeState::evaluate(
            reason,
            manually_frozen,
            u32::try_from(daily).unwrap_or(u32::MAX),
            hourly.cents(),
            last_24h.cents(),
            &self.limits,
        ))
    }

    /// Current freeze state and counters.
    pub async fn freeze_state(&self, user_id: i64) -> EngineResult<FreezeState> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        self.freeze_state_in(&mut conn, user_id, Utc::now()).await
    }

    /// Manual freeze OR last-24h debits above the auto-freeze threshold.
    pub async fn is_frozen(&self, user_id: i64) -> EngineResult<bool> {
        Ok(self.freeze_state(user_id).await?.is_frozen())
    }

    /// Freezes the wallet. Idempotent.
    pub async fn freeze(&self, user_id: i64, reason: &str) -> EngineResult<FreezeState> {
        self.set_frozen(user_id, true, Some(reason)).await
    }

    /// Lifts a manual freeze. Idempotent; an auto-freeze stays in force
    /// until the rolling window drops below the threshold.
    pub async fn unfreeze(&self, user_id: i64) -> EngineResult<FreezeState> {
        self.set_frozen(user_id, false, None).await
    }

    async fn set_frozen(
        &self,
        user_id: i64,
        frozen: bool,
        reason: Option<&str>,
    ) -> EngineResult<FreezeState> {
        let _lock = self.locks.acquire(user_id).await?;
        let mut tx = self.db.begin().await?;

        self.db
            .wallet_states()
            .set_frozen(&mut tx, user_id, frozen, reason)
            .await?;
        let state = self.freeze_state_in(&mut tx, user_id, Utc::now()).await?;
        tx.commit().await?;

        if frozen {
            warn!(user_id, reason = reason.unwrap_or_default(), "Wallet frozen");
        } else {
            info!(user_id, still_frozen = state.is_frozen(), "Wallet unfrozen");
        }
        Ok(state)
    }

    /// Holds or releases a single lot. Frozen lots are not spendable.
    pub async fn set_lot_frozen(&self, lot_id: &str, frozen: bool) -> EngineResult<WalletLot> {
        let lot = self
            .db
            .lots()
            .get_by_id(lot_id)
            .await?
            .ok_or_else(|| DbError::not_found("Wallet lot", lot_id))?;

        let _lock = self.locks.acquire(lot.user_id).await?;
        let mut tx = self.db.begin().await?;
        self.db.wallet_states().claim(&mut tx, lot.user_id).await?;
        let updated = self.db.lots().set_frozen(&mut tx, lot_id, frozen).await?;
        tx.commit().await?;

        info!(lot_id, user_id = lot.user_id, status = %updated.status, "Lot freeze changed");
        Ok(updated)
    }
}
