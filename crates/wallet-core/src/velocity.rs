//! # Velocity & Freeze Rules
//!
//! Time windows and the derived freeze state of a wallet.
//!
//! ## Windows (all UTC)
//! ```text
//! daily redemptions   [00:00 today, now]        calendar day
//! hourly spend        [hh:00, now]              calendar hour
//! auto-freeze debits  [now - 24h, now]          rolling
//! ```
//!
//! Every counter is computed from ledger entries, so a crash between two
//! operations can never leave a stale counter behind.

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WalletError, WalletResult};
use crate::money::Money;

/// Start of the UTC calendar day containing `now`.
pub fn day_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}

/// Start of the UTC hour containing `now`.
pub fn hour_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.duration_trunc(Duration::hours(1)).unwrap_or(now)
}

/// Start of the rolling auto-freeze window.
pub fn rolling_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(24)
}

/// Thresholds applied by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityLimits {
    pub max_daily_redemptions: u32,
    pub max_hourly_spend_cents: i64,
    pub auto_freeze_threshold_cents: i64,
}

/// Manual flag plus the counters the guard derives from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FreezeState {
    pub manually_frozen: bool,
    pub frozen_reason: Option<String>,
    /// Last-24h debits exceeded the auto-freeze threshold.
    pub auto_frozen: bool,
    pub daily_redemption_count: u32,
    pub hourly_spend_cents: i64,
    pub last_24h_debit_cents: i64,
}

impl FreezeState {
    /// Builds the state from raw counters.
    pub fn evaluate(
        manual_reason: Option<String>,
        manually_frozen: bool,
        daily_redemption_count: u32,
        hourly_spend_cents: i64,
        last_24h_debit_cents: i64,
        limits: &VelocityLimits,
    ) -> Self {
        FreezeState {
            manually_frozen,
            frozen_reason: manual_reason,
            auto_frozen: last_24h_debit_cents > limits.auto_freeze_threshold_cents,
            daily_redemption_count,
            hourly_spend_cents,
            last_24h_debit_cents,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.manually_frozen || self.auto_frozen
    }

    fn frozen_error(&self, user_id: i64) -> WalletError {
        let reason = if self.manually_frozen {
            self.frozen_reason
                .clone()
                .unwrap_or_else(|| "frozen by administrator".to_string())
        } else {
            format!(
                "automatic freeze after {} spent in 24h",
                Money::from_cents(self.last_24h_debit_cents)
            )
        };
        WalletError::WalletFrozen { user_id, reason }
    }

    /// Gate for gift card redemption.
    pub fn check_redemption(&self, user_id: i64, limits: &VelocityLimits) -> WalletResult<()> {
        if self.is_frozen() {
            return Err(self.frozen_error(user_id));
        }
        if self.daily_redemption_count >= limits.max_daily_redemptions {
            return Err(WalletError::rate_limited(format!(
                "{} redemptions today, limit {}",
                self.daily_redemption_count, limits.max_daily_redemptions
            )));
        }
        Ok(())
    }

    /// Gate for debits: the debit itself must fit in the hourly budget.
    pub fn check_spend(
        &self,
        user_id: i64,
        amount: Money,
        limits: &VelocityLimits,
    ) -> WalletResult<()> {
        if self.is_frozen() {
            return Err(self.frozen_error(user_id));
        }
        let after = self.hourly_spend_cents + amount.cents();
        if after > limits.max_hourly_spend_cents {
            return Err(WalletError::rate_limited(format!(
                "hourly spend would reach {}, limit {}",
                Money::from_cents(after),
                Money::from_cents(limits.max_hourly_spend_cents)
            )));
        }
        Ok(())
    }

    /// Frozen wallets accept neither credits nor debits.
    pub fn ensure_not_frozen(&self, user_id: i64) -> WalletResult<()> {
        if self.is_frozen() {
            return Err(self.frozen_error(user_id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
