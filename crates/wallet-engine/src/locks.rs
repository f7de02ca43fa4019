//! # Per-user Lock Registry
//!
//! Every balance-mutating operation holds its user's lock for the whole
//! unit of work. Different users never contend here.
//!
//! ```text
//!   deduct(7, 60) ──► acquire(7) ──► BEGIN … COMMIT ──► release
//!   deduct(7, 60) ──► acquire(7) … waits … ──► sees the first debit
//!   deduct(9, 10) ──► acquire(9) ──► runs in parallel
//! ```

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use wallet_core::WalletError;

/// Held for the duration of a unit of work; dropping it releases the user.
pub type UserLockGuard = OwnedMutexGuard<()>;

/// Registry of one async mutex per wallet owner.
#[derive(Debug, Clone)]
pub struct UserLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl UserLocks {
    pub fn new(timeout: Duration) -> Self {
        UserLocks {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Waits for the user's lock, at most the configured timeout.
    ///
    /// ## Errors
    /// - `Busy` when the timeout elapses first
    pub async fn acquire(&self, user_id: i64) -> Result<UserLockGuard, WalletError> {
        // Clone the mutex out so no map shard stays locked across the await
        let lock = {
            let entry = self
                .locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(entry.value())
        };

        match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!(user_id, timeout_ms = self.timeout.as_millis() as u64, "User lock timed out");
                Err(WalletError::Busy { user_id })
            }
        }
    }

    /// Drops registry entries nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let locks = UserLocks::new(Duration::from_millis(50));

        let held = locks.acquire(1).await.unwrap();
        let err = locks.acquire(1).await.unwrap_err();
        assert_eq!(err, WalletError::Busy { user_id: 1 });

        // Other users are independent
        let other = locks.acquire(2).await.unwrap();
        drop(other);

        drop(held);
        assert!(locks.acquire(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = UserLocks::new(Duration::from_millis(50));

        let held = locks.acquire(1).await.unwrap();
        drop(locks.acquire(2).await.unwrap());
        assert_eq!(locks.len(), 2);

        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }
}
