//! # Balance Queries
//!
//! Read-side projections. Nothing here is cached: every call reads the
//! lots as they are now.

use chrono::{DateTime, Utc};

use wallet_core::balance::{
    self, BalanceBreakdown, LedgerEntry, LotBalance, MonthlySummary, Reconciliation,
    TransactionFilter,
};
use wallet_core::{Money, Paginated, PaginationParams};
use wallet_db::Database;

use crate::error::EngineResult;

/// Balance, lot and ledger views of a wallet.
#[derive(Debug, Clone)]
pub struct BalanceService {
    db: Database,
}

impl BalanceService {
    pub fn new(db: Database) -> Self {
        BalanceService { db }
    }

    /// Sum of remaining value over lots spendable at `as_of`.
    pub async fn available_balance(&self, user_id: i64, as_of: DateTime<Utc>) -> EngineResult<Money> {
        let lots = self.db.lots().list_spendable(user_id, as_of).await?;
        Ok(balance::available_balance(&lots, as_of))
    }

    /// Spendable total with each lot in consumption order.
    pub async fn breakdown(&self, user_id: i64) -> EngineResult<BalanceBreakdown> {
        let now = Utc::now();
        let lots = self.db.lots().list_spendable(user_id, now).await?;
        Ok(balance::breakdown(lots, now))
    }

    /// Spendable lots that expire within `within_days`.
    pub async fn expiring_lots(&self, user_id: i64, within_days: i64) -> EngineResult<Vec<LotBalance>> {
        let now = Utc::now();
        let lots = self.db.lots().list_spendable(user_id, now).await?;
        Ok(balance::expiring_within(lots, now, within_days))
    }

    /// Cross-checks lots against lot-linked ledger entries.
    ///
    /// Both sides are read in one transaction so a concurrent write can't
    /// show up on only one of them.
    pub async fn reconcile(&self, user_id: i64) -> EngineResult<Reconciliation> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let lots = self.db.lots().list_for_user_in(&mut tx, user_id).await?;
        let ledger = self.db.ledger().list_lot_linked_in(&mut tx, user_id).await?;
        tx.rollback().await?;

        Ok(balance::reconcile(&lots, &ledger, now))
    }

    /// Newest-first ledger page with running balances.
    pub async fn transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
        params: PaginationParams,
    ) -> EngineResult<Paginated<LedgerEntry>> {
        Ok(self.db.ledger().list_for_user(user_id, filter, params).await?)
    }

    /// Credits and debits of one UTC month.
    pub async fn monthly_summary(&self, user_id: i64, year: i32, month: u32) -> EngineResult<MonthlySummary> {
        Ok(self.db.ledger().monthly_summary(user_id, year, month).await?)
    }
}
