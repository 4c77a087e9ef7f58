// Points ledger - the append-only source of truth for user balances.
//
// There is no balance column anywhere. A balance is always the sum of the
// user's entries, so two handlers crediting the same user at once can never
// lose each other's update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Highest balance a credit may produce. With every balance held below it,
/// no running sum of a user's entries can leave the i64 range.
pub const MAX_BALANCE: i64 = 1_000_000_000_000_000;

/// `balance + delta`, or `None` if that would pass `MAX_BALANCE`.
pub fn credited(balance: i64, delta: i64) -> Option<i64> {
    balance.checked_add(delta).filter(|total| *total <= MAX_BALANCE)
}

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// One immutable row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Assigned by the store, increasing with insertion order.
    pub id: i64,
    pub user_id: String,
    /// Which command produced the entry, e.g. "Roulette" or "Duel".
    pub game: String,
    pub delta: i64,
    pub created_at: DateTime<Utc>,
}

/// An entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub user_id: String,
    pub game: String,
    pub delta: i64,
    pub created_at: DateTime<Utc>,
}

/// A row of the points leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRow {
    pub user_id: String,
    pub balance: i64,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum GambaError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Duel invariant violated: {0}")]
    InvariantViolation(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append one entry. Never validates business rules.
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, GambaError>;

    /// Sum of all deltas for the user, 0 if there are none.
    async fn balance_of(&self, user_id: &str) -> Result<i64, GambaError>;

    /// Most recent entries first.
    async fn recent_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, GambaError>;

    /// Users with the highest balances, highest first.
    async fn top_balances(&self, limit: usize) -> Result<Vec<BalanceRow>, GambaError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct LedgerService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> LedgerService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append a signed delta for `user_id`.
    ///
    /// Callers check balances themselves before debiting. Reading a balance
    /// and appending later is best-effort, not serializable.
    pub async fn record_transaction(
        &self,
        user_id: &str,
        game: &str,
        delta: i64,
    ) -> Result<LedgerEntry, GambaError> {
        let entry = self
            .store
            .append(NewLedgerEntry {
                user_id: user_id.to_string(),
                game: game.to_string(),
                delta,
                created_at: Utc::now(),
            })
            .await?;

        tracing::debug!(
            user_id = %entry.user_id,
            game = %entry.game,
            delta = entry.delta,
            entry_id = entry.id,
            "Ledger entry recorded"
        );
        Ok(entry)
    }

    pub async fn balance_of(&self, user_id: &str) -> Result<i64, GambaError> {
        self.store.balance_of(user_id).await
    }

    pub async fn recent_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, GambaError> {
        self.store.recent_entries(user_id, limit).await
    }

    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<BalanceRow>, GambaError> {
        self.store.top_balances(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gamba::test_support::MemoryGambaStore;

    #[tokio::test]
    async fn balance_is_sum_of_deltas() {
        let store = Arc::new(MemoryGambaStore::new());
        let ledger = LedgerService::new(store);

        let deltas = [50, -20, 7, -37, 100];
        for (i, delta) in deltas.iter().enumerate() {
            ledger.record_transaction("alice", "Test", *delta).await.unwrap();
            // Interleave another user's entries.
            ledger.record_transaction("bob", "Test", i as i64).await.unwrap();
        }

        assert_eq!(ledger.balance_of("alice").await.unwrap(), deltas.iter().sum::<i64>());
        assert_eq!(ledger.balance_of("bob").await.unwrap(), 10);
        assert_eq!(ledger.balance_of("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn entry_ids_increase() {
        let store = Arc::new(MemoryGambaStore::new());
        let ledger = LedgerService::new(store);

        let first = ledger.record_transaction("alice", "Test", 1).await.unwrap();
        let second = ledger.record_transaction("alice", "Test", 1).await.unwrap();
        assert!(second.id > first.id);

        let recent = ledger.recent_entries("alice", 10).await.unwrap();
        assert_eq!(recent[0].id, second.id);
    }

    #[tokio::test]
    async fn ledger_allows_going_negative() {
        let store = Arc::new(MemoryGambaStore::new());
        let ledger = LedgerService::new(store);

        ledger.record_transaction("alice", "Test", -5).await.unwrap();
        assert_eq!(ledger.balance_of("alice").await.unwrap(), -5);
    }

    #[test]
    fn credits_stop_at_the_balance_limit() {
        assert_eq!(credited(10, 5), Some(15));
        assert_eq!(credited(MAX_BALANCE - 1, 1), Some(MAX_BALANCE));
        assert_eq!(credited(MAX_BALANCE, 1), None);
        assert_eq!(credited(1, i64::MAX), None);
        assert_eq!(credited(10, -10), Some(0));
    }
}
