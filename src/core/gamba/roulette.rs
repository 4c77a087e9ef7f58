use super::coin_flip::CoinFlip;
use super::ledger::{credited, GambaError, LedgerService, LedgerStore};
use std::sync::Arc;

pub const ROULETTE_GAME: &str = "Roulette";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouletteOutcome {
    InvalidAmount,
    InsufficientPoints { balance: i64 },
    /// A win would push the balance past `MAX_BALANCE`.
    OverLimit { balance: i64 },
    Won { amount: i64, balance: i64 },
    Lost { amount: i64, balance: i64 },
}

/// Double-or-nothing against the house.
pub struct RouletteService<S: LedgerStore> {
    ledger: LedgerService<S>,
    coin: Arc<dyn CoinFlip>,
}

impl<S: LedgerStore> RouletteService<S> {
    pub fn new(store: Arc<S>, coin: Arc<dyn CoinFlip>) -> Self {
        Self {
            ledger: LedgerService::new(store),
            coin,
        }
    }

    pub async fn spin(&self, user_id: &str, amount: i64) -> Result<RouletteOutcome, GambaError> {
        if amount < 1 {
            return Ok(RouletteOutcome::InvalidAmount);
        }

        let balance = self.ledger.balance_of(user_id).await?;
        if balance < amount {
            return Ok(RouletteOutcome::InsufficientPoints { balance });
        }

        let Some(if_won) = credited(balance, amount) else {
            return Ok(RouletteOutcome::OverLimit { balance });
        };

        let won = self.coin.flip();
        let delta = if won { amount } else { -amount };
        self.ledger
            .record_transaction(user_id, ROULETTE_GAME, delta)
            .await?;

        let balance = if won { if_won } else { balance - amount };
        tracing::info!(user_id, amount, won, balance, "Roulette spun");

        Ok(if won {
            RouletteOutcome::Won { amount, balance }
        } else {
            RouletteOutcome::Lost { amount, balance }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gamba::coin_flip::FixedCoinFlip;
    use crate::core::gamba::ledger::MAX_BALANCE;
    use crate::core::gamba::test_support::MemoryGambaStore;

    async fn seeded(balance: i64) -> Arc<MemoryGambaStore> {
        let store = Arc::new(MemoryGambaStore::new());
        LedgerService::new(store.clone())
            .record_transaction("alice", "Seed", balance)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn winning_spin_adds_amount() {
        let store = seeded(50).await;
        let roulette = RouletteService::new(store.clone(), Arc::new(FixedCoinFlip(true)));

        let outcome = roulette.spin("alice", 10).await.unwrap();
        assert_eq!(outcome, RouletteOutcome::Won { amount: 10, balance: 60 });

        let entries = store.entries_for("alice");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].delta, 10);
        assert_eq!(entries[1].game, ROULETTE_GAME);
    }

    #[tokio::test]
    async fn losing_spin_subtracts_amount() {
        let store = seeded(50).await;
        let roulette = RouletteService::new(store.clone(), Arc::new(FixedCoinFlip(false)));

        let outcome = roulette.spin("alice", 50).await.unwrap();
        assert_eq!(outcome, RouletteOutcome::Lost { amount: 50, balance: 0 });
    }

    #[tokio::test]
    async fn rejects_bets_without_cover() {
        let store = seeded(5).await;
        let roulette = RouletteService::new(store.clone(), Arc::new(FixedCoinFlip(true)));

        assert_eq!(
            roulette.spin("alice", 6).await.unwrap(),
            RouletteOutcome::InsufficientPoints { balance: 5 }
        );
        assert_eq!(roulette.spin("alice", 0).await.unwrap(), RouletteOutcome::InvalidAmount);
        assert_eq!(store.entries_for("alice").len(), 1);
    }

    #[tokio::test]
    async fn win_past_the_balance_limit_is_refused() {
        let store = seeded(MAX_BALANCE).await;
        let roulette = RouletteService::new(store.clone(), Arc::new(FixedCoinFlip(true)));

        assert_eq!(
            roulette.spin("alice", MAX_BALANCE).await.unwrap(),
            RouletteOutcome::OverLimit { balance: MAX_BALANCE }
        );
        assert_eq!(store.entries_for("alice").len(), 1);
        assert_eq!(store.balance_of("alice").await.unwrap(), MAX_BALANCE);
    }
}
