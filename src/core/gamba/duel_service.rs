// Duels - two-party wagers settled by a coin flip.
//
// A duel starts out Proposed and ends in exactly one of Accepted, Declined
// or Expired. Only the target can accept or decline, and only within the
// acceptance window. A user takes part in at most one Proposed duel at a
// time, as challenger or as target.
//
// Expiry is lazy: every lookup only considers duels created inside the
// window, and proposing sweeps stale rows first. A background sweeper can
// call `expire_stale` as well so channels get told about timed-out duels.

use super::coin_flip::CoinFlip;
use super::ledger::{credited, GambaError, LedgerService, LedgerStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub const DUEL_GAME: &str = "Duel";

// ============================================================================
// DOMAIN MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuelState {
    Proposed,
    Accepted,
    Declined,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duel {
    pub id: i64,
    /// Where the duel was proposed, for result and expiry notices.
    pub channel: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub target_id: String,
    pub target_name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub pending: bool,
    pub accepted: bool,
    /// Declined and Expired both end with `pending = accepted = false`.
    pub expired: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Duel {
    pub fn state(&self) -> DuelState {
        match (self.pending, self.accepted, self.expired) {
            (true, _, _) => DuelState::Proposed,
            (false, true, _) => DuelState::Accepted,
            (false, false, true) => DuelState::Expired,
            (false, false, false) => DuelState::Declined,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.challenger_id == user_id || self.target_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDuel {
    pub channel: String,
    pub challenger_id: String,
    pub challenger_name: String,
    pub target_id: String,
    pub target_name: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Someone taking part in a duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposeOutcome {
    Proposed(Duel),
    SelfDuel,
    InvalidAmount,
    ChallengerPending,
    TargetPending,
    ChallengerInsufficient { balance: i64 },
    TargetInsufficient { balance: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelSettlement {
    pub duel: Duel,
    pub winner: Participant,
    pub loser: Participant,
    pub amount: i64,
    pub winner_balance: i64,
    pub loser_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    NonePending,
    Settled(DuelSettlement),
    /// `short` spent points since the proposal. The duel is resolved as
    /// declined.
    NoLongerCovered { duel: Duel, short: Participant },
    /// Winning would push `capped` past `MAX_BALANCE`. Resolved as declined.
    OverLimit { duel: Duel, capped: Participant },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineOutcome {
    NonePending,
    Declined(Duel),
}

#[derive(Debug, Clone)]
pub struct DuelConfig {
    /// How long the target has to accept or decline.
    pub acceptance_window: Duration,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            acceptance_window: Duration::seconds(30),
        }
    }
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Persistence for duel records.
///
/// Every `live_since` argument is the creation cutoff of the acceptance
/// window: rows created at or before it count as expired even while they
/// still say `pending`.
#[async_trait]
pub trait DuelStore: Send + Sync {
    /// Insert a Proposed duel. Returns `None` if either participant already
    /// holds a pending duel, as enforced by the store.
    async fn create(&self, duel: NewDuel) -> Result<Option<Duel>, GambaError>;

    async fn get(&self, duel_id: i64) -> Result<Option<Duel>, GambaError>;

    /// The live Proposed duel involving `user_id` in either role.
    async fn pending_for(
        &self,
        user_id: &str,
        live_since: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError>;

    /// The live Proposed duel with `target_id` as target.
    async fn pending_against(
        &self,
        target_id: &str,
        live_since: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError>;

    /// Atomically mark `duel` accepted and append the two ledger entries.
    /// Returns false, changing nothing, if the duel is no longer live.
    async fn settle(
        &self,
        duel: &Duel,
        winner_id: &str,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, GambaError>;

    /// Mark a live duel declined. Returns false if it is no longer live.
    async fn decline(
        &self,
        duel_id: i64,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, GambaError>;

    /// Resolve every pending duel created at or before `live_since` as
    /// Expired and return them.
    async fn expire_stale(
        &self,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Duel>, GambaError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct DuelService<S: DuelStore + LedgerStore> {
    store: Arc<S>,
    ledger: LedgerService<S>,
    coin: Arc<dyn CoinFlip>,
    config: DuelConfig,
}

impl<S: DuelStore + LedgerStore> DuelService<S> {
    pub fn new(store: Arc<S>, coin: Arc<dyn CoinFlip>) -> Self {
        Self::new_with_config(store, coin, DuelConfig::default())
    }

    pub fn new_with_config(store: Arc<S>, coin: Arc<dyn CoinFlip>, config: DuelConfig) -> Self {
        Self {
            ledger: LedgerService::new(store.clone()),
            store,
            coin,
            config,
        }
    }

    pub fn acceptance_window(&self) -> Duration {
        self.config.acceptance_window
    }

    fn live_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.acceptance_window
    }

    /// `challenger` challenges `target` for `amount` points.
    pub async fn propose(
        &self,
        channel: &str,
        challenger: &Participant,
        target: &Participant,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<ProposeOutcome, GambaError> {
        if challenger.id == target.id {
            return Ok(ProposeOutcome::SelfDuel);
        }
        if amount < 1 {
            return Ok(ProposeOutcome::InvalidAmount);
        }

        // Stale rows still hold their participants' slots until resolved.
        // Nothing announces the ones resolved here.
        self.expire_stale(now).await?;

        let live_since = self.live_since(now);
        if let Some(conflict) = self.conflict(challenger, target, live_since).await? {
            return Ok(conflict);
        }

        let balance = self.ledger.balance_of(&challenger.id).await?;
        if balance < amount {
            return Ok(ProposeOutcome::ChallengerInsufficient { balance });
        }
        let target_balance = self.ledger.balance_of(&target.id).await?;
        if target_balance < amount {
            return Ok(ProposeOutcome::TargetInsufficient {
                balance: target_balance,
            });
        }

        let created = self
            .store
            .create(NewDuel {
                channel: channel.to_string(),
                challenger_id: challenger.id.clone(),
                challenger_name: challenger.name.clone(),
                target_id: target.id.clone(),
                target_name: target.name.clone(),
                amount,
                created_at: now,
            })
            .await?;

        match created {
            Some(duel) => {
                info!(
                    duel_id = duel.id,
                    challenger_id = %duel.challenger_id,
                    target_id = %duel.target_id,
                    amount,
                    "Duel proposed"
                );
                Ok(ProposeOutcome::Proposed(duel))
            }
            // Lost a race against a concurrent proposal.
            None => Ok(self
                .conflict(challenger, target, live_since)
                .await?
                .unwrap_or(ProposeOutcome::ChallengerPending)),
        }
    }

    /// Which side already holds a live duel, challenger first.
    async fn conflict(
        &self,
        challenger: &Participant,
        target: &Participant,
        live_since: DateTime<Utc>,
    ) -> Result<Option<ProposeOutcome>, GambaError> {
        if self.store.pending_for(&challenger.id, live_since).await?.is_some() {
            return Ok(Some(ProposeOutcome::ChallengerPending));
        }
        if self.store.pending_for(&target.id, live_since).await?.is_some() {
            return Ok(Some(ProposeOutcome::TargetPending));
        }
        Ok(None)
    }

    /// `caller` accepts the duel pending against them.
    pub async fn accept(
        &self,
        caller: &Participant,
        now: DateTime<Utc>,
    ) -> Result<AcceptOutcome, GambaError> {
        let live_since = self.live_since(now);
        let Some(duel) = self.store.pending_against(&caller.id, live_since).await? else {
            return Ok(AcceptOutcome::NonePending);
        };

        let challenger = Participant::new(duel.challenger_id.clone(), duel.challenger_name.clone());
        let target = Participant::new(duel.target_id.clone(), duel.target_name.clone());

        // Either side may have spent points since the proposal.
        for party in [&challenger, &target] {
            let balance = self.ledger.balance_of(&party.id).await?;
            let covered = balance >= duel.amount;
            if covered && credited(balance, duel.amount).is_some() {
                continue;
            }

            if !self.store.decline(duel.id, live_since, now).await? {
                return Ok(AcceptOutcome::NonePending);
            }
            info!(duel_id = duel.id, user_id = %party.id, balance, "Duel called off at accept");

            let party = party.clone();
            let duel = self.store.get(duel.id).await?.unwrap_or(duel);
            return Ok(if covered {
                AcceptOutcome::OverLimit { duel, capped: party }
            } else {
                AcceptOutcome::NoLongerCovered { duel, short: party }
            });
        }

        let (winner, loser) = if self.coin.flip() {
            (challenger, target)
        } else {
            (target, challenger)
        };

        if !self.store.settle(&duel, &winner.id, live_since, now).await? {
            // Someone else resolved it between our read and write.
            return Ok(AcceptOutcome::NonePending);
        }

        let winner_balance = self.ledger.balance_of(&winner.id).await?;
        let loser_balance = self.ledger.balance_of(&loser.id).await?;

        info!(
            duel_id = duel.id,
            winner_id = %winner.id,
            loser_id = %loser.id,
            amount = duel.amount,
            "Duel settled"
        );

        let amount = duel.amount;
        let duel = self.store.get(duel.id).await?.ok_or_else(|| {
            GambaError::InvariantViolation(format!("settled duel {} disappeared", duel.id))
        })?;

        Ok(AcceptOutcome::Settled(DuelSettlement {
            duel,
            winner,
            loser,
            amount,
            winner_balance,
            loser_balance,
        }))
    }

    /// `caller` turns down the duel pending against them.
    pub async fn decline(
        &self,
        caller: &Participant,
        now: DateTime<Utc>,
    ) -> Result<DeclineOutcome, GambaError> {
        let live_since = self.live_since(now);
        let Some(duel) = self.store.pending_against(&caller.id, live_since).await? else {
            return Ok(DeclineOutcome::NonePending);
        };

        if !self.store.decline(duel.id, live_since, now).await? {
            return Ok(DeclineOutcome::NonePending);
        }

        info!(duel_id = duel.id, target_id = %duel.target_id, "Duel declined");
        let duel = self.store.get(duel.id).await?.unwrap_or(duel);
        Ok(DeclineOutcome::Declined(duel))
    }

    /// The live duel `user_id` takes part in, if any.
    pub async fn pending_for(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError> {
        self.store.pending_for(user_id, self.live_since(now)).await
    }

    /// Resolve all duels whose window has run out. No ledger effect.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Result<Vec<Duel>, GambaError> {
        let expired = self.store.expire_stale(self.live_since(now), now).await?;
        for duel in &expired {
            info!(duel_id = duel.id, "Duel expired");
        }
        Ok(expired)
    }
}
