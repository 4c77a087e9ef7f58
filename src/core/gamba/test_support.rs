// In-memory ledger + duel store for core tests.

use super::duel_service::{Duel, DuelStore, NewDuel, DUEL_GAME};
use super::ledger::{BalanceRow, GambaError, LedgerEntry, LedgerStore, NewLedgerEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    entries: Vec<LedgerEntry>,
    duels: Vec<Duel>,
    /// user_id -> duel_id for every pending duel, like the SQLite lock table.
    participants: HashMap<String, i64>,
    /// Inserted right before the next `create`, as if proposed concurrently.
    interloper: Option<NewDuel>,
}

#[derive(Default)]
pub struct MemoryGambaStore {
    state: Mutex<State>,
}

impl MemoryGambaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries_for(&self, user_id: &str) -> Vec<LedgerEntry> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn all_entries(&self) -> Vec<LedgerEntry> {
        self.state.lock().unwrap().entries.clone()
    }

    pub fn duel_count(&self) -> usize {
        self.state.lock().unwrap().duels.len()
    }

    /// Make the next `create` lose a race against `duel`.
    pub fn slip_in_before_next_create(&self, duel: NewDuel) {
        self.state.lock().unwrap().interloper = Some(duel);
    }
}

fn push_entry(
    state: &mut State,
    user_id: &str,
    game: &str,
    delta: i64,
    at: DateTime<Utc>,
) -> LedgerEntry {
    let entry = LedgerEntry {
        id: state.entries.len() as i64 + 1,
        user_id: user_id.to_string(),
        game: game.to_string(),
        delta,
        created_at: at,
    };
    state.entries.push(entry.clone());
    entry
}

fn resolve(state: &mut State, duel_id: i64, accepted: bool, expired: bool, now: DateTime<Utc>) {
    if let Some(duel) = state.duels.iter_mut().find(|d| d.id == duel_id) {
        duel.pending = false;
        duel.accepted = accepted;
        duel.expired = expired;
        duel.resolved_at = Some(now);
    }
    state.participants.retain(|_, id| *id != duel_id);
}

fn insert_duel(state: &mut State, duel: NewDuel) -> Option<Duel> {
    if state.participants.contains_key(&duel.challenger_id)
        || state.participants.contains_key(&duel.target_id)
    {
        return None;
    }

    let stored = Duel {
        id: state.duels.len() as i64 + 1,
        channel: duel.channel,
        challenger_id: duel.challenger_id,
        challenger_name: duel.challenger_name,
        target_id: duel.target_id,
        target_name: duel.target_name,
        amount: duel.amount,
        created_at: duel.created_at,
        pending: true,
        accepted: false,
        expired: false,
        resolved_at: None,
    };
    state.participants.insert(stored.challenger_id.clone(), stored.id);
    state.participants.insert(stored.target_id.clone(), stored.id);
    state.duels.push(stored.clone());
    Some(stored)
}

fn live_against(state: &State, duel_id: i64, live_since: DateTime<Utc>) -> Option<&Duel> {
    state
        .duels
        .iter()
        .find(|d| d.id == duel_id && d.pending && d.created_at > live_since)
}

#[async_trait]
impl LedgerStore for MemoryGambaStore {
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, GambaError> {
        let mut state = self.state.lock().unwrap();
        Ok(push_entry(
            &mut state,
            &entry.user_id,
            &entry.game,
            entry.delta,
            entry.created_at,
        ))
    }

    async fn balance_of(&self, user_id: &str) -> Result<i64, GambaError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.delta)
            .sum())
    }

    async fn recent_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, GambaError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn top_balances(&self, limit: usize) -> Result<Vec<BalanceRow>, GambaError> {
        let state = self.state.lock().unwrap();
        let mut totals: HashMap<&str, i64> = HashMap::new();
        for entry in &state.entries {
            *totals.entry(entry.user_id.as_str()).or_default() += entry.delta;
        }
        let mut rows: Vec<BalanceRow> = totals
            .into_iter()
            .map(|(user_id, balance)| BalanceRow {
                user_id: user_id.to_string(),
                balance,
            })
            .collect();
        rows.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.user_id.cmp(&b.user_id)));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl DuelStore for MemoryGambaStore {
    async fn create(&self, duel: NewDuel) -> Result<Option<Duel>, GambaError> {
        let mut state = self.state.lock().unwrap();
        if let Some(interloper) = state.interloper.take() {
            insert_duel(&mut state, interloper);
        }
        Ok(insert_duel(&mut state, duel))
    }

    async fn get(&self, duel_id: i64) -> Result<Option<Duel>, GambaError> {
        let state = self.state.lock().unwrap();
        Ok(state.duels.iter().find(|d| d.id == duel_id).cloned())
    }

    async fn pending_for(
        &self,
        user_id: &str,
        live_since: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .duels
            .iter()
            .find(|d| d.pending && d.created_at > live_since && d.involves(user_id))
            .cloned())
    }

    async fn pending_against(
        &self,
        target_id: &str,
        live_since: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .duels
            .iter()
            .find(|d| d.pending && d.created_at > live_since && d.target_id == target_id)
            .cloned())
    }

    async fn settle(
        &self,
        duel: &Duel,
        winner_id: &str,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, GambaError> {
        let mut state = self.state.lock().unwrap();
        let Some(live) = live_against(&state, duel.id, live_since).cloned() else {
            return Ok(false);
        };

        let loser_id = if live.challenger_id == winner_id {
            live.target_id.clone()
        } else {
            live.challenger_id.clone()
        };
        resolve(&mut state, live.id, true, false, now);
        push_entry(&mut state, winner_id, DUEL_GAME, live.amount, now);
        push_entry(&mut state, &loser_id, DUEL_GAME, -live.amount, now);
        Ok(true)
    }

    async fn decline(
        &self,
        duel_id: i64,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, GambaError> {
        let mut state = self.state.lock().unwrap();
        if live_against(&state, duel_id, live_since).is_none() {
            return Ok(false);
        }
        resolve(&mut state, duel_id, false, false, now);
        Ok(true)
    }

    async fn expire_stale(
        &self,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Duel>, GambaError> {
        let mut state = self.state.lock().unwrap();
        let stale: Vec<i64> = state
            .duels
            .iter()
            .filter(|d| d.pending && d.created_at <= live_since)
            .map(|d| d.id)
            .collect();

        for id in &stale {
            resolve(&mut state, *id, false, true, now);
        }
        Ok(state
            .duels
            .iter()
            .filter(|d| stale.contains(&d.id))
            .cloned()
            .collect())
    }
}
