use crate::core::commands::{
    cooldown::is_cooling_down, CooldownClaim, CooldownError, CooldownKey, CooldownStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Cooldown records in a concurrent map. The entry API holds the shard lock
/// for the whole check-and-set, which is what makes a claim atomic.
#[derive(Default)]
pub struct InMemoryCooldownStore {
    last_runs: DashMap<CooldownKey, DateTime<Utc>>,
}

impl InMemoryCooldownStore {
    pub fn new() -> Self {
        Self {
            last_runs: DashMap::new(),
        }
    }
}

#[async_trait]
impl CooldownStore for InMemoryCooldownStore {
    async fn try_claim(
        &self,
        key: &CooldownKey,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<CooldownClaim>, CooldownError> {
        match self.last_runs.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let previous = *entry.get();
                if is_cooling_down(previous, now, window) {
                    return Ok(None);
                }
                entry.insert(now);
                Ok(Some(CooldownClaim {
                    claimed_at: now,
                    previous: Some(previous),
                }))
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(Some(CooldownClaim {
                    claimed_at: now,
                    previous: None,
                }))
            }
        }
    }

    async fn release(&self, key: &CooldownKey, claim: CooldownClaim) -> Result<(), CooldownError> {
        if let Entry::Occupied(mut entry) = self.last_runs.entry(key.clone()) {
            // Someone claimed again after us; their record stays.
            if *entry.get() != claim.claimed_at {
                return Ok(());
            }
            match claim.previous {
                Some(previous) => {
                    entry.insert(previous);
                }
                None => {
                    entry.remove();
                }
            }
        }
        Ok(())
    }

    async fn last_run(&self, key: &CooldownKey) -> Result<Option<DateTime<Utc>>, CooldownError> {
        Ok(self.last_runs.get(key).map(|entry| *entry))
    }
}
