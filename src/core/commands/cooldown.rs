use super::command_models::CooldownKey;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CooldownError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Proof that a cooldown window was claimed, used to roll the claim back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownClaim {
    pub claimed_at: DateTime<Utc>,
    /// `last_run` before this claim, `None` if the record did not exist.
    pub previous: Option<DateTime<Utc>>,
}

/// Storage for cooldown records.
///
/// `try_claim` must be atomic per key: of two concurrent claims inside one
/// window, at most one may succeed.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Set `last_run = now` if `now - last_run >= window` (or there is no
    /// record yet). Returns `None` while the window is still running.
    async fn try_claim(
        &self,
        key: &CooldownKey,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<CooldownClaim>, CooldownError>;

    /// Undo `claim`, restoring the previous `last_run`. Does nothing if the
    /// record has been claimed again since.
    async fn release(&self, key: &CooldownKey, claim: CooldownClaim) -> Result<(), CooldownError>;

    async fn last_run(&self, key: &CooldownKey) -> Result<Option<DateTime<Utc>>, CooldownError>;
}

/// True while `last_run + window` lies in the future relative to `now`.
pub fn is_cooling_down(last_run: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(last_run) < window
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_boundary_is_exclusive() {
        let start = Utc::now();
        let window = Duration::seconds(5);

        assert!(is_cooling_down(start, start, window));
        assert!(is_cooling_down(start, start + Duration::milliseconds(4_999), window));
        assert!(!is_cooling_down(start, start + window, window));
    }

    #[test]
    fn clock_going_backwards_still_counts_as_cooling_down() {
        let start = Utc::now();
        assert!(is_cooling_down(start, start - Duration::seconds(1), Duration::seconds(5)));
    }
}
