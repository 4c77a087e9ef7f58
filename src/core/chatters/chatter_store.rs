// Chatter directory - who has been seen in chat under which name.
//
// Commands take user names (`duel @someone 10`) but the ledger is keyed by
// platform user ID. The platform adapter records every author and every
// mentioned user here so names can be resolved back to IDs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chatter {
    pub user_id: String,
    pub display_name: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ChatterError {
    #[error("Storage error: {0}")]
    StorageError(String),
}

#[async_trait]
pub trait ChatterStore: Send + Sync {
    /// Insert or refresh a chatter. Names are matched case-insensitively.
    async fn remember(
        &self,
        user_id: &str,
        display_name: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ChatterError>;

    /// Look a chatter up by name. With several matches the most recently
    /// seen one wins.
    async fn find_by_name(&self, name: &str) -> Result<Option<Chatter>, ChatterError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Chatter>, ChatterError>;
}

/// Lookup key for a user name: without `@`, lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_start_matches('@').to_lowercase()
}
