// SQLite implementation of the CooldownStore trait.
//
// Claims are compare-and-set updates against the value read just before,
// so two bot processes sharing a database still fire at most once.

use crate::infra::sqlite::{decode_ts, encode_ts};
use crate::core::commands::{
    cooldown::is_cooling_down, CooldownClaim, CooldownError, CooldownKey, CooldownStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

pub struct SqliteCooldownStore {
    pool: SqlitePool,
}

fn storage(err: sqlx::Error) -> CooldownError {
    CooldownError::StorageError(err.to_string())
}

impl SqliteCooldownStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), CooldownError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS command_cooldowns (
                kind TEXT NOT NULL,
                command TEXT NOT NULL,
                subject TEXT NOT NULL,
                last_run TEXT NOT NULL,
                PRIMARY KEY (kind, command, subject)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    /// Replace `expected` with `next` (either may be absent). Returns whether
    /// the record still held `expected`.
    async fn compare_and_set(
        &self,
        key: &CooldownKey,
        expected: Option<DateTime<Utc>>,
        next: Option<DateTime<Utc>>,
    ) -> Result<bool, CooldownError> {
        let query = match (expected, next) {
            (None, Some(next)) => sqlx::query(
                r#"
                INSERT INTO command_cooldowns (kind, command, subject, last_run)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (kind, command, subject) DO NOTHING
                "#,
            )
            .bind(key.kind.as_str())
            .bind(&key.command)
            .bind(&key.subject)
            .bind(encode_ts(next)),
            (Some(expected), Some(next)) => sqlx::query(
                r#"
                UPDATE command_cooldowns SET last_run = ?
                WHERE kind = ? AND command = ? AND subject = ? AND last_run = ?
                "#,
            )
            .bind(encode_ts(next))
            .bind(key.kind.as_str())
            .bind(&key.command)
            .bind(&key.subject)
            .bind(encode_ts(expected)),
            (Some(expected), None) => sqlx::query(
                r#"
                DELETE FROM command_cooldowns
                WHERE kind = ? AND command = ? AND subject = ? AND last_run = ?
                "#,
            )
            .bind(key.kind.as_str())
            .bind(&key.command)
            .bind(&key.subject)
            .bind(encode_ts(expected)),
            (None, None) => return Ok(true),
        };

        let affected = query
            .execute(&self.pool)
            .await
            .map_err(storage)?
            .rows_affected();
        Ok(affected == 1)
    }
}

#[async_trait]
impl CooldownStore for SqliteCooldownStore {
    async fn try_claim(
        &self,
        key: &CooldownKey,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<CooldownClaim>, CooldownError> {
        let previous = self.last_run(key).await?;
        if let Some(last_run) = previous {
            if is_cooling_down(last_run, now, window) {
                return Ok(None);
            }
        }

        // Losing the race means another invocation just claimed the window.
        if !self.compare_and_set(key, previous, Some(now)).await? {
            return Ok(None);
        }

        Ok(Some(CooldownClaim {
            claimed_at: now,
            previous,
        }))
    }

    async fn release(&self, key: &CooldownKey, claim: CooldownClaim) -> Result<(), CooldownError> {
        self.compare_and_set(key, Some(claim.claimed_at), claim.previous)
            .await?;
        Ok(())
    }

    async fn last_run(&self, key: &CooldownKey) -> Result<Option<DateTime<Utc>>, CooldownError> {
        let row = sqlx::query(
            r#"
            SELECT last_run FROM command_cooldowns
            WHERE kind = ? AND command = ? AND subject = ?
            "#,
        )
        .bind(key.kind.as_str())
        .bind(&key.command)
        .bind(&key.subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("last_run").map_err(storage)?;
                decode_ts(&raw)
                    .map(Some)
                    .map_err(CooldownError::StorageError)
            }
            None => Ok(None),
        }
    }
}
