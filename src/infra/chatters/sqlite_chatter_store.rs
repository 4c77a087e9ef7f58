use crate::infra::sqlite::{decode_ts, encode_ts};
use crate::core::chatters::{normalize_name, Chatter, ChatterError, ChatterStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

pub struct SqliteChatterStore {
    pool: SqlitePool,
}

fn storage(err: sqlx::Error) -> ChatterError {
    ChatterError::StorageError(err.to_string())
}

fn chatter_from_row(row: &SqliteRow) -> Result<Chatter, ChatterError> {
    let last_seen: String = row.try_get("last_seen").map_err(storage)?;
    Ok(Chatter {
        user_id: row.try_get("user_id").map_err(storage)?,
        display_name: row.try_get("display_name").map_err(storage)?,
        last_seen: decode_ts(&last_seen).map_err(ChatterError::StorageError)?,
    })
}

impl SqliteChatterStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), ChatterError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chatters (
                user_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                display_name TEXT NOT NULL,
                last_seen TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chatters_username ON chatters(username);")
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        Ok(())
    }
}

#[async_trait]
impl ChatterStore for SqliteChatterStore {
    async fn remember(
        &self,
        user_id: &str,
        display_name: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ChatterError> {
        sqlx::query(
            r#"
            INSERT INTO chatters (user_id, username, display_name, last_seen)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name,
                last_seen = MAX(chatters.last_seen, excluded.last_seen)
            "#,
        )
        .bind(user_id)
        .bind(normalize_name(display_name))
        .bind(display_name.trim().trim_start_matches('@'))
        .bind(encode_ts(seen_at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Chatter>, ChatterError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, display_name, last_seen FROM chatters
            WHERE username = ?
            ORDER BY last_seen DESC
            LIMIT 1
            "#,
        )
        .bind(normalize_name(name))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.as_ref().map(chatter_from_row).transpose()
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Chatter>, ChatterError> {
        let row = sqlx::query("SELECT user_id, display_name, last_seen FROM chatters WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(chatter_from_row).transpose()
    }
}
