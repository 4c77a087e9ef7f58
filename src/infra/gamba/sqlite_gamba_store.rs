// SQLite implementation of the LedgerStore and DuelStore traits.
//
// Tables:
// - ledger_entries: append-only point deltas
// - duels: every duel ever proposed
// - duel_participants: one row per user in a pending duel. The primary key
//   is what enforces "at most one pending duel per user".

use crate::infra::sqlite::{decode_ts, encode_ts};
use crate::core::gamba::{
    BalanceRow, Duel, DuelStore, GambaError, LedgerEntry, LedgerStore, NewDuel, NewLedgerEntry,
    DUEL_GAME,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

const DUEL_COLUMNS: &str = "id, channel, challenger_id, challenger_name, target_id, target_name, \
     amount, created_at, pending, accepted, expired, resolved_at";

pub struct SqliteGambaStore {
    pool: SqlitePool,
}

fn storage(err: sqlx::Error) -> GambaError {
    GambaError::StorageError(err.to_string())
}

fn ts_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, GambaError> {
    let raw: String = row.try_get(column).map_err(storage)?;
    decode_ts(&raw).map_err(GambaError::StorageError)
}

fn entry_from_row(row: &SqliteRow) -> Result<LedgerEntry, GambaError> {
    Ok(LedgerEntry {
        id: row.try_get("id").map_err(storage)?,
        user_id: row.try_get("user_id").map_err(storage)?,
        game: row.try_get("game").map_err(storage)?,
        delta: row.try_get("delta").map_err(storage)?,
        created_at: ts_column(row, "created_at")?,
    })
}

fn duel_from_row(row: &SqliteRow) -> Result<Duel, GambaError> {
    let resolved_at: Option<String> = row.try_get("resolved_at").map_err(storage)?;
    let resolved_at = resolved_at
        .map(|raw| decode_ts(&raw))
        .transpose()
        .map_err(GambaError::StorageError)?;

    Ok(Duel {
        id: row.try_get("id").map_err(storage)?,
        channel: row.try_get("channel").map_err(storage)?,
        challenger_id: row.try_get("challenger_id").map_err(storage)?,
        challenger_name: row.try_get("challenger_name").map_err(storage)?,
        target_id: row.try_get("target_id").map_err(storage)?,
        target_name: row.try_get("target_name").map_err(storage)?,
        amount: row.try_get("amount").map_err(storage)?,
        created_at: ts_column(row, "created_at")?,
        pending: row.try_get("pending").map_err(storage)?,
        accepted: row.try_get("accepted").map_err(storage)?,
        expired: row.try_get("expired").map_err(storage)?,
        resolved_at,
    })
}

/// At most one pending duel per user. More than one means the lock table
/// was bypassed, which is a bug worth failing loudly for.
fn single_pending(user_id: &str, rows: Vec<SqliteRow>) -> Result<Option<Duel>, GambaError> {
    if rows.len() > 1 {
        return Err(GambaError::InvariantViolation(format!(
            "user {} has {} pending duels",
            user_id,
            rows.len()
        )));
    }
    rows.first().map(duel_from_row).transpose()
}

impl SqliteGambaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), GambaError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                game TEXT NOT NULL,
                delta INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ledger_entries_user
                ON ledger_entries(user_id, id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS duels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL,
                challenger_id TEXT NOT NULL,
                challenger_name TEXT NOT NULL,
                target_id TEXT NOT NULL,
                target_name TEXT NOT NULL,
                amount INTEGER NOT NULL CHECK (amount > 0),
                created_at TEXT NOT NULL,
                pending BOOLEAN NOT NULL DEFAULT 1,
                accepted BOOLEAN NOT NULL DEFAULT 0,
                expired BOOLEAN NOT NULL DEFAULT 0,
                resolved_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_duels_pending
                ON duels(pending, created_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS duel_participants (
                user_id TEXT PRIMARY KEY,
                duel_id INTEGER NOT NULL REFERENCES duels(id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteGambaStore {
    async fn append(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, GambaError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, game, delta, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&entry.user_id)
        .bind(&entry.game)
        .bind(entry.delta)
        .bind(encode_ts(entry.created_at))
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(LedgerEntry {
            id: result.last_insert_rowid(),
            user_id: entry.user_id,
            game: entry.game,
            delta: entry.delta,
            created_at: entry.created_at,
        })
    }

    async fn balance_of(&self, user_id: &str) -> Result<i64, GambaError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(delta), 0) AS balance FROM ledger_entries WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        row.try_get::<i64, _>("balance").map_err(storage)
    }

    async fn recent_entries(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>, GambaError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, game, delta, created_at
            FROM ledger_entries
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn top_balances(&self, limit: usize) -> Result<Vec<BalanceRow>, GambaError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, SUM(delta) AS balance
            FROM ledger_entries
            GROUP BY user_id
            ORDER BY balance DESC, user_id ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                Ok(BalanceRow {
                    user_id: row.try_get("user_id").map_err(storage)?,
                    balance: row.try_get("balance").map_err(storage)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl DuelStore for SqliteGambaStore {
    async fn create(&self, duel: NewDuel) -> Result<Option<Duel>, GambaError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query(
            r#"
            INSERT INTO duels (channel, challenger_id, challenger_name, target_id, target_name,
                               amount, created_at, pending, accepted, expired)
            VALUES (?, ?, ?, ?, ?, ?, ?, 1, 0, 0)
            "#,
        )
        .bind(&duel.channel)
        .bind(&duel.challenger_id)
        .bind(&duel.challenger_name)
        .bind(&duel.target_id)
        .bind(&duel.target_name)
        .bind(duel.amount)
        .bind(encode_ts(duel.created_at))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
        let id = result.last_insert_rowid();

        let locked = sqlx::query(
            "INSERT INTO duel_participants (user_id, duel_id) VALUES (?, ?), (?, ?)",
        )
        .bind(&duel.challenger_id)
        .bind(id)
        .bind(&duel.target_id)
        .bind(id)
        .execute(&mut *tx)
        .await;

        match locked {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                tx.rollback().await.map_err(storage)?;
                return Ok(None);
            }
            Err(err) => return Err(storage(err)),
        }

        tx.commit().await.map_err(storage)?;

        Ok(Some(Duel {
            id,
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
        }))
    }

    async fn get(&self, duel_id: i64) -> Result<Option<Duel>, GambaError> {
        let row = sqlx::query(&format!("SELECT {} FROM duels WHERE id = ?", DUEL_COLUMNS))
            .bind(duel_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.as_ref().map(duel_from_row).transpose()
    }

    async fn pending_for(
        &self,
        user_id: &str,
        live_since: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM duels \
             WHERE pending = 1 AND created_at > ? AND (challenger_id = ? OR target_id = ?) \
             ORDER BY id",
            DUEL_COLUMNS
        ))
        .bind(encode_ts(live_since))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        single_pending(user_id, rows)
    }

    async fn pending_against(
        &self,
        target_id: &str,
        live_since: DateTime<Utc>,
    ) -> Result<Option<Duel>, GambaError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM duels \
             WHERE pending = 1 AND created_at > ? AND target_id = ? \
             ORDER BY id",
            DUEL_COLUMNS
        ))
        .bind(encode_ts(live_since))
        .bind(target_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        single_pending(target_id, rows)
    }

    async fn settle(
        &self,
        duel: &Duel,
        winner_id: &str,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, GambaError> {
        if !duel.involves(winner_id) {
            return Err(GambaError::InvariantViolation(format!(
                "winner {} is not part of duel {}",
                winner_id, duel.id
            )));
        }
        let loser_id = if duel.challenger_id == winner_id {
            &duel.target_id
        } else {
            &duel.challenger_id
        };

        let mut tx = self.pool.begin().await.map_err(storage)?;

        // The pending predicate makes this a compare-and-set: a second
        // accept, or one after the window, updates nothing.
        let resolved = sqlx::query(
            r#"
            UPDATE duels
            SET pending = 0, accepted = 1, resolved_at = ?
            WHERE id = ? AND pending = 1 AND created_at > ?
            RETURNING amount
            "#,
        )
        .bind(encode_ts(now))
        .bind(duel.id)
        .bind(encode_ts(live_since))
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;

        let Some(row) = resolved else {
            tx.rollback().await.map_err(storage)?;
            return Ok(false);
        };
        let amount: i64 = row.try_get("amount").map_err(storage)?;

        sqlx::query("DELETE FROM duel_participants WHERE duel_id = ?")
            .bind(duel.id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (user_id, game, delta, created_at)
            VALUES (?, ?, ?, ?), (?, ?, ?, ?)
            "#,
        )
        .bind(winner_id)
        .bind(DUEL_GAME)
        .bind(amount)
        .bind(encode_ts(now))
        .bind(loser_id)
        .bind(DUEL_GAME)
        .bind(-amount)
        .bind(encode_ts(now))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(true)
    }

    async fn decline(
        &self,
        duel_id: i64,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, GambaError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let updated = sqlx::query(
            r#"
            UPDATE duels
            SET pending = 0, accepted = 0, expired = 0, resolved_at = ?
            WHERE id = ? AND pending = 1 AND created_at > ?
            "#,
        )
        .bind(encode_ts(now))
        .bind(duel_id)
        .bind(encode_ts(live_since))
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await.map_err(storage)?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM duel_participants WHERE duel_id = ?")
            .bind(duel_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(true)
    }

    async fn expire_stale(
        &self,
        live_since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Duel>, GambaError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let rows = sqlx::query(&format!(
            "UPDATE duels SET pending = 0, accepted = 0, expired = 1, resolved_at = ? \
             WHERE pending = 1 AND created_at <= ? \
             RETURNING {}",
            DUEL_COLUMNS
        ))
        .bind(encode_ts(now))
        .bind(encode_ts(live_since))
        .fetch_all(&mut *tx)
        .await
        .map_err(storage)?;

        if !rows.is_empty() {
            sqlx::query(
                r#"
                DELETE FROM duel_participants
                WHERE duel_id NOT IN (SELECT id FROM duels WHERE pending = 1)
                "#,
            )
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;

        let mut expired = rows.iter().map(duel_from_row).collect::<Result<Vec<_>, _>>()?;
        expired.sort_by_key(|duel| duel.id);
        Ok(expired)
    }
}
