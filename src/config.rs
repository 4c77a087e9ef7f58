// Runtime configuration, read from the environment (and `.env` via dotenv).

use anyhow::{anyhow, Context};
use chrono::Duration;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    /// Where the SQLite database and the channel settings file live.
    pub data_dir: PathBuf,
    pub default_prefix: String,
    pub duel_window: Duration,
    pub duel_sweep_interval: std::time::Duration,
    pub persist_cooldowns: bool,
    pub admin_user_ids: Vec<u64>,
    pub moderator_role_ids: Vec<u64>,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or_else(|| {
            anyhow!("Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.")
        })?;

        let duel_window_secs = parse_or(get("DUEL_WINDOW_SECS"), "DUEL_WINDOW_SECS", 30u32)?;
        let duel_sweep_secs = parse_or(get("DUEL_SWEEP_SECS"), "DUEL_SWEEP_SECS", 10u64)?;
        if duel_window_secs == 0 || duel_sweep_secs == 0 {
            return Err(anyhow!("DUEL_WINDOW_SECS and DUEL_SWEEP_SECS must be at least 1"));
        }

        Ok(Self {
            discord_token,
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            default_prefix: get("DEFAULT_PREFIX").unwrap_or_else(|| "!".to_string()),
            duel_window: Duration::seconds(i64::from(duel_window_secs)),
            duel_sweep_interval: std::time::Duration::from_secs(duel_sweep_secs),
            persist_cooldowns: parse_or(get("PERSIST_COOLDOWNS"), "PERSIST_COOLDOWNS", false)?,
            admin_user_ids: parse_id_list(get("ADMIN_USER_IDS"), "ADMIN_USER_IDS")?,
            moderator_role_ids: parse_id_list(get("MODERATOR_ROLE_IDS"), "MODERATOR_ROLE_IDS")?,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gamba.db")
    }

    pub fn channel_settings_path(&self) -> PathBuf {
        self.data_dir.join("channel_settings.json")
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// "1, 2,3" -> [1, 2, 3]
fn parse_id_list(raw: Option<String>, key: &str) -> anyhow::Result<Vec<u64>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .with_context(|| format!("{} contains an invalid ID: {:?}", key, id))
        })
        .collect()
}
