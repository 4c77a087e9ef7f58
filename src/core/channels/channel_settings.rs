use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const MAX_PREFIX_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSettings {
    pub channel: String,
    pub prefix: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelSettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ChannelSettingsStore: Send + Sync {
    async fn get(&self, channel: &str) -> Result<Option<ChannelSettings>, ChannelSettingsError>;
    async fn save(&self, settings: ChannelSettings) -> Result<(), ChannelSettingsError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixChange {
    Changed(String),
    Invalid,
}

pub struct ChannelSettingsService<S: ChannelSettingsStore> {
    store: S,
    default_prefix: String,
}

impl<S: ChannelSettingsStore> ChannelSettingsService<S> {
    pub fn new(store: S, default_prefix: impl Into<String>) -> Self {
        Self {
            store,
            default_prefix: default_prefix.into(),
        }
    }

    /// The command prefix for `channel`, falling back to the default.
    pub async fn prefix_for(&self, channel: &str) -> Result<String, ChannelSettingsError> {
        Ok(self
            .store
            .get(channel)
            .await?
            .map(|settings| settings.prefix)
            .unwrap_or_else(|| self.default_prefix.clone()))
    }

    pub async fn set_prefix(
        &self,
        channel: &str,
        prefix: &str,
    ) -> Result<PrefixChange, ChannelSettingsError> {
        if !is_valid_prefix(prefix) {
            return Ok(PrefixChange::Invalid);
        }

        self.store
            .save(ChannelSettings {
                channel: channel.to_string(),
                prefix: prefix.to_string(),
            })
            .await?;
        tracing::info!(channel, prefix, "Channel prefix changed");
        Ok(PrefixChange::Changed(prefix.to_string()))
    }
}

/// Non-empty, short, no whitespace.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.chars().count() <= MAX_PREFIX_LEN
        && !prefix.chars().any(char::is_whitespace)
}
